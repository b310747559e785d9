//! Geospatial proximity index: uniform hash grid with haversine
//! refinement.
//!
//! Entries (id, lat, lon, timestamp) are bucketed into square cells of a
//! configurable side length:
//!
//! ```text
//! cell side  = cell_size_km / 111    (degrees; ~111 km per degree)
//! cell key   = (⌊lon / side⌋, ⌊lat / side⌋)
//! ```
//!
//! A radius query scans the bounding box of cells around the center and
//! keeps only entries whose great-circle (haversine) distance is within
//! the radius — the grid prunes candidates, the formula decides:
//!
//! ```text
//!        ┌────┬────┬────┐
//!        │    │ ▒▒ │    │      ▒▒ candidate cells
//!        ├────┼────┼────┤      ● query center, r = radius
//!        │ ▒▒ │ ●  │ ▒▒ │
//!        ├────┼────┼────┤
//!        │    │ ▒▒ │    │
//!        └────┴────┴────┘
//! ```
//!
//! Longitude is normalized into [−180, 180] before bucketing; cells near
//! the antimeridian are still distinct keys, which is acceptable for the
//! continental workloads this serves.
//!
//! [`UserLocationTracker`] layers "most recent location per user" on top
//! of the grid, keeping the location history queryable.
//!
//! # Thread safety
//!
//! `RwLock`: queries and reads are shared; insert/remove/cleanup are
//! exclusive. Returned entries are copies.

use chrono::{DateTime, SecondsFormat, Utc};
use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::Serialize;

/// Mean kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.0;

/// Earth radius used by the haversine formula, in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Cell side substituted when a constructor receives a non-positive size.
const DEFAULT_CELL_SIZE_KM: f64 = 10.0;

/// Great-circle distance between two (lat, lon) points in kilometres.
///
/// Inputs are in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// One indexed position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialEntry {
    /// Unique id; re-inserting an id replaces its previous position.
    pub id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// When the position was observed.
    pub timestamp: DateTime<Utc>,
}

type CellKey = (i32, i32);

struct GridCore {
    cells: HashMap<CellKey, Vec<SpatialEntry>>,
    /// id → cell currently holding the entry, for O(1) replacement.
    id_index: HashMap<String, CellKey>,
    cell_size_deg: f64,
}

impl GridCore {
    fn cell_key(&self, lat: f64, lon: f64) -> CellKey {
        let mut lon = lon;
        while lon > 180.0 {
            lon -= 360.0;
        }
        while lon < -180.0 {
            lon += 360.0;
        }
        (
            (lon / self.cell_size_deg).floor() as i32,
            (lat / self.cell_size_deg).floor() as i32,
        )
    }

    /// Removes `id` from its cached cell, swap-with-last. Returns whether
    /// an entry was removed.
    fn remove_id(&mut self, id: &str) -> bool {
        let Some(cell_key) = self.id_index.remove(id) else {
            return false;
        };
        if let Some(entries) = self.cells.get_mut(&cell_key) {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                entries.swap_remove(pos);
            }
            if entries.is_empty() {
                self.cells.remove(&cell_key);
            }
        }
        true
    }

    fn insert(&mut self, entry: SpatialEntry) {
        self.remove_id(&entry.id);
        let cell_key = self.cell_key(entry.lat, entry.lon);
        self.id_index.insert(entry.id.clone(), cell_key);
        self.cells.entry(cell_key).or_default().push(entry);
    }

    fn query(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        since: Option<DateTime<Utc>>,
    ) -> Vec<SpatialEntry> {
        let (center_x, center_y) = self.cell_key(lat, lon);
        let cell_radius = (radius_km / KM_PER_DEGREE / self.cell_size_deg).ceil() as i32 + 1;
        let mut results = Vec::new();
        for dx in -cell_radius..=cell_radius {
            for dy in -cell_radius..=cell_radius {
                let Some(entries) = self.cells.get(&(center_x + dx, center_y + dy)) else {
                    continue;
                };
                for entry in entries {
                    // Cheap time filter first, trigonometry second.
                    if let Some(since) = since {
                        if entry.timestamp < since {
                            continue;
                        }
                    }
                    if haversine_km(lat, lon, entry.lat, entry.lon) <= radius_km {
                        results.push(entry.clone());
                    }
                }
            }
        }
        results
    }
}

/// Thread-safe uniform-cell geospatial index.
///
/// # Example
///
/// ```
/// use cachekit::spatial::SpatialHashGrid;
/// use chrono::Utc;
///
/// let grid = SpatialHashGrid::new(50.0);
/// grid.insert("nyc", 40.7128, -74.0060, Utc::now());
/// grid.insert("newark", 40.7357, -74.1724, Utc::now());
/// grid.insert("philly", 39.9526, -75.1652, Utc::now());
///
/// let near = grid.query_nearby(40.7128, -74.0060, 50.0);
/// assert_eq!(near.len(), 2); // nyc + newark; philly is ~130 km away
/// ```
pub struct SpatialHashGrid {
    core: RwLock<GridCore>,
}

impl SpatialHashGrid {
    /// Creates a grid with cells roughly `cell_size_km` on a side. A
    /// non-positive size falls back to 10 km.
    pub fn new(cell_size_km: f64) -> Self {
        let cell_size_km = if cell_size_km > 0.0 { cell_size_km } else { DEFAULT_CELL_SIZE_KM };
        SpatialHashGrid {
            core: RwLock::new(GridCore {
                cells: HashMap::new(),
                id_index: HashMap::new(),
                cell_size_deg: cell_size_km / KM_PER_DEGREE,
            }),
        }
    }

    /// Inserts a position, replacing any previous entry with the same id.
    pub fn insert(&self, id: &str, lat: f64, lon: f64, timestamp: DateTime<Utc>) {
        self.core.write().insert(SpatialEntry {
            id: id.to_owned(),
            lat,
            lon,
            timestamp,
        });
    }

    /// Removes the entry with `id`; returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.core.write().remove_id(id)
    }

    /// Copy of the entry with `id`.
    pub fn get(&self, id: &str) -> Option<SpatialEntry> {
        let core = self.core.read();
        let cell_key = core.id_index.get(id)?;
        core.cells
            .get(cell_key)?
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// All entries within `radius_km` of the center, as copies.
    pub fn query_nearby(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<SpatialEntry> {
        self.core.read().query(lat, lon, radius_km, None)
    }

    /// Like [`SpatialHashGrid::query_nearby`], restricted to entries
    /// observed at or after `since`.
    pub fn query_nearby_within_time(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        since: DateTime<Utc>,
    ) -> Vec<SpatialEntry> {
        self.core.read().query(lat, lon, radius_km, Some(since))
    }

    /// Removes every entry observed before `cutoff`; returns the count.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut core = self.core.write();
        let before = core.id_index.len();
        core.cells.retain(|_, entries| {
            entries.retain(|e| e.timestamp >= cutoff);
            !entries.is_empty()
        });
        let rebuilt: HashMap<String, CellKey> = core
            .cells
            .iter()
            .flat_map(|(key, entries)| entries.iter().map(move |e| (e.id.clone(), *key)))
            .collect();
        core.id_index = rebuilt;
        before - core.id_index.len()
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.core.read().id_index.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of occupied cells.
    pub fn num_cells(&self) -> usize {
        self.core.read().cells.len()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut core = self.core.write();
        core.cells.clear();
        core.id_index.clear();
    }
}

impl fmt::Debug for SpatialHashGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("SpatialHashGrid")
            .field("entries", &core.id_index.len())
            .field("cells", &core.cells.len())
            .finish()
    }
}

/// Per-user location tracking over a [`SpatialHashGrid`].
///
/// Every recorded location becomes a grid entry (id
/// `"{user}-{RFC3339Nano}"`), so the recent movement history stays
/// queryable; the tracker additionally remembers each user's most recent
/// entry.
pub struct UserLocationTracker {
    grid: SpatialHashGrid,
    last_by_user: RwLock<HashMap<String, SpatialEntry>>,
}

impl UserLocationTracker {
    /// Creates a tracker over a grid with `cell_size_km` cells.
    pub fn new(cell_size_km: f64) -> Self {
        UserLocationTracker {
            grid: SpatialHashGrid::new(cell_size_km),
            last_by_user: RwLock::new(HashMap::new()),
        }
    }

    /// Records a location observation and returns the user's previous
    /// most-recent entry, if any.
    pub fn record_location(
        &self,
        user_id: &str,
        lat: f64,
        lon: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<SpatialEntry> {
        let id = format!(
            "{user_id}-{}",
            timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        self.grid.insert(&id, lat, lon, timestamp);
        let entry = SpatialEntry {
            id,
            lat,
            lon,
            timestamp,
        };
        self.last_by_user.write().insert(user_id.to_owned(), entry)
    }

    /// The user's most recent entry.
    pub fn last_location(&self, user_id: &str) -> Option<SpatialEntry> {
        self.last_by_user.read().get(user_id).cloned()
    }

    /// Location history entries within `radius_km` of the center.
    pub fn query_nearby(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<SpatialEntry> {
        self.grid.query_nearby(lat, lon, radius_km)
    }

    /// Like [`UserLocationTracker::query_nearby`], restricted to entries
    /// observed at or after `since`.
    pub fn query_nearby_within_time(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        since: DateTime<Utc>,
    ) -> Vec<SpatialEntry> {
        self.grid.query_nearby_within_time(lat, lon, radius_km, since)
    }

    /// Drops history and last-known entries older than `cutoff`; returns
    /// how many grid entries were removed.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let removed = self.grid.cleanup_before(cutoff);
        self.last_by_user
            .write()
            .retain(|_, entry| entry.timestamp >= cutoff);
        removed
    }

    /// Number of users with a known location.
    pub fn user_count(&self) -> usize {
        self.last_by_user.read().len()
    }

    /// Number of history entries in the grid.
    pub fn history_len(&self) -> usize {
        self.grid.len()
    }

    /// Drops all state.
    pub fn clear(&self) {
        self.grid.clear();
        self.last_by_user.write().clear();
    }
}

impl fmt::Debug for UserLocationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLocationTracker")
            .field("users", &self.user_count())
            .field("history", &self.grid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NYC: (f64, f64) = (40.7128, -74.0060);
    const NEWARK: (f64, f64) = (40.7357, -74.1724);
    const PHILLY: (f64, f64) = (39.9526, -75.1652);

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn ids(mut entries: Vec<SpatialEntry>) -> Vec<String> {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_haversine_known_distances() {
        // NYC ↔ Newark is ~14 km.
        let d = haversine_km(NYC.0, NYC.1, NEWARK.0, NEWARK.1);
        assert!((10.0..20.0).contains(&d), "got {d}");
        // NYC ↔ Philadelphia is ~130 km.
        let d = haversine_km(NYC.0, NYC.1, PHILLY.0, PHILLY.1);
        assert!((120.0..140.0).contains(&d), "got {d}");
        // Zero distance.
        assert!(haversine_km(NYC.0, NYC.1, NYC.0, NYC.1) < 1e-9);
    }

    #[test]
    fn test_query_radius_selects_correct_cities() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("nyc", NYC.0, NYC.1, ts(0));
        grid.insert("newark", NEWARK.0, NEWARK.1, ts(0));
        grid.insert("philly", PHILLY.0, PHILLY.1, ts(0));

        let near = grid.query_nearby(NYC.0, NYC.1, 50.0);
        assert_eq!(ids(near), vec!["newark", "nyc"]);

        let wide = grid.query_nearby(NYC.0, NYC.1, 200.0);
        assert_eq!(ids(wide), vec!["newark", "nyc", "philly"]);
    }

    #[test]
    fn test_every_result_is_within_radius() {
        let grid = SpatialHashGrid::new(25.0);
        for i in 0..100 {
            let lat = 40.0 + f64::from(i) * 0.03;
            let lon = -74.0 + f64::from(i % 10) * 0.04;
            grid.insert(&format!("p{i}"), lat, lon, ts(0));
        }
        for entry in grid.query_nearby(41.0, -73.8, 60.0) {
            assert!(haversine_km(41.0, -73.8, entry.lat, entry.lon) <= 60.0);
        }
        // Nothing inside the radius may be missed: compare with a full scan.
        let brute: Vec<_> = (0..100)
            .filter(|i| {
                let lat = 40.0 + f64::from(*i) * 0.03;
                let lon = -74.0 + f64::from(*i % 10) * 0.04;
                haversine_km(41.0, -73.8, lat, lon) <= 60.0
            })
            .collect();
        assert_eq!(grid.query_nearby(41.0, -73.8, 60.0).len(), brute.len());
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("user", NYC.0, NYC.1, ts(0));
        grid.insert("user", PHILLY.0, PHILLY.1, ts(10));
        assert_eq!(grid.len(), 1);
        let entry = grid.get("user").unwrap();
        assert_eq!(entry.timestamp, ts(10));
        assert!(grid.query_nearby(NYC.0, NYC.1, 20.0).is_empty());
        assert_eq!(grid.query_nearby(PHILLY.0, PHILLY.1, 20.0).len(), 1);
    }

    #[test]
    fn test_get_returns_copy() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("a", NYC.0, NYC.1, ts(0));
        let mut copy = grid.get("a").unwrap();
        copy.lat = 0.0;
        assert_eq!(grid.get("a").unwrap().lat, NYC.0);
    }

    #[test]
    fn test_remove() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("a", NYC.0, NYC.1, ts(0));
        assert!(grid.remove("a"));
        assert!(!grid.remove("a"));
        assert!(grid.is_empty());
        assert_eq!(grid.num_cells(), 0);
    }

    #[test]
    fn test_longitude_normalization() {
        let grid = SpatialHashGrid::new(50.0);
        // 286° ≡ −74°.
        grid.insert("wrapped", NYC.0, NYC.1 + 360.0, ts(0));
        assert_eq!(grid.query_nearby(NYC.0, NYC.1, 5.0).len(), 1);
    }

    #[test]
    fn test_query_within_time() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("old", NYC.0, NYC.1, ts(100));
        grid.insert("new", NEWARK.0, NEWARK.1, ts(200));
        let recent = grid.query_nearby_within_time(NYC.0, NYC.1, 50.0, ts(150));
        assert_eq!(ids(recent), vec!["new"]);
    }

    #[test]
    fn test_cleanup_before() {
        let grid = SpatialHashGrid::new(50.0);
        grid.insert("old-1", NYC.0, NYC.1, ts(100));
        grid.insert("old-2", NEWARK.0, NEWARK.1, ts(150));
        grid.insert("new", PHILLY.0, PHILLY.1, ts(300));
        assert_eq!(grid.cleanup_before(ts(200)), 2);
        assert_eq!(grid.len(), 1);
        assert!(grid.get("new").is_some());
        assert!(grid.get("old-1").is_none());
    }

    #[test]
    fn test_tracker_returns_previous_entry() {
        let tracker = UserLocationTracker::new(50.0);
        assert!(tracker.record_location("u1", NYC.0, NYC.1, ts(100)).is_none());
        let prev = tracker
            .record_location("u1", NEWARK.0, NEWARK.1, ts(200))
            .unwrap();
        assert_eq!(prev.lat, NYC.0);
        assert_eq!(prev.timestamp, ts(100));
        let last = tracker.last_location("u1").unwrap();
        assert_eq!(last.timestamp, ts(200));
        // History keeps both observations.
        assert_eq!(tracker.history_len(), 2);
        assert_eq!(tracker.user_count(), 1);
    }

    #[test]
    fn test_tracker_entry_id_format() {
        let tracker = UserLocationTracker::new(50.0);
        tracker.record_location("u1", NYC.0, NYC.1, ts(100));
        let entry = tracker.last_location("u1").unwrap();
        assert!(entry.id.starts_with("u1-1970-01-01T00:01:40"));
    }

    #[test]
    fn test_tracker_cleanup_before() {
        let tracker = UserLocationTracker::new(50.0);
        tracker.record_location("u1", NYC.0, NYC.1, ts(100));
        tracker.record_location("u2", NEWARK.0, NEWARK.1, ts(300));
        assert_eq!(tracker.cleanup_before(ts(200)), 1);
        assert!(tracker.last_location("u1").is_none());
        assert!(tracker.last_location("u2").is_some());
        assert_eq!(tracker.user_count(), 1);
    }

    #[test]
    fn test_concurrent_inserts_and_queries() {
        use std::sync::Arc;
        use std::thread;

        let grid = Arc::new(SpatialHashGrid::new(25.0));
        let mut handles = Vec::new();
        for t in 0..4 {
            let grid = Arc::clone(&grid);
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    let lat = 40.0 + f64::from(i % 50) * 0.01;
                    let lon = -74.0 + f64::from(t) * 0.01;
                    grid.insert(&format!("p-{t}-{i}"), lat, lon, ts(i64::from(i)));
                    let _ = grid.query_nearby(lat, lon, 10.0);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(grid.len(), 1000);
    }
}
