//! Pattern matching front-ends over the Aho–Corasick automaton.
//!
//! [`PatternMatcher`] owns one automaton, built once at construction from
//! a pattern slice or (pattern, data) pairs — the common case where the
//! pattern set is fixed for the process lifetime. Matching is
//! case-insensitive: the intended use is scanning user-agent strings and
//! similar free-form client input.
//!
//! [`UserAgentDetector`] bundles three matchers (VPN, bot, crawler) over
//! built-in pattern tables and classifies a user agent in one call.

use crate::aho::{AhoCorasick, Match};
use core::fmt;

/// Substrings that suggest VPN or proxy tunnelling clients.
const VPN_PATTERNS: &[&str] = &[
    "vpn",
    "proxy",
    "tunnel",
    "anonymizer",
    "nordvpn",
    "expressvpn",
    "openvpn",
    "wireguard",
    "privatevpn",
];

/// Substrings that suggest automation rather than a person.
const BOT_PATTERNS: &[&str] = &[
    "bot",
    "spider",
    "crawl",
    "scrape",
    "curl",
    "wget",
    "python-requests",
    "httpclient",
    "headless",
    "phantomjs",
    "selenium",
    "playwright",
];

/// Known search-engine and service crawlers.
const CRAWLER_PATTERNS: &[&str] = &[
    "googlebot",
    "bingbot",
    "yandexbot",
    "baiduspider",
    "duckduckbot",
    "slurp",
    "applebot",
    "facebookexternalhit",
    "twitterbot",
    "semrushbot",
    "ahrefsbot",
];

/// A fixed pattern set compiled into a searchable automaton.
///
/// # Example
///
/// ```
/// use cachekit::pattern::PatternMatcher;
///
/// let matcher = PatternMatcher::from_patterns(["curl", "wget"]);
/// assert!(matcher.is_match("curl/8.4.0"));
/// assert!(!matcher.is_match("Mozilla/5.0"));
/// ```
pub struct PatternMatcher<D = ()> {
    automaton: AhoCorasick<D>,
}

impl<D: Clone> PatternMatcher<D> {
    /// Builds a matcher from (pattern, data) pairs; each match reports
    /// its pattern's data.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
    {
        let automaton = AhoCorasick::case_insensitive();
        for (pattern, data) in pairs {
            automaton.add_pattern_with_data(pattern.as_ref(), data);
        }
        automaton.build();
        PatternMatcher { automaton }
    }

    /// Every pattern occurrence in `text`.
    pub fn find_all(&self, text: &str) -> Vec<Match<D>> {
        self.automaton.search(text)
    }

    /// The first pattern occurrence in `text`.
    pub fn find_first(&self, text: &str) -> Option<Match<D>> {
        self.automaton.search_first(text)
    }

    /// Whether any pattern occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.automaton.contains_match(text)
    }

    /// Total occurrences in `text`.
    pub fn match_count(&self, text: &str) -> usize {
        self.automaton.match_count(text)
    }

    /// Number of compiled patterns.
    pub fn pattern_count(&self) -> usize {
        self.automaton.pattern_count()
    }
}

impl PatternMatcher<()> {
    /// Builds a matcher from bare patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_pairs(patterns.into_iter().map(|p| (p, ())))
    }
}

impl<D> fmt::Debug for PatternMatcher<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("automaton", &self.automaton)
            .finish()
    }
}

/// Outcome of classifying one user-agent string.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// A VPN/proxy pattern matched.
    pub is_vpn: bool,
    /// A generic automation pattern matched.
    pub is_bot: bool,
    /// A known crawler pattern matched.
    pub is_crawler: bool,
    /// Every pattern occurrence, tagged with its category.
    pub matches: Vec<Match<String>>,
}

/// Classifies user agents as VPN clients, bots, and/or crawlers.
///
/// # Example
///
/// ```
/// use cachekit::pattern::UserAgentDetector;
///
/// let detector = UserAgentDetector::new();
/// let result = detector.detect("Mozilla/5.0 (compatible; Googlebot/2.1)");
/// assert!(result.is_crawler);
/// assert!(result.is_bot); // "googlebot" also contains "bot"
/// assert!(!result.is_vpn);
/// ```
pub struct UserAgentDetector {
    vpn: PatternMatcher<String>,
    bot: PatternMatcher<String>,
    crawler: PatternMatcher<String>,
}

impl UserAgentDetector {
    /// Creates a detector over the built-in pattern tables.
    pub fn new() -> Self {
        let tagged = |patterns: &[&str], tag: &str| -> PatternMatcher<String> {
            PatternMatcher::from_pairs(
                patterns
                    .iter()
                    .map(|p| ((*p).to_owned(), tag.to_owned()))
                    .collect::<Vec<_>>(),
            )
        };
        UserAgentDetector {
            vpn: tagged(VPN_PATTERNS, "vpn"),
            bot: tagged(BOT_PATTERNS, "bot"),
            crawler: tagged(CRAWLER_PATTERNS, "crawler"),
        }
    }

    /// Runs all three matchers over the user agent.
    pub fn detect(&self, user_agent: &str) -> DetectionResult {
        let mut matches = self.vpn.find_all(user_agent);
        let is_vpn = !matches.is_empty();
        let bot_matches = self.bot.find_all(user_agent);
        let is_bot = !bot_matches.is_empty();
        matches.extend(bot_matches);
        let crawler_matches = self.crawler.find_all(user_agent);
        let is_crawler = !crawler_matches.is_empty();
        matches.extend(crawler_matches);
        DetectionResult {
            is_vpn,
            is_bot,
            is_crawler,
            matches,
        }
    }

    /// Whether a VPN/proxy pattern matches.
    pub fn is_vpn(&self, user_agent: &str) -> bool {
        self.vpn.is_match(user_agent)
    }

    /// Whether an automation pattern matches.
    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.bot.is_match(user_agent)
    }

    /// Whether a known crawler pattern matches.
    pub fn is_crawler(&self, user_agent: &str) -> bool {
        self.crawler.is_match(user_agent)
    }
}

impl Default for UserAgentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserAgentDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAgentDetector")
            .field("vpn_patterns", &self.vpn.pattern_count())
            .field("bot_patterns", &self.bot.pattern_count())
            .field("crawler_patterns", &self.crawler.pattern_count())
            .finish()
    }
}
