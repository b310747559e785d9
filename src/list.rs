//! Doubly linked list with in-place node splicing.
//!
//! Internal infrastructure for the recency-ordered caches. The list owns
//! heap-allocated nodes linked through raw pointers, with sentinel (sigil)
//! nodes at the head and tail so that attach/detach never special-case the
//! ends:
//!
//! ```text
//! head sigil ◀──▶ MRU ◀──▶ ... ◀──▶ LRU ◀──▶ tail sigil
//! ```
//!
//! The owning cache stores `*mut Node<T>` pointers in its hash map and is
//! responsible for keeping map and list consistent. Nodes can be detached
//! as `Box<Node<T>>` and re-attached to another list without reallocating,
//! which is how the LFU cache migrates entries between frequency lists.
//!
//! This module is not exposed outside the crate: it trades safety for O(1)
//! splicing and requires the documented pointer invariants to hold.

use core::mem;
use core::ptr;

/// A list node. The value is `MaybeUninit` so the same layout serves the
/// uninitialized head/tail sigils.
pub(crate) struct Node<T> {
    val: mem::MaybeUninit<T>,
    prev: *mut Node<T>,
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn new(val: T) -> Self {
        Node {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    fn new_sigil() -> Self {
        Node {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Returns a shared reference to the value.
    ///
    /// # Safety
    ///
    /// Must only be called on non-sigil nodes, whose value is initialized.
    pub(crate) unsafe fn value(&self) -> &T {
        // SAFETY: guaranteed initialized by the caller's contract
        unsafe { self.val.assume_init_ref() }
    }

    /// Returns a mutable reference to the value.
    ///
    /// # Safety
    ///
    /// Must only be called on non-sigil nodes, whose value is initialized.
    pub(crate) unsafe fn value_mut(&mut self) -> &mut T {
        // SAFETY: guaranteed initialized by the caller's contract
        unsafe { self.val.assume_init_mut() }
    }

    /// Consumes a detached boxed node and moves its value out.
    ///
    /// The box must have been produced by `detach`/`pop_back`, so the value
    /// is initialized and is dropped exactly once (here, by the caller).
    pub(crate) fn into_value(self: Box<Self>) -> T {
        // SAFETY: detached nodes always carry an initialized value, and the
        // MaybeUninit wrapper prevents a second drop when the box is freed.
        unsafe { self.val.assume_init() }
    }
}

/// Doubly linked list ordered from most to least recently attached.
///
/// Capacity is not enforced here; the owning cache decides when to evict
/// by calling [`List::pop_back`].
pub(crate) struct List<T> {
    len: usize,
    head: *mut Node<T>,
    tail: *mut Node<T>,
}

impl<T> List<T> {
    pub(crate) fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Node::new_sigil()));
        let tail = Box::into_raw(Box::new(Node::new_sigil()));
        // SAFETY: head and tail are freshly allocated, valid pointers.
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }
        List { len: 0, head, tail }
    }

    #[inline]
    #[allow(dead_code)] // handy in tests and debugging
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Links `node` in directly after the head sigil.
    ///
    /// # Safety
    ///
    /// `node` must be valid and not currently linked into any list.
    unsafe fn link_front(&mut self, node: *mut Node<T>) {
        // SAFETY: head sigil is always valid, and the caller guarantees the
        // node is valid and unlinked.
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*(*node).next).prev = node;
            (*self.head).next = node;
        }
    }

    /// Unlinks `node` from its neighbours without freeing it.
    ///
    /// # Safety
    ///
    /// `node` must be a valid non-sigil node linked into this list.
    unsafe fn unlink(&mut self, node: *mut Node<T>) {
        // SAFETY: a linked node always has valid prev/next pointers.
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// Allocates a node for `val` and attaches it at the front (MRU end).
    pub(crate) fn push_front(&mut self, val: T) -> *mut Node<T> {
        let node = Box::into_raw(Box::new(Node::new(val)));
        // SAFETY: node is freshly allocated and unlinked.
        unsafe { self.link_front(node) };
        self.len += 1;
        node
    }

    /// Attaches an already-allocated node at the front, reusing the
    /// allocation. Used when migrating a node detached from another list.
    pub(crate) fn attach_front(&mut self, node: Box<Node<T>>) -> *mut Node<T> {
        let node = Box::into_raw(node);
        // SAFETY: the box guarantees the node is valid and unlinked.
        unsafe { self.link_front(node) };
        self.len += 1;
        node
    }

    /// Detaches `node` from the list and returns ownership of it.
    ///
    /// # Safety
    ///
    /// `node` must be a valid non-sigil node currently linked into this
    /// list (typically a pointer the owning cache obtained from
    /// [`List::push_front`] and has not detached since).
    pub(crate) unsafe fn detach(&mut self, node: *mut Node<T>) -> Box<Node<T>> {
        // SAFETY: upheld by the caller's contract.
        unsafe {
            self.unlink(node);
            self.len -= 1;
            Box::from_raw(node)
        }
    }

    /// Removes and returns the node at the back (LRU end).
    pub(crate) fn pop_back(&mut self) -> Option<Box<Node<T>>> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is non-empty, so tail.prev is a real node.
        unsafe {
            let node = (*self.tail).prev;
            Some(self.detach(node))
        }
    }

    /// Moves a linked node to the front (MRU end).
    ///
    /// # Safety
    ///
    /// `node` must be a valid non-sigil node currently linked into this list.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut Node<T>) {
        // Already first?
        // SAFETY: head sigil is always valid.
        if unsafe { (*self.head).next } == node {
            return;
        }
        // SAFETY: upheld by the caller's contract; relinking immediately
        // after unlinking keeps the node owned by this list.
        unsafe {
            self.unlink(node);
            self.link_front(node);
        }
    }

    /// Returns the node at the back (LRU end), or `None` when empty.
    pub(crate) fn back(&self) -> Option<*mut Node<T>> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is non-empty, so tail.prev is a real node.
        Some(unsafe { (*self.tail).prev })
    }

    /// Returns the node before `node` (one step toward the front), or
    /// `None` once the head sigil is reached. Together with [`List::back`]
    /// this walks the list from LRU to MRU.
    ///
    /// # Safety
    ///
    /// `node` must be a valid non-sigil node currently linked into this list.
    pub(crate) unsafe fn toward_front(&self, node: *mut Node<T>) -> Option<*mut Node<T>> {
        // SAFETY: a linked node always has a valid prev pointer.
        let prev = unsafe { (*node).prev };
        if prev == self.head {
            None
        } else {
            Some(prev)
        }
    }

    /// Removes every node, dropping the stored values.
    pub(crate) fn clear(&mut self) {
        while let Some(node) = self.pop_back() {
            drop(node.into_value());
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: the sigils were allocated in `new` and are only freed here.
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

// SAFETY: the list owns every node; raw pointers never escape the crate and
// all mutation goes through &mut self.
unsafe impl<T: Send> Send for List<T> {}
// SAFETY: shared references permit no mutation of the links.
unsafe impl<T: Sync> Sync for List<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_back_to_front(list: &List<i32>) -> Vec<i32> {
        let mut out = Vec::new();
        let mut cursor = list.back();
        while let Some(node) = cursor {
            // SAFETY: cursor only ever holds linked non-sigil nodes.
            unsafe {
                out.push(*(*node).value());
                cursor = list.toward_front(node);
            }
        }
        out
    }

    #[test]
    fn test_push_and_pop_order() {
        let mut list = List::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.pop_back().map(Node::into_value), Some(1));
        assert_eq!(list.pop_back().map(Node::into_value), Some(2));
        assert_eq!(list.pop_back().map(Node::into_value), Some(3));
        assert!(list.pop_back().is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn test_move_to_front_changes_eviction_order() {
        let mut list = List::new();
        let a = list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        // SAFETY: `a` is still linked.
        unsafe { list.move_to_front(a) };
        assert_eq!(collect_back_to_front(&list), vec![2, 3, 1]);
    }

    #[test]
    fn test_detach_and_reattach_elsewhere() {
        let mut src = List::new();
        let mut dst = List::new();
        let node = src.push_front(42);
        src.push_front(7);
        // SAFETY: node came from src.push_front and was not detached since.
        let boxed = unsafe { src.detach(node) };
        dst.attach_front(boxed);
        assert_eq!(src.len(), 1);
        assert_eq!(dst.len(), 1);
        assert_eq!(dst.pop_back().map(Node::into_value), Some(42));
    }

    #[test]
    fn test_walk_back_to_front() {
        let mut list = List::new();
        for i in 0..5 {
            list.push_front(i);
        }
        assert_eq!(collect_back_to_front(&list), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clear_drops_values() {
        let mut list = List::new();
        for i in 0..10 {
            list.push_front(format!("value-{i}"));
        }
        list.clear();
        assert!(list.is_empty());
        assert!(list.back().is_none());
    }
}
