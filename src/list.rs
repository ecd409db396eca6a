//! Doubly-linked list with stable node handles.
//!
//! Nodes live in a slot arena and link to each other by [`NodeId`] instead
//! of pointers. A handle carries the generation of its slot, so using a
//! handle after its node was removed is reported as an error instead of
//! silently touching a recycled node.
//!
//! Traversal is done with [`List::iter`] (double-ended) or with the
//! handle-yielding cursors [`List::cursor_top`] and [`List::cursor_bot`].

use std::fmt;

use tracing::error;

use crate::error::{Result, VrmrError};

/// Element destructor invoked when a node is removed from the list.
pub type Destructor<T> = Box<dyn FnMut(T) + Send>;

/// Handle to a node of a [`List`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

struct Node<T> {
    data: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Ordered sequence of nodes with O(1) insert and remove at any handle.
pub struct List<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    top: Option<NodeId>,
    bot: Option<NodeId>,
    len: usize,
    destructor: Option<Destructor<T>>,
}

impl<T> List<T> {
    /// Create an empty list whose elements are simply dropped on removal.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            top: None,
            bot: None,
            len: 0,
            destructor: None,
        }
    }

    /// Create an empty list that hands every removed element to `destructor`.
    pub fn with_destructor<F>(destructor: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut list = Self::new();
        list.destructor = Some(Box::new(destructor));
        list
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the first node.
    pub fn top(&self) -> Option<NodeId> {
        self.top
    }

    /// Handle of the last node.
    pub fn bot(&self) -> Option<NodeId> {
        self.bot
    }

    /// Successor of `id`, `None` at the bottom or for a stale handle.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next)
    }

    /// Predecessor of `id`, `None` at the top or for a stale handle.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.prev)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.node(id).map(|n| &n.data)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id).map(|n| &mut n.data)
    }

    /// Link `data` at the bottom of the list.
    pub fn append(&mut self, data: T) -> NodeId {
        let id = self.alloc(Node {
            data,
            prev: self.bot,
            next: None,
        });
        match self.bot {
            Some(bot) => self.link_next(bot, Some(id)),
            None => self.top = Some(id),
        }
        self.bot = Some(id);
        self.len += 1;
        id
    }

    /// Link `data` at the top of the list.
    pub fn prepend(&mut self, data: T) -> NodeId {
        let id = self.alloc(Node {
            data,
            prev: None,
            next: self.top,
        });
        match self.top {
            Some(top) => self.link_prev(top, Some(id)),
            None => self.bot = Some(id),
        }
        self.top = Some(id);
        self.len += 1;
        id
    }

    /// Splice `data` in after `anchor`. Without an anchor this is [`List::append`].
    pub fn insert_after(&mut self, anchor: Option<NodeId>, data: T) -> Result<NodeId> {
        let Some(anchor) = anchor else {
            return Ok(self.append(data));
        };
        let next = self.node(anchor).ok_or_else(|| stale("insert_after"))?.next;

        let id = self.alloc(Node {
            data,
            prev: Some(anchor),
            next,
        });
        match next {
            Some(next) => self.link_prev(next, Some(id)),
            None => self.bot = Some(id),
        }
        self.link_next(anchor, Some(id));
        self.len += 1;
        Ok(id)
    }

    /// Splice `data` in before `anchor`. Without an anchor this is [`List::prepend`].
    pub fn insert_before(&mut self, anchor: Option<NodeId>, data: T) -> Result<NodeId> {
        let Some(anchor) = anchor else {
            return Ok(self.prepend(data));
        };
        let prev = self.node(anchor).ok_or_else(|| stale("insert_before"))?.prev;

        let id = self.alloc(Node {
            data,
            prev,
            next: Some(anchor),
        });
        match prev {
            Some(prev) => self.link_next(prev, Some(id)),
            None => self.top = Some(id),
        }
        self.link_prev(anchor, Some(id));
        self.len += 1;
        Ok(id)
    }

    /// Unlink a node and give its element back without running the destructor.
    pub fn unlink(&mut self, id: NodeId) -> Result<T> {
        if self.len == 0 {
            error!("Internal Error: remove from an empty list");
            return Err(VrmrError::Internal("list is empty".to_string()));
        }
        let node = self.release(id).ok_or_else(|| stale("remove"))?;

        match node.prev {
            Some(prev) => self.link_next(prev, node.next),
            None => self.top = node.next,
        }
        match node.next {
            Some(next) => self.link_prev(next, node.prev),
            None => self.bot = node.prev,
        }
        self.len -= 1;
        Ok(node.data)
    }

    /// Remove a node, handing its element to the destructor. The handle is
    /// invalid afterwards.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let data = self.unlink(id)?;
        self.destroy(data);
        Ok(())
    }

    pub fn remove_top(&mut self) -> Result<()> {
        let top = self.top.ok_or_else(empty)?;
        self.remove_node(top)
    }

    pub fn remove_bot(&mut self) -> Result<()> {
        let bot = self.bot.ok_or_else(empty)?;
        self.remove_node(bot)
    }

    /// Remove every node, top first. Safe to call on an empty list.
    pub fn cleanup(&mut self) {
        while let Some(top) = self.top {
            if let Ok(data) = self.unlink(top) {
                self.destroy(data);
            } else {
                break;
            }
        }
    }

    /// Forward and backward iteration over the elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.top,
            back: self.bot,
            remaining: self.len,
        }
    }

    /// Walk `(handle, element)` pairs from the top down.
    pub fn cursor_top(&self) -> Cursor<'_, T> {
        Cursor {
            list: self,
            current: self.top,
            forward: true,
        }
    }

    /// Walk `(handle, element)` pairs from the bottom up.
    pub fn cursor_bot(&self) -> Cursor<'_, T> {
        Cursor {
            list: self,
            current: self.bot,
            forward: false,
        }
    }

    /// Verify the structural invariants of the list.
    pub fn check_invariants(&self) -> bool {
        if self.len == 0 {
            return self.top.is_none() && self.bot.is_none();
        }
        let (Some(top), Some(bot)) = (self.top, self.bot) else {
            return false;
        };
        if self.prev(top).is_some() || self.next(bot).is_some() {
            return false;
        }

        let mut count = 0;
        let mut last = None;
        let mut cur = Some(top);
        while let Some(id) = cur {
            let Some(node) = self.node(id) else {
                return false;
            };
            if node.prev != last {
                return false;
            }
            count += 1;
            if count > self.len {
                return false;
            }
            last = Some(id);
            cur = node.next;
        }
        count == self.len && last == Some(bot)
    }

    fn destroy(&mut self, data: T) {
        match self.destructor.as_mut() {
            Some(destructor) => destructor(data),
            None => drop(data),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: self.slots.len() - 1,
                generation: 0,
            }
        }
    }

    fn release(&mut self, id: NodeId) -> Option<Node<T>> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn link_next(&mut self, id: NodeId, next: Option<NodeId>) {
        if let Some(node) = self.node_mut(id) {
            node.next = next;
        }
    }

    fn link_prev(&mut self, id: NodeId, prev: Option<NodeId>) {
        if let Some(node) = self.node_mut(id) {
            node.prev = prev;
        }
    }
}

fn stale(op: &str) -> VrmrError {
    error!("Internal Error: {} on a stale node handle", op);
    VrmrError::Internal(format!("{}: stale node handle", op))
}

fn empty() -> VrmrError {
    error!("Internal Error: remove from an empty list");
    VrmrError::Internal("list is empty".to_string())
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = List::new();
        for item in iter {
            list.append(item);
        }
        list
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.append(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Element iterator returned by [`List::iter`].
pub struct Iter<'a, T> {
    list: &'a List<T>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.data)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.data)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// One-directional walk over `(handle, element)` pairs.
pub struct Cursor<'a, T> {
    list: &'a List<T>,
    current: Option<NodeId>,
    forward: bool,
}

impl<'a, T> Iterator for Cursor<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.list.node(id)?;
        self.current = if self.forward { node.next } else { node.prev };
        Some((id, &node.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collect<T: Clone>(list: &List<T>) -> Vec<T> {
        list.iter().cloned().collect()
    }

    #[test]
    fn test_append_prepend_order() {
        let mut list = List::new();
        list.append(2);
        list.append(3);
        list.prepend(1);
        assert_eq!(list.len(), 3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.iter().rev().cloned().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert!(list.check_invariants());
    }

    #[test]
    fn test_insert_after_and_before() {
        let mut list = List::new();
        let a = list.append("a");
        let c = list.append("c");
        list.insert_after(Some(a), "b").unwrap();
        list.insert_before(Some(a), "start").unwrap();
        list.insert_after(Some(c), "end").unwrap();
        assert_eq!(collect(&list), vec!["start", "a", "b", "c", "end"]);
        assert!(list.check_invariants());
    }

    #[test]
    fn test_insert_without_anchor() {
        let mut list = List::new();
        list.append(2);
        list.insert_after(None, 3).unwrap();
        list.insert_before(None, 1).unwrap();
        assert_eq!(collect(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_on_stale_anchor_fails() {
        let mut list = List::new();
        let a = list.append(1);
        list.remove_node(a).unwrap();
        assert!(list.insert_after(Some(a), 2).is_err());
        assert!(list.insert_before(Some(a), 2).is_err());
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_middle_top_bot() {
        let mut list: List<i32> = (1..=5).collect();
        let middle = list.next(list.top().unwrap()).unwrap();
        list.remove_node(middle).unwrap();
        assert_eq!(collect(&list), vec![1, 3, 4, 5]);

        list.remove_top().unwrap();
        list.remove_bot().unwrap();
        assert_eq!(collect(&list), vec![3, 4]);
        assert!(list.check_invariants());
    }

    #[test]
    fn test_remove_from_empty_list_fails() {
        let mut list: List<u8> = List::new();
        assert!(list.remove_top().is_err());
        assert!(list.remove_bot().is_err());
        assert!(list.check_invariants());
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut list = List::new();
        let a = list.append(1);
        list.append(2);
        list.remove_node(a).unwrap();
        // the slot is recycled, the old handle must not reach the new node
        let b = list.append(3);
        assert!(list.get(a).is_none());
        assert_eq!(list.get(b), Some(&3));
        assert!(list.remove_node(a).is_err());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_destructor_called_on_remove_and_cleanup() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut list = List::with_destructor(move |v: i32| sink.lock().unwrap().push(v));
        for i in 0..4 {
            list.append(i);
        }
        list.remove_bot().unwrap();
        list.cleanup();
        assert_eq!(*seen.lock().unwrap(), vec![3, 0, 1, 2]);
        assert!(list.is_empty());
        assert!(list.top().is_none() && list.bot().is_none());
    }

    #[test]
    fn test_unlink_skips_destructor() {
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let mut list = List::with_destructor(move |_: String| *sink.lock().unwrap() += 1);
        let id = list.append("kept".to_string());
        assert_eq!(list.unlink(id).unwrap(), "kept");
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_cleanup_idempotent() {
        let mut list: List<u32> = List::new();
        list.cleanup();
        assert!(list.check_invariants());
        list.extend([1, 2, 3]);
        list.cleanup();
        list.cleanup();
        assert_eq!(list.len(), 0);
        assert!(list.check_invariants());
    }

    #[test]
    fn test_cleanup_long_list() {
        let mut list: List<usize> = (0..100_000).collect();
        assert_eq!(list.len(), 100_000);
        list.cleanup();
        assert!(list.is_empty());
    }

    #[test]
    fn test_cursors() {
        let list: List<char> = "abcd".chars().collect();
        let forward: String = list.cursor_top().map(|(_, c)| *c).collect();
        let backward: String = list.cursor_bot().map(|(_, c)| *c).collect();
        assert_eq!(forward, "abcd");
        assert_eq!(backward, "dcba");

        let (id, _) = list.cursor_bot().find(|(_, c)| **c == 'b').unwrap();
        assert_eq!(list.prev(id), list.top());
    }

    #[test]
    fn test_double_ended_iter_meets_in_middle() {
        let list: List<i32> = (1..=4).collect();
        let mut it = list.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&4));
        assert_eq!(it.next(), Some(&2));
        assert_eq!(it.next_back(), Some(&3));
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);
    }

    #[test]
    fn test_invariants_hold_over_mixed_sequence() {
        // deterministic pseudo-random walk of inserts and removals
        let mut list = List::new();
        let mut handles: Vec<NodeId> = Vec::new();
        let mut seed: u32 = 0x2545_f491;
        for step in 0..2_000u32 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            match seed % 5 {
                0 => handles.push(list.append(step)),
                1 => handles.push(list.prepend(step)),
                2 if !handles.is_empty() => {
                    let anchor = handles[(seed as usize) % handles.len()];
                    handles.push(list.insert_after(Some(anchor), step).unwrap());
                }
                3 if !handles.is_empty() => {
                    let anchor = handles[(seed as usize) % handles.len()];
                    handles.push(list.insert_before(Some(anchor), step).unwrap());
                }
                _ if !handles.is_empty() => {
                    let victim = handles.swap_remove((seed as usize) % handles.len());
                    list.remove_node(victim).unwrap();
                }
                _ => {}
            }
            assert!(list.check_invariants(), "broken at step {}", step);
            assert_eq!(list.len(), handles.len());
        }
    }
}
