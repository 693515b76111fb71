//! LRU ordering over the line slots of one set.
//!
//! The order is a doubly-linked list threaded through a fixed array of
//! per-slot links, so promoting and evicting never rescan the set.

/// link to a neighbouring slot, or the end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Nil,
    Slot(usize),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    /// towards least-recent
    prev: Link,
    /// towards most-recent
    next: Link,
}

impl Node {
    const DETACHED: Node = Node {
        prev: Link::Nil,
        next: Link::Nil,
    };
}

#[derive(Debug, Clone)]
pub struct RecencyOrder {
    nodes: Vec<Node>,
    lru: Link,
    mru: Link,
}

impl RecencyOrder {
    /// bookkeeping bytes per slot.
    pub(crate) const SLOT_BYTES: usize = std::mem::size_of::<Node>();

    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![Node::DETACHED; capacity],
            lru: Link::Nil,
            mru: Link::Nil,
        }
    }

    pub fn least_recent(&self) -> Option<usize> {
        match self.lru {
            Link::Slot(i) => Some(i),
            Link::Nil => None,
        }
    }

    pub fn most_recent(&self) -> Option<usize> {
        match self.mru {
            Link::Slot(i) => Some(i),
            Link::Nil => None,
        }
    }

    /// promotes a linked `slot` to most-recent.
    pub fn touch(&mut self, slot: usize) {
        if self.mru == Link::Slot(slot) {
            return;
        }
        self.unlink(slot);
        self.push_most_recent(slot);
    }

    /// links a slot that is not yet in the order as most-recent.
    pub fn append_new(&mut self, slot: usize) {
        debug_assert!(!self.contains(slot), "slot {slot} already linked");
        self.push_most_recent(slot);
    }

    /// unlinks and returns the least-recent slot.
    pub fn evict_least_recent(&mut self) -> Option<usize> {
        let slot = self.least_recent()?;
        self.unlink(slot);
        Some(slot)
    }

    /// slots from least- to most-recent.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            order: self,
            cursor: self.lru,
        }
    }

    fn contains(&self, slot: usize) -> bool {
        let n = self.nodes[slot];
        n.prev != Link::Nil || n.next != Link::Nil || self.lru == Link::Slot(slot)
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next } = self.nodes[slot];
        match prev {
            Link::Slot(p) => self.nodes[p].next = next,
            Link::Nil => self.lru = next,
        }
        match next {
            Link::Slot(n) => self.nodes[n].prev = prev,
            Link::Nil => self.mru = prev,
        }
        self.nodes[slot] = Node::DETACHED;
    }

    fn push_most_recent(&mut self, slot: usize) {
        self.nodes[slot] = Node {
            prev: self.mru,
            next: Link::Nil,
        };
        match self.mru {
            Link::Slot(m) => self.nodes[m].next = Link::Slot(slot),
            Link::Nil => self.lru = Link::Slot(slot),
        }
        self.mru = Link::Slot(slot);
    }
}

pub struct Iter<'a> {
    order: &'a RecencyOrder,
    cursor: Link,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let Link::Slot(slot) = self.cursor else {
            return None;
        };
        self.cursor = self.order.nodes[slot].next;
        Some(slot)
    }
}
