use crate::ldap::MessageId;
use std::sync::atomic::{AtomicI32, Ordering};

/// Hands out message IDs for one connection: increasing from 1, wrapping back
/// to 1 after `i32::MAX`, and never returning an ID that is still in use.
#[derive(Debug)]
pub struct MessageIdAllocator {
    next: AtomicI32,
}

impl Default for MessageIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(first: MessageId) -> Self {
        Self {
            next: AtomicI32::new(first.max(1)),
        }
    }

    fn next_candidate(&self) -> MessageId {
        // fetch_update only fails when the closure returns None.
        match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(if current == i32::MAX { 1 } else { current + 1 })
            }) {
            Ok(id) | Err(id) => id,
        }
    }

    /// Returns the next ID for which `in_use` is false.
    pub fn allocate(&self, in_use: impl Fn(MessageId) -> bool) -> MessageId {
        loop {
            let id = self.next_candidate();
            if !in_use(id) {
                return id;
            }
        }
    }
}
