//! Bounded FIFO nonce cache for replay detection.
//!
//! Message ids double as nonces. The relay sees one shared stream, so
//! ids are tracked globally rather than per sender.
//!
//! Implementation: `HashSet` for O(1) lookup + `VecDeque` for FIFO
//! eviction ordering. When the cache reaches capacity, the oldest
//! entry is evicted before inserting the new one.

use std::collections::{HashSet, VecDeque};

use lanchat_types::{LanChatError, Result};

/// Default maximum number of ids remembered.
pub const DEFAULT_NONCE_CACHE_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// NonceCache
// ---------------------------------------------------------------------------

/// Bounded FIFO cache of recently accepted message ids.
///
/// Once an id has been inserted, inserting it again fails with
/// [`LanChatError::ValidationFailure`] until it has been evicted.
/// Eviction is strictly oldest-first.
pub struct NonceCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl NonceCache {
    /// Creates a cache holding at most `capacity` ids.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(cap),
            order: VecDeque::with_capacity(cap),
            capacity: cap,
        }
    }

    /// Creates a cache with [`DEFAULT_NONCE_CACHE_SIZE`].
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_NONCE_CACHE_SIZE)
    }

    /// Records `id` if unseen.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::ValidationFailure`] if `id` is already
    /// in the cache.
    pub fn check_and_insert(&mut self, id: &str) -> Result<()> {
        if self.seen.contains(id) {
            return Err(LanChatError::ValidationFailure {
                reason: format!("message id {id} already seen (replay)"),
            });
        }

        if self.seen.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(id.to_owned());
        self.order.push_back(id.to_owned());
        Ok(())
    }

    /// Returns `true` if `id` is currently remembered.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns the number of remembered ids.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no ids are remembered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_new_id_succeeds() -> std::result::Result<(), LanChatError> {
        let mut cache = NonceCache::new(100);
        cache.check_and_insert("msg-1")?;
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("msg-1"));
        Ok(())
    }

    #[test]
    fn duplicate_id_rejected() -> std::result::Result<(), LanChatError> {
        let mut cache = NonceCache::new(100);
        cache.check_and_insert("msg-1")?;
        assert!(matches!(
            cache.check_and_insert("msg-1"),
            Err(LanChatError::ValidationFailure { .. })
        ));
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn eviction_is_oldest_first() -> std::result::Result<(), LanChatError> {
        let mut cache = NonceCache::new(3);
        cache.check_and_insert("a")?;
        cache.check_and_insert("b")?;
        cache.check_and_insert("c")?;

        // Full. Inserting "d" evicts "a" and only "a".
        cache.check_and_insert("d")?;
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        cache.check_and_insert("a")?;
        assert!(cache.check_and_insert("c").is_err());
        Ok(())
    }

    #[test]
    fn size_never_exceeds_capacity() -> std::result::Result<(), LanChatError> {
        let mut cache = NonceCache::with_default_capacity();
        for i in 0..2500 {
            cache.check_and_insert(&format!("id-{i}"))?;
        }
        assert_eq!(cache.len(), DEFAULT_NONCE_CACHE_SIZE);
        // The last 1000 are retained exactly.
        assert!(cache.contains("id-1500"));
        assert!(!cache.contains("id-1499"));
        Ok(())
    }

    #[test]
    fn zero_capacity_treated_as_one() -> std::result::Result<(), LanChatError> {
        let mut cache = NonceCache::new(0);
        cache.check_and_insert("a")?;
        cache.check_and_insert("b")?;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 1);
        Ok(())
    }
}
