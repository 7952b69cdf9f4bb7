use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// A weak observation handle to a key plus the hash the key produced when the
/// handle was created.
///
/// The cached hash is what the backing table indexes on. It is captured once,
/// while the referent is known to be live, and never recomputed: the referent
/// may be dropped by its external holders at any point afterwards.
pub(crate) struct WeakKey<K> {
    referent: Weak<K>,
    hash: u64,
}

impl<K> WeakKey<K> {
    pub(crate) fn new(key: &Arc<K>, hash: u64) -> Self {
        Self {
            referent: Arc::downgrade(key),
            hash,
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.referent.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<K>> {
        self.referent.upgrade()
    }
}

impl<K> Clone for WeakKey<K> {
    fn clone(&self) -> Self {
        Self {
            referent: Weak::clone(&self.referent),
            hash: self.hash,
        }
    }
}

impl<K: Eq> PartialEq for WeakKey<K> {
    /// Weak equality: unequal hashes are never equal; pointer-identical
    /// handles are trivially equal; otherwise both referents must still be
    /// live and compare equal. An expired handle is therefore equal only to
    /// itself, which is what lets a scavenge pass remove it from the table
    /// by identity.
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        if Weak::ptr_eq(&self.referent, &other.referent) {
            return true;
        }
        match (self.referent.upgrade(), other.referent.upgrade()) {
            (Some(a), Some(b)) => *a == *b,
            _ => false,
        }
    }
}

impl<K: Eq> Eq for WeakKey<K> {}

impl<K> fmt::Debug for WeakKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKey")
            .field("hash", &self.hash)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<K> Hash for WeakKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
