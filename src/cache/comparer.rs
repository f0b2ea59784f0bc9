//! Key Comparison Strategies
//!
//! A cache indexes entries by a canonical form of each key, so two keys
//! that canonicalize to the same value address the same entry.

// == Key Comparer ==
/// Maps a key to the form used for index lookups.
pub trait KeyComparer<K>: Send + Sync {
    fn canonicalize(&self, key: &K) -> K;
}

impl<K, F> KeyComparer<K> for F
where
    F: Fn(&K) -> K + Send + Sync,
{
    fn canonicalize(&self, key: &K) -> K {
        self(key)
    }
}

/// Keys compare by their own `Eq`/`Hash`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKeys;

impl<K: Clone> KeyComparer<K> for ExactKeys {
    fn canonicalize(&self, key: &K) -> K {
        key.clone()
    }
}

/// String keys compare ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl KeyComparer<String> for CaseInsensitive {
    fn canonicalize(&self, key: &String) -> String {
        key.to_lowercase()
    }
}
