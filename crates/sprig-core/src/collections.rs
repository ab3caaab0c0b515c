#[cfg(feature = "std-hash")]
pub mod map {
    pub type HashMap<K, V> = std::collections::HashMap<K, V>;
    pub type HashSet<T> = std::collections::HashSet<T>;
    pub type IndexSet<T> = indexmap::IndexSet<T>;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type HashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
    pub type IndexSet<T> = indexmap::IndexSet<T, ahash::RandomState>;
}
