//! Fx-hashed collections for the short string keys the analyzer is full of.

pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

pub type FxHashSet<K> = rustc_hash::FxHashSet<K>;

#[inline]
pub fn fx_hashmap_with_capacity<K, V>(capacity: usize) -> FxHashMap<K, V> {
    rustc_hash::FxHashMap::with_capacity_and_hasher(capacity, Default::default())
}
