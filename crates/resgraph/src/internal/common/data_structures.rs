use fxhash::FxBuildHasher;

/// Hash map used throughout the crate. Iteration order is unspecified, so anything that
/// has to be deterministic (scoring, commit order) keeps its own ordered structure.
pub type Map<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

pub type Set<T> = hashbrown::HashSet<T, FxBuildHasher>;
