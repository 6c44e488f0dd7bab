//! Hash-partitioned maps so unrelated keys never contend on one lock.

// self
use crate::_prelude::*;

pub(crate) const DEFAULT_SHARDS: usize = 16;

/// Fixed set of independently locked `HashMap` partitions.
pub(crate) struct Shards<K, V> {
	shards: Box<[RwLock<HashMap<K, V>>]>,
}
impl<K, V> Shards<K, V>
where
	K: Eq + Hash,
{
	pub(crate) fn new(count: usize) -> Self {
		Self { shards: (0..count.max(1)).map(|_| RwLock::new(HashMap::new())).collect() }
	}

	pub(crate) fn index<Q>(&self, key: &Q) -> usize
	where
		Q: ?Sized + Hash,
	{
		let mut hasher = DefaultHasher::new();

		key.hash(&mut hasher);

		(hasher.finish() % self.shards.len() as u64) as usize
	}

	pub(crate) fn shard<Q>(&self, key: &Q) -> &RwLock<HashMap<K, V>>
	where
		Q: ?Sized + Hash,
	{
		&self.shards[self.index(key)]
	}

	pub(crate) fn at(&self, index: usize) -> &RwLock<HashMap<K, V>> {
		&self.shards[index]
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = &RwLock<HashMap<K, V>>> {
		self.shards.iter()
	}

	pub(crate) fn len(&self) -> usize {
		self.shards.iter().map(|shard| shard.read().len()).sum()
	}
}
impl<K, V> Default for Shards<K, V>
where
	K: Eq + Hash,
{
	fn default() -> Self {
		Self::new(DEFAULT_SHARDS)
	}
}
impl<K, V> Debug for Shards<K, V> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Shards").field("count", &self.shards.len()).finish()
	}
}
