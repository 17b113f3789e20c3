use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::addr::RcAddr;
use crate::{Key, Source, Subscriber};

type Keys = SmallVec<[Key; 4]>;

/// The `(source, key)` pairs one evaluation read.
#[derive(Default)]
pub struct Dependencies {
	based_on: BTreeMap<RcAddr<dyn Source>, Keys>,
}

impl Dependencies {
	pub fn new() -> Self {
		Self {
			based_on: BTreeMap::new(),
		}
	}

	pub(crate) fn based_on(&mut self, source: Rc<dyn Source>, key: &Key) {
		let keys = self.based_on.entry(RcAddr::new(source)).or_default();
		if !keys.contains(key) {
			keys.push(key.clone());
		}
	}

	/// Whether `key` of `source` was read.
	pub fn contains(&self, source: &Rc<dyn Source>, key: &Key) -> bool {
		self.based_on
			.get(&RcAddr::new(source.clone()))
			.map_or(false, |keys| keys.contains(key))
	}

	/// Keys of `source` that were read, in read order.
	pub fn keys_of(&self, source: &Rc<dyn Source>) -> Vec<Key> {
		self.based_on
			.get(&RcAddr::new(source.clone()))
			.map(|keys| keys.to_vec())
			.unwrap_or_default()
	}

	/// Number of distinct `(source, key)` pairs.
	pub fn len(&self) -> usize {
		self.based_on.values().map(|keys| keys.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.based_on.is_empty()
	}

	pub fn sources(&self) -> usize {
		self.based_on.len()
	}

	/// Unsubscribes `parent` from everything it read.
	pub fn drop(&mut self, parent: &Weak<dyn Subscriber>) {
		for (source, keys) in &self.based_on {
			for key in keys {
				source.not_used_by(key, parent)
			}
		}
	}

	/// Replaces the stored set with `next`, unsubscribing `parent` from the
	/// keys it no longer reads and subscribing it to the new ones. Both lists
	/// are computed before either is applied.
	pub fn swap(&mut self, next: Dependencies, parent: &Weak<dyn Subscriber>) {
		let prev = std::mem::replace(&mut self.based_on, next.based_on);

		let removed: Vec<(RcAddr<dyn Source>, Key)> = prev
			.iter()
			.flat_map(|(source, keys)| {
				let current = self.based_on.get(source);
				keys.iter()
					.filter(move |key| !current.map_or(false, |keys| keys.contains(key)))
					.map(move |key| (source.clone(), key.clone()))
			})
			.collect();

		let added: Vec<(RcAddr<dyn Source>, Key)> = self
			.based_on
			.iter()
			.flat_map(|(source, keys)| {
				let before = prev.get(source);
				keys.iter()
					.filter(move |key| !before.map_or(false, |keys| keys.contains(key)))
					.map(move |key| (source.clone(), key.clone()))
			})
			.collect();

		tracing::trace!(
			removed = removed.len(),
			added = added.len(),
			"dependencies swapped"
		);

		for (source, key) in removed {
			source.not_used_by(&key, parent);
		}

		for (source, key) in added {
			source.used_by(&key, parent.clone());
		}
	}
}
