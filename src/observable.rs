use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::addr::{RcAddr, WeakAddr};
use crate::value::Record;
use crate::{Evaluation, Key, Runtime, Source, Subscriber, Value};

/// Largest list length, as in JavaScript arrays.
const MAX_LENGTH: usize = u32::MAX as usize;

/// How far past the end a single write may pad a list with nulls.
const MAX_GAP: usize = 1 << 16;

/// A wrapped record or list. Reads go through [`Observable::get`] and are
/// tracked; writes go through [`Observable::set`] and the list operations,
/// and notify exactly the subscribers of the keys that changed.
///
/// An observable has at most one parent. Assigning an observable into a new
/// slot moves it: its parent link is re-pointed to the new slot.
#[derive(Clone)]
pub struct Observable {
	body: Rc<ObservableBody>,
}

pub struct ObservableBody {
	runtime: Runtime,
	data: RefCell<Data>,
	inner: RefCell<ObservableInner>,
}

#[derive(Debug)]
enum Data {
	Record(Record),
	List(Vec<Value>),
}

#[derive(Default)]
struct ObservableInner {
	observers: FxHashMap<Key, BTreeSet<WeakAddr<dyn Subscriber>>>,
	reverse: BTreeMap<WeakAddr<dyn Subscriber>, SmallVec<[Key; 4]>>,
	parent: Option<(Key, Weak<ObservableBody>)>,
}

impl PartialEq for Observable {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}
}

impl std::fmt::Debug for Observable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Observable")
			.field(&*self.body.data.borrow())
			.finish()
	}
}

impl Observable {
	/// Wraps records and lists recursively; every other value, including an
	/// existing observable, is returned as is.
	pub fn wrap(runtime: &Runtime, value: Value) -> Value {
		match value {
			Value::Record(record) => Value::Object(Self::wrap_record(runtime, record)),
			Value::List(list) => Value::Object(Self::wrap_list(runtime, list)),
			other => other,
		}
	}

	pub(crate) fn wrap_record(runtime: &Runtime, record: Record) -> Observable {
		let record = record
			.into_iter()
			.map(|(key, value)| (key, Self::wrap(runtime, value)))
			.collect();
		Self::from_data(runtime, Data::Record(record))
	}

	pub(crate) fn wrap_list(runtime: &Runtime, list: Vec<Value>) -> Observable {
		let list = list
			.into_iter()
			.map(|value| Self::wrap(runtime, value))
			.collect();
		Self::from_data(runtime, Data::List(list))
	}

	fn from_data(runtime: &Runtime, data: Data) -> Observable {
		let body = Rc::new(ObservableBody {
			runtime: runtime.clone(),
			data: RefCell::new(data),
			inner: RefCell::new(ObservableInner::default()),
		});
		body.adopt_children();
		Observable { body }
	}

	pub fn runtime(&self) -> &Runtime {
		&self.body.runtime
	}

	pub fn ptr_eq(&self, other: &Observable) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	pub fn is_list(&self) -> bool {
		matches!(&*self.body.data.borrow(), Data::List(_))
	}

	/// This observable as a dependency source.
	pub fn source(&self) -> Rc<dyn Source> {
		self.body.clone()
	}

	/// Tracked read.
	pub fn get(&self, cx: &Evaluation, key: impl Into<Key>) -> Value {
		let key = key.into();
		let value = self.body.read(&key);
		cx.based_on(self.body.clone(), &key);
		value
	}

	/// Untracked read.
	pub fn get_once(&self, key: impl Into<Key>) -> Value {
		self.body.read(&key.into())
	}

	/// Tracked length: list length or number of record properties.
	pub fn len(&self, cx: &Evaluation) -> usize {
		cx.based_on(self.body.clone(), &Key::length());
		self.len_once()
	}

	pub fn len_once(&self) -> usize {
		match &*self.body.data.borrow() {
			Data::Record(record) => record.len(),
			Data::List(list) => list.len(),
		}
	}

	pub fn is_empty_once(&self) -> bool {
		self.len_once() == 0
	}

	/// Tracked read of every list element.
	pub fn items(&self, cx: &Evaluation) -> Vec<Value> {
		(0..self.len(cx)).map(|index| self.get(cx, index)).collect()
	}

	/// Tracked read of the record's property names.
	pub fn keys(&self, cx: &Evaluation) -> Vec<Rc<str>> {
		cx.based_on(self.body.clone(), &Key::length());
		match &*self.body.data.borrow() {
			Data::Record(record) => record.keys().cloned().collect(),
			Data::List(_) => Vec::new(),
		}
	}

	pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
		let key = key.into();
		let value = value.into();
		self.body
			.runtime
			.clone()
			.batch(|| self.body.assign(key, value));
	}

	/// Applies `func` to the current value of `key` and stores the result.
	pub fn update(&self, key: impl Into<Key>, func: impl FnOnce(Value) -> Value) {
		let key = key.into();
		let value = func(self.body.read(&key));
		self.set(key, value);
	}

	/// Deletes a record property or a list element.
	pub fn remove(&self, key: impl Into<Key>) -> Value {
		let key = key.into();
		match key {
			Key::Index(index) => self.remove_at(index).unwrap_or_default(),
			key => self
				.body
				.runtime
				.clone()
				.batch(|| self.body.delete(&key)),
		}
	}

	pub fn push(&self, value: impl Into<Value>) -> usize {
		let value = self.wrap_value(value.into());
		self.body
			.mutate_list(|list| {
				list.push(value);
				list.len()
			})
			.unwrap_or_default()
	}

	pub fn pop(&self) -> Option<Value> {
		self.body.mutate_list(|list| list.pop()).flatten()
	}

	pub fn insert(&self, index: usize, value: impl Into<Value>) {
		let value = self.wrap_value(value.into());
		self.body.mutate_list(|list| {
			let index = index.min(list.len());
			list.insert(index, value);
		});
	}

	pub fn remove_at(&self, index: usize) -> Option<Value> {
		self.body
			.mutate_list(|list| (index < list.len()).then(|| list.remove(index)))
			.flatten()
	}

	/// Removes `delete` elements starting at `start` and inserts `items` in
	/// their place. Returns the removed elements.
	pub fn splice<V: Into<Value>>(
		&self,
		start: usize,
		delete: usize,
		items: impl IntoIterator<Item = V>,
	) -> Vec<Value> {
		let items: Vec<Value> = items
			.into_iter()
			.map(|value| self.wrap_value(value.into()))
			.collect();

		self.body
			.mutate_list(|list| {
				let start = start.min(list.len());
				let end = start.saturating_add(delete).min(list.len());
				list.splice(start..end, items).collect()
			})
			.unwrap_or_default()
	}

	pub fn swap(&self, a: usize, b: usize) {
		self.body.mutate_list(|list| {
			if a < list.len() && b < list.len() {
				list.swap(a, b)
			}
		});
	}

	pub fn reverse(&self) {
		self.body.mutate_list(|list| list.reverse());
	}

	pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
		self.body.mutate_list(|list| list.sort_by(compare));
	}

	pub fn retain(&self, keep: impl FnMut(&Value) -> bool) {
		self.body.mutate_list(|list| list.retain(keep));
	}

	pub fn truncate(&self, len: usize) {
		self.body.mutate_list(|list| list.truncate(len));
	}

	pub fn clear(&self) {
		self.body.mutate_list(|list| list.clear());
	}

	/// Subscribes `subscriber` to `key`. The observable only keeps a weak
	/// reference; the caller keeps the subscriber alive.
	pub fn subscribe<S: Subscriber>(&self, key: impl Into<Key>, subscriber: &Rc<S>) {
		let weak = Rc::downgrade(subscriber) as Weak<dyn Subscriber>;
		self.body.used_by(&key.into(), weak);
	}

	pub fn unsubscribe<S: Subscriber>(&self, key: impl Into<Key>, subscriber: &Rc<S>) {
		let weak = Rc::downgrade(subscriber) as Weak<dyn Subscriber>;
		self.body.not_used_by(&key.into(), &weak);
	}

	/// Removes every subscription of `subscriber` using the reverse map.
	pub fn unsubscribe_all<S: Subscriber>(&self, subscriber: &Rc<S>) {
		let weak = Rc::downgrade(subscriber) as Weak<dyn Subscriber>;
		let keys = self
			.body
			.inner
			.borrow()
			.reverse
			.get(&WeakAddr::new(weak.clone()))
			.cloned()
			.unwrap_or_default();

		for key in keys {
			self.body.not_used_by(&key, &weak);
		}
	}

	/// Notifies the subscribers of `key` and bubbles to the parent, without
	/// touching the data.
	pub fn emit(&self, key: impl Into<Key>, new: &Value, old: &Value) {
		let key = key.into();
		self.body
			.runtime
			.clone()
			.batch(|| self.body.emit(&key, new, old));
	}

	/// Number of live subscribers of `key`.
	pub fn subscribers(&self, key: impl Into<Key>) -> usize {
		self.body
			.inner
			.borrow()
			.observers
			.get(&key.into())
			.map_or(0, |set| set.iter().filter(|s| s.strong_count() > 0).count())
	}

	pub fn parent(&self) -> Option<(Key, Observable)> {
		let inner = self.body.inner.borrow();
		let (key, parent) = inner.parent.as_ref()?;
		Some((key.clone(), Observable { body: parent.upgrade()? }))
	}

	/// Deep plain snapshot.
	pub fn to_value(&self) -> Value {
		match &*self.body.data.borrow() {
			Data::Record(record) => Value::Record(
				record
					.iter()
					.map(|(key, value)| (key.clone(), value.to_plain()))
					.collect(),
			),
			Data::List(list) => Value::List(list.iter().map(Value::to_plain).collect()),
		}
	}

	fn wrap_value(&self, value: Value) -> Value {
		Self::wrap(&self.body.runtime, value)
	}
}

impl ObservableBody {
	fn adopt_children(self: &Rc<Self>) {
		let children: Vec<(Key, Observable)> = match &*self.data.borrow() {
			Data::Record(record) => record
				.iter()
				.filter_map(|(key, value)| {
					let child = value.as_observable()?;
					Some((Key::Name(key.clone()), child.clone()))
				})
				.collect(),
			Data::List(list) => list
				.iter()
				.enumerate()
				.filter_map(|(index, value)| {
					let child = value.as_observable()?;
					Some((Key::Index(index), child.clone()))
				})
				.collect(),
		};

		for (key, child) in children {
			child.body.set_parent(key, Rc::downgrade(self));
		}
	}

	fn set_parent(&self, key: Key, parent: Weak<ObservableBody>) {
		self.inner.borrow_mut().parent = Some((key, parent));
	}

	/// Drops the parent link if it still points at `key` of `parent`.
	/// Returns whether it did; a child that moved elsewhere keeps its link.
	fn clear_parent(&self, key: &Key, parent: &Rc<ObservableBody>) -> bool {
		let mut inner = self.inner.borrow_mut();
		let points_here = inner.parent.as_ref().map_or(false, |(current_key, current)| {
			current_key == key && Weak::as_ptr(current) == Rc::as_ptr(parent)
		});
		if points_here {
			inner.parent = None;
		}
		points_here
	}

	fn read(&self, key: &Key) -> Value {
		match (&*self.data.borrow(), key) {
			(Data::Record(record), Key::Name(name)) => {
				record.get(name).cloned().unwrap_or_default()
			}
			(Data::List(list), Key::Index(index)) => list.get(*index).cloned().unwrap_or_default(),
			(Data::List(list), key) if key.is_length() => Value::from(list.len()),
			_ => Value::Null,
		}
	}

	fn same_shape(&self, value: &Value) -> bool {
		matches!(
			(&*self.data.borrow(), value),
			(Data::Record(_), Value::Record(_)) | (Data::List(_), Value::List(_))
		)
	}

	fn assign(self: &Rc<Self>, key: Key, value: Value) {
		let old = self.read(&key);

		if let Value::Object(current) = &old {
			if value.is_plain_object() && current.body.same_shape(&value) {
				current.body.transfer(value);
				return;
			}
		}

		let is_list = matches!(&*self.data.borrow(), Data::List(_));
		if is_list {
			match &key {
				Key::Index(index) if *index < self.len() => {}
				Key::Index(index) => {
					let index = *index;
					if !self.can_grow_to(index.saturating_add(1)) {
						tracing::warn!(%key, len = self.len(), "ignored list write far past the end");
						return;
					}
					let value = Observable::wrap(&self.runtime, value);
					self.mutate_list(|list| {
						list.resize(index, Value::Null);
						list.push(value);
					});
					return;
				}
				_ if key.is_length() => {
					let requested = value.as_f64().unwrap_or(0.0).max(0.0);
					if requested > MAX_LENGTH as f64 || !self.can_grow_to(requested as usize) {
						tracing::warn!(requested, len = self.len(), "ignored invalid list length");
						return;
					}
					let len = requested as usize;
					self.mutate_list(|list| list.resize(len, Value::Null));
					return;
				}
				_ => {
					tracing::warn!(%key, "ignored write of a named property on a list");
					return;
				}
			}
		} else if !matches!(key, Key::Name(_)) {
			tracing::warn!(%key, "ignored write of a non-name key on a record");
			return;
		}

		let new = Observable::wrap(&self.runtime, value);
		if let Value::Object(child) = &new {
			child.body.set_parent(key.clone(), Rc::downgrade(self));
		}

		let inserted = self.write(&key, new.clone());

		if old == new {
			return;
		}

		self.emit(&key, &new, &old);

		if inserted {
			let len = Value::from(self.len());
			self.notify(&Key::length(), &len, &Value::Null);
		}

		if let Value::Object(outgoing) = &old {
			if outgoing.body.clear_parent(&key, self) {
				outgoing.body.vacate();
			}
		}
	}

	/// Stores `value` under `key`; returns whether the key is new.
	fn write(&self, key: &Key, value: Value) -> bool {
		match (&mut *self.data.borrow_mut(), key) {
			(Data::Record(record), Key::Name(name)) => record.insert(name.clone(), value).is_none(),
			(Data::List(list), Key::Index(index)) => {
				if let Some(slot) = list.get_mut(*index) {
					*slot = value;
				}
				false
			}
			_ => false,
		}
	}

	/// Whether a list may be padded out to `len` elements.
	fn can_grow_to(&self, len: usize) -> bool {
		len <= MAX_LENGTH && len <= self.len().saturating_add(MAX_GAP)
	}

	fn len(&self) -> usize {
		match &*self.data.borrow() {
			Data::Record(record) => record.len(),
			Data::List(list) => list.len(),
		}
	}

	/// Moves the contents of the plain `value` into this observable, which
	/// keeps its identity, its subscribers and its parent link.
	fn transfer(self: &Rc<Self>, value: Value) {
		match value {
			Value::Record(record) => {
				let stale: Vec<Rc<str>> = match &*self.data.borrow() {
					Data::Record(current) => current
						.keys()
						.filter(|key| !record.contains_key(*key))
						.cloned()
						.collect(),
					Data::List(_) => Vec::new(),
				};

				for (key, value) in record {
					self.assign(Key::Name(key), value);
				}

				for key in stale {
					self.delete(&Key::Name(key));
				}
			}
			Value::List(list) => {
				let shared = list.len().min(self.len());
				let mut list = list.into_iter();

				for index in 0..shared {
					if let Some(value) = list.next() {
						self.assign(Key::Index(index), value);
					}
				}

				let rest: Vec<Value> = list
					.map(|value| Observable::wrap(&self.runtime, value))
					.collect();

				self.mutate_list(|current| {
					current.truncate(shared);
					current.extend(rest);
				});
			}
			_ => {}
		}
	}

	fn delete(self: &Rc<Self>, key: &Key) -> Value {
		let old = match (&mut *self.data.borrow_mut(), key) {
			(Data::Record(record), Key::Name(name)) => record.shift_remove(name),
			_ => None,
		};

		let Some(old) = old else {
			return Value::Null;
		};

		self.notify(key, &Value::Null, &old);
		let len = Value::from(self.len());
		self.notify(&Key::length(), &len, &Value::Null);
		self.bubble();

		if let Value::Object(outgoing) = &old {
			if outgoing.body.clear_parent(key, self) {
				outgoing.body.vacate();
			}
		}

		old
	}

	/// Applies a physical mutation to the list, then runs one notification
	/// pass over the indices whose value changed, `length` if it changed,
	/// and the parent once. Records are left untouched.
	fn mutate_list<R>(self: &Rc<Self>, op: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
		self.runtime.clone().batch(|| {
			let before = match &*self.data.borrow() {
				Data::List(list) => list.clone(),
				Data::Record(_) => {
					tracing::warn!("list operation on a record observable");
					return None;
				}
			};

			// `op` may read this observable, so it works on a detached copy.
			let mut after = before.clone();
			let result = op(&mut after);
			if let Data::List(list) = &mut *self.data.borrow_mut() {
				*list = after.clone();
			}

			for (index, value) in after.iter().enumerate() {
				if let Value::Object(child) = value {
					child.body.set_parent(Key::Index(index), Rc::downgrade(self));
				}
			}

			let kept: BTreeSet<RcAddr<ObservableBody>> = after
				.iter()
				.filter_map(Value::as_observable)
				.map(|child| RcAddr::new(child.body.clone()))
				.collect();

			for (index, value) in before.iter().enumerate() {
				let Some(removed) = value.as_observable() else {
					continue;
				};
				if !kept.contains(&RcAddr::new(removed.body.clone())) {
					removed.body.clear_parent(&Key::Index(index), self);
				}
			}

			let mut notified = 0;
			for index in 0..before.len().max(after.len()) {
				let old = before.get(index).cloned().unwrap_or_default();
				let new = after.get(index).cloned().unwrap_or_default();
				if old != new {
					notified += 1;
					self.notify(&Key::Index(index), &new, &old);
				}
			}

			if before.len() != after.len() {
				self.notify(
					&Key::length(),
					&Value::from(after.len()),
					&Value::from(before.len()),
				);
			}

			tracing::trace!(
				before = before.len(),
				after = after.len(),
				notified,
				"list mutated"
			);

			self.bubble();
			Some(result)
		})
	}

	fn subscribers_of(&self, key: &Key) -> Vec<Rc<dyn Subscriber>> {
		self.inner
			.borrow()
			.observers
			.get(key)
			.map(|set| set.iter().filter_map(|s| s.upgrade()).collect())
			.unwrap_or_default()
	}

	fn notify(&self, key: &Key, new: &Value, old: &Value) {
		for subscriber in self.subscribers_of(key) {
			subscriber.notify(key, new, old);
		}
	}

	fn emit(self: &Rc<Self>, key: &Key, new: &Value, old: &Value) {
		self.notify(key, new, old);
		self.bubble();
	}

	/// Notifies the parent at this observable's key. The parent repeats the
	/// step, so the notification reaches the root one level at a time.
	fn bubble(self: &Rc<Self>) {
		let parent = {
			let inner = self.inner.borrow();
			inner
				.parent
				.as_ref()
				.and_then(|(key, parent)| Some((key.clone(), parent.upgrade()?)))
		};

		if let Some((key, parent)) = parent {
			let this = Value::Object(Observable { body: self.clone() });
			parent.emit(&key, &this, &this);
		}
	}

	/// Tells every subscriber that the contents of this observable went away,
	/// after it was replaced in its slot by something else.
	fn vacate(&self) {
		let keys: Vec<Key> = self.inner.borrow().observers.keys().cloned().collect();
		for key in keys {
			let old = self.read(&key);
			self.notify(&key, &Value::Null, &old);
		}
	}
}

impl Source for ObservableBody {
	fn used_by(&self, key: &Key, subscriber: Weak<dyn Subscriber>) {
		let mut inner = self.inner.borrow_mut();
		let addr = WeakAddr::new(subscriber);
		inner
			.observers
			.entry(key.clone())
			.or_default()
			.insert(addr.clone());

		let keys = inner.reverse.entry(addr).or_default();
		if !keys.contains(key) {
			keys.push(key.clone());
		}
	}

	fn not_used_by(&self, key: &Key, subscriber: &Weak<dyn Subscriber>) {
		let mut inner = self.inner.borrow_mut();
		let addr = WeakAddr::new(subscriber.clone());

		if let Some(set) = inner.observers.get_mut(key) {
			set.remove(&addr);
			if set.is_empty() {
				inner.observers.remove(key);
			}
		}

		if let Some(keys) = inner.reverse.get_mut(&addr) {
			keys.retain(|k| k != key);
			if keys.is_empty() {
				inner.reverse.remove(&addr);
			}
		}
	}
}

/// Adapts a closure into a [`Subscriber`] for [`Observable::subscribe`].
pub struct Listener {
	func: Box<dyn Fn(&Key, &Value, &Value)>,
}

impl Listener {
	pub fn new(func: impl Fn(&Key, &Value, &Value) + 'static) -> Rc<Self> {
		Rc::new(Listener {
			func: Box::new(func),
		})
	}
}

impl Subscriber for Listener {
	fn notify(self: Rc<Self>, key: &Key, new: &Value, old: &Value) {
		(self.func)(key, new, old)
	}
}
