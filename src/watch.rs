use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::addr::WeakAddr;
use crate::dependencies::Dependencies;
use crate::evaluation::Enclosing;
use crate::{Evaluation, Key, Reactive, Runtime, Source, Subscriber, Value};

type Func<T> = Box<dyn Fn(&Evaluation) -> T>;
type After<T> = Box<dyn Fn(T) -> T>;

/// A reactive computation. It evaluates once when created and again, in
/// the next flush pass, whenever anything it read last time changes.
pub struct Watch<T: 'static> {
	body: Rc<WatchBody<T>>,
}

impl<T: 'static> Clone for Watch<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub struct WatchBody<T: 'static> {
	runtime: Runtime,
	scheduled: Cell<bool>,
	runs: Cell<usize>,
	value: RefCell<Option<T>>,
	observers: RefCell<BTreeSet<WeakAddr<dyn Subscriber>>>,
	inner: RefCell<WatchInner<T>>,
}

struct WatchInner<T: 'static> {
	name: &'static str,
	func: Func<T>,
	after: Option<After<T>>,
	dependencies: Dependencies,
	/// Evaluations this watch was created in. Its reads count for them too
	/// while they are running.
	enclosing: Enclosing,
	this: Weak<WatchBody<T>>,
}

impl<T: 'static> Drop for WatchInner<T> {
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Subscriber>;
		self.dependencies.drop(&this)
	}
}

impl<T: 'static> Watch<T> {
	pub fn new(runtime: &Runtime, func: impl Fn(&Evaluation) -> T + 'static) -> Self {
		Self::build(runtime, "<unnamed>", Box::new(func), None, Enclosing::new())
	}

	pub fn new_with_name(
		runtime: &Runtime,
		name: &'static str,
		func: impl Fn(&Evaluation) -> T + 'static,
	) -> Self {
		Self::build(runtime, name, Box::new(func), None, Enclosing::new())
	}

	/// A watch whose every result passes through `after` before it is
	/// stored. `after` runs outside the tracking context.
	pub fn with_after(
		runtime: &Runtime,
		func: impl Fn(&Evaluation) -> T + 'static,
		after: impl Fn(T) -> T + 'static,
	) -> Self {
		Self::build(
			runtime,
			"<unnamed>",
			Box::new(func),
			Some(Box::new(after)),
			Enclosing::new(),
		)
	}

	/// A watch created during the evaluation `cx`. Whatever it reads while
	/// `cx` is still running is attributed to `cx` as well, so the enclosing
	/// computation re-runs when the inner one's inputs change.
	pub fn within(
		cx: &Evaluation,
		runtime: &Runtime,
		func: impl Fn(&Evaluation) -> T + 'static,
	) -> Self {
		Self::build(runtime, "<unnamed>", Box::new(func), None, cx.enclosing())
	}

	fn build(
		runtime: &Runtime,
		name: &'static str,
		func: Func<T>,
		after: Option<After<T>>,
		enclosing: Enclosing,
	) -> Self {
		let body = Rc::new_cyclic(|this| WatchBody {
			runtime: runtime.clone(),
			scheduled: Cell::new(false),
			runs: Cell::new(0),
			value: RefCell::new(None),
			observers: RefCell::new(BTreeSet::new()),
			inner: RefCell::new(WatchInner {
				name,
				func,
				after,
				dependencies: Dependencies::new(),
				enclosing,
				this: this.clone(),
			}),
		});

		body.evaluate();
		Watch { body }
	}

	/// Tracked read: the surrounding evaluation re-runs whenever this watch
	/// produces a new value.
	pub fn get(&self, cx: &impl AsRef<Evaluation>) -> T
	where
		T: Clone,
	{
		cx.as_ref().based_on(self.body.clone(), &Key::Changed);
		self.get_once()
	}

	pub fn get_once(&self) -> T
	where
		T: Clone,
	{
		self.with(T::clone)
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		let value = self.body.value.borrow();
		match &*value {
			Some(value) => func(value),
			None => panic!("watch `{}` read during its first evaluation", self.name()),
		}
	}

	/// How many times the expression has been evaluated.
	pub fn runs(&self) -> usize {
		self.body.runs.get()
	}

	pub fn is_scheduled(&self) -> bool {
		self.body.scheduled.get()
	}

	pub fn name(&self) -> &'static str {
		self.body.inner.borrow().name
	}

	/// Number of `(source, key)` pairs the last evaluation read.
	pub fn dependencies(&self) -> usize {
		self.body.inner.borrow().dependencies.len()
	}

	/// The change signal of this watch as a dependency source.
	pub fn source(&self) -> Rc<dyn Source> {
		self.body.clone()
	}
}

impl<T: 'static> WatchBody<T> {
	fn evaluate(self: &Rc<Self>) {
		let (value, evaluation) = {
			let inner = self.inner.borrow();
			let evaluation = Evaluation::within(&inner.enclosing);
			((inner.func)(&evaluation), evaluation)
		};

		let this = Rc::downgrade(self) as Weak<dyn Subscriber>;
		self.inner
			.borrow_mut()
			.dependencies
			.swap(evaluation.take(), &this);

		let value = {
			let inner = self.inner.borrow();
			match &inner.after {
				Some(after) => after(value),
				None => value,
			}
		};

		*self.value.borrow_mut() = Some(value);

		let runs = self.runs.get() + 1;
		self.runs.set(runs);
		tracing::trace!(name = self.inner.borrow().name, runs, "watch evaluated");

		if runs > 1 {
			self.changed();
		}
	}

	fn changed(&self) {
		let observers: Vec<Rc<dyn Subscriber>> = self
			.observers
			.borrow()
			.iter()
			.filter_map(|observer| observer.upgrade())
			.collect();

		for observer in observers {
			observer.notify(&Key::Changed, &Value::Null, &Value::Null);
		}
	}
}

impl<T: 'static> Reactive for WatchBody<T> {
	fn update(self: Rc<Self>) {
		self.scheduled.set(false);
		self.evaluate();
	}
}

impl<T: 'static> Subscriber for WatchBody<T> {
	fn notify(self: Rc<Self>, _: &Key, _: &Value, _: &Value) {
		if self.scheduled.replace(true) {
			return;
		}

		let this = Rc::downgrade(&self) as Weak<dyn Reactive>;
		self.runtime.schedule(this);
	}
}

impl<T: 'static> Source for WatchBody<T> {
	fn used_by(&self, _: &Key, subscriber: Weak<dyn Subscriber>) {
		self.observers.borrow_mut().insert(WeakAddr::new(subscriber));
	}

	fn not_used_by(&self, _: &Key, subscriber: &Weak<dyn Subscriber>) {
		self.observers
			.borrow_mut()
			.remove(&WeakAddr::new(subscriber.clone()));
	}
}

impl<T: 'static> std::fmt::Debug for Watch<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Watch")
			.field("name", &self.name())
			.field("runs", &self.runs())
			.finish()
	}
}
