use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::observable::Observable;
use crate::{Evaluation, Reactive, Value, Watch};

type Callback = Box<dyn FnOnce()>;

/// The single-threaded run loop: owns the pending queue of scheduled
/// watches and the after-flush callbacks.
///
/// A runtime is an explicit handle. Observables created through it, watches
/// and renderers keep a clone and route every mutation through
/// [`Runtime::batch`].
#[derive(Clone, Default)]
pub struct Runtime {
	inner: Rc<RuntimeInner>,
}

#[derive(Default)]
struct RuntimeInner {
	depth: Cell<usize>,
	flushing: Cell<bool>,
	microtask: Cell<bool>,
	passes: Cell<usize>,
	pending: RefCell<Pending>,
}

#[derive(Default)]
struct Pending {
	watches: Vec<Weak<dyn Reactive>>,
	after: Vec<Callback>,
}

struct FlushGuard<'a> {
	flushing: &'a Cell<bool>,
}

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		self.flushing.set(false);
	}
}

struct DepthGuard<'a> {
	depth: &'a Cell<usize>,
}

impl Drop for DepthGuard<'_> {
	fn drop(&mut self) {
		self.depth.set(self.depth.get() - 1);
	}
}

impl Runtime {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn in_batch(&self) -> bool {
		self.inner.depth.get() > 0
	}

	pub fn is_flushing(&self) -> bool {
		self.inner.flushing.get()
	}

	/// Number of flush passes that ran a watch or a callback so far.
	pub fn passes(&self) -> usize {
		self.inner.passes.get()
	}

	/// Number of watches waiting for the next pass.
	pub fn pending(&self) -> usize {
		self.inner.pending.borrow().watches.len()
	}

	pub fn ptr_eq(&self, other: &Runtime) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// Runs `func` as one synchronous turn. Nested batches join the
	/// outermost one, which flushes when it ends.
	pub fn batch<R>(&self, func: impl FnOnce() -> R) -> R {
		let result = {
			self.inner.depth.set(self.inner.depth.get() + 1);
			let _guard = DepthGuard {
				depth: &self.inner.depth,
			};
			func()
		};

		if !self.in_batch() && !self.is_flushing() && !self.inner.microtask.get() {
			self.flush();
		}

		result
	}

	/// Registers a callback that runs once every watch queued so far, and
	/// every watch those queue in turn, has run.
	pub fn after_flush(&self, func: impl FnOnce() + 'static) {
		self.batch(|| self.inner.pending.borrow_mut().after.push(Box::new(func)));
	}

	pub(crate) fn schedule(&self, reactive: Weak<dyn Reactive>) {
		self.inner.pending.borrow_mut().watches.push(reactive);
	}

	/// Drains the queue. Called automatically at the end of the outermost
	/// batch; calling it while a flush is running is a no-op.
	pub fn flush(&self) {
		if self.inner.flushing.replace(true) {
			return;
		}

		let _guard = FlushGuard {
			flushing: &self.inner.flushing,
		};

		let mut carried: Vec<Callback> = Vec::new();

		loop {
			let (watches, after) = {
				let mut pending = self.inner.pending.borrow_mut();
				(
					std::mem::take(&mut pending.watches),
					std::mem::take(&mut pending.after),
				)
			};

			carried.extend(after);

			if watches.is_empty() && carried.is_empty() {
				break;
			}

			let pass = self.inner.passes.get() + 1;
			self.inner.passes.set(pass);
			tracing::trace!(pass, watches = watches.len(), "flush pass");

			for watch in watches {
				if let Some(watch) = watch.upgrade() {
					watch.update();
				}
			}

			if self.pending() > 0 {
				continue;
			}

			for callback in std::mem::take(&mut carried) {
				callback();
			}
		}
	}

	/// Wraps `value`. Records and lists become observables owned by this
	/// runtime; scalars and existing observables are returned unchanged.
	pub fn wrap(&self, value: impl Into<Value>) -> Value {
		Observable::wrap(self, value.into())
	}

	/// Wraps a record or a list. Scalars produce an empty record.
	pub fn observe(&self, value: impl Into<Value>) -> Observable {
		match self.wrap(value) {
			Value::Object(observable) => observable,
			_ => Observable::wrap_record(self, Default::default()),
		}
	}

	pub fn watch<T: 'static>(&self, func: impl Fn(&Evaluation) -> T + 'static) -> Watch<T> {
		Watch::new(self, func)
	}

	/// A watch created during the evaluation `cx`; see [`Watch::within`].
	pub fn watch_within<T: 'static>(
		&self,
		cx: &Evaluation,
		func: impl Fn(&Evaluation) -> T + 'static,
	) -> Watch<T> {
		Watch::within(cx, self, func)
	}

	/// Like [`Runtime::batch`], but the flush waits for the host microtask
	/// queue instead of running when the batch ends.
	#[cfg(target_arch = "wasm32")]
	pub fn batch_microtask<R>(&self, func: impl FnOnce() -> R) -> R {
		let is_first = !self.inner.microtask.replace(true);
		let result = self.batch(func);

		if is_first {
			let runtime = self.clone();
			crate::microtask::defer(move || {
				runtime.inner.microtask.set(false);
				runtime.flush();
			});
		}

		result
	}
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Runtime")
			.field("depth", &self.inner.depth.get())
			.field("flushing", &self.inner.flushing.get())
			.field("passes", &self.inner.passes.get())
			.field("pending", &self.pending())
			.finish()
	}
}
