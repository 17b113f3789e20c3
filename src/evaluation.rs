use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::dependencies::Dependencies;
use crate::{Key, Source};

type Collector = Rc<RefCell<Dependencies>>;

/// The collectors of an evaluation, held without keeping it alive.
pub(crate) type Enclosing = SmallVec<[Weak<RefCell<Dependencies>>; 2]>;

/// A tracking context. Every read routed through it is recorded here and in
/// every enclosing evaluation that is still alive.
pub struct Evaluation {
	dependencies: Collector,
	enclosing: SmallVec<[Collector; 2]>,
}

impl AsRef<Evaluation> for Evaluation {
	fn as_ref(&self) -> &Evaluation {
		self
	}
}

impl Default for Evaluation {
	fn default() -> Self {
		Self::new()
	}
}

impl Evaluation {
	pub fn new() -> Self {
		Evaluation {
			dependencies: Rc::new(RefCell::new(Dependencies::new())),
			enclosing: SmallVec::new_const(),
		}
	}

	/// A context nested in this one. Reads made through it are attributed to
	/// both.
	pub fn nested(&self) -> Evaluation {
		let mut enclosing = self.enclosing.clone();
		enclosing.push(self.dependencies.clone());
		Evaluation {
			dependencies: Rc::new(RefCell::new(Dependencies::new())),
			enclosing,
		}
	}

	/// A root context nested in whichever of `enclosing` are still alive.
	pub(crate) fn within(enclosing: &Enclosing) -> Evaluation {
		Evaluation {
			dependencies: Rc::new(RefCell::new(Dependencies::new())),
			enclosing: enclosing.iter().filter_map(Weak::upgrade).collect(),
		}
	}

	/// This context and its enclosing ones, weakly.
	pub(crate) fn enclosing(&self) -> Enclosing {
		self.enclosing
			.iter()
			.chain(std::iter::once(&self.dependencies))
			.map(Rc::downgrade)
			.collect()
	}

	/// Depth of enclosing contexts.
	pub fn depth(&self) -> usize {
		self.enclosing.len()
	}

	pub(crate) fn based_on(&self, source: Rc<dyn Source>, key: &Key) {
		for collector in &self.enclosing {
			collector.borrow_mut().based_on(source.clone(), key);
		}
		self.dependencies.borrow_mut().based_on(source, key);
	}

	/// Runs `func` in a context nested in this one.
	pub fn run_tracked<T>(&self, func: impl FnOnce(&Evaluation) -> T) -> (T, Dependencies) {
		let evaluation = self.nested();
		let value = func(&evaluation);
		(value, evaluation.take())
	}

	pub fn take(self) -> Dependencies {
		std::mem::take(&mut *self.dependencies.borrow_mut())
	}
}

/// Runs `func` in a fresh root context and returns what it read.
pub fn run_tracked<T>(func: impl FnOnce(&Evaluation) -> T) -> (T, Dependencies) {
	let evaluation = Evaluation::new();
	let value = func(&evaluation);
	(value, evaluation.take())
}
