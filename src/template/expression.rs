use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::addr::WeakAddr;
use crate::render::Event;
use crate::template::Content;
use crate::{Evaluation, Key, Source, Subscriber, Value};

pub(crate) type ContentFn = Rc<dyn Fn(&Evaluation) -> Content>;
pub(crate) type HandlerFn = Rc<dyn Fn(&Event)>;

/// A function-valued slot of a compiled template.
#[derive(Clone)]
pub(crate) enum Function {
	Content(ContentFn),
	Handler(HandlerFn),
}

impl Function {
	fn addr(&self) -> *const () {
		match self {
			Function::Content(func) => Rc::as_ptr(func) as *const (),
			Function::Handler(func) => Rc::as_ptr(func) as *const (),
		}
	}

	pub(crate) fn ptr_eq(&self, other: &Function) -> bool {
		self.addr() == other.addr()
	}
}

/// The live descriptor of one placeholder of a rendered chunk.
///
/// It holds the function currently bound to the placeholder and acts as a
/// source: evaluations that go through [`Expression::evaluate`] re-run when
/// the descriptor is rebound to another function.
#[derive(Clone)]
pub struct Expression {
	body: Rc<ExpressionBody>,
}

pub struct ExpressionBody {
	index: usize,
	function: RefCell<Function>,
	observers: RefCell<BTreeSet<WeakAddr<dyn Subscriber>>>,
}

impl Expression {
	pub(crate) fn new(index: usize, function: Function) -> Self {
		Expression {
			body: Rc::new(ExpressionBody {
				index,
				function: RefCell::new(function),
				observers: RefCell::new(BTreeSet::new()),
			}),
		}
	}

	/// Position of the placeholder in the template.
	pub fn index(&self) -> usize {
		self.body.index
	}

	pub fn is_handler(&self) -> bool {
		matches!(&*self.body.function.borrow(), Function::Handler(_))
	}

	pub fn evaluate(&self, cx: &Evaluation) -> Content {
		cx.based_on(self.body.clone(), &Key::Changed);

		let function = self.body.function.borrow().clone();
		match function {
			Function::Content(func) => func(cx),
			Function::Handler(_) => {
				tracing::warn!(index = self.body.index, "event handler in content position");
				Content::Empty
			}
		}
	}

	/// Invokes the bound handler. Returns `false` for content expressions.
	pub fn handle(&self, event: &Event) -> bool {
		let function = self.body.function.borrow().clone();
		match function {
			Function::Handler(func) => {
				func(event);
				true
			}
			Function::Content(_) => false,
		}
	}

	/// Binds `function` to this placeholder and notifies the evaluations that
	/// read it. Binding the function that is already bound does nothing.
	pub(crate) fn rebind(&self, function: &Function) -> bool {
		if self.body.function.borrow().ptr_eq(function) {
			return false;
		}

		*self.body.function.borrow_mut() = function.clone();

		let observers: Vec<Rc<dyn Subscriber>> = self
			.body
			.observers
			.borrow()
			.iter()
			.filter_map(|observer| observer.upgrade())
			.collect();

		for observer in observers {
			observer.notify(&Key::Changed, &Value::Null, &Value::Null);
		}

		true
	}

	/// Number of live evaluations subscribed to this descriptor.
	pub fn observers(&self) -> usize {
		self.body
			.observers
			.borrow()
			.iter()
			.filter(|observer| observer.strong_count() > 0)
			.count()
	}
}

impl Source for ExpressionBody {
	fn used_by(&self, _: &Key, subscriber: Weak<dyn Subscriber>) {
		self.observers.borrow_mut().insert(WeakAddr::new(subscriber));
	}

	fn not_used_by(&self, _: &Key, subscriber: &Weak<dyn Subscriber>) {
		self.observers
			.borrow_mut()
			.remove(&WeakAddr::new(subscriber.clone()));
	}
}

impl std::fmt::Debug for Expression {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Expression")
			.field("index", &self.body.index)
			.field("handler", &self.is_handler())
			.finish()
	}
}
