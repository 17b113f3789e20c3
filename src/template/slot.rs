use std::rc::Rc;

use crate::render::Event;
use crate::template::{Content, Template};
use crate::value::format_number;
use crate::{Evaluation, Value, Watch};

/// A dynamic position of a template.
///
/// Function slots become placeholders backed by an expression descriptor.
/// Everything else is inlined into the markup when the template compiles:
/// text is escaped, nested templates are spliced part by part and lists are
/// flattened in order.
#[derive(Clone)]
pub enum Slot {
	Text(Rc<str>),
	Expr(Rc<dyn Fn(&Evaluation) -> Content>),
	Handler(Rc<dyn Fn(&Event)>),
	Template(Template),
	List(Vec<Slot>),
}

impl Slot {
	pub fn expr<C: Into<Content>>(func: impl Fn(&Evaluation) -> C + 'static) -> Self {
		Slot::Expr(Rc::new(move |cx| func(cx).into()))
	}

	pub fn handler(func: impl Fn(&Event) + 'static) -> Self {
		Slot::Handler(Rc::new(func))
	}
}

impl std::fmt::Debug for Slot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Slot::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Slot::Expr(_) => f.write_str("Expr"),
			Slot::Handler(_) => f.write_str("Handler"),
			Slot::Template(template) => f.debug_tuple("Template").field(template).finish(),
			Slot::List(slots) => f.debug_tuple("List").field(slots).finish(),
		}
	}
}

impl From<&str> for Slot {
	fn from(text: &str) -> Self {
		Slot::Text(text.into())
	}
}

impl From<String> for Slot {
	fn from(text: String) -> Self {
		Slot::Text(text.into())
	}
}

impl From<Rc<str>> for Slot {
	fn from(text: Rc<str>) -> Self {
		Slot::Text(text)
	}
}

impl From<f64> for Slot {
	fn from(number: f64) -> Self {
		Slot::Text(format_number(number).into())
	}
}

impl From<i32> for Slot {
	fn from(number: i32) -> Self {
		Slot::Text(number.to_string().into())
	}
}

impl From<i64> for Slot {
	fn from(number: i64) -> Self {
		Slot::Text(number.to_string().into())
	}
}

impl From<usize> for Slot {
	fn from(number: usize) -> Self {
		Slot::Text(number.to_string().into())
	}
}

impl From<bool> for Slot {
	fn from(value: bool) -> Self {
		Slot::Text(value.to_string().into())
	}
}

impl From<Template> for Slot {
	fn from(template: Template) -> Self {
		Slot::Template(template)
	}
}

impl From<Vec<Slot>> for Slot {
	fn from(slots: Vec<Slot>) -> Self {
		Slot::List(slots)
	}
}

impl From<Vec<Template>> for Slot {
	fn from(templates: Vec<Template>) -> Self {
		Slot::List(templates.into_iter().map(Slot::Template).collect())
	}
}

impl From<Value> for Slot {
	fn from(value: Value) -> Self {
		match value {
			Value::List(items) => Slot::List(items.into_iter().map(Slot::from).collect()),
			other => Slot::Text(other.to_string().into()),
		}
	}
}

/// A watch in a template is read through the placeholder's evaluation, so
/// the placeholder follows the watch.
impl<T: Clone + Into<Content> + 'static> From<Watch<T>> for Slot {
	fn from(watch: Watch<T>) -> Self {
		Slot::expr(move |cx| watch.get(cx))
	}
}
