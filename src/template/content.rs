use std::rc::Rc;

use crate::template::Template;
use crate::value::format_number;
use crate::Value;

/// What a content or attribute expression yields.
#[derive(Clone, Debug, Default)]
pub enum Content {
	#[default]
	Empty,
	Text(Rc<str>),
	Bool(bool),
	Template(Template),
	List(Vec<Content>),
}

impl Content {
	pub fn is_empty(&self) -> bool {
		match self {
			Content::Empty => true,
			Content::List(items) => items.iter().all(Content::is_empty),
			_ => false,
		}
	}

	/// The attribute value this content stands for. `None` removes the
	/// attribute.
	pub fn to_attribute(&self) -> Option<Rc<str>> {
		match self {
			Content::Empty | Content::Bool(false) => None,
			Content::Bool(true) => Some("".into()),
			Content::Text(text) => Some(text.clone()),
			Content::Template(template) => Some(template.markup()),
			Content::List(items) => {
				let parts: Vec<Rc<str>> = items.iter().filter_map(Content::to_attribute).collect();
				Some(parts.join(" ").into())
			}
		}
	}

	/// Plain text, as interpolated into attribute values.
	pub fn to_text(&self) -> Rc<str> {
		match self {
			Content::Bool(value) => value.to_string().into(),
			other => other.to_attribute().unwrap_or_else(|| "".into()),
		}
	}

	/// The value written to an IDL property.
	pub fn to_value(&self) -> Value {
		match self {
			Content::Empty => Value::Null,
			Content::Bool(value) => Value::Bool(*value),
			other => Value::Text(other.to_text()),
		}
	}
}

impl From<Value> for Content {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Content::Empty,
			Value::Bool(value) => Content::Bool(value),
			Value::Number(number) => Content::Text(format_number(number).into()),
			Value::Text(text) => Content::Text(text),
			Value::List(items) => Content::List(items.into_iter().map(Content::from).collect()),
			other => Content::Text(other.to_string().into()),
		}
	}
}

impl From<&Value> for Content {
	fn from(value: &Value) -> Self {
		Content::from(value.clone())
	}
}

impl From<&str> for Content {
	fn from(text: &str) -> Self {
		Content::Text(text.into())
	}
}

impl From<String> for Content {
	fn from(text: String) -> Self {
		Content::Text(text.into())
	}
}

impl From<Rc<str>> for Content {
	fn from(text: Rc<str>) -> Self {
		Content::Text(text)
	}
}

impl From<f64> for Content {
	fn from(number: f64) -> Self {
		Content::Text(format_number(number).into())
	}
}

impl From<i32> for Content {
	fn from(number: i32) -> Self {
		Content::Text(number.to_string().into())
	}
}

impl From<i64> for Content {
	fn from(number: i64) -> Self {
		Content::Text(number.to_string().into())
	}
}

impl From<usize> for Content {
	fn from(number: usize) -> Self {
		Content::Text(number.to_string().into())
	}
}

impl From<bool> for Content {
	fn from(value: bool) -> Self {
		Content::Bool(value)
	}
}

impl From<Template> for Content {
	fn from(template: Template) -> Self {
		Content::Template(template)
	}
}

impl<T: Into<Content>> From<Vec<T>> for Content {
	fn from(items: Vec<T>) -> Self {
		Content::List(items.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Content>> From<Option<T>> for Content {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or_default()
	}
}

impl From<()> for Content {
	fn from(_: ()) -> Self {
		Content::Empty
	}
}
