use std::fmt::Display;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{Evaluation, Key, Observable};

/// Plain, not yet observed record.
pub type Record = IndexMap<Rc<str>, Value>;

/// Dynamic data stored in and read from observables.
///
/// `Record` and `List` are plain, object-like values: assigning them into an
/// observable wraps them. `Object` is an already wrapped record or list.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Number(f64),
	Text(Rc<str>),
	Record(Record),
	List(Vec<Value>),
	Object(Observable),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Plain records and lists, the values `wrap` turns into observables.
	pub fn is_plain_object(&self) -> bool {
		matches!(self, Value::Record(_) | Value::List(_))
	}

	pub fn as_observable(&self) -> Option<&Observable> {
		match self {
			Value::Object(observable) => Some(observable),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(number) => Some(*number),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(text) => Some(text),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(value) => Some(*value),
			_ => None,
		}
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(value) => *value,
			Value::Number(number) => *number != 0.0 && !number.is_nan(),
			Value::Text(text) => !text.is_empty(),
			_ => true,
		}
	}

	/// Tracked read through a nested value. Scalars yield `Null`.
	pub fn get(&self, cx: &Evaluation, key: impl Into<Key>) -> Value {
		match self {
			Value::Object(observable) => observable.get(cx, key),
			_ => Value::Null,
		}
	}

	/// Untracked read through a nested value.
	pub fn get_once(&self, key: impl Into<Key>) -> Value {
		match self {
			Value::Object(observable) => observable.get_once(key),
			Value::Record(record) => match key.into() {
				Key::Name(name) => record.get(&name).cloned().unwrap_or_default(),
				_ => Value::Null,
			},
			Value::List(list) => match key.into() {
				Key::Index(index) => list.get(index).cloned().unwrap_or_default(),
				key if key.is_length() => Value::from(list.len()),
				_ => Value::Null,
			},
			_ => Value::Null,
		}
	}

	/// Deep plain copy: observables are unwrapped into records and lists.
	pub fn to_plain(&self) -> Value {
		match self {
			Value::Object(observable) => observable.to_value(),
			Value::Record(record) => Value::Record(
				record
					.iter()
					.map(|(key, value)| (key.clone(), value.to_plain()))
					.collect(),
			),
			Value::List(list) => Value::List(list.iter().map(Value::to_plain).collect()),
			other => other.clone(),
		}
	}

	/// Builds a plain record from key/value pairs.
	pub fn record<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<Rc<str>>,
		V: Into<Value>,
	{
		Value::Record(
			entries
				.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		)
	}

	pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
		Value::List(items.into_iter().map(Into::into).collect())
	}
}

/// Formats a number the way it is shown in text: integral values lose the
/// fractional part.
pub(crate) fn format_number(number: f64) -> String {
	if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
		format!("{}", number as i64)
	} else {
		format!("{}", number)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => Ok(()),
			Value::Bool(value) => write!(f, "{}", value),
			Value::Number(number) => f.write_str(&format_number(*number)),
			Value::Text(text) => f.write_str(text),
			Value::Record(record) => {
				f.write_str("{")?;
				for (index, (key, value)) in record.iter().enumerate() {
					if index > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", key, value)?;
				}
				f.write_str("}")
			}
			Value::List(list) => {
				f.write_str("[")?;
				for (index, value) in list.iter().enumerate() {
					if index > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", value)?;
				}
				f.write_str("]")
			}
			Value::Object(observable) => write!(f, "{}", observable.to_value()),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value as f64)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Number(value as f64)
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(value as f64)
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Value::Text(value)
	}
}

impl From<Record> for Value {
	fn from(record: Record) -> Self {
		Value::Record(record)
	}
}

impl From<Vec<Value>> for Value {
	fn from(list: Vec<Value>) -> Self {
		Value::List(list)
	}
}

impl From<Observable> for Value {
	fn from(observable: Observable) -> Self {
		Value::Object(observable)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or_default()
	}
}
