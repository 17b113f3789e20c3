use std::fmt::Display;
use std::rc::Rc;

/// Name of the pseudo-property every list exposes.
pub const LENGTH: &str = "length";

/// A property key of an [`Observable`](crate::Observable), or the change
/// signal of a derived source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
	Name(Rc<str>),
	Index(usize),
	/// The single key a watch or an expression notifies on.
	Changed,
}

impl Key {
	pub fn length() -> Self {
		Key::Name(LENGTH.into())
	}

	pub fn is_length(&self) -> bool {
		matches!(self, Key::Name(name) if &**name == LENGTH)
	}
}

impl From<&str> for Key {
	fn from(name: &str) -> Self {
		Key::Name(name.into())
	}
}

impl From<String> for Key {
	fn from(name: String) -> Self {
		Key::Name(name.into())
	}
}

impl From<Rc<str>> for Key {
	fn from(name: Rc<str>) -> Self {
		Key::Name(name)
	}
}

impl From<usize> for Key {
	fn from(index: usize) -> Self {
		Key::Index(index)
	}
}

impl From<&Key> for Key {
	fn from(key: &Key) -> Self {
		key.clone()
	}
}

impl Display for Key {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Key::Name(name) => f.write_str(name),
			Key::Index(index) => write!(f, "{}", index),
			Key::Changed => f.write_str("<changed>"),
		}
	}
}
