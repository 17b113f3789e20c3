use std::rc::Rc;

use crate::template::{Content, Template};

/// What one logical child of a region renders from.
#[derive(Clone, Debug)]
pub(crate) enum Seed {
	Text(Rc<str>),
	Template(Template),
	/// Stands in for an empty partial.
	Empty,
}

/// Ordered children of one region, one [`Partial::add`] per child.
///
/// Empty content and booleans add nothing; lists add each item in order.
#[derive(Clone, Debug, Default)]
pub struct Partial {
	seeds: Vec<Seed>,
}

impl Partial {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, content: impl Into<Content>) -> &mut Self {
		match content.into() {
			Content::Empty | Content::Bool(_) => {}
			Content::Text(text) => self.seeds.push(Seed::Text(text)),
			Content::Template(template) => self.seeds.push(Seed::Template(template)),
			Content::List(items) => {
				for item in items {
					self.add(item);
				}
			}
		}
		self
	}

	pub fn len(&self) -> usize {
		self.seeds.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seeds.is_empty()
	}

	pub(crate) fn into_seeds(self) -> Vec<Seed> {
		self.seeds
	}
}

impl From<Content> for Partial {
	fn from(content: Content) -> Self {
		let mut partial = Partial::new();
		partial.add(content);
		partial
	}
}

impl From<Template> for Partial {
	fn from(template: Template) -> Self {
		Partial::from(Content::Template(template))
	}
}

impl From<Vec<Template>> for Partial {
	fn from(templates: Vec<Template>) -> Self {
		let mut partial = Partial::new();
		for template in templates {
			partial.add(template);
		}
		partial
	}
}

impl From<Vec<Content>> for Partial {
	fn from(items: Vec<Content>) -> Self {
		Partial::from(Content::List(items))
	}
}

impl From<&str> for Partial {
	fn from(text: &str) -> Self {
		Partial::from(Content::from(text))
	}
}
