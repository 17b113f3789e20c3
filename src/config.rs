use std::rc::Rc;

use fxhash::FxHashSet;

const PROPERTIES: [&str; 5] = ["value", "checked", "selected", "disabled", "hidden"];
const REFLECTED: [&str; 4] = ["checked", "selected", "disabled", "hidden"];

/// Renderer settings.
///
/// ```
/// let config = trellis::RenderConfig::default()
/// 	.trim_whitespace(false)
/// 	.property("open")
/// 	.reflected("open");
///
/// assert!(config.is_reflected("open"));
/// ```
#[derive(Clone, Debug)]
pub struct RenderConfig {
	trim_whitespace: bool,
	properties: FxHashSet<Rc<str>>,
	reflected: FxHashSet<Rc<str>>,
}

impl Default for RenderConfig {
	fn default() -> Self {
		RenderConfig {
			trim_whitespace: true,
			properties: PROPERTIES.iter().map(|name| Rc::from(*name)).collect(),
			reflected: REFLECTED.iter().map(|name| Rc::from(*name)).collect(),
		}
	}
}

impl RenderConfig {
	/// Drop whitespace-only text nodes from parsed markup.
	pub fn trim_whitespace(mut self, trim: bool) -> Self {
		self.trim_whitespace = trim;
		self
	}

	/// Bind `name` as an IDL property instead of a content attribute.
	pub fn property(mut self, name: &str) -> Self {
		self.properties.insert(name.into());
		self
	}

	/// Reflect the boolean property `name` to a content attribute.
	pub fn reflected(mut self, name: &str) -> Self {
		self.reflected.insert(name.into());
		self
	}

	pub fn trims_whitespace(&self) -> bool {
		self.trim_whitespace
	}

	pub fn is_property(&self, name: &str) -> bool {
		self.properties.contains(name)
	}

	pub fn is_reflected(&self, name: &str) -> bool {
		self.reflected.contains(name)
	}
}
