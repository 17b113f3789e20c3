mod content;
mod expression;
mod slot;

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use fxhash::FxHashSet;

pub use content::Content;
pub use expression::Expression;
pub(crate) use expression::Function;
pub use slot::Slot;

use crate::dom::escape;

/// Prefix of the placeholder tokens written into compiled markup.
pub(crate) const SENTINEL: &str = "trellis:";

thread_local! {
	static MARKUP: RefCell<FxHashSet<Rc<str>>> = RefCell::new(FxHashSet::default());
}

/// Returns the shared copy of `markup`, storing it on first sight.
fn intern(markup: String) -> Rc<str> {
	MARKUP.with(|interned| {
		let mut interned = interned.borrow_mut();
		if let Some(shared) = interned.get(markup.as_str()) {
			return shared.clone();
		}

		tracing::debug!(len = markup.len(), "new template markup");
		let shared: Rc<str> = markup.into();
		interned.insert(shared.clone());
		shared
	})
}

/// Parses a placeholder token, `trellis:N`, into `N`.
pub(crate) fn sentinel_index(token: &str) -> Option<usize> {
	token.strip_prefix(SENTINEL)?.parse().ok()
}

#[derive(Clone)]
enum Part {
	Static(Rc<str>),
	Function(Function),
}

struct Compiled {
	markup: Rc<str>,
	functions: Rc<[Function]>,
}

/// Static markup interleaved with dynamic slots.
///
/// ```
/// use trellis::{Slot, Template};
///
/// let template = Template::new(&["<p>", "</p>"], vec![Slot::expr(|_| "hi")]);
/// assert_eq!(&*template.markup(), "<p><!--trellis:0--></p>");
/// ```
#[derive(Clone)]
pub struct Template {
	parts: Rc<[Part]>,
	compiled: Rc<OnceCell<Compiled>>,
	key: Option<u64>,
}

impl Template {
	/// Interleaves `statics` with `slots`: `statics[0]`, `slots[0]`,
	/// `statics[1]`, and so on. Surplus items of either side are appended.
	pub fn new(statics: &[&str], slots: impl IntoIterator<Item = Slot>) -> Self {
		let mut builder = TemplateBuilder::new();
		let mut slots = slots.into_iter();

		for text in statics {
			builder.push_static(text);
			if let Some(slot) = slots.next() {
				builder.push_slot(slot);
			}
		}

		for slot in slots {
			builder.push_slot(slot);
		}

		builder.build()
	}

	pub fn builder() -> TemplateBuilder {
		TemplateBuilder::new()
	}

	/// Identity for keyed reconciliation.
	pub fn with_key(mut self, key: u64) -> Self {
		self.key = Some(key);
		self
	}

	pub fn key(&self) -> Option<u64> {
		self.key
	}

	/// Compiled markup with placeholder sentinels. Computed once per
	/// template; identical markup is shared between templates.
	pub fn markup(&self) -> Rc<str> {
		self.compiled().markup.clone()
	}

	/// Fresh descriptors for the placeholders, in markup order.
	pub fn expressions(&self) -> Vec<Expression> {
		self.functions()
			.iter()
			.enumerate()
			.map(|(index, function)| Expression::new(index, function.clone()))
			.collect()
	}

	pub(crate) fn functions(&self) -> Rc<[Function]> {
		self.compiled().functions.clone()
	}

	fn compiled(&self) -> &Compiled {
		self.compiled.get_or_init(|| compile(&self.parts))
	}
}

impl std::fmt::Debug for Template {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Template")
			.field("markup", &self.markup())
			.field("key", &self.key)
			.finish()
	}
}

fn compile(parts: &[Part]) -> Compiled {
	let mut markup = String::new();
	let mut functions = Vec::new();

	for part in parts {
		match part {
			Part::Static(text) => markup.push_str(text),
			Part::Function(function) => {
				let index = functions.len();
				functions.push(function.clone());

				if inside_tag(&markup) {
					if markup.ends_with('=') {
						markup.push_str(&format!("\"{}{}\"", SENTINEL, index));
					} else {
						markup.push_str(&format!("{}{}", SENTINEL, index));
					}
				} else {
					markup.push_str(&format!("<!--{}{}-->", SENTINEL, index));
				}
			}
		}
	}

	Compiled {
		markup: intern(markup),
		functions: functions.into(),
	}
}

/// Whether the end of `markup` is inside an opening tag. A `>` in a quoted
/// attribute value or a comment does not close anything.
fn inside_tag(markup: &str) -> bool {
	let mut rest = markup;

	while let Some(open) = rest.find('<') {
		rest = &rest[open..];

		if let Some(comment) = rest.strip_prefix("<!--") {
			match comment.find("-->") {
				Some(end) => {
					rest = &comment[end + 3..];
					continue;
				}
				None => return false,
			}
		}

		let mut quote = None;
		let mut close = None;
		for (index, ch) in rest.char_indices().skip(1) {
			match quote {
				Some(open) if ch == open => quote = None,
				Some(_) => {}
				None if ch == '"' || ch == '\'' => quote = Some(ch),
				None if ch == '>' => {
					close = Some(index);
					break;
				}
				None => {}
			}
		}

		match close {
			Some(close) => rest = &rest[close + 1..],
			None => return true,
		}
	}

	false
}

/// Accumulates parts in order. Text slots are escaped; nested templates
/// contribute their parts, so their placeholders are renumbered into this
/// template.
#[derive(Default)]
pub struct TemplateBuilder {
	parts: Vec<Part>,
}

impl TemplateBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends raw markup.
	pub fn push_static(&mut self, markup: &str) -> &mut Self {
		if !markup.is_empty() {
			self.parts.push(Part::Static(markup.into()));
		}
		self
	}

	pub fn push_slot(&mut self, slot: impl Into<Slot>) -> &mut Self {
		match slot.into() {
			Slot::Text(text) => {
				self.parts.push(Part::Static(escape(&text).into()));
			}
			Slot::Expr(func) => self.parts.push(Part::Function(Function::Content(func))),
			Slot::Handler(func) => self.parts.push(Part::Function(Function::Handler(func))),
			Slot::Template(template) => self.parts.extend(template.parts.iter().cloned()),
			Slot::List(slots) => {
				for slot in slots {
					self.push_slot(slot);
				}
			}
		}
		self
	}

	pub fn build(&mut self) -> Template {
		Template {
			parts: std::mem::take(&mut self.parts).into(),
			compiled: Rc::new(OnceCell::new()),
			key: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sentinels_follow_position() {
		let template = Template::new(
			&["<a href=", " class='x ", "'>", "</a>"],
			vec![
				Slot::expr(|_| "/home"),
				Slot::expr(|_| "y"),
				Slot::expr(|_| "Home"),
			],
		);

		assert_eq!(
			&*template.markup(),
			"<a href=\"trellis:0\" class='x trellis:1'><!--trellis:2--></a>"
		);
		assert_eq!(template.expressions().len(), 3);
	}

	#[test]
	fn literals_are_escaped_and_lists_flattened() {
		let template = Template::new(
			&["<ul>", "</ul>"],
			vec![Slot::List(vec![
				Slot::from("<li>"),
				Slot::from(vec![Slot::from(1), Slot::from("&")]),
			])],
		);

		assert_eq!(&*template.markup(), "<ul>&lt;li&gt;1&amp;</ul>");
		assert!(template.expressions().is_empty());
	}

	#[test]
	fn nested_templates_renumber_placeholders() {
		let inner = Template::new(&["<b>", "</b>"], vec![Slot::expr(|_| "in")]);
		let outer = Template::new(
			&["<p>", "", "</p>"],
			vec![Slot::expr(|_| "out"), Slot::Template(inner)],
		);

		assert_eq!(
			&*outer.markup(),
			"<p><!--trellis:0--><b><!--trellis:1--></b></p>"
		);
	}

	#[test]
	fn identical_markup_is_shared() {
		let a = Template::new(&["<i>", "</i>"], vec![Slot::expr(|_| 1)]);
		let b = Template::new(&["<i>", "</i>"], vec![Slot::expr(|_| 2)]).with_key(7);

		assert!(Rc::ptr_eq(&a.markup(), &b.markup()));
		assert_eq!(b.key(), Some(7));
		assert_eq!(a.key(), None);
	}

	#[test]
	fn quoted_angle_brackets_do_not_close_a_tag() {
		let template = Template::new(
			&["<a title=\"x > y\" class=", "><!-- a > b -->", "</a>"],
			vec![Slot::expr(|_| "c"), Slot::expr(|_| "d")],
		);

		assert_eq!(
			&*template.markup(),
			"<a title=\"x > y\" class=\"trellis:0\"><!-- a > b --><!--trellis:1--></a>"
		);
		assert!(inside_tag("<p data-x='>'"));
		assert!(!inside_tag("<p>it's"));
		assert!(!inside_tag("<!-- <p"));
	}

	#[test]
	fn sentinel_tokens_parse() {
		assert_eq!(sentinel_index("trellis:12"), Some(12));
		assert_eq!(sentinel_index("trellis:"), None);
		assert_eq!(sentinel_index("other"), None);
	}
}
