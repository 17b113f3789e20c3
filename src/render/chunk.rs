use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::Node;
use crate::render::partial::Seed;
use crate::render::region::Region;
use crate::template::{Content, Expression, Template};
use crate::Watch;

#[derive(Debug)]
pub(crate) enum ChunkKind {
	Template,
	Text(RefCell<Rc<str>>),
	/// Anchor of an empty region.
	Placeholder,
}

/// A top-level position of a chunk: a node, or a nested region whose nodes
/// are spliced in at this position.
pub(crate) enum Entry {
	Node(Node),
	Region(Region),
}

/// A live reactive binding owned by a chunk. Never read: it is held so that
/// dropping the chunk drops the watch, which unsubscribes it.
#[allow(dead_code)]
pub(crate) enum Binding {
	Attribute(Watch<()>),
	Region(Watch<Content>),
}

/// The unit of reconciliation: the nodes rendered for one template or text
/// value, with the descriptors and bindings that keep them current.
#[derive(Clone)]
pub(crate) struct Chunk {
	body: Rc<ChunkBody>,
}

pub(crate) struct ChunkBody {
	kind: ChunkKind,
	markup: Rc<str>,
	key: Option<u64>,
	expressions: Vec<Expression>,
	entries: RefCell<Vec<Entry>>,
	bindings: RefCell<Vec<Binding>>,
}

impl Chunk {
	pub(crate) fn new(seed: Seed) -> Self {
		let (kind, markup, key, expressions) = match seed {
			Seed::Text(text) => (ChunkKind::Text(RefCell::new(text)), "".into(), None, Vec::new()),
			Seed::Template(template) => (
				ChunkKind::Template,
				template.markup(),
				template.key(),
				template.expressions(),
			),
			Seed::Empty => return Self::placeholder(),
		};

		Self::build(kind, markup, key, expressions)
	}

	pub(crate) fn placeholder() -> Self {
		Self::build(ChunkKind::Placeholder, "".into(), None, Vec::new())
	}

	fn build(kind: ChunkKind, markup: Rc<str>, key: Option<u64>, expressions: Vec<Expression>) -> Self {
		Chunk {
			body: Rc::new(ChunkBody {
				kind,
				markup,
				key,
				expressions,
				entries: RefCell::new(Vec::new()),
				bindings: RefCell::new(Vec::new()),
			}),
		}
	}

	/// Address of the shared body, for identity sets.
	pub(crate) fn addr(&self) -> usize {
		Rc::as_ptr(&self.body) as usize
	}

	pub(crate) fn kind(&self) -> &ChunkKind {
		&self.body.kind
	}

	pub(crate) fn markup(&self) -> &Rc<str> {
		&self.body.markup
	}

	pub(crate) fn key(&self) -> Option<u64> {
		self.body.key
	}

	pub(crate) fn expressions(&self) -> &[Expression] {
		&self.body.expressions
	}

	pub(crate) fn text(&self) -> Option<Rc<str>> {
		match &self.body.kind {
			ChunkKind::Text(text) => Some(text.borrow().clone()),
			_ => None,
		}
	}

	pub(crate) fn is_materialized(&self) -> bool {
		!self.body.entries.borrow().is_empty()
	}

	/// Whether `seed` can take over this chunk's nodes: text for text,
	/// templates for templates with identical markup.
	pub(crate) fn same_shape(&self, seed: &Seed) -> bool {
		match (&self.body.kind, seed) {
			(ChunkKind::Text(_), Seed::Text(_)) => true,
			(ChunkKind::Placeholder, Seed::Empty) => true,
			(ChunkKind::Template, Seed::Template(template)) => {
				let markup = template.markup();
				Rc::ptr_eq(&self.body.markup, &markup) || self.body.markup == markup
			}
			_ => false,
		}
	}

	/// Binds every descriptor of this chunk to the functions of `template`.
	pub(crate) fn rebind(&self, template: &Template) -> usize {
		let functions = template.functions();
		let mut rebound = 0;
		for (expression, function) in self.body.expressions.iter().zip(functions.iter()) {
			if expression.rebind(function) {
				rebound += 1;
			}
		}
		rebound
	}

	/// Takes the contents of a structurally equal seed: text chunks update
	/// their node in place, template chunks rebind their descriptors.
	pub(crate) fn adopt(&self, seed: &Seed) {
		match (&self.body.kind, seed) {
			(ChunkKind::Text(current), Seed::Text(text)) => {
				*current.borrow_mut() = text.clone();
				for node in self.nodes() {
					if node.is_text() {
						node.set_data(text);
					}
				}
			}
			(ChunkKind::Template, Seed::Template(template)) => {
				self.rebind(template);
			}
			_ => {}
		}
	}

	pub(crate) fn set_entries(&self, entries: Vec<Entry>) {
		*self.body.entries.borrow_mut() = entries;
	}

	pub(crate) fn with_entries_mut<R>(&self, func: impl FnOnce(&mut Vec<Entry>) -> R) -> R {
		func(&mut self.body.entries.borrow_mut())
	}

	pub(crate) fn push_binding(&self, binding: Binding) {
		self.body.bindings.borrow_mut().push(binding);
	}

	pub(crate) fn bindings(&self) -> usize {
		self.body.bindings.borrow().len()
	}

	/// Current top-level nodes, nested regions flattened in place.
	pub(crate) fn nodes(&self) -> Vec<Node> {
		let mut nodes = Vec::new();
		for entry in self.body.entries.borrow().iter() {
			match entry {
				Entry::Node(node) => nodes.push(node.clone()),
				Entry::Region(region) => nodes.extend(region.nodes()),
			}
		}
		nodes
	}
}

impl std::fmt::Debug for Chunk {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Chunk")
			.field("kind", &self.body.kind)
			.field("markup", &self.body.markup)
			.field("key", &self.body.key)
			.field("bindings", &self.bindings())
			.finish()
	}
}
