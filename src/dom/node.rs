use std::cell::{Cell, RefCell};
use std::fmt::Write;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use fxhash::FxHashMap;
use indexmap::IndexMap;

use crate::{Error, Result, Value};

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

const VOID_ELEMENTS: [&str; 8] = ["area", "br", "col", "hr", "img", "input", "link", "meta"];

/// Identity of a node, stable for its whole lifetime. Side tables key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
	fn new() -> Self {
		Self(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	#[inline]
	pub const fn id(self) -> u64 {
		self.0
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	Fragment,
	Element(Rc<str>),
	Text,
	Comment,
}

/// A node of the output tree.
///
/// Children form a doubly linked list: a parent owns its first child and
/// every node owns its next sibling. Back links are weak.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

struct NodeInner {
	id: NodeId,
	kind: NodeKind,
	data: RefCell<Rc<str>>,
	attributes: RefCell<IndexMap<Rc<str>, Rc<str>>>,
	properties: RefCell<FxHashMap<Rc<str>, Value>>,
	parent: RefCell<Weak<NodeInner>>,
	first_child: RefCell<Option<Node>>,
	last_child: RefCell<Weak<NodeInner>>,
	next_sibling: RefCell<Option<Node>>,
	previous_sibling: RefCell<Weak<NodeInner>>,
	child_count: Cell<usize>,
	revision: Cell<u64>,
}

impl Drop for NodeInner {
	// Unlinks the sibling chain iteratively so long lists do not recurse.
	fn drop(&mut self) {
		let mut next = self.first_child.get_mut().take();
		while let Some(node) = next {
			next = node.0.next_sibling.borrow_mut().take();
			*node.0.previous_sibling.borrow_mut() = Weak::new();
		}
	}
}

fn downgrade(node: Option<&Node>) -> Weak<NodeInner> {
	node.map_or_else(Weak::new, |node| Rc::downgrade(&node.0))
}

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Node({}, {})", self.0.id.0, self.to_markup())
	}
}

impl Node {
	fn with_kind(kind: NodeKind, data: &str) -> Self {
		Node(Rc::new(NodeInner {
			id: NodeId::new(),
			kind,
			data: RefCell::new(data.into()),
			attributes: RefCell::new(IndexMap::new()),
			properties: RefCell::new(FxHashMap::default()),
			parent: RefCell::new(Weak::new()),
			first_child: RefCell::new(None),
			last_child: RefCell::new(Weak::new()),
			next_sibling: RefCell::new(None),
			previous_sibling: RefCell::new(Weak::new()),
			child_count: Cell::new(0),
			revision: Cell::new(0),
		}))
	}

	pub fn fragment() -> Self {
		Self::with_kind(NodeKind::Fragment, "")
	}

	pub fn element(tag: &str) -> Self {
		Self::with_kind(NodeKind::Element(tag.to_ascii_lowercase().into()), "")
	}

	pub fn text(data: &str) -> Self {
		Self::with_kind(NodeKind::Text, data)
	}

	pub fn comment(data: &str) -> Self {
		Self::with_kind(NodeKind::Comment, data)
	}

	pub fn id(&self) -> NodeId {
		self.0.id
	}

	pub fn kind(&self) -> &NodeKind {
		&self.0.kind
	}

	pub fn tag(&self) -> Option<&str> {
		match &self.0.kind {
			NodeKind::Element(tag) => Some(tag),
			_ => None,
		}
	}

	pub fn is_text(&self) -> bool {
		self.0.kind == NodeKind::Text
	}

	pub fn is_comment(&self) -> bool {
		self.0.kind == NodeKind::Comment
	}

	pub fn is_fragment(&self) -> bool {
		self.0.kind == NodeKind::Fragment
	}

	/// Number of mutations applied to this node itself.
	pub fn revision(&self) -> u64 {
		self.0.revision.get()
	}

	fn touch(&self) {
		self.0.revision.set(self.0.revision.get() + 1);
	}

	pub fn parent(&self) -> Option<Node> {
		self.0.parent.borrow().upgrade().map(Node)
	}

	pub fn children(&self) -> Vec<Node> {
		let mut children = Vec::with_capacity(self.child_count());
		let mut next = self.first_child();
		while let Some(child) = next {
			next = child.next_sibling();
			children.push(child);
		}
		children
	}

	pub fn child_count(&self) -> usize {
		self.0.child_count.get()
	}

	pub fn first_child(&self) -> Option<Node> {
		self.0.first_child.borrow().clone()
	}

	pub fn last_child(&self) -> Option<Node> {
		self.0.last_child.borrow().upgrade().map(Node)
	}

	fn is_child_of(&self, parent: &Node) -> bool {
		Weak::as_ptr(&self.0.parent.borrow()) == Rc::as_ptr(&parent.0)
	}

	pub fn next_sibling(&self) -> Option<Node> {
		self.0.next_sibling.borrow().clone()
	}

	pub fn previous_sibling(&self) -> Option<Node> {
		self.0.previous_sibling.borrow().upgrade().map(Node)
	}

	/// Links the detached `child` before `reference`, or last.
	fn link(&self, child: &Node, reference: Option<&Node>) {
		let previous = match reference {
			Some(reference) => reference.previous_sibling(),
			None => self.last_child(),
		};

		*child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
		*child.0.previous_sibling.borrow_mut() = downgrade(previous.as_ref());
		*child.0.next_sibling.borrow_mut() = reference.cloned();

		match reference {
			Some(reference) => *reference.0.previous_sibling.borrow_mut() = Rc::downgrade(&child.0),
			None => *self.0.last_child.borrow_mut() = Rc::downgrade(&child.0),
		}

		match &previous {
			Some(previous) => *previous.0.next_sibling.borrow_mut() = Some(child.clone()),
			None => *self.0.first_child.borrow_mut() = Some(child.clone()),
		}

		self.0.child_count.set(self.0.child_count.get() + 1);
		self.touch();
	}

	/// Appends `child`, detaching it from its current parent first. A
	/// fragment contributes its children and ends up empty.
	pub fn append_child(&self, child: &Node) {
		if child.is_fragment() {
			for grandchild in child.children() {
				self.append_child(&grandchild);
			}
			return;
		}

		child.remove();
		self.link(child, None);
	}

	/// Inserts `child` before `reference`, or appends it when there is no
	/// reference. Inserting a node before itself does nothing.
	pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<()> {
		let Some(reference) = reference else {
			self.append_child(child);
			return Ok(());
		};

		if child == reference {
			return Ok(());
		}

		if !reference.is_child_of(self) {
			return Err(Error::Detached);
		}

		if child.is_fragment() {
			for grandchild in child.children() {
				self.insert_before(&grandchild, Some(reference))?;
			}
			return Ok(());
		}

		child.remove();
		self.link(child, Some(reference));
		Ok(())
	}

	/// Inserts `child` right after `reference`.
	pub fn insert_after(&self, child: &Node, reference: &Node) -> Result<()> {
		if child == reference {
			return Ok(());
		}

		if !reference.is_child_of(self) {
			return Err(Error::Detached);
		}

		match reference.next_sibling() {
			Some(next) if &next == child => Ok(()),
			next => self.insert_before(child, next.as_ref()),
		}
	}

	/// Detaches this node from its parent.
	pub fn remove(&self) {
		let previous = self.previous_sibling();
		let next = self.0.next_sibling.borrow_mut().take();
		*self.0.previous_sibling.borrow_mut() = Weak::new();

		let parent = self.parent();
		*self.0.parent.borrow_mut() = Weak::new();
		let Some(parent) = parent else {
			return;
		};

		match &next {
			Some(next) => *next.0.previous_sibling.borrow_mut() = downgrade(previous.as_ref()),
			None => *parent.0.last_child.borrow_mut() = downgrade(previous.as_ref()),
		}

		match &previous {
			Some(previous) => *previous.0.next_sibling.borrow_mut() = next,
			None => *parent.0.first_child.borrow_mut() = next,
		}

		parent.0.child_count.set(parent.0.child_count.get() - 1);
		parent.touch();
	}

	pub fn replace_with(&self, other: &Node) -> Result<()> {
		let parent = self.parent().ok_or(Error::Detached)?;
		parent.insert_before(other, Some(self))?;
		self.remove();
		Ok(())
	}

	pub fn data(&self) -> Rc<str> {
		self.0.data.borrow().clone()
	}

	/// Updates the text of a text or comment node; unchanged text is not
	/// written.
	pub fn set_data(&self, data: &str) {
		if &**self.0.data.borrow() == data {
			return;
		}
		*self.0.data.borrow_mut() = data.into();
		self.touch();
	}

	pub fn attribute(&self, name: &str) -> Option<Rc<str>> {
		self.0.attributes.borrow().get(name).cloned()
	}

	pub fn has_attribute(&self, name: &str) -> bool {
		self.0.attributes.borrow().contains_key(name)
	}

	pub fn attributes(&self) -> Vec<(Rc<str>, Rc<str>)> {
		self.0
			.attributes
			.borrow()
			.iter()
			.map(|(name, value)| (name.clone(), value.clone()))
			.collect()
	}

	pub fn set_attribute(&self, name: &str, value: &str) {
		let mut attributes = self.0.attributes.borrow_mut();
		if attributes.get(name).map_or(false, |current| &**current == value) {
			return;
		}
		attributes.insert(name.into(), value.into());
		drop(attributes);
		self.touch();
	}

	pub fn remove_attribute(&self, name: &str) {
		let removed = self.0.attributes.borrow_mut().shift_remove(name);
		if removed.is_some() {
			self.touch();
		}
	}

	pub fn property(&self, name: &str) -> Option<Value> {
		self.0.properties.borrow().get(name).cloned()
	}

	pub fn set_property(&self, name: &str, value: Value) {
		let mut properties = self.0.properties.borrow_mut();
		if properties.get(name) == Some(&value) {
			return;
		}
		properties.insert(name.into(), value);
		drop(properties);
		self.touch();
	}

	/// Copies this node and its subtree. Copies get fresh identities; IDL
	/// properties are not copied.
	pub fn deep_clone(&self) -> Node {
		let node = Self::with_kind(self.0.kind.clone(), &self.data());
		*node.0.attributes.borrow_mut() = self.0.attributes.borrow().clone();

		for child in self.children() {
			node.append_child(&child.deep_clone());
		}

		node.0.revision.set(0);
		node
	}

	/// Calls `func` for this node and every descendant, parents first.
	pub fn walk(&self, func: &mut impl FnMut(&Node)) {
		func(self);
		for child in self.children() {
			child.walk(func);
		}
	}

	pub fn text_content(&self) -> String {
		let mut text = String::new();
		self.walk(&mut |node| {
			if node.is_text() {
				text.push_str(&node.data());
			}
		});
		text
	}

	pub fn to_markup(&self) -> String {
		let mut markup = String::new();
		self.write_markup(&mut markup);
		markup
	}

	fn write_markup(&self, out: &mut String) {
		match &self.0.kind {
			NodeKind::Fragment => {
				for child in self.children() {
					child.write_markup(out);
				}
			}
			NodeKind::Text => out.push_str(&escape(&self.data())),
			NodeKind::Comment => {
				let _ = write!(out, "<!--{}-->", self.data());
			}
			NodeKind::Element(tag) => {
				out.push('<');
				out.push_str(tag);
				for (name, value) in self.0.attributes.borrow().iter() {
					if value.is_empty() {
						let _ = write!(out, " {}", name);
					} else {
						let _ = write!(out, " {}=\"{}\"", name, escape(value));
					}
				}
				out.push('>');

				if VOID_ELEMENTS.contains(&&**tag) {
					return;
				}

				for child in self.children() {
					child.write_markup(out);
				}
				let _ = write!(out, "</{}>", tag);
			}
		}
	}
}

/// Escapes text for use in markup.
pub fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			ch => escaped.push(ch),
		}
	}
	escaped
}

/// Reverses [`escape`] and the apostrophe entity.
pub fn unescape(text: &str) -> String {
	if !text.contains('&') {
		return text.to_string();
	}

	text.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&#39;", "'")
		.replace("&amp;", "&")
}
