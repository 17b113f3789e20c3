//! Chunk rendering and reconciliation.

mod binding;
mod chunk;
mod mount;
mod partial;
mod region;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fxhash::FxHashMap;
use smallvec::SmallVec;

pub use mount::Mount;
pub use partial::Partial;

use crate::dom::{parse_fragment, Node, NodeId};
use crate::template::Expression;
use crate::{RenderConfig, Result, Runtime, Value};

use region::Region;

/// Identity of the nodes one region placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct GroupId(pub(crate) u64);

/// What one reconciliation did, counted in chunks, except `trimmed`, which
/// counts stray nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStats {
	/// Chunks that kept their nodes.
	pub reused: usize,
	/// Reused chunks whose nodes had to be relocated.
	pub moved: usize,
	/// Chunks rendered from markup.
	pub rendered: usize,
	/// Previous chunks whose nodes were removed.
	pub removed: usize,
	pub trimmed: usize,
}

/// An event dispatched through [`Renderer::dispatch`].
pub struct Event {
	name: Rc<str>,
	detail: Value,
	target: RefCell<Option<Node>>,
	current: RefCell<Option<Node>>,
	stopped: Cell<bool>,
}

impl Event {
	pub fn new(name: &str) -> Self {
		Event {
			name: name.into(),
			detail: Value::Null,
			target: RefCell::new(None),
			current: RefCell::new(None),
			stopped: Cell::new(false),
		}
	}

	pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
		self.detail = detail.into();
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn detail(&self) -> &Value {
		&self.detail
	}

	/// The node the event was dispatched to.
	pub fn target(&self) -> Option<Node> {
		self.target.borrow().clone()
	}

	/// The node whose listener is running.
	pub fn current_target(&self) -> Option<Node> {
		self.current.borrow().clone()
	}

	pub fn stop_propagation(&self) {
		self.stopped.set(true);
	}

	pub fn is_stopped(&self) -> bool {
		self.stopped.get()
	}
}

impl std::fmt::Debug for Event {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Event")
			.field("name", &self.name)
			.field("detail", &self.detail)
			.finish()
	}
}

type Listeners = SmallVec<[(Rc<str>, Expression); 2]>;

/// Renders content into the output tree and keeps it current.
///
/// The renderer owns the parsed-template cache and two side tables keyed by
/// node identity: event listeners and render groups. Both are cleared when
/// the renderer removes a node.
#[derive(Clone)]
pub struct Renderer {
	inner: Rc<RendererInner>,
}

struct RendererInner {
	runtime: Runtime,
	config: RenderConfig,
	templates: RefCell<FxHashMap<Rc<str>, Node>>,
	listeners: RefCell<FxHashMap<NodeId, Listeners>>,
	groups: RefCell<FxHashMap<NodeId, GroupId>>,
	next_group: Cell<u64>,
}

impl Renderer {
	pub fn new(runtime: &Runtime) -> Self {
		Self::with_config(runtime, RenderConfig::default())
	}

	pub fn with_config(runtime: &Runtime, config: RenderConfig) -> Self {
		Renderer {
			inner: Rc::new(RendererInner {
				runtime: runtime.clone(),
				config,
				templates: RefCell::new(FxHashMap::default()),
				listeners: RefCell::new(FxHashMap::default()),
				groups: RefCell::new(FxHashMap::default()),
				next_group: Cell::new(0),
			}),
		}
	}

	pub fn runtime(&self) -> &Runtime {
		&self.inner.runtime
	}

	pub fn config(&self) -> &RenderConfig {
		&self.inner.config
	}

	/// Renders `content` into a fresh fragment.
	pub fn render(&self, content: impl Into<Partial>) -> Result<Mount> {
		let root = Node::fragment();
		self.mount(content, &root)
	}

	/// Renders `content` at the end of `container`.
	pub fn mount(&self, content: impl Into<Partial>, container: &Node) -> Result<Mount> {
		let anchor = Node::comment("");
		container.append_child(&anchor);

		let region = Region::new(self, anchor);
		let partial = content.into();
		let stats = self.inner.runtime.batch(|| region.update(partial))?;

		tracing::debug!(rendered = stats.rendered, "mounted");
		Ok(Mount::new(self.clone(), region, container.clone()))
	}

	/// Runs the listeners for `event` on `target` and then on its ancestors,
	/// in one batch. Returns how many listeners ran.
	pub fn dispatch(&self, target: &Node, event: &Event) -> usize {
		self.inner.runtime.batch(|| {
			*event.target.borrow_mut() = Some(target.clone());

			let mut handled = 0;
			let mut node = Some(target.clone());

			while let Some(current) = node {
				let handlers: Vec<Expression> = self
					.inner
					.listeners
					.borrow()
					.get(&current.id())
					.map(|listeners| {
						listeners
							.iter()
							.filter(|(name, _)| **name == *event.name)
							.map(|(_, expression)| expression.clone())
							.collect()
					})
					.unwrap_or_default();

				*event.current.borrow_mut() = Some(current.clone());

				for handler in handlers {
					if handler.handle(event) {
						handled += 1;
					}
				}

				if event.is_stopped() {
					break;
				}

				node = current.parent();
			}

			*event.current.borrow_mut() = None;
			handled
		})
	}

	/// Total number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.borrow().values().map(|list| list.len()).sum()
	}

	/// Listeners registered on `node` itself.
	pub fn listeners_of(&self, node: &Node) -> usize {
		self.inner
			.listeners
			.borrow()
			.get(&node.id())
			.map_or(0, |list| list.len())
	}

	/// Number of distinct markups parsed so far.
	pub fn cached_templates(&self) -> usize {
		self.inner.templates.borrow().len()
	}

	/// Forgets the listeners and group tags of `node` and its subtree. The
	/// renderer calls this for every node it removes; call it for nodes
	/// removed by other means.
	pub fn release(&self, node: &Node) {
		let mut listeners = self.inner.listeners.borrow_mut();
		let mut groups = self.inner.groups.borrow_mut();
		node.walk(&mut |node| {
			listeners.remove(&node.id());
			groups.remove(&node.id());
		});
	}

	pub(crate) fn listen(&self, node: &Node, event: &str, expression: Expression) {
		self.inner
			.listeners
			.borrow_mut()
			.entry(node.id())
			.or_default()
			.push((event.into(), expression));
	}

	pub(crate) fn next_group(&self) -> GroupId {
		let group = self.inner.next_group.get() + 1;
		self.inner.next_group.set(group);
		GroupId(group)
	}

	pub(crate) fn tag(&self, node: &Node, group: GroupId) {
		self.inner.groups.borrow_mut().insert(node.id(), group);
	}

	pub(crate) fn group_of(&self, node: &Node) -> Option<GroupId> {
		self.inner.groups.borrow().get(&node.id()).copied()
	}

	/// A fresh copy of the parsed `markup`. Each distinct markup is parsed
	/// once.
	pub(crate) fn instantiate(&self, markup: &str) -> Result<Node> {
		let cached = self.inner.templates.borrow().get(markup).cloned();

		let template = match cached {
			Some(template) => template,
			None => {
				tracing::debug!(len = markup.len(), "parsing template");
				let parsed = parse_fragment(markup, &self.inner.config)?;
				self.inner
					.templates
					.borrow_mut()
					.insert(markup.into(), parsed.clone());
				parsed
			}
		};

		Ok(template.deep_clone())
	}
}

impl std::fmt::Debug for Renderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Renderer")
			.field("templates", &self.cached_templates())
			.field("listeners", &self.listener_count())
			.finish()
	}
}
