use std::cell::RefCell;
use std::rc::Rc;

use fxhash::{FxHashMap, FxHashSet};

use crate::dom::Node;
use crate::render::binding;
use crate::render::chunk::{Chunk, ChunkKind, Entry};
use crate::render::partial::{Partial, Seed};
use crate::render::{GroupId, PatchStats, Renderer};
use crate::{Error, Result};

const BOUNDARY: &str = "trellis-chunk";
const TEXT: &str = "trellis-text";

/// The live sibling range rendered for one content slot or mount point.
#[derive(Clone)]
pub(crate) struct Region {
	body: Rc<RegionBody>,
}

struct RegionBody {
	renderer: Renderer,
	group: GroupId,
	chunks: RefCell<Vec<Chunk>>,
	/// Marks the position until the first update.
	anchor: RefCell<Option<Node>>,
}

enum Item {
	/// A keyed chunk carried over from the previous render, already rebound.
	Keep(Chunk),
	Seed(Seed),
}

enum Step {
	Reuse(Chunk),
	Render(Chunk),
}

impl Region {
	pub(crate) fn new(renderer: &Renderer, anchor: Node) -> Self {
		Region {
			body: Rc::new(RegionBody {
				renderer: renderer.clone(),
				group: renderer.next_group(),
				chunks: RefCell::new(Vec::new()),
				anchor: RefCell::new(Some(anchor)),
			}),
		}
	}

	/// Current nodes in order; the anchor before the first update.
	pub(crate) fn nodes(&self) -> Vec<Node> {
		let chunks = self.body.chunks.borrow();
		if chunks.is_empty() {
			return self.body.anchor.borrow().iter().cloned().collect();
		}
		chunks.iter().flat_map(Chunk::nodes).collect()
	}

	pub(crate) fn chunks(&self) -> usize {
		self.body.chunks.borrow().len()
	}

	/// Reconciles the region against `partial`.
	///
	/// Keyed chunks are matched first (during resolution), then unkeyed
	/// chunks by position and shape; everything else is rendered in runs of
	/// consecutive new chunks. Previous chunks nobody took over are removed
	/// before anything is placed. Nodes of this region found after the last
	/// chunk, such as those placed by a pass that failed midway, are trimmed.
	pub(crate) fn update(&self, partial: Partial) -> Result<PatchStats> {
		let renderer = &self.body.renderer;
		let prev: Vec<Chunk> = self.body.chunks.borrow().clone();

		let old_nodes = self.nodes();
		let first = old_nodes.first().ok_or(Error::Detached)?;
		let parent = first.parent().ok_or(Error::Detached)?;
		let mut cursor = first.previous_sibling();

		let mut stats = PatchStats::default();
		let mut kept: FxHashSet<usize> = FxHashSet::default();
		let mut steps = Vec::new();

		for (index, item) in self.resolve(partial, &prev).into_iter().enumerate() {
			match item {
				Item::Keep(chunk) => {
					kept.insert(chunk.addr());
					steps.push(Step::Reuse(chunk));
				}
				Item::Seed(seed) => {
					let previous = prev.get(index).filter(|old| {
						old.key().is_none()
							&& seed_key(&seed).is_none()
							&& !kept.contains(&old.addr())
							&& old.same_shape(&seed)
					});

					match previous {
						Some(old) => {
							old.adopt(&seed);
							kept.insert(old.addr());
							steps.push(Step::Reuse(old.clone()));
						}
						None => steps.push(Step::Render(Chunk::new(seed))),
					}
				}
			}
		}

		for old in &prev {
			if !kept.contains(&old.addr()) {
				for node in old.nodes() {
					node.remove();
					renderer.release(&node);
				}
				stats.removed += 1;
			}
		}

		if let Some(anchor) = self.body.anchor.borrow_mut().take() {
			anchor.remove();
			renderer.release(&anchor);
		}

		let mut chunks = Vec::with_capacity(steps.len());
		let mut run = Vec::new();

		for step in steps {
			match step {
				Step::Reuse(chunk) => {
					self.place_run(&parent, &mut cursor, &mut run, &mut stats)?;
					if self.place(&parent, &mut cursor, &chunk.nodes())? {
						stats.moved += 1;
					}
					stats.reused += 1;
					chunks.push(chunk);
				}
				Step::Render(chunk) => {
					run.push(chunk.clone());
					chunks.push(chunk);
				}
			}
		}

		self.place_run(&parent, &mut cursor, &mut run, &mut stats)?;

		let claimed: FxHashSet<_> = chunks
			.iter()
			.flat_map(Chunk::nodes)
			.map(|node| node.id())
			.collect();

		loop {
			let next = match &cursor {
				Some(cursor) => cursor.next_sibling(),
				None => parent.first_child(),
			};

			let Some(next) = next else {
				break;
			};

			if claimed.contains(&next.id()) || renderer.group_of(&next) != Some(self.body.group) {
				break;
			}

			next.remove();
			renderer.release(&next);
			stats.trimmed += 1;
		}

		*self.body.chunks.borrow_mut() = chunks;

		tracing::debug!(
			group = self.body.group.0,
			reused = stats.reused,
			moved = stats.moved,
			rendered = stats.rendered,
			removed = stats.removed,
			trimmed = stats.trimmed,
			"region patched"
		);

		Ok(stats)
	}

	/// Resolves keyed templates against the previous keyed chunks. A match
	/// with the same markup is carried over and rebound to the new template.
	fn resolve(&self, partial: Partial, prev: &[Chunk]) -> Vec<Item> {
		let mut keyed: FxHashMap<u64, Chunk> = FxHashMap::default();
		for chunk in prev {
			if let Some(key) = chunk.key() {
				keyed.entry(key).or_insert_with(|| chunk.clone());
			}
		}

		let mut seeds = partial.into_seeds();
		if seeds.is_empty() {
			seeds.push(Seed::Empty);
		}

		seeds
			.into_iter()
			.map(|seed| {
				if let Seed::Template(template) = &seed {
					if let Some(key) = template.key() {
						match keyed.remove(&key) {
							Some(chunk) if chunk.is_materialized() && chunk.same_shape(&seed) => {
								chunk.rebind(template);
								return Item::Keep(chunk);
							}
							_ => {}
						}
					}
				}
				Item::Seed(seed)
			})
			.collect()
	}

	/// Moves `nodes` right after the cursor unless they are already there.
	/// Returns whether anything moved.
	fn place(&self, parent: &Node, cursor: &mut Option<Node>, nodes: &[Node]) -> Result<bool> {
		let mut moved = false;

		for node in nodes {
			let expected = match cursor.as_ref() {
				Some(cursor) => cursor.next_sibling(),
				None => parent.first_child(),
			};

			if expected.as_ref() != Some(node) {
				parent.insert_before(node, expected.as_ref())?;
				moved = true;
			}

			*cursor = Some(node.clone());
		}

		Ok(moved)
	}

	fn place_run(
		&self,
		parent: &Node,
		cursor: &mut Option<Node>,
		run: &mut Vec<Chunk>,
		stats: &mut PatchStats,
	) -> Result<()> {
		if run.is_empty() {
			return Ok(());
		}

		let run = std::mem::take(run);
		self.materialize(&run)?;

		for chunk in &run {
			self.place(parent, cursor, &chunk.nodes())?;
		}

		stats.rendered += run.len();
		Ok(())
	}

	/// Renders a run of new chunks with one parse, splits the result at the
	/// boundaries and binds each chunk to its nodes.
	fn materialize(&self, run: &[Chunk]) -> Result<()> {
		let renderer = &self.body.renderer;

		if let [chunk] = run {
			if let Some(text) = chunk.text() {
				let node = Node::text(&text);
				renderer.tag(&node, self.body.group);
				chunk.set_entries(vec![Entry::Node(node)]);
				return Ok(());
			}
		}

		let mut markup = String::new();
		for chunk in run {
			markup.push_str("<!--");
			markup.push_str(BOUNDARY);
			markup.push_str("-->");

			match chunk.kind() {
				ChunkKind::Template => markup.push_str(chunk.markup()),
				ChunkKind::Text(_) => {
					markup.push_str("<!--");
					markup.push_str(TEXT);
					markup.push_str("-->");
				}
				ChunkKind::Placeholder => {}
			}
		}

		let fragment = renderer.instantiate(&markup)?;

		let mut ranges: Vec<Vec<Node>> = Vec::with_capacity(run.len());
		for node in fragment.children() {
			if node.is_comment() && &*node.data() == BOUNDARY {
				node.remove();
				ranges.push(Vec::new());
			} else if let Some(range) = ranges.last_mut() {
				range.push(node);
			}
		}

		if ranges.len() != run.len() {
			return Err(Error::Parse(format!(
				"expected {} chunk boundaries, found {}",
				run.len(),
				ranges.len()
			)));
		}

		for (chunk, mut nodes) in run.iter().zip(ranges) {
			if let Some(text) = chunk.text() {
				for node in nodes.iter_mut() {
					if node.is_comment() && &*node.data() == TEXT {
						let replacement = Node::text(&text);
						node.replace_with(&replacement)?;
						*node = replacement;
					}
				}
			}

			if nodes.is_empty() {
				let anchor = Node::text("");
				fragment.append_child(&anchor);
				nodes.push(anchor);
			}

			for node in &nodes {
				renderer.tag(node, self.body.group);
			}

			chunk.set_entries(nodes.into_iter().map(Entry::Node).collect());
			binding::bind(renderer, chunk)?;
		}

		Ok(())
	}
}

fn seed_key(seed: &Seed) -> Option<u64> {
	match seed {
		Seed::Template(template) => template.key(),
		_ => None,
	}
}
