use crate::dom::Node;
use crate::render::region::Region;
use crate::render::{Partial, PatchStats, Renderer};
use crate::Result;

/// A rendered region at a fixed place of the output tree.
pub struct Mount {
	renderer: Renderer,
	region: Region,
	root: Node,
}

impl Mount {
	pub(crate) fn new(renderer: Renderer, region: Region, root: Node) -> Self {
		Mount {
			renderer,
			region,
			root,
		}
	}

	/// The container the region was mounted into.
	pub fn root(&self) -> &Node {
		&self.root
	}

	pub fn renderer(&self) -> &Renderer {
		&self.renderer
	}

	/// Top-level nodes of the region, in order.
	pub fn nodes(&self) -> Vec<Node> {
		self.region.nodes()
	}

	/// Number of chunks currently rendered.
	pub fn chunks(&self) -> usize {
		self.region.chunks()
	}

	/// Reconciles the region against `content` in one batch.
	pub fn update(&self, content: impl Into<Partial>) -> Result<PatchStats> {
		let partial = content.into();
		self.renderer.runtime().batch(|| self.region.update(partial))
	}

	pub fn to_markup(&self) -> String {
		self.nodes().iter().map(Node::to_markup).collect()
	}

	pub fn text_content(&self) -> String {
		self.nodes().iter().map(Node::text_content).collect()
	}

	/// Removes the rendered nodes from the tree and drops their bindings.
	pub fn unmount(self) {
		for node in self.region.nodes() {
			node.remove();
			self.renderer.release(&node);
		}
	}
}

impl std::fmt::Debug for Mount {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Mount")
			.field("chunks", &self.chunks())
			.field("markup", &self.to_markup())
			.finish()
	}
}
