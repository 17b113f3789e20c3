use crate::dom::{unescape, Node};
use crate::{Error, RenderConfig, Result};

/// Parses `markup` into a fragment with the `tl` parser.
///
/// Tag and attribute names are lowercased; valueless attributes get an
/// empty value. Comments keep their inner text.
pub fn parse_fragment(markup: &str, config: &RenderConfig) -> Result<Node> {
	let dom = tl::parse(markup, tl::ParserOptions::default())
		.map_err(|error| Error::Parse(format!("{:?}", error)))?;

	let parser = dom.parser();
	let fragment = Node::fragment();

	for handle in dom.children() {
		if let Some(node) = convert(*handle, parser, config) {
			fragment.append_child(&node);
		}
	}

	Ok(fragment)
}

fn convert(handle: tl::NodeHandle, parser: &tl::Parser, config: &RenderConfig) -> Option<Node> {
	let node = handle.get(parser)?;

	match node {
		tl::Node::Tag(tag) => {
			let element = Node::element(&tag.name().as_utf8_str());

			for (name, value) in tag.attributes().iter() {
				let name = name.to_ascii_lowercase();
				let value = value.map(|value| unescape(&value)).unwrap_or_default();
				element.set_attribute(&name, &value);
			}

			for child in tag.children().top().iter() {
				if let Some(child) = convert(*child, parser, config) {
					element.append_child(&child);
				}
			}

			Some(element)
		}
		tl::Node::Raw(bytes) => {
			let text = bytes.as_utf8_str();
			if config.trims_whitespace() && text.trim().is_empty() {
				None
			} else {
				Some(Node::text(&unescape(&text)))
			}
		}
		tl::Node::Comment(bytes) => {
			let raw = bytes.as_utf8_str();
			let inner = raw.strip_prefix("<!--").unwrap_or(&raw);
			let inner = inner.strip_suffix("-->").unwrap_or(inner);
			Some(Node::comment(inner))
		}
	}
}
