use std::cell::RefCell;
use std::rc::Rc;

use enclose::enclose;

use crate::dom::Node;
use crate::render::chunk::{Binding, Chunk, Entry};
use crate::render::partial::Partial;
use crate::render::region::Region;
use crate::render::Renderer;
use crate::template::{sentinel_index, Content, Expression, SENTINEL};
use crate::{Error, Evaluation, Result, Value, Watch};

enum Site {
	Content { anchor: Node, index: usize },
	Attribute { element: Node, name: Rc<str>, value: Rc<str> },
}

enum Segment {
	Text(String),
	Expr(usize),
}

enum Part {
	Text(String),
	Expr(Expression),
}

/// Installs the bindings of a freshly materialized chunk: content
/// placeholders become nested regions, attribute placeholders become
/// attribute, property or listener bindings.
pub(crate) fn bind(renderer: &Renderer, chunk: &Chunk) -> Result<()> {
	if chunk.expressions().is_empty() {
		return Ok(());
	}

	let mut sites = Vec::new();
	for node in chunk.nodes() {
		node.walk(&mut |node| collect(node, &mut sites));
	}

	for site in sites {
		match site {
			Site::Content { anchor, index } => bind_content(renderer, chunk, anchor, index)?,
			Site::Attribute {
				element,
				name,
				value,
			} => bind_attribute(renderer, chunk, element, name, &value)?,
		}
	}

	Ok(())
}

fn collect(node: &Node, sites: &mut Vec<Site>) {
	if node.is_comment() {
		if let Some(index) = sentinel_index(&node.data()) {
			sites.push(Site::Content {
				anchor: node.clone(),
				index,
			});
		}
		return;
	}

	if node.tag().is_none() {
		return;
	}

	for (name, value) in node.attributes() {
		if name.starts_with(SENTINEL) || value.contains(SENTINEL) {
			sites.push(Site::Attribute {
				element: node.clone(),
				name,
				value,
			});
		}
	}
}

fn expression(chunk: &Chunk, index: usize) -> Result<Expression> {
	chunk
		.expressions()
		.get(index)
		.cloned()
		.ok_or(Error::MissingExpression(index))
}

fn bind_content(renderer: &Renderer, chunk: &Chunk, anchor: Node, index: usize) -> Result<()> {
	let expression = expression(chunk, index)?;
	let region = Region::new(renderer, anchor.clone());

	let watch = Watch::with_after(
		renderer.runtime(),
		enclose!((expression) move |cx: &Evaluation| expression.evaluate(cx)),
		enclose!((region) move |content: Content| {
			if let Err(error) = region.update(Partial::from(content)) {
				tracing::error!(%error, "failed to update a region");
			}
			Content::Empty
		}),
	);

	chunk.with_entries_mut(|entries| {
		for entry in entries.iter_mut() {
			if matches!(entry, Entry::Node(node) if *node == anchor) {
				*entry = Entry::Region(region.clone());
			}
		}
	});

	chunk.push_binding(Binding::Region(watch));
	Ok(())
}

fn bind_attribute(
	renderer: &Renderer,
	chunk: &Chunk,
	element: Node,
	name: Rc<str>,
	value: &str,
) -> Result<()> {
	element.remove_attribute(&name);

	if let Some(index) = sentinel_index(&name) {
		let expression = expression(chunk, index)?;
		let current: RefCell<Option<Rc<str>>> = RefCell::new(None);

		let watch = Watch::new(renderer.runtime(), move |cx| {
			let next = expression
				.evaluate(cx)
				.to_attribute()
				.filter(|name| !name.is_empty());

			let mut current = current.borrow_mut();
			if *current == next {
				return;
			}
			if let Some(previous) = current.take() {
				element.remove_attribute(&previous);
			}
			if let Some(next) = &next {
				element.set_attribute(next, "");
			}
			*current = next;
		});

		chunk.push_binding(Binding::Attribute(watch));
		return Ok(());
	}

	let segments = segments(value);

	let watch = match segments.as_slice() {
		[Segment::Expr(index)] => {
			let expression = expression(chunk, *index)?;

			if expression.is_handler() {
				let event = name.strip_prefix("on").unwrap_or(&name);
				renderer.listen(&element, event, expression);
				return Ok(());
			}

			if renderer.config().is_property(&name) {
				let reflected = renderer.config().is_reflected(&name);
				Watch::new(renderer.runtime(), move |cx| {
					set_property(&element, &name, expression.evaluate(cx), reflected)
				})
			} else {
				Watch::new(renderer.runtime(), move |cx| {
					set_attribute(&element, &name, &expression.evaluate(cx))
				})
			}
		}
		_ => {
			let mut parts = Vec::with_capacity(segments.len());
			for segment in &segments {
				parts.push(match segment {
					Segment::Text(text) => Part::Text(text.clone()),
					Segment::Expr(index) => Part::Expr(expression(chunk, *index)?),
				});
			}

			Watch::new(renderer.runtime(), move |cx| {
				let mut value = String::new();
				for part in &parts {
					match part {
						Part::Text(text) => value.push_str(text),
						Part::Expr(expression) => value.push_str(&expression.evaluate(cx).to_text()),
					}
				}
				element.set_attribute(&name, &value);
			})
		}
	};

	chunk.push_binding(Binding::Attribute(watch));
	Ok(())
}

fn set_attribute(element: &Node, name: &str, content: &Content) {
	match content.to_attribute() {
		Some(value) => element.set_attribute(name, &value),
		None => element.remove_attribute(name),
	}
}

/// Writes an IDL property. Boolean properties reflect to the content
/// attribute, which is only touched when it does not reflect already.
fn set_property(element: &Node, name: &str, content: Content, reflected: bool) {
	if !reflected {
		element.set_property(name, content.to_value());
		return;
	}

	let on = content.to_value().is_truthy();
	element.set_property(name, Value::Bool(on));

	if element.has_attribute(name) == on {
		return;
	}

	if on {
		element.set_attribute(name, "");
	} else {
		element.remove_attribute(name);
	}
}

/// Splits an attribute value into literal text and placeholders.
fn segments(value: &str) -> Vec<Segment> {
	let mut segments = Vec::new();
	let mut rest = value;

	while let Some(start) = rest.find(SENTINEL) {
		let digits_at = start + SENTINEL.len();
		let digits = rest[digits_at..]
			.bytes()
			.take_while(|byte| byte.is_ascii_digit())
			.count();

		let index = rest[digits_at..digits_at + digits].parse::<usize>().ok();
		let Some(index) = index else {
			segments.push(Segment::Text(rest[..digits_at].to_string()));
			rest = &rest[digits_at..];
			continue;
		};

		if start > 0 {
			segments.push(Segment::Text(rest[..start].to_string()));
		}
		segments.push(Segment::Expr(index));
		rest = &rest[digits_at + digits..];
	}

	if !rest.is_empty() {
		segments.push(Segment::Text(rest.to_string()));
	}

	segments
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn segments_split_interpolated_values() {
		let segments = segments("btn trellis:0 x-trellis:12trellis:");
		let shape: Vec<String> = segments
			.iter()
			.map(|segment| match segment {
				Segment::Text(text) => format!("t({})", text),
				Segment::Expr(index) => format!("e({})", index),
			})
			.collect();

		assert_eq!(
			shape,
			vec!["t(btn )", "e(0)", "t( x-)", "e(12)", "t(trellis:)"]
		);
	}
}
