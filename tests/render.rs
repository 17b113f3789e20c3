use std::cell::Cell;
use std::rc::Rc;

use trellis::{
	html, list, record, watch, Content, Error, Event, Node, NodeId, Partial, RenderConfig, Renderer,
	Runtime, Template, Value,
};

use crate::init_tracing;

fn number(value: Value) -> f64 {
	value.as_f64().unwrap_or_default()
}

fn ids(nodes: &[Node]) -> Vec<NodeId> {
	nodes.iter().map(Node::id).collect()
}

fn row(label: &str) -> Template {
	let label = label.to_string();
	html!("<li>" [(label) _cx => label.clone()] "</li>")
}

fn keyed(id: u64, label: &str) -> Template {
	row(label).with_key(id)
}

#[test]
fn static_markup() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer
		.render(html!("<p class=\"a\">hello <b>world</b></p>"))
		.unwrap();

	assert_eq!(mount.to_markup(), "<p class=\"a\">hello <b>world</b></p>");
	assert_eq!(mount.text_content(), "hello world");
	assert_eq!(mount.chunks(), 1);
	assert_eq!(mount.root().to_markup(), mount.to_markup());
}

#[test]
fn only_affected_placeholders_update() {
	init_tracing();

	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "count" => 1, "label" => "x" });
	let label_runs = Rc::new(Cell::new(0));

	let mount = renderer
		.render(html!(
			"<div><p>" [(state) cx => number(state.get(cx, "count")) * 2.0] "</p>"
			"<span>" [(state, label_runs) cx => {
				label_runs.set(label_runs.get() + 1);
				state.get(cx, "label")
			}] "</span></div>"
		))
		.unwrap();

	assert_eq!(mount.to_markup(), "<div><p>2</p><span>x</span></div>");

	let paragraph = mount.nodes()[0].first_child().unwrap();
	let text = paragraph.first_child().unwrap();

	state.set("count", 5);

	assert_eq!(mount.to_markup(), "<div><p>10</p><span>x</span></div>");
	assert_eq!(paragraph.first_child(), Some(text));
	assert_eq!(label_runs.get(), 1);
}

#[test]
fn same_shape_chunks_are_reused_by_position() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer
		.render(vec![row("A"), row("B"), row("C")])
		.unwrap();
	let before = ids(&mount.nodes());

	assert_eq!(mount.to_markup(), "<li>A</li><li>B</li><li>C</li>");
	assert_eq!(renderer.cached_templates(), 1);

	let stats = mount.update(vec![row("A"), row("B"), row("D")]).unwrap();

	assert_eq!(stats.reused, 3);
	assert_eq!(stats.rendered, 0);
	assert_eq!(stats.moved, 0);
	assert_eq!(mount.to_markup(), "<li>A</li><li>B</li><li>D</li>");
	assert_eq!(ids(&mount.nodes()), before);
	assert_eq!(renderer.cached_templates(), 1);
}

#[test]
fn keyed_chunks_follow_their_key() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer
		.render(vec![keyed(1, "A"), keyed(2, "B")])
		.unwrap();
	let before = ids(&mount.nodes());

	let stats = mount.update(vec![keyed(2, "B"), keyed(1, "A")]).unwrap();

	assert_eq!(stats.reused, 2);
	assert_eq!(stats.rendered, 0);
	assert_eq!(stats.removed, 0);
	assert!(stats.moved >= 1);
	assert_eq!(mount.to_markup(), "<li>B</li><li>A</li>");
	assert_eq!(ids(&mount.nodes()), vec![before[1], before[0]]);
}

#[test]
fn keyed_chunk_with_other_markup_is_rendered_again() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer.render(keyed(1, "A")).unwrap();
	let stats = mount
		.update(html!("<p>other</p>").with_key(1))
		.unwrap();

	assert_eq!(stats.reused, 0);
	assert_eq!(stats.rendered, 1);
	assert_eq!(stats.removed, 1);
	assert_eq!(mount.to_markup(), "<p>other</p>");
}

#[test]
fn shrinking_keeps_the_remaining_rows_bound() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "suffix" => "!" });

	let item = |label: &'static str| html!("<li>" [(state) cx => format!("{}{}", label, state.get(cx, "suffix"))] "</li>");

	let mount = renderer
		.render(vec![item("a"), item("b"), item("c")])
		.unwrap();
	assert_eq!(mount.to_markup(), "<li>a!</li><li>b!</li><li>c!</li>");
	assert_eq!(state.subscribers("suffix"), 3);

	let stats = mount.update(vec![item("a")]).unwrap();

	assert_eq!(stats.reused, 1);
	assert_eq!(stats.removed, 2);
	assert_eq!(mount.to_markup(), "<li>a!</li>");
	assert_eq!(state.subscribers("suffix"), 1);

	state.set("suffix", "?");
	assert_eq!(mount.to_markup(), "<li>a?</li>");
}

#[test]
fn mismatched_chunks_render_as_one_run() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer.render(row("A")).unwrap();
	let stats = mount
		.update(vec![html!("<p>x</p>"), html!("<p>y</p>")])
		.unwrap();

	assert_eq!(stats.rendered, 2);
	assert_eq!(stats.removed, 1);
	assert_eq!(stats.reused, 0);
	assert_eq!(mount.chunks(), 2);
	assert_eq!(mount.to_markup(), "<p>x</p><p>y</p>");
	assert_eq!(renderer.cached_templates(), 2);
}

#[test]
fn empty_content_leaves_a_placeholder() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer.render(Partial::new()).unwrap();

	assert_eq!(mount.chunks(), 1);
	assert_eq!(mount.to_markup(), "");
	let nodes = mount.nodes();
	assert_eq!(nodes.len(), 1);
	assert!(nodes[0].is_text());

	let stats = mount.update(html!("<b>x</b>")).unwrap();
	assert_eq!(stats.removed, 1);
	assert_eq!(mount.to_markup(), "<b>x</b>");

	mount.update(Partial::new()).unwrap();
	assert_eq!(mount.to_markup(), "");
	assert_eq!(mount.root().child_count(), 1);
}

#[test]
fn text_chunks_update_in_place() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);

	let mount = renderer
		.render(vec![Content::from("a<b"), Content::from(1)])
		.unwrap();
	assert_eq!(mount.to_markup(), "a&lt;b1");
	let before = ids(&mount.nodes());

	let stats = mount
		.update(vec![Content::from("c"), Content::from("d")])
		.unwrap();

	assert_eq!(stats.reused, 2);
	assert_eq!(mount.text_content(), "cd");
	assert_eq!(ids(&mount.nodes()), before);
}

#[test]
fn listeners_are_released_with_their_chunk() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let clicks = Rc::new(Cell::new(0));

	let button = || {
		html!("<div><button onclick=" [on (clicks) ev => {
			assert_eq!(ev.name(), "click");
			clicks.set(clicks.get() + 1);
		}] ">go</button></div>")
	};

	let mount = renderer.render(vec![button(), button()]).unwrap();
	assert_eq!(renderer.listener_count(), 2);

	let target = mount.nodes()[0].first_child().unwrap();
	assert!(!target.has_attribute("onclick"));
	assert_eq!(renderer.listeners_of(&target), 1);
	assert_eq!(renderer.dispatch(&target, &Event::new("click")), 1);

	let label = target.first_child().unwrap();
	assert_eq!(renderer.dispatch(&label, &Event::new("click")), 1);
	assert_eq!(renderer.dispatch(&label, &Event::new("input")), 0);
	assert_eq!(clicks.get(), 2);

	mount.update(vec![button()]).unwrap();
	assert_eq!(renderer.listener_count(), 1);

	mount.update(Partial::new()).unwrap();
	assert_eq!(renderer.listener_count(), 0);
}

#[test]
fn dispatch_bubbles_until_stopped() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "outer" => 0, "inner" => 0, "stop" => false });

	let mount = renderer
		.render(html!(
			"<div onclick=" [on (state) _ev => state.update("outer", |v| Value::from(number(v) + 1.0))] ">"
			"<button onclick=" [on (state) ev => {
				state.update("inner", |v| Value::from(number(v) + 1.0));
				if state.get_once("stop").is_truthy() {
					ev.stop_propagation();
				}
			}] ">go</button>"
			"<span>" [(state) cx => state.get(cx, "outer")] "</span>"
			"</div>"
		))
		.unwrap();

	let button = mount.nodes()[0].first_child().unwrap();

	assert_eq!(renderer.dispatch(&button, &Event::new("click")), 2);
	assert_eq!(mount.text_content(), "go1");

	state.set("stop", true);
	assert_eq!(renderer.dispatch(&button, &Event::new("click")), 1);
	assert_eq!(state.get_once("inner"), Value::from(2));
	assert_eq!(state.get_once("outer"), Value::from(1));
}

#[test]
fn reflected_properties_skip_redundant_attribute_writes() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "on" => true });

	let mount = renderer
		.render(html!("<input type=\"checkbox\" checked=" [(state) cx => state.get(cx, "on")] " />"))
		.unwrap();

	let input = mount.nodes()[0].clone();
	assert_eq!(input.tag(), Some("input"));
	assert_eq!(input.property("checked"), Some(Value::Bool(true)));
	assert!(input.has_attribute("checked"));

	let revision = input.revision();
	state.set("on", 1);
	assert_eq!(input.revision(), revision);

	state.set("on", false);
	assert_eq!(input.property("checked"), Some(Value::Bool(false)));
	assert!(!input.has_attribute("checked"));
	assert_eq!(input.attribute("type").as_deref(), Some("checkbox"));
}

#[test]
fn interpolated_attributes() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "active" => true, "hidden" => false });

	let mount = renderer
		.render(html!(
			"<div class=\"card " [(state) cx => if state.get(cx, "active").is_truthy() { "active" } else { "" }] "\" "
			[(state) cx => if state.get(cx, "hidden").is_truthy() { "hidden" } else { "" }] ">x</div>"
		))
		.unwrap();

	let div = mount.nodes()[0].clone();
	assert_eq!(div.attribute("class").as_deref(), Some("card active"));
	assert!(!div.has_attribute("hidden"));

	state.set("active", false);
	state.set("hidden", true);

	assert_eq!(div.attribute("class").as_deref(), Some("card "));
	assert!(div.has_attribute("hidden"));
	assert!(!div.attributes().iter().any(|(name, _)| name.starts_with("trellis:")));
}

#[test]
fn observable_list_drives_rows() {
	init_tracing();

	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "items" => list!["a", "b"] });

	let mount = renderer
		.render(html!(
			"<ul>" [(state) cx => {
				state
					.get(cx, "items")
					.as_observable()
					.map(|items| {
						items
							.items(cx)
							.into_iter()
							.map(|item| html!("<li>" [(item) _cx => item.clone()] "</li>"))
							.collect::<Vec<_>>()
					})
					.unwrap_or_default()
			}] "</ul>"
		))
		.unwrap();

	assert_eq!(mount.to_markup(), "<ul><li>a</li><li>b</li></ul>");

	let list = mount.nodes()[0].clone();
	let first = list.first_child().unwrap();
	let items = state.get_once("items").as_observable().cloned().unwrap();

	items.push("c");
	assert_eq!(mount.to_markup(), "<ul><li>a</li><li>b</li><li>c</li></ul>");

	items.remove_at(0);
	assert_eq!(mount.to_markup(), "<ul><li>b</li><li>c</li></ul>");
	assert_eq!(list.first_child(), Some(first));
	assert_eq!(list.child_count(), 2);
}

#[test]
fn nested_regions_move_with_their_chunk() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "mark" => "|" });

	let item = |id: u64, label: &'static str| {
		html!("<i>" [_cx => label] "</i>" [(state) cx => state.get(cx, "mark")]).with_key(id)
	};

	let mount = renderer.render(vec![item(1, "A"), item(2, "B")]).unwrap();
	assert_eq!(mount.to_markup(), "<i>A</i>|<i>B</i>|");
	assert_eq!(mount.nodes().len(), 4);

	let stats = mount.update(vec![item(2, "B"), item(1, "A")]).unwrap();
	assert_eq!(stats.reused, 2);
	assert_eq!(mount.to_markup(), "<i>B</i>|<i>A</i>|");

	state.set("mark", "+");
	assert_eq!(mount.to_markup(), "<i>B</i>+<i>A</i>+");
	assert_eq!(mount.root().child_count(), 4);
}

#[test]
fn detached_regions_report_an_error() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let container = Node::element("div");

	let mount = renderer.mount(html!("<b>x</b>"), &container).unwrap();
	assert_eq!(container.to_markup(), "<div><b>x</b></div>");

	for node in mount.nodes() {
		node.remove();
	}

	assert_eq!(mount.update(html!("<i>y</i>")), Err(Error::Detached));
}

#[test]
fn watches_can_fill_placeholders() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let state = runtime.observe(record! { "n" => 1 });

	let doubled = watch!(runtime, (state) cx => number(state.get(cx, "n")) * 2.0);
	let mount = renderer.render(html!("<b>" {doubled.clone()} "</b>")).unwrap();

	assert_eq!(mount.to_markup(), "<b>2</b>");

	state.set("n", 3);
	assert_eq!(mount.to_markup(), "<b>6</b>");
}

#[test]
fn unmount_releases_everything() {
	let runtime = Runtime::new();
	let renderer = Renderer::new(&runtime);
	let container = Node::element("section");

	let mount = renderer
		.mount(html!("<button onclick=" [on _ev => {}] ">x</button>"), &container)
		.unwrap();
	assert_eq!(renderer.listener_count(), 1);

	mount.unmount();

	assert_eq!(renderer.listener_count(), 0);
	assert_eq!(container.child_count(), 0);
}

#[test]
fn whitespace_handling_is_configurable() {
	let runtime = Runtime::new();
	let template = || html!("<p>a</p> <p>b</p>");

	let trimmed = Renderer::new(&runtime).render(template()).unwrap();
	assert_eq!(trimmed.nodes().len(), 2);
	assert_eq!(trimmed.to_markup(), "<p>a</p><p>b</p>");

	let config = RenderConfig::default().trim_whitespace(false);
	let kept = Renderer::with_config(&runtime, config)
		.render(template())
		.unwrap();
	assert_eq!(kept.nodes().len(), 3);
	assert_eq!(kept.to_markup(), "<p>a</p> <p>b</p>");
}
