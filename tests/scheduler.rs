use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use enclose::enclose;
use mockall::predicate::eq;
use trellis::{record, watch, Evaluation, Runtime, Value};

use crate::init_tracing;
use crate::mock::{SharedMock, Spy};

fn number(value: Value) -> f64 {
	value.as_f64().unwrap_or_default()
}

#[test]
fn batch_coalesces_mutations() {
	init_tracing();

	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1, "b" => 1 });

	let mock = SharedMock::new();
	mock.get().expect_trigger().with(eq(2)).times(1).return_const(());

	let watch = watch!(runtime, (state, mock) cx => {
		mock.get().trigger((number(state.get(cx, "a")) + number(state.get(cx, "b"))) as u64)
	});

	mock.get().checkpoint();
	mock.get().expect_trigger().with(eq(6)).times(1).return_const(());

	runtime.batch(|| {
		state.set("a", 2);
		state.set("b", 3);
		state.set("a", 3);
	});

	mock.get().checkpoint();
	assert_eq!(watch.runs(), 2);

	mock.get().expect_trigger().with(eq(7)).times(1).return_const(());
	state.set("a", 4);

	mock.get().checkpoint();
	assert_eq!(watch.runs(), 3);
}

#[test]
fn unchanged_writes_do_not_schedule() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });

	let mock = SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let _watch = watch!(runtime, (state, mock) cx => {
		mock.get().trigger(number(state.get(cx, "a")) as u64)
	});

	mock.get().checkpoint();
	mock.get().expect_trigger().times(0).return_const(());

	runtime.batch(|| {
		state.set("a", 1);
	});

	mock.get().checkpoint();
}

#[test]
fn watch_stays_scheduled_until_the_batch_ends() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });

	let watch = watch!(runtime, (state) cx => number(state.get(cx, "a")));

	runtime.batch(|| {
		state.set("a", 2);
		state.set("a", 3);

		assert!(watch.is_scheduled());
		assert!(runtime.in_batch());
		assert_eq!(runtime.pending(), 1);
		assert_eq!(watch.runs(), 1);
	});

	assert!(!watch.is_scheduled());
	assert_eq!(runtime.pending(), 0);
	assert_eq!(watch.runs(), 2);
	assert_eq!(watch.get_once(), 3.0);
}

#[test]
fn writes_during_a_flush_join_it() {
	init_tracing();

	let runtime = Runtime::new();
	let state = runtime.observe(record! { "count" => 1 });
	let mirror = runtime.observe(record! { "value" => 0 });

	let _copier = watch!(runtime, (state, mirror) cx => {
		mirror.set("value", number(state.get(cx, "count")) * 2.0);
	});

	let seen = Rc::new(RefCell::new(Vec::new()));
	let _reader = watch!(runtime, (mirror, seen) cx => {
		seen.borrow_mut().push(number(mirror.get(cx, "value")));
	});

	let mock = SharedMock::new();
	mock.get().expect_settled().times(1).return_const(());

	let settled = Rc::new(Cell::new(0.0));
	let passes = runtime.passes();

	runtime.batch(|| {
		state.set("count", 5);
		runtime.after_flush(enclose!((mirror, settled, mock) move || {
			settled.set(number(mirror.get_once("value")));
			mock.get().settled();
		}));
	});

	mock.get().checkpoint();
	assert_eq!(settled.get(), 10.0);
	assert_eq!(*seen.borrow(), vec![2.0, 10.0]);
	assert_eq!(runtime.passes(), passes + 2);
	assert!(!runtime.is_flushing());
}

#[test]
fn after_flush_outside_a_batch_runs_at_once() {
	let runtime = Runtime::new();
	let ran = Rc::new(Cell::new(false));

	runtime.after_flush(enclose!((ran) move || ran.set(true)));

	assert!(ran.get());
}

#[test]
fn chained_watches_run_in_successive_passes() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "count" => 1 });

	let doubled = runtime.watch(enclose!((state) move |cx: &Evaluation| number(state.get(cx, "count")) * 2.0));

	let log = Rc::new(RefCell::new(Vec::new()));
	let shown = watch!(runtime, (doubled, log) cx => log.borrow_mut().push(doubled.get(cx)));

	state.set("count", 3);

	assert_eq!(*log.borrow(), vec![2.0, 6.0]);
	assert_eq!(doubled.runs(), 2);
	assert_eq!(shown.runs(), 2);
}

#[test]
fn inner_watch_reads_count_for_the_enclosing_watch() {
	init_tracing();

	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1, "b" => 10 });

	let outer = runtime.watch(enclose!((runtime, state) move |cx: &Evaluation| {
		let base = number(state.get(cx, "b"));
		runtime.watch_within(cx, enclose!((state) move |cx: &Evaluation| {
			base + number(state.get(cx, "a"))
		}))
	}));

	assert_eq!(outer.runs(), 1);
	assert_eq!(outer.dependencies(), 2);
	assert_eq!(outer.get_once().get_once(), 11.0);

	state.set("a", 2);

	assert_eq!(outer.runs(), 2);
	assert_eq!(outer.get_once().get_once(), 12.0);

	state.set("b", 20);
	state.set("a", 3);

	assert_eq!(outer.runs(), 4);
	assert_eq!(outer.get_once().get_once(), 23.0);
}

#[test]
fn inner_watch_stops_reporting_once_the_outer_evaluation_ends() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });

	let outer_runs = Rc::new(Cell::new(0));
	let kept = Rc::new(RefCell::new(None));

	let _outer = watch!(runtime, (runtime, state, outer_runs, kept) cx => {
		outer_runs.set(outer_runs.get() + 1);
		if kept.borrow().is_none() {
			let inner = runtime.watch_within(cx, enclose!((state) move |cx: &Evaluation| {
				number(state.get(cx, "a"))
			}));
			*kept.borrow_mut() = Some(inner);
		}
	});

	state.set("a", 2);
	assert_eq!(outer_runs.get(), 2);

	state.set("a", 3);
	assert_eq!(outer_runs.get(), 2);

	let inner = kept.borrow().clone().unwrap();
	assert_eq!(inner.get_once(), 3.0);
	assert_eq!(inner.runs(), 3);
}

#[test]
fn dropped_watch_unsubscribes() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });

	let mock = SharedMock::new();
	mock.get().expect_trigger().times(1).return_const(());

	let watch = watch!(runtime, (state, mock) cx => {
		mock.get().trigger(number(state.get(cx, "a")) as u64)
	});

	assert_eq!(state.subscribers("a"), 1);
	drop(watch);
	assert_eq!(state.subscribers("a"), 0);

	state.set("a", 2);
	mock.get().checkpoint();
}

#[test]
fn dependencies_follow_the_last_evaluation() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "flag" => true, "a" => 1, "b" => 2 });

	let watch = watch!(runtime, (state) cx => {
		if state.get(cx, "flag").is_truthy() {
			number(state.get(cx, "a"))
		} else {
			number(state.get(cx, "b"))
		}
	});

	assert_eq!(watch.get_once(), 1.0);
	assert_eq!(state.subscribers("a"), 1);
	assert_eq!(state.subscribers("b"), 0);

	state.set("flag", false);

	assert_eq!(watch.get_once(), 2.0);
	assert_eq!(watch.dependencies(), 2);
	assert_eq!(state.subscribers("a"), 0);
	assert_eq!(state.subscribers("b"), 1);

	state.set("a", 10);
	assert_eq!(watch.runs(), 2);
}

#[test]
fn nested_batches_flush_once() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });
	let watch = watch!(runtime, (state) cx => number(state.get(cx, "a")));

	runtime.batch(|| {
		runtime.batch(|| state.set("a", 2));
		assert_eq!(watch.runs(), 1);
		state.set("a", 3);
	});

	assert_eq!(watch.runs(), 2);
}

#[test]
fn panicking_watch_leaves_the_runtime_usable() {
	let runtime = Runtime::new();
	let state = runtime.observe(record! { "a" => 1 });

	let watch = watch!(runtime, (state) cx => {
		if number(state.get(cx, "a")) == 2.0 {
			panic!("boom");
		}
	});

	let result = catch_unwind(AssertUnwindSafe(|| state.set("a", 2)));

	assert!(result.is_err());
	assert!(!runtime.is_flushing());
	assert!(!runtime.in_batch());

	state.set("a", 3);
	assert_eq!(watch.runs(), 2);
}
