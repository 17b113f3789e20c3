//! Bridge to the host microtask queue.

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_name = queueMicrotask)]
	fn queue_microtask(callback: &JsValue);
}

/// Runs `func` once the current host task has finished.
pub(crate) fn defer(func: impl FnOnce() + 'static) {
	queue_microtask(&Closure::once_into_js(func));
}
