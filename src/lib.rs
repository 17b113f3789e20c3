pub mod macros;

mod addr;
mod config;
mod dependencies;
mod error;
mod evaluation;
mod key;
mod observable;
mod runtime;
mod value;
mod watch;

pub mod dom;
pub mod render;
pub mod template;

#[cfg(target_arch = "wasm32")]
mod microtask;

use std::rc::{Rc, Weak};

pub use config::RenderConfig;
pub use dependencies::Dependencies;
pub use error::{Error, Result};
pub use evaluation::{run_tracked, Evaluation};
pub use key::{Key, LENGTH};
pub use observable::{Listener, Observable};
pub use runtime::Runtime;
pub use value::{Record, Value};
pub use watch::Watch;

pub use dom::{Node, NodeId};
pub use render::{Event, Mount, Partial, PatchStats, Renderer};
pub use template::{Content, Expression, Slot, Template, TemplateBuilder};

/// Something that can be read from inside an [`Evaluation`]: an observable
/// or a derived value.
pub trait Source: 'static {
	/// `subscriber` read `key` and wants to hear about its changes.
	fn used_by(&self, key: &Key, subscriber: Weak<dyn Subscriber>);

	/// `subscriber` no longer reads `key`.
	fn not_used_by(&self, key: &Key, subscriber: &Weak<dyn Subscriber>);
}

/// Receives change notifications from a [`Source`].
pub trait Subscriber: 'static {
	fn notify(self: Rc<Self>, key: &Key, new: &Value, old: &Value);
}

/// A scheduled computation the runtime replays during a flush.
pub trait Reactive: 'static {
	fn update(self: Rc<Self>);
}
