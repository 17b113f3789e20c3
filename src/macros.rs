pub use enclose::*;

/// Builds a [`Template`](crate::Template) from string literals and slots.
///
/// - `"..."`: static markup
/// - `[cx => expr]`, `[(a, b) cx => expr]`: a content or attribute
///   expression; the parenthesized names are cloned into the closure
/// - `[on ev => expr]`, `[on (a, b) ev => expr]`: an event handler
/// - `{expr}`: any value convertible into a [`Slot`](crate::Slot)
///
/// ```
/// use trellis::{html, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.observe(trellis::record! { "count" => 1 });
///
/// let template = html!("<p>" [(state) cx => state.get(cx, "count")] "</p>");
/// assert_eq!(&*template.markup(), "<p><!--trellis:0--></p>");
/// ```
#[macro_export]
macro_rules! html {
    (@push $b:ident) => {};
    (@push $b:ident $lit:literal $($rest:tt)*) => {
        $b.push_static($lit);
        $crate::html!(@push $b $($rest)*);
    };
    (@push $b:ident [on ( $($d_tt:tt)* ) $ev:ident => $($body:tt)*] $($rest:tt)*) => {
        $b.push_slot($crate::Slot::handler($crate::macros::enclose!(($( $d_tt )*) move |$ev: &$crate::Event| { $($body)* })));
        $crate::html!(@push $b $($rest)*);
    };
    (@push $b:ident [on $ev:ident => $($body:tt)*] $($rest:tt)*) => {
        $b.push_slot($crate::Slot::handler(move |$ev: &$crate::Event| { $($body)* }));
        $crate::html!(@push $b $($rest)*);
    };
    (@push $b:ident [( $($d_tt:tt)* ) $cx:ident => $($body:tt)*] $($rest:tt)*) => {
        $b.push_slot($crate::Slot::expr($crate::macros::enclose!(($( $d_tt )*) move |$cx: &$crate::Evaluation| { $($body)* })));
        $crate::html!(@push $b $($rest)*);
    };
    (@push $b:ident [$cx:ident => $($body:tt)*] $($rest:tt)*) => {
        $b.push_slot($crate::Slot::expr(move |$cx: &$crate::Evaluation| { $($body)* }));
        $crate::html!(@push $b $($rest)*);
    };
    (@push $b:ident { $value:expr } $($rest:tt)*) => {
        $b.push_slot($crate::Slot::from($value));
        $crate::html!(@push $b $($rest)*);
    };
    ($($tt:tt)*) => {{
        let mut builder = $crate::TemplateBuilder::new();
        $crate::html!(@push builder $($tt)*);
        builder.build()
    }};
}

/// Creates a [`Watch`](crate::Watch) on a runtime.
///
/// `watch!(runtime, (a, b) cx => expr)` clones `a` and `b` into the closure.
#[macro_export]
macro_rules! watch {
    ($runtime:expr, ( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
        $crate::Watch::new(&$runtime, $crate::macros::enclose!(($( $d_tt )*) move |$cx: &$crate::Evaluation| { $($b)* }))
    };
    ($runtime:expr, $cx:ident => $($b:tt)*) => {
        $crate::Watch::new(&$runtime, move |$cx: &$crate::Evaluation| { $($b)* })
    };
}

/// A plain record value.
///
/// ```
/// let value = trellis::record! { "a" => 1, "b" => trellis::list![1, 2] };
/// assert_eq!(value.get_once("a"), trellis::Value::from(1));
/// ```
#[macro_export]
macro_rules! record {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut record = $crate::Record::default();
        $(
            record.insert(::std::rc::Rc::<str>::from($key), $crate::Value::from($value));
        )*
        $crate::Value::Record(record)
    }};
}

/// A plain list value.
#[macro_export]
macro_rules! list {
    ($($value:expr),* $(,)?) => {
        $crate::Value::List(::std::vec![$($crate::Value::from($value)),*])
    };
}
