use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// Strong pointer ordered and compared by the address of its allocation.
///
/// Trait objects are compared by their data pointer only, so two handles to
/// the same allocation are equal even when they were coerced through
/// different vtables.
pub struct RcAddr<T: ?Sized> {
	ptr: Rc<T>,
}

impl<T: ?Sized> RcAddr<T> {
	pub fn new(ptr: Rc<T>) -> Self {
		RcAddr { ptr }
	}

	fn addr(&self) -> *const () {
		Rc::as_ptr(&self.ptr) as *const ()
	}
}

impl<T: ?Sized> Clone for RcAddr<T> {
	fn clone(&self) -> Self {
		RcAddr {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for RcAddr<T> {
	type Target = Rc<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for RcAddr<T> {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl<T: ?Sized> Eq for RcAddr<T> {}

impl<T: ?Sized> Ord for RcAddr<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.addr().cmp(&other.addr())
	}
}

impl<T: ?Sized> PartialOrd for RcAddr<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T: ?Sized> Debug for RcAddr<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "RcAddr({:p})", self.addr())
	}
}

/// Weak counterpart of [`RcAddr`]. The address stays comparable after the
/// target is dropped, which is what lets a dying subscriber unregister
/// itself.
pub struct WeakAddr<T: ?Sized> {
	ptr: Weak<T>,
}

impl<T: ?Sized> WeakAddr<T> {
	pub fn new(ptr: Weak<T>) -> Self {
		WeakAddr { ptr }
	}

	fn addr(&self) -> *const () {
		Weak::as_ptr(&self.ptr) as *const ()
	}
}

impl<T: ?Sized> Clone for WeakAddr<T> {
	fn clone(&self) -> Self {
		WeakAddr {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for WeakAddr<T> {
	type Target = Weak<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for WeakAddr<T> {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl<T: ?Sized> Eq for WeakAddr<T> {}

impl<T: ?Sized> Ord for WeakAddr<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.addr().cmp(&other.addr())
	}
}

impl<T: ?Sized> PartialOrd for WeakAddr<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;

	trait Named {
		fn name(&self) -> &'static str;
	}

	struct Item;

	impl Named for Item {
		fn name(&self) -> &'static str {
			"item"
		}
	}

	#[test]
	fn weak_addr_survives_drop() {
		let item = Rc::new(Item);
		let weak = Rc::downgrade(&item) as Weak<dyn Named>;

		let mut set = BTreeSet::new();
		set.insert(WeakAddr::new(weak.clone()));

		drop(item);

		assert!(weak.upgrade().is_none());
		assert!(set.remove(&WeakAddr::new(weak)));
	}

	#[test]
	fn rc_addr_compares_by_allocation() {
		let a = Rc::new(Item) as Rc<dyn Named>;
		let b = Rc::new(Item) as Rc<dyn Named>;

		assert_eq!(a.name(), "item");
		assert!(RcAddr::new(a.clone()) == RcAddr::new(a.clone()));
		assert!(RcAddr::new(a) != RcAddr::new(b));
	}
}
