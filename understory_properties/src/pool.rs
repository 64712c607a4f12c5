// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small object pool for transient, reference-counted helpers.

use core::fmt;
use std::rc::Rc;

use crate::error::PoolError;

/// Recycles `Rc<T>` handles.
///
/// [`get`](Self::get) hands out a pooled object or creates one;
/// [`release`](Self::release) returns it after running the release hook.
/// Releasing an object that is already in the pool is a usage error: it is
/// logged and reported, and the pool is left unchanged.
///
/// ```rust
/// use std::cell::Cell;
/// use understory_properties::Pool;
///
/// let mut pool = Pool::new(|| Cell::new(0_u32)).with_release_hook(|counter| counter.set(0));
/// let counter = pool.get();
/// counter.set(5);
/// pool.release(counter.clone()).unwrap();
/// assert!(pool.release(counter).is_err());
/// assert_eq!(pool.get().get(), 0);
/// ```
pub struct Pool<T> {
    free: Vec<Rc<T>>,
    create: Box<dyn Fn() -> T>,
    on_release: Option<Box<dyn Fn(&T)>>,
}

impl<T: 'static> Pool<T> {
    /// An empty pool that builds new objects with `create`.
    #[must_use]
    pub fn new(create: impl Fn() -> T + 'static) -> Self {
        Self {
            free: Vec::new(),
            create: Box::new(create),
            on_release: None,
        }
    }

    /// Runs `hook` on every object as it is released.
    #[must_use]
    pub fn with_release_hook(mut self, hook: impl Fn(&T) + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Takes a pooled object, or creates one.
    pub fn get(&mut self) -> Rc<T> {
        self.free
            .pop()
            .unwrap_or_else(|| Rc::new((self.create)()))
    }

    /// Returns `item` to the pool.
    pub fn release(&mut self, item: Rc<T>) -> Result<(), PoolError> {
        if self.free.iter().any(|pooled| Rc::ptr_eq(pooled, &item)) {
            let type_name = core::any::type_name::<T>();
            tracing::error!("Trying to release object of type `{type_name}` that is already pooled.");
            return Err(PoolError { type_name });
        }
        if let Some(hook) = &self.on_release {
            hook(&item);
        }
        self.free.push(item);
        Ok(())
    }

    /// Number of idle objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Returns `true` if no objects are idle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Drops every idle object.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.free.len())
            .field("has_release_hook", &self.on_release.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;

    use super::*;

    #[test]
    fn reuses_released_objects() {
        let mut pool = Pool::new(|| RefCell::new(Vec::<u8>::new()))
            .with_release_hook(|buffer| buffer.borrow_mut().clear());
        let first = pool.get();
        first.borrow_mut().push(1);
        let address = Rc::as_ptr(&first);
        pool.release(first).unwrap();
        assert_eq!(pool.len(), 1);

        let again = pool.get();
        assert_eq!(Rc::as_ptr(&again), address);
        assert!(again.borrow().is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn double_release_is_reported() {
        let mut pool = Pool::new(|| 0_i32);
        let item = pool.get();
        pool.release(Rc::clone(&item)).unwrap();
        let error = pool.release(item).unwrap_err();
        assert_eq!(error.type_name, "i32");
        assert_eq!(pool.len(), 1);
        pool.clear();
        assert!(pool.is_empty());
    }
}
