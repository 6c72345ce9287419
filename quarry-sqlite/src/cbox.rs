use std::ops::{Deref, DerefMut};

/// Owner of a pointer handed out by SQLite, released through `dealloc` unless null.
#[derive(Debug)]
pub(crate) struct CBox<T> {
    pub(crate) ptr: *mut T,
    dealloc: fn(*mut T),
}

impl<T> CBox<T> {
    pub(crate) fn new(ptr: *mut T, dealloc: fn(*mut T)) -> Self {
        Self { ptr, dealloc }
    }

    /// Non owning copy, never released.
    pub(crate) fn borrowed(&self) -> Self {
        Self::new(self.ptr, |_| {})
    }
}

impl<T> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            (self.dealloc)(self.ptr);
        }
    }
}

impl<T> Deref for CBox<T> {
    type Target = *mut T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

// SAFETY: the bundled SQLite is compiled in serialized mode
unsafe impl<T> Send for CBox<T> {}
unsafe impl<T> Sync for CBox<T> {}

#[cfg(test)]
mod tests {
    use super::CBox;
    use std::{
        ptr,
        sync::atomic::{AtomicUsize, Ordering},
    };

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn releases_only_non_null() {
        let mut value = 123;
        {
            let null = CBox::<i32>::new(ptr::null_mut(), |_| {
                RELEASED.fetch_add(1, Ordering::Relaxed);
            });
            assert!(null.is_null());
        }
        assert_eq!(RELEASED.load(Ordering::Relaxed), 0);
        {
            let owned = CBox::new(&mut value as *mut i32, |_| {
                RELEASED.fetch_add(1, Ordering::Relaxed);
            });
            let borrowed = owned.borrowed();
            assert_eq!(unsafe { **borrowed }, 123);
            drop(borrowed);
            assert_eq!(RELEASED.load(Ordering::Relaxed), 0);
        }
        assert_eq!(RELEASED.load(Ordering::Relaxed), 1);
    }
}
