use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use num_traits::Num;

/// A reference-counted vector.
///
/// `Clone` is shallow: both handles share one buffer, a write through either
/// is seen by the other and [`SGVector::ref_count`] reports how many handles
/// exist. Use [`SGVector::clone_deep`] for a private copy.
pub struct SGVector<T> {
    data: Arc<RwLock<Vec<T>>>,
}

impl<T> SGVector<T> {
    /// Wraps an existing buffer.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Shared access to the elements.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the elements, visible to every handle.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sets the element at `index`. Returns false when out of range.
    pub fn set(&self, index: usize, value: T) -> bool {
        match self.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Number of handles sharing the buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// True if both handles share one buffer.
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Clone> SGVector<T> {
    /// Creates a vector of `len` default elements.
    pub fn new(len: usize) -> Self
    where
        T: Default,
    {
        Self::from_vec(vec![T::default(); len])
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<T> {
        self.read().get(index).cloned()
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: T) {
        self.write().fill(value);
    }

    /// Copies the buffer into a new, unshared vector.
    pub fn clone_deep(&self) -> Self {
        Self::from_vec(self.to_vec())
    }

    /// Copies the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }
}

impl<T: Num + Clone> SGVector<T> {
    /// Fills the vector with `start, start + 1, start + 2, ...`.
    pub fn range_fill(&self, start: T) {
        let mut current = start;
        for slot in self.write().iter_mut() {
            *slot = current.clone();
            current = current + T::one();
        }
    }
}

impl<T> Clone for SGVector<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> Default for SGVector<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T: fmt::Debug> fmt::Debug for SGVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.read().iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for SGVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shares_buffer(other) || *self.read() == *other.read()
    }
}

impl<T> From<Vec<T>> for SGVector<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

impl<T> FromIterator<T> for SGVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_clone_shares_buffer() {
        let a = SGVector::from_vec(vec![1, 2, 3]);
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert!(a.shares_buffer(&b));
        drop(b);
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn deep_clone_detaches() {
        let a = SGVector::from_vec(vec![1.0, 2.0]);
        let b = a.clone_deep();
        assert!(!a.shares_buffer(&b));
        assert!(b.set(0, 9.0));
        assert_eq!(a.to_vec(), [1.0, 2.0]);
        assert_eq!(b.to_vec(), [9.0, 2.0]);
    }

    #[test]
    fn writes_are_seen_by_every_handle() {
        let a = SGVector::from_vec(vec![0u8; 4]);
        let b = a.clone();
        b.fill(7);
        assert_eq!(a.to_vec(), [7, 7, 7, 7]);
        assert!(a.set(2, 1));
        assert_eq!(b.get(2), Some(1));
        assert_eq!(b.ref_count(), 2);
    }

    #[test]
    fn range_fill_counts_up() {
        let v = SGVector::<i32>::new(4);
        v.range_fill(10);
        assert_eq!(*v.read(), [10, 11, 12, 13]);
        assert!(!v.set(4, 0));
        assert_eq!(format!("{v:?}"), "[10, 11, 12, 13]");
    }
}
