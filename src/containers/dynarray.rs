use std::ops::Index;

/// A growable array with the element-oriented API of the toolbox's
/// `DynArray`.
///
/// Storage grows in steps of `resize_granularity` elements, so a long run of
/// appends reallocates rarely.
#[derive(Debug, Clone, PartialEq)]
pub struct DynArray<T> {
    items: Vec<T>,
    resize_granularity: usize,
}

impl<T> Default for DynArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DynArray<T> {
    /// Default growth step.
    pub const DEFAULT_GRANULARITY: usize = 128;

    /// Creates an empty array.
    pub fn new() -> Self {
        Self::with_granularity(Self::DEFAULT_GRANULARITY)
    }

    /// Creates an empty array growing in steps of `granularity`.
    pub fn with_granularity(granularity: usize) -> Self {
        Self {
            items: Vec::new(),
            resize_granularity: granularity.max(1),
        }
    }

    fn reserve_for(&mut self, len: usize) {
        if len > self.items.capacity() {
            let step = self.resize_granularity;
            let target = len.div_ceil(step) * step;
            self.items.reserve_exact(target - self.items.len());
        }
    }

    /// Number of stored elements.
    pub fn get_num_elements(&self) -> usize {
        self.items.len()
    }

    /// True when no element is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends an element.
    pub fn append_element(&mut self, element: T) {
        self.reserve_for(self.items.len() + 1);
        self.items.push(element);
    }

    /// Element at `index`, if in range.
    pub fn get_element(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Last element.
    pub fn back(&self) -> Option<&T> {
        self.items.last()
    }

    /// Inserts `element` before `index`. Returns false when `index` is past the end.
    pub fn insert_element(&mut self, element: T, index: usize) -> bool {
        if index > self.items.len() {
            return false;
        }
        self.reserve_for(self.items.len() + 1);
        self.items.insert(index, element);
        true
    }

    /// Removes and returns the element at `index`.
    pub fn delete_element(&mut self, index: usize) -> Option<T> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Removes the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Index of the first element equal to `element`.
    pub fn find_element(&self, element: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().position(|e| e == element)
    }

    /// Removes every element.
    pub fn reset_array(&mut self) {
        self.items.clear();
    }

    /// The elements as a slice.
    pub fn get_array(&self) -> &[T] {
        &self.items
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Consumes the array into its elements.
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Clone + Default> DynArray<T> {
    /// Sets the element at `index`, growing the array with defaults when
    /// `index` is past the end.
    pub fn set_element(&mut self, element: T, index: usize) {
        if index >= self.items.len() {
            self.resize_array(index + 1);
        }
        if let Some(slot) = self.items.get_mut(index) {
            *slot = element;
        }
    }

    /// Resizes to `len` elements, filling with defaults.
    pub fn resize_array(&mut self, len: usize) {
        self.reserve_for(len);
        self.items.resize(len, T::default());
    }
}

impl<T: Clone> DynArray<T> {
    /// Overwrites every element with `value`.
    pub fn clear_array(&mut self, value: T) {
        self.items.fill(value);
    }
}

impl<T> Index<usize> for DynArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> FromIterator<T> for DynArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = Self::new();
        for item in iter {
            array.append_element(item);
        }
        array
    }
}

impl<T> IntoIterator for DynArray<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a DynArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_insert_delete() {
        let mut a = DynArray::with_granularity(2);
        a.append_element(1);
        a.append_element(3);
        assert!(a.insert_element(2, 1));
        assert!(!a.insert_element(9, 10));
        assert_eq!(a.get_array(), &[1, 2, 3]);
        assert_eq!(a.delete_element(0), Some(1));
        assert_eq!(a.delete_element(5), None);
        assert_eq!(a.find_element(&3), Some(1));
        assert_eq!(a.get_num_elements(), 2);
    }

    #[test]
    fn set_element_grows() {
        let mut a = DynArray::<i32>::new();
        a.set_element(5, 3);
        assert_eq!(a.get_array(), &[0, 0, 0, 5]);
        a.clear_array(1);
        assert_eq!(a.get_array(), &[1, 1, 1, 1]);
        a.reset_array();
        assert!(a.is_empty());
    }
}
