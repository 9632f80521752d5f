use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::{ParamError, Result};
use crate::value::element_count;

/// An n-dimensional array stored as a flat buffer, first dimension fastest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SGNDArray<T> {
    dims: Vec<usize>,
    data: Vec<T>,
}

impl<T> SGNDArray<T> {
    /// Wraps a buffer holding the product of `dims` elements.
    pub fn from_vec(data: Vec<T>, dims: Vec<usize>) -> Result<Self> {
        let expected = element_count(&dims)?;
        if expected != data.len() {
            return Err(ParamError::InvalidParameter(format!(
                "array of dims {dims:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    /// The dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of dimensions.
    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for an array without elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The flat buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Element at a multi-index.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0;
        let mut stride = 1;
        for (&i, &d) in index.iter().zip(&self.dims) {
            if i >= d {
                return None;
            }
            offset += i * stride;
            stride *= d;
        }
        self.data.get(offset)
    }
}

impl<T: Clone + Default> SGNDArray<T> {
    /// Creates an array of default elements.
    pub fn new(dims: Vec<usize>) -> Result<Self> {
        let len = element_count(&dims)?;
        Ok(Self {
            dims,
            data: vec![T::default(); len],
        })
    }
}

/// A string of primitives, usually `char`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SGString<T> {
    chars: Vec<T>,
}

impl<T> SGString<T> {
    /// Wraps a run of elements.
    pub fn from_vec(chars: Vec<T>) -> Self {
        Self { chars }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The elements.
    pub fn as_slice(&self) -> &[T] {
        &self.chars
    }
}

impl<T> Deref for SGString<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.chars
    }
}

impl From<&str> for SGString<char> {
    fn from(s: &str) -> Self {
        Self::from_vec(s.chars().collect())
    }
}

impl SGString<char> {
    /// Collects the characters into a `String`.
    pub fn to_std_string(&self) -> String {
        self.chars.iter().collect()
    }
}

/// One non-zero entry of a sparse vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SGSparseVectorEntry<T> {
    /// Feature index.
    pub feat_index: i32,
    /// Value at that index.
    pub entry: T,
}

/// A sparse vector as a list of feature-indexed entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SGSparseVector<T> {
    features: Vec<SGSparseVectorEntry<T>>,
}

impl<T> SGSparseVector<T> {
    /// Wraps a list of entries.
    pub fn from_entries(features: Vec<SGSparseVectorEntry<T>>) -> Self {
        Self { features }
    }

    /// Number of stored entries.
    pub fn num_feat_entries(&self) -> usize {
        self.features.len()
    }

    /// The stored entries.
    pub fn features(&self) -> &[SGSparseVectorEntry<T>] {
        &self.features
    }

    /// Appends an entry.
    pub fn push(&mut self, feat_index: i32, entry: T) {
        self.features.push(SGSparseVectorEntry { feat_index, entry });
    }

    /// Highest feature index plus one (the implied dense length).
    pub fn dense_len(&self) -> usize {
        self.features
            .iter()
            .filter_map(|f| usize::try_from(f.feat_index).ok())
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }
}

impl<T: Copy + num_traits::Zero> SGSparseVector<T> {
    /// Value at `index`, summing duplicate entries; zero when absent.
    pub fn get_feature(&self, index: i32) -> T {
        self.features
            .iter()
            .filter(|f| f.feat_index == index)
            .fold(T::zero(), |acc, f| acc + f.entry)
    }

    /// Expands into a dense vector of `len` elements, dropping out-of-range entries.
    pub fn to_dense(&self, len: usize) -> Vec<T> {
        let mut dense = vec![T::zero(); len];
        for f in &self.features {
            if let Some(slot) = usize::try_from(f.feat_index).ok().and_then(|i| dense.get_mut(i)) {
                *slot = *slot + f.entry;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndarray_indexing() -> Result<()> {
        let a = SGNDArray::from_vec((0..24).collect(), vec![2, 3, 4])?;
        assert_eq!(a.get(&[1, 0, 0]), Some(&1));
        assert_eq!(a.get(&[0, 1, 0]), Some(&2));
        assert_eq!(a.get(&[1, 2, 3]), Some(&23));
        assert_eq!(a.get(&[2, 0, 0]), None);
        assert!(SGNDArray::from_vec(vec![1, 2], vec![3]).is_err());
        Ok(())
    }

    #[test]
    fn ndarray_dimensions_must_not_overflow() -> Result<()> {
        let dims = vec![usize::MAX, 2, 1];
        assert!(matches!(
            SGNDArray::<u8>::from_vec(Vec::new(), dims.clone()),
            Err(ParamError::Format(_))
        ));
        assert!(SGNDArray::<u8>::new(dims).is_err());
        assert_eq!(SGNDArray::<u8>::new(vec![2, 2])?.len(), 4);
        Ok(())
    }

    #[test]
    fn sparse_lookup_and_dense() {
        let mut v = SGSparseVector::default();
        v.push(3, 1.5);
        v.push(0, 2.0);
        v.push(3, 0.5);
        assert_eq!(v.get_feature(3), 2.0);
        assert_eq!(v.get_feature(1), 0.0);
        assert_eq!(v.dense_len(), 4);
        assert_eq!(v.to_dense(4), vec![2.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn char_strings() {
        let s = SGString::from("abc");
        assert_eq!(s.len(), 3);
        assert_eq!(s.to_std_string(), "abc");
    }
}
