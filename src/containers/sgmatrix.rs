use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ParamError, Result};
use crate::value::element_count;

/// A reference-counted, column-major matrix.
///
/// Sharing follows [`SGVector`](super::SGVector): `Clone` is shallow, writes
/// are visible through every handle and [`SGMatrix::clone_deep`] copies.
pub struct SGMatrix<T> {
    data: Arc<RwLock<Vec<T>>>,
    rows: usize,
    cols: usize,
}

impl<T> SGMatrix<T> {
    /// Wraps a column-major buffer of `rows * cols` elements.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let expected = element_count(&[rows, cols])?;
        if data.len() != expected {
            return Err(ParamError::InvalidParameter(format!(
                "matrix of {rows}x{cols} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            rows,
            cols,
        })
    }

    /// Shared access to the column-major buffer.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the column-major buffer, visible to every handle.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True for a matrix without elements.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then_some(col * self.rows + row)
    }

    /// Sets the element at `(row, col)`. Returns false when out of range.
    pub fn set(&self, row: usize, col: usize, value: T) -> bool {
        let Some(i) = self.offset(row, col) else {
            return false;
        };
        match self.write().get_mut(i) {
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

impl<T: Clone> SGMatrix<T> {
    /// Creates a `rows x cols` matrix of default elements.
    pub fn new(rows: usize, cols: usize) -> Result<Self>
    where
        T: Default,
    {
        let len = element_count(&[rows, cols])?;
        Self::from_vec(vec![T::default(); len], rows, cols)
    }

    /// Element at `(row, col)`, if in range.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let i = self.offset(row, col)?;
        self.read().get(i).cloned()
    }

    /// Copies column `col` out.
    pub fn column(&self, col: usize) -> Option<Vec<T>> {
        if col >= self.cols {
            return None;
        }
        let start = col * self.rows;
        self.read().get(start..start + self.rows).map(<[T]>::to_vec)
    }

    /// Copies row `row` out (rows are strided in column-major storage).
    pub fn row(&self, row: usize) -> Option<Vec<T>> {
        if row >= self.rows {
            return None;
        }
        let data = self.read();
        (0..self.cols)
            .map(|c| data.get(c * self.rows + row).cloned())
            .collect()
    }

    /// The transposed matrix, in a new buffer.
    pub fn transpose(&self) -> Self {
        let data = self.read();
        let mut out = Vec::with_capacity(data.len());
        for r in 0..self.rows {
            out.extend((0..self.cols).filter_map(|c| data.get(c * self.rows + r).cloned()));
        }
        Self {
            data: Arc::new(RwLock::new(out)),
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// Copies the column-major buffer out.
    pub fn to_vec(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Copies the buffer into a new, unshared matrix.
    pub fn clone_deep(&self) -> Self {
        Self {
            data: Arc::new(RwLock::new(self.to_vec())),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<T> Clone for SGMatrix<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<T> Default for SGMatrix<T> {
    fn default() -> Self {
        Self {
            data: Arc::new(RwLock::new(Vec::new())),
            rows: 0,
            cols: 0,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SGMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SGMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("data", &*self.read())
            .finish()
    }
}

impl<T: PartialEq> PartialEq for SGMatrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && (self.shares_buffer(other) || *self.read() == *other.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_is_column_major() -> Result<()> {
        // [1 3 5]
        // [2 4 6]
        let m = SGMatrix::from_vec(vec![1, 2, 3, 4, 5, 6], 2, 3)?;
        assert_eq!(m.get(0, 1), Some(3));
        assert_eq!(m.get(1, 2), Some(6));
        assert_eq!(m.row(1), Some(vec![2, 4, 6]));
        assert_eq!(m.column(2), Some(vec![5, 6]));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.column(3), None);
        Ok(())
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        assert!(SGMatrix::from_vec(vec![1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let huge = 1usize << (usize::BITS / 2);
        assert!(matches!(
            SGMatrix::<u8>::from_vec(Vec::new(), huge, huge),
            Err(ParamError::Format(_))
        ));
        assert!(SGMatrix::<u8>::new(usize::MAX, 2).is_err());
    }

    #[test]
    fn transpose_swaps_dimensions() -> Result<()> {
        let m = SGMatrix::from_vec(vec![1, 2, 3, 4, 5, 6], 2, 3)?;
        let t = m.transpose();
        assert_eq!((t.num_rows(), t.num_cols()), (3, 2));
        assert_eq!(t.get(2, 1), m.get(1, 2));
        Ok(())
    }

    #[test]
    fn sharing_and_deep_copy() -> Result<()> {
        let a = SGMatrix::<f64>::new(2, 2)?;
        let b = a.clone();
        assert_eq!(b.ref_count(), 2);
        assert!(a.set(1, 1, 4.0));
        assert_eq!(b.get(1, 1), Some(4.0));

        let c = a.clone_deep();
        assert_eq!(c, a);
        assert!(c.set(0, 0, 1.0));
        assert_eq!(a.get(0, 0), Some(0.0));
        Ok(())
    }
}
