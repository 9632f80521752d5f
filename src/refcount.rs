//! The atomic reference counter shared by every managed object.

use std::sync::atomic::{AtomicI32, Ordering};

/// An atomic reference counter.
///
/// A fresh counter starts at 0. Every owning reference increments it with
/// [`RefCount::ref_`] and releases it with [`RefCount::unref`]; the owner that
/// observes a result of 0 from `unref` is the one that must tear the object
/// down.
#[derive(Debug, Default)]
pub struct RefCount {
    count: AtomicI32,
}

impl RefCount {
    /// Creates a counter starting at `count`.
    pub fn new(count: i32) -> Self {
        Self {
            count: AtomicI32::new(count),
        }
    }

    /// Increments the count and returns the new value.
    pub fn ref_(&self) -> i32 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the count and returns the new value, clamped at 0.
    pub fn unref(&self) -> i32 {
        let prev = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c - 1).max(0)))
            .unwrap_or_else(|c| c);
        (prev - 1).max(0)
    }

    /// Returns the current count.
    pub fn ref_count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(RefCount::default().ref_count(), 0);
    }

    #[test]
    fn ref_unref_pairs() {
        let rc = RefCount::default();
        assert_eq!(rc.ref_(), 1);
        assert_eq!(rc.ref_(), 2);
        assert_eq!(rc.unref(), 1);
        assert_eq!(rc.ref_count(), 1);
        assert_eq!(rc.unref(), 0);
    }

    #[test]
    fn unref_below_zero_reports_zero() {
        let rc = RefCount::new(0);
        assert_eq!(rc.unref(), 0);
    }

    #[test]
    fn extra_unref_does_not_leave_the_count_negative() {
        let rc = RefCount::new(1);
        assert_eq!(rc.unref(), 0);
        assert_eq!(rc.unref(), 0);
        assert_eq!(rc.ref_count(), 0);
        assert_eq!(rc.ref_(), 1);
    }
}
