use smallvec::SmallVec;
use std::fmt::Debug;

/// Counts tracked by a multi-resource planner, one entry per resource type.
pub type ResourceCounts = SmallVec<[i64; 4]>;

/// Amount of resources stored in planner points and spans.
///
/// Implemented for a single count (`i64`) and for a vector of counts. Vector operations
/// are element-wise and assume both operands have the same length; the planners
/// validate lengths before touching the timeline.
pub trait Quantity: Clone + PartialEq + Debug {
    fn zero_like(&self) -> Self;
    /// True when every dimension of `self` is at least the matching one of `other`.
    fn covers(&self, other: &Self) -> bool;
    fn has_negative(&self) -> bool;
    fn add_assign(&mut self, other: &Self);
    fn sub_assign(&mut self, other: &Self);
    fn min_assign(&mut self, other: &Self);
    /// `max(0, total - used)` in every dimension.
    fn remaining(total: &Self, used: &Self) -> Self;
    fn dimensions(&self) -> usize;
}

impl Quantity for i64 {
    #[inline]
    fn zero_like(&self) -> Self {
        0
    }

    #[inline]
    fn covers(&self, other: &Self) -> bool {
        *self >= *other
    }

    #[inline]
    fn has_negative(&self) -> bool {
        *self < 0
    }

    #[inline]
    fn add_assign(&mut self, other: &Self) {
        *self += *other;
    }

    #[inline]
    fn sub_assign(&mut self, other: &Self) {
        *self -= *other;
    }

    #[inline]
    fn min_assign(&mut self, other: &Self) {
        *self = (*self).min(*other);
    }

    #[inline]
    fn remaining(total: &Self, used: &Self) -> Self {
        (*total - *used).max(0)
    }

    #[inline]
    fn dimensions(&self) -> usize {
        1
    }
}

impl Quantity for ResourceCounts {
    fn zero_like(&self) -> Self {
        SmallVec::from_elem(0, self.len())
    }

    fn covers(&self, other: &Self) -> bool {
        self.iter().zip(other.iter()).all(|(a, b)| a >= b)
    }

    fn has_negative(&self) -> bool {
        self.iter().any(|v| *v < 0)
    }

    fn add_assign(&mut self, other: &Self) {
        for (a, b) in self.iter_mut().zip(other.iter()) {
            *a += *b;
        }
    }

    fn sub_assign(&mut self, other: &Self) {
        for (a, b) in self.iter_mut().zip(other.iter()) {
            *a -= *b;
        }
    }

    fn min_assign(&mut self, other: &Self) {
        for (a, b) in self.iter_mut().zip(other.iter()) {
            *a = (*a).min(*b);
        }
    }

    fn remaining(total: &Self, used: &Self) -> Self {
        total
            .iter()
            .zip(used.iter())
            .map(|(t, u)| (*t - *u).max(0))
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn vector_covers_requires_every_dimension() {
        let free: ResourceCounts = smallvec![4, 2];
        assert!(free.covers(&smallvec![4, 2]));
        assert!(free.covers(&smallvec![0, 0]));
        assert!(!free.covers(&smallvec![5, 0]));
        assert!(!free.covers(&smallvec![0, 3]));
    }

    #[test]
    fn remaining_is_clamped() {
        assert_eq!(i64::remaining(&4, &6), 0);
        assert_eq!(i64::remaining(&4, &1), 3);
        let r = ResourceCounts::remaining(&smallvec![4, 8], &smallvec![6, 2]);
        assert_eq!(r.as_slice(), &[0, 6]);
    }
}
