use std::cmp::Ordering;

/// A strict weak ordering over `T`, expressed as a "less than" predicate.
///
/// Every `Fn(&T, &T) -> bool` closure is a comparator, so custom orders can be passed directly.
///
/// # Examples
///
/// ```
/// use ordered_treap::treap::{Comparator, NaturalOrder};
///
/// assert!(NaturalOrder.less(&1, &2));
///
/// let reverse = |a: &u32, b: &u32| a > b;
/// assert!(reverse.less(&2, &1));
/// ```
pub trait Comparator<T> {
    /// Returns `true` if `a` is ordered strictly before `b`.
    fn less(&self, a: &T, b: &T) -> bool;

    fn compare(&self, a: &T, b: &T) -> Ordering {
        if self.less(a, b) {
            Ordering::Less
        } else if self.less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// The order defined by the `Ord` implementation of the values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    fn less(&self, a: &T, b: &T) -> bool {
        a < b
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    fn less(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparator, NaturalOrder};
    use std::cmp::Ordering;

    #[test]
    fn test_natural_order() {
        assert!(NaturalOrder.less(&"a", &"b"));
        assert!(!NaturalOrder.less(&2, &2));
        assert_eq!(NaturalOrder.compare(&3, &1), Ordering::Greater);
        assert_eq!(NaturalOrder.compare(&1, &1), Ordering::Equal);
    }

    #[test]
    fn test_closure_order() {
        let by_len = |a: &&str, b: &&str| a.len() < b.len();
        assert!(by_len.less(&"ab", &"abc"));
        assert_eq!(by_len.compare(&"ab", &"cd"), Ordering::Equal);
        assert_eq!(by_len.compare(&"abc", &"cd"), Ordering::Greater);
    }
}
