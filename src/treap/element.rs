use crate::arena::Entry;
use crate::treap::tree::{self, Arena};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::iter::FusedIterator;
use std::ptr;

/// A borrowed handle to a single element of a `TreapMultiset`.
///
/// An element knows its position only implicitly, so `index`, `next`, `prev` and the jump
/// methods walk the tree in `O(log N)` expected time. While an element is alive the multiset it
/// came from cannot be mutated. `value` returns a guard into the node storage, which may be
/// shared with multisets split off the same one; release it before mutating any of them.
///
/// # Examples
///
/// ```
/// use ordered_treap::treap::TreapMultiset;
///
/// let multiset = TreapMultiset::from_values(vec![3, 1, 2]);
/// let element = multiset.at(1).unwrap();
///
/// assert_eq!(*element.value(), 2);
/// assert_eq!(element.index(), 1);
/// assert_eq!(element.next().map(|next| *next.value()), Some(3));
/// assert_eq!(element.jump_left(1).map(|prev| *prev.value()), Some(1));
/// ```
pub struct Element<'a, T> {
    arena: &'a RefCell<Arena<T>>,
    entry: Entry,
}

impl<'a, T> Element<'a, T> {
    pub(crate) fn new(arena: &'a RefCell<Arena<T>>, entry: Entry) -> Self {
        Element { arena, entry }
    }

    fn with_entry(&self, entry: Option<Entry>) -> Option<Self> {
        entry.map(|entry| Element::new(self.arena, entry))
    }

    /// Returns a reference to the value of the element.
    pub fn value(&self) -> Ref<'a, T> {
        let entry = self.entry;
        Ref::map(self.arena.borrow(), |arena| &arena[entry].value)
    }

    /// Returns the in-order position of the element.
    pub fn index(&self) -> usize {
        tree::index(&self.arena.borrow(), self.entry)
    }

    /// Returns the position of an optional element, or `-1` if there is none.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::{Element, TreapMultiset};
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 2]);
    /// assert_eq!(Element::position(multiset.at(1)), 1);
    /// assert_eq!(Element::position(multiset.at(5)), -1);
    /// ```
    pub fn position(element: Option<Self>) -> isize {
        element.map_or(-1, |element| element.index() as isize)
    }

    /// Returns the in-order successor of the element.
    pub fn next(&self) -> Option<Self> {
        self.with_entry(tree::next(&self.arena.borrow(), self.entry))
    }

    /// Returns the in-order predecessor of the element.
    pub fn prev(&self) -> Option<Self> {
        self.with_entry(tree::prev(&self.arena.borrow(), self.entry))
    }

    /// Returns the first element of the multiset containing this element.
    pub fn leftmost(&self) -> Self {
        Element::new(self.arena, tree::leftmost(&self.arena.borrow(), self.entry))
    }

    /// Returns the last element of the multiset containing this element.
    pub fn rightmost(&self) -> Self {
        Element::new(self.arena, tree::rightmost(&self.arena.borrow(), self.entry))
    }

    /// Returns the element `offset` positions to the right, counting backwards for negative
    /// offsets. Returns `None` if the destination is out of bounds.
    pub fn jump_right(&self, offset: isize) -> Option<Self> {
        self.with_entry(tree::jump(&self.arena.borrow(), self.entry, offset))
    }

    /// Returns the element `offset` positions to the left. Returns `None` if the destination is
    /// out of bounds.
    pub fn jump_left(&self, offset: isize) -> Option<Self> {
        offset.checked_neg().and_then(|offset| self.jump_right(offset))
    }
}

impl<'a, T> Clone for Element<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Element<'a, T> {}

impl<'a, T> PartialEq for Element<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.arena, other.arena) && self.entry == other.entry
    }
}

impl<'a, T> Eq for Element<'a, T> {}

impl<'a, T> fmt::Debug for Element<'a, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("index", &self.index())
            .field("value", &*self.value())
            .finish()
    }
}

/// A cursor over the elements of a `TreapMultiset`.
///
/// The cursor holds the current front and back elements and steps with `next`/`prev`, so each
/// step costs `O(log N)` in the worst case and `O(1)` amortized over a full traversal.
pub struct Elements<'a, T> {
    arena: &'a RefCell<Arena<T>>,
    front: Option<Entry>,
    back: Option<Entry>,
    remaining: usize,
}

impl<'a, T> Elements<'a, T> {
    pub(crate) fn new(arena: &'a RefCell<Arena<T>>, root: Option<Entry>) -> Self {
        let nodes = arena.borrow();
        Elements {
            arena,
            front: root.map(|entry| tree::min(&nodes, entry)),
            back: root.map(|entry| tree::max(&nodes, entry)),
            remaining: tree::len(&nodes, root),
        }
    }
}

impl<'a, T> Clone for Elements<'a, T> {
    fn clone(&self) -> Self {
        Elements { ..*self }
    }
}

impl<'a, T> Iterator for Elements<'a, T> {
    type Item = Element<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let arena = self.arena;
        let entry = self.front?;
        self.remaining -= 1;
        self.front = tree::next(&arena.borrow(), entry);
        Some(Element::new(arena, entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Elements<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let arena = self.arena;
        let entry = self.back?;
        self.remaining -= 1;
        self.back = tree::prev(&arena.borrow(), entry);
        Some(Element::new(arena, entry))
    }
}

impl<'a, T> ExactSizeIterator for Elements<'a, T> {}

impl<'a, T> FusedIterator for Elements<'a, T> {}

/// An iterator over the values of a `TreapMultiset` in order. Each value is yielded as a guard
/// into the node storage.
pub struct Values<'a, T> {
    elements: Elements<'a, T>,
}

impl<'a, T> Values<'a, T> {
    pub(crate) fn new(elements: Elements<'a, T>) -> Self {
        Values { elements }
    }
}

impl<'a, T> Clone for Values<'a, T> {
    fn clone(&self) -> Self {
        Values {
            elements: self.elements.clone(),
        }
    }
}

impl<'a, T> Iterator for Values<'a, T> {
    type Item = Ref<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next().map(|element| element.value())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<'a, T> DoubleEndedIterator for Values<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.elements.next_back().map(|element| element.value())
    }
}

impl<'a, T> ExactSizeIterator for Values<'a, T> {}

impl<'a, T> FusedIterator for Values<'a, T> {}

#[cfg(test)]
mod tests {
    use crate::treap::{Element, RandomPriority, TreapMultiset};

    fn multiset(values: Vec<u32>) -> TreapMultiset<u32> {
        TreapMultiset::with_priorities(RandomPriority::from_seed(528), values)
    }

    #[test]
    fn test_index_and_value() {
        let multiset = multiset(vec![10, 20, 30, 40]);
        for (index, element) in multiset.elements().enumerate() {
            assert_eq!(element.index(), index);
            assert_eq!(*element.value(), (index as u32 + 1) * 10);
            assert_eq!(multiset.at(index as isize), Some(element));
        }
    }

    #[test]
    fn test_position_sentinel() {
        let multiset = multiset(vec![1, 2, 3]);
        assert_eq!(Element::position(multiset.at(2)), 2);
        assert_eq!(Element::position(multiset.at(3)), -1);
        assert_eq!(Element::position(multiset.leftmost()), 0);
    }

    #[test]
    fn test_prev_and_next() {
        let multiset = multiset(vec![1, 2, 3]);
        let first = multiset.at(0).unwrap();
        let last = multiset.at(-1).unwrap();
        assert_eq!(first.prev(), None);
        assert_eq!(last.next(), None);
        assert_eq!(first.next().and_then(|element| element.next()), Some(last));
        assert_eq!(last.prev().and_then(|element| element.prev()), Some(first));
    }

    #[test]
    fn test_leftmost_and_rightmost() {
        let multiset = multiset(vec![5, 1, 4, 2, 3]);
        for element in multiset.elements() {
            assert_eq!(*element.leftmost().value(), 1);
            assert_eq!(*element.rightmost().value(), 5);
        }
    }

    #[test]
    fn test_jump() {
        let multiset = multiset((0..50).collect());
        let element = multiset.at(20).unwrap();
        assert_eq!(element.jump_right(0), Some(element));
        assert_eq!(element.jump_right(1), element.next());
        assert_eq!(element.jump_right(-1), element.prev());
        assert_eq!(element.jump_left(1), element.prev());
        assert_eq!(element.jump_right(29).map(|element| *element.value()), Some(49));
        assert_eq!(element.jump_left(20).map(|element| *element.value()), Some(0));
        assert_eq!(element.jump_right(30), None);
        assert_eq!(element.jump_left(21), None);
        assert_eq!(element.jump_left(isize::MIN), None);
    }

    #[test]
    fn test_elements_double_ended() {
        let multiset = multiset(vec![1, 2, 3, 4]);
        let mut elements = multiset.elements();
        assert_eq!(elements.len(), 4);
        assert_eq!(elements.next().map(|element| *element.value()), Some(1));
        assert_eq!(elements.next_back().map(|element| *element.value()), Some(4));
        assert_eq!(elements.next().map(|element| *element.value()), Some(2));
        assert_eq!(elements.next_back().map(|element| *element.value()), Some(3));
        assert_eq!(elements.next(), None);
        assert_eq!(elements.next_back(), None);
    }

    #[test]
    fn test_elements_restart() {
        let multiset = multiset(vec![3, 1, 2]);
        let mut elements = multiset.elements();
        elements.next();
        assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 3]);
        assert_eq!(
            multiset.values_backwards().map(|value| *value).collect::<Vec<u32>>(),
            vec![3, 2, 1],
        );
    }

    #[test]
    fn test_debug() {
        let multiset = multiset(vec![7]);
        assert_eq!(
            format!("{:?}", multiset.at(0).unwrap()),
            "Element { index: 0, value: 7 }",
        );
    }

    #[test]
    fn test_elements_across_split_halves() {
        let mut multiset = multiset(vec![1, 2, 3, 4]);
        let (left, right) = multiset.cut(2);
        let last_left = left.rightmost().unwrap();
        let first_right = right.leftmost().unwrap();
        assert_eq!(last_left.next(), None);
        assert_eq!(first_right.prev(), None);
        assert_eq!(first_right.index(), 0);
        assert_ne!(left.at(0), right.at(0));
        assert_eq!(right.values().map(|value| *value).collect::<Vec<u32>>(), vec![3, 4]);
    }
}
