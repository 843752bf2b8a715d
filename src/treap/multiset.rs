use crate::arena::Entry;
use crate::error::{self, Error};
use crate::treap::element::{Element, Elements, Values};
use crate::treap::node::Node;
use crate::treap::order::{Comparator, NaturalOrder};
use crate::treap::priority::{PrioritySource, RandomPriority};
use crate::treap::tree::{self, Arena, Tree};
use log::trace;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::iter::{FromIterator, Rev};
use std::ops::Add;
use std::rc::Rc;

/// An ordered multiset implemented by a treap.
///
/// A treap is a tree that satisfies both the binary search tree property and a heap property.
/// Each node has a value and a priority. The value of any node is ordered after all values in its
/// left subtree and before all values in its right subtree. The priority of a node is greater
/// than or equal to the priority of all nodes in its subtrees. By randomly generating
/// priorities, the expected height of the tree is proportional to the logarithm of the number of
/// values.
///
/// Every node also caches the size of its subtree and a link to its parent, which gives
/// positional access (`at`, `Element::index`) in `O(log N)` expected time. Equal values are
/// allowed; `insert_left` places a new value before the values equal to it and `insert_right`
/// after them.
///
/// All mutating operations are built from two primitives: splitting a tree at a threshold and
/// merging two ordered trees. Whole multisets can be split (`cut`, `split_before`,
/// `split_after`) and merged (`merge`, `+`) the same way.
///
/// The multisets produced by a split keep sharing the node storage of the one they came from,
/// so splitting them and merging them back never moves a node. Values are handed out as `Ref`
/// guards into that storage; a guard must be released before any multiset sharing the storage
/// is modified, or the modification panics.
///
/// # Examples
///
/// ```
/// use ordered_treap::treap::TreapMultiset;
///
/// let mut multiset = TreapMultiset::from_values(vec![5, 1, 3, 5]);
/// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 3, 5, 5]);
///
/// assert_eq!(multiset.insert_left(5), 2);
/// assert_eq!(multiset.count(&5), 3);
///
/// assert_eq!(multiset.erase_range(&2, true, &4, false), 1);
/// assert_eq!(multiset.at(0).map(|element| *element.value()), Some(1));
///
/// let (left, right) = multiset.cut(2);
/// assert_eq!(left.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 5]);
/// assert_eq!(right.values().map(|value| *value).collect::<Vec<u32>>(), vec![5, 5]);
/// ```
pub struct TreapMultiset<T, C = NaturalOrder, P = RandomPriority> {
    arena: Rc<RefCell<Arena<T>>>,
    root: Tree,
    comparator: C,
    priorities: P,
}

impl<T: Ord> TreapMultiset<T> {
    /// Constructs a new, empty `TreapMultiset<T>` ordered by `Ord`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset: TreapMultiset<u32> = TreapMultiset::new();
    /// assert!(multiset.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Constructs a `TreapMultiset<T>` ordered by `Ord` that holds `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1, 2]);
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 2]);
    /// ```
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_comparator_and_priorities(NaturalOrder, RandomPriority::new(), values)
    }
}

impl<T: Ord, P: PrioritySource> TreapMultiset<T, NaturalOrder, P> {
    /// Constructs a `TreapMultiset<T>` ordered by `Ord` that draws node priorities from
    /// `priorities`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::{RandomPriority, TreapMultiset};
    ///
    /// let multiset = TreapMultiset::with_priorities(RandomPriority::from_seed(1), vec![2, 1]);
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2]);
    /// ```
    pub fn with_priorities<I>(priorities: P, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_comparator_and_priorities(NaturalOrder, priorities, values)
    }
}

impl<T, C: Comparator<T>> TreapMultiset<T, C> {
    /// Constructs a `TreapMultiset<T>` ordered by `comparator` that holds `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::with_comparator(|a: &u32, b: &u32| a > b, vec![1, 3, 2]);
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![3, 2, 1]);
    /// ```
    pub fn with_comparator<I>(comparator: C, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_comparator_and_priorities(comparator, RandomPriority::new(), values)
    }
}

impl<T, C, P> TreapMultiset<T, C, P> {
    fn from_parts(arena: Rc<RefCell<Arena<T>>>, root: Tree, comparator: C, priorities: P) -> Self {
        TreapMultiset {
            arena,
            root,
            comparator,
            priorities,
        }
    }

    fn free(&mut self, tree: Tree) -> usize {
        tree::free(&mut self.arena.borrow_mut(), tree)
    }

    fn split_at(&mut self, tree: Tree, n: usize) -> (Tree, Tree) {
        tree::split(&mut self.arena.borrow_mut(), tree, |_, index| index < n, 0)
    }

    fn element(&self, entry: Option<Entry>) -> Option<Element<'_, T>> {
        entry.map(|entry| Element::new(&self.arena, entry))
    }

    // Resolves negative indices from the back; `None` if out of bounds.
    fn resolve_index(&self, index: isize) -> Option<usize> {
        let len = self.len();
        if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else if (index as usize) < len {
            Some(index as usize)
        } else {
            None
        }
    }

    /// Returns the number of values in the multiset.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 1]);
    /// assert_eq!(multiset.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        tree::len(&self.arena.borrow(), self.root)
    }

    /// Returns `true` if the multiset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset: TreapMultiset<u32> = TreapMultiset::new();
    /// assert!(multiset.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Clears the multiset, removing all values. Storage shared with other multisets keeps
    /// their values.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2]);
    /// multiset.clear();
    /// assert!(multiset.is_empty());
    /// ```
    pub fn clear(&mut self) {
        let root = self.root.take();
        if Rc::strong_count(&self.arena) == 1 {
            self.arena.borrow_mut().clear();
        } else {
            self.free(root);
        }
    }

    /// Returns the element at a particular index, counting from the back for negative indices.
    /// Returns `None` if the index is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 3, 5]);
    /// assert_eq!(multiset.at(1).map(|element| *element.value()), Some(3));
    /// assert_eq!(multiset.at(-1).map(|element| *element.value()), Some(5));
    /// assert!(multiset.at(3).is_none());
    /// assert!(multiset.at(-4).is_none());
    /// ```
    pub fn at(&self, index: isize) -> Option<Element<'_, T>> {
        let entry = self
            .resolve_index(index)
            .and_then(|index| tree::nth(&self.arena.borrow(), self.root, index));
        self.element(entry)
    }

    /// Returns a reference to the value at a particular index. Returns `None` if the index is
    /// out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1]);
    /// assert_eq!(multiset.get(0).map(|value| *value), Some(1));
    /// assert!(multiset.get(2).is_none());
    /// ```
    pub fn get(&self, index: usize) -> Option<Ref<'_, T>> {
        let arena = self.arena.borrow();
        let entry = tree::nth(&arena, self.root, index)?;
        Some(Ref::map(arena, |arena| &arena[entry].value))
    }

    /// Returns the first element of the multiset. Returns `None` if the multiset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![3, 1, 4]);
    /// assert_eq!(multiset.leftmost().map(|element| *element.value()), Some(1));
    /// ```
    pub fn leftmost(&self) -> Option<Element<'_, T>> {
        self.element(self.root.map(|entry| tree::min(&self.arena.borrow(), entry)))
    }

    /// Returns the last element of the multiset. Returns `None` if the multiset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![3, 1, 4]);
    /// assert_eq!(multiset.rightmost().map(|element| *element.value()), Some(4));
    /// ```
    pub fn rightmost(&self) -> Option<Element<'_, T>> {
        self.element(self.root.map(|entry| tree::max(&self.arena.borrow(), entry)))
    }

    /// Returns the element stored at the root of the underlying tree. Which element this is
    /// depends on the priorities; use `leftmost`, `rightmost` or `at` for a specific position.
    pub fn root(&self) -> Option<Element<'_, T>> {
        self.element(self.root)
    }

    /// Removes and returns the first value. Returns `None` if the multiset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![2, 1]);
    /// assert_eq!(multiset.pop_leftmost(), Some(1));
    /// assert_eq!(multiset.pop_leftmost(), Some(2));
    /// assert_eq!(multiset.pop_leftmost(), None);
    /// ```
    pub fn pop_leftmost(&mut self) -> Option<T> {
        let root = self.root.take()?;
        let (first, rest) = self.split_at(Some(root), 1);
        self.root = rest;
        first.map(|entry| self.arena.borrow_mut().free(&entry).value)
    }

    /// Removes and returns the last value. Returns `None` if the multiset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![2, 1]);
    /// assert_eq!(multiset.pop_rightmost(), Some(2));
    /// assert_eq!(multiset.pop_rightmost(), Some(1));
    /// assert_eq!(multiset.pop_rightmost(), None);
    /// ```
    pub fn pop_rightmost(&mut self) -> Option<T> {
        let root = self.root.take()?;
        let len = self.arena.borrow()[root].len;
        let (rest, last) = self.split_at(Some(root), len - 1);
        self.root = rest;
        last.map(|entry| self.arena.borrow_mut().free(&entry).value)
    }

    /// Removes up to `count` values starting at `index` and returns how many were removed.
    /// Negative indices count from the back. Nothing is removed if the index is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 3, 4, 5]);
    /// assert_eq!(multiset.erase_at(1, 3), 3);
    /// assert_eq!(multiset.erase_at(-1, 10), 1);
    /// assert_eq!(multiset.erase_at(5, 1), 0);
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1]);
    /// ```
    pub fn erase_at(&mut self, index: isize, count: usize) -> usize {
        let index = match self.resolve_index(index) {
            Some(index) => index,
            None => return 0,
        };
        let root = self.root.take();
        let (left, rest) = self.split_at(root, index);
        let (erased, right) = self.split_at(rest, count);
        self.root = tree::merge(&mut self.arena.borrow_mut(), left, right);
        self.free(erased)
    }

    /// Merges two multisets into one, consuming both. Every value of `left` must be ordered
    /// before or equal to every value of `right`; this is not checked. The result keeps the
    /// comparator and priority source of `left`.
    ///
    /// Multisets split off the same multiset share their storage and merge in `O(log N)`
    /// expected time. Otherwise the nodes of the smaller multiset are first moved into the
    /// storage of the larger one.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let left = TreapMultiset::from_values(vec![1, 2]);
    /// let right = TreapMultiset::from_values(vec![3, 4]);
    ///
    /// let merged = TreapMultiset::merge(left, right);
    /// assert_eq!(merged.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 3, 4]);
    /// ```
    pub fn merge(mut left: Self, mut right: Self) -> Self {
        let l_root = left.root.take();
        let mut r_root = right.root.take();
        let l_len = tree::len(&left.arena.borrow(), l_root);
        let r_len = tree::len(&right.arena.borrow(), r_root);
        trace!("merging multisets of {} and {} values", l_len, r_len);
        let l_root = if Rc::ptr_eq(&left.arena, &right.arena) {
            l_root
        } else if l_len >= r_len {
            trace!("relocating {} values into the larger storage", r_len);
            r_root =
                tree::relocate(&mut right.arena.borrow_mut(), &mut left.arena.borrow_mut(), r_root);
            l_root
        } else {
            trace!("relocating {} values into the larger storage", l_len);
            let l_root =
                tree::relocate(&mut left.arena.borrow_mut(), &mut right.arena.borrow_mut(), l_root);
            left.arena = Rc::clone(&right.arena);
            l_root
        };
        left.root = tree::merge(&mut left.arena.borrow_mut(), l_root, r_root);
        left
    }

    /// Returns an iterator over the elements of the multiset from first to last.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1]);
    /// let indices: Vec<(usize, u32)> = multiset
    ///     .elements()
    ///     .map(|element| (element.index(), *element.value()))
    ///     .collect();
    /// assert_eq!(indices, vec![(0, 1), (1, 2)]);
    /// ```
    pub fn elements(&self) -> Elements<'_, T> {
        Elements::new(&self.arena, self.root)
    }

    /// Returns an iterator over the elements of the multiset from last to first.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1, 3]);
    /// let indices: Vec<(usize, u32)> = multiset
    ///     .elements_backwards()
    ///     .map(|element| (element.index(), *element.value()))
    ///     .collect();
    /// assert_eq!(indices, vec![(2, 3), (1, 2), (0, 1)]);
    /// ```
    pub fn elements_backwards(&self) -> Rev<Elements<'_, T>> {
        self.elements().rev()
    }

    /// Returns an iterator over the values of the multiset in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1, 2]);
    /// let mut iterator = multiset.values();
    /// assert_eq!(iterator.next().map(|value| *value), Some(1));
    /// assert_eq!(iterator.next().map(|value| *value), Some(2));
    /// assert_eq!(iterator.next().map(|value| *value), Some(2));
    /// assert!(iterator.next().is_none());
    /// ```
    pub fn values(&self) -> Values<'_, T> {
        Values::new(self.elements())
    }

    /// Returns an iterator over the values of the multiset in reverse order.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![2, 1, 3, 1]);
    /// let values: Vec<u32> = multiset.values_backwards().map(|value| *value).collect();
    /// assert_eq!(values, vec![3, 2, 1, 1]);
    /// ```
    pub fn values_backwards(&self) -> Rev<Values<'_, T>> {
        self.values().rev()
    }
}

impl<T, C: Clone, P: PrioritySource + Clone> TreapMultiset<T, C, P> {
    // Turns the two halves of a split into two multisets over the same storage. Each half
    // draws priorities from its own fork of the source.
    fn partition(&mut self, (left, right): (Tree, Tree)) -> (Self, Self) {
        trace!(
            "splitting multiset into {} and {} values",
            tree::len(&self.arena.borrow(), left),
            tree::len(&self.arena.borrow(), right)
        );
        let l_priorities = self.priorities.fork();
        let r_priorities = self.priorities.fork();
        (
            Self::from_parts(Rc::clone(&self.arena), left, self.comparator.clone(), l_priorities),
            Self::from_parts(Rc::clone(&self.arena), right, self.comparator.clone(), r_priorities),
        )
    }

    /// Splits the multiset into its first `n` values and the rest, leaving the multiset empty.
    /// A negative `n` counts from the back, so `cut(-2)` keeps all but the last two values on
    /// the left.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 3, 4, 5]);
    /// let (left, right) = multiset.cut(3);
    ///
    /// assert!(multiset.is_empty());
    /// assert_eq!(left.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 3]);
    /// assert_eq!(right.values().map(|value| *value).collect::<Vec<u32>>(), vec![4, 5]);
    /// ```
    pub fn cut(&mut self, n: isize) -> (Self, Self) {
        let n = if n < 0 {
            self.len().saturating_sub(n.unsigned_abs())
        } else {
            n as usize
        };
        let root = self.root.take();
        let parts = self.split_at(root, n);
        self.partition(parts)
    }
}

impl<T, C, P> TreapMultiset<T, C, P>
where
    C: Comparator<T>,
    P: PrioritySource,
{
    /// Constructs a `TreapMultiset<T>` ordered by `comparator` that draws node priorities from
    /// `priorities` and holds `values`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut priority = 0u64;
    /// let multiset = TreapMultiset::with_comparator_and_priorities(
    ///     |a: &i32, b: &i32| a.abs() < b.abs(),
    ///     move || {
    ///         priority += 1;
    ///         priority
    ///     },
    ///     vec![-3, 1, -2],
    /// );
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<i32>>(), vec![1, -2, -3]);
    /// assert_eq!(multiset.root().map(|element| *element.value()), Some(-3));
    /// ```
    pub fn with_comparator_and_priorities<I>(comparator: C, mut priorities: P, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut values: Vec<T> = values.into_iter().collect();
        values.sort_by(|a, b| comparator.compare(a, b));
        let mut arena = Arena::with_capacity(values.len());
        let mut root = None;
        for value in values {
            let entry = arena.allocate(Node::new(value, priorities.next_priority()));
            root = tree::merge(&mut arena, root, Some(entry));
        }
        trace!("built multiset of {} values", arena.len());
        Self::from_parts(Rc::new(RefCell::new(arena)), root, comparator, priorities)
    }

    fn split_less(&mut self, tree: Tree, value: &T) -> (Tree, Tree) {
        let comparator = &self.comparator;
        tree::split(
            &mut self.arena.borrow_mut(),
            tree,
            |node_value, _| comparator.less(node_value, value),
            0,
        )
    }

    fn split_less_or_equal(&mut self, tree: Tree, value: &T) -> (Tree, Tree) {
        let comparator = &self.comparator;
        tree::split(
            &mut self.arena.borrow_mut(),
            tree,
            |node_value, _| !comparator.less(value, node_value),
            0,
        )
    }

    // Cuts the whole tree into the values less than, equal to and greater than `value`.
    fn split_equal(&mut self, value: &T) -> (Tree, Tree, Tree) {
        let root = self.root.take();
        let (less, rest) = self.split_less(root, value);
        let (equal, greater) = self.split_less_or_equal(rest, value);
        (less, equal, greater)
    }

    // First value not less than `value`, or greater than `value` if `exclusive`.
    fn first_not_below(&self, value: &T, exclusive: bool) -> Option<(Entry, usize)> {
        let comparator = &self.comparator;
        if exclusive {
            let predicate = |node_value: &T, _| !comparator.less(value, node_value);
            tree::lookup_leftmost_unmatch(&self.arena.borrow(), self.root, predicate, 0)
        } else {
            let predicate = |node_value: &T, _| comparator.less(node_value, value);
            tree::lookup_leftmost_unmatch(&self.arena.borrow(), self.root, predicate, 0)
        }
    }

    // Last value not greater than `value`, or less than `value` if `exclusive`.
    fn last_not_above(&self, value: &T, exclusive: bool) -> Option<(Entry, usize)> {
        let comparator = &self.comparator;
        if exclusive {
            let predicate = |node_value: &T, _| comparator.less(node_value, value);
            tree::lookup_rightmost_match(&self.arena.borrow(), self.root, predicate, 0)
        } else {
            let predicate = |node_value: &T, _| !comparator.less(value, node_value);
            tree::lookup_rightmost_match(&self.arena.borrow(), self.root, predicate, 0)
        }
    }

    fn check_range(
        &self,
        start: &T,
        inclusive_start: bool,
        end: &T,
        inclusive_end: bool,
    ) -> error::Result<()> {
        if self.comparator.less(end, start) {
            return Err(Error::InvertedRange);
        }
        if !self.comparator.less(start, end) && !(inclusive_start && inclusive_end) {
            return Err(Error::EmptyExclusiveRange);
        }
        Ok(())
    }

    /// Inserts a value before all values equal to it and returns the index it was inserted at.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 3, 5, 5]);
    /// assert_eq!(multiset.insert_left(5), 2);
    /// assert_eq!(multiset.insert_left(0), 0);
    /// ```
    pub fn insert_left(&mut self, value: T) -> usize {
        let root = self.root.take();
        let (less, rest) = self.split_less(root, &value);
        let priority = self.priorities.next_priority();
        let mut arena = self.arena.borrow_mut();
        let index = tree::len(&arena, less);
        let entry = arena.allocate(Node::new(value, priority));
        let rest = tree::merge(&mut arena, Some(entry), rest);
        self.root = tree::merge(&mut arena, less, rest);
        index
    }

    /// Inserts a value after all values equal to it and returns the index it was inserted at.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 3, 5, 5]);
    /// assert_eq!(multiset.insert_right(5), 4);
    /// assert_eq!(multiset.insert_right(3), 2);
    /// ```
    pub fn insert_right(&mut self, value: T) -> usize {
        let root = self.root.take();
        let (less_or_equal, greater) = self.split_less_or_equal(root, &value);
        let priority = self.priorities.next_priority();
        let mut arena = self.arena.borrow_mut();
        let index = tree::len(&arena, less_or_equal);
        let entry = arena.allocate(Node::new(value, priority));
        let less_or_equal = tree::merge(&mut arena, less_or_equal, Some(entry));
        self.root = tree::merge(&mut arena, less_or_equal, greater);
        index
    }

    /// Removes every value equal to `value` and returns how many were removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// assert_eq!(multiset.erase_all(&2), 2);
    /// assert_eq!(multiset.erase_all(&2), 0);
    /// ```
    pub fn erase_all(&mut self, value: &T) -> usize {
        let (less, equal, greater) = self.split_equal(value);
        self.root = tree::merge(&mut self.arena.borrow_mut(), less, greater);
        self.free(equal)
    }

    /// Removes up to `count` values equal to `value`, starting from the first of them, and
    /// returns how many were removed. A `count` of `None` removes all of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 1, 1, 2]);
    /// assert_eq!(multiset.erase_leftmost(&1, Some(2)), 2);
    /// assert_eq!(multiset.erase_leftmost(&1, None), 1);
    /// assert_eq!(multiset.len(), 1);
    /// ```
    pub fn erase_leftmost(&mut self, value: &T, count: Option<usize>) -> usize {
        let (less, equal, greater) = self.split_equal(value);
        let count = count.unwrap_or_else(|| tree::len(&self.arena.borrow(), equal));
        let (erased, remainder) = self.split_at(equal, count);
        let mut arena = self.arena.borrow_mut();
        let right = tree::merge(&mut arena, remainder, greater);
        self.root = tree::merge(&mut arena, less, right);
        drop(arena);
        self.free(erased)
    }

    /// Removes up to `count` values equal to `value`, starting from the last of them, and returns
    /// how many were removed. A `count` of `None` removes all of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![3, 3, 3, 4]);
    /// assert_eq!(multiset.erase_rightmost(&3, Some(1)), 1);
    /// assert_eq!(multiset.erase_rightmost(&3, None), 2);
    /// assert_eq!(multiset.len(), 1);
    /// ```
    pub fn erase_rightmost(&mut self, value: &T, count: Option<usize>) -> usize {
        let (less, equal, greater) = self.split_equal(value);
        let len = tree::len(&self.arena.borrow(), equal);
        let kept = count.map_or(0, |count| len.saturating_sub(count));
        let (remainder, erased) = self.split_at(equal, kept);
        let mut arena = self.arena.borrow_mut();
        let right = tree::merge(&mut arena, remainder, greater);
        self.root = tree::merge(&mut arena, less, right);
        drop(arena);
        self.free(erased)
    }

    /// Removes the values between `start` and `end` and returns how many were removed. Each
    /// bound is removed only if its inclusive flag is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvertedRange` if `end` is ordered before `start`, and
    /// `Error::EmptyExclusiveRange` if the bounds are equal and either is exclusive. The
    /// multiset is left untouched in both cases.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    /// use ordered_treap::Error;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 3, 4, 5]);
    /// assert_eq!(multiset.try_erase_range(&2, true, &4, false), Ok(2));
    /// assert_eq!(multiset.try_erase_range(&5, true, &4, true), Err(Error::InvertedRange));
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 4, 5]);
    /// ```
    pub fn try_erase_range(
        &mut self,
        start: &T,
        inclusive_start: bool,
        end: &T,
        inclusive_end: bool,
    ) -> error::Result<usize> {
        self.check_range(start, inclusive_start, end, inclusive_end)?;
        let root = self.root.take();
        let (left, rest) = if inclusive_start {
            self.split_less(root, start)
        } else {
            self.split_less_or_equal(root, start)
        };
        let (erased, right) = if inclusive_end {
            self.split_less_or_equal(rest, end)
        } else {
            self.split_less(rest, end)
        };
        self.root = tree::merge(&mut self.arena.borrow_mut(), left, right);
        Ok(self.free(erased))
    }

    /// Removes the values between `start` and `end` and returns how many were removed. Each
    /// bound is removed only if its inclusive flag is set.
    ///
    /// # Panics
    ///
    /// Panics if `end` is ordered before `start`, or if the bounds are equal and either is
    /// exclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 3, 4, 5, 6, 7]);
    /// assert_eq!(multiset.erase_range(&2, false, &6, false), 3);
    /// assert_eq!(multiset.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 6, 7]);
    /// ```
    pub fn erase_range(
        &mut self,
        start: &T,
        inclusive_start: bool,
        end: &T,
        inclusive_end: bool,
    ) -> usize {
        self.try_erase_range(start, inclusive_start, end, inclusive_end)
            .unwrap_or_else(|err| panic!("Error: {}.", err))
    }

    /// Returns how many values lie between `start` and `end`. Each bound is counted only if its
    /// inclusive flag is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvertedRange` if `end` is ordered before `start`, and
    /// `Error::EmptyExclusiveRange` if the bounds are equal and either is exclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    /// use ordered_treap::Error;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// assert_eq!(multiset.try_count_range(&2, true, &3, false), Ok(2));
    /// assert_eq!(multiset.try_count_range(&2, true, &2, false), Err(Error::EmptyExclusiveRange));
    /// ```
    pub fn try_count_range(
        &self,
        start: &T,
        inclusive_start: bool,
        end: &T,
        inclusive_end: bool,
    ) -> error::Result<usize> {
        self.check_range(start, inclusive_start, end, inclusive_end)?;
        let first = self.first_not_below(start, !inclusive_start);
        let last = self.last_not_above(end, !inclusive_end);
        Ok(match (first, last) {
            (Some((_, first_index)), Some((_, last_index))) if first_index <= last_index => {
                last_index - first_index + 1
            },
            _ => 0,
        })
    }

    /// Returns how many values lie between `start` and `end`. Each bound is counted only if its
    /// inclusive flag is set.
    ///
    /// # Panics
    ///
    /// Panics if `end` is ordered before `start`, or if the bounds are equal and either is
    /// exclusive.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 2, 2, 3, 4, 4, 5]);
    /// assert_eq!(multiset.count_range(&2, true, &4, true), 5);
    /// assert_eq!(multiset.count_range(&2, false, &4, false), 1);
    /// ```
    pub fn count_range(
        &self,
        start: &T,
        inclusive_start: bool,
        end: &T,
        inclusive_end: bool,
    ) -> usize {
        self.try_count_range(start, inclusive_start, end, inclusive_end)
            .unwrap_or_else(|err| panic!("Error: {}.", err))
    }

    /// Returns how many values are equal to `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 4, 4]);
    /// assert_eq!(multiset.count(&4), 2);
    /// assert_eq!(multiset.count(&3), 0);
    /// ```
    pub fn count(&self, value: &T) -> usize {
        self.count_range(value, true, value, true)
    }

    /// Checks if a value equal to `value` exists in the multiset.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 4]);
    /// assert!(multiset.contains(&4));
    /// assert!(!multiset.contains(&3));
    /// ```
    pub fn contains(&self, value: &T) -> bool {
        self.find_lower_bound(value)
            .map_or(false, |(element, _)| !self.comparator.less(value, &element.value()))
    }

    /// Returns the first element that is not ordered before `value`, together with its index.
    /// Returns `None` if every value is less than `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// let (element, index) = multiset.find_lower_bound(&2).unwrap();
    /// assert_eq!((*element.value(), index), (2, 1));
    /// assert!(multiset.find_lower_bound(&4).is_none());
    /// ```
    pub fn find_lower_bound(&self, value: &T) -> Option<(Element<'_, T>, usize)> {
        self.first_not_below(value, false)
            .map(|(entry, index)| (Element::new(&self.arena, entry), index))
    }

    /// Returns the last element that is not ordered after `value`, together with its index.
    /// Returns `None` if every value is greater than `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// let (element, index) = multiset.find_upper_bound(&2).unwrap();
    /// assert_eq!((*element.value(), index), (2, 2));
    /// assert!(multiset.find_upper_bound(&0).is_none());
    /// ```
    pub fn find_upper_bound(&self, value: &T) -> Option<(Element<'_, T>, usize)> {
        self.last_not_above(value, false)
            .map(|(entry, index)| (Element::new(&self.arena, entry), index))
    }
}

impl<T, C, P> TreapMultiset<T, C, P>
where
    C: Comparator<T> + Clone,
    P: PrioritySource + Clone,
{
    /// Splits the multiset into the values ordered before `value` and the rest, leaving the
    /// multiset empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// let (left, right) = multiset.split_before(&2);
    /// assert_eq!(left.values().map(|value| *value).collect::<Vec<u32>>(), vec![1]);
    /// assert_eq!(right.values().map(|value| *value).collect::<Vec<u32>>(), vec![2, 2, 3]);
    /// ```
    pub fn split_before(&mut self, value: &T) -> (Self, Self) {
        let root = self.root.take();
        let parts = self.split_less(root, value);
        self.partition(parts)
    }

    /// Splits the multiset into the values not ordered after `value` and the rest, leaving the
    /// multiset empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::TreapMultiset;
    ///
    /// let mut multiset = TreapMultiset::from_values(vec![1, 2, 2, 3]);
    /// let (left, right) = multiset.split_after(&2);
    /// assert_eq!(left.values().map(|value| *value).collect::<Vec<u32>>(), vec![1, 2, 2]);
    /// assert_eq!(right.values().map(|value| *value).collect::<Vec<u32>>(), vec![3]);
    /// ```
    pub fn split_after(&mut self, value: &T) -> (Self, Self) {
        let root = self.root.take();
        let parts = self.split_less_or_equal(root, value);
        self.partition(parts)
    }
}

impl<T: Ord> Default for TreapMultiset<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for TreapMultiset<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_values(iter)
    }
}

impl<T, C, P> Extend<T> for TreapMultiset<T, C, P>
where
    C: Comparator<T>,
    P: PrioritySource,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in iter {
            self.insert_right(value);
        }
    }
}

impl<T, C, P> Drop for TreapMultiset<T, C, P> {
    fn drop(&mut self) {
        // A sole owner drops the storage whole.
        if Rc::strong_count(&self.arena) > 1 {
            if let Ok(mut arena) = self.arena.try_borrow_mut() {
                tree::free(&mut arena, self.root.take());
            }
        }
    }
}

impl<T, C, P> Clone for TreapMultiset<T, C, P>
where
    T: Clone,
    C: Clone,
    P: Clone,
{
    fn clone(&self) -> Self {
        let from = self.arena.borrow();
        let mut arena = Arena::with_capacity(tree::len(&from, self.root));
        let root = tree::copy(&from, &mut arena, self.root);
        Self::from_parts(
            Rc::new(RefCell::new(arena)),
            root,
            self.comparator.clone(),
            self.priorities.clone(),
        )
    }
}

impl<T, C, P> IntoIterator for TreapMultiset<T, C, P> {
    type IntoIter = TreapMultisetIntoIter<T>;
    type Item = T;

    fn into_iter(mut self) -> Self::IntoIter {
        let remaining = self.len();
        TreapMultisetIntoIter {
            arena: Rc::clone(&self.arena),
            current: self.root.take(),
            stack: Vec::new(),
            remaining,
        }
    }
}

impl<'a, T, C, P> IntoIterator for &'a TreapMultiset<T, C, P>
where
    T: 'a,
{
    type IntoIter = Values<'a, T>;
    type Item = Ref<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values()
    }
}

/// An owning iterator for `TreapMultiset<T>`.
///
/// This iterator traverses the values of the multiset in order and yields owned values.
pub struct TreapMultisetIntoIter<T> {
    arena: Rc<RefCell<Arena<T>>>,
    current: Tree,
    stack: Vec<Entry>,
    remaining: usize,
}

impl<T> Iterator for TreapMultisetIntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let mut arena = self.arena.borrow_mut();
        while let Some(entry) = self.current {
            self.stack.push(entry);
            self.current = arena[entry].left;
        }
        let entry = self.stack.pop()?;
        let Node { value, right, .. } = arena.free(&entry);
        self.current = right;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for TreapMultisetIntoIter<T> {}

impl<T> Drop for TreapMultisetIntoIter<T> {
    fn drop(&mut self) {
        if Rc::strong_count(&self.arena) == 1 {
            return;
        }
        if let Ok(mut arena) = self.arena.try_borrow_mut() {
            tree::free(&mut arena, self.current.take());
            // Left subtrees of stacked nodes are already consumed or stacked above them.
            while let Some(entry) = self.stack.pop() {
                let right = arena.free(&entry).right;
                tree::free(&mut arena, right);
            }
        }
    }
}

impl<T, C, P> Add for TreapMultiset<T, C, P> {
    type Output = TreapMultiset<T, C, P>;

    fn add(self, other: TreapMultiset<T, C, P>) -> TreapMultiset<T, C, P> {
        Self::merge(self, other)
    }
}

impl<T, C, P> fmt::Debug for TreapMultiset<T, C, P>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

impl<T, C, P> Serialize for TreapMultiset<T, C, P>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.values() {
            seq.serialize_element(&*value)?;
        }
        seq.end()
    }
}

impl<'de, T> Deserialize<'de> for TreapMultiset<T>
where
    T: Deserialize<'de> + Ord,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<T>::deserialize(deserializer).map(Self::from_values)
    }
}
