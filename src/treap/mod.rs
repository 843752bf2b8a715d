//! Probabilistic binary search tree where each node also maintains the heap invariant.

mod element;
mod multiset;
mod node;
mod order;
mod priority;
mod tree;

pub use self::element::{Element, Elements, Values};
pub use self::multiset::{TreapMultiset, TreapMultisetIntoIter};
pub use self::order::{Comparator, NaturalOrder};
pub use self::priority::{PrioritySource, RandomPriority};
