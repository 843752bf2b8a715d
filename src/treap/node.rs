use crate::arena::Entry;

/// A struct representing an internal node of a treap.
///
/// Children are owned through the arena that stores the node; `parent` is only used to walk
/// upwards and never owns anything.
#[derive(Clone)]
pub struct Node<T> {
    pub value: T,
    pub priority: u64,
    pub len: usize,
    pub left: Option<Entry>,
    pub right: Option<Entry>,
    pub parent: Option<Entry>,
}

impl<T> Node<T> {
    pub fn new(value: T, priority: u64) -> Self {
        Node {
            value,
            priority,
            len: 1,
            left: None,
            right: None,
            parent: None,
        }
    }
}
