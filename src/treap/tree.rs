use crate::arena::{Entry, TypedArena};
use crate::treap::node::Node;
use std::convert::TryFrom;

pub type Arena<T> = TypedArena<Node<T>>;
pub type Tree = Option<Entry>;

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

type Slot = Option<(Entry, Side)>;

pub fn len<T>(arena: &Arena<T>, tree: Tree) -> usize {
    tree.map_or(0, |entry| arena[entry].len)
}

pub fn update<T>(arena: &mut Arena<T>, entry: Entry) {
    let Node { left, right, .. } = arena[entry];
    arena[entry].len = len(arena, left) + 1 + len(arena, right);
}

// Hangs `child` under the slot, or makes it the root when there is no slot yet.
fn attach<T>(arena: &mut Arena<T>, root: &mut Tree, slot: Slot, child: Tree) {
    match slot {
        Some((parent, Side::Left)) => arena[parent].left = child,
        Some((parent, Side::Right)) => arena[parent].right = child,
        None => *root = child,
    }
    if let Some(child_entry) = child {
        arena[child_entry].parent = slot.map(|(parent, _)| parent);
    }
}

/// Joins two detached trees where every value of `l_tree` precedes every value of `r_tree`.
///
/// The root with the higher priority wins, ties going to `l_tree`. The walk keeps the path it
/// descends on an explicit stack so that degenerate priorities cannot overflow the call stack.
pub fn merge<T>(arena: &mut Arena<T>, l_tree: Tree, r_tree: Tree) -> Tree {
    let mut root = None;
    let mut slot = None;
    let mut path = Vec::new();
    let (mut l_tree, mut r_tree) = (l_tree, r_tree);
    loop {
        match (l_tree, r_tree) {
            (Some(l_entry), Some(r_entry)) => {
                if arena[l_entry].priority >= arena[r_entry].priority {
                    attach(arena, &mut root, slot, l_tree);
                    slot = Some((l_entry, Side::Right));
                    l_tree = arena[l_entry].right;
                    path.push(l_entry);
                } else {
                    attach(arena, &mut root, slot, r_tree);
                    slot = Some((r_entry, Side::Left));
                    r_tree = arena[r_entry].left;
                    path.push(r_entry);
                }
            },
            (rest, None) | (None, rest) => {
                attach(arena, &mut root, slot, rest);
                break;
            },
        }
    }
    for entry in path.into_iter().rev() {
        update(arena, entry);
    }
    root
}

/// Splits a detached tree into the prefix of nodes satisfying `predicate` and the remaining
/// suffix. The predicate receives each value together with its absolute index, which is the
/// in-order position inside the tree shifted by `offset`.
///
/// The predicate must hold for a prefix of positions and fail for the rest; only a single
/// root-to-leaf path is inspected.
pub fn split<T, F>(arena: &mut Arena<T>, tree: Tree, mut predicate: F, offset: usize) -> (Tree, Tree)
where
    F: FnMut(&T, usize) -> bool,
{
    let (mut l_root, mut r_root) = (None, None);
    let (mut l_slot, mut r_slot) = (None, None);
    let mut path = Vec::new();
    let mut curr = tree;
    let mut offset = offset;
    while let Some(entry) = curr {
        path.push(entry);
        let index = offset + len(arena, arena[entry].left);
        if predicate(&arena[entry].value, index) {
            attach(arena, &mut l_root, l_slot, curr);
            l_slot = Some((entry, Side::Right));
            curr = arena[entry].right;
            offset = index + 1;
        } else {
            attach(arena, &mut r_root, r_slot, curr);
            r_slot = Some((entry, Side::Left));
            curr = arena[entry].left;
        }
    }
    attach(arena, &mut l_root, l_slot, None);
    attach(arena, &mut r_root, r_slot, None);
    for entry in path.into_iter().rev() {
        update(arena, entry);
    }
    (l_root, r_root)
}

/// Returns the last node satisfying `predicate` and its absolute index.
pub fn lookup_rightmost_match<T, F>(
    arena: &Arena<T>,
    tree: Tree,
    mut predicate: F,
    offset: usize,
) -> Option<(Entry, usize)>
where
    F: FnMut(&T, usize) -> bool,
{
    let mut ret = None;
    let mut curr = tree;
    let mut offset = offset;
    while let Some(entry) = curr {
        let node = &arena[entry];
        let index = offset + len(arena, node.left);
        if predicate(&node.value, index) {
            ret = Some((entry, index));
            curr = node.right;
            offset = index + 1;
        } else {
            curr = node.left;
        }
    }
    ret
}

/// Returns the first node failing `predicate` and its absolute index.
pub fn lookup_leftmost_unmatch<T, F>(
    arena: &Arena<T>,
    tree: Tree,
    mut predicate: F,
    offset: usize,
) -> Option<(Entry, usize)>
where
    F: FnMut(&T, usize) -> bool,
{
    let mut ret = None;
    let mut curr = tree;
    let mut offset = offset;
    while let Some(entry) = curr {
        let node = &arena[entry];
        let index = offset + len(arena, node.left);
        if predicate(&node.value, index) {
            curr = node.right;
            offset = index + 1;
        } else {
            ret = Some((entry, index));
            curr = node.left;
        }
    }
    ret
}

pub fn nth<T>(arena: &Arena<T>, tree: Tree, index: usize) -> Option<Entry> {
    lookup_leftmost_unmatch(arena, tree, |_, node_index| node_index < index, 0).map(|(entry, _)| entry)
}

pub fn min<T>(arena: &Arena<T>, mut entry: Entry) -> Entry {
    while let Some(left) = arena[entry].left {
        entry = left;
    }
    entry
}

pub fn max<T>(arena: &Arena<T>, mut entry: Entry) -> Entry {
    while let Some(right) = arena[entry].right {
        entry = right;
    }
    entry
}

pub fn root<T>(arena: &Arena<T>, mut entry: Entry) -> Entry {
    while let Some(parent) = arena[entry].parent {
        entry = parent;
    }
    entry
}

pub fn leftmost<T>(arena: &Arena<T>, entry: Entry) -> Entry {
    min(arena, root(arena, entry))
}

pub fn rightmost<T>(arena: &Arena<T>, entry: Entry) -> Entry {
    max(arena, root(arena, entry))
}

pub fn prev<T>(arena: &Arena<T>, entry: Entry) -> Option<Entry> {
    if let Some(left) = arena[entry].left {
        return Some(max(arena, left));
    }
    let mut curr = entry;
    while let Some(parent) = arena[curr].parent {
        if arena[parent].right == Some(curr) {
            return Some(parent);
        }
        curr = parent;
    }
    None
}

pub fn next<T>(arena: &Arena<T>, entry: Entry) -> Option<Entry> {
    if let Some(right) = arena[entry].right {
        return Some(min(arena, right));
    }
    let mut curr = entry;
    while let Some(parent) = arena[curr].parent {
        if arena[parent].left == Some(curr) {
            return Some(parent);
        }
        curr = parent;
    }
    None
}

pub fn index<T>(arena: &Arena<T>, entry: Entry) -> usize {
    let mut index = len(arena, arena[entry].left);
    let mut curr = entry;
    while let Some(parent) = arena[curr].parent {
        if arena[parent].right == Some(curr) {
            index += len(arena, arena[parent].left) + 1;
        }
        curr = parent;
    }
    index
}

/// Moves `offset` positions from `entry` inside the tree containing it.
pub fn jump<T>(arena: &Arena<T>, entry: Entry, offset: isize) -> Option<Entry> {
    let target = isize::try_from(index(arena, entry)).ok()?.checked_add(offset)?;
    let target = usize::try_from(target).ok()?;
    nth(arena, Some(root(arena, entry)), target)
}

/// Deallocates every node of a detached tree and returns how many there were.
pub fn free<T>(arena: &mut Arena<T>, tree: Tree) -> usize {
    let mut stack: Vec<Entry> = tree.into_iter().collect();
    let mut count = 0;
    while let Some(entry) = stack.pop() {
        let Node { left, right, .. } = arena.free(&entry);
        stack.extend(left);
        stack.extend(right);
        count += 1;
    }
    count
}

// Rebuilds a detached tree inside `to` from the nodes handed out by `take`, keeping its shape.
fn transplant<T, F>(to: &mut Arena<T>, tree: Tree, mut take: F) -> Tree
where
    F: FnMut(Entry) -> Node<T>,
{
    let mut root = None;
    let mut stack: Vec<(Entry, Slot)> = tree.map(|entry| (entry, None)).into_iter().collect();
    while let Some((entry, slot)) = stack.pop() {
        let Node {
            value,
            priority,
            len,
            left,
            right,
            ..
        } = take(entry);
        let new_entry = to.allocate(Node {
            value,
            priority,
            len,
            left: None,
            right: None,
            parent: None,
        });
        attach(to, &mut root, slot, Some(new_entry));
        stack.extend(left.map(|left| (left, Some((new_entry, Side::Left)))));
        stack.extend(right.map(|right| (right, Some((new_entry, Side::Right)))));
    }
    root
}

/// Moves a detached tree out of `from` and into `to`, keeping its shape and priorities.
pub fn relocate<T>(from: &mut Arena<T>, to: &mut Arena<T>, tree: Tree) -> Tree {
    transplant(to, tree, |entry| from.free(&entry))
}

/// Copies a detached tree of `from` into `to`, keeping its shape and priorities.
pub fn copy<T: Clone>(from: &Arena<T>, to: &mut Arena<T>, tree: Tree) -> Tree {
    transplant(to, tree, |entry| from[entry].clone())
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn build(arena: &mut Arena<u32>, nodes: &[(u32, u64)]) -> Tree {
        nodes.iter().fold(None, |tree, &(value, priority)| {
            let entry = arena.allocate(Node::new(value, priority));
            merge(arena, tree, Some(entry))
        })
    }

    pub fn values<T: Clone>(arena: &Arena<T>, tree: Tree) -> Vec<T> {
        let mut ret = Vec::new();
        let mut stack = Vec::new();
        let mut curr = tree;
        loop {
            while let Some(entry) = curr {
                stack.push(entry);
                curr = arena[entry].left;
            }
            match stack.pop() {
                Some(entry) => {
                    ret.push(arena[entry].value.clone());
                    curr = arena[entry].right;
                },
                None => return ret,
            }
        }
    }

    // Verifies size, heap and parent links below `tree` and returns its size.
    pub fn check<T>(arena: &Arena<T>, tree: Tree, parent: Tree) -> usize {
        match tree {
            None => 0,
            Some(entry) => {
                let node = &arena[entry];
                assert_eq!(node.parent, parent);
                for child in node.left.iter().chain(node.right.iter()) {
                    assert!(arena[*child].priority <= node.priority);
                }
                let len = check(arena, node.left, tree) + 1 + check(arena, node.right, tree);
                assert_eq!(node.len, len);
                len
            },
        }
    }

    #[test]
    fn test_merge_keeps_heap_and_order() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 5), (2, 9), (3, 1), (4, 7)]);
        assert_eq!(values(&arena, tree), vec![1, 2, 3, 4]);
        assert_eq!(arena[tree.unwrap()].value, 2);
        assert_eq!(check(&arena, tree, None), 4);
    }

    #[test]
    fn test_merge_tie_prefers_left() {
        let mut arena = Arena::new();
        let l_entry = arena.allocate(Node::new(1, 3));
        let r_entry = arena.allocate(Node::new(2, 3));
        let tree = merge(&mut arena, Some(l_entry), Some(r_entry));
        assert_eq!(tree, Some(l_entry));
        assert_eq!(arena[l_entry].right, Some(r_entry));
        check(&arena, tree, None);
    }

    #[test]
    fn test_merge_empty() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 2), (2, 1)]);
        assert_eq!(merge(&mut arena, tree, None), tree);
        assert_eq!(merge(&mut arena, None, tree), tree);
        assert_eq!(merge(&mut arena, None, None), None);
    }

    #[test]
    fn test_merge_degenerate_priorities() {
        let mut arena = Arena::new();
        let nodes: Vec<(u32, u64)> = (0..2_000).map(|i| (i, u64::from(i))).collect();
        let tree = build(&mut arena, &nodes);
        assert_eq!(check(&arena, tree, None), 2_000);
        assert_eq!(arena[tree.unwrap()].value, 1_999);
    }

    #[test]
    fn test_split_by_value() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 4), (2, 8), (3, 2), (4, 6), (5, 9)]);
        let (left, right) = split(&mut arena, tree, |value, _| *value < 3, 0);
        assert_eq!(values(&arena, left), vec![1, 2]);
        assert_eq!(values(&arena, right), vec![3, 4, 5]);
        check(&arena, left, None);
        check(&arena, right, None);
    }

    #[test]
    fn test_split_whole_tree_one_side() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 4), (2, 8), (3, 2)]);
        let (left, right) = split(&mut arena, tree, |_, _| true, 0);
        assert_eq!(values(&arena, left), vec![1, 2, 3]);
        assert_eq!(right, None);
        let (left, right) = split(&mut arena, left, |_, _| false, 0);
        assert_eq!(left, None);
        assert_eq!(values(&arena, right), vec![1, 2, 3]);
        check(&arena, right, None);
    }

    #[test]
    fn test_split_honors_offset() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(10, 3), (20, 1), (30, 5), (40, 2), (50, 4)]);
        let (left, right) = split(&mut arena, tree, |_, index| index < 4, 2);
        assert_eq!(values(&arena, left), vec![10, 20]);
        assert_eq!(values(&arena, right), vec![30, 40, 50]);
        check(&arena, left, None);
        check(&arena, right, None);
    }

    #[test]
    fn test_split_then_merge_restores() {
        let mut arena = Arena::new();
        let nodes: Vec<(u32, u64)> = (0..64).map(|i| (i, u64::from((i * 37) % 64))).collect();
        let tree = build(&mut arena, &nodes);
        for cut in 0..=64 {
            let (left, right) = split(&mut arena, tree, |_, index| index < cut, 0);
            assert_eq!(len(&arena, left), cut);
            let tree = merge(&mut arena, left, right);
            assert_eq!(check(&arena, tree, None), 64);
        }
    }

    #[test]
    fn test_navigation() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 4), (2, 8), (3, 2), (4, 6), (5, 9)]);
        let first = nth(&arena, tree, 0).unwrap();
        let last = nth(&arena, tree, 4).unwrap();
        assert_eq!(prev(&arena, first), None);
        assert_eq!(next(&arena, last), None);

        let mut forward = Vec::new();
        let mut curr = Some(first);
        while let Some(entry) = curr {
            forward.push(arena[entry].value);
            assert_eq!(index(&arena, entry), forward.len() - 1);
            assert_eq!(leftmost(&arena, entry), first);
            assert_eq!(rightmost(&arena, entry), last);
            curr = next(&arena, entry);
        }
        assert_eq!(forward, vec![1, 2, 3, 4, 5]);

        let mut backward = Vec::new();
        let mut curr = Some(last);
        while let Some(entry) = curr {
            backward.push(arena[entry].value);
            curr = prev(&arena, entry);
        }
        assert_eq!(backward, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_lookup() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 4), (2, 8), (2, 2), (3, 6), (5, 9)]);
        let (entry, index) = lookup_leftmost_unmatch(&arena, tree, |value, _| *value < 2, 0).unwrap();
        assert_eq!((arena[entry].value, index), (2, 1));
        let (entry, index) = lookup_rightmost_match(&arena, tree, |value, _| *value <= 2, 0).unwrap();
        assert_eq!((arena[entry].value, index), (2, 2));
        let (entry, index) = lookup_leftmost_unmatch(&arena, tree, |value, _| *value < 4, 10).unwrap();
        assert_eq!((arena[entry].value, index), (5, 14));

        assert_eq!(lookup_leftmost_unmatch(&arena, tree, |value, _| *value < 6, 0), None);
        assert_eq!(lookup_rightmost_match(&arena, tree, |value, _| *value < 1, 0), None);
        assert_eq!(lookup_rightmost_match(&arena, None, |_: &u32, _| true, 0), None);
        assert_eq!(nth(&arena, tree, 5), None);
    }

    #[test]
    fn test_jump() {
        let mut arena = Arena::new();
        let nodes: Vec<(u32, u64)> = (0..20).map(|i| (i, u64::from((i * 7) % 20))).collect();
        let tree = build(&mut arena, &nodes);
        let start = nth(&arena, tree, 5).unwrap();
        assert_eq!(jump(&arena, start, 0), Some(start));
        assert_eq!(jump(&arena, start, 1), next(&arena, start));
        assert_eq!(jump(&arena, start, -1), prev(&arena, start));
        assert_eq!(jump(&arena, start, 14), nth(&arena, tree, 19));
        assert_eq!(jump(&arena, start, -5), nth(&arena, tree, 0));
        assert_eq!(jump(&arena, start, 15), None);
        assert_eq!(jump(&arena, start, -6), None);
        assert_eq!(jump(&arena, start, isize::MIN), None);
        assert_eq!(jump(&arena, start, isize::MAX), None);
    }

    #[test]
    fn test_free() {
        let mut arena = Arena::new();
        let tree = build(&mut arena, &[(1, 4), (2, 8), (3, 2)]);
        assert_eq!(free(&mut arena, tree), 3);
        assert!(arena.is_empty());
        assert_eq!(free(&mut arena, None), 0);
    }

    #[test]
    fn test_relocate() {
        let mut from = Arena::new();
        let mut to = Arena::new();
        let kept = build(&mut to, &[(0, 1)]);
        let tree = build(&mut from, &[(1, 4), (2, 8), (3, 2), (4, 6)]);
        let priority = from[tree.unwrap()].priority;

        let moved = relocate(&mut from, &mut to, tree);
        assert!(from.is_empty());
        assert_eq!(to.len(), 5);
        assert_eq!(values(&to, moved), vec![1, 2, 3, 4]);
        assert_eq!(to[moved.unwrap()].priority, priority);
        assert_eq!(check(&to, moved, None), 4);

        let tree = merge(&mut to, kept, moved);
        assert_eq!(values(&to, tree), vec![0, 1, 2, 3, 4]);
        check(&to, tree, None);
    }

    #[test]
    fn test_copy() {
        let mut from = Arena::new();
        let mut to = Arena::new();
        let tree = build(&mut from, &[(1, 4), (2, 8), (3, 2), (4, 6)]);

        let copied = copy(&from, &mut to, tree);
        assert_eq!(from.len(), 4);
        assert_eq!(to.len(), 4);
        assert_eq!(values(&from, tree), values(&to, copied));
        assert_eq!(to[copied.unwrap()].priority, from[tree.unwrap()].priority);
        assert_eq!(check(&to, copied, None), 4);
        assert_eq!(copy(&from, &mut to, None), None);
    }
}
