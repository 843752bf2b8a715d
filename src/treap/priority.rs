use rand::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::fmt;

/// A source of node priorities used to balance a treap.
///
/// Priorities only decide the shape of the tree, never the order of the values. Any
/// `FnMut() -> u64` closure is a priority source, which makes it possible to force a particular
/// shape in tests.
///
/// # Examples
///
/// ```
/// use ordered_treap::treap::PrioritySource;
///
/// let mut counter = 0u64;
/// let mut source = move || {
///     counter += 1;
///     counter
/// };
/// assert_eq!(source.next_priority(), 1);
/// assert_eq!(source.next_priority(), 2);
/// ```
pub trait PrioritySource {
    fn next_priority(&mut self) -> u64;

    /// Returns the source handed to the second half when a multiset is split. The default is a
    /// clone of `self`.
    fn fork(&mut self) -> Self
    where
        Self: Clone,
    {
        self.clone()
    }
}

impl<F> PrioritySource for F
where
    F: FnMut() -> u64,
{
    fn next_priority(&mut self) -> u64 {
        self()
    }
}

/// The default priority source: a xorshift generator seeded from the thread-local generator.
#[derive(Clone)]
pub struct RandomPriority {
    rng: XorShiftRng,
}

impl RandomPriority {
    /// Constructs a new `RandomPriority` with a random seed.
    pub fn new() -> Self {
        Self::from_seed(rand::random())
    }

    /// Constructs a new `RandomPriority` that always yields the same sequence for the same seed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::{PrioritySource, RandomPriority};
    ///
    /// let mut a = RandomPriority::from_seed(7);
    /// let mut b = RandomPriority::from_seed(7);
    /// assert_eq!(a.next_priority(), b.next_priority());
    /// ```
    pub fn from_seed(seed: u64) -> Self {
        RandomPriority {
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPriority {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomPriority").finish()
    }
}

impl PrioritySource for RandomPriority {
    fn next_priority(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Returns a generator seeded from the next value of this one, so the two sequences are
    /// unrelated.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_treap::treap::{PrioritySource, RandomPriority};
    ///
    /// let mut source = RandomPriority::from_seed(7);
    /// let mut fork = source.fork();
    /// assert_ne!(source.next_priority(), fork.next_priority());
    /// ```
    fn fork(&mut self) -> Self {
        RandomPriority::from_seed(self.rng.next_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::{PrioritySource, RandomPriority};

    #[test]
    fn test_seeded_sequences_repeat() {
        let mut a = RandomPriority::from_seed(528);
        let mut b = RandomPriority::from_seed(528);
        for _ in 0..100 {
            assert_eq!(a.next_priority(), b.next_priority());
        }
    }

    #[test]
    fn test_closure_source() {
        let mut priorities = vec![3u64, 2, 1];
        let mut source = move || priorities.pop().unwrap_or(0);
        assert_eq!(source.next_priority(), 1);
        assert_eq!(source.next_priority(), 2);
        assert_eq!(source.next_priority(), 3);
        assert_eq!(source.next_priority(), 0);
    }

    #[test]
    fn test_fork_draws_unrelated_sequence() {
        let mut source = RandomPriority::from_seed(528);
        let mut fork = source.fork();
        let source_priorities: Vec<u64> = (0..8).map(|_| source.next_priority()).collect();
        let fork_priorities: Vec<u64> = (0..8).map(|_| fork.next_priority()).collect();
        assert_ne!(source_priorities, fork_priorities);

        let mut again = RandomPriority::from_seed(528);
        let mut again_fork = again.fork();
        assert_eq!(again_fork.next_priority(), fork_priorities[0]);
    }

    #[test]
    fn test_closure_fork_clones() {
        let mut counter = 0u64;
        let mut source = move || {
            counter += 1;
            counter
        };
        let mut fork = source.fork();
        assert_eq!(source.next_priority(), 1);
        assert_eq!(fork.next_priority(), 1);
    }
}
