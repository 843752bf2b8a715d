use thiserror::Error;

/// Contract violations reported by the checked range operations of `TreapMultiset`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// The end of the range is ordered before its start.
    #[error("range end must not be lower than range start")]
    InvertedRange,
    /// The bounds are equal but at least one of them is exclusive.
    #[error("a range with equal bounds must be inclusive on both ends")]
    EmptyExclusiveRange,
}

pub type Result<T> = std::result::Result<T, Error>;
