//! Error types: bad construction arguments and broken internal invariants.

use core::fmt;

/// Rejected `MapConfig`. Raised only at construction, before any allocation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Load factor was zero, negative, NaN or infinite.
    InvalidLoadFactor(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLoadFactor(lf) => write!(f, "illegal load factor: {lf}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A structural invariant found broken by `SafeHashMap::validate`.
///
/// These indicate a bug in the map itself, never a caller mistake.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvariantViolation {
    TableLengthNotPowerOfTwo(usize),
    ThresholdMismatch { expected: usize, found: usize },
    MisplacedEntry { bucket: usize, hash: u32 },
    SizeMismatch { expected: usize, found: usize },
    TreeTooSmall { bucket: usize, len: usize },
    TreeShape { bucket: usize, reason: &'static str },
    OrphanedTreeNodes { reachable: usize, allocated: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::TableLengthNotPowerOfTwo(len) => {
                write!(f, "table length {len} is not a power of two")
            }
            InvariantViolation::ThresholdMismatch { expected, found } => {
                write!(f, "threshold is {found}, expected {expected}")
            }
            InvariantViolation::MisplacedEntry { bucket, hash } => {
                write!(f, "entry with hash {hash:#010x} stored in bucket {bucket}")
            }
            InvariantViolation::SizeMismatch { expected, found } => {
                write!(f, "size is {expected} but {found} entries are live")
            }
            InvariantViolation::TreeTooSmall { bucket, len } => {
                write!(f, "tree bucket {bucket} holds only {len} nodes")
            }
            InvariantViolation::TreeShape { bucket, reason } => {
                write!(f, "tree bucket {bucket} is malformed: {reason}")
            }
            InvariantViolation::OrphanedTreeNodes {
                reachable,
                allocated,
            } => write!(
                f,
                "{allocated} tree nodes allocated but {reachable} reachable from buckets"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}
