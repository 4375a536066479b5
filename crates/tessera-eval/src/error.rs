//! Evaluation errors.

use derive_more::{Display, Error};
use tessera_ir::{BlockRef, ValueRef};

/// Why evaluation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum EvalError {
    #[display("unsupported operation `{name}`")]
    UnsupportedOp { name: String },

    #[display("{op}: expected {expected}, found {found}")]
    TypeMismatch {
        op: String,
        expected: &'static str,
        found: &'static str,
    },

    #[display(
        "slice [offset {offset}, size {size}, stride {stride}] exceeds extent {extent} of dimension {dim}"
    )]
    OutOfBounds {
        dim: usize,
        offset: usize,
        size: usize,
        stride: usize,
        extent: usize,
    },

    #[display("index operand {value} must be non-negative")]
    NegativeIndex { value: i64 },

    #[display("slice stride must be at least 1, got {stride}")]
    ZeroStride { stride: usize },

    #[display("expected rank {expected}, found rank {found}")]
    RankMismatch { expected: usize, found: usize },

    #[display("expected shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[display("shape {shape:?} holds {expected} element(s), got {found}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },

    #[display("dimension {index} is out of range for rank {rank}")]
    DimOutOfRange { index: u64, rank: usize },

    #[display("loop step must be positive, got {step}")]
    InvalidStep { step: i64 },

    #[display("value {value} used before definition")]
    UndefinedValue { value: ValueRef },

    #[display("{block} ends without a terminator")]
    MissingTerminator { block: BlockRef },

    #[display("function takes {expected} argument(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[display("no function named `{name}`")]
    NoSuchFunction { name: String },
}
