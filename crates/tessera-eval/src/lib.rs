//! Reference interpreter for Tessera IR.
//!
//! Runs a `func.func` over concrete tensors. Tests use it to check that a
//! lowered function computes the same values as the tiled original.

pub mod error;
pub mod evaluator;
pub mod value;

pub use error::EvalError;
pub use evaluator::{Evaluator, evaluate, evaluate_named};
pub use value::{Tensor, Value, Window};
