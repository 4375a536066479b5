//! Pipeline errors.

use derive_more::{Display, Error, From};
use tessera_ir::rewrite::IllegalOp;
use tessera_ir::validation::ValidationResult;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Display, Error, From)]
pub enum PipelineError {
    /// The driver hit its rewrite bound with work left.
    #[from(ignore)]
    #[display("lowering stopped after {rewrites} rewrite(s) without reaching a fixpoint")]
    NoFixpoint { rewrites: usize },

    /// Operations of a lowered dialect survived the pass.
    #[display("{} illegal operation(s) remain after lowering: {}", illegal.len(), join(illegal))]
    IllegalOps { illegal: Vec<IllegalOp> },

    /// The lowered IR is malformed.
    #[display("lowered IR failed validation:\n{report}")]
    Invalid { report: ValidationResult },
}

fn join(ops: &[IllegalOp]) -> String {
    ops.iter()
        .map(IllegalOp::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
