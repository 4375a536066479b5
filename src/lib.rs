//! Tessera: lowering of tiled tensor constructs to sequential loops.
//!
//! The IR substrate lives in [`tessera_ir`], the rewrite itself in
//! [`tessera_passes`]. This crate wires them into a pipeline that runs the
//! lowering and checks what it produced.

pub mod error;
pub mod logging;
pub mod pipeline;

pub use error::PipelineError;
pub use logging::init_logging;
pub use pipeline::{PipelineOptions, PipelineReport, lower_tiles};

pub use tessera_ir as ir;
pub use tessera_passes as passes;
