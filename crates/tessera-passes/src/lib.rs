//! Lowering passes over Tessera IR.

pub mod tile_to_scf;

pub use tile_to_scf::{
    PreconditionViolation, TileLoweringConfig, TileShape, TileToSequentialFor, check_preconditions,
};
