//! Tessera IR crate.
//!
//! An arena-allocated, mutable, MLIR-style IR: operations own regions, regions
//! own blocks, blocks own operations, and every SSA value keeps an explicit
//! use-chain so that rewrites can replace values in place.
//!
//! The dialects provided here (`core`, `func`, `arith`, `tensor`, `scf`,
//! `tile`) cover what the tiling lowering consumes and produces.

pub mod context;
pub mod dialect;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod rewrite;
pub mod symbol;
pub mod types;
pub mod validation;
pub mod walk;

pub use context::{
    BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use, ValueData,
};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use rewrite::Module;
pub use symbol::Symbol;
pub use types::{Attribute, Interner, PathInterner, TypeData, TypeInterner};
pub use walk::WalkAction;

// Re-export smallvec for dialect constructors and downstream crates
pub use smallvec;
