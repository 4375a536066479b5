//! Rewrite infrastructure.
//!
//! Patterns mutate the IR in place: they create new operations directly in
//! the `IrContext`, record how the matched operation is replaced through a
//! `PatternRewriter`, and the `PatternApplicator` applies the recorded
//! mutations (insertion, RAUW, removal) once the pattern returns.

pub mod applicator;
pub mod conversion_target;
pub mod helpers;
pub mod pattern;
pub mod rewriter;

pub use applicator::{ApplyResult, PatternApplicator};
pub use conversion_target::{ConversionTarget, IllegalOp, Legality};
pub use helpers::{erase_op, merge_block};
pub use pattern::RewritePattern;
pub use rewriter::PatternRewriter;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// A `core.module` op: one region whose first block holds top-level ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Module(pub(crate) OpRef);

impl Module {
    pub fn op(self) -> OpRef {
        self.0
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    /// The `sym_name` attribute, if the module carries one.
    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        match ctx.op(self.0).attributes.get(&Symbol::new("sym_name")) {
            Some(Attribute::Symbol(s)) => Some(*s),
            _ => None,
        }
    }

    /// Top-level operations in the module's first block.
    pub fn ops(self, ctx: &IrContext) -> Vec<OpRef> {
        self.first_block(ctx)
            .map(|b| ctx.block(b).ops.to_vec())
            .unwrap_or_default()
    }

    pub fn first_block(self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.region(self.body(ctx)).blocks.first().copied()
    }
}
