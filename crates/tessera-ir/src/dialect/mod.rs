//! Dialect definitions.
//!
//! Each module declares its operation wrappers with `define_op!` and provides
//! accessors plus constructors. Constructors create detached operations; the
//! caller attaches them with `push_op` or `insert_op_before`.

pub mod arith;
pub mod core;
pub mod func;
pub mod scf;
pub mod tensor;
pub mod tile;

use smallvec::smallvec;

use crate::context::{BlockData, IrContext, RegionData};
use crate::location::Location;
use crate::refs::{BlockRef, RegionRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Create a region holding one empty block with arguments of the given types.
pub fn single_block_region(
    ctx: &mut IrContext,
    location: Location,
    arg_types: &[TypeRef],
) -> (RegionRef, BlockRef) {
    let block = ctx.create_block(BlockData {
        location,
        args: arg_types.into(),
        ops: Default::default(),
        parent_region: None,
    });
    let region = ctx.create_region(RegionData {
        location,
        blocks: smallvec![block],
        parent_op: None,
    });
    (region, block)
}

/// The first block of a region, if it has one.
pub fn entry_block(ctx: &IrContext, region: RegionRef) -> Option<BlockRef> {
    ctx.region(region).blocks.first().copied()
}

pub(crate) fn attr<'a>(ctx: &'a IrContext, op: crate::OpRef, key: &'static str) -> &'a Attribute {
    ctx.op(op)
        .attributes
        .get(&Symbol::new(key))
        .unwrap_or_else(|| panic!("{} is missing attribute `{key}`", ctx.op_full_name(op)))
}
