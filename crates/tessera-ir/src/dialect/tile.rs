//! The tiled-iteration construct.
//!
//! `tile.tile %step, %out.. { ^bb(%offset, %size, %sub..): ..; tile.yield .. }`
//! processes each output in chunks of `step` rows along dimension 0. The body
//! sees the chunk's offset, its clamped size, and one sub-view per output, and
//! yields the updated sub-views.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;

use super::tensor::TensorType;

crate::define_op! {
    /// `tile.tile`: operands `step, out..`; one result per output.
    Tile = "tile"."tile", operands >= 1, regions = 1
}

crate::define_op! {
    /// `tile.yield`: the per-chunk values of the enclosing `tile.tile`.
    Yield = "tile"."yield", operands >= 0, regions = 0
}

impl Tile {
    pub fn step(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn outs(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.op_operands(self.0)[1..]
    }

    pub fn results(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_results(self.0)
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }
}

impl Yield {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

/// Create a body region for a tile over `outs`, with placeholders
/// `(offset: index, size: index, sub-view..)`.
///
/// # Panics
///
/// Panics if an output is not a tensor.
pub fn body_region(
    ctx: &mut IrContext,
    location: Location,
    outs: &[ValueRef],
) -> (RegionRef, BlockRef) {
    let index_ty = super::core::index(ctx);
    let mut arg_types = vec![index_ty, index_ty];
    for &out in outs {
        let ty = super::tensor::tensor_type_of(ctx, out)
            .unwrap_or_else(|| panic!("tile output {out} is not a tensor"));
        arg_types.push(ty.slice_of().intern(ctx));
    }
    super::single_block_region(ctx, location, &arg_types)
}

/// Create a detached `tile.tile`. Results take the output operands' types.
pub fn tile(
    ctx: &mut IrContext,
    location: Location,
    step: ValueRef,
    outs: &[ValueRef],
    body: RegionRef,
) -> Tile {
    let result_types: Vec<TypeRef> = outs.iter().map(|&v| ctx.value_ty(v)).collect();
    tile_with_results(ctx, location, step, outs, &result_types, body)
}

/// Create a detached `tile.tile` with explicit result types.
pub fn tile_with_results(
    ctx: &mut IrContext,
    location: Location,
    step: ValueRef,
    outs: &[ValueRef],
    result_types: &[TypeRef],
    body: RegionRef,
) -> Tile {
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(Tile::DIALECT_NAME),
        Symbol::new(Tile::OP_NAME),
    )
    .operand(step)
    .operands(outs.iter().copied())
    .results(result_types.iter().copied())
    .region(body)
    .build(ctx);
    Tile(ctx.create_op(data))
}

pub fn r#yield(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Yield {
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(Yield::DIALECT_NAME),
        Symbol::new(Yield::OP_NAME),
    )
    .operands(values)
    .build(ctx);
    Yield(ctx.create_op(data))
}

/// Whether `ty` is the sub-view type of a tile over an output of type `out`.
pub fn is_subview_of(ctx: &IrContext, ty: TypeRef, out: &TensorType) -> bool {
    TensorType::from_type(ctx, ty).is_some_and(|t| t == out.slice_of())
}
