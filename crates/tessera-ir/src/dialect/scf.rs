//! Structured control flow.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;

crate::define_op! {
    /// `scf.for`: operands `lower, upper, step, init..`; body arguments
    /// `(iv, iter_arg..)`; one result per carried value.
    For = "scf"."for", operands >= 3, regions = 1
}

crate::define_op! {
    /// `scf.yield`: next-iteration values of the enclosing `scf.for`.
    Yield = "scf"."yield", operands >= 0, regions = 0
}

impl For {
    pub fn lower(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn upper(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn step(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[2]
    }

    pub fn inits(self, ctx: &IrContext) -> Vec<ValueRef> {
        ctx.op_operands(self.0)[3..].to_vec()
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn body_block(self, ctx: &IrContext) -> BlockRef {
        super::entry_block(ctx, self.body(ctx)).unwrap_or_else(|| panic!("scf.for has an empty body"))
    }

    pub fn induction_var(self, ctx: &IrContext) -> ValueRef {
        ctx.block_arg(self.body_block(ctx), 0)
    }

    pub fn iter_args(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.block_args(self.body_block(ctx))[1..]
    }

    pub fn results(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_results(self.0)
    }
}

impl Yield {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

/// Create a detached loop carrying `inits`.
///
/// The body block is created with arguments `(index, init types..)` and no
/// operations; the caller fills it and appends an `scf.yield`.
pub fn r#for(
    ctx: &mut IrContext,
    location: Location,
    lower: ValueRef,
    upper: ValueRef,
    step: ValueRef,
    inits: &[ValueRef],
) -> For {
    let carried: Vec<TypeRef> = inits.iter().map(|&v| ctx.value_ty(v)).collect();
    let index_ty = super::core::index(ctx);
    let arg_types: Vec<TypeRef> = std::iter::once(index_ty).chain(carried.iter().copied()).collect();
    let (body, _) = super::single_block_region(ctx, location, &arg_types);

    let data = OperationDataBuilder::new(
        location,
        Symbol::new(For::DIALECT_NAME),
        Symbol::new(For::OP_NAME),
    )
    .operand(lower)
    .operand(upper)
    .operand(step)
    .operands(inits.iter().copied())
    .results(carried)
    .region(body)
    .build(ctx);
    For(ctx.create_op(data))
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
