//! Functions.
//!
//! `func.func` carries its parameters as the entry block's arguments; results
//! are whatever its `func.return` hands back.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::define_op! {
    /// `func.func`
    Func = "func"."func", operands >= 0, regions = 1
}

crate::define_op! {
    /// `func.return`
    Return = "func"."return", operands >= 0, regions = 0
}

impl Func {
    pub fn sym_name(self, ctx: &IrContext) -> Symbol {
        match super::attr(ctx, self.0, "sym_name") {
            Attribute::Symbol(s) => *s,
            other => panic!("func.func sym_name must be a symbol, got {other:?}"),
        }
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(self, ctx: &IrContext) -> BlockRef {
        super::entry_block(ctx, self.body(ctx))
            .unwrap_or_else(|| panic!("func.func {} has an empty body", self.sym_name(ctx)))
    }

    pub fn params(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.block_args(self.entry_block(ctx))
    }
}

impl Return {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

/// Create a detached function whose entry block takes `params`.
pub fn func(ctx: &mut IrContext, location: Location, sym_name: Symbol, params: &[TypeRef]) -> Func {
    let (body, _) = super::single_block_region(ctx, location, params);
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(Func::DIALECT_NAME),
        Symbol::new(Func::OP_NAME),
    )
    .attr("sym_name", Attribute::Symbol(sym_name))
    .region(body)
    .build(ctx);
    Func(ctx.create_op(data))
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(Return::DIALECT_NAME),
        Symbol::new(Return::OP_NAME),
    )
    .operands(values)
    .build(ctx);
    Return(ctx.create_op(data))
}
