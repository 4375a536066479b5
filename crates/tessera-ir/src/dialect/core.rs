//! Builtin types and the `core.module` container.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::refs::TypeRef;
use crate::rewrite::Module;
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeData};

pub const DIALECT_NAME: &str = "core";

/// `core.index`: the machine-sized integer used for loop bounds and extents.
pub fn index(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeData::new(Symbol::new(DIALECT_NAME), Symbol::new("index")))
}

/// `core.f64`: the tensor element type the evaluator understands.
pub fn f64(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeData::new(Symbol::new(DIALECT_NAME), Symbol::new("f64")))
}

pub fn is_index(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .get(ty)
        .is(Symbol::new(DIALECT_NAME), Symbol::new("index"))
}

pub fn is_f64(ctx: &IrContext, ty: TypeRef) -> bool {
    ctx.types
        .get(ty)
        .is(Symbol::new(DIALECT_NAME), Symbol::new("f64"))
}

/// Create a detached `core.module` with an empty single-block body.
pub fn module(ctx: &mut IrContext, location: Location, sym_name: Symbol) -> Module {
    let (body, _) = super::single_block_region(ctx, location, &[]);
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(DIALECT_NAME),
        Symbol::new("module"),
    )
    .attr("sym_name", Attribute::Symbol(sym_name))
    .region(body)
    .build(ctx);
    Module(ctx.create_op(data))
}
