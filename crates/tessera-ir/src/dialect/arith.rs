//! Scalar arithmetic on `core.index` (and other scalar) values.

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::define_op! {
    /// `arith.const`: a scalar taken from the `value` attribute.
    Const = "arith"."const", operands >= 0, regions = 0
}

impl Const {
    pub fn value(self, ctx: &IrContext) -> Attribute {
        super::attr(ctx, self.0, "value").clone()
    }

    /// The constant as a signed index, if it is an integer.
    pub fn index_value(self, ctx: &IrContext) -> Option<i64> {
        self.value(ctx).as_int().map(|bits| bits as i64)
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

pub fn r#const(ctx: &mut IrContext, location: Location, ty: TypeRef, value: Attribute) -> Const {
    let data = OperationDataBuilder::new(
        location,
        Symbol::new(Const::DIALECT_NAME),
        Symbol::new(Const::OP_NAME),
    )
    .attr("value", value)
    .result(ty)
    .build(ctx);
    Const(ctx.create_op(data))
}

/// `arith.const` of type `core.index`.
pub fn const_index(ctx: &mut IrContext, location: Location, value: i64) -> Const {
    let ty = super::core::index(ctx);
    r#const(ctx, location, ty, Attribute::from(value))
}

macro_rules! binary_op {
    ($(#[$meta:meta])* $name:ident, $ctor:ident, $op:literal) => {
        crate::define_op! {
            $(#[$meta])*
            $name = "arith".$op, operands >= 2, regions = 0
        }

        impl $name {
            pub fn lhs(self, ctx: &IrContext) -> ValueRef {
                ctx.op_operands(self.0)[0]
            }

            pub fn rhs(self, ctx: &IrContext) -> ValueRef {
                ctx.op_operands(self.0)[1]
            }

            pub fn result(self, ctx: &IrContext) -> ValueRef {
                ctx.op_result(self.0, 0)
            }
        }

        pub fn $ctor(
            ctx: &mut IrContext,
            location: Location,
            lhs: ValueRef,
            rhs: ValueRef,
            ty: TypeRef,
        ) -> $name {
            let data = OperationDataBuilder::new(
                location,
                Symbol::new($name::DIALECT_NAME),
                Symbol::new($name::OP_NAME),
            )
            .operand(lhs)
            .operand(rhs)
            .result(ty)
            .build(ctx);
            $name(ctx.create_op(data))
        }
    };
}

binary_op!(Add, add, "add");
binary_op!(Sub, sub, "sub");
binary_op!(Mul, mul, "mul");
binary_op!(
    /// Signed minimum.
    Min,
    min,
    "min"
);
