//! Typed operation wrappers.
//!
//! A dialect op is a `Copy` newtype over `OpRef` that has been checked to
//! carry the expected `dialect.name` and operand/region shape. Wrappers are
//! declared with [`define_op!`](crate::define_op) and get their accessors and
//! constructors written by hand next to the declaration.

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when viewing an operation as a dialect-specific wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ConversionError {
    /// Operation name doesn't match expected dialect.operation.
    #[display("expected `{expected}`, found `{actual}`")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    /// Fewer operands than the operation requires.
    #[display("expected at least {expected} operand(s), found {actual}")]
    WrongOperandCount { expected: usize, actual: usize },
    /// Wrong number of regions.
    #[display("expected {expected} region(s), found {actual}")]
    WrongRegionCount { expected: usize, actual: usize },
    /// Missing required attribute.
    #[display("missing attribute `{_0}`")]
    MissingAttribute(#[error(not(source))] &'static str),
    /// Attribute has wrong type.
    #[display("attribute `{_0}` has the wrong kind")]
    WrongAttributeType(#[error(not(source))] &'static str),
}

/// Trait for dialect operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;

    /// Try to view `op` as this wrapper.
    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError>;

    /// The wrapped operation.
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        ctx.op_is(
            op,
            Symbol::new(Self::DIALECT_NAME),
            Symbol::new(Self::OP_NAME),
        )
    }
}

/// Declare a dialect operation wrapper.
///
/// ```ignore
/// define_op! {
///     /// `scf.for`
///     For = "scf"."for", operands >= 3, regions = 1
/// }
/// ```
///
/// Generates `pub struct For(OpRef)` and a `DialectOp` impl whose `from_op`
/// checks the name, the minimum operand count and the exact region count.
#[macro_export]
macro_rules! define_op {
    (
        $(#[$meta:meta])*
        $name:ident = $dialect:literal . $op:literal,
        operands >= $min_operands:expr,
        regions = $regions:expr
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name($crate::OpRef);

        impl $crate::DialectOp for $name {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $op;

            fn from_op(
                ctx: &$crate::IrContext,
                op: $crate::OpRef,
            ) -> ::std::result::Result<Self, $crate::ConversionError> {
                if !<Self as $crate::DialectOp>::matches(ctx, op) {
                    return Err($crate::ConversionError::WrongOperation {
                        expected: concat!($dialect, ".", $op),
                        actual: ctx.op_full_name(op),
                    });
                }
                let operands = ctx.op_operands(op).len();
                if operands < $min_operands {
                    return Err($crate::ConversionError::WrongOperandCount {
                        expected: $min_operands,
                        actual: operands,
                    });
                }
                let regions = ctx.op(op).regions.len();
                if regions != $regions {
                    return Err($crate::ConversionError::WrongRegionCount {
                        expected: $regions,
                        actual: regions,
                    });
                }
                Ok(Self(op))
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
}
