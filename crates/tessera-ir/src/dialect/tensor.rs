//! Ranked tensors and the slice operations the tiling lowering emits.
//!
//! The tensor type is `tensor.tensor(elem) {shape = [..]}` where each shape
//! entry is an `IntBits` extent or `Unit` for a dynamic extent.

use std::fmt;

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeData};

pub const DIALECT_NAME: &str = "tensor";

// ============================================================================
// Types
// ============================================================================

/// One extent of a tensor shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Static(u64),
    Dynamic,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(n) => write!(f, "{n}"),
            Dim::Dynamic => f.write_str("?"),
        }
    }
}

/// Structured view of a `tensor.tensor` type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub elem: TypeRef,
    pub shape: SmallVec<[Dim; 4]>,
}

impl TensorType {
    pub fn new(elem: TypeRef, shape: impl IntoIterator<Item = Dim>) -> Self {
        Self {
            elem,
            shape: shape.into_iter().collect(),
        }
    }

    /// Read a tensor type back from the interner. `None` if `ty` is not a tensor.
    pub fn from_type(ctx: &IrContext, ty: TypeRef) -> Option<Self> {
        let data = ctx.types.get(ty);
        if !data.is(Symbol::new(DIALECT_NAME), Symbol::new("tensor")) {
            return None;
        }
        let elem = *data.params.first()?;
        let shape = data
            .attrs
            .get(&Symbol::new("shape"))?
            .as_list()?
            .iter()
            .map(|a| match a {
                Attribute::IntBits(n) => Some(Dim::Static(*n)),
                Attribute::Unit => Some(Dim::Dynamic),
                _ => None,
            })
            .collect::<Option<SmallVec<_>>>()?;
        Some(Self { elem, shape })
    }

    pub fn intern(&self, ctx: &mut IrContext) -> TypeRef {
        let shape = self
            .shape
            .iter()
            .map(|d| match d {
                Dim::Static(n) => Attribute::IntBits(*n),
                Dim::Dynamic => Attribute::Unit,
            })
            .collect();
        ctx.types.intern(
            TypeData::new(Symbol::new(DIALECT_NAME), Symbol::new("tensor"))
                .with_param(self.elem)
                .with_attr("shape", Attribute::List(shape)),
        )
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// The type of a chunk taken along dimension 0: same element type and
    /// trailing extents, leading extent dynamic.
    pub fn slice_of(&self) -> Self {
        let mut shape = self.shape.clone();
        if let Some(lead) = shape.first_mut() {
            *lead = Dim::Dynamic;
        }
        Self {
            elem: self.elem,
            shape,
        }
    }
}

/// Tensor type of `v`, if it has one.
pub fn tensor_type_of(ctx: &IrContext, v: ValueRef) -> Option<TensorType> {
    TensorType::from_type(ctx, ctx.value_ty(v))
}

// ============================================================================
// Slice descriptor
// ============================================================================

/// Per-dimension offsets, sizes and strides of a slice, one SSA value each.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct SliceDescriptor {
    pub offsets: SmallVec<[ValueRef; 4]>,
    pub sizes: SmallVec<[ValueRef; 4]>,
    pub strides: SmallVec<[ValueRef; 4]>,
}

impl SliceDescriptor {
    pub fn rank(&self) -> usize {
        self.offsets.len()
    }

    /// Operands in storage order: offsets, then sizes, then strides.
    pub fn operands(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.offsets
            .iter()
            .chain(&self.sizes)
            .chain(&self.strides)
            .copied()
    }

    fn from_operands(values: &[ValueRef]) -> Self {
        assert!(
            values.len() % 3 == 0,
            "slice descriptor needs offsets, sizes and strides of equal length, got {} values",
            values.len()
        );
        let rank = values.len() / 3;
        Self {
            offsets: values[..rank].into(),
            sizes: values[rank..2 * rank].into(),
            strides: values[2 * rank..].into(),
        }
    }

    fn assert_well_formed(&self) {
        assert!(
            self.sizes.len() == self.offsets.len() && self.strides.len() == self.offsets.len(),
            "slice descriptor lists disagree in length: {} offsets, {} sizes, {} strides",
            self.offsets.len(),
            self.sizes.len(),
            self.strides.len()
        );
    }
}

// ============================================================================
// Operations
// ============================================================================

crate::define_op! {
    /// `tensor.dim`: runtime extent of dimension `index` of `source`.
    DimOp = "tensor"."dim", operands >= 1, regions = 0
}

crate::define_op! {
    /// `tensor.extract_slice`: operands `source, offsets.., sizes.., strides..`.
    ExtractSlice = "tensor"."extract_slice", operands >= 1, regions = 0
}

crate::define_op! {
    /// `tensor.insert_slice`: operands `source, dest, offsets.., sizes.., strides..`.
    InsertSlice = "tensor"."insert_slice", operands >= 2, regions = 0
}

crate::define_op! {
    /// `tensor.fill`: a copy of `dest` with every element set to `value`.
    Fill = "tensor"."fill", operands >= 2, regions = 0
}

crate::define_op! {
    /// `tensor.add`: elementwise sum of two tensors of equal shape.
    Add = "tensor"."add", operands >= 2, regions = 0
}

impl DimOp {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn index(self, ctx: &IrContext) -> u64 {
        match super::attr(ctx, self.0, "index") {
            Attribute::IntBits(n) => *n,
            other => panic!("tensor.dim index must be an integer, got {other:?}"),
        }
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl ExtractSlice {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    /// The descriptor as stored on the op.
    pub fn descriptor(self, ctx: &IrContext) -> SliceDescriptor {
        SliceDescriptor::from_operands(&ctx.op_operands(self.0)[1..])
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl InsertSlice {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn dest(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn descriptor(self, ctx: &IrContext) -> SliceDescriptor {
        SliceDescriptor::from_operands(&ctx.op_operands(self.0)[2..])
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl Fill {
    pub fn dest(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn value(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn result(self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl Add {
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

fn builder(location: Location, op: &'static str) -> OperationDataBuilder {
    OperationDataBuilder::new(location, Symbol::new(DIALECT_NAME), Symbol::new(op))
}

pub fn dim(ctx: &mut IrContext, location: Location, source: ValueRef, index: u64) -> DimOp {
    let index_ty = super::core::index(ctx);
    let data = builder(location, DimOp::OP_NAME)
        .operand(source)
        .attr("index", Attribute::IntBits(index))
        .result(index_ty)
        .build(ctx);
    DimOp(ctx.create_op(data))
}

pub fn extract_slice(
    ctx: &mut IrContext,
    location: Location,
    source: ValueRef,
    descriptor: &SliceDescriptor,
    result_ty: TypeRef,
) -> ExtractSlice {
    descriptor.assert_well_formed();
    let data = builder(location, ExtractSlice::OP_NAME)
        .operand(source)
        .operands(descriptor.operands())
        .result(result_ty)
        .build(ctx);
    ExtractSlice(ctx.create_op(data))
}

pub fn insert_slice(
    ctx: &mut IrContext,
    location: Location,
    source: ValueRef,
    dest: ValueRef,
    descriptor: &SliceDescriptor,
    result_ty: TypeRef,
) -> InsertSlice {
    descriptor.assert_well_formed();
    let data = builder(location, InsertSlice::OP_NAME)
        .operand(source)
        .operand(dest)
        .operands(descriptor.operands())
        .result(result_ty)
        .build(ctx);
    InsertSlice(ctx.create_op(data))
}

pub fn fill(
    ctx: &mut IrContext,
    location: Location,
    dest: ValueRef,
    value: ValueRef,
    result_ty: TypeRef,
) -> Fill {
    let data = builder(location, Fill::OP_NAME)
        .operand(dest)
        .operand(value)
        .result(result_ty)
        .build(ctx);
    Fill(ctx.create_op(data))
}

pub fn add(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    result_ty: TypeRef,
) -> Add {
    let data = builder(location, Add::OP_NAME)
        .operand(lhs)
        .operand(rhs)
        .result(result_ty)
        .build(ctx);
    Add(ctx.create_op(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_of_makes_leading_extent_dynamic() {
        let mut ctx = IrContext::new();
        let f64_ty = super::super::core::f64(&mut ctx);
        let ty = TensorType::new(f64_ty, [Dim::Static(10), Dim::Static(4)]);
        let slice = ty.slice_of();
        assert_eq!(slice.shape.as_slice(), &[Dim::Dynamic, Dim::Static(4)]);
        assert_eq!(slice.rank(), 2);
        assert_eq!(slice.slice_of(), slice);
    }

    #[test]
    fn tensor_type_round_trips_through_interner() {
        let mut ctx = IrContext::new();
        let f64_ty = super::super::core::f64(&mut ctx);
        let ty = TensorType::new(f64_ty, [Dim::Dynamic, Dim::Static(3)]);
        let r = ty.intern(&mut ctx);
        assert_eq!(TensorType::from_type(&ctx, r), Some(ty));
        assert_eq!(TensorType::from_type(&ctx, f64_ty), None);
    }

    #[test]
    fn dim_display() {
        assert_eq!(Dim::Static(7).to_string(), "7");
        assert_eq!(Dim::Dynamic.to_string(), "?");
    }
}
