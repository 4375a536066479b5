//! Common builders for pipeline tests.

use tessera::ir::dialect::tensor::{self, Dim, TensorType};
use tessera::ir::dialect::{arith, core, func, tile};
use tessera::ir::{DialectOp, IrContext, Location, Module, Span, Symbol, TypeRef, ValueRef};
use tessera_eval::{Tensor, Value};

/// What the tile body does to each sub-view.
#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum Body {
    /// Overwrite every element with the chunk offset.
    FillOffset,
    /// Overwrite every element with the chunk size.
    FillSize,
    /// Add the chunk size to every element.
    AddSize,
}

pub struct Tiled {
    pub module: Module,
    pub func: func::Func,
}

pub fn test_ctx() -> (IrContext, Location) {
    tessera::init_logging();
    let mut ctx = IrContext::new();
    let path = ctx.paths.intern("pipeline.tsr".to_owned());
    let loc = Location::new(path, Span::new(0, 0));
    (ctx, loc)
}

pub fn tensor_ty(ctx: &mut IrContext, shape: &[Dim]) -> TypeRef {
    let f64_ty = core::f64(ctx);
    TensorType::new(f64_ty, shape.iter().copied()).intern(ctx)
}

/// Emit `body` for one sub-view into `block`, returning the value to yield.
pub fn emit_body(
    ctx: &mut IrContext,
    loc: Location,
    block: tessera::ir::BlockRef,
    body: Body,
    sub: ValueRef,
) -> ValueRef {
    let offset = ctx.block_arg(block, 0);
    let size = ctx.block_arg(block, 1);
    let sub_ty = ctx.value_ty(sub);
    match body {
        Body::FillOffset => {
            let fill = tensor::fill(ctx, loc, sub, offset, sub_ty);
            ctx.push_op(block, fill.op_ref());
            fill.result(ctx)
        }
        Body::FillSize => {
            let fill = tensor::fill(ctx, loc, sub, size, sub_ty);
            ctx.push_op(block, fill.op_ref());
            fill.result(ctx)
        }
        Body::AddSize => {
            let fill = tensor::fill(ctx, loc, sub, size, sub_ty);
            ctx.push_op(block, fill.op_ref());
            let sizes = fill.result(ctx);
            let add = tensor::add(ctx, loc, sub, sizes, sub_ty);
            ctx.push_op(block, add.op_ref());
            add.result(ctx)
        }
    }
}

/// `func @main(outs..) { tile.tile step, outs.. { body per output }; return }`
pub fn tiled(ctx: &mut IrContext, loc: Location, shapes: &[&[Dim]], step: i64, body: Body) -> Tiled {
    let types: Vec<TypeRef> = shapes.iter().map(|s| tensor_ty(ctx, s)).collect();
    let module = core::module(ctx, loc, Symbol::new("pipeline"));
    let f = func::func(ctx, loc, Symbol::new("main"), &types);
    let top = module.first_block(ctx).expect("module has a body block");
    ctx.push_op(top, f.op_ref());
    let entry = f.entry_block(ctx);
    let outs = f.params(ctx).to_vec();

    let step_op = arith::const_index(ctx, loc, step);
    ctx.push_op(entry, step_op.op_ref());
    let step = step_op.result(ctx);

    let results = emit_tile(ctx, loc, entry, step, &outs, body);
    let ret = func::r#return(ctx, loc, results);
    ctx.push_op(entry, ret.op_ref());
    Tiled { module, func: f }
}

/// Append a `tile.tile` over `outs` to `block`, returning its results.
pub fn emit_tile(
    ctx: &mut IrContext,
    loc: Location,
    block: tessera::ir::BlockRef,
    step: ValueRef,
    outs: &[ValueRef],
    body: Body,
) -> Vec<ValueRef> {
    let (region, inner) = tile::body_region(ctx, loc, outs);
    let mut yielded = Vec::with_capacity(outs.len());
    for i in 0..outs.len() {
        let sub = ctx.block_arg(inner, 2 + i as u32);
        yielded.push(emit_body(ctx, loc, inner, body, sub));
    }
    let y = tile::r#yield(ctx, loc, yielded);
    ctx.push_op(inner, y.op_ref());

    let t = tile::tile(ctx, loc, step, outs, region);
    ctx.push_op(block, t.op_ref());
    t.results(ctx).to_vec()
}

/// Row-major tensor whose element `i` is `i`.
pub fn iota(shape: &[usize]) -> Value {
    let mut n = -1.0;
    Tensor::from_fn(shape.to_vec(), |_| {
        n += 1.0;
        n
    })
    .into()
}

pub fn vector(data: &[f64]) -> Value {
    Tensor::new(vec![data.len()], data.to_vec())
        .expect("data matches shape")
        .into()
}
