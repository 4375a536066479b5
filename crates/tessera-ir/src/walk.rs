//! Recursive traversal over the ops nested in a region.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{OpRef, RegionRef};

/// What a visitor wants after seeing an op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Go on, including into the op's regions.
    Advance,
    /// Go on, but not into the op's regions.
    Skip,
}

type Visitor<'f, B> = dyn FnMut(OpRef) -> ControlFlow<B, WalkAction> + 'f;

/// Visit every op nested in `region`, each op before its regions.
///
/// Stops at the first `Break` and returns it.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut Visitor<'_, B>,
) -> ControlFlow<B, ()> {
    for &block in &ctx.region(region).blocks {
        for &op in &ctx.block(block).ops {
            if let WalkAction::Advance = f(op)? {
                for &inner in &ctx.op(op).regions {
                    walk_region(ctx, inner, f)?;
                }
            }
        }
    }
    ControlFlow::Continue(())
}

/// [`walk_region`] restricted to ops that are a `T`.
pub fn walk_typed<T: DialectOp, B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    walk_region(ctx, region, &mut |op| match T::from_op(ctx, op) {
        Ok(typed) => f(typed),
        Err(_) => ControlFlow::Continue(WalkAction::Advance),
    })
}

/// Every op nested in `region`, each op after its regions.
pub fn post_order(ctx: &IrContext, region: RegionRef) -> Vec<OpRef> {
    let mut out = Vec::new();
    // (op, regions already expanded)
    let mut stack: Vec<(OpRef, bool)> = Vec::new();
    let push_region = |stack: &mut Vec<(OpRef, bool)>, region: RegionRef| {
        for &block in ctx.region(region).blocks.iter().rev() {
            stack.extend(ctx.block(block).ops.iter().rev().map(|&op| (op, false)));
        }
    };
    push_region(&mut stack, region);
    while let Some((op, expanded)) = stack.pop() {
        if expanded {
            out.push(op);
            continue;
        }
        stack.push((op, true));
        for &inner in ctx.op(op).regions.iter().rev() {
            push_region(&mut stack, inner);
        }
    }
    out
}
