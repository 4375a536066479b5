//! Compound IR mutations built on the `IrContext` primitives.

use smallvec::SmallVec;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, ValueRef};

/// Move every operation of `src` to the end of `dest`, substituting `src`'s
/// arguments positionally with `replacements`.
///
/// Afterwards `src` holds no operations and is unlinked from its region. Its
/// arguments have no remaining uses.
///
/// # Panics
///
/// Panics if `replacements` and `src`'s arguments differ in length, or if
/// `src` and `dest` are the same block.
pub fn merge_block(ctx: &mut IrContext, src: BlockRef, dest: BlockRef, replacements: &[ValueRef]) {
    assert_ne!(src, dest, "merge_block: cannot merge {src} into itself");
    let args: SmallVec<[ValueRef; 8]> = ctx.block_args(src).into();
    assert_eq!(
        args.len(),
        replacements.len(),
        "merge_block: {src} has {} argument(s) but {} replacement(s) were given",
        args.len(),
        replacements.len()
    );

    for (&arg, &replacement) in args.iter().zip(replacements) {
        ctx.replace_all_uses(arg, replacement);
    }

    ctx.move_ops(src, dest);
    ctx.detach_block(src);
}

/// Erase an operation: detach it from its parent block and remove it.
///
/// All result values must have no remaining uses, otherwise this panics.
pub fn erase_op(ctx: &mut IrContext, op: OpRef) {
    ctx.detach_op(op);
    ctx.remove_op(op);
}
