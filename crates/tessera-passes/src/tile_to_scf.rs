//! Lower `tile.tile` to a sequential `scf.for` over explicit slices.
//!
//! ```text
//! %r = tile.tile %step, %out : T {
//!   ^bb0(%offset: core.index, %size: core.index, %sub: S):
//!     %y = ...
//!     tile.yield %y
//! }
//! ```
//! becomes:
//! ```text
//! %c0 = arith.const {value = 0} : core.index
//! %c1 = arith.const {value = 1} : core.index
//! %total = tensor.dim %out {index = 0} : core.index
//! %r = scf.for %c0, %total, %step, %out : T {
//!   ^bb0(%iv: core.index, %acc: T):
//!     %rest = arith.sub %total, %iv : core.index
//!     %size = arith.min %rest, %step : core.index
//!     %sub = tensor.extract_slice %acc, %iv, %size, %c1 : S
//!     %y = ...
//!     %next = tensor.insert_slice %y, %acc, %iv, %size, %c1 : T
//!     scf.yield %next
//! }
//! ```
//!
//! The induction variable is the chunk offset. Only the leading dimension is
//! tiled. Trailing dimensions are taken whole: offset `%c0`, size
//! `tensor.dim %acc {index = k}`, stride `%c1`. The loop bound is the leading
//! extent of the first output; all outputs are assumed to share it.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::{debug, trace};

use tessera_ir::dialect::tensor::{self, Dim, SliceDescriptor, TensorType};
use tessera_ir::dialect::{arith, core, scf, tile};
use tessera_ir::printer::print_type;
use tessera_ir::rewrite::applicator::DEFAULT_MAX_REWRITES;
use tessera_ir::rewrite::{
    ApplyResult, PatternApplicator, PatternRewriter, RewritePattern, erase_op, merge_block,
};
use tessera_ir::{BlockRef, DialectOp, IrContext, Location, Module, OpRef, TypeRef, ValueRef};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the tile lowering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoweringConfig {
    /// Reject constructs whose outputs have different static leading extents.
    /// Default: true.
    pub check_static_extents: bool,
    /// Maximum number of rewrites per run. Default: 10 000.
    pub max_rewrites: usize,
}

impl Default for TileLoweringConfig {
    fn default() -> Self {
        Self {
            check_static_extents: true,
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}

impl TileLoweringConfig {
    pub fn with_check_static_extents(mut self, check: bool) -> Self {
        self.check_static_extents = check;
        self
    }

    pub fn with_max_rewrites(mut self, n: usize) -> Self {
        self.max_rewrites = n;
        self
    }
}

// ============================================================================
// Preconditions
// ============================================================================

/// A `tile.tile` that cannot be lowered.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum PreconditionViolation {
    #[display("tile.tile has no results")]
    NoResults,
    #[display("tile.tile has {results} result(s) but {outs} output operand(s)")]
    ResultCountMismatch { results: usize, outs: usize },
    #[display("tile.tile step must be of type core.index, got {found}")]
    NonIndexStep { found: String },
    #[display("output #{index} must be a tensor of rank >= 1, got {found}")]
    NotRankedTensor { index: usize, found: String },
    #[display("result #{index} has type {result} but its output operand has type {output}")]
    ResultTypeMismatch {
        index: usize,
        result: String,
        output: String,
    },
    #[display("output #{index} has leading extent {found} but output #{reference} has {expected}")]
    ExtentMismatch {
        index: usize,
        reference: usize,
        expected: u64,
        found: u64,
    },
    #[display("tile.tile body must have exactly one block, found {found}")]
    BodyBlockCount { found: usize },
    #[display("tile.tile body must take {expected} placeholder(s), found {found}")]
    PlaceholderCount { expected: usize, found: usize },
    #[display("placeholder #{index} has type {found}, expected {expected}")]
    PlaceholderType {
        index: usize,
        expected: String,
        found: String,
    },
    #[display("tile.tile body must end with tile.yield, found {found}")]
    MissingYield { found: String },
    #[display("tile.yield yields {found} value(s), expected {expected}")]
    YieldCount { expected: usize, found: usize },
    #[display("yielded value #{index} has type {found}, expected {expected}")]
    YieldType {
        index: usize,
        expected: String,
        found: String,
    },
}

/// What the lowering needs to know about a well-formed `tile.tile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileShape {
    pub outs: Vec<ValueRef>,
    pub out_types: Vec<TensorType>,
    /// The single body block.
    pub body: BlockRef,
    /// The body's trailing `tile.yield`.
    pub terminator: tile::Yield,
}

impl TileShape {
    pub fn ranks(&self) -> Vec<usize> {
        self.out_types.iter().map(TensorType::rank).collect()
    }
}

/// Check that `op` can be lowered, without touching the IR.
pub fn check_preconditions(
    ctx: &IrContext,
    op: tile::Tile,
    config: &TileLoweringConfig,
) -> Result<TileShape, PreconditionViolation> {
    let results = op.results(ctx);
    let outs = op.outs(ctx).to_vec();
    if results.is_empty() {
        return Err(PreconditionViolation::NoResults);
    }
    if results.len() != outs.len() {
        return Err(PreconditionViolation::ResultCountMismatch {
            results: results.len(),
            outs: outs.len(),
        });
    }

    let step_ty = ctx.value_ty(op.step(ctx));
    if !core::is_index(ctx, step_ty) {
        return Err(PreconditionViolation::NonIndexStep {
            found: print_type(ctx, step_ty),
        });
    }

    let mut out_types = Vec::with_capacity(outs.len());
    for (index, (&out, &result)) in outs.iter().zip(results).enumerate() {
        let out_ty = ctx.value_ty(out);
        let tensor = TensorType::from_type(ctx, out_ty)
            .filter(|t| t.rank() >= 1)
            .ok_or_else(|| PreconditionViolation::NotRankedTensor {
                index,
                found: print_type(ctx, out_ty),
            })?;
        let result_ty = ctx.value_ty(result);
        if result_ty != out_ty {
            return Err(PreconditionViolation::ResultTypeMismatch {
                index,
                result: print_type(ctx, result_ty),
                output: print_type(ctx, out_ty),
            });
        }
        out_types.push(tensor);
    }

    if config.check_static_extents {
        check_static_extents(&out_types)?;
    }

    let blocks = &ctx.region(op.body(ctx)).blocks;
    if blocks.len() != 1 {
        return Err(PreconditionViolation::BodyBlockCount {
            found: blocks.len(),
        });
    }
    let body = blocks[0];

    let args = ctx.block_args(body);
    if args.len() != 2 + outs.len() {
        return Err(PreconditionViolation::PlaceholderCount {
            expected: 2 + outs.len(),
            found: args.len(),
        });
    }
    for (index, &arg) in args.iter().enumerate() {
        let found = ctx.value_ty(arg);
        let ok = match index {
            0 | 1 => core::is_index(ctx, found),
            _ => tile::is_subview_of(ctx, found, &out_types[index - 2]),
        };
        if !ok {
            let expected = match index {
                0 | 1 => "core.index".to_string(),
                _ => describe_tensor(ctx, &out_types[index - 2].slice_of()),
            };
            return Err(PreconditionViolation::PlaceholderType {
                index,
                expected,
                found: print_type(ctx, found),
            });
        }
    }

    let terminator = ctx
        .block_terminator(body)
        .ok_or_else(|| PreconditionViolation::MissingYield {
            found: "an empty block".to_string(),
        })?;
    let terminator = tile::Yield::from_op(ctx, terminator).map_err(|_| {
        PreconditionViolation::MissingYield {
            found: ctx.op_full_name(terminator),
        }
    })?;
    let yielded = terminator.values(ctx);
    if yielded.len() != outs.len() {
        return Err(PreconditionViolation::YieldCount {
            expected: outs.len(),
            found: yielded.len(),
        });
    }
    for (index, &value) in yielded.iter().enumerate() {
        let found = ctx.value_ty(value);
        let expected = ctx.value_ty(args[2 + index]);
        if found != expected {
            return Err(PreconditionViolation::YieldType {
                index,
                expected: print_type(ctx, expected),
                found: print_type(ctx, found),
            });
        }
    }

    Ok(TileShape {
        outs,
        out_types,
        body,
        terminator,
    })
}

fn check_static_extents(out_types: &[TensorType]) -> Result<(), PreconditionViolation> {
    let mut reference: Option<(usize, u64)> = None;
    for (index, ty) in out_types.iter().enumerate() {
        let Some(Dim::Static(found)) = ty.shape.first().copied() else {
            continue;
        };
        match reference {
            None => reference = Some((index, found)),
            Some((reference, expected)) if expected != found => {
                return Err(PreconditionViolation::ExtentMismatch {
                    index,
                    reference,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn describe_tensor(ctx: &IrContext, ty: &TensorType) -> String {
    let dims: Vec<String> = ty.shape.iter().map(Dim::to_string).collect();
    format!(
        "tensor.tensor({}) {{shape = [{}]}}",
        print_type(ctx, ty.elem),
        dims.join(", ")
    )
}

// ============================================================================
// Pattern
// ============================================================================

/// Rewrites one `tile.tile` into an `scf.for`.
///
/// # Panics
///
/// `match_and_rewrite` panics on a `tile.tile` that fails
/// [`check_preconditions`]. The check runs before anything is created, so the
/// IR is never left half-rewritten.
pub struct TileToSequentialFor {
    config: TileLoweringConfig,
}

impl TileToSequentialFor {
    pub fn new(config: TileLoweringConfig) -> Self {
        Self { config }
    }
}

impl Default for TileToSequentialFor {
    fn default() -> Self {
        Self::new(TileLoweringConfig::default())
    }
}

/// Per-iteration chunk position, shared by every output.
struct Geometry {
    offset: ValueRef,
    size: ValueRef,
}

/// Index constants defined once, ahead of the loop.
#[derive(Clone, Copy)]
struct Unit {
    zero: ValueRef,
    one: ValueRef,
}

impl RewritePattern for TileToSequentialFor {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter,
    ) -> bool {
        let Ok(tile_op) = tile::Tile::from_op(ctx, op) else {
            return false;
        };
        let loc = ctx.op(op).location;
        let shape = match check_preconditions(ctx, tile_op, &self.config) {
            Ok(shape) => shape,
            Err(violation) => panic!(
                "cannot lower tile.tile at {}: {violation}",
                loc.display(&ctx.paths)
            ),
        };
        let step = tile_op.step(ctx);

        debug!(
            location = %loc.display(&ctx.paths),
            outputs = shape.outs.len(),
            ranks = ?shape.ranks(),
            "lowering tile.tile to scf.for"
        );

        // Bounds: [0, dim(outs[0], 0)) by step. The induction variable is the
        // chunk offset. The constants are hoisted out of the loop; the zero
        // lower bound doubles as the offset of every trailing dimension.
        let zero = arith::const_index(ctx, loc, 0);
        let one = arith::const_index(ctx, loc, 1);
        let total = tensor::dim(ctx, loc, shape.outs[0], 0);
        for prefix in [zero.op_ref(), one.op_ref(), total.op_ref()] {
            rewriter.insert_op(prefix);
        }
        let (zero, one, total) = (zero.result(ctx), one.result(ctx), total.result(ctx));

        let for_op = scf::r#for(ctx, loc, zero, total, step, &shape.outs);
        let body = for_op.body_block(ctx);
        let iv = for_op.induction_var(ctx);
        let carried = for_op.iter_args(ctx).to_vec();

        let geometry = emit_geometry(ctx, loc, body, iv, step, total);
        let unit = Unit { zero, one };
        let extracts = emit_slices(ctx, loc, body, &geometry, unit, &carried, &shape.out_types);

        let mut replacements = vec![geometry.offset, geometry.size];
        replacements.extend(extracts.iter().map(|e| e.result(ctx)));
        merge_block(ctx, shape.body, body, &replacements);
        trace!(placeholders = replacements.len(), "spliced tile body into loop");

        emit_write_back(ctx, loc, body, shape.terminator, &extracts, &carried);

        rewriter.replace_op(for_op.op_ref());
        true
    }

    fn name(&self) -> &'static str {
        "TileToSequentialFor"
    }
}

/// `offset = iv; size = min(total - offset, step)` at the top of `body`.
///
/// `iv` already advances by `step`, so it is the chunk offset as is.
fn emit_geometry(
    ctx: &mut IrContext,
    loc: Location,
    body: BlockRef,
    iv: ValueRef,
    step: ValueRef,
    total: ValueRef,
) -> Geometry {
    let index = core::index(ctx);
    let offset = iv;

    let remaining = arith::sub(ctx, loc, total, offset, index);
    ctx.push_op(body, remaining.op_ref());
    let remaining = remaining.result(ctx);

    let size = arith::min(ctx, loc, remaining, step, index);
    ctx.push_op(body, size.op_ref());
    let size = size.result(ctx);

    trace!(%offset, %size, "emitted chunk geometry");
    Geometry { offset, size }
}

/// One `tensor.extract_slice` per carried value, in carried order.
fn emit_slices(
    ctx: &mut IrContext,
    loc: Location,
    body: BlockRef,
    geometry: &Geometry,
    Unit { zero, one }: Unit,
    carried: &[ValueRef],
    out_types: &[TensorType],
) -> Vec<tensor::ExtractSlice> {
    let mut extracts = Vec::with_capacity(carried.len());
    for (&value, ty) in carried.iter().zip(out_types) {
        let rank = ty.rank();
        let mut descriptor = SliceDescriptor {
            offsets: smallvec![geometry.offset],
            sizes: smallvec![geometry.size],
            strides: smallvec![one],
        };
        for k in 1..rank {
            let extent = tensor::dim(ctx, loc, value, k as u64);
            ctx.push_op(body, extent.op_ref());
            descriptor.offsets.push(zero);
            descriptor.sizes.push(extent.result(ctx));
            descriptor.strides.push(one);
        }

        let slice_ty: TypeRef = ty.slice_of().intern(ctx);
        let extract = tensor::extract_slice(ctx, loc, value, &descriptor, slice_ty);
        ctx.push_op(body, extract.op_ref());
        trace!(rank, carried = %value, "emitted extract_slice");
        extracts.push(extract);
    }
    extracts
}

/// Replace the spliced `tile.yield` with one `tensor.insert_slice` per
/// output, each reusing its extraction's descriptor, and an `scf.yield`.
fn emit_write_back(
    ctx: &mut IrContext,
    loc: Location,
    body: BlockRef,
    terminator: tile::Yield,
    extracts: &[tensor::ExtractSlice],
    carried: &[ValueRef],
) {
    let yielded: SmallVec<[ValueRef; 4]> = terminator.values(ctx).into();
    let mut next = Vec::with_capacity(carried.len());
    for ((extract, &value), &dest) in extracts.iter().zip(&yielded).zip(carried) {
        let descriptor = extract.descriptor(ctx);
        let dest_ty = ctx.value_ty(dest);
        let insert = tensor::insert_slice(ctx, loc, value, dest, &descriptor, dest_ty);
        ctx.insert_op_before(body, terminator.op_ref(), insert.op_ref());
        next.push(insert.result(ctx));
    }
    erase_op(ctx, terminator.op_ref());

    let scf_yield = scf::r#yield(ctx, loc, next);
    ctx.push_op(body, scf_yield.op_ref());
}

// ============================================================================
// Pass entry
// ============================================================================

/// Lower every `tile.tile` in `module`.
pub fn lower(ctx: &mut IrContext, module: Module, config: &TileLoweringConfig) -> ApplyResult {
    PatternApplicator::new()
        .add_pattern(TileToSequentialFor::new(config.clone()))
        .with_max_rewrites(config.max_rewrites)
        .apply_partial(ctx, module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    use tessera_ir::dialect::func;
    use tessera_ir::printer::print_op;
    use tessera_ir::validation::validate_all;
    use tessera_ir::walk::{self, WalkAction};
    use tessera_ir::{Span, Symbol};

    fn test_ctx() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("tiles.tsr".to_owned());
        let loc = Location::new(path, Span::new(0, 0));
        (ctx, loc)
    }

    fn tensor_ty(ctx: &mut IrContext, shape: &[Dim]) -> TypeRef {
        let f64_ty = core::f64(ctx);
        TensorType::new(f64_ty, shape.iter().copied()).intern(ctx)
    }

    struct Fixture {
        module: Module,
        func: func::Func,
        tile: tile::Tile,
        step: ValueRef,
        ret: func::Return,
    }

    /// `func @main(outs..) { %step = const S; %r.. = tile.tile %step, outs.. { fill each sub-view with offset }; return %r.. }`
    fn fixture(ctx: &mut IrContext, loc: Location, shapes: &[&[Dim]], step: i64) -> Fixture {
        let types: Vec<TypeRef> = shapes.iter().map(|s| tensor_ty(ctx, s)).collect();
        let module = tessera_ir::dialect::core::module(ctx, loc, Symbol::new("tiles"));
        let f = func::func(ctx, loc, Symbol::new("main"), &types);
        ctx.push_op(module.first_block(ctx).unwrap(), f.op_ref());
        let entry = f.entry_block(ctx);
        let outs = f.params(ctx).to_vec();

        let step_op = arith::const_index(ctx, loc, step);
        ctx.push_op(entry, step_op.op_ref());
        let step = step_op.result(ctx);

        let (region, block) = tile::body_region(ctx, loc, &outs);
        let offset = ctx.block_arg(block, 0);
        let mut yielded = Vec::new();
        for i in 0..outs.len() {
            let sub = ctx.block_arg(block, 2 + i as u32);
            let sub_ty = ctx.value_ty(sub);
            let fill = tensor::fill(ctx, loc, sub, offset, sub_ty);
            ctx.push_op(block, fill.op_ref());
            yielded.push(fill.result(ctx));
        }
        let y = tile::r#yield(ctx, loc, yielded);
        ctx.push_op(block, y.op_ref());

        let t = tile::tile(ctx, loc, step, &outs, region);
        ctx.push_op(entry, t.op_ref());
        let results = t.results(ctx).to_vec();
        let ret = func::r#return(ctx, loc, results);
        ctx.push_op(entry, ret.op_ref());

        Fixture {
            module,
            func: f,
            tile: t,
            step,
            ret,
        }
    }

    fn collect<T: DialectOp>(ctx: &IrContext, module: Module) -> Vec<T> {
        let mut found = Vec::new();
        let _ = walk::walk_typed::<T, ()>(ctx, module.body(ctx), &mut |op| {
            found.push(op);
            ControlFlow::Continue(WalkAction::Advance)
        });
        found
    }

    #[test]
    fn lowers_single_output_to_loop() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)]], 3);
        let tile_result = fx.tile.results(&ctx)[0];

        let result = lower(&mut ctx, fx.module, &TileLoweringConfig::default());
        assert!(result.reached_fixpoint);
        assert_eq!(result.total_changes, 1);

        assert!(collect::<tile::Tile>(&ctx, fx.module).is_empty());
        assert!(collect::<tile::Yield>(&ctx, fx.module).is_empty());
        let loops = collect::<scf::For>(&ctx, fx.module);
        assert_eq!(loops.len(), 1);
        let for_op = loops[0];

        // Bounds and carried state.
        let lower_op = ctx.defining_op(for_op.lower(&ctx)).unwrap();
        assert_eq!(arith::Const::from_op(&ctx, lower_op).unwrap().index_value(&ctx), Some(0));
        let upper_op = ctx.defining_op(for_op.upper(&ctx)).unwrap();
        let dim = tensor::DimOp::from_op(&ctx, upper_op).unwrap();
        assert_eq!(dim.source(&ctx), fx.func.params(&ctx)[0]);
        assert_eq!(dim.index(&ctx), 0);
        assert_eq!(for_op.step(&ctx), fx.step);
        assert_eq!(for_op.inits(&ctx), fx.func.params(&ctx).to_vec());

        // Result identity: nothing refers to the tile any more.
        assert!(!ctx.has_uses(tile_result));
        assert_eq!(fx.ret.values(&ctx), for_op.results(&ctx));
        assert!(ctx.op(fx.tile.op_ref()).parent_block.is_none());

        let validation = validate_all(&ctx, fx.module);
        assert!(validation.is_ok(), "{validation}");
    }

    #[test]
    fn geometry_is_induction_var_clamped_by_remaining() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)]], 3);
        lower(&mut ctx, fx.module, &TileLoweringConfig::default());
        let for_op = collect::<scf::For>(&ctx, fx.module)[0];
        assert!(collect::<arith::Mul>(&ctx, fx.module).is_empty());

        // The loop already steps by S, so the offset is the induction variable.
        let extract = collect::<tensor::ExtractSlice>(&ctx, fx.module)[0];
        let desc = extract.descriptor(&ctx);
        assert_eq!(desc.offsets[0], for_op.induction_var(&ctx));
        assert_eq!(for_op.step(&ctx), fx.step);

        let size_op = ctx.defining_op(desc.sizes[0]).unwrap();
        let min = arith::Min::from_op(&ctx, size_op).unwrap();
        assert_eq!(min.rhs(&ctx), fx.step);
        let sub = arith::Sub::from_op(&ctx, ctx.defining_op(min.lhs(&ctx)).unwrap()).unwrap();
        assert_eq!(sub.lhs(&ctx), for_op.upper(&ctx));
        assert_eq!(sub.rhs(&ctx), desc.offsets[0]);
    }

    #[test]
    fn insertion_reuses_extraction_descriptor() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(
            &mut ctx,
            loc,
            &[&[Dim::Static(10)], &[Dim::Static(10), Dim::Static(4)]],
            4,
        );
        lower(&mut ctx, fx.module, &TileLoweringConfig::default());

        let extracts = collect::<tensor::ExtractSlice>(&ctx, fx.module);
        let inserts = collect::<tensor::InsertSlice>(&ctx, fx.module);
        assert_eq!(extracts.len(), 2);
        assert_eq!(inserts.len(), 2);
        for (extract, insert) in extracts.iter().zip(&inserts) {
            assert_eq!(insert.descriptor(&ctx), extract.descriptor(&ctx));
            assert_eq!(insert.dest(&ctx), extract.source(&ctx));
        }
    }

    #[test]
    fn multi_output_slices_keep_rank_and_share_geometry() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(
            &mut ctx,
            loc,
            &[&[Dim::Static(10)], &[Dim::Static(10), Dim::Static(4)]],
            4,
        );
        lower(&mut ctx, fx.module, &TileLoweringConfig::default());
        let for_op = collect::<scf::For>(&ctx, fx.module)[0];
        let carried = for_op.iter_args(&ctx).to_vec();

        let extracts = collect::<tensor::ExtractSlice>(&ctx, fx.module);
        let d0 = extracts[0].descriptor(&ctx);
        let d1 = extracts[1].descriptor(&ctx);
        assert_eq!(d0.rank(), 1);
        assert_eq!(d1.rank(), 2);
        assert_eq!(extracts[0].source(&ctx), carried[0]);
        assert_eq!(extracts[1].source(&ctx), carried[1]);

        // Dimension 0 is shared.
        assert_eq!(d0.offsets[0], d1.offsets[0]);
        assert_eq!(d0.sizes[0], d1.sizes[0]);

        // Dimension 1 is taken whole: offset 0, runtime extent, stride 1.
        let zero = ctx.defining_op(d1.offsets[1]).unwrap();
        assert_eq!(arith::Const::from_op(&ctx, zero).unwrap().index_value(&ctx), Some(0));
        let extent = tensor::DimOp::from_op(&ctx, ctx.defining_op(d1.sizes[1]).unwrap()).unwrap();
        assert_eq!(extent.source(&ctx), carried[1]);
        assert_eq!(extent.index(&ctx), 1);
        let one = ctx.defining_op(d1.strides[1]).unwrap();
        assert_eq!(arith::Const::from_op(&ctx, one).unwrap().index_value(&ctx), Some(1));

        // Both constants sit ahead of the loop, not in its body.
        let entry = fx.func.entry_block(&ctx);
        assert_eq!(ctx.op(zero).parent_block, Some(entry));
        assert_eq!(ctx.op(one).parent_block, Some(entry));
        assert_eq!(d1.offsets[1], for_op.lower(&ctx));
        assert_eq!(d1.strides[0], d1.strides[1]);
        assert_eq!(d0.strides[0], d1.strides[0]);

        let sub_ty = ctx.value_ty(extracts[1].result(&ctx));
        assert_eq!(
            TensorType::from_type(&ctx, sub_ty).unwrap().shape.as_slice(),
            &[Dim::Dynamic, Dim::Static(4)]
        );
        assert!(validate_all(&ctx, fx.module).is_ok());
    }

    #[test]
    fn lowered_ir_snapshot() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)]], 3);
        lower(&mut ctx, fx.module, &TileLoweringConfig::default());

        insta::assert_snapshot!(print_op(&ctx, fx.module.op()), @r"
        core.module @tiles {
          func.func @main(%0: tensor.tensor(core.f64) {shape = [10]}) {
            %1 = arith.const {value = 3} : core.index
            %2 = arith.const {value = 0} : core.index
            %3 = arith.const {value = 1} : core.index
            %4 = tensor.dim %0 {index = 0} : core.index
            %5 = scf.for %2, %4, %1, %0 : tensor.tensor(core.f64) {shape = [10]} {
              ^bb0(%6: core.index, %7: tensor.tensor(core.f64) {shape = [10]}):
                %8 = arith.sub %4, %6 : core.index
                %9 = arith.min %8, %1 : core.index
                %10 = tensor.extract_slice %7, %6, %9, %3 : tensor.tensor(core.f64) {shape = [?]}
                %11 = tensor.fill %10, %6 : tensor.tensor(core.f64) {shape = [?]}
                %12 = tensor.insert_slice %11, %7, %6, %9, %3 : tensor.tensor(core.f64) {shape = [10]}
                scf.yield %12
            }
            func.return %5
          }
        }
        ");
    }

    #[test]
    fn second_run_finds_nothing() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)]], 3);
        lower(&mut ctx, fx.module, &TileLoweringConfig::default());
        let before = print_op(&ctx, fx.module.op());

        let again = lower(&mut ctx, fx.module, &TileLoweringConfig::default());
        assert!(again.reached_fixpoint);
        assert_eq!(again.total_changes, 0);
        assert_eq!(print_op(&ctx, fx.module.op()), before);
    }

    #[test]
    fn nested_tiles_are_all_lowered() {
        let (mut ctx, loc) = test_ctx();
        let ty = tensor_ty(&mut ctx, &[Dim::Static(8), Dim::Static(2)]);
        let module = tessera_ir::dialect::core::module(&mut ctx, loc, Symbol::new("nested"));
        let f = func::func(&mut ctx, loc, Symbol::new("main"), &[ty]);
        ctx.push_op(module.first_block(&ctx).unwrap(), f.op_ref());
        let entry = f.entry_block(&ctx);
        let out = f.params(&ctx)[0];

        let four = arith::const_index(&mut ctx, loc, 4);
        let two = arith::const_index(&mut ctx, loc, 2);
        ctx.push_op(entry, four.op_ref());
        ctx.push_op(entry, two.op_ref());
        let (four, two) = (four.result(&ctx), two.result(&ctx));

        // Outer tile by 4, inner tile of each chunk by 2.
        let (outer_region, outer_block) = tile::body_region(&mut ctx, loc, &[out]);
        let chunk = ctx.block_arg(outer_block, 2);
        let (inner_region, inner_block) = tile::body_region(&mut ctx, loc, &[chunk]);
        let inner_sub = ctx.block_arg(inner_block, 2);
        let inner_offset = ctx.block_arg(inner_block, 0);
        let sub_ty = ctx.value_ty(inner_sub);
        let fill = tensor::fill(&mut ctx, loc, inner_sub, inner_offset, sub_ty);
        ctx.push_op(inner_block, fill.op_ref());
        let filled = fill.result(&ctx);
        let y = tile::r#yield(&mut ctx, loc, [filled]);
        ctx.push_op(inner_block, y.op_ref());
        let inner = tile::tile(&mut ctx, loc, two, &[chunk], inner_region);
        ctx.push_op(outer_block, inner.op_ref());
        let inner_result = inner.results(&ctx)[0];
        let y = tile::r#yield(&mut ctx, loc, [inner_result]);
        ctx.push_op(outer_block, y.op_ref());

        let outer = tile::tile(&mut ctx, loc, four, &[out], outer_region);
        ctx.push_op(entry, outer.op_ref());
        let outer_result = outer.results(&ctx)[0];
        let ret = func::r#return(&mut ctx, loc, [outer_result]);
        ctx.push_op(entry, ret.op_ref());

        let result = lower(&mut ctx, module, &TileLoweringConfig::default());
        assert!(result.reached_fixpoint);
        assert_eq!(result.total_changes, 2);
        assert!(collect::<tile::Tile>(&ctx, module).is_empty());
        assert_eq!(collect::<scf::For>(&ctx, module).len(), 2);
        let validation = validate_all(&ctx, module);
        assert!(validation.is_ok(), "{validation}");
    }

    #[test]
    fn non_tile_ops_are_not_matched() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)]], 3);
        let before = print_op(&ctx, fx.module.op());

        let step_op = ctx.defining_op(fx.step).unwrap();
        let mut rw = PatternRewriter::new();
        let matched = TileToSequentialFor::default().match_and_rewrite(&mut ctx, step_op, &mut rw);
        assert!(!matched);
        assert!(!rw.has_mutations());
        assert_eq!(print_op(&ctx, fx.module.op()), before);
    }

    // ------------------------------------------------------------------
    // Preconditions
    // ------------------------------------------------------------------

    #[test]
    fn well_formed_tile_passes_preconditions() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(
            &mut ctx,
            loc,
            &[&[Dim::Static(10)], &[Dim::Static(10), Dim::Static(4)]],
            4,
        );
        let shape = check_preconditions(&ctx, fx.tile, &TileLoweringConfig::default()).unwrap();
        assert_eq!(shape.ranks(), vec![1, 2]);
        assert_eq!(shape.outs, fx.func.params(&ctx).to_vec());
    }

    #[test]
    fn mismatched_static_extents_are_rejected_unless_disabled() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Static(10)], &[Dim::Static(12)]], 4);
        let before = print_op(&ctx, fx.module.op());

        let err = check_preconditions(&ctx, fx.tile, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PreconditionViolation::ExtentMismatch {
                index: 1,
                reference: 0,
                expected: 10,
                found: 12
            }
        );
        assert_eq!(
            err.to_string(),
            "output #1 has leading extent 12 but output #0 has 10"
        );
        assert_eq!(print_op(&ctx, fx.module.op()), before);

        let relaxed = TileLoweringConfig::default().with_check_static_extents(false);
        assert!(check_preconditions(&ctx, fx.tile, &relaxed).is_ok());
    }

    #[test]
    fn dynamic_extents_are_not_compared() {
        let (mut ctx, loc) = test_ctx();
        let fx = fixture(&mut ctx, loc, &[&[Dim::Dynamic], &[Dim::Static(12)]], 4);
        assert!(check_preconditions(&ctx, fx.tile, &TileLoweringConfig::default()).is_ok());
    }

    /// A tile whose results do not line up with its outputs.
    fn tile_with_extra_result(ctx: &mut IrContext, loc: Location) -> (Module, tile::Tile) {
        let ty = tensor_ty(ctx, &[Dim::Static(6)]);
        let module = tessera_ir::dialect::core::module(ctx, loc, Symbol::new("bad"));
        let f = func::func(ctx, loc, Symbol::new("main"), &[ty]);
        ctx.push_op(module.first_block(ctx).unwrap(), f.op_ref());
        let entry = f.entry_block(ctx);
        let out = f.params(ctx)[0];
        let step = arith::const_index(ctx, loc, 2);
        ctx.push_op(entry, step.op_ref());
        let step = step.result(ctx);

        let (region, block) = tile::body_region(ctx, loc, &[out]);
        let sub = ctx.block_arg(block, 2);
        let y = tile::r#yield(ctx, loc, [sub]);
        ctx.push_op(block, y.op_ref());
        let t = tile::tile_with_results(ctx, loc, step, &[out], &[ty, ty], region);
        ctx.push_op(entry, t.op_ref());
        (module, t)
    }

    #[test]
    fn result_count_mismatch_is_reported_without_mutation() {
        let (mut ctx, loc) = test_ctx();
        let (module, t) = tile_with_extra_result(&mut ctx, loc);
        let before = print_op(&ctx, module.op());

        let err = check_preconditions(&ctx, t, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PreconditionViolation::ResultCountMismatch {
                results: 2,
                outs: 1
            }
        );
        assert_eq!(print_op(&ctx, module.op()), before);
    }

    #[test]
    #[should_panic(expected = "tile.tile has 2 result(s) but 1 output operand(s)")]
    fn pattern_panics_on_malformed_tile() {
        let (mut ctx, loc) = test_ctx();
        let (module, _) = tile_with_extra_result(&mut ctx, loc);
        lower(&mut ctx, module, &TileLoweringConfig::default());
    }

    #[test]
    fn non_index_step_is_rejected() {
        let (mut ctx, loc) = test_ctx();
        let ty = tensor_ty(&mut ctx, &[Dim::Static(6)]);
        let f64_ty = core::f64(&mut ctx);
        let (_, outer) = tessera_ir::dialect::single_block_region(&mut ctx, loc, &[ty]);
        let out = ctx.block_arg(outer, 0);
        let step = arith::r#const(&mut ctx, loc, f64_ty, 2.0f64.into());
        ctx.push_op(outer, step.op_ref());
        let step = step.result(&ctx);
        let (region, block) = tile::body_region(&mut ctx, loc, &[out]);
        let sub = ctx.block_arg(block, 2);
        let y = tile::r#yield(&mut ctx, loc, [sub]);
        ctx.push_op(block, y.op_ref());
        let t = tile::tile(&mut ctx, loc, step, &[out], region);

        let err = check_preconditions(&ctx, t, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tile.tile step must be of type core.index, got core.f64"
        );
    }

    #[test]
    fn missing_yield_is_rejected() {
        let (mut ctx, loc) = test_ctx();
        let ty = tensor_ty(&mut ctx, &[Dim::Static(6)]);
        let (_, outer) = tessera_ir::dialect::single_block_region(&mut ctx, loc, &[ty]);
        let out = ctx.block_arg(outer, 0);
        let step = arith::const_index(&mut ctx, loc, 2);
        ctx.push_op(outer, step.op_ref());
        let step = step.result(&ctx);
        let (region, _) = tile::body_region(&mut ctx, loc, &[out]);
        let t = tile::tile(&mut ctx, loc, step, &[out], region);

        let err = check_preconditions(&ctx, t, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PreconditionViolation::MissingYield {
                found: "an empty block".to_string()
            }
        );
    }

    #[test]
    fn yield_of_full_tensor_is_a_type_error() {
        let (mut ctx, loc) = test_ctx();
        let ty = tensor_ty(&mut ctx, &[Dim::Static(6)]);
        let (_, outer) = tessera_ir::dialect::single_block_region(&mut ctx, loc, &[ty]);
        let out = ctx.block_arg(outer, 0);
        let step = arith::const_index(&mut ctx, loc, 2);
        ctx.push_op(outer, step.op_ref());
        let step = step.result(&ctx);
        let (region, block) = tile::body_region(&mut ctx, loc, &[out]);
        let y = tile::r#yield(&mut ctx, loc, [out]);
        ctx.push_op(block, y.op_ref());
        let t = tile::tile(&mut ctx, loc, step, &[out], region);

        let err = check_preconditions(&ctx, t, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "yielded value #0 has type tensor.tensor(core.f64) {shape = [6]}, \
             expected tensor.tensor(core.f64) {shape = [?]}"
        );
    }

    #[test]
    fn rank_zero_output_is_rejected() {
        let (mut ctx, loc) = test_ctx();
        let scalar_tensor = tensor_ty(&mut ctx, &[]);
        let (_, outer) = tessera_ir::dialect::single_block_region(&mut ctx, loc, &[scalar_tensor]);
        let out = ctx.block_arg(outer, 0);
        let step = arith::const_index(&mut ctx, loc, 2);
        ctx.push_op(outer, step.op_ref());
        let step = step.result(&ctx);
        let (region, _) = tessera_ir::dialect::single_block_region(&mut ctx, loc, &[]);
        let t = tile::tile(&mut ctx, loc, step, &[out], region);

        let err = check_preconditions(&ctx, t, &TileLoweringConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PreconditionViolation::NotRankedTensor {
                index: 0,
                found: "tensor.tensor(core.f64) {shape = []}".to_string()
            }
        );
    }

    #[test]
    fn config_defaults() {
        let config = TileLoweringConfig::default();
        assert!(config.check_static_extents);
        assert_eq!(config.max_rewrites, 10_000);
        assert_eq!(config.clone().with_max_rewrites(3).max_rewrites, 3);
    }
}
