//! IR validation.
//!
//! Three independent checks, each returning a [`ValidationResult`]:
//!
//! 1. **Scope**: every operand refers to a value that is visible at its use:
//!    an earlier result in the same block, an argument of the same or an
//!    enclosing block, or an earlier result in an enclosing block.
//! 2. **Use-chain consistency**: the use-chains stored in `IrContext` match the
//!    actual operands, in both directions.
//! 3. **Structure**: loop and tile terminators are where they belong and carry
//!    the right number and types of values.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::context::IrContext;
use crate::dialect::{core, scf, tile};
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueDef, ValueRef};
use crate::rewrite::Module;
use crate::symbol::Symbol;
use crate::types::Attribute;
use crate::walk::{self, WalkAction};

// ============================================================================
// Error types
// ============================================================================

/// An operand that refers to a value not visible at its use.
#[derive(Debug, Display)]
#[display(
    "stale value in @{function_name}: operand #{operand_index} of {consumer_op} references {stale_value_description}"
)]
pub struct StaleValueError {
    pub function_name: String,
    pub consumer_op: String,
    pub operand_index: usize,
    pub stale_value_description: String,
}

/// A use-chain entry without a matching operand, or the reverse.
#[derive(Debug, Display)]
#[display("{message}")]
pub struct UseChainError {
    pub message: String,
}

/// A misplaced or mismatched terminator or loop signature.
#[derive(Debug, Display)]
#[display("{op}: {message}")]
pub struct StructureError {
    pub op: String,
    pub message: String,
}

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub stale_errors: Vec<StaleValueError>,
    pub use_chain_errors: Vec<UseChainError>,
    pub structure_errors: Vec<StructureError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.stale_errors.is_empty()
            && self.use_chain_errors.is_empty()
            && self.structure_errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.stale_errors.len() + self.use_chain_errors.len() + self.structure_errors.len()
    }

    fn merge(mut self, other: ValidationResult) -> Self {
        self.stale_errors.extend(other.stale_errors);
        self.use_chain_errors.extend(other.use_chain_errors);
        self.structure_errors.extend(other.structure_errors);
        self
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        if !self.stale_errors.is_empty() {
            writeln!(f, "{} stale value(s) found:", self.stale_errors.len())?;
            for err in &self.stale_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        if !self.use_chain_errors.is_empty() {
            writeln!(f, "{} use-chain error(s) found:", self.use_chain_errors.len())?;
            for err in &self.use_chain_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        if !self.structure_errors.is_empty() {
            writeln!(f, "{} structure error(s) found:", self.structure_errors.len())?;
            for err in &self.structure_errors {
                writeln!(f, "  - {err}")?;
            }
        }
        Ok(())
    }
}

/// Run every check.
pub fn validate_all(ctx: &IrContext, module: Module) -> ValidationResult {
    validate_value_integrity(ctx, module)
        .merge(validate_use_chains(ctx, module))
        .merge(validate_structure(ctx, module))
}

// ============================================================================
// Scope validation
// ============================================================================

fn describe_value(ctx: &IrContext, v: ValueRef) -> String {
    match ctx.value_def(v) {
        ValueDef::OpResult(op, idx) => {
            let attached = if ctx.op(op).parent_block.is_some() {
                ""
            } else {
                " (detached)"
            };
            format!("result #{idx} of {}{attached}", ctx.op_full_name(op))
        }
        ValueDef::BlockArg(block, idx) => format!("block arg #{idx} of {block}"),
    }
}

struct ScopeChecker<'a> {
    ctx: &'a IrContext,
    function_name: String,
    errors: Vec<StaleValueError>,
}

impl ScopeChecker<'_> {
    fn check_region(&mut self, region: RegionRef, visible: &HashSet<ValueRef>) {
        for &block in &self.ctx.region(region).blocks {
            let mut scope = visible.clone();
            self.check_block(block, &mut scope);
        }
    }

    fn check_block(&mut self, block: BlockRef, visible: &mut HashSet<ValueRef>) {
        let ctx = self.ctx;
        visible.extend(ctx.block_args(block).iter().copied());
        for &op in &ctx.block(block).ops {
            for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
                if !visible.contains(&operand) {
                    self.errors.push(StaleValueError {
                        function_name: self.function_name.clone(),
                        consumer_op: ctx.op_full_name(op),
                        operand_index: i,
                        stale_value_description: describe_value(ctx, operand),
                    });
                }
            }
            for &region in &ctx.op(op).regions {
                self.check_region(region, visible);
            }
            visible.extend(ctx.op_results(op).iter().copied());
        }
    }
}

/// Check that every operand inside each `func.func` is visible at its use.
pub fn validate_value_integrity(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut result = ValidationResult::default();
    let _ = walk::walk_region::<()>(ctx, module.body(ctx), &mut |op| {
        let data = ctx.op(op);
        if data.dialect != Symbol::new("func") || data.name != Symbol::new("func") {
            return ControlFlow::Continue(WalkAction::Advance);
        }
        let function_name = match data.attributes.get(&Symbol::new("sym_name")) {
            Some(Attribute::Symbol(s)) => s.to_string(),
            _ => "<unnamed>".to_string(),
        };
        let mut checker = ScopeChecker {
            ctx,
            function_name,
            errors: Vec::new(),
        };
        for &region in &data.regions {
            checker.check_region(region, &HashSet::new());
        }
        result.stale_errors.extend(checker.errors);
        ControlFlow::Continue(WalkAction::Skip)
    });
    result
}

// ============================================================================
// Use-chain consistency
// ============================================================================

/// Validate that the stored use-chains match the actual operands.
pub fn validate_use_chains(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut errors = Vec::new();
    let body = module.body(ctx);

    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut values: HashSet<ValueRef> = HashSet::new();
    let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
            values.insert(operand);
        }
        values.extend(ctx.op_results(op).iter().copied());
        for &region in &ctx.op(op).regions {
            for &block in &ctx.region(region).blocks {
                values.extend(ctx.block_args(block).iter().copied());
            }
        }
        ControlFlow::Continue(WalkAction::Advance)
    });

    // Operand -> use-chain entry.
    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(UseChainError {
                message: format!(
                    "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                    ctx.op_full_name(op),
                ),
            });
        }
    }

    // Use-chain entry -> operand. Uses by detached ops are ignored: they are
    // pending rewrites, not part of the module.
    for &val in &values {
        for u in ctx.uses(val) {
            if ctx.op(u.user).parent_block.is_none() {
                continue;
            }
            if !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(UseChainError {
                    message: format!(
                        "use-chain of {val} lists operand #{} of {} ({}) which does not use it",
                        u.operand_index,
                        ctx.op_full_name(u.user),
                        u.user,
                    ),
                });
            }
        }
    }

    ValidationResult {
        use_chain_errors: errors,
        ..Default::default()
    }
}

// ============================================================================
// Structure
// ============================================================================

/// Check loop signatures and terminator placement.
pub fn validate_structure(ctx: &IrContext, module: Module) -> ValidationResult {
    let mut errors = Vec::new();
    let _ = walk::walk_region::<()>(ctx, module.body(ctx), &mut |op| {
        if let Ok(for_op) = scf::For::from_op(ctx, op) {
            check_for(ctx, for_op, &mut errors);
        } else if scf::Yield::matches(ctx, op) {
            check_terminator_position(ctx, op, scf::For::matches, "scf.for", &mut errors);
        } else if tile::Yield::matches(ctx, op) {
            check_terminator_position(ctx, op, tile::Tile::matches, "tile.tile", &mut errors);
        }
        ControlFlow::Continue(WalkAction::Advance)
    });
    ValidationResult {
        structure_errors: errors,
        ..Default::default()
    }
}

fn check_for(ctx: &IrContext, for_op: scf::For, errors: &mut Vec<StructureError>) {
    let op = for_op.op_ref();
    let mut fail = |message: String| {
        errors.push(StructureError {
            op: format!("scf.for ({op})"),
            message,
        })
    };

    let blocks = &ctx.region(for_op.body(ctx)).blocks;
    if blocks.len() != 1 {
        fail(format!("body must have exactly one block, found {}", blocks.len()));
        return;
    }
    let block = blocks[0];

    let inits = for_op.inits(ctx);
    let carried: Vec<_> = inits.iter().map(|&v| ctx.value_ty(v)).collect();
    if ctx.op_result_types(op) != carried.as_slice() {
        fail("result types do not match the carried values".to_string());
    }
    for operand in [for_op.lower(ctx), for_op.upper(ctx), for_op.step(ctx)] {
        if !core::is_index(ctx, ctx.value_ty(operand)) {
            fail(format!("bound {operand} is not of index type"));
        }
    }

    let args = ctx.block_args(block);
    let arg_types: Vec<_> = args.iter().map(|&v| ctx.value_ty(v)).collect();
    if arg_types.is_empty() || !core::is_index(ctx, arg_types[0]) || arg_types[1..] != carried[..] {
        fail("body arguments must be (index, carried types..)".to_string());
    }

    let Some(last) = ctx.block_terminator(block) else {
        fail("body is empty; expected a trailing scf.yield".to_string());
        return;
    };
    let Ok(yield_op) = scf::Yield::from_op(ctx, last) else {
        fail(format!("body ends with {} instead of scf.yield", ctx.op_full_name(last)));
        return;
    };
    let yielded: Vec<_> = yield_op.values(ctx).iter().map(|&v| ctx.value_ty(v)).collect();
    if yielded.len() != carried.len() {
        fail(format!(
            "scf.yield carries {} value(s), loop carries {}",
            yielded.len(),
            carried.len()
        ));
    } else if yielded != carried {
        fail("scf.yield types do not match the carried types".to_string());
    }
}

fn check_terminator_position(
    ctx: &IrContext,
    op: OpRef,
    parent_matches: fn(&IrContext, OpRef) -> bool,
    parent_name: &str,
    errors: &mut Vec<StructureError>,
) {
    let name = ctx.op_full_name(op);
    let Some(block) = ctx.op(op).parent_block else {
        return;
    };
    let in_parent = ctx
        .block_parent_op(block)
        .is_some_and(|parent| parent_matches(ctx, parent));
    if !in_parent {
        errors.push(StructureError {
            op: format!("{name} ({op})"),
            message: format!("must be nested directly in {parent_name}"),
        });
    } else if ctx.block_terminator(block) != Some(op) {
        errors.push(StructureError {
            op: format!("{name} ({op})"),
            message: "must be the last operation of its block".to_string(),
        });
    }
}
