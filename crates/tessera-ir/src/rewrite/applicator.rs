//! PatternApplicator: worklist-driven greedy pattern application.
//!
//! The worklist is seeded with every operation in the module body, children
//! before parents. Popped operations that are no longer attached to a block
//! are skipped. After a successful rewrite the newly attached operations,
//! everything nested in them, and the users of the replacement values are
//! pushed back onto the worklist. Application stops when the worklist is
//! empty or after `max_rewrites` successful rewrites.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, trace, warn};

use super::Module;
use super::conversion_target::{ConversionTarget, IllegalOp};
use super::pattern::RewritePattern;
use super::rewriter::PatternRewriter;
use crate::context::IrContext;
use crate::refs::OpRef;
use crate::walk;

/// Default bound on successful rewrites per `apply_partial` call.
pub const DEFAULT_MAX_REWRITES: usize = 10_000;

/// Result of applying rewrite patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyResult {
    /// Number of operations popped from the worklist and visited.
    pub iterations: usize,
    /// Total number of successful rewrites.
    pub total_changes: usize,
    /// Whether the worklist drained before the rewrite bound was hit.
    pub reached_fixpoint: bool,
}

impl ApplyResult {
    /// Verify that no illegal operations remain.
    pub fn verify(
        &self,
        ctx: &IrContext,
        module: Module,
        target: &ConversionTarget,
    ) -> Result<(), Vec<IllegalOp>> {
        let illegal = target.illegal_ops(ctx, module.body(ctx));
        if illegal.is_empty() {
            Ok(())
        } else {
            Err(illegal)
        }
    }
}

/// Worklist with membership marking so an op is queued at most once.
#[derive(Default)]
struct Worklist {
    queue: VecDeque<OpRef>,
    queued: HashSet<OpRef>,
}

impl Worklist {
    fn push(&mut self, op: OpRef) {
        if self.queued.insert(op) {
            self.queue.push_back(op);
        }
    }

    fn pop(&mut self) -> Option<OpRef> {
        let op = self.queue.pop_front()?;
        self.queued.remove(&op);
        Some(op)
    }

    /// Queue `op` after everything nested in it.
    fn push_nested(&mut self, ctx: &IrContext, op: OpRef) {
        for &region in &ctx.op(op).regions {
            for nested in walk::post_order(ctx, region) {
                self.push(nested);
            }
        }
        self.push(op);
    }
}

/// Applies rewrite patterns to a module until no pattern matches.
pub struct PatternApplicator {
    patterns: Vec<Box<dyn RewritePattern>>,
    max_rewrites: usize,
}

impl PatternApplicator {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }

    /// Add a rewrite pattern. Patterns are tried in insertion order.
    pub fn add_pattern(mut self, pattern: impl RewritePattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    /// Set the maximum number of successful rewrites.
    pub fn with_max_rewrites(mut self, n: usize) -> Self {
        self.max_rewrites = n;
        self
    }

    /// Apply patterns and verify that no illegal operation remains.
    pub fn apply(
        &self,
        ctx: &mut IrContext,
        module: Module,
        target: &ConversionTarget,
    ) -> Result<ApplyResult, Vec<IllegalOp>> {
        let result = self.apply_partial(ctx, module);
        result.verify(ctx, module, target)?;
        Ok(result)
    }

    /// Apply patterns without verification.
    pub fn apply_partial(&self, ctx: &mut IrContext, module: Module) -> ApplyResult {
        let mut worklist = Worklist::default();
        for op in walk::post_order(ctx, module.body(ctx)) {
            worklist.push(op);
        }

        let mut iterations = 0;
        let mut total_changes = 0;

        while let Some(op) = worklist.pop() {
            if ctx.op(op).parent_block.is_none() {
                continue;
            }
            if total_changes >= self.max_rewrites {
                warn!(
                    max_rewrites = self.max_rewrites,
                    pending = worklist.queue.len() + 1,
                    "rewrite bound reached before fixpoint"
                );
                return ApplyResult {
                    iterations,
                    total_changes,
                    reached_fixpoint: false,
                };
            }
            iterations += 1;

            for pattern in &self.patterns {
                let mut rw = PatternRewriter::new();
                if !pattern.match_and_rewrite(ctx, op, &mut rw) || !rw.has_mutations() {
                    continue;
                }
                trace!(pattern = pattern.name(), %op, "pattern matched");
                let applied = rw.apply(ctx, op);
                total_changes += 1;

                for &new_op in &applied.new_ops {
                    worklist.push_nested(ctx, new_op);
                }
                for &value in &applied.replaced_with {
                    for u in ctx.uses(value) {
                        worklist.push(u.user);
                    }
                }
                break;
            }
        }

        debug!(iterations, total_changes, "pattern application reached fixpoint");
        ApplyResult {
            iterations,
            total_changes,
            reached_fixpoint: true,
        }
    }
}

impl Default for PatternApplicator {
    fn default() -> Self {
        Self::new()
    }
}
