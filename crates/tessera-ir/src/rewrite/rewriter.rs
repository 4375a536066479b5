//! PatternRewriter: the mutations a pattern records for its matched op.

use crate::context::IrContext;
use crate::refs::{OpRef, ValueRef};

/// Rewriter interface for patterns.
///
/// Patterns create operations with `IrContext::create_op` and record here
/// where they go: before the matched op (`insert_op`), in its place
/// (`replace_op`), or nowhere with the matched op's results mapped to
/// existing values (`erase_op`). The `PatternApplicator` applies the record
/// after the pattern returns `true`.
#[derive(Default)]
pub struct PatternRewriter {
    prefix_ops: Vec<OpRef>,
    replacement: Option<OpRef>,
    erase_values: Option<Vec<ValueRef>>,
}

/// What applying a record changed, for the applicator's worklist.
pub(crate) struct Applied {
    /// Operations that were attached: prefix ops, then the replacement.
    pub(crate) new_ops: Vec<OpRef>,
    /// Values that took over the matched op's uses.
    pub(crate) replaced_with: Vec<ValueRef>,
}

impl PatternRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached operation before the matched operation.
    ///
    /// Multiple calls keep their order.
    pub fn insert_op(&mut self, op: OpRef) {
        self.prefix_ops.push(op);
    }

    /// Replace the matched operation with `new_op`.
    ///
    /// Results are replaced 1:1 by index, so the counts must agree.
    pub fn replace_op(&mut self, new_op: OpRef) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "replace_op called after replace_op or erase_op"
        );
        self.replacement = Some(new_op);
    }

    /// Erase the matched operation, mapping its results to `replacement_values`.
    pub fn erase_op(&mut self, replacement_values: Vec<ValueRef>) {
        debug_assert!(
            self.replacement.is_none() && self.erase_values.is_none(),
            "erase_op called after replace_op or erase_op"
        );
        self.erase_values = Some(replacement_values);
    }

    /// Check if any mutation was recorded.
    pub fn has_mutations(&self) -> bool {
        !self.prefix_ops.is_empty() || self.replacement.is_some() || self.erase_values.is_some()
    }

    /// Apply the recorded mutations around `original_op`.
    pub(crate) fn apply(self, ctx: &mut IrContext, original_op: OpRef) -> Applied {
        let parent_block = ctx.op(original_op).parent_block;
        let mut new_ops = Vec::with_capacity(self.prefix_ops.len() + 1);

        if let Some(block) = parent_block {
            for &prefix_op in &self.prefix_ops {
                ctx.insert_op_before(block, original_op, prefix_op);
                new_ops.push(prefix_op);
            }
        }

        let old_results: Vec<ValueRef> = ctx.op_results(original_op).to_vec();
        let replaced_with = if let Some(new_op) = self.replacement {
            if let Some(block) = parent_block {
                ctx.insert_op_before(block, original_op, new_op);
                new_ops.push(new_op);
            }
            ctx.op_results(new_op).to_vec()
        } else if let Some(values) = self.erase_values {
            values
        } else {
            return Applied {
                new_ops,
                replaced_with: Vec::new(),
            };
        };

        assert_eq!(
            old_results.len(),
            replaced_with.len(),
            "rewrite of {}: result count mismatch ({} vs {})",
            ctx.op_full_name(original_op),
            old_results.len(),
            replaced_with.len()
        );
        for (&old_v, &new_v) in old_results.iter().zip(&replaced_with) {
            ctx.replace_all_uses(old_v, new_v);
        }
        ctx.detach_op(original_op);
        ctx.remove_op(original_op);

        Applied {
            new_ops,
            replaced_with,
        }
    }
}
