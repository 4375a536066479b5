//! Which operations may survive a lowering.

use std::collections::HashMap;
use std::ops::ControlFlow;

use derive_more::Display;

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef};
use crate::symbol::Symbol;
use crate::walk::{self, WalkAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    Legal,
    Illegal,
}

/// Legality rules keyed by dialect or by `dialect.op`.
///
/// An op rule beats a rule for its dialect; ops with no rule are legal.
#[derive(Debug, Default)]
pub struct ConversionTarget {
    dialects: HashMap<Symbol, Legality>,
    ops: HashMap<(Symbol, Symbol), Legality>,
}

impl ConversionTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: &'static str, legality: Legality) -> Self {
        self.dialects.insert(Symbol::new(dialect), legality);
        self
    }

    pub fn with_op(mut self, dialect: &'static str, name: &'static str, legality: Legality) -> Self {
        self.ops
            .insert((Symbol::new(dialect), Symbol::new(name)), legality);
        self
    }

    pub fn legality(&self, ctx: &IrContext, op: OpRef) -> Legality {
        let data = ctx.op(op);
        self.ops
            .get(&(data.dialect, data.name))
            .or_else(|| self.dialects.get(&data.dialect))
            .copied()
            .unwrap_or(Legality::Legal)
    }

    /// Illegal operations nested anywhere in `body`, in walk order.
    pub fn illegal_ops(&self, ctx: &IrContext, body: RegionRef) -> Vec<IllegalOp> {
        let mut found = Vec::new();
        let _ = walk::walk_region::<()>(ctx, body, &mut |op| {
            if self.legality(ctx, op) == Legality::Illegal {
                let data = ctx.op(op);
                found.push(IllegalOp {
                    op,
                    dialect: data.dialect,
                    name: data.name,
                });
            }
            ControlFlow::Continue(WalkAction::Advance)
        });
        found
    }
}

/// An operation that should have been rewritten away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{dialect}.{name} ({op})")]
pub struct IllegalOp {
    pub op: OpRef,
    pub dialect: Symbol,
    pub name: Symbol,
}
