//! Interpreter over Tessera IR.
//!
//! Values live in a flat environment keyed by `ValueRef`. SSA guarantees one
//! definition per key; loop bodies simply overwrite their bindings on each
//! iteration.

use std::collections::HashMap;

use tracing::{debug, trace};

use tessera_ir::dialect::{arith, func, scf, tensor, tile};
use tessera_ir::{Attribute, BlockRef, DialectOp, IrContext, Module, OpRef, Symbol, ValueRef};

use crate::error::EvalError;
use crate::value::{Tensor, Value, Window};

/// Run `f` on `args` and return what its `func.return` hands back.
pub fn evaluate(ctx: &IrContext, f: func::Func, args: Vec<Value>) -> Result<Vec<Value>, EvalError> {
    Evaluator::new(ctx).call(f, args)
}

/// Run the function named `name` in `module`.
pub fn evaluate_named(
    ctx: &IrContext,
    module: Module,
    name: &str,
    args: Vec<Value>,
) -> Result<Vec<Value>, EvalError> {
    let missing = || EvalError::NoSuchFunction {
        name: name.to_string(),
    };
    let wanted = Symbol::lookup(name).ok_or_else(missing)?;
    let f = module
        .ops(ctx)
        .into_iter()
        .filter_map(|op| func::Func::from_op(ctx, op).ok())
        .find(|f| f.sym_name(ctx) == wanted)
        .ok_or_else(missing)?;
    evaluate(ctx, f, args)
}

#[derive(Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Min,
}

impl BinOp {
    fn on_index(self, a: i64, b: i64) -> i64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Min => a.min(b),
        }
    }

    fn on_float(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Min => a.min(b),
        }
    }
}

/// How a block finished.
enum Flow {
    Next,
    Exit(Vec<Value>),
}

pub struct Evaluator<'a> {
    ctx: &'a IrContext,
    env: HashMap<ValueRef, Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            env: HashMap::new(),
        }
    }

    pub fn call(&mut self, f: func::Func, args: Vec<Value>) -> Result<Vec<Value>, EvalError> {
        let params = f.params(self.ctx).len();
        if params != args.len() {
            return Err(EvalError::ArgumentCount {
                expected: params,
                found: args.len(),
            });
        }
        debug!(function = %f.sym_name(self.ctx), args = args.len(), "evaluating");
        self.run_block(f.entry_block(self.ctx), args)
    }

    fn get(&self, v: ValueRef) -> Result<&Value, EvalError> {
        self.env
            .get(&v)
            .ok_or(EvalError::UndefinedValue { value: v })
    }

    fn index(&self, v: ValueRef, op: &str) -> Result<i64, EvalError> {
        self.get(v)?.as_index(op)
    }

    fn indices(&self, vs: &[ValueRef], op: &str) -> Result<Vec<i64>, EvalError> {
        vs.iter().map(|&v| self.index(v, op)).collect()
    }

    fn tensor(&self, v: ValueRef, op: &str) -> Result<&Tensor, EvalError> {
        self.get(v)?.as_tensor(op)
    }

    fn bind(&mut self, v: ValueRef, value: Value) {
        self.env.insert(v, value);
    }

    /// Bind `args` to the block's arguments and run it to its terminator.
    fn run_block(&mut self, block: BlockRef, args: Vec<Value>) -> Result<Vec<Value>, EvalError> {
        let ctx = self.ctx;
        for (&param, value) in ctx.block_args(block).iter().zip(args) {
            self.bind(param, value);
        }
        for &op in &ctx.block(block).ops {
            if let Flow::Exit(values) = self.eval_op(op)? {
                return Ok(values);
            }
        }
        Err(EvalError::MissingTerminator { block })
    }

    fn operand_values(&self, op: OpRef) -> Result<Vec<Value>, EvalError> {
        self.ctx
            .op_operands(op)
            .iter()
            .map(|&v| self.get(v).cloned())
            .collect()
    }

    fn eval_op(&mut self, op: OpRef) -> Result<Flow, EvalError> {
        let ctx = self.ctx;
        let name = ctx.op_full_name(op);
        trace!(%op, name = %name, "eval");

        if func::Return::matches(ctx, op) || scf::Yield::matches(ctx, op) || tile::Yield::matches(ctx, op)
        {
            return Ok(Flow::Exit(self.operand_values(op)?));
        }

        let results = if let Ok(c) = arith::Const::from_op(ctx, op) {
            vec![match c.value(ctx) {
                Attribute::IntBits(bits) => Value::Index(bits as i64),
                Attribute::FloatBits(bits) => Value::Float(f64::from_bits(bits)),
                _ => {
                    return Err(EvalError::TypeMismatch {
                        op: name,
                        expected: "integer or float attribute",
                        found: "other attribute",
                    });
                }
            }]
        } else if let Some(v) = self.eval_arith(op, &name)? {
            vec![v]
        } else if let Ok(d) = tensor::DimOp::from_op(ctx, op) {
            let source = self.tensor(d.source(ctx), &name)?;
            let index = d.index(ctx);
            let extent = source.shape().get(index as usize).copied().ok_or(
                EvalError::DimOutOfRange {
                    index,
                    rank: source.rank(),
                },
            )?;
            vec![Value::Index(extent as i64)]
        } else if let Ok(e) = tensor::ExtractSlice::from_op(ctx, op) {
            let window = self.window(&e.descriptor(ctx), &name)?;
            vec![self.tensor(e.source(ctx), &name)?.extract(&window)?.into()]
        } else if let Ok(i) = tensor::InsertSlice::from_op(ctx, op) {
            let window = self.window(&i.descriptor(ctx), &name)?;
            let source = self.tensor(i.source(ctx), &name)?;
            vec![self.tensor(i.dest(ctx), &name)?.insert(source, &window)?.into()]
        } else if let Ok(f) = tensor::Fill::from_op(ctx, op) {
            let value = self.get(f.value(ctx))?.as_element(&name)?;
            vec![self.tensor(f.dest(ctx), &name)?.filled(value).into()]
        } else if let Ok(a) = tensor::Add::from_op(ctx, op) {
            let lhs = self.tensor(a.lhs(ctx), &name)?;
            vec![lhs.add(self.tensor(a.rhs(ctx), &name)?)?.into()]
        } else if let Ok(f) = scf::For::from_op(ctx, op) {
            self.eval_for(f, &name)?
        } else if let Ok(t) = tile::Tile::from_op(ctx, op) {
            self.eval_tile(t, &name)?
        } else {
            return Err(EvalError::UnsupportedOp { name });
        };

        for (&result, value) in ctx.op_results(op).iter().zip(results) {
            self.bind(result, value);
        }
        Ok(Flow::Next)
    }

    fn eval_arith(&self, op: OpRef, name: &str) -> Result<Option<Value>, EvalError> {
        let ctx = self.ctx;
        let (lhs, rhs, kind) = if let Ok(a) = arith::Add::from_op(ctx, op) {
            (a.lhs(ctx), a.rhs(ctx), BinOp::Add)
        } else if let Ok(s) = arith::Sub::from_op(ctx, op) {
            (s.lhs(ctx), s.rhs(ctx), BinOp::Sub)
        } else if let Ok(m) = arith::Mul::from_op(ctx, op) {
            (m.lhs(ctx), m.rhs(ctx), BinOp::Mul)
        } else if let Ok(m) = arith::Min::from_op(ctx, op) {
            (m.lhs(ctx), m.rhs(ctx), BinOp::Min)
        } else {
            return Ok(None);
        };
        let value = match (self.get(lhs)?, self.get(rhs)?) {
            (Value::Index(a), Value::Index(b)) => Value::Index(kind.on_index(*a, *b)),
            (Value::Float(a), Value::Float(b)) => Value::Float(kind.on_float(*a, *b)),
            (a, b) => {
                let found = if matches!(a, Value::Tensor(_)) { a } else { b };
                return Err(EvalError::TypeMismatch {
                    op: name.to_string(),
                    expected: "two index or two float operands",
                    found: found.kind(),
                });
            }
        };
        Ok(Some(value))
    }

    fn window(&self, desc: &tensor::SliceDescriptor, op: &str) -> Result<Window, EvalError> {
        Window::from_indices(
            &self.indices(&desc.offsets, op)?,
            &self.indices(&desc.sizes, op)?,
            &self.indices(&desc.strides, op)?,
        )
    }

    fn eval_for(&mut self, f: scf::For, name: &str) -> Result<Vec<Value>, EvalError> {
        let ctx = self.ctx;
        let lower = self.index(f.lower(ctx), name)?;
        let upper = self.index(f.upper(ctx), name)?;
        let step = self.index(f.step(ctx), name)?;
        if step <= 0 {
            return Err(EvalError::InvalidStep { step });
        }
        let mut carried = f
            .inits(ctx)
            .into_iter()
            .map(|v| self.get(v).cloned())
            .collect::<Result<Vec<_>, _>>()?;

        let body = f.body_block(ctx);
        let mut iv = lower;
        while iv < upper {
            let mut args = Vec::with_capacity(carried.len() + 1);
            args.push(Value::Index(iv));
            args.extend(carried);
            carried = self.run_block(body, args)?;
            iv += step;
        }
        Ok(carried)
    }

    /// Chunks of `step` rows along dimension 0 of the first output, the last
    /// one possibly short. Each chunk's yields are written back before the
    /// next chunk is taken.
    fn eval_tile(&mut self, t: tile::Tile, name: &str) -> Result<Vec<Value>, EvalError> {
        let ctx = self.ctx;
        let step = self.index(t.step(ctx), name)?;
        if step <= 0 {
            return Err(EvalError::InvalidStep { step });
        }
        let step = step as usize;
        let mut outs = t
            .outs(ctx)
            .iter()
            .map(|&v| self.tensor(v, name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let total = outs
            .first()
            .and_then(|o| o.shape().first().copied())
            .unwrap_or(0);
        let body = ctx
            .region(t.body(ctx))
            .blocks
            .first()
            .copied()
            .ok_or_else(|| EvalError::UnsupportedOp {
                name: format!("{name} without a body"),
            })?;

        for offset in (0..total).step_by(step) {
            let size = step.min(total - offset);
            let windows: Vec<Window> = outs
                .iter()
                .map(|o| Window::leading(o.shape(), offset, size))
                .collect();
            let mut args = vec![Value::Index(offset as i64), Value::Index(size as i64)];
            for (out, window) in outs.iter().zip(&windows) {
                args.push(out.extract(window)?.into());
            }
            let yielded = self.run_block(body, args)?;
            for ((out, window), value) in outs.iter_mut().zip(&windows).zip(yielded) {
                *out = out.insert(&value.into_tensor(name)?, window)?;
            }
        }
        Ok(outs.into_iter().map(Value::Tensor).collect())
    }
}
