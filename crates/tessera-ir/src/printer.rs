//! Text printer for the IR, modelled on MLIR's generic syntax.
//!
//! ```text
//! core.module @m {
//!   func.func @main(%0: tensor.tensor(core.f64) {shape = [10]}) {
//!     %1 = arith.const {value = 3} : core.index
//!     %2 = tensor.dim %0 {index = 0} : core.index
//!     func.return %0
//!   }
//! }
//! ```
//!
//! Values are numbered in definition order, restarting at every function.
//! A region's block label is omitted when it has a single block without
//! arguments.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::dialect::tensor::TensorType;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Print an operation (and everything nested in it) as IR text.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut printer = Printer::new(ctx);
    printer
        .operation(op)
        .expect("fmt::Write to String never fails");
    printer.out
}

/// Print a type as IR text.
pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    write_type(ctx, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    if let Some(tensor) = TensorType::from_type(ctx, ty) {
        f.write_str("tensor.tensor(")?;
        write_type(ctx, f, tensor.elem)?;
        f.write_str(") {shape = ")?;
        write_separated(f, '[', ']', tensor.shape.iter(), |f, dim| write!(f, "{dim}"))?;
        return f.write_char('}');
    }

    let data = ctx.types.get(ty);
    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        write_separated(f, '(', ')', data.params.iter(), |f, &p| write_type(ctx, f, p))?;
    }
    write_attr_dict(f, data.attrs.iter())
}

/// `open a, b, c close`
fn write_separated<W: Write, T>(
    f: &mut W,
    open: char,
    close: char,
    items: impl IntoIterator<Item = T>,
    mut each: impl FnMut(&mut W, T) -> fmt::Result,
) -> fmt::Result {
    f.write_char(open)?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        each(f, item)?;
    }
    f.write_char(close)
}

/// ` {key = value, ...}` sorted by key; nothing when empty.
fn write_attr_dict<'a>(
    f: &mut impl Write,
    attrs: impl Iterator<Item = (&'a Symbol, &'a Attribute)>,
) -> fmt::Result {
    let mut sorted: Vec<(String, &Attribute)> = attrs.map(|(k, v)| (k.to_string(), v)).collect();
    if sorted.is_empty() {
        return Ok(());
    }
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    f.write_char(' ')?;
    write_separated(f, '{', '}', sorted, |f, (key, val)| {
        write!(f, "{key} = ")?;
        write_attribute(f, val)
    })
}

fn write_attribute(f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::IntBits(v) => write!(f, "{}", *v as i64),
        Attribute::FloatBits(bits) => {
            let v = f64::from_bits(*bits);
            let text = v.to_string();
            f.write_str(&text)?;
            // Keep floats distinguishable from integers.
            if v.is_finite() && !text.contains(['.', 'e']) {
                f.write_str(".0")?;
            }
            Ok(())
        }
        Attribute::Symbol(sym) => write!(f, "@{sym}"),
        Attribute::List(items) => write_separated(f, '[', ']', items, write_attribute),
    }
}

/// Walks an op tree, numbering values as they are defined.
struct Printer<'a> {
    ctx: &'a IrContext,
    out: String,
    names: HashMap<ValueRef, usize>,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            out: String::new(),
            names: HashMap::new(),
            indent: 0,
        }
    }

    /// Start a new numbering scope.
    fn restart_numbering(&mut self) {
        self.names.clear();
    }

    fn define(&mut self, v: ValueRef) -> usize {
        let n = self.names.len();
        self.names.insert(v, n);
        n
    }

    fn pad(&mut self) -> fmt::Result {
        write!(self.out, "{:w$}", "", w = self.indent)
    }

    fn nested<R>(&mut self, by: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.indent += by;
        let r = f(self);
        self.indent -= by;
        r
    }

    fn operand(&mut self, v: ValueRef) -> fmt::Result {
        match self.names.get(&v) {
            Some(n) => write!(self.out, "%{n}"),
            // Defined outside of what is being printed, or dangling.
            None => write!(self.out, "%<{v}>"),
        }
    }

    /// `(%n: ty, ...)` defining each block argument.
    fn block_args(&mut self, block: BlockRef) -> fmt::Result {
        let ctx = self.ctx;
        self.out.write_char('(')?;
        for (i, &arg) in ctx.block_args(block).iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            let n = self.define(arg);
            write!(self.out, "%{n}: ")?;
            write_type(ctx, &mut self.out, ctx.value_ty(arg))?;
        }
        self.out.write_char(')')
    }

    fn block_ops(&mut self, block: BlockRef) -> fmt::Result {
        let ctx = self.ctx;
        for &op in ctx.block(block).ops.iter() {
            self.operation(op)?;
        }
        Ok(())
    }

    fn operation(&mut self, op: OpRef) -> fmt::Result {
        let data = self.ctx.op(op);
        let (dialect, name) = (data.dialect, data.name);
        if dialect == Symbol::new("core") && name == Symbol::new("module") {
            self.module(op)
        } else if dialect == Symbol::new("func") && name == Symbol::new("func") {
            self.func(op)
        } else {
            self.generic(op)
        }
    }

    fn sym_name(&mut self, op: OpRef) -> fmt::Result {
        let ctx = self.ctx;
        match ctx.op(op).attributes.get(&Symbol::new("sym_name")) {
            Some(Attribute::Symbol(name)) => write!(self.out, " @{name}"),
            _ => Ok(()),
        }
    }

    fn generic(&mut self, op: OpRef) -> fmt::Result {
        let ctx = self.ctx;
        self.pad()?;

        let results = ctx.op_results(op);
        for (i, &v) in results.iter().enumerate() {
            let n = self.define(v);
            write!(self.out, "{}%{n}", if i == 0 { "" } else { ", " })?;
        }
        if !results.is_empty() {
            self.out.write_str(" = ")?;
        }

        let data = ctx.op(op);
        write!(self.out, "{}.{}", data.dialect, data.name)?;
        for (i, &v) in ctx.op_operands(op).iter().enumerate() {
            self.out.write_str(if i == 0 { " " } else { ", " })?;
            self.operand(v)?;
        }
        write_attr_dict(&mut self.out, data.attributes.iter())?;

        for (i, &ty) in ctx.op_result_types(op).iter().enumerate() {
            self.out.write_str(if i == 0 { " : " } else { ", " })?;
            write_type(ctx, &mut self.out, ty)?;
        }

        for &region in data.regions.iter() {
            self.out.write_str(" {\n")?;
            self.nested(2, |p| p.region(region))?;
            self.pad()?;
            self.out.write_char('}')?;
        }
        self.out.write_char('\n')
    }

    fn region(&mut self, region: RegionRef) -> fmt::Result {
        let ctx = self.ctx;
        let blocks = &ctx.region(region).blocks;
        if let [only] = blocks.as_slice()
            && ctx.block_args(*only).is_empty()
        {
            return self.block_ops(*only);
        }
        for (i, &block) in blocks.iter().enumerate() {
            self.labelled_block(i, block)?;
        }
        Ok(())
    }

    /// `^bbN(args):` followed by the block's ops, one level deeper.
    fn labelled_block(&mut self, i: usize, block: BlockRef) -> fmt::Result {
        self.pad()?;
        write!(self.out, "^bb{i}")?;
        if !self.ctx.block_args(block).is_empty() {
            self.block_args(block)?;
        }
        self.out.write_str(":\n")?;
        self.nested(2, |p| p.block_ops(block))
    }

    fn module(&mut self, op: OpRef) -> fmt::Result {
        let ctx = self.ctx;
        self.pad()?;
        self.out.write_str("core.module")?;
        self.sym_name(op)?;
        self.out.write_str(" {\n")?;
        self.nested(2, |p| {
            for &region in ctx.op(op).regions.iter() {
                for &block in ctx.region(region).blocks.iter() {
                    for &child in ctx.block(block).ops.iter() {
                        p.restart_numbering();
                        p.operation(child)?;
                    }
                }
            }
            Ok(())
        })?;
        self.pad()?;
        self.out.write_str("}\n")
    }

    fn func(&mut self, op: OpRef) -> fmt::Result {
        let ctx = self.ctx;
        self.pad()?;
        self.out.write_str("func.func")?;
        self.sym_name(op)?;

        self.restart_numbering();
        let Some(&region) = ctx.op(op).regions.first() else {
            return self.out.write_char('\n');
        };
        let blocks = &ctx.region(region).blocks;

        // Entry block arguments double as the signature.
        match blocks.first() {
            Some(&entry) => self.block_args(entry)?,
            None => self.out.write_str("()")?,
        }
        self.out.write_str(" {\n")?;
        self.nested(2, |p| {
            for (i, &block) in blocks.iter().enumerate() {
                if i == 0 {
                    p.block_ops(block)?;
                } else {
                    p.labelled_block(i, block)?;
                }
            }
            Ok(())
        })?;
        self.pad()?;
        self.out.write_str("}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tensor::{self, Dim};
    use crate::dialect::{arith, core, func, scf};
    use crate::location::{Location, Span};
    use crate::ops::DialectOp;

    fn test_location(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("test.tsr".to_owned());
        Location::new(path, Span::new(0, 0))
    }

    #[test]
    fn prints_tensor_types_with_shape() {
        let mut ctx = IrContext::new();
        let f64_ty = core::f64(&mut ctx);
        let ty = tensor::TensorType::new(f64_ty, [Dim::Static(10), Dim::Dynamic]).intern(&mut ctx);
        assert_eq!(print_type(&ctx, ty), "tensor.tensor(core.f64) {shape = [10, ?]}");
        let index = core::index(&mut ctx);
        assert_eq!(print_type(&ctx, index), "core.index");
    }

    #[test]
    fn float_attributes_keep_a_fraction() {
        let mut text = String::new();
        write_attribute(&mut text, &Attribute::from(2.0)).unwrap();
        text.push(' ');
        write_attribute(&mut text, &Attribute::from(vec![Attribute::from(-1i64), Attribute::Unit]))
            .unwrap();
        assert_eq!(text, "2.0 [-1, unit]");
    }

    #[test]
    fn prints_function_with_loop() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let f64_ty = core::f64(&mut ctx);
        let vec_ty = tensor::TensorType::new(f64_ty, [Dim::Static(4)]).intern(&mut ctx);

        let module = core::module(&mut ctx, loc, Symbol::new("m"));
        let f = func::func(&mut ctx, loc, Symbol::new("main"), &[vec_ty]);
        ctx.push_op(module.first_block(&ctx).unwrap(), f.op_ref());
        let entry = f.entry_block(&ctx);
        let arg = ctx.block_arg(entry, 0);

        let zero = arith::const_index(&mut ctx, loc, 0);
        let two = arith::const_index(&mut ctx, loc, 2);
        ctx.push_op(entry, zero.op_ref());
        ctx.push_op(entry, two.op_ref());
        let dim = tensor::dim(&mut ctx, loc, arg, 0);
        ctx.push_op(entry, dim.op_ref());

        let (lo, step, hi) = (zero.result(&ctx), two.result(&ctx), dim.result(&ctx));
        let for_op = scf::r#for(&mut ctx, loc, lo, hi, step, &[arg]);
        ctx.push_op(entry, for_op.op_ref());
        let body = for_op.body_block(&ctx);
        let carried = for_op.iter_args(&ctx)[0];
        let y = scf::r#yield(&mut ctx, loc, [carried]);
        ctx.push_op(body, y.op_ref());

        let result = for_op.results(&ctx)[0];
        let ret = func::r#return(&mut ctx, loc, [result]);
        ctx.push_op(entry, ret.op_ref());

        insta::assert_snapshot!(print_op(&ctx, module.op()), @r"
        core.module @m {
          func.func @main(%0: tensor.tensor(core.f64) {shape = [4]}) {
            %1 = arith.const {value = 0} : core.index
            %2 = arith.const {value = 2} : core.index
            %3 = tensor.dim %0 {index = 0} : core.index
            %4 = scf.for %1, %3, %2, %0 : tensor.tensor(core.f64) {shape = [4]} {
              ^bb0(%5: core.index, %6: tensor.tensor(core.f64) {shape = [4]}):
                scf.yield %6
            }
            func.return %4
          }
        }
        ");
    }

    #[test]
    fn out_of_scope_operand_is_marked() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let c = arith::const_index(&mut ctx, loc, 7);
        let v = c.result(&ctx);
        let ret = func::r#return(&mut ctx, loc, [v]);
        let text = print_op(&ctx, ret.op_ref());
        assert_eq!(text, format!("func.return %<{v}>\n"));
    }
}
