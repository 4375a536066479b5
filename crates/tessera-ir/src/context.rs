//! Arena storage for a whole IR program.
//!
//! Every entity lives in a `PrimaryMap` owned by [`IrContext`] and is named by
//! a `u32` handle from [`crate::refs`]. Operand and result lists are pooled
//! `EntityList`s. Each value carries its use list, and every method that
//! touches operands keeps those lists current, so replacing a value is a walk
//! over its uses instead of over the program.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::Location;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

/// Operand slot `operand_index` of `user` reads the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 2]>,
    pub parent_block: Option<BlockRef>,
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

pub struct BlockData {
    pub location: Location,
    /// Argument types; the argument values are allocated by `create_block`.
    pub args: SmallVec<[TypeRef; 4]>,
    pub ops: SmallVec<[OpRef; 8]>,
    pub parent_region: Option<RegionRef>,
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 2]>,
    pub parent_op: Option<OpRef>,
}

/// Owner of every operation, value, block and region.
///
/// Ownership is a tree: an op sits in at most one block, a block in at most
/// one region, a region under at most one op. Methods that link entities
/// assert this.
#[derive(Default)]
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    op_results: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_args: SecondaryMap<BlockRef, EntityList<ValueRef>>,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    pub types: TypeInterner,
    pub paths: PathInterner,
}

impl IrContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_use(&mut self, value: ValueRef, user: OpRef, operand_index: u32) {
        self.uses[value].push(Use {
            user,
            operand_index,
        });
    }

    fn drop_use(&mut self, value: ValueRef, user: OpRef, operand_index: u32) {
        self.uses[value].retain(|u| u.user != user || u.operand_index != operand_index);
    }

    /// Allocate one value per type, defined by `def(index)`.
    fn alloc_values(
        &mut self,
        types: &[TypeRef],
        def: impl Fn(u32) -> ValueDef,
    ) -> EntityList<ValueRef> {
        let mut list = EntityList::new();
        for (i, &ty) in types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: def(i as u32),
                ty,
            });
            list.push(v, &mut self.value_pool);
        }
        list
    }

    fn assert_unattached(&self, op: OpRef, caller: &str) {
        if let Some(block) = self.ops[op].parent_block {
            panic!("{caller}: {op} is already in {block}; detach it first");
        }
    }

    // ---- operations --------------------------------------------------------

    /// Add a detached operation, registering its operand uses and allocating
    /// its result values.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is set or a region in `data.regions`
    /// already has an owner.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: new operations start detached; attach with push_op",
        );
        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();
        let op = self.ops.push(data);

        for r in regions {
            let owner = self.regions[r].parent_op.replace(op);
            assert!(
                owner.is_none(),
                "create_op: {r} is already owned by {}; cannot give it to {op}",
                owner.map(|o| o.to_string()).unwrap_or_default(),
            );
        }
        for (i, &v) in operands.iter().enumerate() {
            self.add_use(v, op, i as u32);
        }
        self.op_results[op] = self.alloc_values(&result_types, |i| ValueDef::OpResult(op, i));
        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.op_results[op].as_slice(&self.value_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.op_results(op)[index as usize]
    }

    pub fn op_is(&self, op: OpRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.ops[op];
        (data.dialect, data.name) == (dialect, name)
    }

    /// `dialect.name`, for messages.
    pub fn op_full_name(&self, op: OpRef) -> String {
        let data = &self.ops[op];
        format!("{}.{}", data.dialect, data.name)
    }

    /// Point operand `index` of `op` at `value`.
    pub fn set_operand(&mut self, op: OpRef, index: u32, value: ValueRef) {
        let slots = self.ops[op].operands.as_mut_slice(&mut self.value_pool);
        let previous = std::mem::replace(&mut slots[index as usize], value);
        if previous != value {
            self.drop_use(previous, op, index);
            self.add_use(value, op, index);
        }
    }

    /// Retire a detached operation. Its operands stop counting as uses; its
    /// data stays readable through [`IrContext::op`].
    ///
    /// # Panics
    ///
    /// Panics if `op` is still in a block or one of its results is used.
    pub fn remove_op(&mut self, op: OpRef) {
        self.assert_unattached(op, "remove_op");
        for &v in self.op_results(op) {
            let n = self.uses[v].len();
            assert!(n == 0, "remove_op: {v} defined by {op} still has {n} use(s)");
        }
        let operands: SmallVec<[ValueRef; 8]> = self.op_operands(op).into();
        for (i, v) in operands.into_iter().enumerate() {
            self.drop_use(v, op, i as u32);
        }
    }

    // ---- values ------------------------------------------------------------

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// The op whose result `v` is; `None` for block arguments.
    pub fn defining_op(&self, v: ValueRef) -> Option<OpRef> {
        match self.values[v].def {
            ValueDef::OpResult(op, _) => Some(op),
            ValueDef::BlockArg(..) => None,
        }
    }

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Rewire every use of `old` to read `new`.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        for u in std::mem::take(&mut self.uses[old]) {
            let slots = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slots[u.operand_index as usize], old);
            slots[u.operand_index as usize] = new;
            self.uses[new].push(u);
        }
    }

    // ---- blocks ------------------------------------------------------------

    /// Add a block and allocate one value per entry of `data.args`.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types = data.args.clone();
        let block = self.blocks.push(data);
        self.block_args[block] = self.alloc_values(&arg_types, |i| ValueDef::BlockArg(block, i));
        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_args[b].as_slice(&self.value_pool)
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_args(b)[index as usize]
    }

    /// Last op of `b`, whatever it is.
    pub fn block_terminator(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b].ops.last().copied()
    }

    pub fn block_parent_op(&self, b: BlockRef) -> Option<OpRef> {
        let region = self.blocks[b].parent_region?;
        self.regions[region].parent_op
    }

    /// Append `op` to `block`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is already in a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        self.assert_unattached(op, "push_op");
        self.blocks[block].ops.push(op);
        self.ops[op].parent_block = Some(block);
    }

    /// Insert `op` into `block` just before `anchor`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is already in a block or `anchor` is not in `block`.
    pub fn insert_op_before(&mut self, block: BlockRef, anchor: OpRef, op: OpRef) {
        self.assert_unattached(op, "insert_op_before");
        let Some(pos) = self.blocks[block].ops.iter().position(|&o| o == anchor) else {
            panic!("insert_op_before: {anchor} is not in {block}");
        };
        self.blocks[block].ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Take `op` out of `block`, leaving it alive and detached.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    /// Take `op` out of its block, if it has one.
    pub fn detach_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }
    }

    /// Move every op of `src` to the end of `dest`, in order.
    pub fn move_ops(&mut self, src: BlockRef, dest: BlockRef) {
        let moved = std::mem::take(&mut self.blocks[src].ops);
        for &op in &moved {
            self.ops[op].parent_block = Some(dest);
        }
        self.blocks[dest].ops.extend(moved);
    }

    // ---- regions -----------------------------------------------------------

    /// Add a region owning `data.blocks`.
    ///
    /// # Panics
    ///
    /// Panics if one of the blocks already has a region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let blocks = data.blocks.clone();
        let region = self.regions.push(data);
        for b in blocks {
            let owner = self.blocks[b].parent_region.replace(region);
            assert!(
                owner.is_none(),
                "create_region: {b} already belongs to {}; cannot give it to {region}",
                owner.map(|r| r.to_string()).unwrap_or_default(),
            );
        }
        region
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    /// Unlink `block` from its region. Its ops stay in it.
    pub fn detach_block(&mut self, block: BlockRef) {
        if let Some(region) = self.blocks[block].parent_region.take() {
            self.regions[region].blocks.retain(|b| *b != block);
        }
    }
}

/// Assembles an [`OperationData`], packing its lists into the context pools.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: SmallVec<[ValueRef; 8]>,
    results: SmallVec<[TypeRef; 4]>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: SmallVec::new(),
            results: SmallVec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operand(self, v: ValueRef) -> Self {
        self.operands([v])
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(self, ty: TypeRef) -> Self {
        self.results([ty])
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands: EntityList::from_slice(&self.operands, &mut ctx.value_pool),
            results: EntityList::from_slice(&self.results, &mut ctx.type_pool),
            attributes: self.attributes,
            regions: self.regions,
            parent_block: None,
        }
    }
}
