//! Handles into the arenas owned by [`IrContext`](crate::IrContext).

use cranelift_entity::entity_impl;
use derive_more::Display;

macro_rules! entity {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);
        entity_impl!($name, $prefix);
    };
}

entity!(
    /// An operation.
    OpRef, "op"
);
entity!(
    /// An SSA value: an op result or a block argument.
    ValueRef, "v"
);
entity!(BlockRef, "block");
entity!(RegionRef, "region");
entity!(
    /// An interned [`TypeData`](crate::TypeData).
    TypeRef, "ty"
);
entity!(
    /// An interned source path.
    PathRef, "path"
);

/// Origin of a [`ValueRef`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ValueDef {
    #[display("{_0}#{_1}")]
    OpResult(OpRef, u32),
    #[display("{_0}#{_1}")]
    BlockArg(BlockRef, u32),
}
