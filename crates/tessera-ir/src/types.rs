//! Attributes, interned types and interned paths.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use cranelift_entity::{EntityRef, PrimaryMap};
use smallvec::SmallVec;

use crate::refs::{PathRef, TypeRef};
use crate::symbol::Symbol;

/// Constant payload of an operation or type attribute.
///
/// Integers and floats are kept as raw bits so attributes stay `Eq + Hash`
/// and can take part in type interning.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// No payload. A dynamic extent in a tensor shape.
    Unit,
    IntBits(u64),
    FloatBits(u64),
    Symbol(Symbol),
    List(Vec<Attribute>),
}

impl Attribute {
    pub fn as_int(&self) -> Option<u64> {
        match *self {
            Attribute::IntBits(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Attribute::FloatBits(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Attribute]> {
        match self {
            Attribute::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::IntBits(value as u64)
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::IntBits(value)
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Attribute::FloatBits(value.to_bits())
    }
}

impl From<Symbol> for Attribute {
    fn from(value: Symbol) -> Self {
        Attribute::Symbol(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

/// `dialect.name(params..) {attrs..}`. Equal data interns to the same `TypeRef`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: SmallVec<[TypeRef; 2]>,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl TypeData {
    /// A type with no parameters and no attributes.
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            params: SmallVec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn with_attr(mut self, key: &'static str, value: Attribute) -> Self {
        self.attrs.insert(Symbol::new(key), value);
        self
    }

    pub fn is(&self, dialect: Symbol, name: Symbol) -> bool {
        self.dialect == dialect && self.name == name
    }
}

/// Hash-consing table handing out one entity ref per distinct value.
pub struct Interner<K: EntityRef, V> {
    items: PrimaryMap<K, V>,
    index: HashMap<V, K>,
}

impl<K: EntityRef, V: Clone + Eq + Hash> Interner<K, V> {
    pub fn new() -> Self {
        Self {
            items: PrimaryMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn intern(&mut self, value: V) -> K {
        if let Some(&key) = self.index.get(&value) {
            return key;
        }
        let key = self.items.push(value.clone());
        self.index.insert(value, key);
        key
    }

    pub fn get(&self, key: K) -> &V {
        &self.items[key]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K: EntityRef, V: Clone + Eq + Hash> Default for Interner<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

pub type TypeInterner = Interner<TypeRef, TypeData>;
pub type PathInterner = Interner<PathRef, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_structural() {
        let mut types = TypeInterner::new();
        let index = types.intern(TypeData::new(Symbol::new("core"), Symbol::new("index")));
        let again = types.intern(TypeData::new(Symbol::new("core"), Symbol::new("index")));
        assert_eq!(index, again);
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn shape_attribute_is_part_of_identity() {
        let mut types = TypeInterner::new();
        let f64_ty = types.intern(TypeData::new(Symbol::new("core"), Symbol::new("f64")));
        let tensor = |extent: Attribute| {
            TypeData::new(Symbol::new("tensor"), Symbol::new("tensor"))
                .with_param(f64_ty)
                .with_attr("shape", Attribute::List(vec![extent]))
        };
        let fixed = types.intern(tensor(Attribute::IntBits(4)));
        let dynamic = types.intern(tensor(Attribute::Unit));
        assert_ne!(fixed, dynamic);
        assert!(types.get(fixed).is(Symbol::new("tensor"), Symbol::new("tensor")));
    }

    #[test]
    fn negative_index_keeps_its_bits() {
        let attr = Attribute::from(-3i64);
        assert_eq!(attr.as_int().map(|bits| bits as i64), Some(-3));
        assert_eq!(Attribute::from(0.5).as_float(), Some(0.5));
    }

    #[test]
    fn paths_are_deduplicated() {
        let mut paths = PathInterner::new();
        let a = paths.intern("kernels/a.tsr".to_owned());
        let b = paths.intern("kernels/b.tsr".to_owned());
        assert_eq!(paths.intern("kernels/a.tsr".to_owned()), a);
        assert_ne!(a, b);
        assert_eq!(paths.get(b), "kernels/b.tsr");
    }
}
