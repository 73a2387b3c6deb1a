//! Resolved type model
//!
//! What a built [`crate::Schema`] holds: every declaration with its type
//! references resolved to [`TypeRef`]s. References are indices into the
//! schema's declaration list, so recursive structs need no shared ownership.

use std::sync::OnceLock;

use crate::codec::StructLayout;
use crate::description::{
    EnumSpec, EnumValueDescription, FieldDescription, TypeDescription, TypeKind,
    VersionDescription,
};
use crate::primitive::Primitive;

/// Index of a declaration in its schema
pub type TypeId = usize;

/// A resolved reference to a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    Declared(TypeId),
}

/// Name and version shared by every declared kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub namespace: String,
    pub fqn: String,
    /// Schema version the declaration was last changed in
    pub version: u32,
}

impl Identity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, version: u32) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        Self {
            fqn: crate::description::fqn(&namespace, &name),
            name,
            namespace,
            version,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alias {
    pub id: Identity,
    pub target: TypeRef,
    /// Target name as declared
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub key: String,
    pub version: u32,
}

impl AsRef<str> for EnumValue {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub id: Identity,
    pub values: Vec<EnumValue>,
    pub offset: u64,
    pub strings: bool,
}

impl Enum {
    /// `(key, encoded integer)` pairs
    pub fn encoded_values(&self) -> Vec<(&str, u64)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.key.as_str(), self.offset + i as u64))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub target: TypeRef,
    /// Type name as declared
    pub type_name: String,
    pub required: bool,
    pub array: bool,
    pub version: u32,
    /// Bit of this field in the flags, 0 for required fields
    pub flag: u64,
}

impl StructField {
    pub fn is_optional(&self) -> bool {
        !self.required
    }
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub id: Identity,
    pub compact: bool,
    /// Field index the flags integer precedes, `fields.len()` for after the last
    pub flags_position: Option<usize>,
    pub fields: Vec<StructField>,
    pub(crate) layout: OnceLock<StructLayout>,
}

impl Struct {
    pub fn new(
        id: Identity,
        compact: bool,
        flags_position: Option<usize>,
        mut fields: Vec<StructField>,
    ) -> Self {
        let mut bit = 1u64;
        for field in fields.iter_mut() {
            if field.is_optional() {
                field.flag = bit;
                bit = bit.wrapping_shl(1);
            } else {
                field.flag = 0;
            }
        }
        Self {
            id,
            compact,
            flags_position,
            fields,
            layout: OnceLock::new(),
        }
    }

    pub fn optionals(&self) -> impl Iterator<Item = &StructField> {
        self.fields.iter().filter(|f| f.is_optional())
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ArrayType {
    pub id: Identity,
    pub element: TypeRef,
    pub element_name: String,
}

#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub version: u64,
    pub target: TypeRef,
    pub type_name: String,
    /// Migration name, bound at runtime or resolved in the namespace module
    pub map: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VersionedType {
    pub id: Identity,
    pub versions: Vec<VersionEntry>,
}

impl VersionedType {
    pub fn latest(&self) -> Option<&VersionEntry> {
        self.versions.last()
    }

    pub fn entry(&self, version: u64) -> Option<&VersionEntry> {
        self.versions.iter().find(|e| e.version == version)
    }
}

#[derive(Debug, Clone)]
pub struct ExternalType {
    pub id: Identity,
    /// Symbol the codec is exported under
    pub external: String,
    /// Module the symbol is imported from in generated code
    pub module: Option<String>,
}

/// A primitive or a declaration, with references resolved
#[derive(Debug, Clone)]
pub enum ResolvedType {
    Primitive(Primitive),
    Alias(Alias),
    Enum(Enum),
    Struct(Struct),
    Array(ArrayType),
    Versioned(VersionedType),
    External(ExternalType),
}

impl ResolvedType {
    /// Identity of a declared type, `None` for primitives
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            ResolvedType::Primitive(_) => None,
            ResolvedType::Alias(t) => Some(&t.id),
            ResolvedType::Enum(t) => Some(&t.id),
            ResolvedType::Struct(t) => Some(&t.id),
            ResolvedType::Array(t) => Some(&t.id),
            ResolvedType::Versioned(t) => Some(&t.id),
            ResolvedType::External(t) => Some(&t.id),
        }
    }

    pub(crate) fn identity_mut(&mut self) -> Option<&mut Identity> {
        match self {
            ResolvedType::Primitive(_) => None,
            ResolvedType::Alias(t) => Some(&mut t.id),
            ResolvedType::Enum(t) => Some(&mut t.id),
            ResolvedType::Struct(t) => Some(&mut t.id),
            ResolvedType::Array(t) => Some(&mut t.id),
            ResolvedType::Versioned(t) => Some(&mut t.id),
            ResolvedType::External(t) => Some(&mut t.id),
        }
    }

    /// Fully-qualified name; a primitive's name is its fqn
    pub fn fqn(&self) -> &str {
        match self {
            ResolvedType::Primitive(p) => p.name(),
            other => other.identity().map_or("", |id| id.fqn.as_str()),
        }
    }

    /// Version of a declaration, 0 for primitives
    pub fn version(&self) -> u32 {
        self.identity().map_or(0, |id| id.version)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ResolvedType::Primitive(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ResolvedType::Primitive(_) => "primitive",
            ResolvedType::Alias(_) => TypeKind::Alias.as_str(),
            ResolvedType::Enum(_) => TypeKind::Enum.as_str(),
            ResolvedType::Struct(_) => TypeKind::Struct.as_str(),
            ResolvedType::Array(_) => TypeKind::Array.as_str(),
            ResolvedType::Versioned(_) => TypeKind::Versioned.as_str(),
            ResolvedType::External(_) => TypeKind::External.as_str(),
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            ResolvedType::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Enum> {
        match self {
            ResolvedType::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Snapshot form of the declaration, `None` for primitives
    pub fn to_description(&self) -> Option<TypeDescription> {
        let id = self.identity()?;
        let base = TypeDescription {
            name: id.name.clone(),
            namespace: Some(id.namespace.clone()),
            version: Some(id.version),
            ..TypeDescription::default()
        };
        let desc = match self {
            ResolvedType::Primitive(_) => return None,
            ResolvedType::Alias(a) => TypeDescription {
                alias: Some(a.target_name.clone()),
                ..base
            },
            ResolvedType::Enum(e) => TypeDescription {
                enumeration: Some(EnumSpec::Values(
                    e.values
                        .iter()
                        .map(|v| EnumValueDescription::Versioned {
                            key: v.key.clone(),
                            version: v.version,
                        })
                        .collect(),
                )),
                offset: Some(e.offset),
                strings: e.strings,
                ..base
            },
            ResolvedType::Struct(s) => TypeDescription {
                compact: Some(s.compact),
                flags_position: Some(s.flags_position.map_or(-1, |p| p as i64)),
                fields: Some(
                    s.fields
                        .iter()
                        .map(|f| FieldDescription {
                            name: f.name.clone(),
                            required: f.required,
                            array: f.array,
                            type_name: f.type_name.clone(),
                            version: Some(f.version),
                        })
                        .collect(),
                ),
                ..base
            },
            ResolvedType::Array(a) => TypeDescription {
                array: true,
                type_name: Some(a.element_name.clone()),
                ..base
            },
            ResolvedType::Versioned(v) => TypeDescription {
                versions: Some(
                    v.versions
                        .iter()
                        .map(|e| VersionDescription {
                            type_name: e.type_name.clone(),
                            version: e.version,
                            map: e.map.clone(),
                        })
                        .collect(),
                ),
                ..base
            },
            ResolvedType::External(x) => TypeDescription {
                external: Some(x.external.clone()),
                ..base
            },
        };
        Some(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, required: bool) -> StructField {
        StructField {
            name: name.to_string(),
            target: TypeRef::Primitive(Primitive::Uint),
            type_name: "uint".to_string(),
            required,
            array: false,
            version: 1,
            flag: 0,
        }
    }

    #[test]
    fn test_flags_follow_optional_order() {
        let s = Struct::new(
            Identity::new("s", "ns", 1),
            false,
            Some(1),
            vec![field("a", true), field("b", false), field("c", false), field("d", true)],
        );
        let flags: Vec<u64> = s.fields.iter().map(|f| f.flag).collect();
        assert_eq!(flags, vec![0, 1, 2, 0]);
        assert_eq!(s.optionals().count(), 2);
        assert_eq!(s.id.fqn, "@ns/s");
    }

    #[test]
    fn test_struct_description() {
        let s = ResolvedType::Struct(Struct::new(
            Identity::new("s", "ns", 2),
            false,
            None,
            vec![field("a", true)],
        ));
        let desc = s.to_description().unwrap();
        assert_eq!(desc.flags_position, Some(-1));
        assert_eq!(desc.version, Some(2));
        assert_eq!(desc.fields.unwrap()[0].version, Some(1));
        assert!(ResolvedType::Primitive(Primitive::Uint).to_description().is_none());
    }

    #[test]
    fn test_enum_encoded_values() {
        let e = Enum {
            id: Identity::new("e", "ns", 1),
            values: ["x", "y"]
                .iter()
                .map(|k| EnumValue {
                    key: k.to_string(),
                    version: 1,
                })
                .collect(),
            offset: 1,
            strings: false,
        };
        assert_eq!(e.encoded_values(), vec![("x", 1), ("y", 2)]);
    }
}
