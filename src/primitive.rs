//! The primitive catalog
//!
//! A closed set of named primitive kinds. Primitive names resolve before any
//! user declaration is consulted, and a primitive is never framed when it is
//! embedded in a struct. The wire format of each kind lives in
//! [`crate::codec::primitive`].

use crate::types::ResolvedType;
use crate::value::Value;

macro_rules! primitives {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A primitive kind, addressed in declarations by its name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Primitive {
            $($variant),+
        }

        impl Primitive {
            /// Every primitive, in catalog order
            pub const ALL: &'static [Primitive] = &[$(Primitive::$variant),+];

            /// Name used in declarations and snapshots
            pub fn name(self) -> &'static str {
                match self {
                    $(Primitive::$variant => $name),+
                }
            }

            /// Rust identifier of the variant, used by generated code
            pub fn variant_name(self) -> &'static str {
                match self {
                    $(Primitive::$variant => stringify!($variant)),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Primitive::$variant),)+
                    _ => None,
                }
            }
        }

        static RESOLVED: &[ResolvedType] = &[$(ResolvedType::Primitive(Primitive::$variant)),+];
    };
}

primitives! {
    Uint => "uint",
    Uint1 => "uint1",
    Uint2 => "uint2",
    Uint3 => "uint3",
    Uint4 => "uint4",
    Uint5 => "uint5",
    Uint6 => "uint6",
    Uint7 => "uint7",
    Uint8 => "uint8",
    Uint16 => "uint16",
    Uint24 => "uint24",
    Uint32 => "uint32",
    Uint40 => "uint40",
    Uint48 => "uint48",
    Uint56 => "uint56",
    Uint64 => "uint64",
    Int => "int",
    Int8 => "int8",
    Int16 => "int16",
    Int24 => "int24",
    Int32 => "int32",
    Int40 => "int40",
    Int48 => "int48",
    Int56 => "int56",
    Int64 => "int64",
    Float32 => "float32",
    Float64 => "float64",
    Port => "port",
    Lexint => "lexint",
    SignedLexint => "signedLexint",
    String => "string",
    Utf8 => "utf8",
    Ascii => "ascii",
    Hex => "hex",
    Bigint => "bigint",
    Biguint64 => "biguint64",
    Bigint64 => "bigint64",
    Fixed32 => "fixed32",
    Fixed64 => "fixed64",
    Buffer => "buffer",
    Date => "date",
    Lexdate => "lexdate",
    Bool => "bool",
    Ip => "ip",
    Ipv4 => "ipv4",
    Ipv6 => "ipv6",
    IpAddress => "ipAddress",
    Ipv4Address => "ipv4Address",
    Ipv6Address => "ipv6Address",
    None => "none",
    Raw => "raw",
    Json => "json",
}

/// Broad grouping of primitives, which decides the default value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Unsigned,
    Signed,
    Float,
    BigInt,
    Boolean,
    Text,
    Binary,
    Network,
    Other,
}

impl Primitive {
    pub fn category(self) -> Category {
        use Primitive as P;
        match self {
            P::Uint
            | P::Uint1
            | P::Uint2
            | P::Uint3
            | P::Uint4
            | P::Uint5
            | P::Uint6
            | P::Uint7
            | P::Uint8
            | P::Uint16
            | P::Uint24
            | P::Uint32
            | P::Uint40
            | P::Uint48
            | P::Uint56
            | P::Uint64
            | P::Port
            | P::Lexint => Category::Unsigned,
            P::Int
            | P::Int8
            | P::Int16
            | P::Int24
            | P::Int32
            | P::Int40
            | P::Int48
            | P::Int56
            | P::Int64
            | P::SignedLexint => Category::Signed,
            P::Float32 | P::Float64 => Category::Float,
            P::Bigint | P::Biguint64 | P::Bigint64 => Category::BigInt,
            P::Bool => Category::Boolean,
            P::String | P::Utf8 | P::Ascii | P::Hex => Category::Text,
            P::Fixed32 | P::Fixed64 | P::Buffer | P::Date | P::Lexdate => Category::Binary,
            P::Ip | P::Ipv4 | P::Ipv6 | P::IpAddress | P::Ipv4Address | P::Ipv6Address => {
                Category::Network
            }
            P::None | P::Raw | P::Json => Category::Other,
        }
    }

    /// Value a decoder reports for a field of this kind that was not on the wire
    pub fn default_value(self) -> Value {
        match self.category() {
            Category::Unsigned => Value::Uint(0),
            Category::Signed => Value::Int(0),
            Category::Float => Value::Float(0.0),
            Category::BigInt => Value::BigInt(0),
            Category::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// The bool kind is never written inside a struct; it lives in the flags.
    pub fn is_bool(self) -> bool {
        self == Primitive::Bool
    }

    /// Bit width of the `uint1`..`uint7` kinds, 0 for everything else
    pub fn bitwise_size(self) -> u32 {
        match self {
            Primitive::Uint1 => 1,
            Primitive::Uint2 => 2,
            Primitive::Uint3 => 3,
            Primitive::Uint4 => 4,
            Primitive::Uint5 => 5,
            Primitive::Uint6 => 6,
            Primitive::Uint7 => 7,
            _ => 0,
        }
    }

    /// The catalog entry as a resolved type
    pub fn resolved(self) -> &'static ResolvedType {
        &RESOLVED[self as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Primitive::from_name("uint"), Some(Primitive::Uint));
        assert_eq!(Primitive::from_name("signedLexint"), Some(Primitive::SignedLexint));
        assert_eq!(Primitive::from_name("ipv6Address"), Some(Primitive::Ipv6Address));
        assert_eq!(Primitive::from_name("@ns/uint"), None);
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_name(p.name()), Some(*p));
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Primitive::Uint32.default_value(), Value::Uint(0));
        assert_eq!(Primitive::Int.default_value(), Value::Int(0));
        assert_eq!(Primitive::Bigint.default_value(), Value::BigInt(0));
        assert_eq!(Primitive::Bool.default_value(), Value::Bool(false));
        assert_eq!(Primitive::String.default_value(), Value::Null);
        assert_eq!(Primitive::Buffer.default_value(), Value::Null);
    }

    #[test]
    fn test_resolved_table_matches_catalog() {
        for p in Primitive::ALL {
            match p.resolved() {
                ResolvedType::Primitive(q) => assert_eq!(p, q),
                other => panic!("expected primitive, got {:?}", other.fqn()),
            }
        }
    }
}
