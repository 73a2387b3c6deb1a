//! Generated by hyperschema. Do not edit.

#![allow(unused_imports, unused_variables, clippy::all)]

use hyperschema::runtime::{
    decode_flags, decode_uint, encode_uint, field_flag, get, preencode_uint, require,
    struct_fields, Array, Codec, CodecError, EnumCodec, Fields, Frame, Primitive, State,
    Value,
};

/// Schema version this module was generated from
pub const VERSION: u32 = 1;

/// `@geo/kind` (v1)
pub struct GeoKind;

impl GeoKind {
    pub const VALUES: &'static [(&'static str, u64)] = &[("circle", 1), ("square", 2)];

    const CODEC: EnumCodec<'static, &'static str> = EnumCodec {
        fqn: "@geo/kind",
        keys: &["circle", "square"],
        offset: 1,
        strings: false,
    };
}

impl Codec for GeoKind {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Self::CODEC.preencode(state, m)
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Self::CODEC.encode(state, m)
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        Self::CODEC.decode(state)
    }
}

/// `@geo/id` (v1)
pub struct GeoId;

impl Codec for GeoId {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Primitive::Uint.preencode(state, m)
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Primitive::Uint.encode(state, m)
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        Primitive::Uint.decode(state)
    }
}

/// `@geo/shape` (v1)
pub struct GeoShape;

impl GeoShape {
    const FQN: &'static str = "@geo/shape";
}

impl Codec for GeoShape {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        let m = struct_fields(m)?;
        require(m, Self::FQN, "id")?;
        require(m, Self::FQN, "kind")?;
        let flags: u64 = field_flag(m, "filled", 1, true)
            | field_flag(m, "children", 2, false)
            | field_flag(m, "origin", 4, false)
            | field_flag(m, "label", 8, false)
            | field_flag(m, "parent", 16, false);
        GeoId.preencode(state, get(m, "id"))?;
        GeoKind.preencode(state, get(m, "kind"))?;
        preencode_uint(state, flags);
        if flags & 2 != 0 {
            Array(&Frame(&GeoShape)).preencode(state, get(m, "children"))?;
        }
        if flags & 4 != 0 {
            GeoVec.preencode(state, get(m, "origin"))?;
        }
        if flags & 8 != 0 {
            Primitive::String.preencode(state, get(m, "label"))?;
        }
        if flags & 16 != 0 {
            Frame(&GeoShape).preencode(state, get(m, "parent"))?;
        }
        Ok(())
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        let m = struct_fields(m)?;
        require(m, Self::FQN, "id")?;
        require(m, Self::FQN, "kind")?;
        let flags: u64 = field_flag(m, "filled", 1, true)
            | field_flag(m, "children", 2, false)
            | field_flag(m, "origin", 4, false)
            | field_flag(m, "label", 8, false)
            | field_flag(m, "parent", 16, false);
        GeoId.encode(state, get(m, "id"))?;
        GeoKind.encode(state, get(m, "kind"))?;
        encode_uint(state, flags)?;
        if flags & 2 != 0 {
            Array(&Frame(&GeoShape)).encode(state, get(m, "children"))?;
        }
        if flags & 4 != 0 {
            GeoVec.encode(state, get(m, "origin"))?;
        }
        if flags & 8 != 0 {
            Primitive::String.encode(state, get(m, "label"))?;
        }
        if flags & 16 != 0 {
            Frame(&GeoShape).encode(state, get(m, "parent"))?;
        }
        Ok(())
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        let mut res = Fields::new();
        res.insert("id".to_string(), Value::Uint(0));
        res.insert("kind".to_string(), Value::Null);
        res.insert("filled".to_string(), Value::Bool(false));
        res.insert("children".to_string(), Value::Null);
        res.insert("origin".to_string(), Value::Null);
        res.insert("label".to_string(), Value::Null);
        res.insert("parent".to_string(), Value::Null);
        res.insert("id".to_string(), GeoId.decode(state)?);
        res.insert("kind".to_string(), GeoKind.decode(state)?);
        if state.is_exhausted() {
            return Ok(Value::Struct(res));
        }
        let flags = decode_flags(state)?;
        res.insert("filled".to_string(), Value::Bool(flags & 1 != 0));
        if flags & 2 != 0 {
            res.insert("children".to_string(), Array(&Frame(&GeoShape)).decode(state)?);
        }
        if flags & 4 != 0 {
            res.insert("origin".to_string(), GeoVec.decode(state)?);
        }
        if flags & 8 != 0 {
            res.insert("label".to_string(), Primitive::String.decode(state)?);
        }
        if flags & 16 != 0 {
            res.insert("parent".to_string(), Frame(&GeoShape).decode(state)?);
        }
        Ok(Value::Struct(res))
    }
}

/// `@geo/shapes` (v1)
pub struct GeoShapes;

impl Codec for GeoShapes {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Array(&Frame(&GeoShape)).preencode(state, m)
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        Array(&Frame(&GeoShape)).encode(state, m)
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        Array(&Frame(&GeoShape)).decode(state)
    }
}

/// `@geo/point` (v1), supplied externally
pub use crate::geometry::Point as GeoPoint;

/// `@geo/size` (v1)
pub struct GeoSize;

impl Codec for GeoSize {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        preencode_uint(state, 2);
        Primitive::Float64.preencode(state, m)
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        encode_uint(state, 2)?;
        Primitive::Float64.encode(state, m)
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        match decode_uint(state)? {
            1 => Ok(crate::geometry::size_from_v1(Primitive::Uint.decode(state)?)),
            2 => Primitive::Float64.decode(state),
            version => Err(CodecError::UnknownVersion {
                fqn: "@geo/size".to_string(),
                version,
            }),
        }
    }
}

/// `@geo/vec` (v1)
pub struct GeoVec;

impl GeoVec {
    const FQN: &'static str = "@geo/vec";
}

impl Codec for GeoVec {
    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        let m = struct_fields(m)?;
        require(m, Self::FQN, "x")?;
        require(m, Self::FQN, "y")?;
        Primitive::Int.preencode(state, get(m, "x"))?;
        Primitive::Int.preencode(state, get(m, "y"))?;
        Ok(())
    }

    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {
        let m = struct_fields(m)?;
        require(m, Self::FQN, "x")?;
        require(m, Self::FQN, "y")?;
        Primitive::Int.encode(state, get(m, "x"))?;
        Primitive::Int.encode(state, get(m, "y"))?;
        Ok(())
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        let mut res = Fields::new();
        res.insert("x".to_string(), Value::Int(0));
        res.insert("y".to_string(), Value::Int(0));
        res.insert("x".to_string(), Primitive::Int.decode(state)?);
        res.insert("y".to_string(), Primitive::Int.decode(state)?);
        Ok(Value::Struct(res))
    }
}

/// Codec of a declared type by fully-qualified name
pub fn resolve(fqn: &str) -> Option<&'static dyn Codec> {
    match fqn {
        "@geo/kind" => Some(&GeoKind),
        "@geo/id" => Some(&GeoId),
        "@geo/shape" => Some(&GeoShape),
        "@geo/shapes" => Some(&GeoShapes),
        "@geo/point" => Some(&GeoPoint),
        "@geo/size" => Some(&GeoSize),
        "@geo/vec" => Some(&GeoVec),
        _ => None,
    }
}

/// Codec of a struct by fully-qualified name
pub fn resolve_struct(fqn: &str) -> Option<&'static dyn Codec> {
    match fqn {
        "@geo/shape" => Some(&GeoShape),
        "@geo/vec" => Some(&GeoVec),
        _ => None,
    }
}

/// `(key, encoded integer)` table of an integer-valued enum
pub fn get_enum(fqn: &str) -> Option<&'static [(&'static str, u64)]> {
    match fqn {
        "@geo/kind" => Some(GeoKind::VALUES),
        _ => None,
    }
}

pub fn encode(fqn: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
    let codec = resolve(fqn).ok_or_else(|| CodecError::UnknownType(fqn.to_string()))?;
    hyperschema::runtime::encode(codec, value)
}

pub fn decode(fqn: &str, bytes: &[u8]) -> Result<Value, CodecError> {
    let codec = resolve(fqn).ok_or_else(|| CodecError::UnknownType(fqn.to_string()))?;
    hyperschema::runtime::decode(codec, bytes)
}
