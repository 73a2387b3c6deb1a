//! Items generated modules import.
//!
//! A generated module starts with `use hyperschema::runtime::{...}` (or the
//! configured runtime path) and needs nothing else from this crate.

pub use crate::codec::primitive::{decode_uint, encode_uint, preencode_uint};
pub use crate::codec::{
    decode, decode_flags, encode, field_flag, get, measure, require, struct_fields, Array, Codec,
    EnumCodec, Frame, State,
};
pub use crate::error::CodecError;
pub use crate::primitive::Primitive;
pub use crate::value::{Fields, Value};
