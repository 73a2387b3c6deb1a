//! Compact Encoding Engine
//!
//! Every encoder implements [`Codec`]: `preencode` sizes the output, `encode`
//! writes it and `decode` reads it back, all over a shared [`State`]. The
//! wrappers here compose codecs the way struct fields need them: [`Frame`]
//! prefixes a payload with its byte length, [`Array`] prefixes a sequence with
//! its element count.
//!
//! The same building blocks back the live [`crate::Schema`] and the modules
//! produced by the code generator.

pub mod primitive;
pub mod resolved;
pub mod state;
pub mod structs;

use std::sync::Arc;

pub use resolved::TypeCodec;
pub use state::State;
pub use structs::{field_flag, get, require, struct_fields, StructLayout};

use crate::error::CodecError;
use crate::value::Value;
use primitive::{decode_len, decode_uint, encode_uint, preencode_uint};

/// Encoder/decoder for one type.
pub trait Codec: Send + Sync {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError>;
    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError>;
    fn decode(&self, state: &mut State) -> Result<Value, CodecError>;
}

impl<C: Codec + ?Sized> Codec for Arc<C> {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        (**self).preencode(state, value)
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        (**self).encode(state, value)
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        (**self).decode(state)
    }
}

/// Forward transform applied to values decoded from an older entry of a
/// versioned type.
pub type Migration = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Encodes `value` into a freshly sized buffer.
pub fn encode(codec: &dyn Codec, value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut state = State::new();
    codec.preencode(&mut state, value)?;
    state.alloc();
    codec.encode(&mut state, value)?;
    Ok(state.into_bytes())
}

/// Decodes one value from the start of `bytes`. Trailing bytes are ignored.
pub fn decode(codec: &dyn Codec, bytes: &[u8]) -> Result<Value, CodecError> {
    let mut state = State::from_bytes(bytes);
    codec.decode(&mut state)
}

/// Byte length `codec` needs for `value`.
pub fn measure(codec: &dyn Codec, value: &Value) -> Result<usize, CodecError> {
    let mut scratch = State::new();
    codec.preencode(&mut scratch, value)?;
    Ok(scratch.end)
}

/// Reads a flags integer.
pub fn decode_flags(state: &mut State) -> Result<u64, CodecError> {
    decode_uint(state)
}

/// Length-prefixed payload. Decoding is bounded by the prefix and skips any
/// bytes of the frame the inner codec did not consume.
pub struct Frame<'a>(pub &'a dyn Codec);

impl Codec for Frame<'_> {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let slot = state.open_frame();
        let payload_start = state.end;
        self.0.preencode(state, value)?;
        let len = state.end - payload_start;
        state.close_frame(slot, len);
        preencode_uint(state, len as u64);
        Ok(())
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let len = match state.take_frame() {
            Some(len) => len,
            None => measure(self.0, value)?,
        };
        encode_uint(state, len as u64)?;
        let payload_start = state.start;
        self.0.encode(state, value)?;
        let written = state.start - payload_start;
        if written != len {
            return Err(CodecError::FrameMismatch {
                expected: len,
                actual: written,
            });
        }
        Ok(())
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        let len = decode_len(state)?;
        let frame_end = state
            .start
            .checked_add(len)
            .filter(|end| *end <= state.end)
            .ok_or(CodecError::UnexpectedEnd)?;
        let outer_end = state.end;
        state.end = frame_end;
        let decoded = self.0.decode(state);
        state.end = outer_end;
        let value = decoded?;
        state.start = frame_end;
        Ok(value)
    }
}

/// Count-prefixed sequence of values of one codec.
pub struct Array<'a>(pub &'a dyn Codec);

impl Codec for Array<'_> {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let items = value.as_array()?;
        preencode_uint(state, items.len() as u64);
        for item in items {
            self.0.preencode(state, item)?;
        }
        Ok(())
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let items = value.as_array()?;
        encode_uint(state, items.len() as u64)?;
        for item in items {
            self.0.encode(state, item)?;
        }
        Ok(())
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        let len = decode_len(state)?;
        let available = state.remaining();
        let mut items = Vec::with_capacity(len.min(available));
        for _ in 0..len {
            let before = state.start;
            items.push(self.0.decode(state)?);
            // Zero-width elements are bounded by the input like any others.
            if state.start == before && len > available {
                return Err(CodecError::UnexpectedEnd);
            }
        }
        Ok(Value::Array(items))
    }
}

/// Enum codec: `offset + index` as an unsigned integer, or the key itself for
/// string-valued enums. Decodes to the key.
pub struct EnumCodec<'a, K> {
    pub fqn: &'a str,
    pub keys: &'a [K],
    pub offset: u64,
    pub strings: bool,
}

impl<K: AsRef<str>> EnumCodec<'_, K> {
    fn unknown(&self, value: impl ToString) -> CodecError {
        CodecError::UnknownEnumValue {
            fqn: self.fqn.to_string(),
            value: value.to_string(),
        }
    }

    fn position(&self, key: &str) -> Result<usize, CodecError> {
        self.keys
            .iter()
            .position(|k| k.as_ref() == key)
            .ok_or_else(|| self.unknown(key))
    }

    /// Wire representation of `value`
    fn wire(&self, value: &Value) -> Result<Value, CodecError> {
        if self.strings {
            let key = value.as_str()?;
            self.position(key)?;
            return Ok(Value::String(key.to_string()));
        }
        let n = match value {
            Value::String(key) => self.offset + self.position(key)? as u64,
            other => {
                let n = other.as_u64()?;
                if n < self.offset || n - self.offset >= self.keys.len() as u64 {
                    return Err(self.unknown(n));
                }
                n
            }
        };
        Ok(Value::Uint(n))
    }
}

impl<K: AsRef<str> + Sync> Codec for EnumCodec<'_, K> {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let wire = self.wire(value)?;
        if self.strings {
            crate::Primitive::String.preencode(state, &wire)
        } else {
            crate::Primitive::Uint.preencode(state, &wire)
        }
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let wire = self.wire(value)?;
        if self.strings {
            crate::Primitive::String.encode(state, &wire)
        } else {
            crate::Primitive::Uint.encode(state, &wire)
        }
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        if self.strings {
            let key = crate::Primitive::String.decode(state)?;
            self.position(key.as_str()?)?;
            return Ok(key);
        }
        let n = decode_uint(state)?;
        n.checked_sub(self.offset)
            .and_then(|i| self.keys.get(i as usize))
            .map(|k| Value::String(k.as_ref().to_string()))
            .ok_or_else(|| self.unknown(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Primitive;

    #[test]
    fn test_frame_prefixes_length() {
        let bytes = encode(&Frame(&Primitive::String), &Value::from("hi")).unwrap();
        assert_eq!(bytes, vec![3, 2, b'h', b'i']);
        assert_eq!(decode(&Frame(&Primitive::String), &bytes).unwrap(), Value::from("hi"));
    }

    #[test]
    fn test_nested_frames() {
        let codec = Frame(&Frame(&Primitive::String));
        let bytes = encode(&codec, &Value::from("hi")).unwrap();
        assert_eq!(bytes, vec![4, 3, 2, b'h', b'i']);
        assert_eq!(decode(&codec, &bytes).unwrap(), Value::from("hi"));

        // encode without a preencode pass measures the payload itself
        let mut state = State::new();
        state.end = bytes.len();
        state.alloc();
        codec.encode(&mut state, &Value::from("hi")).unwrap();
        assert_eq!(state.into_bytes(), bytes);
    }

    #[test]
    fn test_frame_skips_unread_bytes() {
        // A frame holding a uint followed by bytes a newer producer appended.
        let bytes = [3, 7, 0xaa, 0xbb, 9];
        let mut state = State::from_bytes(&bytes);
        assert_eq!(Frame(&Primitive::Uint).decode(&mut state).unwrap(), Value::Uint(7));
        assert_eq!(Primitive::Uint.decode(&mut state).unwrap(), Value::Uint(9));
    }

    #[test]
    fn test_frame_longer_than_input() {
        assert!(matches!(
            decode(&Frame(&Primitive::Uint), &[5, 1]),
            Err(CodecError::UnexpectedEnd)
        ));
    }

    #[test]
    fn test_frame_length_overflow() {
        let mut bytes = vec![0xff];
        bytes.extend_from_slice(&(u64::MAX - 3).to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            decode(&Frame(&Primitive::Uint), &bytes),
            Err(CodecError::UnexpectedEnd)
        ));
    }

    #[test]
    fn test_array_count_bounded_for_empty_elements() {
        let codec = Array(&Primitive::None);
        let mut bytes = vec![0xff];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode(&codec, &bytes), Err(CodecError::UnexpectedEnd)));
        // a count the input could hold still decodes
        assert_eq!(
            decode(&codec, &[2, 0, 0]).unwrap(),
            Value::Array(vec![Value::Null, Value::Null])
        );
    }

    #[test]
    fn test_array_of_framed_elements() {
        let codec = Array(&Frame(&Primitive::Uint));
        let value = Value::Array(vec![Value::Uint(1), Value::Uint(300)]);
        let bytes = encode(&codec, &value).unwrap();
        assert_eq!(bytes, vec![2, 1, 1, 3, 0xfd, 0x2c, 0x01]);
        assert_eq!(decode(&codec, &bytes).unwrap(), value);
    }

    #[test]
    fn test_enum_offsets_and_keys() {
        let keys = ["x", "y", "z"];
        let codec = EnumCodec {
            fqn: "@t/e",
            keys: &keys,
            offset: 1,
            strings: false,
        };
        assert_eq!(encode(&codec, &Value::from("x")).unwrap(), vec![1]);
        assert_eq!(encode(&codec, &Value::from("z")).unwrap(), vec![3]);
        assert_eq!(encode(&codec, &Value::Uint(2)).unwrap(), vec![2]);
        assert_eq!(decode(&codec, &[2]).unwrap(), Value::from("y"));
        assert!(matches!(decode(&codec, &[0]), Err(CodecError::UnknownEnumValue { .. })));
        assert!(matches!(decode(&codec, &[4]), Err(CodecError::UnknownEnumValue { .. })));
        assert!(encode(&codec, &Value::from("w")).is_err());
    }

    #[test]
    fn test_string_enum() {
        let keys = ["on", "off"];
        let codec = EnumCodec {
            fqn: "@t/s",
            keys: &keys,
            offset: 1,
            strings: true,
        };
        let bytes = encode(&codec, &Value::from("off")).unwrap();
        assert_eq!(bytes, vec![3, b'o', b'f', b'f']);
        assert_eq!(decode(&codec, &bytes).unwrap(), Value::from("off"));
        let unknown = encode(&Primitive::String, &Value::from("dim")).unwrap();
        assert!(decode(&codec, &unknown).is_err());
    }
}
