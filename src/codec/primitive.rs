//! Wire formats of the primitive catalog
//!
//! Variable-length unsigned integers use the compact layout: values up to
//! `0xfc` take one byte, larger values are prefixed by `0xfd`, `0xfe` or `0xff`
//! followed by a little-endian u16, u32 or u64. Signed kinds are zigzag mapped
//! onto the unsigned ones. Strings and buffers are length-prefixed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use super::{Codec, State};
use crate::error::CodecError;
use crate::primitive::Primitive;
use crate::value::Value;

pub fn uint_len(n: u64) -> usize {
    if n <= 0xfc {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

pub fn preencode_uint(state: &mut State, n: u64) {
    state.reserve(uint_len(n));
}

pub fn encode_uint(state: &mut State, n: u64) -> Result<(), CodecError> {
    if n <= 0xfc {
        state.write_u8(n as u8)
    } else if n <= 0xffff {
        state.write_u8(0xfd)?;
        state.write(&(n as u16).to_le_bytes())
    } else if n <= 0xffff_ffff {
        state.write_u8(0xfe)?;
        state.write(&(n as u32).to_le_bytes())
    } else {
        state.write_u8(0xff)?;
        state.write(&n.to_le_bytes())
    }
}

pub fn decode_uint(state: &mut State) -> Result<u64, CodecError> {
    match state.read_u8()? {
        0xfd => decode_fixed(state, 2),
        0xfe => decode_fixed(state, 4),
        0xff => decode_fixed(state, 8),
        n => Ok(u64::from(n)),
    }
}

/// Reads a length or count prefix. A prefix that cannot index memory cannot
/// be satisfied by the input either.
pub fn decode_len(state: &mut State) -> Result<usize, CodecError> {
    usize::try_from(decode_uint(state)?).map_err(|_| CodecError::UnexpectedEnd)
}

fn encode_fixed(state: &mut State, n: u64, width: usize) -> Result<(), CodecError> {
    state.write(&n.to_le_bytes()[..width])
}

fn decode_fixed(state: &mut State, width: usize) -> Result<u64, CodecError> {
    let bytes = state.read(width)?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(le))
}

fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag(z: u64) -> i64 {
    ((z >> 1) as i64) ^ -((z & 1) as i64)
}

fn zigzag128(n: i128) -> u128 {
    ((n << 1) ^ (n >> 127)) as u128
}

fn unzigzag128(z: u128) -> i128 {
    ((z >> 1) as i128) ^ -((z & 1) as i128)
}

fn encode_fixed_int(
    state: &mut State,
    p: Primitive,
    value: &Value,
    width: usize,
) -> Result<(), CodecError> {
    let n = match p.category() {
        crate::primitive::Category::Signed => zigzag(value.as_i64()?),
        _ => value.as_u64()?,
    };
    encode_fixed(state, check_bits(p, n, width as u32 * 8)?, width)
}

fn decode_fixed_int(state: &mut State, p: Primitive, width: usize) -> Result<Value, CodecError> {
    let n = decode_fixed(state, width)?;
    Ok(match p.category() {
        crate::primitive::Category::Signed => Value::Int(unzigzag(n)),
        _ => Value::Uint(n),
    })
}

fn check_bits(p: Primitive, n: u64, bits: u32) -> Result<u64, CodecError> {
    if bits < 64 && n >> bits != 0 {
        return Err(CodecError::OutOfRange {
            kind: p.name(),
            value: n.to_string(),
        });
    }
    Ok(n)
}

// Order-preserving integers: one byte below 251, otherwise a marker byte
// followed by the big-endian value.

fn lexint_len(n: u64) -> usize {
    if n < 251 {
        1
    } else if n < 0x100 {
        2
    } else if n < 0x1_0000 {
        3
    } else if n < 0x100_0000 {
        4
    } else if n < 0x1_0000_0000 {
        5
    } else {
        9
    }
}

fn encode_lexint(state: &mut State, n: u64) -> Result<(), CodecError> {
    let len = lexint_len(n);
    if len == 1 {
        return state.write_u8(n as u8);
    }
    let marker = match len {
        2 => 251,
        3 => 252,
        4 => 253,
        5 => 254,
        _ => 255,
    };
    state.write_u8(marker)?;
    let be = n.to_be_bytes();
    state.write(&be[8 - (len - 1)..])
}

fn decode_lexint(state: &mut State) -> Result<u64, CodecError> {
    let width = match state.read_u8()? {
        n if n < 251 => return Ok(u64::from(n)),
        251 => 1,
        252 => 2,
        253 => 3,
        254 => 4,
        _ => 8,
    };
    let bytes = state.read(width)?;
    let mut be = [0u8; 8];
    be[8 - width..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(be))
}

fn flip_sign(n: i64) -> u64 {
    (n as u64) ^ (1 << 63)
}

fn unflip_sign(n: u64) -> i64 {
    (n ^ (1 << 63)) as i64
}

fn preencode_bytes(state: &mut State, len: usize) {
    preencode_uint(state, len as u64);
    state.reserve(len);
}

fn encode_bytes(state: &mut State, bytes: &[u8]) -> Result<(), CodecError> {
    encode_uint(state, bytes.len() as u64)?;
    state.write(bytes)
}

fn decode_bytes(state: &mut State) -> Result<Vec<u8>, CodecError> {
    let len = decode_len(state)?;
    Ok(state.read(len)?.to_vec())
}

fn decode_string(state: &mut State) -> Result<String, CodecError> {
    String::from_utf8(decode_bytes(state)?).map_err(|_| CodecError::InvalidUtf8)
}

fn hex_to_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    let invalid = || CodecError::InvalidValue {
        expected: "hex string",
        found: s.to_string(),
    };
    if s.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2).ok_or_else(invalid)?, 16).map_err(|_| invalid()))
        .collect()
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn bigint_words(n: i128) -> Vec<u64> {
    let mut z = zigzag128(n);
    let mut words = Vec::new();
    while z != 0 {
        words.push(z as u64);
        z >>= 64;
    }
    words
}

fn parse_ip(p: Primitive, value: &Value) -> Result<IpAddr, CodecError> {
    let s = value.as_str()?;
    s.parse().map_err(|_| CodecError::InvalidValue {
        expected: p.name(),
        found: s.to_string(),
    })
}

fn parse_socket(p: Primitive, value: &Value) -> Result<SocketAddr, CodecError> {
    let s = value.as_str()?;
    s.parse().map_err(|_| CodecError::InvalidValue {
        expected: p.name(),
        found: s.to_string(),
    })
}

fn wrong_family(p: Primitive, ip: IpAddr) -> CodecError {
    CodecError::InvalidValue {
        expected: p.name(),
        found: ip.to_string(),
    }
}

fn ip_octets(p: Primitive, ip: IpAddr) -> Result<Vec<u8>, CodecError> {
    match (p, ip) {
        (Primitive::Ipv4 | Primitive::Ipv4Address, IpAddr::V4(v4)) => Ok(v4.octets().to_vec()),
        (Primitive::Ipv6 | Primitive::Ipv6Address, IpAddr::V6(v6)) => Ok(v6.octets().to_vec()),
        (Primitive::Ip | Primitive::IpAddress, IpAddr::V4(v4)) => {
            let mut out = vec![4];
            out.extend_from_slice(&v4.octets());
            Ok(out)
        }
        (Primitive::Ip | Primitive::IpAddress, IpAddr::V6(v6)) => {
            let mut out = vec![6];
            out.extend_from_slice(&v6.octets());
            Ok(out)
        }
        _ => Err(wrong_family(p, ip)),
    }
}

fn decode_ip(p: Primitive, state: &mut State) -> Result<IpAddr, CodecError> {
    let family = match p {
        Primitive::Ipv4 | Primitive::Ipv4Address => 4,
        Primitive::Ipv6 | Primitive::Ipv6Address => 6,
        _ => state.read_u8()?,
    };
    match family {
        4 => {
            let b = state.read(4)?;
            Ok(IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3])))
        }
        6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(state.read(16)?);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(CodecError::InvalidValue {
            expected: "ip family 4 or 6",
            found: other.to_string(),
        }),
    }
}

fn fixed_buffer<'a>(p: Primitive, value: &'a Value, len: usize) -> Result<&'a [u8], CodecError> {
    let bytes = value.as_bytes()?;
    if bytes.len() != len {
        return Err(CodecError::OutOfRange {
            kind: p.name(),
            value: format!("{} bytes", bytes.len()),
        });
    }
    Ok(bytes)
}

impl Codec for Primitive {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        use Primitive as P;
        let p = *self;
        match p {
            P::Uint => preencode_uint(state, value.as_u64()?),
            P::Uint8 | P::Int8 => state.reserve(1),
            P::Uint16 | P::Int16 | P::Port => state.reserve(2),
            P::Uint24 | P::Int24 => state.reserve(3),
            P::Uint32 | P::Int32 => state.reserve(4),
            P::Uint40 | P::Int40 => state.reserve(5),
            P::Uint48 | P::Int48 => state.reserve(6),
            P::Uint56 | P::Int56 => state.reserve(7),
            P::Uint64 | P::Int64 => state.reserve(8),
            P::Uint1 | P::Uint2 | P::Uint3 | P::Uint4 | P::Uint5 | P::Uint6 | P::Uint7 => {
                state.reserve(1)
            }
            P::Int | P::Date => preencode_uint(state, zigzag(value.as_i64()?)),
            P::Float32 => state.reserve(4),
            P::Float64 => state.reserve(8),
            P::Lexint => state.reserve(lexint_len(value.as_u64()?)),
            P::SignedLexint | P::Lexdate => state.reserve(lexint_len(flip_sign(value.as_i64()?))),
            P::String | P::Utf8 | P::Ascii => preencode_bytes(state, value.as_str()?.len()),
            P::Hex => preencode_bytes(state, value.as_str()?.len() / 2),
            P::Bigint => {
                let words = bigint_words(value.as_i128()?);
                preencode_uint(state, words.len() as u64);
                state.reserve(words.len() * 8);
            }
            P::Biguint64 | P::Bigint64 => state.reserve(8),
            P::Fixed32 => state.reserve(32),
            P::Fixed64 => state.reserve(64),
            P::Buffer => match value {
                Value::Null => preencode_uint(state, 0),
                other => preencode_bytes(state, other.as_bytes()?.len()),
            },
            P::Bool => state.reserve(1),
            P::Ip | P::Ipv4 | P::Ipv6 => {
                state.reserve(ip_octets(p, parse_ip(p, value)?)?.len())
            }
            P::IpAddress | P::Ipv4Address | P::Ipv6Address => {
                let addr = parse_socket(p, value)?;
                state.reserve(ip_octets(p, addr.ip())?.len() + 2)
            }
            P::None => {}
            P::Raw => state.reserve(value.as_bytes()?.len()),
            P::Json => preencode_bytes(state, serde_json::to_string(&value.to_json())?.len()),
        }
        Ok(())
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        use Primitive as P;
        let p = *self;
        match p {
            P::Uint => encode_uint(state, value.as_u64()?),
            P::Uint8 | P::Int8 => encode_fixed_int(state, p, value, 1),
            P::Uint16 | P::Int16 | P::Port => encode_fixed_int(state, p, value, 2),
            P::Uint24 | P::Int24 => encode_fixed_int(state, p, value, 3),
            P::Uint32 | P::Int32 => encode_fixed_int(state, p, value, 4),
            P::Uint40 | P::Int40 => encode_fixed_int(state, p, value, 5),
            P::Uint48 | P::Int48 => encode_fixed_int(state, p, value, 6),
            P::Uint56 | P::Int56 => encode_fixed_int(state, p, value, 7),
            P::Uint64 | P::Int64 => encode_fixed_int(state, p, value, 8),
            P::Uint1 | P::Uint2 | P::Uint3 | P::Uint4 | P::Uint5 | P::Uint6 | P::Uint7 => {
                let n = check_bits(p, value.as_u64()?, p.bitwise_size())?;
                state.write_u8(n as u8)
            }
            P::Int | P::Date => encode_uint(state, zigzag(value.as_i64()?)),
            P::Float32 => state.write(&(value.as_f64()? as f32).to_le_bytes()),
            P::Float64 => state.write(&value.as_f64()?.to_le_bytes()),
            P::Lexint => encode_lexint(state, value.as_u64()?),
            P::SignedLexint | P::Lexdate => encode_lexint(state, flip_sign(value.as_i64()?)),
            P::String | P::Utf8 => encode_bytes(state, value.as_str()?.as_bytes()),
            P::Ascii => {
                let s = value.as_str()?;
                if !s.is_ascii() {
                    return Err(CodecError::InvalidValue {
                        expected: "ascii string",
                        found: s.to_string(),
                    });
                }
                encode_bytes(state, s.as_bytes())
            }
            P::Hex => encode_bytes(state, &hex_to_bytes(value.as_str()?)?),
            P::Bigint => {
                let words = bigint_words(value.as_i128()?);
                encode_uint(state, words.len() as u64)?;
                for word in words {
                    state.write(&word.to_le_bytes())?;
                }
                Ok(())
            }
            P::Biguint64 => {
                let n = value.as_i128()?;
                let n = u64::try_from(n).map_err(|_| CodecError::OutOfRange {
                    kind: p.name(),
                    value: n.to_string(),
                })?;
                state.write(&n.to_le_bytes())
            }
            P::Bigint64 => {
                let n = value.as_i128()?;
                let n = i64::try_from(n).map_err(|_| CodecError::OutOfRange {
                    kind: p.name(),
                    value: n.to_string(),
                })?;
                state.write(&zigzag(n).to_le_bytes())
            }
            P::Fixed32 => state.write(fixed_buffer(p, value, 32)?),
            P::Fixed64 => state.write(fixed_buffer(p, value, 64)?),
            P::Buffer => match value {
                Value::Null => encode_uint(state, 0),
                other => encode_bytes(state, other.as_bytes()?),
            },
            P::Bool => state.write_u8(u8::from(value.as_bool()?)),
            P::Ip | P::Ipv4 | P::Ipv6 => state.write(&ip_octets(p, parse_ip(p, value)?)?),
            P::IpAddress | P::Ipv4Address | P::Ipv6Address => {
                let addr = parse_socket(p, value)?;
                state.write(&ip_octets(p, addr.ip())?)?;
                state.write(&addr.port().to_le_bytes())
            }
            P::None => Ok(()),
            P::Raw => state.write(value.as_bytes()?),
            P::Json => encode_bytes(state, serde_json::to_string(&value.to_json())?.as_bytes()),
        }
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        use Primitive as P;
        let p = *self;
        Ok(match p {
            P::Uint => Value::Uint(decode_uint(state)?),
            P::Uint8 | P::Int8 => decode_fixed_int(state, p, 1)?,
            P::Uint16 | P::Int16 | P::Port => decode_fixed_int(state, p, 2)?,
            P::Uint24 | P::Int24 => decode_fixed_int(state, p, 3)?,
            P::Uint32 | P::Int32 => decode_fixed_int(state, p, 4)?,
            P::Uint40 | P::Int40 => decode_fixed_int(state, p, 5)?,
            P::Uint48 | P::Int48 => decode_fixed_int(state, p, 6)?,
            P::Uint56 | P::Int56 => decode_fixed_int(state, p, 7)?,
            P::Uint64 | P::Int64 => decode_fixed_int(state, p, 8)?,
            P::Uint1 | P::Uint2 | P::Uint3 | P::Uint4 | P::Uint5 | P::Uint6 | P::Uint7 => {
                Value::Uint(check_bits(p, u64::from(state.read_u8()?), p.bitwise_size())?)
            }
            P::Int | P::Date => Value::Int(unzigzag(decode_uint(state)?)),
            P::Float32 => {
                let mut le = [0u8; 4];
                le.copy_from_slice(state.read(4)?);
                Value::Float(f64::from(f32::from_le_bytes(le)))
            }
            P::Float64 => {
                let mut le = [0u8; 8];
                le.copy_from_slice(state.read(8)?);
                Value::Float(f64::from_le_bytes(le))
            }
            P::Lexint => Value::Uint(decode_lexint(state)?),
            P::SignedLexint | P::Lexdate => Value::Int(unflip_sign(decode_lexint(state)?)),
            P::String | P::Utf8 => Value::String(decode_string(state)?),
            P::Ascii => {
                let s = decode_string(state)?;
                if !s.is_ascii() {
                    return Err(CodecError::InvalidUtf8);
                }
                Value::String(s)
            }
            P::Hex => Value::String(bytes_to_hex(&decode_bytes(state)?)),
            P::Bigint => {
                let count = decode_uint(state)? as usize;
                if count > 2 {
                    return Err(CodecError::OutOfRange {
                        kind: p.name(),
                        value: format!("{} words", count),
                    });
                }
                let mut z: u128 = 0;
                for i in 0..count {
                    z |= u128::from(decode_fixed(state, 8)?) << (64 * i);
                }
                Value::BigInt(unzigzag128(z))
            }
            P::Biguint64 => Value::BigInt(i128::from(decode_fixed(state, 8)?)),
            P::Bigint64 => Value::BigInt(i128::from(unzigzag(decode_fixed(state, 8)?))),
            P::Fixed32 => Value::Bytes(state.read(32)?.to_vec()),
            P::Fixed64 => Value::Bytes(state.read(64)?.to_vec()),
            P::Buffer => {
                let bytes = decode_bytes(state)?;
                if bytes.is_empty() {
                    Value::Null
                } else {
                    Value::Bytes(bytes)
                }
            }
            P::Bool => Value::Bool(state.read_u8()? != 0),
            P::Ip | P::Ipv4 | P::Ipv6 => Value::String(decode_ip(p, state)?.to_string()),
            P::IpAddress | P::Ipv4Address | P::Ipv6Address => {
                let ip = decode_ip(p, state)?;
                let port = decode_fixed(state, 2)? as u16;
                Value::String(SocketAddr::new(ip, port).to_string())
            }
            P::None => Value::Null,
            P::Raw => {
                let rest = state.remaining();
                Value::Bytes(state.read(rest)?.to_vec())
            }
            P::Json => Value::Json(serde_json::from_str(&decode_string(state)?)?),
        })
    }
}
