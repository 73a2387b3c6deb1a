//! Codecs driven by a live schema

use tracing::trace;

use super::primitive::{decode_uint, encode_uint, preencode_uint};
use super::structs::{get, StructLayout};
use super::{Array, Codec, EnumCodec, Frame, State};
use crate::error::CodecError;
use crate::schema::Schema;
use crate::types::{ResolvedType, Struct, TypeRef, VersionedType};
use crate::value::Value;

/// Codec for one type of a built [`Schema`].
#[derive(Clone, Copy)]
pub struct TypeCodec<'a> {
    schema: &'a Schema,
    target: TypeRef,
}

impl<'a> TypeCodec<'a> {
    pub fn new(schema: &'a Schema, target: TypeRef) -> Self {
        Self { schema, target }
    }

    pub fn target(&self) -> TypeRef {
        self.target
    }

    fn at(self, target: TypeRef) -> TypeCodec<'a> {
        TypeCodec { target, ..self }
    }

    fn resolved(&self) -> &'a ResolvedType {
        self.schema.get(self.target)
    }
}

/// Runs `f` with the codec of a struct field or array element: framed when
/// `framed`, and wrapped in an array when `array`.
fn with_member_codec<R>(
    codec: TypeCodec<'_>,
    framed: bool,
    array: bool,
    f: impl FnOnce(&dyn Codec) -> R,
) -> R {
    let frame = Frame(&codec);
    let element: &dyn Codec = if framed { &frame } else { &codec };
    if array {
        f(&Array(element))
    } else {
        f(element)
    }
}

impl Codec for TypeCodec<'_> {
    fn preencode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        match self.resolved() {
            ResolvedType::Primitive(p) => p.preencode(state, value),
            ResolvedType::Alias(a) => self.at(a.target).preencode(state, value),
            ResolvedType::Enum(e) => enum_codec(e).preencode(state, value),
            ResolvedType::Struct(s) => self.preencode_struct(s, state, value),
            ResolvedType::Array(a) => {
                let element = self.at(a.element);
                with_member_codec(element, self.schema.is_frameable(a.element), true, |c| {
                    c.preencode(state, value)
                })
            }
            ResolvedType::Versioned(v) => self.preencode_versioned(v, state, value),
            ResolvedType::External(x) => self.schema.external(&x.id.fqn)?.preencode(state, value),
        }
    }

    fn encode(&self, state: &mut State, value: &Value) -> Result<(), CodecError> {
        match self.resolved() {
            ResolvedType::Primitive(p) => p.encode(state, value),
            ResolvedType::Alias(a) => self.at(a.target).encode(state, value),
            ResolvedType::Enum(e) => enum_codec(e).encode(state, value),
            ResolvedType::Struct(s) => self.encode_struct(s, state, value),
            ResolvedType::Array(a) => {
                let element = self.at(a.element);
                with_member_codec(element, self.schema.is_frameable(a.element), true, |c| {
                    c.encode(state, value)
                })
            }
            ResolvedType::Versioned(v) => self.encode_versioned(v, state, value),
            ResolvedType::External(x) => self.schema.external(&x.id.fqn)?.encode(state, value),
        }
    }

    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {
        match self.resolved() {
            ResolvedType::Primitive(p) => p.decode(state),
            ResolvedType::Alias(a) => self.at(a.target).decode(state),
            ResolvedType::Enum(e) => enum_codec(e).decode(state),
            ResolvedType::Struct(s) => self.decode_struct(s, state),
            ResolvedType::Array(a) => {
                let element = self.at(a.element);
                with_member_codec(element, self.schema.is_frameable(a.element), true, |c| {
                    c.decode(state)
                })
            }
            ResolvedType::Versioned(v) => self.decode_versioned(v, state),
            ResolvedType::External(x) => self.schema.external(&x.id.fqn)?.decode(state),
        }
    }
}

fn enum_codec(e: &crate::types::Enum) -> EnumCodec<'_, crate::types::EnumValue> {
    EnumCodec {
        fqn: &e.id.fqn,
        keys: &e.values,
        offset: e.offset,
        strings: e.strings,
    }
}

impl<'a> TypeCodec<'a> {
    fn layout(&self, s: &'a Struct) -> &'a StructLayout {
        s.layout.get_or_init(|| StructLayout::derive(s, self.schema))
    }

    fn preencode_struct(&self, s: &'a Struct, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let layout = self.layout(s);
        let fields = value.as_fields()?;
        layout.check_required(fields)?;
        let flags = layout.flags(fields);
        for (i, step) in layout.steps.iter().enumerate() {
            if layout.flags_position == Some(i) {
                preencode_uint(state, flags);
            }
            if StructLayout::is_written(step, flags) {
                with_member_codec(self.at(step.target), step.framed, step.array, |c| {
                    c.preencode(state, get(fields, &step.name))
                })?;
            }
        }
        if layout.flags_position == Some(layout.steps.len()) {
            preencode_uint(state, flags);
        }
        Ok(())
    }

    fn encode_struct(&self, s: &'a Struct, state: &mut State, value: &Value) -> Result<(), CodecError> {
        let layout = self.layout(s);
        let fields = value.as_fields()?;
        layout.check_required(fields)?;
        let flags = layout.flags(fields);
        for (i, step) in layout.steps.iter().enumerate() {
            if layout.flags_position == Some(i) {
                encode_uint(state, flags)?;
            }
            if StructLayout::is_written(step, flags) {
                with_member_codec(self.at(step.target), step.framed, step.array, |c| {
                    c.encode(state, get(fields, &step.name))
                })?;
            }
        }
        if layout.flags_position == Some(layout.steps.len()) {
            encode_uint(state, flags)?;
        }
        Ok(())
    }

    fn decode_struct(&self, s: &'a Struct, state: &mut State) -> Result<Value, CodecError> {
        let layout = self.layout(s);
        let mut fields = layout.defaults();
        let mut flags = 0;
        for (i, step) in layout.steps.iter().enumerate() {
            if layout.flags_position == Some(i) {
                if state.is_exhausted() {
                    trace!(fqn = %layout.fqn, field = %step.name, "input ends at flags");
                    return Ok(Value::Struct(fields));
                }
                flags = decode_uint(state)?;
            }
            if step.flag_only {
                fields.insert(step.name.clone(), Value::Bool(flags & step.flag != 0));
            } else if StructLayout::is_written(step, flags) {
                let value = with_member_codec(
                    self.at(step.target),
                    step.framed,
                    step.array,
                    |c| c.decode(state),
                )?;
                fields.insert(step.name.clone(), value);
            }
        }
        if layout.flags_position == Some(layout.steps.len()) && !state.is_exhausted() {
            decode_uint(state)?;
        }
        Ok(Value::Struct(fields))
    }

    fn preencode_versioned(
        &self,
        v: &'a VersionedType,
        state: &mut State,
        value: &Value,
    ) -> Result<(), CodecError> {
        let latest = v
            .latest()
            .ok_or_else(|| CodecError::UnknownType(v.id.fqn.clone()))?;
        preencode_uint(state, latest.version);
        self.at(latest.target).preencode(state, value)
    }

    fn encode_versioned(
        &self,
        v: &'a VersionedType,
        state: &mut State,
        value: &Value,
    ) -> Result<(), CodecError> {
        let latest = v
            .latest()
            .ok_or_else(|| CodecError::UnknownType(v.id.fqn.clone()))?;
        encode_uint(state, latest.version)?;
        self.at(latest.target).encode(state, value)
    }

    fn decode_versioned(&self, v: &'a VersionedType, state: &mut State) -> Result<Value, CodecError> {
        let version = decode_uint(state)?;
        let entry = v.entry(version).ok_or_else(|| CodecError::UnknownVersion {
            fqn: v.id.fqn.clone(),
            version,
        })?;
        let value = self.at(entry.target).decode(state)?;
        match &entry.map {
            Some(map) => {
                trace!(fqn = %v.id.fqn, version, map = %map, "migrating");
                Ok(self.schema.migration(map)?(value))
            }
            None => Ok(value),
        }
    }
}
