//! Struct layout and the field helpers shared with generated code
//!
//! A struct is written field by field in declaration order. Optional fields
//! that are absent are skipped, and their presence is carried by one flags
//! integer written just before the field at the flags position. Bool fields
//! never reach the wire; their value is their bit in the flags.

use tracing::trace;

use crate::error::CodecError;
use crate::schema::Schema;
use crate::types::{Struct, TypeRef};
use crate::value::{Fields, Value};

static NULL: Value = Value::Null;

/// The value as a struct's field map.
pub fn struct_fields(value: &Value) -> Result<&Fields, CodecError> {
    value.as_fields()
}

/// Field `name`, or null when it is absent.
pub fn get<'a>(fields: &'a Fields, name: &str) -> &'a Value {
    fields.get(name).unwrap_or(&NULL)
}

/// Fails unless field `name` is present.
pub fn require(fields: &Fields, type_name: &str, name: &str) -> Result<(), CodecError> {
    if get(fields, name).is_present() {
        Ok(())
    } else {
        Err(CodecError::MissingRequiredField {
            type_name: type_name.to_string(),
            field: name.to_string(),
        })
    }
}

/// `bit` when the optional field `name` is set. A bool field is set when it
/// is true; any other field when it is present.
pub fn field_flag(fields: &Fields, name: &str, bit: u64, is_bool: bool) -> u64 {
    let value = get(fields, name);
    let set = if is_bool {
        value.is_truthy()
    } else {
        value.is_present()
    };
    if set {
        bit
    } else {
        0
    }
}

/// How one field is read and written.
#[derive(Debug, Clone)]
pub struct FieldStep {
    pub name: String,
    pub target: TypeRef,
    /// Bit in the flags, 0 when required
    pub flag: u64,
    pub optional: bool,
    /// Carried only by its flag bit
    pub flag_only: bool,
    pub array: bool,
    /// Payload (each element for arrays) is length-prefixed
    pub framed: bool,
    /// Decoded value when the field is not on the wire
    pub default: Value,
}

/// Per-struct encoding plan, derived once from the resolved struct.
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub fqn: String,
    pub steps: Vec<FieldStep>,
    /// Index of the step the flags precede, `steps.len()` for after the last
    pub flags_position: Option<usize>,
}

impl StructLayout {
    pub fn derive(s: &Struct, schema: &Schema) -> Self {
        let steps: Vec<FieldStep> = s
            .fields
            .iter()
            .map(|f| {
                let flag_only = !f.array && schema.is_bool(f.target);
                FieldStep {
                    name: f.name.clone(),
                    target: f.target,
                    flag: f.flag,
                    optional: f.is_optional(),
                    flag_only,
                    array: f.array,
                    framed: schema.is_frameable(f.target),
                    default: if f.array {
                        Value::Null
                    } else {
                        schema.default_value(f.target)
                    },
                }
            })
            .collect();
        trace!(fqn = %s.id.fqn, fields = steps.len(), flags_position = ?s.flags_position, "struct layout");
        Self {
            fqn: s.id.fqn.clone(),
            steps,
            flags_position: s.flags_position,
        }
    }

    /// Flags integer for `fields`
    pub fn flags(&self, fields: &Fields) -> u64 {
        self.steps
            .iter()
            .filter(|s| s.optional)
            .fold(0, |acc, s| acc | field_flag(fields, &s.name, s.flag, s.flag_only))
    }

    /// Fails on the first required field that is absent.
    pub fn check_required(&self, fields: &Fields) -> Result<(), CodecError> {
        self.steps
            .iter()
            .filter(|s| !s.optional)
            .try_for_each(|s| require(fields, &self.fqn, &s.name))
    }

    /// Every field at its default
    pub fn defaults(&self) -> Fields {
        self.steps
            .iter()
            .map(|s| (s.name.clone(), s.default.clone()))
            .collect()
    }

    /// Whether step `step` is written, given `flags`
    pub fn is_written(step: &FieldStep, flags: u64) -> bool {
        !step.flag_only && (!step.optional || flags & step.flag != 0)
    }
}
