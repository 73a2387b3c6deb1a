//! Error types for schema construction and the compact codec

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Build-time errors. Every compatibility rule has its own variant so callers
/// can tell exactly which rule a declaration broke.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Type registered twice in one build: {0}")]
    DuplicateType(String),

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{fqn}: required '{what}' definition is missing")]
    MissingDefinition { fqn: String, what: &'static str },

    #[error("Cannot resolve type {type_name} in {referrer}")]
    UnresolvedType { type_name: String, referrer: String },

    #[error("Previous declaration of {fqn} was a {was}, not a {now}")]
    KindChanged {
        fqn: String,
        was: &'static str,
        now: &'static str,
    },

    #[error("Remapping an alias: {fqn} (was {was}, now {now})")]
    AliasRemapped { fqn: String, was: String, now: String },

    #[error("Shrinking an enum: {fqn} had {was} values, now {now}")]
    EnumShrunk { fqn: String, was: usize, now: usize },

    #[error("Renaming an enum value: {fqn}[{index}] was {was:?} but is now {now:?}")]
    EnumValueRenamed {
        fqn: String,
        index: usize,
        was: String,
        now: String,
    },

    #[error("Changing the encoding of an enum: {fqn}")]
    EnumRemapped { fqn: String },

    #[error("External type was remapped: {fqn} (was {was}, now {now})")]
    ExternalRemapped { fqn: String, was: String, now: String },

    #[error("A field was removed: {fqn}")]
    FieldRemoved { fqn: String },

    #[error("A compact struct was expanded: {fqn}")]
    CompactExpanded { fqn: String },

    #[error("Field was modified: {fqn}/{field}")]
    FieldModified { fqn: String, field: String },

    #[error("Required field must stay required (and optional must stay optional): {fqn}/{field}")]
    RequiredChanged { fqn: String, field: String },

    #[error("Array was modified: {fqn}")]
    ArrayModified { fqn: String },

    #[error("VersionedType was modified: {fqn}: {detail}")]
    VersionedModified { fqn: String, detail: String },

    #[error("Cannot change fields in a compact type: {fqn}/{field}")]
    CompactVersionDrift { fqn: String, field: String },

    #[error("Flags position of {fqn} moved from {was} to {now}")]
    FlagsPositionChanged { fqn: String, was: usize, now: usize },

    #[error("Invalid flags position {position} for {fqn}")]
    InvalidFlagsPosition { fqn: String, position: i64 },

    #[error("{fqn} has {count} optional fields, at most 64 fit in the flags")]
    TooManyOptionals { fqn: String, count: usize },

    #[error("Bool field {fqn}/{field} cannot be required, its value lives in the flags")]
    RequiredBool { fqn: String, field: String },

    #[error("Types form a cycle no finite value can satisfy: {}", members.join(" -> "))]
    InfiniteType { members: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while encoding or decoding values.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Missing required field {field} in {type_name}")]
    MissingRequiredField { type_name: String, field: String },

    #[error("Unexpected end of buffer")]
    UnexpectedEnd,

    #[error("Frame payload was {actual} bytes, {expected} were measured")]
    FrameMismatch { expected: usize, actual: usize },

    #[error("Value {value} out of range for {kind}")]
    OutOfRange { kind: &'static str, value: String },

    #[error("Expected {expected}, found {found}")]
    InvalidValue { expected: &'static str, found: String },

    #[error("Unknown value {value} for enum {fqn}")]
    UnknownEnumValue { fqn: String, value: String },

    #[error("Unknown version {version} for {fqn}")]
    UnknownVersion { fqn: String, version: u64 },

    #[error("No codec bound for external type {0}")]
    UnboundExternal(String),

    #[error("No migration bound named {0}")]
    UnboundMigration(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
