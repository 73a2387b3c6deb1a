//! Code Generation
//!
//! Generates a Rust module from a resolved schema.
//!
//! Architecture:
//! - CodegenContext: the schema plus its name table, immutable during emission
//! - Emitters: per-kind functions in [`rust`] that read only the context
//!
//! The output is a pure function of the schema and the [`CodegenConfig`]:
//! declarations are visited in declaration order and nothing depends on hash
//! iteration, so an unchanged schema regenerates byte for byte.
//!
//! Generated codecs are unit structs. An external symbol must therefore name
//! a unit struct (or a constant) implementing `Codec`.

pub mod names;
pub mod rust;

use std::fmt::Write;

use tracing::debug;

use crate::checksum::Checksum;
use crate::config::CodegenConfig;
use crate::schema::Schema;
use crate::types::ResolvedType;

pub use names::{to_pascal_case, NameTable};

// =============================================================================
// CodegenContext
// =============================================================================

/// Everything an emitter may look at
pub struct CodegenContext<'a> {
    pub schema: &'a Schema,
    pub names: NameTable,
}

impl<'a> CodegenContext<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            names: NameTable::build(schema),
        }
    }

    /// Declarations with the name of their generated codec
    pub fn declarations(&self) -> impl Iterator<Item = (&'a ResolvedType, &str)> {
        self.schema
            .types()
            .iter()
            .enumerate()
            .map(move |(id, t)| (t, self.names.get(id)))
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Generated module source for `schema`
pub fn generate(schema: &Schema, config: &CodegenConfig) -> String {
    let ctx = CodegenContext::new(schema);
    let mut out = String::new();

    emit_prelude(&mut out, &ctx, config);
    for (t, name) in ctx.declarations() {
        debug!(fqn = t.fqn(), name, "emitting codec");
        rust::emit_type(&mut out, &ctx, t, name);
    }
    emit_lookups(&mut out, &ctx, &config.runtime_path);

    out
}

/// Generated source with its SHA-256
pub fn generate_with_checksum(schema: &Schema, config: &CodegenConfig) -> (String, Checksum) {
    let code = generate(schema, config);
    let checksum = Checksum::from_str(&code);
    (code, checksum)
}

// =============================================================================
// Prelude & Lookups
// =============================================================================

fn emit_prelude(out: &mut String, ctx: &CodegenContext, config: &CodegenConfig) {
    out.push_str("//! Generated by hyperschema. Do not edit.\n");
    if let Some(header) = &config.header {
        out.push_str("//!\n");
        for line in header.lines() {
            let _ = writeln!(out, "//! {}", line);
        }
    }
    out.push('\n');
    out.push_str("#![allow(unused_imports, unused_variables, clippy::all)]\n\n");

    let rt = &config.runtime_path;
    let _ = writeln!(out, "use {}::{{", rt);
    out.push_str("    decode_flags, decode_uint, encode_uint, field_flag, get, preencode_uint, require,\n");
    out.push_str("    struct_fields, Array, Codec, CodecError, EnumCodec, Fields, Frame, Primitive, State,\n");
    out.push_str("    Value,\n");
    out.push_str("};\n\n");

    let _ = writeln!(out, "/// Schema version this module was generated from");
    let _ = writeln!(out, "pub const VERSION: u32 = {};\n", ctx.schema.version());
}

fn emit_lookups(out: &mut String, ctx: &CodegenContext, runtime_path: &str) {
    let codecs: Vec<(&ResolvedType, &str)> = ctx.declarations().collect();

    out.push_str("/// Codec of a declared type by fully-qualified name\n");
    out.push_str("pub fn resolve(fqn: &str) -> Option<&'static dyn Codec> {\n");
    out.push_str("    match fqn {\n");
    for (t, name) in &codecs {
        let _ = writeln!(out, "        {:?} => Some(&{}),", t.fqn(), name);
    }
    out.push_str("        _ => None,\n    }\n}\n\n");

    out.push_str("/// Codec of a struct by fully-qualified name\n");
    out.push_str("pub fn resolve_struct(fqn: &str) -> Option<&'static dyn Codec> {\n");
    out.push_str("    match fqn {\n");
    for (t, name) in codecs.iter().filter(|(t, _)| t.as_struct().is_some()) {
        let _ = writeln!(out, "        {:?} => Some(&{}),", t.fqn(), name);
    }
    out.push_str("        _ => None,\n    }\n}\n\n");

    out.push_str("/// `(key, encoded integer)` table of an integer-valued enum\n");
    out.push_str("pub fn get_enum(fqn: &str) -> Option<&'static [(&'static str, u64)]> {\n");
    out.push_str("    match fqn {\n");
    let enums = codecs
        .iter()
        .filter(|(t, _)| t.as_enum().is_some_and(|e| !e.strings));
    for (t, name) in enums {
        let _ = writeln!(out, "        {:?} => Some({}::VALUES),", t.fqn(), name);
    }
    out.push_str("        _ => None,\n    }\n}\n\n");

    out.push_str("pub fn encode(fqn: &str, value: &Value) -> Result<Vec<u8>, CodecError> {\n");
    out.push_str("    let codec = resolve(fqn).ok_or_else(|| CodecError::UnknownType(fqn.to_string()))?;\n");
    let _ = writeln!(out, "    {}::encode(codec, value)", runtime_path);
    out.push_str("}\n\n");

    out.push_str("pub fn decode(fqn: &str, bytes: &[u8]) -> Result<Value, CodecError> {\n");
    out.push_str("    let codec = resolve(fqn).ok_or_else(|| CodecError::UnknownType(fqn.to_string()))?;\n");
    let _ = writeln!(out, "    {}::decode(codec, bytes)", runtime_path);
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{FieldDescription, TypeDescription};
    use crate::Hyperschema;

    fn schema() -> Schema {
        let mut builder = Hyperschema::new();
        let mut ns = builder.namespace("geo").unwrap();
        ns.register(TypeDescription::enumeration("axis", ["x", "y"]))
            .unwrap();
        ns.register(TypeDescription::structure(
            "point",
            vec![
                FieldDescription::new("x", "int").required(),
                FieldDescription::new("label", "string"),
                FieldDescription::new("visible", "bool"),
            ],
        ))
        .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_prelude_and_version() {
        let config = CodegenConfig {
            header: Some("Geometry".to_string()),
            ..Default::default()
        };
        let code = generate(&schema(), &config);
        assert!(code.starts_with("//! Generated by hyperschema. Do not edit.\n//!\n//! Geometry\n"));
        assert!(code.contains("use hyperschema::runtime::{"));
        assert!(code.contains("pub const VERSION: u32 = 1;"));
    }

    #[test]
    fn test_struct_codec_is_unrolled() {
        let code = generate(&schema(), &CodegenConfig::default());
        assert!(code.contains("pub struct GeoPoint;"));
        assert!(code.contains("require(m, Self::FQN, \"x\")?;"));
        assert!(code.contains("field_flag(m, \"visible\", 2, true)"));
        assert!(code.contains("encode_uint(state, flags)?;"));
        assert!(code.contains("Value::Bool(flags & 2 != 0)"));
        assert!(code.contains("if flags & 1 != 0 {"));
    }

    #[test]
    fn test_lookup_tables() {
        let code = generate(&schema(), &CodegenConfig::default());
        assert!(code.contains("\"@geo/point\" => Some(&GeoPoint),"));
        assert!(code.contains("\"@geo/axis\" => Some(GeoAxis::VALUES),"));
        assert!(code.contains("pub const VALUES: &'static [(&'static str, u64)] = &[(\"x\", 1), (\"y\", 2)];"));
        let resolve_struct = code.split("pub fn resolve_struct").nth(1).unwrap();
        let resolve_struct = resolve_struct.split("pub fn get_enum").next().unwrap();
        assert!(!resolve_struct.contains("GeoAxis"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let config = CodegenConfig::default();
        let (a, sum_a) = generate_with_checksum(&schema(), &config);
        let (b, sum_b) = generate_with_checksum(&schema(), &config);
        assert_eq!(a, b);
        assert_eq!(sum_a, sum_b);
    }
}
