//! Rust Code Emitter
//!
//! One unit struct per declaration, implementing `Codec` with the struct
//! algorithm unrolled field by field. Emission reads only the resolved schema
//! and the name table, and visits declarations in declaration order.

use std::fmt::Write;

use crate::codec::StructLayout;
use crate::types::{
    Alias, ArrayType, Enum, ExternalType, Identity, ResolvedType, Struct, TypeRef, VersionedType,
};
use crate::value::Value;

use super::CodegenContext;

// =============================================================================
// Expressions
// =============================================================================

/// Codec expression for a bare type
fn type_expr(ctx: &CodegenContext, r: TypeRef) -> String {
    match r {
        TypeRef::Primitive(p) => format!("Primitive::{}", p.variant_name()),
        TypeRef::Declared(id) => ctx.names.get(id).to_string(),
    }
}

/// Codec expression for a struct field or array element
fn member_expr(ctx: &CodegenContext, r: TypeRef, framed: bool, array: bool) -> String {
    let mut expr = type_expr(ctx, r);
    if framed {
        expr = format!("Frame(&{})", expr);
    }
    if array {
        expr = format!("Array(&{})", expr);
    }
    expr
}

fn value_literal(value: &Value) -> String {
    match value {
        Value::Bool(b) => format!("Value::Bool({})", b),
        Value::Uint(n) => format!("Value::Uint({})", n),
        Value::Int(n) => format!("Value::Int({})", n),
        Value::Float(n) => format!("Value::Float({:?})", n),
        Value::BigInt(n) => format!("Value::BigInt({})", n),
        _ => "Value::Null".to_string(),
    }
}

fn lit(s: &str) -> String {
    format!("{:?}", s)
}

// =============================================================================
// Type Emission
// =============================================================================

pub fn emit_type(out: &mut String, ctx: &CodegenContext, t: &ResolvedType, name: &str) {
    match t {
        ResolvedType::Primitive(_) => {}
        ResolvedType::Alias(a) => emit_alias(out, ctx, a, name),
        ResolvedType::Enum(e) => emit_enum(out, e, name),
        ResolvedType::Struct(s) => emit_struct(out, ctx, s, name),
        ResolvedType::Array(a) => emit_array(out, ctx, a, name),
        ResolvedType::Versioned(v) => emit_versioned(out, ctx, v, name),
        ResolvedType::External(x) => emit_external(out, ctx, x, name),
    }
}

fn emit_header(out: &mut String, id: &Identity, name: &str) {
    let _ = writeln!(out, "/// `{}` (v{})", id.fqn, id.version);
    let _ = writeln!(out, "pub struct {};", name);
    out.push('\n');
}

/// `impl Codec` whose three methods delegate to `expr`
fn emit_delegate(out: &mut String, name: &str, expr: &str) {
    let _ = writeln!(out, "impl Codec for {} {{", name);
    let _ = writeln!(
        out,
        "    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {{"
    );
    let _ = writeln!(out, "        {}.preencode(state, m)", expr);
    out.push_str("    }\n\n");
    let _ = writeln!(
        out,
        "    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {{"
    );
    let _ = writeln!(out, "        {}.encode(state, m)", expr);
    out.push_str("    }\n\n");
    out.push_str("    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {\n");
    let _ = writeln!(out, "        {}.decode(state)", expr);
    out.push_str("    }\n}\n\n");
}

fn emit_alias(out: &mut String, ctx: &CodegenContext, a: &Alias, name: &str) {
    emit_header(out, &a.id, name);
    emit_delegate(out, name, &type_expr(ctx, a.target));
}

fn emit_array(out: &mut String, ctx: &CodegenContext, a: &ArrayType, name: &str) {
    emit_header(out, &a.id, name);
    let framed = ctx.schema.is_frameable(a.element);
    emit_delegate(out, name, &member_expr(ctx, a.element, framed, true));
}

fn emit_enum(out: &mut String, e: &Enum, name: &str) {
    emit_header(out, &e.id, name);
    let keys: Vec<String> = e.values.iter().map(|v| lit(&v.key)).collect();
    let pairs: Vec<String> = e
        .encoded_values()
        .into_iter()
        .map(|(key, n)| format!("({}, {})", lit(key), n))
        .collect();

    let _ = writeln!(out, "impl {} {{", name);
    let _ = writeln!(
        out,
        "    pub const VALUES: &'static [(&'static str, u64)] = &[{}];",
        pairs.join(", ")
    );
    out.push('\n');
    out.push_str("    const CODEC: EnumCodec<'static, &'static str> = EnumCodec {\n");
    let _ = writeln!(out, "        fqn: {},", lit(&e.id.fqn));
    let _ = writeln!(out, "        keys: &[{}],", keys.join(", "));
    let _ = writeln!(out, "        offset: {},", e.offset);
    let _ = writeln!(out, "        strings: {},", e.strings);
    out.push_str("    };\n}\n\n");
    emit_delegate(out, name, "Self::CODEC");
}

fn emit_external(out: &mut String, ctx: &CodegenContext, x: &ExternalType, name: &str) {
    let module = x
        .module
        .as_deref()
        .or_else(|| ctx.schema.module_path(&x.id.namespace))
        .unwrap_or("super");
    let _ = writeln!(out, "/// `{}` (v{}), supplied externally", x.id.fqn, x.id.version);
    let _ = writeln!(out, "pub use {}::{} as {};", module, x.external, name);
    out.push('\n');
}

fn emit_versioned(out: &mut String, ctx: &CodegenContext, v: &VersionedType, name: &str) {
    emit_header(out, &v.id, name);
    let module = ctx.schema.module_path(&v.id.namespace).unwrap_or("super");
    let Some(latest) = v.latest() else { return };
    let latest_expr = type_expr(ctx, latest.target);

    let _ = writeln!(out, "impl Codec for {} {{", name);
    out.push_str(
        "    fn preencode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {\n",
    );
    let _ = writeln!(out, "        preencode_uint(state, {});", latest.version);
    let _ = writeln!(out, "        {}.preencode(state, m)", latest_expr);
    out.push_str("    }\n\n");
    out.push_str("    fn encode(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {\n");
    let _ = writeln!(out, "        encode_uint(state, {})?;", latest.version);
    let _ = writeln!(out, "        {}.encode(state, m)", latest_expr);
    out.push_str("    }\n\n");
    out.push_str("    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {\n");
    out.push_str("        match decode_uint(state)? {\n");
    for entry in &v.versions {
        let expr = type_expr(ctx, entry.target);
        match &entry.map {
            Some(map) => {
                let _ = writeln!(
                    out,
                    "            {} => Ok({}::{}({}.decode(state)?)),",
                    entry.version, module, map, expr
                );
            }
            None => {
                let _ = writeln!(out, "            {} => {}.decode(state),", entry.version, expr);
            }
        }
    }
    out.push_str("            version => Err(CodecError::UnknownVersion {\n");
    let _ = writeln!(out, "                fqn: {}.to_string(),", lit(&v.id.fqn));
    out.push_str("                version,\n");
    out.push_str("            }),\n");
    out.push_str("        }\n    }\n}\n\n");
}

// =============================================================================
// Struct Emission
// =============================================================================

fn emit_struct(out: &mut String, ctx: &CodegenContext, s: &Struct, name: &str) {
    emit_header(out, &s.id, name);
    let layout = StructLayout::derive(s, ctx.schema);

    let _ = writeln!(out, "impl {} {{", name);
    let _ = writeln!(out, "    const FQN: &'static str = {};", lit(&s.id.fqn));
    out.push_str("}\n\n");

    let _ = writeln!(out, "impl Codec for {} {{", name);
    emit_struct_writer(out, ctx, &layout, "preencode");
    out.push('\n');
    emit_struct_writer(out, ctx, &layout, "encode");
    out.push('\n');
    emit_struct_reader(out, ctx, &layout);
    out.push_str("}\n\n");
}

fn flags_expr(layout: &StructLayout) -> String {
    let terms: Vec<String> = layout
        .steps
        .iter()
        .filter(|s| s.optional)
        .map(|s| format!("field_flag(m, {}, {}, {})", lit(&s.name), s.flag, s.flag_only))
        .collect();
    if terms.is_empty() {
        "0".to_string()
    } else {
        terms.join("\n            | ")
    }
}

fn emit_flags_write(out: &mut String, method: &str) {
    if method == "preencode" {
        out.push_str("        preencode_uint(state, flags);\n");
    } else {
        out.push_str("        encode_uint(state, flags)?;\n");
    }
}

/// `preencode` or `encode`; the two share one traversal
fn emit_struct_writer(out: &mut String, ctx: &CodegenContext, layout: &StructLayout, method: &str) {
    let _ = writeln!(
        out,
        "    fn {}(&self, state: &mut State, m: &Value) -> Result<(), CodecError> {{",
        method
    );
    out.push_str("        let m = struct_fields(m)?;\n");
    for step in layout.steps.iter().filter(|s| !s.optional) {
        let _ = writeln!(out, "        require(m, Self::FQN, {})?;", lit(&step.name));
    }
    if layout.flags_position.is_some() {
        let _ = writeln!(out, "        let flags: u64 = {};", flags_expr(layout));
    }

    for (i, step) in layout.steps.iter().enumerate() {
        if layout.flags_position == Some(i) {
            emit_flags_write(out, method);
        }
        if step.flag_only {
            continue;
        }
        let expr = member_expr(ctx, step.target, step.framed, step.array);
        let call = format!("{}.{}(state, get(m, {}))?;", expr, method, lit(&step.name));
        if step.optional {
            let _ = writeln!(out, "        if flags & {} != 0 {{", step.flag);
            let _ = writeln!(out, "            {}", call);
            out.push_str("        }\n");
        } else {
            let _ = writeln!(out, "        {}", call);
        }
    }
    if layout.flags_position == Some(layout.steps.len()) {
        emit_flags_write(out, method);
    }
    out.push_str("        Ok(())\n    }\n");
}

fn emit_struct_reader(out: &mut String, ctx: &CodegenContext, layout: &StructLayout) {
    out.push_str("    fn decode(&self, state: &mut State) -> Result<Value, CodecError> {\n");
    out.push_str("        let mut res = Fields::new();\n");
    for step in &layout.steps {
        let _ = writeln!(
            out,
            "        res.insert({}.to_string(), {});",
            lit(&step.name),
            value_literal(&step.default)
        );
    }

    let read_flags = |out: &mut String| {
        out.push_str("        if state.is_exhausted() {\n");
        out.push_str("            return Ok(Value::Struct(res));\n");
        out.push_str("        }\n");
        out.push_str("        let flags = decode_flags(state)?;\n");
    };

    for (i, step) in layout.steps.iter().enumerate() {
        if layout.flags_position == Some(i) {
            read_flags(out);
        }
        let key = lit(&step.name);
        if step.flag_only {
            let _ = writeln!(
                out,
                "        res.insert({}.to_string(), Value::Bool(flags & {} != 0));",
                key, step.flag
            );
            continue;
        }
        let expr = member_expr(ctx, step.target, step.framed, step.array);
        let insert = format!("res.insert({}.to_string(), {}.decode(state)?);", key, expr);
        if step.optional {
            let _ = writeln!(out, "        if flags & {} != 0 {{", step.flag);
            let _ = writeln!(out, "            {}", insert);
            out.push_str("        }\n");
        } else {
            let _ = writeln!(out, "        {}", insert);
        }
    }
    if layout.flags_position == Some(layout.steps.len()) {
        read_flags(out);
    }
    out.push_str("        Ok(Value::Struct(res))\n    }\n");
}
