//! Name Resolution Pass
//!
//! Maps every declaration to the Rust identifier of its generated codec:
//! the PascalCase of its namespace followed by its name. Collisions, either
//! between declarations or with items the module imports from the runtime,
//! are resolved with a numeric suffix in declaration order, so the mapping is
//! stable for a given schema.

use std::collections::HashSet;

use crate::schema::Schema;
use crate::types::TypeId;

/// Names the generated module imports or defines itself
const RESERVED: &[&str] = &[
    "Array",
    "Codec",
    "CodecError",
    "EnumCodec",
    "Fields",
    "Frame",
    "Primitive",
    "Self",
    "State",
    "Value",
    "VERSION",
];

/// Codec identifier per declaration
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    pub fn build(schema: &Schema) -> Self {
        let mut taken: HashSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();
        let mut names = Vec::with_capacity(schema.types().len());
        for t in schema.types() {
            let base = match t.identity() {
                Some(id) => format!("{}{}", to_pascal_case(&id.namespace), to_pascal_case(&id.name)),
                None => to_pascal_case(t.fqn()),
            };
            let base = if base.starts_with(|c: char| c.is_ascii_alphabetic()) {
                base
            } else {
                format!("T{}", base)
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while taken.contains(&name) {
                name = format!("{}{}", base, suffix);
                suffix += 1;
            }
            taken.insert(name.clone());
            names.push(name);
        }
        Self { names }
    }

    pub fn get(&self, id: TypeId) -> &str {
        &self.names[id]
    }
}

/// PascalCase of a name made of `-`, `_`, `.` or space separated words.
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for c in s.chars() {
        if matches!(c, '_' | '-' | '.' | ' ' | '@' | '/') {
            capitalize_next = true;
        } else if !c.is_ascii_alphanumeric() {
            continue;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{FieldDescription, TypeDescription};
    use crate::Hyperschema;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("basic-struct"), "BasicStruct");
        assert_eq!(to_pascal_case("namespace-1"), "Namespace1");
        assert_eq!(to_pascal_case("snake_case_name"), "SnakeCaseName");
        assert_eq!(to_pascal_case("v1.2"), "V12");
        assert_eq!(to_pascal_case("camelCase"), "CamelCase");
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("a-b").unwrap();
        ns.register(TypeDescription::alias("c", "uint")).unwrap();
        let mut ns = schema.namespace("a").unwrap();
        ns.register(TypeDescription::alias("b-c", "uint")).unwrap();
        let mut ns = schema.namespace("enum").unwrap();
        ns.register(TypeDescription::structure(
            "codec",
            vec![FieldDescription::new("x", "uint")],
        ))
        .unwrap();
        let mut ns = schema.namespace("9").unwrap();
        ns.register(TypeDescription::alias("lives", "uint")).unwrap();
        let schema = schema.build().unwrap();

        let names = NameTable::build(&schema);
        assert_eq!(names.get(0), "ABC");
        assert_eq!(names.get(1), "ABC2");
        assert_eq!(names.get(2), "EnumCodec2");
        assert_eq!(names.get(3), "T9Lives");
    }
}
