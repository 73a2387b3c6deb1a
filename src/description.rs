//! Snapshot descriptions
//!
//! The JSON form of a schema: the input to [`crate::Hyperschema::register`]
//! and the persisted snapshot a rebuild starts from. One flat record covers
//! every kind of declaration; [`TypeDescription::kind`] decides which one it is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A persisted schema: its version and every declaration in order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version at the time the snapshot was taken
    pub version: u32,
    /// Declarations, in declaration order
    #[serde(default)]
    pub schema: Vec<TypeDescription>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Declaration kind, classified from the fields a description carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Alias,
    Enum,
    Array,
    External,
    Versioned,
    Struct,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Alias => "alias",
            TypeKind::Enum => "enum",
            TypeKind::Array => "array",
            TypeKind::External => "external",
            TypeKind::Versioned => "versioned type",
            TypeKind::Struct => "struct",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `enum` key: either the value list itself or `true` with the list under
/// `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumSpec {
    Flag(bool),
    Values(Vec<EnumValueDescription>),
}

/// One enum value, either a bare key or a key with the version it was added in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValueDescription {
    Key(String),
    Versioned { key: String, version: u32 },
}

impl EnumValueDescription {
    pub fn key(&self) -> &str {
        match self {
            EnumValueDescription::Key(key) => key,
            EnumValueDescription::Versioned { key, .. } => key,
        }
    }

    pub fn version(&self) -> Option<u32> {
        match self {
            EnumValueDescription::Key(_) => None,
            EnumValueDescription::Versioned { version, .. } => Some(*version),
        }
    }
}

/// One entry of a versioned type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescription {
    /// Payload type of this entry
    #[serde(rename = "type")]
    pub type_name: String,
    /// Tag written ahead of the payload
    pub version: u64,
    /// Name of the migration that lifts values of this entry to the latest shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

impl VersionDescription {
    pub fn new(version: u64, type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            version,
            map: None,
        }
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }
}

/// One struct field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub array: bool,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Schema version the field was added in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl FieldDescription {
    /// An optional, non-array field
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            array: false,
            type_name: type_name.into(),
            version: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single declaration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescription {
    pub name: String,
    /// Filled in from the namespace handle when registering through one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Alias target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<EnumSpec>,
    /// Enum values when `enum` is `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<EnumValueDescription>>,
    /// First integer an enum encodes to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Enum encodes its keys as strings
    #[serde(default, skip_serializing_if = "is_false")]
    pub strings: bool,
    /// Named array of `type`
    #[serde(default, skip_serializing_if = "is_false")]
    pub array: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Symbol of an externally supplied codec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionDescription>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,
    /// Field index the flags integer is written before, -1 when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags_position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescription>>,
    /// Schema version the declaration was last changed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl TypeDescription {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn structure(name: impl Into<String>, fields: Vec<FieldDescription>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::named(name)
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alias: Some(target.into()),
            ..Self::named(name)
        }
    }

    pub fn enumeration<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = keys
            .into_iter()
            .map(|k| EnumValueDescription::Key(k.into()))
            .collect();
        Self {
            enumeration: Some(EnumSpec::Values(values)),
            ..Self::named(name)
        }
    }

    pub fn array_of(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            array: true,
            type_name: Some(element.into()),
            ..Self::named(name)
        }
    }

    pub fn versioned(name: impl Into<String>, versions: Vec<VersionDescription>) -> Self {
        Self {
            versions: Some(versions),
            ..Self::named(name)
        }
    }

    pub fn external(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            external: Some(symbol.into()),
            ..Self::named(name)
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = Some(compact);
        self
    }

    pub fn with_flags_position(mut self, position: i64) -> Self {
        self.flags_position = Some(position);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_strings(mut self) -> Self {
        self.strings = true;
        self
    }

    pub fn kind(&self) -> TypeKind {
        if self.alias.is_some() {
            TypeKind::Alias
        } else if self.enumeration.is_some() {
            TypeKind::Enum
        } else if self.array {
            TypeKind::Array
        } else if self.external.is_some() {
            TypeKind::External
        } else if self.versions.is_some() {
            TypeKind::Versioned
        } else {
            TypeKind::Struct
        }
    }

    /// Enum values, whichever key they were given under
    pub fn enum_values(&self) -> Option<&[EnumValueDescription]> {
        match &self.enumeration {
            Some(EnumSpec::Values(values)) => Some(values),
            Some(EnumSpec::Flag(_)) => self.values.as_deref(),
            None => None,
        }
    }

    /// `"@" + namespace + "/" + name`
    pub fn fqn(&self) -> String {
        fqn(self.namespace.as_deref().unwrap_or_default(), &self.name)
    }
}

/// Fully-qualified name of `name` in `namespace`.
pub fn fqn(namespace: &str, name: &str) -> String {
    format!("@{}/{}", namespace, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_classification() {
        let alias = TypeDescription::alias("a", "uint");
        assert_eq!(alias.kind(), TypeKind::Alias);
        assert_eq!(TypeDescription::enumeration("e", ["x"]).kind(), TypeKind::Enum);
        assert_eq!(TypeDescription::array_of("l", "uint").kind(), TypeKind::Array);
        assert_eq!(TypeDescription::external("x", "Codec").kind(), TypeKind::External);
        assert_eq!(TypeDescription::versioned("v", vec![]).kind(), TypeKind::Versioned);
        assert_eq!(TypeDescription::structure("s", vec![]).kind(), TypeKind::Struct);
        assert_eq!(TypeDescription::named("s").kind(), TypeKind::Struct);
    }

    #[test]
    fn test_enum_forms() {
        let inline: TypeDescription = serde_json::from_value(json!({
            "name": "e",
            "namespace": "ns",
            "enum": ["x", {"key": "y", "version": 2}]
        }))
        .unwrap();
        let flagged: TypeDescription = serde_json::from_value(json!({
            "name": "e",
            "namespace": "ns",
            "enum": true,
            "values": ["x", {"key": "y", "version": 2}]
        }))
        .unwrap();
        assert_eq!(inline.enum_values(), flagged.enum_values());
        let values = inline.enum_values().unwrap();
        assert_eq!(values[0].key(), "x");
        assert_eq!(values[0].version(), None);
        assert_eq!(values[1].version(), Some(2));
    }

    #[test]
    fn test_struct_json_shape() {
        let desc = TypeDescription::structure(
            "point",
            vec![FieldDescription::new("x", "int").required()],
        )
        .in_namespace("geo")
        .with_flags_position(-1);
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "point",
                "namespace": "geo",
                "flagsPosition": -1,
                "fields": [{"name": "x", "required": true, "array": false, "type": "int"}]
            })
        );
        assert_eq!(desc.fqn(), "@geo/point");
    }

    #[test]
    fn test_snapshot_parse() {
        let snapshot = Snapshot::from_json(
            r#"{"version": 3, "schema": [{"name": "id", "namespace": "ns", "alias": "uint", "version": 1}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.schema[0].kind(), TypeKind::Alias);
        assert_eq!(snapshot.schema[0].version, Some(1));
    }
}
