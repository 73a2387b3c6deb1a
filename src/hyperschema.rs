//! Schema builder
//!
//! [`Hyperschema`] collects declarations namespace by namespace. Built on top
//! of a previous [`Snapshot`], it first replays every persisted declaration,
//! then checks each new declaration of an existing name against it. Nothing
//! is resolved until [`Hyperschema::build`], so declarations may refer to types
//! registered after them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, trace};

use crate::compatibility::{field_names, SchemaChange, Session};
use crate::config::BuildConfig;
use crate::description::{Snapshot, TypeDescription, TypeKind};
use crate::error::{Result, SchemaError};
use crate::graph;
use crate::primitive::Primitive;
use crate::schema::Schema;
use crate::types::{
    Alias, ArrayType, Enum, EnumValue, ExternalType, Identity, ResolvedType, Struct, StructField,
    TypeRef, VersionEntry, VersionedType,
};
use crate::version::VersionTracker;

const NAME_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$";

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}

/// Checks a namespace, type or field name.
pub fn validate_name(name: &str) -> Result<()> {
    match name_pattern() {
        Some(pattern) if pattern.is_match(name) => Ok(()),
        _ => Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: format!("must match {}", NAME_PATTERN),
        }),
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Schema under construction
#[derive(Debug, Clone)]
pub struct Hyperschema {
    tracker: VersionTracker,
    /// Normalized declarations in declaration order
    declarations: Vec<TypeDescription>,
    by_fqn: HashMap<String, usize>,
    /// Names registered since the replay ended
    registered: HashSet<String>,
    /// Namespaces declared in this build, with their required module paths
    namespaces: BTreeMap<String, Option<String>>,
    changes: Vec<SchemaChange>,
}

impl Default for Hyperschema {
    fn default() -> Self {
        Self::new()
    }
}

impl Hyperschema {
    /// A fresh, versioned schema
    pub fn new() -> Self {
        Self::blank(true)
    }

    pub fn with_config(config: &BuildConfig) -> Self {
        Self::blank(config.versioned)
    }

    fn blank(versioned: bool) -> Self {
        let mut tracker = VersionTracker::new(versioned);
        tracker.finish_initializing();
        Self::with_tracker(tracker)
    }

    fn with_tracker(tracker: VersionTracker) -> Self {
        Self {
            tracker,
            declarations: Vec::new(),
            by_fqn: HashMap::new(),
            registered: HashSet::new(),
            namespaces: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    /// Replays a versioned snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        Self::from_snapshot_with(snapshot, true)
    }

    pub fn from_snapshot_with(snapshot: &Snapshot, versioned: bool) -> Result<Self> {
        let mut schema = Self::with_tracker(VersionTracker::resume(snapshot.version, versioned));
        for desc in &snapshot.schema {
            schema.register(desc.clone())?;
        }
        schema.tracker.finish_initializing();
        debug!(
            version = snapshot.version,
            types = snapshot.schema.len(),
            "snapshot replayed"
        );
        Ok(schema)
    }

    /// Replays a snapshot in its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_snapshot(&Snapshot::from_json(json)?)
    }

    pub fn version(&self) -> u32 {
        self.tracker.version()
    }

    pub fn changed(&self) -> bool {
        self.tracker.changed()
    }

    /// Changes accepted so far in this build
    pub fn changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    /// Declares a namespace. Each namespace can be declared once per build.
    pub fn namespace(&mut self, name: &str) -> Result<Namespace<'_>> {
        validate_name(name)?;
        if self.namespaces.contains_key(name) {
            return Err(SchemaError::NamespaceExists(name.to_string()));
        }
        self.namespaces.insert(name.to_string(), None);
        trace!(namespace = name, "namespace declared");
        Ok(Namespace {
            builder: self,
            name: name.to_string(),
        })
    }

    /// Handle to a namespace declared earlier in this build.
    pub fn namespace_mut(&mut self, name: &str) -> Result<Namespace<'_>> {
        if !self.namespaces.contains_key(name) {
            return Err(SchemaError::UnknownNamespace(name.to_string()));
        }
        Ok(Namespace {
            builder: self,
            name: name.to_string(),
        })
    }

    /// Registers a declaration under its own namespace and returns its
    /// fully-qualified name.
    ///
    /// A declaration whose name already exists in the replayed snapshot must be
    /// compatible with it. The builder is left unchanged when this fails.
    pub fn register(&mut self, desc: TypeDescription) -> Result<String> {
        let initializing = self.tracker.is_initializing();
        let namespace = desc
            .namespace
            .clone()
            .ok_or_else(|| SchemaError::MissingDefinition {
                fqn: desc.name.clone(),
                what: "namespace",
            })?;
        if !initializing && !self.namespaces.contains_key(&namespace) {
            return Err(SchemaError::UnknownNamespace(namespace));
        }
        validate_name(&namespace)?;
        validate_name(&desc.name)?;
        for field in field_names(&desc) {
            validate_name(field)?;
        }

        let fqn = desc.fqn();
        let duplicate = if initializing {
            self.by_fqn.contains_key(&fqn)
        } else {
            self.registered.contains(&fqn)
        };
        if duplicate {
            return Err(SchemaError::DuplicateType(fqn));
        }

        let slot = self.by_fqn.get(&fqn).copied();
        let previous = slot.map(|i| &self.declarations[i]);
        let mut session = Session::new(self.tracker);
        let normalized = session.normalize(previous, desc)?;

        self.tracker = session.tracker;
        self.changes.extend(session.changes);
        match slot {
            Some(i) => self.declarations[i] = normalized,
            None => {
                self.by_fqn.insert(fqn.clone(), self.declarations.len());
                self.declarations.push(normalized);
            }
        }
        if !initializing {
            self.registered.insert(fqn.clone());
        }
        trace!(fqn = %fqn, version = self.tracker.version(), "registered");
        Ok(fqn)
    }

    /// Resolves every reference and produces the immutable schema.
    pub fn build(self) -> Result<Schema> {
        let Hyperschema {
            tracker,
            declarations,
            by_fqn,
            namespaces,
            changes,
            ..
        } = self;

        let linker = Linker {
            by_fqn: &by_fqn,
            namespaces: &namespaces,
        };
        let types = declarations
            .iter()
            .map(|desc| linker.link(desc))
            .collect::<Result<Vec<_>>>()?;

        let mut schema = Schema::new(
            tracker.version(),
            tracker.is_versioned(),
            tracker.changed(),
            types,
            namespaces,
            changes,
        );
        graph::check_finite(&schema)?;
        check_required_bools(&schema)?;
        raise_versions(&mut schema)?;

        info!(
            version = schema.version(),
            types = schema.types().len(),
            changes = schema.changes().len(),
            "schema built"
        );
        Ok(schema)
    }
}

// =============================================================================
// Namespace handle
// =============================================================================

/// Registers declarations into one namespace
#[derive(Debug)]
pub struct Namespace<'a> {
    builder: &'a mut Hyperschema,
    name: String,
}

impl Namespace<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module path generated code imports this namespace's external codecs
    /// and migrations from.
    pub fn require(&mut self, module: impl Into<String>) -> &mut Self {
        self.builder
            .namespaces
            .insert(self.name.clone(), Some(module.into()));
        self
    }

    /// Registers `desc` in this namespace, returning its fully-qualified name.
    pub fn register(&mut self, desc: TypeDescription) -> Result<String> {
        self.builder.register(desc.in_namespace(self.name.clone()))
    }
}

// =============================================================================
// Link pass
// =============================================================================

struct Linker<'a> {
    by_fqn: &'a HashMap<String, usize>,
    namespaces: &'a BTreeMap<String, Option<String>>,
}

impl Linker<'_> {
    fn resolve(&self, name: &str, referrer: impl FnOnce() -> String) -> Result<TypeRef> {
        if let Some(p) = Primitive::from_name(name) {
            return Ok(TypeRef::Primitive(p));
        }
        self.by_fqn
            .get(name)
            .map(|id| TypeRef::Declared(*id))
            .ok_or_else(|| SchemaError::UnresolvedType {
                type_name: name.to_string(),
                referrer: referrer(),
            })
    }

    fn link(&self, desc: &TypeDescription) -> Result<ResolvedType> {
        let namespace = desc.namespace.clone().unwrap_or_default();
        let id = Identity::new(desc.name.clone(), namespace, desc.version.unwrap_or_default());
        let fqn = id.fqn.clone();
        let missing = |what| SchemaError::MissingDefinition {
            fqn: fqn.clone(),
            what,
        };

        let resolved = match desc.kind() {
            TypeKind::Alias => {
                let target_name = desc.alias.clone().ok_or_else(|| missing("alias"))?;
                ResolvedType::Alias(Alias {
                    target: self.resolve(&target_name, || fqn.clone())?,
                    target_name,
                    id,
                })
            }
            TypeKind::Enum => {
                let values = desc.enum_values().ok_or_else(|| missing("enum values"))?;
                ResolvedType::Enum(Enum {
                    values: values
                        .iter()
                        .map(|v| EnumValue {
                            key: v.key().to_string(),
                            version: v.version().unwrap_or(id.version),
                        })
                        .collect(),
                    offset: desc.offset.unwrap_or(1),
                    strings: desc.strings,
                    id,
                })
            }
            TypeKind::Struct => {
                let fields = desc.fields.as_deref().ok_or_else(|| missing("fields"))?;
                let fields = fields
                    .iter()
                    .map(|f| {
                        Ok(StructField {
                            name: f.name.clone(),
                            target: self.resolve(&f.type_name, || format!("{}/{}", fqn, f.name))?,
                            type_name: f.type_name.clone(),
                            required: f.required,
                            array: f.array,
                            version: f.version.unwrap_or(id.version),
                            flag: 0,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let flags_position = desc
                    .flags_position
                    .filter(|p| *p >= 0)
                    .map(|p| p as usize);
                ResolvedType::Struct(Struct::new(
                    id,
                    desc.compact.unwrap_or(false),
                    flags_position,
                    fields,
                ))
            }
            TypeKind::Array => {
                let element_name = desc.type_name.clone().ok_or_else(|| missing("type"))?;
                ResolvedType::Array(ArrayType {
                    element: self.resolve(&element_name, || fqn.clone())?,
                    element_name,
                    id,
                })
            }
            TypeKind::Versioned => {
                let entries = desc.versions.as_deref().ok_or_else(|| missing("versions"))?;
                let versions = entries
                    .iter()
                    .map(|e| {
                        Ok(VersionEntry {
                            version: e.version,
                            target: self.resolve(&e.type_name, || {
                                format!("{} version {}", fqn, e.version)
                            })?,
                            type_name: e.type_name.clone(),
                            map: e.map.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                ResolvedType::Versioned(VersionedType { id, versions })
            }
            TypeKind::External => {
                let external = desc.external.clone().ok_or_else(|| missing("external"))?;
                let module = self.namespaces.get(&id.namespace).cloned().flatten();
                ResolvedType::External(ExternalType {
                    id,
                    external,
                    module,
                })
            }
        };
        Ok(resolved)
    }
}

/// A required field whose type ends in `bool` would always decode as false.
fn check_required_bools(schema: &Schema) -> Result<()> {
    for t in schema.types() {
        let Some(s) = t.as_struct() else { continue };
        if let Some(f) = s
            .fields
            .iter()
            .find(|f| f.required && !f.array && schema.is_bool(f.target))
        {
            return Err(SchemaError::RequiredBool {
                fqn: s.id.fqn.clone(),
                field: f.name.clone(),
            });
        }
    }
    Ok(())
}

/// Raises each field's version to that of the type it refers to, and each
/// struct's version to that of its newest field, until nothing moves.
/// Compact structs cannot absorb a newer field type.
fn raise_versions(schema: &mut Schema) -> Result<()> {
    loop {
        let mut field_updates = Vec::new();
        let mut type_updates = Vec::new();
        for (id, t) in schema.types().iter().enumerate() {
            let Some(s) = t.as_struct() else { continue };
            let mut newest = s.id.version;
            for (index, f) in s.fields.iter().enumerate() {
                let version = schema.effective_version(f.target);
                if version > f.version {
                    if s.compact {
                        return Err(SchemaError::CompactVersionDrift {
                            fqn: s.id.fqn.clone(),
                            field: f.name.clone(),
                        });
                    }
                    field_updates.push((id, index, version));
                }
                newest = newest.max(version).max(f.version);
            }
            if newest > s.id.version {
                type_updates.push((id, newest));
            }
        }
        if field_updates.is_empty() && type_updates.is_empty() {
            return Ok(());
        }

        for (id, index, version) in field_updates {
            if let ResolvedType::Struct(s) = &mut schema.types[id] {
                trace!(fqn = %s.id.fqn, field = %s.fields[index].name, version, "field version raised");
                s.fields[index].version = version;
            }
        }
        for (id, version) in type_updates {
            if let Some(identity) = schema.types[id].identity_mut() {
                identity.version = version;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::FieldDescription;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("basic-struct").is_ok());
        assert!(validate_name("v1.2_x").is_ok());
        assert!(validate_name("_private").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("-leading").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[test]
    fn test_namespace_declared_once() {
        let mut schema = Hyperschema::new();
        schema.namespace("ns").unwrap();
        assert!(matches!(
            schema.namespace("ns"),
            Err(SchemaError::NamespaceExists(_))
        ));
        assert!(schema.namespace_mut("ns").is_ok());
        assert!(matches!(
            schema.namespace_mut("other"),
            Err(SchemaError::UnknownNamespace(_))
        ));
    }

    #[test]
    fn test_register_requires_declared_namespace() {
        let mut schema = Hyperschema::new();
        let desc = TypeDescription::alias("id", "uint").in_namespace("ns");
        assert!(matches!(
            schema.register(desc),
            Err(SchemaError::UnknownNamespace(_))
        ));
    }

    #[test]
    fn test_duplicate_in_one_build() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ns").unwrap();
        ns.register(TypeDescription::alias("id", "uint")).unwrap();
        assert!(matches!(
            ns.register(TypeDescription::alias("id", "uint")),
            Err(SchemaError::DuplicateType(fqn)) if fqn == "@ns/id"
        ));
    }

    #[test]
    fn test_forward_reference() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ns").unwrap();
        ns.register(TypeDescription::structure(
            "outer",
            vec![FieldDescription::new("inner", "@ns/inner").required()],
        ))
        .unwrap();
        ns.register(TypeDescription::structure(
            "inner",
            vec![FieldDescription::new("n", "uint").required()],
        ))
        .unwrap();
        let built = schema.build().unwrap();
        assert_eq!(built.types()[0].fqn(), "@ns/outer");
        assert!(built.resolve("@ns/inner").is_some());
    }

    #[test]
    fn test_unresolved_reference() {
        let mut schema = Hyperschema::new();
        schema
            .namespace("ns")
            .unwrap()
            .register(TypeDescription::structure(
                "s",
                vec![FieldDescription::new("x", "@ns/missing")],
            ))
            .unwrap();
        match schema.build() {
            Err(SchemaError::UnresolvedType {
                type_name,
                referrer,
            }) => {
                assert_eq!(type_name, "@ns/missing");
                assert_eq!(referrer, "@ns/s/x");
            }
            other => panic!("expected unresolved type, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_required_alias_of_bool() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ns").unwrap();
        ns.register(TypeDescription::alias("flag", "bool")).unwrap();
        ns.register(TypeDescription::structure(
            "s",
            vec![FieldDescription::new("f", "@ns/flag").required()],
        ))
        .unwrap();
        assert!(matches!(
            schema.build(),
            Err(SchemaError::RequiredBool { .. })
        ));
    }

    #[test]
    fn test_required_array_of_bool_alias() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ns").unwrap();
        ns.register(TypeDescription::alias("flag", "bool")).unwrap();
        ns.register(TypeDescription::structure(
            "s",
            vec![FieldDescription::new("fs", "@ns/flag").required().array()],
        ))
        .unwrap();
        let built = schema.build().unwrap();
        let s = built.resolve("@ns/s").and_then(|t| t.as_struct()).unwrap();
        assert!(s.fields[0].required);
    }

    #[test]
    fn test_require_sets_external_module() {
        let mut schema = Hyperschema::new();
        let mut ns = schema.namespace("ext").unwrap();
        ns.require("crate::codecs");
        ns.register(TypeDescription::external("point", "PointCodec"))
            .unwrap();
        let built = schema.build().unwrap();
        match built.resolve("@ext/point") {
            Some(ResolvedType::External(x)) => {
                assert_eq!(x.external, "PointCodec");
                assert_eq!(x.module.as_deref(), Some("crate::codecs"));
            }
            _ => panic!("expected external type"),
        }
    }
}
