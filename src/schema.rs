//! Built schemas
//!
//! A [`Schema`] is the immutable result of [`crate::Hyperschema::build`]: the
//! resolved declarations in declaration order, the version they were built at,
//! the change log of that build, and the runtime bindings (external codecs and
//! migrations) the live encoder needs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::checksum::Checksum;
use crate::codec::{self, Codec, Migration, TypeCodec};
use crate::compatibility::SchemaChange;
use crate::description::Snapshot;
use crate::error::{CodecError, Result};
use crate::hyperschema::Hyperschema;
use crate::primitive::Primitive;
use crate::types::{ResolvedType, TypeId, TypeRef};
use crate::value::Value;

// =============================================================================
// Schema
// =============================================================================

/// The built, resolved schema
pub struct Schema {
    /// Schema version after this build
    pub(crate) version: u32,
    /// Whether the build versions changes
    pub(crate) versioned: bool,
    /// Whether the build changed anything relative to its snapshot
    pub(crate) changed: bool,
    /// Declarations in declaration order, indexed by [`TypeId`]
    pub(crate) types: Vec<ResolvedType>,
    pub(crate) by_fqn: HashMap<String, TypeId>,
    /// Namespace name to the module path required for it, if any
    pub(crate) namespaces: BTreeMap<String, Option<String>>,
    pub(crate) changes: Vec<SchemaChange>,
    externals: HashMap<String, Arc<dyn Codec>>,
    migrations: HashMap<String, Migration>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.version)
            .field("types", &self.types.len())
            .field("changes", &self.changes.len())
            .field("externals", &self.externals.keys().collect::<Vec<_>>())
            .field("migrations", &self.migrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    pub(crate) fn new(
        version: u32,
        versioned: bool,
        changed: bool,
        types: Vec<ResolvedType>,
        namespaces: BTreeMap<String, Option<String>>,
        changes: Vec<SchemaChange>,
    ) -> Self {
        let by_fqn = types
            .iter()
            .enumerate()
            .map(|(id, t)| (t.fqn().to_string(), id))
            .collect();
        Self {
            version,
            versioned,
            changed,
            types,
            by_fqn,
            namespaces,
            changes,
            externals: HashMap::new(),
            migrations: HashMap::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Whether the build that produced this schema changed anything
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Changes accepted by the build that produced this schema
    pub fn changes(&self) -> &[SchemaChange] {
        &self.changes
    }

    /// Declarations in declaration order
    pub fn types(&self) -> &[ResolvedType] {
        &self.types
    }

    /// Namespaces declared in the build, with their required module paths
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.namespaces
            .iter()
            .map(|(name, module)| (name.as_str(), module.as_deref()))
    }

    pub fn module_path(&self, namespace: &str) -> Option<&str> {
        self.namespaces.get(namespace).and_then(|m| m.as_deref())
    }

    /// Resolves a primitive name or fully-qualified declaration name.
    pub fn resolve_ref(&self, name: &str) -> Option<TypeRef> {
        if let Some(p) = Primitive::from_name(name) {
            return Some(TypeRef::Primitive(p));
        }
        self.by_fqn.get(name).map(|id| TypeRef::Declared(*id))
    }

    pub fn resolve(&self, name: &str) -> Option<&ResolvedType> {
        self.resolve_ref(name).map(|r| self.get(r))
    }

    pub fn get(&self, r: TypeRef) -> &ResolvedType {
        match r {
            TypeRef::Primitive(p) => p.resolved(),
            TypeRef::Declared(id) => &self.types[id],
        }
    }

    /// Follows aliases to the type that is actually encoded.
    pub fn unalias(&self, mut r: TypeRef) -> TypeRef {
        while let ResolvedType::Alias(a) = self.get(r) {
            r = a.target;
        }
        r
    }

    /// Whether values of `r` are length-prefixed when embedded in a struct.
    /// Only non-compact structs are, and aliases of them.
    pub fn is_frameable(&self, r: TypeRef) -> bool {
        match self.get(self.unalias(r)) {
            ResolvedType::Struct(s) => !s.compact,
            _ => false,
        }
    }

    pub fn is_bool(&self, r: TypeRef) -> bool {
        self.unalias(r) == TypeRef::Primitive(Primitive::Bool)
    }

    /// Value decoders report for a field of type `r` that is not on the wire
    pub fn default_value(&self, r: TypeRef) -> Value {
        match self.get(self.unalias(r)) {
            ResolvedType::Primitive(p) => p.default_value(),
            _ => Value::Null,
        }
    }

    /// Version of `r`, looking through aliases and named arrays
    pub fn effective_version(&self, r: TypeRef) -> u32 {
        let t = self.get(r);
        match t {
            ResolvedType::Alias(a) => t.version().max(self.effective_version(a.target)),
            ResolvedType::Array(a) => t.version().max(self.effective_version(a.element)),
            other => other.version(),
        }
    }

    // -------------------------------------------------------------------------
    // Encoding
    // -------------------------------------------------------------------------

    /// Live codec for a primitive or declared type
    pub fn codec(&self, name: &str) -> std::result::Result<TypeCodec<'_>, CodecError> {
        self.resolve_ref(name)
            .map(|r| TypeCodec::new(self, r))
            .ok_or_else(|| CodecError::UnknownType(name.to_string()))
    }

    pub fn encode(&self, name: &str, value: &Value) -> std::result::Result<Vec<u8>, CodecError> {
        codec::encode(&self.codec(name)?, value)
    }

    pub fn decode(&self, name: &str, bytes: &[u8]) -> std::result::Result<Value, CodecError> {
        codec::decode(&self.codec(name)?, bytes)
    }

    /// `(key, encoded integer)` pairs of an integer-valued enum
    pub fn enum_values(&self, fqn: &str) -> Option<Vec<(&str, u64)>> {
        match self.resolve(fqn)? {
            ResolvedType::Enum(e) if !e.strings => Some(e.encoded_values()),
            _ => None,
        }
    }

    /// Binds the codec an external type encodes with.
    pub fn bind_external(&mut self, fqn: impl Into<String>, codec: Arc<dyn Codec>) {
        let fqn = fqn.into();
        debug!(fqn = %fqn, "external codec bound");
        self.externals.insert(fqn, codec);
    }

    /// Binds a named migration used by versioned types.
    pub fn bind_migration<F>(&mut self, name: impl Into<String>, map: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(name = %name, "migration bound");
        self.migrations.insert(name, Arc::new(map));
    }

    pub(crate) fn external(&self, fqn: &str) -> std::result::Result<&Arc<dyn Codec>, CodecError> {
        self.externals
            .get(fqn)
            .ok_or_else(|| CodecError::UnboundExternal(fqn.to_string()))
    }

    pub(crate) fn migration(&self, name: &str) -> std::result::Result<&Migration, CodecError> {
        self.migrations
            .get(name)
            .ok_or_else(|| CodecError::UnboundMigration(name.to_string()))
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// The schema as a snapshot, in declaration order
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            schema: self
                .types
                .iter()
                .filter_map(ResolvedType::to_description)
                .collect(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        Ok(self.to_snapshot().to_json(pretty)?)
    }

    /// SHA-256 of the compact snapshot JSON
    pub fn fingerprint(&self) -> Result<Checksum> {
        Ok(Checksum::from_str(&self.to_json(false)?))
    }

    /// A builder replaying this schema, ready for the next round of
    /// declarations.
    pub fn rebuild(&self) -> Result<Hyperschema> {
        Hyperschema::from_snapshot_with(&self.to_snapshot(), self.versioned)
    }
}
