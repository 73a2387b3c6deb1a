//! Append-only compatibility rules
//!
//! A declaration registered under a name the previous snapshot already holds
//! is checked against that earlier declaration. Anything that would change how
//! existing bytes decode is rejected; additions are accepted, stamped with the
//! new schema version and written to the change log.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::description::{
    EnumSpec, EnumValueDescription, FieldDescription, TypeDescription, TypeKind,
};
use crate::error::{Result, SchemaError};
use crate::version::VersionTracker;

/// Most optional fields one flags integer can hold
pub const MAX_OPTIONALS: usize = 64;

/// Type of schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A new declaration
    TypeAdded,
    /// A field appended to an existing struct
    FieldAdded,
    /// A value appended to an existing enum
    EnumValueAdded,
    /// An entry appended to an existing versioned type
    VersionAdded,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::TypeAdded => "type added",
            ChangeType::FieldAdded => "field added",
            ChangeType::EnumValueAdded => "enum value added",
            ChangeType::VersionAdded => "version added",
        }
    }
}

/// An accepted change, recorded with the schema version it landed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Declaration the change applies to
    pub fqn: String,
    /// Field name, enum key or version tag that was added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Schema version of the change
    pub version: u32,
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(
                f,
                "{}: {} {} (v{})",
                self.change_type.as_str(),
                self.fqn,
                member,
                self.version
            ),
            None => write!(f, "{}: {} (v{})", self.change_type.as_str(), self.fqn, self.version),
        }
    }
}

/// Version state and change log of one registration. The builder commits it
/// only when the registration succeeds.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub tracker: VersionTracker,
    pub changes: Vec<SchemaChange>,
}

impl Session {
    pub fn new(tracker: VersionTracker) -> Self {
        Self {
            tracker,
            changes: Vec::new(),
        }
    }

    /// Version for something new. Replayed entries keep the version they were
    /// persisted with; anything else bumps and is logged.
    fn stamp(
        &mut self,
        persisted: Option<u32>,
        change_type: ChangeType,
        fqn: &str,
        member: Option<&str>,
    ) -> u32 {
        if self.tracker.is_initializing() {
            return persisted.unwrap_or_else(|| self.tracker.version());
        }
        if self.tracker.maybe_bump() {
            info!(from = self.tracker.version() - 1, to = self.tracker.version(), "schema version bumped");
        }
        let version = self.tracker.version();
        debug!(fqn, member, version, "{}", change_type.as_str());
        self.changes.push(SchemaChange {
            change_type,
            fqn: fqn.to_string(),
            member: member.map(str::to_string),
            version,
        });
        version
    }

    /// Checks `desc` against the previous declaration of the same name and
    /// returns it normalized: defaults filled in and every version stamped.
    pub fn normalize(
        &mut self,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let fqn = desc.fqn();
        let kind = desc.kind();
        debug!(fqn = %fqn, kind = %kind, existing = previous.is_some(), "checking declaration");
        if let Some(prev) = previous {
            if prev.kind() != kind {
                return Err(SchemaError::KindChanged {
                    fqn,
                    was: prev.kind().as_str(),
                    now: kind.as_str(),
                });
            }
        }
        match kind {
            TypeKind::Alias => self.alias(&fqn, previous, desc),
            TypeKind::Enum => self.enumeration(&fqn, previous, desc),
            TypeKind::Struct => self.structure(&fqn, previous, desc),
            TypeKind::Array => self.array(&fqn, previous, desc),
            TypeKind::Versioned => self.versioned(&fqn, previous, desc),
            TypeKind::External => self.external(&fqn, previous, desc),
        }
    }

    fn previous_version(&self, prev: &TypeDescription) -> u32 {
        prev.version.unwrap_or_else(|| self.tracker.version())
    }

    fn alias(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let version = match previous {
            Some(prev) => {
                if prev.alias != desc.alias {
                    return Err(SchemaError::AliasRemapped {
                        fqn: fqn.to_string(),
                        was: prev.alias.clone().unwrap_or_default(),
                        now: desc.alias.clone().unwrap_or_default(),
                    });
                }
                self.previous_version(prev)
            }
            None => self.stamp(desc.version, ChangeType::TypeAdded, fqn, None),
        };
        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            alias: desc.alias,
            version: Some(version),
            ..TypeDescription::default()
        })
    }

    fn enumeration(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let values = desc.enum_values().ok_or_else(|| SchemaError::MissingDefinition {
            fqn: fqn.to_string(),
            what: "enum values",
        })?;
        let offset = desc.offset.unwrap_or(1);

        let mut stamped = Vec::with_capacity(values.len());
        let version = match previous {
            Some(prev) => {
                let known = prev.enum_values().unwrap_or_default();
                if values.len() < known.len() {
                    return Err(SchemaError::EnumShrunk {
                        fqn: fqn.to_string(),
                        was: known.len(),
                        now: values.len(),
                    });
                }
                if prev.offset.unwrap_or(1) != offset || prev.strings != desc.strings {
                    return Err(SchemaError::EnumRemapped {
                        fqn: fqn.to_string(),
                    });
                }
                for (index, (was, now)) in known.iter().zip(values).enumerate() {
                    if was.key() != now.key() {
                        return Err(SchemaError::EnumValueRenamed {
                            fqn: fqn.to_string(),
                            index,
                            was: was.key().to_string(),
                            now: now.key().to_string(),
                        });
                    }
                }
                let mut version = self.previous_version(prev);
                for (was, now) in known.iter().zip(values) {
                    stamped.push((now.key().to_string(), was.version().unwrap_or(version)));
                }
                for added in &values[known.len()..] {
                    let v = self.stamp(None, ChangeType::EnumValueAdded, fqn, Some(added.key()));
                    version = version.max(v);
                    stamped.push((added.key().to_string(), v));
                }
                version
            }
            None => {
                let version = self.stamp(desc.version, ChangeType::TypeAdded, fqn, None);
                for value in values {
                    let v = if self.tracker.is_initializing() {
                        value.version().unwrap_or(version)
                    } else {
                        version
                    };
                    stamped.push((value.key().to_string(), v));
                }
                version
            }
        };

        let values = stamped
            .into_iter()
            .map(|(key, version)| EnumValueDescription::Versioned { key, version })
            .collect();
        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            enumeration: Some(EnumSpec::Values(values)),
            offset: Some(offset),
            strings: desc.strings,
            version: Some(version),
            ..TypeDescription::default()
        })
    }

    fn structure(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let mut fields = desc.fields.ok_or_else(|| SchemaError::MissingDefinition {
            fqn: fqn.to_string(),
            what: "fields",
        })?;
        for field in &mut fields {
            if field.required && !field.array && field.type_name == "bool" {
                debug!(fqn, field = %field.name, "bool field downgraded to optional");
                field.required = false;
            }
        }

        let optionals = fields.iter().filter(|f| !f.required).count();
        if optionals > MAX_OPTIONALS {
            return Err(SchemaError::TooManyOptionals {
                fqn: fqn.to_string(),
                count: optionals,
            });
        }

        let compact = desc.compact.unwrap_or(false);
        let explicit = match desc.flags_position {
            None | Some(-1) => None,
            Some(p) if p >= 0 && p as usize <= fields.len() => Some(p as usize),
            Some(position) => {
                return Err(SchemaError::InvalidFlagsPosition {
                    fqn: fqn.to_string(),
                    position,
                })
            }
        };
        let first_optional = fields.iter().position(|f| !f.required);

        let (position, version) = match previous {
            Some(prev) => {
                let known = prev.fields.as_deref().unwrap_or_default();
                if fields.len() < known.len() {
                    return Err(SchemaError::FieldRemoved {
                        fqn: fqn.to_string(),
                    });
                }
                if prev.compact.unwrap_or(false) != compact
                    || (compact && fields.len() != known.len())
                {
                    return Err(SchemaError::CompactExpanded {
                        fqn: fqn.to_string(),
                    });
                }
                for (was, now) in known.iter().zip(fields.iter_mut()) {
                    if was.name != now.name || was.type_name != now.type_name || was.array != now.array
                    {
                        return Err(SchemaError::FieldModified {
                            fqn: fqn.to_string(),
                            field: was.name.clone(),
                        });
                    }
                    if was.required != now.required {
                        return Err(SchemaError::RequiredChanged {
                            fqn: fqn.to_string(),
                            field: was.name.clone(),
                        });
                    }
                    now.version = was.version;
                }

                let position = match prev.flags_position.filter(|p| *p >= 0) {
                    Some(was) => {
                        let was = was as usize;
                        if let Some(now) = explicit.filter(|now| *now != was) {
                            return Err(SchemaError::FlagsPositionChanged {
                                fqn: fqn.to_string(),
                                was,
                                now,
                            });
                        }
                        Some(was)
                    }
                    None => {
                        let gained = explicit.or(first_optional);
                        if let Some(now) = gained.filter(|now| *now < known.len()) {
                            return Err(SchemaError::InvalidFlagsPosition {
                                fqn: fqn.to_string(),
                                position: now as i64,
                            });
                        }
                        gained
                    }
                };

                let mut version = self.previous_version(prev);
                for field in &mut fields[known.len()..] {
                    let v = self.stamp(None, ChangeType::FieldAdded, fqn, Some(&field.name));
                    field.version = Some(v);
                    version = version.max(v);
                }
                for field in &mut fields[..known.len()] {
                    field.version.get_or_insert(version);
                }
                (position, version)
            }
            None => {
                let version = self.stamp(desc.version, ChangeType::TypeAdded, fqn, None);
                let initializing = self.tracker.is_initializing();
                for field in &mut fields {
                    if !initializing || field.version.is_none() {
                        field.version = Some(version);
                    }
                }
                (explicit.or(first_optional), version)
            }
        };

        if let (Some(p), Some(first)) = (position, first_optional) {
            if p > first {
                return Err(SchemaError::InvalidFlagsPosition {
                    fqn: fqn.to_string(),
                    position: p as i64,
                });
            }
        }

        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            compact: Some(compact),
            flags_position: Some(position.map_or(-1, |p| p as i64)),
            fields: Some(fields),
            version: Some(version),
            ..TypeDescription::default()
        })
    }

    fn array(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        if desc.type_name.is_none() {
            return Err(SchemaError::MissingDefinition {
                fqn: fqn.to_string(),
                what: "type",
            });
        }
        let version = match previous {
            Some(prev) => {
                if prev.type_name != desc.type_name {
                    return Err(SchemaError::ArrayModified {
                        fqn: fqn.to_string(),
                    });
                }
                self.previous_version(prev)
            }
            None => self.stamp(desc.version, ChangeType::TypeAdded, fqn, None),
        };
        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            array: true,
            type_name: desc.type_name,
            version: Some(version),
            ..TypeDescription::default()
        })
    }

    fn versioned(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let versions = desc.versions.unwrap_or_default();
        if versions.is_empty() {
            return Err(SchemaError::MissingDefinition {
                fqn: fqn.to_string(),
                what: "versions",
            });
        }
        if versions.windows(2).any(|w| w[0].version >= w[1].version) {
            return Err(SchemaError::VersionedModified {
                fqn: fqn.to_string(),
                detail: "versions must strictly increase".to_string(),
            });
        }

        let version = match previous {
            Some(prev) => {
                let known = prev.versions.as_deref().unwrap_or_default();
                if versions.len() < known.len() {
                    return Err(SchemaError::VersionedModified {
                        fqn: fqn.to_string(),
                        detail: "entries were removed".to_string(),
                    });
                }
                if let Some((was, _)) = known.iter().zip(&versions).find(|(was, now)| was != now) {
                    return Err(SchemaError::VersionedModified {
                        fqn: fqn.to_string(),
                        detail: format!("entry {} was changed", was.version),
                    });
                }
                let mut version = self.previous_version(prev);
                for added in &versions[known.len()..] {
                    let tag = added.version.to_string();
                    version = version.max(self.stamp(None, ChangeType::VersionAdded, fqn, Some(&tag)));
                }
                version
            }
            None => self.stamp(desc.version, ChangeType::TypeAdded, fqn, None),
        };
        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            versions: Some(versions),
            version: Some(version),
            ..TypeDescription::default()
        })
    }

    fn external(
        &mut self,
        fqn: &str,
        previous: Option<&TypeDescription>,
        desc: TypeDescription,
    ) -> Result<TypeDescription> {
        let version = match previous {
            Some(prev) => {
                if prev.external != desc.external {
                    return Err(SchemaError::ExternalRemapped {
                        fqn: fqn.to_string(),
                        was: prev.external.clone().unwrap_or_default(),
                        now: desc.external.clone().unwrap_or_default(),
                    });
                }
                self.previous_version(prev)
            }
            None => self.stamp(desc.version, ChangeType::TypeAdded, fqn, None),
        };
        Ok(TypeDescription {
            name: desc.name,
            namespace: desc.namespace,
            external: desc.external,
            version: Some(version),
            ..TypeDescription::default()
        })
    }
}

/// Field names of `desc` in declaration order
pub(crate) fn field_names(desc: &TypeDescription) -> impl Iterator<Item = &str> {
    desc.fields
        .iter()
        .flatten()
        .map(|f: &FieldDescription| f.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{FieldDescription, VersionDescription};

    fn live(version: u32) -> Session {
        let mut tracker = VersionTracker::resume(version, true);
        tracker.finish_initializing();
        Session::new(tracker)
    }

    fn point() -> TypeDescription {
        TypeDescription::structure(
            "point",
            vec![
                FieldDescription::new("x", "int").required(),
                FieldDescription::new("y", "int"),
            ],
        )
        .in_namespace("geo")
    }

    #[test]
    fn test_new_struct_is_stamped() {
        let mut session = live(0);
        let desc = session.normalize(None, point()).unwrap();
        assert_eq!(desc.version, Some(1));
        assert_eq!(desc.flags_position, Some(1));
        assert!(desc.fields.unwrap().iter().all(|f| f.version == Some(1)));
        assert_eq!(session.changes.len(), 1);
        assert_eq!(session.changes[0].change_type, ChangeType::TypeAdded);
    }

    #[test]
    fn test_unchanged_struct_keeps_version() {
        let prev = live(0).normalize(None, point()).unwrap();
        let mut session = live(1);
        let again = session.normalize(Some(&prev), point()).unwrap();
        assert_eq!(again, prev);
        assert!(!session.tracker.changed());
        assert!(session.changes.is_empty());
    }

    #[test]
    fn test_appended_field() {
        let prev = live(0).normalize(None, point()).unwrap();
        let mut next = point();
        next.fields
            .as_mut()
            .unwrap()
            .push(FieldDescription::new("z", "int"));
        let mut session = live(1);
        let desc = session.normalize(Some(&prev), next).unwrap();
        let fields = desc.fields.unwrap();
        assert_eq!(fields[0].version, Some(1));
        assert_eq!(fields[2].version, Some(2));
        assert_eq!(desc.version, Some(2));
        assert_eq!(session.changes[0].to_string(), "field added: @geo/point z (v2)");
    }

    #[test]
    fn test_required_bool_downgraded() {
        let desc = TypeDescription::structure(
            "flags",
            vec![
                FieldDescription::new("id", "uint").required(),
                FieldDescription::new("on", "bool").required(),
            ],
        )
        .in_namespace("ns");
        let desc = live(0).normalize(None, desc).unwrap();
        assert!(!desc.fields.unwrap()[1].required);
        assert_eq!(desc.flags_position, Some(1));
    }

    #[test]
    fn test_required_bool_array_stays_required() {
        let desc = TypeDescription::structure(
            "votes",
            vec![FieldDescription::new("ballots", "bool").required().array()],
        )
        .in_namespace("ns");
        let desc = live(0).normalize(None, desc).unwrap();
        assert!(desc.fields.unwrap()[0].required);
        assert_eq!(desc.flags_position, Some(-1));
    }

    #[test]
    fn test_flags_position_after_optional_rejected() {
        let desc = point().with_flags_position(2);
        assert!(matches!(
            live(0).normalize(None, desc),
            Err(SchemaError::InvalidFlagsPosition { position: 2, .. })
        ));
    }

    #[test]
    fn test_versioned_must_increase() {
        let desc = TypeDescription::versioned(
            "v",
            vec![VersionDescription::new(2, "uint"), VersionDescription::new(1, "string")],
        )
        .in_namespace("ns");
        assert!(matches!(
            live(0).normalize(None, desc),
            Err(SchemaError::VersionedModified { .. })
        ));
    }

    #[test]
    fn test_kind_change() {
        let prev = live(0)
            .normalize(None, TypeDescription::alias("id", "uint").in_namespace("ns"))
            .unwrap();
        let next = TypeDescription::array_of("id", "uint").in_namespace("ns");
        assert!(matches!(
            live(1).normalize(Some(&prev), next),
            Err(SchemaError::KindChanged { was: "alias", now: "array", .. })
        ));
    }

    #[test]
    fn test_field_names() {
        let p = point();
        let names: Vec<_> = field_names(&p).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
