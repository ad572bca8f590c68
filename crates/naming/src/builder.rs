//! Identifier builder: deterministic names and tags

use crate::context::{NamingContext, environment_code, location_code, sanitize};
use crate::error::{NamingError, Result};
use crate::kind::ResourceKind;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Longest name any supported kind accepts (storage accounts: 3-24 chars)
pub const MAX_NAME_LEN: usize = 24;

/// Tag key always set by the builder
pub const SCOPE_TAG: &str = "scope";

/// A derived resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub name: String,
    pub tags: Tags,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Resource tags.
///
/// Keys set by the builder are reserved: callers can add entries but not
/// change those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: BTreeMap<String, String>,
    reserved: BTreeSet<String>,
}

impl Tags {
    fn reserved_entry(key: &str, value: &str) -> Self {
        let mut tags = Self::default();
        tags.entries.insert(key.to_string(), value.to_string());
        tags.reserved.insert(key.to_string());
        tags
    }

    /// Merge caller-supplied tags.
    ///
    /// Re-stating a reserved tag with the same value is accepted; any other
    /// value is a [`NamingError::TagConflict`]. Nothing is applied on error.
    pub fn merge<K, V, I>(&mut self, extra: I) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let extra: Vec<(String, String)> = extra
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (key, value) in &extra {
            if let Some(existing) = self.entries.get(key)
                && self.reserved.contains(key)
                && existing != value
            {
                return Err(NamingError::TagConflict {
                    key: key.clone(),
                    existing: existing.clone(),
                    attempted: value.clone(),
                });
            }
        }

        self.entries.extend(extra);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Plain map view, e.g. for handing to a backend
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Build the identifier for a type tag given as a string.
///
/// Fails with [`NamingError::UnknownKind`] when the tag is not part of the
/// vocabulary.
pub fn build(context: &NamingContext, type_tag: &str, sequence: u32) -> Result<Identifier> {
    let kind: ResourceKind = type_tag.parse()?;
    build_kind(context, kind, sequence)
}

/// Build the identifier for a known kind.
///
/// Layout: `{company}{environment}{location}{scope}{tag}{sequence}`, all
/// lowercase alphanumeric. When that exceeds [`MAX_NAME_LEN`], company and
/// scope are shortened (longest first); the remaining parts, including the
/// sequence, are kept whole so sibling names stay distinct.
pub fn build_kind(context: &NamingContext, kind: ResourceKind, sequence: u32) -> Result<Identifier> {
    let env = environment_code(context.environment());
    let location = location_code(context.location());
    let suffix = format!("{}{:02}", kind.tag(), sequence);

    let fixed = env.len() + location.len() + suffix.len();
    let budget = MAX_NAME_LEN.saturating_sub(fixed);

    let mut company = sanitize(context.company_code());
    let mut scope = sanitize(context.scope());
    while company.len() + scope.len() > budget {
        if scope.len() >= company.len() {
            scope.pop();
        } else {
            company.pop();
        }
    }

    let name = format!("{company}{env}{location}{scope}{suffix}");
    if name.is_empty() {
        return Err(NamingError::EmptyName {
            tag: kind.tag().to_string(),
        });
    }

    Ok(Identifier {
        name,
        tags: Tags::reserved_entry(SCOPE_TAG, context.scope()),
    })
}
