//! Attack lists
//!
//! An attack list is an ordered, possibly repeating sequence of
//! `(kind, opts)` pairs. On the wire each element is a map with exactly one
//! key (the attack kind) whose value holds the options:
//!
//! ```yaml
//! attacks:
//!   - noop: {}
//!   - cpu:
//!       cores: 2
//!   - noop: {}
//! ```

use crate::error::ObjectError;
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Free-form attack options
pub type AttackOpts = serde_json::Map<String, serde_json::Value>;

/// One attack of a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackEntry {
    /// Attack kind, resolved through the attack registry
    pub kind: String,
    /// Options handed to the attack constructor
    pub opts: AttackOpts,
}

impl AttackEntry {
    /// Create an attack entry
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>, opts: AttackOpts) -> Self {
        Self {
            kind: kind.into(),
            opts,
        }
    }

    /// Create an attack entry without options
    #[inline]
    #[must_use]
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, AttackOpts::new())
    }
}

/// Ordered attack sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttackList(Vec<AttackEntry>);

impl AttackList {
    /// Create an attack list
    #[inline]
    #[must_use]
    pub fn new(entries: Vec<AttackEntry>) -> Self {
        Self(entries)
    }

    /// Build from decoded wire maps
    ///
    /// # Errors
    /// Returns `ObjectError::AttacksFormat` if any map does not hold exactly
    /// one key.
    pub fn from_maps(maps: Vec<BTreeMap<String, Option<AttackOpts>>>) -> Result<Self, ObjectError> {
        maps.into_iter()
            .map(|map| {
                if map.len() != 1 {
                    return Err(ObjectError::AttacksFormat);
                }
                let (kind, opts) = map.into_iter().next().ok_or(ObjectError::AttacksFormat)?;
                Ok(AttackEntry::new(kind, opts.unwrap_or_default()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Entries in declaration order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[AttackEntry] {
        &self.0
    }

    /// Number of attacks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append an attack
    pub fn push(&mut self, entry: AttackEntry) {
        self.0.push(entry);
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = &AttackEntry> {
        self.0.iter()
    }
}

impl FromIterator<AttackEntry> for AttackList {
    fn from_iter<I: IntoIterator<Item = AttackEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for AttackList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for entry in &self.0 {
            let mut map = BTreeMap::new();
            map.insert(entry.kind.as_str(), &entry.opts);
            seq.serialize_element(&map)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for AttackList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let maps = Vec::<BTreeMap<String, Option<AttackOpts>>>::deserialize(deserializer)?;
        Self::from_maps(maps).map_err(D::Error::custom)
    }
}

/// Hand-written failure definition before rendering
///
/// Unlike [`AttackList`], the attack maps are kept raw so that the shape
/// check happens at render time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureDefinition {
    /// Automatic revert timeout in seconds
    #[serde(default)]
    pub timeout_secs: u64,
    /// Raw attack maps
    #[serde(default)]
    pub attacks: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl FailureDefinition {
    /// Parse a YAML or JSON definition
    ///
    /// # Errors
    /// Returns `ObjectError::Codec` if the source is not a valid definition.
    pub fn from_yaml(source: &str) -> Result<Self, ObjectError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Render into a failure spec
    ///
    /// # Errors
    /// - `ObjectError::AttackMapShape` if an attack map does not hold exactly one key
    /// - `ObjectError::Validation` if attack options are not a map
    pub fn render(&self) -> Result<crate::FailureSpec, ObjectError> {
        let mut attacks = AttackList::default();
        for map in &self.attacks {
            if map.len() != 1 {
                return Err(ObjectError::AttackMapShape);
            }
            let Some((kind, value)) = map.iter().next() else {
                return Err(ObjectError::AttackMapShape);
            };
            let opts = match value {
                serde_json::Value::Null => AttackOpts::new(),
                serde_json::Value::Object(opts) => opts.clone(),
                other => {
                    return Err(ObjectError::validation(format!(
                        "options of attack {kind:?} must be a map, got {other}"
                    )))
                }
            };
            attacks.push(AttackEntry::new(kind.clone(), opts));
        }

        Ok(crate::FailureSpec {
            timeout: Duration::from_secs(self.timeout_secs),
            attacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ATTACKS_FORMAT_ERROR, ATTACK_MAP_SHAPE_ERROR};
    use pretty_assertions::assert_eq;

    #[test]
    fn wire_form_is_list_of_single_maps() {
        let list = AttackList::new(vec![AttackEntry::bare("noop"), AttackEntry::bare("noop")]);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value, serde_json::json!([{"noop": {}}, {"noop": {}}]));
    }

    #[test]
    fn decode_preserves_order_and_repeats() {
        let source = r"
- cpu:
    cores: 2
- noop:
- cpu: {}
";
        let list: AttackList = serde_yaml::from_str(source).unwrap();
        let kinds: Vec<&str> = list.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["cpu", "noop", "cpu"]);
        assert_eq!(list.entries()[0].opts["cores"], 2);
    }

    #[test]
    fn decode_rejects_multi_key_maps() {
        let err = serde_json::from_str::<AttackList>(r#"[{"noop": {}, "cpu": {}}]"#).unwrap_err();
        assert!(err.to_string().contains(ATTACKS_FORMAT_ERROR));
    }

    #[test]
    fn from_maps_rejects_empty_map() {
        let err = AttackList::from_maps(vec![BTreeMap::new()]).unwrap_err();
        assert_eq!(err.to_string(), ATTACKS_FORMAT_ERROR);
    }

    #[test]
    fn render_definition() {
        let definition = FailureDefinition::from_yaml(
            r"
timeout_secs: 30
attacks:
  - noop: {}
  - cpu:
      cores: 1
",
        )
        .unwrap();
        let spec = definition.render().unwrap();
        assert_eq!(spec.timeout, Duration::from_secs(30));
        assert_eq!(spec.attacks.len(), 2);
        assert_eq!(spec.attacks.entries()[1].kind, "cpu");
    }

    #[test]
    fn render_rejects_multi_key_maps() {
        let definition = FailureDefinition::from_yaml(
            r"
attacks:
  - noop: {}
    cpu: {}
",
        )
        .unwrap();
        let err = definition.render().unwrap_err();
        assert_eq!(err.to_string(), ATTACK_MAP_SHAPE_ERROR);
    }
}
