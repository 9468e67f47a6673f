//! # Drift Detection
//!
//! Compares the desired fields of a record with what Harbor reports.
//!
//! Each field carries its comparison rule:
//!
//! - [`FieldValue::Scalar`]: equality
//! - [`FieldValue::Set`]: set equality, order ignored
//! - [`FieldValue::Additive`]: desired must be a subset of observed
//!
//! A field the record does not set is never part of the desired set, so
//! server-assigned defaults are accepted. A desired field Harbor does not
//! report (secrets, write-only settings) is skipped.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(Value),
    Set(BTreeSet<String>),
    Additive(BTreeSet<String>),
}

impl FieldValue {
    fn members(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Set(items) | Self::Additive(items) => Some(items),
            Self::Scalar(_) => None,
        }
    }

    /// Does `observed` satisfy this desired value
    fn satisfied_by(&self, observed: &FieldValue) -> bool {
        match (self, observed) {
            (Self::Scalar(desired), Self::Scalar(actual)) => desired == actual,
            (Self::Set(desired), _) => observed.members() == Some(desired),
            (Self::Additive(desired), _) => observed
                .members()
                .is_some_and(|actual| desired.is_subset(actual)),
            (Self::Scalar(_), _) => false,
        }
    }
}

/// Named fields of one side of the comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeMap<&'static str, FieldValue>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scalar(mut self, name: &'static str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(name, FieldValue::Scalar(value));
        self
    }

    /// Add a scalar only when it is set
    #[must_use]
    pub fn opt_scalar<T: Serialize>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.scalar(name, value),
            None => self,
        }
    }

    #[must_use]
    pub fn set<I, S>(mut self, name: &'static str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(name, FieldValue::Set(items.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn additive<I, S>(mut self, name: &'static str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(
            name,
            FieldValue::Additive(items.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Outcome of one comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Desired values of the fields that differ
    pub changed: FieldSet,
}

impl DriftReport {
    pub fn up_to_date(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Compare desired against observed
pub fn detect(desired: &FieldSet, observed: &FieldSet) -> DriftReport {
    let mut changed = FieldSet::new();
    for (name, wanted) in &desired.0 {
        let Some(actual) = observed.get(name) else {
            continue;
        };
        if !wanted.satisfied_by(actual) {
            changed.insert(*name, wanted.clone());
        }
    }
    DriftReport { changed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_only_fields_do_not_drift() {
        let desired = FieldSet::new().scalar("A", 1).scalar("B", 2);
        let observed = FieldSet::new().scalar("A", 1).scalar("B", 2).scalar("C", 3);
        assert!(detect(&desired, &observed).up_to_date());
    }

    #[test]
    fn test_changed_field_is_reported_alone() {
        let desired = FieldSet::new().scalar("A", 1).scalar("B", 3);
        let observed = FieldSet::new().scalar("A", 1).scalar("B", 2).scalar("C", 3);
        let report = detect(&desired, &observed);
        assert!(!report.up_to_date());
        assert_eq!(report.changed.names().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(
            report.changed.get("B"),
            Some(&FieldValue::Scalar(serde_json::json!(3)))
        );
    }

    #[test]
    fn test_unset_desired_field_is_ignored() {
        let desired = FieldSet::new().opt_scalar::<bool>("public", None);
        let observed = FieldSet::new().scalar("public", true);
        assert!(detect(&desired, &observed).up_to_date());
    }

    #[test]
    fn test_unobserved_field_is_skipped() {
        let desired = FieldSet::new().scalar("accessCredential", "Bearer abc");
        assert!(detect(&desired, &FieldSet::new()).up_to_date());
    }

    #[test]
    fn test_set_ignores_order() {
        let desired = FieldSet::new().set("tags", ["b", "a"]);
        let observed = FieldSet::new().set("tags", ["a", "b"]);
        assert!(detect(&desired, &observed).up_to_date());

        let observed = FieldSet::new().set("tags", ["a", "b", "c"]);
        assert!(!detect(&desired, &observed).up_to_date());
    }

    #[test]
    fn test_additive_accepts_superset() {
        let desired = FieldSet::new().additive("cveAllowlist", ["CVE-2024-1"]);
        let observed = FieldSet::new().set("cveAllowlist", ["CVE-2024-1", "CVE-2024-2"]);
        assert!(detect(&desired, &observed).up_to_date());

        let observed = FieldSet::new().set("cveAllowlist", ["CVE-2024-2"]);
        assert!(!detect(&desired, &observed).up_to_date());
    }
}
