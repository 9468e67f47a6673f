//! # Identity Correlation
//!
//! The `crossplane.io/external-name` annotation ties a record to the Harbor
//! object it manages. Its value is `<kind>/<id>`, e.g. `robots/42` or
//! `scanners/2f0e...`. A leading `/` is accepted for values written by
//! older releases.
//!
//! Malformed values are reported, never discarded: dropping the annotation
//! would let adoption bind the record to a different object.

use super::error::ReconcileError;
use std::fmt::{Debug, Display};
use std::marker::PhantomData;

/// Harbor-side identifier of one kind
pub trait ExternalId: Clone + Debug + Display + PartialEq + Send + Sync + 'static {
    fn parse(raw: &str) -> Result<Self, String>;
}

impl ExternalId for i64 {
    fn parse(raw: &str) -> Result<Self, String> {
        let id: i64 = raw
            .parse()
            .map_err(|e| format!("'{raw}' is not a numeric id: {e}"))?;
        if id <= 0 {
            return Err(format!("id must be positive, got {id}"));
        }
        Ok(id)
    }
}

impl ExternalId for uuid::Uuid {
    fn parse(raw: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(raw).map_err(|e| format!("'{raw}' is not a UUID: {e}"))
    }
}

/// Encodes and decodes annotation values for one kind
#[derive(Debug, Clone, Copy)]
pub struct Correlator<I> {
    prefix: &'static str,
    _id: PhantomData<fn() -> I>,
}

impl<I: ExternalId> Correlator<I> {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            _id: PhantomData,
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn encode(&self, id: &I) -> String {
        format!("{}/{}", self.prefix, id)
    }

    pub fn decode(&self, value: &str) -> Result<I, ReconcileError> {
        let trimmed = value.strip_prefix('/').unwrap_or(value);
        let Some((prefix, raw)) = trimmed.split_once('/') else {
            return Err(ReconcileError::correlation(
                value,
                format!("expected '{}/<id>'", self.prefix),
            ));
        };
        if prefix != self.prefix {
            return Err(ReconcileError::correlation(
                value,
                format!("refers to '{prefix}', expected '{}'", self.prefix),
            ));
        }
        I::parse(raw).map_err(|reason| ReconcileError::correlation(value, reason))
    }
}

/// Check that `proposed` may be written over the record's `current` value
///
/// Rebinding is only allowed on the recreation path, where Create has just
/// replaced an object that was observed gone.
pub fn check_binding(
    current: Option<&str>,
    proposed: &str,
    allow_rebind: bool,
) -> Result<(), ReconcileError> {
    match current {
        Some(existing) if existing != proposed && !allow_rebind => {
            Err(ReconcileError::correlation(
                existing,
                format!("record is already bound; refusing to rebind to '{proposed}'"),
            ))
        }
        _ => Ok(()),
    }
}
