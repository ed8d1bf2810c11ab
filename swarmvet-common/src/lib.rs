//! Common types shared between swarmvet-core and swarmvet-cli

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Kind of cluster object subject to health evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Service,
    Network,
    Volume,
    #[serde(rename = "probe")]
    ConnectivityProbe,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Service => write!(f, "service"),
            Self::Network => write!(f, "network"),
            Self::Volume => write!(f, "volume"),
            Self::ConnectivityProbe => write!(f, "probe"),
        }
    }
}

/// A named cluster object: identity only, state is attached externally
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: String,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn node(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Node, id)
    }

    pub fn service(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Service, id)
    }

    pub fn network(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Network, id)
    }

    pub fn volume(id: impl Into<String>) -> Self {
        Self::new(EntityKind::Volume, id)
    }

    pub fn probe(id: impl Into<String>) -> Self {
        Self::new(EntityKind::ConnectivityProbe, id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A single observed attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u64),
    Str(String),
    Labels(BTreeSet<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Count(n) => write!(f, "{}", n),
            Self::Labels(labels) => {
                let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", joined.join(", "))
            }
        }
    }
}

/// Snapshot of an entity's current state as reported by the control plane.
/// Produced fresh on every query; never mutated, only replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedState {
    pub entity: Entity,
    pub fields: BTreeMap<String, FieldValue>,
    pub fetched_at: DateTime<Utc>,
}

impl ObservedState {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            fields: BTreeMap::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Predicate an observed field must satisfy for convergence.
///
/// Counts use exact equality, labels use set containment (extra observed
/// labels are permitted because external tooling may add its own), strings
/// use exact match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expectation {
    /// String field must match exactly
    Equals(String),
    /// Count field must match exactly (extra replicas are still divergence)
    ReplicaCount(u64),
    /// Global service mode: running task count must equal the number of
    /// eligible nodes reported by the control plane
    RunningOnAllEligible,
    /// Desired labels must be a subset of observed labels
    LabelsInclude(BTreeSet<String>),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(s) => write!(f, "{}", s),
            Self::ReplicaCount(n) => write!(f, "{}", n),
            Self::RunningOnAllEligible => write!(f, "one task per eligible node"),
            Self::LabelsInclude(labels) => {
                let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
                write!(f, "at least {{{}}}", joined.join(", "))
            }
        }
    }
}

/// Target state for an entity, built once per run from caller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredState {
    pub entity: Entity,
    pub fields: BTreeMap<String, Expectation>,
}

impl DesiredState {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            fields: BTreeMap::new(),
        }
    }

    pub fn expect(mut self, field: impl Into<String>, expectation: Expectation) -> Self {
        self.fields.insert(field.into(), expectation);
        self
    }
}

/// Tri-state convergence verdict for one entity.
///
/// Unknown means the control plane could not answer (timeout, malformed
/// response, missing field) and must never be treated as Converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    Converged,
    Diverged(String),
    Unknown(String),
}

impl Verdict {
    pub fn is_converged(&self) -> bool {
        matches!(self, Verdict::Converged)
    }

    /// Reason string for non-converged verdicts
    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Converged => None,
            Verdict::Diverged(r) | Verdict::Unknown(r) => Some(r),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Converged => write!(f, "converged"),
            Verdict::Diverged(r) => write!(f, "diverged: {}", r),
            Verdict::Unknown(r) => write!(f, "unknown: {}", r),
        }
    }
}

/// Ordered severity classification.
///
/// The derived ordering is part of the contract for programmatic callers:
/// Info < Ok < Warning < Error. Variant order must not be rearranged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// Exit code for scripting callers: 0 fully healthy, nonzero ordered
    /// by severity (Error 1, Warning 2)
    pub fn exit_code(&self) -> i32 {
        match self {
            Severity::Info | Severity::Ok => 0,
            Severity::Error => 1,
            Severity::Warning => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Ok => write!(f, "ok"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one entity check.
///
/// `entity` is None only for run-level notes that concern no single
/// cluster object, such as a run with nothing configured to check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    pub verdict: Verdict,
    pub severity: Severity,
    pub message: String,
}

impl CheckResult {
    /// Run-level informational note
    pub fn note(message: impl Into<String>) -> Self {
        Self {
            entity: None,
            verdict: Verdict::Converged,
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

/// Ordered collection of check results for one health run.
///
/// Insertion order is the pipeline order and is preserved for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub results: Vec<CheckResult>,
}

impl AggregateReport {
    pub fn new(results: Vec<CheckResult>) -> Self {
        Self { results }
    }

    /// Overall severity: maximum across all results, never below Ok so an
    /// empty report (nothing to check) is still fully healthy
    pub fn overall(&self) -> Severity {
        self.results
            .iter()
            .fold(Severity::Ok, |acc, r| acc.max(r.severity))
    }

    pub fn is_healthy(&self) -> bool {
        self.overall() <= Severity::Ok
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Bounded retry allowance for convergence verification.
///
/// Consumed across attempts of a single verification call; never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryBudget {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff before re-polling after the given 0-based attempt:
    /// min(base_delay * 2^attempt, max_delay)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Control-plane communication failures.
///
/// Never fatal to a health run: the aggregator folds these into an
/// Unknown/Error check result.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("control plane unreachable: {0}")]
    Unreachable(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed control plane response: {0}")]
    Malformed(String),
}

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied incomplete desired-state rules; fatal, aborts
    /// before any query is issued
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
