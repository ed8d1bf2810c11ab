//! Convergence evaluation: observed state vs desired state
//!
//! Missing data is never interpreted as success or failure: any desired
//! field absent from the observed snapshot short-circuits the evaluation to
//! Unknown. Divergences, by contrast, are collected across all remaining
//! fields so no failing predicate is hidden behind the first one.

use swarmvet_common::{DesiredState, Expectation, FieldValue, ObservedState, Verdict};

/// Evaluate one entity's observed state against its desired state.
pub fn evaluate(observed: &ObservedState, desired: &DesiredState) -> Verdict {
    let mut divergences: Vec<String> = Vec::new();

    for (name, expectation) in &desired.fields {
        match expectation {
            Expectation::RunningOnAllEligible => {
                let running = match require_count(observed, "replicas_running") {
                    Ok(n) => n,
                    Err(verdict) => return verdict,
                };
                let eligible = match require_count(observed, "eligible_nodes") {
                    Ok(n) => n,
                    Err(verdict) => return verdict,
                };
                if running != eligible {
                    divergences.push(format!(
                        "replicas_running expected {} (one per eligible node) got {}",
                        eligible, running
                    ));
                }
            }
            _ => {
                let value = match observed.get(name) {
                    Some(v) => v,
                    None => return Verdict::Unknown(format!("missing field {}", name)),
                };
                if let Some(reason) = check_field(name, expectation, value) {
                    match reason {
                        FieldOutcome::Diverged(msg) => divergences.push(msg),
                        FieldOutcome::Unknown(msg) => return Verdict::Unknown(msg),
                    }
                }
            }
        }
    }

    if divergences.is_empty() {
        Verdict::Converged
    } else {
        Verdict::Diverged(divergences.join("; "))
    }
}

enum FieldOutcome {
    Diverged(String),
    Unknown(String),
}

/// Check a single field predicate. Returns None when satisfied.
fn check_field(
    name: &str,
    expectation: &Expectation,
    value: &FieldValue,
) -> Option<FieldOutcome> {
    match (expectation, value) {
        (Expectation::Equals(want), FieldValue::Str(got)) => {
            if want == got {
                None
            } else {
                Some(FieldOutcome::Diverged(format!(
                    "{} expected {} got {}",
                    name, want, got
                )))
            }
        }
        // Exact equality: extra replicas are still divergence
        (Expectation::ReplicaCount(want), FieldValue::Count(got)) => {
            if want == got {
                None
            } else {
                Some(FieldOutcome::Diverged(format!(
                    "{} expected {} got {}",
                    name, want, got
                )))
            }
        }
        // Subset containment: external tooling may add its own labels
        (Expectation::LabelsInclude(want), FieldValue::Labels(got)) => {
            let missing: Vec<&str> = want
                .iter()
                .filter(|l| !got.contains(*l))
                .map(String::as_str)
                .collect();
            if missing.is_empty() {
                None
            } else {
                Some(FieldOutcome::Diverged(format!(
                    "{} missing {{{}}}",
                    name,
                    missing.join(", ")
                )))
            }
        }
        // A type mismatch means the control plane answered something we
        // cannot judge; treat it like missing data
        (_, got) => Some(FieldOutcome::Unknown(format!(
            "field {} has unexpected type (got {})",
            name, got
        ))),
    }
}

fn require_count(observed: &ObservedState, name: &str) -> Result<u64, Verdict> {
    match observed.get(name) {
        Some(FieldValue::Count(n)) => Ok(*n),
        Some(other) => Err(Verdict::Unknown(format!(
            "field {} has unexpected type (got {})",
            name, other
        ))),
        None => Err(Verdict::Unknown(format!("missing field {}", name))),
    }
}
