//! Report rendering for human and scripting consumption

use std::fmt::Write;
use swarmvet_common::{AggregateReport, CheckResult, Severity, Verdict};

/// Rendered health report: text for humans, exit code for scripts.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub text: String,
    pub exit_code: i32,
}

/// Result symbol used in text output
pub fn symbol(result: &CheckResult) -> &'static str {
    if result.severity == Severity::Info {
        return "ℹ";
    }
    match result.verdict {
        Verdict::Converged => "✓",
        Verdict::Diverged(_) => "✗",
        Verdict::Unknown(_) => "?",
    }
}

/// Render the report in pipeline order, one line per check, plus a
/// trailing overall line. Always produces output, even for an empty or
/// partially failed run.
pub fn render(report: &AggregateReport) -> RenderedReport {
    let mut text = String::new();

    if report.is_empty() {
        text.push_str("ℹ nothing to check\n");
    }

    for result in &report.results {
        let (kind, id) = match &result.entity {
            Some(entity) => (entity.kind.to_string(), entity.id.as_str()),
            None => ("-".to_string(), "-"),
        };
        let _ = writeln!(
            text,
            "{} {:<8} {:<24} [{}] {}",
            symbol(result),
            kind,
            id,
            result.severity,
            result.message
        );
    }

    let overall = report.overall();
    let _ = writeln!(text, "overall: {}", overall);

    RenderedReport {
        text,
        exit_code: overall.exit_code(),
    }
}
