///! Output formatting for CLI
///!
///! Renders health reports as plain text, a table, JSON, or YAML, and
///! provides the colored status helpers used across commands.

use colored::Colorize;
use serde::Serialize;
use swarmvet_common::{AggregateReport, CheckResult, Severity};
use swarmvet_core::{report, RenderedReport};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "table" => OutputFormat::Table,
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "MESSAGE")]
    message: String,
}

impl From<&CheckResult> for CheckRow {
    fn from(result: &CheckResult) -> Self {
        let (kind, id) = match &result.entity {
            Some(entity) => (entity.kind.to_string(), entity.id.clone()),
            None => ("-".to_string(), "-".to_string()),
        };
        Self {
            kind,
            id,
            severity: result.severity.to_string(),
            message: format!("{} {}", report::symbol(result), result.message),
        }
    }
}

/// Machine-readable report wrapper for JSON/YAML output
#[derive(Serialize)]
struct ReportDocument<'a> {
    overall: Severity,
    exit_code: i32,
    results: &'a [CheckResult],
}

/// Print a health report in the requested format
pub fn print_report(
    report: &AggregateReport,
    rendered: &RenderedReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let document = ReportDocument {
        overall: report.overall(),
        exit_code: rendered.exit_code,
        results: &report.results,
    };

    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Table => print_table(report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&document)?),
    }

    Ok(())
}

fn print_text(report: &AggregateReport) {
    if report.is_empty() {
        print_info("nothing to check");
    }

    for result in &report.results {
        let (kind, id) = match &result.entity {
            Some(entity) => (entity.kind.to_string(), entity.id.clone()),
            None => ("-".to_string(), "-".to_string()),
        };
        let line = format!(
            "{} {:<8} {:<24} [{}] {}",
            report::symbol(result),
            kind,
            id,
            result.severity,
            result.message
        );
        match result.severity {
            Severity::Error => println!("{}", line.red()),
            Severity::Warning => println!("{}", line.yellow()),
            _ => println!("{}", line),
        }
    }

    let overall = report.overall();
    let overall_line = format!("overall: {}", overall);
    match overall {
        Severity::Error => println!("{}", overall_line.red().bold()),
        Severity::Warning => println!("{}", overall_line.yellow().bold()),
        _ => println!("{}", overall_line.green().bold()),
    }
}

fn print_table(report: &AggregateReport) {
    if report.is_empty() {
        println!("{}", "No checks configured".yellow());
        return;
    }

    let rows: Vec<CheckRow> = report.results.iter().map(CheckRow::from).collect();
    println!("{}", Table::new(rows));
    println!("overall: {}", report.overall());
}

/// Print a success message with green checkmark
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print an error message with red X
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message with blue i
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmvet_common::{Entity, Verdict};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("YAML"), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_str("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_check_row_carries_symbol() {
        let result = CheckResult {
            entity: Some(Entity::service("web")),
            verdict: Verdict::Diverged("replicas_running expected 3 got 2".to_string()),
            severity: Severity::Error,
            message: "replicas_running expected 3 got 2".to_string(),
        };

        let row = CheckRow::from(&result);
        assert_eq!(row.kind, "service");
        assert!(row.message.starts_with("✗"));
    }

    #[test]
    fn test_check_row_for_run_note_has_placeholder_entity() {
        let row = CheckRow::from(&CheckResult::note("nothing to check"));
        assert_eq!(row.kind, "-");
        assert_eq!(row.id, "-");
        assert!(row.message.starts_with("ℹ"));
    }
}
