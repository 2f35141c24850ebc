//! Terminal output for parse errors and analysis findings

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use ngxgen_config::{LintReport, ParseError, Severity, ValidationWarning};

/// Print parse errors against the source with ariadne
pub fn parse_errors(filename: &str, source: &str, errors: &[ParseError]) {
    if errors.is_empty() {
        return;
    }

    let config = Config::default()
        .with_compact(false)
        .with_index_type(IndexType::Byte);
    let mut cache = (filename, Source::from(source));

    for error in errors {
        // Clamp to the source so truncated input cannot panic the renderer
        let start = error.span.start.min(source.len());
        let end = error.span.end.min(source.len()).max(start);

        Report::build(ReportKind::Error, (filename, start..end))
            .with_config(config)
            .with_message(&error.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(format!("line {}", error.line))
                    .with_color(Color::Red),
            )
            .finish()
            .eprint(&mut cache)
            .ok();
    }
}

fn marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "❌",
        Severity::Warning => "⚠️ ",
        Severity::Info => "ℹ️ ",
    }
}

/// One line per validation finding
pub fn validation(findings: &[ValidationWarning]) {
    if findings.is_empty() {
        println!("✅ No validation findings");
        return;
    }
    for finding in findings {
        println!(
            "{} {:<7} {}: {}",
            marker(finding.severity),
            finding.severity,
            finding.field,
            finding.message
        );
    }
}

/// Score header followed by each violated rule
pub fn lint(report: &LintReport) {
    let verdict = if report.valid { "✅" } else { "❌" };
    println!(
        "{} Score {}/100 ({} errors, {} warnings, {} info)",
        verdict, report.score, report.counts.error, report.counts.warning, report.counts.info
    );
    for result in &report.results {
        let fix = if result.has_fix { " [fixable]" } else { "" };
        println!(
            "{} {} ({}, {}){}",
            marker(result.severity),
            result.title,
            result.rule_id,
            result.category,
            fix
        );
        println!("     {}", result.message);
        println!("     see {}", result.docs_url);
    }
}
