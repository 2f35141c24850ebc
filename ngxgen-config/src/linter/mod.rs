//! Rule-based linting with scoring and auto-fix
//!
//! Every rule in [`rules::RULES`] is a predicate over the model paired with
//! an optional fix that produces a [`ConfigPatch`]. Rules run independently:
//! a rule that panics is logged and skipped, the rest of the report is still
//! produced.

mod rules;

pub use rules::RULES;

use crate::generator::{generate, GenerateOutput};
use crate::validator::Severity;
use ngxgen_core::config::{ConfigPatch, NginxConfig};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

const ERROR_PENALTY: u32 = 20;
const WARNING_PENALTY: u32 = 10;
const INFO_PENALTY: u32 = 2;

/// Rule grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Security,
    Performance,
    Correctness,
    BestPractice,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Correctness => "correctness",
            Category::BestPractice => "best-practice",
        })
    }
}

/// A lint rule
///
/// `test` returns true when the model violates the rule.
pub struct LintRule {
    pub id: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub test: fn(&NginxConfig) -> bool,
    pub fix: Option<fn(&NginxConfig) -> ConfigPatch>,
    /// Documentation path for the rule
    pub docs_url: &'static str,
}

impl fmt::Debug for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LintRule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("has_fix", &self.fix.is_some())
            .finish()
    }
}

/// One violated rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintResult {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub title: &'static str,
    pub message: &'static str,
    pub category: Category,
    pub has_fix: bool,
    pub docs_url: &'static str,
}

/// Violations per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LintCounts {
    pub error: u32,
    pub warning: u32,
    pub info: u32,
}

impl LintCounts {
    /// 100 minus the weighted penalties, floored at 0
    pub fn score(&self) -> u8 {
        let penalty = self
            .error
            .saturating_mul(ERROR_PENALTY)
            .saturating_add(self.warning.saturating_mul(WARNING_PENALTY))
            .saturating_add(self.info.saturating_mul(INFO_PENALTY));
        100u32.saturating_sub(penalty) as u8
    }

    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Aggregated lint outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintReport {
    /// No error-severity violations
    pub valid: bool,
    pub score: u8,
    pub results: Vec<LintResult>,
    pub counts: LintCounts,
}

/// Errors from [`apply_fix`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LintError {
    #[error("unknown lint rule: {0}")]
    UnknownRule(String),

    #[error("lint rule {0} has no automatic fix")]
    NoFix(String),

    #[error("fix for lint rule {0} panicked")]
    FixPanicked(String),
}

/// A fixed model with its regenerated text
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub config: NginxConfig,
    pub output: GenerateOutput,
}

/// Look up a rule by id
pub fn find_rule(id: &str) -> Option<&'static LintRule> {
    RULES.iter().find(|rule| rule.id == id)
}

/// Run every rule against the model
pub fn lint(config: &NginxConfig) -> LintReport {
    lint_with(RULES, config)
}

fn lint_with(rules: &[LintRule], config: &NginxConfig) -> LintReport {
    let mut results = Vec::new();
    let mut counts = LintCounts::default();

    for rule in rules {
        let violated = match catch_unwind(AssertUnwindSafe(|| (rule.test)(config))) {
            Ok(violated) => violated,
            Err(_) => {
                tracing::error!(rule = rule.id, "lint rule panicked, skipping");
                continue;
            }
        };
        if !violated {
            continue;
        }
        counts.record(rule.severity);
        results.push(LintResult {
            rule_id: rule.id,
            severity: rule.severity,
            title: rule.title,
            message: rule.message,
            category: rule.category,
            has_fix: rule.fix.is_some(),
            docs_url: rule.docs_url,
        });
    }

    tracing::debug!(violations = results.len(), score = counts.score(), "lint finished");

    LintReport {
        valid: counts.error == 0,
        score: counts.score(),
        results,
        counts,
    }
}

/// Patch produced by a rule's fix
pub fn fix_patch(config: &NginxConfig, rule_id: &str) -> Result<ConfigPatch, LintError> {
    let rule = find_rule(rule_id).ok_or_else(|| LintError::UnknownRule(rule_id.to_string()))?;
    let fix = rule.fix.ok_or_else(|| LintError::NoFix(rule_id.to_string()))?;
    catch_unwind(AssertUnwindSafe(|| fix(config))).map_err(|_| {
        tracing::error!(rule = rule_id, "lint fix panicked");
        LintError::FixPanicked(rule_id.to_string())
    })
}

/// Merge a rule's fix into the model and regenerate the text
pub fn apply_fix(config: &NginxConfig, rule_id: &str) -> Result<FixOutcome, LintError> {
    let patch = fix_patch(config, rule_id)?;
    let fixed = config.merged(&patch);
    let output = generate(&fixed);
    Ok(FixOutcome { config: fixed, output })
}
