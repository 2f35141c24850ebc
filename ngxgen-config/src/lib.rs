//! ngxgen configuration engine
//!
//! Bidirectional conversion between nginx configuration text and the
//! [`NginxConfig`] model, plus the two analysis passes that run over the
//! model.
//!
//! # Example
//!
//! ```rust
//! use ngxgen_config::{generate, lint, parse};
//!
//! let source = r#"
//!     server {
//!         listen 80;
//!         server_name example.com;
//!         location / {
//!             proxy_pass http://127.0.0.1:3000;
//!         }
//!     }
//! "#;
//!
//! let imported = parse(source);
//! assert!(imported.parse_errors.is_empty());
//!
//! let report = lint(&imported.config);
//! assert!(report.score <= 100);
//!
//! let output = generate(&imported.config);
//! assert!(output.text.contains("proxy_pass http://127.0.0.1:3000;"));
//! ```

pub mod generator;
pub mod linter;
pub mod parser;
pub mod validator;

pub use generator::{generate, GenerateOutput};
pub use linter::{
    apply_fix, find_rule, fix_patch, lint, Category, FixOutcome, LintCounts, LintError,
    LintReport, LintResult, LintRule, RULES,
};
pub use parser::{parse, tokenize, ParseError, ParseOutput, Parser, Spanned, Token};
pub use validator::{validate, Severity, ValidationWarning};

pub use ngxgen_core::config::NginxConfig;

use std::path::Path;

/// Input that cannot be handled as configuration text at all
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input is not UTF-8 text: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse raw bytes, failing only when they are not text
pub fn parse_bytes(bytes: &[u8]) -> Result<ParseOutput, Error> {
    let source = std::str::from_utf8(bytes)?;
    Ok(parse(source))
}

/// Read and parse an nginx configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParseOutput, Error> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes)
}
