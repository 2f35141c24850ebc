//! Directive representation shared by the parser stages

use crate::parser::lexer::Location;
use std::fmt;

/// One directive argument
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub value: String,
    pub quote: Option<char>,
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quote {
            Some(q) => write!(f, "{q}{}{q}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// How a directive was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `;`
    Semicolon,
    /// `{`, opens a block
    Block,
    /// Hit `}` or end of input first
    Missing,
}

/// A directive name with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<Arg>,
    pub terminator: Terminator,
    pub span: Location,
    pub line: usize,
}

impl Directive {
    /// Argument value at `index`
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|a| a.value.as_str())
    }

    /// All argument values
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|a| a.value.as_str())
    }

    /// Argument values joined by single spaces
    pub fn joined(&self) -> String {
        self.values().collect::<Vec<_>>().join(" ")
    }

    /// Whether the first argument is `on`
    pub fn is_on(&self) -> bool {
        self.arg(0).is_some_and(|v| v.eq_ignore_ascii_case("on"))
    }

    /// Name and arguments as written, without the terminator
    pub fn header(&self) -> String {
        let mut out = self.name.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string());
        }
        out
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_rendering_keeps_quotes() {
        let directive = Directive {
            name: "add_header".to_string(),
            args: vec![
                Arg { value: "X-Test".to_string(), quote: None },
                Arg { value: "a b".to_string(), quote: Some('"') },
            ],
            terminator: Terminator::Semicolon,
            span: Location::default(),
            line: 1,
        };
        assert_eq!(directive.to_string(), r#"add_header X-Test "a b";"#);
        assert_eq!(directive.joined(), "X-Test a b");
    }
}
