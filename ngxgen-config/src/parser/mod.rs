//! Parser module for nginx configuration text
//!
//! This module provides the lexer, directive representation and the
//! frame-stack parser that imports nginx text into the model.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Arg, Directive, Terminator};
pub use lexer::{tokenize, Location, Spanned, Token};
pub use parser::{parse, ParseError, ParseOutput, Parser};
