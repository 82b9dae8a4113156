//! # pyfmt - Canonical-Layout Python Formatter
//!
//! pyfmt is a source-to-source pretty-printer for Python written in Rust. It
//! uses [tree-sitter](https://tree-sitter.github.io/tree-sitter/) with the
//! [tree-sitter-python](https://github.com/tree-sitter/tree-sitter-python)
//! grammar to parse source files, lowers the parse tree into a typed syntax
//! tree, and renders it back as canonical text: fixed 4-space indentation, a
//! maximum line width with automatic multi-line re-flow, normalized spacing,
//! and controlled blank-line counts between definitions.
//!
//! It restructures surface syntax only — input is never executed or
//! type-checked.
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```rust
//! use pyfmt::config::Settings;
//! use pyfmt::formatter::format_source;
//!
//! let source = "import os,sys\ndef f(a,b = 1):\n    return a+b\n";
//! let formatted = format_source(source, &Settings::default()).unwrap();
//! assert!(formatted.starts_with("import os\nimport sys\n"));
//! ```
//!
//! ### As a CLI Tool
//!
//! The `pyfmt` binary reformats a target file or every matching file under a
//! directory, in place; `--check-only` reports differences without touching
//! anything. See the `main` module for the full flag set.
//!
//! ## Modules
//!
//! - [`parser`] - Tree-sitter integration and Python source parsing
//! - [`ast`] - The typed syntax tree and operator symbol tables
//! - [`lower`] - Lowering from the tree-sitter CST to the typed tree
//! - [`formatter`] - The rendering core and public API
//! - [`config`] - Settings and configuration-file loading
//!
//! ## Limitations
//!
//! - Comments are not preserved (they are dropped with the rest of the
//!   concrete syntax)
//! - Constructs outside the supported subset (`lambda`, `yield`, `async`,
//!   `match`) are rejected rather than passed through
//! - Files are processed one at a time; there is no parallel mode

/// Tree-sitter based Python source parser
pub mod parser;

/// Typed syntax tree and operator symbol tables
pub mod ast;

/// Lowering from the tree-sitter CST to the typed tree
pub mod lower;

/// Core rendering engine and public API
pub mod formatter;

/// Settings and configuration-file loading
pub mod config;

pub use config::Settings;
pub use formatter::{FormatError, format_source};
