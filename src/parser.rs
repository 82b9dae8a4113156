//! Python source parsing using tree-sitter
//!
//! Thin wrapper around the [tree-sitter-python](https://github.com/tree-sitter/tree-sitter-python)
//! grammar. The formatter does not consume the tree-sitter CST directly; see
//! [`crate::lower`] for the conversion into the typed tree.
//!
//! Unlike an editor integration, a formatter must not work from a tree that
//! contains error nodes: rewriting a file based on a partial parse would
//! corrupt it. [`parse`] therefore rejects any tree with syntax errors.

use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use tree_sitter::{Language, Node, Parser, Tree};

/// The Python language definition for tree-sitter, initialized lazily.
pub static PYTHON_LANGUAGE: Lazy<Language> = Lazy::new(|| tree_sitter_python::LANGUAGE.into());

/// Parse Python source code into a concrete syntax tree.
///
/// # Errors
///
/// Fails if tree-sitter cannot produce a tree at all, or if the produced tree
/// contains syntax errors (reported with the line and column of the first
/// offending node). A file that fails here is left untouched by the driver.
pub fn parse(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&PYTHON_LANGUAGE)?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("failed to parse Python source"))?;
    if tree.root_node().has_error() {
        if let Some(node) = first_error_node(tree.root_node()) {
            let pos = node.start_position();
            bail!(
                "syntax error at line {}, column {}",
                pos.row + 1,
                pos.column + 1
            );
        }
        bail!("syntax error");
    }
    Ok(tree)
}

fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error_node(child) {
                return Some(found);
            }
        }
    }
    None
}
