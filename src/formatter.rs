//! Core rendering engine
//!
//! Transforms the typed syntax tree into canonical source text: one renderer
//! per file owning the output sink, the line buffer, the indentation/scope
//! stack, and the re-flow state. Nothing here is shared between files, so
//! concurrent callers only need one [`Renderer`] per input.
//!
//! Layout decisions live in three places:
//!
//! - `statement_line` renders a statement's compact form into the line
//!   buffer, checks it against the width budget, and re-renders the statement
//!   exactly once in expanded mode when the budget is breached;
//! - `render_delimited` switches list-like constructs (argument lists,
//!   parameter lists, collection displays, import name lists) between the
//!   `", "`-joined compact form and the one-element-per-line expanded form;
//! - `render_body` applies the blank-line policy between sibling statements.

use thiserror::Error;

use crate::ast::*;
use crate::config::Settings;
use crate::lower::lower_module;
use crate::parser::parse;

/// Spaces per indentation level.
pub const INDENT_WIDTH: usize = 4;

/// Expression nesting beyond this depth aborts the file instead of risking
/// stack exhaustion during re-rendering.
const MAX_EXPR_DEPTH: usize = 100;

/// Failures produced by the formatting core.
///
/// Parse failures surface from [`crate::parser::parse`] before lowering;
/// everything here is raised while lowering or rendering an already-parsed
/// tree. Construct renderers never catch: errors propagate to the driver,
/// which isolates them per file.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A construct outside the supported grammar subset. Dropping it
    /// silently would corrupt the output, so the file is rejected.
    #[error("unsupported syntax: {0}")]
    Unsupported(String),
    /// The recursion guard tripped while (re-)rendering a statement.
    #[error("could not satisfy line-width constraint: expression nesting too deep")]
    NestingTooDeep,
}

type Result<T> = std::result::Result<T, FormatError>;

/// Format Python source code into its canonical layout.
///
/// This is the main entry point: parses the input with tree-sitter, lowers
/// the CST into the typed tree, and renders it. The result always ends with
/// a single trailing newline (unless the input is empty).
///
/// # Errors
///
/// Fails on syntax errors, on constructs outside the supported subset, and
/// when the nesting guard trips. A failed file is never partially written.
pub fn format_source(source: &str, settings: &Settings) -> anyhow::Result<String> {
    let tree = parse(source)?;
    let module = lower_module(&tree, source)?;
    Ok(format_module(&module, settings)?)
}

/// Render an already-lowered module. State is created fresh per call: no
/// line-length or indentation state leaks between files.
pub fn format_module(module: &Module, settings: &Settings) -> Result<String> {
    let mut renderer = Renderer::new(settings);
    renderer.render_module(module)?;
    Ok(renderer.finish())
}

struct Renderer<'a> {
    settings: &'a Settings,
    /// Flushed output for the whole file.
    out: String,
    /// The physical line currently being built.
    line: String,
    /// Indentation is injected lazily, once, on the first append after a
    /// line break.
    at_line_start: bool,
    /// Current indentation level (units of [`INDENT_WIDTH`]).
    indent: usize,
    /// One entry per enclosing block body; empty means module level.
    nested: Vec<bool>,
    /// Set while re-rendering an overflowing statement in expanded mode.
    overflow: bool,
    /// Depth inside an operator chain; only the outermost application wraps
    /// in parentheses when expanded.
    chain_depth: usize,
    depth: usize,
}

impl<'a> Renderer<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            out: String::new(),
            line: String::new(),
            at_line_start: true,
            indent: 0,
            nested: Vec::new(),
            overflow: false,
            chain_depth: 0,
            depth: 0,
        }
    }

    fn finish(mut self) -> String {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out
    }

    // ---- line buffer ----

    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.indent * INDENT_WIDTH {
                self.line.push(' ');
            }
            self.at_line_start = false;
        }
        self.line.push_str(text);
    }

    fn end_line(&mut self) {
        self.out.push_str(&self.line);
        self.out.push('\n');
        self.line.clear();
        self.at_line_start = true;
    }

    fn blank_lines(&mut self, count: usize) {
        for _ in 0..count {
            self.out.push('\n');
        }
    }

    /// True while every physical line in the buffer is within budget.
    /// Verbatim literals may carry embedded newlines, so the buffer is
    /// checked segment-wise.
    fn fits(&self) -> bool {
        self.line
            .split('\n')
            .all(|segment| segment.chars().count() <= self.settings.max_line)
    }

    // ---- re-flow engine ----

    /// Render one logical line. The compact form is built first; if it
    /// breaches the width budget the buffer is abandoned and the statement
    /// is re-rendered exactly once with `overflow` set, letting every
    /// expandable construct on the line switch to its multi-line form.
    /// A statement whose expanded form still overflows is accepted as-is.
    fn statement_line<F>(&mut self, render: F) -> Result<()>
    where
        F: Fn(&mut Self) -> Result<()>,
    {
        debug_assert!(self.line.is_empty());
        self.overflow = false;
        self.chain_depth = 0;
        render(self)?;
        if self.fits() {
            self.end_line();
            return Ok(());
        }
        self.line.clear();
        self.at_line_start = true;
        self.overflow = true;
        self.chain_depth = 0;
        let result = render(self);
        self.overflow = false;
        result?;
        self.end_line();
        Ok(())
    }

    // ---- indentation & scope stack ----

    /// Scoped enter/exit around a block body: indentation and the nested
    /// flag are restored on every exit path, including early returns.
    fn with_scope<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.indent += 1;
        self.nested.push(true);
        let result = f(self);
        self.nested.pop();
        self.indent -= 1;
        result
    }

    /// Indentation without a scope: used for expanded element lists, which
    /// indent one unit but do not open a block.
    fn with_indent<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    fn at_module_level(&self) -> bool {
        self.nested.is_empty()
    }

    // ---- blank-line policy & bodies ----

    fn render_module(&mut self, module: &Module) -> Result<()> {
        self.render_body(&module.body)
    }

    fn render_body(&mut self, body: &[Stmt]) -> Result<()> {
        for (i, stmt) in body.iter().enumerate() {
            let last = i + 1 == body.len();
            // Definitions are visually set off at module level even when the
            // preceding sibling is ordinary code.
            if i > 0
                && self.at_module_level()
                && stmt.is_definition()
                && !body[i - 1].is_definition()
            {
                self.blank_lines(self.settings.vertical_definition_lines);
            }
            if i == 0 && self.at_module_level() && self.out.is_empty() {
                if let Stmt::Expr(Expr::Literal(text)) = stmt {
                    if is_string_literal(text) {
                        self.render_docstring(text);
                        continue;
                    }
                }
            }
            self.render_stmt(stmt)?;
            if stmt.is_definition() && !last {
                let count = if self.at_module_level() {
                    self.settings.vertical_definition_lines
                } else {
                    self.settings.nested_lines
                };
                self.blank_lines(count);
            }
        }
        Ok(())
    }

    /// A leading module string literal is a documentation block: emitted
    /// verbatim, line by line, outside the width budget.
    fn render_docstring(&mut self, text: &str) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.end_line();
            }
            self.emit(part);
        }
        self.end_line();
    }

    // ---- statement renderers ----

    fn render_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Import { names } => {
                if names.len() > 1 && !self.settings.multiple_imports {
                    for alias in names {
                        self.statement_line(|r| {
                            r.emit("import ");
                            r.render_alias(alias);
                            Ok(())
                        })?;
                    }
                } else {
                    self.statement_line(|r| {
                        r.emit("import ");
                        for (i, alias) in names.iter().enumerate() {
                            if i > 0 {
                                r.emit(", ");
                            }
                            r.render_alias(alias);
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            }
            Stmt::ImportFrom { module, names } => self.statement_line(|r| {
                r.emit("from ");
                r.emit(module);
                r.emit(" import ");
                if names.len() == 1 && names[0].name == "*" {
                    r.emit("*");
                    return Ok(());
                }
                if r.overflow {
                    r.render_delimited("(", ")", names.len(), |r, i| {
                        r.render_alias(&names[i]);
                        Ok(())
                    })
                } else {
                    for (i, alias) in names.iter().enumerate() {
                        if i > 0 {
                            r.emit(", ");
                        }
                        r.render_alias(alias);
                    }
                    Ok(())
                }
            }),
            Stmt::Expr(expr) => self.statement_line(|r| r.render_expr(expr)),
            Stmt::Assign {
                targets,
                annotation,
                value,
            } => self.statement_line(|r| {
                for target in targets {
                    r.render_expr(target)?;
                    if let Some(ann) = annotation {
                        r.emit(": ");
                        r.render_expr(ann)?;
                    }
                    if value.is_some() {
                        r.emit(" = ");
                    }
                }
                if let Some(value) = value {
                    r.render_expr(value)?;
                }
                Ok(())
            }),
            Stmt::AugAssign { target, op, value } => self.statement_line(|r| {
                r.render_expr(target)?;
                r.emit(" ");
                r.emit(op.symbol());
                r.emit("= ");
                r.render_expr(value)
            }),
            Stmt::Pass => self.statement_line(|r| {
                r.emit("pass");
                Ok(())
            }),
            Stmt::Break => self.statement_line(|r| {
                r.emit("break");
                Ok(())
            }),
            Stmt::Continue => self.statement_line(|r| {
                r.emit("continue");
                Ok(())
            }),
            Stmt::Return(value) => self.statement_line(|r| {
                r.emit("return");
                if let Some(value) = value {
                    r.emit(" ");
                    r.render_expr(value)?;
                }
                Ok(())
            }),
            Stmt::Delete(targets) => self.statement_line(|r| {
                r.emit("del ");
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        r.emit(", ");
                    }
                    r.render_expr(target)?;
                }
                Ok(())
            }),
            Stmt::Global(names) => self.statement_line(|r| {
                r.emit("global ");
                r.emit(&names.join(", "));
                Ok(())
            }),
            Stmt::Nonlocal(names) => self.statement_line(|r| {
                r.emit("nonlocal ");
                r.emit(&names.join(", "));
                Ok(())
            }),
            Stmt::Assert { test, message } => self.statement_line(|r| {
                r.emit("assert ");
                r.render_expr(test)?;
                if let Some(message) = message {
                    r.emit(", ");
                    r.render_expr(message)?;
                }
                Ok(())
            }),
            Stmt::Raise { exc, cause } => self.statement_line(|r| {
                r.emit("raise");
                if let Some(exc) = exc {
                    r.emit(" ");
                    r.render_expr(exc)?;
                }
                if let Some(cause) = cause {
                    r.emit(" from ");
                    r.render_expr(cause)?;
                }
                Ok(())
            }),
            Stmt::Try {
                body,
                handlers,
                orelse,
                finally,
            } => {
                self.statement_line(|r| {
                    r.emit("try:");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(body))?;
                for handler in handlers {
                    self.statement_line(|r| {
                        r.emit("except");
                        if let Some(kind) = &handler.kind {
                            r.emit(" ");
                            r.render_expr(kind)?;
                        }
                        if let Some(name) = &handler.name {
                            r.emit(" as ");
                            r.emit(name);
                        }
                        r.emit(":");
                        Ok(())
                    })?;
                    self.with_scope(|r| r.render_body(&handler.body))?;
                }
                if !orelse.is_empty() {
                    self.statement_line(|r| {
                        r.emit("else:");
                        Ok(())
                    })?;
                    self.with_scope(|r| r.render_body(orelse))?;
                }
                if !finally.is_empty() {
                    self.statement_line(|r| {
                        r.emit("finally:");
                        Ok(())
                    })?;
                    self.with_scope(|r| r.render_body(finally))?;
                }
                Ok(())
            }
            Stmt::With { items, body } => {
                self.statement_line(|r| {
                    r.emit("with ");
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            r.emit(", ");
                        }
                        r.render_expr(&item.context)?;
                        if let Some(target) = &item.target {
                            r.emit(" as ");
                            r.render_expr(target)?;
                        }
                    }
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(body))
            }
            Stmt::If {
                test,
                body,
                elifs,
                orelse,
            } => {
                self.statement_line(|r| {
                    r.emit("if ");
                    r.render_expr(test)?;
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(body))?;
                for (condition, block) in elifs {
                    self.statement_line(|r| {
                        r.emit("elif ");
                        r.render_expr(condition)?;
                        r.emit(":");
                        Ok(())
                    })?;
                    self.with_scope(|r| r.render_body(block))?;
                }
                self.render_else(orelse)
            }
            Stmt::While { test, body, orelse } => {
                self.statement_line(|r| {
                    r.emit("while ");
                    r.render_expr(test)?;
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(body))?;
                self.render_else(orelse)
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.statement_line(|r| {
                    r.emit("for ");
                    r.render_expr(target)?;
                    r.emit(" in ");
                    r.render_expr(iter)?;
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(body))?;
                self.render_else(orelse)
            }
            Stmt::FunctionDef(def) => {
                self.render_decorators(&def.decorators)?;
                self.statement_line(|r| {
                    r.emit("def ");
                    r.emit(&def.name);
                    r.render_parameters(&def.params)?;
                    if let Some(returns) = &def.returns {
                        r.emit(" -> ");
                        r.render_expr(returns)?;
                    }
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(&def.body))
            }
            Stmt::ClassDef(def) => {
                self.render_decorators(&def.decorators)?;
                self.statement_line(|r| {
                    r.emit("class ");
                    r.emit(&def.name);
                    if !def.bases.is_empty() {
                        r.render_delimited("(", ")", def.bases.len(), |r, i| {
                            r.render_call_arg(&def.bases[i])
                        })?;
                    }
                    r.emit(":");
                    Ok(())
                })?;
                self.with_scope(|r| r.render_body(&def.body))
            }
        }
    }

    fn render_else(&mut self, orelse: &[Stmt]) -> Result<()> {
        if orelse.is_empty() {
            return Ok(());
        }
        self.statement_line(|r| {
            r.emit("else:");
            Ok(())
        })?;
        self.with_scope(|r| r.render_body(orelse))
    }

    fn render_decorators(&mut self, decorators: &[Expr]) -> Result<()> {
        for decorator in decorators {
            self.statement_line(|r| {
                r.emit("@");
                r.render_expr(decorator)
            })?;
        }
        Ok(())
    }

    fn render_alias(&mut self, alias: &Alias) {
        self.emit(&alias.name);
        if let Some(asname) = &alias.asname {
            self.emit(" as ");
            self.emit(asname);
        }
    }

    // ---- expression renderers ----

    fn render_expr(&mut self, expr: &Expr) -> Result<()> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(FormatError::NestingTooDeep);
        }
        self.depth += 1;
        let result = self.render_expr_inner(expr);
        self.depth -= 1;
        result
    }

    /// Render a sub-expression with re-flow disabled. Constructs without an
    /// expanded form keep their interior on one line; residual overflow is
    /// accepted rather than broken in places the layout rules do not cover.
    fn render_compact(&mut self, expr: &Expr) -> Result<()> {
        let saved_overflow = self.overflow;
        let saved_chain = self.chain_depth;
        self.overflow = false;
        self.chain_depth = 0;
        let result = self.render_expr(expr);
        self.overflow = saved_overflow;
        self.chain_depth = saved_chain;
        result
    }

    fn render_expr_inner(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(text) => {
                self.emit(text);
                Ok(())
            }
            Expr::Name(name) => {
                self.emit(name);
                Ok(())
            }
            Expr::Unary { op, operand } => {
                self.emit(op.symbol());
                if op.is_word() {
                    self.emit(" ");
                }
                self.render_expr(operand)
            }
            Expr::Binary { left, op, right } => self.render_chain_link(left, op.symbol(), right),
            Expr::Bool { op, values } => {
                if self.overflow {
                    return self.render_expanded_chain(values, op.symbol());
                }
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.emit(" ");
                        self.emit(op.symbol());
                        self.emit(" ");
                    }
                    self.render_expr(value)?;
                }
                Ok(())
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                self.render_expr(left)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    self.emit(" ");
                    self.emit(op.symbol());
                    self.emit(" ");
                    self.render_expr(comparator)?;
                }
                Ok(())
            }
            Expr::List(elements) => {
                self.render_delimited("[", "]", elements.len(), |r, i| r.render_expr(&elements[i]))
            }
            Expr::Set(elements) => {
                self.render_delimited("{", "}", elements.len(), |r, i| r.render_expr(&elements[i]))
            }
            Expr::Tuple(elements) => match elements.len() {
                0 => {
                    self.emit("()");
                    Ok(())
                }
                1 => {
                    self.emit("(");
                    self.render_expr(&elements[0])?;
                    self.emit(",)");
                    Ok(())
                }
                len => self.render_delimited("(", ")", len, |r, i| r.render_expr(&elements[i])),
            },
            Expr::Dict(items) => self.render_delimited("{", "}", items.len(), |r, i| {
                let item = &items[i];
                match &item.key {
                    Some(key) => {
                        r.render_expr(key)?;
                        r.emit(": ");
                        r.render_expr(&item.value)
                    }
                    None => {
                        r.emit("**");
                        r.render_expr(&item.value)
                    }
                }
            }),
            Expr::Call { func, args } => {
                self.render_expr(func)?;
                self.render_delimited("(", ")", args.len(), |r, i| r.render_call_arg(&args[i]))
            }
            Expr::Starred(inner) => {
                self.emit("*");
                self.render_expr(inner)
            }
            Expr::Attribute { value, attr } => {
                self.render_expr(value)?;
                self.emit(".");
                self.emit(attr);
                Ok(())
            }
            Expr::Subscript { value, indices } => {
                self.render_expr(value)?;
                self.emit("[");
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        self.emit(", ");
                    }
                    self.render_compact(index)?;
                }
                self.emit("]");
                Ok(())
            }
            Expr::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    self.render_compact(lower)?;
                }
                self.emit(":");
                if let Some(upper) = upper {
                    self.render_compact(upper)?;
                }
                if let Some(step) = step {
                    self.emit(":");
                    self.render_compact(step)?;
                }
                Ok(())
            }
            Expr::Named { target, value } => {
                self.render_expr(target)?;
                self.emit(" := ");
                self.render_expr(value)
            }
            Expr::Paren(inner) => {
                // An expanded operator chain supplies its own wrapping
                // parentheses; doubling them up would pile indentation.
                if self.overflow
                    && self.chain_depth == 0
                    && matches!(**inner, Expr::Binary { .. } | Expr::Bool { .. })
                {
                    return self.render_expr(inner);
                }
                self.emit("(");
                self.render_compact(inner)?;
                self.emit(")");
                Ok(())
            }
            Expr::Conditional { body, test, orelse } => {
                self.render_compact(body)?;
                self.emit(" if ");
                self.render_compact(test)?;
                self.emit(" else ");
                self.render_compact(orelse)
            }
            Expr::Comprehension {
                kind,
                element,
                value,
                generators,
            } => {
                let (open, close) = match kind {
                    CompKind::List => ("[", "]"),
                    CompKind::Set | CompKind::Dict => ("{", "}"),
                    CompKind::Generator => ("(", ")"),
                };
                self.emit(open);
                self.render_compact(element)?;
                if let Some(value) = value {
                    self.emit(": ");
                    self.render_compact(value)?;
                }
                for clause in generators {
                    self.emit(" for ");
                    self.render_compact(&clause.target)?;
                    self.emit(" in ");
                    self.render_compact(&clause.iter)?;
                    for condition in &clause.conditions {
                        self.emit(" if ");
                        self.render_compact(condition)?;
                    }
                }
                self.emit(close);
                Ok(())
            }
        }
    }

    /// One application of a binary operator. Compact form is `left op right`
    /// on the current line. Under re-flow, the chain breaks before each
    /// operator; only the outermost application wraps the whole chain in
    /// parentheses and indents it one unit.
    fn render_chain_link(&mut self, left: &Expr, symbol: &str, right: &Expr) -> Result<()> {
        if !self.overflow {
            self.render_expr(left)?;
            self.emit(" ");
            self.emit(symbol);
            self.emit(" ");
            return self.render_expr(right);
        }
        let outermost = self.chain_depth == 0;
        self.chain_depth += 1;
        let result = if outermost {
            self.emit("(");
            let inner = self.with_indent(|r| {
                r.end_line();
                r.render_expr(left)?;
                r.end_line();
                r.emit(symbol);
                r.emit(" ");
                r.render_expr(right)
            });
            if inner.is_ok() {
                self.end_line();
                self.emit(")");
            }
            inner
        } else {
            self.render_expr(left)?;
            self.end_line();
            self.emit(symbol);
            self.emit(" ");
            self.render_expr(right)
        };
        self.chain_depth -= 1;
        result
    }

    /// Expanded rendering for an already-flattened operator chain
    /// (`a and b and c`): same wrapping rule as binary chains.
    fn render_expanded_chain(&mut self, values: &[Expr], symbol: &str) -> Result<()> {
        let outermost = self.chain_depth == 0;
        self.chain_depth += 1;
        let result = (|| {
            if outermost {
                self.emit("(");
                self.with_indent(|r| {
                    for (i, value) in values.iter().enumerate() {
                        r.end_line();
                        if i > 0 {
                            r.emit(symbol);
                            r.emit(" ");
                        }
                        r.render_expr(value)?;
                    }
                    Ok(())
                })?;
                self.end_line();
                self.emit(")");
                Ok(())
            } else {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.end_line();
                        self.emit(symbol);
                        self.emit(" ");
                    }
                    self.render_expr(value)?;
                }
                Ok(())
            }
        })();
        self.chain_depth -= 1;
        result
    }

    fn render_call_arg(&mut self, arg: &CallArg) -> Result<()> {
        match arg {
            CallArg::Pos(value) => self.render_expr(value),
            CallArg::Keyword { name, value } => {
                self.emit(name);
                self.emit(self.keyword_eq());
                self.render_expr(value)
            }
            CallArg::Star(value) => {
                self.emit("*");
                self.render_expr(value)
            }
            CallArg::DoubleStar(value) => {
                self.emit("**");
                self.render_expr(value)
            }
        }
    }

    fn keyword_eq(&self) -> &'static str {
        if self.settings.space_between_arguments {
            " = "
        } else {
            "="
        }
    }

    /// Delimited element list: `", "`-joined in compact mode; one element
    /// per line (trailing separator, delimiters on their own lines,
    /// indentation incremented for the duration) in re-flow mode.
    fn render_delimited<F>(&mut self, open: &str, close: &str, count: usize, mut each: F) -> Result<()>
    where
        F: FnMut(&mut Self, usize) -> Result<()>,
    {
        self.emit(open);
        if self.overflow && count > 0 {
            self.with_indent(|r| {
                for i in 0..count {
                    r.end_line();
                    each(r, i)?;
                    r.emit(",");
                }
                Ok(())
            })?;
            self.end_line();
        } else {
            for i in 0..count {
                if i > 0 {
                    self.emit(", ");
                }
                each(self, i)?;
            }
        }
        self.emit(close);
        Ok(())
    }

    // ---- parameter lists ----

    fn render_parameters(&mut self, params: &Parameters) -> Result<()> {
        let (posonly, args) = associate_defaults(&params.posonly, &params.args, &params.defaults);
        let has_posonly = !posonly.is_empty();
        let mut items: Vec<ParamItem> = Vec::new();
        for (param, default) in posonly {
            items.push(ParamItem::Plain(param, default));
        }
        if has_posonly {
            items.push(ParamItem::Slash);
        }
        for (param, default) in args {
            items.push(ParamItem::Plain(param, default));
        }
        if let Some(vararg) = &params.vararg {
            items.push(ParamItem::VarArg(vararg));
        } else if !params.kwonly.is_empty() {
            items.push(ParamItem::Star);
        }
        for (i, param) in params.kwonly.iter().enumerate() {
            let default = params.kw_defaults.get(i).and_then(|d| d.as_ref());
            items.push(ParamItem::Plain(param, default));
        }
        if let Some(kwarg) = &params.kwarg {
            items.push(ParamItem::KwArg(kwarg));
        }
        self.render_delimited("(", ")", items.len(), |r, i| r.render_param_item(&items[i]))
    }

    fn render_param_item(&mut self, item: &ParamItem) -> Result<()> {
        match item {
            ParamItem::Slash => {
                self.emit("/");
                Ok(())
            }
            ParamItem::Star => {
                self.emit("*");
                Ok(())
            }
            ParamItem::VarArg(param) => {
                self.emit("*");
                self.render_param(param)
            }
            ParamItem::KwArg(param) => {
                self.emit("**");
                self.render_param(param)
            }
            ParamItem::Plain(param, default) => {
                self.render_param(param)?;
                if let Some(default) = default {
                    self.emit(self.keyword_eq());
                    self.render_expr(default)?;
                }
                Ok(())
            }
        }
    }

    fn render_param(&mut self, param: &Param) -> Result<()> {
        self.emit(&param.name);
        if let Some(annotation) = &param.annotation {
            self.emit(": ");
            self.render_expr(annotation)?;
        }
        Ok(())
    }
}

enum ParamItem<'a> {
    Plain(&'a Param, Option<&'a Expr>),
    Slash,
    Star,
    VarArg(&'a Param),
    KwArg(&'a Param),
}

/// Reconstruct the name→default association from the raw signature buckets.
///
/// `defaults` right-aligns to the combined positional-only + positional
/// sequence: the parameter at combined index `i` owns a default iff
/// `i >= total - defaults.len()`. Whenever a positional-only parameter owns
/// a default, every positional parameter necessarily owns one too (defaults
/// form a contiguous tail and cannot skip a group).
pub(crate) fn associate_defaults<'a>(
    posonly: &'a [Param],
    args: &'a [Param],
    defaults: &'a [Expr],
) -> (
    Vec<(&'a Param, Option<&'a Expr>)>,
    Vec<(&'a Param, Option<&'a Expr>)>,
) {
    let total = posonly.len() + args.len();
    let first_with_default = total.saturating_sub(defaults.len());
    let mut next = 0usize;
    let mut associate = |index: usize, param: &'a Param| {
        if index >= first_with_default && next < defaults.len() {
            let default = &defaults[next];
            next += 1;
            (param, Some(default))
        } else {
            (param, None)
        }
    };
    let posonly_out: Vec<_> = posonly
        .iter()
        .enumerate()
        .map(|(i, p)| associate(i, p))
        .collect();
    let args_out: Vec<_> = args
        .iter()
        .enumerate()
        .map(|(i, p)| associate(i + posonly.len(), p))
        .collect();
    (posonly_out, args_out)
}

fn is_string_literal(text: &str) -> bool {
    text.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .starts_with(['"', '\''])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Param {
        Param {
            name: name.to_string(),
            annotation: None,
        }
    }

    fn lit(text: &str) -> Expr {
        Expr::Literal(text.to_string())
    }

    #[test]
    fn defaults_align_to_the_combined_tail() {
        let posonly = [param("a"), param("b")];
        let args = [param("c"), param("d"), param("e")];
        let defaults = [lit("1"), lit("2"), lit("3")];
        let (pos, reg) = associate_defaults(&posonly, &args, &defaults);
        assert!(pos.iter().all(|(_, d)| d.is_none()));
        let owned: Vec<_> = reg.iter().map(|(p, d)| (p.name.as_str(), d.is_some())).collect();
        assert_eq!(owned, vec![("c", true), ("d", true), ("e", true)]);
    }

    #[test]
    fn posonly_default_implies_all_positional_defaults() {
        // def f(a, f="x", /, b="y", c="z")
        let posonly = [param("a"), param("f")];
        let args = [param("b"), param("c")];
        let defaults = [lit("\"x\""), lit("\"y\""), lit("\"z\"")];
        let (pos, reg) = associate_defaults(&posonly, &args, &defaults);
        assert_eq!(pos[0].1, None);
        assert_eq!(pos[1].1, Some(&lit("\"x\"")));
        assert_eq!(reg[0].1, Some(&lit("\"y\"")));
        assert_eq!(reg[1].1, Some(&lit("\"z\"")));
    }

    #[test]
    fn no_defaults_means_no_association() {
        let posonly: [Param; 0] = [];
        let args = [param("a"), param("b")];
        let (pos, reg) = associate_defaults(&posonly, &args, &[]);
        assert!(pos.is_empty());
        assert!(reg.iter().all(|(_, d)| d.is_none()));
    }

    #[test]
    fn recognizes_string_literals() {
        assert!(is_string_literal("\"doc\""));
        assert!(is_string_literal("'''doc'''"));
        assert!(is_string_literal("r\"raw\""));
        assert!(!is_string_literal("42"));
        assert!(!is_string_literal("value"));
    }
}
