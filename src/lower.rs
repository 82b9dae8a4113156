//! Lowering from the tree-sitter CST to the typed tree
//!
//! This is the boundary to the external parser: everything below here works
//! on [`crate::ast`] nodes only. Lowering walks the CST by node kind and
//! field name, skips comment nodes (comment preservation is out of scope),
//! and rejects any construct outside the supported set with a loud
//! [`FormatError::Unsupported`] — silently dropping a node would corrupt the
//! rewritten file.

use tree_sitter::{Node, Tree};

use crate::ast::*;
use crate::formatter::FormatError;

type Result<T> = std::result::Result<T, FormatError>;

/// Lower a parsed tree into a typed [`Module`].
pub fn lower_module(tree: &Tree, source: &str) -> Result<Module> {
    let root = tree.root_node();
    Ok(Module {
        body: lower_block(root, source)?,
    })
}

fn text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn unsupported<T>(node: Node) -> Result<T> {
    Err(FormatError::Unsupported(node.kind().to_string()))
}

fn lower_block(node: Node, source: &str) -> Result<Vec<Stmt>> {
    named_children(node)
        .into_iter()
        .map(|child| lower_stmt(child, source))
        .collect()
}

fn lower_stmt(node: Node, source: &str) -> Result<Stmt> {
    match node.kind() {
        "import_statement" => Ok(Stmt::Import {
            names: field_children(node, "name")
                .into_iter()
                .map(|n| lower_alias(n, source))
                .collect::<Result<_>>()?,
        }),
        "import_from_statement" => lower_import_from(node, source),
        "future_import_statement" => Ok(Stmt::ImportFrom {
            module: "__future__".to_string(),
            names: field_children(node, "name")
                .into_iter()
                .map(|n| lower_alias(n, source))
                .collect::<Result<_>>()?,
        }),
        "expression_statement" => {
            let inner = named_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("empty statement".to_string()))?;
            match inner.kind() {
                "assignment" => lower_assignment(inner, source),
                "augmented_assignment" => lower_aug_assignment(inner, source),
                _ => Ok(Stmt::Expr(lower_expr(inner, source)?)),
            }
        }
        "pass_statement" => Ok(Stmt::Pass),
        "break_statement" => Ok(Stmt::Break),
        "continue_statement" => Ok(Stmt::Continue),
        "return_statement" => {
            let value = named_children(node)
                .into_iter()
                .next()
                .map(|n| lower_expr(n, source))
                .transpose()?;
            Ok(Stmt::Return(value))
        }
        "delete_statement" => {
            let target = named_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("empty del".to_string()))?;
            let targets = if target.kind() == "expression_list" {
                named_children(target)
                    .into_iter()
                    .map(|n| lower_expr(n, source))
                    .collect::<Result<_>>()?
            } else {
                vec![lower_expr(target, source)?]
            };
            Ok(Stmt::Delete(targets))
        }
        "global_statement" => Ok(Stmt::Global(identifier_list(node, source))),
        "nonlocal_statement" => Ok(Stmt::Nonlocal(identifier_list(node, source))),
        "assert_statement" => {
            let parts = named_children(node);
            let mut iter = parts.into_iter();
            let test = iter
                .next()
                .ok_or_else(|| FormatError::Unsupported("empty assert".to_string()))?;
            Ok(Stmt::Assert {
                test: lower_expr(test, source)?,
                message: iter.next().map(|n| lower_expr(n, source)).transpose()?,
            })
        }
        "raise_statement" => {
            let cause = node.child_by_field_name("cause");
            let exc = named_children(node)
                .into_iter()
                .find(|n| Some(n.id()) != cause.map(|c| c.id()))
                .map(|n| lower_expr(n, source))
                .transpose()?;
            Ok(Stmt::Raise {
                exc,
                cause: cause.map(|n| lower_expr(n, source)).transpose()?,
            })
        }
        "if_statement" => lower_if(node, source),
        "while_statement" => {
            let orelse = match node.child_by_field_name("alternative") {
                Some(alt) => lower_else_clause(alt, source)?,
                None => Vec::new(),
            };
            Ok(Stmt::While {
                test: lower_field_expr(node, "condition", source)?,
                body: lower_field_block(node, "body", source)?,
                orelse,
            })
        }
        "for_statement" => {
            reject_async(node)?;
            let orelse = match node.child_by_field_name("alternative") {
                Some(alt) => lower_else_clause(alt, source)?,
                None => Vec::new(),
            };
            Ok(Stmt::For {
                target: lower_field_expr(node, "left", source)?,
                iter: lower_field_expr(node, "right", source)?,
                body: lower_field_block(node, "body", source)?,
                orelse,
            })
        }
        "try_statement" => lower_try(node, source),
        "with_statement" => lower_with(node, source),
        "function_definition" => {
            reject_async(node)?;
            Ok(Stmt::FunctionDef(lower_function(node, source, Vec::new())?))
        }
        "class_definition" => Ok(Stmt::ClassDef(lower_class(node, source, Vec::new())?)),
        "decorated_definition" => lower_decorated(node, source),
        _ => unsupported(node),
    }
}

fn reject_async(node: Node) -> Result<()> {
    if let Some(first) = node.child(0) {
        if first.kind() == "async" {
            return Err(FormatError::Unsupported(format!("async {}", node.kind())));
        }
    }
    Ok(())
}

fn identifier_list(node: Node, source: &str) -> Vec<String> {
    named_children(node)
        .into_iter()
        .map(|n| text(n, source).to_string())
        .collect()
}

fn lower_alias(node: Node, source: &str) -> Result<Alias> {
    match node.kind() {
        "dotted_name" | "identifier" | "relative_import" => Ok(Alias {
            name: text(node, source).to_string(),
            asname: None,
        }),
        "aliased_import" => {
            let name = node
                .child_by_field_name("name")
                .ok_or_else(|| FormatError::Unsupported("import alias".to_string()))?;
            let alias = node
                .child_by_field_name("alias")
                .ok_or_else(|| FormatError::Unsupported("import alias".to_string()))?;
            Ok(Alias {
                name: text(name, source).to_string(),
                asname: Some(text(alias, source).to_string()),
            })
        }
        _ => unsupported(node),
    }
}

fn lower_import_from(node: Node, source: &str) -> Result<Stmt> {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| text(n, source).to_string())
        .ok_or_else(|| FormatError::Unsupported("from-import without module".to_string()))?;
    let wildcard = named_children(node)
        .into_iter()
        .any(|n| n.kind() == "wildcard_import");
    let names = if wildcard {
        vec![Alias {
            name: "*".to_string(),
            asname: None,
        }]
    } else {
        field_children(node, "name")
            .into_iter()
            .map(|n| lower_alias(n, source))
            .collect::<Result<_>>()?
    };
    Ok(Stmt::ImportFrom { module, names })
}

fn lower_assignment(node: Node, source: &str) -> Result<Stmt> {
    let left = lower_field_expr(node, "left", source)?;
    let annotation = node
        .child_by_field_name("type")
        .map(|n| lower_expr(n, source))
        .transpose()?;
    match node.child_by_field_name("right") {
        None => Ok(Stmt::Assign {
            targets: vec![left],
            annotation,
            value: None,
        }),
        Some(right) if right.kind() == "assignment" => {
            // `a = b = value` nests to the right in the grammar; flatten it.
            match lower_assignment(right, source)? {
                Stmt::Assign {
                    mut targets, value, ..
                } => {
                    targets.insert(0, left);
                    Ok(Stmt::Assign {
                        targets,
                        annotation,
                        value,
                    })
                }
                _ => unsupported(right),
            }
        }
        Some(right) => Ok(Stmt::Assign {
            targets: vec![left],
            annotation,
            value: Some(lower_expr(right, source)?),
        }),
    }
}

fn lower_aug_assignment(node: Node, source: &str) -> Result<Stmt> {
    let op_node = node
        .child_by_field_name("operator")
        .ok_or_else(|| FormatError::Unsupported("augmented assignment".to_string()))?;
    let op = match op_node.kind() {
        "+=" => BinOp::Add,
        "-=" => BinOp::Sub,
        "*=" => BinOp::Mult,
        "@=" => BinOp::MatMult,
        "/=" => BinOp::Div,
        "//=" => BinOp::FloorDiv,
        "%=" => BinOp::Mod,
        "**=" => BinOp::Pow,
        "<<=" => BinOp::LShift,
        ">>=" => BinOp::RShift,
        "|=" => BinOp::BitOr,
        "^=" => BinOp::BitXor,
        "&=" => BinOp::BitAnd,
        _ => return unsupported(op_node),
    };
    Ok(Stmt::AugAssign {
        target: lower_field_expr(node, "left", source)?,
        op,
        value: lower_field_expr(node, "right", source)?,
    })
}

fn lower_if(node: Node, source: &str) -> Result<Stmt> {
    let mut elifs = Vec::new();
    let mut orelse = Vec::new();
    for alt in field_children(node, "alternative") {
        match alt.kind() {
            "elif_clause" => elifs.push((
                lower_field_expr(alt, "condition", source)?,
                lower_field_block(alt, "consequence", source)?,
            )),
            "else_clause" => orelse = lower_else_clause(alt, source)?,
            _ => return unsupported(alt),
        }
    }
    Ok(Stmt::If {
        test: lower_field_expr(node, "condition", source)?,
        body: lower_field_block(node, "consequence", source)?,
        elifs,
        orelse,
    })
}

fn lower_else_clause(node: Node, source: &str) -> Result<Vec<Stmt>> {
    lower_field_block(node, "body", source)
}

fn lower_try(node: Node, source: &str) -> Result<Stmt> {
    let mut handlers = Vec::new();
    let mut orelse = Vec::new();
    let mut finally = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "block" => {}
            "except_clause" => handlers.push(lower_except(child, source)?),
            "else_clause" => orelse = lower_else_clause(child, source)?,
            "finally_clause" => {
                let block = named_children(child)
                    .into_iter()
                    .find(|n| n.kind() == "block")
                    .ok_or_else(|| FormatError::Unsupported("finally clause".to_string()))?;
                finally = lower_block(block, source)?;
            }
            _ => return unsupported(child),
        }
    }
    Ok(Stmt::Try {
        body: lower_field_block(node, "body", source)?,
        handlers,
        orelse,
        finally,
    })
}

fn lower_except(node: Node, source: &str) -> Result<ExceptHandler> {
    let mut kind = None;
    let mut name = None;
    let mut body = Vec::new();
    for child in named_children(node) {
        if child.kind() == "block" {
            body = lower_block(child, source)?;
        } else if child.kind() == "as_pattern" && kind.is_none() {
            // `except ValueError as e` surfaces as one as_pattern node.
            let context = named_children(child)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("except clause".to_string()))?;
            let alias = child
                .child_by_field_name("alias")
                .ok_or_else(|| FormatError::Unsupported("except clause".to_string()))?;
            kind = Some(lower_expr(context, source)?);
            name = Some(text(alias, source).to_string());
        } else if kind.is_none() {
            kind = Some(lower_expr(child, source)?);
        } else {
            name = Some(text(child, source).to_string());
        }
    }
    Ok(ExceptHandler { kind, name, body })
}

fn lower_with(node: Node, source: &str) -> Result<Stmt> {
    reject_async(node)?;
    let clause = named_children(node)
        .into_iter()
        .find(|n| n.kind() == "with_clause")
        .ok_or_else(|| FormatError::Unsupported("with statement".to_string()))?;
    let mut items = Vec::new();
    for item in named_children(clause) {
        if item.kind() != "with_item" {
            return unsupported(item);
        }
        let value = item
            .child_by_field_name("value")
            .ok_or_else(|| FormatError::Unsupported("with item".to_string()))?;
        items.push(lower_with_item(value, source)?);
    }
    Ok(Stmt::With {
        items,
        body: lower_field_block(node, "body", source)?,
    })
}

fn lower_with_item(value: Node, source: &str) -> Result<WithItem> {
    if value.kind() == "as_pattern" {
        let context = named_children(value)
            .into_iter()
            .next()
            .ok_or_else(|| FormatError::Unsupported("as pattern".to_string()))?;
        let alias = value
            .child_by_field_name("alias")
            .ok_or_else(|| FormatError::Unsupported("as pattern".to_string()))?;
        Ok(WithItem {
            context: lower_expr(context, source)?,
            target: Some(lower_expr(alias, source)?),
        })
    } else {
        Ok(WithItem {
            context: lower_expr(value, source)?,
            target: None,
        })
    }
}

fn lower_decorated(node: Node, source: &str) -> Result<Stmt> {
    let mut decorators = Vec::new();
    for child in named_children(node) {
        if child.kind() == "decorator" {
            let expr = named_children(child)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("decorator".to_string()))?;
            decorators.push(lower_expr(expr, source)?);
        }
    }
    let definition = node
        .child_by_field_name("definition")
        .ok_or_else(|| FormatError::Unsupported("decorated definition".to_string()))?;
    match definition.kind() {
        "function_definition" => {
            reject_async(definition)?;
            Ok(Stmt::FunctionDef(lower_function(
                definition, source, decorators,
            )?))
        }
        "class_definition" => Ok(Stmt::ClassDef(lower_class(definition, source, decorators)?)),
        _ => unsupported(definition),
    }
}

fn lower_function(node: Node, source: &str, decorators: Vec<Expr>) -> Result<FunctionDef> {
    let name = node
        .child_by_field_name("name")
        .ok_or_else(|| FormatError::Unsupported("function definition".to_string()))?;
    let params = match node.child_by_field_name("parameters") {
        Some(p) => lower_parameters(p, source)?,
        None => Parameters::default(),
    };
    Ok(FunctionDef {
        name: text(name, source).to_string(),
        decorators,
        params,
        returns: node
            .child_by_field_name("return_type")
            .map(|n| lower_expr(n, source))
            .transpose()?,
        body: lower_field_block(node, "body", source)?,
    })
}

fn lower_class(node: Node, source: &str, decorators: Vec<Expr>) -> Result<ClassDef> {
    let name = node
        .child_by_field_name("name")
        .ok_or_else(|| FormatError::Unsupported("class definition".to_string()))?;
    let bases = match node.child_by_field_name("superclasses") {
        Some(args) => lower_call_args(args, source)?,
        None => Vec::new(),
    };
    Ok(ClassDef {
        name: text(name, source).to_string(),
        decorators,
        bases,
        body: lower_field_block(node, "body", source)?,
    })
}

fn lower_parameters(node: Node, source: &str) -> Result<Parameters> {
    let mut params = Parameters::default();
    let mut after_star = false;
    for child in named_children(node) {
        match child.kind() {
            "positional_separator" => params.posonly = std::mem::take(&mut params.args),
            "keyword_separator" => after_star = true,
            "list_splat_pattern" => {
                params.vararg = Some(splat_param(child, source, None)?);
                after_star = true;
            }
            "dictionary_splat_pattern" => params.kwarg = Some(splat_param(child, source, None)?),
            "identifier" => push_param(
                &mut params,
                after_star,
                Param {
                    name: text(child, source).to_string(),
                    annotation: None,
                },
                None,
            ),
            "typed_parameter" => {
                let annotation = child
                    .child_by_field_name("type")
                    .map(|n| lower_expr(n, source))
                    .transpose()?;
                let inner = named_children(child)
                    .into_iter()
                    .next()
                    .ok_or_else(|| FormatError::Unsupported("typed parameter".to_string()))?;
                match inner.kind() {
                    "identifier" => push_param(
                        &mut params,
                        after_star,
                        Param {
                            name: text(inner, source).to_string(),
                            annotation,
                        },
                        None,
                    ),
                    "list_splat_pattern" => {
                        params.vararg = Some(splat_param(inner, source, annotation)?);
                        after_star = true;
                    }
                    "dictionary_splat_pattern" => {
                        params.kwarg = Some(splat_param(inner, source, annotation)?)
                    }
                    _ => return unsupported(inner),
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .ok_or_else(|| FormatError::Unsupported("default parameter".to_string()))?;
                if name.kind() != "identifier" {
                    return unsupported(name);
                }
                let annotation = child
                    .child_by_field_name("type")
                    .map(|n| lower_expr(n, source))
                    .transpose()?;
                let value = lower_field_expr(child, "value", source)?;
                push_param(
                    &mut params,
                    after_star,
                    Param {
                        name: text(name, source).to_string(),
                        annotation,
                    },
                    Some(value),
                );
            }
            _ => return unsupported(child),
        }
    }
    Ok(params)
}

fn push_param(params: &mut Parameters, after_star: bool, param: Param, default: Option<Expr>) {
    if after_star {
        params.kwonly.push(param);
        params.kw_defaults.push(default);
    } else {
        params.args.push(param);
        if let Some(value) = default {
            params.defaults.push(value);
        }
    }
}

fn splat_param(node: Node, source: &str, annotation: Option<Expr>) -> Result<Param> {
    let name = named_children(node)
        .into_iter()
        .next()
        .ok_or_else(|| FormatError::Unsupported("splat parameter".to_string()))?;
    Ok(Param {
        name: text(name, source).to_string(),
        annotation,
    })
}

fn lower_field_expr(node: Node, field: &str, source: &str) -> Result<Expr> {
    let child = node
        .child_by_field_name(field)
        .ok_or_else(|| FormatError::Unsupported(format!("{} without {}", node.kind(), field)))?;
    lower_expr(child, source)
}

fn lower_field_block(node: Node, field: &str, source: &str) -> Result<Vec<Stmt>> {
    let child = node
        .child_by_field_name(field)
        .ok_or_else(|| FormatError::Unsupported(format!("{} without {}", node.kind(), field)))?;
    lower_block(child, source)
}

fn lower_expr(node: Node, source: &str) -> Result<Expr> {
    match node.kind() {
        "identifier" => Ok(Expr::Name(text(node, source).to_string())),
        "string" | "concatenated_string" | "integer" | "float" | "true" | "false" | "none"
        | "ellipsis" => Ok(Expr::Literal(text(node, source).to_string())),
        "unary_operator" => {
            let op_node = node
                .child_by_field_name("operator")
                .ok_or_else(|| FormatError::Unsupported("unary operator".to_string()))?;
            let op = match op_node.kind() {
                "+" => UnaryOp::UAdd,
                "-" => UnaryOp::USub,
                "~" => UnaryOp::Invert,
                _ => return unsupported(op_node),
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(lower_field_expr(node, "argument", source)?),
            })
        }
        "not_operator" => Ok(Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(lower_field_expr(node, "argument", source)?),
        }),
        "binary_operator" => {
            let op_node = node
                .child_by_field_name("operator")
                .ok_or_else(|| FormatError::Unsupported("binary operator".to_string()))?;
            let op = match op_node.kind() {
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mult,
                "@" => BinOp::MatMult,
                "/" => BinOp::Div,
                "//" => BinOp::FloorDiv,
                "%" => BinOp::Mod,
                "**" => BinOp::Pow,
                "<<" => BinOp::LShift,
                ">>" => BinOp::RShift,
                "|" => BinOp::BitOr,
                "^" => BinOp::BitXor,
                "&" => BinOp::BitAnd,
                _ => return unsupported(op_node),
            };
            Ok(Expr::Binary {
                left: Box::new(lower_field_expr(node, "left", source)?),
                op,
                right: Box::new(lower_field_expr(node, "right", source)?),
            })
        }
        "boolean_operator" => {
            let op_node = node
                .child_by_field_name("operator")
                .ok_or_else(|| FormatError::Unsupported("boolean operator".to_string()))?;
            let op = match op_node.kind() {
                "and" => BoolOp::And,
                "or" => BoolOp::Or,
                _ => return unsupported(op_node),
            };
            let left = lower_field_expr(node, "left", source)?;
            let right = lower_field_expr(node, "right", source)?;
            // `a and b and c` nests left in the grammar; flatten same-op runs
            // the way the renderer expects chains.
            let mut values = match left {
                Expr::Bool {
                    op: left_op,
                    values,
                } if left_op == op => values,
                other => vec![other],
            };
            values.push(right);
            Ok(Expr::Bool { op, values })
        }
        "comparison_operator" => {
            let operands = named_children(node);
            let mut iter = operands.into_iter();
            let left = iter
                .next()
                .ok_or_else(|| FormatError::Unsupported("comparison".to_string()))?;
            let comparators = iter
                .map(|n| lower_expr(n, source))
                .collect::<Result<Vec<_>>>()?;
            let ops = field_children(node, "operators")
                .into_iter()
                .map(|op_node| match op_node.kind() {
                    "==" => Ok(CmpOp::Eq),
                    "!=" => Ok(CmpOp::NotEq),
                    "<" => Ok(CmpOp::Lt),
                    "<=" => Ok(CmpOp::LtE),
                    ">" => Ok(CmpOp::Gt),
                    ">=" => Ok(CmpOp::GtE),
                    "is" => Ok(CmpOp::Is),
                    "is not" => Ok(CmpOp::IsNot),
                    "in" => Ok(CmpOp::In),
                    "not in" => Ok(CmpOp::NotIn),
                    _ => unsupported(op_node),
                })
                .collect::<Result<Vec<_>>>()?;
            if ops.len() != comparators.len() {
                return Err(FormatError::Unsupported("comparison".to_string()));
            }
            Ok(Expr::Compare {
                left: Box::new(lower_expr(left, source)?),
                ops,
                comparators,
            })
        }
        "named_expression" => Ok(Expr::Named {
            target: Box::new(lower_field_expr(node, "name", source)?),
            value: Box::new(lower_field_expr(node, "value", source)?),
        }),
        "attribute" => {
            let attr = node
                .child_by_field_name("attribute")
                .ok_or_else(|| FormatError::Unsupported("attribute".to_string()))?;
            Ok(Expr::Attribute {
                value: Box::new(lower_field_expr(node, "object", source)?),
                attr: text(attr, source).to_string(),
            })
        }
        "subscript" => Ok(Expr::Subscript {
            value: Box::new(lower_field_expr(node, "value", source)?),
            indices: field_children(node, "subscript")
                .into_iter()
                .map(|n| lower_expr(n, source))
                .collect::<Result<_>>()?,
        }),
        "slice" => lower_slice(node, source),
        "call" => {
            let arguments = node
                .child_by_field_name("arguments")
                .ok_or_else(|| FormatError::Unsupported("call".to_string()))?;
            let args = match arguments.kind() {
                "argument_list" => lower_call_args(arguments, source)?,
                "generator_expression" => vec![CallArg::Pos(lower_expr(arguments, source)?)],
                _ => return unsupported(arguments),
            };
            Ok(Expr::Call {
                func: Box::new(lower_field_expr(node, "function", source)?),
                args,
            })
        }
        "list" | "list_pattern" => Ok(Expr::List(lower_elements(node, source)?)),
        "set" => Ok(Expr::Set(lower_elements(node, source)?)),
        "tuple" | "tuple_pattern" | "expression_list" | "pattern_list" => {
            Ok(Expr::Tuple(lower_elements(node, source)?))
        }
        "dictionary" => {
            let mut items = Vec::new();
            for child in named_children(node) {
                match child.kind() {
                    "pair" => items.push(DictItem {
                        key: Some(lower_field_expr(child, "key", source)?),
                        value: lower_field_expr(child, "value", source)?,
                    }),
                    "dictionary_splat" => {
                        let inner = named_children(child)
                            .into_iter()
                            .next()
                            .ok_or_else(|| FormatError::Unsupported("dict splat".to_string()))?;
                        items.push(DictItem {
                            key: None,
                            value: lower_expr(inner, source)?,
                        });
                    }
                    _ => return unsupported(child),
                }
            }
            Ok(Expr::Dict(items))
        }
        "parenthesized_expression" => {
            let inner = named_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("parenthesized expression".to_string()))?;
            Ok(Expr::Paren(Box::new(lower_expr(inner, source)?)))
        }
        "conditional_expression" => {
            let parts = named_children(node);
            if parts.len() != 3 {
                return unsupported(node);
            }
            Ok(Expr::Conditional {
                body: Box::new(lower_expr(parts[0], source)?),
                test: Box::new(lower_expr(parts[1], source)?),
                orelse: Box::new(lower_expr(parts[2], source)?),
            })
        }
        "list_comprehension" => lower_comprehension(node, source, CompKind::List),
        "set_comprehension" => lower_comprehension(node, source, CompKind::Set),
        "dictionary_comprehension" => lower_comprehension(node, source, CompKind::Dict),
        "generator_expression" => lower_comprehension(node, source, CompKind::Generator),
        "list_splat" | "list_splat_pattern" => {
            let inner = named_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| FormatError::Unsupported("starred expression".to_string()))?;
            Ok(Expr::Starred(Box::new(lower_expr(inner, source)?)))
        }
        // `with ... as (a, b)` targets surface under an aliased kind; a bare
        // target has no children, a grouped one keeps the tuple's children.
        "as_pattern_target" => {
            let children = named_children(node);
            if children.is_empty() {
                Ok(Expr::Name(text(node, source).to_string()))
            } else {
                Ok(Expr::Tuple(
                    children
                        .into_iter()
                        .map(|n| lower_expr(n, source))
                        .collect::<Result<_>>()?,
                ))
            }
        }
        _ => unsupported(node),
    }
}

fn lower_elements(node: Node, source: &str) -> Result<Vec<Expr>> {
    named_children(node)
        .into_iter()
        .map(|n| lower_expr(n, source))
        .collect()
}

fn lower_call_args(node: Node, source: &str) -> Result<Vec<CallArg>> {
    let mut args = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "keyword_argument" => {
                let name = child
                    .child_by_field_name("name")
                    .ok_or_else(|| FormatError::Unsupported("keyword argument".to_string()))?;
                args.push(CallArg::Keyword {
                    name: text(name, source).to_string(),
                    value: lower_field_expr(child, "value", source)?,
                });
            }
            "list_splat" => {
                let inner = named_children(child)
                    .into_iter()
                    .next()
                    .ok_or_else(|| FormatError::Unsupported("starred argument".to_string()))?;
                args.push(CallArg::Star(lower_expr(inner, source)?));
            }
            "dictionary_splat" => {
                let inner = named_children(child)
                    .into_iter()
                    .next()
                    .ok_or_else(|| FormatError::Unsupported("starred argument".to_string()))?;
                args.push(CallArg::DoubleStar(lower_expr(inner, source)?));
            }
            _ => args.push(CallArg::Pos(lower_expr(child, source)?)),
        }
    }
    Ok(args)
}

fn lower_slice(node: Node, source: &str) -> Result<Expr> {
    // The grammar exposes no fields here; bucket expressions by their
    // position relative to the `:` tokens.
    let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
    let mut bucket = 0;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == ":" {
            bucket += 1;
            if bucket > 2 {
                return unsupported(node);
            }
        } else if child.is_named() && child.kind() != "comment" {
            parts[bucket] = Some(Box::new(lower_expr(child, source)?));
        }
    }
    let [lower, upper, step] = parts;
    Ok(Expr::Slice { lower, upper, step })
}

fn lower_comprehension(node: Node, source: &str, kind: CompKind) -> Result<Expr> {
    let body = node
        .child_by_field_name("body")
        .ok_or_else(|| FormatError::Unsupported("comprehension".to_string()))?;
    let (element, value) = if kind == CompKind::Dict {
        if body.kind() != "pair" {
            return unsupported(body);
        }
        (
            lower_field_expr(body, "key", source)?,
            Some(Box::new(lower_field_expr(body, "value", source)?)),
        )
    } else {
        (lower_expr(body, source)?, None)
    };
    let mut generators: Vec<CompClause> = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "for_in_clause" => {
                reject_async(child)?;
                generators.push(CompClause {
                    target: lower_field_expr(child, "left", source)?,
                    iter: lower_field_expr(child, "right", source)?,
                    conditions: Vec::new(),
                });
            }
            "if_clause" => {
                let cond = named_children(child)
                    .into_iter()
                    .next()
                    .ok_or_else(|| FormatError::Unsupported("comprehension if".to_string()))?;
                let clause = generators
                    .last_mut()
                    .ok_or_else(|| FormatError::Unsupported("comprehension if".to_string()))?;
                clause.conditions.push(lower_expr(cond, source)?);
            }
            _ => {
                if child.id() != body.id() {
                    return unsupported(child);
                }
            }
        }
    }
    Ok(Expr::Comprehension {
        kind,
        element: Box::new(element),
        value,
        generators,
    })
}
