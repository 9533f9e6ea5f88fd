use std::collections::HashMap;
use std::str::FromStr;

use kl_syntax::{Node, NodeKind};
use kl_types::TypeName;

use crate::error::CompileError;

/// Expands the three macros that exist purely as AST rewrites, before the
/// definitions pass ever sees the tree:
///
/// - `(define name expr)` binds `name`; every later bare `name` word is
///   replaced by a clone of `expr`, and the `define` form itself is dropped.
/// - `(zero T)` / `(zero N)` expands to a list of `N` (or `sizeof(T)`)
///   integer-zero nodes — shorthand for zero-filled array initializers.
/// - `(str "text")` expands to `(addr (data uint8 <bytes>))`, giving a
///   pointer to an anonymous `data` block holding the (already
///   null-terminated) byte list the scanner produced for the literal.
pub fn preprocess(root: &Node) -> Result<Node, CompileError> {
    let mut defines = HashMap::new();
    let stripped = strip_defines(root, &mut defines);
    let substituted = substitute(&stripped, &defines);
    expand_macros(&substituted)
}

fn strip_defines(node: &Node, defines: &mut HashMap<String, Node>) -> Node {
    match &node.kind {
        NodeKind::List(children) => {
            let mut kept = Vec::with_capacity(children.len());
            for child in children {
                if let (Some("define"), Some(list)) = (child.head_word(), child.as_list()) {
                    if list.len() == 3 {
                        if let Some(name) = list[1].as_word() {
                            defines.insert(name.to_string(), list[2].clone());
                            continue;
                        }
                    }
                }
                kept.push(strip_defines(child, defines));
            }
            Node::list(kept, node.span)
        }
        _ => node.clone(),
    }
}

fn substitute(node: &Node, defines: &HashMap<String, Node>) -> Node {
    match &node.kind {
        NodeKind::Word(w) => defines.get(w).cloned().unwrap_or_else(|| node.clone()),
        NodeKind::List(children) => {
            Node::list(children.iter().map(|c| substitute(c, defines)).collect(), node.span)
        }
        NodeKind::Int(_) => node.clone(),
    }
}

fn expand_macros(node: &Node) -> Result<Node, CompileError> {
    let Some(children) = node.as_list() else { return Ok(node.clone()) };

    let mut expanded = Vec::with_capacity(children.len());
    for child in children {
        expanded.push(expand_macros(child)?);
    }
    let node = Node::list(expanded, node.span);

    match node.head_word() {
        Some("zero") => expand_zero(&node),
        Some("str") => expand_str(&node),
        _ => Ok(node),
    }
}

fn expand_zero(node: &Node) -> Result<Node, CompileError> {
    let items = node.as_list().expect("caller only passes list nodes");
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }

    let count = if let Some(word) = items[1].as_word() {
        TypeName::from_str(word)
            .map(|t| t.size())
            .map_err(|_| CompileError::MalformedMacroArgument(items[1].span))?
    } else if let Some(n) = items[1].as_int() {
        if n < 0 {
            return Err(CompileError::MalformedMacroArgument(items[1].span));
        }
        n as usize
    } else {
        return Err(CompileError::MalformedMacroArgument(items[1].span));
    };

    let zeros = (0..count).map(|_| Node::int(0, node.span)).collect();
    Ok(Node::list(zeros, node.span))
}

fn expand_str(node: &Node) -> Result<Node, CompileError> {
    let items = node.as_list().expect("caller only passes list nodes");
    if items.len() != 2 || !items[1].is_list() {
        return Err(CompileError::MalformedMacroArgument(node.span));
    }

    let bytes = items[1].clone();
    let data = Node::list(
        vec![Node::word("data", node.span), Node::word("uint8", node.span), bytes],
        node.span,
    );
    Ok(Node::list(vec![Node::word("addr", node.span), data], node.span))
}
