use std::str::FromStr;

use kl_syntax::{Node, NodeKind};
use kl_types::TypeName;

use crate::ctx::CompileCtx;
use crate::error::CompileError;
use crate::record::{FunctionRecord, StructRecord, VariableRecord};

const TOP_LEVEL_FORMS: &[&str] = &["fn", "static", "array", "struct", "import", "@private"];

/// Recursive lowering of one AST node into the output assembly buffer.
///
/// Every call is passed the output register `r`; the emitted code leaves
/// the expression's value in `$r` and, for an L-value, its address in
/// `$r+1`. `statement` permits the control-flow/declaration forms; `root`
/// permits the top-level-only forms.
pub(crate) fn generate_expression(
    ctx: &mut CompileCtx,
    node: &Node,
    root: bool,
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if root {
        if !node.is_list() {
            return Err(CompileError::TopLevelNotList(node.span));
        }
        let head = node.head_word().unwrap_or("");
        if !(TOP_LEVEL_FORMS.contains(&head) || head == "asm") {
            return Err(CompileError::InvalidTopLevel(node.span));
        }
    } else if let Some(head) = node.head_word() {
        if TOP_LEVEL_FORMS.contains(&head) {
            return Err(CompileError::NotTopLevel(node.span));
        }
    }

    ctx.maybe_comment(node.span);

    match &node.kind {
        NodeKind::Int(value) => {
            emit_movi(ctx, &value.to_string(), r);
            Ok(TypeName::Int)
        }
        NodeKind::Word(word) => lower_word(ctx, node, word, r),
        NodeKind::List(items) => {
            let head = items
                .first()
                .and_then(Node::as_word)
                .ok_or(CompileError::UndefinedFunction(node.span))?;
            lower_form(ctx, node, head, items, statement, r)
        }
    }
}

fn lower_form(
    ctx: &mut CompileCtx,
    node: &Node,
    head: &str,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    match head {
        "import" => lower_import(ctx, node, items),
        "fn" => lower_fn(ctx, node, items, r),
        "struct" => lower_struct(ctx, node, items),
        "@private" => lower_private(ctx, node, items),
        "while" => lower_while(ctx, node, items, statement, r),
        "cond" => lower_cond(ctx, node, items, statement, r),
        "switch" => lower_switch(ctx, node, items, statement, r),
        "static" => lower_static_or_array(ctx, node, items, false),
        "array" => lower_static_or_array(ctx, node, items, true),
        "local" => lower_local(ctx, node, items, statement, r),
        "return" => lower_return(ctx, node, items, statement, r),
        "+" | "-" | "*" | "/" | "%" | "<" | ">" | ">=" | "<=" | "==" | "!=" | "&" | "|" | "<<"
        | ">>" => lower_binary_op(ctx, node, head, items, r),
        "set-var" => lower_set_var(ctx, node, items, r),
        "set-8" | "set-16" | "set-32" => lower_set_raw(ctx, node, head, items, r),
        "get-8" | "get-16" | "get-32" => lower_get_raw(ctx, node, head, items, r),
        "get" => lower_struct_get(ctx, node, items, r),
        "set" => lower_struct_set(ctx, node, items, r),
        "cast" => lower_cast(ctx, node, items, r),
        "addr" => lower_addr(ctx, node, items, r),
        "size" => lower_size(ctx, node, items, r),
        "bool" => lower_bool(ctx, node, items, r),
        "true" => lower_bool_const(ctx, node, items, 1, r),
        "false" => lower_bool_const(ctx, node, items, 0, r),
        "elem-var" => lower_elem_var(ctx, node, items, r),
        "elem-8" | "elem-16" | "elem-32" => lower_elem_raw(ctx, node, head, items, r),
        "len-var" => lower_len_var(ctx, node, items, r),
        "asm" => lower_asm(ctx, node, items),
        "data" => lower_data(ctx, node, items, r),
        _ if ctx.has_function(head) => lower_call(ctx, node, head, items, r),
        _ => Err(CompileError::UndefinedFunction(node.span)),
    }
}

// --- literals and variables -------------------------------------------------

fn lower_word(
    ctx: &mut CompileCtx,
    node: &Node,
    word: &str,
    r: u8,
) -> Result<TypeName, CompileError> {
    let (name, want_addr) = match word.strip_prefix('&') {
        Some(rest) => (rest, true),
        None => (word, false),
    };

    let Some(var) = ctx.scopes.lookup(name) else {
        return Err(CompileError::UndefinedVariable(node.span));
    };
    let var = var.clone();

    if var.global {
        emit_movi(ctx, &format!("#{name}"), r + 1);
    } else {
        ctx.emit(&format!("mov $12 ${}\n", r + 1));
        if var.offset < 0 {
            emit_subi(ctx, &(-var.offset).to_string(), r + 1);
        } else if var.offset > 0 {
            emit_addi(ctx, &var.offset.to_string(), r + 1);
        }
    }

    if want_addr {
        ctx.emit(&format!("mov ${} ${r}\n", r + 1));
    } else {
        let letter = width_letter(var.ty, node.span)?;
        ctx.emit(&format!("ld{letter} ${} ${r}\n", r + 1));
    }

    Ok(var.ty)
}

// --- binary operators --------------------------------------------------------

fn lower_binary_op(
    ctx: &mut CompileCtx,
    node: &Node,
    op: &str,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }

    let type_r = generate_expression(ctx, &items[2], false, false, r)?;
    ctx.emit(&format!("push ${r}\n"));
    let type_l = generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("pop ${}\n", r + 1));

    let r1 = r + 1;
    match op {
        "+" => ctx.emit(&format!("add ${r1} ${r}\n")),
        "-" => ctx.emit(&format!("sub ${r1} ${r}\n")),
        "*" => ctx.emit(&format!("mul ${r1} ${r}\nmov $13 ${r}\n")),
        "/" => ctx.emit(&format!("div ${r1} ${r}\nmov $14 ${r}\n")),
        "%" => ctx.emit(&format!("div ${r1} ${r}\nmov $13 ${r}\n")),
        "<" => ctx.emit(&format!("clt ${r} ${r1}\n")),
        ">" => ctx.emit(&format!("cgt ${r} ${r1}\n")),
        "<=" => ctx.emit(&format!("cltq ${r} ${r1}\n")),
        ">=" => ctx.emit(&format!("cgtq ${r} ${r1}\n")),
        "==" => ctx.emit(&format!("ceq ${r} ${r1}\n")),
        "!=" => ctx.emit(&format!("cnq ${r} ${r1}\n")),
        "&" => ctx.emit(&format!("and ${r1} ${r}\n")),
        "|" => ctx.emit(&format!("or ${r1} ${r}\n")),
        "<<" => ctx.emit(&format!("shl ${r1} ${r}\n")),
        ">>" => ctx.emit(&format!("shr ${r1} ${r}\n")),
        _ => unreachable!("dispatch table only routes known operators here"),
    }

    ctx.merge_types(type_l, type_r, node.span)
}

// --- stores and raw memory access --------------------------------------------

fn lower_set_var(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !items[1].is_word() {
        return Err(CompileError::InvalidVariableName(node.span));
    }

    let type_l = generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("push ${}\n", r + 1));
    let type_r = generate_expression(ctx, &items[2], false, false, r)?;
    let letter = width_letter(type_l, node.span)?;
    ctx.emit(&format!("pop ${}\nst{letter} ${r} ${}\n", r + 1, r + 1));

    ctx.merge_types(type_l, type_r, node.span)?;
    Ok(type_l)
}

fn lower_set_raw(
    ctx: &mut CompileCtx,
    node: &Node,
    head: &str,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let letter = raw_width_letter(head);

    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("push ${r}\n"));
    let ty = generate_expression(ctx, &items[2], false, false, r)?;
    ctx.emit(&format!("pop ${}\nst{letter} ${r} ${}\n", r + 1, r + 1));

    Ok(ty)
}

fn lower_get_raw(
    ctx: &mut CompileCtx,
    node: &Node,
    head: &str,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let letter = raw_width_letter(head);

    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("ld{letter} ${r} ${r}\n"));

    Ok(match letter {
        'b' => TypeName::Uint8,
        'w' => TypeName::Uint16,
        _ => TypeName::Uint32,
    })
}

fn raw_width_letter(head: &str) -> char {
    match head {
        "set-8" | "get-8" | "elem-8" => 'b',
        "set-16" | "get-16" | "elem-16" => 'w',
        _ => 'd',
    }
}

fn raw_width_size(head: &str) -> usize {
    match head {
        "elem-8" => 1,
        "elem-16" => 2,
        _ => 4,
    }
}

// --- struct field access ------------------------------------------------------

fn split_struct_field(word: &str, span: kl_types::Span) -> Result<(&str, &str), CompileError> {
    word.split_once('.').ok_or(CompileError::UndefinedStructField(span))
}

fn resolve_field(
    ctx: &CompileCtx,
    span: kl_types::Span,
    word: &str,
) -> Result<(usize, TypeName), CompileError> {
    let (struct_name, field_name) = split_struct_field(word, span)?;
    let record = ctx.structs.get(struct_name).ok_or(CompileError::UndefinedStruct(span))?;
    record.field(field_name).ok_or(CompileError::UndefinedStructField(span))
}

fn lower_struct_get(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let selector = items[1].as_word().ok_or(CompileError::UndefinedStructField(node.span))?;
    let (offset, ty) = resolve_field(ctx, node.span, selector)?;

    generate_expression(ctx, &items[2], false, false, r)?;
    if offset > 0 {
        emit_addi(ctx, &offset.to_string(), r);
    }
    let letter = width_letter(ty, node.span)?;
    ctx.emit(&format!("ld{letter} ${r} ${r}\n"));

    Ok(ty)
}

fn lower_struct_set(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 4 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let selector = items[1].as_word().ok_or(CompileError::UndefinedStructField(node.span))?;
    let (offset, ty) = resolve_field(ctx, node.span, selector)?;

    generate_expression(ctx, &items[2], false, false, r)?;
    if offset > 0 {
        emit_addi(ctx, &offset.to_string(), r);
    }
    ctx.emit(&format!("push ${r}\n"));
    let type_r = generate_expression(ctx, &items[3], false, false, r)?;
    let letter = width_letter(ty, node.span)?;
    ctx.emit(&format!("pop ${}\nst{letter} ${r} ${}\n", r + 1, r + 1));

    ctx.merge_types(ty, type_r, node.span)?;
    Ok(ty)
}

// --- casts, addresses, sizes --------------------------------------------------

fn lower_cast(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let ty = parse_declared_type(items[1].as_word().unwrap_or_default())
        .ok_or(CompileError::ExpectedType(node.span))?;
    generate_expression(ctx, &items[2], false, false, r)?;
    Ok(ty)
}

fn lower_addr(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("mov ${} ${r}\n", r + 1));
    Ok(TypeName::Uint32)
}

fn lower_size(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let word = items[1].as_word().ok_or(CompileError::ExpectedType(node.span))?;
    let size = if let Some(ty) = parse_declared_type(word) {
        ty.size()
    } else if let Some(record) = ctx.structs.get(word) {
        record.size
    } else {
        return Err(CompileError::ExpectedType(node.span));
    };
    emit_movi(ctx, &size.to_string(), r);
    Ok(TypeName::Uint32)
}

fn lower_bool(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() > 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if items.len() == 2 {
        generate_expression(ctx, &items[1], false, false, r)?;
    }
    let id = node.id();
    ctx.emit(&format!("mov $0 ${r}\njfi #__bool_{id}\n"));
    emit_movi(ctx, "1", r);
    ctx.emit(&format!("#__bool_{id}:\n"));
    Ok(TypeName::Uint8)
}

fn lower_bool_const(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    value: u8,
    _r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 1 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let mnemonic = if value != 0 { "ceq" } else { "cnq" };
    ctx.emit(&format!("{mnemonic} $0 $0\n"));
    Ok(TypeName::Uint8)
}

// --- indexed element access ---------------------------------------------------

fn lower_elem_var(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !items[1].is_word() {
        return Err(CompileError::InvalidVariableName(node.span));
    }

    let elem_ty = generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("push ${r}\n"));
    generate_expression(ctx, &items[2], false, false, r)?;
    ctx.emit(&format!("pop ${}\n", r + 1));

    let size = elem_ty.size();
    if size != 1 {
        emit_muli(ctx, &size.to_string(), r);
        ctx.emit(&format!("add $13 ${}\n", r + 1));
    } else {
        ctx.emit(&format!("add ${r} ${}\n", r + 1));
    }
    let letter = width_letter(elem_ty, node.span)?;
    ctx.emit(&format!("ld{letter} ${} ${r}\n", r + 1));

    Ok(elem_ty)
}

fn lower_elem_raw(
    ctx: &mut CompileCtx,
    node: &Node,
    head: &str,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }

    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("push ${r}\n"));
    generate_expression(ctx, &items[2], false, false, r)?;
    ctx.emit(&format!("pop ${}\n", r + 1));

    let size = raw_width_size(head);
    if size != 1 {
        emit_muli(ctx, &size.to_string(), r);
        ctx.emit(&format!("add $13 ${}\n", r + 1));
    } else {
        ctx.emit(&format!("add ${r} ${}\n", r + 1));
    }
    let letter = raw_width_letter(head);
    ctx.emit(&format!("ld{letter} ${} ${r}\n", r + 1));

    Ok(match letter {
        'b' => TypeName::Uint8,
        'w' => TypeName::Uint16,
        _ => TypeName::Uint32,
    })
}

fn lower_len_var(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let name = items[1].as_word().ok_or(CompileError::InvalidVariableName(node.span))?;
    let length = ctx
        .scopes
        .global()
        .get(name)
        .ok_or(CompileError::UndefinedStatic(node.span))?
        .length;
    emit_movi(ctx, &length.to_string(), r);
    Ok(TypeName::Uint32)
}

// --- control flow --------------------------------------------------------------

fn lower_while(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() == 1 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !statement {
        return Err(CompileError::WhileNotStatement(node.span));
    }

    let id = node.id();
    ctx.emit(&format!("#__while_{id}:\n"));
    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("jfi #__while_{id}_end\n"));

    ctx.scopes.push();
    let saved_sp = ctx.sp_offset;
    for expr in &items[2..] {
        generate_expression(ctx, expr, false, true, r)?;
    }
    unwind_locals(ctx, saved_sp);
    ctx.scopes.pop();

    ctx.emit(&format!("ji #__while_{id}\n#__while_{id}_end:\n"));
    Ok(TypeName::Void)
}

fn lower_cond(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() == 1 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !statement {
        return Err(CompileError::CondNotStatement(node.span));
    }

    let id = node.id();
    for (i, block) in items[1..].iter().enumerate() {
        let block_items = block.as_list().ok_or(CompileError::EmptyCondBranch(node.span))?;
        if block_items.is_empty() {
            return Err(CompileError::EmptyCondBranch(node.span));
        }

        generate_expression(ctx, &block_items[0], false, false, r)?;
        ctx.emit(&format!("jfi #__cond_{id}_{i}\n"));

        ctx.scopes.push();
        let saved_sp = ctx.sp_offset;
        for expr in &block_items[1..] {
            generate_expression(ctx, expr, false, true, r)?;
        }
        unwind_locals(ctx, saved_sp);
        ctx.scopes.pop();

        ctx.emit(&format!("#__cond_{id}_{i}:\n"));
    }
    Ok(TypeName::Void)
}

fn lower_switch(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() < 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !statement {
        return Err(CompileError::SwitchNotStatement(node.span));
    }

    generate_expression(ctx, &items[1], false, false, r)?;
    ctx.emit(&format!("push ${r}\n"));

    let id = node.id();
    let r1 = r + 1;
    for (i, block) in items[2..].iter().enumerate() {
        let block_items = block.as_list().ok_or(CompileError::EmptyCondBranch(node.span))?;
        if block_items.is_empty() {
            return Err(CompileError::EmptyCondBranch(node.span));
        }

        generate_expression(ctx, &block_items[0], false, false, r)?;
        ctx.emit(&format!("pop ${r1}\npush ${r1}\nceq ${r} ${r1}\n"));
        ctx.emit(&format!("jfi #__switch_{id}_{i}\n"));

        ctx.scopes.push();
        let saved_sp = ctx.sp_offset;
        for expr in &block_items[1..] {
            generate_expression(ctx, expr, false, true, r)?;
        }
        unwind_locals(ctx, saved_sp);
        ctx.scopes.pop();

        ctx.emit(&format!("ji #__switch_{id}_end\n#__switch_{id}_{i}:\n"));
    }
    ctx.emit(&format!("pop $0\n#__switch_{id}_end:\n"));
    Ok(TypeName::Void)
}

fn lower_local(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 && items.len() != 4 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !statement {
        return Err(CompileError::LocalNotStatement(node.span));
    }
    let ty = parse_declared_type(items[1].as_word().unwrap_or_default())
        .ok_or(CompileError::ExpectedType(node.span))?;
    let name = items[2].as_word().ok_or(CompileError::InvalidVariableName(node.span))?;
    if ctx.scopes.innermost_contains(name) {
        return Err(CompileError::DuplicateVariable(node.span));
    }

    if items.len() == 3 {
        ctx.emit(&format!("mov $0 ${r}\n"));
    } else {
        let init_ty = generate_expression(ctx, &items[3], false, false, r)?;
        ctx.merge_types(ty, init_ty, node.span)?;
    }
    ctx.emit(&format!("push ${r}\n"));

    ctx.sp_offset -= 4;
    let offset = ctx.sp_offset;
    ctx.scopes
        .innermost_mut()
        .insert(name.to_string(), VariableRecord { global: false, offset, ty, length: 1 });

    Ok(TypeName::Void)
}

fn lower_return(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    statement: bool,
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() > 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !statement {
        return Err(CompileError::ReturnNotStatement(node.span));
    }

    if items.len() == 2 {
        generate_expression(ctx, &items[1], false, false, r)?;
        if r != 1 {
            ctx.emit(&format!("mov ${r} $1\n"));
        }
    }
    ctx.emit("mov $12 $15\npop $12\nret\n");
    Ok(TypeName::Void)
}

// --- declarations ---------------------------------------------------------------

fn lower_private(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
) -> Result<TypeName, CompileError> {
    if items.len() != 1 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if ctx.definitions_mode {
        ctx.pending_private = true;
    }
    Ok(TypeName::Void)
}

fn lower_struct(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
) -> Result<TypeName, CompileError> {
    if items.len() < 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if !ctx.definitions_mode {
        return Ok(TypeName::Void);
    }

    let name = items[1].as_word().ok_or(CompileError::InvalidVariableName(node.span))?;
    if ctx.structs.contains_key(name) {
        return Err(CompileError::DuplicateStruct(node.span));
    }

    let mut fields = Vec::with_capacity(items.len() - 2);
    for field_node in &items[2..] {
        let field_items = field_node.as_list().ok_or(CompileError::InvalidParameter(node.span))?;
        if field_items.len() != 2 {
            return Err(CompileError::WrongArgCount(node.span));
        }
        let ty = parse_declared_type(field_items[0].as_word().unwrap_or_default())
            .ok_or(CompileError::ExpectedType(node.span))?;
        let field_name =
            field_items[1].as_word().ok_or(CompileError::InvalidVariableName(node.span))?;
        fields.push((field_name.to_string(), ty));
    }
    take_private(ctx, name);
    ctx.structs.insert(name.to_string(), StructRecord::new(fields));
    Ok(TypeName::Void)
}

fn lower_fn(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() < 4 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let return_type = parse_declared_type(items[1].as_word().unwrap_or_default())
        .ok_or(CompileError::ExpectedType(node.span))?;
    let name = items[2].as_word().ok_or(CompileError::InvalidFunctionName(node.span))?;
    let params = items[3].as_list().ok_or(CompileError::ExpectedParameterList(node.span))?;

    if ctx.definitions_mode {
        if ctx.funcs.contains_key(name) {
            return Err(CompileError::DuplicateFunction(node.span));
        }
        let mut arg_types = Vec::with_capacity(params.len());
        for param in params {
            let param_items = param.as_list().ok_or(CompileError::InvalidParameter(node.span))?;
            if param_items.len() != 2 {
                return Err(CompileError::WrongArgCount(node.span));
            }
            let ty = parse_declared_type(param_items[0].as_word().unwrap_or_default())
                .ok_or(CompileError::ExpectedType(node.span))?;
            arg_types.push(ty);
        }
        take_private(ctx, name);
        ctx.funcs.insert(name.to_string(), FunctionRecord { return_type, arg_types });
        return Ok(TypeName::Void);
    }

    ctx.sp_offset = 0;
    ctx.scopes.push();
    let mut arg_offset = 8;
    for param in params {
        let param_items = param.as_list().ok_or(CompileError::InvalidParameter(node.span))?;
        let ty = parse_declared_type(param_items[0].as_word().unwrap_or_default())
            .ok_or(CompileError::ExpectedType(node.span))?;
        let param_name =
            param_items[1].as_word().ok_or(CompileError::InvalidParameter(node.span))?;
        ctx.scopes.innermost_mut().insert(
            param_name.to_string(),
            VariableRecord { global: false, offset: arg_offset, ty, length: 1 },
        );
        arg_offset += 4;
    }

    ctx.emit(&format!(".export #{name}\n#{name}:\npush $12\nmov $15 $12\n"));
    for expr in &items[4..] {
        generate_expression(ctx, expr, false, true, r)?;
    }
    ctx.emit("mov $12 $15\npop $12\nret\n");

    ctx.scopes.pop();
    Ok(return_type)
}

fn lower_static_or_array(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    is_array: bool,
) -> Result<TypeName, CompileError> {
    if is_array {
        if items.len() != 4 {
            return Err(CompileError::WrongArgCount(node.span));
        }
    } else if items.len() != 3 && items.len() != 4 {
        return Err(CompileError::WrongArgCount(node.span));
    }

    let ty = parse_declared_type(items[1].as_word().unwrap_or_default())
        .ok_or(CompileError::ExpectedType(node.span))?;
    let name = items[2].as_word().ok_or(CompileError::InvalidVariableName(node.span))?;
    let init = items.get(3);

    if let Some(init_node) = init {
        if is_array && !init_node.is_list() {
            return Err(CompileError::InvalidStaticInitializer(node.span));
        }
        if !matches!(init_node.kind, NodeKind::Int(_) | NodeKind::List(_)) {
            return Err(CompileError::InvalidStaticInitializer(node.span));
        }
    }

    if ctx.definitions_mode {
        if ctx.scopes.global().contains_key(name) {
            return Err(CompileError::DuplicateVariable(node.span));
        }
        let length = match init {
            Some(n) if n.is_list() => n.as_list().unwrap().len(),
            _ => 1,
        };
        take_private(ctx, name);
        ctx.scopes
            .global_mut()
            .insert(name.to_string(), VariableRecord { global: true, offset: 0, ty, length });
        return Ok(TypeName::Void);
    }

    let directive = size_directive(ty, node.span)?;
    ctx.emit(&format!(".export #{name}\n#{name}:\n"));
    match init {
        None => ctx.emit(&format!(".{directive} 0\n")),
        Some(n) if matches!(n.kind, NodeKind::Int(_)) => {
            ctx.emit(&format!(".{directive} {}\n", n.as_int().unwrap()))
        }
        Some(n) => {
            for elem in n.as_list().unwrap() {
                let value = elem.as_int().ok_or(CompileError::InvalidArrayElement(node.span))?;
                ctx.emit(&format!(".{directive} {value}\n"));
            }
        }
    }
    Ok(TypeName::Void)
}

fn take_private(ctx: &mut CompileCtx, name: &str) {
    if ctx.pending_private {
        ctx.private.insert(name.to_string());
        ctx.pending_private = false;
    }
}

// --- import, inline assembly, anonymous data ------------------------------------

fn lower_import(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
) -> Result<TypeName, CompileError> {
    if items.len() != 2 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let path_bytes = items[1].as_list().ok_or(CompileError::InvalidImportPath(node.span))?;
    let path = decode_byte_string(path_bytes).ok_or(CompileError::InvalidImportPath(node.span))?;

    // Re-reads and re-merges the imported file on every pass (its own
    // definitions/emission split happens inside `compile_definitions_only`,
    // independent of this unit's pass). The merge is idempotent, and only
    // the emission pass's `.import` lines survive into the final output.
    let source = std::fs::read_to_string(&path).map_err(|e| CompileError::ImportIo(e.to_string()))?;
    let ast = kl_syntax::parse(&source).map_err(|e| CompileError::ImportIo(e.to_string()))?;
    let ast = crate::preprocess::preprocess(&ast)?;

    let span = tracing::debug_span!("import", path = %path);
    let _enter = span.enter();

    let mut sub = CompileCtx::new_import_unit(path.clone(), ctx.type_checking);
    sub.set_source(&source);
    sub.compile_definitions_only(&ast)?;

    for (name, func) in &sub.funcs {
        if !sub.private.contains(name) {
            ctx.funcs.insert(name.clone(), func.clone());
            ctx.emit(&format!(".import #{name}\n"));
        }
    }
    for (name, var) in sub.scopes.global() {
        if !sub.private.contains(name) {
            ctx.scopes.global_mut().insert(name.clone(), var.clone());
            ctx.emit(&format!(".import #{name}\n"));
        }
    }
    for (name, record) in &sub.structs {
        if !sub.private.contains(name) {
            ctx.structs.insert(name.clone(), record.clone());
        }
    }

    Ok(TypeName::Void)
}

fn lower_asm(ctx: &mut CompileCtx, node: &Node, items: &[Node]) -> Result<TypeName, CompileError> {
    if items.len() == 1 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    if ctx.definitions_mode {
        return Ok(TypeName::Void);
    }
    for arg in &items[1..] {
        let bytes = arg.as_list().ok_or(CompileError::InvalidInlineAsm(arg.span))?;
        let text = decode_byte_string(bytes).ok_or(CompileError::InvalidInlineAsm(arg.span))?;
        ctx.emit(&text);
        ctx.emit("\n");
    }
    Ok(TypeName::Void)
}

fn lower_data(
    ctx: &mut CompileCtx,
    node: &Node,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    if items.len() != 3 {
        return Err(CompileError::WrongArgCount(node.span));
    }
    let ty = parse_declared_type(items[1].as_word().unwrap_or_default())
        .ok_or(CompileError::ExpectedType(node.span))?;
    let directive = size_directive(ty, node.span)?;
    let id = node.id();

    let mut prefix = format!("#__data_{id}:\n");
    match &items[2].kind {
        NodeKind::Int(value) => prefix.push_str(&format!(".{directive} {value}\n")),
        NodeKind::List(values) => {
            for v in values {
                let value = v.as_int().ok_or(CompileError::InvalidDataType(node.span))?;
                prefix.push_str(&format!(".{directive} {value}\n"));
            }
        }
        NodeKind::Word(_) => return Err(CompileError::InvalidDataType(node.span)),
    }
    ctx.prepend(&prefix);

    emit_movi(ctx, &format!("#__data_{id}"), r + 1);
    let letter = width_letter(ty, node.span)?;
    ctx.emit(&format!("ld{letter} ${} ${r}\n", r + 1));

    Ok(ty)
}

fn lower_call(
    ctx: &mut CompileCtx,
    node: &Node,
    name: &str,
    items: &[Node],
    r: u8,
) -> Result<TypeName, CompileError> {
    let func = ctx.funcs.get(name).cloned().expect("caller checked has_function");
    if items.len() - 1 != func.arg_types.len() {
        return Err(CompileError::WrongArgCount(node.span));
    }

    for (arg, param_ty) in items[1..].iter().zip(&func.arg_types).rev() {
        let arg_ty = generate_expression(ctx, arg, false, false, r)?;
        ctx.merge_types(arg_ty, *param_ty, arg.span)?;
        ctx.emit(&format!("push ${r}\n"));
    }
    ctx.emit(&format!("calli #{name}\n"));
    if r != 1 {
        ctx.emit(&format!("mov $1 ${r}\n"));
    }
    for _ in &items[1..] {
        ctx.emit("pop $0\n");
    }

    Ok(func.return_type)
}

// --- shared helpers --------------------------------------------------------------

fn emit_movi(ctx: &mut CompileCtx, imm: &str, r: u8) {
    ctx.emit(&format!("movi {imm} ${r}\n"));
}

fn emit_addi(ctx: &mut CompileCtx, imm: &str, r: u8) {
    ctx.emit(&format!("addi {imm} ${r}\n"));
}

fn emit_subi(ctx: &mut CompileCtx, imm: &str, r: u8) {
    ctx.emit(&format!("subi {imm} ${r}\n"));
}

fn emit_muli(ctx: &mut CompileCtx, imm: &str, r: u8) {
    ctx.emit(&format!("muli {imm} ${r}\n"));
}

/// Bumps `$15` back up by however many bytes a body frame's `local`s pushed
/// since `saved_sp`, and restores `sp_offset` to match. Called after lowering
/// a loop/conditional body so locals declared inside it don't leak stack
/// slots into the next iteration or sibling branch.
fn unwind_locals(ctx: &mut CompileCtx, saved_sp: i32) {
    let freed = saved_sp - ctx.sp_offset;
    if freed > 0 {
        emit_addi(ctx, &freed.to_string(), 15);
    }
    ctx.sp_offset = saved_sp;
}

fn width_letter(ty: TypeName, span: kl_types::Span) -> Result<char, CompileError> {
    ty.width_letter().ok_or(CompileError::ExpectedType(span))
}

fn size_directive(ty: TypeName, span: kl_types::Span) -> Result<&'static str, CompileError> {
    ty.size_directive().ok_or(CompileError::ExpectedType(span))
}

/// Parses a declared-type token: any concrete [`TypeName`] or `void`, but
/// never the synthetic `int` inference tag (never legal as a written type).
fn parse_declared_type(word: &str) -> Option<TypeName> {
    match TypeName::from_str(word) {
        Ok(TypeName::Int) => None,
        Ok(ty) => Some(ty),
        Err(_) => None,
    }
}

fn decode_byte_string(items: &[Node]) -> Option<String> {
    let mut bytes = Vec::with_capacity(items.len());
    for item in items {
        let value = item.as_int()?;
        if value == 0 {
            break;
        }
        bytes.push(value as u8);
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
