use std::collections::HashMap;

use kl_types::TypeName;

/// A bound name: a global (module-scope static/array) or a local
/// (function parameter or `local`-declared stack slot).
///
/// `offset` is the byte displacement from the frame-base register `$12`:
/// negative for locals (below the frame base), positive for arguments
/// (above it, starting at 8 to skip the saved frame base and return
/// address).
#[derive(Debug, Clone)]
pub struct VariableRecord {
    pub global: bool,
    pub offset: i32,
    pub ty: TypeName,
    pub length: usize,
}

/// A function declaration: its return type and the types of its
/// parameters, in declaration order. Parameter names live in the
/// function's own argument scope, not here.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub return_type: TypeName,
    pub arg_types: Vec<TypeName>,
}

/// A struct declaration: field names and types in declaration order, with
/// no padding between fields.
#[derive(Debug, Clone)]
pub struct StructRecord {
    pub fields: Vec<(String, TypeName)>,
    pub size: usize,
}

impl StructRecord {
    pub fn new(fields: Vec<(String, TypeName)>) -> Self {
        let size = fields.iter().map(|(_, t)| t.size()).sum();
        Self { fields, size }
    }

    /// The byte offset and type of `field`, or `None` if the struct has no
    /// such field.
    pub fn field(&self, field: &str) -> Option<(usize, TypeName)> {
        let mut offset = 0;
        for (name, ty) in &self.fields {
            if name == field {
                return Some((offset, *ty));
            }
            offset += ty.size();
        }
        None
    }
}

/// The scope stack: frame 0 is the module's global scope; each function
/// body pushes a fresh frame for its parameters and locals. Lookup walks
/// from the innermost frame outward.
#[derive(Debug, Default)]
pub struct Scopes {
    frames: Vec<HashMap<String, VariableRecord>>,
}

impl Scopes {
    pub fn new() -> Self {
        Self { frames: vec![HashMap::new()] }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "global frame must never be popped");
    }

    pub fn lookup(&self, name: &str) -> Option<&VariableRecord> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn global(&self) -> &HashMap<String, VariableRecord> {
        &self.frames[0]
    }

    pub fn global_mut(&mut self) -> &mut HashMap<String, VariableRecord> {
        &mut self.frames[0]
    }

    /// The innermost frame, where `local` declarations and function
    /// parameters are bound.
    pub fn innermost_mut(&mut self) -> &mut HashMap<String, VariableRecord> {
        self.frames.last_mut().expect("at least the global frame is always present")
    }

    pub fn innermost_contains(&self, name: &str) -> bool {
        self.frames.last().expect("at least the global frame is always present").contains_key(name)
    }
}
