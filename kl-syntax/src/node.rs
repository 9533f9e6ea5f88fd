use kl_types::{NodeId, Span};

/// The three representational kinds an AST node can take. String and
/// character literals are not distinct kinds — the scanner lowers them to
/// [`NodeKind::List`] (null-terminated byte list) and [`NodeKind::Int`]
/// (codepoint) respectively before a `Node` is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Int(i64),
    Word(String),
    List(Vec<Node>),
}

/// An AST node: a value together with the source coordinate it originated
/// from. A list's span is the span of its first child (or, for an empty
/// list, the position of its opening parenthesis).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn int(value: i64, span: Span) -> Self {
        Self { kind: NodeKind::Int(value), span }
    }

    pub fn word(value: impl Into<String>, span: Span) -> Self {
        Self { kind: NodeKind::Word(value.into()), span }
    }

    pub fn list(children: Vec<Node>, span: Span) -> Self {
        Self { kind: NodeKind::List(children), span }
    }

    /// The node's unique identifier, used to mint collision-free assembler labels.
    pub fn id(&self) -> NodeId {
        NodeId(self.span)
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            NodeKind::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_word(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Word(w) => Some(w.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, NodeKind::List(_))
    }

    pub fn is_word(&self) -> bool {
        matches!(self.kind, NodeKind::Word(_))
    }

    /// For a list node, the bare word naming its head form (e.g. `"fn"` for
    /// `(fn uint32 main () ...)`). `None` if this isn't a list, it's empty,
    /// or its head isn't a word.
    pub fn head_word(&self) -> Option<&str> {
        self.as_list()?.first()?.as_word()
    }
}
