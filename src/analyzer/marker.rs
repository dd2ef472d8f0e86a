//! Capability marker matching.
//!
//! A declaration is a tool when one of its decorators is the call
//! `@<root>.<verb>(...)`, e.g. `@mcp.tool()`.

use crate::syntax::{LineSpan, NodeKind, SyntaxNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMarker {
    pub root: String,
    pub verb: String,
}

impl CapabilityMarker {
    pub fn new(root: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            verb: verb.into(),
        }
    }

    /// True for a call-style decorator `root.verb(...)`.
    pub fn matches(&self, decorator: &SyntaxNode) -> bool {
        let Some(callee) = decorator.callee() else {
            return false;
        };
        match &callee.kind {
            NodeKind::Attribute { member } if *member == self.verb => matches!(
                callee.children.first().map(|receiver| &receiver.kind),
                Some(NodeKind::Name(id)) if *id == self.root
            ),
            _ => false,
        }
    }

    pub fn is_tool(&self, node: &SyntaxNode) -> bool {
        node.function()
            .is_some_and(|sig| sig.decorators.iter().any(|d| self.matches(d)))
    }

    /// Every marked function declaration in the tree, in source order.
    pub fn tools<'a>(&self, tree: &'a SyntaxNode) -> Vec<ToolDeclaration<'a>> {
        tree.find_all(|node| self.is_tool(node))
            .into_iter()
            .filter_map(ToolDeclaration::from_node)
            .collect()
    }
}

/// How a return annotation was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A name or dotted reference, or a string forward reference.
    Named(String),
    /// Subscripts, unions and other expressions.
    Other,
}

/// A function declaration carrying the capability marker.
#[derive(Debug, Clone)]
pub struct ToolDeclaration<'a> {
    pub name: String,
    pub is_async: bool,
    pub has_docstring: bool,
    /// Parameter name and whether it carries an annotation, receivers excluded.
    pub params: Vec<(String, bool)>,
    pub return_annotation: Option<TypeRef>,
    pub span: LineSpan,
    pub node: &'a SyntaxNode,
}

impl<'a> ToolDeclaration<'a> {
    fn from_node(node: &'a SyntaxNode) -> Option<Self> {
        let sig = node.function()?;

        let has_docstring = node.children.first().is_some_and(|first| {
            first.kind == NodeKind::ExprStmt
                && first
                    .children
                    .first()
                    .is_some_and(|expr| expr.string_literal().is_some())
        });

        let params = sig
            .params
            .iter()
            .enumerate()
            .filter(|(i, p)| !(*i == 0 && (p.name == "self" || p.name == "cls")))
            .map(|(_, p)| (p.name.clone(), p.annotated))
            .collect();

        let return_annotation = sig.returns.as_ref().map(|ret| {
            ret.dotted_name()
                .or_else(|| ret.string_literal().map(|s| s.trim().to_string()))
                .map_or(TypeRef::Other, TypeRef::Named)
        });

        Some(Self {
            name: sig.name.clone(),
            is_async: sig.is_async,
            has_docstring,
            params,
            return_annotation,
            span: node.span,
            node,
        })
    }
}
