//! Generic structural tree.
//!
//! The Python AST is lowered into [`SyntaxNode`]s so the contract checks
//! only ever pattern-match on a handful of node kinds. Anything the checks
//! do not care about collapses into [`NodeKind::Statement`] or
//! [`NodeKind::Expression`] while keeping its children reachable.

/// Inclusive, 1-based line range of a node in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: LineSpan,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Module,
    /// Children are the body statements.
    Function(Box<FunctionSig>),
    /// Children are bases, keywords, decorators then body statements.
    Class { name: String },
    /// Children are the body followed by the `else`/`elif` branch.
    If { test: Box<SyntaxNode> },
    /// A bare expression used as a statement; one child.
    ExprStmt,
    Statement,
    /// First child is the callee, then positional args, then `Keyword`s.
    Call,
    /// `name=value` in a call (`None` for `**kwargs` splats); one child.
    Keyword { name: Option<String> },
    /// `receiver.member`; one child, the receiver.
    Attribute { member: String },
    Name(String),
    Str(String),
    Expression,
    /// `import a as b` or `from a import b`; no children.
    Import { bindings: Vec<ImportBinding> },
}

/// One name bound by an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name visible in the importing scope
    pub local: String,
    /// Dotted path it refers to, e.g. `sys.stderr`
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub is_async: bool,
    pub params: Vec<Param>,
    pub returns: Option<SyntaxNode>,
    pub decorators: Vec<SyntaxNode>,
    /// Default values and parameter annotations, kept so walks see calls in them.
    pub header: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotated: bool,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: LineSpan, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            span,
            children,
        }
    }

    pub fn leaf(kind: NodeKind, span: LineSpan) -> Self {
        Self::new(kind, span, Vec::new())
    }

    /// Pre-order walk over this node and everything below it, including
    /// function headers, decorators and `if` tests.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SyntaxNode)) {
        visit(self);
        match &self.kind {
            NodeKind::Function(sig) => {
                for node in sig.decorators.iter().chain(&sig.header) {
                    node.walk(visit);
                }
                if let Some(returns) = &sig.returns {
                    returns.walk(visit);
                }
            }
            NodeKind::If { test } => test.walk(visit),
            _ => {}
        }
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Collects every node below (and including) `self` matching `pred`.
    pub fn find_all<'a>(&'a self, pred: impl Fn(&SyntaxNode) -> bool) -> Vec<&'a SyntaxNode> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if pred(node) {
                found.push(node);
            }
        });
        found
    }

    pub fn any(&self, pred: impl Fn(&SyntaxNode) -> bool) -> bool {
        !self.find_all(pred).is_empty()
    }

    pub fn function(&self) -> Option<&FunctionSig> {
        match &self.kind {
            NodeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn callee(&self) -> Option<&SyntaxNode> {
        match self.kind {
            NodeKind::Call => self.children.first(),
            _ => None,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&SyntaxNode> {
        if self.kind != NodeKind::Call {
            return None;
        }
        self.children.iter().find_map(|child| match &child.kind {
            NodeKind::Keyword { name: Some(n) } if n == name => child.children.first(),
            _ => None,
        })
    }

    /// Renders `a`, `a.b.c` style references; `None` for anything else.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Name(id) => Some(id.clone()),
            NodeKind::Attribute { member } => {
                let receiver = self.children.first()?.dotted_name()?;
                Some(format!("{receiver}.{member}"))
            }
            _ => None,
        }
    }

    pub fn string_literal(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Str(s) => Some(s),
            _ => None,
        }
    }
}
