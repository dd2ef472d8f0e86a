//! Lowering from the rustpython AST into [`SyntaxNode`]s.
//!
//! Byte offsets are converted to 1-based line numbers here so nothing
//! downstream needs the parser's range types.

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::text_size::{TextRange, TextSize};

use super::tree::{FunctionSig, ImportBinding, LineSpan, NodeKind, Param, SyntaxNode};

/// Maps byte offsets to line numbers.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn line_of(&self, offset: TextSize) -> usize {
        let offset = usize::from(offset);
        self.line_starts.partition_point(|&start| start <= offset)
    }

    fn span(&self, range: TextRange) -> LineSpan {
        let start = self.line_of(range.start());
        // The end offset is exclusive; step back so a trailing newline
        // does not push the span onto the next line.
        let end_offset = usize::from(range.end()).saturating_sub(1);
        let end = self
            .line_of(TextSize::try_from(end_offset).unwrap_or(range.end()))
            .max(start);
        LineSpan::new(start, end)
    }
}

pub struct Lowerer<'a> {
    lines: &'a LineIndex,
}

impl<'a> Lowerer<'a> {
    pub fn new(lines: &'a LineIndex) -> Self {
        Self { lines }
    }

    pub fn module(&self, suite: &[ast::Stmt], total_lines: usize) -> SyntaxNode {
        SyntaxNode::new(
            NodeKind::Module,
            LineSpan::new(1, total_lines.max(1)),
            self.stmts(suite),
        )
    }

    fn stmts(&self, stmts: &[ast::Stmt]) -> Vec<SyntaxNode> {
        stmts.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn exprs<'e>(&self, exprs: impl IntoIterator<Item = &'e ast::Expr>) -> Vec<SyntaxNode> {
        exprs.into_iter().map(|expr| self.expr(expr)).collect()
    }

    fn stmt(&self, stmt: &ast::Stmt) -> SyntaxNode {
        let span = self.lines.span(stmt.range());
        match stmt {
            ast::Stmt::FunctionDef(def) => self.function(
                span,
                def.name.as_str(),
                false,
                &def.args,
                &def.body,
                &def.decorator_list,
                def.returns.as_deref(),
            ),
            ast::Stmt::AsyncFunctionDef(def) => self.function(
                span,
                def.name.as_str(),
                true,
                &def.args,
                &def.body,
                &def.decorator_list,
                def.returns.as_deref(),
            ),
            ast::Stmt::ClassDef(def) => {
                let mut children = self.exprs(&def.bases);
                children.extend(def.keywords.iter().map(|kw| self.keyword(kw)));
                children.extend(self.exprs(&def.decorator_list));
                children.extend(self.stmts(&def.body));
                SyntaxNode::new(
                    NodeKind::Class {
                        name: def.name.as_str().to_string(),
                    },
                    span,
                    children,
                )
            }
            ast::Stmt::If(node) => {
                let mut children = self.stmts(&node.body);
                children.extend(self.stmts(&node.orelse));
                SyntaxNode::new(
                    NodeKind::If {
                        test: Box::new(self.expr(&node.test)),
                    },
                    span,
                    children,
                )
            }
            ast::Stmt::Expr(node) => {
                SyntaxNode::new(NodeKind::ExprStmt, span, vec![self.expr(&node.value)])
            }
            ast::Stmt::Return(node) => {
                SyntaxNode::new(NodeKind::Statement, span, self.exprs(node.value.as_deref()))
            }
            ast::Stmt::Delete(node) => {
                SyntaxNode::new(NodeKind::Statement, span, self.exprs(&node.targets))
            }
            ast::Stmt::Assign(node) => {
                let mut children = self.exprs(&node.targets);
                children.push(self.expr(&node.value));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::AugAssign(node) => SyntaxNode::new(
                NodeKind::Statement,
                span,
                vec![self.expr(&node.target), self.expr(&node.value)],
            ),
            ast::Stmt::AnnAssign(node) => {
                let mut children = vec![self.expr(&node.target), self.expr(&node.annotation)];
                children.extend(self.exprs(node.value.as_deref()));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::For(node) => {
                let mut children = vec![self.expr(&node.target), self.expr(&node.iter)];
                children.extend(self.stmts(&node.body));
                children.extend(self.stmts(&node.orelse));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::AsyncFor(node) => {
                let mut children = vec![self.expr(&node.target), self.expr(&node.iter)];
                children.extend(self.stmts(&node.body));
                children.extend(self.stmts(&node.orelse));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::While(node) => {
                let mut children = vec![self.expr(&node.test)];
                children.extend(self.stmts(&node.body));
                children.extend(self.stmts(&node.orelse));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::With(node) => {
                let mut children = self.with_items(&node.items);
                children.extend(self.stmts(&node.body));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::AsyncWith(node) => {
                let mut children = self.with_items(&node.items);
                children.extend(self.stmts(&node.body));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::Match(node) => {
                let mut children = vec![self.expr(&node.subject)];
                for case in &node.cases {
                    children.extend(self.exprs(case.guard.as_deref()));
                    children.extend(self.stmts(&case.body));
                }
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::Raise(node) => {
                let mut children = self.exprs(node.exc.as_deref());
                children.extend(self.exprs(node.cause.as_deref()));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::Try(node) => SyntaxNode::new(
                NodeKind::Statement,
                span,
                self.try_parts(&node.body, &node.handlers, &node.orelse, &node.finalbody),
            ),
            ast::Stmt::TryStar(node) => SyntaxNode::new(
                NodeKind::Statement,
                span,
                self.try_parts(&node.body, &node.handlers, &node.orelse, &node.finalbody),
            ),
            ast::Stmt::Assert(node) => {
                let mut children = vec![self.expr(&node.test)];
                children.extend(self.exprs(node.msg.as_deref()));
                SyntaxNode::new(NodeKind::Statement, span, children)
            }
            ast::Stmt::Import(node) => {
                let bindings = node
                    .names
                    .iter()
                    .map(|alias| {
                        let name = alias.name.as_str();
                        match &alias.asname {
                            Some(asname) => ImportBinding {
                                local: asname.as_str().to_string(),
                                target: name.to_string(),
                            },
                            // `import a.b` binds `a`
                            None => {
                                let root = name.split('.').next().unwrap_or(name);
                                ImportBinding {
                                    local: root.to_string(),
                                    target: root.to_string(),
                                }
                            }
                        }
                    })
                    .collect();
                SyntaxNode::leaf(NodeKind::Import { bindings }, span)
            }
            ast::Stmt::ImportFrom(node) => {
                let relative = node.level.as_ref().is_some_and(|level| level.to_u32() > 0);
                let bindings = match (&node.module, relative) {
                    (Some(module), false) => node
                        .names
                        .iter()
                        .filter(|alias| alias.name.as_str() != "*")
                        .map(|alias| ImportBinding {
                            local: alias
                                .asname
                                .as_ref()
                                .unwrap_or(&alias.name)
                                .as_str()
                                .to_string(),
                            target: format!("{}.{}", module.as_str(), alias.name.as_str()),
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                SyntaxNode::leaf(NodeKind::Import { bindings }, span)
            }
            _ => SyntaxNode::leaf(NodeKind::Statement, span),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn function(
        &self,
        span: LineSpan,
        name: &str,
        is_async: bool,
        args: &ast::Arguments,
        body: &[ast::Stmt],
        decorators: &[ast::Expr],
        returns: Option<&ast::Expr>,
    ) -> SyntaxNode {
        let mut params = Vec::new();
        let mut header = Vec::new();

        let with_defaults = args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(&args.kwonlyargs);
        for arg in with_defaults {
            params.push(param(&arg.def));
            header.extend(self.exprs(arg.def.annotation.as_deref()));
            header.extend(self.exprs(arg.default.as_deref()));
        }
        for arg in args.vararg.iter().chain(&args.kwarg) {
            params.push(param(arg));
            header.extend(self.exprs(arg.annotation.as_deref()));
        }

        let sig = FunctionSig {
            name: name.to_string(),
            is_async,
            params,
            returns: returns.map(|expr| self.expr(expr)),
            decorators: self.exprs(decorators),
            header,
        };
        SyntaxNode::new(NodeKind::Function(Box::new(sig)), span, self.stmts(body))
    }

    fn with_items(&self, items: &[ast::WithItem]) -> Vec<SyntaxNode> {
        let mut children = Vec::new();
        for item in items {
            children.push(self.expr(&item.context_expr));
            children.extend(self.exprs(item.optional_vars.as_deref()));
        }
        children
    }

    fn try_parts(
        &self,
        body: &[ast::Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[ast::Stmt],
        finalbody: &[ast::Stmt],
    ) -> Vec<SyntaxNode> {
        let mut children = self.stmts(body);
        for handler in handlers {
            let ast::ExceptHandler::ExceptHandler(handler) = handler;
            children.extend(self.exprs(handler.type_.as_deref()));
            children.extend(self.stmts(&handler.body));
        }
        children.extend(self.stmts(orelse));
        children.extend(self.stmts(finalbody));
        children
    }

    fn keyword(&self, kw: &ast::Keyword) -> SyntaxNode {
        SyntaxNode::new(
            NodeKind::Keyword {
                name: kw.arg.as_ref().map(|id| id.as_str().to_string()),
            },
            self.lines.span(kw.value.range()),
            vec![self.expr(&kw.value)],
        )
    }

    fn comprehension(&self, elts: Vec<SyntaxNode>, generators: &[ast::Comprehension]) -> Vec<SyntaxNode> {
        let mut children = elts;
        for generator in generators {
            children.push(self.expr(&generator.target));
            children.push(self.expr(&generator.iter));
            children.extend(self.exprs(&generator.ifs));
        }
        children
    }

    fn expr(&self, expr: &ast::Expr) -> SyntaxNode {
        let span = self.lines.span(expr.range());
        let (kind, children) = match expr {
            ast::Expr::Call(call) => {
                let mut children = vec![self.expr(&call.func)];
                children.extend(self.exprs(&call.args));
                children.extend(call.keywords.iter().map(|kw| self.keyword(kw)));
                (NodeKind::Call, children)
            }
            ast::Expr::Attribute(node) => (
                NodeKind::Attribute {
                    member: node.attr.as_str().to_string(),
                },
                vec![self.expr(&node.value)],
            ),
            ast::Expr::Name(node) => (NodeKind::Name(node.id.as_str().to_string()), Vec::new()),
            ast::Expr::Constant(node) => match &node.value {
                ast::Constant::Str(s) => (NodeKind::Str(s.clone()), Vec::new()),
                _ => (NodeKind::Expression, Vec::new()),
            },
            ast::Expr::Await(node) => (NodeKind::Expression, vec![self.expr(&node.value)]),
            ast::Expr::YieldFrom(node) => (NodeKind::Expression, vec![self.expr(&node.value)]),
            ast::Expr::Yield(node) => (NodeKind::Expression, self.exprs(node.value.as_deref())),
            ast::Expr::Starred(node) => (NodeKind::Expression, vec![self.expr(&node.value)]),
            ast::Expr::UnaryOp(node) => (NodeKind::Expression, vec![self.expr(&node.operand)]),
            ast::Expr::BinOp(node) => (
                NodeKind::Expression,
                vec![self.expr(&node.left), self.expr(&node.right)],
            ),
            ast::Expr::BoolOp(node) => (NodeKind::Expression, self.exprs(&node.values)),
            ast::Expr::NamedExpr(node) => (
                NodeKind::Expression,
                vec![self.expr(&node.target), self.expr(&node.value)],
            ),
            ast::Expr::Compare(node) => {
                let mut children = vec![self.expr(&node.left)];
                children.extend(self.exprs(&node.comparators));
                (NodeKind::Expression, children)
            }
            ast::Expr::IfExp(node) => (
                NodeKind::Expression,
                vec![
                    self.expr(&node.test),
                    self.expr(&node.body),
                    self.expr(&node.orelse),
                ],
            ),
            ast::Expr::Lambda(node) => (NodeKind::Expression, vec![self.expr(&node.body)]),
            ast::Expr::Dict(node) => {
                let mut children = self.exprs(node.keys.iter().flatten());
                children.extend(self.exprs(&node.values));
                (NodeKind::Expression, children)
            }
            ast::Expr::Set(node) => (NodeKind::Expression, self.exprs(&node.elts)),
            ast::Expr::List(node) => (NodeKind::Expression, self.exprs(&node.elts)),
            ast::Expr::Tuple(node) => (NodeKind::Expression, self.exprs(&node.elts)),
            ast::Expr::ListComp(node) => (
                NodeKind::Expression,
                self.comprehension(vec![self.expr(&node.elt)], &node.generators),
            ),
            ast::Expr::SetComp(node) => (
                NodeKind::Expression,
                self.comprehension(vec![self.expr(&node.elt)], &node.generators),
            ),
            ast::Expr::GeneratorExp(node) => (
                NodeKind::Expression,
                self.comprehension(vec![self.expr(&node.elt)], &node.generators),
            ),
            ast::Expr::DictComp(node) => (
                NodeKind::Expression,
                self.comprehension(
                    vec![self.expr(&node.key), self.expr(&node.value)],
                    &node.generators,
                ),
            ),
            ast::Expr::JoinedStr(node) => (NodeKind::Expression, self.exprs(&node.values)),
            ast::Expr::FormattedValue(node) => {
                let mut children = vec![self.expr(&node.value)];
                children.extend(self.exprs(node.format_spec.as_deref()));
                (NodeKind::Expression, children)
            }
            ast::Expr::Subscript(node) => (
                NodeKind::Expression,
                vec![self.expr(&node.value), self.expr(&node.slice)],
            ),
            ast::Expr::Slice(node) => {
                let mut children = self.exprs(node.lower.as_deref());
                children.extend(self.exprs(node.upper.as_deref()));
                children.extend(self.exprs(node.step.as_deref()));
                (NodeKind::Expression, children)
            }
            _ => (NodeKind::Expression, Vec::new()),
        };
        SyntaxNode::new(kind, span, children)
    }
}

fn param(arg: &ast::Arg) -> Param {
    Param {
        name: arg.arg.as_str().to_string(),
        annotated: arg.annotation.is_some(),
    }
}
