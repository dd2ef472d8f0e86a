//! Detection of console writes that would corrupt the stdio transport.
//!
//! MCP servers speak JSON-RPC over stdout, so any bare `print()` or
//! `sys.stdout.write()` reached while serving a tool call breaks the
//! channel. Writes are flagged when their line falls inside a tool's line
//! range, or inside a module-level helper the tools call by name.
//!
//! Names are resolved through the module's imports first, so
//! `from sys import stderr` makes `file=stderr` read as `sys.stderr`.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::syntax::{LineSpan, NodeKind, SyntaxNode};

use super::marker::ToolDeclaration;

const STDOUT_WRITERS: &[&str] = &["sys.stdout.write", "sys.stdout.writelines"];

/// Local names bound by import statements anywhere in the module.
#[derive(Debug, Default)]
pub struct ImportAliases {
    targets: HashMap<String, String>,
}

impl ImportAliases {
    pub fn collect(tree: &SyntaxNode) -> Self {
        let mut targets = HashMap::new();
        for node in tree.find_all(|n| matches!(n.kind, NodeKind::Import { .. })) {
            if let NodeKind::Import { bindings } = &node.kind {
                for binding in bindings {
                    targets.insert(binding.local.clone(), binding.target.clone());
                }
            }
        }
        Self { targets }
    }

    /// Rewrites the first segment of `dotted` through its import.
    pub fn resolve(&self, dotted: &str) -> String {
        let (head, rest) = match dotted.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (dotted, None),
        };
        match (self.targets.get(head), rest) {
            (Some(target), Some(rest)) => format!("{target}.{rest}"),
            (Some(target), None) => target.clone(),
            (None, _) => dotted.to_string(),
        }
    }
}

pub struct OutputScan<'c> {
    /// `print(file=...)` targets that are allowed, e.g. `sys.stderr`
    pub diagnostic_streams: &'c [String],
    pub follow_helpers: bool,
}

impl OutputScan<'_> {
    /// True when `node` writes to stdout.
    pub fn is_console_write(&self, node: &SyntaxNode, aliases: &ImportAliases) -> bool {
        let Some(callee) = node.callee().and_then(SyntaxNode::dotted_name) else {
            return false;
        };
        let callee = aliases.resolve(&callee);
        if callee == "print" {
            let redirected = node
                .keyword("file")
                .and_then(SyntaxNode::dotted_name)
                .map(|target| aliases.resolve(&target))
                .is_some_and(|target| self.diagnostic_streams.contains(&target));
            return !redirected;
        }
        STDOUT_WRITERS.contains(&callee.as_str())
    }

    /// Offending lines, unique and ascending.
    pub fn violations(&self, tree: &SyntaxNode, tools: &[ToolDeclaration<'_>]) -> Vec<usize> {
        let mut ranges: Vec<LineSpan> = tools.iter().map(|t| t.span).collect();
        if self.follow_helpers {
            ranges.extend(reachable_helpers(tree, tools).into_iter().map(|h| h.span));
        }
        if ranges.is_empty() {
            return Vec::new();
        }

        let aliases = ImportAliases::collect(tree);
        let lines: BTreeSet<usize> = tree
            .find_all(|node| self.is_console_write(node, &aliases))
            .into_iter()
            .map(|call| call.span.start)
            .filter(|line| ranges.iter().any(|range| range.contains(*line)))
            .collect();
        lines.into_iter().collect()
    }
}

/// Module-level functions transitively called by bare name from any tool.
fn reachable_helpers<'a>(
    tree: &'a SyntaxNode,
    tools: &[ToolDeclaration<'a>],
) -> Vec<&'a SyntaxNode> {
    let tool_names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    let helpers: HashMap<&str, &SyntaxNode> = tree
        .children
        .iter()
        .filter_map(|node| node.function().map(|sig| (sig.name.as_str(), node)))
        .filter(|(name, _)| !tool_names.contains(name))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut found = Vec::new();
    let mut queue: VecDeque<&SyntaxNode> = tools.iter().map(|t| t.node).collect();

    while let Some(body) = queue.pop_front() {
        for callee in called_names(body) {
            if let Some((&name, &helper)) = helpers.get_key_value(callee.as_str()) {
                if seen.insert(name) {
                    found.push(helper);
                    queue.push_back(helper);
                }
            }
        }
    }
    found
}

fn called_names(node: &SyntaxNode) -> Vec<String> {
    node.find_all(|n| {
        n.callee()
            .is_some_and(|callee| matches!(callee.kind, NodeKind::Name(_)))
    })
    .into_iter()
    .filter_map(|call| call.callee().and_then(SyntaxNode::dotted_name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::marker::CapabilityMarker;
    use crate::syntax::parse_module;

    fn scan_lines(source: &str, follow_helpers: bool) -> Vec<usize> {
        let streams = vec!["sys.stderr".to_string()];
        let scan = OutputScan {
            diagnostic_streams: &streams,
            follow_helpers,
        };
        let tree = parse_module(source, "<test>").unwrap();
        let tools = CapabilityMarker::new("mcp", "tool").tools(&tree);
        scan.violations(&tree, &tools)
    }

    #[test]
    fn test_bare_print_in_tool_is_flagged() {
        let source = "\
import sys

@mcp.tool()
async def fetch(url: str) -> str:
    \"\"\"Fetch.\"\"\"
    print(\"debug\")
    print(\"ok\", file=sys.stderr)
    return url
";
        assert_eq!(scan_lines(source, false), vec![6]);
    }

    #[test]
    fn test_print_outside_tools_is_ignored() {
        let source = "\
print(\"module level\")

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    return ''

if __name__ == \"__main__\":
    print(\"usage\")
";
        assert!(scan_lines(source, true).is_empty());
    }

    #[test]
    fn test_stdout_write_is_a_console_write() {
        let source = "\
import sys

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    sys.stdout.write(\"x\")
    sys.stderr.write(\"y\")
    return ''
";
        assert_eq!(scan_lines(source, false), vec![6]);
    }

    #[test]
    fn test_print_to_stdout_keyword_is_not_redirected() {
        let source = "\
import sys

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    print(\"x\", file=sys.stdout)
    return ''
";
        assert_eq!(scan_lines(source, false), vec![6]);
    }

    #[test]
    fn test_transitive_helpers_are_followed() {
        let source = "\
def _log(msg):
    print(msg)

def _work():
    _log(\"working\")
    return 1

def _unused():
    print(\"never called from a tool\")

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    _work()
    return ''
";
        assert_eq!(scan_lines(source, true), vec![2]);
        assert!(scan_lines(source, false).is_empty());
    }

    #[test]
    fn test_recursive_helpers_terminate() {
        let source = "\
def ping(n):
    return pong(n)

def pong(n):
    return ping(n)

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    ping(1)
    return ''
";
        assert!(scan_lines(source, true).is_empty());
    }

    #[test]
    fn test_multiple_lines_are_sorted_and_unique() {
        let source = "\
@mcp.tool()
async def b() -> str:
    \"\"\"B.\"\"\"
    print(1); print(2)
    print(3)
    return ''
";
        assert_eq!(scan_lines(source, false), vec![4, 5]);
    }

    #[test]
    fn test_imported_stream_names_are_resolved() {
        let source = "\
from sys import stderr, stdout
import sys as system

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    print(\"ok\", file=stderr)
    print(\"ok\", file=system.stderr)
    print(\"bad\", file=stdout)
    stdout.write(\"bad\")
    system.stdout.write(\"bad\")
    return ''
";
        assert_eq!(scan_lines(source, false), vec![9, 10, 11]);
    }

    #[test]
    fn test_print_rebound_by_import_is_not_builtin() {
        let source = "\
from rich import print

@mcp.tool()
async def fetch() -> str:
    \"\"\"Fetch.\"\"\"
    print(\"styled\")
    return ''
";
        assert!(scan_lines(source, false).is_empty());
    }
}
