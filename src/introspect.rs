//! Capability introspection of a loaded module.
//!
//! Reads the entries recorded by the registry stand-in, then confirms the
//! module has an entry guard that starts the server.

use tracing::debug;

use crate::config::ContractConfig;
use crate::error::ValidationError;
use crate::report::{labels, ReportBuilder};
use crate::sandbox::LoadedModule;
use crate::syntax::{NodeKind, SyntaxNode};

pub struct Introspector<'c> {
    contract: &'c ContractConfig,
}

impl<'c> Introspector<'c> {
    pub fn new(contract: &'c ContractConfig) -> Self {
        Self { contract }
    }

    /// Runs the instance, registration and entry-guard checks in order,
    /// appending one label per passed check. Returns the registered names.
    pub fn inspect(
        &self,
        module: &LoadedModule,
        tree: &SyntaxNode,
        report: &mut ReportBuilder,
    ) -> Result<Vec<String>, ValidationError> {
        let type_name = &self.contract.registry_type;
        let registry = match module.registries.as_slice() {
            [] => return Err(ValidationError::MissingCapabilityInstance(type_name.clone())),
            [registry] => registry,
            many => {
                return Err(ValidationError::MultipleCapabilityInstances {
                    type_name: type_name.clone(),
                    count: many.len(),
                })
            }
        };
        report.pass(labels::registry_instance(type_name));

        let names = registry.tool_names();
        if names.is_empty() {
            return Err(ValidationError::NoRegisteredTools {
                root: self.contract.registry_root.clone(),
                verb: self.contract.registration_verb.clone(),
            });
        }
        debug!(binding = %registry.binding, tools = %names.join(", "), "Registered tools");
        report.pass(labels::tools_registered(&names));

        self.check_entry_guard(tree)?;
        report.pass(labels::MAIN_BLOCK);

        Ok(names)
    }

    /// A top-level `if __name__ == "__main__":` that calls `<root>.<run>()`.
    pub fn check_entry_guard(&self, tree: &SyntaxNode) -> Result<(), ValidationError> {
        let guards: Vec<&SyntaxNode> = tree
            .children
            .iter()
            .filter(|node| is_main_guard(node))
            .collect();
        if guards.is_empty() {
            return Err(ValidationError::MissingEntryGuard);
        }

        let run_target = format!("{}.{}", self.contract.registry_root, self.contract.run_method);
        let runs = guards.iter().any(|guard| {
            guard.any(|node| {
                node.callee().and_then(SyntaxNode::dotted_name).as_deref()
                    == Some(run_target.as_str())
            })
        });
        if !runs {
            return Err(ValidationError::MissingRunCall {
                root: self.contract.registry_root.clone(),
                run: self.contract.run_method.clone(),
            });
        }
        Ok(())
    }
}

fn is_main_guard(node: &SyntaxNode) -> bool {
    let NodeKind::If { test } = &node.kind else {
        return false;
    };
    test.any(|n| n.kind == NodeKind::Name("__name__".to_string()))
        && test.any(|n| n.string_literal() == Some("__main__"))
}
