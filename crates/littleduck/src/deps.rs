//! Import graph resolution.
//!
//! Builds the directed module → imports graph, rejects unreachable
//! candidate modules and circular imports, and produces the topological
//! order dependencies are analyzed in: leaves first, `main` last.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::errors::CompileError;

/// Directed graph of module import relationships.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Builds the graph from each module's declared import list.
    ///
    /// # Errors
    /// Returns [`CompileError`] when a module imports a name no supplied
    /// module carries.
    pub fn build(modules: &IndexMap<String, Vec<String>>) -> Result<Self, CompileError> {
        let mut graph = IndexMap::new();
        for (module, imports) in modules {
            for import in imports {
                if !modules.contains_key(import) {
                    return Err(CompileError::new(format!(
                        "Module '{module}' imports '{import}', but no such module was provided"
                    )));
                }
            }
            graph.insert(module.clone(), imports.iter().cloned().collect());
        }
        Ok(Self { graph })
    }

    /// Rejects candidate modules not transitively reachable from `main`.
    /// Every supplied module must be used.
    ///
    /// # Errors
    /// Returns [`CompileError`] naming the first unreachable module.
    pub fn check_all_reachable(&self, main_module: &str) -> Result<(), CompileError> {
        let mut reachable = IndexSet::new();
        let mut worklist = vec![main_module.to_owned()];
        while let Some(module) = worklist.pop() {
            if !reachable.insert(module.clone()) {
                continue;
            }
            if let Some(imports) = self.graph.get(&module) {
                worklist.extend(imports.iter().cloned());
            }
        }
        for module in self.graph.keys() {
            if !reachable.contains(module) {
                return Err(CompileError::new(format!(
                    "Module '{module}' was provided but never imported"
                )));
            }
        }
        Ok(())
    }

    /// DFS for back-edges; any back-edge is a circular import.
    ///
    /// # Errors
    /// Returns [`CompileError`] naming a module on the cycle.
    pub fn detect_cycles(&self) -> Result<(), CompileError> {
        let mut visited = IndexSet::new();
        let mut in_progress = IndexSet::new();
        for module in self.graph.keys() {
            if !visited.contains(module) {
                self.visit_for_cycles(module, &mut visited, &mut in_progress)?;
            }
        }
        Ok(())
    }

    fn visit_for_cycles(
        &self,
        module: &str,
        visited: &mut IndexSet<String>,
        in_progress: &mut IndexSet<String>,
    ) -> Result<(), CompileError> {
        if in_progress.contains(module) {
            return Err(CompileError::new(format!(
                "Circular dependency detected: {module}"
            )));
        }
        if visited.contains(module) {
            return Ok(());
        }
        in_progress.insert(module.to_owned());
        if let Some(imports) = self.graph.get(module) {
            for import in imports {
                self.visit_for_cycles(import, visited, in_progress)?;
            }
        }
        in_progress.shift_remove(module);
        visited.insert(module.to_owned());
        Ok(())
    }

    /// Topologically sorts the graph so leaves compile first.
    ///
    /// # Errors
    /// Returns [`CompileError`] when the resulting order does not end at
    /// `main_module` (a malformed graph).
    pub fn topological_sort(&self, main_module: &str) -> Result<Vec<String>, CompileError> {
        let mut visited = IndexSet::new();
        let mut order = Vec::new();
        self.visit_postorder(main_module, &mut visited, &mut order);
        if order.last().map(String::as_str) != Some(main_module) {
            return Err(CompileError::new(format!(
                "Malformed dependency graph: compilation order does not end at '{main_module}'"
            )));
        }
        debug!(?order, "dependency order resolved");
        Ok(order)
    }

    fn visit_postorder(
        &self,
        module: &str,
        visited: &mut IndexSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(module.to_owned()) {
            return;
        }
        if let Some(imports) = self.graph.get(module) {
            for import in imports {
                self.visit_postorder(import, visited, order);
            }
        }
        order.push(module.to_owned());
    }
}

/// Runs the full resolution: graph build, reachability, cycle detection,
/// topological sort.
///
/// # Errors
/// Returns [`CompileError`] for missing imports, unused modules, circular
/// imports, or a malformed graph.
pub fn resolve_order(
    modules: &IndexMap<String, Vec<String>>,
    main_module: &str,
) -> Result<Vec<String>, CompileError> {
    let graph = DependencyGraph::build(modules)?;
    graph.check_all_reachable(main_module)?;
    graph.detect_cycles()?;
    graph.topological_sort(main_module)
}
