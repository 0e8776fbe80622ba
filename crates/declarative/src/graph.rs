//! Resource graph builder
//!
//! Turns an ordered set of declarations into a dependency graph. An edge
//! `a -> b` means `b` must be applied before `a`. Edges come from references
//! anywhere in `a`'s attributes and from `a`'s explicit `depends_on` list.

use crate::error::{Error, Result};
use crate::resource::Declaration;
use std::collections::{BTreeSet, HashMap};

/// Immutable dependency graph over declared resources
///
/// Nodes are indexed by declaration order, which is also the tie-breaker
/// for every traversal.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    nodes: Vec<Declaration>,
    index: HashMap<String, usize>,
    /// `edges[i]` holds the dependencies of node `i`, sorted by declaration order
    edges: Vec<Vec<usize>>,
}

impl ResourceGraph {
    /// Build the graph, validating identifiers and references.
    ///
    /// This is a pure transformation: nothing is checked against state or
    /// a backend. Cycles are left for [`crate::cycle::check`].
    pub fn build(declarations: Vec<Declaration>) -> Result<Self> {
        let mut index = HashMap::with_capacity(declarations.len());
        for (i, decl) in declarations.iter().enumerate() {
            if index.insert(decl.id.clone(), i).is_some() {
                return Err(Error::DuplicateResource(decl.id.clone()));
            }
        }

        let mut edges = Vec::with_capacity(declarations.len());
        for decl in &declarations {
            let mut deps = BTreeSet::new();
            for target in decl.dependency_ids() {
                let Some(&dep) = index.get(target) else {
                    return Err(Error::UnresolvedReference {
                        resource: decl.id.clone(),
                        target: target.to_string(),
                    });
                };
                deps.insert(dep);
            }
            edges.push(deps.into_iter().collect());
        }

        log::debug!(
            "Built resource graph: {} nodes, {} edges",
            declarations.len(),
            edges.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            nodes: declarations,
            index,
            edges,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.nodes
    }

    pub fn node(&self, i: usize) -> &Declaration {
        &self.nodes[i]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Direct dependencies of node `i`
    pub fn dependencies(&self, i: usize) -> &[usize] {
        &self.edges[i]
    }

    /// Adjacency lists for the whole graph
    pub fn edges(&self) -> &[Vec<usize>] {
        &self.edges
    }

    /// Nodes that directly depend on node `i`
    pub fn dependents(&self, i: usize) -> Vec<usize> {
        (0..self.len())
            .filter(|&n| self.edges[n].contains(&i))
            .collect()
    }

    /// `roots` plus everything they transitively depend on
    pub fn with_dependencies(&self, roots: &[usize]) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = roots.to_vec();
        while let Some(n) = stack.pop() {
            if seen.insert(n) {
                stack.extend(self.edges[n].iter().copied());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use crate::value::Value;

    fn stack() -> Vec<Declaration> {
        vec![
            Declaration::new("bucket", ResourceKind::Bucket),
            Declaration::new("role", ResourceKind::Role),
            Declaration::new("function", ResourceKind::Function)
                .with_attribute("role", Value::reference("role", "arn"))
                .with_dependency("bucket"),
        ]
    }

    #[test]
    fn test_build_collects_reference_and_explicit_edges() {
        let graph = ResourceGraph::build(stack()).unwrap();
        let function = graph.index_of("function").unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.dependencies(function), &[0, 1]);
        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.dependents(0), vec![function]);
    }

    #[test]
    fn test_unresolved_reference() {
        let decls = vec![
            Declaration::new("function", ResourceKind::Function)
                .with_attribute("role", Value::reference("missing_role", "arn")),
        ];
        let err = ResourceGraph::build(decls).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedReference { resource, target }
                if resource == "function" && target == "missing_role"
        ));
    }

    #[test]
    fn test_unresolved_explicit_dependency() {
        let decls =
            vec![Declaration::new("function", ResourceKind::Function).with_dependency("nowhere")];
        assert!(matches!(
            ResourceGraph::build(decls),
            Err(Error::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_duplicate_resource() {
        let decls = vec![
            Declaration::new("bucket", ResourceKind::Bucket),
            Declaration::new("bucket", ResourceKind::Role),
        ];
        assert!(matches!(
            ResourceGraph::build(decls),
            Err(Error::DuplicateResource(id)) if id == "bucket"
        ));
    }

    #[test]
    fn test_with_dependencies_is_transitive() {
        let decls = vec![
            Declaration::new("a", ResourceKind::Bucket),
            Declaration::new("b", ResourceKind::Role).with_dependency("a"),
            Declaration::new("c", ResourceKind::Function).with_dependency("b"),
            Declaration::new("d", ResourceKind::LogGroup),
        ];
        let graph = ResourceGraph::build(decls).unwrap();
        let set: Vec<usize> = graph.with_dependencies(&[2]).into_iter().collect();
        assert_eq!(set, vec![0, 1, 2]);
    }
}
