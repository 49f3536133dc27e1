//! Dependency graph over component names.
//!
//! # Responsibilities
//! - Store forward edges (`A → B`: A requires B first)
//! - Reject cycles when the graph is built
//! - Produce deterministic initialization orders, optionally scoped
//! - Derive reverse (dependents) lookups from forward edges on demand

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::component::ComponentDescriptor;
use crate::error::RuntimeError;

/// A cycle was found while building the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", .cycle.join(" -> "))]
pub struct CycleError {
    /// Members of the cycle in the order the traversal met them.
    pub cycle: Vec<String>,
}

impl From<CycleError> for RuntimeError {
    fn from(err: CycleError) -> Self {
        RuntimeError::CycleDetected { cycle: err.cycle }
    }
}

/// Acyclic dependency graph.
///
/// Only forward edges are stored. Edges may point at names that are not nodes
/// of this graph; they are ignored for ordering and reported by
/// [`DependencyGraph::unresolved`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

impl DependencyGraph {
    /// Build a graph from descriptors, rejecting cycles.
    pub fn build<'a, I>(descriptors: I) -> Result<Self, CycleError>
    where
        I: IntoIterator<Item = &'a ComponentDescriptor>,
    {
        Self::from_edges(
            descriptors
                .into_iter()
                .map(|d| (d.name.clone(), d.dependencies.clone())),
        )
    }

    /// Build a graph from `(name, dependencies)` pairs, rejecting cycles.
    pub fn from_edges<I>(edges: I) -> Result<Self, CycleError>
    where
        I: IntoIterator<Item = (String, BTreeSet<String>)>,
    {
        let graph = Self {
            edges: edges.into_iter().collect(),
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), CycleError> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for node in self.edges.keys() {
            if !marks.contains_key(node.as_str()) {
                self.visit(node, &mut marks, &mut stack)?;
            }
        }
        Ok(())
    }

    fn visit<'g>(
        &'g self,
        node: &'g str,
        marks: &mut BTreeMap<&'g str, Mark>,
        stack: &mut Vec<&'g str>,
    ) -> Result<(), CycleError> {
        marks.insert(node, Mark::OnStack);
        stack.push(node);

        for dep in self.dependencies_of(node) {
            if !self.contains(dep) {
                continue;
            }
            match marks.get(dep) {
                Some(Mark::OnStack) => {
                    let start = stack.iter().position(|n| *n == dep).unwrap_or(0);
                    return Err(CycleError {
                        cycle: stack[start..].iter().map(|n| n.to_string()).collect(),
                    });
                }
                Some(Mark::Done) => {}
                None => self.visit(dep, marks, stack)?,
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        Ok(())
    }

    /// Whether `name` is a node of this graph.
    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// All node names in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Direct dependencies of `name` (forward edges).
    pub fn dependencies_of<'g>(&'g self, name: &str) -> impl Iterator<Item = &'g str> + 'g {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Direct dependents of `name`, derived from forward edges.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(name))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// `(component, dependency)` pairs whose dependency is not a node.
    pub fn unresolved(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .flat_map(|(n, deps)| {
                deps.iter()
                    .filter(|d| !self.edges.contains_key(*d))
                    .map(move |d| (n.clone(), d.clone()))
            })
            .collect()
    }

    /// `scope` plus everything it transitively depends on.
    pub fn dependency_closure<'s, I>(&self, scope: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<&str> = scope.into_iter().filter(|n| self.contains(n)).collect();

        while let Some(name) = pending.pop() {
            if closure.insert(name.to_string()) {
                pending.extend(self.dependencies_of(name).filter(|d| self.contains(d)));
            }
        }
        closure
    }

    /// Dependencies-first order.
    ///
    /// Ties are broken by ascending name. With a scope, only the scope and its
    /// transitive dependency closure are ordered.
    pub fn topological_order(&self, scope: Option<&BTreeSet<String>>) -> Vec<String> {
        let included: BTreeSet<String> = match scope {
            Some(scope) => self.dependency_closure(scope.iter().map(String::as_str)),
            None => self.edges.keys().cloned().collect(),
        };

        let mut remaining: BTreeMap<&str, usize> = included
            .iter()
            .map(|n| {
                let count = self
                    .dependencies_of(n)
                    .filter(|d| included.contains(*d))
                    .count();
                (n.as_str(), count)
            })
            .collect();

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, c)| **c == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(included.len());

        while let Some(next) = ready.pop_first() {
            remaining.remove(next);
            order.push(next.to_string());

            for dependent in self.dependents_of(next) {
                let Some(count) = remaining.get_mut(dependent.as_str()) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    if let Some(name) = included.get(dependent.as_str()) {
                        ready.insert(name.as_str());
                    }
                }
            }
        }

        order
    }
}

/// Shutdown order for an executed initialization order: a plain reversal.
pub fn reverse(order: &[String]) -> Vec<String> {
    order.iter().rev().cloned().collect()
}
