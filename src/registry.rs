//! Registry and topological scheduler
//!
//! Per Design Note 2 ("Global mutable registry"), registration is
//! re-expressed as an explicit builder: a mutable [`RegistryBuilder`]
//! accrues definitions, and a single [`RegistryBuilder::build`] call
//! performs the duplicate/closure/cycle checks and produces an
//! immutable [`Registry`]. Sessions hold the result behind an `Arc` so
//! independent sessions can share one registry by read-only reference
//! (spec §5).

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::definition::NodeDefinition;
use crate::errors::RegistrationError;
use crate::identity::InstanceId;

/// Accrues node definitions across one or more `register` calls before
/// a single consistency-checked [`Registry`] is built.
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<NodeDefinition>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of definitions into the builder. Safe to call
    /// repeatedly with disjoint batches; duplicate IDs across any two
    /// calls are only detected at `build()`.
    pub fn register(&mut self, definitions: impl IntoIterator<Item = NodeDefinition>) {
        self.pending.extend(definitions);
    }

    /// Validate and close over every accrued definition, producing an
    /// immutable, topologically-ordered [`Registry`].
    ///
    /// Checks run in this order: per-definition self-validation,
    /// duplicate-ID detection, dependency-closure resolution, then
    /// Kahn's-algorithm cycle detection with level assignment.
    pub fn build(self) -> Result<Registry, RegistrationError> {
        for def in &self.pending {
            def.validate_self()?;
        }

        let mut by_id: IndexMap<InstanceId, NodeDefinition> = IndexMap::new();
        for def in self.pending {
            if by_id.contains_key(&def.id) {
                return Err(RegistrationError::DuplicateId { id: def.id });
            }
            by_id.insert(def.id.clone(), def);
        }

        for def in by_id.values() {
            for dep in &def.dependencies {
                if !by_id.contains_key(dep) {
                    return Err(RegistrationError::UnknownDependency {
                        from: def.id.clone(),
                        to: dep.clone(),
                    });
                }
            }
        }

        let (order, dependents) = topological_order(&by_id)?;

        // Reorder `by_id` into ascending (level, id) order so that simple
        // iteration over `Registry::definitions` already yields the
        // evaluator's required ascending topological walk order.
        let mut ranked: Vec<InstanceId> = by_id.keys().cloned().collect();
        ranked.sort_by(|a, b| {
            order[a].cmp(&order[b]).then_with(|| a.cmp(b))
        });
        let mut ordered: IndexMap<InstanceId, NodeDefinition> = IndexMap::new();
        for id in ranked {
            let (id, def) = by_id.shift_remove_entry(&id).expect("id came from by_id");
            ordered.insert(id, def);
        }

        Ok(Registry {
            definitions: ordered,
            order,
            dependents,
        })
    }
}

/// Kahn's-algorithm topological sort. Returns the per-ID level
/// (assigned order) and the reverse (dependents) adjacency map, or a
/// `Cycle` error naming every ID left with unresolved in-edges.
fn topological_order(
    by_id: &IndexMap<InstanceId, NodeDefinition>,
) -> Result<(HashMap<InstanceId, u32>, HashMap<InstanceId, Vec<InstanceId>>), RegistrationError> {
    let mut in_degree: HashMap<InstanceId, usize> =
        by_id.keys().map(|id| (id.clone(), 0)).collect();
    let mut dependents: HashMap<InstanceId, Vec<InstanceId>> =
        by_id.keys().map(|id| (id.clone(), Vec::new())).collect();

    for def in by_id.values() {
        for dep in &def.dependencies {
            *in_degree.get_mut(&def.id).expect("known id") += 1;
            dependents
                .get_mut(dep)
                .expect("known id")
                .push(def.id.clone());
        }
    }

    let mut order: HashMap<InstanceId, u32> = HashMap::new();
    // Deterministic frontier processing: sort the initial frontier so
    // level assignment does not depend on registration order.
    let mut frontier: Vec<InstanceId> = by_id
        .keys()
        .filter(|id| in_degree[*id] == 0)
        .cloned()
        .collect();
    frontier.sort();

    let mut remaining = in_degree.clone();
    let mut level: u32 = 0;
    let mut current = frontier;
    while !current.is_empty() {
        let mut next: HashSet<InstanceId> = HashSet::new();
        for id in &current {
            order.insert(id.clone(), level);
            for dependent in &dependents[id] {
                let deg = remaining.get_mut(dependent).expect("known id");
                *deg -= 1;
                if *deg == 0 {
                    next.insert(dependent.clone());
                }
            }
        }
        let mut next: Vec<InstanceId> = next.into_iter().collect();
        next.sort();
        current = next;
        level += 1;
    }

    if order.len() != by_id.len() {
        let mut stuck: Vec<InstanceId> = by_id
            .keys()
            .filter(|id| !order.contains_key(*id))
            .cloned()
            .collect();
        stuck.sort();
        return Err(RegistrationError::Cycle { ids: stuck });
    }

    Ok((order, dependents))
}

/// An immutable, closed, acyclic, topologically-ordered catalog of node
/// definitions. Build via [`RegistryBuilder::build`].
pub struct Registry {
    definitions: IndexMap<InstanceId, NodeDefinition>,
    order: HashMap<InstanceId, u32>,
    dependents: HashMap<InstanceId, Vec<InstanceId>>,
}

impl Registry {
    /// Look up a definition by ID.
    pub fn get(&self, id: &InstanceId) -> Option<&NodeDefinition> {
        self.definitions.get(id)
    }

    /// Whether `id` is a known instance.
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.definitions.contains_key(id)
    }

    /// The number of registered node definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether this registry has no registered definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Every definition, in ascending topological order (ties broken
    /// lexicographically by ID).
    pub fn iter_in_order(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    /// The Kahn level ("order") assigned to `id` at build time.
    pub fn order_of(&self, id: &InstanceId) -> Option<u32> {
        self.order.get(id).copied()
    }

    /// The direct dependents of `id` (nodes whose `dependencies` list
    /// contains it).
    pub fn dependents_of(&self, id: &InstanceId) -> &[InstanceId] {
        self.dependents
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The transitive closure of dependents of `id`, in ascending
    /// topological order (ties broken by ID) — the dirty set produced
    /// by a single input change (spec §4.3.2).
    pub fn transitive_dependents(&self, id: &InstanceId) -> Vec<InstanceId> {
        let mut seen: HashSet<InstanceId> = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            for dependent in self.dependents_of(&current) {
                if seen.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }
        let mut result: Vec<InstanceId> = seen.into_iter().collect();
        result.sort_by(|a, b| {
            self.order_of(a)
                .unwrap_or(u32::MAX)
                .cmp(&self.order_of(b).unwrap_or(u32::MAX))
                .then_with(|| a.cmp(b))
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Owner;
    use crate::value::{Value, ValueType};

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s).unwrap()
    }

    fn input(s: &str) -> NodeDefinition {
        NodeDefinition::input(id(s), ValueType::Integer { min: None, max: None }, Owner::Primary)
    }

    fn computed(s: &str, deps: &[&str]) -> NodeDefinition {
        NodeDefinition::computed(
            id(s),
            ValueType::Integer { min: None, max: None },
            Owner::Primary,
            deps.iter().map(|d| id(d)).collect(),
            Box::new(|_ctx| Ok(Value::Integer(0))),
        )
    }

    #[test]
    fn builds_simple_chain_in_order() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![
            input("form.primary.a"),
            computed("form.primary.b", &["form.primary.a"]),
            computed("form.primary.c", &["form.primary.b"]),
        ]);
        let registry = builder.build().unwrap();
        let ordered: Vec<String> = registry
            .iter_in_order()
            .map(|d| d.id.as_str().to_string())
            .collect();
        assert_eq!(
            ordered,
            vec!["form.primary.a", "form.primary.b", "form.primary.c"]
        );
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![input("form.primary.a"), input("form.primary.a")]);
        assert!(matches!(
            builder.build(),
            Err(RegistrationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![computed("form.primary.b", &["form.primary.missing"])]);
        assert!(matches!(
            builder.build(),
            Err(RegistrationError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![
            computed("form.primary.a", &["form.primary.b"]),
            computed("form.primary.b", &["form.primary.a"]),
        ]);
        match builder.build() {
            Err(RegistrationError::Cycle { ids }) => {
                assert_eq!(ids.len(), 2);
            }
            other => panic!("expected Cycle error, got {other:?}"),
        }
    }

    #[test]
    fn transitive_dependents_are_ordered_and_deduplicated() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![
            input("form.primary.a"),
            computed("form.primary.b", &["form.primary.a"]),
            computed("form.primary.c", &["form.primary.a"]),
            computed("form.primary.d", &["form.primary.b", "form.primary.c"]),
        ]);
        let registry = builder.build().unwrap();
        let deps = registry.transitive_dependents(&id("form.primary.a"));
        let names: Vec<String> = deps.iter().map(|i| i.as_str().to_string()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names.last().unwrap(), "form.primary.d");
    }

    #[test]
    fn order_assignment_breaks_ties_lexicographically() {
        let mut builder = RegistryBuilder::new();
        builder.register(vec![input("form.primary.z"), input("form.primary.a")]);
        let registry = builder.build().unwrap();
        let ordered: Vec<String> = registry
            .iter_in_order()
            .map(|d| d.id.as_str().to_string())
            .collect();
        assert_eq!(ordered, vec!["form.primary.a", "form.primary.z"]);
    }
}
