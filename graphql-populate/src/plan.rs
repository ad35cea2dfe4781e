//! Fetch plan emission: selection tree in, populate-with-projection
//! entries out.

use std::fmt;

use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

use crate::DISCRIMINATOR_FIELD;
use crate::ID_FIELD;
use crate::PopulateError;
use crate::ReferenceDescriptor;
use crate::Registry;
use crate::selection::SelectionNode;

/// One population the storage layer must run: load the entities behind
/// `path`, projecting `select`, then run `populate` beneath each of them.
///
/// Serializes to exactly the `{ path, select, populate }` shape the
/// hierarchical populate API consumes. All three fields are always present,
/// the consumer treats a missing key as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPlanEntry {
    /// Dotted relation path from the enclosing entity, structural hops
    /// compacted.
    pub path: String,
    /// Field names to project: identifier first, discriminator when the
    /// target is polymorphic, no duplicates.
    pub select: Vec<String>,
    /// Nested populations to run on the loaded entities.
    pub populate: Vec<FetchPlanEntry>,
}

impl fmt::Display for FetchPlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}}}", self.path, self.select.join(", "))?;
        if !self.populate.is_empty() {
            write!(f, " -> [")?;
            for (index, entry) in self.populate.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{entry}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Emits the populate entries beneath `node`: baseline references the query
/// never selected first, in baseline declaration order, then the explicitly
/// selected references in query order. A reference that is both compiles to
/// its explicit entry alone.
pub(crate) fn compile(
    registry: &Registry,
    node: &SelectionNode,
) -> Result<Vec<FetchPlanEntry>, PopulateError> {
    let mut entries = Vec::new();
    let mut emitted: IndexSet<&str> = IndexSet::new();

    for model in &node.targets {
        for (name, reference) in model.baseline_references() {
            if node.children.contains_key(name) || emitted.contains(name.as_str()) {
                continue;
            }
            emitted.insert(name.as_str());
            entries.push(baseline_entry(registry, name, reference)?);
        }
    }

    for (path, child) in &node.children {
        entries.push(FetchPlanEntry {
            path: path.clone(),
            select: select_list(child),
            populate: compile(registry, child)?,
        });
    }

    Ok(entries)
}

/// Projection for an explicitly selected boundary: identifier,
/// discriminator when polymorphic, the targets' baseline data fields in
/// declaration order, then the queried paths in query order.
fn select_list(node: &SelectionNode) -> Vec<String> {
    let mut select = IndexSet::new();
    select.insert(ID_FIELD.to_owned());
    if node.polymorphic {
        select.insert(DISCRIMINATOR_FIELD.to_owned());
    }
    for model in &node.targets {
        for name in model.baseline_selects() {
            select.insert(name.clone());
        }
    }
    for path in &node.select {
        select.insert(path.clone());
    }
    select.into_iter().collect()
}

/// One-level expansion of a baseline reference the query never selected:
/// identifier, discriminator when polymorphic, and the target's own
/// baseline data fields. The target's own baseline references are never
/// chased.
fn baseline_entry(
    registry: &Registry,
    path: &str,
    reference: &ReferenceDescriptor,
) -> Result<FetchPlanEntry, PopulateError> {
    let mut select = IndexSet::new();
    select.insert(ID_FIELD.to_owned());
    if reference.is_polymorphic() {
        select.insert(DISCRIMINATOR_FIELD.to_owned());
    }
    for name in reference.target_names() {
        let target = registry.lookup(name)?;
        for field in target.baseline_selects() {
            select.insert(field.clone());
        }
    }
    Ok(FetchPlanEntry {
        path: path.to_owned(),
        select: select.into_iter().collect(),
        populate: Vec::new(),
    })
}
