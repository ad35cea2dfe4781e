use std::collections::HashMap;

use apollo_compiler::Node;
use apollo_compiler::ast;

use crate::PopulateError;
use crate::Registry;
use crate::TYPENAME_FIELD;

/// Fragment definitions of a query document, keyed by fragment name.
///
/// Built once per document by the embedding engine and shared across every
/// field resolution of that query.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    map: HashMap<String, Node<ast::FragmentDefinition>>,
}

impl Fragments {
    /// Collects every fragment definition of a parsed document.
    pub fn from_document(document: &ast::Document) -> Self {
        let map = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                ast::Definition::FragmentDefinition(fragment) => {
                    Some((fragment.name.as_str().to_owned(), fragment.clone()))
                }
                _ => None,
            })
            .collect();
        Self { map }
    }

    /// Adds one fragment definition under its own name, replacing any
    /// previous definition with that name.
    pub fn insert(&mut self, fragment: Node<ast::FragmentDefinition>) {
        self.map.insert(fragment.name.as_str().to_owned(), fragment);
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&Node<ast::FragmentDefinition>> {
        self.map.get(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Flattens `selection_set` into the ordered list of named fields it
/// contributes for `concrete_type`.
///
/// Fragment spreads are spliced in place; inline fragments only when their
/// type condition matches the concrete type or is absent. Duplicate field
/// names are preserved, merging them is the tree builder's concern. The
/// `__typename` meta-field is dropped here, at every level it appears.
pub(crate) fn flatten<'a>(
    selection_set: &'a [ast::Selection],
    fragments: &'a Fragments,
    concrete_type: &str,
    registry: &Registry,
) -> Result<Vec<&'a Node<ast::Field>>, PopulateError> {
    let mut fields = Vec::new();
    let mut active = Vec::new();
    flatten_into(
        selection_set,
        fragments,
        concrete_type,
        registry,
        &mut active,
        &mut fields,
    )?;
    Ok(fields)
}

fn flatten_into<'a>(
    selection_set: &'a [ast::Selection],
    fragments: &'a Fragments,
    concrete_type: &str,
    registry: &Registry,
    active: &mut Vec<&'a str>,
    out: &mut Vec<&'a Node<ast::Field>>,
) -> Result<(), PopulateError> {
    for selection in selection_set {
        match selection {
            ast::Selection::Field(field) => {
                if field.name == TYPENAME_FIELD {
                    continue;
                }
                out.push(field);
            }
            ast::Selection::FragmentSpread(spread) => {
                let name = spread.fragment_name.as_str();
                if active.contains(&name) {
                    return Err(PopulateError::CyclicFragment(name.to_owned()));
                }
                let Some(fragment) = fragments.get(name) else {
                    // Undefined spreads are the engine's validation failure,
                    // not a schema mismatch.
                    tracing::debug!(fragment = name, "spread names an unknown fragment, skipping");
                    continue;
                };
                active.push(name);
                flatten_into(
                    &fragment.selection_set,
                    fragments,
                    concrete_type,
                    registry,
                    active,
                    out,
                )?;
                active.pop();
            }
            ast::Selection::InlineFragment(inline) => match &inline.type_condition {
                None => {
                    flatten_into(
                        &inline.selection_set,
                        fragments,
                        concrete_type,
                        registry,
                        active,
                        out,
                    )?;
                }
                Some(condition) => {
                    if !registry.contains(condition.as_str()) {
                        return Err(PopulateError::InvalidTypeCondition(
                            condition.as_str().to_owned(),
                        ));
                    }
                    if condition.as_str() == concrete_type {
                        flatten_into(
                            &inline.selection_set,
                            fragments,
                            concrete_type,
                            registry,
                            active,
                            out,
                        )?;
                    } else {
                        tracing::trace!(
                            condition = condition.as_str(),
                            concrete_type = concrete_type,
                            "inline fragment condition does not match, skipping"
                        );
                    }
                }
            },
        }
    }
    Ok(())
}
