//! Builds the selection tree: flattened fields classified against entity
//! models, structural hops compacted into dotted relation paths, duplicate
//! reference selections merged.

use std::sync::Arc;

use apollo_compiler::Node;
use apollo_compiler::ast;
use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;

use crate::DISCRIMINATOR_FIELD;
use crate::EntityModel;
use crate::FieldKind;
use crate::FieldSet;
use crate::Fragments;
use crate::ID_FIELD;
use crate::PopulateError;
use crate::ReferenceDescriptor;
use crate::Registry;
use crate::fragments;

/// One relation boundary of the selection tree.
///
/// `select` holds the explicitly queried data paths for this boundary,
/// dotted through structural hops, in query order. `children` holds the
/// reference fields selected underneath, keyed by compacted relation path.
#[derive(Debug)]
pub(crate) struct SelectionNode {
    pub(crate) targets: Vec<Arc<EntityModel>>,
    pub(crate) polymorphic: bool,
    pub(crate) select: IndexSet<String>,
    pub(crate) children: IndexMap<String, SelectionNode>,
}

/// Builds the tree for the selection of one resolved field.
///
/// `concrete_type` is the runtime type the engine resolved the value to and
/// is what inline fragment conditions at this level match against; nested
/// reference levels match against their own target entity names.
pub(crate) fn build_root(
    registry: &Registry,
    selection_set: &[ast::Selection],
    fragments: &Fragments,
    concrete_type: &str,
    entity: &str,
) -> Result<SelectionNode, PopulateError> {
    let model = registry.lookup(entity)?;
    build_node(
        registry,
        vec![model],
        false,
        &[selection_set],
        fragments,
        Some(concrete_type),
    )
}

fn build_node<'a>(
    registry: &Registry,
    targets: Vec<Arc<EntityModel>>,
    polymorphic: bool,
    selection_sets: &[&'a [ast::Selection]],
    fragments: &'a Fragments,
    root_concrete: Option<&str>,
) -> Result<SelectionNode, PopulateError> {
    let mut collector = Collector {
        registry,
        fragments,
        select: IndexSet::new(),
        pending: IndexMap::new(),
        ledger: FieldLedger::default(),
    };

    // One pass per possible concrete subtype. Shared fields land in query
    // order on the first pass; subtype extras append in declaration order.
    for model in &targets {
        let concrete = root_concrete.unwrap_or_else(|| model.name());
        for &selection_set in selection_sets {
            let flat = fragments::flatten(selection_set, fragments, concrete, registry)?;
            collector.collect(model.fields(), "", &flat, concrete)?;
        }
    }

    collector.ledger.check(&targets)?;

    let Collector {
        select, pending, ..
    } = collector;

    let mut children = IndexMap::new();
    for (path, child) in pending {
        let child_targets = child
            .reference
            .target_names()
            .iter()
            .map(|name| registry.lookup(name))
            .collect::<Result<Vec<_>, _>>()?;
        let node = build_node(
            registry,
            child_targets,
            child.reference.is_polymorphic(),
            &child.selection_sets,
            fragments,
            None,
        )?;
        children.insert(path, node);
    }

    Ok(SelectionNode {
        targets,
        polymorphic,
        select,
        children,
    })
}

/// A reference field seen while collecting, with every selection set the
/// query gave it. The sets merge into one child node afterwards.
struct PendingChild<'a> {
    reference: ReferenceDescriptor,
    selection_sets: Vec<&'a [ast::Selection]>,
}

/// Tracks which dotted paths resolved on at least one subtype. A path still
/// on the miss side once every subtype was tried is a real failure.
#[derive(Default)]
struct FieldLedger {
    resolved: IndexSet<String>,
    missed: IndexSet<String>,
}

impl FieldLedger {
    fn resolve(&mut self, path: &str) {
        self.resolved.insert(path.to_owned());
    }

    fn miss(&mut self, path: &str) {
        self.missed.insert(path.to_owned());
    }

    fn check(&self, targets: &[Arc<EntityModel>]) -> Result<(), PopulateError> {
        for path in &self.missed {
            if !self.resolved.contains(path) {
                return Err(PopulateError::UnresolvedReference {
                    field: path.clone(),
                    entity: targets.iter().map(|model| model.name()).join("|"),
                });
            }
        }
        Ok(())
    }
}

struct Collector<'a, 'r> {
    registry: &'r Registry,
    fragments: &'a Fragments,
    select: IndexSet<String>,
    pending: IndexMap<String, PendingChild<'a>>,
    ledger: FieldLedger,
}

impl<'a> Collector<'a, '_> {
    /// Classifies `flat` against `fields`, recursing through structural
    /// shapes with a growing dotted `prefix`. References stop the recursion
    /// here: their selection sets are stashed and resolved per target once
    /// collection is over.
    fn collect(
        &mut self,
        fields: &FieldSet,
        prefix: &str,
        flat: &[&'a Node<ast::Field>],
        concrete: &str,
    ) -> Result<(), PopulateError> {
        for &field in flat {
            let name = field.name.as_str();
            let path = join_path(prefix, name);
            match fields.get(name) {
                // The identifier and discriminator exist on every entity
                // without being declared.
                None if name == ID_FIELD || name == DISCRIMINATOR_FIELD => {
                    self.ledger.resolve(&path);
                    self.select.insert(path);
                }
                None => self.ledger.miss(&path),
                Some(FieldKind::Scalar) => {
                    self.ledger.resolve(&path);
                    self.select.insert(path);
                }
                Some(FieldKind::Structural(shape)) => {
                    self.ledger.resolve(&path);
                    if field.selection_set.is_empty() {
                        // Selected wholesale: project the embedded subtree.
                        self.select.insert(path);
                    } else {
                        let nested = fragments::flatten(
                            &field.selection_set,
                            self.fragments,
                            concrete,
                            self.registry,
                        )?;
                        self.collect(shape, &path, &nested, concrete)?;
                    }
                }
                Some(FieldKind::Reference(reference)) => {
                    self.ledger.resolve(&path);
                    self.pending
                        .entry(path)
                        .or_insert_with(|| PendingChild {
                            reference: reference.clone(),
                            selection_sets: Vec::new(),
                        })
                        .selection_sets
                        .push(&field.selection_set);
                }
            }
        }
        Ok(())
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntitySchema;

    fn selection_of(source: &str) -> (ast::Document, Fragments) {
        let document =
            ast::Document::parse(source, "test.graphql").expect("test document parses");
        let fragments = Fragments::from_document(&document);
        (document, fragments)
    }

    fn root(document: &ast::Document) -> &[ast::Selection] {
        document
            .definitions
            .iter()
            .find_map(|definition| match definition {
                ast::Definition::OperationDefinition(operation) => Some(&operation.selection_set),
                _ => None,
            })
            .map(Vec::as_slice)
            .expect("document contains an operation")
    }

    #[test]
    fn structural_hops_compact_into_relation_paths() {
        let registry = Registry::new();
        registry.register("Simple", EntitySchema::new().scalar("foo"));
        registry.register(
            "Complex",
            EntitySchema::new().structural("children", |shape| {
                shape.reference("child", ReferenceDescriptor::single("Simple"))
            }),
        );

        let (document, fragments) = selection_of("{ children { child { foo } } }");
        let node = build_root(&registry, root(&document), &fragments, "Complex", "Complex")
            .unwrap();

        assert!(node.select.is_empty());
        let paths: Vec<&str> = node.children.keys().map(String::as_str).collect();
        assert_eq!(paths, ["children.child"]);
        let child = &node.children["children.child"];
        assert_eq!(child.select.iter().collect::<Vec<_>>(), ["foo"]);
    }

    #[test]
    fn structural_scalars_become_dotted_paths() {
        let registry = Registry::new();
        registry.register(
            "Simple",
            EntitySchema::new()
                .scalar("foo")
                .structural("baz", |shape| shape.scalar("fiz")),
        );

        let (document, fragments) = selection_of("{ foo baz { fiz } }");
        let node =
            build_root(&registry, root(&document), &fragments, "Simple", "Simple").unwrap();

        assert_eq!(node.select.iter().collect::<Vec<_>>(), ["foo", "baz.fiz"]);
    }

    #[test]
    fn duplicate_reference_selections_merge() {
        let registry = Registry::new();
        registry.register("Simple", EntitySchema::new().scalar("foo").scalar("bar"));
        registry.register(
            "Ref",
            EntitySchema::new().reference("child", ReferenceDescriptor::single("Simple")),
        );

        let (document, fragments) = selection_of("{ child { foo } child { bar } }");
        let node = build_root(&registry, root(&document), &fragments, "Ref", "Ref").unwrap();

        assert_eq!(node.children.len(), 1);
        let child = &node.children["child"];
        assert_eq!(child.select.iter().collect::<Vec<_>>(), ["foo", "bar"]);
    }

    #[test]
    fn polymorphic_fields_union_across_subtypes() {
        let registry = Registry::new();
        registry.register(
            "Cat",
            EntitySchema::new().scalar("name").scalar("whiskers"),
        );
        registry.register("Dog", EntitySchema::new().scalar("name").scalar("bark"));
        registry.register(
            "Shelter",
            EntitySchema::new().reference("pet", ReferenceDescriptor::polymorphic(["Cat", "Dog"])),
        );

        let (document, fragments) = selection_of("{ pet { name ... on Dog { bark } } }");
        let node =
            build_root(&registry, root(&document), &fragments, "Shelter", "Shelter").unwrap();

        let pet = &node.children["pet"];
        assert!(pet.polymorphic);
        assert_eq!(pet.targets.len(), 2);
        assert_eq!(pet.select.iter().collect::<Vec<_>>(), ["name", "bark"]);
    }

    #[test]
    fn fields_missing_on_every_subtype_fail() {
        let registry = Registry::new();
        registry.register("Cat", EntitySchema::new().scalar("whiskers"));
        registry.register("Dog", EntitySchema::new().scalar("bark"));
        registry.register(
            "Shelter",
            EntitySchema::new().reference("pet", ReferenceDescriptor::polymorphic(["Cat", "Dog"])),
        );

        let (document, fragments) = selection_of("{ pet { meow } }");
        let error = build_root(&registry, root(&document), &fragments, "Shelter", "Shelter")
            .unwrap_err();

        assert_eq!(
            error,
            PopulateError::UnresolvedReference {
                field: "meow".to_owned(),
                entity: "Cat|Dog".to_owned(),
            }
        );
    }

    #[test]
    fn fields_resolving_on_one_subtype_pass() {
        let registry = Registry::new();
        registry.register("Cat", EntitySchema::new().scalar("whiskers"));
        registry.register("Dog", EntitySchema::new().scalar("bark"));
        registry.register(
            "Shelter",
            EntitySchema::new().reference("pet", ReferenceDescriptor::polymorphic(["Cat", "Dog"])),
        );

        let (document, fragments) = selection_of("{ pet { bark } }");
        let node =
            build_root(&registry, root(&document), &fragments, "Shelter", "Shelter").unwrap();

        let pet = &node.children["pet"];
        assert_eq!(pet.select.iter().collect::<Vec<_>>(), ["bark"]);
    }
}
