use std::sync::Arc;

use apollo_compiler::ast;
use dashmap::DashMap;

use crate::EntityModel;
use crate::EntitySchema;
use crate::FieldKind;
use crate::Fragments;
use crate::PopulateError;
use crate::plan;
use crate::plan::FetchPlanEntry;
use crate::selection;

/// Process-wide store of registered entity models.
///
/// Registration happens during startup; everything afterwards only reads,
/// so one registry is shared freely across threads and concurrent
/// compilations never coordinate with each other.
#[derive(Debug, Default)]
pub struct Registry {
    models: DashMap<String, Arc<EntityModel>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` under `name` and returns the stored model.
    ///
    /// Idempotent: if `name` is already registered, the existing model is
    /// returned untouched and `schema` is dropped. Concurrent registrations
    /// of the same name elect one winner through the map's entry lock.
    pub fn register(&self, name: impl Into<String>, schema: EntitySchema) -> Arc<EntityModel> {
        let name = name.into();
        self.models
            .entry(name.clone())
            .or_insert_with(|| Arc::new(EntityModel::build(name, schema)))
            .value()
            .clone()
    }

    /// Looks up a registered model by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<EntityModel>, PopulateError> {
        self.models
            .get(name)
            .map(|model| model.value().clone())
            .ok_or_else(|| PopulateError::UnknownEntity(name.to_owned()))
    }

    /// Classifies `field` on the entity registered under `entity`.
    ///
    /// This answers for exactly one entity. Inside a polymorphic selection
    /// the compiler instead resolves per subtype and fails only when the
    /// field is declared on none of them.
    pub fn resolve_field(&self, entity: &str, field: &str) -> Result<FieldKind, PopulateError> {
        let model = self.lookup(entity)?;
        model
            .field(field)
            .cloned()
            .ok_or_else(|| PopulateError::UnresolvedReference {
                field: field.to_owned(),
                entity: entity.to_owned(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Compiles the fetch plan for one resolved field.
    ///
    /// `selection_set` is the field's selection as parsed by the query
    /// engine, `fragments` the fragment definitions of the enclosing
    /// document, `concrete_type` the runtime type name the engine resolved
    /// the value to, and `entity` the registered entity backing it.
    ///
    /// The returned entries describe the related entities the storage layer
    /// must load next to the root documents. Scalar selections on the root
    /// entity itself produce no entries; its baseline references do.
    #[tracing::instrument(
        skip_all,
        level = "trace",
        fields(entity = entity, concrete_type = concrete_type)
    )]
    pub fn populate(
        &self,
        selection_set: &[ast::Selection],
        fragments: &Fragments,
        concrete_type: &str,
        entity: &str,
    ) -> Result<Vec<FetchPlanEntry>, PopulateError> {
        let root = selection::build_root(self, selection_set, fragments, concrete_type, entity)?;
        let entries = plan::compile(self, &root)?;
        tracing::trace!(entries = entries.len(), "compiled fetch plan");
        Ok(entries)
    }
}

const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<Registry>();
};
