//! Entity schema declaration and the immutable registered model.
//!
//! An [`EntitySchema`] is the mutable builder an application assembles at
//! startup; [`crate::Registry::register`] freezes it into an [`EntityModel`]
//! shared behind an `Arc` for the rest of the process lifetime.

use indexmap::IndexMap;

/// Classification of one declared entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain stored data, projected as-is.
    Scalar,
    /// An embedded shape of further fields, stored inline with no entity
    /// boundary of its own.
    Structural(FieldSet),
    /// A field holding the identifier(s) of another entity instance,
    /// resolved by a separate load.
    Reference(ReferenceDescriptor),
}

/// An ordered set of declared fields, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    fields: IndexMap<String, FieldKind>,
}

impl FieldSet {
    pub fn get(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, name: impl Into<String>, kind: FieldKind) {
        self.fields.insert(name.into(), kind);
    }
}

/// Which entity (or set of concrete subtypes) a reference resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A single concrete entity.
    Concrete(String),
    /// One of several concrete subtypes, told apart at runtime by the
    /// discriminator field.
    Polymorphic(Vec<String>),
}

/// How many instances a reference field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Collection,
}

/// Where a reference field points and how many instances it holds.
///
/// Cardinality never changes what gets compiled; it is carried for the
/// storage loader, which batches collection references differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescriptor {
    target: ReferenceTarget,
    cardinality: Cardinality,
}

impl ReferenceDescriptor {
    /// A reference to one instance of a concrete entity.
    pub fn single(target: impl Into<String>) -> Self {
        Self {
            target: ReferenceTarget::Concrete(target.into()),
            cardinality: Cardinality::Single,
        }
    }

    /// A reference to a list of instances of a concrete entity.
    pub fn collection(target: impl Into<String>) -> Self {
        Self {
            target: ReferenceTarget::Concrete(target.into()),
            cardinality: Cardinality::Collection,
        }
    }

    /// A reference to one instance of a polymorphic entity with the given
    /// concrete subtypes, in declaration order.
    pub fn polymorphic<I, S>(subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: ReferenceTarget::Polymorphic(subtypes.into_iter().map(Into::into).collect()),
            cardinality: Cardinality::Single,
        }
    }

    /// A reference to a list of instances of a polymorphic entity.
    pub fn polymorphic_collection<I, S>(subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: ReferenceTarget::Polymorphic(subtypes.into_iter().map(Into::into).collect()),
            cardinality: Cardinality::Collection,
        }
    }

    pub fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.target, ReferenceTarget::Polymorphic(_))
    }

    /// Names of the concrete entities this reference can resolve to, in
    /// declaration order.
    pub fn target_names(&self) -> &[String] {
        match &self.target {
            ReferenceTarget::Concrete(name) => std::slice::from_ref(name),
            ReferenceTarget::Polymorphic(names) => names,
        }
    }
}

/// Declares the stored shape of one entity: its fields, and the baseline
/// field names the storage layer always needs for it regardless of what a
/// query asks.
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    fields: FieldSet,
    baseline: Vec<String>,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a plain data field.
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name, FieldKind::Scalar);
        self
    }

    /// Declares an embedded shape stored inline under `name`.
    pub fn structural(
        mut self,
        name: impl Into<String>,
        shape: impl FnOnce(EntitySchema) -> EntitySchema,
    ) -> Self {
        let shape = shape(EntitySchema::new());
        debug_assert!(
            shape.baseline.is_empty(),
            "baseline is declared on the entity, not on an embedded shape"
        );
        self.fields.insert(name, FieldKind::Structural(shape.fields));
        self
    }

    /// Declares a field referencing another entity.
    pub fn reference(mut self, name: impl Into<String>, reference: ReferenceDescriptor) -> Self {
        self.fields.insert(name, FieldKind::Reference(reference));
        self
    }

    /// Declares the fields always loaded for this entity, in the order
    /// baseline populations are emitted. Reference names listed here are
    /// populated even when the query never selects them.
    pub fn baseline<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.baseline.extend(names.into_iter().map(Into::into));
        self
    }
}

/// The frozen, registered form of an [`EntitySchema`].
///
/// Built once by [`crate::Registry::register`] and never mutated again. The
/// baseline declaration is split into its data and reference views here so
/// compilation never re-scans it.
#[derive(Debug)]
pub struct EntityModel {
    name: String,
    fields: FieldSet,
    baseline: Vec<String>,
    baseline_selects: Vec<String>,
    baseline_references: Vec<(String, ReferenceDescriptor)>,
}

impl EntityModel {
    pub(crate) fn build(name: String, schema: EntitySchema) -> Self {
        let EntitySchema { fields, baseline } = schema;
        let mut baseline_selects = Vec::new();
        let mut baseline_references = Vec::new();
        for field_name in &baseline {
            match fields.get(field_name) {
                Some(FieldKind::Scalar | FieldKind::Structural(_)) => {
                    baseline_selects.push(field_name.clone());
                }
                Some(FieldKind::Reference(reference)) => {
                    baseline_references.push((field_name.clone(), reference.clone()));
                }
                None => {
                    tracing::warn!(
                        entity = name.as_str(),
                        field = field_name.as_str(),
                        "baseline names an undeclared field, ignoring it"
                    );
                }
            }
        }
        Self {
            name,
            fields,
            baseline,
            baseline_selects,
            baseline_references,
        }
    }

    /// Name the model was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    /// Declared baseline field names, in declaration order.
    pub fn baseline(&self) -> &[String] {
        &self.baseline
    }

    /// Baseline names holding data (scalar and structural fields), in
    /// declaration order. These join every projection of this entity.
    pub(crate) fn baseline_selects(&self) -> &[String] {
        &self.baseline_selects
    }

    /// Baseline names referencing other entities, in declaration order.
    /// These are populated even when the query never selects them.
    pub(crate) fn baseline_references(&self) -> &[(String, ReferenceDescriptor)] {
        &self.baseline_references
    }
}
