use apollo_compiler::ast;
use graphql_populate::EntitySchema;
use graphql_populate::FetchPlanEntry;
use graphql_populate::Fragments;
use graphql_populate::PopulateError;
use graphql_populate::ReferenceDescriptor;
use graphql_populate::Registry;
use pretty_assertions::assert_eq;
use serde_json::Value;

/// Parses `query`, digs out the selection set of the operation's first
/// top-level field, and compiles that the way the engine does when
/// resolving the field.
pub(crate) fn compile(
    registry: &Registry,
    query: &str,
    concrete_type: &str,
    entity: &str,
) -> Result<Vec<FetchPlanEntry>, PopulateError> {
    let document = ast::Document::parse(query, "query.graphql").expect("test query parses");
    let fragments = Fragments::from_document(&document);
    let operation = document
        .definitions
        .iter()
        .find_map(|definition| match definition {
            ast::Definition::OperationDefinition(operation) => Some(operation),
            _ => None,
        })
        .expect("test query contains an operation");
    let field = operation
        .selection_set
        .iter()
        .find_map(|selection| match selection {
            ast::Selection::Field(field) => Some(field),
            _ => None,
        })
        .expect("test operation selects a field");
    registry.populate(&field.selection_set, &fragments, concrete_type, entity)
}

/// Fluent harness: register fixture entities, compile one query, compare
/// the serialized plan against a `json!` expectation.
#[derive(Default)]
pub(crate) struct PlanTest {
    registry: Registry,
    query: Option<&'static str>,
    concrete_type: Option<&'static str>,
    entity: Option<&'static str>,
    expected: Option<Value>,
}

impl PlanTest {
    pub(crate) fn builder() -> Self {
        Self::default()
    }

    pub(crate) fn entity(self, name: &'static str, schema: EntitySchema) -> Self {
        self.registry.register(name, schema);
        self
    }

    pub(crate) fn query(mut self, query: &'static str) -> Self {
        self.query = Some(query);
        self
    }

    pub(crate) fn resolving(mut self, concrete_type: &'static str, entity: &'static str) -> Self {
        self.concrete_type = Some(concrete_type);
        self.entity = Some(entity);
        self
    }

    pub(crate) fn expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    #[track_caller]
    pub(crate) fn test(self) {
        let query = self.query.expect("missing query");
        let concrete_type = self.concrete_type.expect("missing concrete type");
        let entity = self.entity.expect("missing entity");
        let expected = self.expected.expect("missing expected plan");

        let plan = compile(&self.registry, query, concrete_type, entity).expect("plan compiles");
        assert_eq!(
            serde_json::to_value(&plan).expect("plan serializes"),
            expected
        );
    }

    #[track_caller]
    pub(crate) fn test_error(self, expected: PopulateError) {
        let query = self.query.expect("missing query");
        let concrete_type = self.concrete_type.expect("missing concrete type");
        let entity = self.entity.expect("missing entity");

        let error =
            compile(&self.registry, query, concrete_type, entity).expect_err("compilation fails");
        assert_eq!(error, expected);
    }
}

/// `Ref.child` points at `Simple { foo bar }`, nothing polymorphic, no
/// baseline.
pub(crate) fn simple_pair() -> PlanTest {
    PlanTest::builder()
        .entity("Simple", EntitySchema::new().scalar("foo").scalar("bar"))
        .entity(
            "Ref",
            EntitySchema::new().reference("child", ReferenceDescriptor::single("Simple")),
        )
}

pub(crate) fn simple_registry() -> Registry {
    let registry = Registry::new();
    registry.register("Simple", EntitySchema::new().scalar("foo").scalar("bar"));
    registry.register(
        "Ref",
        EntitySchema::new().reference("child", ReferenceDescriptor::single("Simple")),
    );
    registry
}

/// The deep fixture: `Complex.children.child` reaches a polymorphic,
/// self-referential `Child` whose baseline mandates populating `doo` and
/// `bazzes`; `Complex` itself baseline-mandates `bazzes`.
pub(crate) fn complex_family() -> PlanTest {
    PlanTest::builder()
        .entity("Baz", EntitySchema::new().scalar("fiz"))
        .entity(
            "Doo",
            EntitySchema::new().scalar("cuzzes").baseline(["cuzzes"]),
        )
        .entity(
            "Child",
            EntitySchema::new()
                .scalar("foo")
                .scalar("bar")
                .scalar("cuzzes")
                .structural("baz", |shape| shape.scalar("fiz"))
                .reference("child", ReferenceDescriptor::polymorphic(["Child"]))
                .reference("doo", ReferenceDescriptor::polymorphic(["Doo"]))
                .reference("bazzes", ReferenceDescriptor::collection("Baz"))
                .baseline(["cuzzes", "doo", "bazzes"]),
        )
        .entity(
            "Complex",
            EntitySchema::new()
                .structural("children", |shape| {
                    shape.reference("child", ReferenceDescriptor::polymorphic(["Child"]))
                })
                .reference("bazzes", ReferenceDescriptor::collection("Baz"))
                .baseline(["bazzes"]),
        )
}
