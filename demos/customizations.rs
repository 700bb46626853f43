use can_i::{
    AttributeAccessor, AttributeSource, Condition, EngineBuilder, Entity, ErrorFactory, Model,
    Options, Target, TargetRef, TypeHandle,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Construct the engine with a custom instance check and error type.
    let mut engine = EngineBuilder::new()
        .with_instance_of(unwrap_descriptor)
        .with_error_factory(Forbidden)
        .build()
        .expect("no definitions to load");

    engine
        .allow(
            Model::descriptor(Schema {
                instance: TypeHandle::of::<User>(),
            }),
            "update",
            Target::Model(Model::descriptor(Schema {
                instance: TypeHandle::of::<Document>(),
            })),
            Condition::predicate(|performer, target, _| {
                let user = performer.as_any().downcast_ref::<User>();
                let owner = target
                    .as_instance()
                    .and_then(|document| document.attributes().get("owner").map(|v| v.into_owned()));

                match (user, owner) {
                    (Some(user), Some(owner)) => owner == json!(user.name),
                    _ => false,
                }
            }),
        )
        .expect("valid rule");

    let alice = User {
        name: "alice".into(),
    };
    let doc = Document(json!({ "owner": "alice" }));

    match engine.authorize(&alice, "update", &doc) {
        Ok(()) => println!("Allowed"),
        Err(e) => panic!("Denied: {}", e.0),
    }

    let bob = User { name: "bob".into() };
    if let Err(e) = engine.authorize(&bob, "update", &doc) {
        println!("{}", e.0);
    }
}

// performer.
struct User {
    name: String,
}

impl Entity for User {}

// target backed by a document store.
struct Document(Value);

impl AttributeAccessor for Document {
    fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key).cloned()
    }
}

impl Entity for Document {
    fn attributes(&self) -> AttributeSource<'_> {
        AttributeSource::Accessor(self)
    }
}

// model descriptor produced by an object mapper.
struct Schema {
    instance: TypeHandle,
}

fn unwrap_descriptor(candidate: &dyn Entity, model: &Model) -> bool {
    match model {
        Model::Type(handle) => handle.is_type_of(candidate),
        Model::Descriptor(_) => model
            .downcast_descriptor::<Schema>()
            .is_some_and(|schema| schema.instance.is_type_of(candidate)),
    }
}

// custom ErrorFactory that produces a domain error.
struct Forbidden;

struct ForbiddenError(String);

impl ErrorFactory for Forbidden {
    type Error = ForbiddenError;

    fn create_error(
        &self,
        _performer: &dyn Entity,
        action: &str,
        target: &TargetRef<'_>,
        _options: &Options,
    ) -> ForbiddenError {
        ForbiddenError(format!("you may not {} this {}", action, target))
    }
}
