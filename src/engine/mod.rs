mod builder;
pub use builder::EngineBuilder;

use std::{ptr, sync::Arc};

use tracing::{debug, trace};

use crate::errors::Result;
use crate::{
    condition::TargetAttributes, Actions, DefaultErrorFactory, DefaultInstanceOf, Entity, Error,
    ErrorFactory, InstanceOf, IntoCondition, Model, Options, Registry, Rule, Target, TargetRef,
    Targets,
};

/// Authorization engine. Owns a set of rules and answers whether a
/// performer may do an action to a target.
///
/// A request is allowed when at least one rule matches all of:
/// - the performer's model,
/// - the target (`Target::All`, the type itself, an instance or one object),
/// - the action (`"manage"` matches any action),
/// - the rule's condition, if any.
///
/// Registration takes `&mut self`; evaluation only reads the rules, so a
/// populated engine can be shared between threads.
#[derive(Debug)]
pub struct Engine<I = DefaultInstanceOf, F = DefaultErrorFactory> {
    registry: Registry,
    instance_of: I,
    error_factory: F,
}

impl Engine {
    /// Creates an empty engine with the default strategies.
    pub fn new() -> Self {
        Self::with_strategies(DefaultInstanceOf, DefaultErrorFactory)
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, F> Engine<I, F>
where
    I: InstanceOf,
    F: ErrorFactory,
{
    pub fn with_strategies(instance_of: I, error_factory: F) -> Self {
        Self {
            registry: Registry::new(),
            instance_of,
            error_factory,
        }
    }

    /// Grants performers of `model` every action in `actions` on every
    /// target in `targets`, subject to `condition`.
    ///
    /// Registers one rule per `(action, target)` pair. Fails when the
    /// condition is not an attribute map or when either list is empty.
    pub fn allow<M, A, T, C>(&mut self, model: M, actions: A, targets: T, condition: C) -> Result<()>
    where
        M: Into<Model>,
        A: Into<Actions>,
        T: Into<Targets>,
        C: IntoCondition,
    {
        let condition = condition.into_condition()?;
        let model = model.into();
        let Actions(actions) = actions.into();
        let Targets(targets) = targets.into();

        if actions.is_empty() {
            return Err(Error::InvalidRule("at least one action is required".into()));
        }
        if targets.is_empty() {
            return Err(Error::InvalidRule("at least one target is required".into()));
        }

        for target in &targets {
            for action in &actions {
                debug!(?model, %action, ?target, "registering rule");
                self.registry.append(Rule::new(
                    model.clone(),
                    action.as_str(),
                    target.clone(),
                    condition.clone(),
                ));
            }
        }

        Ok(())
    }

    pub fn can<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
    ) -> bool {
        self.can_with(performer, action, target, &Options::new())
    }

    /// Same as `can`, passing `options` through to condition predicates.
    pub fn can_with<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
        options: &Options,
    ) -> bool {
        let target = target.into();
        let attributes = TargetAttributes::new(target);
        let allowed = self
            .registry
            .iter()
            .any(|rule| self.matches(rule, performer, action, &attributes, options));

        trace!(
            performer = ?performer.entity_type(),
            action,
            ?target,
            allowed,
            "evaluated request"
        );
        allowed
    }

    pub fn cannot<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
    ) -> bool {
        !self.can(performer, action, target)
    }

    pub fn cannot_with<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
        options: &Options,
    ) -> bool {
        !self.can_with(performer, action, target, options)
    }

    /// Returns the configured error when the request is not allowed.
    pub fn authorize<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
    ) -> std::result::Result<(), F::Error> {
        self.authorize_with(performer, action, target, &Options::new())
    }

    pub fn authorize_with<'a>(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: impl Into<TargetRef<'a>>,
        options: &Options,
    ) -> std::result::Result<(), F::Error> {
        let target = target.into();
        if self.can_with(performer, action, target, options) {
            return Ok(());
        }

        debug!(
            performer = ?performer.entity_type(),
            action,
            ?target,
            "authorization denied"
        );
        Err(self
            .error_factory
            .create_error(performer, action, &target, options))
    }

    pub fn rules(&self) -> &[Rule] {
        self.registry.all()
    }

    /// Removes every registered rule.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    fn matches(
        &self,
        rule: &Rule,
        performer: &dyn Entity,
        action: &str,
        target: &TargetAttributes<'_>,
        options: &Options,
    ) -> bool {
        self.instance_of.instance_of(performer, rule.model())
            && self.matches_target(rule.target(), target.target())
            && rule.matches_action(action)
            && match rule.condition() {
                Some(condition) => condition.evaluate_with(performer, target, options),
                None => true,
            }
    }

    fn matches_target(&self, expected: &Target, target: TargetRef<'_>) -> bool {
        match (expected, target) {
            (Target::All, _) => true,
            (Target::Model(Model::Type(handle)), TargetRef::Type(requested)) => *handle == requested,
            (Target::Model(Model::Descriptor(_)), TargetRef::Type(_)) => false,
            (Target::Model(model), TargetRef::Instance(entity)) => {
                self.instance_of.instance_of(entity, model)
            }
            (Target::TypeItself(handle), TargetRef::Type(requested)) => *handle == requested,
            (Target::TypeItself(_), TargetRef::Instance(_)) => false,
            // a sub-object may share the address of the object that holds it.
            (Target::Value(value), TargetRef::Instance(entity)) => {
                ptr::addr_eq(Arc::as_ptr(value), ptr::from_ref(entity))
                    && (**value).entity_type() == entity.entity_type()
            }
            (Target::Value(_), TargetRef::Type(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use serde::Serialize;
    use serde_json::{json, Value};
    use test_case::test_case;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{AttributeAccessor, AttributeSource, Condition, TypeHandle};

    struct User;
    impl Entity for User {}

    struct Admin;
    impl Entity for Admin {}

    #[derive(Default)]
    struct Product {
        attrs: Value,
    }

    impl Product {
        fn with(attrs: Value) -> Self {
            Self { attrs }
        }
    }

    impl AttributeAccessor for Product {
        fn get(&self, key: &str) -> Option<Value> {
            self.attrs.get(key).cloned()
        }
    }

    impl Entity for Product {
        fn attributes(&self) -> AttributeSource<'_> {
            AttributeSource::Accessor(self)
        }
    }

    #[derive(Serialize)]
    struct Post {
        published: bool,
    }

    impl Entity for Post {
        fn attributes(&self) -> AttributeSource<'_> {
            AttributeSource::fields(self)
        }
    }

    fn engine_with(actions: impl Into<Actions>, targets: impl Into<Targets>) -> Engine {
        let mut engine = Engine::new();
        engine
            .allow(Model::of::<User>(), actions, targets, ())
            .expect("valid rule");
        engine
    }

    #[test]
    fn allow_one_action() {
        let engine = engine_with("read", Target::of::<Product>());
        let product = Product::default();

        assert!(engine.can(&User, "read", &product));
        assert!(!engine.cannot(&User, "read", &product));
        assert!(!engine.can(&User, "create", &product));
    }

    #[test]
    fn allow_many_actions() {
        let engine = engine_with(["read", "create", "destroy"], Target::of::<Product>());
        let product = Product::default();

        assert!(engine.can(&User, "read", &product));
        assert!(engine.can(&User, "create", &product));
        assert!(engine.can(&User, "destroy", &product));
        assert!(!engine.can(&User, "update", &product));
    }

    #[test]
    fn allow_registers_cartesian_product() {
        let engine = engine_with(
            ["read", "create"],
            [Target::of::<Product>(), Target::of::<Post>()],
        );

        let pairs: Vec<(&str, String)> = engine
            .rules()
            .iter()
            .map(|rule| (rule.action(), format!("{:?}", rule.target())))
            .collect();

        assert_eq!(4, pairs.len());
        assert_eq!("read", pairs[0].0);
        assert_eq!("create", pairs[1].0);
        assert_eq!(pairs[0].1, pairs[1].1);
        assert_ne!(pairs[1].1, pairs[2].1);
    }

    #[test_case("read" ; "read")]
    #[test_case("create" ; "create")]
    #[test_case("update" ; "update")]
    #[test_case("destroy" ; "destroy")]
    #[test_case("modify" ; "modify")]
    fn manage_allows_any_action(action: &str) {
        let engine = engine_with("manage", Target::of::<Product>());

        assert!(engine.can(&User, action, &Product::default()));
        assert!(!engine.can(&User, action, &Post { published: true }));
    }

    #[test]
    fn manage_all_allows_everything() {
        let engine = engine_with("manage", Target::All);

        assert!(engine.can(&User, "read", &User));
        assert!(engine.can(&User, "read", &Product::default()));
        assert!(engine.can(&User, "read", TargetRef::of::<Product>()));
    }

    #[test]
    fn rules_apply_only_to_their_model() {
        let engine = engine_with("manage", Target::All);

        assert!(engine.can(&User, "read", &Product::default()));
        assert!(!engine.can(&Admin, "read", &Product::default()));
    }

    #[test]
    fn allow_only_objects_that_satisfy_attributes() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                json!({ "published": true }),
            )
            .unwrap();

        let private = Product::default();
        let unpublished = Product::with(json!({ "published": false }));
        let public = Product::with(json!({ "published": true }));

        assert!(!engine.can(&User, "read", &private));
        assert!(!engine.can(&User, "read", &unpublished));
        assert!(engine.can(&User, "read", &public));
    }

    #[test]
    fn attribute_conditions_read_plain_fields() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Post>(),
                json!({ "published": true }),
            )
            .unwrap();

        assert!(engine.can(&User, "read", &Post { published: true }));
        assert!(!engine.can(&User, "read", &Post { published: false }));
    }

    #[test]
    fn attribute_equality_is_deep() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                json!({ "tags": ["a", "b"] }),
            )
            .unwrap();

        let tagged = Product::with(json!({ "tags": ["a", "b"] }));
        let partially = Product::with(json!({ "tags": ["a"] }));

        assert!(engine.can(&User, "read", &tagged));
        assert!(!engine.can(&User, "read", &partially));
    }

    #[test]
    fn allow_only_objects_that_pass_a_predicate() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                Condition::predicate(|_, target, _| {
                    target
                        .as_instance()
                        .and_then(|entity| entity.attributes().get("published").map(|v| *v == json!(true)))
                        .unwrap_or(false)
                }),
            )
            .unwrap();

        assert!(!engine.can(&User, "read", &Product::default()));
        assert!(engine.can(&User, "read", &Product::with(json!({ "published": true }))));
    }

    #[test]
    fn predicate_receives_empty_options_by_default() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::All,
                Condition::predicate(|performer, _, options| {
                    TypeHandle::of::<User>().is_type_of(performer)
                        && options.get("tenant").map_or(true, |t| *t == json!("acme"))
                }),
            )
            .unwrap();

        assert!(engine.can(&User, "read", &Product::default()));

        let mut options = Options::new();
        options.insert("tenant".into(), json!("other"));
        assert!(!engine.can_with(&User, "read", &Product::default(), &options));
        assert!(engine.cannot_with(&User, "read", &Product::default(), &options));

        options.insert("tenant".into(), json!("acme"));
        assert!(engine.can_with(&User, "read", &Product::default(), &options));
    }

    #[test]
    fn model_rule_covers_the_type_itself() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                json!({ "published": true }),
            )
            .unwrap();

        assert!(engine.can(&User, "read", TargetRef::of::<Product>()));
        assert!(!engine.can(&User, "read", TargetRef::of::<Post>()));
    }

    #[test]
    fn type_itself_does_not_cover_instances() {
        let mut engine = Engine::new();
        engine
            .allow(Model::of::<User>(), "view", Target::type_itself::<Product>(), ())
            .unwrap();

        assert!(engine.can(&User, "view", TargetRef::of::<Product>()));
        assert!(!engine.can(&User, "view", &Product::default()));

        engine
            .allow(Model::of::<User>(), "view", Target::of::<Product>(), ())
            .unwrap();
        assert!(engine.can(&User, "view", &Product::default()));
    }

    #[test]
    fn value_target_matches_only_that_object() {
        let featured = Arc::new(Product::with(json!({ "featured": true })));
        let other = Product::with(json!({ "featured": true }));

        let mut engine = Engine::new();
        engine
            .allow(Model::of::<User>(), "feature", Target::value(featured.clone()), ())
            .unwrap();

        assert!(engine.can(&User, "feature", &*featured));
        assert!(!engine.can(&User, "feature", &other));
        assert!(!engine.can(&User, "feature", TargetRef::of::<Product>()));
    }

    #[test]
    fn value_target_does_not_match_objects_sharing_its_address() {
        struct Inner(u64);
        impl Entity for Inner {}

        #[repr(C)]
        struct Outer {
            inner: Inner,
        }
        impl Entity for Outer {}

        let featured = Arc::new(Outer { inner: Inner(7) });
        assert!(ptr::addr_eq(Arc::as_ptr(&featured), ptr::from_ref(&featured.inner)));
        assert_eq!(7, featured.inner.0);

        let mut engine = Engine::new();
        engine
            .allow(Model::of::<User>(), "feature", Target::value(featured.clone()), ())
            .unwrap();

        assert!(engine.can(&User, "feature", &*featured));
        assert!(!engine.can(&User, "feature", &featured.inner));
    }

    #[test]
    fn attributes_are_resolved_once_per_request() {
        struct Counted {
            published: bool,
            resolutions: AtomicUsize,
        }

        impl Entity for Counted {
            fn attributes(&self) -> AttributeSource<'_> {
                self.resolutions.fetch_add(1, Ordering::SeqCst);
                AttributeSource::Fields(json!({ "published": self.published }))
            }
        }

        let mut engine = Engine::new();
        for condition in &[json!({ "published": true }), json!({ "featured": true })] {
            engine
                .allow(Model::of::<User>(), "read", Target::of::<Counted>(), condition.clone())
                .unwrap();
        }

        let draft = Counted {
            published: false,
            resolutions: AtomicUsize::new(0),
        };
        assert!(!engine.can(&User, "read", &draft));
        assert_eq!(1, draft.resolutions.load(Ordering::SeqCst));

        assert!(!engine.can(&User, "read", &draft));
        assert_eq!(2, draft.resolutions.load(Ordering::SeqCst));

        // no attribute rule applies, so nothing is resolved.
        assert!(!engine.can(&User, "destroy", &draft));
        assert_eq!(2, draft.resolutions.load(Ordering::SeqCst));
    }

    fn engine_with_failing_predicate() -> Engine {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                Condition::predicate(|_, _, _| panic!("lookup failed")),
            )
            .unwrap();
        engine
    }

    #[test]
    #[should_panic(expected = "lookup failed")]
    fn panicking_predicate_aborts_can() {
        engine_with_failing_predicate().can(&User, "read", &Product::default());
    }

    #[test]
    #[should_panic(expected = "lookup failed")]
    fn panicking_predicate_aborts_authorize() {
        let _ = engine_with_failing_predicate().authorize(&User, "read", &Product::default());
    }

    #[test]
    fn custom_instance_of_unwraps_descriptors() {
        struct Wrapped {
            instance: TypeHandle,
        }

        let instance_of = |candidate: &dyn Entity, model: &Model| match model {
            Model::Type(handle) => handle.is_type_of(candidate),
            Model::Descriptor(_) => model
                .downcast_descriptor::<Wrapped>()
                .is_some_and(|wrapped| wrapped.instance.is_type_of(candidate)),
        };

        let mut engine = Engine::with_strategies(instance_of, DefaultErrorFactory);
        engine
            .allow(
                Model::descriptor(Wrapped {
                    instance: TypeHandle::of::<User>(),
                }),
                "read",
                Target::Model(Model::descriptor(Wrapped {
                    instance: TypeHandle::of::<Product>(),
                })),
                (),
            )
            .unwrap();

        assert!(engine.can(&User, "read", &Product::default()));
        assert!(!engine.can(&Admin, "read", &Product::default()));
        assert!(!engine.can(&User, "read", &User));
    }

    #[test]
    fn authorize_returns_default_error_on_denial() {
        let mut engine = Engine::new();
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                json!({ "published": true }),
            )
            .unwrap();

        assert_matches!(
            engine.authorize(&User, "read", &Product::with(json!({ "published": true }))),
            Ok(())
        );

        let error = engine
            .authorize(&User, "read", &Product::default())
            .unwrap_err();
        assert_matches!(error, Error::Unauthorized { ref action, .. } if action == "read");
        assert_eq!(Some(401), error.status());
    }

    #[test]
    fn authorize_uses_configured_error_factory() {
        #[derive(Debug, PartialEq)]
        struct Forbidden {
            action: String,
            target: String,
            reason: Option<Value>,
        }

        struct ForbiddenFactory;

        impl ErrorFactory for ForbiddenFactory {
            type Error = Forbidden;

            fn create_error(
                &self,
                _performer: &dyn Entity,
                action: &str,
                target: &TargetRef<'_>,
                options: &Options,
            ) -> Forbidden {
                Forbidden {
                    action: action.to_string(),
                    target: target.to_string(),
                    reason: options.get("reason").cloned(),
                }
            }
        }

        let mut engine = Engine::with_strategies(DefaultInstanceOf, ForbiddenFactory);
        engine
            .allow(Model::of::<User>(), "read", Target::of::<Product>(), ())
            .unwrap();

        assert_eq!(Ok(()), engine.authorize(&User, "read", &Product::default()));

        let mut options = Options::new();
        options.insert("reason".into(), json!("archived"));
        let error = engine
            .authorize_with(&User, "destroy", &Product::default(), &options)
            .unwrap_err();

        assert_eq!("destroy", error.action);
        assert!(error.target.ends_with("Product"));
        assert_eq!(Some(json!("archived")), error.reason);
    }

    #[test]
    fn invalid_condition_is_rejected_immediately() {
        let mut engine = Engine::new();

        assert_matches!(
            engine.allow(Model::of::<User>(), "read", Target::All, json!(true)),
            Err(Error::InvalidCondition(_))
        );
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn empty_actions_or_targets_are_rejected() {
        let mut engine = Engine::new();

        assert_matches!(
            engine.allow(Model::of::<User>(), Vec::<String>::new(), Target::All, ()),
            Err(Error::InvalidRule(_))
        );
        assert_matches!(
            engine.allow(Model::of::<User>(), "read", Vec::<Target>::new(), ()),
            Err(Error::InvalidRule(_))
        );
        assert!(engine.rules().is_empty());
    }

    #[test]
    fn redundant_rules_each_contribute() {
        let mut engine = engine_with("read", Target::of::<Product>());
        engine
            .allow(
                Model::of::<User>(),
                "read",
                Target::of::<Product>(),
                json!({ "published": true }),
            )
            .unwrap();

        assert_eq!(2, engine.rules().len());
        assert!(engine.can(&User, "read", &Product::default()));
    }

    #[test]
    fn clear_revokes_everything() {
        let mut engine = engine_with("manage", Target::All);
        assert!(engine.can(&User, "read", &User));

        engine.clear();

        assert!(engine.rules().is_empty());
        assert!(engine.cannot(&User, "read", &User));
    }

    #[test]
    fn engine_is_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();

        let engine = Arc::new(engine_with("read", Target::of::<Product>()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.can(&User, "read", &Product::default()))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    proptest! {
        #[test]
        fn manage_matches_any_action_string(action in "\\PC*") {
            let engine = engine_with("manage", Target::of::<Product>());

            prop_assert!(engine.can(&User, &action, &Product::default()));
        }

        #[test]
        fn all_matches_any_target(pick in 0usize..4) {
            let engine = engine_with("read", Target::All);
            let product = Product::default();
            let post = Post { published: false };

            let target = match pick {
                0 => TargetRef::from(&product),
                1 => TargetRef::from(&post),
                2 => TargetRef::from(&User),
                _ => TargetRef::of::<Post>(),
            };

            prop_assert!(engine.can(&User, "read", target));
        }

        #[test]
        fn cannot_negates_can(
            rule_action in "(read|create|manage)",
            action in "(read|create|update|[a-z]{1,8})",
            published in any::<bool>(),
        ) {
            let mut engine = Engine::new();
            engine
                .allow(
                    Model::of::<User>(),
                    rule_action.as_str(),
                    Target::of::<Product>(),
                    json!({ "published": true }),
                )
                .unwrap();
            let product = Product::with(json!({ "published": published }));

            prop_assert_eq!(
                !engine.can(&User, &action, &product),
                engine.cannot(&User, &action, &product)
            );
            prop_assert_eq!(
                published && (rule_action == "manage" || rule_action == action),
                engine.can(&User, &action, &product)
            );
        }
    }
}
