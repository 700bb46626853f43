use std::{cell::OnceCell, fmt, sync::Arc};

use serde_json::{Map, Value};

use crate::{AttributeSource, Entity, Error, Result, TargetRef};

/// Caller-supplied options passed through to condition predicates.
pub type Options = Map<String, Value>;

type Predicate = dyn Fn(&dyn Entity, &TargetRef<'_>, &Options) -> bool + Send + Sync;

/// Refines when a rule applies.
///
/// Predicates are expected to be free of side effects; the engine may call
/// them any number of times, from any thread.
#[derive(Clone)]
pub enum Condition {
    /// Every attribute must deep-equal the expected value.
    Attributes(Arc<Map<String, Value>>),
    /// Custom test over `(performer, target, options)`.
    Predicate(Arc<Predicate>),
}

impl Condition {
    pub fn attributes(attributes: Map<String, Value>) -> Self {
        Condition::Attributes(Arc::new(attributes))
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&dyn Entity, &TargetRef<'_>, &Options) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(predicate))
    }

    pub fn evaluate(&self, performer: &dyn Entity, target: &TargetRef<'_>, options: &Options) -> bool {
        self.evaluate_with(performer, &TargetAttributes::new(*target), options)
    }

    pub(crate) fn evaluate_with(
        &self,
        performer: &dyn Entity,
        target: &TargetAttributes<'_>,
        options: &Options,
    ) -> bool {
        match self {
            Condition::Attributes(expected) => match target.source() {
                Some(source) => attributes_match(source, expected),
                // the type itself has no instance data to inspect.
                None => true,
            },
            Condition::Predicate(predicate) => predicate(performer, &target.target, options),
        }
    }
}

/// A query target whose attribute source is resolved at most once.
pub(crate) struct TargetAttributes<'a> {
    target: TargetRef<'a>,
    source: OnceCell<Option<AttributeSource<'a>>>,
}

impl<'a> TargetAttributes<'a> {
    pub(crate) fn new(target: TargetRef<'a>) -> Self {
        Self {
            target,
            source: OnceCell::new(),
        }
    }

    pub(crate) fn target(&self) -> TargetRef<'a> {
        self.target
    }

    fn source(&self) -> Option<&AttributeSource<'a>> {
        self.source
            .get_or_init(|| self.target.as_instance().map(|entity| entity.attributes()))
            .as_ref()
    }
}

fn attributes_match(source: &AttributeSource<'_>, expected: &Map<String, Value>) -> bool {
    expected.iter().all(|(key, value)| match source.get(key) {
        Some(actual) => *actual == *value,
        None => false,
    })
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Attributes(attributes) => {
                f.debug_tuple("Attributes").field(attributes).finish()
            }
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Anything accepted as the condition argument of `Engine::allow`.
pub trait IntoCondition {
    fn into_condition(self) -> Result<Option<Condition>>;
}

impl IntoCondition for () {
    fn into_condition(self) -> Result<Option<Condition>> {
        Ok(None)
    }
}

impl IntoCondition for Condition {
    fn into_condition(self) -> Result<Option<Condition>> {
        Ok(Some(self))
    }
}

impl IntoCondition for Option<Condition> {
    fn into_condition(self) -> Result<Option<Condition>> {
        Ok(self)
    }
}

impl IntoCondition for Map<String, Value> {
    fn into_condition(self) -> Result<Option<Condition>> {
        Ok(Some(Condition::attributes(self)))
    }
}

impl IntoCondition for Value {
    fn into_condition(self) -> Result<Option<Condition>> {
        match self {
            Value::Null => Ok(None),
            Value::Object(attributes) => Ok(Some(Condition::attributes(attributes))),
            other => Err(Error::InvalidCondition(format!(
                "expected an attribute map, got {}",
                other
            ))),
        }
    }
}

impl IntoCondition for Option<Value> {
    fn into_condition(self) -> Result<Option<Condition>> {
        self.map_or(Ok(None), IntoCondition::into_condition)
    }
}
