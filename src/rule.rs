use std::{any::Any, fmt, sync::Arc};

use crate::{Condition, Entity, TypeHandle};

/// Action name that matches any action.
pub const MANAGE: &str = "manage";

/// Identifies a kind of performer or target.
#[derive(Clone)]
pub enum Model {
    /// Values of a concrete Rust type.
    Type(TypeHandle),
    /// Opaque descriptor interpreted by a custom `InstanceOf` strategy.
    Descriptor(Arc<dyn Any + Send + Sync>),
}

impl Model {
    pub fn of<T: Any>() -> Self {
        Model::Type(TypeHandle::of::<T>())
    }

    pub fn descriptor<D: Any + Send + Sync>(descriptor: D) -> Self {
        Model::Descriptor(Arc::new(descriptor))
    }

    /// Returns the descriptor if it is of type `D`.
    pub fn downcast_descriptor<D: Any>(&self) -> Option<&D> {
        match self {
            Model::Descriptor(descriptor) => descriptor.downcast_ref::<D>(),
            Model::Type(_) => None,
        }
    }
}

impl From<TypeHandle> for Model {
    fn from(handle: TypeHandle) -> Self {
        Model::Type(handle)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Type(handle) => write!(f, "{:?}", handle),
            Model::Descriptor(_) => f.write_str("Descriptor(..)"),
        }
    }
}

/// What a rule grants access to.
#[derive(Clone)]
pub enum Target {
    /// Any target.
    All,
    /// Instances of a model, or the model's type itself.
    Model(Model),
    /// The type itself, not its instances.
    TypeItself(TypeHandle),
    /// One concrete object, matched by identity.
    Value(Arc<dyn Entity + Send + Sync>),
}

impl Target {
    pub fn of<T: Any>() -> Self {
        Target::Model(Model::of::<T>())
    }

    pub fn type_itself<T: Any>() -> Self {
        Target::TypeItself(TypeHandle::of::<T>())
    }

    pub fn value<E: Entity + Send + Sync + 'static>(value: Arc<E>) -> Self {
        Target::Value(value)
    }
}

impl From<TypeHandle> for Target {
    fn from(handle: TypeHandle) -> Self {
        Target::Model(Model::Type(handle))
    }
}

impl From<Model> for Target {
    fn from(model: Model) -> Self {
        Target::Model(model)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::Model(model) => write!(f, "{:?}", model),
            Target::TypeItself(handle) => write!(f, "TypeItself({:?})", handle),
            Target::Value(value) => write!(f, "Value({:?})", (**value).entity_type()),
        }
    }
}

/// The target of a query: an object, or a type itself.
#[derive(Clone, Copy)]
pub enum TargetRef<'a> {
    Instance(&'a dyn Entity),
    Type(TypeHandle),
}

impl<'a> TargetRef<'a> {
    pub fn of<T: Any>() -> Self {
        TargetRef::Type(TypeHandle::of::<T>())
    }

    pub fn instance(entity: &'a dyn Entity) -> Self {
        TargetRef::Instance(entity)
    }

    /// Returns the object, if the query is about an instance.
    pub fn as_instance(&self) -> Option<&'a dyn Entity> {
        match *self {
            TargetRef::Instance(entity) => Some(entity),
            TargetRef::Type(_) => None,
        }
    }
}

impl<'a, T: Entity> From<&'a T> for TargetRef<'a> {
    fn from(entity: &'a T) -> Self {
        TargetRef::Instance(entity)
    }
}

impl From<TypeHandle> for TargetRef<'_> {
    fn from(handle: TypeHandle) -> Self {
        TargetRef::Type(handle)
    }
}

impl fmt::Display for TargetRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TargetRef::Instance(entity) => f.write_str(entity.entity_type().name()),
            TargetRef::Type(handle) => write!(f, "type {}", handle.name()),
        }
    }
}

impl fmt::Debug for TargetRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TargetRef::Instance(entity) => write!(f, "Instance({:?})", entity.entity_type()),
            TargetRef::Type(handle) => write!(f, "Type({:?})", handle),
        }
    }
}

/// One or many action names.
#[derive(Debug, Clone, PartialEq)]
pub struct Actions(pub(crate) Vec<String>);

impl From<&str> for Actions {
    fn from(action: &str) -> Self {
        Actions(vec![action.to_string()])
    }
}

impl From<String> for Actions {
    fn from(action: String) -> Self {
        Actions(vec![action])
    }
}

impl From<Vec<String>> for Actions {
    fn from(actions: Vec<String>) -> Self {
        Actions(actions)
    }
}

impl From<Vec<&str>> for Actions {
    fn from(actions: Vec<&str>) -> Self {
        actions.as_slice().into()
    }
}

impl From<&[&str]> for Actions {
    fn from(actions: &[&str]) -> Self {
        Actions(actions.iter().map(|a| (*a).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Actions {
    fn from(actions: [&str; N]) -> Self {
        (&actions[..]).into()
    }
}

/// One or many rule targets.
#[derive(Debug, Clone)]
pub struct Targets(pub(crate) Vec<Target>);

impl From<Target> for Targets {
    fn from(target: Target) -> Self {
        Targets(vec![target])
    }
}

impl From<TypeHandle> for Targets {
    fn from(handle: TypeHandle) -> Self {
        Targets(vec![handle.into()])
    }
}

impl From<Model> for Targets {
    fn from(model: Model) -> Self {
        Targets(vec![model.into()])
    }
}

impl From<Vec<Target>> for Targets {
    fn from(targets: Vec<Target>) -> Self {
        Targets(targets)
    }
}

impl<const N: usize> From<[Target; N]> for Targets {
    fn from(targets: [Target; N]) -> Self {
        Targets(Vec::from(targets))
    }
}

/// A single grant: performers of `model` may do `action` to `target`
/// when `condition` holds.
#[derive(Debug, Clone)]
pub struct Rule {
    model: Model,
    action: String,
    target: Target,
    condition: Option<Condition>,
}

impl Rule {
    pub fn new(
        model: Model,
        action: impl Into<String>,
        target: Target,
        condition: Option<Condition>,
    ) -> Self {
        Self {
            model,
            action: action.into(),
            target,
            condition,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn matches_action(&self, action: &str) -> bool {
        self.action == MANAGE || self.action == action
    }
}
