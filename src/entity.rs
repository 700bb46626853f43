use std::{
    any::{self, Any, TypeId},
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Runtime identity of a Rust type.
///
/// Two handles are equal when they were built for the same type.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    name: &'static str,
}

impl TypeHandle {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if `entity` is a value of exactly this type.
    pub fn is_type_of(&self, entity: &dyn Entity) -> bool {
        entity.entity_type() == *self
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type information available for every `'static` value.
///
/// Implemented automatically; it lets `&dyn Entity` report its concrete type.
pub trait EntityType {
    fn as_any(&self) -> &dyn Any;
    fn entity_type(&self) -> TypeHandle;
}

impl<T: Any> EntityType for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn entity_type(&self) -> TypeHandle {
        TypeHandle::of::<T>()
    }
}

/// A performer or a target of an action.
///
/// Implementors only decide how their attributes are exposed to
/// attribute conditions. The default exposes none.
pub trait Entity: EntityType {
    fn attributes(&self) -> AttributeSource<'_> {
        AttributeSource::Fields(Value::Null)
    }
}

/// Retrieval capability for entities that front an external data store.
pub trait AttributeAccessor {
    fn get(&self, key: &str) -> Option<Value>;
}

/// Where attribute conditions read a target's values from.
pub enum AttributeSource<'a> {
    /// The entity answers lookups itself.
    Accessor(&'a dyn AttributeAccessor),
    /// Plain fields, as a JSON object.
    Fields(Value),
}

impl<'a> AttributeSource<'a> {
    /// Exposes the serialized fields of `value`.
    pub fn fields<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(fields) => AttributeSource::Fields(fields),
            Err(e) => {
                warn!(
                    entity = any::type_name::<T>(),
                    error = %e,
                    "unable to serialize entity fields"
                );
                AttributeSource::Fields(Value::Null)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Cow<'_, Value>> {
        match self {
            AttributeSource::Accessor(accessor) => accessor.get(key).map(Cow::Owned),
            AttributeSource::Fields(fields) => fields.get(key).map(Cow::Borrowed),
        }
    }
}

impl fmt::Debug for AttributeSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeSource::Accessor(_) => f.write_str("Accessor"),
            AttributeSource::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
        }
    }
}
