use crate::{Entity, Model};

/// Decides whether an entity belongs to a model.
pub trait InstanceOf {
    fn instance_of(&self, candidate: &dyn Entity, model: &Model) -> bool;
}

/// Matches entities against the concrete Rust type they were declared with.
///
/// Descriptor models never match; they need a custom strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInstanceOf;

impl InstanceOf for DefaultInstanceOf {
    fn instance_of(&self, candidate: &dyn Entity, model: &Model) -> bool {
        match model {
            Model::Type(handle) => handle.is_type_of(candidate),
            Model::Descriptor(_) => false,
        }
    }
}

impl<F> InstanceOf for F
where
    F: Fn(&dyn Entity, &Model) -> bool,
{
    fn instance_of(&self, candidate: &dyn Entity, model: &Model) -> bool {
        self(candidate, model)
    }
}
