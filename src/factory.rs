use crate::{Entity, Error, Options, TargetRef};

/// Builds the error returned by `Engine::authorize` on denial.
pub trait ErrorFactory {
    type Error;

    fn create_error(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: &TargetRef<'_>,
        options: &Options,
    ) -> Self::Error;
}

/// Produces `Error::Unauthorized`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorFactory;

impl ErrorFactory for DefaultErrorFactory {
    type Error = Error;

    fn create_error(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: &TargetRef<'_>,
        _options: &Options,
    ) -> Error {
        Error::Unauthorized {
            performer: performer.entity_type().name().to_string(),
            action: action.to_string(),
            target: target.to_string(),
        }
    }
}

impl<F, E> ErrorFactory for F
where
    F: Fn(&dyn Entity, &str, &TargetRef<'_>, &Options) -> E,
{
    type Error = E;

    fn create_error(
        &self,
        performer: &dyn Entity,
        action: &str,
        target: &TargetRef<'_>,
        options: &Options,
    ) -> E {
        self(performer, action, target, options)
    }
}
