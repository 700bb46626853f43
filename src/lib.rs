//! Embeddable authorization rules.
//!
//! Declare what performers of a model may do with `Engine::allow`, then ask
//! `Engine::can`, `Engine::cannot` or `Engine::authorize`.
//!
//! ```
//! use can_i::{Engine, Entity, Model, Target};
//! use serde_json::json;
//!
//! struct User;
//! impl Entity for User {}
//!
//! struct Product;
//! impl Entity for Product {}
//!
//! let mut engine = Engine::new();
//! engine.allow(Model::of::<User>(), "read", Target::of::<Product>(), ())?;
//!
//! assert!(engine.can(&User, "read", &Product));
//! assert!(engine.cannot(&User, "destroy", &Product));
//! # Ok::<(), can_i::Error>(())
//! ```
#![deny(rust_2018_idioms, warnings)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::similar_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::match_same_arms,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]
mod condition;
mod engine;
mod entity;
mod errors;
mod factory;
mod matcher;
mod registry;
mod rule;

pub use condition::{Condition, IntoCondition, Options};
pub use engine::{Engine, EngineBuilder};
pub use entity::{AttributeAccessor, AttributeSource, Entity, EntityType, TypeHandle};
pub use errors::{Error, Result};
pub use factory::{DefaultErrorFactory, ErrorFactory};
pub use matcher::{DefaultInstanceOf, InstanceOf};
pub use registry::Registry;
pub use rule::{Actions, Model, Rule, Target, TargetRef, Targets, MANAGE};
