use std::{any::Any, collections::BTreeMap};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    DefaultErrorFactory, DefaultInstanceOf, Engine, Error, ErrorFactory, InstanceOf, Model,
    Result, Target, TypeHandle,
};

/// Target name that matches any target.
const ALL: &str = "all";

/// Configures strategies and loads declarative rules into a new `Engine`.
pub struct EngineBuilder<I = DefaultInstanceOf, F = DefaultErrorFactory> {
    instance_of: I,
    error_factory: F,
    types: BTreeMap<String, TypeHandle>,
    definitions: Vec<String>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            instance_of: DefaultInstanceOf,
            error_factory: DefaultErrorFactory,
            types: BTreeMap::new(),
            definitions: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Self {
        Self::new().with_json(json)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, F> EngineBuilder<I, F>
where
    I: InstanceOf,
    F: ErrorFactory,
{
    pub fn with_instance_of<J: InstanceOf>(self, instance_of: J) -> EngineBuilder<J, F> {
        EngineBuilder {
            instance_of,
            error_factory: self.error_factory,
            types: self.types,
            definitions: self.definitions,
        }
    }

    pub fn with_error_factory<G: ErrorFactory>(self, error_factory: G) -> EngineBuilder<I, G> {
        EngineBuilder {
            instance_of: self.instance_of,
            error_factory,
            types: self.types,
            definitions: self.definitions,
        }
    }

    /// Makes `T` addressable by `name` in JSON rule definitions.
    pub fn register<T: Any>(mut self, name: impl Into<String>) -> Self {
        self.types.insert(name.into(), TypeHandle::of::<T>());
        self
    }

    /// Adds a JSON rule definition. Definitions are loaded in the order
    /// they were added.
    pub fn with_json(mut self, json: &str) -> Self {
        self.definitions.push(json.into());
        self
    }

    pub fn build(self) -> Result<Engine<I, F>> {
        let mut engine = Engine::with_strategies(self.instance_of, self.error_factory);

        for json in &self.definitions {
            let definition: RulesDefinition =
                serde_json::from_str(json).map_err(Error::Deserializing)?;

            for rule in definition.rules {
                process_rule(&mut engine, &self.types, rule)?;
            }
        }

        Ok(engine)
    }
}

fn process_rule<I, F>(
    engine: &mut Engine<I, F>,
    types: &BTreeMap<String, TypeHandle>,
    rule: RuleDefinition,
) -> Result<()>
where
    I: InstanceOf,
    F: ErrorFactory,
{
    debug!(description = %rule.description, model = %rule.model, "loading rule definition");

    let model = resolve_model(types, &rule.model)?;
    let targets = rule
        .targets
        .into_vec()
        .iter()
        .map(|name| resolve_target(types, name))
        .collect::<Result<Vec<_>>>()?;

    engine.allow(model, rule.actions.into_vec(), targets, rule.conditions)
}

fn resolve_model(types: &BTreeMap<String, TypeHandle>, name: &str) -> Result<Model> {
    types
        .get(name)
        .map(|handle| Model::Type(*handle))
        .ok_or_else(|| Error::UnknownModel(name.into()))
}

fn resolve_target(types: &BTreeMap<String, TypeHandle>, name: &str) -> Result<Target> {
    if name == ALL {
        Ok(Target::All)
    } else {
        resolve_model(types, name).map(Target::Model)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesDefinition {
    rules: Vec<RuleDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDefinition {
    #[serde(default)]
    description: String,
    model: String,
    actions: OneOrMany,
    targets: OneOrMany,
    #[serde(default)]
    conditions: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}
