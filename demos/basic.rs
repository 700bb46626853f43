use can_i::{Engine, Entity, Model, Result, Target};
use serde_json::json;

struct User;

impl Entity for User {}

struct Product;

impl Entity for Product {}

fn main() -> Result<()> {
    // Construct the engine.
    let mut engine = Engine::new();

    // Users may read any product, and manage nothing else.
    engine.allow(Model::of::<User>(), ["read", "list"], Target::of::<Product>(), ())?;

    // Admin-like grant on everything, limited by an attribute map.
    engine.allow(Model::of::<User>(), "manage", Target::All, json!({ "owner": true }))?;

    let user = User;
    let product = Product;

    match engine.authorize(&user, "read", &product) {
        Ok(()) => println!("Allowed"),
        Err(e) => panic!("Denied: {}", e),
    }

    // Everything else denies.
    assert!(engine.cannot(&user, "destroy", &product));

    Ok(())
}
