use can_i::{EngineBuilder, Entity, Result, TargetRef};

struct User;

impl Entity for User {}

struct Product;

impl Entity for Product {}

fn main() -> Result<()> {
    let json = r#"{
        "rules": [
            {
                "description": "Users browse the catalog",
                "model": "User",
                "actions": ["read", "list"],
                "targets": "Product"
            },
            {
                "model": "User",
                "actions": "create",
                "targets": "all"
            }
        ]
    }"#;

    // Construct the engine.
    let engine = EngineBuilder::from_json(json)
        .register::<User>("User")
        .register::<Product>("Product")
        .build()?;

    // Evaluate the request.
    engine.authorize(&User, "read", &Product)?;
    println!("Allowed");

    assert!(engine.can(&User, "list", TargetRef::of::<Product>()));
    assert!(engine.cannot(&User, "destroy", &Product));

    Ok(())
}
