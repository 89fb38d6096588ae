//! Users CRUD API on an in-memory table
//!
//! This example demonstrates:
//! - Loading collection config and validation rules from YAML
//! - Insert, update and select schemas derived from a table definition
//! - A paginated, searchable, sortable list endpoint
//! - Validated create, read, update and delete endpoints
//!
//! Try it:
//! ```text
//! curl 'http://127.0.0.1:3000/api/v1/users?search=example&sortBy=name&sortDir=desc&pageSize=2'
//! curl -X POST http://127.0.0.1:3000/api/v1/users -H 'content-type: application/json' \
//!      -d '{"name":"Alan Turing","email":"alan@example.com"}'
//! ```

mod users;

use anyhow::Result;
use crudkit::prelude::*;
use tower_http::cors::CorsLayer;
use users::{UserStore, UsersState};

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/users_api/crud.yaml");

async fn seed(store: &UserStore) -> Result<()> {
    let users = [
        ("Ada Lovelace", "ada@example.com"),
        ("Grace Hopper", "grace@navy.mil"),
        ("Linus Torvalds", "linus@example.com"),
        ("Barbara Liskov", "barbara@mit.edu"),
    ];
    for (name, email) in users {
        let now = crudkit::core::validation::filters::now();
        let mut values = Map::new();
        values.insert("name".to_string(), json!(name));
        values.insert("email".to_string(), json!(email));
        values.insert("createdAt".to_string(), now.clone());
        values.insert("updatedAt".to_string(), now);
        store.insert(values).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = CrudConfig::from_yaml_file(CONFIG_PATH)?;

    let store = UserStore::new(users::COLLECTION, "id");
    seed(&store).await?;
    let state = UsersState::new(&config, store)?;

    println!("\n🚀 Users API listening on http://127.0.0.1:3000");
    println!("   GET    /health");
    println!("   GET    /api/v1/users");
    println!("   POST   /api/v1/users");
    println!("   GET    /api/v1/users/{{id}}");
    println!("   PATCH  /api/v1/users/{{id}}");
    println!("   DELETE /api/v1/users/{{id}}\n");

    ServerBuilder::new()
        .with_config(config)
        .with_routes(users::routes(state))
        .with_cors(CorsLayer::permissive())
        .serve("127.0.0.1:3000")
        .await
}
