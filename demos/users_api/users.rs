//! Users collection: table definition, schemas and endpoints

use crudkit::core::validation::filters;
use crudkit::core::validation::{CollectionSchema, ObjectSchema};
use crudkit::prelude::*;
use indexmap::IndexMap;
use std::sync::Arc;

pub const COLLECTION: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl_table_row!(User {
    id,
    name,
    email,
    created_at as "createdAt",
    updated_at as "updatedAt",
});

pub type UserStore = InMemoryTable<User>;

pub fn users_table() -> TableDef {
    TableDef::new(
        COLLECTION,
        vec![
            ColumnDef::integer("id").primary_key(),
            ColumnDef::text("name").nullable(),
            ColumnDef::text("email").nullable(),
            ColumnDef::timestamp("createdAt"),
            ColumnDef::timestamp("updatedAt"),
        ],
    )
}

fn search_condition(search: &str) -> Condition {
    Condition::contains_any(&["name", "email", "id"], search)
}

/// Schemas and store shared by the users endpoints
#[derive(Clone)]
pub struct UsersState {
    store: UserStore,
    settings: TableQuerySettings,
    create: Arc<ObjectSchema>,
    update: Arc<ObjectSchema>,
    resource: Arc<ObjectSchema>,
    collection: Arc<CollectionSchema>,
}

impl UsersState {
    pub fn new(config: &CrudConfig, store: UserStore) -> CrudResult<Self> {
        let table = users_table();
        let empty = IndexMap::new();
        let rules = if config.is_enabled(COLLECTION) {
            config.validation_rules(COLLECTION)?
        } else {
            &empty
        };

        Ok(Self {
            store,
            settings: config.table_query.clone(),
            create: Arc::new(table.insert_schema(rules)?),
            update: Arc::new(table.update_schema(rules)?),
            resource: Arc::new(table.select_schema()),
            collection: Arc::new(table.collection_schema(table.select_schema())),
        })
    }
}

fn id_param() -> impl Schema<Output = i64> {
    schema_fn(|params: Value| {
        params
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| id.parse::<i64>().ok())
            .ok_or_else(|| Violations::single("id", "Invalid ID parameter"))
    })
}

fn not_found(id: i64) -> CrudError {
    CrudError::Entity(EntityError::NotFound {
        entity_type: "user".to_string(),
        id: id.to_string(),
    })
}

/// Hide store failures behind a caller-safe message
fn storage_failure(message: &'static str) -> impl FnOnce(CrudError) -> CrudError {
    move |err| match err {
        CrudError::Storage(cause) => {
            tracing::warn!(error = %cause, "{}", message);
            CrudError::Internal(message.to_string())
        }
        other => other,
    }
}

/// `GET /api/v1/users` answers `{ data, count }`
async fn list_users(state: UsersState, ctx: ValidatedContext) -> CrudResult<Value> {
    let store = &state.store;
    let query = TableQuery::new(&ctx.raw_query)
        .with_settings(state.settings.clone())
        .search_filter(|search| Some(search_condition(search)))
        .custom_filter("email", |email| Some(Condition::eq("email", email)));

    let pushed_down = query
        .normalized()
        .map(|params| query.build_filters(&params))
        .unwrap_or_default();

    let page = query
        .run(
            || store.fetch(&pushed_down),
            |filters| async move { store.count(&filters).await },
        )
        .await
        .map_err(storage_failure("Failed to fetch users"))?;

    Ok(json!({
        "data": page.data,
        "count": page.total_items,
    }))
}

async fn get_user(state: UsersState, ctx: ValidatedContext<(), i64>) -> CrudResult<User> {
    let id = ctx.params;
    state
        .store
        .get(id)
        .await
        .map_err(storage_failure("Failed to fetch user"))?
        .ok_or_else(|| not_found(id))
}

async fn create_user(
    state: UsersState,
    mut ctx: ValidatedContext<Map<String, Value>>,
) -> CrudResult<User> {
    let body = ctx.take_body()?;
    state
        .store
        .insert(body)
        .await
        .map_err(storage_failure("Failed to create user"))
}

async fn update_user(
    state: UsersState,
    mut ctx: ValidatedContext<Map<String, Value>, i64>,
) -> CrudResult<User> {
    let id = ctx.params;
    let mut changes = ctx.take_body()?;
    if !changes.contains_key("updatedAt") {
        changes.insert("updatedAt".to_string(), filters::now());
    }
    state
        .store
        .update(id, changes)
        .await
        .map_err(storage_failure("Failed to update user"))?
        .ok_or_else(|| not_found(id))
}

async fn delete_user(state: UsersState, ctx: ValidatedContext<(), i64>) -> CrudResult<Value> {
    let id = ctx.params;
    state
        .store
        .delete(id)
        .await
        .map_err(storage_failure("Failed to delete user"))?
        .ok_or_else(|| not_found(id))?;
    Ok(Value::Null)
}

/// Users routes under `/api/v1/users`
pub fn routes(state: UsersState) -> Router {
    let list = {
        let state = state.clone();
        BaseEventHandler::builder()
            .validate_response(state.collection.clone())
            .handler(move |ctx| list_users(state.clone(), ctx))
    };

    let create = {
        let state = state.clone();
        BaseEventHandler::builder()
            .validate_body(state.create.clone())
            .validate_response(state.resource.clone())
            .success_status(StatusCode::CREATED)
            .handler(move |ctx| create_user(state.clone(), ctx))
    };

    let show = {
        let state = state.clone();
        BaseEventHandler::builder()
            .validate_params(id_param())
            .validate_response(state.resource.clone())
            .handler(move |ctx| get_user(state.clone(), ctx))
    };

    let update = {
        let state = state.clone();
        BaseEventHandler::builder()
            .validate_params(id_param())
            .validate_body(state.update.clone())
            .validate_response(state.resource.clone())
            .handler(move |ctx| update_user(state.clone(), ctx))
    };

    let remove = BaseEventHandler::builder()
        .validate_params(id_param())
        .success_status(StatusCode::NO_CONTENT)
        .handler(move |ctx| delete_user(state.clone(), ctx));

    Router::new()
        .route("/api/v1/users", get(list).post(create))
        .route(
            "/api/v1/users/{id}",
            get(show).patch(update).delete(remove),
        )
}
