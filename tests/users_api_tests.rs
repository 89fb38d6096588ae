//! End-to-end tests for the users demo API
//!
//! These tests verify that:
//! - The list endpoint paginates, searches, filters and sorts
//! - Create, update and delete go through the derived schemas
//! - Errors come back with the documented status codes and bodies

#[path = "../demos/users_api/users.rs"]
#[allow(dead_code)]
mod users;

use axum::http::StatusCode;
use axum_test::TestServer;
use crudkit::prelude::*;
use users::{UserStore, UsersState};

const CONFIG: &str = r#"
collections: [users]
config:
  users:
    visible_fields: [id, name, email]
    validation_rules:
      email:
        - rule: email
          message: Invalid email address
table_query:
  default_page_size: 10
  max_page_size: 100
"#;

async fn seeded_store() -> UserStore {
    let store = UserStore::new(users::COLLECTION, "id");
    for (name, email) in [
        (Some("Ada Lovelace"), Some("ada@example.com")),
        (Some("Grace Hopper"), Some("grace@navy.mil")),
        (Some("Linus Torvalds"), Some("linus@example.com")),
        (None, Some("anonymous@example.org")),
    ] {
        let values = json!({
            "name": name,
            "email": email,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z",
        });
        let Value::Object(values) = values else {
            unreachable!()
        };
        store.insert(values).await.expect("seed insert should succeed");
    }
    store
}

async fn server() -> TestServer {
    let config = CrudConfig::from_yaml_str(CONFIG).expect("config should parse");
    let state = UsersState::new(&config, seeded_store().await).expect("state should build");
    let app = ServerBuilder::new()
        .with_config(config)
        .with_routes(users::routes(state))
        .build()
        .expect("build should succeed");
    TestServer::try_new(app).expect("Failed to create test server")
}

fn names(body: &Value) -> Vec<Value> {
    body["data"]
        .as_array()
        .expect("data should be an array")
        .iter()
        .map(|user| user["name"].clone())
        .collect()
}

mod list_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_returns_data_and_count() {
        let server = server().await;

        let response = server.get("/api/v1/users").await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["count"], 4);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["data"][0]["id"], 1);
        assert_eq!(body["data"][0]["createdAt"], "2024-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("page", "2")
            .add_query_param("pageSize", "3")
            .await
            .json::<Value>();

        assert_eq!(body["count"], 4);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["data"][0]["id"], 4);
    }

    #[tokio::test]
    async fn test_list_search_is_pushed_down_and_case_insensitive() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("search", "  EXAMPLE.com ")
            .await
            .json::<Value>();

        assert_eq!(body["count"], 2);
        assert_eq!(names(&body), vec![json!("Ada Lovelace"), json!("Linus Torvalds")]);
    }

    #[tokio::test]
    async fn test_list_search_matches_id() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("search", "3")
            .await
            .json::<Value>();

        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["name"], "Linus Torvalds");
    }

    #[tokio::test]
    async fn test_list_email_filter() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("email", "grace@navy.mil")
            .await
            .json::<Value>();

        assert_eq!(body["count"], 1);
        assert_eq!(names(&body), vec![json!("Grace Hopper")]);
    }

    #[tokio::test]
    async fn test_list_sorts_with_nulls_last() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("sortBy", "name")
            .add_query_param("sortDir", "desc")
            .await
            .json::<Value>();

        assert_eq!(
            names(&body),
            vec![
                json!("Linus Torvalds"),
                json!("Grace Hopper"),
                json!("Ada Lovelace"),
                Value::Null,
            ]
        );
    }

    #[tokio::test]
    async fn test_list_rejects_zero_page_size() {
        let server = server().await;

        let response = server
            .get("/api/v1/users")
            .add_query_param("pageSize", "0")
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["code"], "INVALID_PAGE_SIZE");
    }

    #[tokio::test]
    async fn test_list_invalid_page_falls_back_to_first() {
        let server = server().await;

        let body = server
            .get("/api/v1/users")
            .add_query_param("page", "abc")
            .add_query_param("pageSize", "2")
            .await
            .json::<Value>();

        assert_eq!(body["data"][0]["id"], 1);
    }
}

mod item_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_user() {
        let server = server().await;

        let response = server.get("/api/v1/users/2").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["email"], "grace@navy.mil");
    }

    #[tokio::test]
    async fn test_get_missing_user_is_404() {
        let server = server().await;

        let response = server.get("/api/v1/users/99").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "ENTITY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_with_invalid_id_is_400() {
        let server = server().await;

        let response = server.get("/api/v1/users/abc").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body = response.json::<Value>();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(
            body["details"]["issues"],
            json!([{ "path": "id", "message": "Invalid ID parameter" }])
        );
    }

    #[tokio::test]
    async fn test_create_user() {
        let server = server().await;

        let response = server
            .post("/api/v1/users")
            .json(&json!({ "name": "Alan Turing", "email": "alan@example.com", "id": 500 }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body = response.json::<Value>();
        assert_eq!(body["id"], 5);
        assert_eq!(body["name"], "Alan Turing");
        assert!(body["createdAt"].as_str().is_some_and(|s| s.ends_with('Z')));
        assert!(body["updatedAt"].is_string());

        let count = server.get("/api/v1/users").await.json::<Value>()["count"].clone();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_create_normalizes_timestamps() {
        let server = server().await;

        let body = server
            .post("/api/v1/users")
            .json(&json!({ "name": "Edsger", "createdAt": "2023-05-06 07:08:09" }))
            .await
            .json::<Value>();

        assert_eq!(body["createdAt"], "2023-05-06T07:08:09.000Z");
        assert_eq!(body["email"], Value::Null);
    }

    #[tokio::test]
    async fn test_create_applies_configured_rules() {
        let server = server().await;

        let response = server
            .post("/api/v1/users")
            .json(&json!({ "name": "Mallory", "email": "not-an-email" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["details"]["issues"],
            json!([{ "path": "email", "message": "Invalid email address" }])
        );

        let count = server.get("/api/v1/users").await.json::<Value>()["count"].clone();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_types() {
        let server = server().await;

        let response = server
            .post("/api/v1/users")
            .json(&json!({ "name": 42 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let issues = response.json::<Value>()["details"]["issues"].clone();
        assert_eq!(issues[0]["path"], "name");
    }

    #[tokio::test]
    async fn test_create_with_malformed_json_is_400() {
        let server = server().await;

        let response = server
            .post("/api/v1/users")
            .content_type("application/json")
            .text("{ not json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_user() {
        let server = server().await;

        let response = server
            .patch("/api/v1/users/1")
            .json(&json!({ "name": "Augusta Ada King" }))
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["name"], "Augusta Ada King");
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["createdAt"], "2024-01-01T00:00:00.000Z");
        assert_ne!(body["updatedAt"], "2024-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_patch_cannot_change_id() {
        let server = server().await;

        let response = server
            .patch("/api/v1/users/1")
            .json(&json!({ "id": 7 }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["details"]["issues"][0]["path"], "id");
        assert_eq!(body["details"]["issues"][0]["message"], "'id' cannot be changed");

        server.get("/api/v1/users/1").await.assert_status_ok();
        server.get("/api/v1/users/7").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_missing_user_is_404() {
        let server = server().await;

        let response = server
            .patch("/api/v1/users/42")
            .json(&json!({ "name": "Nobody" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let server = server().await;

        let response = server.delete("/api/v1/users/3").await;
        response.assert_status(StatusCode::NO_CONTENT);
        assert!(response.text().is_empty());

        server
            .get("/api/v1/users/3")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/api/v1/users/3")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_health_lists_users_collection() {
    let server = server().await;

    let body = server.get("/health").await.json::<Value>();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["collections"], json!(["users"]));
}
