pub mod models;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};

use shelf_auth::{require_auth, AuthContext, AuthGate};
use shelf_http::error::AppError;
use shelf_kernel::{InitCtx, Module};

use models::{Book, NewBook, UpdateBook};
use store::{BookStore, StoreError};

/// Books module: owner-scoped CRUD behind the authentication gate.
pub struct BooksModule {
    store: Arc<BookStore>,
    gate: Arc<AuthGate>,
}

impl BooksModule {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self {
            store: Arc::new(BookStore::new()),
            gate,
        }
    }

    /// Handle to the module's store (used by tests and diagnostics).
    pub fn store(&self) -> Arc<BookStore> {
        self.store.clone()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route(
                "/{id}",
                get(get_book).put(update_book).delete(delete_book),
            )
            // The gate runs before every handler; unauthenticated requests
            // never reach the store.
            .route_layer(middleware::from_fn_with_state(
                self.gate.clone(),
                require_auth,
            ))
            .with_state(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List the authenticated user's books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Books owned by the caller",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {
                                                "$ref": "#/components/schemas/Book"
                                            }
                                        }
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or invalid bearer token",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "500": {
                                "description": "Internal server error",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Add a book for the authenticated user",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "$ref": "#/components/schemas/NewBook"
                                    }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book created",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/Book"
                                        }
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or invalid bearer token",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "500": {
                                "description": "Internal server error",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Fetch one of the authenticated user's books",
                        "tags": ["Books"],
                        "parameters": [{
                            "in": "path",
                            "name": "id",
                            "required": true,
                            "schema": {"type": "integer"}
                        }],
                        "responses": {
                            "200": {
                                "description": "The requested book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/Book"
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No such book for this user",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "put": {
                        "summary": "Update one of the authenticated user's books",
                        "tags": ["Books"],
                        "parameters": [{
                            "in": "path",
                            "name": "id",
                            "required": true,
                            "schema": {"type": "integer"}
                        }],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "$ref": "#/components/schemas/UpdateBook"
                                    }
                                }
                            }
                        },
                        "responses": {
                            "200": {
                                "description": "Book updated",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/Book"
                                        }
                                    }
                                }
                            },
                            "403": {
                                "description": "Caller does not own this book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No such book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "delete": {
                        "summary": "Delete one of the authenticated user's books",
                        "tags": ["Books"],
                        "parameters": [{
                            "in": "path",
                            "name": "id",
                            "required": true,
                            "schema": {"type": "integer"}
                        }],
                        "responses": {
                            "204": {
                                "description": "Book deleted"
                            },
                            "403": {
                                "description": "Caller does not own this book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            },
                            "404": {
                                "description": "No such book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "$ref": "#/components/schemas/ErrorResponse"
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "integer",
                                "description": "Store-assigned identifier"
                            },
                            "title": {
                                "type": "string",
                                "nullable": true
                            },
                            "author": {
                                "type": "string",
                                "nullable": true
                            },
                            "year": {
                                "type": "integer",
                                "nullable": true
                            },
                            "ownerId": {
                                "type": "string",
                                "description": "Subject identifier of the owning user"
                            }
                        },
                        "required": ["id", "ownerId"]
                    },
                    "NewBook": {
                        "type": "object",
                        "properties": {
                            "title": {"type": "string"},
                            "author": {"type": "string"},
                            "year": {"type": "integer"}
                        }
                    },
                    "UpdateBook": {
                        "type": "object",
                        "description": "Omitted keys leave fields unchanged; explicit null clears them",
                        "properties": {
                            "title": {"type": "string", "nullable": true},
                            "author": {"type": "string", "nullable": true},
                            "year": {"type": "integer", "nullable": true}
                        }
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// List the caller's books
async fn list_books(
    State(store): State<Arc<BookStore>>,
    ctx: AuthContext,
) -> Json<Vec<Book>> {
    Json(store.list_owned(ctx.subject()).await)
}

/// Fetch a single book by id
///
/// A record owned by someone else reads as not found, so callers cannot
/// probe for other users' ids.
async fn get_book(
    State(store): State<Arc<BookStore>>,
    ctx: AuthContext,
    Path(id): Path<u64>,
) -> Result<Json<Book>, AppError> {
    let book = store
        .get(id)
        .await
        .filter(|book| book.owner_id == ctx.subject())
        .ok_or_else(|| AppError::not_found(format!("book {} not found", id)))?;

    Ok(Json(book))
}

/// Create a book owned by the caller
async fn create_book(
    State(store): State<Arc<BookStore>>,
    ctx: AuthContext,
    Json(body): Json<NewBook>,
) -> (StatusCode, Json<Book>) {
    let book = store.create(body, ctx.subject()).await;

    tracing::info!(module = "books", id = book.id, "book created");
    (StatusCode::CREATED, Json(book))
}

/// Update the mutable fields of a book the caller owns
async fn update_book(
    State(store): State<Arc<BookStore>>,
    ctx: AuthContext,
    Path(id): Path<u64>,
    Json(patch): Json<UpdateBook>,
) -> Result<Json<Book>, AppError> {
    let book = store
        .update(id, ctx.subject(), patch)
        .await
        .map_err(|err| ownership_error(err, id))?;

    Ok(Json(book))
}

/// Delete a book the caller owns
async fn delete_book(
    State(store): State<Arc<BookStore>>,
    ctx: AuthContext,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    store
        .remove(id, ctx.subject())
        .await
        .map_err(|err| ownership_error(err, id))?;

    tracing::info!(module = "books", id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn ownership_error(err: StoreError, id: u64) -> AppError {
    match err {
        StoreError::NotFound => AppError::not_found(format!("book {} not found", id)),
        StoreError::NotOwner => AppError::forbidden("you do not own this book"),
    }
}

/// Create a new instance of the books module
pub fn create_module(gate: Arc<AuthGate>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use shelf_auth::{AuthError, SessionStore, TokenVerifier};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Accepts any bearer token and uses it verbatim as the subject, so a
    /// request with `Authorization: Bearer u1` runs as subject `u1`.
    struct EchoVerifier;

    #[async_trait::async_trait]
    impl TokenVerifier for EchoVerifier {
        async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
            Ok(AuthContext::new(token))
        }
    }

    fn test_module() -> BooksModule {
        let gate = Arc::new(AuthGate::new(
            Arc::new(EchoVerifier),
            Arc::new(SessionStore::new(Duration::from_secs(3600))),
        ));
        BooksModule::new(gate)
    }

    fn request(method: Method, uri: &str, subject: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(subject) = subject {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", subject));
        }

        match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthenticated_request_never_reaches_store() {
        let module = test_module();
        let app = module.routes();

        let response = app
            .oneshot(request(
                Method::POST,
                "/",
                None,
                Some(json!({"title": "Dune", "author": "Herbert"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(module.store().len().await, 0);
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let module = test_module();
        let app = module.routes();

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune", "author": "Herbert", "year": 1965})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["ownerId"], "u1");

        let response = app
            .oneshot(request(Method::GET, "/1", Some("u1"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let fetched = json_body(response).await;
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_permissive_create_stores_nulls() {
        let module = test_module();
        let app = module.routes();

        let response = app
            .oneshot(request(Method::POST, "/", Some("u1"), Some(json!({}))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["title"], Value::Null);
        assert_eq!(created["author"], Value::Null);
        assert_eq!(created["ownerId"], "u1");
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_the_caller() {
        let module = test_module();
        let app = module.routes();

        app.clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune", "author": "Herbert"})),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/", Some("u1"), None))
            .await
            .unwrap();
        let mine = json_body(response).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["title"], "Dune");

        let response = app
            .oneshot(request(Method::GET, "/", Some("u2"), None))
            .await
            .unwrap();
        let theirs = json_body(response).await;
        assert!(theirs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_id_returns_404() {
        let module = test_module();
        let app = module.routes();

        let response = app
            .oneshot(request(Method::GET, "/999", Some("u1"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_another_users_book_reads_as_404() {
        let module = test_module();
        let app = module.routes();

        app.clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune"})),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(request(Method::GET, "/1", Some("u2"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden_and_leaves_record() {
        let module = test_module();
        let app = module.routes();

        app.clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune", "author": "Herbert"})),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/1",
                Some("u2"),
                Some(json!({"title": "Hijacked"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(Method::GET, "/1", Some("u1"), None))
            .await
            .unwrap();
        let book = json_body(response).await;
        assert_eq!(book["title"], "Dune");
    }

    #[tokio::test]
    async fn test_update_merges_and_ignores_owner_field() {
        let module = test_module();
        let app = module.routes();

        app.clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune", "author": "Herbert", "year": 1965})),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(request(
                Method::PUT,
                "/1",
                Some("u1"),
                Some(json!({"title": "Dune Messiah", "year": null, "ownerId": "u2"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let book = json_body(response).await;
        assert_eq!(book["title"], "Dune Messiah");
        assert_eq!(book["author"], "Herbert"); // omitted key: unchanged
        assert_eq!(book["year"], Value::Null); // explicit null: cleared
        assert_eq!(book["ownerId"], "u1"); // never updatable
    }

    #[tokio::test]
    async fn test_delete_flow() {
        let module = test_module();
        let app = module.routes();

        app.clone()
            .oneshot(request(
                Method::POST,
                "/",
                Some("u1"),
                Some(json!({"title": "Dune"})),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/1", Some("u2"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(module.store().len().await, 1);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/1", Some("u1"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/1", Some("u1"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(Method::DELETE, "/999", Some("u1"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_openapi_fragment_covers_all_routes() {
        let module = test_module();
        let spec = module.openapi().unwrap();

        let root = &spec["paths"]["/"];
        assert!(root.get("get").is_some());
        assert!(root.get("post").is_some());

        let by_id = &spec["paths"]["/{id}"];
        assert!(by_id.get("get").is_some());
        assert!(by_id.get("put").is_some());
        assert!(by_id.get("delete").is_some());

        assert!(spec["components"]["schemas"].get("Book").is_some());
    }
}
