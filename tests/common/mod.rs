use axum::body::Body;
use http_body_util::BodyExt;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use focuslog::journal::cooldown::format_timestamp;

/// Fresh in-memory database with all migrations applied.
///
/// A single connection, since every `:memory:` connection is its own database.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Create a user in the database and return (user_id, invite_code).
pub async fn insert_user(db: &SqlitePool, name: &str) -> (String, String) {
    let id = uuid::Uuid::new_v4().to_string();
    let invite_code = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(Utc::now());

    sqlx::query(
        "INSERT INTO users (id, name, invite_code, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(&invite_code)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await
    .expect("Failed to create test user");

    (id, invite_code)
}

/// Insert an entry row directly, bypassing the cooldown check. Returns its id.
pub async fn insert_entry_at(db: &SqlitePool, user_id: &str, task: &str, created_at: DateTime<Utc>) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    let at = format_timestamp(created_at);

    sqlx::query(
        "INSERT INTO entries (id, user_id, mood, task, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(3)
    .bind(task)
    .bind(&at)
    .bind(&at)
    .execute(db)
    .await
    .expect("Failed to create test entry");

    id
}

/// Shift every entry of `user_id` into the past so the cooldown has elapsed.
pub async fn backdate_entries(db: &SqlitePool, user_id: &str, minutes: i64) {
    let at = format_timestamp(Utc::now() - chrono::TimeDelta::minutes(minutes));
    sqlx::query("UPDATE entries SET created_at = ?, updated_at = ? WHERE user_id = ?")
        .bind(&at)
        .bind(&at)
        .bind(user_id)
        .execute(db)
        .await
        .expect("Failed to backdate entries");
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        let router = focuslog::build_app(pool.clone(), false)
            .await
            .expect("Failed to build app");

        Self { router, db: pool }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    pub async fn create_user(&self, name: &str) -> (String, String) {
        insert_user(&self.db, name).await
    }

    /// Log in as the given user and return the session cookie string.
    pub async fn login(&self, invite_code: &str) -> String {
        let body = serde_json::json!({ "invite_code": invite_code }).to_string();
        let resp = self.send_json("POST", "/login", &body, None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        resp.headers()
            .get("set-cookie")
            .expect("Login should set a session cookie")
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    /// Create a user, log in, and return (user_id, cookie).
    pub async fn signed_in(&self, name: &str) -> (String, String) {
        let (user_id, invite_code) = self.create_user(name).await;
        let cookie = self.login(&invite_code).await;
        (user_id, cookie)
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a request with a JSON body and an optional session cookie.
    pub async fn send_json(&self, method: &str, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Response {
        self.send_json("POST", uri, &body.to_string(), cookie).await
    }

    pub async fn patch_json(&self, uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Response {
        self.send_json("PATCH", uri, &body.to_string(), cookie).await
    }

    /// Send a DELETE request with an optional session cookie.
    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri).method("DELETE");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Read the full response body as JSON.
pub async fn body_json(resp: Response) -> serde_json::Value {
    let body = body_string(resp).await;
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("Body is not JSON ({e}): {body}"))
}
