// tests/common/mod.rs

#![allow(dead_code)]

use assignment_backend::{config::Config, db, routes, state::AppState};
use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    /// Database file removed when the app is dropped.
    db_file: Option<PathBuf>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(path) = &self.db_file {
            for suffix in ["", "-wal", "-shm", "-journal"] {
                let mut file = path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }
}

/// Spawns the app on a random port, backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    serve(pool, "sqlite::memory:".to_string(), None).await
}

/// Spawns the app on a temporary database file with a multi-connection pool,
/// so concurrent requests really run on separate connections.
pub async fn spawn_app_on_disk() -> TestApp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!(
        "assignment_backend_test_{}_{}.db",
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite://{}?mode=rwc", path.display());

    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open database file");
    serve(pool, database_url, Some(path)).await
}

async fn serve(pool: SqlitePool, database_url: String, db_file: Option<PathBuf>) -> TestApp {
    db::migrate(&pool).await.expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        log_dir: "logs".to_string(),
    };

    let app = routes::create_router(AppState { pool, config });

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        db_file,
    }
}

/// A logged-in user.
pub struct TestUser {
    pub id: i64,
    pub token: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, role: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/users/register"))
            .json(&json!({ "username": username, "password": "password123", "role": role }))
            .send()
            .await
            .expect("Register failed")
    }

    pub async fn login(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/users/login"))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .expect("Login failed")
    }

    pub async fn user(&self, username: &str, role: &str) -> TestUser {
        assert_eq!(self.register(username, role).await.status().as_u16(), 201);
        let body: Value = self.login(username).await.json().await.unwrap();
        TestUser {
            id: body["data"]["id"].as_i64().expect("id not found"),
            token: body["data"]["accessToken"]
                .as_str()
                .expect("Token not found")
                .to_string(),
        }
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, user: &TestUser, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(&user.token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap()
    }

    /// Creates an assignment and returns its JSON body.
    pub async fn create_assignment(&self, lecturer: &TestUser, body: &Value) -> Value {
        let response = self.post(lecturer, "/api/assignments", body).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }
}

/// RFC 3339 timestamp `minutes` away from now.
pub fn minutes_from_now(minutes: i64) -> String {
    (Utc::now() + Duration::minutes(minutes)).to_rfc3339()
}

pub fn multiple_choice(question: &str, correct: i64) -> Value {
    json!({
        "kind": "multipleChoice",
        "question": question,
        "options": ["TCP", "UDP", "ICMP", "ARP"],
        "correctAnswer": correct
    })
}

pub fn free_text(title: &str, max_score: i64) -> Value {
    json!({
        "kind": "freeText",
        "title": title,
        "description": "Answer in a few sentences.",
        "maxScore": max_score
    })
}

/// Assignment payload with the window `[start, end]` given in minutes from now.
pub fn assignment_body(start: i64, end: i64, questions: Vec<Value>) -> Value {
    json!({
        "courseName": "Computer Networks",
        "title": "Transport layer quiz",
        "description": "Covers TCP, UDP and congestion control.",
        "startDate": minutes_from_now(start),
        "endDate": minutes_from_now(end),
        "questions": questions
    })
}

/// Submission payload answering each question with the given value.
///
/// Numbers become `studentAnswer`, strings become `answerText`.
pub fn submission_body(assignment: &Value, values: &[Value]) -> Value {
    let assignment_id = assignment["id"].as_i64().unwrap();
    let answers: Vec<Value> = assignment["questions"]
        .as_array()
        .unwrap()
        .iter()
        .zip(values)
        .map(|(question, value)| {
            let mut answer = json!({
                "questionId": question["id"],
                "assignmentId": assignment_id
            });
            if value.is_string() {
                answer["answerText"] = value.clone();
            } else {
                answer["studentAnswer"] = value.clone();
            }
            answer
        })
        .collect();
    json!({ "answers": answers })
}
