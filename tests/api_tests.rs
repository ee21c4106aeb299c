// tests/api_tests.rs

use std::sync::Arc;

use backend::{
    config::Config, routes, seed, services::feedback::TemplateFeedback,
    sessions::SessionRegistry, state::AppState,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Each test gets its own in-memory SQLite database, migrated and seeded.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and a handle on the
/// test database for direct inspection and sabotage.
async fn spawn_app(quiz_time_limit_secs: i64) -> (String, SqlitePool) {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    seed::seed_reference_data(&pool)
        .await
        .expect("Failed to seed reference data");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        gemini_api_key: None,
        gemini_model: "gemini-3-flash-preview".to_string(),
        feedback_timeout_secs: 5,
        question_count: 3,
        quiz_time_limit_secs,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        feedback: Arc::new(TemplateFeedback),
        sessions: SessionRegistry::new(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a user and returns their auth token.
async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    name: &str,
    email: &str,
    role: &str,
) -> String {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": name,
            "email": email,
            "password": "password123",
            "role": role
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn health_check_404() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Sarah",
            "email": "not-an-email",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let payload = serde_json::json!({
        "name": "Sarah Connor",
        "email": "sarah@example.com",
        "password": "password123"
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_with_unknown_identity_fails() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "email": "ghost@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn quiz_routes_require_auth() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quiz/start", address))
        .json(&serde_json::json!({ "topic_id": "elec-01" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn full_quiz_flow_updates_mastery() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "John Doe", "john@example.com", "student").await;

    // Reference data is seeded.
    let topics: Vec<serde_json::Value> = client
        .get(format!("{}/api/topics", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!topics.is_empty());

    // First attempt.
    let first = run_quiz(&client, &address, &token, "elec-01").await;
    assert!(first["accuracy"].as_f64().unwrap() >= 0.0);
    assert!(first["accuracy"].as_f64().unwrap() <= 100.0);
    // First attempt: consistency = 70 + 1*5.
    assert_eq!(first["consistency"].as_f64().unwrap(), 75.0);
    let final_score = first["final_score"].as_i64().unwrap();
    assert!((0..=100).contains(&final_score));
    assert!(["Low", "Medium", "High"].contains(&first["level"].as_str().unwrap()));
    assert!(!first["feedback"].as_str().unwrap().is_empty());
    assert!(!first["next_step"].as_str().unwrap().is_empty());

    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = dashboard["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["topic_id"], "elec-01");
    assert_eq!(records[0]["attempts"], 1);
    assert_eq!(records[0]["score"], final_score);

    // Second attempt on the same topic replaces the record instead of
    // appending, and the attempt counter grows.
    let second = run_quiz(&client, &address, &token, "elec-01").await;
    assert_eq!(second["consistency"].as_f64().unwrap(), 80.0);

    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = dashboard["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["attempts"], 2);
    assert_eq!(
        records[0]["score"],
        second["final_score"].as_i64().unwrap()
    );
}

/// Starts a quiz, answers every question, submits, and returns the result.
async fn run_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    topic_id: &str,
) -> serde_json::Value {
    let start: serde_json::Value = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(token)
        .json(&serde_json::json!({ "topic_id": topic_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let session_id = start["session_id"].as_str().unwrap().to_string();
    let questions = start["questions"].as_array().unwrap();
    assert!(!questions.is_empty());
    // Correct answers are never exposed to the client.
    for q in questions {
        assert!(q.get("correct_answer").is_none());
        assert_eq!(q["options"].as_array().unwrap().len(), 4);
    }

    for i in 0..questions.len() {
        let answered = client
            .post(format!("{}/api/quiz/{}/answer", address, session_id))
            .bearer_auth(token)
            .json(&serde_json::json!({ "option": 0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(answered.status().as_u16(), 200);

        if i + 1 < questions.len() {
            let advanced = client
                .post(format!("{}/api/quiz/{}/next", address, session_id))
                .bearer_auth(token)
                .send()
                .await
                .unwrap();
            assert_eq!(advanced.status().as_u16(), 200);
        }
    }

    let submit = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(submit.status().as_u16(), 200);
    submit.json().await.unwrap()
}

#[tokio::test]
async fn navigation_guards_are_enforced() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "Kim", "kim@example.com", "student").await;

    let start: serde_json::Value = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "topic_id": "mech-01" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_str().unwrap();

    // Advancing without an answer is rejected.
    let advanced = client
        .post(format!("{}/api/quiz/{}/next", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(advanced.status().as_u16(), 400);

    // So is an option index outside the question.
    let answered = client
        .post(format!("{}/api/quiz/{}/answer", address, session_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "option": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(answered.status().as_u16(), 400);

    // Unknown topic cannot start a quiz.
    let missing = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "topic_id": "no-such-topic" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn completed_session_cannot_be_submitted_again() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "Ana", "ana@example.com", "student").await;

    let start: serde_json::Value = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "topic_id": "alg-01" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_str().unwrap().to_string();
    let count = start["questions"].as_array().unwrap().len();

    for i in 0..count {
        client
            .post(format!("{}/api/quiz/{}/answer", address, session_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "option": 1 }))
            .send()
            .await
            .unwrap();
        if i + 1 < count {
            client
                .post(format!("{}/api/quiz/{}/next", address, session_id))
                .bearer_auth(&token)
                .send()
                .await
                .unwrap();
        }
    }

    let first = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 200);

    // The session is terminal and gone from the registry.
    let second = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 404);
}

#[tokio::test]
async fn failed_submission_leaves_the_session_retryable() {
    let (address, pool) = spawn_app(300).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "Ray", "ray@example.com", "student").await;

    let start: serde_json::Value = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "topic_id": "alg-01" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_str().unwrap().to_string();
    let count = start["questions"].as_array().unwrap().len();

    for i in 0..count {
        client
            .post(format!("{}/api/quiz/{}/answer", address, session_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "option": 0 }))
            .send()
            .await
            .unwrap();
        if i + 1 < count {
            client
                .post(format!("{}/api/quiz/{}/next", address, session_id))
                .bearer_auth(&token)
                .send()
                .await
                .unwrap();
        }
    }

    // Pull persistence out from under the submission pipeline.
    sqlx::query("ALTER TABLE mastery_records RENAME TO mastery_records_hidden")
        .execute(&pool)
        .await
        .unwrap();

    let failed = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status().as_u16(), 500);

    sqlx::query("ALTER TABLE mastery_records_hidden RENAME TO mastery_records")
        .execute(&pool)
        .await
        .unwrap();

    // The session rolled back instead of sticking in a submitting state, so
    // the same submit succeeds once the database recovers.
    let retried = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(retried.status().as_u16(), 200);

    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = dashboard["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["topic_id"], "alg-01");
    assert_eq!(records[0]["attempts"], 1);
}

#[tokio::test]
async fn corrupt_mastery_rows_read_as_absent() {
    let (address, pool) = spawn_app(300).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "Ivy", "ivy@example.com", "student").await;

    // A row whose level column holds junk, as if hand-edited.
    sqlx::query(
        r#"
        INSERT INTO mastery_records (student_id, topic_id, score, level, attempts, last_updated)
        VALUES (1, 'alg-01', 55, 'Banana', 4, '2026-01-01T00:00:00Z')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    // The dashboard skips the row instead of failing the read.
    let response = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let dashboard: serde_json::Value = response.json().await.unwrap();
    assert!(dashboard["records"].as_array().unwrap().is_empty());
    assert_eq!(dashboard["topics_attempted"], 0);

    // Good rows on other topics are unaffected.
    run_quiz(&client, &address, &token, "ml-01").await;
    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = dashboard["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["topic_id"], "ml-01");

    // Submitting on the corrupt topic treats the junk row as no history:
    // first-attempt consistency, and the upsert overwrites it with a clean row.
    let result = run_quiz(&client, &address, &token, "alg-01").await;
    assert_eq!(result["consistency"].as_f64().unwrap(), 75.0);

    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn countdown_expiry_submits_exactly_once() {
    // 1-second limit: the countdown fires the auto-submit on its own.
    let (address, _) = spawn_app(1).await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "Tim", "tim@example.com", "student").await;

    let start: serde_json::Value = client
        .post(format!("{}/api/quiz/start", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "topic_id": "aero-01" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = start["session_id"].as_str().unwrap().to_string();

    // No answers recorded; just wait past the limit.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    // The timeout submission persisted a record...
    let dashboard: serde_json::Value = client
        .get(format!("{}/api/dashboard/me", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = dashboard["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["topic_id"], "aero-01");
    assert_eq!(records[0]["attempts"], 1);

    // ...and the session is finished: a late manual submit cannot fire again.
    let late = client
        .post(format!("{}/api/quiz/{}/submit", address, session_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(late.status().as_u16(), 404);
}

#[tokio::test]
async fn class_analytics_is_teacher_only() {
    let (address, _) = spawn_app(300).await;
    let client = reqwest::Client::new();

    let student_token =
        register_and_login(&client, &address, "Stu Dent", "stu@example.com", "student").await;
    let teacher_token =
        register_and_login(&client, &address, "Tea Cher", "tea@example.com", "teacher").await;

    let forbidden = client
        .get(format!("{}/api/dashboard/class", address))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    // Student submits one quiz so there is something to aggregate.
    run_quiz(&client, &address, &student_token, "civil-01").await;

    let analytics: Vec<serde_json::Value> = client
        .get(format!("{}/api/dashboard/class", address))
        .bearer_auth(&teacher_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(analytics.len(), 1);
    assert_eq!(analytics[0]["name"], "Stu Dent");
    assert_eq!(analytics[0]["total_attempts"], 1);
    assert!(analytics[0]["average_score"].as_i64().unwrap() <= 100);
    assert!(analytics[0].get("at_risk").is_some());
    assert_eq!(analytics[0]["weakest_topic"], "Structural Analysis");
}
