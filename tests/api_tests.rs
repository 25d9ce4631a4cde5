// tests/api_tests.rs

use std::net::SocketAddr;
use std::str::FromStr;

use quizer_backend::{config::Config, routes, state::AppState, utils::mailer::Mailer};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Helper to spawn the app on a random port against a fresh in-memory
/// database. Returns the base URL and the pool, so tests can seed data and
/// read the verification codes the mailer would have sent.
async fn spawn_app() -> (String, SqlitePool) {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    // A single never-expiring connection keeps the in-memory database
    // alive for the whole test.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_key: Some(TEST_ADMIN_KEY.to_string()),
        admin_email: None,
        admin_username: None,
        admin_password: None,
        smtp_server: None,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
        refill_interval_secs: 4 * 60 * 60,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        mailer: Mailer::disabled(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        // ConnectInfo is required by the rate limiter on the auth routes.
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (address, pool)
}

fn unique_user() -> (String, String) {
    let tag = &uuid::Uuid::new_v4().to_string()[..8];
    (format!("u_{}", tag), format!("u_{}@example.com", tag))
}

/// Registers, reads the verification code from the database and verifies.
/// Returns (token, email).
async fn register_and_verify(
    client: &reqwest::Client,
    address: &str,
    pool: &SqlitePool,
) -> (String, String) {
    let (username, email) = unique_user();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": "password123",
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    let code = sqlx::query_scalar::<_, String>("SELECT code_verify FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await
        .expect("No verification code stored");

    let verify_resp = client
        .post(format!("{}/api/auth/verify", address))
        .json(&serde_json::json!({ "email": email, "code": code }))
        .send()
        .await
        .expect("Verify failed");
    assert_eq!(verify_resp.status().as_u16(), 200);

    let body: serde_json::Value = verify_resp.json().await.unwrap();
    let token = body["access_token"].as_str().expect("Token not found");

    (token.to_string(), email)
}

/// Seeds one subject with one quiz and two questions. Returns
/// (quiz_id, [(question_id, correct_option_id, wrong_option_id); 2]).
async fn seed_quiz(pool: &SqlitePool, gems_reward: i64) -> (i64, Vec<(i64, i64, i64)>) {
    let subject_id =
        sqlx::query_scalar::<_, i64>("INSERT INTO subjects (title) VALUES ('Math') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();

    let quiz_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes (subject_id, title, gems_reward) VALUES (?, 'Algebra', ?) RETURNING id",
    )
    .bind(subject_id)
    .bind(gems_reward)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut questions = Vec::new();
    for i in 0..2 {
        let question_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO questions (quiz_id, question_text) VALUES (?, ?) RETURNING id",
        )
        .bind(quiz_id)
        .bind(format!("Question {}", i))
        .fetch_one(pool)
        .await
        .unwrap();

        let mut option_ids = Vec::new();
        for text in ["right", "wrong"] {
            let option_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO question_options (question_id, option_text) VALUES (?, ?) RETURNING id",
            )
            .bind(question_id)
            .bind(text)
            .fetch_one(pool)
            .await
            .unwrap();
            option_ids.push(option_id);
        }

        sqlx::query("UPDATE questions SET correct_option_id = ? WHERE id = ?")
            .bind(option_ids[0])
            .bind(question_id)
            .execute(pool)
            .await
            .unwrap();

        questions.push((question_id, option_ids[0], option_ids[1]));
    }

    (quiz_id, questions)
}

#[tokio::test]
async fn health_check_404() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short, email malformed
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": "yo",
            "email": "not-an-email",
            "password": "password123",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn home_requires_auth() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/home", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn register_verify_login_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, email) = unique_user();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": "password123",
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    // Login before verification must fail: the account is still pending.
    let premature = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Login request failed");
    assert_eq!(premature.status().as_u16(), 401);

    // A wrong code is rejected.
    let bad_code = client
        .post(format!("{}/api/auth/verify", address))
        .json(&serde_json::json!({ "email": email, "code": "000000x" }))
        .send()
        .await
        .expect("Verify request failed");
    assert_eq!(bad_code.status().as_u16(), 400);

    let code = sqlx::query_scalar::<_, String>("SELECT code_verify FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .expect("No verification code stored");

    let verify_resp = client
        .post(format!("{}/api/auth/verify", address))
        .json(&serde_json::json!({ "email": email, "code": code }))
        .send()
        .await
        .expect("Verify failed");
    assert_eq!(verify_resp.status().as_u16(), 200);

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Login failed");
    assert_eq!(login_resp.status().as_u16(), 200);

    let body: serde_json::Value = login_resp.json().await.unwrap();
    let token = body["access_token"].as_str().expect("Token not found");
    assert_eq!(body["token_type"], "bearer");

    // New accounts start with 10 stars and 5 gems.
    let home: serde_json::Value = client
        .get(format!("{}/api/home", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Home failed")
        .json()
        .await
        .unwrap();

    assert_eq!(home["username"], username);
    assert_eq!(home["stars"], 10);
    assert_eq!(home["gems"], 5);
    assert!(home["subjects"].is_array());
}

#[tokio::test]
async fn registering_twice_resends_a_code() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (username, email) = unique_user();

    let payload = serde_json::json!({
        "username": username,
        "email": email,
        "password": "password123",
    });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let first_code =
        sqlx::query_scalar::<_, String>("SELECT code_verify FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&pool)
            .await
            .unwrap();

    // Retrying an interrupted signup succeeds and rotates the code.
    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 200);

    let second_code =
        sqlx::query_scalar::<_, String>("SELECT code_verify FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&pool)
            .await
            .unwrap();

    // Both codes exist; the stored one is the latest issue.
    assert_eq!(second_code.len(), first_code.len());

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn quiz_play_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let (quiz_id, questions) = seed_quiz(&pool, 7).await;
    let (token, _email) = register_and_verify(&client, &address, &pool).await;
    let auth = format!("Bearer {}", token);

    // Initial payload: no answers yet, answer key hidden.
    let payload: serde_json::Value = client
        .get(format!("{}/api/quiz/{}", address, quiz_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(payload["subject"], "Math");
    assert_eq!(payload["completed"], false);
    let first_q = &payload["questions"][questions[0].0.to_string()];
    assert_eq!(first_q["user_answered"], false);
    assert!(first_q["correct_option_id"].is_null());

    // Correct answer on question 1: +1 star on top of the starting 10.
    let (q1, q1_correct, _) = questions[0];
    let submit: serde_json::Value = client
        .post(format!("{}/api/quiz/{}/answer", address, quiz_id))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "question_id": q1, "selected_option_id": q1_correct }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submit["ok"], true);
    assert_eq!(submit["is_correct"], true);
    assert_eq!(submit["stars_delta"], 1);
    assert_eq!(submit["current_stars"], 11);

    // Same question again is refused and reveals the key.
    let dup = client
        .post(format!("{}/api/quiz/{}/answer", address, quiz_id))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "question_id": q1, "selected_option_id": q1_correct }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status().as_u16(), 409);
    let dup_body: serde_json::Value = dup.json().await.unwrap();
    assert_eq!(dup_body["error"], "already_answered");
    assert_eq!(dup_body["correct_option_id"], q1_correct);

    // Wrong answer on question 2 costs a star.
    let (q2, _, q2_wrong) = questions[1];
    let submit: serde_json::Value = client
        .post(format!("{}/api/quiz/{}/answer", address, quiz_id))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "question_id": q2, "selected_option_id": q2_wrong }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submit["is_correct"], false);
    assert_eq!(submit["stars_delta"], -1);
    assert_eq!(submit["current_stars"], 10);

    // 1 of 2 equally weighted questions is exactly the pass mark.
    let finish: serde_json::Value = client
        .post(format!("{}/api/quiz/{}/finish", address, quiz_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(finish["score_percent"], 50);
    assert_eq!(finish["passed"], true);
    assert_eq!(finish["gems_awarded"], 7);

    // Finalization is terminal.
    let again = client
        .post(format!("{}/api/quiz/{}/finish", address, quiz_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);
    let again_body: serde_json::Value = again.json().await.unwrap();
    assert_eq!(again_body["error"], "already_completed");
    assert_eq!(again_body["score_percent"], 50);
    assert_eq!(again_body["gems_awarded"], 7);

    // A passed attempt cannot be reset.
    let reset = client
        .put(format!("{}/api/quiz/{}/reset", address, quiz_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status().as_u16(), 409);
    let reset_body: serde_json::Value = reset.json().await.unwrap();
    assert_eq!(reset_body["error"], "user_passed");

    // The payload now reveals the answer key and the summary.
    let payload: serde_json::Value = client
        .get(format!("{}/api/quiz/{}", address, quiz_id))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(payload["completed"], true);
    assert_eq!(payload["score_percent"], 50);
    let first_q = &payload["questions"][q1.to_string()];
    assert_eq!(first_q["user_answered"], true);
    assert_eq!(first_q["correct_option_id"], q1_correct);
}

#[tokio::test]
async fn store_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, _email) = register_and_verify(&client, &address, &pool).await;
    let auth = format!("Bearer {}", token);

    let catalog: serde_json::Value = client
        .get(format!("{}/api/store/packages", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(catalog["packages"].as_array().unwrap().len(), 6);

    // small: 2 stars for 1 gem, on top of the starting 10/5.
    let purchase: serde_json::Value = client
        .post(format!("{}/api/store/buy/small", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(purchase["ok"], true);
    assert_eq!(purchase["stars"], 12);
    assert_eq!(purchase["gems"], 4);
    assert_eq!(purchase["purchased_package"], "small");

    // legendary costs 69 gems, far beyond the remaining 4.
    let broke = client
        .post(format!("{}/api/store/buy/legendary", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(broke.status().as_u16(), 409);
    let broke_body: serde_json::Value = broke.json().await.unwrap();
    assert_eq!(broke_body["error"], "not_enough_gems");
    assert_eq!(broke_body["stars"], 12);
    assert_eq!(broke_body["gems"], 4);

    let unknown = client
        .post(format!("{}/api/store/buy/mega", address))
        .header("Authorization", &auth)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 400);
}

#[tokio::test]
async fn admin_promotion_and_crud() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, email) = register_and_verify(&client, &address, &pool).await;
    let auth = format!("Bearer {}", token);

    // A plain user cannot touch admin CRUD.
    let denied = client
        .post(format!("{}/api/admin/subjects", address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "title": "Biology" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    // Promotion needs the shared key.
    let bad_key = client
        .post(format!("{}/api/admin/promote", address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "email": email, "admin_key": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_key.status().as_u16(), 403);

    let promoted = client
        .post(format!("{}/api/admin/promote", address))
        .header("Authorization", &auth)
        .json(&serde_json::json!({ "email": email, "admin_key": TEST_ADMIN_KEY }))
        .send()
        .await
        .unwrap();
    assert_eq!(promoted.status().as_u16(), 200);

    // The old token still carries the user role; a fresh login picks up admin.
    let relogin: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin_auth = format!("Bearer {}", relogin["access_token"].as_str().unwrap());

    let subject: serde_json::Value = client
        .post(format!("{}/api/admin/subjects", address))
        .header("Authorization", &admin_auth)
        .json(&serde_json::json!({ "title": "Biology" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(subject["ok"], true);
    let subject_id = subject["id"].as_i64().unwrap();

    let quiz: serde_json::Value = client
        .post(format!("{}/api/admin/quizzes", address))
        .header("Authorization", &admin_auth)
        .json(&serde_json::json!({
            "subject_id": subject_id,
            "title": "Cells",
            "gems_reward": 3,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quiz["ok"], true);
    let quiz_id = quiz["id"].as_i64().unwrap();

    // Authored text is sanitized before it is stored.
    let question: serde_json::Value = client
        .post(format!("{}/api/admin/questions", address))
        .header("Authorization", &admin_auth)
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "question_text": "What is a cell?<script>alert(1)</script>",
            "options": ["A unit of life", "A prison room"],
            "correct_option_index": 0,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(question["ok"], true);
    let question_id = question["id"].as_i64().unwrap();
    assert!(question["correct_option_id"].as_i64().is_some());

    let stored_text =
        sqlx::query_scalar::<_, String>("SELECT question_text FROM questions WHERE id = ?")
            .bind(question_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(!stored_text.contains("<script>"));

    let questions = client
        .get(format!("{}/api/admin/quizzes/{}/questions", address, quiz_id))
        .header("Authorization", &admin_auth)
        .send()
        .await
        .unwrap()
        .json::<Vec<serde_json::Value>>()
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);

    // Deleting the subject cascades down to the question.
    let deleted = client
        .delete(format!("{}/api/admin/subjects/{}", address, subject_id))
        .header("Authorization", &admin_auth)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);

    let remaining =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}
