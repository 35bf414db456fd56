// tests/quiz_flow_tests.rs
//
// End-to-end quiz flows against a real Postgres. Skipped when DATABASE_URL is unset.

use academy::{config::Config, handlers::auth::create_admin_user, routes, state::AppState};
use reqwest::Client;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const SECRET: &str = "quiz_flow_test_secret";

async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let state = AppState::new(pool.clone(), Config::for_tests(&database_url, SECRET));
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some((address, pool))
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..10])
}

async fn login(client: &Client, address: &str, username: &str) -> String {
    let body: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["token"].as_str().expect("login returns a token").to_string()
}

/// Registers a user and returns (id, token).
async fn register(client: &Client, address: &str, username: &str) -> (i64, String) {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let user: Value = response.json().await.unwrap();
    assert!(user.get("password").is_none());

    let token = login(client, address, username).await;
    (user["id"].as_i64().unwrap(), token)
}

async fn send(request: reqwest::RequestBuilder, expected: u16) -> Value {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    assert_eq!(status, expected, "unexpected response: {}", body);
    body
}

struct Course {
    slug: String,
    instructor: String,
}

/// Admin, instructor, category and a published course.
async fn published_course(client: &Client, address: &str, pool: &PgPool) -> Course {
    let admin_name = unique("admin");
    create_admin_user(pool, &admin_name, "password123").await.unwrap();
    let admin = login(client, address, &admin_name).await;

    let (instructor_id, instructor) = register(client, address, &unique("teach")).await;
    send(
        client
            .post(format!("{}/api/admin/instructors", address))
            .bearer_auth(&admin)
            .json(&json!({ "user_id": instructor_id, "expertise": "Rust" })),
        200,
    )
    .await;

    let category = send(
        client
            .post(format!("{}/api/admin/categories", address))
            .bearer_auth(&admin)
            .json(&json!({ "name": unique("Programming") })),
        201,
    )
    .await;

    let course = send(
        client
            .post(format!("{}/api/instructor/courses", address))
            .bearer_auth(&instructor)
            .json(&json!({
                "title": unique("Systems Course"),
                "description": "Learn systems programming",
                "short_description": "Systems",
                "category_id": category["id"],
                "difficulty": "beginner",
                "is_free": true,
                "status": "published"
            })),
        201,
    )
    .await;

    Course {
        slug: course["slug"].as_str().unwrap().to_string(),
        instructor,
    }
}

async fn add_lesson(client: &Client, address: &str, course: &Course, title: &str) -> i64 {
    let lesson = send(
        client
            .post(format!("{}/api/instructor/courses/{}/lessons", address, course.slug))
            .bearer_auth(&course.instructor)
            .json(&json!({ "title": title })),
        201,
    )
    .await;
    lesson["id"].as_i64().unwrap()
}

async fn add_quiz(client: &Client, address: &str, course: &Course, lesson_id: i64) -> i64 {
    let quiz = send(
        client
            .post(format!(
                "{}/api/instructor/courses/{}/lessons/{}/quiz",
                address, course.slug, lesson_id
            ))
            .bearer_auth(&course.instructor)
            .json(&json!({ "title": "Checkpoint", "passing_score": 70 })),
        201,
    )
    .await;
    quiz["id"].as_i64().unwrap()
}

async fn add_question(
    client: &Client,
    address: &str,
    course: &Course,
    quiz_id: i64,
    body: Value,
) -> Value {
    send(
        client
            .post(format!(
                "{}/api/instructor/courses/{}/quizzes/{}/questions",
                address, course.slug, quiz_id
            ))
            .bearer_auth(&course.instructor)
            .json(&body),
        201,
    )
    .await
}

async fn enrolled_student(client: &Client, address: &str, course: &Course) -> String {
    let (_, student) = register(client, address, &unique("student")).await;
    send(
        client
            .post(format!("{}/api/courses/{}/enroll", address, course.slug))
            .bearer_auth(&student),
        201,
    )
    .await;
    student
}

async fn start_attempt(
    client: &Client,
    address: &str,
    course: &Course,
    lesson_id: i64,
    student: &str,
) -> Value {
    send(
        client
            .post(format!(
                "{}/api/courses/{}/lessons/{}/quiz/attempts",
                address, course.slug, lesson_id
            ))
            .bearer_auth(student),
        201,
    )
    .await
}

async fn submit(client: &Client, address: &str, student: &str, attempt_id: i64, answers: Value) -> Value {
    send(
        client
            .post(format!("{}/api/quiz/attempts/{}/submit", address, attempt_id))
            .bearer_auth(student)
            .json(&json!({ "time_taken_minutes": 3, "answers": answers })),
        200,
    )
    .await
}

/// (question id, correct choice id, wrong choice id) per question, in order.
fn choice_ids(quiz_view: &Value) -> Vec<(i64, i64, i64)> {
    quiz_view["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            let choices = q["choices"].as_array().unwrap();
            let pick = |correct: bool| {
                choices
                    .iter()
                    .find(|c| c["is_correct"].as_bool() == Some(correct))
                    .unwrap()["id"]
                    .as_i64()
                    .unwrap()
            };
            (q["id"].as_i64().unwrap(), pick(true), pick(false))
        })
        .collect()
}

#[tokio::test]
async fn multiple_choice_scoring_flow() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();

    let course = published_course(&client, &address, &pool).await;
    let lesson_id = add_lesson(&client, &address, &course, "Ownership").await;
    let quiz_id = add_quiz(&client, &address, &course, lesson_id).await;

    let mut quiz_view = Value::Null;
    for text in ["Who owns a moved value?", "What does & create?"] {
        quiz_view = add_question(
            &client,
            &address,
            &course,
            quiz_id,
            json!({
                "question_text": text,
                "question_type": "multiple_choice",
                "choices": [
                    { "choice_text": "Right", "is_correct": true },
                    { "choice_text": "Wrong" }
                ]
            }),
        )
        .await;
    }
    let ids = choice_ids(&quiz_view);
    assert_eq!(ids.len(), 2);

    // A second quiz on the same lesson conflicts.
    send(
        client
            .post(format!(
                "{}/api/instructor/courses/{}/lessons/{}/quiz",
                address, course.slug, lesson_id
            ))
            .bearer_auth(&course.instructor)
            .json(&json!({ "title": "Again" })),
        409,
    )
    .await;

    // Not enrolled yet.
    let (_, outsider) = register(&client, &address, &unique("outsider")).await;
    send(
        client
            .post(format!(
                "{}/api/courses/{}/lessons/{}/quiz/attempts",
                address, course.slug, lesson_id
            ))
            .bearer_auth(&outsider),
        403,
    )
    .await;

    let student = enrolled_student(&client, &address, &course).await;

    // Students never see correctness flags.
    let started = start_attempt(&client, &address, &course, lesson_id, &student).await;
    let first_choice = &started["questions"][0]["choices"][0];
    assert!(first_choice.get("is_correct").is_none());

    // Both correct
    let attempt_id = started["attempt"]["id"].as_i64().unwrap();
    let result = submit(
        &client,
        &address,
        &student,
        attempt_id,
        json!([
            { "question_id": ids[0].0, "choice_id": ids[0].1 },
            { "question_id": ids[1].0, "choice_id": ids[1].1 }
        ]),
    )
    .await;
    assert_eq!(result["attempt"]["score"].as_f64(), Some(100.0));
    assert_eq!(result["attempt"]["passed"], json!(true));
    assert_eq!(result["correct_count"], json!(2));
    assert_eq!(result["total_questions"], json!(2));

    // One correct, on a fresh attempt
    let started = start_attempt(&client, &address, &course, lesson_id, &student).await;
    let attempt_id = started["attempt"]["id"].as_i64().unwrap();
    let answers = json!([
        { "question_id": ids[0].0, "choice_id": ids[0].1 },
        { "question_id": ids[1].0, "choice_id": ids[1].2 }
    ]);
    let result = submit(&client, &address, &student, attempt_id, answers.clone()).await;
    assert_eq!(result["attempt"]["score"].as_f64(), Some(50.0));
    assert_eq!(result["attempt"]["passed"], json!(false));

    // Resubmitting keeps one answer row per question and the same score.
    let result = submit(&client, &address, &student, attempt_id, answers).await;
    assert_eq!(result["attempt"]["score"].as_f64(), Some(50.0));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_answers WHERE attempt_id = $1")
        .bind(attempt_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 2);

    // A choice from another question is rejected.
    send(
        client
            .post(format!("{}/api/quiz/attempts/{}/submit", address, attempt_id))
            .bearer_auth(&student)
            .json(&json!({ "answers": [{ "question_id": ids[0].0, "choice_id": ids[1].1 }] })),
        400,
    )
    .await;

    // Other users cannot see the attempt.
    send(
        client
            .get(format!("{}/api/quiz/attempts/{}", address, attempt_id))
            .bearer_auth(&outsider),
        404,
    )
    .await;
}

#[tokio::test]
async fn short_answer_is_scored_after_grading() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();

    let course = published_course(&client, &address, &pool).await;
    let lesson_id = add_lesson(&client, &address, &course, "Lifetimes").await;
    let quiz_id = add_quiz(&client, &address, &course, lesson_id).await;

    // Short answers cannot carry choices.
    send(
        client
            .post(format!(
                "{}/api/instructor/courses/{}/quizzes/{}/questions",
                address, course.slug, quiz_id
            ))
            .bearer_auth(&course.instructor)
            .json(&json!({
                "question_text": "Explain 'static",
                "question_type": "short_answer",
                "choices": [{ "choice_text": "nope", "is_correct": true }]
            })),
        400,
    )
    .await;

    let quiz_view = add_question(
        &client,
        &address,
        &course,
        quiz_id,
        json!({ "question_text": "Explain 'static", "question_type": "short_answer" }),
    )
    .await;
    let question_id = quiz_view["questions"][0]["id"].as_i64().unwrap();

    let student = enrolled_student(&client, &address, &course).await;
    let started = start_attempt(&client, &address, &course, lesson_id, &student).await;
    let attempt_id = started["attempt"]["id"].as_i64().unwrap();

    let result = submit(
        &client,
        &address,
        &student,
        attempt_id,
        json!([{ "question_id": question_id, "answer_text": "  lives for the whole program  " }]),
    )
    .await;
    assert_eq!(result["attempt"]["score"].as_f64(), Some(0.0));
    assert_eq!(result["attempt"]["passed"], json!(false));

    let pending = send(
        client
            .get(format!(
                "{}/api/instructor/courses/{}/attempts/{}/short-answers",
                address, course.slug, attempt_id
            ))
            .bearer_auth(&course.instructor),
        200,
    )
    .await;
    assert_eq!(pending[0]["answer_text"], json!("lives for the whole program"));
    let answer_id = pending[0]["answer_id"].as_i64().unwrap();

    // The student is not the course instructor.
    send(
        client
            .post(format!(
                "{}/api/instructor/courses/{}/attempts/{}/grade",
                address, course.slug, attempt_id
            ))
            .bearer_auth(&student)
            .json(&json!({ "grades": [{ "answer_id": answer_id, "is_correct": true }] })),
        403,
    )
    .await;

    let grade = json!({
        "grades": [
            { "answer_id": answer_id, "is_correct": true },
            { "answer_id": i64::MAX, "is_correct": true }
        ]
    });
    for _ in 0..2 {
        let graded = send(
            client
                .post(format!(
                    "{}/api/instructor/courses/{}/attempts/{}/grade",
                    address, course.slug, attempt_id
                ))
                .bearer_auth(&course.instructor)
                .json(&grade),
            200,
        )
        .await;
        assert_eq!(graded["graded"], json!(1));
        assert_eq!(graded["score"].as_f64(), Some(100.0));
        assert_eq!(graded["passed"], json!(true));
    }
}

#[tokio::test]
async fn empty_quiz_scores_zero_and_fails() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();

    let course = published_course(&client, &address, &pool).await;
    let lesson_id = add_lesson(&client, &address, &course, "Intro").await;
    add_quiz(&client, &address, &course, lesson_id).await;

    let student = enrolled_student(&client, &address, &course).await;
    let started = start_attempt(&client, &address, &course, lesson_id, &student).await;
    let attempt_id = started["attempt"]["id"].as_i64().unwrap();

    let result = submit(&client, &address, &student, attempt_id, json!([])).await;
    assert_eq!(result["attempt"]["score"].as_f64(), Some(0.0));
    assert_eq!(result["attempt"]["passed"], json!(false));
    assert_eq!(result["total_questions"], json!(0));
}
