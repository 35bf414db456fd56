// tests/profile_tests.rs
//
// Profile, progress, certificate and notification flows. Needs DATABASE_URL.

use academy::{
    config::Config,
    error::AppError,
    handlers::auth::create_admin_user,
    routes,
    services::certificates::{issue_certificate, issue_certificate_with_code},
    state::AppState,
};
use reqwest::Client;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

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

    let state = AppState::new(pool.clone(), Config::for_tests(&database_url, "profile_test_secret"));
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

async fn send(request: reqwest::RequestBuilder, expected: u16) -> Value {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    assert_eq!(status, expected, "unexpected response: {}", body);
    body
}

async fn login(client: &Client, address: &str, username: &str) -> String {
    let body = send(
        client
            .post(format!("{}/api/auth/login", address))
            .json(&json!({ "username": username, "password": "password123" })),
        200,
    )
    .await;
    body["token"].as_str().unwrap().to_string()
}

async fn register(client: &Client, address: &str, username: &str) -> (i64, String) {
    let user = send(
        client
            .post(format!("{}/api/auth/register", address))
            .json(&json!({
                "username": username,
                "password": "password123",
                "first_name": "Ada",
                "last_name": "Lovelace"
            })),
        201,
    )
    .await;
    (user["id"].as_i64().unwrap(), login(client, address, username).await)
}

#[tokio::test]
async fn profile_is_created_and_editable() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();
    let username = unique("prof");
    let (_, token) = register(&client, &address, &username).await;

    // Duplicate usernames conflict.
    send(
        client
            .post(format!("{}/api/auth/register", address))
            .json(&json!({ "username": username, "password": "password123" })),
        409,
    )
    .await;

    let me = send(client.get(format!("{}/api/me", address)).bearer_auth(&token), 200).await;
    assert_eq!(me["username"], json!(username));
    assert_eq!(me["full_name"], json!("Ada Lovelace"));
    assert_eq!(me["is_instructor"], json!(false));
    assert_eq!(me["profile"]["bio"], json!(""));

    let me = send(
        client
            .put(format!("{}/api/me", address))
            .bearer_auth(&token)
            .json(&json!({ "bio": "Counting engines", "github_url": "https://github.com/ada" })),
        200,
    )
    .await;
    assert_eq!(me["profile"]["bio"], json!("Counting engines"));
    assert_eq!(me["profile"]["github_url"], json!("https://github.com/ada"));

    send(
        client
            .put(format!("{}/api/me", address))
            .bearer_auth(&token)
            .json(&json!({ "website_url": "not a url" })),
        400,
    )
    .await;

    // Wrong password
    send(
        client
            .post(format!("{}/api/auth/login", address))
            .json(&json!({ "username": username, "password": "wrong-password" })),
        401,
    )
    .await;
}

#[tokio::test]
async fn progress_certificate_and_notifications_flow() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();

    let admin_name = unique("admin");
    create_admin_user(&pool, &admin_name, "password123").await.unwrap();
    let admin = login(&client, &address, &admin_name).await;

    let (instructor_id, instructor) = register(&client, &address, &unique("teach")).await;
    send(
        client
            .post(format!("{}/api/admin/instructors", address))
            .bearer_auth(&admin)
            .json(&json!({ "user_id": instructor_id })),
        200,
    )
    .await;
    let category = send(
        client
            .post(format!("{}/api/admin/categories", address))
            .bearer_auth(&admin)
            .json(&json!({ "name": unique("Design") })),
        201,
    )
    .await;
    let course = send(
        client
            .post(format!("{}/api/instructor/courses", address))
            .bearer_auth(&instructor)
            .json(&json!({
                "title": unique("Typography"),
                "description": "Letters",
                "short_description": "Letters",
                "category_id": category["id"],
                "difficulty": "intermediate",
                "price_cents": 1999,
                "status": "published"
            })),
        201,
    )
    .await;
    let slug = course["slug"].as_str().unwrap().to_string();

    let mut lesson_ids = Vec::new();
    for title in ["Kerning", "Leading"] {
        let lesson = send(
            client
                .post(format!("{}/api/instructor/courses/{}/lessons", address, slug))
                .bearer_auth(&instructor)
                .json(&json!({ "title": title, "video_url": "https://youtu.be/dQw4w9WgXcQ" })),
            201,
        )
        .await;
        lesson_ids.push(lesson["id"].as_i64().unwrap());
    }

    let (_, student) = register(&client, &address, &unique("student")).await;
    let enrolled = send(
        client
            .post(format!("{}/api/courses/{}/enroll", address, slug))
            .bearer_auth(&student),
        201,
    )
    .await;
    assert_eq!(enrolled["outcome"], json!("enrolled"));
    let again = send(
        client
            .post(format!("{}/api/courses/{}/enroll", address, slug))
            .bearer_auth(&student),
        200,
    )
    .await;
    assert_eq!(again["outcome"], json!("already_enrolled"));

    let learn = send(
        client
            .get(format!("{}/api/courses/{}/learn", address, slug))
            .bearer_auth(&student),
        200,
    )
    .await;
    assert_eq!(learn["lessons"].as_array().unwrap().len(), 2);
    assert_eq!(learn["lessons"][0]["embed"]["id"], json!("dQw4w9WgXcQ"));

    // Not finished yet.
    send(
        client
            .post(format!("{}/api/courses/{}/certificate", address, slug))
            .bearer_auth(&student),
        400,
    )
    .await;

    let toggle = |lesson_id: i64| {
        client
            .post(format!("{}/api/courses/{}/lessons/{}/complete", address, slug, lesson_id))
            .bearer_auth(&student)
    };
    let first = send(toggle(lesson_ids[0]), 200).await;
    assert_eq!(first["completed"], json!(true));
    assert_eq!(first["progress_percentage"], json!(50));
    let undone = send(toggle(lesson_ids[0]), 200).await;
    assert_eq!(undone["completed"], json!(false));
    assert_eq!(undone["progress_percentage"], json!(0));
    send(toggle(lesson_ids[0]), 200).await;
    let done = send(toggle(lesson_ids[1]), 200).await;
    assert_eq!(done["progress_percentage"], json!(100));

    let certificate = send(
        client
            .post(format!("{}/api/courses/{}/certificate", address, slug))
            .bearer_auth(&student),
        201,
    )
    .await;
    let code = certificate["certificate_id"].as_str().unwrap().to_string();
    assert!(code.starts_with("FA"));

    let again = send(
        client
            .post(format!("{}/api/courses/{}/certificate", address, slug))
            .bearer_auth(&student),
        200,
    )
    .await;
    assert_eq!(again["certificate_id"], json!(code));

    // A question from the student reaches the instructor.
    send(
        client
            .post(format!("{}/api/courses/{}/discussions", address, slug))
            .bearer_auth(&student)
            .json(&json!({ "title": "Kerning <b>pairs</b>?", "content": "Which pairs matter most?" })),
        201,
    )
    .await;

    let feed = send(
        client
            .get(format!("{}/api/notifications", address))
            .bearer_auth(&instructor),
        200,
    )
    .await;
    assert_eq!(feed["unread_count"], json!(1));
    assert_eq!(feed["notifications"][0]["notification_type"], json!("discussion_new"));
    assert!(feed["notifications"][0]["time_ago"].is_string());

    let feed = send(
        client
            .get(format!("{}/api/notifications", address))
            .bearer_auth(&student),
        200,
    )
    .await;
    let types: Vec<&str> = feed["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["notification_type"].as_str())
        .collect();
    assert_eq!(types, vec!["certificate_earned"]);

    let marked = send(
        client
            .post(format!("{}/api/notifications/read-all", address))
            .bearer_auth(&student),
        200,
    )
    .await;
    assert_eq!(marked["marked_count"], json!(1));

    let dashboard = send(
        client
            .get(format!("{}/api/me/dashboard", address))
            .bearer_auth(&student),
        200,
    )
    .await;
    assert_eq!(dashboard["enrolled_courses_count"], json!(1));
    assert_eq!(dashboard["completed_courses_count"], json!(1));
    assert_eq!(dashboard["certificates_count"], json!(1));

    let teaching = send(
        client
            .get(format!("{}/api/instructor/dashboard", address))
            .bearer_auth(&instructor),
        200,
    )
    .await;
    assert_eq!(teaching["total_students"], json!(1));
    assert_eq!(teaching["total_revenue_cents"], json!(1999));
}

#[tokio::test]
async fn catalog_paging_search_and_certificate_codes() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = Client::new();

    let admin_name = unique("admin");
    create_admin_user(&pool, &admin_name, "password123").await.unwrap();
    let admin = login(&client, &address, &admin_name).await;

    let (instructor_id, instructor) = register(&client, &address, &unique("teach")).await;
    send(
        client
            .post(format!("{}/api/admin/instructors", address))
            .bearer_auth(&admin)
            .json(&json!({ "user_id": instructor_id })),
        200,
    )
    .await;
    let category = send(
        client
            .post(format!("{}/api/admin/categories", address))
            .bearer_auth(&admin)
            .json(&json!({ "name": unique("Crafts") })),
        201,
    )
    .await;

    let marker = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
    let title = format!("Kernx{}", marker);
    let course = send(
        client
            .post(format!("{}/api/instructor/courses", address))
            .bearer_auth(&instructor)
            .json(&json!({
                "title": title,
                "description": "Spacing",
                "short_description": "Spacing",
                "category_id": category["id"],
                "difficulty": "beginner",
                "price_cents": 0,
                "status": "published"
            })),
        201,
    )
    .await;
    let slug = course["slug"].as_str().unwrap().to_string();
    let course_id: uuid::Uuid = course["id"].as_str().unwrap().parse().unwrap();

    let catalog = |query: String| client.get(format!("{}/api/courses?{}", address, query));

    // Out-of-range pages land on the last page.
    for page in ["9223372036854775807", "768614336404564651", "5", "-3"] {
        let listing = send(catalog(format!("search={}&page={}", title, page)), 200).await;
        assert_eq!(listing["page"], json!(1), "page={}", page);
        assert_eq!(listing["total_pages"], json!(1));
        assert_eq!(listing["courses"].as_array().unwrap().len(), 1);
    }

    // LIKE wildcards in the search text are literal.
    let literal = send(catalog(format!("search=Kern_{}", marker)), 200).await;
    assert_eq!(literal["total"], json!(0));
    let percent = send(catalog(format!("search=Kern%25{}", marker)), 200).await;
    assert_eq!(percent["total"], json!(0));

    // Titles without ASCII letters still get a usable lesson slug.
    let lesson = send(
        client
            .post(format!("{}/api/instructor/courses/{}/lessons", address, slug))
            .bearer_auth(&instructor)
            .json(&json!({ "title": "日本語" })),
        201,
    )
    .await;
    assert!(lesson["slug"].as_str().unwrap().starts_with("lesson-"));

    // Two students enroll; certificate codes stay unique per certificate.
    let mut enrollment_ids = Vec::new();
    let mut student_ids = Vec::new();
    for _ in 0..2 {
        let (student_id, token) = register(&client, &address, &unique("student")).await;
        send(
            client
                .post(format!("{}/api/courses/{}/enroll", address, slug))
                .bearer_auth(&token),
            201,
        )
        .await;
        let enrollment_id: i64 =
            sqlx::query_scalar("SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2")
                .bind(student_id)
                .bind(course_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        student_ids.push(student_id);
        enrollment_ids.push(enrollment_id);
    }

    let mut conn = pool.acquire().await.unwrap();
    let (first, issued) = issue_certificate(&mut conn, student_ids[0], course_id, enrollment_ids[0])
        .await
        .unwrap();
    assert!(issued);

    let taken = issue_certificate_with_code(
        &mut conn,
        student_ids[1],
        course_id,
        enrollment_ids[1],
        &first.certificate_id,
    )
    .await;
    assert!(matches!(taken, Err(AppError::Conflict(_))), "{:?}", taken);

    let (second, issued) = issue_certificate(&mut conn, student_ids[1], course_id, enrollment_ids[1])
        .await
        .unwrap();
    assert!(issued);
    assert_ne!(second.certificate_id, first.certificate_id);

    let (again, issued) = issue_certificate(&mut conn, student_ids[0], course_id, enrollment_ids[0])
        .await
        .unwrap();
    assert!(!issued);
    assert_eq!(again.certificate_id, first.certificate_id);
}
