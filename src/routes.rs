// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, auth, catalog, discussion, enrollment, instructor, notes, notification, profile,
        quiz, quiz_authoring, review,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public routes: auth, catalog, course pages.
/// * Authenticated routes: learning, engagement, quizzes, notifications, instructor portal.
/// * Admin routes: auth first, then the role check.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let public_routes = Router::new()
        .route("/home", get(catalog::home))
        .route("/categories", get(catalog::list_categories))
        .route("/courses", get(catalog::list_courses))
        .route("/courses/{slug}", get(catalog::course_detail))
        .route("/courses/{slug}/reviews", get(review::list_reviews));

    let student_routes = Router::new()
        .route("/me", get(profile::get_me).put(profile::update_me))
        .route("/me/dashboard", get(profile::student_dashboard))
        .route("/me/courses", get(enrollment::my_courses))
        .route("/me/wishlist", get(review::list_wishlist))
        .route("/courses/{slug}/status", get(catalog::course_status))
        .route("/courses/{slug}/enroll", post(enrollment::enroll))
        .route("/courses/{slug}/learn", get(enrollment::learn))
        .route(
            "/courses/{slug}/lessons/{lesson_id}/complete",
            post(enrollment::toggle_lesson_complete),
        )
        .route("/courses/{slug}/certificate", post(enrollment::get_certificate))
        .route("/courses/{slug}/reviews", post(review::create_review))
        .route("/courses/{slug}/wishlist", post(review::toggle_wishlist))
        .route(
            "/courses/{slug}/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route(
            "/courses/{slug}/notes/{note_id}",
            delete(notes::delete_note),
        )
        .route("/courses/{slug}/bookmarks", post(notes::create_bookmark))
        .route(
            "/courses/{slug}/lessons/{lesson_id}/bookmarks",
            get(notes::list_bookmarks),
        )
        .route(
            "/courses/{slug}/discussions",
            get(discussion::list_discussions).post(discussion::create_discussion),
        )
        .route(
            "/courses/{slug}/discussions/{discussion_id}/replies",
            post(discussion::create_reply),
        )
        .route(
            "/courses/{slug}/lessons/{lesson_id}/quiz/attempts",
            get(quiz::my_attempts).post(quiz::start_attempt),
        )
        .route("/quiz/attempts/{attempt_id}", get(quiz::attempt_results))
        .route("/quiz/attempts/{attempt_id}/submit", post(quiz::submit_attempt))
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/read-all", post(notification::mark_all_read))
        .route("/notifications/{id}/read", post(notification::mark_read));

    let instructor_routes = Router::new()
        .route("/dashboard", get(instructor::dashboard))
        .route("/courses", post(instructor::create_course))
        .route(
            "/courses/{slug}",
            get(instructor::get_course).put(instructor::update_course),
        )
        .route("/courses/{slug}/lessons", post(instructor::create_lesson))
        .route(
            "/lessons/{lesson_id}",
            put(instructor::update_lesson).delete(instructor::delete_lesson),
        )
        .route(
            "/courses/{slug}/announcements",
            get(instructor::list_announcements).post(instructor::create_announcement),
        )
        .route("/courses/{slug}/discussions", get(instructor::course_discussions))
        .route("/courses/{slug}/attempts", get(instructor::quiz_results))
        .route(
            "/courses/{slug}/attempts/{attempt_id}/short-answers",
            get(instructor::short_answers),
        )
        .route(
            "/courses/{slug}/attempts/{attempt_id}/grade",
            post(instructor::grade_answers),
        )
        .route(
            "/courses/{slug}/lessons/{lesson_id}/quiz",
            post(quiz_authoring::create_quiz),
        )
        .route(
            "/courses/{slug}/quizzes/{quiz_id}",
            get(quiz_authoring::get_quiz)
                .put(quiz_authoring::update_quiz)
                .delete(quiz_authoring::delete_quiz),
        )
        .route(
            "/courses/{slug}/quizzes/{quiz_id}/questions",
            post(quiz_authoring::create_question),
        )
        .route(
            "/courses/{slug}/questions/{question_id}",
            put(quiz_authoring::update_question).delete(quiz_authoring::delete_question),
        );

    let protected_routes = Router::new()
        .merge(student_routes)
        .nest("/instructor", instructor_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/categories", post(admin::create_category))
        .route("/instructors", post(admin::upsert_instructor))
        .route("/courses/{slug}/instructor", put(admin::reassign_course))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .merge(public_routes)
        .merge(protected_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
