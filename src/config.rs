// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// Passing threshold (percentage) applied to quizzes created without one.
pub const DEFAULT_PASSING_SCORE: i32 = 70;

/// Courses per page in the public catalog.
pub const CATALOG_PAGE_SIZE: i64 = 12;

/// Max number of enrolled students told about a new question.
pub const NEW_QUESTION_FANOUT_LIMIT: i64 = 10;

/// Notifications returned by the notification feed.
pub const RECENT_NOTIFICATIONS_LIMIT: i64 = 20;

/// Recent reviews shown on a course page.
pub const COURSE_DETAIL_REVIEWS: i64 = 10;

/// Related courses shown on a course page.
pub const RELATED_COURSES_LIMIT: i64 = 4;

/// Prefix of public certificate identifiers.
pub const CERTIFICATE_PREFIX: &str = "FA";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            cors_origins,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Configuration for tests and tooling that never touch the environment.
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cors_origins: Vec::new(),
            admin_username: None,
            admin_password: None,
        }
    }
}

/// Splits a comma separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blanks_dropped() {
        let origins = parse_origins(" http://a.test , ,http://b.test,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_config_has_short_token_lifetime() {
        let config = Config::for_tests("postgres://localhost/test", "secret");
        assert_eq!(config.jwt_expiration, 600);
        assert!(config.admin_username.is_none());
    }
}
