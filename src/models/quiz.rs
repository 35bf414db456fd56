// src/models/quiz.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::DEFAULT_PASSING_SCORE;

/// Kinds of quiz question. Stored as text in `quiz_questions.question_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    /// Choice-based questions are graded from the chosen choice's flag.
    pub fn uses_choices(self) -> bool {
        !matches!(self, QuestionType::ShortAnswer)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// Represents the 'quizzes' table. One quiz per lesson.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub description: String,
    /// Percentage required to pass.
    pub passing_score: i32,
    /// Time limit in minutes.
    pub time_limit: Option<i32>,
}

/// Represents the 'quiz_questions' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub points: i32,
    pub order: i32,
}

impl QuizQuestion {
    /// Unknown stored values fall back to multiple choice, the column default.
    pub fn kind(&self) -> QuestionType {
        self.question_type
            .parse()
            .unwrap_or(QuestionType::MultipleChoice)
    }
}

/// Represents the 'quiz_choices' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizChoice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub is_correct: bool,
    pub order: i32,
}

/// Represents the 'quiz_attempts' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    /// Percentage, `None` until the attempt is submitted.
    pub score: Option<f64>,
    pub passed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub time_taken_minutes: i32,
}

/// Represents the 'quiz_answers' table. Unique per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_choice_id: Option<i64>,
    pub answer_text: String,
    pub is_correct: bool,
}

/// Choice as shown to a student taking the quiz (no correctness flag).
#[derive(Debug, Serialize)]
pub struct PublicChoice {
    pub id: i64,
    pub choice_text: String,
    pub order: i32,
}

/// Question as shown to a student taking the quiz.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: String,
    pub points: i32,
    pub order: i32,
    pub choices: Vec<PublicChoice>,
}

/// Question with its choices, as seen by the authoring instructor.
#[derive(Debug, Serialize)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub choices: Vec<QuizChoice>,
}

/// Response when a student starts an attempt.
#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt: QuizAttempt,
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// One question of a graded attempt.
#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question: QuizQuestion,
    pub user_answer: Option<QuizAnswer>,
    /// Only set for choice-based questions.
    pub correct_choice: Option<QuizChoice>,
}

/// Full result view of an attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResultResponse {
    pub attempt: QuizAttempt,
    pub quiz: Quiz,
    pub questions: Vec<QuestionResult>,
    pub correct_count: usize,
    pub total_questions: usize,
}

/// Row of the instructor's quiz-results overview.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptOverview {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub lesson_title: String,
    pub user_id: i64,
    pub username: String,
    pub score: Option<f64>,
    pub passed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub time_taken_minutes: i32,
}

/// Short-answer response awaiting (or having received) a manual grade.
#[derive(Debug, Serialize, FromRow)]
pub struct ShortAnswerEntry {
    pub answer_id: i64,
    pub question_id: i64,
    pub question_text: String,
    pub points: i32,
    pub answer_text: String,
    pub is_correct: bool,
}

/// DTO for creating a quiz on a lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0, max = 100, message = "Passing score must be a percentage"))]
    pub passing_score: i32,
    #[validate(range(min = 1, message = "Time limit must be at least one minute"))]
    pub time_limit: Option<i32>,
}

fn default_passing_score() -> i32 {
    DEFAULT_PASSING_SCORE
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    /// Removes the time limit when true.
    #[serde(default)]
    pub clear_time_limit: bool,
}

/// Choice payload used when authoring a question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChoiceInput {
    #[validate(length(min = 1, max = 200, message = "Choice text must be between 1 and 200 characters"))]
    pub choice_text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub order: Option<i32>,
}

/// DTO for creating a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 1000))]
    pub points: i32,
    pub order: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    pub choices: Vec<ChoiceInput>,
}

fn default_points() -> i32 {
    1
}

/// DTO for editing a question. `choices`, when present, replaces the existing set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question_text: Option<String>,
    pub question_type: Option<QuestionType>,
    #[validate(range(min = 1, max = 1000))]
    pub points: Option<i32>,
    pub order: Option<i32>,
    #[validate(nested)]
    pub choices: Option<Vec<ChoiceInput>>,
}

/// A single answer in a submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    /// Selected choice for choice-based questions.
    pub choice_id: Option<i64>,
    /// Free text for short-answer questions.
    pub answer_text: Option<String>,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(range(min = 0, max = 100000))]
    pub time_taken_minutes: i32,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// A single manual grade.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerGrade {
    pub answer_id: i64,
    pub is_correct: bool,
}

/// DTO for grading short answers of one attempt.
#[derive(Debug, Deserialize)]
pub struct GradeAnswersRequest {
    pub grades: Vec<AnswerGrade>,
}

/// Authoring rule: short answers take no choices, choice questions need at least one correct choice.
pub fn validate_choice_set(kind: QuestionType, choices: &[ChoiceInput]) -> Result<(), String> {
    if !kind.uses_choices() {
        if choices.is_empty() {
            return Ok(());
        }
        return Err("Short-answer questions cannot have choices".to_string());
    }
    if choices.is_empty() {
        return Ok(());
    }
    if !choices.iter().any(|c| c.is_correct) {
        return Err("At least one choice must be marked correct".to_string());
    }
    if kind == QuestionType::TrueFalse && choices.len() != 2 {
        return Err("True/false questions need exactly two choices".to_string());
    }
    Ok(())
}
