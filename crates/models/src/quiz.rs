use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum QuestionType {
    #[serde(rename = "true_false")]
    TrueFalse,
    #[serde(rename = "mcq_single")]
    McqSingle,
    #[serde(rename = "mcq_multi")]
    McqMulti,
    #[serde(rename = "answer_short_question")]
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::TrueFalse => "true_false",
            QuestionType::McqSingle => "mcq_single",
            QuestionType::McqMulti => "mcq_multi",
            QuestionType::ShortAnswer => "answer_short_question",
        }
    }

    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionType::ShortAnswer)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true_false" => Ok(QuestionType::TrueFalse),
            "mcq_single" => Ok(QuestionType::McqSingle),
            "mcq_multi" => Ok(QuestionType::McqMulti),
            "answer_short_question" => Ok(QuestionType::ShortAnswer),
            _ => Err(format!("Invalid question type: {}", s)),
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// 1-5 easy, 6-7 medium, 8-10 hard.
    pub fn from_level(level: u8) -> Self {
        if level <= 5 {
            Difficulty::Easy
        } else if level <= 7 {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Citation {
    pub source: String,
    pub chunk: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub level: u8,
    pub difficulty: Difficulty,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Answer texts taken from `options`; free-text reference answers for
    /// short-answer questions.
    #[serde(rename = "correctAnswers", default)]
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn empty() -> Self {
        Self {
            title: "Quiz".to_string(),
            questions: Vec::new(),
        }
    }
}

fn default_num_questions() -> u32 {
    12
}

fn default_types() -> Vec<QuestionType> {
    vec![
        QuestionType::McqSingle,
        QuestionType::McqMulti,
        QuestionType::TrueFalse,
        QuestionType::ShortAnswer,
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "numQuestions", default = "default_num_questions")]
    pub num_questions: u32,
    #[serde(default = "default_types")]
    pub types: Vec<QuestionType>,
    #[serde(rename = "topicHint", default)]
    pub topic_hint: Option<String>,
}

/// The question is accepted in the loose shape a model produced it in and
/// normalised before grading.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluateAnswerRequest {
    pub user_answer: String,
    #[schema(value_type = Object)]
    pub question: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Evaluation {
    pub correct: bool,
    pub score: f64,
    #[serde(rename = "matchedAnswer")]
    pub matched_answer: Option<String>,
    pub feedback: String,
}
