//! Repair model output into a quiz the frontend can rely on.

use serde_json::{Map, Value};
use study_models::{Citation, Difficulty, Question, QuestionType, Quiz};
use tracing::warn;

const DEFAULT_LEVEL: i64 = 5;

fn truthy_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(q: &Map<String, Value>, key: &str) -> String {
    q.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Lenient integer read: numbers are truncated, numeric strings parsed.
fn lenient_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pad_options(options: &mut Vec<String>, to: usize) {
    let needed = to.saturating_sub(options.len());
    options.extend((1..=needed).map(|i| format!("Option {}", i)));
}

fn shape_options(qtype: QuestionType, raw: Option<&Value>) -> Vec<String> {
    let mut options: Vec<String> = raw
        .and_then(Value::as_array)
        .map(|items| items.iter().map(option_text).collect())
        .unwrap_or_default();

    match qtype {
        QuestionType::McqSingle => {
            pad_options(&mut options, 4);
            options.truncate(4);
        }
        QuestionType::McqMulti => {
            pad_options(&mut options, 3);
            options.truncate(7);
        }
        QuestionType::TrueFalse => {
            options = vec!["True".to_string(), "False".to_string()];
        }
        QuestionType::ShortAnswer => options.clear(),
    }
    options
}

/// Turn the many shapes a model uses for answers into answer texts.
///
/// For choice questions the result only contains option texts, in option
/// order. Short-answer questions keep free-text reference answers.
fn answer_texts(qtype: QuestionType, options: &[String], candidate: Option<&Value>) -> Vec<String> {
    let Some(candidate) = candidate else {
        return Vec::new();
    };

    if qtype == QuestionType::ShortAnswer {
        return match candidate {
            Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
    }

    match candidate {
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let wanted: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            options
                .iter()
                .filter(|opt| wanted.contains(&opt.as_str()))
                .cloned()
                .collect()
        }
        Value::Array(items) if items.iter().all(|x| x.as_i64().is_some()) => items
            .iter()
            .filter_map(Value::as_i64)
            .filter_map(|i| usize::try_from(i).ok())
            .filter_map(|i| options.get(i).cloned())
            .collect(),
        Value::String(s) if options.contains(s) => vec![s.clone()],
        Value::Bool(b) if qtype == QuestionType::TrueFalse => {
            vec![if *b { "True" } else { "False" }.to_string()]
        }
        _ => Vec::new(),
    }
}

fn enforce_answers(qtype: QuestionType, options: &[String], answers: Vec<String>) -> Vec<String> {
    match qtype {
        QuestionType::McqSingle => {
            if answers.is_empty() {
                options.first().cloned().into_iter().collect()
            } else {
                answers.into_iter().take(1).collect()
            }
        }
        QuestionType::McqMulti => {
            let mut present: Vec<String> = options
                .iter()
                .filter(|opt| answers.contains(opt))
                .cloned()
                .collect();
            for opt in options {
                if present.len() >= 2 {
                    break;
                }
                if !present.contains(opt) {
                    present.push(opt.clone());
                }
            }
            present.truncate(4);
            present
        }
        QuestionType::TrueFalse => {
            if answers == ["True"] {
                vec!["True".to_string()]
            } else {
                vec!["False".to_string()]
            }
        }
        QuestionType::ShortAnswer => answers,
    }
}

fn citations(raw: Option<&Value>) -> Vec<Citation> {
    raw.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|c| {
                    let source = c.get("source")?;
                    Some(Citation {
                        source: option_text(source),
                        chunk: lenient_int(c.get("chunk")).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalise one raw question. `None` when its type is missing or unknown.
pub fn normalize_question(raw: &Value, position: usize) -> Option<Question> {
    let q = raw.as_object()?;
    let type_name = q.get("type").and_then(Value::as_str).unwrap_or_default();
    let qtype: QuestionType = match type_name.parse() {
        Ok(t) => t,
        Err(_) => {
            warn!("Dropping question {} with unsupported type {:?}", position, type_name);
            return None;
        }
    };

    let level = lenient_int(q.get("level"))
        .unwrap_or(DEFAULT_LEVEL)
        .clamp(1, 10) as u8;
    let options = shape_options(qtype, q.get("options"));

    let candidate = match q.get("correctAnswers") {
        Some(Value::Null) | None => q.get("answer"),
        present => present,
    };
    let answers = answer_texts(qtype, &options, candidate);
    let correct_answers = enforce_answers(qtype, &options, answers);

    Some(Question {
        id: truthy_string(q.get("id")).unwrap_or_else(|| format!("q{}", position)),
        question_type: qtype,
        level,
        difficulty: Difficulty::from_level(level),
        question: text_field(q, "question"),
        options,
        correct_answers,
        explanation: text_field(q, "explanation"),
        citations: citations(q.get("citations")),
    })
}

/// Normalise a whole model reply. Anything that is not an object yields an
/// empty quiz titled `Quiz`.
pub fn normalize_quiz(data: &Value) -> Quiz {
    let title = truthy_string(data.get("title")).unwrap_or_else(|| "Quiz".to_string());
    let questions = data
        .get("questions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, q)| normalize_question(q, i + 1))
                .collect()
        })
        .unwrap_or_default();

    Quiz { title, questions }
}
