use crate::context::PackedChunk;
use study_models::QuestionType;

pub const SYSTEM_PROMPT: &str = "You create high-quality quizzes grounded ONLY in the provided context.\n\
Read the whole context carefully there might be some example and code snippets.\n\
you should smartly gather information from the context and generate questions.\n\
Make sure you use all sources of data.\n\
Follow the JSON schema exactly. Do not add extra fields. Do not invent facts.";

pub const QUIZ_JSON_SCHEMA: &str = r#"Return STRICT JSON with this shape:

{
  "title": string,
  "questions": [
    {
      "id": string,
      "type": "true_false" | "mcq_single" | "mcq_multi" | "answer_short_question",
      "level": number,
      "difficulty": "easy" | "medium" | "hard",
      "question": string,
      "options": [string, ...],
      "correctAnswers": [string, ...],   // answer TEXTS from options
      "explanation": string,
      "citations": [ { "source": string, "chunk": number } ]
    }
  ]
}
Rules:
- id is unique per question, e.g. "q1", "q2", etc.
- type is one of: "true_false", "mcq_single", "mcq_multi", "answer_short_question".
- level is an integer from 1 to 10, where 1 is easiest and 10 is hardest.
- For mcq_single: correctAnswers length MUST be 1 (one option TEXT).
- For mcq_multi: options MUST be between 3 and 7 (prefer 5-6), and correctAnswers options could be in range of 2-4 options out of the 3 to 7.
- For true_false: options MUST be ["True","False"]; correctAnswers MUST be ["True"] or ["False"].
- For answer_short_question: options MUST be []; correctAnswers holds one or more short reference answers written as free text.
- Each question MUST include level 1-10. Map difficulty: 1-5 easy, 6-7 medium, 8-10 hard.
- All content MUST be grounded ONLY in context and include at least one citation per question.
"#;

/// Request line, optional focus, the cited context blocks and the schema.
pub fn build_user_prompt(
    topic_hint: Option<&str>,
    packed: &[PackedChunk],
    num_questions: u32,
    types: &[QuestionType],
) -> String {
    let allowed: Vec<&str> = types.iter().map(QuestionType::as_str).collect();
    let mut header = format!(
        "Generate {} questions. Allowed types: {}.",
        num_questions,
        allowed.join(", ")
    );
    if let Some(hint) = topic_hint.map(str::trim).filter(|h| !h.is_empty()) {
        header.push_str(&format!(" Focus on: {}.", hint));
    }
    header.push_str("\n\nContext chunks (with citations):\n");

    let body: Vec<String> = packed
        .iter()
        .map(|blk| format!("[source: {} | chunk: {}]\n{}\n", blk.source, blk.chunk, blk.text))
        .collect();

    format!("{}{}\nOutput format:\n{}", header, body.join("\n"), QUIZ_JSON_SCHEMA)
}
