pub mod context;
pub mod evaluate;
pub mod generator;
pub mod llm;
pub mod normalize;
pub mod prompt;

pub use context::{pack_context, PackedChunk};
pub use evaluate::{evaluate_answer, evaluate_short_answer};
pub use generator::QuizGenerator;
pub use llm::{ChatModel, OpenAiChat};
pub use normalize::{normalize_question, normalize_quiz};
pub use prompt::{build_user_prompt, QUIZ_JSON_SCHEMA, SYSTEM_PROMPT};
