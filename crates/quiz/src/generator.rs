use crate::context::pack_context;
use crate::llm::ChatModel;
use crate::normalize::normalize_quiz;
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};
use serde_json::Value;
use std::sync::Arc;
use study_models::{ChunkMeta, QuestionType, Quiz, StudyError};
use tracing::{info, instrument, warn};

/// Builds quizzes from indexed chunks with a chat model.
#[derive(Clone)]
pub struct QuizGenerator {
    model: Arc<dyn ChatModel>,
    char_budget: usize,
    temperature: f32,
    seed: Option<u64>,
}

impl QuizGenerator {
    pub fn new(model: Arc<dyn ChatModel>, char_budget: usize, temperature: f32) -> Self {
        Self {
            model,
            char_budget,
            temperature,
            seed: None,
        }
    }

    /// Fix the context shuffle, for reproducible prompts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Pack context, prompt the model and normalise its reply.
    ///
    /// An empty context returns an empty quiz without calling the model; a
    /// reply that is not JSON is treated as an empty quiz.
    #[instrument(skip(self, docs, metas), fields(chunks = docs.len(), model = %self.model.model_name()))]
    pub async fn generate_quiz_from_chunks(
        &self,
        docs: &[String],
        metas: &[ChunkMeta],
        num_questions: u32,
        types: &[QuestionType],
        topic_hint: Option<&str>,
    ) -> Result<Quiz, StudyError> {
        let packed = pack_context(docs, metas, self.char_budget, self.seed);
        if packed.is_empty() {
            info!("No usable context, returning an empty quiz");
            return Ok(Quiz::empty());
        }

        let prompt = build_user_prompt(topic_hint, &packed, num_questions, types);
        let raw = self
            .model
            .complete_json(SYSTEM_PROMPT, &prompt, self.temperature)
            .await?;

        let data: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Model reply is not valid JSON: {}", e);
                Value::Null
            }
        };

        let quiz = normalize_quiz(&data);
        info!(
            "Generated quiz with {} questions from {} context chunks",
            quiz.questions.len(),
            packed.len()
        );
        Ok(quiz)
    }
}
