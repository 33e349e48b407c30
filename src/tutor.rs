use std::sync::Arc;
use tracing::info;

use crate::completion::{CompletionModel, Message};
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::translation::Translator;

/// Answers student questions from retrieved lecture chunks.
pub struct Tutor {
    retriever: Arc<Retriever>,
    translator: Arc<Translator>,
    completion_model: Arc<dyn CompletionModel>,
    answer_template: PromptTemplate,
    answer_top_k: usize,
}

impl Tutor {
    pub fn new(
        retriever: Arc<Retriever>,
        translator: Arc<Translator>,
        completion_model: Arc<dyn CompletionModel>,
        answer_template: PromptTemplate,
        answer_top_k: usize,
    ) -> Self {
        Self {
            retriever,
            translator,
            completion_model,
            answer_template,
            answer_top_k,
        }
    }

    /// Retrieve context for `question` and answer it.
    pub async fn answer_question(&self, question: &str) -> anyhow::Result<String> {
        let context = self
            .retriever
            .retrieve_relevant_chunks(question, self.answer_top_k)
            .await?;
        self.answer_with_context(question, &context.formatted).await
    }

    /// Answer `question` from already formatted chunks. An empty context is
    /// passed through as is.
    pub async fn answer_with_context(&self, question: &str, context: &str) -> anyhow::Result<String> {
        let prompt = self.answer_template.render(&[
            ("relevant_chunks", context),
            ("student_question", question),
        ]);

        let result = self
            .completion_model
            .complete(&[Message::user(prompt)], None, None)
            .await?;

        if let Some(usage) = &result.usage {
            info!(
                "Answer from {} used {} tokens ({} prompt + {} completion)",
                self.completion_model.model_name(),
                usage.total_tokens,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(result.content)
    }

    /// Translate an answer for the student. Failures are returned.
    pub async fn translate_response(
        &self,
        response: &str,
        target_language: &str,
    ) -> anyhow::Result<String> {
        self.translator
            .translate(response, target_language)
            .await
    }
}
