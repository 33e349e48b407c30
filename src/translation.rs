use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::completion::{CompletionModel, Message};
use crate::prompt::PromptTemplate;

/// Translates text with the completion model. Shared by the retriever
/// (query side) and the tutor (answer side).
///
/// Each caller picks its failure policy by method: [`Translator::translate`]
/// propagates, [`Translator::translate_or_keep`] degrades to the input text.
pub struct Translator {
    completion_model: Arc<dyn CompletionModel>,
    template: PromptTemplate,
}

impl Translator {
    pub fn new(completion_model: Arc<dyn CompletionModel>, template: PromptTemplate) -> Self {
        Self {
            completion_model,
            template,
        }
    }

    /// Translate, returning the model's error to the caller.
    pub async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
        self.try_translate(text, target_language)
            .await
            .with_context(|| format!("translation to {target_language} failed"))
    }

    /// Translate, or log and return `text` unchanged if the model fails.
    pub async fn translate_or_keep(&self, text: &str, target_language: &str) -> String {
        match self.try_translate(text, target_language).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation to {target_language} failed, keeping original text: {e:#}");
                text.to_string()
            }
        }
    }

    async fn try_translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
        info!(
            "Translating {} characters to {target_language} with {}",
            text.chars().count(),
            self.completion_model.model_name()
        );
        let prompt = self
            .template
            .render(&[("target_language", target_language), ("response", text)]);

        let result = self
            .completion_model
            .complete(&[Message::user(prompt)], None, None)
            .await?;
        Ok(result.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_translation_template, FakeCompletion};

    #[tokio::test]
    async fn test_translate_renders_template() {
        let model = Arc::new(FakeCompletion::new());
        let translator = Translator::new(model.clone(), test_translation_template());

        let out = translator
            .translate("A process is running.", "German")
            .await
            .unwrap();

        assert_eq!(out, "[German] A process is running.");
        assert_eq!(model.prompts(), vec!["Translate into German:\nA process is running."]);
    }

    #[tokio::test]
    async fn test_propagate_returns_error() {
        let model = Arc::new(FakeCompletion::new().failing_translation());
        let translator = Translator::new(model, test_translation_template());

        let err = translator
            .translate("hello", "Chinese")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("translation to Chinese failed"));
    }

    #[tokio::test]
    async fn test_translate_or_keep_returns_original_on_failure() {
        let model = Arc::new(FakeCompletion::new().failing_translation());
        let translator = Translator::new(model.clone(), test_translation_template());

        assert_eq!(translator.translate_or_keep("Was ist Paging?", "English").await, "Was ist Paging?");
        assert_eq!(model.prompts().len(), 1, "the model was still asked once");

        let working = Translator::new(Arc::new(FakeCompletion::new()), test_translation_template());
        assert_eq!(working.translate_or_keep("paging", "German").await, "[German] paging");
    }
}
