//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::completion::{CompletionModel, CompletionResult, Message};
use crate::prompt::{PromptTemplate, TRANSLATION_PLACEHOLDERS};
use crate::translation::Translator;

pub(crate) const FAKE_ANSWER: &str = "A process is a program in execution.";

/// Translation prompt whose first line the fake can parse back.
pub(crate) fn test_translation_template() -> PromptTemplate {
    PromptTemplate::new(
        "Translate into {target_language}:\n{response}",
        &TRANSLATION_PLACEHOLDERS,
    )
    .unwrap()
}

#[derive(Default)]
enum TranslationFailure {
    #[default]
    Never,
    Always,
    Into(String),
}

/// Completion model that answers translation prompts with `[Lang] text`
/// and every other prompt with [`FAKE_ANSWER`]. Records every prompt.
#[derive(Default)]
pub(crate) struct FakeCompletion {
    fail_translation: TranslationFailure,
    fail_answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_translation(mut self) -> Self {
        self.fail_translation = TranslationFailure::Always;
        self
    }

    /// Fail only translations into `language`.
    pub(crate) fn failing_translation_into(mut self, language: &str) -> Self {
        self.fail_translation = TranslationFailure::Into(language.to_string());
        self
    }

    fn translation_fails(&self, language: &str) -> bool {
        match &self.fail_translation {
            TranslationFailure::Never => false,
            TranslationFailure::Always => true,
            TranslationFailure::Into(failing) => failing == language,
        }
    }

    pub(crate) fn failing_answer(mut self) -> Self {
        self.fail_answer = true;
        self
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for FakeCompletion {
    async fn complete(
        &self,
        messages: &[Message],
        _max_tokens: Option<u32>,
        _temperature: Option<f64>,
    ) -> anyhow::Result<CompletionResult> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt.clone());

        let translation = prompt
            .strip_prefix("Translate into ")
            .and_then(|rest| rest.split_once(":\n"));

        let content = match translation {
            Some((language, _)) if self.translation_fails(language) => {
                anyhow::bail!("translation backend unavailable")
            }
            Some((language, text)) => format!("[{language}] {text}"),
            None if self.fail_answer => anyhow::bail!("answer backend unavailable"),
            None => FAKE_ANSWER.to_string(),
        };

        Ok(CompletionResult {
            content,
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

pub(crate) fn fake_translator(model: Arc<FakeCompletion>) -> Arc<Translator> {
    Arc::new(Translator::new(model, test_translation_template()))
}
