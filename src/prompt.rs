use thiserror::Error;

pub const DEFAULT_ANSWER_TEMPLATE: &str = "\
You are an expert in computer science and currently tutoring a university student.

Based only on the following relevant chunks of information:
{relevant_chunks}

answer the student's question clearly, step-by-step, and with intuitive explanations:
{student_question}
";

pub const DEFAULT_TRANSLATION_TEMPLATE: &str = "\
Translate the following text into {target_language} while maintaining its original meaning and context:
{response}
";

pub const ANSWER_PLACEHOLDERS: [&str; 2] = ["relevant_chunks", "student_question"];
pub const TRANSLATION_PLACEHOLDERS: [&str; 2] = ["target_language", "response"];

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("Prompt template is missing placeholder {{{0}}}")]
    MissingPlaceholder(String),
}

/// A prompt with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Build a template, checking that every `required` placeholder occurs.
    pub fn new(template: impl Into<String>, required: &[&str]) -> Result<Self, TemplateError> {
        let template = template.into();
        for name in required {
            if !template.contains(&format!("{{{name}}}")) {
                return Err(TemplateError::MissingPlaceholder(name.to_string()));
            }
        }
        Ok(Self { template })
    }

    /// Substitute placeholders in a single pass. Substituted values are never
    /// rescanned, so retrieved text containing braces is inserted verbatim.
    /// Unknown placeholders are left as written.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .and_then(|close| {
                    let name = &after[..close];
                    vars.iter()
                        .find(|(key, _)| *key == name)
                        .map(|(_, value)| (*value, close))
                });

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
