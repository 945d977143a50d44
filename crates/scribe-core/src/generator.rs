//! Response generator
//!
//! One completion per request. The system prompt carries the instruction,
//! the numbered sources and the verifier's guidance; the model never sees
//! document ids, chunk ids or aliases.

use crate::catalog::EvidenceCatalog;
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::{
    complete_bounded, history_messages, CallPurpose, ChatMessage, CompletionOptions,
    CompletionRequest, LlmClient,
};
use scribe_types::{ConversationHistory, EvidenceBundle, InstructionJson, TaskKind};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Inputs to one generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    /// The user's ask
    pub ask: &'a str,
    /// Planned instruction
    pub instruction: &'a InstructionJson,
    /// Packed evidence
    pub bundle: &'a EvidenceBundle,
    /// Numbered sources for the bundle
    pub catalog: &'a EvidenceCatalog,
    /// Verifier guidance lines
    pub guidance: &'a [String],
    /// Conversation so far
    pub history: &'a ConversationHistory,
    /// Token ceiling for the completion
    pub max_tokens: usize,
}

/// Response generator
#[derive(Clone)]
pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
    history_turns: usize,
}

impl ResponseGenerator {
    /// Create generator
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self {
            llm,
            model: config.model.clone(),
            timeout: config.generation_timeout(),
            history_turns: 6,
        }
    }

    /// With number of history turns sent to the model
    #[inline]
    #[must_use]
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    /// Generate a draft
    ///
    /// # Errors
    /// Returns the model error; an empty completion is a
    /// [`LlmError::Response`].
    pub async fn generate(
        &self,
        input: GenerationInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let request = self.request(&input);
        let draft = complete_bounded(self.llm.as_ref(), request, self.timeout, cancel).await?;
        let draft = draft.trim();
        if draft.is_empty() {
            return Err(LlmError::Response("empty completion".to_string()));
        }
        Ok(draft.to_string())
    }

    fn request(&self, input: &GenerationInput<'_>) -> CompletionRequest {
        let mut messages = vec![ChatMessage::system(system_prompt(input))];
        messages.extend(history_messages(input.history, self.history_turns));
        messages.push(ChatMessage::user(input.ask));

        let task = input.instruction.task();
        CompletionRequest::new(
            messages,
            CompletionOptions::new(CallPurpose::Generate, self.model.clone(), task.temperature())
                .with_max_tokens(u32::try_from(input.max_tokens).unwrap_or(u32::MAX)),
        )
    }
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn task_directive(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Rewrite => "Rewrite the target text as asked. Return only the rewritten text.",
        TaskKind::Summarize => "Summarize the target text or sources faithfully and briefly.",
        TaskKind::Extend => {
            "Continue the target text in the same voice. Return only the new content."
        }
        TaskKind::Outline => "Produce a structured outline with headings and bullet points.",
        TaskKind::Critique => "Review the target text and give specific, actionable feedback.",
        TaskKind::FactCheck => {
            "Check each claim against the sources and say whether it is supported."
        }
        TaskKind::ReferenceInsert => "Add citations from the sources to the target text.",
        TaskKind::Compare => "Compare the items point by point, using only the sources.",
        TaskKind::TableCreate => "Create a markdown table for the subject.",
        TaskKind::TableEdit => "Apply the requested change to the table and return the table.",
        TaskKind::Style => "Restyle the target text as asked without changing its meaning.",
        TaskKind::Plan => "Produce a step-by-step plan.",
        TaskKind::Extract => "Extract the requested facts as a concise list.",
    }
}

/// Instruction as shown to the model: refs become source numbers
fn instruction_view(input: &GenerationInput<'_>) -> Value {
    let mut value = serde_json::to_value(input.instruction).unwrap_or(Value::Null);
    if let Some(object) = value.as_object_mut() {
        let refs: Vec<Value> = input
            .instruction
            .context_refs
            .iter()
            .filter_map(|r| {
                input
                    .catalog
                    .source_number(input.bundle, r)
                    .map(|n| json!({ "source": n, "why": r.why }))
            })
            .collect();
        object.insert("context_refs".to_string(), Value::Array(refs));
        object.remove("telemetry");
    }
    value
}

fn system_prompt(input: &GenerationInput<'_>) -> String {
    let task = input.instruction.task();
    let mut prompt = format!(
        "You are a writing assistant working inside the user's document editor.\n{}\n",
        task_directive(task)
    );

    let _ = writeln!(prompt, "\nInstruction:\n{}", instruction_view(input));

    if input.catalog.source_count() > 0 {
        let _ = write!(
            prompt,
            "\nSources:\n{}",
            input.catalog.render_numbered(input.bundle)
        );
    }

    if !input.guidance.is_empty() {
        prompt.push_str("\nGuidelines:\n");
        for line in input.guidance {
            let _ = writeln!(prompt, "- {line}");
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use scribe_types::{
        Constraints, ContextRef, EvidenceChunk, RefKind, TaskInputs, Telemetry, Turn,
    };
    use std::collections::HashMap;

    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<CompletionRequest>>,
        reply: String,
    }

    #[async_trait]
    impl LlmClient for Capture {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().push(request);
            Ok(self.reply.clone())
        }
    }

    fn instruction(task: TaskKind) -> InstructionJson {
        InstructionJson {
            inputs: TaskInputs::minimal(task, "Our revenue grew."),
            targets: Vec::new(),
            context_refs: vec![ContextRef {
                kind: RefKind::Doc,
                id: "secret-doc-17#0".into(),
                why: "growth figure".into(),
            }],
            constraints: Constraints::default(),
            telemetry: Telemetry::default(),
        }
    }

    #[tokio::test]
    async fn prompt_uses_titles_and_numbers_only() {
        let llm = Arc::new(Capture {
            reply: "  Revenue grew 12% [1].  ".into(),
            ..Capture::default()
        });
        let generator = ResponseGenerator::new(llm.clone(), &LlmConfig::default());

        let bundle = EvidenceBundle {
            chunks: vec![EvidenceChunk::new("secret-doc-17#0", "secret-doc-17", "Revenue grew 12%.", 0.9)],
            ..EvidenceBundle::default()
        };
        let mut titles = HashMap::new();
        titles.insert("secret-doc-17".into(), "Q3 Report".to_string());
        let catalog = EvidenceCatalog::build(&bundle, &titles);
        let mut history = ConversationHistory::default();
        history.push(Turn::user("hello"));
        history.push(Turn::assistant("hi"));
        let instruction = instruction(TaskKind::FactCheck);
        let guidance = vec!["Keep it short.".to_string()];

        let draft = generator
            .generate(
                GenerationInput {
                    ask: "Check the growth claim",
                    instruction: &instruction,
                    bundle: &bundle,
                    catalog: &catalog,
                    guidance: &guidance,
                    history: &history,
                    max_tokens: 900,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(draft, "Revenue grew 12% [1].");

        let seen = llm.seen.lock();
        let request = &seen[0];
        let system = &request.messages[0].content;
        assert!(system.contains("[1] Q3 Report"));
        assert!(system.contains(r#""source":1"#));
        assert!(system.contains("- Keep it short."));
        assert!(!system.contains("secret-doc-17"));
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[3], ChatMessage::user("Check the growth claim"));
        assert!(request.options.temperature <= 0.2);
        assert_eq!(request.options.max_tokens, Some(900));
        assert_eq!(request.options.purpose, CallPurpose::Generate);
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let llm = Arc::new(Capture {
            reply: "   ".into(),
            ..Capture::default()
        });
        let generator = ResponseGenerator::new(llm, &LlmConfig::default());
        let instruction = instruction(TaskKind::Rewrite);
        let err = generator
            .generate(
                GenerationInput {
                    ask: "Rewrite",
                    instruction: &instruction,
                    bundle: &EvidenceBundle::empty(),
                    catalog: &EvidenceCatalog::default(),
                    guidance: &[],
                    history: &ConversationHistory::default(),
                    max_tokens: 100,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Response(_)));
    }
}
