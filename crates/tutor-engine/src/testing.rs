//! Scripted generation client shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::Notify;

use crate::error::GenerationFailure;
use crate::generation::GenerationClient;
use crate::prompt::GenerationPrompt;

/// One scripted reply, optionally held back until `gate` is notified.
pub struct Step {
    pub reply: Result<String, GenerationFailure>,
    pub gate: Option<Arc<Notify>>,
}

/// Replays scripted replies in order and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<GenerationPrompt>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, raw: impl Into<String>) -> Self {
        self.push(Ok(raw.into()), None)
    }

    pub fn fail(self, failure: GenerationFailure) -> Self {
        self.push(Err(failure), None)
    }

    /// Queues a reply that is only delivered once the returned gate is notified.
    pub fn gated_reply(self, raw: impl Into<String>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (self.push(Ok(raw.into()), Some(Arc::clone(&gate))), gate)
    }

    fn push(self, reply: Result<String, GenerationFailure>, gate: Option<Arc<Notify>>) -> Self {
        self.steps.lock().unwrap().push_back(Step { reply, gate });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, GenerationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        let step = self.steps.lock().unwrap().pop_front();
        let Some(step) = step else {
            return Err(GenerationFailure::transport("no scripted reply left"));
        };
        if let Some(gate) = step.gate {
            gate.notified().await;
        }
        step.reply
    }
}

/// A well-formed module reply with short answer questions answered `A0`, `A1`, ...
pub fn module_json(title: &str, quiz_items: usize) -> String {
    let quiz: Vec<_> = (0..quiz_items)
        .map(|i| {
            json!({
                "question": format!("Question {i}?"),
                "kind": "short_answer",
                "correctAnswer": format!("A{i}"),
                "explanation": format!("Because A{i}."),
            })
        })
        .collect();

    json!({
        "title": title,
        "objectives": ["Understand the basics"],
        "introduction": format!("Welcome to {title}."),
        "explanation": "Step by step.",
        "practiceItems": [
            {"question": "Try one", "hint": "Look closely", "solution": "Done", "difficulty": "easy"}
        ],
        "quizItems": quiz,
        "summaryPoints": ["Recap"],
        "nextModulePreview": "More to come",
    })
    .to_string()
}
