//! End-to-end session scenarios.
//!
//! These tests drive a full session through the public API with a scripted
//! generation client: start, walk the phases, answer the quiz, evaluate,
//! and request the next module.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tutor_engine::{
    normalize, validate, Config, GenerationClient, GenerationFailure, GenerationPrompt,
    JsonlProgressLog, PerformanceLevel, Phase, PhaseContent, ProgressSink, QuizKind,
    SessionOrchestrator, SessionSettings, TutorError, ACCEPT_ANY_ANSWER,
};

/// Replays canned replies and records prompts.
#[derive(Default)]
struct CannedClient {
    replies: Mutex<VecDeque<Result<String, GenerationFailure>>>,
    prompts: Mutex<Vec<GenerationPrompt>>,
}

impl CannedClient {
    fn with_replies(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts.lock().expect("prompt lock").clone()
    }
}

impl GenerationClient for CannedClient {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, GenerationFailure> {
        self.prompts.lock().expect("prompt lock").push(prompt.clone());
        let reply = self.replies.lock().expect("reply lock").pop_front();
        reply.unwrap_or_else(|| Err(GenerationFailure::transport("no reply left")))
    }
}

/// Path to the integration fixtures.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn settings() -> SessionSettings {
    Config::load_from_file(&fixture_path().join("tutor.json"))
        .expect("Failed to load fixture config")
        .session
}

/// An algebra module with the given `(question, answer)` pairs.
fn algebra_module(title: &str, quiz: &[(&str, &str)]) -> String {
    let quiz_items: Vec<_> = quiz
        .iter()
        .map(|(question, answer)| {
            json!({
                "question": question,
                "type": "short answer",
                "answer": answer,
                "explanation": format!("The answer is {answer}."),
            })
        })
        .collect();

    format!(
        "Here is your module:\n```json\n{}\n```\nGood luck!",
        json!({
            "title": title,
            "objectives": ["Solve linear equations", "Check solutions"],
            "introduction": "Equations balance two expressions.",
            "explanation": "Do the same thing to both sides.",
            "practiceItems": [
                {"question": "Solve x + 1 = 3", "hint": "Subtract 1", "solution": "x = 2", "difficulty": "Easy"}
            ],
            "quizItems": quiz_items,
            "summaryPoints": ["Balance both sides"],
            "nextModulePreview": "Quadratic equations",
        })
    )
}

async fn walk_to_quiz<C: GenerationClient>(orch: &SessionOrchestrator<C>) {
    for expected in [Phase::Explanation, Phase::Practice, Phase::Quiz] {
        let view = orch.advance().await.expect("advance");
        assert_eq!(view.phase, expected);
    }
}

#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path().join("tutor.json"))
        .expect("Failed to load config");

    assert_eq!(config.generator.model, "tutor-test-model");
    assert_eq!(config.generator.api_key_env, "TUTOR_FIXTURE_KEY");
    assert_eq!(config.generator.timeout_secs, 5);
    assert_eq!(config.session.quiz_item_count, 3);
    assert_eq!(config.session.max_source_chars, 2000);
    assert!(config.progress_log.is_none());
}

/// Algebra, three quiz items, every answer right modulo case and whitespace.
#[tokio::test]
async fn test_happy_path_scores_strong() {
    let client = CannedClient::with_replies([algebra_module(
        "Linear equations",
        &[("2x = 4, x = ?", "2"), ("x + 3 = 5, x = ?", "2"), ("Name of x?", "Variable")],
    )]);
    let orch = SessionOrchestrator::new(client, settings());

    let view = orch.start_session("Algebra", None).await.expect("start");
    assert_eq!(view.module_title, "Linear equations");
    assert_eq!(view.phase, Phase::Intro);
    assert!(matches!(
        view.content,
        PhaseContent::Intro { ref objectives, .. } if objectives.len() == 2
    ));

    walk_to_quiz(&orch).await;

    orch.submit_answer(0, "2").await.expect("answer 0");
    orch.submit_answer(1, " 2 ").await.expect("answer 1");
    orch.submit_answer(2, "VARIABLE").await.expect("answer 2");

    let outcome = orch.evaluate().await.expect("evaluate");
    assert_eq!(outcome.score, 100);
    assert_eq!(outcome.performance_level, PerformanceLevel::Strong);
    assert_eq!(outcome.correct, vec![true, true, true]);

    let view = orch.snapshot().await.expect("snapshot");
    assert_eq!(view.phase, Phase::Summary);
    assert_eq!(view.last_score, Some(100));
    assert_eq!(view.performance_level, Some(PerformanceLevel::Strong));
}

/// The generator ignores the JSON instruction entirely.
#[tokio::test]
async fn test_malformed_output_scores_full_marks() {
    let client = CannedClient::with_replies(["Sure! Here's your lesson: ...".to_string()]);
    let orch = SessionOrchestrator::new(client, settings());

    let view = orch.start_session("Algebra", None).await.expect("start");
    assert!(!view.module_title.is_empty());

    let state = orch.state().await.expect("state");
    let module = state.current_module().expect("module");
    assert!(!module.objectives.is_empty());
    assert_eq!(module.quiz_items.len(), 1);
    assert_eq!(module.quiz_items[0].kind, QuizKind::ShortAnswer);
    assert_eq!(module.quiz_items[0].correct_answer, ACCEPT_ANY_ANSWER);
    assert_eq!(module.explanation, "Sure! Here's your lesson: ...");

    walk_to_quiz(&orch).await;
    orch.submit_answer(0, "anything at all").await.expect("answer");

    let outcome = orch.evaluate().await.expect("evaluate");
    assert_eq!(outcome.score, 100);
    assert_eq!(outcome.performance_level, PerformanceLevel::Strong);
}

/// Five quiz items, none right.
#[tokio::test]
async fn test_all_wrong_scores_weak_and_reteaches() {
    let quiz = [("Q1", "a"), ("Q2", "b"), ("Q3", "c"), ("Q4", "d"), ("Q5", "e")];
    let client = CannedClient::with_replies([
        algebra_module("Linear equations", &quiz),
        algebra_module("Linear equations revisited", &quiz),
    ]);
    let orch = SessionOrchestrator::new(client, settings());
    orch.start_session("Algebra", None).await.expect("start");
    walk_to_quiz(&orch).await;

    for i in 0..4 {
        orch.submit_answer(i, "wrong").await.expect("answer");
    }

    let outcome = orch.evaluate().await.expect("evaluate");
    assert_eq!(outcome.score, 0);
    assert_eq!(outcome.performance_level, PerformanceLevel::Weak);

    let view = orch.request_next_module().await.expect("next module");
    assert_eq!(view.module_number, 2);
    assert_eq!(view.module_title, "Linear equations revisited");
    assert_eq!(view.phase, Phase::Intro);
    assert!(view.last_score.is_none());

    let prompts = orch.client().prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].user.contains("module 2"));
    assert!(prompts[1].user.contains("Re-teach"));
    assert!(prompts[1].user.contains("- Q5"));
}

/// Expected `"Paris"`, submitted `"  paris "`.
#[tokio::test]
async fn test_whitespace_and_case_insensitive_match() {
    let client = CannedClient::with_replies([algebra_module(
        "Capitals",
        &[("Capital of France?", "Paris"), ("Capital of Spain?", "Madrid")],
    )]);
    let orch = SessionOrchestrator::new(client, settings());
    orch.start_session("Geography", None).await.expect("start");
    orch.jump_to(Phase::Quiz).await.expect("jump");

    orch.submit_answer(0, "  paris ").await.expect("answer");
    orch.submit_answer(1, "Barcelona").await.expect("answer");

    let outcome = orch.evaluate().await.expect("evaluate");
    assert_eq!(outcome.correct, vec![true, false]);
    assert_eq!(outcome.score, 50);
    assert_eq!(outcome.performance_level, PerformanceLevel::Weak);
}

#[tokio::test]
async fn test_quiz_phase_hides_answers_until_summary() {
    let client = CannedClient::with_replies([algebra_module(
        "Capitals",
        &[("Capital of France?", "Paris")],
    )]);
    let orch = SessionOrchestrator::new(client, settings());
    orch.start_session("Geography", None).await.expect("start");

    let view = orch.jump_to(Phase::Quiz).await.expect("jump");
    let json = serde_json::to_string(&view).expect("serialize");
    assert!(json.contains("Capital of France?"));
    assert!(!json.contains("Paris"));

    orch.submit_answer(0, "paris").await.expect("answer");
    orch.evaluate().await.expect("evaluate");

    let view = orch.snapshot().await.expect("snapshot");
    let PhaseContent::Summary { review, .. } = view.content else {
        panic!("expected summary content, got {:?}", view.content);
    };
    assert_eq!(review[0].correct_answer, "Paris");
    assert!(review[0].correct);
}

#[tokio::test]
async fn test_invalid_operations_do_not_mutate_state() {
    let client = CannedClient::with_replies([algebra_module("Capitals", &[("Q", "A")])]);
    let orch = SessionOrchestrator::new(client, settings());
    orch.start_session("Geography", None).await.expect("start");
    let before = orch.snapshot().await.expect("snapshot");

    assert!(matches!(
        orch.evaluate().await,
        Err(TutorError::InvalidPhaseTransition { .. })
    ));
    assert!(matches!(
        orch.submit_answer(0, "A").await,
        Err(TutorError::InvalidPhaseTransition { .. })
    ));
    assert_eq!(orch.snapshot().await.expect("snapshot"), before);
}

#[tokio::test]
async fn test_progress_log_records_each_evaluation() {
    let dir = std::env::temp_dir().join(format!("tutor_it_progress_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let log = Arc::new(JsonlProgressLog::open(dir.join("progress.jsonl")).expect("open log"));

    let client = CannedClient::with_replies([
        algebra_module("One", &[("Q", "A")]),
        algebra_module("Two", &[("Q", "A")]),
    ]);
    let orch = SessionOrchestrator::new(client, settings())
        .with_progress_sink(Arc::clone(&log) as Arc<dyn ProgressSink>);

    orch.start_session("Algebra", None).await.expect("start");
    orch.jump_to(Phase::Quiz).await.expect("jump");
    orch.submit_answer(0, "a").await.expect("answer");
    orch.evaluate().await.expect("evaluate");

    orch.request_next_module().await.expect("next");
    orch.jump_to(Phase::Quiz).await.expect("jump");
    orch.evaluate().await.expect("evaluate");

    let records = log.read_all().expect("read log");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].module_title, "One");
    assert_eq!(records[0].score, 100);
    assert_eq!(records[1].module_number, 2);
    assert_eq!(records[1].score, 0);
    assert_eq!(records[1].performance_level, PerformanceLevel::Weak);
}

#[test]
fn test_pipeline_is_total_over_odd_inputs() {
    let inputs = [
        String::new(),
        "   ".to_string(),
        "{".to_string(),
        "}{".to_string(),
        "[1, 2, 3]".to_string(),
        r#"{"title": 42, "quizItems": "none"}"#.to_string(),
        r#"{"quizItems": [{"question": "Pick", "kind": "multiple_choice", "options": ["only"]}]}"#
            .to_string(),
        "\u{1F600} emoji lesson".repeat(100),
    ];

    for raw in inputs {
        let module = validate(&normalize(&raw).candidate, 3);
        assert_eq!(module.module_number, 3);
        assert!(!module.title.is_empty(), "empty title for {raw:?}");
        assert!(!module.objectives.is_empty(), "no objectives for {raw:?}");
        for item in &module.quiz_items {
            if item.kind == QuizKind::MultipleChoice {
                assert!(item.options.len() >= 2, "bad options for {raw:?}");
            } else {
                assert!(item.options.is_empty(), "stray options for {raw:?}");
            }
        }
    }
}
