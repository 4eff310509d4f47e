// src/continuity.rs
//! Continuity Evaluator: decides whether a scene visually extends its
//! predecessor (one continuous shot) or opens a new shot. The first scene
//! never extends and never costs an API call. An unparseable verdict
//! defaults to "do not extend" with the parse failure in the rationale; a
//! failed service call stays fatal.

use crate::error::Result;
use crate::scene::Scene;
use crate::services::StructuredTextService;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ContinuityDecision {
    pub extend: bool,
    pub rationale: String,
}

#[derive(Debug, Deserialize)]
struct ContinuityVerdict {
    extend: bool,
    rationale: String,
}

pub struct ContinuityEvaluator {
    text: Arc<dyn StructuredTextService>,
}

impl ContinuityEvaluator {
    pub fn new(text: Arc<dyn StructuredTextService>) -> Self {
        Self { text }
    }

    pub async fn evaluate(
        &self,
        scene: &Scene,
        previous: Option<&Scene>,
    ) -> Result<ContinuityDecision> {
        let previous = match previous {
            Some(previous) => previous,
            None => {
                return Ok(ContinuityDecision {
                    extend: false,
                    rationale: "first scene opens the film with a new shot".to_string(),
                })
            }
        };

        let prompt = build_prompt(previous, scene);
        let value = self.text.generate_structured(&prompt, verdict_schema()).await?;
        Ok(decision_from_value(value, scene.index))
    }
}

fn build_prompt(previous: &Scene, current: &Scene) -> String {
    format!(
        "You are judging shot continuity between two adjacent scenes of a \
         video. Decide whether the second scene should visually extend the \
         first as one continuous shot, or start as a new shot (a cut).\n\n\
         Previous scene \"{}\": {}\nContext: {}\n\n\
         Current scene \"{}\": {}\nContext: {}\n\n\
         Answer with extend=true only for the same continuous shot.",
        previous.title,
        previous.visual_prompt,
        previous.narrative_context,
        current.title,
        current.visual_prompt,
        current.narrative_context,
    )
}

fn verdict_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "extend": { "type": "BOOLEAN" },
            "rationale": { "type": "STRING" }
        },
        "required": ["extend", "rationale"]
    })
}

/// Safe default on a malformed verdict: a cut, with the parse failure
/// visible in the rationale.
fn decision_from_value(value: Value, scene_index: u32) -> ContinuityDecision {
    match serde_json::from_value::<ContinuityVerdict>(value) {
        Ok(verdict) => {
            debug!(
                "scene {} continuity verdict: extend={} ({})",
                scene_index, verdict.extend, verdict.rationale
            );
            ContinuityDecision {
                extend: verdict.extend,
                rationale: verdict.rationale,
            }
        }
        Err(e) => {
            warn!(
                "scene {} continuity verdict unparseable, defaulting to a new shot: {}",
                scene_index, e
            );
            ContinuityDecision {
                extend: false,
                rationale: format!("defaulted to a new shot: verdict unparseable ({})", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingText {
        calls: AtomicUsize,
        reply: Value,
    }

    #[async_trait]
    impl StructuredTextService for CountingText {
        async fn generate_structured(&self, _prompt: &str, _schema: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn scene(index: u32) -> Scene {
        Scene::new(
            index,
            format!("Scene {}", index),
            "a narrow alley at night".to_string(),
            "the chase continues".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn first_scene_never_extends_and_never_calls_out() {
        let text = Arc::new(CountingText {
            calls: AtomicUsize::new(0),
            reply: json!({ "extend": true, "rationale": "should not be consulted" }),
        });
        let evaluator = ContinuityEvaluator::new(text.clone());

        let decision = evaluator.evaluate(&scene(1), None).await.unwrap();
        assert!(!decision.extend);
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn well_formed_verdict_is_passed_through() {
        let text = Arc::new(CountingText {
            calls: AtomicUsize::new(0),
            reply: json!({ "extend": true, "rationale": "camera keeps tracking the runner" }),
        });
        let evaluator = ContinuityEvaluator::new(text.clone());

        let previous = scene(1);
        let decision = evaluator.evaluate(&scene(2), Some(&previous)).await.unwrap();
        assert!(decision.extend);
        assert_eq!(decision.rationale, "camera keeps tracking the runner");
        assert_eq!(text.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_verdict_defaults_to_new_shot() {
        let text = Arc::new(CountingText {
            calls: AtomicUsize::new(0),
            reply: json!({ "verdict": "yes" }),
        });
        let evaluator = ContinuityEvaluator::new(text);

        let previous = scene(1);
        let decision = evaluator.evaluate(&scene(2), Some(&previous)).await.unwrap();
        assert!(!decision.extend);
        assert!(decision.rationale.contains("unparseable"));
    }
}
