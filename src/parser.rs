// src/parser.rs
//! Script Parser: raw prose in, ordered scene list out. The heavy lifting
//! is delegated to a structured-output model call; this module owns the
//! prompt, the response schema, and the mapping onto `Scene` records.

use crate::error::{PipelineError, Result};
use crate::scene::Scene;
use crate::services::StructuredTextService;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct ScriptParser {
    text: Arc<dyn StructuredTextService>,
}

/// Raw per-scene shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ParsedScene {
    title: String,
    visual_description: String,
    narrative_context: String,
    #[serde(default)]
    reference_image_url: Option<String>,
}

impl ScriptParser {
    pub fn new(text: Arc<dyn StructuredTextService>) -> Self {
        Self { text }
    }

    /// Break a raw script into ordered scenes. An empty list is a valid
    /// result; a service failure or an unparseable response aborts the run.
    pub async fn parse(&self, script: &str) -> Result<Vec<Scene>> {
        let prompt = build_prompt(script);
        let value = self.text.generate_structured(&prompt, scene_list_schema()).await?;
        let scenes = scenes_from_value(value)?;
        info!("parsed script into {} scene(s)", scenes.len());
        Ok(scenes)
    }
}

fn build_prompt(script: &str) -> String {
    format!(
        "You are a film director breaking a script into shots. Split the \
         following script into an ordered list of scenes. For each scene \
         provide: a short title; a visual_description usable as a video \
         generation prompt (setting, subjects, camera, lighting); a \
         narrative_context sentence describing what happens and how it \
         connects to the surrounding scenes; and, only if the script \
         explicitly mentions an image URL for that scene, its \
         reference_image_url.\n\nScript:\n{}",
        script
    )
}

fn scene_list_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "visual_description": { "type": "STRING" },
                "narrative_context": { "type": "STRING" },
                "reference_image_url": { "type": "STRING" }
            },
            "required": ["title", "visual_description", "narrative_context"]
        }
    })
}

/// Map the decoded response onto scenes with a dense 1-based index
/// sequence in input order.
fn scenes_from_value(value: Value) -> Result<Vec<Scene>> {
    let parsed: Vec<ParsedScene> = serde_json::from_value(value)
        .map_err(|e| PipelineError::ScriptParse(format!("unexpected scene list shape: {}", e)))?;

    Ok(parsed
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            Scene::new(
                (i + 1) as u32,
                p.title,
                p.visual_description,
                p.narrative_context,
                p.reference_image_url,
            )
        })
        .collect())
}
