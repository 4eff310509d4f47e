// src/orchestrator.rs
//! Production Orchestrator: drives one run from raw script to produced
//! clips, strictly one scene at a time. Holds the observable state (scene
//! list, run status, progress log) and sequences parser, continuity,
//! asset preparation, and synthesis per scene, carrying the updated
//! previous scene forward so extension decisions always see the latest
//! synthesis results.

use crate::assets::AssetPreparer;
use crate::config::PipelineConfig;
use crate::continuity::ContinuityEvaluator;
use crate::error::Result;
use crate::fetch::HttpFetcher;
use crate::gemini_client::GeminiClient;
use crate::parser::ScriptParser;
use crate::progress::{EventRole, ProgressEvent, ProgressLog};
use crate::scene::{Scene, SceneStatus};
use crate::services::{
    FixedInterval, ImageService, PollPolicy, RemoteFetcher, StructuredTextService, VideoJobService,
};
use crate::synthesis::VideoSynthesizer;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Run-level state machine. `Error` is reachable from any in-progress
/// state; a failed run is not resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Parsing,
    Producing,
    Wrapped,
    Stopped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

pub struct ProductionOrchestrator {
    parser: ScriptParser,
    continuity: ContinuityEvaluator,
    assets: AssetPreparer,
    synthesizer: VideoSynthesizer,
    scenes: RwLock<Vec<Scene>>,
    status: RwLock<RunStatus>,
    run_info: RwLock<Option<RunInfo>>,
    log: Arc<ProgressLog>,
}

impl ProductionOrchestrator {
    /// Wire the pipeline against explicit service implementations.
    pub fn new(
        text: Arc<dyn StructuredTextService>,
        images: Arc<dyn ImageService>,
        fetcher: Arc<dyn RemoteFetcher>,
        jobs: Arc<dyn VideoJobService>,
        poll: Arc<dyn PollPolicy>,
    ) -> Self {
        Self {
            parser: ScriptParser::new(text.clone()),
            continuity: ContinuityEvaluator::new(text),
            assets: AssetPreparer::new(fetcher, images),
            synthesizer: VideoSynthesizer::new(jobs, poll),
            scenes: RwLock::new(Vec::new()),
            status: RwLock::new(RunStatus::Idle),
            run_info: RwLock::new(None),
            log: Arc::new(ProgressLog::new()),
        }
    }

    /// Standard wiring: one Gemini client behind every generative contract,
    /// plain HTTP for reference images, fixed-interval polling.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let gemini = Arc::new(GeminiClient::new(config));
        Self::new(
            gemini.clone(),
            gemini.clone(),
            Arc::new(HttpFetcher::new()),
            gemini,
            Arc::new(FixedInterval::new(config.poll_interval)),
        )
    }

    /// Execute one full run. The cancellation token is advisory and
    /// observed only before each new scene: an in-flight scene always
    /// finishes or fails before the loop halts.
    pub async fn run(&self, script: &str, cancel: CancellationToken) -> Result<()> {
        self.reset().await;

        let run_id = self
            .run_info
            .read()
            .await
            .as_ref()
            .map(|info| info.id.clone())
            .unwrap_or_default();
        info!("production run {} started", run_id);
        self.log.info(EventRole::Director, "production run started");

        *self.status.write().await = RunStatus::Parsing;
        let parsed = match self.parser.parse(script).await {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("script parsing failed: {}", e);
                self.log
                    .error(EventRole::Director, format!("run aborted: {}", e));
                self.finish(RunStatus::Failed).await;
                return Err(e);
            }
        };

        let total = parsed.len();
        self.log
            .info(EventRole::Parser, format!("script parsed into {} scene(s)", total));
        *self.scenes.write().await = parsed;
        *self.status.write().await = RunStatus::Producing;

        let mut previous: Option<Scene> = None;
        for idx in 0..total {
            if cancel.is_cancelled() {
                warn!("stop requested; halting before scene {}", idx + 1);
                self.log.info(
                    EventRole::Director,
                    format!("stop requested; run halted before scene {}", idx + 1),
                );
                self.finish(RunStatus::Stopped).await;
                return Ok(());
            }

            match self.produce_scene(idx, previous.as_ref()).await {
                Ok(updated) => previous = Some(updated),
                Err(e) => {
                    self.mark_scene_error(idx).await;
                    error!("scene {} failed: {}", idx + 1, e);
                    self.log
                        .error(EventRole::Director, format!("run aborted: {}", e));
                    self.finish(RunStatus::Failed).await;
                    return Err(e);
                }
            }
        }

        self.log.info(
            EventRole::Director,
            format!("that's a wrap: {} scene(s) produced", total),
        );
        self.finish(RunStatus::Wrapped).await;
        Ok(())
    }

    /// One scene through analyzing, conditional asset preparation, and
    /// generation. Returns the updated record for the next iteration.
    async fn produce_scene(&self, idx: usize, previous: Option<&Scene>) -> Result<Scene> {
        let scene = self.scenes.read().await[idx].clone();

        self.set_scene_status(idx, SceneStatus::Analyzing).await;
        self.log.info(
            EventRole::Director,
            format!("scene {} \"{}\": analyzing continuity", scene.index, scene.title),
        );

        let decision = self.continuity.evaluate(&scene, previous).await?;
        self.log.info(
            EventRole::Continuity,
            format!("scene {}: {}", scene.index, decision.rationale),
        );
        {
            let mut scenes = self.scenes.write().await;
            scenes[idx].extends_previous = Some(decision.extend);
            scenes[idx].qa_feedback = Some(decision.rationale.clone());
        }

        // Asset preparation is skipped whenever continuity judged this an
        // extension, even if the handle turns out to be missing.
        let seed_image = if decision.extend {
            None
        } else {
            self.set_scene_status(idx, SceneStatus::PreparingAssets).await;
            self.log.info(
                EventRole::Director,
                format!("scene {}: preparing starting image", scene.index),
            );
            let seed = self.assets.prepare(&scene, &self.log).await;
            self.scenes.write().await[idx].seed_image = seed.clone();
            seed
        };

        let previous_handle = previous.and_then(|p| p.continuation.clone());

        self.set_scene_status(idx, SceneStatus::Generating).await;
        self.log.info(
            EventRole::Director,
            format!("scene {}: generating video", scene.index),
        );

        let outcome = self
            .synthesizer
            .produce(
                &scene,
                decision.extend,
                previous_handle.as_ref(),
                seed_image,
                &self.log,
            )
            .await?;

        let updated = {
            let mut scenes = self.scenes.write().await;
            scenes[idx].video_uri = Some(outcome.video_uri);
            scenes[idx].continuation = outcome.continuation;
            scenes[idx].status = SceneStatus::Completed;
            scenes[idx].clone()
        };
        self.log.info(
            EventRole::Director,
            format!("scene {} completed", updated.index),
        );

        Ok(updated)
    }

    /// Discard all prior state before a new run.
    async fn reset(&self) {
        self.scenes.write().await.clear();
        self.log.clear();
        *self.status.write().await = RunStatus::Idle;
        *self.run_info.write().await = Some(RunInfo {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
        });
    }

    async fn finish(&self, status: RunStatus) {
        *self.status.write().await = status;
        if let Some(info) = self.run_info.write().await.as_mut() {
            info.finished_at = Some(Utc::now());
        }
    }

    async fn set_scene_status(&self, idx: usize, status: SceneStatus) {
        self.scenes.write().await[idx].status = status;
    }

    async fn mark_scene_error(&self, idx: usize) {
        let mut scenes = self.scenes.write().await;
        if let Some(scene) = scenes.get_mut(idx) {
            scene.status = SceneStatus::Error;
        }
    }

    /// Ordered scene list with live status, for observers.
    pub async fn scenes(&self) -> Vec<Scene> {
        self.scenes.read().await.clone()
    }

    pub async fn status(&self) -> RunStatus {
        *self.status.read().await
    }

    pub async fn run_info(&self) -> Option<RunInfo> {
        self.run_info.read().await.clone()
    }

    /// Time-ordered progress log.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.log.snapshot()
    }

    /// Live progress feed for a rendering layer.
    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<ProgressEvent> {
        self.log.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::progress::Severity;
    use crate::scene::{ContinuationHandle, ImagePayload};
    use crate::services::{
        FetchedResource, VideoJobRef, VideoJobStatus, VideoMode, VideoRequest,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn scene_value(title: &str) -> Value {
        json!({
            "title": title,
            "visual_description": format!("{}, wide shot", title),
            "narrative_context": format!("{} unfolds", title)
        })
    }

    fn extend(rationale: &str) -> Value {
        json!({ "extend": true, "rationale": rationale })
    }

    fn cut(rationale: &str) -> Value {
        json!({ "extend": false, "rationale": rationale })
    }

    /// Structured-text fake: replies to the parser (array schema) with one
    /// canned scene list and to continuity (object schema) with a scripted
    /// sequence of verdicts.
    struct ScriptedText {
        parse_reply: Option<Value>,
        continuity_replies: Mutex<Vec<Value>>,
        continuity_calls: AtomicUsize,
    }

    impl ScriptedText {
        fn new(parse_reply: Value, continuity_replies: Vec<Value>) -> Self {
            Self {
                parse_reply: Some(parse_reply),
                continuity_replies: Mutex::new(continuity_replies),
                continuity_calls: AtomicUsize::new(0),
            }
        }

        fn failing_parse() -> Self {
            Self {
                parse_reply: None,
                continuity_replies: Mutex::new(Vec::new()),
                continuity_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StructuredTextService for ScriptedText {
        async fn generate_structured(&self, _prompt: &str, schema: Value) -> Result<Value> {
            if schema["type"] == json!("ARRAY") {
                self.parse_reply
                    .clone()
                    .ok_or_else(|| PipelineError::service("gemini", "model unavailable"))
            } else {
                self.continuity_calls.fetch_add(1, Ordering::SeqCst);
                Ok(self.continuity_replies.lock().unwrap().remove(0))
            }
        }
    }

    struct CountingImages {
        calls: AtomicUsize,
    }

    impl CountingImages {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageService for CountingImages {
        async fn generate_images(&self, _prompt: &str) -> Result<Vec<ImagePayload>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ImagePayload {
                mime_type: "image/png".to_string(),
                data_base64: "Zm9v".to_string(),
            }])
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl RemoteFetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource> {
            Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: "status 404 Not Found".to_string(),
            })
        }
    }

    struct InstantPoll;

    #[async_trait]
    impl PollPolicy for InstantPoll {
        async fn wait(&self) {}
    }

    /// Job service that completes every job immediately, minting a fresh
    /// handle per clip, recording every request, and optionally cancelling
    /// a token on the first poll (to model a stop fired mid-scene).
    struct RecordingJobs {
        submitted: Mutex<Vec<VideoRequest>>,
        clips: AtomicUsize,
        fail_on_submit: Option<usize>,
        cancel_on_first_poll: Option<CancellationToken>,
        polled_once: AtomicBool,
    }

    impl RecordingJobs {
        fn new() -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                clips: AtomicUsize::new(0),
                fail_on_submit: None,
                cancel_on_first_poll: None,
                polled_once: AtomicBool::new(false),
            }
        }

        fn failing_job(nth_submit: usize) -> Self {
            Self {
                fail_on_submit: Some(nth_submit),
                ..Self::new()
            }
        }

        fn cancelling(token: CancellationToken) -> Self {
            Self {
                cancel_on_first_poll: Some(token),
                ..Self::new()
            }
        }

        fn submit_count(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VideoJobService for RecordingJobs {
        async fn submit(&self, request: &VideoRequest) -> Result<VideoJobRef> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(VideoJobRef {
                name: format!("operations/{}", self.submitted.lock().unwrap().len()),
            })
        }

        async fn poll(&self, job: &VideoJobRef) -> Result<VideoJobStatus> {
            if let Some(token) = &self.cancel_on_first_poll {
                if !self.polled_once.swap(true, Ordering::SeqCst) {
                    token.cancel();
                    return Ok(VideoJobStatus::Pending);
                }
            }

            if let Some(nth) = self.fail_on_submit {
                if self.submit_count() == nth {
                    return Ok(VideoJobStatus::Failed {
                        message: format!("job {} rejected", job.name),
                    });
                }
            }

            let clip = self.clips.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(VideoJobStatus::Done {
                video_uri: Some(format!("https://files.example/clip-{}.mp4", clip)),
                continuation: Some(ContinuationHandle::new(
                    json!({ "uri": format!("https://files.example/clip-{}.mp4", clip) }),
                )),
            })
        }
    }

    struct Harness {
        text: Arc<ScriptedText>,
        images: Arc<CountingImages>,
        jobs: Arc<RecordingJobs>,
        orchestrator: ProductionOrchestrator,
    }

    fn harness(text: ScriptedText, jobs: RecordingJobs) -> Harness {
        let text = Arc::new(text);
        let images = Arc::new(CountingImages::new());
        let jobs = Arc::new(jobs);
        let orchestrator = ProductionOrchestrator::new(
            text.clone(),
            images.clone(),
            Arc::new(FailingFetcher),
            jobs.clone(),
            Arc::new(InstantPoll),
        );
        Harness {
            text,
            images,
            jobs,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn three_scenes_without_continuity_are_three_fresh_generations() {
        let h = harness(
            ScriptedText::new(
                json!([scene_value("Pier"), scene_value("Boat"), scene_value("Storm")]),
                vec![cut("new location"), cut("time jump")],
            ),
            RecordingJobs::new(),
        );

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.orchestrator.status().await, RunStatus::Wrapped);
        let scenes = h.orchestrator.scenes().await;
        assert_eq!(scenes.len(), 3);
        assert!(scenes.iter().all(|s| s.status == SceneStatus::Completed));
        assert!(scenes.iter().all(|s| s.video_uri.is_some()));

        let submitted = h.jobs.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 3);
        assert!(submitted.iter().all(|r| r.mode == VideoMode::Fresh));
        assert!(submitted.iter().all(|r| r.continuation.is_none()));
        // first scene is judged locally, the other two via the model
        assert_eq!(h.text.continuity_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn extension_uses_previous_handle_and_skips_asset_prep() {
        let h = harness(
            ScriptedText::new(
                json!([scene_value("Chase"), scene_value("Chase continues")]),
                vec![extend("same tracking shot")],
            ),
            RecordingJobs::new(),
        );

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();

        let submitted = h.jobs.submitted.lock().unwrap();
        assert_eq!(submitted[0].mode, VideoMode::Fresh);
        assert_eq!(submitted[1].mode, VideoMode::Extension);
        let handle = submitted[1].continuation.as_ref().expect("handle");
        assert_eq!(
            handle.as_value()["uri"],
            json!("https://files.example/clip-1.mp4")
        );
        assert!(submitted[1].seed_image.is_none());
        // asset preparation ran for scene 1 only
        assert_eq!(h.images.calls.load(Ordering::SeqCst), 1);

        let scenes = h.orchestrator.scenes().await;
        assert_eq!(scenes[1].extends_previous, Some(true));
        assert!(scenes[1].seed_image.is_none());
    }

    #[tokio::test]
    async fn extend_verdict_without_handle_resolves_to_fresh() {
        // Continuity says extend for scene 2, but scene 1's synthesis
        // returned no handle, so the conjunction guard forces fresh mode.
        struct HandlelessJobs {
            inner: RecordingJobs,
        }

        #[async_trait]
        impl VideoJobService for HandlelessJobs {
            async fn submit(&self, request: &VideoRequest) -> Result<VideoJobRef> {
                self.inner.submit(request).await
            }

            async fn poll(&self, _job: &VideoJobRef) -> Result<VideoJobStatus> {
                Ok(VideoJobStatus::Done {
                    video_uri: Some("https://files.example/clip.mp4".to_string()),
                    continuation: None,
                })
            }
        }

        let text = Arc::new(ScriptedText::new(
            json!([scene_value("Chase"), scene_value("Chase continues")]),
            vec![extend("same tracking shot")],
        ));
        let jobs = Arc::new(HandlelessJobs {
            inner: RecordingJobs::new(),
        });
        let orchestrator = ProductionOrchestrator::new(
            text,
            Arc::new(CountingImages::new()),
            Arc::new(FailingFetcher),
            jobs.clone(),
            Arc::new(InstantPoll),
        );

        orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();

        let submitted = jobs.inner.submitted.lock().unwrap();
        assert_eq!(submitted[1].mode, VideoMode::Fresh);
        assert!(submitted[1].continuation.is_none());
    }

    #[tokio::test]
    async fn asset_failure_still_reaches_generation_without_a_seed() {
        let mut scene = scene_value("Pier");
        scene["reference_image_url"] = json!("https://img.example/missing.png");

        let h = harness(
            ScriptedText::new(json!([scene]), vec![]),
            RecordingJobs::new(),
        );

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.orchestrator.status().await, RunStatus::Wrapped);
        let scenes = h.orchestrator.scenes().await;
        assert_eq!(scenes[0].status, SceneStatus::Completed);
        assert!(scenes[0].seed_image.is_none());

        let submitted = h.jobs.submitted.lock().unwrap();
        assert!(submitted[0].seed_image.is_none());

        let warnings: Vec<_> = h
            .orchestrator
            .events()
            .into_iter()
            .filter(|e| e.severity == Severity::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].role, EventRole::Assets);
    }

    #[tokio::test]
    async fn job_failure_aborts_the_run_and_marks_the_scene() {
        let h = harness(
            ScriptedText::new(
                json!([scene_value("Pier"), scene_value("Boat")]),
                vec![cut("new location")],
            ),
            RecordingJobs::failing_job(1),
        );

        let err = h
            .orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::VideoJob { scene_index: 1, .. }));

        assert_eq!(h.orchestrator.status().await, RunStatus::Failed);
        let scenes = h.orchestrator.scenes().await;
        assert_eq!(scenes[0].status, SceneStatus::Error);
        assert_eq!(scenes[1].status, SceneStatus::Idle);
        assert_eq!(h.jobs.submit_count(), 1);

        let last = h.orchestrator.events().pop().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.role, EventRole::Director);
        assert!(last.message.contains("scene 1"));
    }

    #[tokio::test]
    async fn stop_mid_scene_finishes_the_scene_but_not_the_next() {
        let cancel = CancellationToken::new();
        let h = harness(
            ScriptedText::new(
                json!([scene_value("Pier"), scene_value("Boat")]),
                vec![cut("new location")],
            ),
            RecordingJobs::cancelling(cancel.clone()),
        );

        h.orchestrator.run("script", cancel).await.unwrap();

        assert_eq!(h.orchestrator.status().await, RunStatus::Stopped);
        let scenes = h.orchestrator.scenes().await;
        // scene 1 ran to completion despite the stop firing during its poll
        assert_eq!(scenes[0].status, SceneStatus::Completed);
        assert!(scenes[0].video_uri.is_some());
        // scene 2 was never started
        assert_eq!(scenes[1].status, SceneStatus::Idle);
        assert_eq!(h.jobs.submit_count(), 1);
    }

    #[tokio::test]
    async fn parser_failure_aborts_before_any_scene() {
        let h = harness(ScriptedText::failing_parse(), RecordingJobs::new());

        let err = h
            .orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Service { .. }));
        assert_eq!(h.orchestrator.status().await, RunStatus::Failed);
        assert!(h.orchestrator.scenes().await.is_empty());
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn empty_scene_list_wraps_immediately() {
        let h = harness(ScriptedText::new(json!([]), vec![]), RecordingJobs::new());

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.orchestrator.status().await, RunStatus::Wrapped);
        assert!(h.orchestrator.scenes().await.is_empty());
        let last = h.orchestrator.events().pop().unwrap();
        assert!(last.message.contains("wrap"));
    }

    #[tokio::test]
    async fn a_new_run_discards_prior_state() {
        let h = harness(
            ScriptedText::new(json!([scene_value("Pier")]), vec![]),
            RecordingJobs::new(),
        );

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();
        let first_run = h.orchestrator.run_info().await.unwrap();

        h.orchestrator
            .run("script", CancellationToken::new())
            .await
            .unwrap();
        let second_run = h.orchestrator.run_info().await.unwrap();

        assert_ne!(first_run.id, second_run.id);
        assert_eq!(h.orchestrator.scenes().await.len(), 1);
        // log was cleared between runs: exactly one wrap event remains
        let wraps = h
            .orchestrator
            .events()
            .into_iter()
            .filter(|e| e.message.contains("wrap"))
            .count();
        assert_eq!(wraps, 1);
    }
}
