//! Generation Pipeline
//!
//! Turns `(template, input, options)` into a document, consulting the
//! artifact cache first. Misses on heavy templates go to the worker pool;
//! everything else, and every worker failure, renders in the calling task.

mod key;
mod message;
mod stats;
mod task;
mod worker;

pub use key::{cache_key, template_key_prefix, ARTIFACT_KEY_PREFIX};
pub use message::{WorkerRequest, WorkerResponse};
pub use stats::{PipelineMetrics, PipelineStats};
pub use task::{GenerationOptions, GenerationRequest, GenerationTask, Template, TemplateCategory};
pub use worker::{Worker, WorkerPool};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::cache::{ArtifactMetadata, GenerationPath};
use crate::config::PipelineConfig;
use crate::error::{GenerationError, RenderError, Result};
use crate::orchestrator::{CacheOrchestrator, WarmReport};
use crate::render::DocumentRenderer;

/// Worker outcome as delivered to the waiting caller.
type WorkerOutcome = std::result::Result<String, String>;

/// A caller waiting on a worker.
#[derive(Debug)]
struct PendingOperation {
    responder: oneshot::Sender<WorkerOutcome>,
    worker_id: usize,
    started_at: Instant,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingOperation>>>;

// == Generation Pipeline ==
pub struct GenerationPipeline {
    config: PipelineConfig,
    orchestrator: Arc<CacheOrchestrator>,
    renderer: Arc<dyn DocumentRenderer>,
    /// `None` when configured with zero workers or none could start
    pool: Option<WorkerPool>,
    pending: PendingMap,
    /// Per-key locks, used only with `single_flight`
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    metrics: PipelineMetrics,
}

impl GenerationPipeline {
    // == Constructor ==
    /// Starts the worker pool and its response dispatcher.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        orchestrator: Arc<CacheOrchestrator>,
        renderer: Arc<dyn DocumentRenderer>,
        config: PipelineConfig,
    ) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let pool = if config.worker_count == 0 {
            None
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            let pool = WorkerPool::spawn(config.worker_count, renderer.clone(), tx);
            tokio::spawn(dispatch_responses(pending.clone(), rx));
            (!pool.is_empty()).then_some(pool)
        };

        match &pool {
            Some(pool) => debug!("Generation pipeline started with {} workers", pool.len()),
            None => warn!("Generation pipeline running without workers, all renders in-process"),
        }

        Self {
            config,
            orchestrator,
            renderer,
            pool,
            pending,
            inflight: Mutex::new(HashMap::new()),
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<CacheOrchestrator> {
        &self.orchestrator
    }

    // == Generate ==
    /// Returns the cached document for these inputs, generating and caching
    /// it on a miss.
    pub async fn generate(
        &self,
        template: &Template,
        input: &Value,
        options: &GenerationOptions,
    ) -> Result<String> {
        self.metrics.record_request();
        let key = cache_key(template, input, options);

        if let Some(hit) = self.orchestrator.get_artifact(&key).await {
            self.metrics.record_hit();
            trace!("Artifact cache hit for {}", key);
            return Ok(hit);
        }
        self.metrics.record_miss();

        if !self.config.single_flight {
            return self.produce_and_store(&key, template, input, options).await;
        }

        let lock = self.inflight_lock(&key).await;
        let result = {
            let _guard = lock.lock().await;
            match self.orchestrator.get_artifact(&key).await {
                Some(hit) => {
                    self.metrics.record_deduplicated();
                    Ok(hit)
                }
                None => self.produce_and_store(&key, template, input, options).await,
            }
        };
        self.release_inflight(&key, &lock).await;
        result
    }

    /// Processes a batch of requests ahead of demand.
    pub async fn warm(self: &Arc<Self>, requests: Vec<GenerationRequest>) -> WarmReport {
        let mut keys = Vec::with_capacity(requests.len());
        let mut by_key = HashMap::with_capacity(requests.len());
        for req in requests {
            let key = cache_key(&req.template, &req.data, &req.options);
            keys.push(key.clone());
            by_key.entry(key).or_insert(req);
        }
        let by_key = Arc::new(by_key);

        let this = Arc::clone(self);
        self.orchestrator
            .warm_cache(keys, move |key| {
                let this = this.clone();
                let by_key = by_key.clone();
                async move {
                    let req = by_key
                        .get(&key)
                        .ok_or_else(|| GenerationError::Failed(format!("unknown key {key}")))?;
                    this.produce(&req.template, &req.data, &req.options).await
                }
            })
            .await
    }

    async fn produce_and_store(
        &self,
        key: &str,
        template: &Template,
        input: &Value,
        options: &GenerationOptions,
    ) -> Result<String> {
        let (output, metadata) = self.produce(template, input, options).await?;

        if let Err(e) = self
            .orchestrator
            .set_artifact(key, output.clone(), metadata)
            .await
        {
            self.metrics.record_store_rejection();
            warn!("Generated document for {} not cached: {}", key, e);
        }
        Ok(output)
    }

    /// Renders without touching the cache.
    async fn produce(
        &self,
        template: &Template,
        input: &Value,
        options: &GenerationOptions,
    ) -> Result<(String, ArtifactMetadata)> {
        let started = Instant::now();
        let mut worker_failure = None;

        if self.is_heavy(template, options) {
            if let Some(pool) = self.pool.as_ref().filter(|pool| pool.is_available()) {
                match self.render_on_worker(pool, template, input, options).await {
                    Ok(output) => {
                        let elapsed = elapsed_ms(started);
                        self.metrics.record_worker_generation(elapsed);
                        return Ok(self.finish(
                            template,
                            options,
                            output,
                            elapsed,
                            GenerationPath::Worker,
                        ));
                    }
                    Err(e) => {
                        self.metrics.record_worker_failure(&e);
                        warn!("Worker path failed for {}, falling back: {}", template.id, e);
                        worker_failure = Some(e);
                    }
                }
            }
        }

        match self.render_in_process(template, input) {
            Ok(output) => {
                let elapsed = elapsed_ms(started);
                self.metrics
                    .record_fallback_generation(elapsed, worker_failure.is_some());
                Ok(self.finish(template, options, output, elapsed, GenerationPath::Fallback))
            }
            Err(e) => {
                self.metrics.record_failure();
                error!("Generation failed for template {}: {}", template.id, e);
                match worker_failure {
                    Some(worker) => Err(GenerationError::Failed(format!(
                        "{worker}; fallback: {e}"
                    ))),
                    None => Err(GenerationError::Render(e)),
                }
            }
        }
    }

    /// Runs the renderer on the calling task. On a multi-threaded runtime the
    /// thread is handed over with `block_in_place` so other tasks keep moving.
    fn render_in_process(
        &self,
        template: &Template,
        input: &Value,
    ) -> std::result::Result<String, RenderError> {
        let multi_thread = Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);
        if multi_thread {
            tokio::task::block_in_place(|| self.renderer.render(template, input))
        } else {
            self.renderer.render(template, input)
        }
    }

    fn finish(
        &self,
        template: &Template,
        options: &GenerationOptions,
        output: String,
        generation_ms: u64,
        path: GenerationPath,
    ) -> (String, ArtifactMetadata) {
        debug!(
            "Generated {} v{} via {:?} in {}ms ({} bytes)",
            template.id,
            template.version,
            path,
            generation_ms,
            output.len()
        );
        let metadata = ArtifactMetadata {
            template_id: template.id.clone(),
            template_version: template.version,
            generated_at: Utc::now(),
            size_bytes: output.len(),
            generation_ms,
            path,
            options: serde_json::to_value(options).unwrap_or(Value::Null),
        };
        (output, metadata)
    }

    fn is_heavy(&self, template: &Template, options: &GenerationOptions) -> bool {
        options.heavy.unwrap_or_else(|| {
            template.category.is_heavy() || template.body.len() >= self.config.heavy_template_bytes
        })
    }

    // == Worker Path ==
    async fn render_on_worker(
        &self,
        pool: &WorkerPool,
        template: &Template,
        input: &Value,
        options: &GenerationOptions,
    ) -> Result<String> {
        let worker = pool
            .select()
            .ok_or_else(|| GenerationError::WorkerUnavailable("no healthy worker".into()))?;
        let task_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.insert(
            task_id.clone(),
            PendingOperation {
                responder: tx,
                worker_id: worker.id(),
                started_at: Instant::now(),
            },
        );

        let request = WorkerRequest::Generate {
            id: task_id.clone(),
            data: GenerationTask {
                id: task_id.clone(),
                template: template.clone(),
                input: input.clone(),
                options: options.clone(),
            },
        };
        if let Err(e) = worker.post(request) {
            self.pending.lock().await.remove(&task_id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.task_timeout, rx).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(message))) => Err(GenerationError::Worker { task_id, message }),
            Ok(Err(_)) => Err(GenerationError::WorkerUnavailable(format!(
                "response for task {task_id} was dropped"
            ))),
            Err(_) => {
                // The worker keeps running; its late answer finds no entry
                self.pending.lock().await.remove(&task_id);
                Err(GenerationError::WorkerTimeout {
                    task_id,
                    timeout_ms: self.config.task_timeout.as_millis() as u64,
                })
            }
        }
    }

    // == Single Flight ==
    async fn inflight_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.inflight
            .lock()
            .await
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release_inflight(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        // Map entry plus our clone: nobody else is waiting
        if Arc::strong_count(lock) <= 2 {
            inflight.remove(key);
        }
    }

    // == Stats ==
    pub async fn stats(&self) -> PipelineStats {
        let mut stats = self.metrics.snapshot();
        stats.pending_operations = self.pending.lock().await.len();
        if let Some(pool) = &self.pool {
            stats.workers = pool.len();
            stats.healthy_workers = pool.healthy_count();
        }
        stats
    }

    // == Shutdown ==
    /// Stops the workers. Later misses render in-process.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown();
        }
    }
}

/// Routes worker responses to their waiting callers.
///
/// Ends once every worker has exited and dropped its response sender.
async fn dispatch_responses(
    pending: PendingMap,
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
) {
    while let Some(response) = responses.recv().await {
        if let WorkerResponse::Progress { id, progress } = &response {
            trace!("Task {} at {}%", id, progress);
            continue;
        }

        let Some(op) = pending.lock().await.remove(response.id()) else {
            debug!("Dropping late response for task {}", response.id());
            continue;
        };
        trace!(
            "Task {} answered by worker {} after {:?}",
            response.id(),
            op.worker_id,
            op.started_at.elapsed()
        );
        let outcome = match response {
            WorkerResponse::Success { data, .. } => Ok(data),
            WorkerResponse::Error { error, .. } => Err(error),
            WorkerResponse::Progress { .. } => continue,
        };
        let _ = op.responder.send(outcome);
    }
    debug!("Worker response dispatcher stopped");
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundedCacheConfig, OrchestratorConfig};
    use crate::error::RenderError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn orchestrator() -> Arc<CacheOrchestrator> {
        Arc::new(CacheOrchestrator::new(OrchestratorConfig {
            artifacts: BoundedCacheConfig::new(10, 100_000, Duration::from_secs(60)),
            ..Default::default()
        }))
    }

    fn config(worker_count: usize) -> PipelineConfig {
        PipelineConfig {
            worker_count,
            task_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Renderer that counts calls and echoes the `name` field.
    fn counting_renderer(calls: Arc<AtomicUsize>) -> Arc<dyn DocumentRenderer> {
        Arc::new(move |template: &Template, input: &Value| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RenderError>(format!("{}:{}", template.id, input["name"]))
        })
    }

    #[tokio::test]
    async fn test_repeated_input_generates_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GenerationPipeline::new(orchestrator(), counting_renderer(calls.clone()), config(0));
        let template = Template::new("classic", "");
        let input = json!({"name": "Ada"});
        let options = GenerationOptions::default();

        let first = pipeline.generate(&template, &input, &options).await.unwrap();
        let second = pipeline.generate(&template, &input, &options).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = pipeline.stats().await;
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_zero_workers_fallback_populates_cache() {
        let orch = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GenerationPipeline::new(orch.clone(), counting_renderer(calls), config(0));
        let template = Template::new("premium", "").with_category(TemplateCategory::Premium);
        let input = json!({"name": "Grace"});
        let options = GenerationOptions::default();

        let output = pipeline.generate(&template, &input, &options).await.unwrap();

        let key = cache_key(&template, &input, &options);
        let cached = orch.get_artifact_with_metadata(&key).await.unwrap();
        assert_eq!(cached.data, output);
        assert_eq!(cached.metadata.path, GenerationPath::Fallback);
        assert_eq!(cached.metadata.size_bytes, output.len());
        assert_eq!(pipeline.stats().await.fallback_generations, 1);
    }

    #[tokio::test]
    async fn test_heavy_task_uses_worker() {
        let orch = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GenerationPipeline::new(orch.clone(), counting_renderer(calls), config(2));
        let template = Template::new("creative", "").with_category(TemplateCategory::Creative);
        let input = json!({"name": "Ada"});
        let options = GenerationOptions::default();

        let output = pipeline.generate(&template, &input, &options).await.unwrap();

        assert_eq!(output, "creative:\"Ada\"");
        let key = cache_key(&template, &input, &options);
        let cached = orch.get_artifact_with_metadata(&key).await.unwrap();
        assert_eq!(cached.metadata.path, GenerationPath::Worker);
        let stats = pipeline.stats().await;
        assert_eq!(stats.worker_generations, 1);
        assert_eq!(stats.workers, 2);
        assert_eq!(stats.pending_operations, 0);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_light_task_skips_worker() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GenerationPipeline::new(orchestrator(), counting_renderer(calls), config(1));

        pipeline
            .generate(&Template::new("basic", "short"), &json!({}), &GenerationOptions::default())
            .await
            .unwrap();

        let stats = pipeline.stats().await;
        assert_eq!(stats.worker_generations, 0);
        assert_eq!(stats.fallback_generations, 1);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_silent_worker_times_out_to_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // First call (on the worker) stalls past the timeout
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(move |_: &Template, _: &Value| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                std::thread::sleep(Duration::from_millis(500));
            }
            Ok::<_, RenderError>("doc".to_string())
        });
        let pipeline = GenerationPipeline::new(
            orchestrator(),
            renderer,
            PipelineConfig {
                worker_count: 1,
                task_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );

        let started = Instant::now();
        let output = pipeline
            .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::heavy(true))
            .await
            .unwrap();

        assert_eq!(output, "doc");
        assert!(started.elapsed() < Duration::from_millis(400));
        let stats = pipeline.stats().await;
        assert_eq!(stats.worker_timeouts, 1);
        assert_eq!(stats.degraded_fallbacks, 1);
        assert_eq!(stats.pending_operations, 0);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_worker_error_falls_back() {
        // Fails only on the worker thread
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(|_: &Template, _: &Value| {
            match std::thread::current().name() {
                Some(name) if name.starts_with("render-worker") => Err(RenderError::new("no fonts")),
                _ => Ok("doc".to_string()),
            }
        });
        let pipeline = GenerationPipeline::new(orchestrator(), renderer, config(1));

        let output = pipeline
            .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::heavy(true))
            .await
            .unwrap();

        assert_eq!(output, "doc");
        let stats = pipeline.stats().await;
        assert_eq!(stats.worker_errors, 1);
        assert_eq!(stats.degraded_fallbacks, 1);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_both_paths_failing_caches_nothing() {
        let orch = orchestrator();
        let renderer: Arc<dyn DocumentRenderer> =
            Arc::new(|_: &Template, _: &Value| Err::<String, _>(RenderError::new("broken template")));
        let pipeline = GenerationPipeline::new(orch.clone(), renderer, config(1));

        let result = pipeline
            .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::heavy(true))
            .await;

        assert!(matches!(result, Err(GenerationError::Failed(_))));
        assert_eq!(orch.stats().await.artifacts.entries, 0);
        assert_eq!(pipeline.stats().await.failures, 1);
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_in_process_failure_is_render_error() {
        let orch = orchestrator();
        let renderer: Arc<dyn DocumentRenderer> =
            Arc::new(|_: &Template, _: &Value| Err::<String, _>(RenderError::new("missing field")));
        let pipeline = GenerationPipeline::new(orch.clone(), renderer, config(0));

        let result = pipeline
            .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::default())
            .await;

        match result {
            Err(GenerationError::Render(e)) => assert_eq!(e.0, "missing field"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(orch.stats().await.artifacts.entries, 0);
        assert_eq!(pipeline.stats().await.failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_slow_fallback_does_not_stall_runtime() {
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(|_: &Template, _: &Value| {
            std::thread::sleep(Duration::from_millis(400));
            Ok::<_, RenderError>("doc".to_string())
        });
        let pipeline = Arc::new(GenerationPipeline::new(orchestrator(), renderer, config(0)));

        let generating = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The only runtime worker is inside the render; a fresh task still runs
        let started = Instant::now();
        let other = tokio::time::timeout(Duration::from_millis(200), tokio::spawn(async { 7 }))
            .await
            .expect("runtime stalled by fallback render")
            .unwrap();
        assert_eq!(other, 7);
        assert!(started.elapsed() < Duration::from_millis(200));

        assert_eq!(generating.await.unwrap().unwrap(), "doc");
    }

    #[tokio::test]
    async fn test_after_shutdown_renders_in_process() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = GenerationPipeline::new(orchestrator(), counting_renderer(calls), config(1));
        pipeline.shutdown();

        pipeline
            .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::heavy(true))
            .await
            .unwrap();

        let stats = pipeline.stats().await;
        assert_eq!(stats.fallback_generations, 1);
        assert_eq!(stats.degraded_fallbacks, 0);
    }

    #[tokio::test]
    async fn test_single_flight_collapses_concurrent_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let renderer: Arc<dyn DocumentRenderer> = Arc::new(move |_: &Template, _: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok::<_, RenderError>("doc".to_string())
        });
        let pipeline = Arc::new(GenerationPipeline::new(
            orchestrator(),
            renderer,
            PipelineConfig {
                single_flight: true,
                ..config(1)
            },
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline
                    .generate(&Template::new("t", ""), &json!({}), &GenerationOptions::heavy(true))
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "doc");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pipeline.inflight.lock().await.is_empty());
        pipeline.shutdown();
    }

    #[tokio::test]
    async fn test_warm_then_generate_hits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Arc::new(GenerationPipeline::new(
            orchestrator(),
            counting_renderer(calls.clone()),
            config(0),
        ));
        let request = GenerationRequest {
            template: Template::new("classic", ""),
            data: json!({"name": "Ada"}),
            options: GenerationOptions::default(),
        };

        let report = pipeline.warm(vec![request.clone(), request.clone()]).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.warmed, 1);

        pipeline
            .generate(&request.template, &request.data, &request.options)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.stats().await.cache_hits, 1);
    }
}
