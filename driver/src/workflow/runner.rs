use crate::workflow::config::RunConfig;
use crate::workflow::dataset::{LabeledPools, Target};
use crate::workflow::report::Prediction;
use anyhow::Context;
use log::{error, info};
use sensorlm::prelude::TaskMetadata;
use sensorlm::telemetry::{sanitize_label, MetricsRecorder, RunLogger};
use sensorlm::{LanguageModel, Solver, TokenEstimator, VisualizationPlanner};
use std::sync::{Arc, Mutex};
use tokio::runtime::Builder as TokioBuilder;

/// Runs every target solve, `concurrency` at a time.
///
/// Each solve is an isolated blocking task; a batch is joined before the
/// next one starts. The prediction list is the only shared state.
#[derive(Clone)]
pub struct Runner {
    config: Arc<RunConfig>,
    model: Arc<dyn LanguageModel>,
    metadata: Arc<TaskMetadata>,
    logger: RunLogger,
    estimator: Option<Arc<TokenEstimator>>,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(
        config: RunConfig,
        model: Arc<dyn LanguageModel>,
        metadata: TaskMetadata,
        logger: RunLogger,
        estimator: Option<TokenEstimator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            model,
            metadata: Arc::new(metadata),
            logger,
            estimator: estimator.map(Arc::new),
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Solves every target and returns the predictions ordered by pid.
    pub fn execute(&self, targets: Vec<Target>, examples: Arc<LabeledPools>) -> anyhow::Result<Vec<Prediction>> {
        let results = Arc::new(Mutex::new(Vec::with_capacity(targets.len())));
        let batch_size = self.config.concurrency.max(1);
        let runtime = TokioBuilder::new_multi_thread()
            .worker_threads(batch_size)
            .enable_all()
            .build()
            .context("creating solve runtime")?;

        info!("Solving tasks...");
        runtime.block_on(async {
            for batch in targets.chunks(batch_size) {
                let mut handles = Vec::with_capacity(batch.len());
                for target in batch.iter().cloned() {
                    let pid = target.pid;
                    let runner = self.clone();
                    let examples = Arc::clone(&examples);
                    let results = Arc::clone(&results);
                    let handle = tokio::task::spawn_blocking(move || {
                        runner.solve_target(target, &examples, &results)
                    });
                    handles.push((pid, handle));
                }
                for (pid, handle) in handles {
                    // A panicking solve only loses its own prediction.
                    if let Err(err) = handle.await {
                        error!("[{}] solve task aborted: {}", pid, err);
                        self.metrics.record_failed();
                    }
                }
            }
        });

        let mut predictions = results
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow::anyhow!("prediction list poisoned"))?;
        predictions.sort_by_key(|p: &Prediction| p.pid);
        Ok(predictions)
    }

    fn solve_target(&self, target: Target, examples: &LabeledPools, results: &Mutex<Vec<Prediction>>) {
        let pid = target.pid;
        match self.solve_one(&target, examples) {
            Ok(prediction) => {
                info!("[{}] GT: {}, Pred: {}", pid, prediction.truth, prediction.answer);
                if let Ok(mut guard) = results.lock() {
                    guard.push(prediction);
                }
            }
            Err(err) => {
                error!("[{}] solve failed: {:#}", pid, err);
                self.metrics.record_failed();
            }
        }
    }

    fn solve_one(&self, target: &Target, pools: &LabeledPools) -> anyhow::Result<Prediction> {
        let truth = target.window.label().unwrap_or_default().to_string();
        let examples = pools.draw_examples(self.config.num_examples, self.config.seed + target.pid as u64);
        let logger = self
            .logger
            .scoped(format!("prompts/{}_{}", target.pid, sanitize_label(&truth)))?;

        let planned = if self.config.needs_planning() {
            let planner = VisualizationPlanner::new(self.model.as_ref(), &self.metadata, &logger);
            let chosen = planner.choose(&examples)?;
            logger.record(&format!("[{}] visualization {} selected", target.pid, chosen.style));
            Some(chosen)
        } else {
            None
        };
        let solve_config = self.config.to_solve_config(&self.metadata, planned)?;

        let mut solver = Solver::new(self.model.as_ref(), &self.metadata, &logger);
        if let Some(estimator) = &self.estimator {
            solver = solver.with_estimator(estimator);
        }
        let outcome = solver.solve(&solve_config, &target.window, &examples)?;
        self.metrics.record_solved(outcome.tokens.unwrap_or_default());

        Ok(Prediction {
            pid: target.pid,
            truth,
            answer: outcome.answer,
        })
    }
}
