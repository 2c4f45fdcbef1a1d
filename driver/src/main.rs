use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sensorlm::telemetry::RunLogger;
use sensorlm::{build_model, TokenEstimator};
use std::path::PathBuf;
use std::sync::Arc;
use workflow::config::RunConfig;
use workflow::dataset::{load_dataset, load_metadata};
use workflow::report;
use workflow::runner::Runner;

mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Few-shot sensor classification with language models")]
struct Args {
    /// Run configuration (YAML)
    #[arg(long)]
    config: PathBuf,
    /// Overrides `log_dir` from the config
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Overrides `concurrency` from the config
    #[arg(long)]
    concurrency: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = RunConfig::load(&args.config)?;
    if let Some(log_dir) = args.log_dir {
        config.log_dir = log_dir;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let logger = RunLogger::new(&config.log_dir)?;
    logger.store_text("config.yaml", &config.to_yaml()?)?;

    let model = build_model(
        &config.llm_model,
        &config.llm_version,
        &config.llm_path,
        config.llm_endpoint.as_deref(),
    )
    .with_context(|| format!("loading language model {}", config.llm_model))?;
    logger.record("Loaded LLM");

    let estimator = match TokenEstimator::for_model(&config.llm_version) {
        Ok(estimator) => Some(estimator),
        Err(err) => {
            warn!("token estimates disabled: {}", err);
            None
        }
    };

    let metadata = load_metadata(&config.task_metadata_path)?;
    let pools = load_dataset(&config.dataset_path, &metadata)?;
    if pools.is_empty() {
        bail!("dataset {} has no windows", config.dataset_path.display());
    }
    logger.record(&format!(
        "Loaded {} windows labeled {}",
        pools.len(),
        pools.labels().collect::<Vec<_>>().join(", ")
    ));

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (targets, examples) = pools.split_targets(config.num_samples, &mut rng)?;

    let runner = Runner::new(config, Arc::from(model), metadata, logger.clone(), estimator);
    let predictions = runner.execute(targets, Arc::new(examples))?;

    info!("Accuracy: {}", report::accuracy(&predictions));
    info!("F1 Score: {}", report::macro_f1(&predictions));
    logger.store_text("predictions.txt", &report::render(&predictions))?;

    let metrics = runner.metrics().snapshot();
    info!(
        "solved {} failed {} text tokens {} image tokens {}",
        metrics.solved, metrics.failed, metrics.text_tokens, metrics.image_tokens
    );
    Ok(())
}
