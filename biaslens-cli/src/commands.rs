//! CLI subcommand handlers.

use crate::{BaselineAction, Commands, ConfigAction, ReportFormat};
use anyhow::Context;
use biaslens_core::analyzer::default_baseline;
use biaslens_core::config::write_default_config;
use biaslens_core::persistence::atomic_write;
use biaslens_core::{
    Baseline, BiasLensConfig, BiasType, ErrorKind, EvaluationExport, EvaluationService,
    JsonFileStore, Page, Recommender, ZoneThresholds, load_config,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if data_dir.is_some() {
        config.storage.data_dir = data_dir;
    }

    let service = Arc::new(build_service(&config, workspace));
    match command {
        Commands::Evaluate {
            target,
            types,
            iterations,
            seed,
            baseline,
        } => {
            let baseline = resolve_baseline(&service, &config, baseline.as_deref())?;
            let types = if types.is_empty() {
                config.evaluation.heuristic_types.clone()
            } else {
                types
            };
            let iterations = iterations.unwrap_or(config.evaluation.iteration_count);
            let seed = seed.or(config.evaluation.seed);
            let evaluation = service.create_evaluation(&target, &types, iterations)?;
            let cancel = cancel_on_ctrl_c();
            let result = run_one(service, evaluation.id, baseline, seed, cancel).await?;
            print_json(&result)
        }
        Commands::Batch {
            target,
            count,
            seed,
            baseline,
        } => handle_batch(service, &config, &target, count, seed, baseline.as_deref()).await,
        Commands::Recommend { id, mode } => {
            let mode = mode.unwrap_or(config.recommendations.mode);
            let recommendations = service.recommendations(id, mode)?;
            print_json(recommendations.as_ref())
        }
        Commands::Baseline { action } => handle_baseline(&service, action),
        Commands::Trends {
            target,
            baseline,
            threshold,
        } => {
            let baseline = resolve_baseline(&service, &config, baseline.as_deref())?;
            let threshold = threshold.unwrap_or(config.drift.z_threshold);
            let report = service.trends(&target, &baseline, threshold)?;
            print_json(&report)
        }
        Commands::Report { id, format } => match format {
            ReportFormat::Summary => {
                let summary = service.summary(id)?;
                println!("{summary}");
                Ok(())
            }
            ReportFormat::Json => {
                let export = service.export(id, config.recommendations.mode)?;
                println!("{}", export.to_json()?);
                Ok(())
            }
        },
        Commands::Export { id, out, mode } => {
            let mode = mode.unwrap_or(config.recommendations.mode);
            let export = service.export(id, mode)?;
            atomic_write(&out, export.to_json()?.as_bytes())?;
            println!(
                "Exported evaluation {} ({} findings, {} recommendations) to {}",
                id,
                export.findings.len(),
                export.recommendations.len(),
                out.display()
            );
            Ok(())
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let export = EvaluationExport::from_json(&json)?;
            let evaluation = service.import(&export)?;
            println!(
                "Imported evaluation {} ({}, {} findings)",
                evaluation.id,
                evaluation.status,
                export.findings.len()
            );
            Ok(())
        }
        Commands::List {
            target,
            limit,
            offset,
        } => {
            let page = service.list(target.as_deref(), Page { limit, offset })?;
            if page.evaluations.is_empty() {
                println!("No evaluations found.");
                return Ok(());
            }
            for e in &page.evaluations {
                let score = e
                    .overall_score
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".into());
                let zone = e
                    .zone_status
                    .map(|z| z.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{}  {:<20} {:<10} score={:<7} zone={:<6} {}",
                    e.id,
                    e.target_system,
                    e.status.to_string(),
                    score,
                    zone,
                    e.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!(
                "Showing {}-{} of {}",
                page.offset + 1,
                page.offset + page.evaluations.len(),
                page.total
            );
            Ok(())
        }
        Commands::Findings { id, bias_type } => match bias_type {
            Some(bias_type) => print_json(&service.finding(id, bias_type)?),
            None => print_json(&service.findings(id)?),
        },
        Commands::Delete { id } => {
            service.delete(id)?;
            println!("Deleted evaluation {id}");
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, &config),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &BiasLensConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = write_default_config(workspace, force)
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            println!("Created configuration at {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let toml = config
                .to_toml()
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
            println!("{toml}");
            Ok(())
        }
    }
}

fn handle_baseline(service: &EvaluationService, action: BaselineAction) -> anyhow::Result<()> {
    match action {
        BaselineAction::Create {
            name,
            evaluations,
            green_max,
            yellow_max,
        } => {
            let overrides = ZoneThresholds {
                green_zone_max: green_max,
                yellow_zone_max: yellow_max,
            };
            let baseline = service.create_baseline(&name, &evaluations, overrides)?;
            print_json(&baseline)
        }
        BaselineAction::Show { name } => print_json(&service.store().get_baseline(&name)?),
        BaselineAction::List => {
            let baselines = service.store().list_baselines()?;
            if baselines.is_empty() {
                println!("No baselines found.");
            }
            for b in &baselines {
                println!(
                    "{:<20} mean={:.2} std_dev={:.2} n={} green<={:.2} yellow<={:.2}",
                    b.name, b.mean, b.std_dev, b.sample_size, b.green_zone_max, b.yellow_zone_max
                );
            }
            Ok(())
        }
    }
}

async fn handle_batch(
    service: Arc<EvaluationService>,
    config: &BiasLensConfig,
    target: &str,
    count: u32,
    seed: Option<u64>,
    baseline: Option<&str>,
) -> anyhow::Result<()> {
    if count == 0 {
        anyhow::bail!("--count must be at least 1");
    }
    let baseline = resolve_baseline(&service, config, baseline)?;
    let seed = seed.or(config.evaluation.seed);
    let cancel = cancel_on_ctrl_c();

    let mut handles = Vec::with_capacity(count as usize);
    for n in 0..count {
        let evaluation = service.create_evaluation(
            target,
            &config.evaluation.heuristic_types,
            config.evaluation.iteration_count,
        )?;
        let run_seed = seed.map(|s| s.wrapping_add(u64::from(n)));
        handles.push(tokio::spawn(run_one(
            Arc::clone(&service),
            evaluation.id,
            baseline.clone(),
            run_seed,
            cancel.clone(),
        )));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut failures = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(result) => results.push(result),
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, "Batch evaluation failed");
            }
        }
    }
    print_json(&results)?;
    if failures > 0 {
        anyhow::bail!("{failures} of {count} evaluations failed");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunResult {
    id: Uuid,
    target_system: String,
    overall_score: Option<f64>,
    zone: Option<String>,
    baseline: String,
    findings: Vec<FindingLine>,
}

#[derive(Debug, Serialize)]
struct FindingLine {
    bias_type: BiasType,
    severity_score: f64,
    confidence_level: f64,
    severity: String,
}

/// Execute one pending evaluation on the blocking pool.
async fn run_one(
    service: Arc<EvaluationService>,
    id: Uuid,
    baseline: Baseline,
    seed: Option<u64>,
    cancel: CancellationToken,
) -> anyhow::Result<RunResult> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<RunResult> {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let outcome = service.execute(id, &baseline, &mut rng, &cancel)?;
        Ok(RunResult {
            id,
            target_system: outcome.evaluation.target_system,
            overall_score: outcome.evaluation.overall_score,
            zone: outcome.evaluation.zone_status.map(|z| z.to_string()),
            baseline: baseline.name,
            findings: outcome
                .findings
                .iter()
                .map(|f| FindingLine {
                    bias_type: f.bias_type,
                    severity_score: f.severity_score,
                    confidence_level: f.confidence_level,
                    severity: f.severity.to_string(),
                })
                .collect(),
        })
    })
    .await?
}

fn build_service(config: &BiasLensConfig, workspace: &Path) -> EvaluationService {
    let data_dir = config.storage.resolve_data_dir(workspace);
    tracing::debug!(data_dir = %data_dir.display(), "Using data directory");
    EvaluationService::new(Arc::new(JsonFileStore::new(data_dir)))
        .with_recommender(Recommender::with_max_recommendations(
            config.recommendations.max_recommendations,
        ))
        .with_stable_slope(config.drift.stable_slope)
}

/// A named baseline must exist. Without a name, the configured baseline is
/// used if stored, otherwise one is built from the configured defaults.
fn resolve_baseline(
    service: &EvaluationService,
    config: &BiasLensConfig,
    name: Option<&str>,
) -> anyhow::Result<Baseline> {
    if let Some(name) = name {
        return Ok(service.store().get_baseline(name)?);
    }
    match service.store().get_baseline(&config.baseline.name) {
        Ok(baseline) => Ok(baseline),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(default_baseline(&config.baseline)?),
        Err(e) => Err(e.into()),
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling running evaluations");
            child.cancel();
        }
    });
    token
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use biaslens_core::EvaluationStore;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> BiasLensConfig {
        let mut config = BiasLensConfig::default();
        config.storage.data_dir = Some(dir.join("data"));
        config
    }

    #[test]
    fn test_resolve_baseline_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let service = build_service(&config, dir.path());
        let baseline = resolve_baseline(&service, &config, None).unwrap();
        assert_eq!(baseline.name, config.baseline.name);
        assert!((baseline.mean - config.baseline.mean).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_baseline_prefers_stored() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let service = build_service(&config, dir.path());
        let mut stored = default_baseline(&config.baseline).unwrap();
        stored.mean = 12.5;
        service.store().insert_baseline(&stored).unwrap();
        let baseline = resolve_baseline(&service, &config, None).unwrap();
        assert!((baseline.mean - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_named_baseline_must_exist() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let service = build_service(&config, dir.path());
        assert!(resolve_baseline(&service, &config, Some("missing")).is_err());
    }

    #[tokio::test]
    async fn test_run_one_is_reproducible_per_seed() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let service = Arc::new(build_service(&config, dir.path()));
        let baseline = default_baseline(&config.baseline).unwrap();

        let mut scores = Vec::new();
        for _ in 0..2 {
            let eval = service
                .create_evaluation("model-a", &BiasType::ALL, 30)
                .unwrap();
            let result = run_one(
                Arc::clone(&service),
                eval.id,
                baseline.clone(),
                Some(42),
                CancellationToken::new(),
            )
            .await
            .unwrap();
            assert_eq!(result.findings.len(), BiasType::ALL.len());
            scores.push(result.overall_score);
        }
        assert_eq!(scores[0], scores[1]);
        assert_eq!(service.store().list_evaluations().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_one_cancelled() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let service = Arc::new(build_service(&config, dir.path()));
        let baseline = default_baseline(&config.baseline).unwrap();
        let eval = service
            .create_evaluation("model-a", &[BiasType::Anchoring], 10)
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(
            run_one(Arc::clone(&service), eval.id, baseline, Some(1), cancel)
                .await
                .is_err()
        );
        let stored = service.store().get_evaluation(eval.id).unwrap();
        assert_eq!(stored.status, biaslens_core::EvaluationStatus::Failed);
    }
}
