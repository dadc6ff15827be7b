//! Standalone reconciliation sweep: fold final scores into pending history
//! records without generating any new predictions. Meant for a cron slot a
//! few hours after the night's games finish.

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use hoopcast::config::Config;
use hoopcast::engine::Engine;
use hoopcast::history::PredictionHistoryStore;
use hoopcast::injury::InjuryAdjuster;
use hoopcast::model::LinearWinModel;
use hoopcast::results_fetch::ScoreboardResults;
use hoopcast::strength::{StatTable, StrengthResolver};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hoopcast=info".into()),
        )
        .init();

    let config = Config::from_env();
    let today = config.run_date.unwrap_or_else(|| Local::now().date_naive());

    let history = PredictionHistoryStore::load(
        &config.history_path(),
        &config.season,
        &config.model_version,
    );
    if history.is_empty() {
        info!("no history to reconcile");
        return Ok(());
    }

    let empty = StatTable::default();
    let adjuster = InjuryAdjuster::bypassed();
    let model = LinearWinModel::coin_flip();
    let mut engine = Engine::new(
        StrengthResolver::new(&empty, &empty),
        &adjuster,
        &model,
        history,
    );

    let results = ScoreboardResults::new(&config.scoreboard_url);
    let updated = engine.reconcile(
        &results,
        today,
        config.results_days_back,
        config.results_days_forward,
    );

    engine
        .history
        .save(&config.history_path())
        .context("persist prediction history")?;
    info!(
        updated,
        pending = engine.history.pending().len(),
        "reconciliation sweep finished"
    );
    Ok(())
}
