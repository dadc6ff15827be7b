use anyhow::{Context, Result};
use chrono::{Duration, Local};
use tracing::{info, warn};

use hoopcast::config::Config;
use hoopcast::engine::{self, Engine};
use hoopcast::history::PredictionHistoryStore;
use hoopcast::injury::InjuryAdjuster;
use hoopcast::model::LinearWinModel;
use hoopcast::predictor::ScoringModel;
use hoopcast::reference_fetch::{NoReference, ReferenceSource, ScoreboardReference};
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
    let run_date = config.run_date.unwrap_or_else(|| Local::now().date_naive());
    let target_date = run_date + Duration::days(config.target_offset_days);
    info!(
        season = config.season,
        run_date = %run_date,
        target_date = %target_date,
        "starting prediction cycle"
    );

    let current = StatTable::load_dir(&config.current_data_dir())
        .context("load current statistic feed")?;
    let historical = StatTable::load_dir(&config.historical_data_dir())
        .context("load historical statistic feed")?;
    if current.is_empty() && historical.is_empty() {
        warn!("both statistic feeds are empty, strengths will resolve to 0.0");
    }
    let resolver = StrengthResolver::new(&current, &historical);

    let adjuster = if config.apply_injuries {
        InjuryAdjuster::load(&config.injuries_csv(), &config.player_scores_csv())
            .context("load injury feed")?
    } else {
        InjuryAdjuster::bypassed()
    };

    let model: Box<dyn ScoringModel> = match LinearWinModel::fit(current.training_pairs()) {
        Some(fitted) => Box::new(fitted),
        None => {
            warn!("no training pairs in the current feed, using coin-flip model");
            Box::new(LinearWinModel::coin_flip())
        }
    };

    let history = PredictionHistoryStore::load(
        &config.history_path(),
        &config.season,
        &config.model_version,
    );
    let mut engine = Engine::new(resolver, &adjuster, model.as_ref(), history);

    let schedules = engine::load_schedules(&config);
    if schedules.is_empty() {
        anyhow::bail!(
            "no schedule files under {}",
            config.schedule_dir().display()
        );
    }

    // Fold finals into yesterday's pending records before the cycle prunes
    // and regenerates; the sweep window doubles as the retention window.
    let results = ScoreboardResults::new(&config.scoreboard_url);
    engine.reconcile(
        &results,
        run_date,
        config.results_days_back,
        config.results_days_forward,
    );

    let reference: Box<dyn ReferenceSource> = if config.reference_enabled {
        Box::new(ScoreboardReference::new(&config.scoreboard_url))
    } else {
        Box::new(NoReference)
    };
    let prune_cutoff = run_date - Duration::days(config.results_days_back);
    let report = engine.run_cycle(
        &schedules,
        run_date,
        Some(target_date),
        Some(prune_cutoff),
        reference.as_ref(),
    );

    engine
        .history
        .save(&config.history_path())
        .context("persist prediction history")?;
    engine::write_prediction_csv(&config.prediction_csv(), &report.rows)?;
    engine::write_win_loss_csv(&config.win_loss_csv(), &report.summaries)?;

    info!(
        predictions = report.rows.len(),
        history = engine.history.len(),
        "cycle finished"
    );
    Ok(())
}
