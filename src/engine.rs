use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::history::{NewPrediction, PredictionHistoryStore, ReferenceSnapshot};
use crate::injury::InjuryAdjuster;
use crate::predictor::{Location, ScoringModel, Side, predict_matchup, round2};
use crate::reference_fetch::ReferenceSource;
use crate::results_fetch::ResultsSource;
use crate::schedule::ScheduleEntry;
use crate::store::{HeadToHeadMatrix, TeamIndexRegistry};
use crate::strength::StrengthResolver;
use crate::teams::{self, LEAGUE_SIZE};

/// One row of the per-run prediction table, from the evaluated team's
/// perspective.
#[derive(Debug, Clone)]
pub struct PredictionRow {
    pub team: String,
    pub display_date: String,
    pub tipoff_et: Option<String>,
    pub opponent: String,
    pub location: Location,
    pub team_hss_adjusted: f64,
    pub opponent_hss_adjusted: f64,
    pub team_win_pct: f64,
    pub opponent_win_pct: f64,
    pub predicted_winner: String,
    pub expected_margin: f64,
    pub confidence_gap_pct: f64,
    pub team_reference_pct: Option<f64>,
    pub opponent_reference_pct: Option<f64>,
}

/// Aggregate predicted record for one team over the evaluated horizon.
#[derive(Debug, Clone)]
pub struct TeamSummary {
    pub team: String,
    pub wins: u32,
    pub losses: u32,
    pub avg_hss: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rows: Vec<PredictionRow>,
    pub summaries: Vec<TeamSummary>,
}

/// Per-run context owning every mutable piece: no ambient globals, one
/// engine per cycle. The history store is the single shared mutable
/// resource and is only ever touched through this context.
pub struct Engine<'a> {
    resolver: StrengthResolver<'a>,
    adjuster: &'a InjuryAdjuster,
    model: &'a dyn ScoringModel,
    pub registry: TeamIndexRegistry,
    pub head_to_head: HeadToHeadMatrix,
    pub history: PredictionHistoryStore,
}

impl<'a> Engine<'a> {
    pub fn new(
        resolver: StrengthResolver<'a>,
        adjuster: &'a InjuryAdjuster,
        model: &'a dyn ScoringModel,
        history: PredictionHistoryStore,
    ) -> Self {
        Self {
            resolver,
            adjuster,
            model,
            registry: TeamIndexRegistry::new(LEAGUE_SIZE),
            head_to_head: HeadToHeadMatrix::new(LEAGUE_SIZE),
            history,
        }
    }

    /// Run one prediction cycle over every team's schedule: prune stale
    /// history, evaluate each game on the target date, upsert pending
    /// records, and collect the tabular outputs.
    ///
    /// The prune cutoff must not reach into the reconciliation window, or
    /// records get dropped before their finals can land. Run any
    /// reconciliation sweep before the cycle; pruning is terminal.
    pub fn run_cycle(
        &mut self,
        schedules: &HashMap<String, Vec<ScheduleEntry>>,
        run_date: NaiveDate,
        target_date: Option<NaiveDate>,
        prune_cutoff: Option<NaiveDate>,
        reference: &dyn ReferenceSource,
    ) -> RunReport {
        if let Some(cutoff) = prune_cutoff {
            self.history
                .prune_before(&cutoff.format("%Y-%m-%d").to_string());
        }

        let mut report = RunReport::default();
        let mut team_names: Vec<&String> = schedules.keys().collect();
        team_names.sort();

        for team in team_names {
            let summary = self.predict_team(
                team,
                &schedules[team],
                run_date,
                target_date,
                reference,
                &mut report.rows,
            );
            if let Some(summary) = summary {
                report.summaries.push(summary);
            }
        }

        info!(
            games = report.rows.len(),
            teams = report.summaries.len(),
            "prediction cycle complete"
        );
        report
    }

    fn predict_team(
        &mut self,
        team: &str,
        schedule: &[ScheduleEntry],
        run_date: NaiveDate,
        target_date: Option<NaiveDate>,
        reference: &dyn ReferenceSource,
        rows: &mut Vec<PredictionRow>,
    ) -> Option<TeamSummary> {
        let mut wins = 0u32;
        let mut losses = 0u32;
        let mut hss_sum = 0.0;
        let mut predicted = 0usize;

        for game in schedule {
            if game.date < run_date {
                continue;
            }
            if let Some(target) = target_date
                && game.date != target
            {
                continue;
            }

            let team_hss = self.resolver.resolve(team, game.year);
            let opponent_hss = self.resolver.resolve(&game.opponent, game.year);
            hss_sum += team_hss;
            predicted += 1;

            let (team_adj, _) = self.adjuster.adjust(team, team_hss, Some(game.date));
            let (opp_adj, _) = self
                .adjuster
                .adjust(&game.opponent, opponent_hss, Some(game.date));

            let outcome = predict_matchup(team_adj, opp_adj, game.location, self.model);
            let predicted_winner = match outcome.winner {
                Side::Team => team.to_string(),
                Side::Opponent => game.opponent.clone(),
            };

            // Map the evaluated-team perspective onto home/away for storage.
            let (home_team, away_team, team_is_home, location) = match game.location {
                Location::Home => (team.to_string(), game.opponent.clone(), true, Location::Home),
                Location::Away => (game.opponent.clone(), team.to_string(), false, Location::Away),
                Location::Neutral => {
                    let mut pair = [team.to_string(), game.opponent.clone()];
                    pair.sort();
                    let team_is_home = pair[0] == team;
                    (pair[0].clone(), pair[1].clone(), team_is_home, Location::Neutral)
                }
            };
            let (home_pct, away_pct) = outcome.home_away_pcts(team_is_home);

            let mut snapshot: Option<ReferenceSnapshot> = None;
            if game.location != Location::Neutral
                && let (Ok(home_id), Ok(away_id)) = (
                    teams::team_identity(&home_team),
                    teams::team_identity(&away_team),
                )
            {
                snapshot = reference.fetch(&game.iso_date(), home_id.abbr, away_id.abbr);
            }

            // Each matchup appears on both teams' schedules; log history
            // once, from the home side's pass.
            if team_is_home {
                self.history.upsert_prediction(NewPrediction {
                    display_date: game.display_date.clone(),
                    iso_date: game.iso_date(),
                    home_team: home_team.clone(),
                    away_team: away_team.clone(),
                    location: location.code().to_string(),
                    predicted_winner: predicted_winner.clone(),
                    predicted_win_pct: outcome.winner_win_pct(),
                    home_hss: outcome.team_adjusted,
                    away_hss: outcome.opponent_adjusted,
                    tipoff_et: game.tipoff_et.clone(),
                    model_home_pct: Some(round2(home_pct)),
                    model_away_pct: Some(round2(away_pct)),
                });
                if let Some(snapshot) = snapshot.clone() {
                    self.history.update_reference_prediction(
                        &game.iso_date(),
                        &home_team,
                        &away_team,
                        snapshot,
                    );
                }
            }

            self.tally(team, &game.opponent, &predicted_winner);
            if predicted_winner == team {
                wins += 1;
            } else {
                losses += 1;
            }

            let (team_ref, opp_ref) = match &snapshot {
                Some(s) if team_is_home => (s.home_pct, s.away_pct),
                Some(s) => (s.away_pct, s.home_pct),
                None => (None, None),
            };
            rows.push(PredictionRow {
                team: team.to_string(),
                display_date: game.display_date.clone(),
                tipoff_et: game.tipoff_et.clone(),
                opponent: game.opponent.clone(),
                location: game.location,
                team_hss_adjusted: outcome.team_adjusted,
                opponent_hss_adjusted: outcome.opponent_adjusted,
                team_win_pct: outcome.team_win_pct,
                opponent_win_pct: outcome.opponent_win_pct,
                predicted_winner,
                expected_margin: outcome.expected_margin,
                confidence_gap_pct: outcome.confidence_gap_pct,
                team_reference_pct: team_ref,
                opponent_reference_pct: opp_ref,
            });
        }

        if predicted == 0 {
            debug!(team, "no games on the target horizon");
            return None;
        }
        Some(TeamSummary {
            team: team.to_string(),
            wins,
            losses,
            avg_hss: hss_sum / predicted as f64,
        })
    }

    fn tally(&mut self, team: &str, opponent: &str, winner: &str) {
        let Some(team_idx) = self.registry.register(team) else {
            return;
        };
        let Some(opp_idx) = self.registry.register(opponent) else {
            return;
        };
        if winner == team {
            self.head_to_head.record_result(team_idx, opp_idx);
        } else {
            self.head_to_head.record_result(opp_idx, team_idx);
        }
    }

    /// Reconciliation sweep: fold final scores into pending records inside
    /// the window around today. Pending games outside the window (or with no
    /// final score yet) stay pending for the next sweep.
    pub fn reconcile(
        &mut self,
        results: &dyn ResultsSource,
        today: NaiveDate,
        days_back: i64,
        days_forward: i64,
    ) -> usize {
        self.reconcile_window(
            results,
            today - Duration::days(days_back),
            today + Duration::days(days_forward),
        )
    }

    pub fn reconcile_window(
        &mut self,
        results: &dyn ResultsSource,
        from: NaiveDate,
        to: NaiveDate,
    ) -> usize {
        let mut by_date: HashMap<String, Vec<(String, String, String, String)>> = HashMap::new();
        for record in self.history.pending() {
            let Ok(date) = NaiveDate::parse_from_str(&record.game_date, "%Y-%m-%d") else {
                continue;
            };
            if date < from || date > to {
                continue;
            }
            let home_abbr = record
                .home_team_abbr
                .clone()
                .unwrap_or_else(|| record.home_team.to_uppercase());
            let away_abbr = record
                .away_team_abbr
                .clone()
                .unwrap_or_else(|| record.away_team.to_uppercase());
            by_date.entry(record.game_date.clone()).or_default().push((
                record.home_team.clone(),
                record.away_team.clone(),
                home_abbr,
                away_abbr,
            ));
        }

        let mut updated = 0usize;
        let mut dates: Vec<String> = by_date.keys().cloned().collect();
        dates.sort();
        for date in dates {
            let finals = results.final_scores(&date);
            if finals.is_empty() {
                continue;
            }
            for (home_team, away_team, home_abbr, away_abbr) in &by_date[&date] {
                let matched = finals
                    .iter()
                    .find(|f| &f.home_abbr == home_abbr && &f.away_abbr == away_abbr);
                let Some(game) = matched else {
                    continue;
                };
                self.history.upsert_actual_results(
                    &date,
                    home_team,
                    away_team,
                    game.home_score,
                    game.away_score,
                );
                updated += 1;
            }
        }
        if updated > 0 {
            info!(updated, "reconciled final scores into history");
        }
        updated
    }
}

/// Write the per-run prediction table the way downstream consumers expect.
pub fn write_prediction_csv(path: &std::path::Path, rows: &[PredictionRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("open prediction csv {}", path.display()))?;
    writer.write_record([
        "Team",
        "Date",
        "Tipoff (ET)",
        "Opponent",
        "Location",
        "Team HSS (Adj)",
        "Opponent HSS (Adj)",
        "Team Win %",
        "Opponent Win %",
        "Predicted Winner",
        "Projected Margin (pts)",
        "Confidence Gap %",
        "Team Reference Win %",
        "Opponent Reference Win %",
    ])?;
    for row in rows {
        writer.write_record([
            row.team.as_str(),
            row.display_date.as_str(),
            row.tipoff_et.as_deref().unwrap_or(""),
            row.opponent.as_str(),
            row.location.code(),
            &format!("{:.5}", row.team_hss_adjusted),
            &format!("{:.5}", row.opponent_hss_adjusted),
            &format!("{:.2}", row.team_win_pct),
            &format!("{:.2}", row.opponent_win_pct),
            row.predicted_winner.as_str(),
            &format!("{:.2}", row.expected_margin),
            &format!("{:.2}", row.confidence_gap_pct),
            &fmt_opt_pct(row.team_reference_pct),
            &fmt_opt_pct(row.opponent_reference_pct),
        ])?;
    }
    writer.flush().context("flush prediction csv")?;
    Ok(())
}

pub fn write_win_loss_csv(path: &std::path::Path, summaries: &[TeamSummary]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("open win/loss csv {}", path.display()))?;
    writer.write_record(["Team", "Wins", "Losses", "HSS"])?;
    for summary in summaries {
        writer.write_record([
            summary.team.as_str(),
            &summary.wins.to_string(),
            &summary.losses.to_string(),
            &format!("{:.5}", summary.avg_hss),
        ])?;
    }
    writer.flush().context("flush win/loss csv")?;
    Ok(())
}

/// Load every `<schedule_dir>/<Team>/<Team>.csv`; missing files are logged
/// and skipped so one broken team never sinks the batch.
pub fn load_schedules(config: &Config) -> HashMap<String, Vec<ScheduleEntry>> {
    let mut out = HashMap::new();
    for team in teams::all_teams() {
        let path = config
            .schedule_dir()
            .join(team.short)
            .join(format!("{}.csv", team.short));
        if !path.exists() {
            warn!(team = team.short, path = %path.display(), "schedule file missing");
            continue;
        }
        match crate::schedule::read_schedule_csv(&path, config.season_start_year) {
            Ok(entries) => {
                out.insert(team.short.to_string(), entries);
            }
            Err(err) => warn!(team = team.short, %err, "unreadable schedule file"),
        }
    }
    out
}

fn fmt_opt_pct(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PredictionHistoryStore;
    use crate::reference_fetch::NoReference;
    use crate::results_fetch::FinalScore;
    use crate::strength::{StatTable, StrengthRecord};

    fn stat(statistic: f64) -> StrengthRecord {
        StrengthRecord { rank: 1, statistic, year: 2025 }
    }

    fn two_team_schedules() -> HashMap<String, Vec<ScheduleEntry>> {
        let date = NaiveDate::from_ymd_opt(2025, 11, 5).unwrap();
        let mut schedules = HashMap::new();
        schedules.insert(
            "Boston".to_string(),
            vec![ScheduleEntry {
                display_date: "Wed, Nov 5, 2025".to_string(),
                date,
                tipoff_et: Some("7:30p".to_string()),
                opponent: "Denver".to_string(),
                location: Location::Home,
                year: 2025,
            }],
        );
        schedules.insert(
            "Denver".to_string(),
            vec![ScheduleEntry {
                display_date: "Wed, Nov 5, 2025".to_string(),
                date,
                tipoff_et: Some("7:30p".to_string()),
                opponent: "Boston".to_string(),
                location: Location::Away,
                year: 2025,
            }],
        );
        schedules
    }

    #[test]
    fn cycle_predicts_both_perspectives_but_stores_once() {
        let mut current = StatTable::default();
        current.insert("Offense", "Boston", stat(110.0));
        current.insert("Offense", "Denver", stat(100.0));
        let historical = StatTable::default();
        let adjuster = InjuryAdjuster::bypassed();
        let model = |diff: f64| if diff > 0.0 { 0.62 } else { 0.38 };

        let mut engine = Engine::new(
            StrengthResolver::new(&current, &historical),
            &adjuster,
            &model,
            PredictionHistoryStore::new("2025-26", "test"),
        );
        let report = engine.run_cycle(
            &two_team_schedules(),
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            Some(NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()),
            None,
            &NoReference,
        );

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.summaries.len(), 2);
        for row in &report.rows {
            assert_eq!(row.predicted_winner, "Boston");
        }
        // Boston hosts: base 110 plus the 2.75 floor boost.
        let boston = report.rows.iter().find(|r| r.team == "Boston").unwrap();
        assert!((boston.team_hss_adjusted - 112.75).abs() < 1e-9);
        assert!((boston.team_win_pct - 62.0).abs() < 1e-9);

        assert_eq!(engine.history.len(), 1);
        let record = engine.history.get("2025-11-05", "Boston", "Denver").unwrap();
        assert_eq!(record.predicted_winner, "Boston");
        assert_eq!(record.location, "H");
        assert!(!record.completed);

        // Both passes tallied the same projected result.
        let boston_idx = engine.registry.index_of("Boston").unwrap();
        let denver_idx = engine.registry.index_of("Denver").unwrap();
        assert_eq!(engine.head_to_head.head_to_head(boston_idx, denver_idx), 2);
        assert_eq!(engine.head_to_head.head_to_head(denver_idx, boston_idx), 0);
    }

    #[test]
    fn past_and_off_target_games_are_skipped() {
        let current = StatTable::default();
        let historical = StatTable::default();
        let adjuster = InjuryAdjuster::bypassed();
        let model = |_: f64| 0.5;

        let mut engine = Engine::new(
            StrengthResolver::new(&current, &historical),
            &adjuster,
            &model,
            PredictionHistoryStore::new("2025-26", "test"),
        );
        // Run after the game date: nothing qualifies.
        let report = engine.run_cycle(
            &two_team_schedules(),
            NaiveDate::from_ymd_opt(2025, 11, 6).unwrap(),
            Some(NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()),
            None,
            &NoReference,
        );
        assert!(report.rows.is_empty());
        assert!(report.summaries.is_empty());
        assert!(engine.history.is_empty());
    }

    struct FixedResults(Vec<FinalScore>);

    impl ResultsSource for FixedResults {
        fn final_scores(&self, iso_date: &str) -> Vec<FinalScore> {
            if iso_date == "2025-11-05" {
                self.0.clone()
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn reconcile_completes_matching_pending_records() {
        let current = StatTable::default();
        let historical = StatTable::default();
        let adjuster = InjuryAdjuster::bypassed();
        let model = |diff: f64| if diff >= 0.0 { 0.62 } else { 0.38 };

        let mut engine = Engine::new(
            StrengthResolver::new(&current, &historical),
            &adjuster,
            &model,
            PredictionHistoryStore::new("2025-26", "test"),
        );
        engine.run_cycle(
            &two_team_schedules(),
            NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
            Some(NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()),
            None,
            &NoReference,
        );
        assert_eq!(engine.history.pending().len(), 1);

        let results = FixedResults(vec![FinalScore {
            home_abbr: "BOS".to_string(),
            away_abbr: "DEN".to_string(),
            home_score: 101,
            away_score: 97,
        }]);
        let updated = engine.reconcile(
            &results,
            NaiveDate::from_ymd_opt(2025, 11, 6).unwrap(),
            5,
            1,
        );
        assert_eq!(updated, 1);

        let record = engine.history.get("2025-11-05", "Boston", "Denver").unwrap();
        assert!(record.completed);
        assert_eq!(record.actual_home_score, Some(101));
        assert_eq!(record.correct, Some(true));
        assert!(engine.history.pending().is_empty());

        // Outside the window nothing reconciles.
        let updated = engine.reconcile(
            &results,
            NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            5,
            1,
        );
        assert_eq!(updated, 0);
    }

    #[test]
    fn nightly_order_reconciles_finals_before_pruning() {
        let current = StatTable::default();
        let historical = StatTable::default();
        let adjuster = InjuryAdjuster::bypassed();
        let model = |diff: f64| if diff > 0.0 { 0.62 } else { 0.38 };

        let mut engine = Engine::new(
            StrengthResolver::new(&current, &historical),
            &adjuster,
            &model,
            PredictionHistoryStore::new("2025-26", "test"),
        );
        // Night one: predict the Nov 5 slate.
        engine.run_cycle(
            &two_team_schedules(),
            NaiveDate::from_ymd_opt(2025, 11, 4).unwrap(),
            Some(NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()),
            None,
            &NoReference,
        );
        assert_eq!(engine.history.pending().len(), 1);

        // Night two: the final is in. Sweep first, then prune and predict
        // the next slate; the completed record must survive the prune.
        let results = FixedResults(vec![FinalScore {
            home_abbr: "BOS".to_string(),
            away_abbr: "DEN".to_string(),
            home_score: 101,
            away_score: 97,
        }]);
        let run_date = NaiveDate::from_ymd_opt(2025, 11, 6).unwrap();
        let updated = engine.reconcile(&results, run_date, 5, 1);
        assert_eq!(updated, 1);

        engine.run_cycle(
            &two_team_schedules(),
            run_date,
            Some(NaiveDate::from_ymd_opt(2025, 11, 7).unwrap()),
            Some(run_date - Duration::days(5)),
            &NoReference,
        );

        let record = engine.history.get("2025-11-05", "Boston", "Denver").unwrap();
        assert!(record.completed);
        assert_eq!(record.correct, Some(true));

        // Once the game ages out of the sweep window it is fair to prune.
        engine.run_cycle(
            &two_team_schedules(),
            NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            Some(NaiveDate::from_ymd_opt(2025, 11, 21).unwrap()),
            Some(NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()),
            &NoReference,
        );
        assert!(engine.history.get("2025-11-05", "Boston", "Denver").is_none());
    }

    #[test]
    fn csv_outputs_write_headers_and_rows() {
        let dir = std::env::temp_dir().join(format!("hoopcast-engine-{}", std::process::id()));
        let rows = vec![PredictionRow {
            team: "Boston".to_string(),
            display_date: "Wed, Nov 5, 2025".to_string(),
            tipoff_et: None,
            opponent: "Denver".to_string(),
            location: Location::Home,
            team_hss_adjusted: 112.75,
            opponent_hss_adjusted: 100.0,
            team_win_pct: 62.0,
            opponent_win_pct: 38.0,
            predicted_winner: "Boston".to_string(),
            expected_margin: 4.8,
            confidence_gap_pct: 12.0,
            team_reference_pct: Some(58.4),
            opponent_reference_pct: None,
        }];
        let path = dir.join("prediction_results.csv");
        write_prediction_csv(&path, &rows).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Team,Date,Tipoff (ET),Opponent,Location"));
        assert!(written.contains("Boston"));
        assert!(written.contains("58.40"));
        assert!(written.contains("N/A"));

        let summaries = vec![TeamSummary {
            team: "Boston".to_string(),
            wins: 1,
            losses: 0,
            avg_hss: 110.0,
        }];
        let path = dir.join("win_loss_records.csv");
        write_win_loss_csv(&path, &summaries).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Team,Wins,Losses,HSS"));
        assert!(written.contains("Boston,1,0,110.00000"));

        let _ = std::fs::remove_dir_all(dir);
    }
}
