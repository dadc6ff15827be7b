use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::predictor::round2;
use crate::teams;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

fn now_iso() -> String {
    Local::now().format(ISO_FORMAT).to_string()
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Coarse classification of how far a prediction sits from a toss-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBucket {
    High,
    Medium,
    Low,
}

impl ConfidenceBucket {
    pub fn from_gap(gap_pct: f64) -> Self {
        if gap_pct >= 20.0 {
            Self::High
        } else if gap_pct >= 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// How close the projected margin landed to the actual margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentBucket {
    Tight,
    Moderate,
    Wide,
}

impl AlignmentBucket {
    pub fn from_margin_error(error: f64) -> Self {
        if error <= 3.0 {
            Self::Tight
        } else if error <= 7.0 {
            Self::Moderate
        } else {
            Self::Wide
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceAlignment {
    Agree,
    Disagree,
}

/// (season, game_date, home_team, away_team)
pub type RecordKey = (String, String, String, String);

/// The persisted reconciliation entity: one row per scheduled matchup,
/// pending until the real result lands, immutable (prediction-side) after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub season: String,
    /// ISO date (YYYY-MM-DD).
    pub game_date: String,
    pub display_date: String,
    #[serde(default)]
    pub game_tipoff_et: Option<String>,
    pub home_team: String,
    #[serde(default)]
    pub home_team_full: Option<String>,
    #[serde(default)]
    pub home_team_abbr: Option<String>,
    pub away_team: String,
    #[serde(default)]
    pub away_team_full: Option<String>,
    #[serde(default)]
    pub away_team_abbr: Option<String>,
    pub location: String,
    pub predicted_winner: String,
    #[serde(default)]
    pub predicted_winner_full: Option<String>,
    #[serde(default)]
    pub predicted_winner_abbr: Option<String>,
    pub predicted_win_pct: f64,
    pub home_hss: f64,
    pub away_hss: f64,
    #[serde(default)]
    pub model_home_pct: Option<f64>,
    #[serde(default)]
    pub model_away_pct: Option<f64>,
    #[serde(default)]
    pub confidence_gap_pct: Option<f64>,
    #[serde(default)]
    pub confidence_bucket: Option<ConfidenceBucket>,
    #[serde(default)]
    pub expected_margin: Option<f64>,
    pub generated_at: String,
    pub model_version: String,
    #[serde(default)]
    pub actual_home_score: Option<i32>,
    #[serde(default)]
    pub actual_away_score: Option<i32>,
    #[serde(default)]
    pub actual_winner: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub actual_margin: Option<i32>,
    #[serde(default)]
    pub margin_error: Option<f64>,
    #[serde(default)]
    pub alignment_bucket: Option<AlignmentBucket>,
    #[serde(default)]
    pub reference_game_id: Option<String>,
    #[serde(default)]
    pub reference_source_url: Option<String>,
    #[serde(default)]
    pub reference_home_pct: Option<f64>,
    #[serde(default)]
    pub reference_away_pct: Option<f64>,
    #[serde(default)]
    pub reference_favorite_full: Option<String>,
    #[serde(default)]
    pub reference_favorite_abbr: Option<String>,
    #[serde(default)]
    pub reference_confidence_gap: Option<f64>,
    #[serde(default)]
    pub reference_model_delta_pct: Option<f64>,
    #[serde(default)]
    pub reference_alignment: Option<ReferenceAlignment>,
    #[serde(default)]
    pub reference_last_checked: Option<String>,
    pub last_updated: String,
}

impl PredictionRecord {
    pub fn key(&self) -> RecordKey {
        (
            self.season.clone(),
            self.game_date.clone(),
            self.home_team.clone(),
            self.away_team.clone(),
        )
    }
}

/// Inputs for one prediction upsert; identity and derived fields are filled
/// in by the store.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub display_date: String,
    pub iso_date: String,
    pub home_team: String,
    pub away_team: String,
    pub location: String,
    pub predicted_winner: String,
    pub predicted_win_pct: f64,
    pub home_hss: f64,
    pub away_hss: f64,
    pub tipoff_et: Option<String>,
    pub model_home_pct: Option<f64>,
    pub model_away_pct: Option<f64>,
}

/// A third-party win-probability snapshot for one matchup. Stored alongside
/// the model's own numbers for comparison, never used to alter them.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    pub game_id: Option<String>,
    pub source_url: Option<String>,
    pub home_pct: Option<f64>,
    pub away_pct: Option<f64>,
    pub favorite_full: Option<String>,
    pub favorite_abbr: Option<String>,
    pub confidence_gap: Option<f64>,
}

/// Owns the full record set for a season. State machine per key:
/// absent -> pending (refreshable) -> completed (prediction fields frozen).
#[derive(Debug, Clone)]
pub struct PredictionHistoryStore {
    season: String,
    model_version: String,
    records: HashMap<RecordKey, PredictionRecord>,
}

impl PredictionHistoryStore {
    pub fn new(season: &str, model_version: &str) -> Self {
        Self {
            season: season.to_string(),
            model_version: model_version.to_string(),
            records: HashMap::new(),
        }
    }

    /// Whole-snapshot load. A missing or corrupt file is "no prior history":
    /// the snapshot is a cache of derivable state, not the source of truth.
    pub fn load(path: &Path, season: &str, model_version: &str) -> Self {
        let mut store = Self::new(season, model_version);
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return store,
        };
        let rows: Vec<PredictionRecord> = match serde_json::from_str(&raw) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(path = %path.display(), %err, "history snapshot unreadable, starting empty");
                return store;
            }
        };
        for record in rows {
            store.records.insert(record.key(), record);
        }
        info!(records = store.records.len(), "loaded prediction history");
        store
    }

    /// Whole-snapshot save: write a temp file then swap, so a crash mid-write
    /// never clobbers the previous snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create history dir {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.snapshot()).context("serialize history snapshot")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    /// Drop records strictly older than the cutoff. Run once per cycle before
    /// new predictions are generated.
    pub fn prune_before(&mut self, cutoff_iso: &str) {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.game_date.as_str() >= cutoff_iso);
        let removed = before - self.records.len();
        if removed > 0 {
            debug!(removed, cutoff = cutoff_iso, "pruned stale history records");
        }
    }

    /// Insert or refresh the prediction snapshot for one matchup. Completed
    /// records refuse the refresh; pending records keep any already-recorded
    /// outcome and reference fields.
    pub fn upsert_prediction(&mut self, input: NewPrediction) {
        let (home_full, home_abbr) = match identity_pair(&input.home_team) {
            Some(pair) => pair,
            None => return,
        };
        let (away_full, away_abbr) = match identity_pair(&input.away_team) {
            Some(pair) => pair,
            None => return,
        };
        let (winner_full, winner_abbr) = match identity_pair(&input.predicted_winner) {
            Some(pair) => pair,
            None => return,
        };

        let confidence_gap_pct = match (input.model_home_pct, input.model_away_pct) {
            (Some(home), Some(away)) => (home - away).abs() / 2.0,
            _ => (input.predicted_win_pct - 50.0).abs(),
        };
        let expected_margin = round2(confidence_gap_pct * 0.4);
        let bucket = ConfidenceBucket::from_gap(confidence_gap_pct);

        let mut record = PredictionRecord {
            season: self.season.clone(),
            game_date: input.iso_date.clone(),
            display_date: input.display_date,
            game_tipoff_et: input.tipoff_et,
            home_team: input.home_team.clone(),
            home_team_full: Some(home_full),
            home_team_abbr: Some(home_abbr),
            away_team: input.away_team.clone(),
            away_team_full: Some(away_full),
            away_team_abbr: Some(away_abbr),
            location: input.location,
            predicted_winner: input.predicted_winner,
            predicted_winner_full: Some(winner_full),
            predicted_winner_abbr: Some(winner_abbr),
            predicted_win_pct: round3(input.predicted_win_pct),
            home_hss: round5(input.home_hss),
            away_hss: round5(input.away_hss),
            model_home_pct: input.model_home_pct.map(round3),
            model_away_pct: input.model_away_pct.map(round3),
            confidence_gap_pct: Some(round3(confidence_gap_pct)),
            confidence_bucket: Some(bucket),
            expected_margin: Some(expected_margin),
            generated_at: now_iso(),
            model_version: self.model_version.clone(),
            actual_home_score: None,
            actual_away_score: None,
            actual_winner: None,
            completed: false,
            correct: None,
            actual_margin: None,
            margin_error: None,
            alignment_bucket: None,
            reference_game_id: None,
            reference_source_url: None,
            reference_home_pct: None,
            reference_away_pct: None,
            reference_favorite_full: None,
            reference_favorite_abbr: None,
            reference_confidence_gap: None,
            reference_model_delta_pct: None,
            reference_alignment: None,
            reference_last_checked: None,
            last_updated: now_iso(),
        };

        let key = record.key();
        if let Some(existing) = self.records.get(&key) {
            if existing.completed {
                // Audit-trail protection: the pre-game snapshot stays as made.
                debug!(
                    home = input.home_team,
                    away = input.away_team,
                    date = input.iso_date,
                    "skipping prediction refresh for completed game"
                );
                return;
            }
            record.actual_home_score = existing.actual_home_score;
            record.actual_away_score = existing.actual_away_score;
            record.actual_winner = existing.actual_winner.clone();
            record.completed = existing.completed;
            record.correct = existing.correct;
            record.actual_margin = existing.actual_margin;
            record.margin_error = existing.margin_error;
            record.alignment_bucket = existing.alignment_bucket;
            record.reference_game_id = existing.reference_game_id.clone();
            record.reference_source_url = existing.reference_source_url.clone();
            record.reference_home_pct = existing.reference_home_pct;
            record.reference_away_pct = existing.reference_away_pct;
            record.reference_favorite_full = existing.reference_favorite_full.clone();
            record.reference_favorite_abbr = existing.reference_favorite_abbr.clone();
            record.reference_confidence_gap = existing.reference_confidence_gap;
            record.reference_model_delta_pct = existing.reference_model_delta_pct;
            record.reference_alignment = existing.reference_alignment;
            record.reference_last_checked = existing.reference_last_checked.clone();
            record.last_updated = existing.last_updated.clone();
            if record.model_home_pct.is_none() {
                record.model_home_pct = existing.model_home_pct;
            }
            if record.model_away_pct.is_none() {
                record.model_away_pct = existing.model_away_pct;
            }
        }
        self.records.insert(key, record);
    }

    /// Merge the real final score into an existing record and complete it.
    /// A no-op for unknown keys; idempotent when repeated with the same score.
    pub fn upsert_actual_results(
        &mut self,
        iso_date: &str,
        home_team: &str,
        away_team: &str,
        home_score: i32,
        away_score: i32,
    ) {
        let key = self.key_for(iso_date, home_team, away_team);
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };

        let actual_margin = (home_score - away_score).abs();
        let actual_winner = if home_score > away_score {
            home_team.to_string()
        } else {
            away_team.to_string()
        };
        let margin_error = record
            .expected_margin
            .map(|expected| round2((expected - actual_margin as f64).abs()));

        record.actual_home_score = Some(home_score);
        record.actual_away_score = Some(away_score);
        record.correct = Some(actual_winner == record.predicted_winner);
        record.actual_winner = Some(actual_winner);
        record.completed = true;
        record.actual_margin = Some(actual_margin);
        record.margin_error = margin_error;
        record.alignment_bucket = margin_error.map(AlignmentBucket::from_margin_error);
        record.last_updated = now_iso();
    }

    /// Attach or refresh the third-party reference block. Allowed in any
    /// state; never touches completion or the model's own prediction.
    pub fn update_reference_prediction(
        &mut self,
        iso_date: &str,
        home_team: &str,
        away_team: &str,
        snapshot: ReferenceSnapshot,
    ) {
        let key = self.key_for(iso_date, home_team, away_team);
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };

        // Compare the reference number for whichever side this model favored.
        let (reference_pct, model_pct) = if record.predicted_winner == record.home_team {
            (
                snapshot.home_pct,
                record.model_home_pct.or(Some(record.predicted_win_pct)),
            )
        } else if record.predicted_winner == record.away_team {
            (
                snapshot.away_pct,
                record.model_away_pct.or(Some(record.predicted_win_pct)),
            )
        } else {
            (None, None)
        };
        let model_delta = match (model_pct, reference_pct) {
            (Some(model), Some(reference)) => Some(round3(model - reference)),
            _ => None,
        };

        let alignment = match (
            snapshot.favorite_abbr.as_deref(),
            record.predicted_winner_abbr.as_deref(),
        ) {
            (Some(favorite), Some(winner)) => Some(if favorite == winner {
                ReferenceAlignment::Agree
            } else {
                ReferenceAlignment::Disagree
            }),
            _ => None,
        };

        record.reference_game_id = snapshot.game_id;
        record.reference_source_url = snapshot.source_url;
        record.reference_home_pct = snapshot.home_pct;
        record.reference_away_pct = snapshot.away_pct;
        record.reference_favorite_full = snapshot.favorite_full;
        record.reference_favorite_abbr = snapshot.favorite_abbr;
        record.reference_confidence_gap = snapshot.confidence_gap;
        record.reference_model_delta_pct = model_delta;
        record.reference_alignment = alignment;
        record.reference_last_checked = Some(now_iso());
        record.last_updated = now_iso();
    }

    /// All records ordered by (game date, tipoff), the persistence order.
    pub fn snapshot(&self) -> Vec<PredictionRecord> {
        let mut rows: Vec<PredictionRecord> = self.records.values().cloned().collect();
        rows.sort_by(|a, b| {
            (a.game_date.as_str(), a.game_tipoff_et.as_deref().unwrap_or(""))
                .cmp(&(b.game_date.as_str(), b.game_tipoff_et.as_deref().unwrap_or("")))
        });
        rows
    }

    /// Input set for the results reconciliation sweep.
    pub fn pending(&self) -> Vec<&PredictionRecord> {
        self.records.values().filter(|r| !r.completed).collect()
    }

    pub fn get(&self, iso_date: &str, home_team: &str, away_team: &str) -> Option<&PredictionRecord> {
        self.records
            .get(&self.key_for(iso_date, home_team, away_team))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key_for(&self, iso_date: &str, home_team: &str, away_team: &str) -> RecordKey {
        (
            self.season.clone(),
            iso_date.to_string(),
            home_team.to_string(),
            away_team.to_string(),
        )
    }
}

/// (full name, abbreviation) or a logged skip for names the identity table
/// does not know; the batch keeps going.
fn identity_pair(team: &str) -> Option<(String, String)> {
    match teams::team_identity(team) {
        Ok(identity) => Some((identity.full.to_string(), identity.abbr.to_string())),
        Err(err) => {
            warn!(%err, "skipping history entry");
            None
        }
    }
}
