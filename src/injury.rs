use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::teams;

/// HSS values sit around 100-200, player scores around 0-100, so raw
/// penalties scale down before they touch the strength score.
const PENALTY_SCALE: f64 = 0.05;
/// An "Out" player with no score on record still costs something.
const UNKNOWN_PLAYER_FLOOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjuryStatus {
    Out,
    DayToDay,
}

impl InjuryStatus {
    /// Any other status (Probable, Questionable, ...) carries no penalty.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Out" => Some(Self::Out),
            "Day-To-Day" => Some(Self::DayToDay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InjuryEntry {
    pub team: String,
    pub player: String,
    pub status: InjuryStatus,
    /// Feed-supplied estimate like "Jan 15"; no year attached.
    pub estimated_return: Option<String>,
}

/// Computes the availability penalty a roster of injuries costs a team.
#[derive(Debug, Clone, Default)]
pub struct InjuryAdjuster {
    entries: Vec<InjuryEntry>,
    // team -> player -> baseline contribution score
    scores: HashMap<String, HashMap<String, f64>>,
    bypass: bool,
}

impl InjuryAdjuster {
    pub fn new(entries: Vec<InjuryEntry>, scores: HashMap<String, HashMap<String, f64>>) -> Self {
        Self {
            entries,
            scores,
            bypass: false,
        }
    }

    /// A bypassed adjuster hands back the base strength untouched; used when
    /// evaluating the model without the availability signal.
    pub fn bypassed() -> Self {
        Self {
            bypass: true,
            ..Self::default()
        }
    }

    pub fn load(injuries_csv: &Path, scores_csv: &Path) -> Result<Self> {
        Ok(Self::new(
            load_injuries(injuries_csv)?,
            load_player_scores(scores_csv)?,
        ))
    }

    /// Sum of qualifying per-player penalties for one team.
    pub fn penalty(&self, team: &str, game_date: Option<NaiveDate>) -> f64 {
        let normalized = normalize_team(team);
        let mut total = 0.0;

        for entry in &self.entries {
            if !team_matches(&entry.team, &normalized) {
                continue;
            }
            if let Some(game_date) = game_date
                && returns_before(entry.estimated_return.as_deref(), game_date)
            {
                continue;
            }

            let mut score = self.player_score(&normalized, &entry.player).unwrap_or(0.0);
            match entry.status {
                InjuryStatus::Out => {
                    if score == 0.0 {
                        score = UNKNOWN_PLAYER_FLOOR;
                    }
                }
                InjuryStatus::DayToDay => {
                    // Might still play, so half weight. No floor substitution.
                    score *= 0.5;
                }
            }
            total += score;
        }
        total
    }

    /// Returns (adjusted strength, raw penalty).
    pub fn adjust(&self, team: &str, base_hss: f64, game_date: Option<NaiveDate>) -> (f64, f64) {
        if self.bypass {
            return (base_hss, 0.0);
        }
        let penalty = self.penalty(team, game_date);
        (base_hss - penalty * PENALTY_SCALE, penalty)
    }

    fn player_score(&self, normalized_team: &str, player: &str) -> Option<f64> {
        for (team_key, players) in &self.scores {
            if team_matches(team_key, normalized_team)
                && let Some(score) = players.get(player)
            {
                return Some(*score);
            }
        }
        None
    }
}

/// Injury feeds mix short names, full names, and city prefixes; fall back to
/// a contains match in either direction when exact comparison fails.
fn team_matches(candidate: &str, normalized: &str) -> bool {
    let candidate = candidate.trim();
    if candidate == normalized {
        return true;
    }
    let a = candidate.to_lowercase();
    let b = normalized.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

fn normalize_team(name: &str) -> String {
    match teams::team_identity(name) {
        Ok(identity) => identity.short.to_string(),
        Err(_) => name.trim().to_string(),
    }
}

/// True when the estimated return parses and lands strictly before the game.
/// Estimates carry no year, so try the game's year first and roll to the next
/// year when that string does not form a real date.
fn returns_before(estimated: Option<&str>, game_date: NaiveDate) -> bool {
    let Some(raw) = estimated.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let year = game_date.format("%Y").to_string();
    let parsed = NaiveDate::parse_from_str(&format!("{raw} {year}"), "%b %d %Y").or_else(|_| {
        let next: i32 = year.parse::<i32>().unwrap_or(0) + 1;
        NaiveDate::parse_from_str(&format!("{raw} {next}"), "%b %d %Y")
    });
    match parsed {
        Ok(return_date) => return_date < game_date,
        // Unparseable estimate: assume the injury is still relevant.
        Err(_) => false,
    }
}

fn load_injuries(path: &Path) -> Result<Vec<InjuryEntry>> {
    if !path.exists() {
        warn!(path = %path.display(), "injury file missing, no penalties will apply");
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open injuries {}", path.display()))?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        if row.len() < 3 {
            skipped += 1;
            continue;
        }
        let Some(status) = InjuryStatus::parse(&row[2]) else {
            // Not an error, just a status that never costs anything.
            continue;
        };
        out.push(InjuryEntry {
            team: row[0].trim().to_string(),
            player: row[1].trim().to_string(),
            status,
            estimated_return: row
                .get(3)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        });
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed injury rows");
    }
    debug!(entries = out.len(), "loaded injury feed");
    Ok(out)
}

fn load_player_scores(path: &Path) -> Result<HashMap<String, HashMap<String, f64>>> {
    if !path.exists() {
        warn!(path = %path.display(), "player score file missing");
        return Ok(HashMap::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open player scores {}", path.display()))?;

    let mut out: HashMap<String, HashMap<String, f64>> = HashMap::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        if row.len() < 3 {
            skipped += 1;
            continue;
        }
        let Ok(score) = row[2].trim().parse::<f64>() else {
            skipped += 1;
            continue;
        };
        out.entry(row[0].trim().to_string())
            .or_default()
            .insert(row[1].trim().to_string(), score);
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed player score rows");
    }
    Ok(out)
}
