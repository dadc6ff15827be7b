use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use crate::history::ReferenceSnapshot;
use crate::http_client::http_client;
use crate::teams::canonical_abbr;

/// Supplies a third-party win-probability snapshot for one matchup, if the
/// provider published one. Absence is a valid answer.
pub trait ReferenceSource {
    fn fetch(&self, iso_date: &str, home_abbr: &str, away_abbr: &str) -> Option<ReferenceSnapshot>;
}

/// No-op source for runs where reference comparison is disabled.
pub struct NoReference;

impl ReferenceSource for NoReference {
    fn fetch(&self, _: &str, _: &str, _: &str) -> Option<ReferenceSnapshot> {
        None
    }
}

/// Scoreboard-backed reference predictor. One scoreboard document covers a
/// whole date, so responses are cached per date for the run.
pub struct ScoreboardReference {
    base_url: String,
    by_date: Mutex<HashMap<String, Value>>,
}

impl ScoreboardReference {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            by_date: Mutex::new(HashMap::new()),
        }
    }

    fn scoreboard_for(&self, iso_date: &str) -> Option<Value> {
        let datestr = iso_date.replace('-', "");
        {
            let cache = self.by_date.lock().expect("scoreboard cache lock poisoned");
            if let Some(doc) = cache.get(&datestr) {
                return Some(doc.clone());
            }
        }

        let doc = match fetch_scoreboard(&self.base_url, &datestr) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(%err, date = iso_date, "reference scoreboard unavailable");
                return None;
            }
        };
        let mut cache = self.by_date.lock().expect("scoreboard cache lock poisoned");
        cache.insert(datestr, doc.clone());
        Some(doc)
    }
}

impl ReferenceSource for ScoreboardReference {
    fn fetch(&self, iso_date: &str, home_abbr: &str, away_abbr: &str) -> Option<ReferenceSnapshot> {
        let doc = self.scoreboard_for(iso_date)?;
        parse_reference_snapshot(&doc, home_abbr, away_abbr)
    }
}

fn fetch_scoreboard(base_url: &str, datestr: &str) -> anyhow::Result<Value> {
    let client = http_client()?;
    let body = client
        .get(format!("{base_url}?dates={datestr}"))
        .send()?
        .error_for_status()?
        .text()?;
    Ok(serde_json::from_str(&body)?)
}

/// Pick the event matching (home, away) out of a scoreboard document and
/// extract the predictor percentages. Returns None when the matchup is not
/// listed or carries no predictor block.
pub fn parse_reference_snapshot(
    doc: &Value,
    home_abbr: &str,
    away_abbr: &str,
) -> Option<ReferenceSnapshot> {
    let want_home = canonical_abbr(home_abbr);
    let want_away = canonical_abbr(away_abbr);

    for event in doc.get("events")?.as_array()? {
        let comp = event.get("competitions")?.as_array()?.first()?;
        let competitors = comp.get("competitors").and_then(|c| c.as_array())?;
        let home = side(competitors, "home")?;
        let away = side(competitors, "away")?;

        let event_home = canonical_abbr(team_field(home, "abbreviation").unwrap_or_default());
        let event_away = canonical_abbr(team_field(away, "abbreviation").unwrap_or_default());
        if event_home != want_home || event_away != want_away {
            continue;
        }

        let game_id = event
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let source_url = gamecast_link(event).or_else(|| game_id.clone());

        let predictor = comp.get("predictor").or_else(|| event.get("predictor"));
        let home_pct = predictor
            .and_then(|p| p.get("homeTeam"))
            .and_then(extract_pct);
        let away_pct = predictor
            .and_then(|p| p.get("awayTeam"))
            .and_then(extract_pct);

        let mut favorite_full = None;
        let mut favorite_abbr = None;
        let mut confidence_gap = None;
        if let (Some(home_pct), Some(away_pct)) = (home_pct, away_pct) {
            let (favored, pct) = if home_pct >= away_pct {
                (home, home_pct)
            } else {
                (away, away_pct)
            };
            favorite_full = team_field(favored, "displayName").map(|s| s.to_string());
            favorite_abbr = team_field(favored, "abbreviation").map(canonical_abbr);
            confidence_gap = Some(round3((pct - 50.0).abs()));
        }

        return Some(ReferenceSnapshot {
            game_id,
            source_url,
            home_pct,
            away_pct,
            favorite_full,
            favorite_abbr,
            confidence_gap,
        });
    }
    None
}

fn side<'a>(competitors: &'a [Value], home_away: &str) -> Option<&'a Value> {
    competitors
        .iter()
        .find(|c| c.get("homeAway").and_then(|v| v.as_str()) == Some(home_away))
}

fn team_field<'a>(competitor: &'a Value, field: &str) -> Option<&'a str> {
    competitor.get("team")?.get(field)?.as_str()
}

fn gamecast_link(event: &Value) -> Option<String> {
    for link in event.get("links")?.as_array()? {
        let rels = link.get("rel").and_then(|r| r.as_array());
        let is_gamecast = rels
            .map(|r| r.iter().any(|v| v.as_str() == Some("gamecast")))
            .unwrap_or(false);
        if is_gamecast {
            return link.get("href")?.as_str().map(|s| s.to_string());
        }
    }
    None
}

/// Providers publish probabilities under several keys and as either a
/// fraction, a percentage, or a "62.5%" string.
fn extract_pct(entry: &Value) -> Option<f64> {
    for key in [
        "teamChance",
        "chance",
        "probability",
        "gameProjection",
        "winPercentage",
        "displayValue",
    ] {
        if let Some(value) = entry.get(key)
            && let Some(pct) = normalize_pct(value)
        {
            return Some(pct);
        }
    }
    None
}

fn normalize_pct(value: &Value) -> Option<f64> {
    let numeric = match value {
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    let numeric = if numeric <= 1.0 { numeric * 100.0 } else { numeric };
    Some(round3(numeric))
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}
