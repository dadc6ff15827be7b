use serde_json::Value;
use tracing::debug;

use crate::http_client::http_client;
use crate::teams::canonical_abbr;

/// Final score for one finished game, keyed by canonical abbreviations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalScore {
    pub home_abbr: String,
    pub away_abbr: String,
    pub home_score: i32,
    pub away_score: i32,
}

/// Actual-results collaborator for the reconciliation sweep. Network failure
/// is an empty answer, never an error out of the core.
pub trait ResultsSource {
    fn final_scores(&self, iso_date: &str) -> Vec<FinalScore>;
}

pub struct ScoreboardResults {
    base_url: String,
}

impl ScoreboardResults {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ResultsSource for ScoreboardResults {
    fn final_scores(&self, iso_date: &str) -> Vec<FinalScore> {
        let datestr = iso_date.replace('-', "");
        let doc = match fetch_scoreboard(&self.base_url, &datestr) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(%err, date = iso_date, "results scoreboard unavailable");
                return Vec::new();
            }
        };
        parse_final_scores(&doc)
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

/// Extract scores for games the scoreboard marks final. In-progress and
/// scheduled games never reconcile.
pub fn parse_final_scores(doc: &Value) -> Vec<FinalScore> {
    let mut out = Vec::new();
    let Some(events) = doc.get("events").and_then(|e| e.as_array()) else {
        return out;
    };
    for event in events {
        let Some(comp) = event
            .get("competitions")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            continue;
        };
        if !is_final(comp.get("status").or_else(|| event.get("status"))) {
            continue;
        }
        let Some(competitors) = comp.get("competitors").and_then(|c| c.as_array()) else {
            continue;
        };
        let Some(game) = build_final_score(competitors) else {
            continue;
        };
        out.push(game);
    }
    out
}

fn build_final_score(competitors: &[Value]) -> Option<FinalScore> {
    let home = side(competitors, "home")?;
    let away = side(competitors, "away")?;
    Some(FinalScore {
        home_abbr: canonical_abbr(abbr(home)?),
        away_abbr: canonical_abbr(abbr(away)?),
        home_score: score(home)?,
        away_score: score(away)?,
    })
}

fn is_final(status: Option<&Value>) -> bool {
    let Some(status) = status else {
        return false;
    };
    if let Some(completed) = status
        .get("type")
        .and_then(|t| t.get("completed"))
        .and_then(|v| v.as_bool())
    {
        return completed;
    }
    status
        .get("type")
        .and_then(|t| t.get("name"))
        .and_then(|v| v.as_str())
        .map(|name| name.to_uppercase().contains("FINAL"))
        .unwrap_or(false)
}

fn side<'a>(competitors: &'a [Value], home_away: &str) -> Option<&'a Value> {
    competitors
        .iter()
        .find(|c| c.get("homeAway").and_then(|v| v.as_str()) == Some(home_away))
}

fn abbr(competitor: &Value) -> Option<&str> {
    competitor.get("team")?.get("abbreviation")?.as_str()
}

/// Scores arrive as strings ("101") or numbers depending on the feed.
fn score(competitor: &Value) -> Option<i32> {
    match competitor.get("score")? {
        Value::String(s) => s.trim().parse::<f64>().ok().map(|v| v as i32),
        Value::Number(n) => n.as_f64().map(|v| v as i32),
        _ => None,
    }
}
