use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::predictor::Location;

/// One row of a team's schedule, normalized for prediction.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// As printed in the source, e.g. "Wed, Nov 5, 2025".
    pub display_date: String,
    pub date: NaiveDate,
    pub tipoff_et: Option<String>,
    pub opponent: String,
    pub location: Location,
    /// Season year the game's statistics should resolve against.
    pub year: i32,
}

impl ScheduleEntry {
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Schedule dates arrive as "Wed, Nov 5, 2025", occasionally without the
/// year; those fall back to the season start year.
pub fn normalize_game_date(raw: &str, season_start_year: i32) -> Result<(String, NaiveDate)> {
    let cleaned = raw.trim().trim_matches('"').to_string();
    let parsed = NaiveDate::parse_from_str(&cleaned, "%a, %b %d, %Y").or_else(|_| {
        NaiveDate::parse_from_str(&format!("{cleaned}, {season_start_year}"), "%a, %b %d, %Y")
    });
    let date = parsed.with_context(|| format!("unparseable game date {cleaned:?}"))?;
    Ok((cleaned, date))
}

/// Rows are `date,tipoff,opponent,location[,...]`. Malformed rows are
/// skipped and counted, never fatal.
pub fn read_schedule_csv(path: &Path, season_start_year: i32) -> Result<Vec<ScheduleEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open schedule {}", path.display()))?;

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        if row.len() < 4 {
            skipped += 1;
            continue;
        }
        let (display_date, date) = match normalize_game_date(&row[0], season_start_year) {
            Ok(parsed) => parsed,
            Err(err) => {
                skipped += 1;
                debug!(%err, "skipping schedule row");
                continue;
            }
        };
        let tipoff = row[1].trim();
        out.push(ScheduleEntry {
            display_date,
            date,
            tipoff_et: (!tipoff.is_empty()).then(|| tipoff.to_string()),
            opponent: row[2].trim().to_string(),
            location: Location::parse(&row[3]),
            year: date.format("%Y").to_string().parse().unwrap_or(season_start_year),
        });
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped malformed schedule rows");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_date_parses_as_written() {
        let (display, date) = normalize_game_date("\"Wed, Nov 5, 2025\"", 2025).unwrap();
        assert_eq!(display, "Wed, Nov 5, 2025");
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
    }

    #[test]
    fn missing_year_falls_back_to_season_start() {
        let (_, date) = normalize_game_date("Wed, Nov 5", 2025).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
    }

    #[test]
    fn garbage_date_is_an_error() {
        assert!(normalize_game_date("sometime soon", 2025).is_err());
    }

    #[test]
    fn schedule_reader_skips_short_and_bad_rows() {
        let dir = std::env::temp_dir().join(format!("hoopcast-sched-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Boston.csv");
        std::fs::write(
            &path,
            "Date,Start (ET),Opponent,Location\n\
             \"Wed, Nov 5, 2025\",7:30p,Denver,A\n\
             short,row\n\
             not a date,7:00p,Miami,H\n\
             \"Fri, Nov 7, 2025\",,Miami,H\n",
        )
        .unwrap();

        let entries = read_schedule_csv(&path, 2025).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].opponent, "Denver");
        assert_eq!(entries[0].location, Location::Away);
        assert_eq!(entries[0].tipoff_et.as_deref(), Some("7:30p"));
        assert_eq!(entries[1].tipoff_et, None);
        assert_eq!(entries[1].location, Location::Home);
        assert_eq!(entries[1].year, 2025);
        let _ = std::fs::remove_dir_all(dir);
    }
}
