use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// One per-year sample from a statistic feed for a single team.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthRecord {
    pub rank: u32,
    pub statistic: f64,
    pub year: i32,
}

/// Statistic samples grouped category-then-team. The engine only iterates;
/// it does not care how many categories a feed ships.
#[derive(Debug, Clone, Default)]
pub struct StatTable {
    categories: HashMap<String, HashMap<String, Vec<StrengthRecord>>>,
    // (strength differential feature, win fraction) pairs for model fitting.
    training: Vec<(f64, f64)>,
}

impl StatTable {
    pub fn insert(&mut self, category: &str, team: &str, record: StrengthRecord) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .entry(team.to_string())
            .or_default()
            .push(record);
    }

    pub fn push_training_pair(&mut self, statistic: f64, win_fraction: f64) {
        self.training.push((statistic, win_fraction));
    }

    /// All samples for a team across every category.
    pub fn samples_for<'a>(&'a self, team: &'a str) -> impl Iterator<Item = &'a StrengthRecord> {
        self.categories
            .values()
            .filter_map(move |teams| teams.get(team))
            .flatten()
    }

    pub fn teams(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .values()
            .flat_map(|teams| teams.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn training_pairs(&self) -> &[(f64, f64)] {
        &self.training
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Load `<root>/<category>/<Team>.csv` trees. Rows are
    /// `rank,statistic,year[,win_pct]`; malformed rows are skipped and counted.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut table = StatTable::default();
        if !root.is_dir() {
            warn!(root = %root.display(), "statistic directory missing, feed is empty");
            return Ok(table);
        }

        let mut skipped = 0usize;
        for category_entry in root
            .read_dir()
            .with_context(|| format!("read statistic root {}", root.display()))?
        {
            let category_dir = category_entry?.path();
            if !category_dir.is_dir() {
                continue;
            }
            let category = category_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            for file_entry in category_dir
                .read_dir()
                .with_context(|| format!("read category {}", category_dir.display()))?
            {
                let file = file_entry?.path();
                if file.extension().and_then(|e| e.to_str()) != Some("csv") {
                    continue;
                }
                let Some(team) = file.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let team = team.to_string();

                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .flexible(true)
                    .from_path(&file)
                    .with_context(|| format!("open statistic file {}", file.display()))?;
                for row in reader.records() {
                    let row = match row {
                        Ok(row) => row,
                        Err(_) => {
                            skipped += 1;
                            continue;
                        }
                    };
                    match parse_stat_row(&row) {
                        Ok((record, win_pct)) => {
                            table.insert(&category, &team, record);
                            if let Some(win_pct) = win_pct {
                                table.push_training_pair(record.statistic, win_pct);
                            }
                        }
                        Err(err) => {
                            skipped += 1;
                            debug!(file = %file.display(), %err, "skipping statistic row");
                        }
                    }
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, root = %root.display(), "skipped malformed statistic rows");
        }
        Ok(table)
    }
}

/// Rows carry `rank,statistic,year` with an optional trailing win percentage
/// (a 0..=1 fraction) used only for model fitting.
fn parse_stat_row(row: &csv::StringRecord) -> Result<(StrengthRecord, Option<f64>)> {
    if row.len() < 3 {
        anyhow::bail!("expected at least 3 fields, got {}", row.len());
    }
    let rank = row[0].trim().parse::<u32>().context("rank")?;
    let statistic = row[1].trim().parse::<f64>().context("statistic")?;
    let year = row[2].trim().parse::<i32>().context("year")?;
    let win_pct = row
        .get(3)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok());
    Ok((StrengthRecord { rank, statistic, year }, win_pct))
}

/// Resolves a team's strength score (HSS) for a target year by averaging all
/// category samples, falling back current-exact-year -> current-any-year ->
/// historical-exact-year. No data anywhere resolves to 0.0, which is a logged
/// condition rather than an error.
#[derive(Debug, Clone, Copy)]
pub struct StrengthResolver<'a> {
    current: &'a StatTable,
    historical: &'a StatTable,
}

impl<'a> StrengthResolver<'a> {
    pub fn new(current: &'a StatTable, historical: &'a StatTable) -> Self {
        Self { current, historical }
    }

    pub fn resolve(&self, team: &str, year: i32) -> f64 {
        if let Some(hss) = mean_samples(self.current, team, Some(year)) {
            return hss;
        }
        if let Some(hss) = mean_samples(self.current, team, None) {
            return hss;
        }
        if let Some(hss) = mean_samples(self.historical, team, Some(year)) {
            return hss;
        }
        debug!(team, year, "no strength samples in any tier, using 0.0");
        0.0
    }
}

fn mean_samples(table: &StatTable, team: &str, year: Option<i32>) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for sample in table.samples_for(team) {
        if let Some(year) = year
            && sample.year != year
        {
            continue;
        }
        total += sample.statistic;
        count += 1;
    }
    (count > 0).then(|| total / count as f64)
}
