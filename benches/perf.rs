use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use hoopcast::history::{NewPrediction, PredictionHistoryStore};
use hoopcast::model::LinearWinModel;
use hoopcast::predictor::{Location, predict_matchup};
use hoopcast::strength::{StatTable, StrengthRecord, StrengthResolver};

fn seeded_table() -> StatTable {
    let mut table = StatTable::default();
    for (idx, team) in ["Boston", "Denver", "Miami", "Phoenix", "Utah"]
        .iter()
        .enumerate()
    {
        for category in ["Offense", "Defense", "Pace"] {
            for year in [2023, 2024, 2025] {
                table.insert(
                    category,
                    team,
                    StrengthRecord {
                        rank: idx as u32 + 1,
                        statistic: 95.0 + idx as f64 * 3.0 + (year - 2023) as f64,
                        year,
                    },
                );
            }
        }
    }
    table
}

fn bench_strength_resolve(c: &mut Criterion) {
    let current = seeded_table();
    let historical = StatTable::default();
    let resolver = StrengthResolver::new(&current, &historical);
    c.bench_function("strength_resolve", |b| {
        b.iter(|| black_box(resolver.resolve(black_box("Phoenix"), black_box(2025))))
    });
}

fn bench_predict_matchup(c: &mut Criterion) {
    let model = LinearWinModel::fit(&[(-20.0, 0.2), (0.0, 0.5), (20.0, 0.8)]).unwrap();
    c.bench_function("predict_matchup", |b| {
        b.iter(|| {
            let outcome = predict_matchup(
                black_box(112.4),
                black_box(104.9),
                Location::Home,
                &model,
            );
            black_box(outcome.expected_margin)
        })
    });
}

fn bench_history_upsert(c: &mut Criterion) {
    c.bench_function("history_upsert", |b| {
        let mut store = PredictionHistoryStore::new("2025-26", "bench");
        b.iter(|| {
            store.upsert_prediction(NewPrediction {
                display_date: "Wed, Nov 5, 2025".to_string(),
                iso_date: "2025-11-05".to_string(),
                home_team: "Boston".to_string(),
                away_team: "Denver".to_string(),
                location: "H".to_string(),
                predicted_winner: "Boston".to_string(),
                predicted_win_pct: 62.0,
                home_hss: 112.75,
                away_hss: 100.0,
                tipoff_et: Some("7:30p".to_string()),
                model_home_pct: Some(62.0),
                model_away_pct: Some(38.0),
            });
            black_box(store.len())
        })
    });
}

criterion_group!(
    benches,
    bench_strength_resolve,
    bench_predict_matchup,
    bench_history_upsert
);
criterion_main!(benches);
