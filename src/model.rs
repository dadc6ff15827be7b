use tracing::info;

use crate::predictor::ScoringModel;

/// Least-squares line over (strength differential feature, win fraction)
/// samples, clamped into [0, 1] at prediction time. Stands in for whatever
/// fitted regressor the training pipeline hands over; the engine only ever
/// calls `predict`.
#[derive(Debug, Clone, Copy)]
pub struct LinearWinModel {
    slope: f64,
    intercept: f64,
}

impl LinearWinModel {
    pub fn fit(samples: &[(f64, f64)]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut cov = 0.0;
        let mut var = 0.0;
        for (x, y) in samples {
            cov += (x - mean_x) * (y - mean_y);
            var += (x - mean_x) * (x - mean_x);
        }

        let slope = if var > 0.0 { cov / var } else { 0.0 };
        let intercept = mean_y - slope * mean_x;
        info!(samples = samples.len(), slope, intercept, "fitted scoring model");
        Some(Self { slope, intercept })
    }

    /// Degenerate fallback when no training data exists: every matchup is a
    /// coin flip, which the tie-break then resolves deterministically.
    pub fn coin_flip() -> Self {
        Self {
            slope: 0.0,
            intercept: 0.5,
        }
    }
}

impl ScoringModel for LinearWinModel {
    fn predict(&self, differential: f64) -> f64 {
        (self.intercept + self.slope * differential).clamp(0.0, 1.0)
    }
}
