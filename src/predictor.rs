/// Minimum home boost in HSS points; otherwise scales with opponent strength.
const HOME_ADV_MIN: f64 = 2.75;
const HOME_ADV_RATE: f64 = 0.01425;
/// Heuristic translation of probability skew into a points spread.
const MARGIN_PER_GAP_PCT: f64 = 0.4;

/// Previously fitted scoring collaborator. Training lives outside the engine;
/// the engine only needs the strength differential mapped to a home-side-of-
/// the-differential win probability in [0, 1].
pub trait ScoringModel {
    fn predict(&self, differential: f64) -> f64;
}

impl<F: Fn(f64) -> f64> ScoringModel for F {
    fn predict(&self, differential: f64) -> f64 {
        self(differential)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Home,
    Away,
    Neutral,
}

impl Location {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "H" => Self::Home,
            "A" => Self::Away,
            _ => Self::Neutral,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Home => "H",
            Self::Away => "A",
            Self::Neutral => "N",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Team,
    Opponent,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchupOutcome {
    /// Evaluated team's strength after any home boost.
    pub team_adjusted: f64,
    pub opponent_adjusted: f64,
    pub team_win_pct: f64,
    pub opponent_win_pct: f64,
    pub winner: Side,
    pub confidence_gap_pct: f64,
    pub expected_margin: f64,
}

impl MatchupOutcome {
    pub fn winner_win_pct(&self) -> f64 {
        match self.winner {
            Side::Team => self.team_win_pct,
            Side::Opponent => self.opponent_win_pct,
        }
    }

    /// The evaluated team is not always the home side; map the pair for
    /// storage keyed home/away.
    pub fn home_away_pcts(&self, team_is_home: bool) -> (f64, f64) {
        if team_is_home {
            (self.team_win_pct, self.opponent_win_pct)
        } else {
            (self.opponent_win_pct, self.team_win_pct)
        }
    }
}

/// Pure function of two injury-adjusted strengths, the evaluated team's
/// location, and the fitted model.
pub fn predict_matchup(
    team_adjusted: f64,
    opponent_adjusted: f64,
    location: Location,
    model: &dyn ScoringModel,
) -> MatchupOutcome {
    let mut team_adjusted = team_adjusted;
    if location == Location::Home {
        team_adjusted += home_advantage_boost(opponent_adjusted);
    }

    let differential = team_adjusted - opponent_adjusted;
    let probability = model.predict(differential);
    let team_win_pct = probability * 100.0;
    let opponent_win_pct = 100.0 - team_win_pct;

    let winner = if probability > 0.5 {
        Side::Team
    } else if probability < 0.5 {
        Side::Opponent
    } else {
        // Exact toss-up: deterministic tie-break to whichever side hosts.
        if location == Location::Home {
            Side::Team
        } else {
            Side::Opponent
        }
    };

    let confidence_gap_pct = (team_win_pct - 50.0).abs();
    let expected_margin = round2(confidence_gap_pct * MARGIN_PER_GAP_PCT);

    MatchupOutcome {
        team_adjusted,
        opponent_adjusted,
        team_win_pct,
        opponent_win_pct,
        winner,
        confidence_gap_pct,
        expected_margin,
    }
}

pub fn home_advantage_boost(opponent_adjusted: f64) -> f64 {
    (opponent_adjusted * HOME_ADV_RATE).max(HOME_ADV_MIN)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_boost_has_a_floor() {
        assert_eq!(home_advantage_boost(100.0), 2.75);
        // Above the floor the boost scales with opponent strength.
        assert!((home_advantage_boost(200.0) - 2.85).abs() < 1e-9);
    }

    #[test]
    fn favored_home_team_wins_with_margin() {
        let model = |diff: f64| {
            assert!((diff - 12.75).abs() < 1e-9);
            0.62
        };
        let outcome = predict_matchup(110.0, 100.0, Location::Home, &model);
        assert_eq!(outcome.winner, Side::Team);
        assert!((outcome.team_win_pct - 62.0).abs() < 1e-9);
        assert!((outcome.confidence_gap_pct - 12.0).abs() < 1e-9);
        assert_eq!(outcome.expected_margin, 4.8);
        assert_eq!(outcome.home_away_pcts(true), (62.0, 38.0));
    }

    #[test]
    fn away_team_gets_no_boost() {
        let model = |diff: f64| {
            assert!((diff - 10.0).abs() < 1e-9);
            0.40
        };
        let outcome = predict_matchup(110.0, 100.0, Location::Away, &model);
        assert_eq!(outcome.winner, Side::Opponent);
        assert_eq!(outcome.winner_win_pct(), 60.0);
        assert_eq!(outcome.home_away_pcts(false), (60.0, 40.0));
    }

    #[test]
    fn exact_tie_breaks_to_host() {
        let model = |_: f64| 0.5;
        let home = predict_matchup(100.0, 102.75, Location::Home, &model);
        assert_eq!(home.winner, Side::Team);
        let away = predict_matchup(100.0, 100.0, Location::Away, &model);
        assert_eq!(away.winner, Side::Opponent);
        let neutral = predict_matchup(100.0, 100.0, Location::Neutral, &model);
        assert_eq!(neutral.winner, Side::Opponent);
    }

    #[test]
    fn expected_margin_rounds_to_two_decimals() {
        let model = |_: f64| 0.557;
        let outcome = predict_matchup(100.0, 100.0, Location::Neutral, &model);
        // gap 5.7 -> 2.28 exactly after rounding
        assert_eq!(outcome.expected_margin, 2.28);
    }

    #[test]
    fn location_codes_round_trip() {
        assert_eq!(Location::parse("h"), Location::Home);
        assert_eq!(Location::parse("A"), Location::Away);
        assert_eq!(Location::parse(""), Location::Neutral);
        assert_eq!(Location::Home.code(), "H");
    }
}
