use std::collections::HashMap;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;

pub const LEAGUE_SIZE: usize = 30;

/// Canonical identity for one franchise: short display name, full name,
/// scoreboard abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamIdentity {
    pub short: &'static str,
    pub full: &'static str,
    pub abbr: &'static str,
}

const TEAMS: [TeamIdentity; LEAGUE_SIZE] = [
    TeamIdentity { short: "Atlanta", full: "Atlanta Hawks", abbr: "ATL" },
    TeamIdentity { short: "Boston", full: "Boston Celtics", abbr: "BOS" },
    TeamIdentity { short: "Brooklyn", full: "Brooklyn Nets", abbr: "BKN" },
    TeamIdentity { short: "Charlotte", full: "Charlotte Hornets", abbr: "CHA" },
    TeamIdentity { short: "Chicago", full: "Chicago Bulls", abbr: "CHI" },
    TeamIdentity { short: "Cleveland", full: "Cleveland Cavaliers", abbr: "CLE" },
    TeamIdentity { short: "Dallas", full: "Dallas Mavericks", abbr: "DAL" },
    TeamIdentity { short: "Denver", full: "Denver Nuggets", abbr: "DEN" },
    TeamIdentity { short: "Detroit", full: "Detroit Pistons", abbr: "DET" },
    TeamIdentity { short: "Golden State", full: "Golden State Warriors", abbr: "GSW" },
    TeamIdentity { short: "Houston", full: "Houston Rockets", abbr: "HOU" },
    TeamIdentity { short: "Indiana", full: "Indiana Pacers", abbr: "IND" },
    TeamIdentity { short: "LA Clippers", full: "Los Angeles Clippers", abbr: "LAC" },
    TeamIdentity { short: "LA Lakers", full: "Los Angeles Lakers", abbr: "LAL" },
    TeamIdentity { short: "Memphis", full: "Memphis Grizzlies", abbr: "MEM" },
    TeamIdentity { short: "Miami", full: "Miami Heat", abbr: "MIA" },
    TeamIdentity { short: "Milwaukee", full: "Milwaukee Bucks", abbr: "MIL" },
    TeamIdentity { short: "Minnesota", full: "Minnesota Timberwolves", abbr: "MIN" },
    TeamIdentity { short: "New Orleans", full: "New Orleans Pelicans", abbr: "NOP" },
    TeamIdentity { short: "New York", full: "New York Knicks", abbr: "NYK" },
    TeamIdentity { short: "Oklahoma City", full: "Oklahoma City Thunder", abbr: "OKC" },
    TeamIdentity { short: "Orlando", full: "Orlando Magic", abbr: "ORL" },
    TeamIdentity { short: "Philadelphia", full: "Philadelphia 76ers", abbr: "PHI" },
    TeamIdentity { short: "Phoenix", full: "Phoenix Suns", abbr: "PHX" },
    TeamIdentity { short: "Portland", full: "Portland Trail Blazers", abbr: "POR" },
    TeamIdentity { short: "Sacramento", full: "Sacramento Kings", abbr: "SAC" },
    TeamIdentity { short: "San Antonio", full: "San Antonio Spurs", abbr: "SAS" },
    TeamIdentity { short: "Toronto", full: "Toronto Raptors", abbr: "TOR" },
    TeamIdentity { short: "Utah", full: "Utah Jazz", abbr: "UTA" },
    TeamIdentity { short: "Washington", full: "Washington Wizards", abbr: "WAS" },
];

static LOOKUP: Lazy<HashMap<&'static str, &'static TeamIdentity>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, &'static TeamIdentity> = HashMap::new();
    for team in &TEAMS {
        map.insert(team.short, team);
        map.insert(team.full, team);
        map.insert(team.abbr, team);
    }
    // Aliases that show up in schedule and injury CSVs.
    map.insert("Los Angeles", &TEAMS[13]);
    map
});

pub fn all_teams() -> &'static [TeamIdentity] {
    &TEAMS
}

/// Resolve any accepted alias to the canonical identity. Unknown names are an
/// error the caller is expected to skip over, not abort on.
pub fn team_identity(name: &str) -> Result<&'static TeamIdentity> {
    LOOKUP
        .get(name.trim())
        .copied()
        .ok_or_else(|| anyhow!("unrecognized team name: {name}"))
}

/// Map scoreboard abbreviation variants (GS, NY, SA, WSH, ...) onto the
/// canonical three-letter codes used by the identity table.
pub fn canonical_abbr(abbr: &str) -> String {
    let upper = abbr.trim().to_uppercase();
    match upper.as_str() {
        "GS" => "GSW".to_string(),
        "NO" => "NOP".to_string(),
        "NY" => "NYK".to_string(),
        "SA" => "SAS".to_string(),
        "UTAH" => "UTA".to_string(),
        "WSH" => "WAS".to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_resolves_short_full_and_abbr() {
        let by_short = team_identity("Phoenix").unwrap();
        let by_full = team_identity("Phoenix Suns").unwrap();
        let by_abbr = team_identity("PHX").unwrap();
        assert_eq!(by_short.full, "Phoenix Suns");
        assert_eq!(by_short, by_full);
        assert_eq!(by_short, by_abbr);
    }

    #[test]
    fn unknown_team_is_an_error() {
        assert!(team_identity("Seattle").is_err());
    }

    #[test]
    fn abbr_variants_canonicalize() {
        assert_eq!(canonical_abbr("gs"), "GSW");
        assert_eq!(canonical_abbr("WSH"), "WAS");
        assert_eq!(canonical_abbr("BOS"), "BOS");
    }

    #[test]
    fn los_angeles_alias_maps_to_lakers() {
        assert_eq!(team_identity("Los Angeles").unwrap().abbr, "LAL");
    }
}
