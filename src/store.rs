use std::collections::HashMap;

use tracing::warn;

/// Assigns each team a stable small integer on first sight. Index space is
/// bounded to the league size; once assigned an index is never reused.
#[derive(Debug, Clone)]
pub struct TeamIndexRegistry {
    capacity: usize,
    indices: HashMap<String, usize>,
}

impl TeamIndexRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            indices: HashMap::with_capacity(capacity),
        }
    }

    /// Idempotent: re-registering a known team returns its existing index.
    /// Returns `None` once the registry is full.
    pub fn register(&mut self, team: &str) -> Option<usize> {
        if let Some(idx) = self.indices.get(team) {
            return Some(*idx);
        }
        let next = self.indices.len();
        if next >= self.capacity {
            warn!(team, capacity = self.capacity, "team registry at capacity");
            return None;
        }
        self.indices.insert(team.to_string(), next);
        Some(next)
    }

    pub fn index_of(&self, team: &str) -> Option<usize> {
        self.indices.get(team).copied()
    }

    pub fn teams(&self) -> Vec<String> {
        let mut out: Vec<(String, usize)> = self
            .indices
            .iter()
            .map(|(name, idx)| (name.clone(), *idx))
            .collect();
        out.sort_by_key(|(_, idx)| *idx);
        out.into_iter().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

/// Square tally of this engine's own predicted wins: cell (i, j) counts how
/// many times team i was predicted to beat team j. Not live results.
#[derive(Debug, Clone)]
pub struct HeadToHeadMatrix {
    size: usize,
    cells: Vec<u32>,
}

impl HeadToHeadMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    /// Directional: only the winner's cell moves.
    pub fn record_result(&mut self, winner: usize, loser: usize) {
        if winner >= self.size || loser >= self.size {
            warn!(winner, loser, size = self.size, "head-to-head indices out of range");
            return;
        }
        self.cells[winner * self.size + loser] += 1;
    }

    /// Out-of-range lookups answer zero rather than panicking.
    pub fn head_to_head(&self, i: usize, j: usize) -> u32 {
        if i >= self.size || j >= self.size {
            return 0;
        }
        self.cells[i * self.size + j]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_monotonic_indices_from_zero() {
        let mut reg = TeamIndexRegistry::new(3);
        assert_eq!(reg.register("Boston"), Some(0));
        assert_eq!(reg.register("Denver"), Some(1));
        assert_eq!(reg.register("Boston"), Some(0));
        assert_eq!(reg.register("Miami"), Some(2));
        assert_eq!(reg.register("Utah"), None);
        assert_eq!(reg.index_of("Denver"), Some(1));
        assert_eq!(reg.index_of("Utah"), None);
    }

    #[test]
    fn teams_list_is_ordered_by_index() {
        let mut reg = TeamIndexRegistry::new(4);
        reg.register("Dallas");
        reg.register("Atlanta");
        reg.register("Chicago");
        assert_eq!(reg.teams(), vec!["Dallas", "Atlanta", "Chicago"]);
    }

    #[test]
    fn record_result_moves_only_winner_cell() {
        let mut h2h = HeadToHeadMatrix::new(4);
        h2h.record_result(1, 2);
        h2h.record_result(1, 2);
        assert_eq!(h2h.head_to_head(1, 2), 2);
        assert_eq!(h2h.head_to_head(2, 1), 0);
    }

    #[test]
    fn out_of_range_lookup_is_zero_not_panic() {
        let mut h2h = HeadToHeadMatrix::new(2);
        h2h.record_result(9, 0);
        assert_eq!(h2h.head_to_head(9, 0), 0);
        assert_eq!(h2h.head_to_head(0, 9), 0);
    }

    #[test]
    fn clear_resets_registry_and_matrix() {
        let mut reg = TeamIndexRegistry::new(2);
        let mut h2h = HeadToHeadMatrix::new(2);
        reg.register("Boston");
        h2h.record_result(0, 1);
        reg.clear();
        h2h.clear();
        assert!(reg.is_empty());
        assert_eq!(h2h.head_to_head(0, 1), 0);
    }
}
