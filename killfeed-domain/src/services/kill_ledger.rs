use std::collections::{BTreeSet, HashMap, HashSet};

use crate::entities::{KillRecord, KillRowKey, PlayerStats, UNKNOWN_PLAYER_NAME};
use crate::value_objects::{GuildId, PlayerId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillApplied {
    /// Killer streak after the row, 0 for suicides.
    pub killer_streak: u32,
}

/// Running kill/death aggregates of one server.
///
/// Rows must be fed in timestamp order; streaks and longest distance depend on it.
#[derive(Debug, Clone)]
pub struct KillLedger {
    guild_id: GuildId,
    server_id: ServerId,
    stats: HashMap<PlayerId, PlayerStats>,
    seen: HashSet<KillRowKey>,
    dirty: BTreeSet<PlayerId>,
}

impl KillLedger {
    pub fn new(guild_id: GuildId, server_id: ServerId) -> Self {
        Self {
            guild_id,
            server_id,
            stats: HashMap::new(),
            seen: HashSet::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn from_stats(guild_id: GuildId, server_id: ServerId, stats: Vec<PlayerStats>) -> Self {
        let mut ledger = Self::new(guild_id, server_id);
        for entry in stats {
            ledger.stats.insert(entry.player_id.clone(), entry);
        }
        ledger
    }

    pub fn stats(&self, player_id: &PlayerId) -> Option<&PlayerStats> {
        self.stats.get(player_id)
    }

    /// Applies one row. Returns `None` when an identical row was already applied
    /// through this ledger.
    pub fn apply(&mut self, record: &KillRecord) -> Option<KillApplied> {
        if !self.seen.insert(record.row_key()) {
            return None;
        }

        let victim = self.entry(&record.victim_id, &record.victim_name);
        victim.deaths += 1;
        victim.current_streak = 0;
        victim.last_death_at = Some(record.timestamp);
        if record.is_suicide {
            victim.suicides += 1;
        }
        self.dirty.insert(record.victim_id.clone());

        if record.is_suicide {
            return Some(KillApplied { killer_streak: 0 });
        }

        let killer = self.entry(&record.killer_id, &record.killer_name);
        killer.kills += 1;
        killer.current_streak += 1;
        killer.best_streak = killer.best_streak.max(killer.current_streak);
        if record.distance > killer.longest_kill_distance {
            killer.longest_kill_distance = record.distance;
        }
        killer.last_kill_at = Some(record.timestamp);
        let killer_streak = killer.current_streak;
        self.dirty.insert(record.killer_id.clone());

        Some(KillApplied { killer_streak })
    }

    /// Drains the aggregates changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<PlayerStats> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|player_id| self.stats.get(&player_id).cloned())
            .collect()
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<PlayerStats> {
        let mut all: Vec<PlayerStats> = self.stats.values().cloned().collect();
        all.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        all
    }

    fn entry(&mut self, player_id: &PlayerId, name: &str) -> &mut PlayerStats {
        let (guild_id, server_id) = (self.guild_id, self.server_id.clone());
        let stats = self
            .stats
            .entry(player_id.clone())
            .or_insert_with(|| PlayerStats::new(guild_id, server_id, player_id.clone(), name));
        if !name.is_empty() && name != UNKNOWN_PLAYER_NAME {
            stats.name = name.to_string();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::kill_row::parse_kill_row;

    fn row(line: &str) -> KillRecord {
        parse_kill_row(GuildId(1), &ServerId::new("7020"), line).expect("row")
    }

    fn ledger() -> KillLedger {
        KillLedger::new(GuildId(1), ServerId::new("7020"))
    }

    #[test]
    fn streak_resets_on_death() {
        let mut ledger = ledger();
        ledger.apply(&row("2024.01.15-09.00.00;Foo;A;Bar;B;AK;50"));
        ledger.apply(&row("2024.01.15-09.01.00;Foo;A;Baz;C;AK;250"));
        let applied = ledger.apply(&row("2024.01.15-09.02.00;Bar;B;Foo;A;SVD;10")).expect("applied");
        assert_eq!(applied.killer_streak, 1);

        let foo = ledger.stats(&PlayerId::new("a")).expect("foo");
        assert_eq!(foo.kills, 2);
        assert_eq!(foo.deaths, 1);
        assert_eq!(foo.current_streak, 0);
        assert_eq!(foo.best_streak, 2);
        assert_eq!(foo.longest_kill_distance, 250.0);
    }

    #[test]
    fn suicide_counts_death_but_no_kill() {
        let mut ledger = ledger();
        let applied = ledger.apply(&row("2024.01.15-09.00.00;Foo;A;Foo;A;Fall;0")).expect("applied");
        assert_eq!(applied.killer_streak, 0);
        let foo = ledger.stats(&PlayerId::new("a")).expect("foo");
        assert_eq!((foo.kills, foo.deaths, foo.suicides), (0, 1, 1));
    }

    #[test]
    fn duplicate_rows_apply_once() {
        let mut ledger = ledger();
        let line = "2024.01.15-09.00.00;Foo;A;Bar;B;AK;50";
        assert!(ledger.apply(&row(line)).is_some());
        assert!(ledger.apply(&row(line)).is_none());
        assert_eq!(ledger.stats(&PlayerId::new("a")).expect("foo").kills, 1);
    }

    #[test]
    fn take_dirty_drains() {
        let mut ledger = ledger();
        ledger.apply(&row("2024.01.15-09.00.00;Foo;A;Bar;B;AK;50"));
        assert_eq!(ledger.take_dirty().len(), 2);
        assert!(ledger.take_dirty().is_empty());
        assert_eq!(ledger.snapshot().len(), 2);
    }
}
