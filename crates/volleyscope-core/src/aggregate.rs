// Season aggregation: collapse a player's per-game stat records into season
// totals plus an estimate of sets played.

use serde::Serialize;

use crate::features::{Feature, FEATURE_COUNT};
use crate::model::Player;

/// Season totals for one player, indexed by [`Feature`].
///
/// Derived on demand from the raw stat records and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSeasonAggregate {
    pub player_id: u64,
    pub season: u32,
    pub totals: [u64; FEATURE_COUNT],
    pub sets_played: u64,
}

impl PlayerSeasonAggregate {
    /// A zeroed aggregate for a player with no records in `season`.
    pub fn empty(player_id: u64, season: u32) -> Self {
        PlayerSeasonAggregate {
            player_id,
            season,
            totals: [0; FEATURE_COUNT],
            sets_played: 0,
        }
    }

    /// Season total for a single counter.
    pub fn total(&self, feature: Feature) -> u64 {
        self.totals[feature.index()]
    }
}

/// Sum every counter over the player's records whose game belongs to `season`.
///
/// Sets played accumulate per stat record, not per distinct game: two records
/// pointing at the same game count that game's sets twice. Records without a
/// game (or without a season) are ignored.
pub fn aggregate_season(player: &Player, season: u32) -> PlayerSeasonAggregate {
    let mut agg = PlayerSeasonAggregate::empty(player.id, season);

    for record in &player.stats {
        let Some(game) = record.game.as_ref() else {
            continue;
        };
        if game.season != Some(season) {
            continue;
        }
        for feature in Feature::ALL {
            agg.totals[feature.index()] += u64::from(feature.count_in(record));
        }
        agg.sets_played += u64::from(game.sets_played());
    }

    agg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
