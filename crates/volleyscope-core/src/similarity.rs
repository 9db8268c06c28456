// Nearest / farthest player search over standardized season vectors.

use serde::Serialize;

use crate::features::PlayerSeasonVectorRow;

/// Another player and their distance from the queried one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    /// Position of the neighbor in the season rows. Player ids are not
    /// guaranteed unique (a missing id loads as 0), positions are.
    pub row: usize,
    pub player_id: u64,
    pub player_name: String,
    pub distance: f64,
}

/// Most and least similar players. Both are `None` when the population has
/// fewer than two players or the queried row does not exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPlayers {
    pub most_similar: Option<Neighbor>,
    pub least_similar: Option<Neighbor>,
}

/// Euclidean distance between two z-vectors.
///
/// # Panics
/// On length mismatch: the vectors were built with different feature orders.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(
        a.len(),
        b.len(),
        "distance between vectors with different lengths: {} vs {}",
        a.len(),
        b.len()
    );
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Position of the first row belonging to `player_id`.
pub fn position_of(rows: &[PlayerSeasonVectorRow], player_id: u64) -> Option<usize> {
    rows.iter().position(|r| r.player_id == player_id)
}

/// Distances from row `target` to every other row, in row order. Only the
/// target itself is skipped, so rows sharing its player id stay candidates.
fn distances(
    rows: &[PlayerSeasonVectorRow],
    target: usize,
) -> Option<impl Iterator<Item = Neighbor> + '_> {
    let origin = rows.get(target)?;
    Some(
        rows.iter()
            .enumerate()
            .filter(move |(i, _)| *i != target)
            .map(move |(i, r)| Neighbor {
                row: i,
                player_id: r.player_id,
                player_name: r.player_name.clone(),
                distance: euclidean_distance(&origin.z_vector, &r.z_vector),
            }),
    )
}

/// Find the closest and farthest other player to the row at `target`.
///
/// Ties keep the first row encountered.
pub fn find_similar_players(rows: &[PlayerSeasonVectorRow], target: usize) -> SimilarPlayers {
    if rows.len() < 2 {
        return SimilarPlayers::default();
    }
    let Some(iter) = distances(rows, target) else {
        return SimilarPlayers::default();
    };

    let mut nearest: Option<Neighbor> = None;
    let mut farthest: Option<Neighbor> = None;
    for n in iter {
        if nearest.as_ref().map_or(true, |best| n.distance < best.distance) {
            nearest = Some(n.clone());
        }
        if farthest.as_ref().map_or(true, |worst| n.distance > worst.distance) {
            farthest = Some(n);
        }
    }

    SimilarPlayers {
        most_similar: nearest,
        least_similar: farthest,
    }
}

/// The `k` closest other players to the row at `target`, nearest first.
pub fn nearest_neighbors(rows: &[PlayerSeasonVectorRow], target: usize, k: usize) -> Vec<Neighbor> {
    let Some(iter) = distances(rows, target) else {
        return Vec::new();
    };
    let mut all: Vec<Neighbor> = iter.collect();
    all.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    all.truncate(k);
    all
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
