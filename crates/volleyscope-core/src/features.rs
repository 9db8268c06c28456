// Feature builder: per-set rates, population statistics, and z-score vectors.
//
// The feature order is fixed per scheme and identified by a version tag.
// PCA, the classifier, and axis labels all assume positional alignment, so
// any change to the key set or order must ship as a new scheme.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::aggregate::{aggregate_season, PlayerSeasonAggregate};
use crate::model::{Player, StatRecord};

// ---------------------------------------------------------------------------
// Feature keys
// ---------------------------------------------------------------------------

/// Number of raw per-set features.
pub const FEATURE_COUNT: usize = 13;

/// Threshold at or below which a standard deviation is treated as zero.
pub const STDEV_EPSILON: f64 = 1e-9;

/// One raw counting stat, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    SpikeKills,
    SpikeAttempts,
    TipKills,
    TipAttempts,
    Blocks,
    Assists,
    Digs,
    BlockFollows,
    Aces,
    AttackErrors,
    SettingErrors,
    ServingErrors,
    MiscErrors,
}

impl Feature {
    /// Every feature in canonical order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::SpikeKills,
        Feature::SpikeAttempts,
        Feature::TipKills,
        Feature::TipAttempts,
        Feature::Blocks,
        Feature::Assists,
        Feature::Digs,
        Feature::BlockFollows,
        Feature::Aces,
        Feature::AttackErrors,
        Feature::SettingErrors,
        Feature::ServingErrors,
        Feature::MiscErrors,
    ];

    /// Position of this feature in [`Feature::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable key used in serialized feature maps.
    pub fn key(self) -> &'static str {
        match self {
            Feature::SpikeKills => "spikeKillsPerSet",
            Feature::SpikeAttempts => "spikeAttemptsPerSet",
            Feature::TipKills => "tipKillsPerSet",
            Feature::TipAttempts => "tipAttemptsPerSet",
            Feature::Blocks => "blocksPerSet",
            Feature::Assists => "assistsPerSet",
            Feature::Digs => "digsPerSet",
            Feature::BlockFollows => "blockFollowsPerSet",
            Feature::Aces => "acesPerSet",
            Feature::AttackErrors => "attackErrorsPerSet",
            Feature::SettingErrors => "settingErrorsPerSet",
            Feature::ServingErrors => "servingErrorsPerSet",
            Feature::MiscErrors => "miscErrorsPerSet",
        }
    }

    /// Short human-readable label for axis captions.
    pub fn label(self) -> &'static str {
        match self {
            Feature::SpikeKills => "Spike kills",
            Feature::SpikeAttempts => "Spike attempts",
            Feature::TipKills => "Tip kills",
            Feature::TipAttempts => "Tip attempts",
            Feature::Blocks => "Blocks",
            Feature::Assists => "Assists",
            Feature::Digs => "Digs",
            Feature::BlockFollows => "Block follows",
            Feature::Aces => "Aces",
            Feature::AttackErrors => "Attack errors",
            Feature::SettingErrors => "Setting errors",
            Feature::ServingErrors => "Serving errors",
            Feature::MiscErrors => "Misc errors",
        }
    }

    /// Read this feature's raw counter from a stat record.
    pub fn count_in(self, record: &StatRecord) -> u32 {
        match self {
            Feature::SpikeKills => record.spike_kills,
            Feature::SpikeAttempts => record.spike_attempts,
            Feature::TipKills => record.tip_kills,
            Feature::TipAttempts => record.tip_attempts,
            Feature::Blocks => record.blocks,
            Feature::Assists => record.assists,
            Feature::Digs => record.digs,
            Feature::BlockFollows => record.block_follows,
            Feature::Aces => record.aces,
            Feature::AttackErrors => record.attack_errors,
            Feature::SettingErrors => record.setting_errors,
            Feature::ServingErrors => record.serving_errors,
            Feature::MiscErrors => record.misc_errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-set feature map
// ---------------------------------------------------------------------------

/// Per-set rates for all 13 raw features, indexed by [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerSetFeatures {
    values: [f64; FEATURE_COUNT],
}

impl PerSetFeatures {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        PerSetFeatures { values }
    }

    /// Builder-style setter, mostly for constructing test profiles.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.values[feature.index()] = value;
        self
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Kills from both attack types.
    pub fn kills(&self) -> f64 {
        self.get(Feature::SpikeKills) + self.get(Feature::TipKills)
    }

    /// Attempts from both attack types.
    pub fn attempts(&self) -> f64 {
        self.get(Feature::SpikeAttempts) + self.get(Feature::TipAttempts)
    }

    /// Kills per attempt, or 0 with no attempts.
    pub fn kill_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts <= 0.0 {
            0.0
        } else {
            self.kills() / attempts
        }
    }

    /// All four error categories summed.
    pub fn errors(&self) -> f64 {
        self.get(Feature::AttackErrors)
            + self.get(Feature::SettingErrors)
            + self.get(Feature::ServingErrors)
            + self.get(Feature::MiscErrors)
    }

    /// Positive actions: kills, assists, digs, blocks, aces.
    pub fn actions(&self) -> f64 {
        self.kills()
            + self.get(Feature::Assists)
            + self.get(Feature::Digs)
            + self.get(Feature::Blocks)
            + self.get(Feature::Aces)
    }
}

impl Serialize for PerSetFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for feature in Feature::ALL {
            map.serialize_entry(feature.key(), &self.get(feature))?;
        }
        map.end()
    }
}

/// Divide every season total by `max(sets_played, 1)`.
pub fn compute_per_set_features(aggregate: &PlayerSeasonAggregate) -> PerSetFeatures {
    let sets = aggregate.sets_played.max(1) as f64;
    let mut values = [0.0; FEATURE_COUNT];
    for (value, total) in values.iter_mut().zip(aggregate.totals.iter()) {
        *value = *total as f64 / sets;
    }
    PerSetFeatures { values }
}

// ---------------------------------------------------------------------------
// Vectorization schemes
// ---------------------------------------------------------------------------

/// A versioned mapping from per-set features to a fixed-order vector.
///
/// Vectors produced under different schemes are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeatureScheme {
    /// Legacy 12-dimension layout: attack types combined, plus total errors.
    V1Combined,
    /// 13-dimension layout with spikes and tips kept separate.
    #[default]
    V2Separated,
}

const V1_LABELS: [&str; 12] = [
    "Kills",
    "Attempts",
    "Blocks",
    "Assists",
    "Digs",
    "Block follows",
    "Aces",
    "Attack errors",
    "Setting errors",
    "Serving errors",
    "Misc errors",
    "Total errors",
];

impl FeatureScheme {
    /// Version tag identifying the key set and order.
    pub fn version(self) -> &'static str {
        match self {
            FeatureScheme::V1Combined => "v1-combined-12",
            FeatureScheme::V2Separated => "v2-separated-13",
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            FeatureScheme::V1Combined => V1_LABELS.len(),
            FeatureScheme::V2Separated => FEATURE_COUNT,
        }
    }

    /// Axis labels in vector order.
    pub fn labels(self) -> Vec<&'static str> {
        match self {
            FeatureScheme::V1Combined => V1_LABELS.to_vec(),
            FeatureScheme::V2Separated => Feature::ALL.iter().map(|f| f.label()).collect(),
        }
    }

    /// Lay out a per-set feature map in this scheme's order.
    pub fn vectorize(self, features: &PerSetFeatures) -> Vec<f64> {
        match self {
            FeatureScheme::V2Separated => features.values().to_vec(),
            FeatureScheme::V1Combined => vec![
                features.kills(),
                features.attempts(),
                features.get(Feature::Blocks),
                features.get(Feature::Assists),
                features.get(Feature::Digs),
                features.get(Feature::BlockFollows),
                features.get(Feature::Aces),
                features.get(Feature::AttackErrors),
                features.get(Feature::SettingErrors),
                features.get(Feature::ServingErrors),
                features.get(Feature::MiscErrors),
                features.errors(),
            ],
        }
    }
}

impl fmt::Display for FeatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())
    }
}

impl FromStr for FeatureScheme {
    type Err = String;

    /// Accepts the short form (`v1`, `v2`) or the full version tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "v1-combined-12" => Ok(FeatureScheme::V1Combined),
            "v2" | "v2-separated-13" => Ok(FeatureScheme::V2Separated),
            other => Err(format!("unknown feature scheme `{other}` (expected v1 or v2)")),
        }
    }
}

impl Serialize for FeatureScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.version())
    }
}

// ---------------------------------------------------------------------------
// Population statistics
// ---------------------------------------------------------------------------

/// Mean and standard deviation of one feature across a season population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub stdev: f64,
}

/// Per-column statistics, in the order of the vectors they were computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulationStats {
    pub columns: Vec<FeatureStats>,
}

/// Compute per-column mean and population standard deviation.
///
/// Variance is `E[X²] − mean²`, clamped at zero against floating-point
/// underflow. An empty population yields empty statistics; callers are
/// expected to short-circuit before that point.
///
/// # Panics
/// If the vectors do not all have the same length.
pub fn compute_feature_population_stats(vectors: &[Vec<f64>]) -> PopulationStats {
    let Some(first) = vectors.first() else {
        return PopulationStats::default();
    };
    let dim = first.len();
    let n = vectors.len() as f64;

    let mut sum = vec![0.0; dim];
    let mut sum_sq = vec![0.0; dim];
    for v in vectors {
        assert_eq!(
            v.len(),
            dim,
            "feature vector length mismatch: {} vs {}",
            v.len(),
            dim
        );
        for (i, x) in v.iter().enumerate() {
            sum[i] += x;
            sum_sq[i] += x * x;
        }
    }

    let columns = sum
        .iter()
        .zip(sum_sq.iter())
        .map(|(s, sq)| {
            let mean = s / n;
            let variance = (sq / n - mean * mean).max(0.0);
            FeatureStats {
                mean,
                stdev: variance.sqrt(),
            }
        })
        .collect();

    PopulationStats { columns }
}

/// Standardize a value. Returns 0.0 for a (near-)constant feature.
pub fn compute_zscore(value: f64, stats: &FeatureStats) -> f64 {
    if stats.stdev <= STDEV_EPSILON {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

/// Standardize a whole vector against population statistics.
///
/// # Panics
/// If the vector length differs from the number of statistic columns.
pub fn standardize(vector: &[f64], stats: &PopulationStats) -> Vec<f64> {
    assert_eq!(
        vector.len(),
        stats.columns.len(),
        "cannot standardize a {}-dimension vector against {} columns",
        vector.len(),
        stats.columns.len()
    );
    vector
        .iter()
        .zip(stats.columns.iter())
        .map(|(v, s)| compute_zscore(*v, s))
        .collect()
}

// ---------------------------------------------------------------------------
// Season vectors
// ---------------------------------------------------------------------------

/// One qualifying player's season profile, ready for PCA and similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSeasonVectorRow {
    pub player_id: u64,
    pub player_name: String,
    pub season: u32,
    pub sets_played: u64,
    pub scheme: FeatureScheme,
    /// Full 13-key per-set map, consumed by the archetype classifier.
    pub per_set: PerSetFeatures,
    /// Per-set rates in scheme order.
    pub raw_features: Vec<f64>,
    /// Z-scores in scheme order.
    pub z_vector: Vec<f64>,
}

/// Build standardized season vectors for every player with at least
/// `min_sets_played` sets in `season`.
///
/// Players are filtered first and population statistics are computed over
/// the survivors only. Output order follows the input order.
pub fn build_season_vectors(
    players: &[Player],
    season: u32,
    min_sets_played: u64,
    scheme: FeatureScheme,
) -> Vec<PlayerSeasonVectorRow> {
    let mut qualified: Vec<(&Player, PlayerSeasonAggregate, PerSetFeatures)> = Vec::new();
    for player in players {
        let agg = aggregate_season(player, season);
        if agg.sets_played < min_sets_played {
            continue;
        }
        let per_set = compute_per_set_features(&agg);
        qualified.push((player, agg, per_set));
    }

    if qualified.is_empty() {
        warn!(
            season,
            min_sets_played,
            total_players = players.len(),
            "no players meet the minimum sets played"
        );
        return Vec::new();
    }

    let raw: Vec<Vec<f64>> = qualified
        .iter()
        .map(|(_, _, per_set)| scheme.vectorize(per_set))
        .collect();
    let stats = compute_feature_population_stats(&raw);

    let constant = stats
        .columns
        .iter()
        .filter(|c| c.stdev <= STDEV_EPSILON)
        .count();
    debug!(
        season,
        qualified = qualified.len(),
        scheme = scheme.version(),
        constant_features = constant,
        "computed season population stats"
    );

    qualified
        .into_iter()
        .zip(raw)
        .map(|((player, agg, per_set), raw_features)| {
            let z_vector = standardize(&raw_features, &stats);
            PlayerSeasonVectorRow {
                player_id: player.id,
                player_name: player.name.clone(),
                season,
                sets_played: agg.sets_played,
                scheme,
                per_set,
                raw_features,
                z_vector,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
