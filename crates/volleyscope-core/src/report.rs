// Season report: the full pipeline for one season in one call.
//
// players -> season vectors -> PCA projection -> archetype labels, with
// similarity queries answered against the same standardized population.

use serde::{Serialize, Serializer};
use tracing::info;

use crate::archetype::{Archetype, ArchetypeRules};
use crate::config::Config;
use crate::features::{build_season_vectors, FeatureScheme, PlayerSeasonVectorRow};
use crate::model::Player;
use crate::pca::{compute_pca_3d, Loading, PcaModel, PcaOptions, Point3};
use crate::similarity::{find_similar_players, nearest_neighbors, position_of, Neighbor, SimilarPlayers};

/// Features listed per axis in the report header.
const AXIS_LOADINGS: usize = 3;

/// Everything that shapes a report besides the players and the season.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub min_sets_played: u64,
    pub scheme: FeatureScheme,
    pub pca: PcaOptions,
    pub rules: ArchetypeRules,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            min_sets_played: 10,
            scheme: FeatureScheme::default(),
            pca: PcaOptions::default(),
            rules: ArchetypeRules::standard(),
        }
    }
}

impl ReportOptions {
    pub fn from_config(config: &Config) -> Self {
        ReportOptions {
            min_sets_played: config.min_sets_played,
            scheme: config.scheme,
            pca: config.pca,
            rules: ArchetypeRules::standard(),
        }
    }
}

/// One qualifying player as seen by the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile<'a> {
    #[serde(flatten)]
    pub row: &'a PlayerSeasonVectorRow,
    pub coords: Point3,
    pub archetype: Option<&'a Archetype>,
}

/// A single season analyzed end to end. Rows, projections and archetypes are
/// parallel and follow the input player order.
#[derive(Debug, Clone)]
pub struct SeasonReport {
    pub season: u32,
    pub min_sets_played: u64,
    pub scheme: FeatureScheme,
    pub pca: PcaModel,
    rows: Vec<PlayerSeasonVectorRow>,
    projections: Vec<Point3>,
    archetypes: Vec<Option<Archetype>>,
}

impl SeasonReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PlayerSeasonVectorRow] {
        &self.rows
    }

    pub fn profiles(&self) -> impl Iterator<Item = PlayerProfile<'_>> + '_ {
        self.rows
            .iter()
            .zip(self.projections.iter())
            .zip(self.archetypes.iter())
            .map(|((row, coords), archetype)| PlayerProfile {
                row,
                coords: *coords,
                archetype: archetype.as_ref(),
            })
    }

    /// Row positions belonging to `player_id`. Usually one; more when the
    /// dump holds several players without an id.
    pub fn rows_for(&self, player_id: u64) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.player_id == player_id)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn profile_at(&self, row: usize) -> Option<PlayerProfile<'_>> {
        self.profiles().nth(row)
    }

    /// Profile of one player, if they qualified for this season. With a
    /// shared id this is the first matching row.
    pub fn profile(&self, player_id: u64) -> Option<PlayerProfile<'_>> {
        position_of(&self.rows, player_id).and_then(|row| self.profile_at(row))
    }

    pub fn similar_to_row(&self, row: usize) -> SimilarPlayers {
        find_similar_players(&self.rows, row)
    }

    pub fn similar_players(&self, player_id: u64) -> SimilarPlayers {
        match position_of(&self.rows, player_id) {
            Some(row) => self.similar_to_row(row),
            None => SimilarPlayers::default(),
        }
    }

    pub fn nearest_to_row(&self, row: usize, k: usize) -> Vec<Neighbor> {
        nearest_neighbors(&self.rows, row, k)
    }

    pub fn nearest_neighbors(&self, player_id: u64, k: usize) -> Vec<Neighbor> {
        match position_of(&self.rows, player_id) {
            Some(row) => self.nearest_to_row(row, k),
            None => Vec::new(),
        }
    }

    /// Strongest feature loadings for each extracted axis.
    pub fn axis_loadings(&self) -> Vec<Vec<Loading>> {
        (0..self.pca.components.len())
            .map(|axis| self.pca.top_loadings(axis, self.scheme, AXIS_LOADINGS))
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeasonReportView<'a> {
    season: u32,
    min_sets_played: u64,
    scheme: FeatureScheme,
    feature_labels: Vec<&'static str>,
    explained_variance_ratio: Vec<f64>,
    axis_loadings: Vec<Vec<Loading>>,
    pca: &'a PcaModel,
    players: Vec<PlayerProfile<'a>>,
}

impl Serialize for SeasonReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SeasonReportView {
            season: self.season,
            min_sets_played: self.min_sets_played,
            scheme: self.scheme,
            feature_labels: self.scheme.labels(),
            explained_variance_ratio: self.pca.explained_variance_ratio(),
            axis_loadings: self.axis_loadings(),
            pca: &self.pca,
            players: self.profiles().collect(),
        }
        .serialize(serializer)
    }
}

/// Run the whole pipeline for `season`.
///
/// A season where nobody meets the sets-played minimum yields an empty
/// report with an empty PCA model.
pub fn build_season_report(players: &[Player], season: u32, options: &ReportOptions) -> SeasonReport {
    let rows = build_season_vectors(players, season, options.min_sets_played, options.scheme);
    let z_vectors: Vec<Vec<f64>> = rows.iter().map(|r| r.z_vector.clone()).collect();
    let pca = compute_pca_3d(&z_vectors, &options.pca);
    let archetypes: Vec<Option<Archetype>> = rows
        .iter()
        .map(|r| options.rules.classify(&r.per_set))
        .collect();

    let labeled = archetypes.iter().filter(|a| a.is_some()).count();
    info!(
        season,
        scheme = options.scheme.version(),
        players = rows.len(),
        labeled,
        components = pca.model.components.len(),
        "built season report"
    );

    SeasonReport {
        season,
        min_sets_played: options.min_sets_played,
        scheme: options.scheme,
        pca: pca.model,
        rows,
        projections: pca.projections,
        archetypes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
