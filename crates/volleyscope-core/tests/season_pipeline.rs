// Integration tests for the season pipeline.
//
// These exercise the library end to end through its public API: loading raw
// player JSON, building season vectors, fitting PCA, labeling archetypes and
// answering similarity queries against the same population.

use volleyscope_core::archetype::{self, ArchetypeRules, NET_COMMANDER};
use volleyscope_core::dataset;
use volleyscope_core::features::{build_season_vectors, Feature, FeatureScheme, PerSetFeatures, FEATURE_COUNT};
use volleyscope_core::model::Player;
use volleyscope_core::pca::{compute_pca_3d, project_to_3d, PcaOptions};
use volleyscope_core::report::{build_season_report, ReportOptions};

// ===========================================================================
// Test helpers
// ===========================================================================

/// A season-1 roster where only players 1 and 2 reach ten sets. Players 3-5
/// have outsized per-set numbers that would move the population statistics
/// if they leaked in.
const ROSTER: &str = r#"[
    {"id": 1, "name": "Ana", "stats": [
        {"spikeKills": 6, "spikeAttempts": 14, "digs": 8, "assists": 2,
         "game": {"season": 1, "team1Sets": 3, "team2Sets": 2}},
        {"spikeKills": 4, "spikeAttempts": 6, "digs": 2, "blocks": 1,
         "game": {"season": 1, "team1Sets": 3, "team2Sets": 2}}
    ]},
    {"id": 2, "name": "Bo", "stats": [
        {"spikeKills": 30, "spikeAttempts": 50, "digs": 10, "aces": 3,
         "game": {"season": 1, "team1Sets": "3", "team2Sets": 3}},
        {"tipKills": 2, "tipAttempts": 4, "attackErrors": 5,
         "game": {"season": 1, "team1Sets": 2, "team2Sets": 2}}
    ]},
    {"id": 3, "name": "Cy", "stats": [
        {"spikeKills": 40, "spikeAttempts": 45, "game": {"season": 1, "team1Sets": 3, "team2Sets": 1}}
    ]},
    {"id": 4, "name": "Di", "stats": [
        {"assists": 50, "digs": 30, "game": {"season": 1, "team1Sets": 2, "team2Sets": 1}}
    ]},
    {"id": 5, "name": "Ed", "stats": [
        {"blocks": 20, "spikeKills": -3, "game": {"season": 1, "team1Sets": 3, "team2Sets": 0}},
        {"blocks": 9, "game": {"season": 2, "team1Sets": 3, "team2Sets": 0}}
    ]}
]"#;

fn roster() -> Vec<Player> {
    dataset::load_players_from_reader(ROSTER.as_bytes()).expect("fixture should parse")
}

/// A dozen players with varied profiles, all qualifying.
fn league() -> Vec<Player> {
    let json: Vec<String> = (1..=12u32)
        .map(|i| {
            format!(
                r#"{{"id": {i}, "name": "P{i}", "stats": [{{
                    "spikeKills": {}, "spikeAttempts": {}, "tipKills": {}, "tipAttempts": {},
                    "blocks": {}, "assists": {}, "digs": {}, "blockFollows": {}, "aces": {},
                    "attackErrors": {}, "settingErrors": {}, "servingErrors": {}, "miscErrors": {},
                    "game": {{"season": 4, "team1Sets": 3, "team2Sets": {}}}
                }}]}}"#,
                (i * 7) % 13,
                20 + (i * 5) % 11,
                i % 4,
                (i * 3) % 7,
                (i * 2) % 5,
                (i * 11) % 17,
                (i * 13) % 19,
                i % 3,
                (i * 5) % 6,
                (i * 3) % 5,
                i % 2,
                (i * 7) % 4,
                i % 3,
                i % 3,
            )
        })
        .collect();
    let text = format!("[{}]", json.join(","));
    dataset::load_players_from_reader(text.as_bytes()).expect("generated league should parse")
}

fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

// ===========================================================================
// Feature builder
// ===========================================================================

#[test]
fn stats_use_only_qualifying_players() {
    let rows = build_season_vectors(&roster(), 1, 10, FeatureScheme::V2Separated);
    let ids: Vec<u64> = rows.iter().map(|r| r.player_id).collect();
    assert_eq!(ids, vec![1, 2]);

    // With two players, every varying feature standardizes to exactly -1/+1.
    let k = Feature::SpikeKills.index();
    assert!(approx_eq(rows[0].raw_features[k], 1.0, 1e-12));
    assert!(approx_eq(rows[1].raw_features[k], 3.0, 1e-12));
    assert!(approx_eq(rows[0].z_vector[k], -1.0, 1e-12));
    assert!(approx_eq(rows[1].z_vector[k], 1.0, 1e-12));
}

#[test]
fn lenient_fields_survive_loading() {
    let players = roster();
    // "3" string sets coerced; 6 + 4 sets.
    let rows = build_season_vectors(&players, 1, 10, FeatureScheme::V2Separated);
    assert_eq!(rows[1].sets_played, 10);
    // Negative kills coerced to 0.
    assert_eq!(players[4].stats[0].spike_kills, 0);
}

#[test]
fn vector_lengths_match_scheme() {
    for row in build_season_vectors(&league(), 4, 1, FeatureScheme::V2Separated) {
        assert_eq!(row.raw_features.len(), FEATURE_COUNT);
        assert_eq!(row.z_vector.len(), FEATURE_COUNT);
    }
    for row in build_season_vectors(&league(), 4, 1, FeatureScheme::V1Combined) {
        assert_eq!(row.z_vector.len(), 12);
    }
}

#[test]
fn z_columns_are_centered() {
    let rows = build_season_vectors(&league(), 4, 1, FeatureScheme::V2Separated);
    for k in 0..FEATURE_COUNT {
        let mean: f64 = rows.iter().map(|r| r.z_vector[k]).sum::<f64>() / rows.len() as f64;
        assert!(approx_eq(mean, 0.0, 1e-9), "column {k} mean {mean}");
    }
}

#[test]
fn other_seasons_do_not_leak() {
    let rows = build_season_vectors(&roster(), 2, 1, FeatureScheme::V2Separated);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].player_id, 5);
    // Single player: every column is constant.
    assert!(rows[0].z_vector.iter().all(|z| *z == 0.0));
}

// ===========================================================================
// PCA
// ===========================================================================

#[test]
fn projection_round_trip_on_league() {
    let rows = build_season_vectors(&league(), 4, 1, FeatureScheme::V2Separated);
    let vectors: Vec<Vec<f64>> = rows.iter().map(|r| r.z_vector.clone()).collect();
    let result = compute_pca_3d(&vectors, &PcaOptions::default());

    assert_eq!(result.projections.len(), vectors.len());
    for (v, p) in vectors.iter().zip(result.projections.iter()) {
        let again = project_to_3d(v, Some(&result.model));
        assert!(approx_eq(again.x, p.x, 1e-12));
        assert!(approx_eq(again.y, p.y, 1e-12));
        assert!(approx_eq(again.z, p.z, 1e-12));
    }

    let ev = &result.model.explained_variance;
    assert_eq!(ev.len(), 3);
    assert!(ev.windows(2).all(|w| w[0] >= w[1]), "not descending: {ev:?}");
    let captured: f64 = result.model.explained_variance_ratio().iter().sum();
    assert!(captured > 0.0 && captured <= 1.0 + 1e-9);
}

// ===========================================================================
// Archetypes
// ===========================================================================

#[test]
fn assist_dominant_dual_role() {
    let features = PerSetFeatures::default()
        .with(Feature::Assists, 7.0)
        .with(Feature::Blocks, 1.0);
    let label = archetype::classify(&features).expect("dual-role player gets a label");
    assert_eq!(label.id, NET_COMMANDER.id);
}

#[test]
fn classification_is_deterministic_across_league() {
    let rules = ArchetypeRules::standard();
    for row in build_season_vectors(&league(), 4, 1, FeatureScheme::V2Separated) {
        assert_eq!(rules.classify(&row.per_set), rules.classify(&row.per_set));
    }
}

// ===========================================================================
// Report and similarity
// ===========================================================================

#[test]
fn report_never_pairs_player_with_self() {
    let report = build_season_report(&league(), 4, &ReportOptions {
        min_sets_played: 1,
        ..Default::default()
    });
    assert_eq!(report.len(), 12);
    for row in report.rows() {
        let similar = report.similar_players(row.player_id);
        let most = similar.most_similar.expect("league has many players");
        let least = similar.least_similar.expect("league has many players");
        assert_ne!(most.player_id, row.player_id);
        assert_ne!(least.player_id, row.player_id);
        assert!(most.distance <= least.distance);
    }
}

#[test]
fn report_for_two_player_season() {
    let report = build_season_report(&roster(), 1, &ReportOptions::default());
    assert_eq!(report.len(), 2);
    let similar = report.similar_players(1);
    assert_eq!(similar.most_similar.as_ref().unwrap().player_id, 2);
    assert_eq!(similar.least_similar.as_ref().unwrap().player_id, 2);
    // Unqualified players cannot be queried.
    assert!(report.profile(3).is_none());
    assert!(report.similar_players(3).most_similar.is_none());
}

#[test]
fn players_without_ids_are_compared_by_row() {
    // Two id-less players (both load as id 0) with near-identical attacking
    // lines, plus a dig specialist.
    let text = r#"[
        {"name": "A", "stats": [{"spikeKills": 20, "spikeAttempts": 40, "digs": 5,
            "game": {"season": 1, "team1Sets": 3, "team2Sets": 2}}]},
        {"name": "B", "stats": [{"spikeKills": 21, "spikeAttempts": 40, "digs": 5,
            "game": {"season": 1, "team1Sets": 3, "team2Sets": 2}}]},
        {"id": 5, "name": "C", "stats": [{"spikeKills": 1, "spikeAttempts": 4, "digs": 30,
            "game": {"season": 1, "team1Sets": 3, "team2Sets": 2}}]}
    ]"#;
    let players = dataset::load_players_from_reader(text.as_bytes()).unwrap();
    let report = build_season_report(&players, 1, &ReportOptions {
        min_sets_played: 1,
        ..Default::default()
    });
    assert_eq!(report.rows_for(0), vec![0, 1]);

    let a = report.similar_players(0);
    assert_eq!(a.most_similar.unwrap().player_name, "B");
    assert_eq!(a.least_similar.unwrap().player_id, 5);

    let b = report.similar_to_row(1);
    assert_eq!(b.most_similar.unwrap().player_name, "A");
}

#[test]
fn seasons_listed_from_fixture() {
    assert_eq!(dataset::available_seasons(&roster()), vec![1, 2]);
}
