// Player dataset loading.
//
// Accepts either a bare JSON array of players or an object wrapping one
// under a "players" key. Entries that are not JSON objects are skipped with
// a warning; field-level problems are absorbed by the lenient model types.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use serde::de::Error as _;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::Player;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read player data {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid player data in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Load players from a JSON file on disk.
pub fn load_players(path: &Path) -> Result<Vec<Player>, DatasetError> {
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_players_from_reader(std::io::BufReader::new(file)).map_err(|e| {
        DatasetError::Json {
            path: path.display().to_string(),
            source: e,
        }
    })?;
    info!(
        path = %path.display(),
        players = players.len(),
        "loaded player dataset"
    );
    Ok(players)
}

/// Load players from any reader yielding JSON.
pub fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, serde_json::Error> {
    let root: Value = serde_json::from_reader(rdr)?;
    let entries = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("players") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(serde_json::Error::custom(
                    "expected a \"players\" array at the top level",
                ))
            }
        },
        _ => {
            return Err(serde_json::Error::custom(
                "expected a JSON array of players",
            ))
        }
    };

    let mut players = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            warn!(index, "skipping player entry that is not an object");
            continue;
        }
        players.push(serde_json::from_value::<Player>(entry)?);
    }
    Ok(players)
}

/// Every season that appears in at least one stat record, ascending.
pub fn available_seasons(players: &[Player]) -> Vec<u32> {
    players
        .iter()
        .flat_map(|p| p.stats.iter())
        .filter_map(|r| r.season())
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
