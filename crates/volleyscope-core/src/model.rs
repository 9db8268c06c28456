// Input model: players, their per-game stat records, and the game context.
//
// These types mirror what the external data store hands us. Every numeric
// field is coerced leniently on deserialization: missing, null, negative,
// non-finite, or non-numeric values become 0 (or an absent season) rather
// than failing the whole load.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A player together with every stat record the data store holds for them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_stats")]
    pub stats: Vec<StatRecord>,
}

/// One player's counting stats for one game.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRecord {
    #[serde(default, deserialize_with = "lenient_count")]
    pub spike_kills: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub spike_attempts: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub tip_kills: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub tip_attempts: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub blocks: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub assists: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub digs: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub block_follows: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub aces: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub attack_errors: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub setting_errors: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub serving_errors: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub misc_errors: u32,
    #[serde(default, deserialize_with = "lenient_game")]
    pub game: Option<Game>,
}

/// The game a stat record belongs to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(default, deserialize_with = "lenient_season")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub team1_sets: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub team2_sets: u32,
}

impl Game {
    /// Sets played in this game: both teams' set scores summed.
    pub fn sets_played(&self) -> u32 {
        self.team1_sets.saturating_add(self.team2_sets)
    }
}

impl StatRecord {
    /// Season of the record's game, if the record has a game with a season.
    pub fn season(&self) -> Option<u32> {
        self.game.as_ref().and_then(|g| g.season)
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

/// Interpret a JSON value as a non-negative number.
///
/// Accepts numbers and numeric strings. Anything else (null, bools, objects,
/// negative or non-finite numbers, unparseable strings) yields `None`.
fn as_non_negative(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 0.0 {
        Some(n)
    } else {
        None
    }
}

/// Coerce an arbitrary JSON value to a counter, defaulting to 0.
fn coerce_count(value: &Value) -> u32 {
    as_non_negative(value)
        .map(|n| n.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_count).unwrap_or(0))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(as_non_negative)
        .map(|n| n.round().min(u64::MAX as f64) as u64)
        .unwrap_or(0))
}

fn lenient_season<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(as_non_negative)
        .map(|n| n.round().min(u32::MAX as f64) as u32))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_game<'de, D>(deserializer: D) -> Result<Option<Game>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ Value::Object(_)) => serde_json::from_value(v).ok(),
        _ => None,
    })
}

/// Stats arrive as an array of objects; non-object entries are dropped and a
/// non-array value reads as "no stats".
fn lenient_stats<'de, D>(deserializer: D) -> Result<Vec<StatRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
