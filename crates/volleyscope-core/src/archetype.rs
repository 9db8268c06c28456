// Archetype classification from a player's per-set feature map.
//
// Rules are evaluated in tiers:
// 1. standalone profiles (first match wins, nothing else is considered),
// 2. the first matching primary trait and first matching secondary trait,
// 3. the playmaker + intimidator dual-role override,
// 4. a synthesized primary/secondary combination, or whichever half matched.
//
// The rule tables are plain ordered data handed to the classifier, so the
// classifier itself stays a pure function of its inputs.

use std::fmt;

use serde::Serialize;

use crate::features::{Feature, PerSetFeatures};

// ---------------------------------------------------------------------------
// Archetype types
// ---------------------------------------------------------------------------

/// A classification result, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archetype {
    pub id: String,
    pub name: String,
    pub color: String,
    pub description: String,
}

/// A statically defined catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchetypeDef {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

impl ArchetypeDef {
    pub fn to_archetype(&self) -> Archetype {
        Archetype {
            id: self.id.to_string(),
            name: self.name.to_string(),
            color: self.color.to_string(),
            description: self.description.to_string(),
        }
    }
}

/// Color used when only a primary trait matched.
pub const NEUTRAL_COLOR: &str = "#9ca3af";

pub type Predicate = fn(&PerSetFeatures) -> bool;

/// An archetype paired with the predicate that selects it.
#[derive(Clone, Copy)]
pub struct Rule {
    pub def: ArchetypeDef,
    pub predicate: Predicate,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("id", &self.def.id).finish_non_exhaustive()
    }
}

impl Rule {
    pub fn matches(&self, features: &PerSetFeatures) -> bool {
        (self.predicate)(features)
    }
}

/// Override for players who both run the offense and block.
#[derive(Clone, Copy)]
pub struct DualRoleRule {
    pub is_playmaker: Predicate,
    pub is_intimidator: Predicate,
    /// Assists must reach this multiple of blocks to count as assist-dominant.
    pub dominance_ratio: f64,
    pub assist_dominant: ArchetypeDef,
    pub block_dominant: ArchetypeDef,
}

impl fmt::Debug for DualRoleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualRoleRule")
            .field("dominance_ratio", &self.dominance_ratio)
            .field("assist_dominant", &self.assist_dominant.id)
            .field("block_dominant", &self.block_dominant.id)
            .finish_non_exhaustive()
    }
}

impl DualRoleRule {
    pub fn applies(&self, features: &PerSetFeatures) -> bool {
        (self.is_playmaker)(features) && (self.is_intimidator)(features)
    }

    fn resolve(&self, features: &PerSetFeatures) -> &ArchetypeDef {
        if features.get(Feature::Assists) >= self.dominance_ratio * features.get(Feature::Blocks) {
            &self.assist_dominant
        } else {
            &self.block_dominant
        }
    }
}

/// A primary/secondary pairing with a hand-written name.
#[derive(Debug, Clone, Copy)]
pub struct SpecialPair {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub def: ArchetypeDef,
}

/// Ordered rule tables for every tier.
#[derive(Debug, Clone)]
pub struct ArchetypeRules {
    pub standalone: Vec<Rule>,
    pub primary: Vec<Rule>,
    pub secondary: Vec<Rule>,
    pub dual_role: DualRoleRule,
    pub special_pairs: Vec<SpecialPair>,
}

impl ArchetypeRules {
    /// Classify one player. Returns `None` when no tier produces a label.
    pub fn classify(&self, features: &PerSetFeatures) -> Option<Archetype> {
        if let Some(rule) = self.standalone.iter().find(|r| r.matches(features)) {
            return Some(rule.def.to_archetype());
        }

        let primary = self.primary.iter().find(|r| r.matches(features));
        let secondary = self.secondary.iter().find(|r| r.matches(features));

        if self.dual_role.applies(features) {
            return Some(self.dual_role.resolve(features).to_archetype());
        }

        match (primary, secondary) {
            (Some(p), Some(s)) => Some(self.combine(&p.def, &s.def)),
            (None, Some(s)) => Some(Archetype {
                id: s.def.id.to_string(),
                name: s.def.name.to_string(),
                color: s.def.color.to_string(),
                description: format!("Specialized {}", s.def.name),
            }),
            (Some(p), None) => Some(Archetype {
                color: NEUTRAL_COLOR.to_string(),
                ..p.def.to_archetype()
            }),
            (None, None) => None,
        }
    }

    fn combine(&self, primary: &ArchetypeDef, secondary: &ArchetypeDef) -> Archetype {
        if let Some(pair) = self
            .special_pairs
            .iter()
            .find(|sp| sp.primary == primary.id && sp.secondary == secondary.id)
        {
            return pair.def.to_archetype();
        }
        Archetype {
            id: format!("{}-{}", primary.id, secondary.id),
            name: format!("{} {}", primary.name, secondary.name),
            color: secondary.color.to_string(),
            description: format!("{} {}", primary.description, secondary.description).to_lowercase(),
        }
    }

    /// Every statically defined archetype, tier by tier.
    pub fn catalog(&self) -> Vec<ArchetypeDef> {
        let mut defs: Vec<ArchetypeDef> = Vec::new();
        defs.extend(self.standalone.iter().map(|r| r.def));
        defs.extend(self.primary.iter().map(|r| r.def));
        defs.extend(self.secondary.iter().map(|r| r.def));
        defs.push(self.dual_role.assist_dominant);
        defs.push(self.dual_role.block_dominant);
        defs.extend(self.special_pairs.iter().map(|p| p.def));
        defs
    }

    /// The built-in rule set.
    pub fn standard() -> Self {
        ArchetypeRules {
            standalone: vec![
                rule(COMPLETE_PACKAGE, is_complete_package),
                rule(BALANCED, is_balanced),
                rule(SNIPER, is_sniper),
                rule(GHOST, is_ghost),
                rule(WALL, is_wall),
                rule(HEAVY_HITTER, is_heavy_hitter),
                rule(CRAFTY, is_crafty),
                rule(ACE_MACHINE, is_ace_machine),
                rule(LOOSE_CANNON, is_loose_cannon),
                rule(ANCHOR, is_anchor),
            ],
            primary: vec![
                rule(MAVERICK, is_maverick),
                rule(PRECISE, is_precise),
                rule(WORKHORSE, is_workhorse),
                rule(SELECTIVE, is_selective),
                rule(STEADY, is_steady),
            ],
            secondary: vec![
                rule(STRIKER, is_striker),
                rule(GUARDIAN, is_guardian),
                rule(PLAYMAKER, is_playmaker),
                rule(FINISHER, is_finisher),
                rule(INTIMIDATOR, is_intimidator),
                rule(BOMBER, is_bomber),
                rule(VERSATILE, is_versatile),
                rule(JACK_OF_ALL_TRADES, is_jack_of_all_trades),
            ],
            dual_role: DualRoleRule {
                is_playmaker,
                is_intimidator,
                dominance_ratio: 3.0,
                assist_dominant: NET_COMMANDER,
                block_dominant: TWIN_TOWER,
            },
            special_pairs: vec![SpecialPair {
                primary: MAVERICK.id,
                secondary: PLAYMAKER.id,
                def: GAMBLER,
            }],
        }
    }
}

impl Default for ArchetypeRules {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify with the built-in rule set.
pub fn classify(features: &PerSetFeatures) -> Option<Archetype> {
    ArchetypeRules::standard().classify(features)
}

fn rule(def: ArchetypeDef, predicate: Predicate) -> Rule {
    Rule { def, predicate }
}

// ---------------------------------------------------------------------------
// Category helpers
// ---------------------------------------------------------------------------

/// Core categories, in order: kills, assists, digs, blocks, aces.
fn categories(f: &PerSetFeatures) -> [f64; 5] {
    [
        f.kills(),
        f.get(Feature::Assists),
        f.get(Feature::Digs),
        f.get(Feature::Blocks),
        f.get(Feature::Aces),
    ]
}

const ELITE: [f64; 5] = [3.0, 6.0, 2.5, 1.0, 0.5];
const SOLID: [f64; 5] = [1.5, 2.0, 1.2, 0.5, 0.25];
const ACTIVE: [f64; 5] = [0.5, 0.5, 0.5, 0.2, 0.1];

fn categories_at_least(f: &PerSetFeatures, thresholds: &[f64; 5]) -> usize {
    categories(f)
        .iter()
        .zip(thresholds.iter())
        .filter(|(v, t)| *v >= *t)
        .count()
}

// ---------------------------------------------------------------------------
// Standalone predicates
// ---------------------------------------------------------------------------

fn is_complete_package(f: &PerSetFeatures) -> bool {
    categories_at_least(f, &ELITE) >= 3
}

fn is_balanced(f: &PerSetFeatures) -> bool {
    let scores: Vec<f64> = categories(f)
        .iter()
        .zip(ELITE.iter())
        .map(|(v, e)| v / e)
        .collect();
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    min >= 0.25 && max - min <= 0.35
}

fn is_sniper(f: &PerSetFeatures) -> bool {
    f.kill_rate() >= 0.5 && f.attempts() >= 2.0 && f.errors() <= 0.3
}

fn is_ghost(f: &PerSetFeatures) -> bool {
    f.actions() < 1.0 && f.errors() <= 0.1
}

fn is_wall(f: &PerSetFeatures) -> bool {
    f.get(Feature::Blocks) >= 1.2 && f.get(Feature::BlockFollows) >= 1.0
}

fn is_heavy_hitter(f: &PerSetFeatures) -> bool {
    f.get(Feature::SpikeAttempts) >= 6.0 && f.get(Feature::TipAttempts) <= 0.5
}

fn is_crafty(f: &PerSetFeatures) -> bool {
    f.get(Feature::TipKills) >= 1.0 && f.get(Feature::TipAttempts) > f.get(Feature::SpikeAttempts)
}

fn is_ace_machine(f: &PerSetFeatures) -> bool {
    f.get(Feature::Aces) >= 0.8 && f.get(Feature::ServingErrors) <= 0.4
}

fn is_loose_cannon(f: &PerSetFeatures) -> bool {
    f.errors() >= 2.0 && f.kills() < 1.5
}

fn is_anchor(f: &PerSetFeatures) -> bool {
    f.get(Feature::Digs) >= 3.0 && f.get(Feature::Blocks) >= 0.8
}

// ---------------------------------------------------------------------------
// Primary (error / consistency) predicates
// ---------------------------------------------------------------------------

fn is_maverick(f: &PerSetFeatures) -> bool {
    f.errors() >= 1.2
}

fn is_precise(f: &PerSetFeatures) -> bool {
    f.errors() <= 0.25 && f.actions() >= 2.0
}

fn is_workhorse(f: &PerSetFeatures) -> bool {
    f.actions() >= 6.0
}

fn is_selective(f: &PerSetFeatures) -> bool {
    f.attempts() <= 2.0 && f.kills() > 0.0 && f.kill_rate() >= 0.45
}

fn is_steady(f: &PerSetFeatures) -> bool {
    f.actions() < 3.0 && f.errors() <= 0.3
}

// ---------------------------------------------------------------------------
// Secondary (role) predicates
// ---------------------------------------------------------------------------

fn is_striker(f: &PerSetFeatures) -> bool {
    f.kills() >= 2.5
}

fn is_guardian(f: &PerSetFeatures) -> bool {
    f.get(Feature::Digs) >= 2.0
}

fn is_playmaker(f: &PerSetFeatures) -> bool {
    f.get(Feature::Assists) >= 4.0
}

fn is_finisher(f: &PerSetFeatures) -> bool {
    f.kill_rate() >= 0.45 && f.kills() >= 1.5
}

fn is_intimidator(f: &PerSetFeatures) -> bool {
    f.get(Feature::Blocks) >= 0.8 || f.get(Feature::BlockFollows) >= 1.0
}

fn is_bomber(f: &PerSetFeatures) -> bool {
    f.get(Feature::Aces) >= 0.4
}

fn is_versatile(f: &PerSetFeatures) -> bool {
    categories_at_least(f, &SOLID) >= 3
}

fn is_jack_of_all_trades(f: &PerSetFeatures) -> bool {
    categories_at_least(f, &ACTIVE) >= 4
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub const COMPLETE_PACKAGE: ArchetypeDef = ArchetypeDef {
    id: "complete-package",
    name: "Complete Package",
    color: "#f59e0b",
    description: "Elite production in at least three separate categories.",
};
pub const BALANCED: ArchetypeDef = ArchetypeDef {
    id: "balanced",
    name: "Balanced",
    color: "#14b8a6",
    description: "Contributes evenly across attacking, setting, defense, blocking and serving.",
};
pub const SNIPER: ArchetypeDef = ArchetypeDef {
    id: "sniper",
    name: "Sniper",
    color: "#ef4444",
    description: "Converts a high share of attacks while rarely giving points away.",
};
pub const GHOST: ArchetypeDef = ArchetypeDef {
    id: "ghost",
    name: "Ghost",
    color: "#d1d5db",
    description: "Low involvement and low risk; rarely shows up on the stat sheet.",
};
pub const WALL: ArchetypeDef = ArchetypeDef {
    id: "wall",
    name: "The Wall",
    color: "#6366f1",
    description: "Shuts down the net with blocks and follows up every touch.",
};
pub const HEAVY_HITTER: ArchetypeDef = ArchetypeDef {
    id: "heavy-hitter",
    name: "Heavy Hitter",
    color: "#dc2626",
    description: "Swings hard and often, almost never tips.",
};
pub const CRAFTY: ArchetypeDef = ArchetypeDef {
    id: "crafty",
    name: "Crafty",
    color: "#a855f7",
    description: "Finds the floor with touch shots more than power.",
};
pub const ACE_MACHINE: ArchetypeDef = ArchetypeDef {
    id: "ace-machine",
    name: "Ace Machine",
    color: "#eab308",
    description: "Scores from the service line without missing much.",
};
pub const LOOSE_CANNON: ArchetypeDef = ArchetypeDef {
    id: "loose-cannon",
    name: "Loose Cannon",
    color: "#78716c",
    description: "Errors pile up faster than the kills do.",
};
pub const ANCHOR: ArchetypeDef = ArchetypeDef {
    id: "anchor",
    name: "Anchor",
    color: "#0ea5e9",
    description: "Holds down both the back row and the net.",
};

pub const MAVERICK: ArchetypeDef = ArchetypeDef {
    id: "maverick",
    name: "Maverick",
    color: "#f97316",
    description: "Plays with risk and accepts a high error rate.",
};
pub const PRECISE: ArchetypeDef = ArchetypeDef {
    id: "precise",
    name: "Precise",
    color: "#22c55e",
    description: "Makes plays while keeping errors to a minimum.",
};
pub const WORKHORSE: ArchetypeDef = ArchetypeDef {
    id: "workhorse",
    name: "Workhorse",
    color: "#84cc16",
    description: "Carries a heavy share of the touches every set.",
};
pub const SELECTIVE: ArchetypeDef = ArchetypeDef {
    id: "selective",
    name: "Selective",
    color: "#06b6d4",
    description: "Attacks sparingly but makes the swings count.",
};
pub const STEADY: ArchetypeDef = ArchetypeDef {
    id: "steady",
    name: "Steady",
    color: "#64748b",
    description: "Quiet volume with few mistakes.",
};

pub const STRIKER: ArchetypeDef = ArchetypeDef {
    id: "striker",
    name: "Striker",
    color: "#e11d48",
    description: "Primary kill threat.",
};
pub const GUARDIAN: ArchetypeDef = ArchetypeDef {
    id: "guardian",
    name: "Guardian",
    color: "#0284c7",
    description: "Keeps the ball off the floor in the back row.",
};
pub const PLAYMAKER: ArchetypeDef = ArchetypeDef {
    id: "playmaker",
    name: "Playmaker",
    color: "#7c3aed",
    description: "Runs the offense and feeds the hitters.",
};
pub const FINISHER: ArchetypeDef = ArchetypeDef {
    id: "finisher",
    name: "Finisher",
    color: "#be123c",
    description: "Efficient attacker who ends rallies.",
};
pub const INTIMIDATOR: ArchetypeDef = ArchetypeDef {
    id: "intimidator",
    name: "Intimidator",
    color: "#4338ca",
    description: "Owns the net on defense.",
};
pub const BOMBER: ArchetypeDef = ArchetypeDef {
    id: "bomber",
    name: "Bomber",
    color: "#ca8a04",
    description: "Dangerous from the service line.",
};
pub const VERSATILE: ArchetypeDef = ArchetypeDef {
    id: "versatile",
    name: "Versatile",
    color: "#0d9488",
    description: "Solid in several roles at once.",
};
pub const JACK_OF_ALL_TRADES: ArchetypeDef = ArchetypeDef {
    id: "jack-of-all-trades",
    name: "Jack of All Trades",
    color: "#65a30d",
    description: "Touches every part of the game a little.",
};

pub const NET_COMMANDER: ArchetypeDef = ArchetypeDef {
    id: "net-commander",
    name: "Net Commander",
    color: "#9333ea",
    description: "Setter first who also closes the net on blocks.",
};
pub const TWIN_TOWER: ArchetypeDef = ArchetypeDef {
    id: "twin-tower",
    name: "Twin Tower",
    color: "#3730a3",
    description: "Blocker first who can still run the offense.",
};
pub const GAMBLER: ArchetypeDef = ArchetypeDef {
    id: "gambler",
    name: "Gambler",
    color: "#c2410c",
    description: "Runs the offense aggressively; big assist numbers come with big error numbers.",
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
