//! Unit data: full unit records and the lightweight per-faction listing.
//! Records are produced by the faction data service and never mutated after resolution.

use serde::{Deserialize, Serialize};

/// Full unit record. Stat blocks are optional so partially exported units still load;
/// hashing and aggregation decide per field what a missing block means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: String,
    pub faction_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tier: Option<u8>,
    #[serde(default)]
    pub unit_types: Vec<String>,
    /// Source file the record was exported from.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub combat: Option<CombatSpec>,
    #[serde(default)]
    pub economy: Option<EconomySpec>,
    #[serde(default)]
    pub mobility: Option<MobilitySpec>,
    #[serde(default)]
    pub recon: Option<ReconSpec>,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(default)]
    pub built_by: Vec<String>,
    #[serde(default)]
    pub builds: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatSpec {
    pub health: f64,
    #[serde(default)]
    pub armor_class: Option<String>,
    #[serde(default)]
    pub dps: f64,
    #[serde(default)]
    pub salvo_damage: f64,
    /// Longest weapon range on the unit.
    #[serde(default)]
    pub weapon_range: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EconomySpec {
    pub metal_cost: f64,
    #[serde(default)]
    pub energy_cost: f64,
    #[serde(default)]
    pub build_time: f64,
    #[serde(default)]
    pub metal_production: f64,
    #[serde(default)]
    pub energy_production: f64,
    #[serde(default)]
    pub metal_consumption: f64,
    #[serde(default)]
    pub energy_consumption: f64,
    #[serde(default)]
    pub metal_storage: f64,
    #[serde(default)]
    pub energy_storage: f64,
    /// Build power for constructors; zero for non-builders.
    #[serde(default)]
    pub build_rate: f64,
    #[serde(default)]
    pub build_range: Option<f64>,
    #[serde(default)]
    pub tool_energy_consumption: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobilitySpec {
    #[serde(default)]
    pub move_speed: Option<f64>,
    #[serde(default)]
    pub acceleration: Option<f64>,
    #[serde(default)]
    pub brake: Option<f64>,
    #[serde(default)]
    pub turn_speed: Option<f64>,
    #[serde(default)]
    pub amphibious: bool,
    #[serde(default)]
    pub hover: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconSpec {
    #[serde(default)]
    pub vision_radius: Option<f64>,
    #[serde(default)]
    pub radar_radius: Option<f64>,
    #[serde(default)]
    pub sonar_radius: Option<f64>,
}

/// One weapon definition. `safe_name` is the display identity shared by the same weapon
/// across units; `count` is how many mounts of it the unit carries. `damage`, `dps` and
/// `sustained_dps` are per mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub safe_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_weapon_count")]
    pub count: u32,
    #[serde(default)]
    pub damage: f64,
    #[serde(default)]
    pub dps: f64,
    #[serde(default)]
    pub sustained_dps: Option<f64>,
    #[serde(default)]
    pub range: f64,
    #[serde(default)]
    pub reload_time: f64,
    #[serde(default)]
    pub target_layers: Vec<String>,
}

fn default_weapon_count() -> u32 {
    1
}

/// Listing record used before the full [Unit] is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitIndexEntry {
    pub unit_id: String,
    pub name: String,
    #[serde(default)]
    pub unit_types: Vec<String>,
    /// Per-unit record path relative to the faction directory.
    #[serde(default)]
    pub file: Option<String>,
}

/// Index of all units in a faction. Includes data_version when the exporter wrote one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionIndex {
    #[serde(default)]
    pub data_version: Option<String>,
    pub units: Vec<UnitIndexEntry>,
}

pub const COMMANDER_TYPE_TAG: &str = "commander";

pub fn is_commander(entry: &UnitIndexEntry) -> bool {
    entry
        .unit_types
        .iter()
        .any(|tag| tag.eq_ignore_ascii_case(COMMANDER_TYPE_TAG))
}

/// Commander entries of a faction listing, in listing order.
pub fn commander_entries(index: &FactionIndex) -> Vec<UnitIndexEntry> {
    index
        .units
        .iter()
        .filter(|entry| is_commander(entry))
        .cloned()
        .collect()
}

impl Unit {
    pub fn index_entry(&self) -> UnitIndexEntry {
        UnitIndexEntry {
            unit_id: self.unit_id.clone(),
            name: self.name.clone(),
            unit_types: self.unit_types.clone(),
            file: self.file.clone(),
        }
    }

    pub fn health(&self) -> f64 {
        self.combat.as_ref().map_or(0.0, |c| c.health)
    }

    pub fn dps(&self) -> f64 {
        self.combat.as_ref().map_or(0.0, |c| c.dps)
    }

    pub fn metal_cost(&self) -> f64 {
        self.economy.as_ref().map_or(0.0, |e| e.metal_cost)
    }

    pub fn build_rate(&self) -> f64 {
        self.economy.as_ref().map_or(0.0, |e| e.build_rate)
    }

    pub fn is_amphibious(&self) -> bool {
        self.mobility.as_ref().is_some_and(|m| m.amphibious)
    }

    pub fn is_hover(&self) -> bool {
        self.mobility.as_ref().is_some_and(|m| m.hover)
    }
}
