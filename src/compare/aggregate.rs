//! Group aggregation: fold a multiset of (unit, quantity) into one composite stat block.
//!
//! Each field follows one policy:
//! - sums scale with quantity (health, costs, dps, economy rates, build rate);
//! - mobility takes the minimum over present units, ignoring quantity (group bottleneck);
//! - reach (sensors, weapon range, build range) takes the maximum over present units;
//! - per-metal ratios are derived from the sums and omitted when metal cost is zero;
//! - terrain flags are OR / AND over units; an empty group has every flag false;
//! - target layers, build options and build rate per target are set-style unions;
//! - weapons merge by `safe_name`.
//!
//! Units missing a min/max field are excluded from that field rather than counted as zero.
//! Members with quantity 0 are skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::data::unit::{Unit, Weapon};

#[derive(Debug, Clone, Copy)]
pub struct GroupMember<'a> {
    pub unit: &'a Unit,
    pub quantity: u32,
}

impl<'a> GroupMember<'a> {
    pub fn new(unit: &'a Unit, quantity: u32) -> Self {
        Self { unit, quantity }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummedStats {
    pub health: f64,
    pub metal_cost: f64,
    pub energy_cost: f64,
    pub dps: f64,
    pub salvo_damage: f64,
    pub metal_production: f64,
    pub energy_production: f64,
    pub metal_consumption: f64,
    pub energy_consumption: f64,
    pub metal_storage: f64,
    pub energy_storage: f64,
    pub build_rate: f64,
    pub tool_energy_consumption: f64,
}

impl SummedStats {
    pub fn add_unit(&mut self, unit: &Unit, quantity: u32) {
        let q = f64::from(quantity);
        if let Some(combat) = &unit.combat {
            self.health += combat.health * q;
            self.dps += combat.dps * q;
            self.salvo_damage += combat.salvo_damage * q;
        }
        if let Some(economy) = &unit.economy {
            self.metal_cost += economy.metal_cost * q;
            self.energy_cost += economy.energy_cost * q;
            self.metal_production += economy.metal_production * q;
            self.energy_production += economy.energy_production * q;
            self.metal_consumption += economy.metal_consumption * q;
            self.energy_consumption += economy.energy_consumption * q;
            self.metal_storage += economy.metal_storage * q;
            self.energy_storage += economy.energy_storage * q;
            self.build_rate += economy.build_rate * q;
            self.tool_energy_consumption += economy.tool_energy_consumption * q;
        }
    }
}

/// Slowest member per mobility field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MobilityBottleneck {
    pub move_speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub brake: Option<f64>,
    pub turn_speed: Option<f64>,
}

impl MobilityBottleneck {
    pub fn add_unit(&mut self, unit: &Unit) {
        let Some(mobility) = &unit.mobility else {
            return;
        };
        fold_min(&mut self.move_speed, mobility.move_speed);
        fold_min(&mut self.acceleration, mobility.acceleration);
        fold_min(&mut self.brake, mobility.brake);
        fold_min(&mut self.turn_speed, mobility.turn_speed);
    }
}

/// Farthest member per sensor / range field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReachStats {
    pub vision_radius: Option<f64>,
    pub radar_radius: Option<f64>,
    pub sonar_radius: Option<f64>,
    pub weapon_range: Option<f64>,
    pub build_range: Option<f64>,
}

impl ReachStats {
    pub fn add_unit(&mut self, unit: &Unit) {
        if let Some(recon) = &unit.recon {
            fold_max(&mut self.vision_radius, recon.vision_radius);
            fold_max(&mut self.radar_radius, recon.radar_radius);
            fold_max(&mut self.sonar_radius, recon.sonar_radius);
        }
        fold_max(&mut self.weapon_range, unit_weapon_range(unit));
        fold_max(
            &mut self.build_range,
            unit.economy.as_ref().and_then(|e| e.build_range),
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedStats {
    pub dps_per_metal: Option<f64>,
    pub hp_per_metal: Option<f64>,
}

impl DerivedStats {
    pub fn from_sums(sums: &SummedStats) -> Self {
        if sums.metal_cost == 0.0 {
            return Self::default();
        }
        Self {
            dps_per_metal: Some(sums.dps / sums.metal_cost),
            hp_per_metal: Some(sums.health / sums.metal_cost),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TerrainFlags {
    pub any_amphibious: bool,
    pub all_amphibious: bool,
    pub any_hover: bool,
    pub all_hover: bool,
}

/// Contribution of one member unit to a merged weapon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponSource {
    pub faction_id: String,
    pub unit_id: String,
    pub name: String,
    pub quantity: u32,
    /// Mounts contributed: weapon count times member quantity.
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedWeapon {
    pub safe_name: String,
    pub name: Option<String>,
    pub total_count: u32,
    pub total_dps: f64,
    pub total_sustained_dps: Option<f64>,
    pub total_damage: f64,
    pub max_range: f64,
    pub target_layers: BTreeSet<String>,
    pub source_units: Vec<WeaponSource>,
}

impl AggregatedWeapon {
    fn new(weapon: &Weapon) -> Self {
        Self {
            safe_name: weapon.safe_name.clone(),
            name: weapon.name.clone(),
            total_count: 0,
            total_dps: 0.0,
            total_sustained_dps: None,
            total_damage: 0.0,
            max_range: weapon.range,
            target_layers: BTreeSet::new(),
            source_units: Vec::new(),
        }
    }

    fn add_instance(&mut self, weapon: &Weapon, unit: &Unit, quantity: u32) {
        let mounts = weapon.count.saturating_mul(quantity);
        let weight = f64::from(mounts);
        self.total_count = self.total_count.saturating_add(mounts);
        self.total_dps += weapon.dps * weight;
        self.total_damage += weapon.damage * weight;
        if let Some(sustained) = weapon.sustained_dps {
            *self.total_sustained_dps.get_or_insert(0.0) += sustained * weight;
        }
        self.max_range = self.max_range.max(weapon.range);
        self.target_layers
            .extend(weapon.target_layers.iter().cloned());
        if self.name.is_none() {
            self.name = weapon.name.clone();
        }
        self.source_units.push(WeaponSource {
            faction_id: unit.faction_id.clone(),
            unit_id: unit.unit_id.clone(),
            name: unit.name.clone(),
            quantity,
            count: mounts,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedGroupStats {
    /// Sum of member quantities.
    pub unit_count: u32,
    /// Distinct `faction:unit` identities among members.
    pub distinct_unit_types: usize,
    pub sums: SummedStats,
    pub mobility: MobilityBottleneck,
    pub reach: ReachStats,
    pub derived: DerivedStats,
    pub flags: TerrainFlags,
    pub all_target_layers: BTreeSet<String>,
    pub all_builds: BTreeSet<String>,
    pub build_rate_by_unit: BTreeMap<String, f64>,
    /// Merged weapons in first-seen order.
    pub weapons: Vec<AggregatedWeapon>,
}

/// Streaming accumulator behind [aggregate_group].
#[derive(Debug, Default)]
pub struct GroupAccumulator {
    stats: AggregatedGroupStats,
    identities: BTreeSet<(String, String)>,
    weapon_slot: HashMap<String, usize>,
    members: usize,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, member: GroupMember<'_>) {
        let GroupMember { unit, quantity } = member;
        if quantity == 0 {
            return;
        }
        let stats = &mut self.stats;

        stats.unit_count = stats.unit_count.saturating_add(quantity);
        self.identities
            .insert((unit.faction_id.clone(), unit.unit_id.clone()));

        stats.sums.add_unit(unit, quantity);
        stats.mobility.add_unit(unit);
        stats.reach.add_unit(unit);

        let amphibious = unit.is_amphibious();
        let hover = unit.is_hover();
        if self.members == 0 {
            stats.flags.all_amphibious = amphibious;
            stats.flags.all_hover = hover;
        } else {
            stats.flags.all_amphibious &= amphibious;
            stats.flags.all_hover &= hover;
        }
        stats.flags.any_amphibious |= amphibious;
        stats.flags.any_hover |= hover;
        self.members += 1;

        let targets: BTreeSet<&str> = unit.builds.iter().map(String::as_str).collect();
        let member_build_rate = unit.build_rate() * f64::from(quantity);
        for target in targets {
            stats.all_builds.insert(target.to_string());
            *stats
                .build_rate_by_unit
                .entry(target.to_string())
                .or_insert(0.0) += member_build_rate;
        }

        for weapon in &unit.weapons {
            stats
                .all_target_layers
                .extend(weapon.target_layers.iter().cloned());
            let slot = match self.weapon_slot.get(&weapon.safe_name) {
                Some(&slot) => slot,
                None => {
                    self.weapon_slot
                        .insert(weapon.safe_name.clone(), stats.weapons.len());
                    stats.weapons.push(AggregatedWeapon::new(weapon));
                    stats.weapons.len() - 1
                }
            };
            stats.weapons[slot].add_instance(weapon, unit, quantity);
        }
    }

    pub fn finish(mut self) -> AggregatedGroupStats {
        self.stats.distinct_unit_types = self.identities.len();
        self.stats.derived = DerivedStats::from_sums(&self.stats.sums);
        self.stats
    }
}

pub fn aggregate_group<'a, I>(members: I) -> AggregatedGroupStats
where
    I: IntoIterator<Item = GroupMember<'a>>,
{
    let mut accumulator = GroupAccumulator::new();
    for member in members {
        accumulator.add(member);
    }
    accumulator.finish()
}

/// Declared weapon range, falling back to the longest weapon.
fn unit_weapon_range(unit: &Unit) -> Option<f64> {
    unit.combat
        .as_ref()
        .and_then(|c| c.weapon_range)
        .or_else(|| {
            unit.weapons
                .iter()
                .map(|w| w.range)
                .max_by(f64::total_cmp)
        })
}

fn fold_min(slot: &mut Option<f64>, value: Option<f64>) {
    if let Some(value) = value {
        *slot = Some(slot.map_or(value, |current| current.min(value)));
    }
}

fn fold_max(slot: &mut Option<f64>, value: Option<f64>) {
    if let Some(value) = value {
        *slot = Some(slot.map_or(value, |current| current.max(value)));
    }
}
