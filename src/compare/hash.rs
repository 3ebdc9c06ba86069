//! Stats fingerprint: a canonical hash of everything about a unit that affects its
//! combat value. Identity and cosmetic fields (id, name, description, file, icon,
//! weapon display names) are left out; weapons are hashed as a multiset.
//!
//! Numbers are compared exactly, except that `-0.0` and `0.0` are treated as the same
//! value. Exporters must canonicalize any other float noise before it reaches this module.

use serde::Serialize;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

use crate::data::unit::{CombatSpec, EconomySpec, MobilitySpec, ReconSpec, Unit, Weapon};
use crate::error::{ResolveError, Result};

#[derive(Serialize)]
struct HashedStats<'a> {
    combat: &'a CombatSpec,
    economy: Option<&'a EconomySpec>,
    mobility: Option<&'a MobilitySpec>,
    recon: Option<&'a ReconSpec>,
    weapons: Vec<String>,
}

#[derive(Serialize)]
struct HashedWeapon<'a> {
    count: u32,
    damage: f64,
    dps: f64,
    sustained_dps: Option<f64>,
    range: f64,
    reload_time: f64,
    target_layers: Vec<&'a str>,
}

/// Compact JSON with sorted object keys and signed zero folded to `0.0`.
fn canonical_json<T: Serialize>(value: &T, key: &str) -> Result<String> {
    let mut value = serde_json::to_value(value).map_err(|err| ResolveError::malformed(key, err))?;
    fold_signed_zero(&mut value);
    serde_json::to_string(&value).map_err(|err| ResolveError::malformed(key, err))
}

fn fold_signed_zero(value: &mut Value) {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0 && f.is_sign_negative()) => {
            if let Some(zero) = Number::from_f64(0.0) {
                *n = zero;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(fold_signed_zero),
        Value::Object(fields) => fields.values_mut().for_each(fold_signed_zero),
        _ => {}
    }
}

fn canonical_weapon(weapon: &Weapon) -> Result<String> {
    let mut target_layers: Vec<&str> = weapon.target_layers.iter().map(String::as_str).collect();
    target_layers.sort_unstable();
    target_layers.dedup();
    let hashed = HashedWeapon {
        count: weapon.count,
        damage: weapon.damage,
        dps: weapon.dps,
        sustained_dps: weapon.sustained_dps,
        range: weapon.range,
        reload_time: weapon.reload_time,
        target_layers,
    };
    canonical_json(&hashed, &weapon.safe_name)
}

/// Canonical, order-independent JSON of the comparable fields. Exposed for debugging
/// why two units did or did not group.
pub fn canonical_stats(unit: &Unit) -> Result<String> {
    let combat = unit.combat.as_ref().ok_or_else(|| {
        ResolveError::malformed(
            format!("{}:{}", unit.faction_id, unit.unit_id),
            "missing combat stats",
        )
    })?;

    let mut weapons = unit
        .weapons
        .iter()
        .map(canonical_weapon)
        .collect::<Result<Vec<_>>>()?;
    weapons.sort_unstable();

    let stats = HashedStats {
        combat,
        economy: unit.economy.as_ref(),
        mobility: unit.mobility.as_ref(),
        recon: unit.recon.as_ref(),
        weapons,
    };
    canonical_json(&stats, &unit.unit_id)
}

/// Hex SHA-256 of [canonical_stats]. Fails with `MalformedRecord` when the unit has no
/// combat block to hash.
pub fn stats_hash(unit: &Unit) -> Result<String> {
    let canonical = canonical_stats(unit)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}
