//! Commander grouping: collapse units with identical comparable stats into one
//! representative plus variants.
//!
//! Representative policy: the first unit of each bucket in input order. Variants keep
//! their relative input order and groups are emitted in the order their representative
//! appeared. Units that cannot be hashed get a singleton group, so grouping is total.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::compare::hash::stats_hash;
use crate::data::unit::{Unit, UnitIndexEntry};

/// Hash prefix of singleton groups built for units without hashable stats.
pub const UNHASHED_PREFIX: &str = "unhashed:";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommanderGroup {
    pub representative: UnitIndexEntry,
    pub variants: Vec<UnitIndexEntry>,
    pub stats_hash: String,
}

impl CommanderGroup {
    fn singleton(entry: UnitIndexEntry, stats_hash: String) -> Self {
        Self {
            representative: entry,
            variants: Vec::new(),
            stats_hash,
        }
    }

    pub fn is_hashed(&self) -> bool {
        !self.stats_hash.starts_with(UNHASHED_PREFIX)
    }

    /// Representative followed by variants.
    pub fn members(&self) -> impl Iterator<Item = &UnitIndexEntry> {
        std::iter::once(&self.representative).chain(self.variants.iter())
    }
}

/// Groups listing entries by the stats hash of their resolved unit. `resolve` returns the
/// full record for an entry, or None when it has not been resolved.
pub fn group_commanders<'a, F>(entries: &[UnitIndexEntry], mut resolve: F) -> Vec<CommanderGroup>
where
    F: FnMut(&UnitIndexEntry) -> Option<&'a Unit>,
{
    group_resolved(entries.iter().map(|entry| (entry, resolve(entry))))
}

/// Groups fully resolved units. Units are matched to their entries by position, so equal
/// ids from different factions stay distinct.
pub fn group_units(units: &[Unit]) -> Vec<CommanderGroup> {
    let entries: Vec<UnitIndexEntry> = units.iter().map(Unit::index_entry).collect();
    group_resolved(entries.iter().zip(units.iter().map(Some)))
}

fn group_resolved<'e, 'u, I>(resolved: I) -> Vec<CommanderGroup>
where
    I: IntoIterator<Item = (&'e UnitIndexEntry, Option<&'u Unit>)>,
{
    let mut groups: Vec<CommanderGroup> = Vec::new();
    let mut bucket_of: HashMap<String, usize> = HashMap::new();

    for (entry, unit) in resolved {
        let hash = match unit.map(stats_hash) {
            Some(Ok(hash)) => hash,
            unhashable => {
                let reason = match unhashable {
                    Some(Err(err)) => err.to_string(),
                    _ => "not resolved".to_string(),
                };
                warn!("unit '{}' placed in its own group: {reason}", entry.unit_id);
                groups.push(CommanderGroup::singleton(
                    entry.clone(),
                    format!("{UNHASHED_PREFIX}{}", entry.unit_id),
                ));
                continue;
            }
        };

        match bucket_of.get(&hash) {
            Some(&slot) => groups[slot].variants.push(entry.clone()),
            None => {
                bucket_of.insert(hash.clone(), groups.len());
                groups.push(CommanderGroup::singleton(entry.clone(), hash));
            }
        }
    }

    groups
}
