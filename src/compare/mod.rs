//! Unit comparison: equivalence hashing, commander grouping, group aggregation and
//! delta formatting. Everything here is synchronous and pure.

pub mod aggregate;
pub mod format;
pub mod grouping;
pub mod hash;

pub use aggregate::{
    aggregate_group, AggregatedGroupStats, AggregatedWeapon, DerivedStats, GroupAccumulator,
    GroupMember, MobilityBottleneck, ReachStats, SummedStats, TerrainFlags, WeaponSource,
};
pub use format::{
    compare_units, format_comparison, ComparisonValue, Directionality, FieldComparison, Judgement,
    StatValue, UNIT_FIELDS,
};
pub use grouping::{group_commanders, group_units, CommanderGroup, UNHASHED_PREFIX};
pub use hash::{canonical_stats, stats_hash};
