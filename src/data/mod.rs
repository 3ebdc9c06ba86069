pub mod refs;
pub mod source;
pub mod unit;

pub use refs::{CacheKey, ComparisonRef, ComparisonRefWithQuantity, RefParseError};
pub use source::{FactionDataSource, FileFactionSource, MemoryFactionSource};
pub use unit::{
    commander_entries, is_commander, CombatSpec, EconomySpec, FactionIndex, MobilitySpec,
    ReconSpec, Unit, UnitIndexEntry, Weapon,
};
