//! Unit resolution: the shared cache, the per-comparison resolver and icon leases.

pub mod cache;
pub mod icons;
pub mod resolver;

pub use cache::UnitCache;
pub use icons::{IconLease, IconLeases, IconLifecycle};
pub use resolver::{resolve_comparison, ComparisonResolver, ResolutionSnapshot, TaskState};
