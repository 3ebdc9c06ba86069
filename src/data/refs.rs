//! References to units awaiting resolution, and the cache key they resolve under.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity key of a resolved unit: `factionId:unitId[@version]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub faction_id: String,
    pub unit_id: String,
    pub version: Option<String>,
}

impl CacheKey {
    pub fn new(faction_id: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            faction_id: faction_id.into(),
            unit_id: unit_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.faction_id, self.unit_id)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

/// A unit picked for comparison. An empty `unit_id` is a pending selection and never resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonRef {
    pub faction_id: String,
    pub unit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefParseError {
    #[error("expected faction:unit, got '{0}'")]
    MissingFaction(String),

    #[error("quantity must be a positive integer in '{0}'")]
    BadQuantity(String),
}

impl ComparisonRef {
    pub fn new(faction_id: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            faction_id: faction_id.into(),
            unit_id: unit_id.into(),
            version: None,
        }
    }

    /// Placeholder for a slot where the user has picked a faction but no unit yet.
    pub fn pending(faction_id: impl Into<String>) -> Self {
        Self::new(faction_id, "")
    }

    pub fn is_pending(&self) -> bool {
        self.unit_id.trim().is_empty()
    }

    /// None for pending selections.
    pub fn cache_key(&self) -> Option<CacheKey> {
        if self.is_pending() {
            return None;
        }
        Some(CacheKey {
            faction_id: self.faction_id.clone(),
            unit_id: self.unit_id.clone(),
            version: self.version.clone(),
        })
    }

    /// Parses `faction:unit[@version]`.
    pub fn parse(raw: &str) -> Result<Self, RefParseError> {
        let (faction, rest) = raw
            .trim()
            .split_once(':')
            .filter(|(faction, _)| !faction.is_empty())
            .ok_or_else(|| RefParseError::MissingFaction(raw.to_string()))?;
        let (unit, version) = match rest.split_once('@') {
            Some((unit, version)) if !version.is_empty() => (unit, Some(version.to_string())),
            Some((unit, _)) => (unit, None),
            None => (rest, None),
        };
        Ok(Self {
            faction_id: faction.to_string(),
            unit_id: unit.to_string(),
            version,
        })
    }
}

/// A ref with a group-mode quantity (always at least 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonRefWithQuantity {
    #[serde(flatten)]
    pub unit: ComparisonRef,
    pub quantity: u32,
}

impl ComparisonRefWithQuantity {
    pub fn new(unit: ComparisonRef, quantity: u32) -> Self {
        Self {
            unit,
            quantity: quantity.max(1),
        }
    }

    /// Parses `faction:unit[@version][xN|*N]`; quantity defaults to 1.
    pub fn parse(raw: &str) -> Result<Self, RefParseError> {
        let trimmed = raw.trim();
        let suffix = trimmed
            .rfind(['x', '*'])
            .map(|pos| (pos, &trimmed[pos + 1..]))
            .filter(|(_, digits)| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
        let (body, quantity) = match suffix {
            Some((pos, digits)) => {
                let quantity = digits
                    .parse::<u32>()
                    .ok()
                    .filter(|q| *q > 0)
                    .ok_or_else(|| RefParseError::BadQuantity(raw.to_string()))?;
                (trimmed[..pos].trim_end(), quantity)
            }
            None => (trimmed, 1),
        };
        Ok(Self {
            unit: ComparisonRef::parse(body)?,
            quantity,
        })
    }
}
