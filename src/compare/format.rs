//! Comparison deltas: signed difference and judgement between two stat values.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::data::unit::Unit;

/// Which direction of change counts as an improvement for a stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Directionality {
    HigherBetter,
    LowerBetter,
    Neutral,
}

impl Directionality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HigherBetter => "higher-better",
            Self::LowerBetter => "lower-better",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Directionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directionality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "higher-better" => Ok(Self::HigherBetter),
            "lower-better" => Ok(Self::LowerBetter),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown directionality '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Improved,
    Regressed,
}

/// A displayed stat: numeric, or a label such as "N/A".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Text(String),
}

impl StatValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for StatValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or_else(|| Self::Text("N/A".to_string()), Self::Number)
    }
}

impl From<&str> for StatValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonValue {
    pub value: StatValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgement: Option<Judgement>,
}

/// `diff = value - compare`. No diff when either side is non-numeric or the values are equal;
/// neutral stats get a diff but no judgement.
pub fn format_comparison(
    value: impl Into<StatValue>,
    compare: Option<StatValue>,
    policy: Directionality,
) -> ComparisonValue {
    let value = value.into();
    let diff = match (value.as_number(), compare.as_ref().and_then(StatValue::as_number)) {
        (Some(v), Some(c)) if v != c => Some(v - c),
        _ => None,
    };
    let judgement = diff.and_then(|d| judge(d, policy));
    ComparisonValue {
        value,
        diff,
        judgement,
    }
}

fn judge(diff: f64, policy: Directionality) -> Option<Judgement> {
    let improved = match policy {
        Directionality::HigherBetter => diff > 0.0,
        Directionality::LowerBetter => diff < 0.0,
        Directionality::Neutral => return None,
    };
    Some(if improved {
        Judgement::Improved
    } else {
        Judgement::Regressed
    })
}

type FieldAccessor = fn(&Unit) -> Option<f64>;

/// Per-unit fields shown in unit-mode comparisons, with their directionality.
pub const UNIT_FIELDS: &[(&str, Directionality, FieldAccessor)] = &[
    ("health", Directionality::HigherBetter, |u| u.combat.as_ref().map(|c| c.health)),
    ("dps", Directionality::HigherBetter, |u| u.combat.as_ref().map(|c| c.dps)),
    ("salvo_damage", Directionality::HigherBetter, |u| {
        u.combat.as_ref().map(|c| c.salvo_damage)
    }),
    ("weapon_range", Directionality::HigherBetter, |u| {
        u.combat.as_ref().and_then(|c| c.weapon_range)
    }),
    ("metal_cost", Directionality::LowerBetter, |u| u.economy.as_ref().map(|e| e.metal_cost)),
    ("energy_cost", Directionality::LowerBetter, |u| u.economy.as_ref().map(|e| e.energy_cost)),
    ("build_time", Directionality::LowerBetter, |u| u.economy.as_ref().map(|e| e.build_time)),
    ("build_rate", Directionality::HigherBetter, |u| u.economy.as_ref().map(|e| e.build_rate)),
    ("move_speed", Directionality::HigherBetter, |u| {
        u.mobility.as_ref().and_then(|m| m.move_speed)
    }),
    ("turn_speed", Directionality::HigherBetter, |u| {
        u.mobility.as_ref().and_then(|m| m.turn_speed)
    }),
    ("vision_radius", Directionality::HigherBetter, |u| {
        u.recon.as_ref().and_then(|r| r.vision_radius)
    }),
    ("radar_radius", Directionality::HigherBetter, |u| {
        u.recon.as_ref().and_then(|r| r.radar_radius)
    }),
    ("tier", Directionality::Neutral, |u| u.tier.map(f64::from)),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: &'static str,
    pub policy: Directionality,
    #[serde(flatten)]
    pub comparison: ComparisonValue,
}

/// Compares `unit` against `baseline` field by field. Missing fields show as "N/A".
pub fn compare_units(unit: &Unit, baseline: &Unit) -> Vec<FieldComparison> {
    UNIT_FIELDS
        .iter()
        .map(|&(field, policy, accessor)| FieldComparison {
            field,
            policy,
            comparison: format_comparison(accessor(unit), Some(accessor(baseline).into()), policy),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_better_positive_diff_improves() {
        let result = format_comparison(150.0, Some(100.0.into()), Directionality::HigherBetter);
        assert_eq!(result.diff, Some(50.0));
        assert_eq!(result.judgement, Some(Judgement::Improved));
    }

    #[test]
    fn lower_better_positive_diff_regresses() {
        let result = format_comparison(150.0, Some(100.0.into()), Directionality::LowerBetter);
        assert_eq!(result.diff, Some(50.0));
        assert_eq!(result.judgement, Some(Judgement::Regressed));

        let cheaper = format_comparison(80.0, Some(100.0.into()), Directionality::LowerBetter);
        assert_eq!(cheaper.diff, Some(-20.0));
        assert_eq!(cheaper.judgement, Some(Judgement::Improved));
    }

    #[test]
    fn equal_or_missing_compare_value_has_no_diff() {
        for policy in [
            Directionality::HigherBetter,
            Directionality::LowerBetter,
            Directionality::Neutral,
        ] {
            let equal = format_comparison(100.0, Some(100.0.into()), policy);
            assert_eq!(equal.diff, None);
            assert_eq!(equal.judgement, None);

            let missing = format_comparison(100.0, None, policy);
            assert_eq!(missing.diff, None);
        }
    }

    #[test]
    fn neutral_has_diff_without_judgement() {
        let result = format_comparison(12.0, Some(10.0.into()), Directionality::Neutral);
        assert_eq!(result.diff, Some(2.0));
        assert_eq!(result.judgement, None);
    }

    #[test]
    fn text_values_never_diff() {
        let result = format_comparison("N/A", Some(100.0.into()), Directionality::HigherBetter);
        assert_eq!(result.diff, None);
        assert_eq!(result.judgement, None);

        let against_text = format_comparison(100.0, Some("N/A".into()), Directionality::HigherBetter);
        assert_eq!(against_text.diff, None);
    }

    #[test]
    fn compare_units_judges_cost_and_health() {
        let raw = |health: f64, cost: f64| -> Unit {
            serde_json::from_value(serde_json::json!({
                "unit_id": "u",
                "faction_id": "arm",
                "name": "U",
                "combat": { "health": health },
                "economy": { "metal_cost": cost }
            }))
            .expect("fixture unit")
        };
        let rows = compare_units(&raw(700.0, 120.0), &raw(600.0, 150.0));

        let health = rows.iter().find(|r| r.field == "health").expect("health row");
        assert_eq!(health.comparison.diff, Some(100.0));
        assert_eq!(health.comparison.judgement, Some(Judgement::Improved));

        let cost = rows.iter().find(|r| r.field == "metal_cost").expect("cost row");
        assert_eq!(cost.comparison.diff, Some(-30.0));
        assert_eq!(cost.comparison.judgement, Some(Judgement::Improved));

        let speed = rows.iter().find(|r| r.field == "move_speed").expect("speed row");
        assert_eq!(speed.comparison.value, StatValue::Text("N/A".to_string()));
        assert_eq!(speed.comparison.diff, None);
    }

    #[test]
    fn directionality_parses_kebab_case() {
        assert_eq!(
            "lower-better".parse::<Directionality>(),
            Ok(Directionality::LowerBetter)
        );
        assert!("sideways".parse::<Directionality>().is_err());
        assert_eq!(Directionality::HigherBetter.to_string(), "higher-better");
    }
}
