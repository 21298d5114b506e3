//! In-memory experiment tables.
//!
//! Two tables flow through the engine:
//! - [`PotentialOutcomes`]: `unit_id, g, y0, y1`, the only place both
//!   potential outcomes of a unit coexist.
//! - [`ObservedData`]: `unit_id, g, z, y`, produced by assignment; only the
//!   revealed outcome survives.
//!
//! Both are row-oriented `Vec`s whose order is stable: row `i` of the observed
//! table is the unit of row `i` of the potential-outcome table it came from.
//! [`StratumIndex`] partitions row indices by stratum label once so that the
//! generator, the assignment engine and the rerandomizer share one grouping.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable unit identifier.
pub type UnitId = u64;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One unit of the synthetic population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: UnitId,
    /// Stratum label.
    pub g: String,
    /// Outcome under control.
    pub y0: f64,
    /// Outcome under treatment.
    pub y1: f64,
}

impl Unit {
    /// Reveal the outcome matching treatment indicator `z`.
    pub fn reveal(&self, z: bool) -> Observation {
        Observation {
            unit_id: self.unit_id,
            g: self.g.clone(),
            z,
            y: if z { self.y1 } else { self.y0 },
        }
    }

    /// Unit-level effect `y1 - y0`.
    pub fn effect(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// One row of the observed-data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub unit_id: UnitId,
    pub g: String,
    /// Treatment indicator, stored as `0`/`1` in serialized tables.
    #[serde(with = "zero_one")]
    pub z: bool,
    /// Revealed outcome.
    pub y: f64,
}

/// Serialize a `bool` as the integers `0`/`1`.
mod zero_one {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::custom(format!(
                "treatment indicator must be 0 or 1, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Potential-outcome table: one row per unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PotentialOutcomes {
    units: Vec<Unit>,
}

impl PotentialOutcomes {
    /// Build a table, rejecting duplicate ids and non-finite outcomes.
    pub fn new(units: Vec<Unit>) -> Result<Self> {
        check_unique_ids(units.iter().map(|u| u.unit_id))?;
        if let Some(u) = units.iter().find(|u| !u.y0.is_finite() || !u.y1.is_finite()) {
            return Err(Error::config(format!(
                "unit {} has a non-finite potential outcome",
                u.unit_id
            )));
        }
        Ok(Self { units })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Partition row indices by stratum.
    pub fn partition(&self) -> StratumIndex {
        StratumIndex::build(self.units.iter().map(|u| u.g.as_str()))
    }

    /// Finite-population average treatment effect, `mean(y1 - y0)`.
    pub fn true_ate(&self) -> Result<f64> {
        if self.units.is_empty() {
            return Err(Error::insufficient("population is empty"));
        }
        let total: f64 = self.units.iter().map(Unit::effect).sum();
        Ok(total / self.units.len() as f64)
    }

    /// Weighted finite-population effect, `sum_g lambda_g * mean_g(y1 - y0)`.
    ///
    /// The estimand targeted by the weighted Neyman estimator with the same
    /// weights. A stratum with no weight is a configuration error.
    pub fn true_weighted_ate(&self, weights: &crate::design::StratumWeights) -> Result<f64> {
        let index = self.partition();
        if index.is_empty() {
            return Err(Error::insufficient("population is empty"));
        }
        let mut total = 0.0;
        for (g, rows) in index.iter() {
            let lambda = weights.weight(g)?;
            let mean_effect =
                rows.iter().map(|&i| self.units[i].effect()).sum::<f64>() / rows.len() as f64;
            total += lambda * mean_effect;
        }
        Ok(total)
    }
}

/// Observed-data table: one row per unit, one revealed outcome each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedData {
    rows: Vec<Observation>,
}

impl ObservedData {
    /// Build a table, rejecting duplicate ids and non-finite outcomes.
    pub fn new(rows: Vec<Observation>) -> Result<Self> {
        check_unique_ids(rows.iter().map(|r| r.unit_id))?;
        if let Some(r) = rows.iter().find(|r| !r.y.is_finite()) {
            return Err(Error::config(format!(
                "unit {} has a non-finite outcome",
                r.unit_id
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Partition row indices by stratum.
    pub fn partition(&self) -> StratumIndex {
        StratumIndex::build(self.rows.iter().map(|r| r.g.as_str()))
    }

    /// Treatment column.
    pub fn assignment(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.z).collect()
    }

    /// Copy of this table with a fresh treatment column and the outcomes kept.
    ///
    /// This is the hypothetical table of a rerandomization under the sharp
    /// null: units and their revealed outcomes are fixed, only `z` moves.
    pub fn with_assignment(&self, z: &[bool]) -> Result<Self> {
        if z.len() != self.rows.len() {
            return Err(Error::assignment(format!(
                "assignment has {} entries for {} units",
                z.len(),
                self.rows.len()
            )));
        }
        let rows = self
            .rows
            .iter()
            .zip(z)
            .map(|(r, &z)| Observation { z, ..r.clone() })
            .collect();
        Ok(Self { rows })
    }
}

fn check_unique_ids(ids: impl Iterator<Item = UnitId>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::config(format!("duplicate unit_id {id}")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stratum partition
// ---------------------------------------------------------------------------

/// Row indices grouped by stratum label, in label order.
///
/// Groups keep table order within a stratum, so two tables with the same row
/// order produce the same partition and, with the same seed, the same draws.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StratumIndex {
    groups: BTreeMap<String, Vec<usize>>,
    n_units: usize,
}

impl StratumIndex {
    /// Group the positions of `labels` by value.
    pub fn build<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut n_units = 0;
        for (i, g) in labels.into_iter().enumerate() {
            match groups.get_mut(g) {
                Some(rows) => rows.push(i),
                None => {
                    groups.insert(g.to_string(), vec![i]);
                }
            }
            n_units += 1;
        }
        Self { groups, n_units }
    }

    /// `(label, row indices)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.groups.iter().map(|(g, rows)| (g.as_str(), rows.as_slice()))
    }

    pub fn strata(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn get(&self, g: &str) -> Option<&[usize]> {
        self.groups.get(g).map(Vec::as_slice)
    }

    /// Stratum sizes in label order.
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(g, rows)| (g.clone(), rows.len()))
            .collect()
    }

    pub fn n_units(&self) -> usize {
        self.n_units
    }

    pub fn n_strata(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: UnitId, g: &str, y0: f64, y1: f64) -> Unit {
        Unit {
            unit_id: id,
            g: g.to_string(),
            y0,
            y1,
        }
    }

    #[test]
    fn test_reveal_picks_matching_outcome() {
        let u = unit(7, "a", 1.0, 4.0);
        assert_eq!(u.reveal(true).y, 4.0);
        assert_eq!(u.reveal(false).y, 1.0);
        assert_eq!(u.reveal(true).unit_id, 7);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = PotentialOutcomes::new(vec![unit(1, "a", 0.0, 1.0), unit(1, "b", 0.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_non_finite_outcome_rejected() {
        let err = PotentialOutcomes::new(vec![unit(1, "a", f64::NAN, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partition_groups_in_label_order() {
        let index = StratumIndex::build(["b", "a", "b", "c", "a"]);
        let groups: Vec<(&str, &[usize])> = index.iter().collect();
        assert_eq!(groups[0], ("a", &[1, 4][..]));
        assert_eq!(groups[1], ("b", &[0, 2][..]));
        assert_eq!(groups[2], ("c", &[3][..]));
        assert_eq!(index.n_units(), 5);
        assert_eq!(index.n_strata(), 3);
    }

    #[test]
    fn test_with_assignment_keeps_outcomes() {
        let data = ObservedData::new(vec![
            unit(0, "a", 1.0, 2.0).reveal(true),
            unit(1, "a", 3.0, 5.0).reveal(false),
        ])
        .unwrap();
        let flipped = data.with_assignment(&[false, true]).unwrap();
        assert_eq!(flipped.assignment(), vec![false, true]);
        assert_eq!(flipped.rows()[0].y, 2.0);
        assert_eq!(flipped.rows()[1].y, 3.0);
        assert!(data.with_assignment(&[true]).is_err());
    }

    #[test]
    fn test_true_ate() {
        let pop = PotentialOutcomes::new(vec![
            unit(0, "a", 0.0, 1.0),
            unit(1, "a", 0.0, 3.0),
            unit(2, "b", 1.0, 1.0),
            unit(3, "b", 2.0, 2.0),
        ])
        .unwrap();
        assert!((pop.true_ate().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_observation_serializes_z_as_integer() {
        let obs = unit(3, "x", 0.5, 1.5).reveal(true);
        let json = serde_json::to_string(&obs).unwrap();
        assert!(json.contains("\"z\":1"), "{json}");
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
        assert!(serde_json::from_str::<Observation>(r#"{"unit_id":1,"g":"a","z":2,"y":0.0}"#).is_err());
    }
}
