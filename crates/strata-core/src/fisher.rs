//! Fisher randomization tests.
//!
//! Under the sharp null of no effect for any unit, the revealed outcomes are
//! fixed and only the assignment is random. The p-value compares the observed
//! statistic with its distribution over re-assignments drawn from the design:
//!
//! ```text
//! p = (1 + #{r : |t_r| >= |t_obs|}) / (R + 1)
//! ```
//!
//! Repetition `r` is drawn with sub-seed `seed + r` (wrapping), so a run is
//! reproducible from its base seed whatever the thread count, and `r = 0`
//! replays the base seed itself. [`fisher_exact_test`] enumerates every
//! assignment instead of sampling when the design is small enough.

use rayon::prelude::*;
use serde::Serialize;

use crate::assignment::{Rerandomize, observed_design};
use crate::design::TreatedCounts;
use crate::error::{Error, Result};
use crate::table::{ObservedData, StratumIndex};

/// Relative tolerance under which `|t_r|` and `|t_obs|` count as tied.
const TIE_TOLERANCE: f64 = 1e-12;

/// Outcome of a randomization test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FisherResult {
    /// Statistic on the observed assignment.
    pub observed: f64,
    pub p_value: f64,
    /// Reference assignments compared (`R`, or the full count when exact).
    pub repetitions: u64,
    /// Reference assignments at least as extreme as the observed one.
    pub extreme_count: u64,
}

fn at_least_as_extreme(t: f64, observed_abs: f64) -> bool {
    t.abs() >= observed_abs - TIE_TOLERANCE * observed_abs.max(1.0)
}

fn observed_statistic<S>(data: &ObservedData, stat_fn: &S) -> Result<f64>
where
    S: Fn(&ObservedData) -> Result<f64>,
{
    let t_obs = stat_fn(data)?;
    if !t_obs.is_finite() {
        return Err(Error::insufficient(format!(
            "observed statistic is not finite: {t_obs}"
        )));
    }
    Ok(t_obs)
}

/// Monte-Carlo Fisher test with `repetitions` rerandomizations.
pub fn fisher_test<S, R>(
    data: &ObservedData,
    stat_fn: S,
    rerandomizer: &R,
    repetitions: usize,
    seed: u64,
) -> Result<FisherResult>
where
    S: Fn(&ObservedData) -> Result<f64> + Sync,
    R: Rerandomize + ?Sized,
{
    if repetitions < 1 {
        return Err(Error::config("R must be >= 1"));
    }
    let t_obs = observed_statistic(data, &stat_fn)?;
    let observed_abs = t_obs.abs();

    let extreme_count = (0..repetitions)
        .into_par_iter()
        .map(|r| {
            let sub_seed = seed.wrapping_add(r as u64);
            let resampled = rerandomizer.resample(data, sub_seed)?;
            let t_r = stat_fn(&resampled)?;
            Ok(u64::from(at_least_as_extreme(t_r, observed_abs)))
        })
        .sum::<Result<u64>>()?;

    let repetitions = repetitions as u64;
    let p_value = (1 + extreme_count) as f64 / (repetitions + 1) as f64;
    log::debug!(
        "fisher test: t_obs={t_obs:.6}, extreme={extreme_count}/{repetitions}, p={p_value:.6} (seed={seed})"
    );
    Ok(FisherResult {
        observed: t_obs,
        p_value,
        repetitions,
        extreme_count,
    })
}

/// Two-sided Monte-Carlo Fisher p-value; see [`fisher_test`].
pub fn fisher_pvalue<S, R>(
    data: &ObservedData,
    stat_fn: S,
    rerandomizer: &R,
    repetitions: usize,
    seed: u64,
) -> Result<f64>
where
    S: Fn(&ObservedData) -> Result<f64> + Sync,
    R: Rerandomize + ?Sized,
{
    fisher_test(data, stat_fn, rerandomizer, repetitions, seed).map(|r| r.p_value)
}

// ---------------------------------------------------------------------------
// Exact enumeration
// ---------------------------------------------------------------------------

/// `C(n, k)`, or `None` on overflow.
fn binomial(n: usize, k: usize) -> Option<u64> {
    let k = k.min(n - k);
    let mut c: u128 = 1;
    for i in 0..k {
        c = c * (n - i) as u128 / (i + 1) as u128;
        if c > u64::MAX as u128 {
            return None;
        }
    }
    Some(c as u64)
}

/// Number of assignments that keep every stratum's treated count, or `None`
/// if it does not fit in a `u64`.
pub fn count_assignments(index: &StratumIndex, counts: &[usize]) -> Option<u64> {
    index
        .iter()
        .zip(counts)
        .try_fold(1u64, |acc, ((_, rows), &n1)| {
            acc.checked_mul(binomial(rows.len(), n1)?)
        })
}

/// All `k`-subsets of `0..n` in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());
        // Rightmost position that can still advance.
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return out;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

/// Exact Fisher test over every assignment the design allows.
///
/// The reference set contains the observed assignment, so
/// `p = #{a : |t_a| >= |t_obs|} / #assignments`. Designs with more than
/// `max_assignments` assignments are rejected.
pub fn fisher_exact_test<S>(
    data: &ObservedData,
    stat_fn: S,
    n1_by_stratum: &TreatedCounts,
    max_assignments: u64,
) -> Result<FisherResult>
where
    S: Fn(&ObservedData) -> Result<f64> + Sync,
{
    let (index, counts) = observed_design(data, n1_by_stratum)?;
    let total = count_assignments(&index, &counts)
        .filter(|&t| t <= max_assignments)
        .ok_or_else(|| {
            Error::config(format!(
                "exact enumeration exceeds the limit of {max_assignments} assignments"
            ))
        })?;

    let t_obs = observed_statistic(data, &stat_fn)?;
    let observed_abs = t_obs.abs();

    // Treated row sets per stratum, then a mixed-radix walk over their product.
    let per_stratum: Vec<Vec<Vec<usize>>> = index
        .iter()
        .zip(&counts)
        .map(|((_, rows), &n1)| {
            combinations(rows.len(), n1)
                .into_iter()
                .map(|combo| combo.into_iter().map(|pos| rows[pos]).collect())
                .collect()
        })
        .collect();

    let extreme_count = (0..total)
        .into_par_iter()
        .map(|mut a| {
            let mut z = vec![false; index.n_units()];
            for choices in &per_stratum {
                let radix = choices.len() as u64;
                for &row in &choices[(a % radix) as usize] {
                    z[row] = true;
                }
                a /= radix;
            }
            let t_a = stat_fn(&data.with_assignment(&z)?)?;
            Ok(u64::from(at_least_as_extreme(t_a, observed_abs)))
        })
        .sum::<Result<u64>>()?;

    let p_value = extreme_count as f64 / total as f64;
    log::debug!("exact fisher test: t_obs={t_obs:.6}, extreme={extreme_count}/{total}");
    Ok(FisherResult {
        observed: t_obs,
        p_value,
        repetitions: total,
        extreme_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{StratifiedRerandomizer, assign_treatment_stratified};
    use crate::statistics::{stat_diff_in_means, stat_studentized};
    use crate::table::{Observation, PotentialOutcomes, Unit};

    fn population(effect: f64) -> PotentialOutcomes {
        let units = (0..40u64)
            .map(|i| Unit {
                unit_id: i,
                g: if i < 16 { "a" } else { "b" }.to_string(),
                y0: ((i * 7919) % 13) as f64,
                y1: ((i * 7919) % 13) as f64 + effect,
            })
            .collect();
        PotentialOutcomes::new(units).unwrap()
    }

    fn counts() -> TreatedCounts {
        [("a", 8), ("b", 12)].into_iter().collect()
    }

    #[test]
    fn test_pvalue_in_unit_interval() {
        let obs = assign_treatment_stratified(&population(0.0), &counts(), 3).unwrap();
        let rr = StratifiedRerandomizer::new(&obs, &counts()).unwrap();
        for r in [1, 5, 99] {
            let p = fisher_pvalue(&obs, stat_diff_in_means, &rr, r, 11).unwrap();
            assert!(p > 0.0 && p <= 1.0, "p={p}");
        }
    }

    #[test]
    fn test_zero_repetitions_rejected() {
        let obs = assign_treatment_stratified(&population(0.0), &counts(), 3).unwrap();
        let rr = StratifiedRerandomizer::new(&obs, &counts()).unwrap();
        assert!(matches!(
            fisher_test(&obs, stat_diff_in_means, &rr, 0, 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_reproducible_from_seed() {
        let obs = assign_treatment_stratified(&population(1.0), &counts(), 3).unwrap();
        let rr = StratifiedRerandomizer::new(&obs, &counts()).unwrap();
        let a = fisher_test(&obs, stat_studentized, &rr, 200, 42).unwrap();
        let b = fisher_test(&obs, stat_studentized, &rr, 200, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_large_effect_gives_small_pvalue() {
        let obs = assign_treatment_stratified(&population(50.0), &counts(), 8).unwrap();
        let rr = StratifiedRerandomizer::new(&obs, &counts()).unwrap();
        // Sub-seeds 1000..1199 never replay assignment seed 8.
        let res = fisher_test(&obs, stat_diff_in_means, &rr, 199, 1_000).unwrap();
        assert_eq!(res.extreme_count, 0);
        assert!((res.p_value - 1.0 / 200.0).abs() < 1e-15);
    }

    #[test]
    fn test_invariant_statistic_gives_one() {
        let obs = assign_treatment_stratified(&population(2.0), &counts(), 8).unwrap();
        let rr = StratifiedRerandomizer::new(&obs, &counts()).unwrap();
        let constant = |_: &ObservedData| -> Result<f64> { Ok(1.5) };
        assert_eq!(fisher_pvalue(&obs, constant, &rr, 50, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_error_in_draw_propagates() {
        let obs = assign_treatment_stratified(&population(0.0), &counts(), 3).unwrap();
        let failing = |_: &ObservedData, _: u64| -> Result<ObservedData> {
            Err(Error::assignment("no draws"))
        };
        assert!(matches!(
            fisher_test(&obs, stat_diff_in_means, &failing, 10, 0),
            Err(Error::Assignment(_))
        ));
    }

    #[test]
    fn test_binomial_and_count() {
        assert_eq!(binomial(5, 2), Some(10));
        assert_eq!(binomial(6, 0), Some(1));
        assert_eq!(binomial(6, 6), Some(1));
        assert_eq!(binomial(200, 100), None);
        let index = StratumIndex::build(["a", "a", "a", "a", "b", "b", "b"]);
        assert_eq!(count_assignments(&index, &[2, 1]), Some(18));
    }

    #[test]
    fn test_combinations_enumerated() {
        let combos = combinations(4, 2);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0], vec![0, 1]);
        assert_eq!(combos[5], vec![2, 3]);
        assert_eq!(combinations(3, 0), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_exact_pvalue_small_design() {
        // One stratum, 4 units, 2 treated: 6 assignments. Treated = {3, 4},
        // control = {1, 2}: diff = 2, attained only by this split and its
        // mirror image, so p = 2/6.
        let rows = [(1.0, false), (2.0, false), (3.0, true), (4.0, true)]
            .iter()
            .enumerate()
            .map(|(i, &(y, z))| Observation {
                unit_id: i as u64,
                g: "a".to_string(),
                z,
                y,
            })
            .collect();
        let data = ObservedData::new(rows).unwrap();
        let n1: TreatedCounts = [("a", 2)].into_iter().collect();
        let res = fisher_exact_test(&data, stat_diff_in_means, &n1, 1_000).unwrap();
        assert_eq!(res.repetitions, 6);
        assert_eq!(res.extreme_count, 2);
        assert!((res.p_value - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_rejects_observed_outside_design() {
        // One treated unit observed, but the design treats two: the observed
        // assignment is not among the enumerated ones.
        let rows = [10.0, 0.0, 0.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &y)| Observation {
                unit_id: i as u64,
                g: "a".to_string(),
                z: i == 0,
                y,
            })
            .collect();
        let data = ObservedData::new(rows).unwrap();
        let n1: TreatedCounts = [("a", 2)].into_iter().collect();
        assert!(matches!(
            fisher_exact_test(&data, stat_diff_in_means, &n1, 1_000),
            Err(Error::Assignment(_))
        ));
    }

    #[test]
    fn test_exact_limit_enforced() {
        let obs = assign_treatment_stratified(&population(0.0), &counts(), 3).unwrap();
        assert!(matches!(
            fisher_exact_test(&obs, stat_diff_in_means, &counts(), 1_000),
            Err(Error::Config(_))
        ));
    }
}
