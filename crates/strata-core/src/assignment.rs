//! Stratified treatment assignment.
//!
//! Within each stratum exactly `n1` units are drawn without replacement,
//! uniformly over the stratum, and marked treated. The same drawing routine
//! backs both the initial assignment ([`assign_treatment_stratified`]) and the
//! rerandomizations of the Fisher test ([`StratifiedRerandomizer`]), so a
//! rerandomization with the assignment seed reproduces the observed `z`.
//!
//! Every call owns a fresh `StdRng` seeded from its argument; nothing touches
//! process-global random state.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::design::TreatedCounts;
use crate::error::{Error, Result};
use crate::table::{ObservedData, PotentialOutcomes, StratumIndex};

/// Draw a treatment column for `index` with `counts[k]` treated units in the
/// `k`-th stratum (label order). Counts must already be feasible.
fn draw_assignment(index: &StratumIndex, counts: &[usize], seed: u64) -> Vec<bool> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut z = vec![false; index.n_units()];
    for ((_, rows), &n1) in index.iter().zip(counts) {
        for pos in rand::seq::index::sample(&mut rng, rows.len(), n1) {
            z[rows[pos]] = true;
        }
    }
    z
}

/// Assign treatment within strata and reveal the observed outcome.
///
/// Returns the observed table (`unit_id, g, z, y`) in the row order of
/// `potential`. Potential outcomes are not carried forward.
pub fn assign_treatment_stratified(
    potential: &PotentialOutcomes,
    n1_by_stratum: &TreatedCounts,
    seed: u64,
) -> Result<ObservedData> {
    let index = potential.partition();
    let counts = n1_by_stratum.resolve(&index)?;
    let z = draw_assignment(&index, &counts, seed);

    let rows = potential
        .units()
        .iter()
        .zip(&z)
        .map(|(u, &z)| u.reveal(z))
        .collect();

    log::debug!(
        "assigned {} of {} units to treatment across {} strata (seed={seed})",
        counts.iter().sum::<usize>(),
        index.n_units(),
        index.n_strata()
    );
    ObservedData::new(rows)
}

// ---------------------------------------------------------------------------
// Rerandomization
// ---------------------------------------------------------------------------

/// Partition an observed table and resolve its treated counts, requiring the
/// observed assignment to be one the design can draw.
pub(crate) fn observed_design(
    data: &ObservedData,
    n1_by_stratum: &TreatedCounts,
) -> Result<(StratumIndex, Vec<usize>)> {
    let index = data.partition();
    let counts = n1_by_stratum.resolve(&index)?;
    let rows = data.rows();
    for ((g, idx), &n1) in index.iter().zip(&counts) {
        let treated = idx.iter().filter(|&&i| rows[i].z).count();
        if treated != n1 {
            return Err(Error::assignment(format!(
                "stratum '{g}': observed table has {treated} treated units, design expects {n1}"
            )));
        }
    }
    Ok((index, counts))
}

/// Produces one hypothetical re-assignment of an observed table.
///
/// Implementations must be deterministic in `seed` and must keep units and
/// their outcomes fixed, changing only `z`.
pub trait Rerandomize: Sync {
    fn resample(&self, data: &ObservedData, seed: u64) -> Result<ObservedData>;
}

impl<F> Rerandomize for F
where
    F: Fn(&ObservedData, u64) -> Result<ObservedData> + Sync,
{
    fn resample(&self, data: &ObservedData, seed: u64) -> Result<ObservedData> {
        self(data, seed)
    }
}

/// Rerandomizer that redraws `z` within strata with fixed treated counts.
///
/// Built once per observed table: the stratum partition and the validated
/// counts are computed up front and reused for every draw.
#[derive(Debug, Clone)]
pub struct StratifiedRerandomizer {
    index: StratumIndex,
    counts: Vec<usize>,
}

impl StratifiedRerandomizer {
    pub fn new(data: &ObservedData, n1_by_stratum: &TreatedCounts) -> Result<Self> {
        let (index, counts) = observed_design(data, n1_by_stratum)?;
        Ok(Self { index, counts })
    }

    pub fn index(&self) -> &StratumIndex {
        &self.index
    }

    /// Treated count per stratum, in label order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Treatment column for `seed`.
    pub fn draw(&self, seed: u64) -> Vec<bool> {
        draw_assignment(&self.index, &self.counts, seed)
    }
}

impl Rerandomize for StratifiedRerandomizer {
    fn resample(&self, data: &ObservedData, seed: u64) -> Result<ObservedData> {
        if data.len() != self.index.n_units() {
            return Err(Error::assignment(format!(
                "rerandomizer built for {} units, got a table of {}",
                self.index.n_units(),
                data.len()
            )));
        }
        if data.partition() != self.index {
            return Err(Error::assignment(
                "table strata differ from the rerandomizer's partition",
            ));
        }
        data.with_assignment(&self.draw(seed))
    }
}
