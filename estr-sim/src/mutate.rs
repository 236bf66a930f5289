//! Allele mutation simulator.
//!
//! Produces one genotype record per (patient, locus). Healthy alleles model
//! a germline wild-type baseline and stay at the reference length; each
//! tumor allele independently mutates with probability `p_mut`, moving by a
//! geometric step in a direction chosen by `direction_bias`. Resulting
//! lengths are floored at 1: an STR cannot have fewer than one repeat unit.

use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Geometric};

use estr_core::{GenotypeRecord, GenotypeTable, LocusCatalog};

pub const DEFAULT_DIRECTION_BIAS: f64 = 0.5;
/// Geometric step-size success probability observed for MSS tumors
/// (0.354 for MSI).
pub const DEFAULT_STEPSIZE: f64 = 0.555;

/// Parameters for [`simulate_genotypes`].
#[derive(Clone, Debug)]
pub struct MutationParams {
    pub n_patients: u32,
    /// Per-allele mutation probability, in [0, 1].
    pub p_mut: f64,
    /// Probability that a mutation is a deletion, in [0, 1].
    pub direction_bias: f64,
    /// Success probability of the geometric step-size draw, in (0, 1].
    pub stepsize: f64,
    pub seed: Option<u64>,
}

impl MutationParams {
    pub fn new(n_patients: u32, p_mut: f64) -> Self {
        MutationParams {
            n_patients,
            p_mut,
            direction_bias: DEFAULT_DIRECTION_BIAS,
            stepsize: DEFAULT_STEPSIZE,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_patients == 0 {
            bail!("n_patients must be > 0");
        }
        if !(0.0..=1.0).contains(&self.p_mut) {
            bail!("p_mut {} out of range [0, 1]", self.p_mut);
        }
        if !(0.0..=1.0).contains(&self.direction_bias) {
            bail!("direction_bias {} out of range [0, 1]", self.direction_bias);
        }
        if !(self.stepsize > 0.0 && self.stepsize <= 1.0) {
            bail!("stepsize {} out of range (0, 1]", self.stepsize);
        }
        Ok(())
    }
}

/// Simulate a genotype table over the catalog.
///
/// Randomness happens in three batched passes over the tumor alleles
/// (mutation indicators, then directions, then step sizes) from a single
/// seeded generator, so the same seed reproduces the same table bit for
/// bit. Records come back sorted by (patient, tmp_id).
pub fn simulate_genotypes(catalog: &LocusCatalog, params: &MutationParams) -> Result<GenotypeTable> {
    params.validate()?;
    if catalog.is_empty() {
        bail!("Locus catalog is empty");
    }

    let n_rows = params.n_patients as usize * catalog.len();
    // tumor allele A for every row, then tumor allele B
    let n_tumor = 2 * n_rows;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mutated: Vec<bool> = (0..n_tumor).map(|_| rng.gen_bool(params.p_mut)).collect();
    let n_mutated = mutated.iter().filter(|&&m| m).count();
    let directions: Vec<i64> = (0..n_mutated)
        .map(|_| if rng.gen_bool(params.direction_bias) { -1 } else { 1 })
        .collect();
    // rand_distr's geometric counts failures before the first success, so
    // shift by one to get the step-size support {1, 2, ...}
    let geometric = Geometric::new(params.stepsize)
        .map_err(|e| anyhow!("Invalid stepsize {}: {}", params.stepsize, e))?;
    let steps: Vec<i64> = (0..n_mutated)
        .map(|_| 1 + geometric.sample(&mut rng) as i64)
        .collect();

    let loci = catalog.loci();
    let mut tumor: Vec<i64> = (0..n_tumor)
        .map(|i| loci[(i % n_rows) % loci.len()].ref_len as i64)
        .collect();
    let mut k = 0;
    for (i, &is_mutated) in mutated.iter().enumerate() {
        if is_mutated {
            tumor[i] += directions[k] * steps[k];
            k += 1;
        }
    }
    for len in &mut tumor {
        if *len < 1 {
            *len = 1;
        }
    }

    let mut records = Vec::with_capacity(n_rows);
    let mut row = 0;
    for patient in 1..=params.n_patients {
        for locus in loci {
            records.push(GenotypeRecord {
                patient,
                tmp_id: locus.tmp_id.clone(),
                period: locus.period,
                ref_len: locus.ref_len,
                allele_a_healthy: locus.ref_len,
                allele_b_healthy: locus.ref_len,
                allele_a_tumor: tumor[row] as u32,
                allele_b_tumor: tumor[n_rows + row] as u32,
            });
            row += 1;
        }
    }
    records.sort_by(|a, b| (a.patient, &a.tmp_id).cmp(&(b.patient, &b.tmp_id)));

    Ok(GenotypeTable { records })
}
