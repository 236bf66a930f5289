//! Synthetic expression generator.
//!
//! Every gene gets one "true" baseline expression level shared by all
//! patients, plus independent per-patient noise. Genes carried by the eSTR
//! map additionally scale with each patient's mean tumor genotype deviation
//! from the mapping's reference baseline; unmapped genes are effect-free
//! negative controls. Output values are deliberately unclamped: the
//! association tester downstream should see realistic, possibly negative
//! noise.

use anyhow::{bail, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use estr_core::{EstrMap, ExpressionRecord, ExpressionTable, GenotypeTable, LocusCatalog};

/// Fraction of the gene baseline used to scale the uniform noise.
const NOISE_FRACTION: f64 = 0.05;

/// Simulate one expression value per (patient, gene).
///
/// Baselines are uniform integers in [1, 500), one per distinct gene label
/// in the catalog (sorted order); noise is uniform in [-1, 1] scaled by 5%
/// of the gene's baseline. Draw order is one baseline batch, then one noise
/// batch per gene, so a fixed seed reproduces bit-identical output.
///
/// A mapped locus that is absent from the genotype table is skipped
/// silently (no data for that effect); a mapped locus that is present but
/// covers a different patient set than the table is malformed input.
pub fn simulate_expression(
    genotypes: &GenotypeTable,
    catalog: &LocusCatalog,
    estr_map: &EstrMap,
    seed: Option<u64>,
) -> Result<ExpressionTable> {
    let patients = genotypes.patients();
    if patients.is_empty() {
        bail!("Genotype table is empty");
    }
    let genes = catalog.genes();
    if genes.is_empty() {
        bail!("Locus catalog carries no gene labels");
    }
    let n_patients = patients.len();

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let baselines: Vec<f64> = genes
        .iter()
        .map(|_| rng.gen_range(1..500) as f64)
        .collect();

    let mut matrix = Array2::<f64>::zeros((n_patients, genes.len()));
    for (j, &baseline) in baselines.iter().enumerate() {
        for i in 0..n_patients {
            matrix[(i, j)] = baseline;
        }
    }

    for (j, gene) in genes.iter().enumerate() {
        for i in 0..n_patients {
            let noise = (rng.gen::<f64>() * 2.0 - 1.0) * (NOISE_FRACTION * baselines[j]);
            matrix[(i, j)] += noise;
        }

        let effect = match estr_map.get(gene) {
            Some(effect) => effect,
            None => continue,
        };
        let mean_gts = genotypes.mean_gt_for_locus(&effect.tmp_id);
        if mean_gts.is_empty() {
            // locus never genotyped: no data for this effect
            continue;
        }
        if mean_gts.len() != n_patients
            || mean_gts.iter().zip(&patients).any(|((p, _), q)| p != q)
        {
            bail!(
                "Locus {} does not cover the genotype table's patient set",
                effect.tmp_id
            );
        }
        for (i, &(_, mean_gt)) in mean_gts.iter().enumerate() {
            let deviation = mean_gt - effect.ref_gt;
            matrix[(i, j)] += matrix[(i, j)] * effect.coefficient * deviation;
        }
    }

    let mut records = Vec::with_capacity(n_patients * genes.len());
    for (j, gene) in genes.iter().enumerate() {
        for (i, &patient) in patients.iter().enumerate() {
            records.push(ExpressionRecord {
                patient,
                gene: gene.clone(),
                expression: matrix[(i, j)],
            });
        }
    }

    Ok(ExpressionTable { records })
}
