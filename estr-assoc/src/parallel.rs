//! Parallel association testing over (gene, locus) pairs.
//!
//! Every pair is an independent unit of work over immutable shared tables,
//! so the fan-out is a plain rayon map with no locks. Results are
//! concatenated keyed on (gene, locus); nothing assumes a completion order.

use anyhow::Result;
use rayon::prelude::*;
use std::sync::Arc;

use estr_core::{AssocResult, ExpressionTable, GenotypeTable};

use crate::{test_pair, test_pair_permuted};

/// One unit of association work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssocTask {
    pub gene: String,
    pub tmp_id: String,
}

/// Cartesian product of genes and loci as a task list.
pub fn all_pairs(genes: &[String], loci: &[String]) -> Vec<AssocTask> {
    let mut tasks = Vec::with_capacity(genes.len() * loci.len());
    for gene in genes {
        for tmp_id in loci {
            tasks.push(AssocTask {
                gene: gene.clone(),
                tmp_id: tmp_id.clone(),
            });
        }
    }
    tasks
}

/// Test every task in parallel.
///
/// With `permute_seed` set, each pair runs the permuted-null variant; each
/// invocation builds its own generator from the seed, so parallel execution
/// stays deterministic and order-independent. Gated pairs simply contribute
/// no rows.
pub fn test_pairs(
    tasks: &[AssocTask],
    genotypes: &GenotypeTable,
    expression: &ExpressionTable,
    permute_seed: Option<u64>,
) -> Result<Vec<AssocResult>> {
    let geno: Arc<GenotypeTable> = Arc::new(genotypes.clone());
    let expr: Arc<ExpressionTable> = Arc::new(expression.clone());

    let results: Vec<Result<Option<AssocResult>>> = tasks
        .par_iter()
        .map(|task| match permute_seed {
            Some(seed) => test_pair_permuted(&task.gene, &task.tmp_id, &geno, &expr, seed),
            None => test_pair(&task.gene, &task.tmp_id, &geno, &expr),
        })
        .collect();

    let mut all = Vec::new();
    for result in results {
        if let Some(res) = result? {
            all.push(res);
        }
    }
    Ok(all)
}
