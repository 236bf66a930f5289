//! estr-core: shared data structures for the estr toolkit.
//!
//! Everything downstream (simulation, expression generation, association
//! testing, I/O) works on the types defined here:
//! - `StrLocus` / `LocusCatalog`: reference STR loci
//! - `GenotypeRecord` / `GenotypeTable`: simulated per-patient allele lengths
//! - `ExpressionRecord` / `ExpressionTable`: per-patient, per-gene expression
//! - `EstrEffect` / `EstrMap`: gene -> causal eSTR effect configuration
//! - `AssocResult`: one fitted (gene, locus) association

use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};

pub type PatientId = u32;
pub type LocusId = String;
pub type GeneId = String;

/// One reference STR locus.
#[derive(Clone, Debug)]
pub struct StrLocus {
    pub tmp_id: LocusId,
    pub chr: String,
    pub start: u64,
    pub end: u64,
    /// Repeat unit length in bp.
    pub period: u32,
    /// Reference allele length (repeat count), >= 1.
    pub ref_len: u32,
    /// Optional gene label used by the expression generator.
    pub gene: Option<GeneId>,
}

/// Reference locus catalog. Immutable after construction; `tmp_id` is unique.
#[derive(Clone, Debug, Default)]
pub struct LocusCatalog {
    loci: Vec<StrLocus>,
    by_id: HashMap<LocusId, usize>,
}

impl LocusCatalog {
    pub fn new(loci: Vec<StrLocus>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(loci.len());
        for (i, locus) in loci.iter().enumerate() {
            if locus.ref_len < 1 {
                return Err(anyhow!(
                    "Locus {} has reference length {} (must be >= 1)",
                    locus.tmp_id,
                    locus.ref_len
                ));
            }
            if by_id.insert(locus.tmp_id.clone(), i).is_some() {
                return Err(anyhow!("Duplicate locus id {} in catalog", locus.tmp_id));
            }
        }
        Ok(LocusCatalog { loci, by_id })
    }

    pub fn loci(&self) -> &[StrLocus] {
        &self.loci
    }

    pub fn get(&self, tmp_id: &str) -> Option<&StrLocus> {
        self.by_id.get(tmp_id).map(|&i| &self.loci[i])
    }

    pub fn len(&self) -> usize {
        self.loci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loci.is_empty()
    }

    /// Distinct gene labels, sorted. Unlabeled loci are skipped.
    pub fn genes(&self) -> Vec<GeneId> {
        let mut genes: Vec<GeneId> = self
            .loci
            .iter()
            .filter_map(|l| l.gene.clone())
            .collect();
        genes.sort();
        genes.dedup();
        genes
    }
}

/// Four allele-length tracks for one (patient, locus).
///
/// The healthy pair models a germline wild-type baseline and always equals
/// the reference length; only the tumor pair carries simulated mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenotypeRecord {
    pub patient: PatientId,
    pub tmp_id: LocusId,
    pub period: u32,
    pub ref_len: u32,
    pub allele_a_healthy: u32,
    pub allele_b_healthy: u32,
    pub allele_a_tumor: u32,
    pub allele_b_tumor: u32,
}

impl GenotypeRecord {
    /// Mean tumor genotype: the summary used by the association tester.
    pub fn mean_gt(&self) -> f64 {
        (self.allele_a_tumor as f64 + self.allele_b_tumor as f64) / 2.0
    }
}

/// Flat table of genotype records.
#[derive(Clone, Debug, Default)]
pub struct GenotypeTable {
    pub records: Vec<GenotypeRecord>,
}

impl GenotypeTable {
    /// Distinct patient ids, sorted.
    pub fn patients(&self) -> Vec<PatientId> {
        let mut ids: Vec<PatientId> = self.records.iter().map(|r| r.patient).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Distinct locus ids, sorted.
    pub fn loci(&self) -> Vec<LocusId> {
        let mut ids: Vec<LocusId> = self.records.iter().map(|r| r.tmp_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// (patient, mean tumor genotype) pairs for one locus, sorted by patient.
    /// Empty when the locus does not appear in the table.
    pub fn mean_gt_for_locus(&self, tmp_id: &str) -> Vec<(PatientId, f64)> {
        let mut pairs: Vec<(PatientId, f64)> = self
            .records
            .iter()
            .filter(|r| r.tmp_id == tmp_id)
            .map(|r| (r.patient, r.mean_gt()))
            .collect();
        pairs.sort_by_key(|&(p, _)| p);
        pairs
    }
}

/// One synthetic expression observation.
#[derive(Clone, Debug)]
pub struct ExpressionRecord {
    pub patient: PatientId,
    pub gene: GeneId,
    pub expression: f64,
}

/// Flat table of expression records.
#[derive(Clone, Debug, Default)]
pub struct ExpressionTable {
    pub records: Vec<ExpressionRecord>,
}

impl ExpressionTable {
    /// Distinct gene labels, sorted.
    pub fn genes(&self) -> Vec<GeneId> {
        let mut genes: Vec<GeneId> = self.records.iter().map(|r| r.gene.clone()).collect();
        genes.sort();
        genes.dedup();
        genes
    }

    /// (patient, expression) pairs for one gene, in table order.
    pub fn for_gene(&self, gene: &str) -> Vec<(PatientId, f64)> {
        self.records
            .iter()
            .filter(|r| r.gene == gene)
            .map(|r| (r.patient, r.expression))
            .collect()
    }
}

/// A causal eSTR effect attached to one gene.
///
/// `coefficient` is the fractional expression change per unit deviation of
/// the mean tumor genotype from `ref_gt` at locus `tmp_id`. E.g. with
/// `ref_gt = 12` and `coefficient = 0.2`, a genotype of 13 raises expression
/// by 20% and a genotype of 10 lowers it by 40%.
#[derive(Clone, Debug, PartialEq)]
pub struct EstrEffect {
    pub tmp_id: LocusId,
    pub ref_gt: f64,
    pub coefficient: f64,
}

/// Immutable gene -> eSTR effect mapping, validated at construction.
///
/// Genes absent from the map are effect-free negative controls; lookups for
/// them return `None` rather than raising.
#[derive(Clone, Debug, Default)]
pub struct EstrMap {
    effects: BTreeMap<GeneId, EstrEffect>,
}

impl EstrMap {
    pub fn new(entries: Vec<(GeneId, EstrEffect)>) -> Result<Self> {
        let mut effects = BTreeMap::new();
        for (gene, effect) in entries {
            if effects.insert(gene.clone(), effect).is_some() {
                return Err(anyhow!("Duplicate gene {} in eSTR map", gene));
            }
        }
        Ok(EstrMap { effects })
    }

    pub fn empty() -> Self {
        EstrMap::default()
    }

    pub fn get(&self, gene: &str) -> Option<&EstrEffect> {
        self.effects.get(gene)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GeneId, &EstrEffect)> {
        self.effects.iter()
    }
}

/// Fitted association for one (gene, locus) pair.
///
/// Pairs whose joined genotype column has fewer than 3 distinct values
/// produce no result at all (the variation gate), so a `Vec<AssocResult>`
/// with a pair missing means "nothing to report", not "failure".
#[derive(Clone, Debug)]
pub struct AssocResult {
    pub gene: GeneId,
    pub tmp_id: LocusId,
    pub coefficient: f64,
    pub pvalue_coef: f64,
    pub intercept: f64,
}
