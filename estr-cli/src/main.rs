use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Instant;

use estr_sim::mutate::{DEFAULT_DIRECTION_BIAS, DEFAULT_STEPSIZE};

/// estr: simulate STR genotypes and gene expression with known causal eSTR
/// effects, and test whether an association pass recovers them
#[derive(Parser)]
#[command(
    name = "estr",
    version,
    about = "estr: synthetic eSTR benchmark data and association testing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter raw STR regions into a locus catalog, optionally binned into pseudo-genes
    FilterRegions {
        /// Raw STR region table with neighbour/segdup annotations
        #[arg(long)]
        regions: String,

        /// Keep at most this many loci after filtering
        #[arg(long)]
        n_regions: Option<usize>,

        /// Partition kept loci into this many pseudo-genes (A, B, ...)
        #[arg(long)]
        n_genes: Option<usize>,

        /// Output locus catalog CSV
        #[arg(long)]
        out: String,
    },

    /// Simulate per-patient tumor STR genotypes over a locus catalog
    SimulateGenotypes {
        /// Locus catalog CSV (tmp_id, chr, start, end, period, ref[, gene])
        #[arg(long)]
        regions: String,

        /// Number of patients to simulate
        #[arg(long)]
        n_patients: u32,

        /// Per-allele mutation probability (0.0142 for MSS, 0.0518 for MSI)
        #[arg(long)]
        p_mut: f64,

        /// Probability that a mutation is a deletion
        #[arg(long, default_value_t = DEFAULT_DIRECTION_BIAS)]
        direction_bias: f64,

        /// Success probability of the geometric step-size draw
        #[arg(long, default_value_t = DEFAULT_STEPSIZE)]
        stepsize: f64,

        /// Random seed (omit for a fresh stream)
        #[arg(long)]
        seed: Option<u64>,

        /// Output genotype table CSV
        #[arg(long)]
        out: String,
    },

    /// Simulate per-patient gene expression with injected eSTR effects
    SimulateExpression {
        /// Locus catalog CSV carrying gene labels
        #[arg(long)]
        regions: String,

        /// Simulated genotype table CSV
        #[arg(long)]
        genotypes: String,

        /// eSTR effect map CSV (gene, tmp_id, ref_gt, coefficient); omit for
        /// an effect-free cohort
        #[arg(long)]
        estr_map: Option<String>,

        /// Random seed (omit for a fresh stream)
        #[arg(long)]
        seed: Option<u64>,

        /// Output expression table CSV
        #[arg(long)]
        out: String,
    },

    /// Test every (gene, locus) pair for genotype-expression association
    Associate {
        /// Genotype table CSV
        #[arg(long)]
        genotypes: String,

        /// Expression table CSV
        #[arg(long)]
        expression: String,

        /// Shuffle genotypes across patients before fitting (null draw)
        #[arg(long, default_value_t = false)]
        permute: bool,

        /// Seed for the permutation shuffle
        #[arg(long, default_value_t = estr_assoc::DEFAULT_PERMUTE_SEED)]
        permute_seed: u64,

        /// Output association results CSV
        #[arg(long)]
        out: String,
    },

    /// Concatenate two cohorts, relabeling the second cohort's patients
    Merge {
        /// First cohort table (genotypes or expression)
        #[arg(long)]
        cohort_a: String,

        /// Second cohort table with the same columns
        #[arg(long)]
        cohort_b: String,

        /// Cohort label for the first table
        #[arg(long, default_value = "MSS")]
        label_a: String,

        /// Cohort label for the second table
        #[arg(long, default_value = "MSI")]
        label_b: String,

        /// Output merged CSV
        #[arg(long)]
        out: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::FilterRegions {
            regions,
            n_regions,
            n_genes,
            out,
        } => {
            let opts = estr_io::regions::RegionFilterOptions { n_regions, n_genes };
            let catalog = estr_io::regions::filter_regions(&regions, &opts)?;
            estr_io::write_locus_catalog(&out, &catalog)?;
            eprintln!("Kept {} loci -> {}", catalog.len(), out);
        }

        Commands::SimulateGenotypes {
            regions,
            n_patients,
            p_mut,
            direction_bias,
            stepsize,
            seed,
            out,
        } => {
            let start = Instant::now();
            let catalog = estr_io::load_locus_catalog(&regions)?;
            let params = estr_sim::MutationParams {
                n_patients,
                p_mut,
                direction_bias,
                stepsize,
                seed,
            };
            let table = estr_sim::simulate_genotypes(&catalog, &params)?;
            estr_io::write_genotypes(&out, &table)?;
            eprintln!(
                "Simulated {} genotype records ({} patients x {} loci) in {:.2?}",
                table.records.len(),
                n_patients,
                catalog.len(),
                start.elapsed()
            );
        }

        Commands::SimulateExpression {
            regions,
            genotypes,
            estr_map,
            seed,
            out,
        } => {
            let start = Instant::now();
            let catalog = estr_io::load_locus_catalog(&regions)?;
            let genotypes = estr_io::load_genotypes(&genotypes)?;
            let map = match estr_map {
                Some(path) => estr_io::load_estr_map(&path)?,
                None => estr_core::EstrMap::empty(),
            };
            let table = estr_sim::simulate_expression(&genotypes, &catalog, &map, seed)?;
            estr_io::write_expression(&out, &table)?;
            eprintln!(
                "Simulated {} expression records ({} mapped eSTRs) in {:.2?}",
                table.records.len(),
                map.len(),
                start.elapsed()
            );
        }

        Commands::Associate {
            genotypes,
            expression,
            permute,
            permute_seed,
            out,
        } => {
            let start = Instant::now();
            let genotypes = estr_io::load_genotypes(&genotypes)?;
            let expression = estr_io::load_expression(&expression)?;

            let tasks = estr_assoc::all_pairs(&expression.genes(), &genotypes.loci());
            let seed = permute.then_some(permute_seed);
            let results = estr_assoc::test_pairs(&tasks, &genotypes, &expression, seed)?;
            estr_io::write_assoc_results(&out, &results)?;
            eprintln!(
                "Tested {} (gene, locus) pairs, {} passed the variation gate in {:.2?}",
                tasks.len(),
                results.len(),
                start.elapsed()
            );
        }

        Commands::Merge {
            cohort_a,
            cohort_b,
            label_a,
            label_b,
            out,
        } => {
            estr_io::merge::merge_cohorts(&cohort_a, &cohort_b, &label_a, &label_b, &out)?;
            eprintln!("Merged {} + {} -> {}", cohort_a, cohort_b, out);
        }
    }

    Ok(())
}
