//! End-to-end pipeline checks: locus catalog -> simulated genotypes ->
//! synthetic expression with a known injected eSTR effect -> association
//! testing, through both the library path and the table files.

use estr_core::{EstrEffect, EstrMap, LocusCatalog, StrLocus};
use estr_sim::{simulate_expression, simulate_genotypes, MutationParams};
use tempfile::NamedTempFile;

fn catalog() -> LocusCatalog {
    // L1 drives gene A; L2 is a control locus for the same pseudo-gene B
    let loci = vec![
        StrLocus {
            tmp_id: "chr1_1047113".to_string(),
            chr: "chr1".to_string(),
            start: 1_047_113,
            end: 1_047_143,
            period: 2,
            ref_len: 12,
            gene: Some("A".to_string()),
        },
        StrLocus {
            tmp_id: "chr1_1295260".to_string(),
            chr: "chr1".to_string(),
            start: 1_295_260,
            end: 1_295_285,
            period: 3,
            ref_len: 9,
            gene: Some("B".to_string()),
        },
    ];
    LocusCatalog::new(loci).unwrap()
}

fn effect_map(coefficient: f64) -> EstrMap {
    EstrMap::new(vec![(
        "A".to_string(),
        EstrEffect {
            tmp_id: "chr1_1047113".to_string(),
            ref_gt: 12.0,
            coefficient,
        },
    )])
    .unwrap()
}

fn simulate_cohort(seed: u64, coefficient: f64) -> (estr_core::GenotypeTable, estr_core::ExpressionTable) {
    let catalog = catalog();
    let params = MutationParams {
        n_patients: 200,
        p_mut: 0.8,
        direction_bias: 0.5,
        stepsize: 0.555,
        seed: Some(seed),
    };
    let genotypes = simulate_genotypes(&catalog, &params).unwrap();
    let expression =
        simulate_expression(&genotypes, &catalog, &effect_map(coefficient), Some(seed + 1000))
            .unwrap();
    (genotypes, expression)
}

#[test]
fn injected_effect_is_recovered() {
    let (genotypes, expression) = simulate_cohort(1, 0.3);

    let result = estr_assoc::test_pair("A", "chr1_1047113", &genotypes, &expression)
        .unwrap()
        .expect("variation gate should pass at p_mut = 0.8");

    assert!(
        result.coefficient > 0.0,
        "estimated coefficient {} should match the injected sign",
        result.coefficient
    );
    assert!(
        result.pvalue_coef < 0.05,
        "a strong injected effect should be significant, got p = {}",
        result.pvalue_coef
    );
}

#[test]
fn recovered_sign_is_stable_across_cohorts() {
    let mut matches = 0;
    let n_cohorts = 10;
    for seed in 0..n_cohorts {
        let (genotypes, expression) = simulate_cohort(seed, -0.25);
        let result = estr_assoc::test_pair("A", "chr1_1047113", &genotypes, &expression)
            .unwrap()
            .expect("variation gate should pass");
        if result.coefficient < 0.0 {
            matches += 1;
        }
    }
    assert!(
        matches >= n_cohorts - 1,
        "sign recovered in only {}/{} cohorts",
        matches,
        n_cohorts
    );
}

#[test]
fn permuted_null_flattens_the_effect() {
    let (genotypes, expression) = simulate_cohort(2, 0.3);

    let observed = estr_assoc::test_pair("A", "chr1_1047113", &genotypes, &expression)
        .unwrap()
        .unwrap();
    let permuted = estr_assoc::test_pair_permuted(
        "A",
        "chr1_1047113",
        &genotypes,
        &expression,
        estr_assoc::DEFAULT_PERMUTE_SEED,
    )
    .unwrap()
    .unwrap();

    assert!(permuted.coefficient.abs() < observed.coefficient.abs());
}

#[test]
fn unmutated_locus_is_gated() {
    let catalog = catalog();
    let params = MutationParams {
        n_patients: 50,
        p_mut: 0.0,
        direction_bias: 0.5,
        stepsize: 0.555,
        seed: Some(3),
    };
    let genotypes = simulate_genotypes(&catalog, &params).unwrap();
    let expression =
        simulate_expression(&genotypes, &catalog, &EstrMap::empty(), Some(4)).unwrap();

    // every mean_gt equals the reference: 1 distinct value, no result
    let tasks = estr_assoc::all_pairs(&expression.genes(), &genotypes.loci());
    let results = estr_assoc::test_pairs(&tasks, &genotypes, &expression, None).unwrap();
    assert!(results.is_empty());
}

#[test]
fn tables_survive_the_file_boundary() {
    let (genotypes, expression) = simulate_cohort(5, 0.3);

    let geno_file = NamedTempFile::new().unwrap();
    let expr_file = NamedTempFile::new().unwrap();
    estr_io::write_genotypes(geno_file.path(), &genotypes).unwrap();
    estr_io::write_expression(expr_file.path(), &expression).unwrap();

    let genotypes_loaded = estr_io::load_genotypes(geno_file.path()).unwrap();
    let expression_loaded = estr_io::load_expression(expr_file.path()).unwrap();
    assert_eq!(genotypes_loaded.records, genotypes.records);

    let direct = estr_assoc::test_pair("A", "chr1_1047113", &genotypes, &expression)
        .unwrap()
        .unwrap();
    let via_files =
        estr_assoc::test_pair("A", "chr1_1047113", &genotypes_loaded, &expression_loaded)
            .unwrap()
            .unwrap();

    assert_eq!(direct.gene, via_files.gene);
    assert!((direct.coefficient - via_files.coefficient).abs() < 1e-9);
    assert!((direct.intercept - via_files.intercept).abs() < 1e-6);
}
