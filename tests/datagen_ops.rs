//! Integration tests for the random generation engine.

use blockmat::prelude::*;

fn cells(blk: &MatrixBlock) -> Vec<f64> {
    (0..blk.rows())
        .flat_map(|r| (0..blk.cols()).map(move |c| (r, c)))
        .map(|(r, c)| blk.quick_get(r, c))
        .collect()
}

#[test]
fn test_determinism_across_parallelism_degrees() {
    // 4x4 tiling forces 16 tiles; the partitioning differs per k
    let rgen =
        RandomMatrixGenerator::from_pdf("uniform", 128, 128, 32, 32, 0.2, 0.0, 10.0, None)
            .unwrap();

    let mut reference = MatrixBlock::new();
    generate_random_matrix(&mut reference, &rgen, Some(4242), 1).unwrap();
    let ref_cells = cells(&reference);

    for k in [2, 4] {
        let mut out = MatrixBlock::new();
        generate_random_matrix(&mut out, &rgen, Some(4242), k).unwrap();
        assert_eq!(cells(&out), ref_cells, "parallelism degree {k}");
        assert_eq!(out.non_zeros(), reference.non_zeros());
    }
}

#[test]
fn test_determinism_across_runs_same_seed() {
    for pdf in ["uniform", "normal"] {
        let rgen =
            RandomMatrixGenerator::from_pdf(pdf, 60, 60, 20, 20, 0.5, -1.0, 1.0, None).unwrap();
        let mut a = MatrixBlock::new();
        let mut b = MatrixBlock::new();
        generate_random_matrix(&mut a, &rgen, Some(99), 2).unwrap();
        generate_random_matrix(&mut b, &rgen, Some(99), 2).unwrap();
        assert_eq!(cells(&a), cells(&b), "pdf {pdf}");
    }
}

#[test]
fn test_all_zero_shortcut_is_pure_metadata() {
    let rgen =
        RandomMatrixGenerator::from_pdf("uniform", 4, 4, 2, 2, 1.0, 0.0, 0.0, None).unwrap();
    assert!(rgen.is_shortcut_output());

    let mut out = MatrixBlock::new();
    generate_random_matrix(&mut out, &rgen, Some(1), 1).unwrap();
    assert_eq!(out.non_zeros(), 0);
    // no payload was ever allocated, so no generator was consulted
    assert!(!out.is_allocated());
    assert!(cells(&out).iter().all(|&v| v == 0.0));

    // if any stream were drawn from, the output would depend on the seed
    // and the parallelism degree; it does not
    let mut other = MatrixBlock::new();
    generate_random_matrix(&mut other, &rgen, Some(999), 4).unwrap();
    assert!(!other.is_allocated());
    assert_eq!(cells(&other), cells(&out));
    assert_eq!(other.non_zeros(), 0);
}

#[test]
fn test_sparsity_targeting_1000x1000() {
    let target = 0.1;
    let rgen = RandomMatrixGenerator::from_pdf(
        "uniform", 1000, 1000, 200, 200, target, 0.0, 1.0, None,
    )
    .unwrap();
    let mut out = MatrixBlock::new();
    generate_random_matrix(&mut out, &rgen, Some(8), 4).unwrap();

    let expected = (1000.0 * 1000.0 * target) as f64;
    let realized = out.non_zeros() as f64;
    // Bernoulli realization around the expectation, ~5 sigma
    assert!(
        (realized - expected).abs() < 1_500.0,
        "realized nnz {realized} vs expected {expected}"
    );
}

#[test]
fn test_ultra_sparse_generation_hits_exact_total() {
    // fewer expected non-zeros than tiles: quota partitioning must still
    // sum to the exact target
    let rgen = RandomMatrixGenerator::from_pdf(
        "uniform", 400, 400, 50, 50, 0.00005, 1.0, 2.0, None,
    )
    .unwrap();
    let quotas = compute_nnz_per_block(&rgen, 3).unwrap();
    assert_eq!(quotas.len(), 64);
    assert_eq!(quotas.iter().sum::<u64>(), 8);
}

#[test]
fn test_sequence_scenarios() {
    let mut out = MatrixBlock::new();
    generate_sequence(&mut out, 0.0, 1.0, 0.5).unwrap();
    assert_eq!(out.rows(), 3);
    assert_eq!(out.cols(), 1);
    assert_eq!(cells(&out), vec![0.0, 0.5, 1.0]);
    assert_eq!(out.layout(), BlockLayout::Dense);

    generate_sequence(&mut out, 0.0, 1.0, 0.6).unwrap();
    assert_eq!(cells(&out), vec![0.0, 0.6]);
}

#[test]
fn test_sample_scenario() {
    let mut out = MatrixBlock::new();
    generate_sample(&mut out, 10, 3, false, Some(42)).unwrap();
    assert_eq!(out.rows(), 3);
    assert_eq!(out.cols(), 1);

    let vals = cells(&out);
    let mut distinct = vals.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
    for v in vals {
        assert!(v >= 1.0 && v <= 10.0);
        assert_eq!(v, v.trunc());
    }

    // same seed, same sample
    let mut again = MatrixBlock::new();
    generate_sample(&mut again, 10, 3, false, Some(42)).unwrap();
    assert_eq!(cells(&out), cells(&again));
}

#[test]
fn test_poisson_generation() {
    let rgen =
        RandomMatrixGenerator::from_pdf("poisson", 40, 40, 20, 20, 1.0, 0.0, 1.0, Some("3.0"))
            .unwrap();
    let mut out = MatrixBlock::new();
    generate_random_matrix(&mut out, &rgen, Some(17), 1).unwrap();

    let vals = cells(&out);
    for &v in &vals {
        assert!(v >= 0.0);
        assert_eq!(v, v.trunc());
    }
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    assert!((mean - 3.0).abs() < 0.3, "sample mean {mean}");
}

#[test]
fn test_configuration_errors_fail_fast() {
    assert!(RandomMatrixGenerator::from_pdf("weibull", 4, 4, 2, 2, 1.0, 0.0, 1.0, None).is_err());
    assert!(
        RandomMatrixGenerator::from_pdf("poisson", 4, 4, 2, 2, 1.0, 0.0, 1.0, Some("nope"))
            .is_err()
    );
    assert!(RandomMatrixGenerator::from_pdf("uniform", 4, 4, 0, 2, 1.0, 0.0, 1.0, None).is_err());
}

#[test]
fn test_generated_representation_follows_cost_model() {
    // dense regime
    let rgen =
        RandomMatrixGenerator::from_pdf("uniform", 100, 100, 50, 50, 0.9, 0.0, 1.0, None).unwrap();
    let mut dense = MatrixBlock::new();
    generate_random_matrix(&mut dense, &rgen, Some(5), 1).unwrap();
    assert_eq!(dense.layout(), BlockLayout::Dense);

    // sparse regime
    let rgen = RandomMatrixGenerator::from_pdf(
        "uniform", 1000, 1000, 250, 250, 0.01, 0.0, 1.0, None,
    )
    .unwrap();
    let mut sparse = MatrixBlock::new();
    generate_random_matrix(&mut sparse, &rgen, Some(5), 1).unwrap();
    assert_eq!(sparse.layout(), BlockLayout::Sparse);
}
