//! Round-trip tests across all on-disk encodings and boundary shapes.

use blockmat::prelude::*;

fn round_trip(blk: &MatrixBlock) -> MatrixBlock {
    let mut bytes = Vec::new();
    blk.write_to(&mut bytes).unwrap();
    assert_eq!(bytes.len() as u64, blk.exact_size_on_disk());
    MatrixBlock::read_from(&mut bytes.as_slice()).unwrap()
}

fn assert_logical_eq(a: &MatrixBlock, b: &MatrixBlock) {
    assert_eq!((a.rows(), a.cols()), (b.rows(), b.cols()));
    for r in 0..a.rows() {
        for c in 0..a.cols() {
            assert_eq!(a.quick_get(r, c), b.quick_get(r, c), "cell ({r},{c})");
        }
    }
}

fn written_tag(blk: &MatrixBlock) -> u8 {
    let mut bytes = Vec::new();
    blk.write_to(&mut bytes).unwrap();
    bytes[8]
}

#[test]
fn test_round_trip_every_encoding() {
    // empty
    let empty = MatrixBlock::with_shape(10, 10, BlockLayout::Sparse);
    assert_eq!(written_tag(&empty), BlockType::Empty as u8);
    let back = round_trip(&empty);
    assert_eq!(back.non_zeros(), 0);
    assert_logical_eq(&empty, &back);

    // dense
    let mut dense = MatrixBlock::with_shape(6, 6, BlockLayout::Dense);
    for r in 0..6 {
        for c in 0..6 {
            dense.set(r, c, (r * 6 + c) as f64 - 17.0).unwrap();
        }
    }
    assert_eq!(written_tag(&dense), BlockType::Dense as u8);
    let back = round_trip(&dense);
    assert_logical_eq(&dense, &back);
    assert_eq!(back.non_zeros(), dense.non_zeros());

    // sparse
    let mut sparse = MatrixBlock::with_shape(300, 300, BlockLayout::Sparse);
    for i in 0..300 {
        sparse.set(i, (i * 13) % 300, i as f64 + 0.25).unwrap();
    }
    assert_eq!(written_tag(&sparse), BlockType::Sparse as u8);
    let back = round_trip(&sparse);
    assert_logical_eq(&sparse, &back);
    assert_eq!(back.non_zeros(), sparse.non_zeros());

    // ultra-sparse
    let mut ultra = MatrixBlock::with_shape(2000, 2000, BlockLayout::Sparse);
    for i in 0..20 {
        ultra.set(i * 97, i * 89, (i + 1) as f64 * 0.5).unwrap();
    }
    assert_eq!(written_tag(&ultra), BlockType::UltraSparse as u8);
    let back = round_trip(&ultra);
    assert_logical_eq(&ultra, &back);
    assert_eq!(back.non_zeros(), 20);
}

#[test]
fn test_round_trip_boundary_shapes() {
    for (rows, cols) in [(1, 1), (1, 64), (64, 1)] {
        for layout in [BlockLayout::Dense, BlockLayout::Sparse] {
            let mut blk = MatrixBlock::with_shape(rows, cols, layout);
            blk.set(0, 0, 3.25).unwrap();
            blk.set(rows - 1, cols - 1, -7.5).unwrap();
            let back = round_trip(&blk);
            assert_logical_eq(&blk, &back);
            assert_eq!(back.non_zeros(), blk.non_zeros());
        }
    }
}

#[test]
fn test_round_trip_generated_matrices() {
    // serialization composed with generation, across density regimes
    for sparsity in [0.001, 0.05, 0.9] {
        let rgen = RandomMatrixGenerator::from_pdf(
            "uniform", 400, 300, 100, 100, sparsity, -1.0, 1.0, None,
        )
        .unwrap();
        let mut blk = MatrixBlock::new();
        generate_random_matrix(&mut blk, &rgen, Some(31), 1).unwrap();
        let back = round_trip(&blk);
        assert_logical_eq(&blk, &back);
        assert_eq!(back.non_zeros(), blk.non_zeros());
    }
}

#[test]
fn test_layout_may_differ_after_round_trip() {
    // disk and memory cost models disagree for this shape: the values
    // survive even when the representation does not
    let mut blk = MatrixBlock::with_shape(1, 17, BlockLayout::Sparse);
    blk.set(0, 7, 1.0).unwrap();
    blk.set(0, 12, 2.0).unwrap();
    let back = round_trip(&blk);
    assert_logical_eq(&blk, &back);
    assert_eq!(back.layout(), BlockLayout::Dense);
}
