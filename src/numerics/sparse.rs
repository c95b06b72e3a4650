//! Jacobian storage. Assembly produces kryst CSR matrices directly.

use nalgebra::DMatrix;

pub type CsrMatrix = kryst::matrix::sparse::CsrMatrix<f64>;

/// Build a square CSR matrix from unsorted (row, col, value) triplets.
/// Duplicate entries are summed and columns end up sorted within each row.
pub fn csr_from_triplets(n: usize, triplets: &mut [(usize, usize, f64)]) -> CsrMatrix {
    triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));

    let mut indptr = vec![0; n + 1];
    let mut indices = Vec::with_capacity(triplets.len());
    let mut data = Vec::with_capacity(triplets.len());
    let mut last: Option<(usize, usize)> = None;

    for &(r, c, v) in triplets.iter() {
        if last == Some((r, c)) {
            if let Some(acc) = data.last_mut() {
                *acc += v;
            }
            continue;
        }
        indices.push(c);
        data.push(v);
        indptr[r + 1] += 1;
        last = Some((r, c));
    }
    for i in 0..n {
        indptr[i + 1] += indptr[i];
    }
    CsrMatrix::from_csr(n, n, indptr, indices, data)
}

/// Stored entries of row `r` as (column, value) pairs.
pub fn row_entries(a: &CsrMatrix, r: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
    let (cols, vals) = a.row(r);
    cols.iter().copied().zip(vals.iter().copied())
}

/// Entry `(r, c)`, zero when not stored.
pub fn entry(a: &CsrMatrix, r: usize, c: usize) -> f64 {
    let (cols, vals) = a.row(r);
    cols.binary_search(&c).map_or(0.0, |k| vals[k])
}

pub fn to_dense(a: &CsrMatrix) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(a.nrows(), a.ncols());
    for r in 0..a.nrows() {
        for (c, v) in row_entries(a, r) {
            m[(r, c)] = v;
        }
    }
    m
}
