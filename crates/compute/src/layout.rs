// Copyright 2025 Irreducible Inc.

//! Lower-rank reinterpretations of a rank-4 shape `(d0, d1, d2, d3)`.
//!
//! Every layout covers exactly the same number of elements as the source shape, so a view built
//! from it addresses the original storage in row-major order without copying.

use tessera_utils::checked_arithmetics::checked_product;

/// `(d0 * d1 * d2 * d3)`
pub fn flat(shape: [usize; 4]) -> [usize; 1] {
	[checked_product(&shape)]
}

/// `(d0, d1 * d2 * d3)`: one row per leading index.
pub fn rows(shape: [usize; 4]) -> [usize; 2] {
	[shape[0], checked_product(&shape[1..])]
}

/// `(d0 * d1 * d2, d3)`: the trailing axis becomes the columns.
pub fn rows_reverse(shape: [usize; 4]) -> [usize; 2] {
	[checked_product(&shape[..3]), shape[3]]
}

/// `(d0, d1, d2 * d3)`
pub fn tail(shape: [usize; 4]) -> [usize; 3] {
	[shape[0], shape[1], checked_product(&shape[2..])]
}
