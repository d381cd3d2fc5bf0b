// Copyright 2025 Irreducible Inc.

use std::collections::BTreeMap;

use tessera_compute::{Buffer, ComputeBackend};
use tessera_core::{DataBuffer, IndexBuffer};

/// Builds a sparse gradient of shape `(ids.len(), width, 1, 1)` from row vectors.
pub fn sparse_rows<B: ComputeBackend>(
	backend: &B,
	ids: &[u32],
	rows: &[Vec<f32>],
	width: usize,
) -> (DataBuffer<B>, IndexBuffer<B>) {
	assert_eq!(ids.len(), rows.len());
	let mut data = Buffer::new(backend.clone());
	data.resize([rows.len(), width, 1, 1], true).unwrap();
	for (dst, src) in data.as_mut_slice().chunks_mut(width.max(1)).zip(rows) {
		dst.copy_from_slice(src);
	}
	let mut index = Buffer::new(backend.clone());
	index.resize([ids.len()], true).unwrap();
	index.as_mut_slice().copy_from_slice(ids);
	(data, index)
}

/// Sums rows by external index into an ordered map; the order-independent content of a sparse
/// gradient.
pub fn dense_sums<B: ComputeBackend>(
	data: &DataBuffer<B>,
	index: &IndexBuffer<B>,
) -> BTreeMap<u32, Vec<f32>> {
	let mut sums = BTreeMap::<u32, Vec<f32>>::new();
	let [rows, width, _, _] = data.shape();
	if rows == 0 {
		return sums;
	}
	let view = data.view([rows, width]);
	for (row, &id) in index.as_slice().iter().enumerate() {
		let entry = sums.entry(id).or_insert_with(|| vec![0.0; width]);
		for (acc, x) in entry.iter_mut().zip(view.row(row)) {
			*acc += x;
		}
	}
	sums
}
