// Copyright 2025 Irreducible Inc.

//! Merging of sparse gradients.
//!
//! A sparse gradient is a rank-4 buffer of shape `(rows, width, 1, 1)` together with an index
//! buffer of `rows` entries naming, for each row, the parameter row it contributes to. The same
//! external index may occur several times. Merging two such gradients yields one in which every
//! external index occurs once and carries the sum of all rows that named it.

use std::collections::HashMap;

use tessera_compute::{Buffer, ComputeBackend};
use tracing::instrument;

use crate::{DataBuffer, Error, IndexBuffer};

/// Assignment of compact positions to external indices, in first-seen order.
#[derive(Debug, Default)]
pub struct CompactIndex {
	positions: HashMap<u32, usize>,
	externals: Vec<u32>,
}

impl CompactIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the position of `external`, assigning the next free one if it is new.
	pub fn insert(&mut self, external: u32) -> usize {
		if let Some(&position) = self.positions.get(&external) {
			return position;
		}
		let position = self.externals.len();
		self.externals.push(external);
		self.positions.insert(external, position);
		position
	}

	pub fn position(&self, external: u32) -> Option<usize> {
		self.positions.get(&external).copied()
	}

	pub fn len(&self) -> usize {
		self.externals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.externals.is_empty()
	}

	/// External indices ordered by compact position.
	pub fn externals(&self) -> &[u32] {
		&self.externals
	}
}

struct SparseRows<'a> {
	rows: &'a [f32],
	ids: &'a [u32],
	width: Option<usize>,
}

impl<'a> SparseRows<'a> {
	fn new<B: ComputeBackend>(side: &str, data: &'a DataBuffer<B>, index: &'a IndexBuffer<B>) -> Self {
		let [rows, width, d2, d3] = data.shape();
		if rows == 0 {
			return Self {
				rows: &[],
				ids: &[],
				width: None,
			};
		}
		assert!(
			d2 == 1 && d3 == 1,
			"sparse merge: {side} rows must be flat feature vectors, got shape {:?}",
			data.shape()
		);
		assert_eq!(
			index.len(),
			rows,
			"sparse merge: {side} index has {} entries for {rows} rows",
			index.len()
		);
		Self {
			rows: data.as_slice(),
			ids: index.as_slice(),
			width: Some(width),
		}
	}
}

/// Merges two sparse gradients into `merged_data` and `merged_index`.
///
/// Compact positions are assigned by scanning the left index list and then the right one, so the
/// output order is reproducible; the summed values do not depend on it. An input without rows
/// places no constraint on the geometry of the other.
///
/// ## Preconditions
///
/// * inputs with rows must have shape `(rows, width, 1, 1)` and an index of `rows` entries;
/// * if both inputs have rows, their widths must agree.
#[instrument(skip_all, level = "debug")]
pub fn merge<B: ComputeBackend>(
	left_data: &DataBuffer<B>,
	left_index: &IndexBuffer<B>,
	right_data: &DataBuffer<B>,
	right_index: &IndexBuffer<B>,
	merged_data: &mut DataBuffer<B>,
	merged_index: &mut IndexBuffer<B>,
) -> Result<(), Error> {
	let left = SparseRows::new("left", left_data, left_index);
	let right = SparseRows::new("right", right_data, right_index);

	let width = match (left.width, right.width) {
		(Some(left_width), Some(right_width)) => {
			assert_eq!(
				left_width, right_width,
				"sparse merge: feature widths differ ({left_width} vs {right_width})"
			);
			left_width
		}
		(Some(width), None) | (None, Some(width)) => width,
		(None, None) => 0,
	};

	let mut compact = CompactIndex::new();
	for &id in left.ids.iter().chain(right.ids) {
		compact.insert(id);
	}
	let merged_rows = compact.len();

	merged_data.resize([merged_rows, width, 1, 1], true)?;
	merged_index.resize([merged_rows], true)?;
	merged_index
		.as_mut_slice()
		.copy_from_slice(compact.externals());

	let backend = merged_data.backend().clone();
	let mut out = merged_data.view_mut([merged_rows, width]);
	for side in [&left, &right] {
		for (row, &id) in side.ids.iter().enumerate() {
			let position = compact
				.position(id)
				.expect("every external index was assigned a position");
			backend.add_assign(out.row_mut(position), &side.rows[row * width..(row + 1) * width]);
		}
	}

	tracing::debug!(
		left_rows = left.ids.len(),
		right_rows = right.ids.len(),
		merged_rows,
		width,
		"merged sparse rows"
	);
	Ok(())
}

/// Merges the right sparse gradient into the left one, replacing the left data and index with
/// the merged result. The right input is left untouched.
pub fn merge_into_left<B: ComputeBackend>(
	left_data: &mut DataBuffer<B>,
	left_index: &mut IndexBuffer<B>,
	right_data: &DataBuffer<B>,
	right_index: &IndexBuffer<B>,
) -> Result<(), Error> {
	let backend = left_data.backend().clone();
	let mut merged_data = Buffer::new(backend.clone());
	let mut merged_index = Buffer::new(backend);
	merge(left_data, left_index, right_data, right_index, &mut merged_data, &mut merged_index)?;
	left_data.adopt(merged_data);
	left_index.adopt(merged_index);
	Ok(())
}

#[cfg(test)]
mod tests {
	use tessera_compute::CpuBackend;

	use super::*;

	fn sparse(ids: &[u32], rows: &[[f32; 2]]) -> (DataBuffer<CpuBackend>, IndexBuffer<CpuBackend>) {
		let mut data = Buffer::new(CpuBackend);
		data.resize([rows.len(), 2, 1, 1], false).unwrap();
		data.as_mut_slice().copy_from_slice(rows.concat().as_slice());
		let mut index = Buffer::new(CpuBackend);
		index.resize([ids.len()], false).unwrap();
		index.as_mut_slice().copy_from_slice(ids);
		(data, index)
	}

	#[test]
	fn test_compact_index_first_seen_order() {
		let mut compact = CompactIndex::new();
		assert_eq!(compact.insert(7), 0);
		assert_eq!(compact.insert(3), 1);
		assert_eq!(compact.insert(7), 0);
		assert_eq!(compact.externals(), &[7, 3]);
		assert_eq!(compact.position(3), Some(1));
		assert_eq!(compact.position(9), None);
	}

	#[test]
	fn test_merge_sums_duplicates() {
		let (l_data, l_index) = sparse(&[3, 7, 3], &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
		let (r_data, r_index) = sparse(&[7, 9], &[[10.0, 20.0], [30.0, 40.0]]);

		let mut data = Buffer::new(CpuBackend);
		let mut index = Buffer::new(CpuBackend);
		merge(&l_data, &l_index, &r_data, &r_index, &mut data, &mut index).unwrap();

		assert_eq!(data.shape(), [3, 2, 1, 1]);
		assert_eq!(index.as_slice(), &[3, 7, 9]);
		assert_eq!(data.as_slice(), &[6.0, 8.0, 13.0, 24.0, 30.0, 40.0]);
	}

	#[test]
	fn test_merge_into_left_leaves_right_untouched() {
		let (mut l_data, mut l_index) = sparse(&[1], &[[1.0, 1.0]]);
		let (r_data, r_index) = sparse(&[2, 1], &[[2.0, 2.0], [4.0, 4.0]]);

		merge_into_left(&mut l_data, &mut l_index, &r_data, &r_index).unwrap();

		assert_eq!(l_index.as_slice(), &[1, 2]);
		assert_eq!(l_data.as_slice(), &[5.0, 5.0, 2.0, 2.0]);
		assert_eq!(r_index.as_slice(), &[2, 1]);
		assert_eq!(r_data.as_slice(), &[2.0, 2.0, 4.0, 4.0]);
	}

	#[test]
	fn test_merge_with_unallocated_input() {
		let (l_data, l_index) = sparse(&[4, 4], &[[1.0, 0.5], [1.0, 0.5]]);
		let r_data = Buffer::new(CpuBackend);
		let r_index = Buffer::new(CpuBackend);

		let mut data = Buffer::new(CpuBackend);
		let mut index = Buffer::new(CpuBackend);
		merge(&r_data, &r_index, &l_data, &l_index, &mut data, &mut index).unwrap();

		assert_eq!(index.as_slice(), &[4]);
		assert_eq!(data.as_slice(), &[2.0, 1.0]);
	}

	#[test]
	fn test_merge_of_two_empty_inputs() {
		let empty_data = Buffer::<f32, 4, _>::new(CpuBackend);
		let empty_index = Buffer::<u32, 1, _>::new(CpuBackend);
		let mut data = Buffer::new(CpuBackend);
		let mut index = Buffer::new(CpuBackend);
		merge(&empty_data, &empty_index, &empty_data, &empty_index, &mut data, &mut index).unwrap();
		assert_eq!(data.shape(), [0, 0, 1, 1]);
		assert!(index.as_slice().is_empty());
	}

	#[test]
	#[should_panic(expected = "flat feature vectors")]
	fn test_merge_rejects_non_flat_rows() {
		let mut l_data = Buffer::new(CpuBackend);
		l_data.resize([1, 2, 2, 1], true).unwrap();
		let mut l_index = Buffer::new(CpuBackend);
		l_index.resize([1], true).unwrap();
		let (r_data, r_index) = sparse(&[0], &[[0.0, 0.0]]);

		let mut data = Buffer::new(CpuBackend);
		let mut index = Buffer::new(CpuBackend);
		let _ = merge(&l_data, &l_index, &r_data, &r_index, &mut data, &mut index);
	}

	#[test]
	#[should_panic(expected = "feature widths differ")]
	fn test_merge_rejects_width_mismatch() {
		let (l_data, l_index) = sparse(&[0], &[[0.0, 0.0]]);
		let mut r_data = Buffer::new(CpuBackend);
		r_data.resize([1, 3, 1, 1], true).unwrap();
		let mut r_index = Buffer::new(CpuBackend);
		r_index.resize([1], true).unwrap();

		let mut data = Buffer::new(CpuBackend);
		let mut index = Buffer::new(CpuBackend);
		let _ = merge(&l_data, &l_index, &r_data, &r_index, &mut data, &mut index);
	}
}
