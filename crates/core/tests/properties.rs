// Copyright 2025 Irreducible Inc.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tessera_compute::{Buffer, CpuBackend};
use tessera_core::{sparse::merge, DataBuffer, IndexBuffer};
use tessera_test_utils::{
	node::test_generic_resize_views,
	sparse::{dense_sums, sparse_rows},
};

type Sparse = (DataBuffer<CpuBackend>, IndexBuffer<CpuBackend>);

/// Random sparse rows with small integer values, so that sums are exact in any order.
fn random_sparse(rng: &mut StdRng, rows: usize, width: usize, n_ids: u32) -> Sparse {
	let ids = (0..rows).map(|_| rng.gen_range(0..n_ids)).collect::<Vec<_>>();
	let values = (0..rows)
		.map(|_| {
			(0..width)
				.map(|_| rng.gen_range(-8i8..8) as f32)
				.collect::<Vec<_>>()
		})
		.collect::<Vec<_>>();
	sparse_rows(&CpuBackend, &ids, &values, width)
}

fn merged((left_data, left_index): &Sparse, (right_data, right_index): &Sparse) -> Sparse {
	let mut data = Buffer::new(CpuBackend);
	let mut index = Buffer::new(CpuBackend);
	merge(left_data, left_index, right_data, right_index, &mut data, &mut index).unwrap();
	(data, index)
}

fn combined(
	left: BTreeMap<u32, Vec<f32>>,
	right: BTreeMap<u32, Vec<f32>>,
) -> BTreeMap<u32, Vec<f32>> {
	let mut sums = left;
	for (id, row) in right {
		match sums.get_mut(&id) {
			Some(acc) => acc.iter_mut().zip(&row).for_each(|(a, x)| *a += x),
			None => {
				sums.insert(id, row);
			}
		}
	}
	sums
}

proptest! {
	#[test]
	fn test_views_cover_any_shape(
		d0 in 1..5usize, d1 in 1..5usize, d2 in 1..5usize, d3 in 1..5usize
	) {
		test_generic_resize_views(CpuBackend, [d0, d1, d2, d3]);
	}

	#[test]
	fn test_merge_sums_every_contribution(
		left_rows in 0..12usize,
		right_rows in 0..12usize,
		width in 1..5usize,
		n_ids in 1..8u32,
		seed in any::<u64>()
	) {
		let mut rng = StdRng::seed_from_u64(seed);
		let left = random_sparse(&mut rng, left_rows, width, n_ids);
		let right = random_sparse(&mut rng, right_rows, width, n_ids);

		let (data, index) = merged(&left, &right);

		let ids = index.as_slice();
		prop_assert_eq!(ids.iter().unique().count(), ids.len());
		prop_assert_eq!(data.dim(0), ids.len());
		let distinct = left.1.as_slice().iter().chain(right.1.as_slice()).collect::<HashSet<_>>();
		prop_assert_eq!(ids.len(), distinct.len());
		if !ids.is_empty() {
			prop_assert_eq!(data.shape(), [ids.len(), width, 1, 1]);
		}

		let expected = combined(dense_sums(&left.0, &left.1), dense_sums(&right.0, &right.1));
		prop_assert_eq!(dense_sums(&data, &index), expected);
	}

	#[test]
	fn test_merge_is_commutative_up_to_order(
		left_rows in 0..10usize,
		right_rows in 0..10usize,
		width in 1..4usize,
		seed in any::<u64>()
	) {
		let mut rng = StdRng::seed_from_u64(seed);
		let left = random_sparse(&mut rng, left_rows, width, 6);
		let right = random_sparse(&mut rng, right_rows, width, 6);

		let (lr_data, lr_index) = merged(&left, &right);
		let (rl_data, rl_index) = merged(&right, &left);
		prop_assert_eq!(dense_sums(&lr_data, &lr_index), dense_sums(&rl_data, &rl_index));
	}

	#[test]
	fn test_merge_with_empty_deduplicates(
		rows in 1..12usize,
		width in 1..4usize,
		seed in any::<u64>()
	) {
		let mut rng = StdRng::seed_from_u64(seed);
		let left = random_sparse(&mut rng, rows, width, 5);
		let empty = (Buffer::new(CpuBackend), Buffer::new(CpuBackend));

		let (data, index) = merged(&left, &empty);

		let first_seen = left.1.as_slice().iter().copied().unique().collect::<Vec<_>>();
		prop_assert_eq!(index.as_slice(), first_seen.as_slice());
		prop_assert_eq!(dense_sums(&data, &index), dense_sums(&left.0, &left.1));
	}
}
