// Copyright 2025 Irreducible Inc.

use itertools::iproduct;
use tessera_compute::ComputeBackend;
use tessera_core::{Error, Node, NodeState, Ownership};

use crate::{
	collaborators::{ConstantInitializer, FailingInitializer, SgdUpdater},
	sparse::{dense_sums, sparse_rows},
};

/// Every view of data and gradient covers the resized shape.
pub fn test_generic_resize_views<B: ComputeBackend>(backend: B, shape: [usize; 4]) {
	let [d0, d1, d2, d3] = shape;
	let mut node = Node::new(backend, true);
	node.resize(shape, false).unwrap();

	assert_eq!(node.data_rank1().len(), d0 * d1 * d2 * d3);
	assert_eq!(node.data_rank2().rows(), d0);
	assert_eq!(node.data_rank2().cols(), d1 * d2 * d3);
	assert_eq!(node.data_rank2_reverse().rows(), d0 * d1 * d2);
	assert_eq!(node.data_rank2_reverse().cols(), d3);
	assert_eq!(node.data_rank3().shape(), [d0, d1, d2 * d3]);

	assert_eq!(node.gradient_rank1().len(), d0 * d1 * d2 * d3);
	assert_eq!(node.gradient_rank2().shape(), [d0, d1 * d2 * d3]);
	assert_eq!(node.gradient_rank2_reverse().shape(), [d0 * d1 * d2, d3]);
	assert_eq!(node.gradient_rank3().shape(), [d0, d1, d2 * d3]);

	assert_eq!(node.length_rank1().len(), d0);
}

/// All views address the same storage in row-major order.
pub fn test_generic_views_alias_storage<B: ComputeBackend>(backend: B) {
	let shape = [2, 3, 2, 2];
	let mut node = Node::new(backend, false);
	node.resize(shape, true).unwrap();

	{
		let flat = node.data_rank1();
		let mut flat = flat.write();
		for (i, x) in flat.as_mut_slice().iter_mut().enumerate() {
			*x = i as f32;
		}
	}

	let rank2 = node.data_rank2();
	let reverse = node.data_rank2_reverse();
	let rank3 = node.data_rank3();
	let (rank2, reverse, rank3) = (rank2.read(), reverse.read(), rank3.read());
	for (i, j, k, l) in iproduct!(0..2, 0..3, 0..2, 0..2) {
		let expected = (((i * 3 + j) * 2 + k) * 2 + l) as f32;
		assert_eq!(rank2[[i, (j * 2 + k) * 2 + l]], expected);
		assert_eq!(reverse[[(i * 3 + j) * 2 + k, l]], expected);
		assert_eq!(rank3[[i, j, k * 2 + l]], expected);
	}
}

/// Resizing to the current shape keeps the contents; force-init always zeroes.
pub fn test_generic_resize_idempotent_and_force_init<B: ComputeBackend>(backend: B) {
	let shape = [3, 2, 1, 1];
	let mut node = Node::new(backend, true);
	node.resize(shape, false).unwrap();
	node.data().borrow_mut().fill(1.5);
	node.gradient().borrow_mut().fill(-2.0);

	node.resize(shape, false).unwrap();
	assert_eq!(node.data_rank1().to_vec(), vec![1.5; 6]);
	assert_eq!(node.gradient_rank1().to_vec(), vec![-2.0; 6]);

	node.resize(shape, true).unwrap();
	assert_eq!(node.data_rank1().to_vec(), vec![0.0; 6]);
	assert_eq!(node.gradient_rank1().to_vec(), vec![0.0; 6]);
	assert_eq!(node.length_rank1().to_vec(), vec![0; 3]);
}

/// An alias observes the owner's writes while its own clear, initialize and update do nothing.
pub fn test_generic_alias_is_live_and_inert<B: ComputeBackend>(backend: B) {
	let initializer = ConstantInitializer(0.5);
	let alias_initializer = ConstantInitializer(9.0);
	let updater = SgdUpdater::dense(1.0);

	let mut owner = Node::new(backend.clone(), true)
		.with_name("w")
		.with_ordinal(2);
	owner.set_initializer(&initializer);
	owner.set_updater(&updater);
	owner.resize([2, 2, 1, 1], false).unwrap();
	owner.initialize(false).unwrap();
	owner.gradient().borrow_mut().fill(0.25);

	let mut alias = Node::new(backend, true);
	alias.set_initializer(&alias_initializer);
	alias.share(&owner);
	assert_eq!(alias.ownership(), Ownership::Alias);
	assert!(alias.initializer().is_none() && alias.updater().is_none());
	assert!(!alias.gradient_allocated());

	alias.clear_gradient().unwrap();
	alias.initialize(true).unwrap();
	alias.apply_update().unwrap();
	assert_eq!(owner.data_rank1().to_vec(), vec![0.5; 4]);
	assert_eq!(owner.gradient_rank1().to_vec(), vec![0.25; 4]);
	assert_eq!(updater.dense_calls(), 0);

	let alias_view = alias.data_rank2();
	owner.apply_update().unwrap();
	assert_eq!(alias_view.to_vec(), vec![0.25; 4]);
	owner.data_rank2().write()[[1, 1]] = 3.0;
	assert_eq!(alias_view.read()[[1, 1]], 3.0);

	// resizing the alias to the owner's shape is allowed and does nothing
	alias.resize([2, 2, 1, 1], false).unwrap();
	assert!(alias_view.is_current());
}

/// A sparse node shrinks gradient and index to zero rows on clear, and its updater sees the
/// merged contributions.
pub fn test_generic_sparse_gradient_cycle<B: ComputeBackend>(backend: B) {
	let initializer = ConstantInitializer(1.0);
	let updater = SgdUpdater::sparse(0.5);

	let mut node = Node::new(backend.clone(), true).with_name("embedding");
	node.set_initializer(&initializer);
	node.set_updater(&updater);
	node.resize([4, 2, 1, 1], false).unwrap();
	node.initialize(false).unwrap();

	node.clear_gradient().unwrap();
	assert_eq!(node.gradient().shape(), [0, 0, 0, 0]);
	assert_eq!(node.index().shape(), [0]);
	assert!(node.gradient().is_allocated() && node.index().is_allocated());

	let (rows, index) = sparse_rows(&backend, &[1, 3], &[vec![1.0, 2.0], vec![0.0, 4.0]], 2);
	node.accumulate_sparse_gradient(&rows, &index).unwrap();
	let (rows, index) = sparse_rows(&backend, &[1], &[vec![1.0, 0.0]], 2);
	node.accumulate_sparse_gradient(&rows, &index).unwrap();
	assert_eq!(node.index_rank1().to_vec(), vec![1, 3]);
	assert_eq!(node.gradient_rank2().to_vec(), vec![2.0, 2.0, 0.0, 4.0]);

	node.apply_update().unwrap();
	assert_eq!(updater.sparse_calls(), 1);
	assert_eq!(
		node.data_rank1().to_vec(),
		vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, -1.0]
	);

	node.clear_gradient().unwrap();
	assert_eq!(node.gradient().shape()[0], 0);
	assert_eq!(node.index().shape(), [0]);
}

/// The worked example: `[3, 7, 3]` merged with `[7, 9]`.
pub fn test_generic_sparse_merge_example<B: ComputeBackend>(backend: B) {
	let (a, b, c) = (vec![1.0, 0.0], vec![0.0, 1.0], vec![2.0, 2.0]);
	let (d, e) = (vec![10.0, 20.0], vec![-1.0, -2.0]);
	let (mut left_data, mut left_index) =
		sparse_rows(&backend, &[3, 7, 3], &[a, b, c], 2);
	let (right_data, right_index) = sparse_rows(&backend, &[7, 9], &[d, e.clone()], 2);

	tessera_core::sparse::merge_into_left(
		&mut left_data,
		&mut left_index,
		&right_data,
		&right_index,
	)
	.unwrap();

	assert_eq!(left_data.shape(), [3, 2, 1, 1]);
	assert_eq!(left_index.as_slice(), &[3, 7, 9]);
	let sums = dense_sums(&left_data, &left_index);
	assert_eq!(sums[&3], vec![3.0, 2.0]);
	assert_eq!(sums[&7], vec![10.0, 21.0]);
	assert_eq!(sums[&9], e);
	assert_eq!(right_index.as_slice(), &[7, 9]);
}

/// Freeing releases owned storage once, leaves aliases alone, and is terminal.
pub fn test_generic_free<B: ComputeBackend>(backend: B) {
	let mut owner = Node::new(backend.clone(), true);
	owner.resize([2, 1, 1, 2], false).unwrap();
	let mut alias = Node::new(backend, true);
	alias.share(&owner);

	alias.free();
	assert!(owner.data().is_allocated());

	owner.free();
	owner.free();
	assert_eq!(owner.state(), NodeState::Freed);
	assert!(!owner.data().is_allocated());
	assert!(!owner.gradient().is_allocated());
	assert!(!owner.length().is_allocated());
	assert_eq!(alias.state(), NodeState::Empty);
}

/// Initializer and updater failures reach the caller unchanged.
pub fn test_generic_collaborator_errors<B: ComputeBackend>(backend: B) {
	let initializer = FailingInitializer;
	let updater = SgdUpdater::dense(0.1);

	let mut node = Node::new(backend.clone(), false);
	node.set_initializer(&initializer);
	node.set_updater(&updater);
	node.resize([1, 3, 1, 1], false).unwrap();

	assert!(matches!(node.initialize(false), Err(Error::Initializer(_))));
	// the node has no gradient storage, so the shapes disagree
	assert!(matches!(node.apply_update(), Err(Error::Updater(_))));
	assert_eq!(updater.dense_calls(), 1);
}
