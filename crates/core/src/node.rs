// Copyright 2025 Irreducible Inc.

use std::fmt;

use getset::{CopyGetters, Getters};
use tessera_compute::{layout, Buffer, ComputeBackend, Element, SharedBuffer, TensorView};
use tracing::instrument;

use crate::{sparse, DataBuffer, Error, IndexBuffer, Initializer, Updater};

/// Whether a node is responsible for its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
	/// Allocates, initializes, updates and frees the storage.
	Owner,
	/// Presents the storage of another node and never manages it.
	Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
	/// No storage has been allocated.
	Empty,
	/// Data storage is allocated.
	Allocated,
	/// Storage was released; the node can no longer be resized.
	Freed,
}

/// Storage of one layer output: activations, their gradient, sparse-gradient row indices and
/// per-row sequence lengths.
///
/// Each of the four buffers is held through a [`SharedBuffer`] handle so that [`Node::share`] can
/// make this node present another node's storage without copying. The owner of a group of aliased
/// nodes is the only one that allocates, initializes, updates or frees; on an alias those
/// operations do nothing.
///
/// The initializer and updater are borrowed, never owned.
#[derive(Getters, CopyGetters)]
pub struct Node<'a, B: ComputeBackend> {
	data: SharedBuffer<f32, 4, B>,
	gradient: SharedBuffer<f32, 4, B>,
	index: SharedBuffer<u32, 1, B>,
	length: SharedBuffer<u32, 1, B>,
	/// Whether consumers require the data in one contiguous block.
	#[getset(get_copy = "pub")]
	must_contiguous: bool,
	/// Whether this node allocated its data storage.
	#[getset(get_copy = "pub")]
	data_allocated: bool,
	/// Whether this node allocated its gradient storage.
	#[getset(get_copy = "pub")]
	gradient_allocated: bool,
	#[getset(get_copy = "pub")]
	ownership: Ownership,
	#[getset(get = "pub")]
	name: String,
	#[getset(get_copy = "pub")]
	ordinal: usize,
	#[getset(get_copy = "pub")]
	needs_gradient: bool,
	freed: bool,
	updater: Option<&'a dyn Updater<B>>,
	initializer: Option<&'a dyn Initializer<B>>,
}

impl<'a, B: ComputeBackend> Node<'a, B> {
	/// Creates an empty node. Whether the node carries a gradient is fixed for its lifetime.
	pub fn new(backend: B, needs_gradient: bool) -> Self {
		Self {
			data: SharedBuffer::new(backend.clone()),
			gradient: SharedBuffer::new(backend.clone()),
			index: SharedBuffer::new(backend.clone()),
			length: SharedBuffer::new(backend),
			must_contiguous: false,
			data_allocated: false,
			gradient_allocated: false,
			ownership: Ownership::Owner,
			name: String::new(),
			ordinal: 0,
			needs_gradient,
			freed: false,
			updater: None,
			initializer: None,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn with_ordinal(mut self, ordinal: usize) -> Self {
		self.ordinal = ordinal;
		self
	}

	pub fn with_contiguous(mut self, must_contiguous: bool) -> Self {
		self.must_contiguous = must_contiguous;
		self
	}

	pub fn set_updater(&mut self, updater: &'a dyn Updater<B>) {
		self.updater = Some(updater);
	}

	pub fn set_initializer(&mut self, initializer: &'a dyn Initializer<B>) {
		self.initializer = Some(initializer);
	}

	pub fn updater(&self) -> Option<&'a dyn Updater<B>> {
		self.updater
	}

	pub fn initializer(&self) -> Option<&'a dyn Initializer<B>> {
		self.initializer
	}

	pub fn is_shared(&self) -> bool {
		self.ownership == Ownership::Alias
	}

	pub fn state(&self) -> NodeState {
		if self.freed {
			NodeState::Freed
		} else if self.data.is_allocated() {
			NodeState::Allocated
		} else {
			NodeState::Empty
		}
	}

	pub fn data(&self) -> &SharedBuffer<f32, 4, B> {
		&self.data
	}

	pub fn gradient(&self) -> &SharedBuffer<f32, 4, B> {
		&self.gradient
	}

	pub fn index(&self) -> &SharedBuffer<u32, 1, B> {
		&self.index
	}

	pub fn length(&self) -> &SharedBuffer<u32, 1, B> {
		&self.length
	}

	pub fn shape(&self) -> [usize; 4] {
		self.data.shape()
	}

	fn is_sparse(&self) -> bool {
		self.updater.is_some_and(|updater| updater.is_sparse())
	}

	/// Resizes data and length storage, and gradient storage if the node needs a gradient.
	///
	/// Nothing happens when the data already has `shape` and `force_init` is false. Otherwise
	/// the data and gradient get `shape` and the length buffer gets one entry per leading index.
	/// With `force_init` every element is zero afterwards.
	///
	/// All new storage is allocated before any of it replaces the old, so on error the node keeps
	/// its previous shapes and storage.
	///
	/// ## Preconditions
	///
	/// * the node must not have been freed;
	/// * on an alias, the call must be a no-op.
	pub fn resize(&mut self, shape: [usize; 4], force_init: bool) -> Result<(), Error> {
		if self.data.shape() == shape && !force_init {
			return Ok(());
		}
		assert!(!self.freed, "node {:?} was freed and cannot be resized", self.name);
		assert!(
			!self.is_shared(),
			"alias node {:?} cannot resize storage it does not own",
			self.name
		);

		let data = stage(&self.data, shape, force_init)?;
		let length = stage(&self.length, [shape[0]], force_init)?;
		let gradient = if self.needs_gradient {
			stage(&self.gradient, shape, force_init)?
		} else {
			None
		};

		commit(&self.data, data);
		commit(&self.length, length);
		self.data_allocated = true;
		if self.needs_gradient {
			commit(&self.gradient, gradient);
			self.gradient_allocated = true;
		}

		tracing::debug!(
			node = %self.name,
			ordinal = self.ordinal,
			?shape,
			force_init,
			"resized node"
		);
		Ok(())
	}

	/// Zeroes the gradient before a backward pass.
	///
	/// When the updater is sparse the gradient and index are instead shrunk to zero rows, since
	/// sparse gradients are rebuilt from scratch by every backward pass. Does nothing on an alias.
	pub fn clear_gradient(&self) -> Result<(), Error> {
		if self.is_shared() {
			return Ok(());
		}

		{
			let mut gradient = self.gradient.borrow_mut();
			if gradient.is_allocated() {
				gradient.fill(0.0);
			}
		}
		if self.is_sparse() {
			let gradient = stage(&self.gradient, [0; 4], true)?;
			let index = stage(&self.index, [0], true)?;
			commit(&self.gradient, gradient);
			commit(&self.index, index);
		}

		tracing::trace!(node = %self.name, sparse = self.is_sparse(), "cleared gradient");
		Ok(())
	}

	/// Makes this node an alias of `other`.
	///
	/// Afterwards both nodes present the same data, gradient, index and length storage. The alias
	/// takes over `other`'s name, ordinal and flags, drops its own initializer and updater, and
	/// leaves allocation, initialization and updates to the owner.
	///
	/// ## Preconditions
	///
	/// * this node must not have allocated or freed storage of its own.
	pub fn share(&mut self, other: &Node<'_, B>) {
		assert!(
			!self.data_allocated && !self.gradient_allocated && !self.freed,
			"node {:?} must be shared before it allocates storage",
			self.name
		);

		self.ownership = Ownership::Alias;
		self.data = other.data.clone();
		self.gradient = other.gradient.clone();
		self.index = other.index.clone();
		self.length = other.length.clone();
		self.must_contiguous = other.must_contiguous;
		self.gradient_allocated = false;
		self.name = other.name.clone();
		self.ordinal = other.ordinal;
		self.needs_gradient = other.needs_gradient;
		self.updater = None;
		self.initializer = None;

		tracing::debug!(node = %self.name, ordinal = self.ordinal, "node shares storage");
	}

	/// Fills the data, and the gradient if `also_gradient` is set, through the initializer.
	/// Does nothing on an alias.
	///
	/// ## Preconditions
	///
	/// * an owner must have an initializer.
	#[instrument(skip_all, fields(node = %self.name), level = "debug")]
	pub fn initialize(&self, also_gradient: bool) -> Result<(), Error> {
		if self.is_shared() {
			return Ok(());
		}
		let initializer = self
			.initializer
			.unwrap_or_else(|| panic!("node {:?} has no initializer", self.name));

		initializer.fill(&mut self.data.borrow_mut())?;
		if also_gradient {
			initializer.fill(&mut self.gradient.borrow_mut())?;
		}
		Ok(())
	}

	/// Applies the updater to the data, passing the index as well when the updater is sparse.
	/// Does nothing on an alias.
	///
	/// ## Preconditions
	///
	/// * an owner must have an updater.
	#[instrument(skip_all, fields(node = %self.name), level = "debug")]
	pub fn apply_update(&self) -> Result<(), Error> {
		if self.is_shared() {
			return Ok(());
		}
		let updater = self
			.updater
			.unwrap_or_else(|| panic!("node {:?} has no updater", self.name));

		let mut data = self.data.borrow_mut();
		let mut gradient = self.gradient.borrow_mut();
		if updater.is_sparse() {
			updater.update_sparse(&mut data, &mut gradient, &self.index.borrow())
		} else {
			updater.update(&mut data, &mut gradient)
		}
	}

	/// Merges a sparse gradient contribution into this node's gradient and index.
	///
	/// `rows` has shape `(n, width, 1, 1)` and `index` names the parameter row of each of the `n`
	/// rows. The merge goes through the shared handles, so aliases contribute to the owner's
	/// gradient.
	pub fn accumulate_sparse_gradient(
		&self,
		rows: &DataBuffer<B>,
		index: &IndexBuffer<B>,
	) -> Result<(), Error> {
		let mut gradient = self.gradient.borrow_mut();
		let mut own_index = self.index.borrow_mut();
		sparse::merge_into_left(&mut gradient, &mut own_index, rows, index)
	}

	/// Releases the storage this node allocated. Does nothing on an alias; calling it again does
	/// nothing either.
	pub fn free(&mut self) {
		if self.is_shared() {
			return;
		}
		if self.data_allocated {
			self.data.borrow_mut().free();
			self.length.borrow_mut().free();
		}
		if self.gradient_allocated {
			self.gradient.borrow_mut().free();
		}
		self.index.borrow_mut().free();
		self.data_allocated = false;
		self.gradient_allocated = false;
		if !self.freed {
			tracing::debug!(node = %self.name, ordinal = self.ordinal, "freed node");
		}
		self.freed = true;
	}

	/// Logs the data shape at debug level.
	pub fn log_shape(&self, label: &str) {
		tracing::debug!(node = %self.name, label, shape = ?self.data.shape(), "node shape");
	}

	/// `(d0 * d1 * d2 * d3)`
	pub fn data_rank1(&self) -> TensorView<f32, 4, B, 1> {
		self.data.view(layout::flat)
	}

	/// `(d0, d1 * d2 * d3)`
	pub fn data_rank2(&self) -> TensorView<f32, 4, B, 2> {
		self.data.view(layout::rows)
	}

	/// `(d0 * d1 * d2, d3)`
	pub fn data_rank2_reverse(&self) -> TensorView<f32, 4, B, 2> {
		self.data.view(layout::rows_reverse)
	}

	/// `(d0, d1, d2 * d3)`
	pub fn data_rank3(&self) -> TensorView<f32, 4, B, 3> {
		self.data.view(layout::tail)
	}

	pub fn gradient_rank1(&self) -> TensorView<f32, 4, B, 1> {
		self.gradient.view(layout::flat)
	}

	pub fn gradient_rank2(&self) -> TensorView<f32, 4, B, 2> {
		self.gradient.view(layout::rows)
	}

	pub fn gradient_rank2_reverse(&self) -> TensorView<f32, 4, B, 2> {
		self.gradient.view(layout::rows_reverse)
	}

	pub fn gradient_rank3(&self) -> TensorView<f32, 4, B, 3> {
		self.gradient.view(layout::tail)
	}

	pub fn index_rank1(&self) -> TensorView<u32, 1, B, 1> {
		self.index.view(|shape| shape)
	}

	pub fn length_rank1(&self) -> TensorView<u32, 1, B, 1> {
		self.length.view(|shape| shape)
	}
}

/// Allocates replacement storage for `buffer` unless it already has `shape` and no zeroing is
/// requested.
fn stage<T: Element, const N: usize, B: ComputeBackend>(
	buffer: &SharedBuffer<T, N, B>,
	shape: [usize; N],
	force_init: bool,
) -> Result<Option<Buffer<T, N, B>>, Error> {
	let current = buffer.borrow();
	if current.is_allocated() && current.shape() == shape && !force_init {
		return Ok(None);
	}
	let mut staged = Buffer::new(current.backend().clone());
	// a fresh buffer already has the all-zero shape, so only a forced resize allocates it
	staged.resize(shape, force_init || shape == [0; N])?;
	Ok(Some(staged))
}

fn commit<T: Element, const N: usize, B: ComputeBackend>(
	buffer: &SharedBuffer<T, N, B>,
	staged: Option<Buffer<T, N, B>>,
) {
	if let Some(staged) = staged {
		buffer.borrow_mut().adopt(staged);
	}
}

impl<B: ComputeBackend> fmt::Debug for Node<'_, B> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Node")
			.field("name", &self.name)
			.field("ordinal", &self.ordinal)
			.field("ownership", &self.ownership)
			.field("state", &self.state())
			.field("shape", &self.data.shape())
			.field("needs_gradient", &self.needs_gradient)
			.field("has_updater", &self.updater.is_some())
			.field("has_initializer", &self.initializer.is_some())
			.finish()
	}
}
