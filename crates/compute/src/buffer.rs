// Copyright 2025 Irreducible Inc.

use tessera_utils::checked_arithmetics::checked_product;

use crate::{
	alloc::{Error, Storage},
	backend::ComputeBackend,
	element::Element,
	view::{View, ViewMut},
};

/// A resizable rank-`N` array whose storage comes from a [`ComputeBackend`].
///
/// A new buffer is empty: its shape is all zeroes and it holds no storage. [`Buffer::resize`]
/// allocates, [`Buffer::free`] releases, and dropping the buffer releases as well.
///
/// Each allocation or release advances the buffer's allocation epoch. Views that outlive a borrow
/// of the buffer (see [`TensorView`](crate::TensorView)) compare epochs to detect that the storage
/// they were created over no longer exists.
#[derive(Debug)]
pub struct Buffer<T: Element, const N: usize, B: ComputeBackend> {
	backend: B,
	shape: [usize; N],
	storage: Option<Storage<T>>,
	epoch: u64,
}

impl<T: Element, const N: usize, B: ComputeBackend> Buffer<T, N, B> {
	pub fn new(backend: B) -> Self {
		Self {
			backend,
			shape: [0; N],
			storage: None,
			epoch: 0,
		}
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	pub fn shape(&self) -> [usize; N] {
		self.shape
	}

	/// Size along `axis`.
	pub fn dim(&self, axis: usize) -> usize {
		self.shape[axis]
	}

	/// Number of elements covered by the current shape.
	pub fn len(&self) -> usize {
		checked_product(&self.shape)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_allocated(&self) -> bool {
		self.storage.is_some()
	}

	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	/// Resizes the buffer to `shape`.
	///
	/// Nothing happens when `shape` equals the current shape and `force_init` is false; the
	/// contents are preserved. Otherwise fresh storage is allocated. Its contents are unspecified
	/// unless `force_init` is set, in which case every element is zero, even when the shape did
	/// not change.
	///
	/// On error the buffer keeps its previous shape and storage.
	pub fn resize(&mut self, shape: [usize; N], force_init: bool) -> Result<(), Error> {
		if shape == self.shape && !force_init {
			return Ok(());
		}

		let mut storage = self.backend.allocate::<T>(checked_product(&shape))?;
		if force_init {
			self.backend.fill(&mut storage, T::zeroed());
		}
		if let Some(old) = self.storage.replace(storage) {
			self.backend.free(old);
		}
		self.shape = shape;
		self.epoch += 1;
		Ok(())
	}

	/// Releases the storage and returns to the empty state. Freeing an empty buffer does nothing.
	pub fn free(&mut self) {
		if let Some(storage) = self.storage.take() {
			self.backend.free(storage);
			self.epoch += 1;
		}
		self.shape = [0; N];
	}

	/// Takes over the shape and storage of `other`, releasing the current storage.
	///
	/// ## Preconditions
	///
	/// * `other` must have been allocated through a clone of this buffer's backend.
	pub fn adopt(&mut self, mut other: Self) {
		let storage = other.storage.take();
		if let Some(old) = std::mem::replace(&mut self.storage, storage) {
			self.backend.free(old);
		}
		self.shape = other.shape;
		self.epoch = self.epoch.max(other.epoch) + 1;
	}

	/// Sets every element to `value`.
	pub fn fill(&mut self, value: T) {
		let storage = self
			.storage
			.as_mut()
			.expect("buffer must be allocated before it is filled");
		self.backend.fill(storage, value);
	}

	pub fn as_slice(&self) -> &[T] {
		self.storage
			.as_deref()
			.expect("buffer must be allocated before it is read")
	}

	pub fn as_mut_slice(&mut self) -> &mut [T] {
		self.storage
			.as_deref_mut()
			.expect("buffer must be allocated before it is written")
	}

	/// Borrows the storage as a rank-`R` view with the given shape.
	///
	/// ## Preconditions
	///
	/// * the buffer must be allocated;
	/// * `shape` must cover exactly [`Self::len`] elements.
	pub fn view<const R: usize>(&self, shape: [usize; R]) -> View<'_, T, R> {
		View::new(self.as_slice(), shape)
	}

	/// Mutable counterpart of [`Self::view`].
	pub fn view_mut<const R: usize>(&mut self, shape: [usize; R]) -> ViewMut<'_, T, R> {
		ViewMut::new(self.as_mut_slice(), shape)
	}

	/// Borrows the storage with the buffer's own shape.
	pub fn full_view(&self) -> View<'_, T, N> {
		self.view(self.shape)
	}

	/// Mutable counterpart of [`Self::full_view`].
	pub fn full_view_mut(&mut self) -> ViewMut<'_, T, N> {
		let shape = self.shape;
		self.view_mut(shape)
	}
}

impl<T: Element, const N: usize, B: ComputeBackend> Drop for Buffer<T, N, B> {
	fn drop(&mut self) {
		if let Some(storage) = self.storage.take() {
			self.backend.free(storage);
		}
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;
	use crate::{cpu::CpuBackend, layout, pool::PoolBackend};

	#[test]
	fn test_new_buffer_is_empty() {
		let buffer = Buffer::<f32, 4, _>::new(CpuBackend);
		assert_eq!(buffer.shape(), [0; 4]);
		assert!(!buffer.is_allocated());
		assert_eq!(buffer.epoch(), 0);
	}

	#[test]
	fn test_resize_same_shape_preserves_contents() {
		let mut buffer = Buffer::<f32, 2, _>::new(CpuBackend);
		buffer.resize([2, 3], false).unwrap();
		buffer.as_mut_slice()[4] = 1.5;
		let epoch = buffer.epoch();

		buffer.resize([2, 3], false).unwrap();
		assert_eq!(buffer.as_slice()[4], 1.5);
		assert_eq!(buffer.epoch(), epoch);
	}

	#[test]
	fn test_force_init_zero_fills() {
		let mut buffer = Buffer::<f32, 2, _>::new(CpuBackend);
		buffer.resize([2, 3], false).unwrap();
		buffer.fill(4.0);

		buffer.resize([2, 3], true).unwrap();
		assert!(buffer.as_slice().iter().all(|&x| x == 0.0));
		assert_eq!(buffer.epoch(), 2);
	}

	#[test]
	fn test_free_is_idempotent() {
		let pool = PoolBackend::new(1 << 10);
		let mut buffer = Buffer::<u32, 1, _>::new(pool.clone());
		buffer.resize([8], false).unwrap();
		assert_eq!(pool.in_use(), 32);

		buffer.free();
		buffer.free();
		assert!(!buffer.is_allocated());
		assert_eq!(buffer.shape(), [0]);
		assert_eq!(buffer.epoch(), 2);
		assert_eq!(pool.in_use(), 0);
	}

	#[test]
	fn test_drop_returns_storage() {
		let pool = PoolBackend::new(1 << 10);
		{
			let mut buffer = Buffer::<f32, 4, _>::new(pool.clone());
			buffer.resize([1, 2, 3, 4], false).unwrap();
			assert_eq!(pool.in_use(), 96);
		}
		assert_eq!(pool.in_use(), 0);
		assert_eq!(pool.live_allocations(), 0);
	}

	#[test]
	fn test_failed_resize_keeps_previous_allocation() {
		let pool = PoolBackend::new(64);
		let mut buffer = Buffer::<f32, 1, _>::new(pool.clone());
		buffer.resize([4], false).unwrap();
		buffer.fill(2.0);

		assert_matches!(buffer.resize([32], false), Err(Error::OutOfMemory { .. }));
		assert_eq!(buffer.shape(), [4]);
		assert_eq!(buffer.as_slice(), &[2.0; 4]);
		assert_eq!(pool.in_use(), 16);
	}

	#[test]
	fn test_views_share_storage() {
		let mut buffer = Buffer::<f32, 4, _>::new(CpuBackend);
		buffer.resize([2, 3, 1, 4], true).unwrap();
		let shape = buffer.shape();
		{
			let mut rows = buffer.view_mut(layout::rows(shape));
			rows[[1, 5]] = 3.0;
		}
		let reverse = buffer.view(layout::rows_reverse(shape));
		assert_eq!(reverse.shape(), [6, 4]);
		assert_eq!(reverse[[4, 1]], 3.0);
		assert_eq!(buffer.full_view()[[1, 1, 0, 1]], 3.0);
	}

	#[test]
	fn test_adopt_advances_epoch() {
		let mut left = Buffer::<u32, 1, _>::new(CpuBackend);
		left.resize([3], false).unwrap();
		let mut right = Buffer::<u32, 1, _>::new(CpuBackend);
		right.resize([5], true).unwrap();
		right.fill(8);

		let before = left.epoch();
		left.adopt(right);
		assert!(left.epoch() > before);
		assert_eq!(left.as_slice(), &[8; 5]);
	}

	#[test]
	#[should_panic(expected = "must be allocated")]
	fn test_view_before_allocation() {
		let buffer = Buffer::<f32, 4, _>::new(CpuBackend);
		let _ = buffer.view(layout::flat(buffer.shape()));
	}
}
