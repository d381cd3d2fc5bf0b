// Copyright 2025 Irreducible Inc.

use std::{
	cell::{Ref, RefCell, RefMut},
	rc::Rc,
};

use tessera_utils::checked_arithmetics::checked_product;

use crate::{backend::ComputeBackend, buffer::Buffer, element::Element, view::ShapeView};

/// Reference-counted handle to a [`Buffer`].
///
/// Clones refer to the same buffer, so a resize or write through one handle is observed through
/// every other. Handles are single-threaded; conflicting borrows panic.
#[derive(Debug)]
pub struct SharedBuffer<T: Element, const N: usize, B: ComputeBackend>(Rc<RefCell<Buffer<T, N, B>>>);

impl<T: Element, const N: usize, B: ComputeBackend> Clone for SharedBuffer<T, N, B> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T: Element, const N: usize, B: ComputeBackend> SharedBuffer<T, N, B> {
	pub fn new(backend: B) -> Self {
		Self(Rc::new(RefCell::new(Buffer::new(backend))))
	}

	pub fn borrow(&self) -> Ref<'_, Buffer<T, N, B>> {
		self.0.borrow()
	}

	pub fn borrow_mut(&self) -> RefMut<'_, Buffer<T, N, B>> {
		self.0.borrow_mut()
	}

	/// Whether both handles refer to the same buffer.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Number of live handles to the buffer.
	pub fn handle_count(&self) -> usize {
		Rc::strong_count(&self.0)
	}

	pub fn shape(&self) -> [usize; N] {
		self.borrow().shape()
	}

	pub fn is_allocated(&self) -> bool {
		self.borrow().is_allocated()
	}

	/// Creates a detached rank-`R` view whose shape is derived from the buffer's current shape.
	///
	/// ## Preconditions
	///
	/// * the buffer must be allocated;
	/// * `layout` must preserve the element count.
	pub fn view<const R: usize>(
		&self,
		layout: impl FnOnce([usize; N]) -> [usize; R],
	) -> TensorView<T, N, B, R> {
		let buffer = self.borrow();
		assert!(buffer.is_allocated(), "cannot view an unallocated buffer");
		let shape = layout(buffer.shape());
		assert_eq!(
			checked_product(&shape),
			buffer.len(),
			"layout {shape:?} does not preserve the element count of {:?}",
			buffer.shape()
		);
		TensorView {
			buffer: self.clone(),
			shape,
			epoch: buffer.epoch(),
		}
	}
}

/// A rank-`R` reinterpretation of a shared buffer that can be held across operations.
///
/// The view records the allocation epoch of the buffer when it was created. Every access checks
/// that the buffer has not been reallocated or freed since, and panics otherwise instead of
/// reading storage that no longer backs the view.
#[derive(Debug)]
pub struct TensorView<T: Element, const N: usize, B: ComputeBackend, const R: usize> {
	buffer: SharedBuffer<T, N, B>,
	shape: [usize; R],
	epoch: u64,
}

impl<T: Element, const N: usize, B: ComputeBackend, const R: usize> Clone
	for TensorView<T, N, B, R>
{
	fn clone(&self) -> Self {
		Self {
			buffer: self.buffer.clone(),
			shape: self.shape,
			epoch: self.epoch,
		}
	}
}

impl<T: Element, const N: usize, B: ComputeBackend, const R: usize> TensorView<T, N, B, R> {
	pub fn shape(&self) -> [usize; R] {
		self.shape
	}

	pub fn len(&self) -> usize {
		checked_product(&self.shape)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Whether the underlying storage is still the one this view was created over.
	pub fn is_current(&self) -> bool {
		self.buffer.borrow().epoch() == self.epoch
	}

	/// Borrows the elements for reading.
	pub fn read(&self) -> ShapeView<T, Ref<'_, [T]>, R> {
		let buffer = self.buffer.borrow();
		self.check_epoch(buffer.epoch());
		ShapeView::new(Ref::map(buffer, |buffer| buffer.as_slice()), self.shape)
	}

	/// Borrows the elements for writing.
	pub fn write(&self) -> ShapeView<T, RefMut<'_, [T]>, R> {
		let buffer = self.buffer.borrow_mut();
		self.check_epoch(buffer.epoch());
		ShapeView::new(RefMut::map(buffer, |buffer| buffer.as_mut_slice()), self.shape)
	}

	pub fn to_vec(&self) -> Vec<T> {
		self.read().as_slice().to_vec()
	}

	fn check_epoch(&self, epoch: u64) {
		assert_eq!(
			epoch, self.epoch,
			"view of shape {:?} used after its buffer was reallocated",
			self.shape
		);
	}
}

impl<T: Element, const N: usize, B: ComputeBackend> TensorView<T, N, B, 2> {
	pub fn rows(&self) -> usize {
		self.shape[0]
	}

	pub fn cols(&self) -> usize {
		self.shape[1]
	}
}
