// Copyright 2025 Irreducible Inc.

use std::{
	marker::PhantomData,
	ops::{Deref, DerefMut, Index, IndexMut},
};

use tessera_utils::checked_arithmetics::checked_product;

/// Rank-`R` row-major view over a contiguous slice.
///
/// The view never owns or copies its elements; `Data` is whatever borrows the storage, a plain
/// slice reference or a `RefCell` guard.
#[derive(Debug)]
pub struct ShapeView<T, Data: Deref<Target = [T]>, const R: usize> {
	data: Data,
	shape: [usize; R],
	_marker: PhantomData<T>,
}

/// Shared view borrowing a slice.
pub type View<'a, T, const R: usize> = ShapeView<T, &'a [T], R>;

/// Mutable view borrowing a slice.
pub type ViewMut<'a, T, const R: usize> = ShapeView<T, &'a mut [T], R>;

impl<T, Data: Deref<Target = [T]>, const R: usize> ShapeView<T, Data, R> {
	/// Reinterprets `data` with the given shape.
	///
	/// ## Preconditions
	///
	/// * the shape must cover exactly `data.len()` elements.
	pub fn new(data: Data, shape: [usize; R]) -> Self {
		assert_eq!(
			checked_product(&shape),
			data.len(),
			"view shape {shape:?} does not match {} stored elements",
			data.len()
		);
		Self {
			data,
			shape,
			_marker: PhantomData,
		}
	}

	pub fn shape(&self) -> [usize; R] {
		self.shape
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn as_slice(&self) -> &[T] {
		&self.data
	}

	/// Number of elements spanned by one index along the leading axis.
	pub fn row_len(&self) -> usize {
		checked_product(&self.shape[1..])
	}

	/// Elements under leading index `i`.
	pub fn row(&self, i: usize) -> &[T] {
		assert!(i < self.shape[0], "row {i} out of range for shape {:?}", self.shape);
		let start = i * self.row_len();
		&self.data[start..start + self.row_len()]
	}

	pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
		(0..self.shape[0]).map(move |i| self.row(i))
	}

	pub fn get(&self, index: [usize; R]) -> &T {
		&self.data[self.offset(index)]
	}

	fn offset(&self, index: [usize; R]) -> usize {
		index
			.iter()
			.zip(&self.shape)
			.fold(0, |offset, (&i, &dim)| {
				assert!(i < dim, "index {index:?} out of range for shape {:?}", self.shape);
				offset * dim + i
			})
	}
}

impl<T, Data: DerefMut<Target = [T]>, const R: usize> ShapeView<T, Data, R> {
	pub fn as_mut_slice(&mut self) -> &mut [T] {
		&mut self.data
	}

	pub fn row_mut(&mut self, i: usize) -> &mut [T] {
		assert!(i < self.shape[0], "row {i} out of range for shape {:?}", self.shape);
		let row_len = self.row_len();
		let start = i * row_len;
		&mut self.data[start..start + row_len]
	}

	pub fn get_mut(&mut self, index: [usize; R]) -> &mut T {
		let offset = self.offset(index);
		&mut self.data[offset]
	}

	pub fn fill(&mut self, value: T)
	where
		T: Clone,
	{
		self.data.fill(value);
	}
}

impl<T, Data: Deref<Target = [T]>> ShapeView<T, Data, 2> {
	pub fn rows(&self) -> usize {
		self.shape[0]
	}

	pub fn cols(&self) -> usize {
		self.shape[1]
	}
}

impl<T, Data: Deref<Target = [T]>, const R: usize> Index<[usize; R]> for ShapeView<T, Data, R> {
	type Output = T;

	fn index(&self, index: [usize; R]) -> &T {
		self.get(index)
	}
}

impl<T, Data: DerefMut<Target = [T]>, const R: usize> IndexMut<[usize; R]>
	for ShapeView<T, Data, R>
{
	fn index_mut(&mut self, index: [usize; R]) -> &mut T {
		self.get_mut(index)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_row_major_indexing() {
		let data = (0..24).collect::<Vec<u32>>();
		let view = View::new(data.as_slice(), [2, 3, 4]);
		assert_eq!(view[[0, 0, 0]], 0);
		assert_eq!(view[[0, 1, 2]], 6);
		assert_eq!(view[[1, 2, 3]], 23);
		assert_eq!(view.row(1), &data[12..24]);
	}

	#[test]
	fn test_rank2_rows_and_cols() {
		let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
		let view = View::new(&data[..], [3, 2]);
		assert_eq!(view.rows(), 3);
		assert_eq!(view.cols(), 2);
		let rows = view.iter_rows().collect::<Vec<_>>();
		assert_eq!(rows, vec![&data[0..2], &data[2..4], &data[4..6]]);
	}

	#[test]
	fn test_mutation_writes_through() {
		let mut data = vec![0u32; 6];
		{
			let mut view = ViewMut::new(data.as_mut_slice(), [2, 3]);
			view[[1, 0]] = 9;
			view.row_mut(0).copy_from_slice(&[1, 2, 3]);
		}
		assert_eq!(data, vec![1, 2, 3, 9, 0, 0]);
	}

	#[test]
	fn test_empty_rows() {
		let data: [f32; 0] = [];
		let view = View::new(&data[..], [0, 5]);
		assert!(view.is_empty());
		assert_eq!(view.iter_rows().count(), 0);
	}

	#[test]
	#[should_panic(expected = "does not match")]
	fn test_shape_mismatch() {
		let data = [0u32; 5];
		let _ = View::new(&data[..], [2, 3]);
	}

	#[test]
	#[should_panic(expected = "out of range")]
	fn test_index_out_of_range() {
		let data = [0u32; 6];
		let view = View::new(&data[..], [2, 3]);
		let _ = view[[0, 3]];
	}
}
