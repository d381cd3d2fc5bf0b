// Copyright 2025 Irreducible Inc.

use std::cell::{Cell, RefCell};

use rand::{prelude::StdRng, Rng, SeedableRng};
use tessera_compute::{layout, ComputeBackend};
use tessera_core::{DataBuffer, Error, IndexBuffer, Initializer, Updater};

/// Fills every element with the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstantInitializer(pub f32);

impl<B: ComputeBackend> Initializer<B> for ConstantInitializer {
	fn fill(&self, buffer: &mut DataBuffer<B>) -> Result<(), Error> {
		buffer.fill(self.0);
		Ok(())
	}
}

/// Draws every element uniformly from `[-scale, scale)` with a seeded generator.
#[derive(Debug)]
pub struct UniformInitializer {
	scale: f32,
	rng: RefCell<StdRng>,
}

impl UniformInitializer {
	pub fn new(scale: f32, seed: u64) -> Self {
		Self {
			scale,
			rng: RefCell::new(StdRng::seed_from_u64(seed)),
		}
	}
}

impl<B: ComputeBackend> Initializer<B> for UniformInitializer {
	fn fill(&self, buffer: &mut DataBuffer<B>) -> Result<(), Error> {
		let mut rng = self.rng.borrow_mut();
		for x in buffer.as_mut_slice() {
			*x = rng.gen_range(-self.scale..self.scale);
		}
		Ok(())
	}
}

/// Always fails; exercises error propagation.
#[derive(Debug, Clone, Copy)]
pub struct FailingInitializer;

impl<B: ComputeBackend> Initializer<B> for FailingInitializer {
	fn fill(&self, _buffer: &mut DataBuffer<B>) -> Result<(), Error> {
		Err(Error::Initializer("initializer is not configured for this shape".into()))
	}
}

/// Plain gradient descent, `w -= learning_rate * g`, that records how often it was invoked.
///
/// In sparse mode gradient row `r` is applied to parameter row `index[r]`.
#[derive(Debug)]
pub struct SgdUpdater {
	learning_rate: f32,
	sparse: bool,
	dense_calls: Cell<usize>,
	sparse_calls: Cell<usize>,
}

impl SgdUpdater {
	pub fn dense(learning_rate: f32) -> Self {
		Self::new(learning_rate, false)
	}

	pub fn sparse(learning_rate: f32) -> Self {
		Self::new(learning_rate, true)
	}

	fn new(learning_rate: f32, sparse: bool) -> Self {
		Self {
			learning_rate,
			sparse,
			dense_calls: Cell::new(0),
			sparse_calls: Cell::new(0),
		}
	}

	pub fn dense_calls(&self) -> usize {
		self.dense_calls.get()
	}

	pub fn sparse_calls(&self) -> usize {
		self.sparse_calls.get()
	}
}

impl<B: ComputeBackend> Updater<B> for SgdUpdater {
	fn is_sparse(&self) -> bool {
		self.sparse
	}

	fn update(&self, data: &mut DataBuffer<B>, gradient: &mut DataBuffer<B>) -> Result<(), Error> {
		self.dense_calls.set(self.dense_calls.get() + 1);
		if data.shape() != gradient.shape() {
			return Err(Error::Updater(
				format!(
					"gradient shape {:?} does not match data shape {:?}",
					gradient.shape(),
					data.shape()
				)
				.into(),
			));
		}
		for (w, g) in data.as_mut_slice().iter_mut().zip(gradient.as_slice()) {
			*w -= self.learning_rate * g;
		}
		Ok(())
	}

	fn update_sparse(
		&self,
		data: &mut DataBuffer<B>,
		gradient: &mut DataBuffer<B>,
		index: &IndexBuffer<B>,
	) -> Result<(), Error> {
		self.sparse_calls.set(self.sparse_calls.get() + 1);
		let rows = gradient.dim(0);
		if rows == 0 {
			return Ok(());
		}

		let shape = data.shape();
		let mut weights = data.view_mut(layout::rows(shape));
		let grads = gradient.view(layout::rows(gradient.shape()));
		if grads.cols() != weights.cols() {
			return Err(Error::Updater(
				format!(
					"sparse gradient width {} does not match parameter width {}",
					grads.cols(),
					weights.cols()
				)
				.into(),
			));
		}
		for (row, &id) in index.as_slice().iter().enumerate() {
			for (w, g) in weights.row_mut(id as usize).iter_mut().zip(grads.row(row)) {
				*w -= self.learning_rate * g;
			}
		}
		Ok(())
	}
}
