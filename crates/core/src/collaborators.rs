// Copyright 2025 Irreducible Inc.

use auto_impl::auto_impl;
use tessera_compute::{Buffer, ComputeBackend};

use crate::Error;

/// Activation or gradient storage of a node.
pub type DataBuffer<B> = Buffer<f32, 4, B>;

/// External row indices of a sparse gradient.
pub type IndexBuffer<B> = Buffer<u32, 1, B>;

/// Fills a buffer with starting values.
#[auto_impl(&, Box, Rc)]
pub trait Initializer<B: ComputeBackend> {
	fn fill(&self, buffer: &mut DataBuffer<B>) -> Result<(), Error>;
}

/// Applies an optimization step to a parameter.
///
/// A sparse updater receives the gradient as rows paired with the external indices of the
/// parameter rows they belong to; a dense updater receives a gradient of the parameter's own
/// shape.
#[auto_impl(&, Box, Rc)]
pub trait Updater<B: ComputeBackend> {
	fn is_sparse(&self) -> bool;

	fn update(&self, data: &mut DataBuffer<B>, gradient: &mut DataBuffer<B>) -> Result<(), Error>;

	fn update_sparse(
		&self,
		data: &mut DataBuffer<B>,
		gradient: &mut DataBuffer<B>,
		index: &IndexBuffer<B>,
	) -> Result<(), Error>;
}
