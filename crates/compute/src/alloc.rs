// Copyright 2025 Irreducible Inc.

use std::ops::{Deref, DerefMut};

/// A block of storage handed out by a [`ComputeBackend`](crate::ComputeBackend).
///
/// Storage must be returned to the backend that allocated it through
/// [`ComputeBackend::free`](crate::ComputeBackend::free) so that budgeted backends can account for
/// it.
#[derive(Debug)]
pub struct Storage<T> {
	data: Vec<T>,
}

impl<T> Storage<T> {
	pub fn new(data: Vec<T>) -> Self {
		Self { data }
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

}

impl<T> Deref for Storage<T> {
	type Target = [T];

	fn deref(&self) -> &[T] {
		&self.data
	}
}

impl<T> DerefMut for Storage<T> {
	fn deref_mut(&mut self) -> &mut [T] {
		&mut self.data
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("device pool is out of memory: requested {requested} bytes, {available} available")]
	OutOfMemory { requested: usize, available: usize },
}
