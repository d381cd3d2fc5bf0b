// Copyright 2025 Irreducible Inc.

//! Host backend backed by the global allocator.

use bytemuck::zeroed_vec;

use crate::{
	alloc::{Error, Storage},
	backend::{ComputeBackend, DeviceKind},
	element::Element,
};

/// Unbounded host memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
	fn kind(&self) -> DeviceKind {
		DeviceKind::Host
	}

	fn allocate<T: Element>(&self, len: usize) -> Result<Storage<T>, Error> {
		Ok(Storage::new(zeroed_vec(len)))
	}

	fn free<T: Element>(&self, storage: Storage<T>) {
		drop(storage);
	}
}
