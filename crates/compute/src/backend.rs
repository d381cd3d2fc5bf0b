// Copyright 2025 Irreducible Inc.

use std::fmt::Debug;

use crate::{
	alloc::{Error, Storage},
	cpu::CpuBackend,
	element::Element,
	pool::PoolBackend,
};

/// Where the storage of a backend resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
	Host,
	Accelerator,
}

/// Capability interface of a storage backend.
///
/// A backend hands out and takes back storage blocks and performs the few elementwise operations
/// that node bookkeeping needs. Backends are cheap handles: clones refer to the same underlying
/// device, so storage allocated through one clone may be freed through another.
pub trait ComputeBackend: Clone + Debug {
	/// Where storage from this backend resides.
	fn kind(&self) -> DeviceKind;

	/// Allocates storage for `len` elements.
	///
	/// The contents of the returned storage are unspecified.
	fn allocate<T: Element>(&self, len: usize) -> Result<Storage<T>, Error>;

	/// Returns storage previously obtained from [`Self::allocate`].
	fn free<T: Element>(&self, storage: Storage<T>);

	/// Sets every element of `dst` to `value`.
	fn fill<T: Element>(&self, dst: &mut [T], value: T) {
		dst.fill(value);
	}

	/// Adds `src` into `dst` elementwise.
	///
	/// ## Preconditions
	///
	/// * `src` and `dst` must have the same length.
	fn add_assign(&self, dst: &mut [f32], src: &[f32]) {
		assert_eq!(dst.len(), src.len(), "add_assign: length mismatch");
		for (dst, src) in dst.iter_mut().zip(src) {
			*dst += *src;
		}
	}
}

/// A backend chosen at run time, typically from a [`BackendConfig`](crate::BackendConfig).
#[derive(Debug, Clone)]
pub enum AnyBackend {
	Cpu(CpuBackend),
	Pool(PoolBackend),
}

impl Default for AnyBackend {
	fn default() -> Self {
		Self::Cpu(CpuBackend)
	}
}

impl From<CpuBackend> for AnyBackend {
	fn from(backend: CpuBackend) -> Self {
		Self::Cpu(backend)
	}
}

impl From<PoolBackend> for AnyBackend {
	fn from(backend: PoolBackend) -> Self {
		Self::Pool(backend)
	}
}

impl ComputeBackend for AnyBackend {
	fn kind(&self) -> DeviceKind {
		match self {
			Self::Cpu(backend) => backend.kind(),
			Self::Pool(backend) => backend.kind(),
		}
	}

	fn allocate<T: Element>(&self, len: usize) -> Result<Storage<T>, Error> {
		match self {
			Self::Cpu(backend) => backend.allocate(len),
			Self::Pool(backend) => backend.allocate(len),
		}
	}

	fn free<T: Element>(&self, storage: Storage<T>) {
		match self {
			Self::Cpu(backend) => backend.free(storage),
			Self::Pool(backend) => backend.free(storage),
		}
	}

	fn fill<T: Element>(&self, dst: &mut [T], value: T) {
		match self {
			Self::Cpu(backend) => backend.fill(dst, value),
			Self::Pool(backend) => backend.fill(dst, value),
		}
	}

	fn add_assign(&self, dst: &mut [f32], src: &[f32]) {
		match self {
			Self::Cpu(backend) => backend.add_assign(dst, src),
			Self::Pool(backend) => backend.add_assign(dst, src),
		}
	}
}
