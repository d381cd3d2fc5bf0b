// Copyright 2025 Irreducible Inc.

use std::{
	mem::size_of,
	sync::{Arc, Mutex},
};

use bytemuck::zeroed_vec;
use tessera_utils::checked_arithmetics::checked_byte_size;

use crate::{
	alloc::{Error, Storage},
	backend::{ComputeBackend, DeviceKind},
	element::Element,
};

/// Accelerator memory modelled as a fixed byte budget.
///
/// Storage is host-resident, but every allocation is charged against the pool and refused once
/// the budget would be exceeded, the way a device allocator fails when device memory runs out.
/// Clones share the same pool.
#[derive(Debug, Clone)]
pub struct PoolBackend {
	pool: Arc<Mutex<PoolState>>,
}

#[derive(Debug)]
struct PoolState {
	capacity: usize,
	in_use: usize,
	peak: usize,
	live_allocations: usize,
}

impl PoolBackend {
	pub fn new(capacity_bytes: usize) -> Self {
		Self {
			pool: Arc::new(Mutex::new(PoolState {
				capacity: capacity_bytes,
				in_use: 0,
				peak: 0,
				live_allocations: 0,
			})),
		}
	}

	/// Total budget in bytes.
	pub fn capacity(&self) -> usize {
		self.with_state(|state| state.capacity)
	}

	/// Bytes currently allocated.
	pub fn in_use(&self) -> usize {
		self.with_state(|state| state.in_use)
	}

	/// Highest number of bytes allocated at once.
	pub fn peak(&self) -> usize {
		self.with_state(|state| state.peak)
	}

	/// Number of storage blocks not yet freed.
	pub fn live_allocations(&self) -> usize {
		self.with_state(|state| state.live_allocations)
	}

	fn with_state<R>(&self, f: impl FnOnce(&mut PoolState) -> R) -> R {
		let mut state = self.pool.lock().expect("mutex is always available");
		f(&mut state)
	}
}

impl ComputeBackend for PoolBackend {
	fn kind(&self) -> DeviceKind {
		DeviceKind::Accelerator
	}

	fn allocate<T: Element>(&self, len: usize) -> Result<Storage<T>, Error> {
		let requested = checked_byte_size(len, size_of::<T>());
		self.with_state(|state| {
			let available = state.capacity - state.in_use;
			if requested > available {
				tracing::warn!(requested, available, "device pool exhausted");
				return Err(Error::OutOfMemory {
					requested,
					available,
				});
			}
			state.in_use += requested;
			state.peak = state.peak.max(state.in_use);
			state.live_allocations += 1;
			Ok(())
		})?;
		Ok(Storage::new(zeroed_vec(len)))
	}

	fn free<T: Element>(&self, storage: Storage<T>) {
		let released = checked_byte_size(storage.len(), size_of::<T>());
		self.with_state(|state| {
			assert!(
				state.in_use >= released && state.live_allocations > 0,
				"storage returned to a pool it was not allocated from"
			);
			state.in_use -= released;
			state.live_allocations -= 1;
		});
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[test]
	fn test_budget_accounting() {
		let pool = PoolBackend::new(100);

		let first = pool.allocate::<f32>(10).unwrap();
		let second = pool.allocate::<u32>(10).unwrap();
		assert_eq!(pool.in_use(), 80);
		assert_eq!(pool.live_allocations(), 2);

		assert_matches!(
			pool.allocate::<f32>(6),
			Err(Error::OutOfMemory {
				requested: 24,
				available: 20
			})
		);

		pool.free(first);
		assert_eq!(pool.in_use(), 40);
		assert_eq!(pool.peak(), 80);

		let third = pool.allocate::<f32>(15).unwrap();
		assert_eq!(pool.in_use(), 100);

		pool.free(second);
		pool.free(third);
		assert_eq!(pool.in_use(), 0);
		assert_eq!(pool.live_allocations(), 0);
	}

	#[test]
	fn test_clones_share_pool() {
		let pool = PoolBackend::new(16);
		let clone = pool.clone();
		let storage = clone.allocate::<u32>(4).unwrap();
		assert_eq!(pool.in_use(), 16);
		pool.free(storage);
		assert_eq!(clone.in_use(), 0);
	}

	#[test]
	fn test_zero_length_allocation() {
		let pool = PoolBackend::new(0);
		let storage = pool.allocate::<f32>(0).unwrap();
		assert!(storage.is_empty());
		pool.free(storage);
	}

	#[test]
	#[should_panic(expected = "not allocated from")]
	fn test_foreign_storage_rejected() {
		let pool = PoolBackend::new(64);
		pool.free(Storage::new(vec![0.0f32; 4]));
	}
}
