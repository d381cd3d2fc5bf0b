// Copyright 2025 Irreducible Inc.

use tessera_utils::env::env_usize;

use crate::{backend::AnyBackend, cpu::CpuBackend, pool::PoolBackend};

/// Environment variable selecting a budgeted device pool and its size in bytes.
pub const POOL_BYTES_ENV: &str = "TESSERA_POOL_BYTES";

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
	/// Byte budget of a device pool. `None` selects unbounded host memory.
	pub pool_bytes: Option<usize>,
}

impl BackendConfig {
	/// Reads the configuration from [`POOL_BYTES_ENV`].
	///
	/// Panics if the variable is set but is not an integer.
	pub fn from_env() -> Self {
		Self {
			pool_bytes: env_usize(POOL_BYTES_ENV),
		}
	}

	pub fn build(&self) -> AnyBackend {
		match self.pool_bytes {
			Some(capacity) => {
				tracing::debug!(capacity, "using device pool backend");
				AnyBackend::Pool(PoolBackend::new(capacity))
			}
			None => AnyBackend::Cpu(CpuBackend),
		}
	}
}
