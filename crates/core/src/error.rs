// Copyright 2025 Irreducible Inc.

use tessera_compute::Error as AllocError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("allocation error: {0}")]
	Alloc(#[from] AllocError),
	#[error("initializer error: {0}")]
	Initializer(Box<dyn std::error::Error + Send + Sync + 'static>),
	#[error("updater error: {0}")]
	Updater(Box<dyn std::error::Error + Send + Sync + 'static>),
}
