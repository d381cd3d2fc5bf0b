// Copyright 2025 Irreducible Inc.

/// Installs the global tracing subscriber.
///
/// Log filtering follows `RUST_LOG` and defaults to `info`. When `PROFILE_CSV_FILE` is set, span
/// timings are additionally written to that path. Calling this more than once is harmless.
pub fn init_tracing() {
	use std::env;

	use tracing_profile::CsvLayer;
	use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	if let Ok(csv_path) = env::var("PROFILE_CSV_FILE") {
		let _ = tracing_subscriber::registry()
			.with(filter)
			.with(CsvLayer::new(csv_path))
			.with(tracing_subscriber::fmt::layer())
			.try_init();
	} else {
		let _ = tracing_subscriber::registry()
			.with(filter)
			.with(tracing_subscriber::fmt::layer())
			.try_init();
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_init_tracing_twice() {
		init_tracing();
		init_tracing();
	}
}
