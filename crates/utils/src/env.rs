// Copyright 2025 Irreducible Inc.

/// Read an unsigned integer from the environment variable.
///
/// Returns `None` when the variable is unset. Panics if it is set to something that is not a valid
/// integer.
pub fn env_usize(var: &str) -> Option<usize> {
	match std::env::var(var) {
		Ok(val) => Some(
			val.trim()
				.parse::<usize>()
				.unwrap_or_else(|_| panic!("{var} must be a valid integer, got {val:?}")),
		),
		Err(_) => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unset_variables() {
		assert_eq!(env_usize("TESSERA_TEST_UNSET_USIZE"), None);
	}

	#[test]
	fn test_set_variables() {
		std::env::set_var("TESSERA_TEST_USIZE", " 4096 ");
		assert_eq!(env_usize("TESSERA_TEST_USIZE"), Some(4096));
	}

	#[test]
	#[should_panic(expected = "must be a valid integer")]
	fn test_malformed_usize() {
		std::env::set_var("TESSERA_TEST_BAD_USIZE", "lots");
		_ = env_usize("TESSERA_TEST_BAD_USIZE");
	}
}
