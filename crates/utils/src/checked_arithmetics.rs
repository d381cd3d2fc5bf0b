// Copyright 2025 Irreducible Inc.

/// Product of a list of dimensions that fails when the result overflows `usize`.
///
/// An empty list has product 1, matching the element count of a rank-0 shape.
pub fn checked_product(dims: &[usize]) -> usize {
	dims.iter().fold(1usize, |acc, &dim| {
		acc.checked_mul(dim)
			.unwrap_or_else(|| panic!("element count of shape {dims:?} overflows usize"))
	})
}

/// Byte size of `len` elements of `elem_size` bytes each, failing on overflow.
pub const fn checked_byte_size(len: usize, elem_size: usize) -> usize {
	match len.checked_mul(elem_size) {
		Some(bytes) => bytes,
		None => panic!("byte size overflows usize"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_checked_product_success() {
		assert_eq!(checked_product(&[]), 1);
		assert_eq!(checked_product(&[2, 3, 4]), 24);
		assert_eq!(checked_product(&[5, 0, 7]), 0);
	}

	#[test]
	#[should_panic]
	fn test_checked_product_overflow() {
		_ = checked_product(&[usize::MAX, 2]);
	}

	#[test]
	fn test_checked_byte_size() {
		assert_eq!(checked_byte_size(10, 4), 40);
	}

	#[test]
	#[should_panic]
	fn test_checked_byte_size_overflow() {
		_ = checked_byte_size(usize::MAX, 4);
	}
}
