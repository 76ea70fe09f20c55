//! Utilities

// Modules
pub mod logger;

// Imports
use std::{cell::RefCell, fmt, io};

/// Extension trait for `R: io::Read` types to read a byte array
#[extend::ext(name = ReadByteArray)]
pub impl<R: io::Read> R {
	/// Reads a byte array `[u8; N]` from this reader.
	///
	/// Returns `Err` if unable to read exactly `N` bytes.
	fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], io::Error> {
		let mut array = [0u8; N];
		self.read_exact(&mut array)?;
		Ok(array)
	}
}

/// [`fmt::Display`] helper to display using a `FnMut(&mut fmt::Formatter)`
pub struct DisplayWrapper<F: FnMut(&mut fmt::Formatter) -> fmt::Result>(RefCell<F>);

impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> DisplayWrapper<F> {
	/// Creates a new display wrapper
	#[must_use]
	pub const fn new(func: F) -> Self {
		Self(RefCell::new(func))
	}
}


impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> fmt::Display for DisplayWrapper<F> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Note: `f` cannot be re-entrant, so this cannot fail
		self.0.borrow_mut()(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn read_byte_array_exact() {
		let mut reader = io::Cursor::new(vec![1u8, 2, 3, 4, 5]);
		let array = reader.read_byte_array::<4>().expect("Unable to read array");
		assert_eq!(array, [1, 2, 3, 4]);

		// Only a single byte remains
		assert!(reader.read_byte_array::<2>().is_err());
	}

	#[test]
	fn display_wrapper_forwards() {
		let mut calls = 0;
		let wrapper = DisplayWrapper::new(|f| {
			calls += 1;
			write!(f, "value")
		});
		assert_eq!(wrapper.to_string(), "value");
		assert_eq!(wrapper.to_string(), "value");
		drop(wrapper);
		assert_eq!(calls, 2);
	}
}
