//! Setting handlers for different configuration patterns.

pub mod numeric;
pub mod string;

pub use numeric::*;
pub use string::*;
