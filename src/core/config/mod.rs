pub mod data;
pub mod io;

pub use data::{Config, DEFAULT_SSE_URL};
pub use io::ConfigError;
