//! # RedLilium Core
//!
//! Basic utilities shared by the render core and its consumers: math aliases,
//! colors, stable hashing, asset identity and profiling macros.

pub mod asset;
pub mod color;
pub mod hash;
pub mod math;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
