// crates/framefuse-media/src/helpers/mod.rs

pub mod seek;
pub mod timeout;
