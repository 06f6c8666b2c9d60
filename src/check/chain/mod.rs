//! Cycle-safe walks over linked record chains.

pub mod dynamic;
pub mod owner;
pub mod property;
