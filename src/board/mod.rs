//! Board placement.

pub mod board;

pub use board::{Board, DEFAULT_CAPACITY};
