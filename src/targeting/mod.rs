//! Targeting: who an effect may act on.

pub mod targeter;

pub use targeter::{TargetWho, Targeter};
