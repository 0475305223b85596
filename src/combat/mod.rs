//! Combat resolution.

pub mod resolver;

pub use resolver::{
    default_order, distribute, is_reorderable, is_valid_order, kill_subset, Blocker, BlockerHit,
};
