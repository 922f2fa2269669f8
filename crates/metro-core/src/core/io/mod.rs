//! Plain-text particle coordinate files.
//!
//! The [`aam`] format stores one frame as a particle count followed by
//! `name index x y z charge weight radius` records. It is read for molecule structures and
//! written for final configurations and trajectory frames.

pub mod aam;
pub mod record;
pub mod traits;
