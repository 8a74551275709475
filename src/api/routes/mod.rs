//! API Routes
//!
//! Route handlers organized by functionality.

pub mod currents;
pub mod device;
pub mod health;
pub mod machines;
pub mod seed;
pub mod status;
pub mod tags;
pub mod write;
