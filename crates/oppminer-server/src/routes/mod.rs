//! Route handlers for the oppminer API.

pub mod costs;
pub mod health;
pub mod jobs;
pub mod runs;
