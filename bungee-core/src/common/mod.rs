//! Shared helpers used across config and health-check structs.

pub mod duration_serde;
