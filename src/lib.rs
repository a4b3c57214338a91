//! Congestion Simulation Library
//!
//! A grid traffic simulation with congestion-aware routing that runs headless.

pub mod simulation;
