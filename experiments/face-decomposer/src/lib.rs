//! Face shape-from-shading decomposition.
//!
//! Given a face photograph the network predicts per-pixel surface normals,
//! albedo and 27 spherical-harmonics lighting coefficients, renders a
//! shading map from them, corrects that shading with a learned residual and
//! reconstructs the input as `albedo * corrected shading`. This crate holds
//! the whole experiment harness: datasets, the network, losses, the
//! training controller and the evaluation passes.

pub mod artifacts;
pub mod checkpoint;
pub mod data;
pub mod eval;
pub mod loss;
pub mod model;
pub mod shading;
pub mod train;
