//! Layercheck CLI - certification checks for container image layers.

pub mod commands;
pub mod output;
