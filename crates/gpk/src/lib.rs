//! Command line handling for the `gpk` tool

pub mod commands;
