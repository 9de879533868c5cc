//! Command-line tooling for operating on maps.

pub mod cli;
