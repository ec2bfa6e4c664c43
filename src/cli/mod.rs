//! Command-line interface for tree-forge.
//!
//! Provides commands for generating, reproducing, verifying and removing
//! synthetic file trees.

mod commands;

pub use commands::{
    parse_cli, run, run_with_cli, Cli, Commands, GenerateArgs, RemoveArgs, ReproduceArgs,
    VerifyArgs,
};
