// src/commands/mod.rs
//! Command handlers for the acldiff CLI

mod compare;
mod signing;

pub use compare::{cmd_compare, CompareArgs};
pub use signing::{cmd_keygen, cmd_sign, cmd_verify};
