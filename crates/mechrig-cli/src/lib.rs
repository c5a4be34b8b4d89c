//! MechRig CLI library.
//!
//! Command implementations for the `mechrig` binary. Every command reads a
//! JSON rig document, runs one pipeline action and writes the document back.

pub mod commands;
