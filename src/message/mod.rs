//! This module exports a minimal message-passing API, encapsulated by a
//! `Communicator` trait. Implementors only need to write tagged `send` and
//! `recv` operations for a given transport layer; the trait then provides
//! binomial-tree broadcast, reduce, all-reduce, and barrier operations. Two
//! transports are included: a mesh of in-process channels, and a pure-Rust
//! TCP layer for multi-host runs.
//!

pub mod comm;
pub mod local;
pub mod mailbox;
pub mod tcp;
