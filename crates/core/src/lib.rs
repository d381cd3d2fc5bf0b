// Copyright 2025 Irreducible Inc.

//! Computation-node memory model.
//!
//! A [`Node`] holds the activations, gradients and auxiliary index and length metadata of one
//! layer output. It owns that storage, or aliases the storage of another node, and delegates value
//! initialization and parameter updates to external [`Initializer`] and [`Updater`]
//! implementations. Sparse gradients, kept as `(index, row)` pairs, are combined with
//! [`sparse::merge`].

mod collaborators;
mod error;
mod node;
pub mod sparse;

pub use collaborators::*;
pub use error::*;
pub use node::*;
