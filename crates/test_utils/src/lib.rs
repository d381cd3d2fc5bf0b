// Copyright 2025 Irreducible Inc.

//! Reference collaborators and backend-generic test routines for computation nodes.

pub mod collaborators;
pub mod node;
pub mod sparse;
