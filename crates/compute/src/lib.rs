// Copyright 2025 Irreducible Inc.

//! Device-resident storage for computation nodes.
//!
//! A [`Buffer`] is a resizable multi-dimensional array whose storage is obtained from a
//! [`ComputeBackend`]. Buffers can be reinterpreted at lower rank without copying through
//! [`ShapeView`], and shared between owners through [`SharedBuffer`], whose detached
//! [`TensorView`]s check the buffer's allocation epoch on every access.

pub mod alloc;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod cpu;
pub mod element;
pub mod layout;
pub mod pool;
pub mod shared;
pub mod view;

pub use alloc::{Error, Storage};
pub use backend::{AnyBackend, ComputeBackend, DeviceKind};
pub use buffer::Buffer;
pub use config::BackendConfig;
pub use cpu::CpuBackend;
pub use element::Element;
pub use pool::PoolBackend;
pub use shared::{SharedBuffer, TensorView};
pub use view::{ShapeView, View, ViewMut};
