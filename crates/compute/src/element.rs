// Copyright 2025 Irreducible Inc.

use std::fmt::Debug;

use bytemuck::Pod;

/// Plain-old-data element that can live in a [`Buffer`](crate::Buffer).
///
/// The all-zeroes bit pattern must be a valid value, which is what force-initialized buffers are
/// filled with.
pub trait Element: Pod + Debug + PartialEq + Send + Sync + 'static {}

impl<T> Element for T where T: Pod + Debug + PartialEq + Send + Sync + 'static {}
