// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Types Module
//!
//! Core type definitions shared by every stage: errors, scalar types and host arrays.

pub mod error;
pub mod scalar;

pub use error::{Error, KernelError, Result};
pub use scalar::{HostArray, Scalar, ScalarType};
