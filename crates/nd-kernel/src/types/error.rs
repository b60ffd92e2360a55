// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for component kernel construction and dispatch

use super::scalar::ScalarType;

/// Error types for kernel construction, compilation and per-step dispatch
#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
    /// A type descriptor maps to no supported scalar type
    #[error("Unsupported numeric type for '{quantity}': {descriptor}")]
    UnsupportedType { quantity: String, descriptor: String },

    /// Component declaration or construction inputs are inconsistent
    #[error("Invalid component definition: {0}")]
    InvalidSpec(String),

    /// Template expansion failed
    #[error("Template error: {0}")]
    Template(String),

    /// Generated source was rejected by the backend compiler
    #[error("Kernel compilation failed: {diagnostics}\n--- generated source ---\n{code}")]
    Compilation { diagnostics: String, code: String },

    /// Upstream buffer length differs from the component's instance count
    #[error("Buffer length mismatch for access '{access}': expected {expected}, got {actual}")]
    BufferLengthMismatch {
        access: String,
        expected: usize,
        actual: usize,
    },

    /// Upstream buffer element type changed after construction
    #[error("Buffer type mismatch for access '{access}': expected {expected}, got {actual}")]
    BufferTypeMismatch {
        access: String,
        expected: ScalarType,
        actual: ScalarType,
    },

    /// No destination supplied for a declared update
    #[error("Missing destination for update '{0}'")]
    MissingUpdateDestination(String),

    /// Supplied destination cannot receive the update
    #[error("Invalid destination for update '{update}': {reason}")]
    DestinationMismatch { update: String, reason: String },

    /// Launch geometry cannot be computed or is rejected
    #[error("Invalid launch geometry: {0}")]
    InvalidGeometry(String),

    /// Device runtime fault (allocation, copy, launch)
    #[error("Device error: {0}")]
    Device(String),

    /// Requested backend is not compiled in or not present
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

pub type Result<T> = core::result::Result<T, KernelError>;
pub type Error = KernelError;
