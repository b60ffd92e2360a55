// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # RotN (Rotational Neuron) Synapse Model
//!
//! Stateless multiplicative synapse driven by a linear neuron and a driver neuron.
//!
//! ## Model Dynamics
//!
//! ```text
//! Per instance i, every step:
//!     I[i] = V[i] × Vd[i] × weight[i]
//!
//!     Where:
//!     - V      = membrane potential of the linear (LIN) input neuron
//!     - Vd     = potential of the driver (DrN) neuron
//!     - weight = per-instance synaptic weight
//!     - I      = synaptic conductance (mS/cm^2)
//! ```
//!
//! No state is carried between steps, so a single inner iteration per step is
//! enough; `dt` is passed for signature uniformity only.

use super::ComponentModel;
use crate::backend::{HostBody, HostFrame};
use crate::template::KernelTemplate;
use crate::types::Scalar;

/// Registry name of the model
pub const ROTN: &str = "RotN";

const ACCESSES: &[&str] = &["V", "Vd"];
const PARAMS: &[&str] = &["weight"];
const UPDATES: &[&str] = &["I"];

// Each access holds one value per instance. With several upstream edges on the
// same access only the last value written into the dense buffer is seen.
const UPDATE_TEMPLATE: KernelTemplate = KernelTemplate::new(
    "update",
    r#"
__global__ void update(int num_comps, {{dt}} dt, int steps,
                       {{V}}* g_V, {{Vd}}* g_Vd,
                       {{weight}}* g_weight, {{I}}* g_I)
{
    int tid = threadIdx.x + blockIdx.x * blockDim.x;
    int total_threads = gridDim.x * blockDim.x;

    {{V}} V;
    {{Vd}} Vd;
    {{weight}} weight;

    for (int i = tid; i < num_comps; i += total_threads)
    {
        V = g_V[i];
        Vd = g_Vd[i];
        weight = g_weight[i];

        g_I[i] = V * Vd * weight;
    }
}
"#,
);

/// RotN synapse model
#[derive(Debug, Clone, Copy, Default)]
pub struct RotN;

impl RotN {
    pub fn new() -> Self {
        Self
    }
}

/// `I = V * Vd * weight`, evaluated left to right with C promotions
fn rotn_body(_frame: &HostFrame, inputs: &[Scalar], outputs: &mut [Scalar]) {
    outputs[0] = inputs[0] * inputs[1] * inputs[2];
}

impl ComponentModel for RotN {
    fn name(&self) -> &'static str {
        ROTN
    }

    fn accesses(&self) -> &'static [&'static str] {
        ACCESSES
    }

    fn params(&self) -> &'static [&'static str] {
        PARAMS
    }

    fn updates(&self) -> &'static [&'static str] {
        UPDATES
    }

    fn template(&self) -> KernelTemplate {
        UPDATE_TEMPLATE
    }

    fn host_body(&self) -> HostBody {
        rotn_body
    }
}
