// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Launch geometry: a fixed block size and a grid capped at a multiple of the
//! device's multiprocessor count. Kernels fold the `N` logical lanes onto the
//! physical ones with a grid-stride loop, so correctness never depends on the
//! grid covering `N`.

use core::iter::StepBy;
use core::ops::Range;

use crate::types::{KernelError, Result};

pub const DEFAULT_BLOCK_SIZE: u32 = 256;
pub const DEFAULT_BLOCKS_PER_MULTIPROCESSOR: u32 = 6;
pub const WARP_SIZE: u32 = 32;
pub const MAX_BLOCK_SIZE: u32 = 1024;

/// How a grid is sized for a given instance count and device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPolicy {
    pub block_size: u32,
    /// Grid cap per multiprocessor (`K` in `min(K x SMs, ceil(N / block))`)
    pub blocks_per_multiprocessor: u32,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            blocks_per_multiprocessor: DEFAULT_BLOCKS_PER_MULTIPROCESSOR,
        }
    }
}

impl LaunchPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0
            || self.block_size % WARP_SIZE != 0
            || self.block_size > MAX_BLOCK_SIZE
        {
            return Err(KernelError::InvalidGeometry(format!(
                "block size {} must be a positive multiple of {} not above {}",
                self.block_size, WARP_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if self.blocks_per_multiprocessor == 0 {
            return Err(KernelError::InvalidGeometry(
                "blocks per multiprocessor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Grid for `num_comps` instances on a device with `multiprocessors` SMs
    pub fn geometry(&self, num_comps: usize, multiprocessors: usize) -> Result<LaunchGeometry> {
        self.validate()?;
        if num_comps == 0 {
            return Err(KernelError::InvalidGeometry(
                "cannot size a grid for zero instances".to_string(),
            ));
        }
        if multiprocessors == 0 {
            return Err(KernelError::InvalidGeometry(
                "device reports zero multiprocessors".to_string(),
            ));
        }

        let block = self.block_size as usize;
        let needed = (num_comps - 1) / block + 1;
        let cap = (self.blocks_per_multiprocessor as usize).saturating_mul(multiprocessors);
        let grid = needed.min(cap);
        let grid_size = u32::try_from(grid).map_err(|_| {
            KernelError::InvalidGeometry(format!("grid of {} blocks exceeds device limits", grid))
        })?;

        Ok(LaunchGeometry {
            block_size: self.block_size,
            grid_size,
        })
    }
}

/// One-dimensional launch shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchGeometry {
    pub block_size: u32,
    pub grid_size: u32,
}

impl LaunchGeometry {
    pub fn total_lanes(&self) -> usize {
        self.block_size as usize * self.grid_size as usize
    }

    /// Instance indices handled by physical lane `lane` (grid-stride loop)
    pub fn lane_indices(&self, lane: usize, num_comps: usize) -> StepBy<Range<usize>> {
        (lane..num_comps).step_by(self.total_lanes().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_capped_by_multiprocessors() {
        let policy = LaunchPolicy::default();
        let small = policy.geometry(3, 80).unwrap();
        assert_eq!(small.grid_size, 1);
        assert_eq!(small.block_size, 256);

        let exact = policy.geometry(512, 80).unwrap();
        assert_eq!(exact.grid_size, 2);

        let large = policy.geometry(10_000_000, 80).unwrap();
        assert_eq!(large.grid_size, 480);
    }

    #[test]
    fn test_rejects_bad_policies() {
        let odd = LaunchPolicy {
            block_size: 100,
            ..Default::default()
        };
        assert!(odd.validate().is_err());

        let huge = LaunchPolicy {
            block_size: 2048,
            ..Default::default()
        };
        assert!(huge.validate().is_err());

        let no_blocks = LaunchPolicy {
            blocks_per_multiprocessor: 0,
            ..Default::default()
        };
        assert!(no_blocks.geometry(10, 4).is_err());
    }

    #[test]
    fn test_zero_instances_or_multiprocessors() {
        let policy = LaunchPolicy::default();
        assert!(matches!(
            policy.geometry(0, 4),
            Err(KernelError::InvalidGeometry(_))
        ));
        assert!(matches!(
            policy.geometry(4, 0),
            Err(KernelError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_lanes_cover_every_index_once() {
        let geometry = LaunchGeometry {
            block_size: 32,
            grid_size: 2,
        };
        let n = 200;
        let mut seen = vec![0u32; n];
        for lane in 0..geometry.total_lanes() {
            for i in geometry.lane_indices(lane, n) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }
}
