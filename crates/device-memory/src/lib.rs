// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-memory
//!
//! The accelerator side of the device lineage cache: the handle type for
//! device allocations, the trait the cache uses to query and free them, and
//! a simulated pool for running the cache without a GPU.
//!
//! # Key Components
//!
//! - [`DevicePtr`]: an opaque, `Copy` handle to a device block. Dropping a
//!   handle never frees anything; freeing is an explicit call.
//! - [`DeviceMemory`]: `size_of`, `free` and `total_memory_pool`, the three
//!   calls the cache core makes into an accelerator memory manager.
//! - [`SimulatedDevice`]: a budget-enforced, bookkeeping-only
//!   implementation of [`DeviceMemory`] with [`DeviceStats`].
//! - [`ByteSize`]: human-readable sizes (`"512M"`, `"16G"`) for configs.
//!
//! # Example
//! ```
//! use device_memory::{ByteSize, DeviceMemory, SimulatedDevice};
//!
//! let device = SimulatedDevice::new(ByteSize::parse("64M").unwrap());
//! let a = device.allocate(1024 * 1024).unwrap();
//! let b = device.allocate(512 * 1024).unwrap();
//! assert_eq!(device.allocated_bytes(), 1024 * 1024 + 512 * 1024);
//!
//! device.free(a).unwrap();
//! assert_eq!(device.size_of(b).unwrap(), 512 * 1024);
//! ```

mod device;
mod error;
mod handle;
mod simulated;
mod size;
mod stats;

pub use device::DeviceMemory;
pub use error::DeviceError;
pub use handle::DevicePtr;
pub use simulated::SimulatedDevice;
pub use size::ByteSize;
pub use stats::DeviceStats;
