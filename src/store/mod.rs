//! Device table and double-buffered counter storage.

pub mod generation;
pub mod model;
pub mod registry;

pub use generation::GenerationPair;
pub use model::{CpuCounters, IoCounters};
pub use registry::{DeviceSlot, DeviceStatus, DeviceTable, RegistryFull, SlotId};
