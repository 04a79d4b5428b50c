//! Fixed-capacity device table.
//!
//! One record per slot, each owning its identity header and its own
//! two-generation counter pair. Capacity is set once from the startup
//! discovery pass and never grows; a device appearing beyond capacity
//! is dropped by the caller, never stored partially.

use std::fmt;

use crate::store::generation::GenerationPair;
use crate::store::model::IoCounters;

/// Registration state of one slot. Exactly one state holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    /// Tombstoned at tick start; freed if still unregistered after the
    /// collection pass.
    #[default]
    Unregistered,
    /// Seen during the current collection pass.
    Registered,
    /// Group pseudo-device. Never reverts to Unregistered.
    Group,
}

/// Identity and lifecycle header of one slot.
#[derive(Debug, Clone, Default)]
pub struct DeviceHeader {
    pub name: String,
    pub used: bool,
    pub status: DeviceStatus,
    /// Devices folded into this group in the last pass; the
    /// utilization averaging divisor. 0 for plain devices.
    pub members: u32,
}

/// One registry slot: header plus its own double-buffered counters.
#[derive(Debug, Clone, Default)]
pub struct DeviceSlot {
    pub header: DeviceHeader,
    pub counters: GenerationPair<IoCounters>,
}

/// Stable handle to a registry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

/// A new device arrived and no free slot remains. The row is dropped;
/// every other slot is unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryFull;

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device registry full")
    }
}

impl std::error::Error for RegistryFull {}

/// Fixed-size table of tracked devices and group pseudo-devices.
#[derive(Debug)]
pub struct DeviceTable {
    slots: Vec<DeviceSlot>,
}

impl DeviceTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![DeviceSlot::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: SlotId) -> &DeviceSlot {
        &self.slots[id.0]
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut DeviceSlot {
        &mut self.slots[id.0]
    }

    /// Slots in table order. Group membership is positional, so
    /// iteration order is load-bearing.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &DeviceSlot)> {
        self.slots.iter().enumerate().map(|(i, s)| (SlotId(i), s))
    }

    /// Finds a used slot by device name.
    pub fn lookup(&self, name: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.header.used && s.header.name == name)
            .map(SlotId)
    }

    /// Resolves a name to its slot, claiming the first free slot for a
    /// name not seen before. Claimed slots start with both counter
    /// generations zeroed.
    pub fn register(&mut self, name: &str) -> Result<SlotId, RegistryFull> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        let free = self
            .slots
            .iter()
            .position(|s| !s.header.used)
            .ok_or(RegistryFull)?;
        let slot = &mut self.slots[free];
        slot.header = DeviceHeader {
            name: name.to_string(),
            used: true,
            status: DeviceStatus::Unregistered,
            members: 0,
        };
        slot.counters.reset();
        Ok(SlotId(free))
    }

    /// Registers a group pseudo-device in the next free slot. All
    /// previously registered devices become its positional members.
    pub fn register_group(&mut self, name: &str) -> Result<SlotId, RegistryFull> {
        let id = self.register(name)?;
        self.slots[id.0].header.status = DeviceStatus::Group;
        Ok(id)
    }

    /// Installs a group marker in the final slot, so that every
    /// dynamically discovered device lands positionally before it.
    /// Used when no explicit device list was configured.
    pub fn place_group_last(&mut self, name: &str) -> SlotId {
        let last = self.slots.len() - 1;
        let slot = &mut self.slots[last];
        slot.header = DeviceHeader {
            name: name.to_string(),
            used: true,
            status: DeviceStatus::Group,
            members: 0,
        };
        slot.counters.reset();
        SlotId(last)
    }

    /// Tick-start tombstone pass: every Registered slot becomes
    /// Unregistered until the collectors see it again. Group slots are
    /// exempt.
    pub fn mark_all_unregistered(&mut self) {
        for slot in &mut self.slots {
            if slot.header.status == DeviceStatus::Registered {
                slot.header.status = DeviceStatus::Unregistered;
            }
        }
    }

    /// Frees any slot still Unregistered after a full collection pass;
    /// the device disappeared since the last tick.
    pub fn free_unregistered(&mut self) {
        for slot in &mut self.slots {
            if slot.header.status == DeviceStatus::Unregistered {
                slot.header.used = false;
            }
        }
    }

    /// Promotes every slot's current generation to previous.
    pub fn swap_all(&mut self) {
        for slot in &mut self.slots {
            slot.counters.swap();
        }
    }
}
