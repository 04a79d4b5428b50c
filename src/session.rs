//! Owned sampling state.
//!
//! One `Session` carries everything a run mutates: the device table,
//! the CPU and uptime generation pairs and the policy. Every operation
//! takes the session by reference; there is no process-global state.

use tracing::debug;

use crate::config::Config;
use crate::rates;
use crate::store::generation::GenerationPair;
use crate::store::model::{CpuCounters, IoCounters};
use crate::store::registry::{DeviceStatus, DeviceTable};

pub struct Session {
    config: Config,
    devices: DeviceTable,
    cpu: GenerationPair<CpuCounters>,
    cpu0: GenerationPair<CpuCounters>,
    /// All-CPU jiffy base for interval math.
    uptime: GenerationPair<u64>,
    /// Single-processor base; disk rates use it on SMP machines.
    uptime0: GenerationPair<u64>,
    cpu_count: usize,
}

impl Session {
    /// Builds a session with a fixed device capacity and installs the
    /// configured devices and group marker in their positional order.
    pub fn new(config: Config, capacity: usize, cpu_count: usize) -> Self {
        let mut devices = DeviceTable::with_capacity(capacity);

        for spec in &config.devices {
            if devices.register(&spec.name).is_err() {
                debug!(device = %spec.name, "no slot for configured device");
            }
        }
        if let Some(group) = &config.group {
            if config.devices.is_empty() {
                // Every discovered device should fold into the group:
                // the marker goes last.
                devices.place_group_last(group);
            } else if devices.register_group(group).is_err() {
                debug!(group = %group, "no slot for configured group");
            }
        }

        Self {
            config,
            devices,
            cpu: GenerationPair::new(),
            cpu0: GenerationPair::new(),
            uptime: GenerationPair::new(),
            uptime0: GenerationPair::new(),
            cpu_count,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    pub fn cpu(&self) -> &GenerationPair<CpuCounters> {
        &self.cpu
    }

    /// The single write path from a parsed counter row into the table.
    ///
    /// Resolves or allocates the slot, stores the row in the current
    /// generation and registers the device. Group status is preserved,
    /// never downgraded. With no free slot the row is dropped and
    /// every other slot stays untouched.
    pub fn save_stats(&mut self, name: &str, row: IoCounters) {
        match self.devices.register(name) {
            Ok(id) => {
                let slot = self.devices.get_mut(id);
                if slot.header.status == DeviceStatus::Unregistered {
                    slot.header.status = DeviceStatus::Registered;
                }
                *slot.counters.current_mut() = row;
            }
            Err(_) => debug!(device = name, "registry full, dropping row"),
        }
    }

    /// Tick-start tombstone pass.
    pub fn begin_collection(&mut self) {
        self.devices.mark_all_unregistered();
    }

    /// Tick-end cleanup: slots for devices that disappeared since the
    /// last tick are reclaimed.
    pub fn end_collection(&mut self) {
        self.devices.free_unregistered();
    }

    /// Stores this tick's CPU rows and uptime bases. `uptime_ticks`
    /// comes from the uptime pseudo-file; when it is unreadable the
    /// first processor's jiffy sum stands in.
    pub fn record_cpu(&mut self, all: CpuCounters, cpu0: CpuCounters, uptime_ticks: Option<u64>) {
        *self.cpu.current_mut() = all;
        *self.cpu0.current_mut() = cpu0;
        *self.uptime.current_mut() = all.total();
        *self.uptime0.current_mut() = uptime_ticks.unwrap_or_else(|| cpu0.total());
    }

    /// Elapsed ticks between generations over all processors.
    pub fn interval(&self) -> u64 {
        rates::interval_ticks(*self.uptime.previous(), *self.uptime.current())
    }

    /// The interval reduced to a single processor; disk counters tick
    /// in wall time, not CPU time.
    pub fn disk_interval(&self) -> u64 {
        if self.cpu_count > 1 {
            rates::interval_ticks(*self.uptime0.previous(), *self.uptime0.current())
        } else {
            self.interval()
        }
    }

    /// Folds Registered rows into Group pseudo-rows.
    ///
    /// Walks the table once in slot order: consecutive Registered rows
    /// accumulate until a Group slot flushes the running sum under the
    /// group's name and records the member count. Membership is purely
    /// positional.
    pub fn aggregate_groups(&mut self) {
        let include_idle = self.config.include_idle;
        let mut sum = IoCounters::default();
        let mut members = 0u32;
        let mut pending: Vec<(String, IoCounters, u32)> = Vec::new();

        for (_, slot) in self.devices.iter() {
            let header = &slot.header;
            if header.used && header.status == DeviceStatus::Registered {
                let row = slot.counters.current();
                if !include_idle && row.is_idle() {
                    continue;
                }
                sum.add(row);
                members += 1;
            } else if header.status == DeviceStatus::Group {
                pending.push((header.name.clone(), sum, members));
                sum = IoCounters::default();
                members = 0;
            }
        }

        for (name, row, members) in pending {
            self.save_stats(&name, row);
            if let Some(id) = self.devices.lookup(&name) {
                self.devices.get_mut(id).header.members = members;
            }
        }
    }

    /// Promotes every current generation to previous. The single
    /// tick-boundary operation.
    pub fn swap_generations(&mut self) {
        self.devices.swap_all();
        self.cpu.swap();
        self.cpu0.swap();
        self.uptime.swap();
        self.uptime0.swap();
    }
}
