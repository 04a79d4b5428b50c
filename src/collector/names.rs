//! External device-name lookups.
//!
//! Canonical-name tables and device-mapper naming live outside this
//! crate; the trait below is the seam through which the table source
//! consults them before a row is stored.

use std::collections::HashMap;

/// Name lookups keyed by the device's major:minor pair.
pub trait NameResolver {
    /// Canonical name for the pair, if the table knows one.
    fn canonical(&self, major: u32, minor: u32) -> Option<&str>;

    /// Logical name of a device-mapper device, if the pair is one.
    fn devmap(&self, major: u32, minor: u32) -> Option<&str>;
}

/// Resolver with no tables; every kernel name passes through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl NameResolver for NoResolver {
    fn canonical(&self, _major: u32, _minor: u32) -> Option<&str> {
        None
    }

    fn devmap(&self, _major: u32, _minor: u32) -> Option<&str> {
        None
    }
}

/// Map-backed resolver loaded from prebuilt tables.
#[derive(Debug, Default, Clone)]
pub struct StaticNames {
    canonical: HashMap<(u32, u32), String>,
    devmap: HashMap<(u32, u32), String>,
}

impl StaticNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_canonical(&mut self, major: u32, minor: u32, name: impl Into<String>) {
        self.canonical.insert((major, minor), name.into());
    }

    pub fn add_devmap(&mut self, major: u32, minor: u32, name: impl Into<String>) {
        self.devmap.insert((major, minor), name.into());
    }
}

impl NameResolver for StaticNames {
    fn canonical(&self, major: u32, minor: u32) -> Option<&str> {
        self.canonical.get(&(major, minor)).map(String::as_str)
    }

    fn devmap(&self, major: u32, minor: u32) -> Option<&str> {
        self.devmap.get(&(major, minor)).map(String::as_str)
    }
}

/// Placeholder canonical entry meaning "no such device"; never
/// substituted.
const NODEV: &str = "nodev";

/// Applies both lookups in display order: canonical substitution
/// first, then the device-mapper translation on top.
pub fn resolve_name(resolver: &dyn NameResolver, major: u32, minor: u32, raw: &str) -> String {
    let mut name = raw;
    if let Some(canonical) = resolver.canonical(major, minor)
        && canonical != raw
        && canonical != NODEV
    {
        name = canonical;
    }
    if let Some(dm) = resolver.devmap(major, minor) {
        name = dm;
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resolver_passes_names_through() {
        assert_eq!(resolve_name(&NoResolver, 8, 0, "sda"), "sda");
    }

    #[test]
    fn canonical_substitution_skips_nodev() {
        let mut names = StaticNames::new();
        names.add_canonical(8, 0, "emcpowera");
        names.add_canonical(8, 16, "nodev");

        assert_eq!(resolve_name(&names, 8, 0, "sda"), "emcpowera");
        assert_eq!(resolve_name(&names, 8, 16, "sdb"), "sdb");
        assert_eq!(resolve_name(&names, 8, 32, "sdc"), "sdc");
    }

    #[test]
    fn devmap_translation_wins_over_canonical() {
        let mut names = StaticNames::new();
        names.add_canonical(253, 0, "dm-0");
        names.add_devmap(253, 0, "vg0-root");

        assert_eq!(resolve_name(&names, 253, 0, "dm-0"), "vg0-root");
    }
}
