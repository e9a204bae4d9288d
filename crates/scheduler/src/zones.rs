//! Cloud-region to power-zone registry.
//!
//! The registry is closed-world and case-sensitive: a cloud region
//! identifier like `gcp:us-west2` maps to the power-grid zone the
//! forecast provider understands (`CAISO_NORTH`). Adding a region is
//! a code change, not configuration.

use std::collections::HashMap;
use std::fmt;

/// Opaque power-grid zone token understood by the forecast provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PowerZone(String);

impl PowerZone {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PowerZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cloud service provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudProvider {
    Aws,
    Gcp,
    Azure,
}

impl CloudProvider {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "aws" => Some(Self::Aws),
            "gcp" => Some(Self::Gcp),
            "azure" => Some(Self::Azure),
            _ => None,
        }
    }
}

/// A specific region within a cloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloudRegion {
    pub provider: CloudProvider,
    pub name: String,
}

impl CloudRegion {
    /// Parse a `provider:name` identifier (e.g. `gcp:us-west2`).
    pub fn parse(identifier: &str) -> Option<Self> {
        let (provider, name) = identifier.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            provider: CloudProvider::parse(provider)?,
            name: name.to_string(),
        })
    }
}

/// Resolves user-supplied zone identifiers to power zones.
pub trait ZoneLookup: Send + Sync {
    /// Returns the power zone for `identifier`, or `None` when the
    /// identifier is unknown or malformed.
    fn get_power_zone(&self, identifier: &str) -> Option<PowerZone>;
}

/// The production registry backed by the static region table.
#[derive(Debug, Default)]
pub struct StaticZoneLookup;

impl StaticZoneLookup {
    pub fn new() -> Self {
        Self
    }
}

impl ZoneLookup for StaticZoneLookup {
    fn get_power_zone(&self, identifier: &str) -> Option<PowerZone> {
        let region = CloudRegion::parse(identifier)?;
        power_zone_for(&region)
    }
}

/// Map-backed lookup for tests; mirrors the production contract with
/// caller-chosen contents.
#[derive(Debug, Default)]
pub struct MockZoneLookup {
    zones: HashMap<String, PowerZone>,
}

impl MockZoneLookup {
    pub fn new(zones: HashMap<String, PowerZone>) -> Self {
        Self { zones }
    }
}

impl ZoneLookup for MockZoneLookup {
    fn get_power_zone(&self, identifier: &str) -> Option<PowerZone> {
        self.zones.get(identifier).cloned()
    }
}

/// The static cloud-region to power-zone table.
fn power_zone_for(region: &CloudRegion) -> Option<PowerZone> {
    let zone = match (region.provider, region.name.as_str()) {
        (CloudProvider::Gcp, "us-west2") => "CAISO_NORTH",
        (CloudProvider::Gcp, "us-east4") => "PJM_DC",
        (CloudProvider::Gcp, "europe-west3") => "DE",
        (CloudProvider::Gcp, "australia-southeast1") => "NEM_NSW",
        _ => return None,
    };
    Some(PowerZone::new(zone))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_regions_resolve() {
        let lookup = StaticZoneLookup::new();

        assert_eq!(
            lookup.get_power_zone("gcp:us-west2"),
            Some(PowerZone::new("CAISO_NORTH"))
        );
        assert_eq!(
            lookup.get_power_zone("gcp:us-east4"),
            Some(PowerZone::new("PJM_DC"))
        );
        assert_eq!(
            lookup.get_power_zone("gcp:europe-west3"),
            Some(PowerZone::new("DE"))
        );
        assert_eq!(
            lookup.get_power_zone("gcp:australia-southeast1"),
            Some(PowerZone::new("NEM_NSW"))
        );
    }

    #[test]
    fn unknown_identifiers_fail() {
        let lookup = StaticZoneLookup::new();

        assert_eq!(lookup.get_power_zone("gcp:nowhere-1"), None);
        assert_eq!(lookup.get_power_zone("aws:us-east-1"), None);
        assert_eq!(lookup.get_power_zone("not-a-region"), None);
        assert_eq!(lookup.get_power_zone("gcp:"), None);
        assert_eq!(lookup.get_power_zone(""), None);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let lookup = StaticZoneLookup::new();

        assert_eq!(lookup.get_power_zone("GCP:us-west2"), None);
        assert_eq!(lookup.get_power_zone("gcp:US-WEST2"), None);
    }

    #[test]
    fn mock_lookup_uses_supplied_map() {
        let mut zones = HashMap::new();
        zones.insert("TestZone".to_string(), PowerZone::new("TEST_REGION"));
        let lookup = MockZoneLookup::new(zones);

        assert_eq!(
            lookup.get_power_zone("TestZone"),
            Some(PowerZone::new("TEST_REGION"))
        );
        assert_eq!(lookup.get_power_zone("gcp:us-west2"), None);
    }
}
