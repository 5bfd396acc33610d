//! Capacity reference: the static table of known sites.
//!
//! Loaded once per run and never mutated afterwards. Every component receives
//! it by shared reference.

use std::collections::{BTreeMap, HashMap};

use cpo_common::{fold_name, SiteId};
use serde::{Deserialize, Serialize};

use crate::load::ConfigError;

/// Capacity and naming for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCapacity {
    pub site_id: SiteId,
    pub display_name: String,
    pub total_spaces: u32,
    /// Other spellings the remote source uses for this site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl SiteCapacity {
    pub fn new(site_id: impl Into<String>, display_name: &str, total_spaces: u32) -> Self {
        Self {
            site_id: SiteId::new(site_id),
            display_name: display_name.to_string(),
            total_spaces,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// Immutable site id → capacity table with a folded-name index.
#[derive(Debug, Clone, Default)]
pub struct CapacityReference {
    sites: BTreeMap<SiteId, SiteCapacity>,
    names: HashMap<String, SiteId>,
}

impl CapacityReference {
    /// Build the table, rejecting duplicate ids and zero capacities.
    pub fn from_entries(entries: Vec<SiteCapacity>) -> Result<Self, ConfigError> {
        let mut sites = BTreeMap::new();
        let mut names = HashMap::new();

        for entry in entries {
            if entry.total_spaces == 0 {
                return Err(ConfigError::ZeroCapacity(entry.site_id));
            }
            if sites.contains_key(&entry.site_id) {
                return Err(ConfigError::DuplicateSite(entry.site_id));
            }

            let spellings = std::iter::once(entry.site_id.as_str())
                .chain(std::iter::once(entry.display_name.as_str()))
                .chain(entry.aliases.iter().map(String::as_str));
            for spelling in spellings {
                names
                    .entry(fold_name(spelling))
                    .or_insert_with(|| entry.site_id.clone());
            }

            sites.insert(entry.site_id.clone(), entry);
        }

        Ok(Self { sites, names })
    }

    pub fn get(&self, site_id: &SiteId) -> Option<&SiteCapacity> {
        self.sites.get(site_id)
    }

    pub fn contains(&self, site_id: &SiteId) -> bool {
        self.sites.contains_key(site_id)
    }

    /// Resolve a payload spelling (id, display name or alias) to a site id.
    pub fn resolve_name(&self, name: &str) -> Option<&SiteId> {
        self.names.get(&fold_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteCapacity> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
