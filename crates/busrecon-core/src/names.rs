//! Display-only name tables
//!
//! Maps observed field values (device addresses, message types) to
//! human-readable labels for reports. The tables are data, consulted only
//! by formatting paths — parsing and analysis never look at them, so label
//! updates never touch the core algorithms. Labels for unconfirmed guesses
//! carry a trailing `?` by convention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Swappable lookup table from field values to display labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameTable {
    /// Device address labels
    #[serde(default)]
    addresses: HashMap<u64, String>,
    /// Message type labels
    #[serde(default)]
    message_types: HashMap<u64, String>,
}

impl NameTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Address guesses collected from installer notes and similar systems.
    ///
    /// Every entry is unverified, hence the question marks.
    pub fn well_known_guesses() -> Self {
        let mut table = Self::new();
        table.set_address(0x1f1f, "broadcast?");
        table.set_address(0x2001, "thermostat?");
        table.set_address(0x4001, "air handler?");
        table.set_address(0x5001, "outdoor unit?");
        table
    }

    /// Add or replace an address label
    pub fn set_address(&mut self, address: u64, label: impl Into<String>) {
        self.addresses.insert(address, label.into());
    }

    /// Add or replace a message type label
    pub fn set_message_type(&mut self, code: u64, label: impl Into<String>) {
        self.message_types.insert(code, label.into());
    }

    /// Label for an address, if one is known
    pub fn address_label(&self, address: u64) -> Option<&str> {
        self.addresses.get(&address).map(String::as_str)
    }

    /// Label for a message type, if one is known
    pub fn message_type_label(&self, code: u64) -> Option<&str> {
        self.message_types.get(&code).map(String::as_str)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
