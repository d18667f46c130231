//! Domain extractors built on the walker, and the context they fill in.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};

pub mod packet_instructions;
pub mod registry;

pub const SCHEMA_VERSION: u32 = 1;

/// Everything an extraction run produces. Each topping writes only its own
/// section and reads the class roles.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Extraction {
    pub schema_version: u32,
    pub classes: ClassRoles,
    pub packets: PacketSection,
    pub registry: RegistrySection,
}

impl Extraction {
    pub fn new(classes: ClassRoles) -> Self {
        Extraction {
            schema_version: SCHEMA_VERSION,
            classes,
            ..Self::default()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Role name (`packet.packetbuffer`, `nbtcompound`, ...) to internal class name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassRoles(BTreeMap<String, String>);

impl ClassRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: &str, class: &str) -> &mut Self {
        self.0.insert(role.to_string(), class.to_string());
        self
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.0.get(role).map(String::as_str)
    }

    /// Like [`ClassRoles::get`], failing when nobody identified the role.
    pub fn require(&self, role: &str) -> Result<&str> {
        self.get(role)
            .ok_or_else(|| Error::Resolution(format!("no class identified as {role}")))
    }

    /// Whether `class` plays `role`.
    pub fn is(&self, role: &str, class: &str) -> bool {
        self.get(role) == Some(class)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ClassRoles {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut roles = ClassRoles::new();
        for (role, class) in iter {
            roles.insert(role, class);
        }
        roles
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PacketSection {
    pub packets: BTreeMap<String, PacketEntry>,
    /// Set when no position class was identified and the first unknown
    /// single-argument buffer call was taken to be it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assumed_position_class: Option<String>,
}

impl PacketSection {
    pub fn insert(&mut self, key: &str, class: &str) {
        self.packets.insert(
            key.to_string(),
            PacketEntry {
                class: class.to_string(),
                instructions: None,
            },
        );
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PacketEntry {
    pub class: String,
    /// Left empty when the packet could not be decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegistrySection {
    /// Text id to the registered entry.
    pub entries: BTreeMap<String, serde_json::Value>,
    /// Text ids in registration order.
    pub ordered: Vec<String>,
    /// Static field name to the text id of the entry stored in it.
    pub fields: BTreeMap<String, String>,
}
