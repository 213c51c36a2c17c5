use serde::{Deserialize, Serialize};

/// Observable properties of a [`super::WorkspaceModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkspaceProperty {
    Server,
    Name,
    Computer,
    Owner,
    Comment,
    Mappings,
    Location,
    Loading,
    Saving,
    Syncing,
}

/// `ModelChange` is what listeners receive after a committed mutation.
///
/// Setters and flag changes report the single property that changed. A
/// completed load reports `All`, since every field may have been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "property")]
pub enum ModelChange {
    Property(WorkspaceProperty),
    All,
}

impl ModelChange {
    pub fn affects(self, property: WorkspaceProperty) -> bool {
        match self {
            Self::All => true,
            Self::Property(changed) => changed == property,
        }
    }
}
