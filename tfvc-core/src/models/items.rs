use serde::{Deserialize, Serialize};

/// Server side change kinds as presented to callers. Several tool change
/// names collapse into one kind (`source rename` is a rename, `property` an
/// edit) and the ones with no counterpart become `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum ServerStatusType {
    Add,
    Edit,
    Rename,
    Delete,
    Undelete,
    Branch,
    Merge,
    Lock,
    Unknown,
}

impl ServerStatusType {
    pub fn from_change_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "add" => Self::Add,
            "edit" | "property" => Self::Edit,
            "rename" | "source rename" => Self::Rename,
            "delete" => Self::Delete,
            "undelete" => Self::Undelete,
            "branch" => Self::Branch,
            "merge" => Self::Merge,
            "lock" => Self::Lock,
            _ => Self::Unknown,
        }
    }

    /// Parses a comma separated change list such as `edit, encoding`.
    pub fn parse_list(changes: &str) -> Vec<Self> {
        let mut kinds: Vec<Self> = changes
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("none"))
            .map(Self::from_change_name)
            .collect();
        kinds.dedup();
        kinds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub server_item: String,
    pub local_item: Option<String>,
    pub version: Option<String>,
    pub owner: Option<String>,
    pub date: Option<String>,
    pub lock: Option<String>,
    pub change_types: Vec<ServerStatusType>,
    pub workspace: Option<String>,
    pub computer: Option<String>,
    pub is_candidate: bool,
    pub source_item: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub server_item: String,
    pub local_item: Option<String>,
    pub local_version: Option<i64>,
    pub server_version: Option<i64>,
    pub change: String,
    pub item_type: String,
    pub lock: String,
    pub lock_owner: Option<String>,
    pub deletion_id: i64,
    pub last_modified: Option<String>,
    pub file_encoding: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
    Any,
}

/// Everything the tool reports for one item, before it is reduced to the
/// `ItemInfo` callers consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedItemInfo {
    pub server_item: String,
    pub local_item: Option<String>,
    pub local_version: Option<i64>,
    pub latest_version: Option<i64>,
    pub pending_change: Vec<String>,
    pub item_type: ItemType,
    pub lock_level: Option<String>,
    pub lock_owner: Option<String>,
    pub deletion_id: i64,
    pub checkin_date: Option<String>,
    pub encoding: Option<String>,
    pub file_size: Option<u64>,
}

impl ExtendedItemInfo {
    pub fn to_item_info(&self) -> ItemInfo {
        let change = if self.pending_change.is_empty() {
            "none".to_string()
        } else {
            self.pending_change.join(", ")
        };

        // Folders carry no encoding; "unchanged" is not a real encoding.
        let file_encoding = match self.item_type {
            ItemType::File => self
                .encoding
                .clone()
                .filter(|encoding| !encoding.eq_ignore_ascii_case("unchanged")),
            _ => None,
        };

        ItemInfo {
            server_item: self.server_item.clone(),
            local_item: self.local_item.clone(),
            local_version: self.local_version,
            server_version: self.latest_version,
            change,
            item_type: self.item_type.to_string(),
            lock: self.lock_level.clone().unwrap_or_else(|| "none".to_string()),
            lock_owner: self.lock_owner.clone(),
            deletion_id: self.deletion_id,
            last_modified: self.checkin_date.clone(),
            file_encoding,
            file_size: self.file_size,
        }
    }
}
