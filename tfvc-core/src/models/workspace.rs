use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the workspace's local state is kept.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Local,
    Server,
    #[default]
    Unknown,
}

/// One working folder. Order inside a workspace is preserved as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub server_path: String,
    pub local_path: PathBuf,
    pub cloaked: bool,
}

impl Mapping {
    pub fn new(server_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            server_path: server_path.into(),
            local_path: local_path.into(),
            cloaked: false,
        }
    }

    pub fn cloaked(server_path: impl Into<String>) -> Self {
        Self {
            server_path: server_path.into(),
            local_path: PathBuf::new(),
            cloaked: true,
        }
    }

    /// `$/proj/*` maps only the direct children of `$/proj`.
    pub fn is_recursive(&self) -> bool {
        !self.server_path.ends_with("/*")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub server: String,
    pub name: String,
    pub computer: String,
    pub owner: String,
    pub comment: String,
    pub mappings: Vec<Mapping>,
    pub location: Location,
}

/// Element-wise ordered comparison; an absent list equals an empty one.
pub fn mappings_differ(left: Option<&[Mapping]>, right: Option<&[Mapping]>) -> bool {
    left.unwrap_or_default() != right.unwrap_or_default()
}

/// The minimal set of edits that turns `old` into `new` on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceDiff {
    pub new_name: Option<String>,
    pub new_comment: Option<String>,
    pub new_location: Option<Location>,
    pub mappings_to_remove: Vec<Mapping>,
    pub mappings_to_add: Vec<Mapping>,
}

impl WorkspaceDiff {
    pub fn between(old: &Workspace, new: &Workspace) -> Self {
        let changed = |a: &str, b: &str| (a != b).then(|| b.to_string());

        let new_location = (old.location != new.location && new.location != Location::Unknown)
            .then_some(new.location);

        // Mapping a server path again replaces its local path, so only
        // mappings that disappeared, or cloaks being lifted, are removed.
        let mappings_to_remove = old
            .mappings
            .iter()
            .filter(|mapping| !new.mappings.contains(mapping))
            .filter(|mapping| {
                !new.mappings
                    .iter()
                    .any(|candidate| candidate.server_path == mapping.server_path)
                    || mapping.cloaked
            })
            .cloned()
            .collect();

        let mappings_to_add = new
            .mappings
            .iter()
            .filter(|mapping| !old.mappings.contains(mapping))
            .cloned()
            .collect();

        Self {
            new_name: changed(&old.name, &new.name),
            new_comment: changed(&old.comment, &new.comment),
            new_location,
            mappings_to_remove,
            mappings_to_add,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_name.is_none()
            && self.new_comment.is_none()
            && self.new_location.is_none()
            && self.mappings_to_remove.is_empty()
            && self.mappings_to_add.is_empty()
    }

    pub fn changes_properties(&self) -> bool {
        self.new_name.is_some() || self.new_comment.is_some() || self.new_location.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn workspace(mappings: Vec<Mapping>) -> Workspace {
        Workspace {
            server: "http://server:8080/tfs/DefaultCollection".to_string(),
            name: "W1".to_string(),
            computer: "box".to_string(),
            owner: "dev".to_string(),
            comment: String::new(),
            mappings,
            location: Location::Local,
        }
    }

    #[test]
    fn test_mappings_differ() {
        let a = vec![Mapping::new("$/p/a", "/ws/a"), Mapping::new("$/p/b", "/ws/b")];
        let reordered = vec![a[1].clone(), a[0].clone()];

        assert!(!mappings_differ(None, Some(&[])));
        assert!(!mappings_differ(Some(&a), Some(&a.clone())));
        assert!(mappings_differ(Some(&a), Some(&reordered)));
        assert!(mappings_differ(Some(&a), None));
    }

    #[test]
    fn test_identical_workspaces_have_empty_diff() {
        let ws = workspace(vec![Mapping::new("$/p", "/ws")]);
        assert!(WorkspaceDiff::between(&ws, &ws.clone()).is_empty());
    }

    #[test]
    fn test_diff_of_properties_and_mappings() {
        let old = workspace(vec![
            Mapping::new("$/p/keep", "/ws/keep"),
            Mapping::new("$/p/gone", "/ws/gone"),
            Mapping::new("$/p/moved", "/ws/old"),
        ]);
        let mut new = workspace(vec![
            Mapping::new("$/p/keep", "/ws/keep"),
            Mapping::new("$/p/moved", "/ws/new"),
            Mapping::cloaked("$/p/secret"),
        ]);
        new.name = "W2".to_string();
        new.comment = "renamed".to_string();
        new.location = Location::Server;

        let diff = WorkspaceDiff::between(&old, &new);

        assert_eq!(diff.new_name.as_deref(), Some("W2"));
        assert_eq!(diff.new_comment.as_deref(), Some("renamed"));
        assert_eq!(diff.new_location, Some(Location::Server));
        assert_eq!(diff.mappings_to_remove, vec![Mapping::new("$/p/gone", "/ws/gone")]);
        assert_eq!(
            diff.mappings_to_add,
            vec![Mapping::new("$/p/moved", "/ws/new"), Mapping::cloaked("$/p/secret")]
        );
    }

    #[test]
    fn test_location_parsing() {
        assert_eq!(Location::from_str("Server").unwrap(), Location::Server);
        assert_eq!(Location::from_str("local").unwrap(), Location::Local);
        assert!(Location::from_str("elsewhere").is_err());
        assert_eq!(Location::Local.to_string(), "local");
    }

    #[test]
    fn test_one_level_mapping() {
        assert!(!Mapping::new("$/p/*", "/ws").is_recursive());
        assert!(Mapping::new("$/p", "/ws").is_recursive());
    }
}
