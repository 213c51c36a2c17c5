pub mod grouping;
pub mod server_path;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TfvcError};

pub use grouping::{group_by_workspace, WorkspaceGroupKey};

/// A path on the local filesystem. Which workspace it belongs to is decided
/// by the tool from the invocation context, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A canonical server path (`$/...`) qualified by the workspace it is
/// addressed through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawServerPath")]
pub struct ServerPath {
    path: String,
    workspace: String,
}

/// Wire form of [`ServerPath`]; deserialized values go through
/// [`ServerPath::new`].
#[derive(Deserialize)]
struct RawServerPath {
    path: String,
    workspace: String,
}

impl TryFrom<RawServerPath> for ServerPath {
    type Error = TfvcError;

    fn try_from(raw: RawServerPath) -> Result<Self> {
        Self::new(&raw.path, raw.workspace)
    }
}

impl ServerPath {
    pub fn new(path: &str, workspace: impl Into<String>) -> Result<Self> {
        let workspace = workspace.into();
        if workspace.trim().is_empty() {
            return Err(TfvcError::InvalidPath(format!(
                "server path {path} requires a workspace"
            )));
        }

        Ok(Self {
            path: server_path::canonicalize(path, false)?,
            workspace,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }
}

impl fmt::Display for ServerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.workspace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TfsPath {
    Local(LocalPath),
    Server(ServerPath),
}

impl TfsPath {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local(LocalPath::new(path))
    }

    pub fn server(path: &str, workspace: impl Into<String>) -> Result<Self> {
        ServerPath::new(path, workspace).map(Self::Server)
    }

    /// The workspace this path is explicitly bound to, if any.
    pub fn workspace(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Server(server) => Some(server.workspace()),
        }
    }

    /// The item argument handed to the tool for this path.
    pub fn to_path_item(&self) -> String {
        match self {
            Self::Local(local) => local.path().to_string_lossy().into_owned(),
            Self::Server(server) => server.path().to_string(),
        }
    }
}

impl From<LocalPath> for TfsPath {
    fn from(path: LocalPath) -> Self {
        Self::Local(path)
    }
}

impl From<ServerPath> for TfsPath {
    fn from(path: ServerPath) -> Self {
        Self::Server(path)
    }
}

impl fmt::Display for TfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(local) => local.fmt(f),
            Self::Server(server) => server.fmt(f),
        }
    }
}
