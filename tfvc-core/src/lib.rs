pub mod client;
pub mod command;
pub mod context;
pub mod error;
pub mod executor;
pub mod localization;
pub mod models;
pub mod notify;
pub mod path;
pub mod process;
pub mod settings;
pub mod workspace;

// Types most callers need. Everything else stays reachable through its module.
pub use client::TfvcClient;
pub use command::{CommandRunner, TfCommandRunner};
pub use context::{Credentials, Project, RepositoryContext, ServerContext, ServerContextProvider};
pub use error::{FaultKind, Result, TfvcError};
pub use executor::OperationExecutor;
pub use notify::{FollowUp, Notifier};
pub use path::{LocalPath, ServerPath, TfsPath};
pub use settings::{Settings, SettingsManager};
pub use workspace::{ModelChange, WorkspaceModel, WorkspaceProperty, WorkspaceServices};
