pub mod mock;
pub mod parse;
pub mod tf;

use std::path::{Path, PathBuf};

use crate::context::ServerContext;
use crate::error::Result;
use crate::models::{CheckoutResult, DeleteResult, ItemInfo, PendingChange, Workspace};

pub use tf::TfCommandRunner;

/// One tool invocation: sub-command, its arguments, and the context it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub name: &'static str,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    /// Exit codes that still carry parseable output. The tool reports
    /// partial success with exit code 1.
    pub accepted_exit_codes: Vec<i32>,
}

impl ToolCommand {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
            working_directory: None,
            accepted_exit_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn flag_if(self, condition: bool, flag: &str) -> Self {
        if condition {
            self.arg(flag)
        } else {
            self
        }
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn allow_partial_success(mut self) -> Self {
        self.accepted_exit_codes = vec![0, 1];
        self
    }

    /// Full argument list, including the collection and login taken from
    /// the context.
    pub fn build_arguments(&self, context: &ServerContext) -> Vec<String> {
        let mut args = vec![self.name.to_string()];
        args.extend(self.args.iter().cloned());
        args.push(format!("-collection:{}", context.collection_url()));
        if let Some(credentials) = context.credentials() {
            args.push(format!(
                "-login:{},{}",
                credentials.user_name, credentials.secret
            ));
        }
        args.push("-noprompt".to_string());
        args
    }
}

/// Raw result of one invocation, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs typed version-control commands against the server identified by a
/// context. Implementations block the calling thread until the invocation
/// finishes.
pub trait CommandRunner: Send + Sync {
    fn get_status(&self, context: &ServerContext, paths: &[String]) -> Result<Vec<PendingChange>>;

    /// Delivers each item as soon as it has been parsed.
    fn get_item_infos(
        &self,
        context: &ServerContext,
        paths: &[String],
        on_item: &mut dyn FnMut(ItemInfo),
    ) -> Result<()>;

    fn delete_files(
        &self,
        context: &ServerContext,
        paths: &[String],
        workspace: Option<&str>,
        recursive: bool,
    ) -> Result<DeleteResult>;

    /// Returns the local paths that actually had changes undone.
    fn undo_local_files(&self, context: &ServerContext, paths: &[String]) -> Result<Vec<String>>;

    fn checkout_for_edit(
        &self,
        context: &ServerContext,
        paths: &[PathBuf],
        recursive: bool,
    ) -> Result<CheckoutResult>;

    fn get_workspace(&self, context: &ServerContext, name: &str) -> Result<Workspace>;

    /// The workspace that maps `local_root`.
    fn get_detailed_workspace(&self, context: &ServerContext, local_root: &Path)
        -> Result<Workspace>;

    fn update_workspace(
        &self,
        context: &ServerContext,
        old: &Workspace,
        new: &Workspace,
    ) -> Result<()>;

    fn sync_workspace(&self, context: &ServerContext, root: &Path) -> Result<()>;
}
