use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::context::ServerContext;
use crate::error::Result;
use crate::models::{CheckoutResult, DeleteResult, ItemInfo, PendingChange, Workspace};
use crate::path::{group_by_workspace, LocalPath, TfsPath};

/// Batching facade over a [`CommandRunner`].
///
/// Every operation comes in two forms. The blocking form runs on the calling
/// thread. The `_async` form starts the same work on tokio's blocking pool as
/// soon as it is called and returns a future that resolves once every
/// invocation has finished; it must be called from within a tokio runtime.
#[derive(Clone)]
pub struct TfvcClient {
    runner: Arc<dyn CommandRunner>,
}

impl TfvcClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Runs `op` on the blocking pool with a clone of this client.
    fn spawn_blocking<T, F>(&self, op: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(TfvcClient) -> Result<T> + Send + 'static,
    {
        let client = self.clone();
        let handle = tokio::task::spawn_blocking(move || op(client));
        async move { handle.await? }
    }

    pub fn get_status_for_files(
        &self,
        context: &ServerContext,
        paths: &[String],
    ) -> Result<Vec<PendingChange>> {
        debug!(?paths, "Getting status");
        self.runner.get_status(context, paths)
    }

    pub fn get_status_for_files_async(
        &self,
        context: ServerContext,
        paths: Vec<String>,
    ) -> impl Future<Output = Result<Vec<PendingChange>>> + Send + 'static {
        self.spawn_blocking(move |client| client.get_status_for_files(&context, &paths))
    }

    /// Hands each item to `on_item` as soon as it has been read.
    pub fn get_local_items_info(
        &self,
        context: &ServerContext,
        paths: &[String],
        mut on_item: impl FnMut(ItemInfo),
    ) -> Result<()> {
        debug!(?paths, "Getting item info");
        self.runner.get_item_infos(context, paths, &mut on_item)
    }

    /// The sink runs on the blocking pool. The future resolves after the
    /// last item has been delivered.
    pub fn get_local_items_info_async(
        &self,
        context: ServerContext,
        paths: Vec<String>,
        on_item: impl FnMut(ItemInfo) + Send + 'static,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.spawn_blocking(move |client| client.get_local_items_info(&context, &paths, on_item))
    }

    /// Deletes `items` with one invocation per workspace group and merges
    /// the per-group results.
    ///
    /// Groups run one after another. A failing group fails the whole call;
    /// groups that already ran are not rolled back.
    pub fn delete_files_recursively(
        &self,
        context: &ServerContext,
        items: &[TfsPath],
    ) -> Result<DeleteResult> {
        let groups = group_by_workspace(items.iter().cloned());
        info!(items = items.len(), groups = groups.len(), "Deleting files");

        let mut merged = DeleteResult::default();
        for (workspace, group) in groups {
            let paths: Vec<String> = group.iter().map(TfsPath::to_path_item).collect();
            debug!(?workspace, ?paths, "Deleting group");

            match self
                .runner
                .delete_files(context, &paths, workspace.as_deref(), true)
            {
                Ok(result) => merged = merged.merge_with(result),
                Err(e) => {
                    if !merged.is_empty() {
                        warn!(
                            ?workspace,
                            applied = ?merged,
                            "Delete failed after earlier groups were applied: {e}"
                        );
                    }
                    return Err(e);
                }
            }
        }
        Ok(merged)
    }

    pub fn delete_files_recursively_async(
        &self,
        context: ServerContext,
        items: Vec<TfsPath>,
    ) -> impl Future<Output = Result<DeleteResult>> + Send + 'static {
        self.spawn_blocking(move |client| client.delete_files_recursively(&context, &items))
    }

    /// Returns the paths that actually had changes undone, which may be a
    /// subset of `items`.
    pub fn undo_local_changes(
        &self,
        context: &ServerContext,
        items: &[TfsPath],
    ) -> Result<Vec<LocalPath>> {
        let paths: Vec<String> = items.iter().map(TfsPath::to_path_item).collect();
        info!(?paths, "Undoing local changes");
        let undone = self.runner.undo_local_files(context, &paths)?;
        Ok(undone.into_iter().map(LocalPath::new).collect())
    }

    pub fn undo_local_changes_async(
        &self,
        context: ServerContext,
        items: Vec<TfsPath>,
    ) -> impl Future<Output = Result<Vec<LocalPath>>> + Send + 'static {
        self.spawn_blocking(move |client| client.undo_local_changes(&context, &items))
    }

    pub fn checkout_for_edit(
        &self,
        context: &ServerContext,
        paths: &[PathBuf],
        recursive: bool,
    ) -> Result<CheckoutResult> {
        info!(?paths, recursive, "Checking out for edit");
        self.runner.checkout_for_edit(context, paths, recursive)
    }

    pub fn checkout_for_edit_async(
        &self,
        context: ServerContext,
        paths: Vec<PathBuf>,
        recursive: bool,
    ) -> impl Future<Output = Result<CheckoutResult>> + Send + 'static {
        self.spawn_blocking(move |client| client.checkout_for_edit(&context, &paths, recursive))
    }

    pub fn get_workspace(&self, context: &ServerContext, name: &str) -> Result<Workspace> {
        self.runner.get_workspace(context, name)
    }

    pub fn get_workspace_async(
        &self,
        context: ServerContext,
        name: String,
    ) -> impl Future<Output = Result<Workspace>> + Send + 'static {
        self.spawn_blocking(move |client| client.get_workspace(&context, &name))
    }

    /// The workspace whose mappings cover `root`.
    pub fn get_detailed_workspace(&self, context: &ServerContext, root: &Path) -> Result<Workspace> {
        self.runner.get_detailed_workspace(context, root)
    }

    pub fn get_detailed_workspace_async(
        &self,
        context: ServerContext,
        root: PathBuf,
    ) -> impl Future<Output = Result<Workspace>> + Send + 'static {
        self.spawn_blocking(move |client| client.get_detailed_workspace(&context, &root))
    }

    pub fn update_workspace(
        &self,
        context: &ServerContext,
        old: &Workspace,
        new: &Workspace,
    ) -> Result<()> {
        info!(workspace = %old.name, "Updating workspace");
        self.runner.update_workspace(context, old, new)
    }

    pub fn update_workspace_async(
        &self,
        context: ServerContext,
        old: Workspace,
        new: Workspace,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.spawn_blocking(move |client| client.update_workspace(&context, &old, &new))
    }

    pub fn sync_workspace(&self, context: &ServerContext, root: &Path) -> Result<()> {
        info!(root = %root.display(), "Syncing workspace");
        self.runner.sync_workspace(context, root)
    }

    pub fn sync_workspace_async(
        &self,
        context: ServerContext,
        root: PathBuf,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        self.spawn_blocking(move |client| client.sync_workspace(&context, &root))
    }
}
