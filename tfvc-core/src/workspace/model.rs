use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client::TfvcClient;
use crate::context::{Project, RepositoryContext, ServerContext, ServerContextProvider};
use crate::error::{Result, TfvcError};
use crate::executor::OperationExecutor;
use crate::localization::{error_message, Message};
use crate::models::{mappings_differ, Location, Mapping, Workspace};
use crate::notify::{FollowUp, Notifier};
use crate::workspace::events::{ModelChange, WorkspaceProperty};

/// Collaborators the model hands its background work to.
#[derive(Clone)]
pub struct WorkspaceServices {
    pub client: TfvcClient,
    pub contexts: Arc<dyn ServerContextProvider>,
    pub executor: OperationExecutor,
    pub notifier: Arc<dyn Notifier>,
}

/// The first field that keeps the model from being saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelValidationInfo {
    pub field: WorkspaceProperty,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ModelState {
    Empty,
    Loading,
    Loaded,
    Dirty,
    Saving,
    Syncing,
}

/// Result of a background task, applied on the thread that owns the model.
enum Completion {
    Loaded(Result<(ServerContext, Workspace)>),
    Saved {
        context: ServerContext,
        saved: Workspace,
        root: PathBuf,
        outcome: Result<()>,
    },
    Synced,
}

type Listener = Box<dyn FnMut(ModelChange)>;

/// Editable projection of one workspace.
///
/// The model belongs to a single interactive thread. Load, save and sync run
/// on the [`OperationExecutor`]; their results are queued and only take
/// effect when the owner calls [`WorkspaceModel::process_pending_completions`]
/// or awaits [`WorkspaceModel::wait_for_completion`]. Listeners therefore
/// always run on the owning thread, right after the mutation they describe.
pub struct WorkspaceModel {
    services: WorkspaceServices,
    current: Workspace,
    /// Last workspace fetched or saved; saves are diffed against it.
    old_workspace: Option<Workspace>,
    context: Option<ServerContext>,
    /// Outstanding tasks per kind; a flag reads true while its count is
    /// non-zero.
    loading: usize,
    saving: usize,
    syncing: usize,
    listeners: Vec<Listener>,
    on_saved: Option<Box<dyn FnOnce()>>,
    pending: usize,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl WorkspaceModel {
    pub fn new(services: WorkspaceServices) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            services,
            current: Workspace::default(),
            old_workspace: None,
            context: None,
            loading: 0,
            saving: 0,
            syncing: 0,
            listeners: Vec::new(),
            on_saved: None,
            pending: 0,
            completion_tx,
            completion_rx,
        }
    }

    pub fn add_listener(&mut self, listener: impl FnMut(ModelChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn fire(&mut self, change: ModelChange) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }

    fn set_field<T: PartialEq>(field: &mut T, value: T) -> bool {
        if *field == value {
            return false;
        }
        *field = value;
        true
    }

    fn in_flight(&mut self, property: WorkspaceProperty) -> Option<&mut usize> {
        match property {
            WorkspaceProperty::Loading => Some(&mut self.loading),
            WorkspaceProperty::Saving => Some(&mut self.saving),
            WorkspaceProperty::Syncing => Some(&mut self.syncing),
            _ => None,
        }
    }

    /// Counts a task of this kind; listeners hear only when the flag flips.
    fn begin_task(&mut self, property: WorkspaceProperty) {
        let Some(count) = self.in_flight(property) else {
            return;
        };
        *count += 1;
        if *count == 1 {
            self.fire(ModelChange::Property(property));
        }
    }

    fn end_task(&mut self, property: WorkspaceProperty) {
        let Some(count) = self.in_flight(property) else {
            return;
        };
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.fire(ModelChange::Property(property));
        }
    }

    pub fn server(&self) -> &str {
        &self.current.server
    }

    pub fn set_server(&mut self, server: impl Into<String>) {
        if Self::set_field(&mut self.current.server, server.into()) {
            self.fire(ModelChange::Property(WorkspaceProperty::Server));
        }
    }

    pub fn name(&self) -> &str {
        &self.current.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        if Self::set_field(&mut self.current.name, name.into()) {
            self.fire(ModelChange::Property(WorkspaceProperty::Name));
        }
    }

    pub fn computer(&self) -> &str {
        &self.current.computer
    }

    pub fn set_computer(&mut self, computer: impl Into<String>) {
        if Self::set_field(&mut self.current.computer, computer.into()) {
            self.fire(ModelChange::Property(WorkspaceProperty::Computer));
        }
    }

    pub fn owner(&self) -> &str {
        &self.current.owner
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        if Self::set_field(&mut self.current.owner, owner.into()) {
            self.fire(ModelChange::Property(WorkspaceProperty::Owner));
        }
    }

    pub fn comment(&self) -> &str {
        &self.current.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        if Self::set_field(&mut self.current.comment, comment.into()) {
            self.fire(ModelChange::Property(WorkspaceProperty::Comment));
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.current.mappings
    }

    pub fn set_mappings(&mut self, mappings: Vec<Mapping>) {
        if mappings_differ(Some(self.current.mappings.as_slice()), Some(mappings.as_slice())) {
            self.current.mappings = mappings;
            self.fire(ModelChange::Property(WorkspaceProperty::Mappings));
        }
    }

    pub fn location(&self) -> Location {
        self.current.location
    }

    pub fn set_location(&mut self, location: Location) {
        if Self::set_field(&mut self.current.location, location) {
            self.fire(ModelChange::Property(WorkspaceProperty::Location));
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    pub fn is_saving(&self) -> bool {
        self.saving > 0
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing > 0
    }

    pub fn server_context(&self) -> Option<&ServerContext> {
        self.context.as_ref()
    }

    pub fn old_workspace(&self) -> Option<&Workspace> {
        self.old_workspace.as_ref()
    }

    /// The workspace the current field values describe.
    pub fn to_workspace(&self) -> Workspace {
        self.current.clone()
    }

    pub fn state(&self) -> ModelState {
        if self.is_loading() {
            return ModelState::Loading;
        }
        if self.is_saving() {
            return ModelState::Saving;
        }
        if self.is_syncing() {
            return ModelState::Syncing;
        }
        match &self.old_workspace {
            None => ModelState::Empty,
            Some(old) if normalize_location(old.clone()) != self.current => ModelState::Dirty,
            Some(_) => ModelState::Loaded,
        }
    }

    /// Name is checked before mappings.
    pub fn validate(&self) -> std::result::Result<(), ModelValidationInfo> {
        if self.current.name.is_empty() {
            return Err(ModelValidationInfo {
                field: WorkspaceProperty::Name,
                message: Message::NameEmpty.text().to_string(),
            });
        }
        if self.current.mappings.is_empty() {
            return Err(ModelValidationInfo {
                field: WorkspaceProperty::Mappings,
                message: Message::MappingsEmpty.text().to_string(),
            });
        }
        Ok(())
    }

    fn submit<F>(&mut self, name: &'static str, task: F)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        let tx = self.completion_tx.clone();
        self.pending += 1;
        self.services
            .executor
            .submit_operation_task(name, async move {
                // The model may already be gone; nothing is left to update then.
                let _ = tx.send(task.await);
            });
    }

    /// Resolves the repository behind `project` and loads the workspace
    /// that maps its base path.
    pub fn load_workspace_for_project(&mut self, project: Project) {
        info!(project = %project.base_path.display(), "Loading workspace for project");
        self.begin_task(WorkspaceProperty::Loading);

        let services = self.services.clone();
        self.submit("load_workspace", async move {
            let outcome: Result<(ServerContext, Workspace)> = async {
                let repository = project
                    .repository
                    .as_ref()
                    .filter(|repository| repository.is_complete())
                    .ok_or_else(|| {
                        warn!("Could not determine the repository for the project");
                        TfvcError::InvalidArgument(Message::ContextFailed.text().to_string())
                    })?;
                let context = acquire_context(&services, repository).await?;
                let workspace = services
                    .client
                    .get_detailed_workspace_async(context.clone(), project.base_path.clone())
                    .await?;
                Ok((context, workspace))
            }
            .await;
            Completion::Loaded(outcome)
        });
    }

    pub fn load_workspace_by_name(
        &mut self,
        repository: RepositoryContext,
        workspace_name: &str,
    ) -> Result<()> {
        if workspace_name.trim().is_empty() {
            return Err(TfvcError::InvalidArgument(
                "workspace name is required".to_string(),
            ));
        }
        info!(workspace = workspace_name, "Loading workspace by name");
        self.begin_task(WorkspaceProperty::Loading);

        let services = self.services.clone();
        let name = workspace_name.to_string();
        self.submit("load_workspace", async move {
            let outcome: Result<(ServerContext, Workspace)> = async {
                let context = acquire_context(&services, &repository).await?;
                let workspace = services
                    .client
                    .get_workspace_async(context.clone(), name)
                    .await?;
                Ok((context, workspace))
            }
            .await;
            Completion::Loaded(outcome)
        });
        Ok(())
    }

    /// Loads an already fetched workspace. Still completes through the
    /// background queue so listeners see the same sequence as other loads.
    pub fn load_workspace_with_context(&mut self, context: ServerContext, workspace: Workspace) {
        info!(workspace = %workspace.name, "Loading workspace from existing context");
        self.begin_task(WorkspaceProperty::Loading);
        self.submit("load_workspace", async move {
            Completion::Loaded(Ok((context, workspace)))
        });
    }

    /// Pushes the difference between the baseline and the current fields to
    /// the server, then syncs `root` when `sync_files` is set.
    ///
    /// On success `on_success` runs on the owning thread; without it a
    /// success notification offering a sync is sent. Failures are reported
    /// through the notifier and leave the baseline untouched.
    pub fn save_workspace(
        &mut self,
        root: impl Into<PathBuf>,
        sync_files: bool,
        on_success: Option<Box<dyn FnOnce()>>,
    ) -> Result<()> {
        if let Err(info) = self.validate() {
            return Err(TfvcError::InvalidArgument(info.message));
        }
        if self.is_saving() {
            return Err(TfvcError::InvalidArgument(
                "a save is already in progress".to_string(),
            ));
        }
        let (Some(context), Some(old)) = (self.context.clone(), self.old_workspace.clone()) else {
            return Err(TfvcError::InvalidArgument(
                "no workspace has been loaded".to_string(),
            ));
        };

        // Same normalization as the fields, so an unreported location stays unsent.
        let old = normalize_location(old);
        let new = self.to_workspace();
        let root = root.into();
        info!(workspace = %old.name, sync_files, "Saving workspace");

        self.on_saved = on_success;
        self.begin_task(WorkspaceProperty::Saving);

        let client = self.services.client.clone();
        self.submit("save_workspace", async move {
            let outcome: Result<()> = async {
                client
                    .update_workspace_async(context.clone(), old, new.clone())
                    .await?;
                if sync_files {
                    client
                        .sync_workspace_async(context.clone(), root.clone())
                        .await?;
                }
                Ok(())
            }
            .await;
            Completion::Saved {
                context,
                saved: new,
                root,
                outcome,
            }
        });
        Ok(())
    }

    /// Syncs `root` in the background. The outcome is reported through the
    /// notifier.
    pub fn sync_workspace(&mut self, root: impl Into<PathBuf>) -> Result<()> {
        let Some(context) = self.context.clone() else {
            return Err(TfvcError::InvalidArgument(
                "no workspace has been loaded".to_string(),
            ));
        };
        self.begin_task(WorkspaceProperty::Syncing);

        let services = self.services.clone();
        let root = root.into();
        self.submit("sync_workspace", async move {
            run_sync(&services, context, root).await;
            Completion::Synced
        });
        Ok(())
    }

    /// Number of background tasks whose results have not been applied yet.
    pub fn pending_operations(&self) -> usize {
        self.pending
    }

    /// Applies every completion that has already arrived, without waiting.
    pub fn process_pending_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Waits for the next completion, then applies it together with any
    /// others already queued. Returns false when nothing is outstanding.
    pub async fn wait_for_completion(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        match self.completion_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                self.process_pending_completions();
                true
            }
            None => false,
        }
    }

    /// Applies completions until no background task is outstanding.
    pub async fn wait_until_idle(&mut self) {
        while self.wait_for_completion().await {}
    }

    fn apply(&mut self, completion: Completion) {
        self.pending = self.pending.saturating_sub(1);
        match completion {
            Completion::Loaded(outcome) => self.finish_load(outcome),
            Completion::Saved {
                context,
                saved,
                root,
                outcome,
            } => self.finish_save(context, saved, root, outcome),
            Completion::Synced => self.end_task(WorkspaceProperty::Syncing),
        }
    }

    fn finish_load(&mut self, outcome: Result<(ServerContext, Workspace)>) {
        match outcome {
            Ok((context, workspace)) => {
                info!(workspace = %workspace.name, "Workspace loaded");
                self.context = Some(context);
                self.current = normalize_location(workspace.clone());
                self.old_workspace = Some(workspace);
            }
            Err(e) => {
                warn!("Loading workspace failed: {e}");
                self.services.notifier.notify_error(
                    Message::LoadFailureTitle.text(),
                    &error_message(&e),
                    None,
                );
            }
        }
        self.fire(ModelChange::All);
        self.end_task(WorkspaceProperty::Loading);
    }

    fn finish_save(
        &mut self,
        context: ServerContext,
        saved: Workspace,
        root: PathBuf,
        outcome: Result<()>,
    ) {
        let on_saved = self.on_saved.take();
        match outcome {
            Ok(()) => {
                info!(workspace = %saved.name, "Workspace saved");
                self.old_workspace = Some(saved);
                self.end_task(WorkspaceProperty::Saving);

                match on_saved {
                    Some(on_saved) => on_saved(),
                    None => {
                        let services = self.services.clone();
                        let follow_up = FollowUp::new(Message::SyncFollowUp.text(), move || {
                            let executor = services.executor.clone();
                            executor.submit_operation_task("sync_workspace", async move {
                                run_sync(&services, context, root).await;
                            });
                        });
                        self.services.notifier.notify_success(
                            Message::SaveSuccessTitle.text(),
                            Message::SaveSuccess.text(),
                            Some(follow_up),
                        );
                    }
                }
            }
            Err(e) => {
                error!("Saving workspace failed: {e}");
                self.end_task(WorkspaceProperty::Saving);
                self.services.notifier.notify_error(
                    Message::SaveFailureTitle.text(),
                    &error_message(&e),
                    None,
                );
            }
        }
    }
}

fn normalize_location(mut workspace: Workspace) -> Workspace {
    if workspace.location == Location::Unknown {
        workspace.location = Location::Local;
    }
    workspace
}

async fn acquire_context(
    services: &WorkspaceServices,
    repository: &RepositoryContext,
) -> Result<ServerContext> {
    services
        .contexts
        .create_context_from_tfvc_server_url(&repository.url, &repository.team_project_name, true)
        .await?
        .ok_or_else(|| {
            warn!(url = %repository.url, "No server context; sign-in may have been cancelled");
            TfvcError::NotAuthorized(format!("could not sign in to {}", repository.url))
        })
}

/// Syncs `root` and reports the outcome through the notifier.
async fn run_sync(services: &WorkspaceServices, context: ServerContext, root: PathBuf) {
    match services.client.sync_workspace_async(context, root).await {
        Ok(()) => services.notifier.notify_success(
            Message::SaveSuccessTitle.text(),
            Message::SyncSuccess.text(),
            None,
        ),
        Err(e) => {
            error!("Syncing workspace failed: {e}");
            services.notifier.notify_error(
                Message::SaveFailureTitle.text(),
                &error_message(&e),
                None,
            );
        }
    }
}
