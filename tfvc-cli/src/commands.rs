use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tfvc_core::context::StaticContextProvider;
use tfvc_core::models::{Location, Mapping};
use tfvc_core::path::server_path;
use tfvc_core::{
    Credentials, FollowUp, Notifier, OperationExecutor, RepositoryContext, ServerContext,
    SettingsManager, TfCommandRunner, TfsPath, TfvcClient, WorkspaceModel, WorkspaceServices,
};
use tracing::{info, warn};

pub const PASSWORD_VARIABLE: &str = "TFVC_PASSWORD";

/// Prints notifications to the terminal. Success goes to stdout, errors to
/// stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify_success(&self, title: &str, message: &str, follow_up: Option<FollowUp>) {
        println!("{title}: {message}");
        if let Some(follow_up) = follow_up {
            println!("  ({})", follow_up.label());
        }
    }

    fn notify_error(&self, title: &str, message: &str, _follow_up: Option<FollowUp>) {
        eprintln!("{title}: {message}");
    }
}

/// Edits requested on the command line for `workspace edit`.
#[derive(Debug, Default)]
pub struct WorkspaceEdits {
    pub new_name: Option<String>,
    pub comment: Option<String>,
    pub location: Option<String>,
    pub map: Vec<String>,
    pub unmap: Vec<String>,
    pub cloak: Vec<String>,
}

impl WorkspaceEdits {
    /// Applies the edits to `mappings`, in the order unmap, map, cloak.
    fn apply_to_mappings(&self, mut mappings: Vec<Mapping>) -> Result<Vec<Mapping>> {
        for server in &self.unmap {
            let server = server_path::canonicalize(server, true)?;
            mappings.retain(|mapping| mapping.server_path != server);
        }
        for entry in &self.map {
            let Some((server, local)) = entry.split_once('=') else {
                bail!("mapping '{entry}' is not in SERVER=LOCAL form");
            };
            let server = server_path::canonicalize(server, true)?;
            let local = absolute(Path::new(local))?;
            mappings.retain(|mapping| mapping.server_path != server);
            mappings.push(Mapping::new(server, local));
        }
        for server in &self.cloak {
            let server = server_path::canonicalize(server, true)?;
            mappings.retain(|mapping| mapping.server_path != server);
            mappings.push(Mapping::cloaked(server));
        }
        Ok(mappings)
    }
}

/// Collaborators built once at startup and shared by every command.
pub struct Session {
    client: TfvcClient,
    context: ServerContext,
    contexts: Arc<StaticContextProvider>,
    json: bool,
}

impl Session {
    pub fn new(
        settings_path: Option<PathBuf>,
        collection: Option<String>,
        project: Option<String>,
        user: Option<String>,
        json: bool,
    ) -> Result<Self> {
        let manager = match settings_path {
            Some(path) => SettingsManager::from_path(path)?,
            None => SettingsManager::new()?,
        };
        let settings = manager.settings();

        let Some(collection) = collection.or_else(|| settings.collection_url.clone()) else {
            bail!("no collection URL: pass --collection or set collection_url in {}", manager.path().display());
        };
        let project = project.or_else(|| settings.team_project.clone());

        let credentials = match user {
            Some(user_name) => {
                let secret = std::env::var(PASSWORD_VARIABLE).with_context(|| {
                    format!("--user requires the {PASSWORD_VARIABLE} environment variable")
                })?;
                Some(Credentials { user_name, secret })
            }
            None => None,
        };

        info!(%collection, ?project, tf = %settings.tf_executable.display(), "Session configured");

        let runner = TfCommandRunner::from_settings(&settings);
        Ok(Self {
            client: TfvcClient::new(Arc::new(runner)),
            context: ServerContext::new(collection, project, credentials.clone()),
            contexts: Arc::new(StaticContextProvider::new(credentials)),
            json,
        })
    }

    fn print<T: Serialize + std::fmt::Debug>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{value:#?}");
        }
        Ok(())
    }

    pub async fn status(&self, paths: Vec<String>) -> Result<()> {
        let changes = self
            .client
            .get_status_for_files_async(self.context.clone(), paths)
            .await?;
        if self.json {
            return self.print(&changes);
        }
        if changes.is_empty() {
            println!("There are no pending changes.");
        }
        for change in changes {
            let kinds: Vec<String> = change.change_types.iter().map(ToString::to_string).collect();
            let marker = if change.is_candidate { " (detected)" } else { "" };
            println!(
                "{:<20} {}{marker}",
                kinds.join(", "),
                change.local_item.as_deref().unwrap_or(&change.server_item)
            );
        }
        Ok(())
    }

    pub async fn info(&self, paths: Vec<String>) -> Result<()> {
        let json = self.json;
        self.client
            .get_local_items_info_async(self.context.clone(), paths, move |item| {
                if json {
                    match serde_json::to_string(&item) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!("Failed to serialize item: {e}"),
                    }
                } else {
                    println!(
                        "{}  local={}  server={:?}  change={}",
                        item.server_item,
                        item.local_item.as_deref().unwrap_or("-"),
                        item.server_version,
                        item.change
                    );
                }
            })
            .await?;
        Ok(())
    }

    pub async fn delete(&self, workspace: Option<String>, items: Vec<String>) -> Result<()> {
        let items = to_tfs_paths(items, workspace.as_deref())?;
        let result = self
            .client
            .delete_files_recursively_async(self.context.clone(), items)
            .await?;
        if self.json {
            return self.print(&result);
        }
        for path in &result.deleted_paths {
            println!("deleted    {path}");
        }
        for path in &result.not_found_paths {
            println!("not found  {path}");
        }
        for error in &result.errors {
            eprintln!("error      {error}");
        }
        Ok(())
    }

    pub async fn undo(&self, workspace: Option<String>, items: Vec<String>) -> Result<()> {
        let items = to_tfs_paths(items, workspace.as_deref())?;
        let undone = self
            .client
            .undo_local_changes_async(self.context.clone(), items)
            .await?;
        if self.json {
            return self.print(&undone);
        }
        for path in &undone {
            println!("undone     {path}");
        }
        Ok(())
    }

    pub async fn checkout(&self, paths: Vec<PathBuf>, recursive: bool) -> Result<()> {
        let paths = paths
            .iter()
            .map(|path| absolute(path))
            .collect::<Result<Vec<_>>>()?;
        let result = self
            .client
            .checkout_for_edit_async(self.context.clone(), paths, recursive)
            .await?;
        if self.json {
            return self.print(&result);
        }
        for path in &result.checked_out_files {
            println!("checked out  {path}");
        }
        for path in &result.not_found_files {
            println!("not found    {path}");
        }
        for error in &result.errors {
            eprintln!("error        {error}");
        }
        Ok(())
    }

    pub async fn sync(&self, root: PathBuf) -> Result<()> {
        let root = absolute(&root)?;
        self.client
            .sync_workspace_async(self.context.clone(), root.clone())
            .await?;
        println!("Synced {}", root.display());
        Ok(())
    }

    pub async fn show_workspace(&self, name: Option<String>, root: Option<PathBuf>) -> Result<()> {
        let workspace = match (name, root) {
            (Some(name), _) => {
                self.client
                    .get_workspace_async(self.context.clone(), name)
                    .await?
            }
            (None, root) => {
                let root = match root {
                    Some(root) => absolute(&root)?,
                    None => std::env::current_dir()?,
                };
                self.client
                    .get_detailed_workspace_async(self.context.clone(), root)
                    .await?
            }
        };
        if self.json {
            return self.print(&workspace);
        }
        println!("Workspace: {}", workspace.name);
        println!("Owner:     {}", workspace.owner);
        println!("Computer:  {}", workspace.computer);
        println!("Comment:   {}", workspace.comment);
        println!("Location:  {}", workspace.location);
        println!("Working folders:");
        for mapping in &workspace.mappings {
            if mapping.cloaked {
                println!("  (cloaked) {}", mapping.server_path);
            } else {
                println!("  {} -> {}", mapping.server_path, mapping.local_path.display());
            }
        }
        Ok(())
    }

    /// Loads the workspace into a model, applies the edits and saves it.
    pub async fn edit_workspace(
        &self,
        name: String,
        edits: WorkspaceEdits,
        sync_root: Option<PathBuf>,
    ) -> Result<()> {
        let notifier = Arc::new(ConsoleNotifier);
        let mut model = WorkspaceModel::new(WorkspaceServices {
            client: self.client.clone(),
            contexts: self.contexts.clone(),
            executor: OperationExecutor::try_current()?,
            notifier,
        });

        let repository = RepositoryContext {
            url: self.context.collection_url().to_string(),
            team_project_name: self.context.team_project().unwrap_or_default().to_string(),
        };
        model.load_workspace_by_name(repository, &name)?;
        model.wait_until_idle().await;
        if model.old_workspace().is_none() {
            bail!("workspace {name} could not be loaded");
        }

        if let Some(new_name) = edits.new_name.clone() {
            model.set_name(new_name);
        }
        if let Some(comment) = edits.comment.clone() {
            model.set_comment(comment);
        }
        if let Some(location) = &edits.location {
            let location: Location = location
                .parse()
                .with_context(|| format!("unknown location '{location}'"))?;
            model.set_location(location);
        }
        model.set_mappings(edits.apply_to_mappings(model.mappings().to_vec())?);

        if let Err(invalid) = model.validate() {
            bail!("{}: {}", invalid.field, invalid.message);
        }

        let sync_files = sync_root.is_some();
        let root = match sync_root {
            Some(root) => absolute(&root)?,
            None => std::env::current_dir()?,
        };
        let saved_name = model.name().to_string();
        model.save_workspace(
            root,
            sync_files,
            Some(Box::new(move || println!("Workspace {saved_name} saved"))),
        )?;
        model.wait_until_idle().await;

        if model.old_workspace() != Some(&model.to_workspace()) {
            bail!("workspace {name} was not saved");
        }
        Ok(())
    }
}

/// `$/` items become server paths in `workspace`; anything else is local.
fn to_tfs_paths(items: Vec<String>, workspace: Option<&str>) -> Result<Vec<TfsPath>> {
    items
        .into_iter()
        .map(|item| {
            if server_path::is_server_path(&item) {
                let Some(workspace) = workspace else {
                    bail!("{item} is a server path; pass --workspace");
                };
                Ok(TfsPath::server(&item, workspace)?)
            } else {
                Ok(TfsPath::local(absolute(Path::new(&item))?))
            }
        })
        .collect()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}
