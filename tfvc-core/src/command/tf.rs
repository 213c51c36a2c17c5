use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::ChildStdout;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::parse::{self, ItemInfoParser};
use crate::command::{CommandRunner, ToolCommand, ToolOutput};
use crate::context::ServerContext;
use crate::error::{Result, TfvcError};
use crate::models::{
    CheckoutResult, DeleteResult, ItemInfo, PendingChange, Workspace, WorkspaceDiff,
};
use crate::process::ProcessInvoker;
use crate::settings::Settings;

/// Runs commands through the `tf` command line client.
#[derive(Debug, Clone)]
pub struct TfCommandRunner {
    executable: PathBuf,
    invoker: ProcessInvoker,
    working_directory: Option<PathBuf>,
}

impl TfCommandRunner {
    pub fn new(executable: PathBuf, invoker: ProcessInvoker) -> Self {
        Self {
            executable,
            invoker,
            working_directory: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            executable: settings.tf_executable.clone(),
            invoker: ProcessInvoker::from_settings(settings),
            working_directory: settings.working_directory.clone(),
        }
    }

    fn working_directory<'a>(&'a self, command: &'a ToolCommand) -> Option<&'a Path> {
        command
            .working_directory
            .as_deref()
            .or(self.working_directory.as_deref())
    }

    fn check_exit(command: &ToolOutput, accepted: &[i32]) -> Result<()> {
        match command.exit_code {
            Some(code) if accepted.contains(&code) => Ok(()),
            _ => Err(parse::classify_failure(command)),
        }
    }

    /// Runs a command to completion and returns its captured output.
    pub fn execute(&self, context: &ServerContext, command: &ToolCommand) -> Result<ToolOutput> {
        block_on(self.run(context, command))?
    }

    /// Like `execute`, but hands stdout to `on_line` while the process runs.
    /// The returned output carries stderr only.
    pub fn execute_streaming(
        &self,
        context: &ServerContext,
        command: &ToolCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        block_on(self.run_streaming(context, command, on_line))?
    }

    async fn run(&self, context: &ServerContext, command: &ToolCommand) -> Result<ToolOutput> {
        let args = command.build_arguments(context);
        let child = self
            .invoker
            .start(&self.executable, &args, self.working_directory(command))?;

        let output = child.wait_with_output().await.map_err(|e| {
            TfvcError::Interrupted(format!("failed waiting for tf {}: {e}", command.name))
        })?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = command.name, exit_code = ?result.exit_code, "tf process finished");

        Self::check_exit(&result, &command.accepted_exit_codes)?;
        Ok(result)
    }

    async fn run_streaming(
        &self,
        context: &ServerContext,
        command: &ToolCommand,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<ToolOutput> {
        let args = command.build_arguments(context);
        let mut child = self
            .invoker
            .start(&self.executable, &args, self.working_directory(command))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TfvcError::Interrupted("tf stdout is unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TfvcError::Interrupted("tf stderr is unavailable".to_string()))?;

        let stderr_handle: JoinHandle<std::io::Result<String>> = tokio::spawn(async move {
            let mut buf = Vec::new();
            BufReader::new(stderr).read_to_end(&mut buf).await?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        });

        if let Err(e) = forward_lines(stdout, on_line).await {
            if let Err(kill_error) = child.kill().await {
                warn!("Failed to stop tf {}: {kill_error}", command.name);
            }
            stderr_handle.abort();
            return Err(TfvcError::Interrupted(format!(
                "failed reading tf {} output: {e}",
                command.name
            )));
        }

        let status = child.wait().await.map_err(|e| {
            TfvcError::Interrupted(format!("failed waiting for tf {}: {e}", command.name))
        })?;

        let stderr = match stderr_handle.await {
            Ok(Ok(stderr)) => stderr,
            Ok(Err(e)) => {
                warn!("Failed reading tf stderr: {e}");
                String::new()
            }
            Err(e) => {
                warn!("Failed awaiting tf stderr: {e}");
                String::new()
            }
        };

        let result = ToolOutput {
            exit_code: status.code(),
            stdout: String::new(),
            stderr,
        };
        debug!(command = command.name, exit_code = ?result.exit_code, "tf process finished");

        Self::check_exit(&result, &command.accepted_exit_codes)?;
        Ok(result)
    }
}

/// Calls `on_line` for every stdout line. Bytes that are not UTF-8 are
/// replaced rather than failing the whole listing.
async fn forward_lines(stdout: ChildStdout, on_line: &mut dyn FnMut(&str)) -> std::io::Result<()> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        on_line(line.trim_end_matches(['\n', '\r']));
    }
}

/// Drives `future` from synchronous code: on the ambient runtime when called
/// from a blocking task, otherwise on a private current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| TfvcError::Interrupted(format!("failed to start a runtime: {e}")))?;
            Ok(runtime.block_on(future))
        }
    }
}

impl CommandRunner for TfCommandRunner {
    fn get_status(&self, context: &ServerContext, paths: &[String]) -> Result<Vec<PendingChange>> {
        let command = ToolCommand::new("status")
            .arg("-format:detailed")
            .arg("-recursive")
            .args(paths.iter().cloned());
        let output = self.execute(context, &command)?;
        parse::parse_status(&output.stdout)
    }

    fn get_item_infos(
        &self,
        context: &ServerContext,
        paths: &[String],
        on_item: &mut dyn FnMut(ItemInfo),
    ) -> Result<()> {
        let command = ToolCommand::new("info")
            .args(paths.iter().cloned())
            .allow_partial_success();

        let mut parser = ItemInfoParser::default();
        self.execute_streaming(context, &command, &mut |line| {
            if let Some(item) = parser.feed_line(line) {
                on_item(item);
            }
        })?;
        if let Some(item) = parser.finish() {
            on_item(item);
        }
        Ok(())
    }

    fn delete_files(
        &self,
        context: &ServerContext,
        paths: &[String],
        workspace: Option<&str>,
        recursive: bool,
    ) -> Result<DeleteResult> {
        let mut command = ToolCommand::new("delete").flag_if(recursive, "-recursive");
        if let Some(workspace) = workspace {
            command = command.arg(format!("-workspace:{workspace}"));
        }
        let command = command.args(paths.iter().cloned()).allow_partial_success();

        let output = self.execute(context, &command)?;
        Ok(parse::parse_delete(&output))
    }

    fn undo_local_files(&self, context: &ServerContext, paths: &[String]) -> Result<Vec<String>> {
        let command = ToolCommand::new("undo")
            .arg("-recursive")
            .args(paths.iter().cloned())
            .allow_partial_success();
        let output = self.execute(context, &command)?;
        Ok(parse::parse_undo(&output.stdout))
    }

    fn checkout_for_edit(
        &self,
        context: &ServerContext,
        paths: &[PathBuf],
        recursive: bool,
    ) -> Result<CheckoutResult> {
        let command = ToolCommand::new("checkout")
            .flag_if(recursive, "-recursive")
            .args(paths.iter().map(|path| path.to_string_lossy().into_owned()))
            .allow_partial_success();
        let output = self.execute(context, &command)?;
        Ok(parse::parse_checkout(&output))
    }

    fn get_workspace(&self, context: &ServerContext, name: &str) -> Result<Workspace> {
        let command = ToolCommand::new("workspaces")
            .arg("-format:detailed")
            .arg(name);
        let output = self.execute(context, &command)?;
        parse::parse_workspace(&output.stdout)
    }

    fn get_detailed_workspace(
        &self,
        context: &ServerContext,
        local_root: &Path,
    ) -> Result<Workspace> {
        let command = ToolCommand::new("workfold").working_directory(local_root);
        let output = self.execute(context, &command)?;
        let name = parse::parse_workfold_name(&output.stdout)?;
        debug!(workspace = %name, root = %local_root.display(), "Resolved workspace for root");
        self.get_workspace(context, &name)
    }

    fn update_workspace(
        &self,
        context: &ServerContext,
        old: &Workspace,
        new: &Workspace,
    ) -> Result<()> {
        let diff = WorkspaceDiff::between(old, new);
        if diff.is_empty() {
            debug!(workspace = %old.name, "Workspace unchanged, nothing to update");
            return Ok(());
        }
        info!(workspace = %old.name, ?diff, "Updating workspace");

        if diff.changes_properties() {
            let mut command = ToolCommand::new("workspace").arg("-edit");
            if let Some(name) = &diff.new_name {
                command = command.arg(format!("-newname:{name}"));
            }
            if let Some(comment) = &diff.new_comment {
                command = command.arg(format!("-comment:{comment}"));
            }
            if let Some(location) = diff.new_location {
                command = command.arg(format!("-location:{location}"));
            }
            self.execute(context, &command.arg(old.name.clone()))?;
        }

        let workspace_arg = format!("-workspace:{}", new.name);
        for mapping in &diff.mappings_to_remove {
            let command = ToolCommand::new("workfold")
                .arg("-unmap")
                .arg(workspace_arg.clone())
                .arg(mapping.server_path.clone());
            self.execute(context, &command)?;
        }
        for mapping in &diff.mappings_to_add {
            let command = if mapping.cloaked {
                ToolCommand::new("workfold")
                    .arg("-cloak")
                    .arg(workspace_arg.clone())
                    .arg(mapping.server_path.clone())
            } else {
                ToolCommand::new("workfold")
                    .arg("-map")
                    .arg(workspace_arg.clone())
                    .arg(mapping.server_path.clone())
                    .arg(mapping.local_path.to_string_lossy().into_owned())
            };
            self.execute(context, &command)?;
        }
        Ok(())
    }

    fn sync_workspace(&self, context: &ServerContext, root: &Path) -> Result<()> {
        let command = ToolCommand::new("get")
            .arg("-recursive")
            .arg(root.to_string_lossy().into_owned())
            .working_directory(root);
        self.execute(context, &command)?;
        Ok(())
    }
}
