use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::command::CommandRunner;
use crate::context::ServerContext;
use crate::error::{FaultKind, Result, TfvcError};
use crate::models::{CheckoutResult, DeleteResult, ItemInfo, PendingChange, Workspace};
use crate::path::LocalPath;

/// A call captured by the mock runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Status {
        paths: Vec<String>,
    },
    ItemInfos {
        paths: Vec<String>,
    },
    Delete {
        paths: Vec<String>,
        workspace: Option<String>,
        recursive: bool,
    },
    Undo {
        paths: Vec<String>,
    },
    Checkout {
        paths: Vec<PathBuf>,
        recursive: bool,
    },
    GetWorkspace {
        name: String,
    },
    GetDetailedWorkspace {
        root: PathBuf,
    },
    UpdateWorkspace {
        old: Workspace,
        new: Workspace,
    },
    Sync {
        root: PathBuf,
    },
}

/// How the mock runner answers calls.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Answer every call from the configured canned data
    #[default]
    Success,
    /// Fail the next N calls, then succeed
    FailThenSuccess {
        remaining_errors: usize,
        kind: FaultKind,
    },
    /// Fail every call
    AlwaysFail { kind: FaultKind },
    /// Fail every call as an expired sign-in
    AlwaysNotAuthorized,
}

#[derive(Debug, Default)]
struct CannedData {
    status: Vec<PendingChange>,
    item_infos: Vec<ItemInfo>,
    /// Paths reported as not found by delete and checkout
    missing: HashSet<String>,
    /// Delete fails for paths of these workspace groups
    failing_delete_groups: HashSet<Option<String>>,
    /// When set, undo reports only these paths
    undone: Option<Vec<String>>,
    workspaces: HashMap<String, Workspace>,
    /// Workspace returned for any root by `get_detailed_workspace`
    detailed_workspace: Option<Workspace>,
    delay: Option<Duration>,
}

/// Command runner for tests. Clones share state.
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    behavior: Arc<Mutex<MockBehavior>>,
    data: Arc<Mutex<CannedData>>,
    captured_calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockCommandRunner {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            ..Default::default()
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_status(&self, changes: Vec<PendingChange>) {
        self.data.lock().unwrap().status = changes;
    }

    pub fn set_item_infos(&self, items: Vec<ItemInfo>) {
        self.data.lock().unwrap().item_infos = items;
    }

    pub fn add_missing_path(&self, path: impl Into<String>) {
        self.data.lock().unwrap().missing.insert(path.into());
    }

    /// Makes delete fail for the group keyed by `workspace` (`None` for
    /// local paths).
    pub fn fail_delete_for(&self, workspace: Option<&str>) {
        self.data
            .lock()
            .unwrap()
            .failing_delete_groups
            .insert(workspace.map(str::to_string));
    }

    pub fn set_undone(&self, paths: Vec<String>) {
        self.data.lock().unwrap().undone = Some(paths);
    }

    pub fn add_workspace(&self, workspace: Workspace) {
        self.data
            .lock()
            .unwrap()
            .workspaces
            .insert(workspace.name.clone(), workspace);
    }

    pub fn set_detailed_workspace(&self, workspace: Workspace) {
        self.data.lock().unwrap().detailed_workspace = Some(workspace);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.data.lock().unwrap().delay = Some(delay);
    }

    pub fn get_call_count(&self) -> usize {
        self.captured_calls.lock().unwrap().len()
    }

    pub fn get_captured_calls(&self) -> Vec<RecordedCall> {
        self.captured_calls.lock().unwrap().clone()
    }

    pub fn clear_captured_calls(&self) {
        self.captured_calls.lock().unwrap().clear();
    }

    /// Records the call, applies the delay, and decides whether it fails.
    fn begin(&self, call: RecordedCall) -> Result<()> {
        self.captured_calls.lock().unwrap().push(call);

        let delay = self.data.lock().unwrap().delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut behavior = self.behavior.lock().unwrap();
        match &mut *behavior {
            MockBehavior::Success => Ok(()),
            MockBehavior::FailThenSuccess {
                remaining_errors,
                kind,
            } => {
                if *remaining_errors == 0 {
                    return Ok(());
                }
                *remaining_errors -= 1;
                Err(TfvcError::tool_failure(*kind, Some(100), "mock failure"))
            }
            MockBehavior::AlwaysFail { kind } => {
                Err(TfvcError::tool_failure(*kind, Some(100), "mock failure"))
            }
            MockBehavior::AlwaysNotAuthorized => Err(TfvcError::NotAuthorized(
                "TF30063: mock sign-in expired".to_string(),
            )),
        }
    }
}

impl CommandRunner for MockCommandRunner {
    fn get_status(&self, _context: &ServerContext, paths: &[String]) -> Result<Vec<PendingChange>> {
        self.begin(RecordedCall::Status {
            paths: paths.to_vec(),
        })?;
        Ok(self.data.lock().unwrap().status.clone())
    }

    fn get_item_infos(
        &self,
        _context: &ServerContext,
        paths: &[String],
        on_item: &mut dyn FnMut(ItemInfo),
    ) -> Result<()> {
        self.begin(RecordedCall::ItemInfos {
            paths: paths.to_vec(),
        })?;
        let items = self.data.lock().unwrap().item_infos.clone();
        items.into_iter().for_each(on_item);
        Ok(())
    }

    fn delete_files(
        &self,
        _context: &ServerContext,
        paths: &[String],
        workspace: Option<&str>,
        recursive: bool,
    ) -> Result<DeleteResult> {
        self.begin(RecordedCall::Delete {
            paths: paths.to_vec(),
            workspace: workspace.map(str::to_string),
            recursive,
        })?;

        let data = self.data.lock().unwrap();
        if data
            .failing_delete_groups
            .contains(&workspace.map(str::to_string))
        {
            return Err(TfvcError::tool_failure(
                FaultKind::NonZeroExit,
                Some(100),
                "mock delete failure",
            ));
        }

        let (missing, deleted): (Vec<&String>, Vec<&String>) =
            paths.iter().partition(|path| data.missing.contains(*path));
        Ok(DeleteResult::new(
            deleted.into_iter().map(LocalPath::new).collect(),
            missing.into_iter().cloned().collect(),
            Vec::new(),
        ))
    }

    fn undo_local_files(&self, _context: &ServerContext, paths: &[String]) -> Result<Vec<String>> {
        self.begin(RecordedCall::Undo {
            paths: paths.to_vec(),
        })?;
        let data = self.data.lock().unwrap();
        Ok(data.undone.clone().unwrap_or_else(|| paths.to_vec()))
    }

    fn checkout_for_edit(
        &self,
        _context: &ServerContext,
        paths: &[PathBuf],
        recursive: bool,
    ) -> Result<CheckoutResult> {
        self.begin(RecordedCall::Checkout {
            paths: paths.to_vec(),
            recursive,
        })?;

        let data = self.data.lock().unwrap();
        let mut result = CheckoutResult::default();
        for path in paths {
            let display = path.to_string_lossy().into_owned();
            if data.missing.contains(&display) {
                result.not_found_files.push(display);
            } else {
                result.checked_out_files.push(LocalPath::new(path));
            }
        }
        Ok(result)
    }

    fn get_workspace(&self, _context: &ServerContext, name: &str) -> Result<Workspace> {
        self.begin(RecordedCall::GetWorkspace {
            name: name.to_string(),
        })?;
        self.data
            .lock()
            .unwrap()
            .workspaces
            .get(name)
            .cloned()
            .ok_or_else(|| TfvcError::parse_failure(format!("no workspace named {name}")))
    }

    fn get_detailed_workspace(
        &self,
        _context: &ServerContext,
        local_root: &Path,
    ) -> Result<Workspace> {
        self.begin(RecordedCall::GetDetailedWorkspace {
            root: local_root.to_path_buf(),
        })?;
        self.data
            .lock()
            .unwrap()
            .detailed_workspace
            .clone()
            .ok_or_else(|| {
                TfvcError::parse_failure(format!(
                    "no workspace maps {}",
                    local_root.display()
                ))
            })
    }

    fn update_workspace(
        &self,
        _context: &ServerContext,
        old: &Workspace,
        new: &Workspace,
    ) -> Result<()> {
        self.begin(RecordedCall::UpdateWorkspace {
            old: old.clone(),
            new: new.clone(),
        })?;
        let mut data = self.data.lock().unwrap();
        data.workspaces.remove(&old.name);
        data.workspaces.insert(new.name.clone(), new.clone());
        Ok(())
    }

    fn sync_workspace(&self, _context: &ServerContext, root: &Path) -> Result<()> {
        self.begin(RecordedCall::Sync {
            root: root.to_path_buf(),
        })
    }
}
