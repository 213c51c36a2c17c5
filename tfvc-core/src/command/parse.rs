//! Parsers for the tool's textual output.
//!
//! The tool lists affected items grouped under folder headers (`/ws/dir:`),
//! prints key/value blocks for `status -format:detailed`, `info` and
//! `workspaces -format:detailed`, and reports per-item problems on stderr.

use std::path::Path;

use crate::command::ToolOutput;
use crate::error::{FaultKind, Result, TfvcError};
use crate::models::{
    CheckoutResult, DeleteResult, ExtendedItemInfo, ItemInfo, ItemType, Location, Mapping,
    PendingChange, ServerStatusType, Workspace,
};
use crate::path::LocalPath;

const CLOAKED_PREFIX: &str = "(cloaked)";

pub fn classify_failure(output: &ToolOutput) -> TfvcError {
    let stderr = if output.stderr.trim().is_empty() {
        output.stdout.as_str()
    } else {
        output.stderr.as_str()
    };
    let lowered = stderr.to_ascii_lowercase();

    if lowered.contains("tf30063")
        || lowered.contains("unauthorized")
        || lowered.contains("not authorized")
        || lowered.contains("authentication failed")
    {
        return TfvcError::NotAuthorized(stderr.trim().to_string());
    }

    let kind = if lowered.contains("end user license agreement") || lowered.contains("eula") {
        FaultKind::EulaNotAccepted
    } else if output.exit_code == Some(127) || lowered.contains("command not found") {
        FaultKind::ToolNotFound
    } else {
        FaultKind::NonZeroExit
    };
    TfvcError::tool_failure(kind, output.exit_code, stderr)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn folder_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let folder = trimmed.strip_suffix(':')?;
    (!folder.is_empty() && !folder.contains(": ")).then_some(folder)
}

/// Walks a folder-grouped item listing, yielding `folder/name` for every item
/// line. `item_name` extracts the item from a line or rejects it.
fn item_listing<'a, F>(stdout: &'a str, item_name: F) -> Vec<String>
where
    F: Fn(&'a str) -> Option<&'a str>,
{
    let mut folder: Option<&str> = None;
    let mut items = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(header) = folder_header(trimmed) {
            folder = Some(header);
            continue;
        }
        let Some(name) = item_name(trimmed) else {
            continue;
        };
        let full = match folder {
            Some(folder) => Path::new(folder).join(name).to_string_lossy().into_owned(),
            None => name.to_string(),
        };
        items.push(full);
    }
    items
}

/// Extracts the item a "could not be found" style message refers to.
fn not_found_item(line: &str) -> Option<String> {
    let lowered = line.to_ascii_lowercase();
    if let Some(rest) = line.strip_prefix("The item ") {
        if lowered.contains("could not be found") {
            let end = rest.find(" could not be found")?;
            return Some(rest[..end].trim().to_string());
        }
    }
    if let Some(rest) = line.strip_prefix("No items match ") {
        return Some(rest.trim().trim_end_matches('.').to_string());
    }
    if let Some(item) = line.strip_suffix(": No file matches.") {
        return Some(item.trim().to_string());
    }
    None
}

fn split_stderr(stderr: &str) -> (Vec<String>, Vec<String>) {
    let mut not_found = Vec::new();
    let mut errors = Vec::new();
    for line in stderr.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match not_found_item(line) {
            Some(item) => not_found.push(item),
            None => errors.push(line.to_string()),
        }
    }
    (not_found, errors)
}

pub fn parse_delete(output: &ToolOutput) -> DeleteResult {
    let deleted = item_listing(&output.stdout, Some)
        .into_iter()
        .map(LocalPath::new)
        .collect();
    let (not_found, errors) = split_stderr(&output.stderr);
    DeleteResult::new(deleted, not_found, errors)
}

pub fn parse_checkout(output: &ToolOutput) -> CheckoutResult {
    let checked_out_files = item_listing(&output.stdout, Some)
        .into_iter()
        .map(LocalPath::new)
        .collect();
    let (not_found_files, errors) = split_stderr(&output.stderr);
    CheckoutResult {
        checked_out_files,
        not_found_files,
        errors,
    }
}

/// Paths reported as undone (`Undoing edit: name`); other lines, such as
/// "No pending changes were found", are ignored.
pub fn parse_undo(stdout: &str) -> Vec<String> {
    item_listing(stdout, |line| {
        line.strip_prefix("Undoing")
            .and_then(|rest| rest.split_once(": "))
            .map(|(_, name)| name.trim())
    })
}

/// Parses `status -format:detailed`.
pub fn parse_status(stdout: &str) -> Result<Vec<PendingChange>> {
    let mut changes = Vec::new();
    let mut current: Option<PendingChange> = None;
    let mut candidates = false;

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim().eq_ignore_ascii_case("Detected Changes:") {
            candidates = true;
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            if line.starts_with("$/") {
                changes.extend(current.take());
                current = Some(PendingChange {
                    server_item: line.trim().to_string(),
                    local_item: None,
                    version: None,
                    owner: None,
                    date: None,
                    lock: None,
                    change_types: Vec::new(),
                    workspace: None,
                    computer: None,
                    is_candidate: candidates,
                    source_item: None,
                });
            }
            continue;
        }

        let Some(change) = current.as_mut() else {
            return Err(TfvcError::parse_failure(format!(
                "status detail without an item: {line}"
            )));
        };
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "user" => change.owner = non_empty(value),
            "date" => change.date = non_empty(value),
            "lock" => change.lock = non_empty(value),
            "change" => change.change_types = ServerStatusType::parse_list(value),
            "workspace" => change.workspace = non_empty(value),
            "version" => change.version = non_empty(value),
            "source item" => change.source_item = non_empty(value),
            "local item" => {
                // "[computer] /local/path"
                match value.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
                    Some((computer, path)) => {
                        change.computer = non_empty(computer);
                        change.local_item = non_empty(path);
                    }
                    None => change.local_item = non_empty(value),
                }
            }
            _ => {}
        }
    }

    changes.extend(current);
    Ok(changes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfoSection {
    None,
    Local,
    Server,
}

/// Incremental parser for `info` output. Feed it lines as they arrive; each
/// completed item is returned as soon as the next one starts.
#[derive(Debug)]
pub struct ItemInfoParser {
    section: InfoSection,
    current: Option<ExtendedItemInfo>,
}

impl Default for ItemInfoParser {
    fn default() -> Self {
        Self {
            section: InfoSection::None,
            current: None,
        }
    }
}

impl ItemInfoParser {
    pub fn feed_line(&mut self, line: &str) -> Option<ItemInfo> {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("Local information:") {
            self.section = InfoSection::Local;
            let finished = self.current.take().map(|item| item.to_item_info());
            self.current = Some(empty_extended_item());
            return finished;
        }
        if trimmed.eq_ignore_ascii_case("Server information:") {
            self.section = InfoSection::Server;
            return None;
        }

        let (Some(item), Some((key, value))) = (self.current.as_mut(), split_key_value(trimmed))
        else {
            return None;
        };

        match (self.section, key.to_ascii_lowercase().as_str()) {
            (InfoSection::Local, "local path") => item.local_item = non_empty(value),
            (InfoSection::Local, "changeset") => item.local_version = value.parse().ok(),
            (InfoSection::Local, "change") => {
                item.pending_change = value
                    .split(',')
                    .map(str::trim)
                    .filter(|change| !change.is_empty() && *change != "none")
                    .map(str::to_string)
                    .collect();
            }
            (_, "server path") => item.server_item = value.to_string(),
            (InfoSection::Server, "changeset") => item.latest_version = value.parse().ok(),
            (InfoSection::Server, "deletion id") => item.deletion_id = value.parse().unwrap_or(0),
            (InfoSection::Server, "lock") => item.lock_level = non_empty(value),
            (InfoSection::Server, "lock owner") => item.lock_owner = non_empty(value),
            (InfoSection::Server, "last modified") => item.checkin_date = non_empty(value),
            (InfoSection::Server, "file type") => item.encoding = non_empty(value),
            (InfoSection::Server, "size") => item.file_size = value.parse().ok(),
            (_, "type") => {
                item.item_type = match value.to_ascii_lowercase().as_str() {
                    "file" => ItemType::File,
                    "folder" => ItemType::Folder,
                    _ => ItemType::Any,
                }
            }
            _ => {}
        }
        None
    }

    pub fn finish(self) -> Option<ItemInfo> {
        self.current.map(|item| item.to_item_info())
    }
}

fn empty_extended_item() -> ExtendedItemInfo {
    ExtendedItemInfo {
        server_item: String::new(),
        local_item: None,
        local_version: None,
        latest_version: None,
        pending_change: Vec::new(),
        item_type: ItemType::Any,
        lock_level: None,
        lock_owner: None,
        deletion_id: 0,
        checkin_date: None,
        encoding: None,
        file_size: None,
    }
}

/// Parses one workspace from `workspaces -format:detailed`.
pub fn parse_workspace(stdout: &str) -> Result<Workspace> {
    let mut workspace: Option<Workspace> = None;
    let mut in_mappings = false;

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("===") {
            in_mappings = false;
            continue;
        }

        if in_mappings {
            if is_mapping_line(trimmed) {
                if let Some(ws) = workspace.as_mut() {
                    ws.mappings.push(parse_mapping(trimmed)?);
                }
                continue;
            }
            in_mappings = false;
        }

        if trimmed.eq_ignore_ascii_case("Working folders:") {
            in_mappings = true;
            continue;
        }

        let Some((key, value)) = split_key_value(trimmed) else {
            continue;
        };
        if key.eq_ignore_ascii_case("workspace") {
            if workspace.is_some() {
                // Only the first workspace of a listing is of interest.
                break;
            }
            workspace = Some(Workspace {
                name: value.to_string(),
                ..Workspace::default()
            });
            continue;
        }

        let Some(ws) = workspace.as_mut() else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "owner" => ws.owner = value.to_string(),
            "computer" => ws.computer = value.to_string(),
            "comment" => ws.comment = value.to_string(),
            "collection" => ws.server = value.to_string(),
            "location" => ws.location = value.parse().unwrap_or(Location::Unknown),
            _ => {}
        }
    }

    workspace.ok_or_else(|| TfvcError::parse_failure("no workspace found in tool output"))
}

fn is_mapping_line(line: &str) -> bool {
    line.starts_with("$/") || line.starts_with(CLOAKED_PREFIX)
}

fn parse_mapping(line: &str) -> Result<Mapping> {
    if let Some(rest) = line.strip_prefix(CLOAKED_PREFIX) {
        let server_path = rest.trim().trim_end_matches(':');
        return Ok(Mapping::cloaked(server_path));
    }

    // Server paths never contain ':', so the first one separates the sides.
    let (server_path, local_path) = line
        .split_once(':')
        .ok_or_else(|| TfvcError::parse_failure(format!("malformed working folder: {line}")))?;
    Ok(Mapping::new(server_path.trim(), local_path.trim()))
}

/// The workspace name from `workfold` output (`Workspace : W1 (owner)`).
pub fn parse_workfold_name(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .filter_map(split_key_value)
        .find(|(key, _)| key.eq_ignore_ascii_case("workspace"))
        .map(|(_, value)| match value.rfind(" (") {
            Some(index) => value[..index].trim().to_string(),
            None => value.to_string(),
        })
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TfvcError::parse_failure("no workspace found in workfold output"))
}
