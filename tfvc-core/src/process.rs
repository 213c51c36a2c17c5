use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::info;

use crate::error::{Result, TfvcError};
use crate::settings::Settings;

pub const TELEMETRY_VARIABLE: &str = "TF_NOTELEMETRY";
pub const RUNTIME_ARGS_VARIABLE: &str = "TF_ADDITIONAL_JAVA_ARGS";
pub const PINNED_LOCALE_ARGS: &str = "-Duser.country=US -Duser.language=en -Dfile.encoding=utf-8";

/// Launches the tool with a fixed environment overlay: telemetry off, locale
/// and encoding pinned, and the runtime's `bin` directory ahead of PATH so
/// the tool finds a compatible runtime. Exit codes and output are left to
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    runtime_home: Option<PathBuf>,
    extra_environment: BTreeMap<String, String>,
}

impl ProcessInvoker {
    pub fn new(runtime_home: Option<PathBuf>) -> Self {
        Self {
            runtime_home,
            extra_environment: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            runtime_home: settings.runtime_home.clone(),
            extra_environment: settings.extra_environment.clone(),
        }
    }

    pub fn runtime_bin_dir(&self) -> Option<PathBuf> {
        if let Some(home) = &self.runtime_home {
            return Some(home.join("bin"));
        }
        if let Some(home) = env::var_os("JAVA_HOME").filter(|home| !home.is_empty()) {
            return Some(PathBuf::from(home).join("bin"));
        }
        env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
    }

    pub fn patched_path(&self) -> OsString {
        let inherited = env::var_os("PATH").unwrap_or_default();
        let Some(bin_dir) = self.runtime_bin_dir() else {
            return inherited;
        };

        let mut entries = vec![bin_dir];
        entries.extend(env::split_paths(&inherited));
        // join_paths only fails when an entry contains the separator itself
        env::join_paths(entries).unwrap_or(inherited)
    }

    pub fn environment(&self) -> Vec<(String, OsString)> {
        let mut vars = vec![
            (TELEMETRY_VARIABLE.to_string(), OsString::from("TRUE")),
            (
                RUNTIME_ARGS_VARIABLE.to_string(),
                OsString::from(PINNED_LOCALE_ARGS),
            ),
            ("PATH".to_string(), self.patched_path()),
        ];
        vars.extend(
            self.extra_environment
                .iter()
                .map(|(key, value)| (key.clone(), OsString::from(value))),
        );
        vars
    }

    pub fn build_command(
        &self,
        program: &Path,
        args: &[String],
        working_directory: Option<&Path>,
    ) -> Command {
        let mut command = Command::new(program);
        command.args(args);
        for (key, value) in self.environment() {
            command.env(key, value);
        }
        if let Some(dir) = working_directory.filter(|dir| !dir.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Starts the process with piped stdout and stderr. Must be called
    /// within a tokio runtime; the child is killed if dropped while running.
    pub fn start(
        &self,
        program: &Path,
        args: &[String],
        working_directory: Option<&Path>,
    ) -> Result<Child> {
        info!(
            program = %program.display(),
            args = ?redact_arguments(args),
            ?working_directory,
            "Starting tf process"
        );

        self.build_command(program, args, working_directory)
            .spawn()
            .map_err(|source| TfvcError::LaunchFailure {
                program: program.to_path_buf(),
                source,
            })
    }
}

/// Hides the secret half of `-login:user,secret` for logging.
pub fn redact_arguments(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.strip_prefix("-login:") {
            Some(login) => {
                let user = login.split(',').next().unwrap_or_default();
                format!("-login:{user},***")
            }
            None => arg.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(String, OsString)], key: &str) -> Option<&'a OsString> {
        vars.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn test_environment_overlay() {
        let invoker = ProcessInvoker::new(Some(PathBuf::from("/opt/runtime")));
        let vars = invoker.environment();

        assert_eq!(lookup(&vars, TELEMETRY_VARIABLE).unwrap(), "TRUE");
        assert_eq!(lookup(&vars, RUNTIME_ARGS_VARIABLE).unwrap(), PINNED_LOCALE_ARGS);

        let path = lookup(&vars, "PATH").unwrap();
        let first = env::split_paths(path).next().unwrap();
        assert_eq!(first, PathBuf::from("/opt/runtime").join("bin"));
    }

    #[test]
    fn test_extra_environment_is_passed() {
        let mut settings = Settings::default();
        settings
            .extra_environment
            .insert("TF_DIFF_COMMAND".to_string(), "meld".to_string());
        let vars = ProcessInvoker::from_settings(&settings).environment();

        assert_eq!(lookup(&vars, "TF_DIFF_COMMAND").unwrap(), "meld");
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_failure() {
        let invoker = ProcessInvoker::default();
        let err = invoker
            .start(Path::new("/definitely/not/a/real/tf-binary"), &[], None)
            .unwrap_err();

        assert!(matches!(err, TfvcError::LaunchFailure { .. }));
    }

    #[test]
    fn test_redacts_login() {
        let args = vec![
            "status".to_string(),
            "-login:dev,hunter2".to_string(),
            "-noprompt".to_string(),
        ];
        assert_eq!(
            redact_arguments(&args),
            vec!["status", "-login:dev,***", "-noprompt"]
        );
    }
}
