use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The tf command line client. A bare name is resolved through PATH.
    #[serde(default = "default_tf_executable")]
    pub tf_executable: PathBuf,

    /// Runtime installation whose `bin` directory is put ahead of PATH for
    /// the tool. Falls back to `JAVA_HOME`, then to this executable's folder.
    #[serde(default)]
    pub runtime_home: Option<PathBuf>,

    /// Working directory for invocations that don't need a specific one.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Default collection URL used when none is given on the command line
    #[serde(default)]
    pub collection_url: Option<String>,

    #[serde(default)]
    pub team_project: Option<String>,

    /// Extra variables passed to every tool invocation
    #[serde(default)]
    pub extra_environment: BTreeMap<String, String>,
}

fn default_tf_executable() -> PathBuf {
    PathBuf::from("tf")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tf_executable: default_tf_executable(),
            runtime_home: None,
            working_directory: None,
            collection_url: None,
            team_project: None,
            extra_environment: BTreeMap::new(),
        }
    }
}
