use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, TfvcError};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("secret", &"***")
            .finish()
    }
}

/// Session handle for one collection. The client and the workspace model
/// only pass it through; the command runner turns it into tool arguments.
#[derive(Clone, Debug)]
pub struct ServerContext {
    inner: Arc<ServerContextInner>,
}

#[derive(Debug)]
struct ServerContextInner {
    collection_url: String,
    team_project: Option<String>,
    credentials: Option<Credentials>,
}

impl ServerContext {
    pub fn new(
        collection_url: impl Into<String>,
        team_project: Option<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            inner: Arc::new(ServerContextInner {
                collection_url: collection_url.into(),
                team_project,
                credentials,
            }),
        }
    }

    pub fn collection_url(&self) -> &str {
        &self.inner.collection_url
    }

    pub fn team_project(&self) -> Option<&str> {
        self.inner.team_project.as_deref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.inner.credentials.as_ref()
    }
}

/// What is known about the repository behind a local project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    pub url: String,
    pub team_project_name: String,
}

impl RepositoryContext {
    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty() && !self.team_project_name.trim().is_empty()
    }
}

/// A local project: its root folder and, when it could be determined, the
/// repository it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub base_path: PathBuf,
    pub repository: Option<RepositoryContext>,
}

/// Acquires authenticated contexts. `Ok(None)` means no context could be
/// created, for example because the user cancelled the sign-in.
#[async_trait::async_trait]
pub trait ServerContextProvider: Send + Sync {
    async fn create_context_from_tfvc_server_url(
        &self,
        server_url: &str,
        team_project: &str,
        prompt_if_needed: bool,
    ) -> Result<Option<ServerContext>>;
}

/// Hands out contexts built from fixed credentials (command line, env).
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    credentials: Option<Credentials>,
}

impl StaticContextProvider {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait::async_trait]
impl ServerContextProvider for StaticContextProvider {
    async fn create_context_from_tfvc_server_url(
        &self,
        server_url: &str,
        team_project: &str,
        _prompt_if_needed: bool,
    ) -> Result<Option<ServerContext>> {
        if server_url.trim().is_empty() {
            return Err(TfvcError::InvalidArgument(
                "server url is required".to_string(),
            ));
        }
        Ok(Some(ServerContext::new(
            server_url,
            Some(team_project.to_string()).filter(|project| !project.is_empty()),
            self.credentials.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let context = ServerContext::new(
            "http://server:8080/tfs/DefaultCollection",
            Some("Proj".to_string()),
            Some(Credentials {
                user_name: "dev".to_string(),
                secret: "hunter2".to_string(),
            }),
        );

        let rendered = format!("{context:?}");
        assert!(rendered.contains("dev"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticContextProvider::default();
        let context = provider
            .create_context_from_tfvc_server_url("http://server/tfs", "Proj", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(context.collection_url(), "http://server/tfs");
        assert_eq!(context.team_project(), Some("Proj"));

        assert!(provider
            .create_context_from_tfvc_server_url("", "Proj", true)
            .await
            .is_err());
    }
}
