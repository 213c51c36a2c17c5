use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tfvc_core::{
    command::mock::{MockBehavior, MockCommandRunner},
    context::StaticContextProvider,
    models::{Location, Mapping, Workspace},
    notify::RecordingNotifier,
    OperationExecutor, Result, ServerContext, ServerContextProvider, TfvcClient, WorkspaceModel,
    WorkspaceServices,
};

pub const COLLECTION_URL: &str = "http://server:8080/tfs/DefaultCollection";

/// Context provider whose sign-in can be made to fail.
#[derive(Default)]
pub struct FakeContextProvider {
    inner: StaticContextProvider,
    cancelled: AtomicBool,
}

impl FakeContextProvider {
    #[allow(dead_code)]
    pub fn cancel_sign_in(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ServerContextProvider for FakeContextProvider {
    async fn create_context_from_tfvc_server_url(
        &self,
        server_url: &str,
        team_project: &str,
        prompt_if_needed: bool,
    ) -> Result<Option<ServerContext>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner
            .create_context_from_tfvc_server_url(server_url, team_project, prompt_if_needed)
            .await
    }
}

pub struct Fixture {
    pub runner: MockCommandRunner,
    pub notifier: RecordingNotifier,
    pub contexts: Arc<FakeContextProvider>,
    pub client: TfvcClient,
    pub workspace_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_mock_behavior(MockBehavior::Success)
    }

    pub fn with_mock_behavior(behavior: MockBehavior) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let runner = MockCommandRunner::new(behavior);
        let client = TfvcClient::new(Arc::new(runner.clone()));

        Fixture {
            runner,
            notifier: RecordingNotifier::new(),
            contexts: Arc::new(FakeContextProvider::default()),
            client,
            workspace_dir: TempDir::new().unwrap(),
        }
    }

    #[allow(dead_code)]
    pub fn set_mock_behavior(&self, behavior: MockBehavior) {
        self.runner.set_behavior(behavior);
    }

    #[allow(dead_code)]
    pub fn context(&self) -> ServerContext {
        ServerContext::new(COLLECTION_URL, Some("Proj".to_string()), None)
    }

    #[allow(dead_code)]
    pub fn workspace_path(&self) -> PathBuf {
        self.workspace_dir.path().to_path_buf()
    }

    /// A workspace mapping the fixture's temp dir, registered with the mock.
    #[allow(dead_code)]
    pub fn remote_workspace(&self, name: &str) -> Workspace {
        let workspace = Workspace {
            server: COLLECTION_URL.to_string(),
            name: name.to_string(),
            computer: "box".to_string(),
            owner: "dev".to_string(),
            comment: "initial".to_string(),
            mappings: vec![Mapping::new("$/Proj", self.workspace_path())],
            location: Location::Server,
        };
        self.runner.add_workspace(workspace.clone());
        workspace
    }

    #[allow(dead_code)]
    pub fn model(&self) -> WorkspaceModel {
        WorkspaceModel::new(WorkspaceServices {
            client: self.client.clone(),
            contexts: self.contexts.clone(),
            executor: OperationExecutor::try_current().unwrap(),
            notifier: Arc::new(self.notifier.clone()),
        })
    }
}

#[allow(dead_code)]
pub fn run<F, Fut>(test_fn: F)
where
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    use tokio::time::{timeout, Duration};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    let local = tokio::task::LocalSet::new();

    runtime.block_on(local.run_until(async {
        let fixture = Fixture::new();
        let test_future = test_fn(fixture);
        timeout(Duration::from_secs(30), test_future)
            .await
            .expect("Test timed out after 30 seconds");
    }));
}
