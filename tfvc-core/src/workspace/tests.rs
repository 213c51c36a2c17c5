use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::client::TfvcClient;
use crate::command::mock::MockCommandRunner;
use crate::context::{ServerContext, StaticContextProvider};
use crate::executor::OperationExecutor;
use crate::models::{Location, Mapping, Workspace};
use crate::notify::{NotificationLevel, RecordingNotifier};
use crate::workspace::{ModelChange, ModelState, WorkspaceModel, WorkspaceProperty, WorkspaceServices};

fn model() -> (WorkspaceModel, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let services = WorkspaceServices {
        client: TfvcClient::new(Arc::new(MockCommandRunner::default())),
        contexts: Arc::new(StaticContextProvider::default()),
        executor: OperationExecutor::try_current().unwrap(),
        notifier: Arc::new(notifier.clone()),
    };
    (WorkspaceModel::new(services), notifier)
}

fn record_changes(model: &mut WorkspaceModel) -> Rc<RefCell<Vec<ModelChange>>> {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    model.add_listener(move |change| sink.borrow_mut().push(change));
    changes
}

fn workspace() -> Workspace {
    Workspace {
        server: "http://server:8080/tfs/DefaultCollection".to_string(),
        name: "W1".to_string(),
        computer: "box".to_string(),
        owner: "dev".to_string(),
        comment: String::new(),
        mappings: vec![Mapping::new("$/proj", "/ws/proj")],
        location: Location::Unknown,
    }
}

fn context() -> ServerContext {
    ServerContext::new("http://server:8080/tfs/DefaultCollection", None, None)
}

#[tokio::test]
async fn test_setter_notifies_only_on_change() {
    let (mut model, _) = model();
    let changes = record_changes(&mut model);

    model.set_name("");
    model.set_mappings(Vec::new());
    assert!(changes.borrow().is_empty());

    model.set_name("W2");
    model.set_name("W2");
    assert_eq!(
        *changes.borrow(),
        vec![ModelChange::Property(WorkspaceProperty::Name)]
    );
}

#[tokio::test]
async fn test_every_setter_notifies_once_per_change() {
    let (mut model, _) = model();
    let changes = record_changes(&mut model);

    model.set_server("");
    model.set_computer("");
    model.set_owner("");
    model.set_comment("");
    model.set_location(Location::Unknown);
    assert!(changes.borrow().is_empty());

    for _ in 0..2 {
        model.set_server("http://other:8080/tfs");
        model.set_computer("box");
        model.set_owner("dev");
        model.set_comment("nightly");
        model.set_location(Location::Server);
    }

    assert_eq!(
        *changes.borrow(),
        vec![
            ModelChange::Property(WorkspaceProperty::Server),
            ModelChange::Property(WorkspaceProperty::Computer),
            ModelChange::Property(WorkspaceProperty::Owner),
            ModelChange::Property(WorkspaceProperty::Comment),
            ModelChange::Property(WorkspaceProperty::Location),
        ]
    );
    assert_eq!(model.server(), "http://other:8080/tfs");
    assert_eq!(model.location(), Location::Server);
}

#[tokio::test]
async fn test_mappings_compared_by_content() {
    let (mut model, _) = model();
    model.set_mappings(vec![Mapping::new("$/a", "/a"), Mapping::new("$/b", "/b")]);
    let changes = record_changes(&mut model);

    model.set_mappings(vec![Mapping::new("$/a", "/a"), Mapping::new("$/b", "/b")]);
    assert!(changes.borrow().is_empty());

    model.set_mappings(vec![Mapping::new("$/b", "/b"), Mapping::new("$/a", "/a")]);
    assert_eq!(changes.borrow().len(), 1);
}

#[tokio::test]
async fn test_validate_checks_name_first() {
    let (mut model, _) = model();
    model.set_mappings(vec![Mapping::new("$/proj", "/ws/proj")]);

    let info = model.validate().unwrap_err();
    assert_eq!(info.field, WorkspaceProperty::Name);

    model.set_mappings(Vec::new());
    assert_eq!(model.validate().unwrap_err().field, WorkspaceProperty::Name);

    model.set_name("W1");
    assert_eq!(
        model.validate().unwrap_err().field,
        WorkspaceProperty::Mappings
    );

    model.set_mappings(vec![Mapping::new("$/proj", "/ws/proj")]);
    assert!(model.validate().is_ok());
}

#[tokio::test]
async fn test_blank_name_is_not_empty() {
    let (mut model, _) = model();
    model.set_name(" ");
    model.set_mappings(vec![Mapping::new("$/proj", "/ws/proj")]);

    assert!(model.validate().is_ok());
}

#[tokio::test]
async fn test_overlapping_loads_report_loading_once() {
    let (mut model, _) = model();
    let changes = record_changes(&mut model);

    model.load_workspace_with_context(context(), workspace());
    model.load_workspace_with_context(context(), workspace());
    assert_eq!(model.pending_operations(), 2);
    model.wait_until_idle().await;

    assert!(!model.is_loading());
    assert_eq!(model.state(), ModelState::Loaded);
    let loading = changes
        .borrow()
        .iter()
        .filter(|change| **change == ModelChange::Property(WorkspaceProperty::Loading))
        .count();
    assert_eq!(loading, 2);
}

#[tokio::test]
async fn test_load_with_context_fills_fields() {
    let (mut model, notifier) = model();
    let changes = record_changes(&mut model);
    assert_eq!(model.state(), ModelState::Empty);

    model.load_workspace_with_context(context(), workspace());
    assert_eq!(model.state(), ModelState::Loading);
    assert!(model.wait_for_completion().await);

    assert_eq!(model.state(), ModelState::Loaded);
    assert_eq!(model.name(), "W1");
    assert_eq!(model.owner(), "dev");
    assert_eq!(model.location(), Location::Local);
    assert_eq!(model.old_workspace(), Some(&workspace()));
    assert!(model.server_context().is_some());
    assert_eq!(notifier.count(), 0);

    assert_eq!(
        *changes.borrow(),
        vec![
            ModelChange::Property(WorkspaceProperty::Loading),
            ModelChange::All,
            ModelChange::Property(WorkspaceProperty::Loading),
        ]
    );

    model.set_comment("edited");
    assert_eq!(model.state(), ModelState::Dirty);
}

#[tokio::test]
async fn test_load_failure_clears_loading() {
    let (mut model, notifier) = model();

    model
        .load_workspace_by_name(
            crate::context::RepositoryContext {
                url: "http://server:8080/tfs/DefaultCollection".to_string(),
                team_project_name: "Proj".to_string(),
            },
            "missing",
        )
        .unwrap();
    model.wait_until_idle().await;

    assert!(!model.is_loading());
    assert_eq!(model.state(), ModelState::Empty);
    assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
}

#[tokio::test]
async fn test_save_requires_loaded_workspace() {
    let (mut model, _) = model();
    model.set_name("W1");
    model.set_mappings(vec![Mapping::new("$/proj", "/ws/proj")]);

    assert!(model.save_workspace("/ws", false, None).is_err());
    assert!(model.sync_workspace("/ws").is_err());
    assert_eq!(model.pending_operations(), 0);
}
