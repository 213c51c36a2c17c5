use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tfvc_core::command::mock::{MockBehavior, RecordedCall};
use tfvc_core::localization::Message;
use tfvc_core::models::{Location, WorkspaceDiff};
use tfvc_core::notify::NotificationLevel;
use tfvc_core::workspace::ModelState;
use tfvc_core::{FaultKind, Project, RepositoryContext};

mod fixture;

fn repository() -> RepositoryContext {
    RepositoryContext {
        url: fixture::COLLECTION_URL.to_string(),
        team_project_name: "Proj".to_string(),
    }
}

/// Lets background tasks spawned outside the model run to completion.
async fn wait_for_notifications(notifier: &tfvc_core::notify::RecordingNotifier, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while notifier.count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notification never arrived");
}

#[test]
fn test_failed_save_keeps_baseline() {
    fixture::run(|fixture| async move {
        let original = fixture.remote_workspace("W1");
        let mut model = fixture.model();
        model.load_workspace_by_name(repository(), "W1").unwrap();
        model.wait_until_idle().await;
        assert_eq!(model.old_workspace(), Some(&original));

        model.set_comment("first attempt");
        fixture.set_mock_behavior(MockBehavior::FailThenSuccess {
            remaining_errors: 1,
            kind: FaultKind::NonZeroExit,
        });
        model
            .save_workspace(fixture.workspace_path(), false, None)
            .unwrap();
        assert_eq!(model.state(), ModelState::Saving);
        model.wait_until_idle().await;

        assert_eq!(model.old_workspace(), Some(&original));
        assert_eq!(model.state(), ModelState::Dirty);
        assert_eq!(fixture.notifier.levels(), vec![NotificationLevel::Error]);

        model.set_comment("second attempt");
        model
            .save_workspace(fixture.workspace_path(), false, None)
            .unwrap();
        model.wait_until_idle().await;

        let updates: Vec<_> = fixture
            .runner
            .get_captured_calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::UpdateWorkspace { old, new } => Some((old, new)),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, original);
        assert_eq!(updates[1].0, original, "retry diffs against the original baseline");
        assert_eq!(updates[1].1.comment, "second attempt");

        assert_eq!(model.old_workspace().unwrap().comment, "second attempt");
        assert_eq!(model.state(), ModelState::Loaded);
        assert_eq!(
            fixture.notifier.levels(),
            vec![NotificationLevel::Error, NotificationLevel::Success]
        );
    });
}

#[test]
fn test_save_success_offers_sync() {
    fixture::run(|fixture| async move {
        fixture.remote_workspace("W1");
        let mut model = fixture.model();
        model.load_workspace_by_name(repository(), "W1").unwrap();
        model.wait_until_idle().await;

        model.set_name("W2");
        model
            .save_workspace(fixture.workspace_path(), false, None)
            .unwrap();
        model.wait_until_idle().await;

        let mut notifications = fixture.notifier.take();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, Message::SaveSuccess.text());
        let follow_up = notifications[0].follow_up.take().unwrap();
        assert_eq!(follow_up.label(), Message::SyncFollowUp.text());

        follow_up.run();
        wait_for_notifications(&fixture.notifier, 1).await;

        assert_eq!(fixture.notifier.messages(), vec![Message::SyncSuccess.text()]);
        assert!(fixture.runner.get_captured_calls().contains(&RecordedCall::Sync {
            root: fixture.workspace_path(),
        }));
    });
}

#[test]
fn test_save_runs_continuation_instead_of_notifying() {
    fixture::run(|fixture| async move {
        fixture.remote_workspace("W1");
        let mut model = fixture.model();
        model.load_workspace_by_name(repository(), "W1").unwrap();
        model.wait_until_idle().await;

        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        model
            .save_workspace(
                fixture.workspace_path(),
                true,
                Some(Box::new(move || flag.set(true))),
            )
            .unwrap();
        model.wait_until_idle().await;

        assert!(called.get());
        assert_eq!(fixture.notifier.count(), 0);

        let calls = fixture.runner.get_captured_calls();
        let update = calls
            .iter()
            .position(|call| matches!(call, RecordedCall::UpdateWorkspace { .. }))
            .unwrap();
        let sync = calls
            .iter()
            .position(|call| matches!(call, RecordedCall::Sync { .. }))
            .unwrap();
        assert!(update < sync);
    });
}

#[test]
fn test_cancelled_sign_in_is_not_authorized() {
    fixture::run(|fixture| async move {
        fixture.contexts.cancel_sign_in();
        let mut model = fixture.model();

        model.load_workspace_by_name(repository(), "W1").unwrap();
        assert!(model.is_loading());
        model.wait_until_idle().await;

        assert!(!model.is_loading());
        assert!(model.server_context().is_none());
        assert_eq!(fixture.notifier.levels(), vec![NotificationLevel::Error]);
        assert_eq!(fixture.notifier.messages(), vec![Message::AuthFailed.text()]);
        assert_eq!(fixture.runner.get_call_count(), 0);
    });
}

#[test]
fn test_load_for_project_uses_detailed_workspace() {
    fixture::run(|fixture| async move {
        let workspace = fixture.remote_workspace("W1");
        fixture.runner.set_detailed_workspace(workspace.clone());
        let mut model = fixture.model();

        model.load_workspace_for_project(Project {
            base_path: fixture.workspace_path(),
            repository: Some(repository()),
        });
        model.wait_until_idle().await;

        assert_eq!(model.name(), "W1");
        assert_eq!(model.mappings(), workspace.mappings.as_slice());
        assert_eq!(
            fixture.runner.get_captured_calls(),
            vec![RecordedCall::GetDetailedWorkspace {
                root: fixture.workspace_path(),
            }]
        );
    });
}

#[test]
fn test_load_for_unbound_project_reports_error() {
    fixture::run(|fixture| async move {
        let mut model = fixture.model();

        model.load_workspace_for_project(Project {
            base_path: fixture.workspace_path(),
            repository: None,
        });
        model.wait_until_idle().await;

        assert_eq!(model.state(), ModelState::Empty);
        assert_eq!(fixture.notifier.levels(), vec![NotificationLevel::Error]);
    });
}

#[test]
fn test_sync_reports_through_notifier() {
    fixture::run(|fixture| async move {
        fixture.remote_workspace("W1");
        let mut model = fixture.model();
        model.load_workspace_by_name(repository(), "W1").unwrap();
        model.wait_until_idle().await;

        fixture.set_mock_behavior(MockBehavior::AlwaysNotAuthorized);
        model.sync_workspace(fixture.workspace_path()).unwrap();
        assert_eq!(model.state(), ModelState::Syncing);
        model.wait_until_idle().await;

        assert!(!model.is_syncing());
        assert_eq!(fixture.notifier.levels(), vec![NotificationLevel::Error]);
        assert_eq!(fixture.notifier.messages(), vec![Message::AuthFailed.text()]);
    });
}

#[test]
fn test_comment_edit_leaves_unreported_location_alone() {
    fixture::run(|fixture| async move {
        let mut original = fixture.remote_workspace("W1");
        original.location = Location::Unknown;
        let mut model = fixture.model();
        model.load_workspace_with_context(fixture.context(), original);
        model.wait_until_idle().await;

        model.set_comment("just a comment");
        model
            .save_workspace(fixture.workspace_path(), false, None)
            .unwrap();
        model.wait_until_idle().await;

        let (old, new) = fixture
            .runner
            .get_captured_calls()
            .into_iter()
            .find_map(|call| match call {
                RecordedCall::UpdateWorkspace { old, new } => Some((old, new)),
                _ => None,
            })
            .unwrap();
        let diff = WorkspaceDiff::between(&old, &new);
        assert_eq!(diff.new_comment.as_deref(), Some("just a comment"));
        assert_eq!(diff.new_location, None);
        assert!(diff.new_name.is_none());
        assert!(diff.mappings_to_add.is_empty());
        assert_eq!(model.state(), ModelState::Loaded);
    });
}

#[test]
fn test_overlapping_syncs_stay_syncing() {
    fixture::run(|fixture| async move {
        fixture.remote_workspace("W1");
        let mut model = fixture.model();
        model.load_workspace_by_name(repository(), "W1").unwrap();
        model.wait_until_idle().await;

        model.sync_workspace(fixture.workspace_path()).unwrap();
        wait_for_notifications(&fixture.notifier, 1).await;

        fixture.runner.set_delay(Duration::from_millis(500));
        model.sync_workspace(fixture.workspace_path()).unwrap();
        assert!(model.wait_for_completion().await);

        assert_eq!(model.pending_operations(), 1);
        assert!(model.is_syncing());
        assert_eq!(model.state(), ModelState::Syncing);

        model.wait_until_idle().await;
        assert!(!model.is_syncing());
        assert_eq!(model.state(), ModelState::Loaded);
        assert_eq!(
            fixture.notifier.levels(),
            vec![NotificationLevel::Success, NotificationLevel::Success]
        );
    });
}
