use super::{local_stack, test_runtime, wait_for_connects};
use futures::{FutureExt, StreamExt};
use overcooked_core::{
    ChatBackend, ConnectionState, FailureKind, Identity, IdentityProvider, NavigationController,
    NavigationTarget, Registration, Screen, SessionEvent, SessionSnapshot, SessionStore,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn failure_kinds(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<FailureKind> {
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Failure(err) = event {
            kinds.push(err.kind());
        }
    }
    kinds
}

#[test]
fn cold_start_with_session_reaches_chat() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(temp_dir.path().to_path_buf());
    store
        .save_current(&Identity::new("u1", "Ann"))
        .expect("persist session");

    let (stack, _events) = local_stack(&runtime, Some(store));
    let task = stack.coordinator.on_app_start().expect("connect issued");
    assert_eq!(task.user_id(), "u1");
    assert_eq!(
        stack.coordinator.snapshot().connection_state,
        ConnectionState::Initializing
    );

    runtime.block_on(task.finished());
    assert_eq!(stack.chat.connect_calls(), 1);
    assert_eq!(stack.chat.connected_user().as_deref(), Some("u1"));
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Chat);
    assert_eq!(stack.navigation.history(), vec![Screen::Chat]);
}

#[test]
fn cold_start_without_session_shows_login() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);

    assert!(stack.coordinator.on_app_start().is_none());
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Login);
    assert_eq!(stack.navigation.history(), vec![Screen::Login]);
    assert_eq!(stack.chat.connect_calls(), 0);
}

#[test]
fn failed_connect_offers_retry() {
    let runtime = test_runtime();
    let (stack, mut events) = local_stack(&runtime, None);
    stack.chat.fail_connects(Some("backend unavailable"));

    let task = stack
        .coordinator
        .on_auth_success(Identity::new("u2", "Bo"))
        .expect("connect issued");
    runtime.block_on(task.finished());

    assert_eq!(
        stack.coordinator.snapshot().connection_state,
        ConnectionState::Failed
    );
    assert_eq!(
        stack.coordinator.navigation_target(),
        NavigationTarget::Loading {
            retry_available: true
        }
    );
    assert_eq!(failure_kinds(&mut events), vec![FailureKind::ConnectionFailure]);

    stack.chat.fail_connects(None);
    let retry = stack.coordinator.retry().expect("retry issued");
    runtime.block_on(retry.finished());
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Chat);
}

#[test]
fn delete_account_disconnects_and_resets() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    let task = runtime
        .block_on(
            stack
                .coordinator
                .register(&Registration::new("Ann", "ann@example.com", "secret1")),
        )
        .expect("register")
        .expect("connect issued");
    runtime.block_on(task.finished());
    stack.navigation.navigate_to(Screen::Profile);
    assert_eq!(
        stack.navigation.history(),
        vec![Screen::Login, Screen::Chat, Screen::Profile]
    );

    runtime
        .block_on(stack.coordinator.delete_account())
        .expect("delete");

    assert_eq!(stack.chat.disconnect_calls(), 1);
    assert_eq!(stack.chat.last_flush_persistence(), Some(false));
    assert_eq!(stack.coordinator.snapshot(), SessionSnapshot::default());
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Login);
    assert_eq!(stack.navigation.history(), vec![Screen::Login]);
    assert!(!stack.navigation.pop_back());
    assert_eq!(stack.identity.account_count(), 0);
}

#[test]
fn failed_deletion_leaves_session_untouched() {
    let runtime = test_runtime();
    let (stack, mut events) = local_stack(&runtime, None);
    let task = runtime
        .block_on(
            stack
                .coordinator
                .register(&Registration::new("Ann", "ann@example.com", "secret1")),
        )
        .expect("register")
        .expect("connect issued");
    runtime.block_on(task.finished());
    let before = stack.coordinator.snapshot();
    failure_kinds(&mut events);

    stack.identity.fail_account_deletion(true);
    let err = runtime
        .block_on(stack.coordinator.delete_account())
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::AccountDeletionFailure);
    assert_eq!(stack.coordinator.snapshot(), before);
    assert_eq!(stack.chat.disconnect_calls(), 0);
    assert!(stack.identity.current_session().is_some());
    assert_eq!(
        failure_kinds(&mut events),
        vec![FailureKind::AccountDeletionFailure]
    );
}

#[test]
fn logout_survives_backend_and_provider_failures() {
    let runtime = test_runtime();
    let (stack, mut events) = local_stack(&runtime, None);
    let task = stack
        .coordinator
        .on_auth_success(Identity::new("u1", "Ann"))
        .expect("connect issued");
    runtime.block_on(task.finished());

    stack.chat.fail_disconnects(true);
    stack.identity.fail_sign_out(true);
    runtime.block_on(stack.coordinator.logout());

    assert_eq!(stack.coordinator.snapshot(), SessionSnapshot::default());
    assert_eq!(stack.navigation.history(), vec![Screen::Login]);
    assert_eq!(stack.chat.disconnect_calls(), 1);
    assert_eq!(failure_kinds(&mut events), vec![FailureKind::SignOutFailure]);
}

#[test]
fn stale_connect_after_logout_does_not_resurrect_session() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    stack.chat.hold_connects();
    let task = stack
        .coordinator
        .on_auth_success(Identity::new("u1", "Ann"))
        .expect("connect issued");
    wait_for_connects(&runtime, &stack, 1);

    runtime.block_on(stack.coordinator.logout());
    stack.chat.release_connects();
    runtime.block_on(task.finished());

    assert_eq!(stack.coordinator.snapshot(), SessionSnapshot::default());
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Login);
    assert_eq!(stack.chat.connected_user(), None);
    assert_eq!(stack.chat.state(), ConnectionState::NotInitialized);
}

#[test]
fn next_login_after_a_stale_connect_reaches_the_backend_alone() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    stack.chat.hold_connects();
    let stale = stack
        .coordinator
        .on_auth_success(Identity::new("u1", "Ann"))
        .expect("connect issued");
    wait_for_connects(&runtime, &stack, 1);
    runtime.block_on(stack.coordinator.logout());

    let fresh = stack
        .coordinator
        .on_auth_success(Identity::new("u2", "Bo"))
        .expect("connect issued");
    stack.chat.release_connects();
    runtime.block_on(stale.finished());
    runtime.block_on(fresh.finished());

    let snapshot = stack.coordinator.snapshot();
    assert_eq!(snapshot.user_id(), Some("u2"));
    assert_eq!(snapshot.connection_state, ConnectionState::Complete);
    assert_eq!(stack.chat.connected_user().as_deref(), Some("u2"));
}

#[test]
fn bad_credentials_change_nothing() {
    let runtime = test_runtime();
    let (stack, mut events) = local_stack(&runtime, None);
    stack
        .identity
        .seed_account("ann@example.com", "secret1", Some("Ann"))
        .expect("seed");

    let err = runtime
        .block_on(stack.coordinator.sign_in("ann@example.com", "wrong"))
        .err()
        .expect("sign-in rejected");

    assert_eq!(err.kind(), FailureKind::AuthenticationFailure);
    assert_eq!(stack.coordinator.snapshot(), SessionSnapshot::default());
    assert_eq!(stack.chat.connect_calls(), 0);
    assert_eq!(
        failure_kinds(&mut events),
        vec![FailureKind::AuthenticationFailure]
    );
}

#[test]
fn invalid_registration_never_reaches_provider() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    let err = runtime
        .block_on(
            stack
                .coordinator
                .register(&Registration::new("Ann", "ann@example.com", "123")),
        )
        .err()
        .expect("rejected");
    assert_eq!(err.user_message(), "Password must be at least 6 characters");
    assert_eq!(stack.identity.account_count(), 0);
}

#[test]
fn session_survives_restart_and_logout_clears_it() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(temp_dir.path().to_path_buf());

    {
        let runtime = test_runtime();
        let (stack, _events) = local_stack(&runtime, Some(store.clone()));
        let task = runtime
            .block_on(
                stack
                    .coordinator
                    .register(&Registration::new("Ann", "ann@example.com", "secret1")),
            )
            .expect("register")
            .expect("connect issued");
        runtime.block_on(task.finished());
    }

    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, Some(store.clone()));
    let task = stack.coordinator.on_app_start().expect("session restored");
    runtime.block_on(task.finished());
    assert_eq!(
        stack
            .coordinator
            .snapshot()
            .identity
            .map(|identity| identity.display_name),
        Some("Ann".to_string())
    );

    runtime.block_on(stack.coordinator.logout());
    assert!(store.load_current().expect("load").is_none());
}

#[test]
fn failed_sign_out_does_not_resume_on_restart() {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = SessionStore::new(temp_dir.path().to_path_buf());

    {
        let runtime = test_runtime();
        let (stack, mut events) = local_stack(&runtime, Some(store.clone()));
        let task = runtime
            .block_on(
                stack
                    .coordinator
                    .register(&Registration::new("Ann", "ann@example.com", "secret1")),
            )
            .expect("register")
            .expect("connect issued");
        runtime.block_on(task.finished());

        stack.identity.fail_sign_out(true);
        runtime.block_on(stack.coordinator.logout());
        assert_eq!(failure_kinds(&mut events), vec![FailureKind::SignOutFailure]);
    }

    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, Some(store));
    assert!(stack.coordinator.on_app_start().is_none());
    assert_eq!(stack.coordinator.navigation_target(), NavigationTarget::Login);
    assert_eq!(stack.chat.connect_calls(), 0);
}

#[test]
fn direct_channel_and_search_flow() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    let bo = stack
        .identity
        .seed_account("bo@example.com", "secret1", Some("Bo"))
        .expect("seed");
    let task = runtime
        .block_on(
            stack
                .coordinator
                .register(&Registration::new("Ann", "ann@example.com", "secret1")),
        )
        .expect("register")
        .expect("connect issued");
    runtime.block_on(task.finished());

    assert!(runtime
        .block_on(stack.coordinator.search_users("  "))
        .expect("blank search")
        .is_empty());
    let found = runtime
        .block_on(stack.coordinator.search_users("B"))
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user_id, bo.user_id);

    let first = runtime
        .block_on(stack.coordinator.open_direct_channel(&bo.user_id))
        .expect("channel");
    let again = runtime
        .block_on(stack.coordinator.open_direct_channel(&bo.user_id))
        .expect("channel");
    assert_eq!(first.cid, again.cid);
    assert_eq!(
        runtime
            .block_on(stack.coordinator.channels())
            .expect("channels")
            .len(),
        1
    );

    let me = stack.coordinator.snapshot().identity.expect("identity").user_id;
    assert!(runtime
        .block_on(stack.coordinator.open_direct_channel(&me))
        .is_err());
}

#[test]
fn backend_state_stream_tracks_lifecycle() {
    let runtime = test_runtime();
    let (stack, _events) = local_stack(&runtime, None);
    let mut states = stack.chat.observe_connection_state();
    assert_eq!(
        runtime.block_on(states.next()),
        Some(ConnectionState::NotInitialized)
    );

    let task = stack
        .coordinator
        .on_auth_success(Identity::new("u1", "Ann"))
        .expect("connect issued");
    runtime.block_on(task.finished());
    let mut seen = Vec::new();
    while let Some(Some(state)) = states.next().now_or_never() {
        seen.push(state);
    }
    assert_eq!(seen.last(), Some(&ConnectionState::Complete));
}
