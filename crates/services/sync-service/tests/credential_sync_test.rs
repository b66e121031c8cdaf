//! Orchestrator tests against in-memory backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::Sequence;

use common::{CredentialBackend, MockCredentialBackend, SyncError, SyncResult};
use domain::{
    ChangeRequest, OutcomeStatus, PasswordPolicy, PasswordState, Requester, SagaState, Secret,
    SystemKind,
};
use sync_service_lib::{CredentialSync, SyncService};

// =============================================================================
// Test Helpers
// =============================================================================

const OLD: &str = "OldPassword1";
const NEW: &str = "NewPassword1";

/// Backend holding one account's password in memory.
struct FakeBackend {
    system: SystemKind,
    password: Mutex<String>,
    /// Results handed out to successive set_password calls; Ok once empty
    script: Mutex<VecDeque<SyncResult<()>>>,
    delay: Duration,
    set_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    fn new(system: SystemKind) -> Self {
        Self {
            system,
            password: Mutex::new(OLD.to_string()),
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            set_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue the result of the next set_password call.
    fn then(self, result: SyncResult<()>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    fn password(&self) -> String {
        self.password.lock().unwrap().clone()
    }

    fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialBackend for FakeBackend {
    fn system(&self) -> SystemKind {
        self.system
    }

    async fn test_connection(&self) -> SyncResult<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_password(&self, _username: &str, new_password: &Secret) -> SyncResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            *self.password.lock().unwrap() = new_password.expose().to_string();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn sync_over(backends: &[&Arc<FakeBackend>]) -> CredentialSync {
    sync_with_timeout(backends, Duration::from_secs(5))
}

fn sync_with_timeout(backends: &[&Arc<FakeBackend>], lock_timeout: Duration) -> CredentialSync {
    let backends = backends
        .iter()
        .map(|b| Arc::clone(*b) as Arc<dyn CredentialBackend>)
        .collect();
    CredentialSync::new(backends, PasswordPolicy::default(), lock_timeout).unwrap()
}

fn pair() -> (Arc<FakeBackend>, Arc<FakeBackend>) {
    (
        Arc::new(FakeBackend::new(SystemKind::Dsm)),
        Arc::new(FakeBackend::new(SystemKind::Directory)),
    )
}

fn self_service(target: &str, password: &str) -> ChangeRequest {
    ChangeRequest::new(Requester::user(target), target, Secret::new(password))
}

fn statuses(result: &domain::ChangeResult) -> Vec<(SystemKind, OutcomeStatus)> {
    result.outcomes.iter().map(|o| (o.system, o.status)).collect()
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_short_password_contacts_no_backend() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let result = sync.change_password(self_service("alice", "short1")).await;

    assert!(matches!(result, Err(SyncError::Validation(_))));
    assert_eq!(dsm.set_calls(), 0);
    assert_eq!(dir.set_calls(), 0);
}

#[tokio::test]
async fn test_unauthorized_requester_contacts_no_backend() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = ChangeRequest::new(Requester::user("mallory"), "alice", Secret::new(NEW));
    let result = sync.change_password(request).await;

    assert!(matches!(result, Err(SyncError::Permission(_))));
    assert_eq!(dsm.set_calls(), 0);
    assert_eq!(dir.set_calls(), 0);
}

#[tokio::test]
async fn test_authorization_checked_before_policy() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = ChangeRequest::new(Requester::user("mallory"), "alice", Secret::new("x"));
    assert!(matches!(
        sync.change_password(request).await,
        Err(SyncError::Permission(_))
    ));
}

#[tokio::test]
async fn test_confirmation_mismatch_is_rejected() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_confirmation(Secret::new("NewPassword2"));
    let result = sync.change_password(request).await;

    assert!(matches!(result, Err(SyncError::Validation(_))));
    assert_eq!(dsm.set_calls(), 0);
}

#[tokio::test]
async fn test_no_systems_selected_is_rejected() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_systems(Vec::new());
    assert!(matches!(
        sync.change_password(request).await,
        Err(SyncError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unregistered_system_is_rejected() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let sync = sync_over(&[&dsm]);

    let result = sync.change_password(self_service("alice", NEW)).await;

    assert!(matches!(result, Err(SyncError::Validation(_))));
    assert_eq!(dsm.set_calls(), 0);
}

#[test]
fn test_duplicate_backends_rejected() {
    let a = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let b = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let backends: Vec<Arc<dyn CredentialBackend>> =
        vec![a as Arc<dyn CredentialBackend>, b as Arc<dyn CredentialBackend>];

    let result = CredentialSync::new(backends, PasswordPolicy::default(), Duration::from_secs(1));
    assert!(matches!(result, Err(SyncError::Validation(_))));
}

// =============================================================================
// Forward changes
// =============================================================================

#[tokio::test]
async fn test_change_lands_on_every_backend() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let result = sync
        .change_password(self_service("alice", NEW).with_confirmation(Secret::new(NEW)))
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(result.final_state, SagaState::Committed);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::Succeeded),
            (SystemKind::Directory, OutcomeStatus::Succeeded),
        ]
    );
    assert_eq!(dsm.password(), NEW);
    assert_eq!(dir.password(), NEW);
}

#[tokio::test]
async fn test_admin_may_change_other_user() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = ChangeRequest::new(Requester::admin("root"), "alice", Secret::new(NEW));
    let result = tokio_test::assert_ok!(sync.change_password(request).await);

    assert!(result.overall_success);
}

#[tokio::test]
async fn test_single_system_request_skips_the_other() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_systems([SystemKind::Dsm]);
    let result = sync.change_password(request).await.unwrap();

    assert!(result.overall_success);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::Succeeded),
            (SystemKind::Directory, OutcomeStatus::Skipped),
        ]
    );
    assert_eq!(dir.set_calls(), 0);
    assert_eq!(dir.password(), OLD);
}

#[tokio::test]
async fn test_unconfigured_system_still_reported_as_skipped() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let sync = sync_over(&[&dsm]);

    let request = self_service("alice", NEW).with_systems([SystemKind::Dsm]);
    let result = sync.change_password(request).await.unwrap();

    assert!(result.overall_success);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::Succeeded),
            (SystemKind::Directory, OutcomeStatus::Skipped),
        ]
    );
    assert!(result.outcome_for(SystemKind::Directory).is_some());
}

#[tokio::test]
async fn test_unconfigured_system_follows_configured_failure() {
    let dir = Arc::new(
        FakeBackend::new(SystemKind::Directory).then(Err(SyncError::connection("refused"))),
    );
    let sync = sync_over(&[&dir]);

    let request = self_service("alice", NEW).with_systems([SystemKind::Directory]);
    let result = sync.change_password(request).await.unwrap();

    assert!(!result.overall_success);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Directory, OutcomeStatus::Failed),
            (SystemKind::Dsm, OutcomeStatus::Skipped),
        ]
    );
}

#[tokio::test]
async fn test_outcomes_follow_registration_order() {
    let (dsm, dir) = pair();
    let sync = sync_over(&[&dir, &dsm]);

    let result = sync.change_password(self_service("alice", NEW)).await.unwrap();

    let order: Vec<SystemKind> = result.outcomes.iter().map(|o| o.system).collect();
    assert_eq!(order, vec![SystemKind::Directory, SystemKind::Dsm]);
}

// =============================================================================
// Compensation
// =============================================================================

#[tokio::test]
async fn test_secondary_failure_rolls_back_primary() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let dir = Arc::new(
        FakeBackend::new(SystemKind::Directory).then(Err(SyncError::connection("refused"))),
    );
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_previous_password(Secret::new(OLD));
    let result = sync.change_password(request).await.unwrap();

    assert!(!result.overall_success);
    assert_eq!(result.final_state, SagaState::RolledBack);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::RolledBack),
            (SystemKind::Directory, OutcomeStatus::Failed),
        ]
    );
    assert_eq!(
        result.outcome_for(SystemKind::Directory).unwrap().error_code.as_deref(),
        Some("CONNECTION_ERROR")
    );
    assert_eq!(dsm.password(), OLD);
    assert_eq!(dsm.set_calls(), 2);
    assert!(!result.requires_reconciliation());
}

#[tokio::test]
async fn test_secondary_failure_without_previous_needs_reconciliation() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm));
    let dir = Arc::new(
        FakeBackend::new(SystemKind::Directory).then(Err(SyncError::not_found("alice"))),
    );
    let sync = sync_over(&[&dsm, &dir]);

    let result = sync.change_password(self_service("alice", NEW)).await.unwrap();

    assert_eq!(result.final_state, SagaState::RollbackFailed);
    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::RollbackFailed),
            (SystemKind::Directory, OutcomeStatus::Failed),
        ]
    );
    assert!(result.requires_reconciliation());
    assert_eq!(result.most_severe().unwrap().system, SystemKind::Dsm);
    assert_eq!(
        result.outcome_for(SystemKind::Dsm).unwrap().password_state(),
        PasswordState::Unknown
    );
    assert_eq!(dsm.password(), NEW);
    assert_eq!(dsm.set_calls(), 1);
}

#[tokio::test]
async fn test_failed_compensation_is_rollback_failed() {
    let dsm = Arc::new(
        FakeBackend::new(SystemKind::Dsm)
            .then(Ok(()))
            .then(Err(SyncError::connection("timed out"))),
    );
    let dir = Arc::new(
        FakeBackend::new(SystemKind::Directory).then(Err(SyncError::permission("denied"))),
    );
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_previous_password(Secret::new(OLD));
    let result = sync.change_password(request).await.unwrap();

    assert_eq!(result.final_state, SagaState::RollbackFailed);
    let dsm_outcome = result.outcome_for(SystemKind::Dsm).unwrap();
    assert_eq!(dsm_outcome.status, OutcomeStatus::RollbackFailed);
    assert_eq!(dsm_outcome.error_code.as_deref(), Some("ROLLBACK_FAILED"));
    assert!(result.summary().contains("reconciled manually"));
}

#[tokio::test]
async fn test_primary_failure_compensates_nothing() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm).then(Err(SyncError::auth("bad admin"))));
    let dir = Arc::new(FakeBackend::new(SystemKind::Directory));
    let sync = sync_over(&[&dsm, &dir]);

    let request = self_service("alice", NEW).with_previous_password(Secret::new(OLD));
    let result = sync.change_password(request).await.unwrap();

    assert_eq!(
        statuses(&result),
        vec![
            (SystemKind::Dsm, OutcomeStatus::Failed),
            (SystemKind::Directory, OutcomeStatus::Skipped),
        ]
    );
    assert_eq!(result.final_state, SagaState::RolledBack);
    assert_eq!(dsm.set_calls(), 1);
    assert_eq!(dir.set_calls(), 0);
    assert_eq!(dir.password(), OLD);
}

#[tokio::test]
async fn test_rollback_sends_previous_password() {
    let mut seq = Sequence::new();

    let mut dsm = MockCredentialBackend::new();
    dsm.expect_system().return_const(SystemKind::Dsm);
    dsm.expect_set_password()
        .withf(|user, pw| user == "alice" && pw.expose() == NEW)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let mut dir = MockCredentialBackend::new();
    dir.expect_system().return_const(SystemKind::Directory);
    dir.expect_set_password()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(SyncError::validation("constraint violation")));

    dsm.expect_set_password()
        .withf(|user, pw| user == "alice" && pw.expose() == OLD)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let backends: Vec<Arc<dyn CredentialBackend>> = vec![Arc::new(dsm), Arc::new(dir)];
    let sync = CredentialSync::new(backends, PasswordPolicy::default(), Duration::from_secs(1))
        .unwrap();

    let request = self_service("alice", NEW).with_previous_password(Secret::new(OLD));
    let result = sync.change_password(request).await.unwrap();

    assert_eq!(result.final_state, SagaState::RolledBack);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_same_target_requests_never_interleave() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm).with_delay(Duration::from_millis(50)));
    let dir =
        Arc::new(FakeBackend::new(SystemKind::Directory).with_delay(Duration::from_millis(50)));
    let sync = sync_over(&[&dsm, &dir]);

    let first = sync.change_password(self_service("alice", NEW));
    let second = sync.change_password(self_service("alice", "OtherPassword1"));
    let (first, second) = tokio::join!(first, second);

    assert!(first.unwrap().overall_success);
    assert!(second.unwrap().overall_success);
    assert_eq!(dsm.max_in_flight(), 1);
    assert_eq!(dir.max_in_flight(), 1);
    assert_eq!(dsm.password(), dir.password());
}

#[tokio::test]
async fn test_same_target_lock_wait_is_bounded() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm).with_delay(Duration::from_millis(300)));
    let dir = Arc::new(FakeBackend::new(SystemKind::Directory));
    let sync = sync_with_timeout(&[&dsm, &dir], Duration::from_millis(50));

    let first = sync.change_password(self_service("alice", NEW));
    let second = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sync.change_password(self_service("alice", "OtherPassword1")).await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.unwrap().overall_success);
    assert!(matches!(second, Err(SyncError::Concurrency(ref user)) if user == "alice"));
    assert_eq!(dsm.password(), NEW);
}

#[tokio::test]
async fn test_different_targets_run_in_parallel() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm).with_delay(Duration::from_millis(100)));
    let sync = sync_with_timeout(&[&dsm], Duration::from_millis(20));

    let alice = self_service("alice", NEW).with_systems([SystemKind::Dsm]);
    let bob = self_service("bob", NEW).with_systems([SystemKind::Dsm]);
    let (a, b) = tokio::join!(sync.change_password(alice), sync.change_password(bob));

    assert!(a.unwrap().overall_success);
    assert!(b.unwrap().overall_success);
    assert_eq!(dsm.max_in_flight(), 2);
}

#[tokio::test]
async fn test_dropped_caller_does_not_interrupt_change() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm).with_delay(Duration::from_millis(100)));
    let dir =
        Arc::new(FakeBackend::new(SystemKind::Directory).with_delay(Duration::from_millis(100)));
    let sync = sync_with_timeout(&[&dsm, &dir], Duration::from_secs(1));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        sync.change_password(self_service("alice", NEW)),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(dsm.password(), NEW);
    assert_eq!(dir.password(), NEW);

    // Lock was released by the detached task
    let next = sync
        .change_password(self_service("alice", "OtherPassword1"))
        .await
        .unwrap();
    assert!(next.overall_success);
}

// =============================================================================
// Connectivity
// =============================================================================

#[tokio::test]
async fn test_connectivity_reports_every_backend() {
    let dsm = Arc::new(FakeBackend::new(SystemKind::Dsm));

    let mut dir = MockCredentialBackend::new();
    dir.expect_system().return_const(SystemKind::Directory);
    dir.expect_test_connection()
        .times(2)
        .returning(|| Err(SyncError::connection("LDAP connect failed")));
    dir.expect_set_password().never();

    let backends: Vec<Arc<dyn CredentialBackend>> =
        vec![dsm.clone() as Arc<dyn CredentialBackend>, Arc::new(dir)];
    let sync = CredentialSync::new(backends, PasswordPolicy::default(), Duration::from_secs(1))
        .unwrap();

    let first = sync.connectivity().await;
    let second = sync.connectivity().await;

    assert!(!first.all_ok());
    assert!(first.status_for(SystemKind::Dsm).unwrap().ok);
    let directory = first.status_for(SystemKind::Directory).unwrap();
    assert!(!directory.ok);
    assert!(directory.message.contains("LDAP connect failed"));
    assert_eq!(first.systems, second.systems);
    assert_eq!(dsm.probe_calls.load(Ordering::SeqCst), 2);
    assert_eq!(dsm.set_calls(), 0);
}

#[tokio::test]
async fn test_mock_backend_receives_target_username() {
    let mut dsm = MockCredentialBackend::new();
    dsm.expect_system().return_const(SystemKind::Dsm);
    dsm.expect_set_password()
        .withf(|user, _| user == "alice")
        .times(1)
        .returning(|_, _| Ok(()));

    let backends: Vec<Arc<dyn CredentialBackend>> = vec![Arc::new(dsm)];
    let sync = CredentialSync::new(backends, PasswordPolicy::default(), Duration::from_secs(1))
        .unwrap();

    let request = self_service("alice", NEW).with_systems([SystemKind::Dsm]);
    assert!(sync.change_password(request).await.unwrap().overall_success);
}
