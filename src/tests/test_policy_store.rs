// src/tests/test_policy_store.rs

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::RegistryError;
use crate::path_normalizer::{normalize_path, PathNormalizer};
use crate::policy::{PolicyRule, PolicyStore, PushStatus, SyncState};

fn read_only() -> PolicyRule {
    PolicyRule {
        can_read: true,
        ..PolicyRule::default()
    }
}

fn store() -> Arc<PolicyStore> {
    PolicyStore::new(PathNormalizer::default())
}

#[test]
fn test_set_rule_normalizes_path() {
    let store = store();
    let path = store.set_rule("agentA", "C:\\Data\\Reports\\", read_only()).unwrap();
    assert_eq!(path.as_str(), "c:/data/reports");

    let policies = store.get_policies("agentA");
    assert_eq!(policies.len(), 1);
    assert_eq!(policies.get(&normalize_path("c:/data/reports")), Some(&read_only()));
}

#[test]
fn test_set_rule_overwrites_equivalent_path() {
    let store = store();
    store.set_rule("agentA", "C:\\Data", read_only()).unwrap();
    store.set_rule("agentA", "c:/data/", PolicyRule::allow_all()).unwrap();

    let policies = store.get_policies("agentA");
    assert_eq!(policies.len(), 1);
    assert_eq!(policies.values().next(), Some(&PolicyRule::allow_all()));
}

#[test]
fn test_empty_agent_id_rejected() {
    let store = store();
    let err = store.set_rule("", "/shared", read_only()).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    let err = store.set_rule("   ", "/shared", read_only()).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
    assert!(store.list_agents().is_empty());
}

#[test]
fn test_null_byte_path_rejected() {
    let store = store();
    let err = store.set_rule("agentA", "/sha\0red", read_only()).unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));
}

#[test]
fn test_unknown_agent_has_empty_policies() {
    let store = store();
    assert!(store.get_policies("nonexistent").is_empty());
    assert!(store.snapshot("nonexistent").is_empty());
    assert_eq!(store.sync_state("nonexistent"), None);
    assert!(!store.needs_reconciliation("nonexistent"));
}

#[test]
fn test_snapshot_isolated_from_later_mutation() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();

    let before = store.get_policies("agentA");
    store.set_rule("agentA", "/shared", PolicyRule::allow_all()).unwrap();
    store.set_rule("agentA", "/private", PolicyRule::deny_all()).unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(before.get(&normalize_path("/shared")), Some(&read_only()));

    let after = store.get_policies("agentA");
    assert_eq!(after.len(), 2);
    assert_eq!(after.get(&normalize_path("/shared")), Some(&PolicyRule::allow_all()));
}

#[test]
fn test_list_agents() {
    let store = store();
    store.set_rule("agentB", "/b", read_only()).unwrap();
    store.set_rule("agentA", "/a", read_only()).unwrap();
    store.set_rule("agentA", "/a2", read_only()).unwrap();

    let agents: Vec<String> = store.list_agents().into_iter().collect();
    assert_eq!(agents, vec!["agentA".to_string(), "agentB".to_string()]);
}

#[test]
fn test_set_rule_marks_pending_and_success_clears_it() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    assert_eq!(store.sync_state("agentA"), Some(SyncState::Pending));
    assert!(store.needs_reconciliation("agentA"));

    let snapshot = store.snapshot("agentA");
    store.record_push(&snapshot, PushStatus::Success).unwrap();
    assert_eq!(store.sync_state("agentA"), Some(SyncState::Synced));
    assert!(!store.needs_reconciliation("agentA"));

    store.set_rule("agentA", "/other", read_only()).unwrap();
    assert_eq!(store.sync_state("agentA"), Some(SyncState::Pending));
}

#[test]
fn test_stale_success_does_not_clear_pending() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    let stale = store.snapshot("agentA");

    store.set_rule("agentA", "/shared/finance", PolicyRule::allow_all()).unwrap();
    store.record_push(&stale, PushStatus::Success).unwrap();

    assert_eq!(store.sync_state("agentA"), Some(SyncState::Pending));
    assert!(store.needs_reconciliation("agentA"));
}

#[test]
fn test_rejected_generation_not_reconciled_until_next_change() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    let snapshot = store.snapshot("agentA");
    store.record_push(&snapshot, PushStatus::AgentRejected).unwrap();

    assert_eq!(store.sync_state("agentA"), Some(SyncState::Pending));
    assert!(!store.needs_reconciliation("agentA"));

    store.set_rule("agentA", "/shared", PolicyRule::allow_all()).unwrap();
    assert!(store.needs_reconciliation("agentA"));
}

#[test]
fn test_unreachable_is_always_reconciled() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    let snapshot = store.snapshot("agentA");
    store.record_push(&snapshot, PushStatus::AgentUnreachable).unwrap();

    assert!(store.needs_reconciliation("agentA"));
    let status = store.sync_status("agentA").unwrap();
    assert_eq!(status.last_push.unwrap().status, PushStatus::AgentUnreachable);
}

#[test]
fn test_push_outcomes_are_timestamped_in_millis() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;

    store.record_push(&store.snapshot("agentA"), PushStatus::AgentUnreachable).unwrap();
    let first = store.sync_status("agentA").unwrap().last_push.unwrap().at_ms;
    thread::sleep(Duration::from_millis(5));
    store.record_push(&store.snapshot("agentA"), PushStatus::Success).unwrap();
    let second = store.sync_status("agentA").unwrap().last_push.unwrap().at_ms;

    assert!(first >= before);
    assert!(second > first);
}

#[test]
fn test_older_outcome_does_not_overwrite_newer() {
    let store = store();
    store.set_rule("agentA", "/a", read_only()).unwrap();
    let old = store.snapshot("agentA");
    store.set_rule("agentA", "/b", read_only()).unwrap();
    let new = store.snapshot("agentA");

    store.record_push(&new, PushStatus::Success).unwrap();
    store.record_push(&old, PushStatus::AgentUnreachable).unwrap();

    let status = store.sync_status("agentA").unwrap();
    assert_eq!(status.state, SyncState::Synced);
    assert_eq!(status.last_push.unwrap().generation, new.generation());
    assert_eq!(status.last_push.unwrap().status, PushStatus::Success);
}

#[test]
fn test_acknowledging_future_generation_is_a_violation() {
    let store = store();
    store.set_rule("agentA", "/a", read_only()).unwrap();
    let snapshot = store.snapshot("agentA");

    let other = PolicyStore::new(PathNormalizer::default());
    other.set_rule("agentA", "/a", read_only()).unwrap();
    other.set_rule("agentA", "/b", read_only()).unwrap();
    let ahead = other.snapshot("agentA");
    assert!(ahead.generation() > snapshot.generation());

    let err = store.record_push(&ahead, PushStatus::Success).unwrap_err();
    assert!(matches!(err, RegistryError::StoreConcurrencyViolation(_)));
}

#[test]
fn test_clear_rule() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    let snapshot = store.snapshot("agentA");
    store.record_push(&snapshot, PushStatus::Success).unwrap();

    assert!(!store.clear_rule("agentA", "/missing").unwrap());
    assert_eq!(store.sync_state("agentA"), Some(SyncState::Synced));

    assert!(store.clear_rule("agentA", "\\SHARED\\").unwrap());
    assert!(store.get_policies("agentA").is_empty());
    assert_eq!(store.sync_state("agentA"), Some(SyncState::Pending));

    assert!(!store.clear_rule("unknown", "/shared").unwrap());
}

#[test]
fn test_remove_agent_forgotten_after_ack() {
    let store = store();
    store.register_agent("agentA", "http://10.0.0.5:8080").unwrap();
    store.set_rule("agentA", "/shared", read_only()).unwrap();

    assert!(store.remove_agent("agentA").unwrap());
    assert!(store.get_policies("agentA").is_empty());
    assert!(store.list_agents().contains("agentA"));
    assert!(store.sync_status("agentA").unwrap().retiring);

    let snapshot = store.snapshot("agentA");
    store.record_push(&snapshot, PushStatus::Success).unwrap();
    assert!(!store.list_agents().contains("agentA"));
    assert!(store.agent_url("agentA").is_none());

    assert!(!store.remove_agent("agentA").unwrap());
}

#[test]
fn test_remove_agent_without_url_forgotten_at_once() {
    let store = store();
    store.set_rule("agentA", "/shared", read_only()).unwrap();

    assert!(store.remove_agent("agentA").unwrap());
    assert!(!store.list_agents().contains("agentA"));
    assert!(store.sync_status("agentA").is_none());
    assert!(!store.needs_reconciliation("agentA"));

    // A new rule starts a fresh agent
    store.set_rule("agentA", "/new", read_only()).unwrap();
    assert!(!store.sync_status("agentA").unwrap().retiring);
    assert_eq!(store.get_policies("agentA").len(), 1);
}

#[test]
fn test_set_rule_revives_retiring_agent() {
    let store = store();
    store.register_agent("agentA", "http://10.0.0.5:8080").unwrap();
    store.set_rule("agentA", "/shared", read_only()).unwrap();
    store.remove_agent("agentA").unwrap();
    let revocation = store.snapshot("agentA");

    store.set_rule("agentA", "/new", read_only()).unwrap();
    store.record_push(&revocation, PushStatus::Success).unwrap();

    assert!(store.list_agents().contains("agentA"));
    assert!(!store.sync_status("agentA").unwrap().retiring);
    assert_eq!(store.get_policies("agentA").len(), 1);
}

#[test]
fn test_register_agent_url() {
    let store = store();
    store.register_agent("agentA", "http://10.0.0.5:8080/").unwrap();
    assert_eq!(store.agent_url("agentA").as_deref(), Some("http://10.0.0.5:8080"));
    assert!(store.get_policies("agentA").is_empty());

    for bad in ["", "10.0.0.5:8080", "ftp://host", "http://"] {
        let err = store.register_agent("agentA", bad).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)), "{:?} accepted", bad);
    }
}

#[test]
fn test_concurrent_set_rule_no_lost_updates() {
    let store = store();
    let mut handles = Vec::new();

    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let agent = format!("agent{}", t % 2);
                store
                    .set_rule(&agent, &format!("/data/t{}/f{}", t, i), PolicyRule::read_only())
                    .unwrap();
                let _ = store.get_policies(&agent);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.get_policies("agent0").len(), 400);
    assert_eq!(store.get_policies("agent1").len(), 400);
    assert_eq!(store.sync_status("agent0").unwrap().generation, 400);
}
