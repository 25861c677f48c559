//! Role evaluation and gate behaviour against a store that can fail.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use housing_core::api::{build_router, AppState};
use housing_core::auth::{AuthError, CredentialHasher, TokenService};
use housing_core::config::PasswordConfig;
use housing_core::error::ErrorCode;
use housing_core::rbac::{AccessDecision, AccessEvaluator, AccessRequirement, AuthorizationGate, DenyReason};
use housing_core::store::{
    Collection, Document, IdentityStore, InMemoryStore, StoreError, StoreResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "access-test-secret-0123456789abcdef";

// ============================================================================
// Fixtures
// ============================================================================

/// Wraps an in-memory store; reads fail while `failing` is set.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    failing: AtomicBool,
    reads: AtomicUsize,
}

impl FlakyStore {
    fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityStore for FlakyStore {
    async fn find_identity_by_username(
        &self,
        collection: Collection,
        username: &str,
    ) -> StoreResult<Option<Document>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.find_identity_by_username(collection, username).await
    }

    async fn insert_identity(&self, collection: Collection, record: Document) -> StoreResult<()> {
        self.inner.insert_identity(collection, record).await
    }

    async fn update_identity_fields(
        &self,
        collection: Collection,
        username: &str,
        fields: Document,
    ) -> StoreResult<Option<Document>> {
        self.check()?;
        self.inner
            .update_identity_fields(collection, username, fields)
            .await
    }

    async fn list_identities(
        &self,
        collection: Collection,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        self.check()?;
        self.inner.list_identities(collection, limit).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

async fn seeded_store() -> Arc<FlakyStore> {
    let store = Arc::new(FlakyStore::default());
    let records = [
        (Collection::Students, json!({"username": "alice"})),
        (Collection::Students, json!({"username": "gina", "is_house_guardian": true})),
        (Collection::Students, json!({"username": "hank", "is_house_guardian": "yes"})),
        (Collection::Admins, json!({"username": "rita", "read_only": true})),
        (Collection::Admins, json!({"username": "walt", "read_only": false})),
        (Collection::Admins, json!({"username": "otto"})),
        (Collection::Admins, json!({"username": "nina", "read_only": 0})),
    ];
    for (collection, record) in records {
        store.insert_identity(collection, doc(record)).await.unwrap();
    }
    store
}

fn gate_over(store: Arc<FlakyStore>) -> (AuthorizationGate, Arc<TokenService>) {
    let tokens = Arc::new(TokenService::new(SECRET).unwrap());
    let gate = AuthorizationGate::new(tokens.clone(), AccessEvaluator::new(store));
    (gate, tokens)
}

fn bearer(tokens: &TokenService, username: &str) -> String {
    format!("Bearer {}", tokens.issue(username).unwrap())
}

// ============================================================================
// Evaluator
// ============================================================================

#[tokio::test]
async fn test_role_predicates() {
    let evaluator = AccessEvaluator::new(seeded_store().await);

    assert!(evaluator.is_student("alice").await.unwrap());
    assert!(!evaluator.is_student("rita").await.unwrap());
    assert!(!evaluator.is_student_house_guardian("alice").await.unwrap());
    assert!(evaluator.is_student_house_guardian("gina").await.unwrap());

    assert!(evaluator.is_admin("rita").await.unwrap());
    assert!(!evaluator.is_admin_write("rita").await.unwrap());
    assert!(evaluator.is_admin_write("walt").await.unwrap());

    assert!(evaluator.at_least_house_guardian_write("gina").await.unwrap());
    assert!(evaluator.at_least_house_guardian_write("walt").await.unwrap());
    assert!(!evaluator.at_least_house_guardian_write("alice").await.unwrap());
    assert!(!evaluator.at_least_house_guardian_write("rita").await.unwrap());
}

#[tokio::test]
async fn test_non_boolean_flags_do_not_grant() {
    let evaluator = AccessEvaluator::new(seeded_store().await);

    assert!(!evaluator.is_student_house_guardian("hank").await.unwrap());
    assert!(!evaluator.is_admin_write("otto").await.unwrap());
    assert!(!evaluator.is_admin_write("nina").await.unwrap());
    assert!(evaluator.is_admin("otto").await.unwrap());
}

#[tokio::test]
async fn test_unknown_user_has_no_roles() {
    let evaluator = AccessEvaluator::new(seeded_store().await);
    let flags = evaluator.role_flags("nobody").await.unwrap();

    assert!(!flags.is_student);
    assert!(!flags.is_student_house_guardian);
    assert!(!flags.is_admin);
    assert!(!flags.is_admin_write);
}

#[tokio::test]
async fn test_role_change_visible_on_next_check() {
    let store = seeded_store().await;
    let evaluator = AccessEvaluator::new(store.clone());
    assert!(!evaluator.is_student_house_guardian("alice").await.unwrap());

    store
        .update_identity_fields(
            Collection::Students,
            "alice",
            doc(json!({"is_house_guardian": true})),
        )
        .await
        .unwrap();
    assert!(evaluator.is_student_house_guardian("alice").await.unwrap());
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let store = seeded_store().await;
    let evaluator = AccessEvaluator::new(store.clone());
    store.fail();

    assert!(matches!(
        evaluator.is_admin("walt").await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(evaluator.is_student("alice").await.is_err());
    assert!(evaluator.role_flags("walt").await.is_err());
}

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn test_authenticate() {
    let (gate, tokens) = gate_over(seeded_store().await);

    let caller = gate.authenticate(Some(&bearer(&tokens, "alice"))).unwrap();
    assert_eq!(caller.username, "alice");

    assert_eq!(
        gate.authenticate(None).unwrap_err(),
        AuthError::MissingCredentials
    );
    assert_eq!(
        gate.authenticate(Some("Basic abc")).unwrap_err(),
        AuthError::MissingCredentials
    );
    assert_eq!(
        gate.authenticate(Some("Bearer garbage")).unwrap_err(),
        AuthError::TokenInvalid
    );
}

#[tokio::test]
async fn test_owner_short_circuits_store() {
    let store = seeded_store().await;
    let (gate, tokens) = gate_over(store.clone());
    let alice = gate.authenticate(Some(&bearer(&tokens, "alice"))).unwrap();

    store.fail();
    let before = store.reads();
    let decision = gate
        .authorize(&alice, &AccessRequirement::self_or_admin_write("alice"))
        .await
        .unwrap();

    assert_eq!(decision, AccessDecision::Allow);
    assert_eq!(store.reads(), before);
}

#[tokio::test]
async fn test_decisions() {
    let (gate, tokens) = gate_over(seeded_store().await);
    let caller = |name: &str| gate.authenticate(Some(&bearer(&tokens, name))).unwrap();

    let cases = [
        ("rita", AccessRequirement::self_or_admin_read("alice"), true),
        ("rita", AccessRequirement::self_or_admin_write("alice"), false),
        ("walt", AccessRequirement::self_or_admin_write("alice"), true),
        ("gina", AccessRequirement::self_or_admin_read("alice"), false),
        ("gina", AccessRequirement::HouseGuardianWrite, true),
        ("alice", AccessRequirement::HouseGuardianWrite, false),
        ("alice", AccessRequirement::AdminRead, false),
        ("rita", AccessRequirement::AdminRead, true),
        ("rita", AccessRequirement::AdminWrite, false),
        ("walt", AccessRequirement::AdminWrite, true),
        ("nobody", AccessRequirement::Authenticated, true),
    ];

    for (name, requirement, expected) in cases {
        let decision = gate.authorize(&caller(name), &requirement).await.unwrap();
        assert_eq!(
            decision.is_allowed(),
            expected,
            "{} against {}",
            name,
            requirement
        );
    }

    let decision = gate
        .authorize(&caller("rita"), &AccessRequirement::AdminWrite)
        .await
        .unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::NotAdminWrite));
}

#[tokio::test]
async fn test_gate_fails_closed_on_store_error() {
    let store = seeded_store().await;
    let (gate, tokens) = gate_over(store.clone());
    let walt = gate.authenticate(Some(&bearer(&tokens, "walt"))).unwrap();
    store.fail();

    assert!(gate
        .authorize(&walt, &AccessRequirement::AdminWrite)
        .await
        .is_err());

    let err = gate
        .enforce(&walt, &AccessRequirement::AdminWrite)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::StoreUnavailable);

    let err = gate
        .admit(Some(&bearer(&tokens, "walt")), &AccessRequirement::AdminRead)
        .await
        .unwrap_err();
    assert_ne!(err.code(), ErrorCode::PermissionDenied);
    assert!(err.http_status().is_server_error());
}

#[tokio::test]
async fn test_admit_denial_is_permission_denied() {
    let (gate, tokens) = gate_over(seeded_store().await);
    let err = gate
        .admit(Some(&bearer(&tokens, "alice")), &AccessRequirement::AdminRead)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    assert_eq!(err.http_status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Router over a failing store
// ============================================================================

#[tokio::test]
async fn test_router_reports_store_outage() {
    let store = seeded_store().await;
    let tokens = Arc::new(TokenService::new(SECRET).unwrap());
    let hasher = Arc::new(
        CredentialHasher::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap(),
    );
    let router = build_router(AppState::new(store.clone(), hasher, tokens.clone()));
    store.fail();

    let response = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = router
        .oneshot(
            Request::get("/api/students")
                .header(header::AUTHORIZATION, bearer(&tokens, "walt"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    assert!(!body.to_string().contains("connection refused"));
}
