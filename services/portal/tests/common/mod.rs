#![allow(dead_code)]

use chrono::Utc;
use portal::app::{AppState, build_router};
use portal::auth::oidc::UpstreamOidcValidator;
use portal::auth::session::SessionKeys;
use portal::datasets::Datasets;
use portal::store::UserStore;
use portal::store::memory::InMemoryStore;
use prepdesk_identity::roster::RolePolicy;
use prepdesk_identity::{
    AccessTypes, MockAccess, ResultBook, ResultKind, Role, RoleNumber, StudentsDirectory, User,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const BOOTSTRAP_SECRET: &str = "bootstrap-secret";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// A mock book with an ungated test keyed by IBA numbers, a `duFbs`-gated
/// test, and a directory linking `legacy@example.com` to `123456`.
pub fn sample_datasets() -> Datasets {
    let mock: ResultBook = serde_json::from_value(json!({
        "tests": {
            "Mock 1": {
                "classStats": {"average": 41.5},
                "results": {
                    "123456": {"totalMarks": 55.5, "rank": 3},
                    "654321": {"totalMarks": 40.0, "rank": 9}
                }
            },
            "DU FBS Mock": {
                "variant": "duFbs",
                "results": {
                    "1234567": {"totalMarks": 61.0}
                }
            }
        }
    }))
    .expect("mock book");
    let directory = StudentsDirectory::from_json_str(
        &json!({
            "students": {
                "123456": {"id": "123456", "name": "Legacy", "email": "legacy@example.com"}
            }
        })
        .to_string(),
    )
    .expect("directory");
    Datasets::from_parts(directory, [(ResultKind::Mock, mock)])
}

pub struct TestPortal {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestPortal {
    pub fn new() -> Self {
        Self::with_bootstrap(Some(BOOTSTRAP_SECRET.to_string()))
    }

    pub fn with_bootstrap(secret: Option<String>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState {
            environment: "test".to_string(),
            store: store.clone(),
            datasets: Arc::new(sample_datasets()),
            oidc_validator: UpstreamOidcValidator::default(),
            oidc_issuer: None,
            session_keys: Arc::new(
                SessionKeys::from_seed([9u8; 32], Duration::from_secs(600)).expect("keys"),
            ),
            bootstrap_secret: secret,
            role_policy: RolePolicy::default(),
        };
        Self { store, state }
    }

    pub fn app(&self) -> axum::routing::RouterIntoService<axum::body::Body, ()> {
        build_router(self.state.clone()).into_service()
    }

    pub fn session(&self, email: &str) -> String {
        let (token, _) = self
            .state
            .session_keys
            .mint(email, "Test", Role::Student)
            .expect("mint");
        token
    }

    pub async fn add_student(&self, email: &str, numbers: &[&str], access: AccessTypes) -> User {
        let mut user = User::new(email, "Student", Role::Student, Utc::now());
        user.role_numbers = numbers
            .iter()
            .map(|number| RoleNumber::parse(number).expect("role number"))
            .collect();
        user.access_types = access;
        user.mock_access = MockAccess::default();
        self.store.create_user(user).await.expect("create student")
    }

    pub async fn add_admin(&self, email: &str, role: Role) -> User {
        let mut user = User::new(email, "Admin", role, Utc::now());
        user.access_types = AccessTypes::all();
        user.mock_access = MockAccess::all();
        self.store.create_user(user).await.expect("create admin")
    }
}

pub fn iba_only() -> AccessTypes {
    AccessTypes {
        iba: true,
        fbs: false,
    }
}
