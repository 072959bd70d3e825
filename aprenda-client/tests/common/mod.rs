//! Shared helpers for client integration tests

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use aprenda_client::gateway::{AuthApi, Datastore, FileStore};
use aprenda_client::{mutations, AppState, AuthSnapshot, InMemoryGateway};
use aprenda_core::UserId;

pub const TEST_PASSWORD: &str = "senha-segura";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub gateway: Arc<InMemoryGateway>,
}

/// Wire an app state around a fresh in-memory gateway
pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let gateway = Arc::new(InMemoryGateway::new());
    let state = AppState::new(
        gateway.clone() as Arc<dyn Datastore>,
        gateway.clone() as Arc<dyn AuthApi>,
        gateway.clone() as Arc<dyn FileStore>,
    )
    .await;

    TestApp { state, gateway }
}

/// Register an account without signing in; returns nothing, the profile
/// row is created by the gateway's registration trigger
pub async fn register_user(app: &TestApp, email: &str, name: &str) {
    mutations::auth::sign_up(&app.state, email, TEST_PASSWORD, name, Some("123.456.789-00"))
        .await
        .expect("sign up");
}

/// Register and sign in a user, waiting for the session context to settle
pub async fn sign_in_user(app: &TestApp, email: &str, name: &str) -> UserId {
    register_user(app, email, name).await;
    let session = mutations::auth::sign_in(&app.state, email, TEST_PASSWORD)
        .await
        .expect("sign in");

    let expected = session.user.id;
    wait_for_auth(app, move |snapshot: &AuthSnapshot| {
        snapshot.user_id() == Some(expected)
    })
    .await;
    expected
}

/// Block until the auth snapshot satisfies the predicate
pub async fn wait_for_auth(app: &TestApp, predicate: impl FnMut(&AuthSnapshot) -> bool) {
    let mut rx = app.state.auth.subscribe();
    timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for auth state")
        .expect("auth state channel closed");
}
