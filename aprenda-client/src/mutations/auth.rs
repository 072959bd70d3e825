//! Account actions: registration, sign-in/out, password recovery

use serde_json::json;

use aprenda_core::{QueryKey, Session};

use crate::error::{ClientError, Result};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

/// Register a new account with profile metadata; the user signs in
/// separately once the account is confirmed
pub async fn sign_up(
    state: &AppState,
    email: &str,
    password: &str,
    full_name: &str,
    cpf: Option<&str>,
) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClientError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if full_name.trim().is_empty() {
        return Err(ClientError::Validation("full name is required".into()));
    }

    let metadata = json!({
        "full_name": full_name,
        "cpf": cpf,
    });
    state.auth_api.sign_up(email, password, metadata).await?;
    Ok(())
}

/// Sign in; the resulting auth event also flows into the session context
pub async fn sign_in(state: &AppState, email: &str, password: &str) -> Result<Session> {
    let session = state.auth_api.sign_in(email, password).await?;
    Ok(session)
}

/// Sign out and drop every user-scoped read from the cache
pub async fn sign_out(state: &AppState) -> Result<()> {
    state.auth_api.sign_out().await?;

    for root in [
        "profile",
        "enrolledCourses",
        "userNotifications",
        "userBadges",
        "userCertificates",
        "courseDetails",
    ] {
        state.cache.invalidate(&QueryKey::root(root));
    }
    Ok(())
}

/// Ask the gateway to email a password reset link
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<()> {
    state.auth_api.request_password_reset(email).await?;
    Ok(())
}
