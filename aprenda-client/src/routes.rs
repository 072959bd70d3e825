//! Route-access policy
//!
//! The route surface and its gating, expressed as a pure decision over
//! the current auth snapshot. Nothing is decided while auth is still
//! loading, so gated views never flash for the wrong audience.

use crate::auth::AuthSnapshot;

/// Every navigable page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    PasswordRecovery,
    Courses,
    CourseDetail,
    About,
    Team,
    Feedback,
    Leaderboard,
    CertificateViewer,
    Dashboard,
    Profile,
    Notifications,
    AdminDashboard,
    AdminCourses,
    AdminCourseContent,
    AdminUsers,
    AdminFeedback,
    AdminSendNotification,
}

/// Who may open a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// What the router should do with a navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Auth state still loading; render a placeholder, decide later
    Wait,
    RedirectToLogin,
    RedirectHome,
}

impl Route {
    pub fn access(self) -> Access {
        match self {
            Route::Home
            | Route::Login
            | Route::Register
            | Route::PasswordRecovery
            | Route::Courses
            | Route::CourseDetail
            | Route::About
            | Route::Team
            | Route::Feedback
            | Route::Leaderboard
            | Route::CertificateViewer => Access::Public,
            Route::Dashboard | Route::Profile | Route::Notifications => Access::Authenticated,
            Route::AdminDashboard
            | Route::AdminCourses
            | Route::AdminCourseContent
            | Route::AdminUsers
            | Route::AdminFeedback
            | Route::AdminSendNotification => Access::Admin,
        }
    }
}

/// Decide a navigation attempt against the current auth state
pub fn decide(route: Route, auth: &AuthSnapshot) -> RouteDecision {
    match route.access() {
        Access::Public => RouteDecision::Allow,
        Access::Authenticated => {
            if auth.is_loading() {
                RouteDecision::Wait
            } else if auth.session.is_some() {
                RouteDecision::Allow
            } else {
                RouteDecision::RedirectToLogin
            }
        }
        Access::Admin => {
            if auth.is_loading() {
                RouteDecision::Wait
            } else if auth.session.is_none() {
                RouteDecision::RedirectToLogin
            } else if auth.is_admin() {
                RouteDecision::Allow
            } else {
                RouteDecision::RedirectHome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthPhase;
    use aprenda_core::{AuthUser, Profile, Role, Session, UserId};
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(phase: AuthPhase, signed_in: bool, role: Option<Role>) -> AuthSnapshot {
        let user_id = UserId(Uuid::new_v4());
        AuthSnapshot {
            phase,
            session: signed_in.then(|| Session {
                access_token: "token".to_string(),
                user: AuthUser {
                    id: user_id,
                    email: "user@example.com".to_string(),
                    metadata: serde_json::Value::Null,
                },
            }),
            profile: role.map(|role| Profile {
                id: user_id,
                full_name: None,
                avatar_url: None,
                role,
                cpf: None,
                points: 0,
                created_at: Utc::now(),
            }),
        }
    }

    #[test]
    fn test_public_routes_always_allowed() {
        let anonymous = snapshot(AuthPhase::Anonymous, false, None);
        assert_eq!(decide(Route::Courses, &anonymous), RouteDecision::Allow);
        assert_eq!(decide(Route::Leaderboard, &anonymous), RouteDecision::Allow);
        assert_eq!(
            decide(Route::CertificateViewer, &anonymous),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_protected_routes_require_session() {
        let anonymous = snapshot(AuthPhase::Anonymous, false, None);
        assert_eq!(
            decide(Route::Dashboard, &anonymous),
            RouteDecision::RedirectToLogin
        );

        let signed_in = snapshot(AuthPhase::Authenticated, true, Some(Role::User));
        assert_eq!(decide(Route::Dashboard, &signed_in), RouteDecision::Allow);
    }

    #[test]
    fn test_admin_routes_gate_on_role() {
        let student = snapshot(AuthPhase::Authenticated, true, Some(Role::User));
        assert_eq!(
            decide(Route::AdminCourses, &student),
            RouteDecision::RedirectHome
        );

        let admin = snapshot(AuthPhase::Authenticated, true, Some(Role::Admin));
        assert_eq!(decide(Route::AdminCourses, &admin), RouteDecision::Allow);

        let anonymous = snapshot(AuthPhase::Anonymous, false, None);
        assert_eq!(
            decide(Route::AdminCourses, &anonymous),
            RouteDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_nothing_is_decided_while_loading() {
        let loading = snapshot(AuthPhase::Loading, true, Some(Role::Admin));
        assert_eq!(decide(Route::Dashboard, &loading), RouteDecision::Wait);
        assert_eq!(decide(Route::AdminUsers, &loading), RouteDecision::Wait);
        // an admin profile must not leak through while loading
        assert!(!loading.is_admin());
    }
}
