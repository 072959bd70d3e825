//! Notification delivery: admin sends, read marks, and the realtime
//! bridge

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{create_test_app, register_user, sign_in_user};

use aprenda_client::gateway::Datastore;
use aprenda_client::mutations::notifications::{
    mark_all_notifications_read, mark_notification_read, send_notification,
};
use aprenda_client::queries::notifications::{
    unread_count, user_notifications, user_notifications_prefix,
};
use aprenda_client::{ClientError, NotificationWatcher};
use aprenda_core::{NotificationKind, Query};
use serde_json::json;
use tokio::time::timeout;

#[tokio::test]
async fn test_broadcast_inserts_one_row_per_profile() {
    let app = create_test_app().await;
    register_user(&app, "a@example.com", "Aluna A").await;
    register_user(&app, "b@example.com", "Aluno B").await;
    register_user(&app, "c@example.com", "Aluna C").await;

    let delivered = send_notification(
        &app.state,
        None,
        "Bem-vindos à plataforma de cursos!",
        NotificationKind::Info,
    )
    .await
    .unwrap();
    assert_eq!(delivered, 3);

    let rows = app
        .gateway
        .select(&Query::table("notifications"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);

    let recipients: HashSet<&str> = rows
        .iter()
        .map(|row| row["user_id"].as_str().unwrap())
        .collect();
    assert_eq!(recipients.len(), 3);
    for row in &rows {
        assert_eq!(row["message"], "Bem-vindos à plataforma de cursos!");
        assert_eq!(row["type"], "info");
    }
}

#[tokio::test]
async fn test_direct_notification_reaches_one_user() {
    let app = create_test_app().await;
    let user_id = sign_in_user(&app, "aluna@example.com", "Aluna").await;
    register_user(&app, "outro@example.com", "Outro").await;

    send_notification(
        &app.state,
        Some(user_id),
        "Seu certificado está disponível.",
        NotificationKind::Success,
    )
    .await
    .unwrap();

    let mine = user_notifications(&app.state, None).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].message, "Seu certificado está disponível.");
    assert_eq!(mine[0].kind, NotificationKind::Success);

    let rows = app
        .gateway
        .select(&Query::table("notifications"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_short_message_rejected_before_any_write() {
    let app = create_test_app().await;
    register_user(&app, "a@example.com", "Aluna A").await;

    let err = send_notification(&app.state, None, "curto", NotificationKind::Info)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let rows = app
        .gateway
        .select(&Query::table("notifications"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_broadcast_partial_failure_reports_progress() {
    let app = create_test_app().await;
    register_user(&app, "a@example.com", "Aluna A").await;
    register_user(&app, "b@example.com", "Aluno B").await;
    register_user(&app, "c@example.com", "Aluna C").await;

    app.gateway.fail_inserts_after("notifications", 1);

    let err = send_notification(
        &app.state,
        None,
        "Manutenção programada neste sábado.",
        NotificationKind::Warning,
    )
    .await
    .unwrap_err();

    match err {
        ClientError::BroadcastIncomplete {
            delivered, total, ..
        } => {
            assert_eq!(delivered, 1);
            assert_eq!(total, 3);
        }
        other => panic!("expected BroadcastIncomplete, got {other:?}"),
    }

    // best effort: the rows that made it in stay
    let rows = app
        .gateway
        .select(&Query::table("notifications"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_mark_read_flow() {
    let app = create_test_app().await;
    let user_id = sign_in_user(&app, "aluna@example.com", "Aluna").await;

    for message in [
        "Primeira notificação de teste.",
        "Segunda notificação de teste.",
        "Terceira notificação de teste.",
    ] {
        send_notification(&app.state, Some(user_id), message, NotificationKind::Info)
            .await
            .unwrap();
    }

    let notifications = user_notifications(&app.state, None).await.unwrap();
    assert_eq!(unread_count(&notifications), 3);

    mark_notification_read(&app.state, notifications[0].id)
        .await
        .unwrap();
    let notifications = user_notifications(&app.state, None).await.unwrap();
    assert_eq!(unread_count(&notifications), 2);

    let changed = mark_all_notifications_read(&app.state).await.unwrap();
    assert_eq!(changed, 2);
    let notifications = user_notifications(&app.state, None).await.unwrap();
    assert_eq!(unread_count(&notifications), 0);
}

#[tokio::test]
async fn test_realtime_insert_invalidates_notification_reads() {
    let app = create_test_app().await;
    let user_id = sign_in_user(&app, "aluna@example.com", "Aluna").await;

    let _watcher = NotificationWatcher::spawn(&app.state)
        .await
        .unwrap()
        .expect("signed-in watcher");

    // warm the cache
    assert!(user_notifications(&app.state, None).await.unwrap().is_empty());

    let mut invalidations = app.state.cache.invalidations();

    // a backend-side insert, as the push channel would deliver it
    app.gateway
        .insert(
            "notifications",
            json!({
                "user_id": user_id.to_string(),
                "message": "Novo curso disponível!",
            }),
        )
        .await
        .unwrap();

    let prefix = timeout(Duration::from_secs(2), invalidations.recv())
        .await
        .expect("timed out waiting for invalidation")
        .unwrap();
    assert_eq!(prefix, user_notifications_prefix(user_id));

    let before = app.gateway.select_calls();
    let notifications = user_notifications(&app.state, None).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(app.gateway.select_calls(), before + 1);
}

#[tokio::test]
async fn test_watcher_requires_a_user() {
    let app = create_test_app().await;
    let watcher = NotificationWatcher::spawn(&app.state).await.unwrap();
    assert!(watcher.is_none());
}
