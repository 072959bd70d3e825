//! Admin console flows: catalog management, user listing, dashboard

mod common;

use common::{create_test_app, register_user, sign_in_user};

use aprenda_client::gateway::Datastore;
use aprenda_client::mutations::catalog::{
    create_course, create_module, create_question, delete_course, delete_module, delete_question,
    update_course, update_module, update_question, CourseDraft, ModuleDraft, QuestionDraft,
};
use aprenda_client::mutations::feedback::submit_feedback;
use aprenda_client::mutations::profile::set_user_role;
use aprenda_client::queries::admin::{
    admin_courses, admin_dashboard, admin_feedbacks, admin_modules, admin_questions, admin_users,
};
use aprenda_client::queries::courses::{courses, CourseFilter};
use aprenda_client::queries::quiz::module_questions;
use aprenda_client::ClientError;
use aprenda_core::{Query, Role};

fn course_draft(title: &str) -> CourseDraft {
    CourseDraft {
        title: title.to_string(),
        description: Some("descrição".to_string()),
        category: Some("pedagogia".to_string()),
        instructor: Some("Ana Souza".to_string()),
        image_url: None,
    }
}

#[tokio::test]
async fn test_course_crud_refreshes_catalog_reads() {
    let app = create_test_app().await;

    assert!(admin_courses(&app.state).await.unwrap().is_empty());
    assert!(courses(&app.state, &CourseFilter::default())
        .await
        .unwrap()
        .is_empty());

    let course = create_course(&app.state, &course_draft("Pedagogia Infantil"))
        .await
        .unwrap();

    // both the admin list and the public catalog refetch after the write
    assert_eq!(admin_courses(&app.state).await.unwrap().len(), 1);
    assert_eq!(
        courses(&app.state, &CourseFilter::default())
            .await
            .unwrap()
            .len(),
        1
    );

    let mut renamed = course_draft("Pedagogia Infantil II");
    renamed.category = Some("educacao".to_string());
    update_course(&app.state, course.id, &renamed).await.unwrap();

    let listed = admin_courses(&app.state).await.unwrap();
    assert_eq!(listed[0].title, "Pedagogia Infantil II");

    delete_course(&app.state, course.id).await.unwrap();
    assert!(admin_courses(&app.state).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_course_title_rejected() {
    let app = create_test_app().await;
    let err = create_course(&app.state, &course_draft("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_module_crud_keeps_display_order() {
    let app = create_test_app().await;
    let course = create_course(&app.state, &course_draft("Pedagogia Infantil"))
        .await
        .unwrap();

    let second = create_module(
        &app.state,
        course.id,
        &ModuleDraft {
            title: "Avaliação".to_string(),
            module_order: 2,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    create_module(
        &app.state,
        course.id,
        &ModuleDraft {
            title: "Introdução".to_string(),
            module_order: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let modules = admin_modules(&app.state, course.id).await.unwrap();
    let titles: Vec<&str> = modules.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Introdução", "Avaliação"]);

    update_module(
        &app.state,
        course.id,
        second.id,
        &ModuleDraft {
            title: "Avaliação Final".to_string(),
            module_order: 3,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let modules = admin_modules(&app.state, course.id).await.unwrap();
    assert_eq!(modules[1].title, "Avaliação Final");

    delete_module(&app.state, course.id, second.id).await.unwrap();
    assert_eq!(admin_modules(&app.state, course.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_question_invariants_block_bad_drafts() {
    let app = create_test_app().await;
    let course = create_course(&app.state, &course_draft("Pedagogia Infantil"))
        .await
        .unwrap();
    let module = create_module(
        &app.state,
        course.id,
        &ModuleDraft {
            title: "Introdução".to_string(),
            module_order: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let single_option = QuestionDraft {
        question_text: "Quantas opções bastam?".to_string(),
        options: vec!["uma".to_string()],
        correct_option_index: 0,
    };
    let err = create_question(&app.state, module.id, &single_option)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let out_of_bounds = QuestionDraft {
        question_text: "Qual é o índice correto?".to_string(),
        options: vec!["a".to_string(), "b".to_string()],
        correct_option_index: 2,
    };
    let err = create_question(&app.state, module.id, &out_of_bounds)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    // nothing reached the store
    let rows = app.gateway.select(&Query::table("questions")).await.unwrap();
    assert!(rows.is_empty());

    let valid = QuestionDraft {
        question_text: "O que é alfabetização?".to_string(),
        options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        correct_option_index: 1,
    };
    let question = create_question(&app.state, module.id, &valid).await.unwrap();
    assert!(question.correct_option_index < question.options.len());
    assert!(question.options.len() >= 2);

    let listed = admin_questions(&app.state, module.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(module_questions(&app.state, module.id).await.unwrap().len(), 1);

    update_question(
        &app.state,
        module.id,
        question.id,
        &QuestionDraft {
            question_text: "O que é letramento?".to_string(),
            options: vec!["x".to_string(), "y".to_string()],
            correct_option_index: 0,
        },
    )
    .await
    .unwrap();
    let listed = admin_questions(&app.state, module.id).await.unwrap();
    assert_eq!(listed[0].question_text, "O que é letramento?");

    delete_question(&app.state, module.id, question.id)
        .await
        .unwrap();
    assert!(admin_questions(&app.state, module.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_users_merge_account_emails() {
    let app = create_test_app().await;
    register_user(&app, "ana@example.com", "Ana").await;
    register_user(&app, "bia@example.com", "Bia").await;

    let users = admin_users(&app.state).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].full_name.as_deref(), Some("Ana"));
    assert_eq!(users[0].email.as_deref(), Some("ana@example.com"));
    assert_eq!(users[1].email.as_deref(), Some("bia@example.com"));
}

#[tokio::test]
async fn test_role_change_refreshes_user_list() {
    let app = create_test_app().await;
    let user_id = sign_in_user(&app, "ana@example.com", "Ana").await;

    let users = admin_users(&app.state).await.unwrap();
    assert_eq!(users[0].role, Role::User);

    set_user_role(&app.state, user_id, Role::Admin).await.unwrap();

    let users = admin_users(&app.state).await.unwrap();
    assert_eq!(users[0].role, Role::Admin);
}

#[tokio::test]
async fn test_dashboard_aggregates() {
    let app = create_test_app().await;
    register_user(&app, "ana@example.com", "Ana").await;
    register_user(&app, "bia@example.com", "Bia").await;
    create_course(&app.state, &course_draft("Pedagogia Infantil"))
        .await
        .unwrap();
    submit_feedback(
        &app.state,
        "Visitante",
        "visitante@example.com",
        "Gostei muito da plataforma!",
    )
    .await
    .unwrap();

    let dashboard = admin_dashboard(&app.state).await.unwrap();
    assert_eq!(dashboard.stats.users, 2);
    assert_eq!(dashboard.stats.courses, 1);
    assert_eq!(dashboard.stats.feedbacks, 1);
    assert_eq!(dashboard.recent_feedbacks.len(), 1);

    let total_signups: u64 = dashboard.monthly_signups.iter().map(|m| m.count).sum();
    assert_eq!(total_signups, 2);

    let feedbacks = admin_feedbacks(&app.state).await.unwrap();
    assert_eq!(feedbacks.len(), 1);
    assert_eq!(feedbacks[0].name, "Visitante");
    assert!(feedbacks[0].user_id.is_none());
}
