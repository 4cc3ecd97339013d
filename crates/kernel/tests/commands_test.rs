#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Chat command integration tests.

mod common;

use menagerie_kernel::commands::{CommandError, Invoker, Vote};
use menagerie_kernel::jsonsql::Record;
use menagerie_kernel::models::Image;
use menagerie_test_utils::test_image;

use common::{TestApp, test_config};

const ADMIN: i64 = 1;
const STAFF_ROLE: i64 = 500;

async fn app() -> TestApp {
    let mut config = test_config();
    config.privileged_accounts = vec![ADMIN];
    config.privileged_roles = vec![STAFF_ROLE];
    TestApp::with_config(config).await
}

fn admin() -> Invoker {
    Invoker::new(ADMIN)
}

fn staff() -> Invoker {
    Invoker::new(2).with_roles([STAFF_ROLE])
}

fn member() -> Invoker {
    Invoker::new(3)
}

#[tokio::test]
async fn basic_db_uses_the_basic_kind() {
    let app = app().await;
    test_image("owlbear").with_id("ob-1").insert(&app.db).await.unwrap();
    test_image("beholder").with_id("bh-1").insert(&app.db).await.unwrap();

    let records = app
        .state
        .commands()
        .basic_db(&member(), r#"{"and": [{"eq": ["creature", "owlbear"]}]}"#)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(matches!(&records[0], Record::Image(image) if image.image_id == "ob-1"));
}

#[tokio::test]
async fn basic_db_echoes_jsonsql_errors() {
    let app = app().await;
    let commands = app.state.commands();

    let err = commands.basic_db(&member(), "{}").await.unwrap_err();
    assert!(err.to_string().starts_with("JsonSQL error: malformed expression at $"));

    let err = commands.basic_db(&member(), "not json").await.unwrap_err();
    assert!(matches!(err, CommandError::Gate(ref gate) if gate.rule() == "malformed_expression"));
}

#[tokio::test]
async fn full_db_requires_privileged_account() {
    let app = app().await;
    app.state.ranking().add_suggestion("more mimics", 9).await.unwrap();
    let commands = app.state.commands();

    let err = commands
        .full_db(&staff(), r#"{"eq": ["userID", 9]}"#, "suggestions")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let records = commands
        .full_db(&admin(), r#"{"eq": ["userID", 9]}"#, "suggestions")
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn vote_flow_updates_counters() {
    let app = app().await;
    test_image("owlbear").with_id("low").with_votes(0, 0).insert(&app.db).await.unwrap();
    test_image("owlbear").with_id("high").with_votes(9, 3).insert(&app.db).await.unwrap();
    let commands = app.state.commands();

    let candidate = commands.vote_image().await.unwrap().unwrap();
    assert_eq!(candidate.image_id, "low");

    commands.cast_vote("low", Vote::Yes).await.unwrap();
    commands.cast_vote("low", Vote::No).await.unwrap();

    let image = Image::find_by_id(&app.db, "low").await.unwrap().unwrap();
    assert_eq!(image.voted, 2);
    assert_eq!(image.ranking, 1);

    let err = commands.cast_vote("ghost", Vote::Yes).await.unwrap_err();
    assert!(matches!(err, CommandError::UnknownImage(_)));

    let output = app.state.metrics().encode();
    assert!(output.contains(r#"choice="yes""#));
    assert!(output.contains(r#"choice="no""#));
}

#[tokio::test]
async fn vote_image_with_too_few_images_offers_nothing() {
    let app = app().await;
    test_image("owlbear").insert(&app.db).await.unwrap();
    assert!(app.state.commands().vote_image().await.unwrap().is_none());
}

#[tokio::test]
async fn key_issuance_and_revocation_permissions() {
    let app = app().await;
    let commands = app.state.commands();

    let err = commands.generate_api_key(&member(), "mine").await.unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let key = commands.generate_api_key(&staff(), "laptop").await.unwrap();
    assert!(app.state.ranking().verify_api_key(&key).await.unwrap());

    let err = commands.revoke_api_keys(&staff(), 2).await.unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    assert_eq!(commands.revoke_api_keys(&admin(), 2).await.unwrap(), 1);
    assert!(!app.state.ranking().verify_api_key(&key).await.unwrap());
}

#[tokio::test]
async fn upload_registers_image_and_prepares_directory() {
    let app = app().await;
    let commands = app.state.commands();

    let ticket = commands
        .upload_image(
            &staff(),
            " Owl Bear ",
            "https://cdn.discordapp.com/attachments/1/2/owlbear.png",
        )
        .await
        .unwrap();

    assert_eq!(ticket.creature, "Owl_Bear");
    assert!(ticket.path.parent().unwrap().is_dir());
    assert!(ticket.path.ends_with(format!("Owl_Bear/{}.jpg", ticket.image_id)));

    let image = Image::find_by_id(&app.db, &ticket.image_id).await.unwrap().unwrap();
    assert_eq!(image.creature, "Owl_Bear");
    assert_eq!(image.user_id, 2);
    assert_eq!(image.voted, 0);
}

#[tokio::test]
async fn upload_rejects_foreign_urls_and_members() {
    let app = app().await;
    let commands = app.state.commands();

    let err = commands
        .upload_image(&staff(), "owlbear", "https://evil.example/cdn.discordapp.com/x.png")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidUrl { .. }));

    let err = commands
        .upload_image(&member(), "owlbear", "https://cdn.discordapp.com/x.png")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Forbidden(_)));

    let err = commands
        .upload_image(&staff(), "   ", "https://cdn.discordapp.com/x.png")
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidInput(_)));
}

#[tokio::test]
async fn suggestions_are_trimmed_and_required() {
    let app = app().await;
    let commands = app.state.commands();

    let suggestion = commands.suggest(&member(), "  more mimics ").await.unwrap();
    assert_eq!(suggestion.text, "more mimics");
    assert_eq!(suggestion.user_id, 3);

    assert!(matches!(
        commands.suggest(&member(), " ").await,
        Err(CommandError::InvalidInput(_))
    ));
}
