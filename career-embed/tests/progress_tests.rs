mod common;

use common::{Fixture, config_for, spawn_fixture, two_step_page};
use embed::{
    ApiClient, CLASS_COMPLETED, CLASS_PENDING, EmbedError, Page, ProgressSynchronizer,
    Translations,
};
use serde_json::json;

#[tokio::test]
async fn refresh_patches_bar_count_and_badges() {
    let fixture = Fixture::new();
    fixture.careers(json!([{
        "id": 1,
        "name": "Web basics",
        "total_steps": 3,
        "completed_steps": 2,
        "steps": [
            {"id": 1, "completed": true},
            {"id": 2, "completed": true},
            {"id": 3, "completed": false},
        ],
    }]));
    let (base_url, _server) = spawn_fixture(fixture.clone()).await;
    let page = two_step_page();
    let synchronizer = ProgressSynchronizer::new(
        ApiClient::new(&config_for(&base_url)),
        page.clone(),
        Translations::default(),
    );

    let snapshot = synchronizer
        .refresh(1)
        .await
        .expect("refresh should succeed")
        .expect("career should be listed");

    assert_eq!(snapshot.total_steps, 3);
    assert_eq!(snapshot.completed_steps, 2);
    assert_eq!(synchronizer.last_snapshot(), Some(snapshot));

    let page = page.lock().expect("page lock poisoned");
    let bar = page.progress_bar().expect("bar should exist");
    assert_eq!(bar.width, "67%");
    assert_eq!(bar.aria_valuenow, "67");
    assert_eq!(bar.label, "67%");
    assert_eq!(page.progress_count(), Some("2"));
    for step_id in [1, 2] {
        let card = page.step_card(step_id).expect("card should exist");
        assert_eq!(card.completed, Some(true));
        let badge = card.badge.as_ref().expect("badge should exist");
        assert_eq!(badge.text, "Completed");
        assert!(badge.has_class(CLASS_COMPLETED));
        assert!(!badge.has_class(CLASS_PENDING));
    }
    assert!(page.step_card(3).is_none());
}

#[tokio::test]
async fn pending_steps_get_translated_pending_badges() {
    let fixture = Fixture::new();
    fixture.careers(json!([{
        "id": 4,
        "steps": [{"id": 1, "completed": false}, {"id": 2, "completed": false}],
    }]));
    let (base_url, _server) = spawn_fixture(fixture.clone()).await;
    let page = Page::new()
        .with_progress_bar()
        .with_step_card(1, true)
        .into_shared();
    let translations = Translations::from_json_str(r#"{"In Progress": "En cours"}"#)
        .expect("translations should parse");
    let synchronizer = ProgressSynchronizer::new(
        ApiClient::new(&config_for(&base_url)),
        page.clone(),
        translations,
    );

    let snapshot = synchronizer
        .refresh(4)
        .await
        .expect("refresh should succeed")
        .expect("career should be listed");

    assert_eq!(snapshot.total_steps, 2);
    assert_eq!(snapshot.completed_steps, 0);
    let page = page.lock().expect("page lock poisoned");
    assert_eq!(
        page.progress_bar().map(|bar| bar.width.as_str()),
        Some("0%")
    );
    assert_eq!(page.progress_count(), None);
    let badge = page
        .step_card(1)
        .and_then(|card| card.badge.as_ref())
        .expect("badge should exist");
    assert_eq!(badge.text, "En cours");
    assert!(badge.has_class(CLASS_PENDING));
}

#[tokio::test]
async fn unknown_career_leaves_the_page_alone() {
    let fixture = Fixture::new();
    fixture.careers(json!([{"id": 2, "total_steps": 1, "completed_steps": 1, "steps": []}]));
    let (base_url, _server) = spawn_fixture(fixture.clone()).await;
    let page = two_step_page();
    let synchronizer = ProgressSynchronizer::new(
        ApiClient::new(&config_for(&base_url)),
        page.clone(),
        Translations::default(),
    );

    let snapshot = synchronizer
        .refresh(1)
        .await
        .expect("refresh should succeed");

    assert!(snapshot.is_none());
    assert!(synchronizer.last_snapshot().is_none());
    let page = page.lock().expect("page lock poisoned");
    assert_eq!(page.progress_bar().map(|bar| bar.width.as_str()), Some(""));
    assert_eq!(page.step_card(1).and_then(|card| card.completed), None);
}

#[tokio::test]
async fn listing_failure_is_an_error() {
    let fixture = Fixture::new();
    fixture.fail_careers();
    let (base_url, _server) = spawn_fixture(fixture.clone()).await;
    let synchronizer = ProgressSynchronizer::new(
        ApiClient::new(&config_for(&base_url)),
        two_step_page(),
        Translations::default(),
    );

    let err = synchronizer
        .refresh(1)
        .await
        .expect_err("server error should surface");

    assert!(matches!(err, EmbedError::FetchFailure { .. }));
    assert_eq!(fixture.career_hits(), 1);
}
