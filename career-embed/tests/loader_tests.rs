mod common;

use std::time::Duration;

use common::{EventLog, RecordingHost, RecordingReactivity};
use embed::{AssetPolicy, EmbedError, LoadStatus, Page, SafeInjector, ScriptLoader};

#[tokio::test]
async fn repeated_loads_attach_a_single_element() {
    let page = Page::new().into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone());
    let loader = ScriptLoader::new(page.clone(), AssetPolicy::default());

    let first = loader
        .ensure_loaded(&host, "/plugins/challenges/assets/view.js")
        .await
        .expect("first load should succeed");
    let second = loader
        .ensure_loaded(&host, " /plugins/challenges/assets/view.js ")
        .await
        .expect("second load should succeed");

    assert_eq!(first, LoadStatus::Loaded);
    assert_eq!(second, LoadStatus::AlreadyPresent);
    assert!(second.attached());
    let page = page.lock().expect("page lock poisoned");
    assert_eq!(page.count_script_src("/plugins/challenges/assets/view.js"), 1);
    assert_eq!(log.count("load:/plugins/challenges/assets/view.js"), 1);
}

#[tokio::test]
async fn overlapping_loads_do_not_duplicate_the_element() {
    let page = Page::new().into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone()).delayed("/slow.js", Duration::from_millis(100));
    let loader = ScriptLoader::new(page.clone(), AssetPolicy::default());

    let (first, second) = tokio::join!(
        loader.ensure_loaded(&host, "/slow.js"),
        loader.ensure_loaded(&host, "/slow.js"),
    );

    let mut statuses = vec![
        first.expect("first load should succeed"),
        second.expect("second load should succeed"),
    ];
    statuses.sort_by_key(|status| *status == LoadStatus::Loaded);
    assert_eq!(statuses, vec![LoadStatus::AlreadyPresent, LoadStatus::Loaded]);
    assert_eq!(
        page.lock()
            .expect("page lock poisoned")
            .count_script_src("/slow.js"),
        1
    );
    assert_eq!(log.count("load:/slow.js"), 1);
}

#[tokio::test]
async fn blank_and_non_url_values_are_skipped() {
    let page = Page::new().into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone());
    let loader = ScriptLoader::new(page.clone(), AssetPolicy::default());

    for value in ["", "   ", "relative/view.js", "<div>not a script</div>"] {
        let status = loader
            .ensure_loaded(&host, value)
            .await
            .expect("skips are not errors");
        assert_eq!(status, LoadStatus::Skipped);
        assert!(!status.attached());
    }
    assert!(page.lock().expect("page lock poisoned").body_scripts().is_empty());
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn load_error_is_reported_with_the_url() {
    let page = Page::new().into_shared();
    let host = RecordingHost::new(EventLog::default()).failing("/broken.js");
    let loader = ScriptLoader::new(page.clone(), AssetPolicy::default());

    let err = loader
        .ensure_loaded(&host, "/broken.js")
        .await
        .expect_err("broken script should fail");

    assert!(matches!(err, EmbedError::ScriptLoadFailure { ref url, .. } if url == "/broken.js"));
    assert!(err.to_string().starts_with("script load error: /broken.js"));
}

#[tokio::test]
async fn untrusted_script_is_refused_before_attaching() {
    let page = Page::new().into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone());
    let loader = ScriptLoader::new(page.clone(), AssetPolicy::allow_list(["/plugins/"]));

    let err = loader
        .ensure_loaded(&host, "https://cdn.evil.example/view.js")
        .await
        .expect_err("foreign script should be refused");

    assert!(matches!(err, EmbedError::UntrustedAsset(_)));
    assert!(page.lock().expect("page lock poisoned").body_scripts().is_empty());
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn injector_runs_embedded_scripts_in_document_order() {
    let page = Page::new().with_region(1, 10).into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone()).failing("/second.js");
    let injector = SafeInjector::new(page.clone(), AssetPolicy::default());

    injector.suspend(1);
    let report = injector
        .mount(
            &host,
            1,
            concat!(
                "<div id=\"challenge\">",
                "<script src=\"/first.js\"></script>",
                "<script>first()</script>",
                "<script src=\"/second.js\"></script>",
                "<script>second()</script>",
                "</div>"
            ),
            || true,
        )
        .await;

    assert_eq!(
        log.events(),
        vec![
            "load:/first.js",
            "inline:first()",
            "load:/second.js",
            "inline:second()",
        ]
    );
    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 1);

    {
        let page = page.lock().expect("page lock poisoned");
        let region = page.region(1).expect("region should exist");
        assert!(region.mounted);
        assert!(region.reactivity_suspended);
        assert_eq!(region.content, "<div id=\"challenge\"></div>");
        assert_eq!(page.body_scripts().len(), 4);
    }

    let reactivity = RecordingReactivity::new(log.clone());
    injector.resume(&reactivity, 1);
    assert!(
        !page
            .lock()
            .expect("page lock poisoned")
            .region(1)
            .expect("region should exist")
            .reactivity_suspended
    );
    assert_eq!(log.events().last().map(String::as_str), Some("init:1"));
}

#[tokio::test]
async fn injector_honours_the_asset_policy() {
    let page = Page::new().with_region(1, 10).into_shared();
    let log = EventLog::default();
    let host = RecordingHost::new(log.clone());
    let policy = AssetPolicy::allow_list(["/plugins/"]).without_inline_scripts();
    let injector = SafeInjector::new(page.clone(), policy);

    let report = injector
        .mount(
            &host,
            1,
            concat!(
                "<script src=\"https://evil.example/x.js\"></script>",
                "<script>steal()</script>",
                "<script src=\"/plugins/ok.js\"></script>",
            ),
            || true,
        )
        .await;

    assert_eq!(log.events(), vec!["load:/plugins/ok.js"]);
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(
        page.lock().expect("page lock poisoned").body_scripts().len(),
        1
    );
}
