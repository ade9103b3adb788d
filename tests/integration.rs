//! Integration tests for skulk
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use std::time::Duration;

use skulk::{LaunchOptions, NavigateOptions, Session, TypingCadence};

/// Check if Chrome is available
fn chrome_available() -> bool {
    // Honors RUST_LOG; repeated init attempts are harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    skulk::cdp::find_chrome().is_ok()
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_session_launch_and_close() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_close_is_idempotent() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    session.close().await.expect("First close failed");
    session.close().await.expect("Second close should be a no-op");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_proxy_descriptor_is_recorded() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    // Malformed proxy must not fail the launch.
    let mut session = Session::launch_with(LaunchOptions::default().proxy_url("not a proxy"))
        .await
        .expect("Failed to launch session");
    assert!(session.proxy().is_none());
    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_navigation_and_content() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto("data:text/html,<title>Test Title</title><h1>Hello</h1>")
        .await
        .expect("Failed to navigate");

    let content = page.content().await.expect("Failed to get content");
    assert!(content.contains("Hello"));

    let title = page.title().await.expect("Failed to get title");
    assert_eq!(title, "Test Title");

    let url = page.url().await.expect("Failed to get URL");
    assert!(url.starts_with("data:"));

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_navigation_retry_gives_up() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    let options = NavigateOptions::default()
        .with_max_attempts(2)
        .with_base_delay(Duration::from_millis(100));
    let result = page
        .navigate("http://localhost:1/unreachable", &options)
        .await;

    match result {
        Err(skulk::Error::Navigation { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected Navigation error, got {other:?}"),
    }

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_evaluate_javascript() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    let result: i32 = page.evaluate("1 + 2").await.expect("Failed to evaluate");
    assert_eq!(result, 3);

    let result: String = page
        .evaluate("'hello' + ' world'")
        .await
        .expect("Failed to evaluate");
    assert_eq!(result, "hello world");

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_wait_for_element_timeout() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto("data:text/html,<div>No delayed element</div>")
        .await
        .expect("Failed to navigate");

    let result = page
        .wait_for("#never-exists", Duration::from_millis(500))
        .await;
    assert!(matches!(result, Err(skulk::Error::Timeout(_))));

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_scroll_to_bottom_on_static_page() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto("data:text/html,<div style='height:3000px'>Tall</div>")
        .await
        .expect("Failed to navigate");

    // A static page converges in a single round.
    let rounds = page
        .scroll_to_bottom_with(Duration::from_millis(200), Some(10))
        .await
        .expect("Failed to scroll");
    assert_eq!(rounds, 1);

    let y = page.scroll_y().await.expect("Failed to read scroll");
    assert!(y > 0.0);

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_human_move_and_click() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto(
        r#"data:text/html,
        <button id="btn" onclick="this.textContent = 'Clicked!'"
            style="width:200px;height:60px">Click Me</button>
    "#,
    )
    .await
    .expect("Failed to navigate");

    let mut human = page.human_seeded(7);
    human
        .move_and_click_with("#btn", 400)
        .await
        .expect("Failed to click");

    let content = page.content().await.expect("Failed to get content");
    assert!(content.contains("Clicked!"));

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_human_typing() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto(r#"data:text/html,<input type="text" id="input" value="">"#)
        .await
        .expect("Failed to navigate");

    let cadence = TypingCadence {
        min_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(30),
        error_rate: 0.0,
    };
    let mut human = page.human_seeded(7);
    human
        .type_with_cadence("#input", "Hello World", cadence)
        .await
        .expect("Failed to type");

    let value: String = page
        .evaluate("document.getElementById('input').value")
        .await
        .expect("Failed to evaluate");
    assert_eq!(value, "Hello World");

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_human_typing_with_typos_lands_intended_text() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto(r#"data:text/html,<input type="text" id="input" value="">"#)
        .await
        .expect("Failed to navigate");

    // Every character after the first is fumbled and corrected.
    let cadence = TypingCadence {
        min_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(30),
        error_rate: 1.0,
    };
    let mut human = page.human_seeded(7);
    human
        .type_with_cadence("#input", "abc", cadence)
        .await
        .expect("Failed to type");

    let value: String = page
        .evaluate("document.getElementById('input').value")
        .await
        .expect("Failed to evaluate");
    assert_eq!(value, "abc");

    session.close().await.expect("Failed to close session");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_human_scrolling_reaches_target() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let mut session = Session::launch().await.expect("Failed to launch session");
    let page = session.page();

    page.goto("data:text/html,<div style='height:5000px'>Tall</div>")
        .await
        .expect("Failed to navigate");

    let mut human = page.human_seeded(7);
    human
        .scroll_human_like_with(500.0, 2000)
        .await
        .expect("Failed to scroll");

    let y = page.scroll_y().await.expect("Failed to read scroll");
    assert_eq!(y, 500.0);

    session.close().await.expect("Failed to close session");
}
