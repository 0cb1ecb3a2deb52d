//! Example: waiting for a window and querying it
//!
//! Builds an in-memory Notepad whose main window shows up a few lookups after
//! launch, waits for it, then walks through the query styles.
//!
//! ```bash
//! RUST_LOG=fluent_find=debug cargo run --example notepad_flow
//! ```

use std::time::Duration;

use fluent_find::{
    Application, ControlType, Element, FindEvent, MemoryApplication, MemoryElement, RetryPolicy,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const NOTEPAD: &str = r#"{
    "control_type": "Window",
    "name": "Untitled - Notepad",
    "process_id": 4242,
    "children": [
        { "control_type": "Document", "automation_id": "15", "class_name": "Edit" },
        { "control_type": "MenuBar", "name": "Application", "children": [
            { "control_type": "MenuItem", "name": "File" },
            { "control_type": "MenuItem", "name": "Edit" }
        ] }
    ]
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = MemoryApplication::new();
    app.show_main_window_after(3, MemoryElement::from_json(NOTEPAD)?);

    let policy = RetryPolicy::from_env()?.interval(Duration::from_millis(50));
    let policy = RetryPolicy {
        timeout: policy.timeout.or(Some(Duration::from_secs(2))),
        ..policy
    };
    let window = app.wait_main_window(
        |find| find.in_descendants().by_control_type(ControlType::Document),
        policy,
    )?;
    info!("main window ready after {} lookups", app.main_window_calls());

    let file = window
        .build_find()
        .in_children()
        .by_name("Application")
        .by_name("File")
        .observe(|event: &FindEvent<'_, MemoryElement>| info!("{}", event.query))
        .first()?;
    info!(name = ?file.name(), "found menu item");

    let items = window
        .build_find()
        .in_descendants()
        .by_control_type(ControlType::MenuItem)
        .all()?;
    info!(count = items.len(), "menu items");

    match window
        .build_find()
        .in_descendants()
        .by_name("Format")
        .parent()
        .retry(Duration::from_millis(300))
        .first()
    {
        Ok(element) => info!(?element, "unexpected match"),
        Err(e) => info!("{e}"),
    }

    let exited = app.close_and_wait(Duration::from_secs(1))?;
    info!(exited, "closed notepad");
    Ok(())
}
