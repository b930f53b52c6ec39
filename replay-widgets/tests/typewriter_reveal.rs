use replay_widgets::{
    CellInput, CellKind, NotebookRenderer, PacingConfig, TextSurface, TypewriterEngine,
    TypewriterOptions, TypingOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn steady_typewriter() -> TypewriterEngine {
    TypewriterEngine::new(PacingConfig {
        jitter: 0.0,
        ..Default::default()
    })
}

#[tokio::test(start_paused = true)]
async fn test_reveal_fills_duration() {
    init_logging();
    let typewriter = steady_typewriter();
    let input = CellInput::default();
    let started = Instant::now();

    let outcome = typewriter
        .type_text(
            Arc::new(input.clone()),
            "abcd",
            Duration::from_millis(400),
            TypewriterOptions::default(),
        )
        .wait()
        .await;

    assert_eq!(outcome, TypingOutcome::Completed);
    assert_eq!(input.text(), "abcd");
    // No wait after the last character
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "finished early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(310), "finished late: {:?}", elapsed);
    assert!(!typewriter.is_typing());
}

#[tokio::test(start_paused = true)]
async fn test_characters_appear_progressively() {
    let typewriter = steady_typewriter();
    let input = CellInput::default();
    let handle = typewriter.type_text(
        Arc::new(input.clone()),
        "abcd",
        Duration::from_millis(400),
        TypewriterOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(input.text(), "ab");

    assert_eq!(handle.wait().await, TypingOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_empty_text_completes_immediately() {
    let typewriter = steady_typewriter();
    let input = CellInput::new("keep");
    let outcome = typewriter
        .type_text(Arc::new(input.clone()), "", Duration::ZERO, TypewriterOptions::default())
        .wait()
        .await;

    assert_eq!(outcome, TypingOutcome::Completed);
    assert_eq!(input.text(), "keep");
    assert!(!typewriter.is_typing());
}

#[tokio::test(start_paused = true)]
async fn test_stop_resolves_pending_reveal() {
    let typewriter = steady_typewriter();
    let input = CellInput::default();
    let handle = typewriter.type_text(
        Arc::new(input.clone()),
        "print('hello')",
        Duration::from_millis(1400),
        TypewriterOptions { cursor_char: Some('|') },
    );

    tokio::time::sleep(Duration::from_millis(250)).await;
    typewriter.stop();
    typewriter.stop();

    assert_eq!(handle.wait().await, TypingOutcome::Cancelled);
    assert!(!typewriter.is_typing());
    assert_eq!(input.text(), "pri");
    assert_eq!(input.cursor(), None);

    // Nothing keeps typing after the stop
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(input.text(), "pri");
}

#[tokio::test(start_paused = true)]
async fn test_new_reveal_stops_previous() {
    let typewriter = steady_typewriter();
    let first = CellInput::default();
    let second = CellInput::default();

    let first_handle = typewriter.type_text(
        Arc::new(first.clone()),
        "aaaaaaaa",
        Duration::from_secs(8),
        TypewriterOptions::default(),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second_handle = typewriter.type_text(
        Arc::new(second.clone()),
        "bb",
        Duration::from_millis(200),
        TypewriterOptions::default(),
    );

    assert_eq!(first_handle.wait().await, TypingOutcome::Cancelled);
    assert_eq!(second_handle.wait().await, TypingOutcome::Completed);
    assert_eq!(first.text(), "a");
    assert_eq!(second.text(), "bb");
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_and_resume_continues() {
    let typewriter = steady_typewriter();
    let input = CellInput::default();
    let handle = typewriter.type_text(
        Arc::new(input.clone()),
        "abcd",
        Duration::from_millis(400),
        TypewriterOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    typewriter.pause();
    assert!(typewriter.is_paused());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(input.text(), "ab");

    typewriter.resume();
    assert_eq!(handle.wait().await, TypingOutcome::Completed);
    assert_eq!(input.text(), "abcd");
}

#[tokio::test(start_paused = true)]
async fn test_skip_reveals_remaining_text() {
    let typewriter = steady_typewriter();
    let input = CellInput::new("# ");
    let handle = typewriter.type_text(
        Arc::new(input.clone()),
        "setup",
        Duration::from_secs(5),
        TypewriterOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    typewriter.skip();

    assert_eq!(handle.wait().await, TypingOutcome::Skipped);
    assert_eq!(input.text(), "# setup");
}

#[tokio::test(start_paused = true)]
async fn test_cursor_visible_only_while_typing() {
    let typewriter = steady_typewriter();
    let input = CellInput::default();
    let handle = typewriter.type_text(
        Arc::new(input.clone()),
        "ok",
        Duration::from_millis(200),
        TypewriterOptions { cursor_char: Some('_') },
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(input.display_text(), "o_");

    handle.wait().await;
    assert_eq!(input.display_text(), "ok");
}

#[tokio::test(start_paused = true)]
async fn test_typing_into_notebook_cell() {
    let notebook = NotebookRenderer::default();
    notebook.add_cell("c1", CellKind::Code, "", None);
    let input = notebook.cell_input("c1").expect("cell exists");

    steady_typewriter()
        .type_text(
            Arc::new(input),
            "x=1",
            Duration::from_millis(300),
            TypewriterOptions::default(),
        )
        .wait()
        .await;

    let snapshot = notebook.snapshot();
    assert_eq!(snapshot.cells[0].content, "x=1");
}
