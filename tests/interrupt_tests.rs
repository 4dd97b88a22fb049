use guided_tutor::interrupt::InterruptRegistry;

#[test]
fn test_interrupt_cancels_running_command_only() {
    let interrupts = InterruptRegistry::new();
    let shutdown = interrupts.shutdown();

    let cancel = interrupts.begin();
    assert!(!interrupts.interrupt());
    assert!(cancel.is_cancelled());
    assert!(!shutdown.is_cancelled());

    // The next command gets a fresh token.
    let next = interrupts.begin();
    assert!(!next.is_cancelled());
    interrupts.finish();
    assert!(!next.is_cancelled());
}

#[test]
fn test_interrupt_at_idle_prompt_shuts_down() {
    let interrupts = InterruptRegistry::new();
    let shutdown = interrupts.shutdown();
    assert!(interrupts.interrupt());
    assert!(shutdown.is_cancelled());

    let interrupts = InterruptRegistry::new();
    let cancel = interrupts.begin();
    interrupts.finish();
    assert!(interrupts.interrupt());
    assert!(!cancel.is_cancelled());
    assert!(interrupts.shutdown().is_cancelled());
}

#[tokio::test]
async fn test_shutdown_wakes_a_waiting_prompt() {
    let interrupts = std::sync::Arc::new(InterruptRegistry::new());
    let shutdown = interrupts.shutdown();
    let waiter = tokio::spawn(async move { shutdown.cancelled().await });
    interrupts.interrupt();
    waiter.await.unwrap();
}
