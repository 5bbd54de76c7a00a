use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio_courier::{Event, EventCoordinator, HandlerTable, Notice, Subscriber, Variant};

#[derive(Debug, Clone)]
struct Custom {
    t: i64,
}

impl Variant for Custom {
    fn variant_name() -> &'static str {
        "Custom"
    }
}

/// Stands in for a screen with a progress bar and a label
#[derive(Default)]
struct Screen {
    progress: AtomicI64,
}

impl Subscriber for Screen {
    fn handlers(table: &mut HandlerTable<Self>) {
        table
            .on::<Notice, _>("on_event", |screen, event| {
                match event.number() {
                    Some(_) => {
                        screen.progress.store(event.int(), Ordering::SeqCst);
                        println!("📨 {} -> progress {}%", event, event.int());
                    }
                    None => println!("📨 {} -> done", event),
                }
                Ok(())
            })
            .on::<Custom, _>("on_custom", |_screen, event| {
                println!("📨 custom event with t = {}", event.variant().t);
                Ok(())
            });
    }
}

const LONG_TASK: &str = "TASK-2";

fn long_task(coordinator: EventCoordinator) {
    println!("{}: starting...", LONG_TASK);
    thread::sleep(Duration::from_millis(800));
    println!("{}: finishing...", LONG_TASK);
    let _ = Event::to::<Screen>().with_number(2).post(&coordinator);
}

fn progress_task(coordinator: EventCoordinator) {
    coordinator.invalidate_for::<Screen>();

    for i in 0..=100 {
        thread::sleep(Duration::from_millis(10));
        let _ = Event::to::<Screen>()
            .latest_only()
            .with_number(i)
            .post(&coordinator);
    }

    let _ = Event::to::<Screen>()
        .variant(Custom { t: 11 })
        .post(&coordinator);
}

fn resume(coordinator: &EventCoordinator, screen: &Arc<Screen>) -> tokio_courier::Result<()> {
    let poster = coordinator.clone();
    if !coordinator.execute_if_idle(move || long_task(poster), LONG_TASK)? {
        println!("{} is still running, no need to start a new one", LONG_TASK);
    }
    coordinator.subscribe(screen)
}

#[tokio::main]
async fn main() -> tokio_courier::Result<()> {
    println!("Testing tokio-courier...\n");

    let coordinator = EventCoordinator::builder().build()?;
    let screen = Arc::new(Screen::default());

    resume(&coordinator, &screen)?;

    // "Button click": start reporting progress
    let poster = coordinator.clone();
    coordinator.execute(move || progress_task(poster))?;

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Screen goes to the background; progress keeps being posted
    coordinator.unsubscribe(&screen);
    println!("\n⏸  paused at {}%", screen.progress.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(400)).await;
    println!(
        "pending while paused: {} (latest only kept)\n",
        coordinator.pending_len()
    );

    // Back in the foreground: only the latest progress is delivered
    resume(&coordinator, &screen)?;

    while coordinator.is_running(LONG_TASK) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_millis(800)).await;

    coordinator.unsubscribe(&screen);
    coordinator.shutdown()?;

    println!("\n✅ Demo completed successfully!");
    Ok(())
}
