use std::sync::Arc;

use shared::geometry::Viewport;
use storage::{KeyValueStore, MemoryStore, SqliteStore, TOUR_COMPLETED_KEY};
use tour_core::{
    default_steps, headless::PageFixture, DecorationKind, HeadlessPage, Settings, TourController,
    TourPhase,
};

fn page(viewport: Viewport) -> Arc<HeadlessPage> {
    Arc::new(HeadlessPage::from_fixture(PageFixture::smart_classroom(
        viewport,
    )))
}

async fn page_load(
    store: Arc<dyn KeyValueStore>,
    viewport: Viewport,
) -> (TourController, Arc<HeadlessPage>) {
    let page = page(viewport);
    let mut tour = TourController::new(default_steps(), page.clone(), store, Settings::default())
        .expect("controller");
    tour.init().await;
    (tour, page)
}

#[tokio::test(start_paused = true)]
async fn skipped_tour_does_not_restart_after_reload() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let (mut tour, _page) = page_load(store.clone(), Viewport::new(1280.0, 800.0)).await;
    assert_eq!(tour.phase(), TourPhase::Welcome);
    tour.start().await;
    tour.advance().await;
    tour.advance().await;
    assert_eq!(tour.current_step_index(), Some(2));

    tour.skip().await;
    assert!(store.is_flag_set(TOUR_COMPLETED_KEY).await.expect("flag"));

    let (reloaded, reloaded_page) = page_load(store.clone(), Viewport::new(1280.0, 800.0)).await;
    assert_eq!(reloaded.phase(), TourPhase::Completed { skipped: false });
    assert_eq!(reloaded_page.mount_events(DecorationKind::Welcome), 0);
    assert!(reloaded_page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reset_restarts_tour_on_next_load() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let (mut tour, _page) = page_load(store.clone(), Viewport::new(390.0, 844.0)).await;
    tour.skip().await;
    tour.reset().await;

    let (reloaded, reloaded_page) = page_load(store, Viewport::new(390.0, 844.0)).await;
    assert_eq!(reloaded.phase(), TourPhase::Welcome);
    assert_eq!(reloaded_page.mounted_count(DecorationKind::Welcome), 1);
}

#[tokio::test]
async fn completion_flag_persists_in_sqlite_between_sessions() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("tour.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
    let settings = Settings::default().without_delays();

    {
        let store = Arc::new(SqliteStore::new(&database_url).await.expect("db"));
        let page = page(Viewport::new(1280.0, 800.0));
        let mut tour =
            TourController::new(default_steps(), page, store.clone(), settings.clone())
                .expect("controller");
        assert_eq!(tour.init().await, TourPhase::Welcome);
        tour.start().await;
        for _ in 0..default_steps().len() {
            tour.advance().await;
        }
        assert_eq!(tour.phase(), TourPhase::Completed { skipped: false });
        store.pool().close().await;
    }

    let store = Arc::new(SqliteStore::new(&database_url).await.expect("reopen"));
    let mut tour = TourController::new(
        default_steps(),
        page(Viewport::new(1280.0, 800.0)),
        store,
        settings,
    )
    .expect("controller");
    assert_eq!(tour.init().await, TourPhase::Completed { skipped: false });
}
