use super::*;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{MobileAction, Position, Selector},
    geometry::{Rect, Viewport},
};
use storage::MemoryStore;
use tokio::{sync::Mutex, time::Instant};

use crate::headless::{ElementSpec, PageAction};

const DESKTOP: Viewport = Viewport::new(1280.0, 800.0);
const MOBILE: Viewport = Viewport::new(390.0, 844.0);

#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    completion_writes: AtomicUsize,
}

impl CountingStore {
    fn completion_writes(&self) -> usize {
        self.completion_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if key == TOUR_COMPLETED_KEY {
            self.completion_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("storage unavailable"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(anyhow!("storage unavailable"))
    }
}

fn smart_classroom(viewport: Viewport) -> Arc<HeadlessPage> {
    Arc::new(HeadlessPage::from_fixture(PageFixture::smart_classroom(
        viewport,
    )))
}

fn controller(
    steps: Vec<Step>,
    page: &Arc<HeadlessPage>,
    store: &Arc<CountingStore>,
) -> TourController {
    TourController::new(steps, page.clone(), store.clone(), Settings::default())
        .expect("controller")
}

fn assert_elapsed(started: Instant, expected_ms: u64) {
    let elapsed = started.elapsed();
    let expected = Duration::from_millis(expected_ms);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(5),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

fn assert_single_step_decoration(page: &HeadlessPage) {
    assert!(page.mounted_count(DecorationKind::Spotlight) <= 1);
    assert!(page.mounted_count(DecorationKind::Tooltip) <= 1);
}

#[test]
fn rejects_empty_catalog() {
    let page = smart_classroom(DESKTOP);
    let result = TourController::new(
        Vec::new(),
        page,
        Arc::new(MemoryStore::new()),
        Settings::default(),
    );
    assert!(matches!(result, Err(TourError::EmptyCatalog)));
}

#[tokio::test(start_paused = true)]
async fn fresh_session_shows_welcome_after_delay() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);

    let started = Instant::now();
    assert_eq!(tour.init().await, TourPhase::Welcome);
    assert_elapsed(started, 500);

    assert_eq!(page.mounted_count(DecorationKind::Welcome), 1);
    assert_eq!(page.overlay_active(), Some(false));
    assert_eq!(tour.current_step_index(), None);
}

#[tokio::test(start_paused = true)]
async fn completed_flag_suppresses_tour() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    store.set(TOUR_COMPLETED_KEY, FLAG_TRUE).await.expect("seed flag");
    let mut tour = controller(default_steps(), &page, &store);

    assert_eq!(tour.init().await, TourPhase::Completed { skipped: false });
    assert!(page.actions().is_empty());

    tour.start().await;
    tour.skip().await;
    assert_eq!(store.completion_writes(), 1);
    assert!(page.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_activates_overlay_and_decorates_first_step() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.phase(), TourPhase::Step(0));
    assert_eq!(page.mounted_count(DecorationKind::Welcome), 0);
    assert_eq!(page.overlay_active(), Some(true));

    let (view, placement) = page.tooltip().expect("tooltip");
    assert_eq!(view.title, "Welcome to Smart Classroom!");
    assert!(!view.prev_enabled);
    assert_eq!(view.progress.len(), 6);
    let placement = placement.expect("placed");
    assert_eq!(placement.arrow, ArrowSide::Top);
    assert_eq!(placement.top, 75.0);
    assert_eq!(placement.left, 10.0);

    // Logo is a container, so the spotlight uses the wide padding.
    assert_eq!(page.spotlight(), Some(Rect::new(5.0, 0.0, 210.0, 70.0)));
}

#[tokio::test(start_paused = true)]
async fn advancing_n_times_reaches_min_index_or_completion() {
    let steps = default_steps();
    let n = steps.len();

    for advances in 0..=n {
        let page = smart_classroom(DESKTOP);
        let store = Arc::new(CountingStore::default());
        let mut tour = controller(steps.clone(), &page, &store);
        tour.init().await;
        tour.start().await;

        for _ in 0..advances {
            tour.advance().await;
            assert_single_step_decoration(&page);
        }

        if advances < n {
            assert_eq!(tour.current_step_index(), Some(advances));
            assert_eq!(store.completion_writes(), 0);
            assert!(tour.renderer.has_decorations());
        } else {
            assert_eq!(tour.phase(), TourPhase::Completed { skipped: false });
            assert_eq!(store.completion_writes(), 1);
            assert_eq!(page.mounted_count(DecorationKind::Tooltip), 0);
            assert_eq!(page.mounted_count(DecorationKind::Spotlight), 0);
            assert_eq!(page.overlay_active(), None);
            assert!(!tour.renderer.has_decorations());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn retreat_at_first_step_is_a_no_op() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    let tooltips_before = page.mount_events(DecorationKind::Tooltip);

    tour.retreat().await;

    assert_eq!(tour.current_step_index(), Some(0));
    assert_eq!(page.mount_events(DecorationKind::Tooltip), tooltips_before);
}

#[tokio::test(start_paused = true)]
async fn retreat_redraws_previous_step() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    tour.advance().await;
    tour.advance().await;

    tour.retreat().await;

    assert_eq!(tour.current_step_index(), Some(1));
    let (view, _) = page.tooltip().expect("tooltip");
    assert_eq!(view.step_index, 1);
    assert_eq!(view.title, "Navigation Menu");
    assert_single_step_decoration(&page);
}

#[tokio::test(start_paused = true)]
async fn skip_persists_flag_exactly_once() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    tour.advance().await;

    tour.skip().await;
    tour.skip().await;
    tour.advance().await;
    tour.retreat().await;

    assert_eq!(tour.phase(), TourPhase::Completed { skipped: true });
    assert_eq!(store.completion_writes(), 1);
    assert!(store.is_flag_set(TOUR_COMPLETED_KEY).await.expect("flag"));
    assert!(!page.actions().is_empty());
    assert!(!tour.renderer.has_decorations());
    assert_eq!(page.mount_events(DecorationKind::CompletionMessage), 1);
}

#[tokio::test(start_paused = true)]
async fn completion_message_is_removed_by_timer_without_blocking() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;

    let started = Instant::now();
    tour.skip().await;
    assert_elapsed(started, 0);
    assert_eq!(page.mounted_count(DecorationKind::CompletionMessage), 1);

    tokio::time::sleep(Duration::from_millis(2400)).await;
    assert_eq!(page.mounted_count(DecorationKind::CompletionMessage), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(page.mounted_count(DecorationKind::CompletionMessage), 0);
}

#[tokio::test(start_paused = true)]
async fn skip_from_welcome_completes_without_showing_steps() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;

    tour.skip().await;

    assert_eq!(tour.phase(), TourPhase::Completed { skipped: true });
    assert_eq!(page.mount_events(DecorationKind::Tooltip), 0);
    assert_eq!(page.mounted_count(DecorationKind::Welcome), 0);
    assert_eq!(page.overlay_active(), None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_skips_complete_once() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    let tour = Mutex::new(tour);

    futures::future::join(
        async { tour.lock().await.skip().await },
        async { tour.lock().await.skip().await },
    )
    .await;

    assert_eq!(
        tour.lock().await.phase(),
        TourPhase::Completed { skipped: true }
    );
    assert_eq!(store.completion_writes(), 1);
    assert_eq!(page.mount_events(DecorationKind::CompletionMessage), 1);
}

#[tokio::test(start_paused = true)]
async fn unresolved_optional_step_is_skipped_without_decorations() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new(".logo", "Logo", "first").highlighted(),
        Step::new("#does-not-exist", "Ghost", "never shown")
            .highlighted()
            .optional(),
        Step::new("nav", "Navigation", "third").highlighted(),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;
    tour.start().await;

    let started = Instant::now();
    tour.advance().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.current_step_index(), Some(2));
    assert_eq!(page.mount_events(DecorationKind::Tooltip), 2);
    assert_eq!(page.mount_events(DecorationKind::Spotlight), 2);
    let (view, _) = page.tooltip().expect("tooltip");
    assert_eq!(view.step_index, 2);
}

#[tokio::test(start_paused = true)]
async fn unresolved_desktop_step_advances_without_retry_delay() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new("#missing", "Missing", "menu-dependent on mobile only")
            .with_mobile_action(MobileAction::OpenMenu),
        Step::new(".logo", "Logo", "found"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.current_step_index(), Some(1));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unresolved_mobile_step_without_drawer_action_skips_retry() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new("#missing", "Missing", "no drawer involved"),
        Step::new(".logo", "Logo", "found"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.current_step_index(), Some(1));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unresolved_close_menu_step_on_mobile_skips_retry() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new("#missing", "Missing", "drawer already closed")
            .with_mobile_action(MobileAction::CloseMenu),
        Step::new(".logo", "Logo", "found"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.current_step_index(), Some(1));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keep_menu_open_step_retries_once_with_drawer_already_open() {
    let page = smart_classroom(MOBILE);
    page.set_drawer_open(true);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new(".slider-content .never-rendered", "Ghost", "missing")
            .with_mobile_action(MobileAction::KeepMenuOpen),
        Step::new(".logo", "Logo", "found"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    // No click or settle, retry (500) + scroll settle for the logo (400)
    assert_elapsed(started, 900);

    assert_eq!(tour.current_step_index(), Some(1));
    assert!(page.clicks().is_empty());
    let ghost_queries = page
        .actions()
        .iter()
        .filter(|action| {
            matches!(action, PageAction::Queried { selector }
                if selector.as_str() == ".slider-content .never-rendered")
        })
        .count();
    assert_eq!(ghost_queries, 2);
}

#[tokio::test(start_paused = true)]
async fn custom_copy_is_shown_on_welcome_card() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut copy = TourCopy::default();
    copy.welcome.title = "Hello, new student".into();
    let mut tour = controller(default_steps(), &page, &store).with_copy(copy);

    tour.init().await;

    match page.mounted(DecorationKind::Welcome).as_slice() {
        [Decoration::Welcome(card)] => assert_eq!(card.title, "Hello, new student"),
        other => panic!("unexpected welcome decorations: {other:?}"),
    }
    assert_eq!(tour.steps().len(), 7);
}

#[tokio::test(start_paused = true)]
async fn unresolved_last_step_completes_tour() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new(".logo", "Logo", "found"),
        Step::new("#missing", "Missing", "not on this page"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;
    tour.start().await;

    tour.advance().await;

    assert_eq!(tour.phase(), TourPhase::Completed { skipped: false });
    assert_eq!(store.completion_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn page_without_any_target_completes_after_one_pass() {
    let page = Arc::new(HeadlessPage::new(DESKTOP));
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;

    tour.start().await;

    assert_eq!(tour.phase(), TourPhase::Completed { skipped: false });
    assert_eq!(page.mount_events(DecorationKind::Tooltip), 0);
    assert_eq!(store.completion_writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn mobile_menu_step_retries_once_then_advances() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let steps = vec![
        Step::new(".slider-content .never-rendered", "Ghost", "missing")
            .with_mobile_action(MobileAction::OpenMenu),
        Step::new(".logo", "Logo", "found"),
    ];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;

    let started = Instant::now();
    tour.start().await;
    // settle (300) + retry (500) + scroll settle for the logo (400)
    assert_elapsed(started, 1200);

    assert_eq!(tour.current_step_index(), Some(1));
    let ghost_queries = page
        .actions()
        .iter()
        .filter(|action| {
            matches!(action, PageAction::Queried { selector }
                if selector.as_str() == ".slider-content .never-rendered")
        })
        .count();
    assert_eq!(ghost_queries, 2);
    assert_eq!(page.clicks(), vec![page.handle_of("#menu-toggle").expect("toggle")]);
}

#[tokio::test(start_paused = true)]
async fn transition_signal_ends_settle_wait_early() {
    let page = smart_classroom(MOBILE);
    page.set_signals_transitions(true);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    tour.advance().await;

    let started = Instant::now();
    tour.advance().await;
    assert_elapsed(started, 400);

    assert_eq!(tour.current_step_index(), Some(2));
    assert!(page.drawer_open());
}

#[tokio::test(start_paused = true)]
async fn narrow_viewport_opens_drawer_before_resolving_role_switch() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    assert_eq!(tour.layout(), Layout::Mobile);
    assert!(!page.drawer_open());
    page.clear_actions();

    tour.go_to(2).await;

    let toggle = page.handle_of("#menu-toggle").expect("toggle");
    let actions = page.actions();
    let click_at = actions
        .iter()
        .position(|a| *a == PageAction::Clicked { element: toggle })
        .expect("open control clicked");
    let resolve_at = actions
        .iter()
        .position(|a| {
            *a == PageAction::Queried {
                selector: Selector::from(".slider-content .role-switch"),
            }
        })
        .expect("target queried");
    assert!(click_at < resolve_at);

    assert_eq!(tour.current_step_index(), Some(2));
    assert!(page.drawer_open());
    let (view, placement) = page.tooltip().expect("tooltip");
    assert_eq!(view.step_index, 2);
    assert_eq!(placement.expect("placed").left, 35.0);
}

#[tokio::test(start_paused = true)]
async fn mobile_tour_opens_then_closes_drawer() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;

    for expected in 1..7 {
        tour.advance().await;
        assert_eq!(tour.current_step_index(), Some(expected));
        assert_single_step_decoration(&page);
    }

    let toggle = page.handle_of("#menu-toggle").expect("toggle");
    let close = page.handle_of("#close-nav-button").expect("close");
    assert_eq!(page.clicks(), vec![toggle, close]);
    assert!(!page.drawer_open());

    tour.advance().await;
    assert_eq!(tour.phase(), TourPhase::Completed { skipped: false });
    assert_eq!(page.clicks().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn skip_with_open_drawer_closes_it() {
    let page = smart_classroom(MOBILE);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.go_to(3).await;
    assert!(page.drawer_open());

    tour.skip().await;

    assert!(!page.drawer_open());
    assert_eq!(tour.phase(), TourPhase::Completed { skipped: true });
}

#[tokio::test(start_paused = true)]
async fn resize_switches_targets_for_following_steps() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    assert_eq!(tour.layout(), Layout::Desktop);

    page.resize(MOBILE.width, MOBILE.height);
    tour.on_resize(MOBILE.width);
    tour.advance().await;

    assert_eq!(tour.layout(), Layout::Mobile);
    let (view, placement) = page.tooltip().expect("tooltip");
    assert!(view.text.starts_with("Tap the menu icon"));
    let placement = placement.expect("placed");
    assert_eq!(placement.left, 35.0);
    assert_eq!(placement.arrow, ArrowSide::Top);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_flag_and_shows_welcome_again() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.skip().await;
    assert!(store.is_flag_set(TOUR_COMPLETED_KEY).await.expect("flag"));

    assert_eq!(tour.reset().await, TourPhase::Welcome);

    assert!(!store.is_flag_set(TOUR_COMPLETED_KEY).await.expect("flag"));
    assert_eq!(page.mounted_count(DecorationKind::Welcome), 1);
    assert_eq!(page.mounted_count(DecorationKind::Overlay), 1);
    assert_eq!(page.mounted_count(DecorationKind::CompletionMessage), 0);

    // The aborted timer must not touch the page afterwards.
    let actions_before = page.actions().len();
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(page.actions().len(), actions_before);
}

#[tokio::test(start_paused = true)]
async fn reset_mid_tour_removes_step_decorations() {
    let page = smart_classroom(DESKTOP);
    let store = Arc::new(CountingStore::default());
    let mut tour = controller(default_steps(), &page, &store);
    tour.init().await;
    tour.start().await;
    tour.advance().await;

    tour.reset().await;

    assert_eq!(page.mounted_count(DecorationKind::Tooltip), 0);
    assert_eq!(page.mounted_count(DecorationKind::Spotlight), 0);
    assert_eq!(page.mounted_count(DecorationKind::Overlay), 1);
    assert_eq!(page.overlay_active(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn store_failures_never_block_the_tour() {
    let page = smart_classroom(DESKTOP);
    let mut tour = TourController::new(
        default_steps(),
        page.clone(),
        Arc::new(FailingStore),
        Settings::default(),
    )
    .expect("controller");

    assert_eq!(tour.init().await, TourPhase::Welcome);
    tour.start().await;
    tour.skip().await;

    assert_eq!(tour.phase(), TourPhase::Completed { skipped: true });
    assert_eq!(page.mounted_count(DecorationKind::Tooltip), 0);
}

#[tokio::test(start_paused = true)]
async fn left_positioned_step_sits_beside_its_target_on_desktop() {
    let page = Arc::new(HeadlessPage::new(DESKTOP));
    page.add(ElementSpec::new("#help", Rect::new(1200.0, 700.0, 56.0, 56.0)).tag("BUTTON"));
    let store = Arc::new(CountingStore::default());
    let steps = vec![Step::new("#help", "Need Help?", "instructions")
        .with_position(Position::Left)
        .highlighted()];
    let mut tour = controller(steps, &page, &store);
    tour.init().await;
    tour.start().await;

    let (view, placement) = page.tooltip().expect("tooltip");
    assert_eq!(view.next_label, crate::surface::NextLabel::Finish);
    let placement = placement.expect("placed");
    assert_eq!(placement.arrow, ArrowSide::Right);
    assert_eq!(placement.left, 1200.0 - 320.0 - 20.0);
    // Vertically centred value (628) exceeds the bottom bound and is clamped.
    assert_eq!(placement.top, 800.0 - 200.0 - 10.0);
    assert_eq!(page.spotlight(), Some(Rect::new(1190.0, 690.0, 76.0, 76.0)));
}
