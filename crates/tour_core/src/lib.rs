use std::sync::Arc;

use shared::{
    domain::{DecorationId, Layout, MobileAction, Step},
    error::TourError,
};
use storage::{KeyValueStore, FLAG_TRUE, TOUR_COMPLETED_KEY};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod config;
pub mod drawer;
pub mod headless;
pub mod placement;
pub mod render;
pub mod resolver;
pub mod role;
pub mod steps;
pub mod surface;

pub use config::{load_settings, Settings};
pub use drawer::{DrawerCoordinator, DrawerOutcome, DrawerSelectors};
pub use headless::{HeadlessPage, PageFixture};
pub use placement::{place_tooltip, ArrowSide, PlacementMetrics, TooltipPlacement};
pub use render::DecorationRenderer;
pub use resolver::resolve_target;
pub use role::{RoleChanged, RoleSwitcher};
pub use steps::{default_steps, load_steps, TourCopy};
pub use surface::{Decoration, DecorationKind, PageSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourPhase {
    NotStarted,
    Welcome,
    Step(usize),
    /// Terminal. `skipped` is false both for a finished tour and for one
    /// completed in an earlier session.
    Completed { skipped: bool },
}

impl TourPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Welcome | Self::Step(_))
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Walks a first-time visitor through the step catalog.
///
/// The controller is the only owner of tour decorations and, besides the
/// visitor, the only writer of drawer state. Operations take `&mut self`;
/// hosts that dispatch UI events concurrently wrap it in a
/// `tokio::sync::Mutex` so a transition finishes before the next begins.
pub struct TourController {
    steps: Vec<Step>,
    surface: Arc<dyn PageSurface>,
    store: Arc<dyn KeyValueStore>,
    settings: Settings,
    copy: TourCopy,
    drawer: DrawerCoordinator,
    renderer: DecorationRenderer,
    phase: TourPhase,
    layout: Layout,
    overlay: Option<DecorationId>,
    welcome: Option<DecorationId>,
    completion_message: Option<(DecorationId, JoinHandle<()>)>,
}

impl TourController {
    pub fn new(
        steps: Vec<Step>,
        surface: Arc<dyn PageSurface>,
        store: Arc<dyn KeyValueStore>,
        settings: Settings,
    ) -> Result<Self, TourError> {
        if steps.is_empty() {
            return Err(TourError::EmptyCatalog);
        }

        let layout = Layout::for_width(surface.viewport().width, settings.breakpoint_px);
        Ok(Self {
            steps,
            drawer: DrawerCoordinator::new(settings.drawer.clone(), settings.settle_delay),
            renderer: DecorationRenderer::new(settings.placement),
            surface,
            store,
            settings,
            copy: TourCopy::default(),
            phase: TourPhase::NotStarted,
            layout,
            overlay: None,
            welcome: None,
            completion_message: None,
        })
    }

    pub fn with_copy(mut self, copy: TourCopy) -> Self {
        self.copy = copy;
        self
    }

    pub fn phase(&self) -> TourPhase {
        self.phase
    }

    pub fn current_step_index(&self) -> Option<usize> {
        match self.phase {
            TourPhase::Step(index) => Some(index),
            _ => None,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Reads the completion flag and, for a first visit, shows the welcome
    /// card. Returns the resulting phase.
    pub async fn init(&mut self) -> TourPhase {
        if self.phase != TourPhase::NotStarted {
            debug!(phase = ?self.phase, "tour already initialised");
            return self.phase;
        }

        let completed = match self.store.is_flag_set(TOUR_COMPLETED_KEY).await {
            Ok(completed) => completed,
            Err(err) => {
                warn!(error = %err, "failed reading tour completion flag; treating as unset");
                false
            }
        };

        if completed {
            info!("tour completed in an earlier session; not starting");
            self.phase = TourPhase::Completed { skipped: false };
            return self.phase;
        }

        tokio::time::sleep(self.settings.welcome_delay).await;
        self.ensure_overlay();
        self.welcome = Some(
            self.surface
                .mount(Decoration::Welcome(self.copy.welcome.clone())),
        );
        self.phase = TourPhase::Welcome;
        info!(steps = self.steps.len(), layout = ?self.layout, "tour welcome shown");
        self.phase
    }

    pub async fn start(&mut self) {
        if !matches!(self.phase, TourPhase::NotStarted | TourPhase::Welcome) {
            debug!(phase = ?self.phase, "ignoring start");
            return;
        }

        if let Some(id) = self.welcome.take() {
            self.surface.unmount(id);
        }
        let overlay = self.ensure_overlay();
        self.surface.set_overlay_active(overlay, true);
        info!("tour started");
        self.show_step(0).await;
    }

    pub async fn advance(&mut self) {
        let TourPhase::Step(index) = self.phase else {
            debug!(phase = ?self.phase, "ignoring advance");
            return;
        };

        if index + 1 < self.steps.len() {
            self.show_step(index + 1).await;
        } else {
            self.complete(false).await;
        }
    }

    pub async fn retreat(&mut self) {
        match self.phase {
            TourPhase::Step(index) if index > 0 => self.show_step(index - 1).await,
            phase => debug!(?phase, "ignoring retreat"),
        }
    }

    pub async fn skip(&mut self) {
        if !self.phase.is_active() {
            debug!(phase = ?self.phase, "ignoring skip");
            return;
        }
        info!(phase = ?self.phase, "tour skipped");
        self.complete(true).await;
    }

    /// Jumps to `index` while the tour is showing the welcome card or a step.
    pub async fn go_to(&mut self, index: usize) {
        if !self.phase.is_active() || index >= self.steps.len() {
            debug!(phase = ?self.phase, index, "ignoring go_to");
            return;
        }
        if let Some(id) = self.welcome.take() {
            self.surface.unmount(id);
        }
        let overlay = self.ensure_overlay();
        self.surface.set_overlay_active(overlay, true);
        self.show_step(index).await;
    }

    /// Recomputes the layout. Steps already on screen keep their decorations.
    pub fn on_resize(&mut self, width: f64) {
        let layout = Layout::for_width(width, self.settings.breakpoint_px);
        if layout != self.layout {
            debug!(from = ?self.layout, to = ?layout, "tour layout changed");
            self.layout = layout;
        }
    }

    /// Clears the completion flag, tears everything down and shows the
    /// welcome card again.
    pub async fn reset(&mut self) -> TourPhase {
        if let Err(err) = self.store.remove(TOUR_COMPLETED_KEY).await {
            warn!(error = %err, "failed clearing tour completion flag");
        }
        self.teardown();
        self.phase = TourPhase::NotStarted;
        info!("tour reset");
        self.init().await
    }

    async fn show_step(&mut self, index: usize) {
        let mut index = index;
        loop {
            self.phase = TourPhase::Step(index);
            self.renderer.clear_step(self.surface.as_ref());

            let step = &self.steps[index];
            let action = step.drawer_action(self.layout);
            if let Some(action) = action {
                self.drawer.apply(self.surface.as_ref(), action).await;
            }

            let step = &self.steps[index];
            let mut resolved = resolve_target(self.surface.as_ref(), step, index, self.layout);
            if resolved.is_err() && action.is_some_and(|a| a.needs_open_drawer()) {
                tokio::time::sleep(self.settings.menu_retry_delay).await;
                resolved = resolve_target(self.surface.as_ref(), step, index, self.layout);
            }

            match resolved {
                Ok(target) => {
                    self.surface.scroll_into_view(target);
                    tokio::time::sleep(self.settings.scroll_settle_delay).await;
                    let placement = self.renderer.show_step(
                        self.surface.as_ref(),
                        target,
                        &self.steps,
                        index,
                        self.layout,
                    );
                    info!(
                        step = index,
                        title = %self.steps[index].title,
                        top = placement.top,
                        left = placement.left,
                        "tour step shown"
                    );
                    return;
                }
                Err(err) => {
                    if step.optional {
                        debug!(step = index, error = %err, "optional tour step skipped");
                    } else {
                        warn!(step = index, error = %err, "tour step skipped");
                    }
                    if index + 1 < self.steps.len() {
                        index += 1;
                    } else {
                        self.complete(false).await;
                        return;
                    }
                }
            }
        }
    }

    async fn complete(&mut self, skipped: bool) {
        if self.phase.is_completed() {
            return;
        }

        self.renderer.clear_step(self.surface.as_ref());
        if self.layout.is_mobile() {
            self.drawer
                .apply(self.surface.as_ref(), MobileAction::CloseMenu)
                .await;
        }
        self.teardown();

        if let Err(err) = self.store.set(TOUR_COMPLETED_KEY, FLAG_TRUE).await {
            warn!(error = %err, "failed persisting tour completion flag");
        }
        self.phase = TourPhase::Completed { skipped };
        info!(skipped, "tour completed");

        // The message outlives the call; a timer task removes it.
        let message = self
            .surface
            .mount(Decoration::CompletionMessage(self.copy.completion.clone()));
        let surface = Arc::clone(&self.surface);
        let duration = self.settings.completion_message_duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            surface.unmount(message);
        });
        self.completion_message = Some((message, timer));
    }

    fn ensure_overlay(&mut self) -> DecorationId {
        match self.overlay {
            Some(id) => id,
            None => {
                let id = self.surface.mount(Decoration::Overlay);
                self.overlay = Some(id);
                id
            }
        }
    }

    fn teardown(&mut self) {
        self.renderer.clear_step(self.surface.as_ref());
        if let Some(id) = self.overlay.take() {
            self.surface.set_overlay_active(id, false);
            self.surface.unmount(id);
        }
        if let Some(id) = self.welcome.take() {
            self.surface.unmount(id);
        }
        if let Some((id, timer)) = self.completion_message.take() {
            timer.abort();
            self.surface.unmount(id);
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
