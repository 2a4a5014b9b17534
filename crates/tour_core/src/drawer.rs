//! Mobile navigation drawer coordination.

use std::time::Duration;

use shared::domain::{ElementHandle, MobileAction, Selector};
use tracing::debug;

use crate::surface::PageSurface;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawerSelectors {
    pub panel: Selector,
    pub overlay: Selector,
    pub open_control: Selector,
    pub close_control: Selector,
    /// Class the panel carries while open.
    pub open_class: String,
}

impl Default for DrawerSelectors {
    fn default() -> Self {
        Self {
            panel: Selector::from("#nav-slider"),
            overlay: Selector::from("#nav-overlay"),
            open_control: Selector::from("#menu-toggle"),
            close_control: Selector::from("#close-nav-button"),
            open_class: "open".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerOutcome {
    /// Panel or open control missing; nothing was touched.
    Unavailable,
    AlreadyInState,
    Opened,
    Closed,
    /// Open drawer with neither a close control nor an overlay to click.
    NoCloseControl,
}

#[derive(Debug, Clone)]
pub struct DrawerCoordinator {
    selectors: DrawerSelectors,
    settle_delay: Duration,
}

impl DrawerCoordinator {
    pub fn new(selectors: DrawerSelectors, settle_delay: Duration) -> Self {
        Self {
            selectors,
            settle_delay,
        }
    }

    pub fn is_open<S: PageSurface + ?Sized>(&self, surface: &S) -> bool {
        self.find(surface, &self.selectors.panel)
            .is_some_and(|panel| surface.has_class(panel, &self.selectors.open_class))
    }

    /// Brings the drawer into the state `action` expects. Never fails; a page
    /// without a drawer is left alone.
    pub async fn apply<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        action: MobileAction,
    ) -> DrawerOutcome {
        let (Some(panel), Some(open_control)) = (
            self.find(surface, &self.selectors.panel),
            self.find(surface, &self.selectors.open_control),
        ) else {
            debug!(?action, "drawer controls absent; skipping drawer action");
            return DrawerOutcome::Unavailable;
        };

        let is_open = surface.has_class(panel, &self.selectors.open_class);

        let outcome = match action {
            MobileAction::OpenMenu | MobileAction::KeepMenuOpen => {
                if is_open {
                    DrawerOutcome::AlreadyInState
                } else {
                    surface.click(open_control);
                    self.settle(surface, panel).await;
                    DrawerOutcome::Opened
                }
            }
            MobileAction::CloseMenu => {
                if !is_open {
                    DrawerOutcome::AlreadyInState
                } else if let Some(dismiss) = self
                    .find(surface, &self.selectors.close_control)
                    .or_else(|| self.find(surface, &self.selectors.overlay))
                {
                    surface.click(dismiss);
                    self.settle(surface, panel).await;
                    DrawerOutcome::Closed
                } else {
                    DrawerOutcome::NoCloseControl
                }
            }
        };

        debug!(?action, ?outcome, "drawer action applied");
        outcome
    }

    async fn settle<S: PageSurface + ?Sized>(&self, surface: &S, panel: ElementHandle) {
        if tokio::time::timeout(self.settle_delay, surface.transition_end(panel))
            .await
            .is_err()
        {
            debug!(
                settle_ms = self.settle_delay.as_millis() as u64,
                "drawer transition not signalled; settle delay elapsed"
            );
        }
    }

    fn find<S: PageSurface + ?Sized>(&self, surface: &S, selector: &Selector) -> Option<ElementHandle> {
        surface.query_all(selector).into_iter().next()
    }
}
