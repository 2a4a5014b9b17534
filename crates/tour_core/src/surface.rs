//! Capability interface between the tour and the page it decorates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{DecorationId, ElementHandle, Selector},
    geometry::{Rect, Size, Viewport},
};

use crate::placement::TooltipPlacement;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeCard {
    pub title: String,
    pub body: String,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextLabel {
    Next,
    Finish,
}

/// Content of the callout box shown next to a step's target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipView {
    pub step_index: usize,
    pub icon: String,
    pub title: String,
    pub text: String,
    pub highlight_text: Option<String>,
    /// One entry per progress dot, `true` for the active one.
    pub progress: Vec<bool>,
    pub prev_enabled: bool,
    pub next_label: NextLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoration {
    Overlay,
    Welcome(WelcomeCard),
    /// Frame in document coordinates.
    Spotlight { frame: Rect },
    Tooltip(TooltipView),
    CompletionMessage(CompletionMessage),
}

impl Decoration {
    pub fn kind(&self) -> DecorationKind {
        match self {
            Self::Overlay => DecorationKind::Overlay,
            Self::Welcome(_) => DecorationKind::Welcome,
            Self::Spotlight { .. } => DecorationKind::Spotlight,
            Self::Tooltip(_) => DecorationKind::Tooltip,
            Self::CompletionMessage(_) => DecorationKind::CompletionMessage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Overlay,
    Welcome,
    Spotlight,
    Tooltip,
    CompletionMessage,
}

/// Everything the tour needs from the rendering substrate.
///
/// Queries and mutations are synchronous, as they are on a DOM. The only
/// suspension point is [`PageSurface::transition_end`].
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<ElementHandle>;
    /// Whether the element currently has a rendered box.
    fn is_rendered(&self, element: ElementHandle) -> bool;
    /// Viewport-relative bounding box.
    fn bounding_box(&self, element: ElementHandle) -> Rect;
    fn tag_name(&self, element: ElementHandle) -> String;
    fn has_class(&self, element: ElementHandle, class: &str) -> bool;
    fn click(&self, element: ElementHandle);
    fn scroll_into_view(&self, element: ElementHandle);
    fn viewport(&self) -> Viewport;

    fn mount(&self, decoration: Decoration) -> DecorationId;
    /// Rendered size of a mounted decoration.
    fn measure(&self, id: DecorationId) -> Size;
    fn place(&self, id: DecorationId, placement: &TooltipPlacement);
    fn set_overlay_active(&self, id: DecorationId, active: bool);
    fn unmount(&self, id: DecorationId);

    /// Resolves once a CSS transition on `element` has finished. Surfaces
    /// without such a signal never resolve; callers bound the wait.
    async fn transition_end(&self, _element: ElementHandle) {
        futures::future::pending::<()>().await
    }
}
