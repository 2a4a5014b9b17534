//! In-memory [`PageSurface`] used by the CLI simulator and by tests.
//!
//! Elements are declared up front with the selectors they answer to. The
//! page models a slide-out drawer: controls with a [`ClickEffect`] open or
//! close it, and elements marked as drawer content only render while it is
//! open. Every interaction is appended to an action log.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{DecorationId, ElementHandle, Layout, Selector},
    geometry::{Rect, Size, Viewport},
};

use crate::{
    placement::TooltipPlacement,
    surface::{Decoration, DecorationKind, PageSurface, TooltipView},
};

const DEFAULT_TOOLTIP_SIZE: Size = Size::new(320.0, 200.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickEffect {
    OpenDrawer,
    CloseDrawer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    pub selectors: Vec<Selector>,
    #[serde(default = "default_tag")]
    pub tag: String,
    pub rect: Rect,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Rendered only while the drawer is open.
    #[serde(default)]
    pub in_drawer: bool,
    /// The drawer panel itself; carries the open class while open.
    #[serde(default)]
    pub drawer_panel: bool,
    /// Rendered only in this layout.
    #[serde(default)]
    pub only_on: Option<Layout>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub on_click: Option<ClickEffect>,
}

fn default_tag() -> String {
    "DIV".into()
}

fn default_true() -> bool {
    true
}

impl ElementSpec {
    pub fn new(selector: impl Into<Selector>, rect: Rect) -> Self {
        Self {
            selectors: vec![selector.into()],
            tag: default_tag(),
            rect,
            visible: true,
            in_drawer: false,
            drawer_panel: false,
            only_on: None,
            classes: Vec::new(),
            on_click: None,
        }
    }

    pub fn also_matches(mut self, selector: impl Into<Selector>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn inside_drawer(mut self) -> Self {
        self.in_drawer = true;
        self
    }

    pub fn drawer_panel(mut self) -> Self {
        self.drawer_panel = true;
        self
    }

    pub fn only_on(mut self, layout: Layout) -> Self {
        self.only_on = Some(layout);
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }
}

/// Serializable description of a page, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFixture {
    pub viewport: Viewport,
    #[serde(default = "default_breakpoint")]
    pub breakpoint_px: f64,
    #[serde(default = "default_tooltip_size")]
    pub tooltip_size: Size,
    #[serde(default)]
    pub drawer_open: bool,
    #[serde(default)]
    pub signals_transitions: bool,
    #[serde(default = "default_open_class")]
    pub drawer_open_class: String,
    pub elements: Vec<ElementSpec>,
}

fn default_breakpoint() -> f64 {
    900.0
}

fn default_tooltip_size() -> Size {
    DEFAULT_TOOLTIP_SIZE
}

fn default_open_class() -> String {
    "open".into()
}

impl PageFixture {
    pub fn empty(viewport: Viewport) -> Self {
        Self {
            viewport,
            breakpoint_px: default_breakpoint(),
            tooltip_size: DEFAULT_TOOLTIP_SIZE,
            drawer_open: false,
            signals_transitions: false,
            drawer_open_class: default_open_class(),
            elements: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read page fixture '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid page fixture '{}'", path.display()))
    }

    /// The Smart Classroom header: desktop navigation, a hamburger toggle and
    /// a slide-out drawer that repeats the navigation on narrow screens.
    pub fn smart_classroom(viewport: Viewport) -> Self {
        let subjects = "nav a[href=\"subjects.html\"]";
        let simulators = "nav a[href=\"simulators.html\"]";
        let mut fixture = Self::empty(viewport);
        fixture.elements = vec![
            ElementSpec::new(".logo", Rect::new(20.0, 15.0, 180.0, 40.0)),
            ElementSpec::new("nav", Rect::new(400.0, 10.0, 700.0, 50.0))
                .also_matches(".desktop-nav")
                .tag("NAV")
                .only_on(Layout::Desktop),
            ElementSpec::new(".desktop-nav .role-switch", Rect::new(880.0, 15.0, 200.0, 40.0))
                .only_on(Layout::Desktop),
            ElementSpec::new(".desktop-nav #role-toggle", Rect::new(1020.0, 20.0, 50.0, 28.0))
                .tag("BUTTON")
                .only_on(Layout::Desktop),
            ElementSpec::new(subjects, Rect::new(420.0, 20.0, 90.0, 30.0))
                .tag("A")
                .only_on(Layout::Desktop),
            ElementSpec::new(simulators, Rect::new(530.0, 20.0, 100.0, 30.0))
                .tag("A")
                .only_on(Layout::Desktop),
            ElementSpec::new("#menu-toggle", Rect::new(viewport.width - 60.0, 15.0, 40.0, 40.0))
                .tag("BUTTON")
                .only_on(Layout::Mobile)
                .on_click(ClickEffect::OpenDrawer),
            ElementSpec::new("#nav-slider", Rect::new(0.0, 0.0, 280.0, viewport.height))
                .drawer_panel()
                .only_on(Layout::Mobile),
            ElementSpec::new("#nav-overlay", Rect::new(0.0, 0.0, viewport.width, viewport.height))
                .inside_drawer()
                .on_click(ClickEffect::CloseDrawer),
            ElementSpec::new("#close-nav-button", Rect::new(230.0, 10.0, 36.0, 36.0))
                .tag("BUTTON")
                .inside_drawer()
                .on_click(ClickEffect::CloseDrawer),
            ElementSpec::new(".slider-content .role-switch", Rect::new(20.0, 80.0, 240.0, 44.0))
                .inside_drawer(),
            ElementSpec::new(".slider-content #role-toggle", Rect::new(190.0, 86.0, 50.0, 28.0))
                .tag("BUTTON")
                .inside_drawer(),
            ElementSpec::new(subjects, Rect::new(20.0, 150.0, 240.0, 40.0))
                .also_matches(".slider-content nav a[href=\"subjects.html\"]")
                .tag("A")
                .inside_drawer(),
            ElementSpec::new(simulators, Rect::new(20.0, 200.0, 240.0, 40.0))
                .also_matches(".slider-content nav a[href=\"simulators.html\"]")
                .tag("A")
                .inside_drawer(),
            ElementSpec::new(
                ".instruction-button, #instruction-button",
                Rect::new(viewport.width - 80.0, viewport.height - 80.0, 56.0, 56.0),
            )
            .tag("BUTTON"),
        ];
        fixture
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    Queried { selector: Selector },
    Clicked { element: ElementHandle },
    ScrolledIntoView { element: ElementHandle },
    Mounted { id: DecorationId, kind: DecorationKind },
    Placed { id: DecorationId, placement: TooltipPlacement },
    OverlayActive { id: DecorationId, active: bool },
    Unmounted { id: DecorationId },
}

#[derive(Debug, Clone)]
struct MountedDecoration {
    decoration: Decoration,
    placement: Option<TooltipPlacement>,
    active: bool,
}

#[derive(Debug)]
struct PageState {
    fixture: PageFixture,
    drawer_open: bool,
    decorations: BTreeMap<DecorationId, MountedDecoration>,
    next_decoration: u64,
    log: Vec<PageAction>,
}

impl PageState {
    fn layout(&self) -> Layout {
        Layout::for_width(self.fixture.viewport.width, self.fixture.breakpoint_px)
    }

    fn element(&self, handle: ElementHandle) -> Option<&ElementSpec> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|index| self.fixture.elements.get(index))
    }
}

pub struct HeadlessPage {
    state: Mutex<PageState>,
}

impl HeadlessPage {
    pub fn new(viewport: Viewport) -> Self {
        Self::from_fixture(PageFixture::empty(viewport))
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        Self {
            state: Mutex::new(PageState {
                drawer_open: fixture.drawer_open,
                fixture,
                decorations: BTreeMap::new(),
                next_decoration: 1,
                log: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, element: ElementSpec) -> ElementHandle {
        let mut state = self.state();
        state.fixture.elements.push(element);
        ElementHandle(state.fixture.elements.len() as u64 - 1)
    }

    pub fn set_signals_transitions(&self, signals: bool) {
        self.state().fixture.signals_transitions = signals;
    }

    pub fn set_drawer_open(&self, open: bool) {
        self.state().drawer_open = open;
    }

    pub fn resize(&self, width: f64, height: f64) {
        let mut state = self.state();
        state.fixture.viewport.width = width;
        state.fixture.viewport.height = height;
    }

    pub fn scroll_to(&self, scroll_x: f64, scroll_y: f64) {
        let mut state = self.state();
        state.fixture.viewport.scroll_x = scroll_x;
        state.fixture.viewport.scroll_y = scroll_y;
    }

    pub fn drawer_open(&self) -> bool {
        self.state().drawer_open
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.state().log.clone()
    }

    pub fn clear_actions(&self) {
        self.state().log.clear();
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.state()
            .log
            .iter()
            .filter_map(|action| match action {
                PageAction::Clicked { element } => Some(*element),
                _ => None,
            })
            .collect()
    }

    /// First handle answering to `selector`, regardless of visibility.
    pub fn handle_of(&self, selector: &str) -> Option<ElementHandle> {
        let state = self.state();
        state
            .fixture
            .elements
            .iter()
            .position(|el| el.selectors.iter().any(|s| s.as_str() == selector))
            .map(|index| ElementHandle(index as u64))
    }

    pub fn mounted(&self, kind: DecorationKind) -> Vec<Decoration> {
        self.state()
            .decorations
            .values()
            .filter(|mounted| mounted.decoration.kind() == kind)
            .map(|mounted| mounted.decoration.clone())
            .collect()
    }

    pub fn mounted_count(&self, kind: DecorationKind) -> usize {
        self.mounted(kind).len()
    }

    pub fn tooltip(&self) -> Option<(TooltipView, Option<TooltipPlacement>)> {
        self.state()
            .decorations
            .values()
            .find_map(|mounted| match &mounted.decoration {
                Decoration::Tooltip(view) => Some((view.clone(), mounted.placement)),
                _ => None,
            })
    }

    pub fn spotlight(&self) -> Option<Rect> {
        self.state()
            .decorations
            .values()
            .find_map(|mounted| match mounted.decoration {
                Decoration::Spotlight { frame } => Some(frame),
                _ => None,
            })
    }

    pub fn overlay_active(&self) -> Option<bool> {
        self.state()
            .decorations
            .values()
            .find(|mounted| mounted.decoration.kind() == DecorationKind::Overlay)
            .map(|mounted| mounted.active)
    }

    /// Number of times decorations of `kind` were mounted over the page's life.
    pub fn mount_events(&self, kind: DecorationKind) -> usize {
        self.state()
            .log
            .iter()
            .filter(|action| matches!(action, PageAction::Mounted { kind: k, .. } if *k == kind))
            .count()
    }
}

#[async_trait]
impl PageSurface for HeadlessPage {
    fn query_all(&self, selector: &Selector) -> Vec<ElementHandle> {
        let mut state = self.state();
        state.log.push(PageAction::Queried {
            selector: selector.clone(),
        });
        state
            .fixture
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.selectors.iter().any(|s| s == selector))
            .map(|(index, _)| ElementHandle(index as u64))
            .collect()
    }

    fn is_rendered(&self, element: ElementHandle) -> bool {
        let state = self.state();
        let layout = state.layout();
        state.element(element).is_some_and(|el| {
            el.visible
                && (!el.in_drawer || state.drawer_open)
                && el.only_on.map_or(true, |only| only == layout)
        })
    }

    fn bounding_box(&self, element: ElementHandle) -> Rect {
        self.state()
            .element(element)
            .map(|el| el.rect)
            .unwrap_or_default()
    }

    fn tag_name(&self, element: ElementHandle) -> String {
        self.state()
            .element(element)
            .map(|el| el.tag.to_ascii_uppercase())
            .unwrap_or_default()
    }

    fn has_class(&self, element: ElementHandle, class: &str) -> bool {
        let state = self.state();
        state.element(element).is_some_and(|el| {
            el.classes.iter().any(|c| c == class)
                || (el.drawer_panel && state.drawer_open && state.fixture.drawer_open_class == class)
        })
    }

    fn click(&self, element: ElementHandle) {
        let mut state = self.state();
        state.log.push(PageAction::Clicked { element });
        let effect = state.element(element).and_then(|el| el.on_click);
        match effect {
            Some(ClickEffect::OpenDrawer) => state.drawer_open = true,
            Some(ClickEffect::CloseDrawer) => state.drawer_open = false,
            None => {}
        }
    }

    fn scroll_into_view(&self, element: ElementHandle) {
        self.state()
            .log
            .push(PageAction::ScrolledIntoView { element });
    }

    fn viewport(&self) -> Viewport {
        self.state().fixture.viewport
    }

    fn mount(&self, decoration: Decoration) -> DecorationId {
        let mut state = self.state();
        let id = DecorationId(state.next_decoration);
        state.next_decoration += 1;
        state.log.push(PageAction::Mounted {
            id,
            kind: decoration.kind(),
        });
        state.decorations.insert(
            id,
            MountedDecoration {
                decoration,
                placement: None,
                active: false,
            },
        );
        id
    }

    fn measure(&self, id: DecorationId) -> Size {
        let state = self.state();
        match state.decorations.get(&id).map(|m| &m.decoration) {
            Some(Decoration::Tooltip(_)) => state.fixture.tooltip_size,
            Some(Decoration::Spotlight { frame }) => frame.size(),
            _ => Size::default(),
        }
    }

    fn place(&self, id: DecorationId, placement: &TooltipPlacement) {
        let mut state = self.state();
        state.log.push(PageAction::Placed {
            id,
            placement: *placement,
        });
        if let Some(mounted) = state.decorations.get_mut(&id) {
            mounted.placement = Some(*placement);
        }
    }

    fn set_overlay_active(&self, id: DecorationId, active: bool) {
        let mut state = self.state();
        state.log.push(PageAction::OverlayActive { id, active });
        if let Some(mounted) = state.decorations.get_mut(&id) {
            mounted.active = active;
        }
    }

    fn unmount(&self, id: DecorationId) {
        let mut state = self.state();
        if state.decorations.remove(&id).is_some() {
            state.log.push(PageAction::Unmounted { id });
        }
    }

    async fn transition_end(&self, _element: ElementHandle) {
        let signals = self.state().fixture.signals_transitions;
        if !signals {
            futures::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawer_content_renders_only_while_open() {
        let page = HeadlessPage::from_fixture(PageFixture::smart_classroom(Viewport::new(
            390.0, 844.0,
        )));
        let toggle = page.handle_of("#menu-toggle").expect("toggle");
        let role_switch = page
            .handle_of(".slider-content .role-switch")
            .expect("role switch");
        let panel = page.handle_of("#nav-slider").expect("panel");

        assert!(!page.is_rendered(role_switch));
        assert!(!page.has_class(panel, "open"));

        page.click(toggle);
        assert!(page.is_rendered(role_switch));
        assert!(page.has_class(panel, "open"));
    }

    #[test]
    fn layout_specific_elements_follow_resize() {
        let page = HeadlessPage::from_fixture(PageFixture::smart_classroom(Viewport::new(
            1280.0, 800.0,
        )));
        let nav = page.handle_of("nav").expect("nav");
        assert!(page.is_rendered(nav));

        page.resize(600.0, 800.0);
        assert!(!page.is_rendered(nav));
    }

    #[test]
    fn unmount_of_unknown_id_is_not_logged() {
        let page = HeadlessPage::new(Viewport::new(800.0, 600.0));
        page.unmount(DecorationId(42));
        assert!(page.actions().is_empty());
    }

    #[test]
    fn fixture_parses_from_json_with_defaults() {
        let raw = r##"{
            "viewport": { "width": 1024, "height": 768 },
            "elements": [
                { "selectors": [".logo"], "rect": { "x": 0, "y": 0, "width": 10, "height": 10 } }
            ]
        }"##;
        let fixture: PageFixture = serde_json::from_str(raw).expect("fixture");
        assert_eq!(fixture.tooltip_size, DEFAULT_TOOLTIP_SIZE);
        assert!(fixture.elements[0].visible);
        assert_eq!(fixture.elements[0].tag, "DIV");
    }
}
