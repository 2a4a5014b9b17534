//! Spotlight and tooltip lifecycle for the current step.

use shared::{
    domain::{DecorationId, ElementHandle, Layout, Step},
    geometry::{Rect, Viewport},
};

use crate::{
    placement::{place_tooltip, PlacementMetrics, TooltipPlacement},
    surface::{Decoration, NextLabel, PageSurface, TooltipView},
};

const INTERACTIVE_SPOTLIGHT_PAD: f64 = 10.0;
const DEFAULT_SPOTLIGHT_PAD: f64 = 15.0;

/// Owns at most one spotlight and one tooltip.
#[derive(Debug, Default)]
pub struct DecorationRenderer {
    spotlight: Option<DecorationId>,
    tooltip: Option<DecorationId>,
    metrics: PlacementMetrics,
}

impl DecorationRenderer {
    pub fn new(metrics: PlacementMetrics) -> Self {
        Self {
            spotlight: None,
            tooltip: None,
            metrics,
        }
    }

    pub fn has_decorations(&self) -> bool {
        self.spotlight.is_some() || self.tooltip.is_some()
    }

    pub fn clear_step<S: PageSurface + ?Sized>(&mut self, surface: &S) {
        if let Some(id) = self.spotlight.take() {
            surface.unmount(id);
        }
        if let Some(id) = self.tooltip.take() {
            surface.unmount(id);
        }
    }

    /// Decorates `target` for step `index`. Any previous decorations are
    /// removed first.
    pub fn show_step<S: PageSurface + ?Sized>(
        &mut self,
        surface: &S,
        target: ElementHandle,
        steps: &[Step],
        index: usize,
        layout: Layout,
    ) -> TooltipPlacement {
        self.clear_step(surface);
        let step = &steps[index];
        let rect = surface.bounding_box(target);
        let viewport = surface.viewport();

        if step.highlight {
            let frame = spotlight_frame(rect, viewport, &surface.tag_name(target));
            self.spotlight = Some(surface.mount(Decoration::Spotlight { frame }));
        }

        let tooltip = surface.mount(Decoration::Tooltip(tooltip_view(steps, index, layout)));
        self.tooltip = Some(tooltip);

        let placement = place_tooltip(
            rect,
            surface.measure(tooltip),
            step.position,
            viewport,
            layout,
            &self.metrics,
        );
        surface.place(tooltip, &placement);
        placement
    }
}

/// Spotlight rectangle in document coordinates. Links and buttons get a
/// tighter frame than containers.
pub fn spotlight_frame(target: Rect, viewport: Viewport, tag_name: &str) -> Rect {
    let pad = if tag_name.eq_ignore_ascii_case("a") || tag_name.eq_ignore_ascii_case("button") {
        INTERACTIVE_SPOTLIGHT_PAD
    } else {
        DEFAULT_SPOTLIGHT_PAD
    };
    let doc = viewport.to_document(target);
    Rect::new(
        doc.x - pad,
        doc.y - pad,
        doc.width + pad * 2.0,
        doc.height + pad * 2.0,
    )
}

pub fn tooltip_view(steps: &[Step], index: usize, layout: Layout) -> TooltipView {
    let step = &steps[index];
    let dots = steps.iter().filter(|s| !s.optional).count();
    TooltipView {
        step_index: index,
        icon: step.icon.clone(),
        title: step.title.clone(),
        text: step.text_for(layout).to_string(),
        highlight_text: step.highlight_text.clone(),
        progress: (0..dots).map(|dot| dot == index).collect(),
        prev_enabled: index > 0,
        next_label: if index + 1 == steps.len() {
            NextLabel::Finish
        } else {
            NextLabel::Next
        },
    }
}
