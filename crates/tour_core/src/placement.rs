//! Tooltip placement: a pure function from target geometry to document
//! coordinates that keep the tooltip fully inside the viewport.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Layout, Position},
    geometry::{Rect, Size, Viewport},
};

/// Side of the tooltip the pointer arrow is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowSide {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipPlacement {
    pub top: f64,
    pub left: f64,
    pub arrow: ArrowSide,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementMetrics {
    /// Gap between target and tooltip.
    pub padding: f64,
    /// Minimum distance kept from every viewport edge.
    pub safe_margin: f64,
    /// On mobile, targets whose bottom lies within this distance of the
    /// viewport bottom get the tooltip above them.
    pub mobile_bottom_reserve: f64,
}

impl Default for PlacementMetrics {
    fn default() -> Self {
        Self {
            padding: 20.0,
            safe_margin: 10.0,
            mobile_bottom_reserve: 300.0,
        }
    }
}

/// Computes the tooltip's document coordinates.
///
/// `target` is viewport-relative. The result is clamped into
/// `[safe_margin, viewport - tooltip - safe_margin]` on both axes, shifted by
/// the scroll offset. A tooltip larger than the viewport pins to the lower
/// bound.
pub fn place_tooltip(
    target: Rect,
    tooltip: Size,
    position: Position,
    viewport: Viewport,
    layout: Layout,
    metrics: &PlacementMetrics,
) -> TooltipPlacement {
    let padding = metrics.padding;
    let (scroll_x, scroll_y) = (viewport.scroll_x, viewport.scroll_y);

    let (top, left, arrow) = match layout {
        Layout::Mobile => {
            let (top, arrow) = if target.bottom() > viewport.height - metrics.mobile_bottom_reserve
            {
                (
                    target.top() + scroll_y - tooltip.height - padding,
                    ArrowSide::Bottom,
                )
            } else {
                (target.bottom() + scroll_y + padding, ArrowSide::Top)
            };
            (top, scroll_x + (viewport.width - tooltip.width) / 2.0, arrow)
        }
        Layout::Desktop => match position {
            Position::Bottom => (
                target.bottom() + scroll_y + padding,
                target.left() + scroll_x + (target.width - tooltip.width) / 2.0,
                ArrowSide::Top,
            ),
            Position::Top => (
                target.top() + scroll_y - tooltip.height - padding,
                target.left() + scroll_x + (target.width - tooltip.width) / 2.0,
                ArrowSide::Bottom,
            ),
            Position::Left => (
                target.top() + scroll_y + (target.height - tooltip.height) / 2.0,
                target.left() + scroll_x - tooltip.width - padding,
                ArrowSide::Right,
            ),
            Position::Right => (
                target.top() + scroll_y + (target.height - tooltip.height) / 2.0,
                target.right() + scroll_x + padding,
                ArrowSide::Left,
            ),
        },
    };

    TooltipPlacement {
        top: clamp_axis(top, scroll_y, viewport.height, tooltip.height, metrics.safe_margin),
        left: clamp_axis(left, scroll_x, viewport.width, tooltip.width, metrics.safe_margin),
        arrow,
    }
}

// `f64::clamp` panics when min > max, which happens for oversized tooltips.
fn clamp_axis(value: f64, scroll: f64, extent: f64, size: f64, margin: f64) -> f64 {
    let min = margin + scroll;
    let max = extent - size - margin + scroll;
    value.min(max).max(min)
}
