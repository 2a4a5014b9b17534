use shared::{
    domain::{ElementHandle, Layout, Selector, Step},
    error::TourError,
};

use crate::surface::PageSurface;

/// Picks the element a step anchors on.
///
/// The same selector may match a desktop and a mobile copy of a control, so
/// only a rendered match counts. The fallback selector is tried when the
/// primary one has no rendered match.
pub fn resolve_target<S: PageSurface + ?Sized>(
    surface: &S,
    step: &Step,
    index: usize,
    layout: Layout,
) -> Result<ElementHandle, TourError> {
    let primary = step.target_for(layout);
    first_rendered(surface, primary)
        .or_else(|| {
            step.fallback_target
                .as_ref()
                .and_then(|fallback| first_rendered(surface, fallback))
        })
        .ok_or_else(|| TourError::target_not_found(index, primary))
}

pub fn first_rendered<S: PageSurface + ?Sized>(
    surface: &S,
    selector: &Selector,
) -> Option<ElementHandle> {
    surface
        .query_all(selector)
        .into_iter()
        .find(|element| surface.is_rendered(*element))
}
