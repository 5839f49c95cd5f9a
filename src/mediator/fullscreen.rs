use crate::error::Error;
use crate::owners::StateOwners;
use crate::platform::{Element, MediaEvent};
use crate::state::StateValue;
use std::rc::Rc;

/// Whether the document or the media itself can go fullscreen.
pub fn has_fullscreen_support(owners: &StateOwners) -> bool {
    let document = owners
        .document
        .as_ref()
        .is_some_and(|d| d.fullscreen_enabled());
    let webkit = owners
        .media
        .as_ref()
        .is_some_and(|m| m.capabilities().webkit_fullscreen);
    document || webkit
}

fn current_fullscreen_element(owners: &StateOwners) -> Option<Rc<dyn Element>> {
    if let Some(el) = owners.document.as_ref().and_then(|d| d.fullscreen_element()) {
        return Some(el);
    }
    let media = owners.media.as_ref()?;
    media
        .webkit_displaying_fullscreen()
        .then(|| media.as_element())
}

/// True when the fullscreen target, the media, or a custom element hosting
/// the target is fullscreen.
pub fn is_fullscreen(owners: &StateOwners) -> bool {
    let (Some(media), Some(document)) = (&owners.media, &owners.document) else {
        return false;
    };
    let Some(current) = current_fullscreen_element(owners) else {
        return false;
    };
    let current_id = current.node_id();
    let target_id = owners
        .fullscreen_target_id()
        .unwrap_or_else(|| media.node_id());
    if current_id == target_id || current_id == media.node_id() {
        return true;
    }
    if current.is_custom() {
        return document.contains_composed(current_id, target_id);
    }
    false
}

pub fn enter_fullscreen(owners: &StateOwners) {
    if let Some(el) = &owners.fullscreen_element {
        match el.request_fullscreen() {
            Ok(()) => return,
            Err(Error::NotSupported(_)) => {}
            Err(err) => {
                log::debug!("fullscreen request rejected: {err}");
                return;
            }
        }
    }
    let Some(media) = &owners.media else {
        return;
    };
    let result = if media.capabilities().webkit_fullscreen {
        media.webkit_enter_fullscreen()
    } else {
        media.request_fullscreen()
    };
    if let Err(err) = result {
        log::error!("unable to enter fullscreen: {err}");
    }
}

pub fn exit_fullscreen(owners: &StateOwners) {
    let Some(document) = &owners.document else {
        return;
    };
    if let Err(err) = document.exit_fullscreen() {
        log::debug!("exit fullscreen rejected: {err}");
    }
}

pub(super) fn fullscreen_state(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(is_fullscreen(owners))
}

pub(super) fn set_fullscreen(value: &StateValue, owners: &StateOwners) {
    if value.is_truthy() {
        enter_fullscreen(owners);
    } else {
        exit_fullscreen(owners);
    }
}
