use crate::owners::{MediaHandle, StateOwners};
use crate::platform::{Listener, MediaElement, MediaEvent};
use crate::state::StateValue;
use std::cell::RefCell;
use std::rc::Rc;

const RETRY_TIMEOUT_MS: u64 = 1000;

pub(super) fn is_pip(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let (Some(media), Some(document)) = (&owners.media, &owners.document) else {
        return StateValue::Bool(false);
    };
    let Some(current) = document.picture_in_picture_element() else {
        return StateValue::Bool(false);
    };
    if current.node_id() == media.node_id() {
        return StateValue::Bool(true);
    }
    // A custom media element may wrap the native one in its shadow tree.
    let wrapped = media.is_custom() && document.contains_composed(media.node_id(), current.node_id());
    StateValue::Bool(wrapped)
}

pub(super) fn set_pip(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    if !value.is_truthy() {
        if let Some(document) = &owners.document {
            if document.picture_in_picture_element().is_some() {
                if let Err(err) = document.exit_picture_in_picture() {
                    log::debug!("exit picture-in-picture rejected: {err}");
                }
            }
        }
        return;
    }

    let enabled = owners.platform.support().picture_in_picture
        && owners
            .document
            .as_ref()
            .map_or(true, |d| d.picture_in_picture_enabled());
    if !enabled {
        log::warn!("picture-in-picture is not enabled");
        return;
    }
    if !media.capabilities().picture_in_picture {
        log::warn!("the current media does not support picture-in-picture");
        return;
    }

    match media.request_picture_in_picture() {
        Ok(()) => {}
        Err(err) if err.is_not_ready() => {
            if media.src().is_empty() {
                log::warn!("media is not ready for picture-in-picture: it must have a src set");
            } else if media.ready_state() == 0 && media.preload() == "none" {
                retry_after_metadata(media, owners);
            } else {
                log::error!("picture-in-picture request failed: {err}");
            }
        }
        Err(err) => log::error!("picture-in-picture request failed: {err}"),
    }
}

fn warn_not_ready() {
    log::warn!("media is not ready for picture-in-picture: it must have a readyState > 0");
}

/// Load metadata for a `preload="none"` media, retry once it arrives, and
/// give up after a second.
fn retry_after_metadata(media: &MediaHandle, owners: &StateOwners) {
    let element: Rc<dyn MediaElement> = media.element().clone();
    let slot: Rc<RefCell<Option<Listener>>> = Rc::new(RefCell::new(None));

    let cleanup = {
        let element = element.clone();
        let slot = slot.clone();
        move || {
            if let Some(listener) = slot.borrow_mut().take() {
                element.remove_event_listener("loadedmetadata", &listener);
            }
            element.set_preload("none");
        }
    };

    let try_pip: Listener = {
        let element = element.clone();
        let cleanup = cleanup.clone();
        Rc::new(move |_: &MediaEvent| {
            if element.request_picture_in_picture().is_err() {
                warn_not_ready();
            }
            cleanup();
        })
    };
    *slot.borrow_mut() = Some(try_pip.clone());

    element.add_event_listener("loadedmetadata", try_pip);
    element.set_preload("metadata");
    owners.platform.tasks().queue_timeout(RETRY_TIMEOUT_MS, move || {
        if element.ready_state() == 0 {
            warn_not_ready();
        }
        cleanup();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;
    use crate::platform::Platform;

    #[test]
    fn unsupported_media_does_not_request() {
        let media = HeadlessMedia::new();
        media.set_capabilities(crate::platform::Capabilities::default());
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        set_pip(&StateValue::Bool(true), &owners);
        assert_eq!(is_pip(&owners, None), StateValue::Bool(false));
    }

    #[test]
    fn preload_none_media_retries_and_restores_preload() {
        let media = HeadlessMedia::new();
        media.load("movie.mp4");
        media.set_preload("none");
        let owners = {
            let mut o = StateOwners::new(Rc::new(Platform::new()));
            let element: Rc<dyn MediaElement> = media.clone();
            o.media = Some(MediaHandle::new(element));
            o
        };
        set_pip(&StateValue::Bool(true), &owners);
        assert_eq!(media.preload(), "metadata");
        assert_eq!(media.listener_count("loadedmetadata"), 1);

        owners.platform.tasks().advance(RETRY_TIMEOUT_MS);
        assert_eq!(media.preload(), "none");
        assert_eq!(media.listener_count("loadedmetadata"), 0);
    }
}
