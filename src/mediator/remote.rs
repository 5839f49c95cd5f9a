//! Cast and AirPlay.

use super::Teardown;
use crate::error::Error;
use crate::owners::StateOwners;
use crate::platform::{Listener, MediaEvent, RemoteAvailability, RemoteState};
use crate::state::{Availability, StateValue};
use std::rc::Rc;

pub(super) fn is_casting(owners: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    let casting = owners
        .media
        .as_ref()
        .and_then(|m| m.remote())
        .is_some_and(|r| r.state() != RemoteState::Disconnected);
    StateValue::Bool(casting)
}

/// Prompt for a device when disconnected, or for the session dialog when
/// connected. Requests that would not change anything are ignored.
pub(super) fn set_casting(value: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    let Some(remote) = media.remote() else {
        log::warn!("casting is not supported in this environment");
        return;
    };
    let wanted = value.is_truthy();
    match (wanted, remote.state()) {
        (true, RemoteState::Disconnected) | (false, RemoteState::Connected) => {
            if let Err(err) = remote.prompt() {
                log::debug!("remote playback prompt rejected: {err}");
            }
        }
        _ => {}
    }
}

pub(super) fn is_airplaying(_: &StateOwners, _: Option<&MediaEvent>) -> StateValue {
    StateValue::Bool(false)
}

pub(super) fn show_airplay_picker(_: &StateValue, owners: &StateOwners) {
    let Some(media) = &owners.media else {
        return;
    };
    if !(media.capabilities().airplay_picker && owners.platform.support().airplay) {
        log::error!("received a request to select AirPlay but AirPlay is not supported");
        return;
    }
    if let Err(err) = media.webkit_show_playback_target_picker() {
        log::error!("unable to show the AirPlay picker: {err}");
    }
}

/// Availability pushed by an availability watcher. An event without one
/// counts as "no device".
pub(super) fn cast_unavailable(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    let has_remote = owners.media.as_ref().and_then(|m| m.remote()).is_some();
    if !owners.platform.support().cast || !has_remote {
        return Some(Availability::Unsupported).into();
    }
    let availability = event
        .and_then(|e| e.availability)
        .unwrap_or(RemoteAvailability::NotAvailable);
    match availability {
        RemoteAvailability::Available | RemoteAvailability::NotSupported => StateValue::Unset,
        RemoteAvailability::NotAvailable => Some(Availability::Unavailable).into(),
    }
}

pub(super) fn airplay_unavailable(owners: &StateOwners, event: Option<&MediaEvent>) -> StateValue {
    if !owners.platform.support().airplay {
        return Some(Availability::Unsupported).into();
    }
    match event.and_then(|e| e.availability) {
        Some(RemoteAvailability::NotAvailable) => Some(Availability::Unavailable).into(),
        _ => StateValue::Unset,
    }
}

/// Watch remote playback device availability and push every change. A
/// rejected watch pushes once: unsupported watches count as available.
pub(super) fn watch_availability(push: &Listener, owners: &StateOwners) -> Option<Teardown> {
    let media = owners.media.as_ref()?;
    let remote = media.remote();
    if !media.disable_remote_playback() {
        if let Some(remote) = &remote {
            let notify = push.clone();
            let callback: Rc<dyn Fn(bool)> = Rc::new(move |available: bool| {
                let availability = if available {
                    RemoteAvailability::Available
                } else {
                    RemoteAvailability::NotAvailable
                };
                notify(&MediaEvent::with_availability("availabilitychange", availability));
            });
            if let Err(err) = remote.watch_availability(callback) {
                let availability = match err {
                    Error::NotSupported(_) => RemoteAvailability::NotSupported,
                    _ => RemoteAvailability::NotAvailable,
                };
                push(&MediaEvent::with_availability("availabilitychange", availability));
            }
        }
    }
    Some(Box::new(move || {
        if let Some(remote) = remote {
            if let Err(err) = remote.cancel_watch_availability() {
                log::debug!("cancel availability watch failed: {err}");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessMedia;
    use crate::owners::MediaHandle;
    use crate::platform::{MediaElement, Platform, RemotePlayback};
    use std::cell::RefCell;

    fn owners(media: &Rc<HeadlessMedia>) -> StateOwners {
        let mut owners = StateOwners::new(Rc::new(Platform::new()));
        let element: Rc<dyn MediaElement> = media.clone();
        owners.media = Some(MediaHandle::new(element));
        owners
    }

    #[test]
    fn cast_unavailable_without_remote_is_unsupported() {
        let media = HeadlessMedia::new();
        let o = owners(&media);
        assert_eq!(cast_unavailable(&o, None), StateValue::from("unsupported"));
    }

    #[test]
    fn watcher_pushes_availability() {
        let media = HeadlessMedia::new();
        let remote = media.attach_remote();
        remote.set_devices_available(Some(false));
        let o = owners(&media);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let o2 = o.clone();
        let push: Listener = Rc::new(move |e: &MediaEvent| {
            s.borrow_mut().push(cast_unavailable(&o2, Some(e)));
        });
        let teardown = watch_availability(&push, &o).unwrap();
        remote.set_devices_available(Some(true));
        assert_eq!(
            *seen.borrow(),
            vec![StateValue::from("unavailable"), StateValue::Unset]
        );
        teardown();
        assert!(!remote.is_watching());
    }

    #[test]
    fn unsupported_watch_counts_as_available() {
        let media = HeadlessMedia::new();
        let remote = media.attach_remote();
        remote.set_devices_available(None);
        let o = owners(&media);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let o2 = o.clone();
        let push: Listener = Rc::new(move |e: &MediaEvent| {
            s.borrow_mut().push(cast_unavailable(&o2, Some(e)));
        });
        let _teardown = watch_availability(&push, &o);
        assert_eq!(*seen.borrow(), vec![StateValue::Unset]);
    }

    #[test]
    fn casting_toggles_through_prompt() {
        let media = HeadlessMedia::new();
        let remote = media.attach_remote();
        remote.set_devices_available(Some(true));
        let o = owners(&media);
        set_casting(&StateValue::Bool(true), &o);
        assert_eq!(is_casting(&o, None), StateValue::Bool(true));
        set_casting(&StateValue::Bool(true), &o);
        assert_eq!(remote.state(), RemoteState::Connected);
        set_casting(&StateValue::Bool(false), &o);
        assert_eq!(is_casting(&o, None), StateValue::Bool(false));
    }
}
