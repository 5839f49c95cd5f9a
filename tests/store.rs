use rfmedia::{
    HeadlessMedia, Intent, MediaElement, MediaState, MediaStore, Platform, StateKey, StateValue,
    TaskQueue,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn setup() -> (TaskQueue, Rc<Platform>) {
    let tasks = TaskQueue::new();
    let platform = Rc::new(Platform::new().with_tasks(tasks.clone()));
    (tasks, platform)
}

fn store_with(platform: &Rc<Platform>, media: &Rc<HeadlessMedia>) -> MediaStore {
    let element: Rc<dyn MediaElement> = media.clone();
    MediaStore::builder()
        .platform(platform.clone())
        .media(element)
        .build()
}

#[test]
fn subscribe_replays_current_state_once() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    media.set_muted(true);
    let store = store_with(&platform, &media);

    let seen = Rc::new(RefCell::new(Vec::<MediaState>::new()));
    let s = seen.clone();
    let sub = store.subscribe(move |state: &MediaState| s.borrow_mut().push(state.clone()));
    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].muted());
    assert_eq!(seen.borrow()[0], store.get_state());
    sub.unsubscribe();
}

#[test]
fn unchanged_values_are_not_broadcast() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    let store = store_with(&platform, &media);
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let sub = store.subscribe(move |_: &MediaState| c.set(c.get() + 1));
    assert_eq!(count.get(), 1);

    store.dispatch(Intent::volume(1.0));
    assert_eq!(count.get(), 1);

    store.dispatch(Intent::volume(0.5));
    assert_eq!(count.get(), 2);
    assert_eq!(store.get_state().volume(), 0.5);
    sub.unsubscribe();
}

#[test]
fn unknown_duration_does_not_rebroadcast() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    let store = store_with(&platform, &media);
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let sub = store.subscribe(move |_: &MediaState| c.set(c.get() + 1));
    media.set_duration(f64::NAN);
    assert_eq!(count.get(), 1);
    sub.unsubscribe();
}

#[test]
fn snapshots_are_frozen() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    let store = store_with(&platform, &media);
    let sub = store.subscribe(|_: &MediaState| {});
    let before = store.get_state();
    media.set_muted(true);
    let after = store.get_state();
    assert!(!before.muted());
    assert!(after.muted());
    assert_ne!(before, after);
    sub.unsubscribe();
}

#[test]
fn reassigning_media_leaves_no_listeners_behind() {
    let (tasks, platform) = setup();
    let a = HeadlessMedia::new();
    let b = HeadlessMedia::new();
    let store = store_with(&platform, &a);
    let sub = store.subscribe(|_: &MediaState| {});
    assert!(a.total_listeners() > 0);

    let next: Rc<dyn MediaElement> = b.clone();
    store.dispatch(Intent::media_change(Some(next)));
    tasks.run_until_idle();

    assert_eq!(a.total_listeners(), 0);
    let (adds, removes) = a.listener_calls();
    assert_eq!(adds, removes);
    assert!(b.total_listeners() > 0);

    b.set_muted(true);
    assert!(store.get_state().muted());
    sub.unsubscribe();
    assert_eq!(b.total_listeners(), 0);
}

#[test]
fn clearing_media_resets_to_defaults() {
    let (tasks, platform) = setup();
    let media = HeadlessMedia::new();
    media.set_muted(true);
    let store = store_with(&platform, &media);
    let sub = store.subscribe(|_: &MediaState| {});
    store.dispatch(Intent::media_change(None));
    tasks.run_until_idle();
    assert_eq!(media.total_listeners(), 0);
    assert!(!store.get_state().muted());
    sub.unsubscribe();
}

#[test]
fn undefined_media_waits_for_upgrade() {
    let (tasks, platform) = setup();
    let store = MediaStore::builder().platform(platform.clone()).build();
    let sub = store.subscribe(|_: &MediaState| {});

    let media = HeadlessMedia::undefined("x-player");
    let element: Rc<dyn MediaElement> = media.clone();
    store.dispatch(Intent::media_change(Some(element)));
    tasks.run_until_idle();
    assert!(store.has_pending_reassignment());
    assert_eq!(media.total_listeners(), 0);

    media.upgrade();
    tasks.run_until_idle();
    assert!(!store.has_pending_reassignment());
    assert!(media.total_listeners() > 0);
    sub.unsubscribe();
}

#[test]
fn fatal_errors_block_requests_until_emptied() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    let store = store_with(&platform, &media);
    let sub = store.subscribe(|_: &MediaState| {});

    media.fail(3, "decode failure");
    assert_eq!(store.get_state().get(StateKey::MediaErrorCode), &StateValue::Number(3.0));
    store.dispatch(Intent::play());
    assert!(media.paused());

    media.empty();
    assert!(store.get_state().get(StateKey::MediaErrorCode).is_unset());
    store.dispatch(Intent::play());
    assert!(!media.paused());
    sub.unsubscribe();
}

#[test]
fn unknown_intents_are_ignored() {
    let (_tasks, platform) = setup();
    let media = HeadlessMedia::new();
    let store = store_with(&platform, &media);
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    let sub = store.subscribe(move |_: &MediaState| c.set(c.get() + 1));
    store.dispatch(Intent::new("mediadancerequest"));
    assert_eq!(count.get(), 1);
    sub.unsubscribe();
}
