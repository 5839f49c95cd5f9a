use rfmedia::controls::{Activatable, Control, PlayButton, TimeRange, VolumeRange};
use rfmedia::propagator::{REGISTER_RECEIVER, UNREGISTER_RECEIVER};
use rfmedia::{
    Document, DocumentRoot, DomEvent, ElementDefinition, HeadlessMedia, MediaController,
    MediaElement, Platform, TaskQueue,
};
use std::rc::Rc;

struct Page {
    tasks: TaskQueue,
    doc: Rc<Document>,
    controller: Rc<MediaController>,
    media: Rc<HeadlessMedia>,
}

fn page() -> Page {
    let tasks = TaskQueue::new();
    let platform = Rc::new(Platform::new().with_tasks(tasks.clone()));
    let doc = Document::new(tasks.clone());
    let controller = MediaController::new(&doc, platform).unwrap();
    let root: Rc<dyn DocumentRoot> = doc.clone();
    let media = HeadlessMedia::new();
    media.set_document(&root);
    let element: Rc<dyn MediaElement> = media.clone();
    controller.set_media(Some(element)).unwrap();
    doc.append_child(doc.id(), controller.element()).unwrap();
    tasks.run_until_idle();
    Page {
        tasks,
        doc,
        controller,
        media,
    }
}

#[test]
fn appended_controls_receive_the_snapshot() {
    let p = page();
    let button = PlayButton::create(&p.doc).unwrap();
    p.doc.append_child(p.controller.element(), button.id()).unwrap();
    p.tasks.run_until_idle();

    assert!(p.controller.receivers().contains(button.id()));
    assert_eq!(button.element().attribute("mediapaused").as_deref(), Some(""));

    p.media.play().unwrap();
    assert_eq!(button.element().attribute("mediapaused"), None);
}

#[test]
fn state_keys_are_serialized_per_shape() {
    let p = page();
    let range = TimeRange::create(&p.doc).unwrap();
    p.doc.append_child(p.controller.element(), range.id()).unwrap();
    p.tasks.run_until_idle();

    p.media.load_metadata(90.0);
    p.media.set_seekable(Some(vec![(0.0, 90.0)]));
    p.media.set_buffered(vec![(0.0, 12.5), (30.0, 45.0)]);
    p.media.tick(30.0);

    let el = range.element();
    assert_eq!(el.attribute("mediaduration").as_deref(), Some("90"));
    assert_eq!(el.attribute("mediaseekable").as_deref(), Some("0:90"));
    assert_eq!(el.attribute("mediabuffered").as_deref(), Some("0:12.5 30:45"));
    assert_eq!(el.attribute("mediacurrenttime").as_deref(), Some("30"));
    assert_eq!(range.value(), 30.0 / 90.0);
    // not observed by the range
    assert_eq!(el.attribute("mediavolume"), None);
}

#[test]
fn removed_controls_stop_receiving() {
    let p = page();
    let volume = VolumeRange::create(&p.doc).unwrap();
    p.doc.append_child(p.controller.element(), volume.id()).unwrap();
    p.tasks.run_until_idle();
    assert_eq!(volume.element().attribute("mediavolume").as_deref(), Some("1"));

    p.doc.remove(volume.id());
    p.tasks.run_until_idle();
    assert!(!p.controller.receivers().contains(volume.id()));

    p.media.set_volume(0.3);
    assert_eq!(volume.element().attribute("mediavolume").as_deref(), Some("1"));
}

#[test]
fn undefined_containers_are_walked_once_defined() {
    let p = page();
    let bar = p.doc.create_element("media-control-bar");
    let button = PlayButton::create(&p.doc).unwrap();
    p.doc.append_child(bar, button.id()).unwrap();
    p.doc.append_child(p.controller.element(), bar).unwrap();
    p.tasks.run_until_idle();
    assert!(!p.controller.receivers().contains(button.id()));
    assert_eq!(button.element().attribute("mediapaused"), None);

    p.doc
        .define("media-control-bar", ElementDefinition::new())
        .unwrap();
    p.tasks.run_until_idle();
    assert!(p.controller.receivers().contains(button.id()));
    assert_eq!(button.element().attribute("mediapaused").as_deref(), Some(""));
}

#[test]
fn declared_attributes_opt_plain_elements_in() {
    let p = page();
    let label = p.doc.create_element("div");
    p.doc
        .set_attribute(label, "mediachromeattributes", "mediamuted mediavolumelevel bogus");
    p.doc.append_child(p.controller.element(), label).unwrap();
    p.tasks.run_until_idle();
    assert!(p.controller.receivers().contains(label));
    assert_eq!(p.doc.attribute(label, "mediavolumelevel").as_deref(), Some("high"));

    p.media.set_muted(true);
    assert_eq!(p.doc.attribute(label, "mediamuted").as_deref(), Some(""));
    assert_eq!(p.doc.attribute(label, "mediavolumelevel").as_deref(), Some("off"));
    assert_eq!(p.doc.attribute(label, "bogus"), None);
}

#[test]
fn registration_events_opt_in_and_out() {
    let p = page();
    let outside = p.doc.create_element("div");
    p.doc.append_child(p.doc.id(), outside).unwrap();
    let range = VolumeRange::create(&p.doc).unwrap();
    p.doc.append_child(outside, range.id()).unwrap();
    p.tasks.run_until_idle();
    assert!(!p.controller.receivers().contains(range.id()));

    p.controller.associate_element(outside).unwrap();
    assert!(p.controller.receivers().contains(range.id()));

    p.doc
        .dispatch(&DomEvent::bubbling(UNREGISTER_RECEIVER, range.id()));
    assert!(!p.controller.receivers().contains(range.id()));
    p.doc
        .dispatch(&DomEvent::bubbling(REGISTER_RECEIVER, range.id()));
    assert!(p.controller.receivers().contains(range.id()));

    p.controller.unassociate_element(outside);
    assert!(!p.controller.receivers().contains(range.id()));
}

#[test]
fn requests_from_associated_elements_reach_the_store() {
    let p = page();
    let outside = p.doc.create_element("div");
    p.doc.append_child(p.doc.id(), outside).unwrap();
    let button = PlayButton::create(&p.doc).unwrap();
    p.doc.append_child(outside, button.id()).unwrap();
    p.controller.associate_element(outside).unwrap();

    button.element().set_attribute("mediapaused", "");
    button.click();
    assert!(!p.media.paused());

    p.controller.unassociate_element(outside);
    p.tasks.run_until_idle();
    p.media.pause();
    button.element().set_attribute("mediapaused", "");
    button.click();
    assert!(p.media.paused());
}

#[test]
fn disconnected_receivers_get_writes_on_the_next_microtask() {
    let p = page();
    let detached = p.doc.create_element("div");
    p.doc.set_attribute(detached, "mediachromeattributes", "mediamuted");
    p.controller.register_receiver(detached);
    p.media.set_muted(true);
    assert_eq!(p.doc.attribute(detached, "mediamuted"), None);
    p.tasks.run_until_idle();
    assert_eq!(p.doc.attribute(detached, "mediamuted").as_deref(), Some(""));
}
