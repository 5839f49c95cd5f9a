use criterion::{criterion_group, criterion_main, Criterion};
use rfmedia::controls::{Control, PlayButton, TimeRange, VolumeRange};
use rfmedia::{
    Document, DocumentRoot, HeadlessMedia, Intent, MediaController, MediaElement, MediaState,
    MediaStore, Platform, TaskQueue,
};
use std::rc::Rc;

// Dispatch round trip: request handler, media event, recompute, broadcast.
fn bench_dispatch(c: &mut Criterion) {
    let tasks = TaskQueue::new();
    let platform = Rc::new(Platform::new().with_tasks(tasks.clone()));
    let media = HeadlessMedia::new();
    media.load_metadata(600.0);
    let element: Rc<dyn MediaElement> = media.clone();
    let store = MediaStore::builder().platform(platform).media(element).build();
    let sub = store.subscribe(|_: &MediaState| {});

    let mut time = 0.0;
    c.bench_function("dispatch_seek", |b| {
        b.iter(|| {
            time = (time + 1.0) % 600.0;
            store.dispatch(Intent::seek(time));
        })
    });

    let mut muted = false;
    c.bench_function("dispatch_toggle_mute", |b| {
        b.iter(|| {
            muted = !muted;
            let request = if muted {
                rfmedia::RequestType::Mute
            } else {
                rfmedia::RequestType::Unmute
            };
            store.dispatch(Intent::request(request));
        })
    });
    sub.unsubscribe();
}

// Media events fanned out to a controller with a handful of receivers.
fn bench_propagation(c: &mut Criterion) {
    let tasks = TaskQueue::new();
    let platform = Rc::new(Platform::new().with_tasks(tasks.clone()));
    let doc = Document::new(tasks.clone());
    let controller = MediaController::new(&doc, platform).expect("controller");
    let root: Rc<dyn DocumentRoot> = doc.clone();
    let media = HeadlessMedia::new();
    media.set_document(&root);
    media.load_metadata(600.0);
    let element: Rc<dyn MediaElement> = media.clone();
    controller.set_media(Some(element)).expect("media");
    doc.append_child(doc.id(), controller.element()).expect("append");

    let mut controls = Vec::new();
    for _ in 0..8 {
        let play = PlayButton::create(&doc).expect("play button");
        let range = TimeRange::create(&doc).expect("time range");
        let volume = VolumeRange::create(&doc).expect("volume range");
        for id in [play.id(), range.id(), volume.id()] {
            doc.append_child(controller.element(), id).expect("append control");
        }
        controls.push((play, range, volume));
    }
    tasks.run_until_idle();

    let mut time = 0.0;
    c.bench_function("timeupdate_24_receivers", |b| {
        b.iter(|| {
            time = (time + 0.25) % 600.0;
            media.tick(time);
        })
    });
}

criterion_group!(benches, bench_dispatch, bench_propagation);
criterion_main!(benches);
