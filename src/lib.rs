//! RFox Media
//!
//! A headless media UI state engine for Rust. A [`MediaStore`] observes a
//! media element, the document and a fullscreen target, folds everything
//! into one immutable [`MediaState`] snapshot, and turns user intents into
//! calls on those state owners.
//!
//! # Features
//!
//! - **Store**: declarative facade properties and request handlers, with
//!   NaN-aware change detection and subscriber broadcast
//! - **Propagation**: a [`MediaController`] writes state to descendant UI
//!   elements as attributes or properties and forwards their requests
//! - **Headless owners**: deterministic media, track lists and remote
//!   playback for tests and the CLI
//!
//! # Example
//!
//! ```
//! use rfmedia::{HeadlessMedia, Intent, MediaElement, MediaStore};
//! use std::rc::Rc;
//!
//! let media = HeadlessMedia::new();
//! let owner: Rc<dyn MediaElement> = media.clone();
//! let store = MediaStore::builder().media(owner).build();
//! let subscription = store.subscribe(|state| {
//!     println!("paused: {}", state.paused());
//! });
//!
//! store.dispatch(Intent::play());
//! assert!(!store.get_state().paused());
//! subscription.unsubscribe();
//! ```

pub mod error;
pub use error::{Error, Result};

// Snapshot data model and options
pub mod options;
pub mod state;

// Deterministic event loop
pub mod tasks;

// Text track attribute grammar and track matching
pub mod captions;

// State owner traits and the process-wide environment
pub mod platform;

// In-memory state owners
pub mod headless;

pub mod owners;

// Facade property table
pub mod mediator;

// Request handler table
pub mod requests;

pub mod store;

// Headless DOM, attribute propagation and the controller element
pub mod controller;
pub mod controls;
pub mod dom;
pub mod propagator;

// JSON scenario replay used by the CLI
pub mod scenario;

pub use controller::{press_key, MediaController};
pub use dom::{Document, DomElement, DomEvent, ElementDefinition, EventDetail, KeyPress};
pub use headless::HeadlessMedia;
pub use options::{MediaOptions, OptionsPatch};
pub use platform::{DocumentRoot, Element, EventTarget, MediaElement, MediaEvent, NodeId, Platform};
pub use requests::{Detail, Intent, RequestType};
pub use scenario::{Scenario, ScenarioReport};
pub use state::{MediaState, StateKey, StateValue};
pub use store::{MediaStore, StoreBuilder, Subscription};
pub use tasks::TaskQueue;
