//! # show-state
//!
//! Device state for a running show and the events that describe it.
//!
//! Decoded device messages flow through a [`Projector`], which updates the
//! shared [`StateStore`] and yields [`ShowEvent`]s for an [`EventSink`].
//!
//! ```rust
//! use osc_codec::Message;
//! use show_state::{Projector, ShowEvent, StateStore};
//!
//! let projector = Projector::new(StateStore::new());
//! let fader = Message::new(["ch", "05", "mix", "fader"]).with_arg(0.6667f32);
//!
//! let events = projector.mixer(&fader, Some(5));
//! assert_eq!(events, vec![ShowEvent::LevelChanged { value: 0.667 }]);
//! assert_eq!(projector.store().snapshot().mixer.level, Some(0.667));
//! ```

pub mod error;
pub mod event;
pub mod logging;
pub mod meter;
pub mod projection;
pub mod sink;
pub mod store;

pub use error::{Result, StateError};
pub use event::{Cue, DeviceKind, ShowEvent, TimerPhase, TimerValue};
pub use meter::{MeterBlob, MeterTap};
pub use projection::Projector;
pub use sink::{EventSink, FnSink, NullSink};
pub use store::{ShowState, StateChange, StateStore};
