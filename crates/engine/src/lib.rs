//! Data binding engine: live, per-widget fetch snapshots.
//!
//! Each widget gets a binding that polls its endpoint on the widget's own
//! cadence, coalesces concurrent fetches into one request, and publishes a
//! [`FetchSnapshot`] that keeps the last good data through transient
//! failures. The engine follows a [`pulseboard_store::WidgetStore`] so
//! bindings start and stop as widgets are added, edited, and removed.

mod binding;
pub mod config;
pub mod engine;
pub mod events;
pub mod snapshot;

pub use config::EngineConfig;
pub use engine::{BindingEngine, EngineError, WidgetView};
pub use events::EngineEvent;
pub use snapshot::{FetchPhase, FetchSnapshot};
