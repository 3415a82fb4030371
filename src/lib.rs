//! Synheart Calm - On-device biometric-adaptive meditation state engine
//!
//! Calm turns a live heart-rate stream into meditation coaching and keeps
//! track of where the user left off in each guided session:
//! samples → rolling window → state classification → breathing guidance.
//!
//! ## Modules
//!
//! - **Live state**: [`classifier`], [`guidance`] and the [`monitor`] that ties them together
//! - **Simulation**: [`generator`] produces synthetic readings when no sensor is attached
//! - **Persistence**: [`progress`], [`favorites`] and [`feedback`](favorites::FeedbackStore)
//!   built on the [`storage`] key-value boundary

pub mod classifier;
pub mod config;
pub mod error;
pub mod favorites;
pub mod generator;
pub mod guidance;
pub mod monitor;
pub mod progress;
pub mod repository;
pub mod storage;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{classify, StateClassifier};
pub use config::CalmConfig;
pub use error::CalmError;
pub use favorites::{FavoritesStore, FeedbackStore};
pub use generator::{SampleGenerator, StopHandle};
pub use guidance::{guidance_for, guidance_for_label};
pub use monitor::{MeditationMonitor, MonitorUpdate};
pub use progress::ProgressTracker;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    BiometricReading, BreathingGuidance, HeartRateSample, MeditationState, MeditationStateResult,
    Session, SessionProgress,
};

/// Library version
pub const CALM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "synheart-calm";
