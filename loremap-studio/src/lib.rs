//! # LoreMap Studio
//!
//! Turns lore, a request and a sketch into battlemaps, locations and
//! characters.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                         Studio                         │
//! ├──────────────────────┬─────────────────────────────────┤
//! │ Store<AppState>      │ CanvasEngine                    │
//! │   ▲ bridge ◄─────────│── commit hook                   │
//! │   ▲ Ticker           │ Store<CanvasState>              │
//! │   └ Autosave ────────│─► SessionStorage                │
//! ├──────────────────────┴─────────────────────────────────┤
//! │ GenerationController ──► SceneGenerator (Gemini)       │
//! │   describe ∥ narrate ──► render × N ──► assets         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`orchestrator`]: job lifecycle, cancellation and image fan-out
//! - [`gemini`]: the REST backend behind [`generator::SceneGenerator`]
//! - [`session`]: wiring for a complete session
//! - [`project`]: project file import and export

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod orchestrator;
pub mod persistence;
pub mod project;
pub mod prompts;
pub mod session;
pub mod speech;
pub mod ticker;

pub use config::StudioConfig;
pub use credentials::{AllowAll, ApiKeyGate, CredentialError, CredentialGate};
pub use error::{
    user_message, GenerationError, GenerationResult, ProjectError, ProjectResult, StorageError,
    StorageResult, StudioError, StudioResult,
};
pub use gemini::GeminiGenerator;
pub use generator::SceneGenerator;
pub use orchestrator::{DeleteTarget, GenerationController, JobOutcome};
pub use persistence::{Autosave, FileSessionStorage, SessionStorage};
pub use project::{export_file_name, ProjectDocument};
pub use session::{Studio, StudioDeps};
pub use speech::{SpeechAdapter, SpeechError, SpeechRecognizer};
pub use ticker::Ticker;
