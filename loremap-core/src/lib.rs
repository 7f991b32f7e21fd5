//! # LoreMap Core
//!
//! State primitives shared by the sketch engine and the generation studio.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                loremap-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Store<T>         │  Domain model           │
//! │  - Arc snapshots  │  - AppState             │
//! │  - Subscribers    │  - GeneratedAsset       │
//! │  - Weak handles   │  - SessionData          │
//! ├─────────────────────────────────────────────┤
//! │  Input events     │  Localized messages     │
//! │  - Pointer / key  │  - en / ru              │
//! │  - Speech         │                         │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod messages;
pub mod session;
pub mod state;
pub mod store;

pub use error::{CoreError, CoreResult};
pub use event::{KeyEvent, KeyModifiers, PointerEvent, PointerPhase, TranscriptSegment};
pub use messages::UserMessage;
pub use session::SessionData;
pub use state::{
    AppState, GeneratedAsset, GenerationMode, Language, LoreFile, ProgressFlags,
    DIRECT_DESCRIPTION_MODEL,
};
pub use store::{Store, Subscription, WeakStore};

/// Core version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
