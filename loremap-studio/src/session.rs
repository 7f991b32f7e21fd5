//! A complete studio session: both stores, the sketch engine, the generation
//! controller and the background tasks tying them together.
//!
//! Opening a session hydrates the app state from storage first, then hands
//! a stored sketch to the canvas (once, while its history is still empty),
//! and only then builds the engine. Canvas commits reach the app state
//! through a channel drained by a background task, so drawing never waits
//! on app-store subscribers; [`Studio::flush_sketch`] waits for that queue.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use loremap_canvas::{CanvasEngine, CanvasState};
use loremap_core::{AppState, Store};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StudioConfig;
use crate::credentials::CredentialGate;
use crate::error::{StudioError, StudioResult};
use crate::generator::SceneGenerator;
use crate::orchestrator::GenerationController;
use crate::persistence::{load_or_default, Autosave, SessionStorage};
use crate::project::ProjectDocument;
use crate::speech::{SpeechAdapter, SpeechRecognizer};
use crate::ticker::Ticker;

#[derive(Debug)]
enum BridgeMessage {
    Sketch(Arc<str>),
    Flush(oneshot::Sender<()>),
}

/// Collaborators a session is opened with.
pub struct StudioDeps {
    /// Remote generation backend.
    pub generator: Arc<dyn SceneGenerator>,
    /// Credential check for the premium model.
    pub credentials: Arc<dyn CredentialGate>,
    /// Session slot.
    pub storage: Arc<dyn SessionStorage>,
}

/// One open LoreMap session.
pub struct Studio {
    app: Store<AppState>,
    canvas: Store<CanvasState>,
    engine: Mutex<CanvasEngine>,
    controller: Arc<GenerationController>,
    bridge_tx: mpsc::UnboundedSender<BridgeMessage>,
    bridge: JoinHandle<()>,
    autosave: Option<Autosave>,
    ticker: Ticker,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("controller", &self.controller)
            .field("ticker", &self.ticker)
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Open a session on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Canvas`] if the sketch surface cannot be
    /// created or its first entry cannot be encoded. A failed session load
    /// is logged and treated as an empty session.
    pub async fn open(config: &StudioConfig, deps: StudioDeps) -> StudioResult<Self> {
        let app = Store::new(AppState::default());
        let canvas = Store::new(CanvasState::default());

        let data = load_or_default(deps.storage.as_ref()).await;
        app.update(|s| Arc::new(AppState::clone(s).hydrate(data)));
        let state = app.get_state();
        info!(
            assets = state.generated_images.len(),
            lore = state.lore_files.len(),
            "Session hydrated"
        );

        if let Some(sketch) = state.sketch.clone() {
            canvas.update(|c| {
                if c.history_step.is_some() {
                    return Arc::clone(c);
                }
                let mut next = CanvasState::clone(c);
                next.current_serialized = Some(sketch);
                Arc::new(next)
            });
        }

        let autosave = Some(Autosave::attach(&app, Arc::clone(&deps.storage)));
        let ticker = Ticker::attach(&app, config.tick_period);

        let (bridge_tx, bridge_rx) = mpsc::unbounded_channel();
        let bridge = tokio::spawn(run_bridge(app.clone(), bridge_rx));

        let mut engine = CanvasEngine::new(canvas.clone())?;
        let hook_tx = bridge_tx.clone();
        engine.on_commit(move |encoded| {
            if hook_tx.send(BridgeMessage::Sketch(encoded)).is_err() {
                warn!("Sketch bridge closed, commit not propagated");
            }
        });
        engine.refresh()?;

        let controller = Arc::new(GenerationController::new(
            app.clone(),
            canvas.clone(),
            deps.generator,
            deps.credentials,
            config,
        ));

        Ok(Self {
            app,
            canvas,
            engine: Mutex::new(engine),
            controller,
            bridge_tx,
            bridge,
            autosave,
            ticker,
        })
    }

    /// The app store.
    #[must_use]
    pub fn app(&self) -> &Store<AppState> {
        &self.app
    }

    /// The canvas store.
    #[must_use]
    pub fn canvas(&self) -> &Store<CanvasState> {
        &self.canvas
    }

    /// The generation controller.
    #[must_use]
    pub fn controller(&self) -> &Arc<GenerationController> {
        &self.controller
    }

    /// Whether the elapsed-time ticker is running.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Run `f` with exclusive access to the sketch engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut CanvasEngine) -> R) -> R {
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut engine)
    }

    /// Speech input bound to this session's request field.
    #[must_use]
    pub fn speech(&self, recognizer: Option<Box<dyn SpeechRecognizer>>) -> SpeechAdapter {
        SpeechAdapter::new(self.app.clone(), recognizer)
    }

    /// Wait until every canvas commit so far has reached the app state.
    pub async fn flush_sketch(&self) {
        let (tx, rx) = oneshot::channel();
        if self.bridge_tx.send(BridgeMessage::Flush(tx)).is_ok() {
            // A dropped ack only means the bridge is gone.
            let _ = rx.await;
        }
    }

    /// Snapshot the session as a project document.
    #[must_use]
    pub fn export_project(&self) -> ProjectDocument {
        ProjectDocument::capture(&self.app.get_state(), &self.canvas.get_state(), Utc::now())
    }

    /// Replace the session with a project file.
    ///
    /// A rejected file leaves the session untouched and puts the localized
    /// message in the app state's error.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::Project`] for unreadable or invalid files and
    /// [`StudioError::Canvas`] if the imported sketch cannot be painted.
    pub fn import_project(&self, json: &str) -> StudioResult<()> {
        let document = match ProjectDocument::parse(json) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Project import rejected");
                self.app.patch(|s| s.error = Some(e.user_message(s.language)));
                return Err(StudioError::Project(e));
            }
        };
        document.apply(&self.app, &self.canvas);
        self.with_engine(CanvasEngine::refresh)?;
        Ok(())
    }

    /// Stop background work and write out any pending session save.
    pub async fn close(mut self) {
        self.controller.cancel();
        self.flush_sketch().await;
        if let Some(autosave) = self.autosave.take() {
            autosave.flush().await;
        }
        self.bridge.abort();
        debug!("Session closed");
    }
}

async fn run_bridge(app: Store<AppState>, mut rx: mpsc::UnboundedReceiver<BridgeMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            BridgeMessage::Sketch(encoded) => {
                app.update(|s| {
                    if s.sketch.as_deref() == Some(&*encoded) {
                        return Arc::clone(s);
                    }
                    let mut next = AppState::clone(s);
                    next.sketch = Some(encoded);
                    Arc::new(next)
                });
            }
            BridgeMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
