//! Test doubles shared by the studio integration tests.
//!
//! - `Gate`: a latch that holds remote calls until the test opens it
//! - `FakeGenerator`: scripted `SceneGenerator`
//! - `MemoryStorage`: in-memory `SessionStorage` that counts saves
//! - `wait_until`: poll a condition while letting spawned tasks run

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loremap_core::{GenerationMode, Language, LoreFile, SessionData};
use loremap_studio::{
    GenerationError, GenerationResult, SceneGenerator, SessionStorage, StorageResult,
    StudioConfig,
};
use tokio::sync::Notify;

/// A latch: `wait` blocks until `open` has been called, then never again.
#[derive(Debug, Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Scripted generator.
///
/// Descriptions are `desc:<request>`; images are
/// `data:image/png;base64,<call number>` and carry no real pixels.
#[derive(Default)]
pub struct FakeGenerator {
    pub describe_error: Option<String>,
    pub describe_gate: Option<Arc<Gate>>,
    pub narrative: String,
    pub narrative_gate: Option<Arc<Gate>>,
    pub render_gate: Option<Arc<Gate>>,
    /// Render calls numbered below this wait on `render_gate`.
    pub gated_renders: usize,
    /// Zero-based render call numbers that fail.
    pub failing_renders: HashSet<usize>,
    pub edit_error: Option<String>,

    pub describe_calls: AtomicUsize,
    pub narrate_calls: AtomicUsize,
    pub render_calls: AtomicUsize,
    pub edit_calls: AtomicUsize,
    pub last_sketch: Mutex<Option<String>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            narrative: "Torches gutter in the damp air.".to_string(),
            ..Self::default()
        }
    }

    /// Hold the first `count` render calls until `gate` opens.
    pub fn gate_renders(mut self, gate: &Arc<Gate>, count: usize) -> Self {
        self.render_gate = Some(Arc::clone(gate));
        self.gated_renders = count;
        self
    }

    pub fn renders(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
            + self.narrate_calls.load(Ordering::SeqCst)
            + self.render_calls.load(Ordering::SeqCst)
            + self.edit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneGenerator for FakeGenerator {
    async fn describe_scene(
        &self,
        _lore: &[LoreFile],
        request: &str,
        sketch: Option<&str>,
        _model: &str,
        _mode: GenerationMode,
        _style: &str,
    ) -> GenerationResult<String> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sketch.lock().unwrap() = sketch.map(str::to_string);
        if let Some(gate) = &self.describe_gate {
            gate.wait().await;
        }
        match &self.describe_error {
            Some(message) => Err(GenerationError::Remote(message.clone())),
            None => Ok(format!("desc:{request}")),
        }
    }

    async fn narrate(
        &self,
        _lore: &[LoreFile],
        _request: &str,
        _mode: GenerationMode,
        _language: Language,
    ) -> String {
        self.narrate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.narrative_gate {
            gate.wait().await;
        }
        self.narrative.clone()
    }

    async fn render_image(
        &self,
        _description: &str,
        _sketch: Option<&str>,
        _model: &str,
        _mode: GenerationMode,
        _style: &str,
    ) -> GenerationResult<String> {
        let call = self.render_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.render_gate.as_ref().filter(|_| call < self.gated_renders) {
            gate.wait().await;
        }
        if self.failing_renders.contains(&call) {
            return Err(GenerationError::NoPayload(
                "No image data returned from API".to_string(),
            ));
        }
        Ok(format!("data:image/png;base64,{call}"))
    }

    async fn edit_image(
        &self,
        image: &str,
        instruction: &str,
        _model: &str,
        _mode: GenerationMode,
        _style: &str,
    ) -> GenerationResult<String> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        match &self.edit_error {
            Some(message) => Err(GenerationError::Remote(message.clone())),
            None => Ok(format!("{image}+{instruction}")),
        }
    }
}

/// Session storage kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub stored: Mutex<Option<SessionData>>,
    pub saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn with(data: SessionData) -> Arc<Self> {
        Arc::new(Self {
            stored: Mutex::new(Some(data)),
            saves: AtomicUsize::new(0),
        })
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<SessionData> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self) -> StorageResult<Option<SessionData>> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, data: &SessionData) -> StorageResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.stored.lock().unwrap() = Some(data.clone());
        Ok(())
    }
}

/// Configuration with no key, a zero direct-mode delay and the default
/// tick period.
pub fn test_config() -> StudioConfig {
    let mut config = StudioConfig::from_lookup(|_| None).unwrap();
    config.direct_delay = Duration::ZERO;
    config
}

/// Yield until `condition` holds. Panics after a generous timeout.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
