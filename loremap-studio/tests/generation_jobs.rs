//! Generation job tests.
//!
//! Tests the controller against a scripted backend:
//! - Full pipeline, direct mode, variations and edits
//! - Validation and credential rejection before any remote call
//! - Image fan-out failure isolation
//! - Superseded jobs never leak assets
//! - Every failure path leaves all progress flags down
//! - Deletion keeps the selection on a neighbour

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{test_config, wait_until, FakeGenerator, Gate};
use loremap_canvas::CanvasState;
use loremap_core::{
    AppState, GeneratedAsset, Language, ProgressFlags, Store, UserMessage,
    DIRECT_DESCRIPTION_MODEL,
};
use loremap_studio::config::PREMIUM_IMAGE_MODEL;
use loremap_studio::{
    AllowAll, ApiKeyGate, CredentialError, CredentialGate, DeleteTarget, GenerationController,
    JobOutcome,
};

struct Harness {
    app: Store<AppState>,
    generator: Arc<FakeGenerator>,
    controller: Arc<GenerationController>,
}

fn harness_with(generator: FakeGenerator, credentials: Arc<dyn CredentialGate>) -> Harness {
    let generator = Arc::new(generator);
    let app = Store::new(AppState {
        is_loaded: true,
        ..AppState::default()
    });
    let controller = Arc::new(GenerationController::new(
        app.clone(),
        Store::new(CanvasState::default()),
        generator.clone(),
        credentials,
        &test_config(),
    ));
    Harness {
        app,
        generator,
        controller,
    }
}

fn harness(generator: FakeGenerator) -> Harness {
    harness_with(generator, Arc::new(AllowAll))
}

fn request(app: &Store<AppState>, text: &str, count: u8) {
    app.patch(|s| {
        s.location_request = text.to_string();
        s.set_image_count(count);
    });
}

fn assert_idle(state: &AppState) {
    assert_eq!(state.progress, ProgressFlags::IDLE, "flags left up: {:?}", state.progress);
}

#[tokio::test]
async fn test_full_job_appends_assets_with_narrative() {
    let h = harness(FakeGenerator::new());
    request(&h.app, "Goblin cave", 2);

    let outcome = h.controller.generate_full().await;
    let JobOutcome::Completed { assets } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(assets.len(), 2);

    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(state.error, None);
    assert_eq!(state.generated_description, "desc:Goblin cave");
    assert_eq!(state.narrative_description, "Torches gutter in the damp air.");
    assert_eq!(state.generated_images, assets);
    assert_eq!(state.selected_image_index, 1);
    for asset in &state.generated_images {
        assert_eq!(asset.narrative.as_deref(), Some("Torches gutter in the damp air."));
        assert_eq!(asset.visual_prompt.as_deref(), Some("desc:Goblin cave"));
    }
    assert!(state.last_text_duration_ms.is_some());
    assert!(state.last_image_duration_ms.is_some());
    assert_eq!(h.controller.active_job_id(), None);
}

#[tokio::test]
async fn test_new_assets_append_after_existing_ones() {
    let h = harness(FakeGenerator::new());
    h.app.patch(|s| s.push_asset(GeneratedAsset::from_url("data:image/png;base64,OLD")));
    request(&h.app, "Harbour", 1);

    h.controller.generate_full().await;

    let state = h.app.get_state();
    assert_eq!(state.generated_images.len(), 2);
    assert_eq!(&*state.generated_images[0].image_url, "data:image/png;base64,OLD");
    assert_eq!(state.selected_image_index, 1);
}

#[tokio::test]
async fn test_direct_mode_skips_description_call() {
    let h = harness(FakeGenerator::new());
    request(&h.app, "A lone watchtower", 1);
    h.app.patch(|s| s.description_model = DIRECT_DESCRIPTION_MODEL.to_string());

    let outcome = h.controller.generate_full().await;
    assert!(matches!(outcome, JobOutcome::Completed { ref assets } if assets.len() == 1));

    let state = h.app.get_state();
    assert_eq!(h.generator.describe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.generated_description, "A lone watchtower");
    assert_eq!(
        state.generated_images[0].visual_prompt.as_deref(),
        Some("A lone watchtower")
    );
}

#[tokio::test]
async fn test_empty_request_is_rejected_without_remote_calls() {
    let h = harness(FakeGenerator::new());
    request(&h.app, "   ", 2);

    let outcome = h.controller.generate_full().await;
    assert_eq!(outcome, JobOutcome::Invalid(UserMessage::NoRequest));

    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(
        state.error.as_deref(),
        Some(UserMessage::NoRequest.text(Language::Ru))
    );
    assert_eq!(h.generator.remote_calls(), 0);
}

#[tokio::test]
async fn test_one_failing_image_does_not_affect_siblings() {
    let h = harness(FakeGenerator {
        failing_renders: HashSet::from([2]),
        ..FakeGenerator::new()
    });
    request(&h.app, "Swamp shrine", 4);

    let outcome = h.controller.generate_full().await;
    assert!(matches!(outcome, JobOutcome::Completed { ref assets } if assets.len() == 3));

    let state = h.app.get_state();
    assert_eq!(h.generator.renders(), 4);
    assert_eq!(state.generated_images.len(), 3);
    assert_eq!(state.error, None);
    assert_idle(&state);
}

#[tokio::test]
async fn test_all_images_failing_still_settles() {
    let h = harness(FakeGenerator {
        failing_renders: HashSet::from([0, 1]),
        ..FakeGenerator::new()
    });
    request(&h.app, "Frozen lake", 2);

    let outcome = h.controller.generate_full().await;
    assert_eq!(outcome, JobOutcome::Completed { assets: Vec::new() });
    let state = h.app.get_state();
    assert!(state.generated_images.is_empty());
    assert_idle(&state);
}

#[tokio::test]
async fn test_description_failure_clears_flags_and_normalizes_message() {
    let h = harness(FakeGenerator {
        describe_error: Some("HTTP 403: The caller does not have permission".into()),
        ..FakeGenerator::new()
    });
    request(&h.app, "Throne room", 2);

    let outcome = h.controller.generate_full().await;
    let expected = UserMessage::AccessDenied.text(Language::Ru).to_string();
    assert_eq!(outcome, JobOutcome::Failed(expected.clone()));

    // Let the background narrative call finish; it must not raise a flag again.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(state.error.as_deref(), Some(expected.as_str()));
    assert_eq!(h.generator.renders(), 0);
}

#[tokio::test]
async fn test_other_failures_keep_their_text() {
    let h = harness(FakeGenerator {
        describe_error: Some("quota exhausted".into()),
        ..FakeGenerator::new()
    });
    request(&h.app, "Throne room", 1);

    let outcome = h.controller.generate_full().await;
    assert_eq!(outcome, JobOutcome::Failed("quota exhausted".into()));
    assert_eq!(h.app.get_state().error.as_deref(), Some("quota exhausted"));
}

#[tokio::test]
async fn test_superseded_job_never_leaks_assets() {
    let gate = Gate::new();
    let h = harness(FakeGenerator::new().gate_renders(&gate, 2));
    request(&h.app, "first", 2);

    let first = tokio::spawn({
        let controller = Arc::clone(&h.controller);
        async move { controller.generate_full().await }
    });
    wait_until(|| h.generator.renders() == 2).await;
    assert!(h.app.get_state().progress.imaging);

    request(&h.app, "second", 2);
    let second = h.controller.generate_full().await;
    assert!(matches!(second, JobOutcome::Completed { ref assets } if assets.len() == 2));

    // The first job's images resolve only now, after it was superseded.
    gate.open();
    assert_eq!(first.await.unwrap(), JobOutcome::Cancelled);

    let state = h.app.get_state();
    assert_eq!(state.generated_images.len(), 2);
    for asset in &state.generated_images {
        assert_eq!(asset.visual_prompt.as_deref(), Some("desc:second"));
    }
    assert_idle(&state);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn test_cancel_mid_description_resets_everything() {
    let gate = Gate::new();
    let h = harness(FakeGenerator {
        describe_gate: Some(Arc::clone(&gate)),
        ..FakeGenerator::new()
    });
    request(&h.app, "Lich tower", 2);

    let job = tokio::spawn({
        let controller = Arc::clone(&h.controller);
        async move { controller.generate_full().await }
    });
    wait_until(|| h.app.get_state().progress.describing).await;

    h.controller.cancel();
    assert_eq!(job.await.unwrap(), JobOutcome::Cancelled);
    gate.open();

    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(state.error, None);
    assert!(state.generated_images.is_empty());
    assert_eq!(h.generator.renders(), 0);
    assert_eq!(h.controller.active_job_id(), None);
}

#[tokio::test]
async fn test_cancel_when_idle_clears_error() {
    let h = harness(FakeGenerator::new());
    h.app.patch(|s| s.error = Some("stale".into()));
    h.controller.cancel();
    assert_eq!(h.app.get_state().error, None);
}

#[tokio::test]
async fn test_assets_wait_for_narrative() {
    let gate = Gate::new();
    let h = harness(FakeGenerator {
        narrative_gate: Some(Arc::clone(&gate)),
        ..FakeGenerator::new()
    });
    request(&h.app, "Desert ruins", 2);

    let job = tokio::spawn({
        let controller = Arc::clone(&h.controller);
        async move { controller.generate_full().await }
    });
    wait_until(|| h.generator.renders() == 2).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    let pending = h.app.get_state();
    assert!(pending.generated_images.is_empty());
    assert!(pending.progress.imaging && pending.progress.narrating);

    gate.open();
    assert!(matches!(job.await.unwrap(), JobOutcome::Completed { ref assets } if assets.len() == 2));
    let state = h.app.get_state();
    for asset in &state.generated_images {
        assert_eq!(asset.narrative.as_deref(), Some("Torches gutter in the damp air."));
    }
    assert_idle(&state);
}

#[tokio::test]
async fn test_empty_narrative_is_not_an_error() {
    let h = harness(FakeGenerator {
        narrative: String::new(),
        ..FakeGenerator::new()
    });
    request(&h.app, "Bandit camp", 1);

    h.controller.generate_full().await;
    let state = h.app.get_state();
    assert_eq!(state.error, None);
    assert_eq!(state.generated_images[0].narrative, None);
    assert_idle(&state);
}

#[tokio::test]
async fn test_premium_model_without_credential_is_rejected() {
    let h = harness_with(FakeGenerator::new(), Arc::new(ApiKeyGate::new(None)));
    request(&h.app, "Dragon lair", 2);
    h.app.patch(|s| s.image_model = PREMIUM_IMAGE_MODEL.to_string());

    let outcome = h.controller.generate_full().await;
    assert_eq!(outcome, JobOutcome::Invalid(UserMessage::CredentialRequired));

    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(
        state.error.as_deref(),
        Some(UserMessage::CredentialRequired.text(Language::Ru))
    );
    assert_eq!(h.generator.remote_calls(), 0);
}

#[derive(Default)]
struct PromptingGate {
    prompted: AtomicBool,
}

#[async_trait]
impl CredentialGate for PromptingGate {
    async fn has_credential(&self) -> bool {
        false
    }

    async fn prompt_for_credential(&self) -> Result<(), CredentialError> {
        self.prompted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_accepted_prompt_lets_premium_job_run() {
    let gate = Arc::new(PromptingGate::default());
    let h = harness_with(FakeGenerator::new(), gate.clone());
    request(&h.app, "Dragon lair", 1);
    h.app.patch(|s| s.image_model = PREMIUM_IMAGE_MODEL.to_string());

    let outcome = h.controller.generate_full().await;
    assert!(matches!(outcome, JobOutcome::Completed { .. }));
    assert!(gate.prompted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_standard_model_skips_credential_gate() {
    let h = harness_with(FakeGenerator::new(), Arc::new(ApiKeyGate::new(None)));
    request(&h.app, "Mill", 1);
    assert!(matches!(
        h.controller.generate_full().await,
        JobOutcome::Completed { .. }
    ));
}

#[tokio::test]
async fn test_variations_need_a_description() {
    let h = harness(FakeGenerator::new());
    let before = h.app.get_state();
    assert_eq!(h.controller.generate_variations().await, JobOutcome::Skipped);
    assert!(Arc::ptr_eq(&before, &h.app.get_state()));
}

#[tokio::test]
async fn test_variations_reuse_description_and_narrative() {
    let h = harness(FakeGenerator::new());
    h.app.patch(|s| {
        s.generated_description = "A moonlit graveyard".into();
        s.narrative_description = "Crows watch.".into();
        s.set_image_count(3);
    });

    let outcome = h.controller.generate_variations().await;
    assert!(matches!(outcome, JobOutcome::Completed { ref assets } if assets.len() == 3));

    let state = h.app.get_state();
    assert_eq!(h.generator.describe_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.narrate_calls.load(Ordering::SeqCst), 0);
    for asset in &state.generated_images {
        assert_eq!(asset.visual_prompt.as_deref(), Some("A moonlit graveyard"));
        assert_eq!(asset.narrative.as_deref(), Some("Crows watch."));
    }
    assert_idle(&state);
}

fn with_assets(app: &Store<AppState>, urls: &[&str], selected: usize) {
    app.patch(|s| {
        s.generated_images = urls
            .iter()
            .map(|url| GeneratedAsset {
                image_url: Arc::from(*url),
                narrative: Some(format!("story of {url}")),
                visual_prompt: Some(format!("prompt of {url}")),
            })
            .collect();
        s.selected_image_index = selected;
    });
}

#[tokio::test]
async fn test_edit_appends_a_new_version() {
    let h = harness(FakeGenerator::new());
    with_assets(&h.app, &["A", "B"], 0);

    let outcome = h.controller.edit_image("add fog").await;
    assert!(matches!(outcome, JobOutcome::Completed { ref assets } if assets.len() == 1));

    let state = h.app.get_state();
    assert_eq!(state.generated_images.len(), 3);
    assert_eq!(state.selected_image_index, 2);
    let edited = &state.generated_images[2];
    assert_eq!(&*edited.image_url, "A+add fog");
    assert_eq!(edited.narrative.as_deref(), Some("story of A"));
    assert_eq!(edited.visual_prompt.as_deref(), Some("prompt of A"));
    assert_eq!(&*state.generated_images[0].image_url, "A");
    assert_idle(&state);
}

#[tokio::test]
async fn test_edit_validation() {
    let h = harness(FakeGenerator::new());
    assert_eq!(h.controller.edit_image("anything").await, JobOutcome::Skipped);

    with_assets(&h.app, &["A"], 0);
    assert_eq!(
        h.controller.edit_image("  ").await,
        JobOutcome::Invalid(UserMessage::NoEditPrompt)
    );
    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(h.generator.edit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_declined_credential_blocks_edit() {
    let h = harness_with(FakeGenerator::new(), Arc::new(ApiKeyGate::new(None)));
    with_assets(&h.app, &["A"], 0);
    h.app.patch(|s| {
        s.language = Language::En;
        s.image_model = PREMIUM_IMAGE_MODEL.to_string();
    });

    assert_eq!(
        h.controller.edit_image("add fog").await,
        JobOutcome::Invalid(UserMessage::CredentialRequired)
    );
    let state = h.app.get_state();
    assert_eq!(
        state.error.as_deref(),
        Some("API Key selection required for this model.")
    );
    assert_eq!(state.generated_images.len(), 1);
    assert_eq!(h.generator.edit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_edit_failure_clears_flag() {
    let h = harness(FakeGenerator {
        edit_error: Some("Requested entity was not found.".into()),
        ..FakeGenerator::new()
    });
    with_assets(&h.app, &["A"], 0);
    h.app.patch(|s| s.language = Language::En);

    let outcome = h.controller.edit_image("add a bridge").await;
    assert_eq!(
        outcome,
        JobOutcome::Failed(UserMessage::AccessDenied.text(Language::En).to_string())
    );
    let state = h.app.get_state();
    assert_idle(&state);
    assert_eq!(state.generated_images.len(), 1);
}

fn urls(app: &Store<AppState>) -> Vec<String> {
    app.get_state()
        .generated_images
        .iter()
        .map(|a| a.image_url.to_string())
        .collect()
}

#[tokio::test]
async fn test_delete_keeps_selection_on_neighbour() {
    let h = harness(FakeGenerator::new());

    with_assets(&h.app, &["A", "B", "C"], 2);
    h.controller.delete_image(DeleteTarget::Index(0));
    assert_eq!(urls(&h.app), ["B", "C"]);
    assert_eq!(h.app.get_state().selected_image_index, 1);

    with_assets(&h.app, &["A", "B", "C"], 1);
    h.controller.delete_image(DeleteTarget::Index(1));
    assert_eq!(urls(&h.app), ["A", "C"]);
    assert_eq!(h.app.get_state().selected_image_index, 0);

    with_assets(&h.app, &["A", "B", "C"], 0);
    h.controller.delete_image(DeleteTarget::Index(0));
    assert_eq!(urls(&h.app), ["B", "C"]);
    assert_eq!(h.app.get_state().selected_image_index, 0);

    with_assets(&h.app, &["A", "B", "C"], 0);
    h.controller.delete_image(DeleteTarget::Index(2));
    assert_eq!(urls(&h.app), ["A", "B"]);
    assert_eq!(h.app.get_state().selected_image_index, 0);
}

#[tokio::test]
async fn test_delete_all_and_out_of_range() {
    let h = harness(FakeGenerator::new());
    with_assets(&h.app, &["A", "B"], 1);

    let before = h.app.get_state();
    h.controller.delete_image(DeleteTarget::Index(7));
    assert!(Arc::ptr_eq(&before, &h.app.get_state()));

    h.controller.delete_image(DeleteTarget::All);
    let state = h.app.get_state();
    assert!(state.generated_images.is_empty());
    assert_eq!(state.selected_image_index, 0);
}
