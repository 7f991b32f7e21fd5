//! Generation jobs: description, narrative and image fan-out.
//!
//! At most one job is active. Starting a job cancels the token of the one
//! before it, synchronously and before any remote call is issued. Every
//! write a job makes to the app store goes through [`commit`], which drops
//! the write if the job's token has been cancelled in the meantime, so a
//! superseded job can never leak results into the state.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use loremap_canvas::CanvasState;
use loremap_core::{AppState, GeneratedAsset, ProgressFlags, Store, UserMessage};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::StudioConfig;
use crate::credentials::CredentialGate;
use crate::error::{user_message, GenerationError, GenerationResult};
use crate::generator::SceneGenerator;

/// Narrative text, resolved once and awaited by every image task.
type NarrativeFuture = Shared<BoxFuture<'static, String>>;

/// How a job call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job ran to the end. `assets` lists what it appended, in arrival
    /// order; it may be shorter than requested if some images failed.
    Completed {
        /// Appended assets.
        assets: Vec<GeneratedAsset>,
    },
    /// Rejected before starting; the message was put in the app state.
    Invalid(UserMessage),
    /// Nothing to do (no description to vary, no asset to edit).
    Skipped,
    /// Superseded by a newer job or cancelled by the user.
    Cancelled,
    /// Failed; the normalized message was put in the app state.
    Failed(String),
}

/// What [`GenerationController::delete_image`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// One asset by position.
    Index(usize),
    /// Every asset.
    All,
}

#[derive(Debug)]
struct ActiveJob {
    id: Uuid,
    token: CancellationToken,
}

/// Handle a running job keeps for itself.
#[derive(Debug, Clone)]
struct Job {
    id: Uuid,
    token: CancellationToken,
}

/// Apply `edit` to the app state unless `token` is cancelled.
///
/// Returns whether the write happened.
fn commit<F>(app: &Store<AppState>, token: &CancellationToken, edit: F) -> bool
where
    F: FnOnce(&mut AppState),
{
    app.update(|current| {
        if token.is_cancelled() {
            return Arc::clone(current);
        }
        let mut next = AppState::clone(current);
        edit(&mut next);
        Arc::new(next)
    })
}

/// Race `fut` against cancellation of `token`.
async fn or_cancel<T, F>(token: &CancellationToken, fut: F) -> GenerationResult<T>
where
    F: Future<Output = GenerationResult<T>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(GenerationError::Cancelled),
        result = fut => result,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Runs generation jobs against the app store.
pub struct GenerationController {
    app: Store<AppState>,
    canvas: Store<CanvasState>,
    generator: Arc<dyn SceneGenerator>,
    credentials: Arc<dyn CredentialGate>,
    premium_model: String,
    direct_delay: Duration,
    active: Mutex<Option<ActiveJob>>,
}

impl std::fmt::Debug for GenerationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationController")
            .field("premium_model", &self.premium_model)
            .field("direct_delay", &self.direct_delay)
            .field("active", &self.active_job_id())
            .finish_non_exhaustive()
    }
}

impl GenerationController {
    /// Create a controller writing to `app` and reading sketches from `canvas`.
    pub fn new(
        app: Store<AppState>,
        canvas: Store<CanvasState>,
        generator: Arc<dyn SceneGenerator>,
        credentials: Arc<dyn CredentialGate>,
        config: &StudioConfig,
    ) -> Self {
        Self {
            app,
            canvas,
            generator,
            credentials,
            premium_model: config.premium_image_model.clone(),
            direct_delay: config.direct_delay,
            active: Mutex::new(None),
        }
    }

    /// The app store.
    #[must_use]
    pub fn app(&self) -> &Store<AppState> {
        &self.app
    }

    /// Id of the running job, if any.
    #[must_use]
    pub fn active_job_id(&self) -> Option<Uuid> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|job| job.id)
    }

    /// Issue a fresh token, cancelling the previous job's.
    fn begin_job(&self) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            token: CancellationToken::new(),
        };
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveJob {
                id: job.id,
                token: job.token.clone(),
            });
        if let Some(previous) = previous {
            debug!(superseded = %previous.id, by = %job.id, "Cancelling superseded job");
            previous.token.cancel();
        }
        job
    }

    /// Forget `id` if it is still the active job. Returns whether it was.
    fn release(&self, id: Uuid) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|job| job.id == id) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Abort the running job, if any, and drop every progress flag and the
    /// error.
    pub fn cancel(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = active {
            info!(job_id = %job.id, "Job cancelled");
            job.token.cancel();
        }
        self.app.patch(AppState::reset_progress);
    }

    fn reject(&self, error: GenerationError) -> JobOutcome {
        let text = user_message(&error, self.app.get_state().language);
        debug!(error = %error, "Job rejected");
        self.app.patch(|s| s.error = Some(text.clone()));
        match error.rejection() {
            Some(message) => JobOutcome::Invalid(message),
            None => JobOutcome::Failed(text),
        }
    }

    async fn ensure_credential(&self, image_model: &str) -> GenerationResult<()> {
        if image_model != self.premium_model || self.credentials.has_credential().await {
            return Ok(());
        }
        self.credentials.prompt_for_credential().await.map_err(|e| {
            warn!(error = %e, model = image_model, "Credential selection failed");
            GenerationError::CredentialDenied
        })
    }

    /// Turn a job's result into its outcome, settling the app state.
    ///
    /// The job's token is cancelled on the way out so background work it
    /// left behind (the narrative call) can no longer write.
    fn finish(&self, job: &Job, result: GenerationResult<Vec<GeneratedAsset>>) -> JobOutcome {
        if job.token.is_cancelled() {
            debug!(job_id = %job.id, "Job ended after cancellation");
            return JobOutcome::Cancelled;
        }
        let outcome = match result {
            Ok(assets) => {
                info!(job_id = %job.id, assets = assets.len(), "Job completed");
                JobOutcome::Completed { assets }
            }
            Err(GenerationError::Cancelled) => {
                if self.release(job.id) {
                    self.app.patch(AppState::reset_progress);
                }
                JobOutcome::Cancelled
            }
            Err(e) => {
                let language = self.app.get_state().language;
                let message = user_message(&e, language);
                warn!(job_id = %job.id, error = %e, "Job failed");
                let failed = {
                    let message = message.clone();
                    commit(&self.app, &job.token, move |s| s.fail(message))
                };
                if failed {
                    JobOutcome::Failed(message)
                } else {
                    JobOutcome::Cancelled
                }
            }
        };
        self.release(job.id);
        job.token.cancel();
        outcome
    }

    /// Run the whole pipeline: description and narrative in parallel, then
    /// `image_count` images.
    pub async fn generate_full(&self) -> JobOutcome {
        let state = self.app.get_state();
        if state.location_request.trim().is_empty() {
            return self.reject(GenerationError::Validation(UserMessage::NoRequest));
        }
        if let Err(e) = self.ensure_credential(&state.image_model).await {
            return self.reject(e);
        }

        let job = self.begin_job();
        let span = info_span!("generate_full", job_id = %job.id, mode = %state.mode);
        async {
            info!(
                images = state.image_count,
                direct = state.is_direct_mode(),
                "Job started"
            );
            let result = self.run_full(&job, &state).await;
            self.finish(&job, result)
        }
        .instrument(span)
        .await
    }

    async fn run_full(
        &self,
        job: &Job,
        state: &AppState,
    ) -> GenerationResult<Vec<GeneratedAsset>> {
        let sketch = self.canvas.get_state().current_serialized.clone();
        commit(&self.app, &job.token, |s| {
            s.gen_timer = 0.0;
            s.progress = ProgressFlags {
                describing: true,
                narrating: true,
                ..ProgressFlags::IDLE
            };
            s.error = None;
        });

        let text_start = Instant::now();
        let narrative = self.spawn_narrative(job, state);

        let description = if state.is_direct_mode() {
            or_cancel(&job.token, async {
                tokio::time::sleep(self.direct_delay).await;
                Ok(())
            })
            .await?;
            state.location_request.clone()
        } else {
            or_cancel(
                &job.token,
                self.generator.describe_scene(
                    &state.lore_files,
                    &state.location_request,
                    sketch.as_deref(),
                    &state.description_model,
                    state.mode,
                    &state.art_style,
                ),
            )
            .await?
        };

        let described = commit(&self.app, &job.token, |s| {
            s.generated_description = description.clone();
            s.last_text_duration_ms = Some(elapsed_ms(text_start));
            s.progress.describing = false;
            s.progress.imaging = true;
        });
        if !described {
            return Err(GenerationError::Cancelled);
        }
        debug!(chars = description.len(), "Description ready");

        let image_start = Instant::now();
        let assets = self
            .fan_out(job, state, &description, sketch.as_deref(), narrative.clone())
            .await;
        narrative.await;

        let settled = commit(&self.app, &job.token, |s| {
            s.last_image_duration_ms = Some(elapsed_ms(image_start));
            s.progress.imaging = false;
        });
        if settled {
            Ok(assets)
        } else {
            Err(GenerationError::Cancelled)
        }
    }

    /// Start the narrative call in the background. The result lands in the
    /// app state on its own and is shared with the image tasks.
    fn spawn_narrative(&self, job: &Job, state: &AppState) -> NarrativeFuture {
        let generator = Arc::clone(&self.generator);
        let app = self.app.clone();
        let token = job.token.clone();
        let lore = state.lore_files.clone();
        let request = state.location_request.clone();
        let (mode, language) = (state.mode, state.language);

        let task = tokio::spawn(
            async move {
                let text = tokio::select! {
                    biased;
                    () = token.cancelled() => return String::new(),
                    text = generator.narrate(&lore, &request, mode, language) => text,
                };
                if text.is_empty() {
                    warn!("Narrative came back empty");
                }
                commit(&app, &token, |s| {
                    s.narrative_description = text.clone();
                    s.progress.narrating = false;
                });
                text
            }
            .in_current_span(),
        );
        task.map(Result::unwrap_or_default).boxed().shared()
    }

    /// Render `state.image_count` images in parallel. A failing image is
    /// logged and skipped; it never affects its siblings.
    async fn fan_out(
        &self,
        job: &Job,
        state: &AppState,
        description: &str,
        sketch: Option<&str>,
        narrative: NarrativeFuture,
    ) -> Vec<GeneratedAsset> {
        let tasks = (0..state.image_count).map(|index| {
            let narrative = narrative.clone();
            async move {
                let rendered = or_cancel(
                    &job.token,
                    self.generator.render_image(
                        description,
                        sketch,
                        &state.image_model,
                        state.mode,
                        &state.art_style,
                    ),
                )
                .await;
                let image_url = match rendered {
                    Ok(url) => url,
                    Err(GenerationError::Cancelled) => return None,
                    Err(e) => {
                        warn!(index, error = %e, "Image generation failed");
                        return None;
                    }
                };

                let narrative = or_cancel(&job.token, narrative.map(Ok)).await.ok()?;
                let asset = GeneratedAsset {
                    image_url: image_url.into(),
                    narrative: Some(narrative).filter(|n| !n.is_empty()),
                    visual_prompt: Some(description.to_string()),
                };
                let appended = {
                    let asset = asset.clone();
                    commit(&self.app, &job.token, move |s| s.push_asset(asset))
                };
                appended.then_some(asset)
            }
        });
        future::join_all(tasks).await.into_iter().flatten().collect()
    }

    /// Render another batch from the last description and narrative.
    pub async fn generate_variations(&self) -> JobOutcome {
        let state = self.app.get_state();
        if state.generated_description.is_empty() {
            return JobOutcome::Skipped;
        }
        if let Err(e) = self.ensure_credential(&state.image_model).await {
            return self.reject(e);
        }

        let job = self.begin_job();
        let span = info_span!("generate_variations", job_id = %job.id, mode = %state.mode);
        async {
            info!(images = state.image_count, "Job started");
            let result = self.run_variations(&job, &state).await;
            self.finish(&job, result)
        }
        .instrument(span)
        .await
    }

    async fn run_variations(
        &self,
        job: &Job,
        state: &AppState,
    ) -> GenerationResult<Vec<GeneratedAsset>> {
        let sketch = self.canvas.get_state().current_serialized.clone();
        commit(&self.app, &job.token, |s| {
            s.gen_timer = 0.0;
            s.progress = ProgressFlags {
                imaging: true,
                ..ProgressFlags::IDLE
            };
            s.error = None;
        });

        let start = Instant::now();
        let narrative = future::ready(state.narrative_description.clone())
            .boxed()
            .shared();
        let assets = self
            .fan_out(
                job,
                state,
                &state.generated_description,
                sketch.as_deref(),
                narrative,
            )
            .await;

        let settled = commit(&self.app, &job.token, |s| {
            s.last_image_duration_ms = Some(elapsed_ms(start));
            s.progress.imaging = false;
        });
        if settled {
            Ok(assets)
        } else {
            Err(GenerationError::Cancelled)
        }
    }

    /// Edit the selected asset. The result is appended as a new asset that
    /// keeps the original's narrative and prompt.
    pub async fn edit_image(&self, instruction: &str) -> JobOutcome {
        if instruction.trim().is_empty() {
            return self.reject(GenerationError::Validation(UserMessage::NoEditPrompt));
        }
        let state = self.app.get_state();
        let Some(target) = state.selected_asset().cloned() else {
            return JobOutcome::Skipped;
        };
        if let Err(e) = self.ensure_credential(&state.image_model).await {
            return self.reject(e);
        }

        let job = self.begin_job();
        let span = info_span!(
            "edit_image",
            job_id = %job.id,
            source = state.selected_image_index
        );
        async {
            info!("Job started");
            let result = self.run_edit(&job, &state, target, instruction).await;
            self.finish(&job, result)
        }
        .instrument(span)
        .await
    }

    async fn run_edit(
        &self,
        job: &Job,
        state: &AppState,
        target: GeneratedAsset,
        instruction: &str,
    ) -> GenerationResult<Vec<GeneratedAsset>> {
        commit(&self.app, &job.token, |s| {
            s.gen_timer = 0.0;
            s.progress = ProgressFlags {
                editing: true,
                ..ProgressFlags::IDLE
            };
            s.error = None;
        });

        let start = Instant::now();
        let image_url = or_cancel(
            &job.token,
            self.generator.edit_image(
                &target.image_url,
                instruction,
                &state.image_model,
                state.mode,
                &state.art_style,
            ),
        )
        .await?;

        let asset = GeneratedAsset {
            image_url: image_url.into(),
            ..target
        };
        let appended = {
            let asset = asset.clone();
            commit(&self.app, &job.token, move |s| {
                s.push_asset(asset);
                s.last_image_duration_ms = Some(elapsed_ms(start));
                s.progress.editing = false;
            })
        };
        if appended {
            Ok(vec![asset])
        } else {
            Err(GenerationError::Cancelled)
        }
    }

    /// Remove one asset or all of them, keeping the selection on a
    /// neighbour.
    pub fn delete_image(&self, target: DeleteTarget) {
        match target {
            DeleteTarget::All => self.app.patch(AppState::clear_assets),
            DeleteTarget::Index(index) => {
                self.app.update(|s| {
                    if index >= s.generated_images.len() {
                        return Arc::clone(s);
                    }
                    let mut next = AppState::clone(s);
                    next.remove_asset(index);
                    Arc::new(next)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_skips_cancelled_token() {
        let app = Store::new(AppState::default());
        let token = CancellationToken::new();
        assert!(commit(&app, &token, |s| s.location_request = "a".into()));
        token.cancel();
        assert!(!commit(&app, &token, |s| s.location_request = "b".into()));
        assert_eq!(app.get_state().location_request, "a");
    }

    #[tokio::test]
    async fn test_or_cancel_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = or_cancel(&token, async { Ok::<_, GenerationError>(1) }).await;
        assert!(matches!(result, Err(GenerationError::Cancelled)));

        let live = CancellationToken::new();
        assert_eq!(or_cancel(&live, async { Ok::<_, GenerationError>(2) }).await.unwrap(), 2);
    }
}
