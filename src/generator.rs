//! Generation workflow: theme in, duck image (or a user-facing error) out

use crate::constants::{HISTORY_KEY, IMAGE_HEIGHT, IMAGE_WIDTH, MODEL_ID};
use crate::error::{GenerationErrorKind, RunError};
use crate::history::{push_entry, HistoryEntry};
use crate::platform::{
    use_storage, KeyValueStore, ModelClient, RunInput, RunRequest, Stored, SyncStatus,
};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::{debug, error, info};

pub fn build_prompt(theme: &str) -> String {
    format!(
        "A cute rubber duck themed as {theme}, high quality, detailed, vibrant colors, studio lighting, 3D render"
    )
}

pub fn build_request(theme: &str) -> RunRequest {
    RunRequest {
        input: RunInput {
            prompt: build_prompt(theme),
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
        },
    }
}

/// Transient UI state of the generator screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratorState {
    pub theme: String,
    pub generated_image: Option<String>,
    /// Theme the displayed image was generated for
    pub generated_theme: Option<String>,
    pub loading: bool,
    pub error: Option<GenerationErrorKind>,
}

impl GeneratorState {
    pub fn has_theme(&self) -> bool {
        !self.theme.trim().is_empty()
    }

    pub fn can_submit(&self) -> bool {
        !self.loading && self.has_theme()
    }

    /// Previous image is kept; only loading and error reset.
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Shows `image` as the result for the theme of `entry`.
    pub fn succeed(&mut self, image: String, entry: &HistoryEntry) {
        self.generated_image = Some(image);
        self.generated_theme = Some(entry.theme.clone());
    }

    pub fn fail(&mut self, kind: GenerationErrorKind) {
        self.error = Some(kind);
    }

    pub fn finish(&mut self) {
        self.loading = false;
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.map(|kind| kind.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success { image: String, entry: HistoryEntry },
    Failure(GenerationErrorKind),
}

/// Runs one generation. Every failure is logged and classified; nothing escapes.
pub async fn run_generation(client: &dyn ModelClient, theme: String) -> GenerationOutcome {
    let request = build_request(&theme);
    let result = client.run(MODEL_ID, &request).await.and_then(|run| {
        run.output
            .into_iter()
            .next()
            .ok_or(RunError::EmptyOutput)
    });

    match result {
        Ok(image) => {
            info!(theme = %theme, "Duck generated");
            GenerationOutcome::Success {
                image,
                entry: HistoryEntry::now(theme),
            }
        }
        Err(e) => {
            error!(theme = %theme, error = %e, "Generation failed");
            GenerationOutcome::Failure(GenerationErrorKind::from(&e))
        }
    }
}

type PendingSlot = Arc<Mutex<Option<(u64, GenerationOutcome)>>>;

/// Generator screen controller: state, history and the in-flight request.
pub struct Generator {
    pub state: GeneratorState,
    history: Stored<Vec<HistoryEntry>>,
    pending: PendingSlot,
    // Outcomes tagged with an older generation are dropped
    generation: u64,
}

impl Generator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: GeneratorState::default(),
            history: use_storage(store, HISTORY_KEY, Vec::new()),
            pending: Arc::new(Mutex::new(None)),
            generation: 0,
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.value()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.history.sync_status()
    }

    /// Starts a generation for the current theme. A missing client, a blank
    /// theme or a request already in flight make this a silent no-op.
    /// `on_done` runs on the runtime once the outcome is ready for `poll`.
    pub fn submit(
        &mut self,
        client: Option<Arc<dyn ModelClient>>,
        runtime: &Handle,
        on_done: impl FnOnce() + Send + 'static,
    ) -> bool {
        let Some(client) = client else {
            return false;
        };
        if !self.state.can_submit() {
            return false;
        }

        self.state.start();
        let theme = self.state.theme.clone();
        let slot = self.pending.clone();
        let generation = self.generation;
        runtime.spawn(async move {
            let outcome = run_generation(client.as_ref(), theme).await;
            if let Ok(mut slot) = slot.lock() {
                *slot = Some((generation, outcome));
            }
            on_done();
        });
        true
    }

    /// Applies a finished request, if any. Returns true when state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = self.history.refresh();
        let pending = self.pending.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some((generation, outcome)) if generation == self.generation => {
                self.apply(outcome);
                changed = true;
            }
            Some((generation, _)) => debug!(generation, "Dropping outcome of a discarded generation"),
            None => {}
        }
        changed
    }

    /// Discards the UI state. A request still in flight is ignored when it lands.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = GeneratorState::default();
    }

    pub fn apply(&mut self, outcome: GenerationOutcome) {
        match outcome {
            GenerationOutcome::Success { image, entry } => {
                self.state.succeed(image, &entry);
                let history = push_entry(self.history.value(), entry);
                self.history.set(history);
            }
            GenerationOutcome::Failure(kind) => self.state.fail(kind),
        }
        self.state.finish();
    }

    /// Copies a past theme into the input. Does not generate.
    pub fn select_history(&mut self, index: usize) {
        if let Some(entry) = self.history.value().get(index) {
            self.state.theme = entry.theme.clone();
        }
    }
}
