//! Lifecycle of the single loaded model.
//!
//! [`ModelContext`] owns at most one native model handle.  Every operation
//! goes through one mutex, so load, release and inference can never race on
//! the same handle.  Hold a [`ContextGuard`] (from [`ModelContext::lock`])
//! to run several steps as one critical section.
//!
//! ```text
//!            load(X)                 load(Y), Y != X
//! Unloaded ──────────▶ Loaded(X) ───────────────────▶ release X ─▶ Loaded(Y)
//!    ▲                   │  │ load(X): no-op
//!    └─── release() ─────┘  └──────────────
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::stt::engine::{SpeechEngine, SpeechModel, SttError};
use crate::stt::model::ModelStore;
use crate::stt::transcribe::{RunParameters, Segment};

struct LoadedModel {
    name: String,
    path: PathBuf,
    handle: Box<dyn SpeechModel>,
}

#[derive(Default)]
struct Slot {
    loaded: Option<LoadedModel>,
}

/// Explicitly constructed, explicitly shared owner of the loaded model.
///
/// Share it as `Arc<ModelContext>`; independent instances never interfere.
pub struct ModelContext {
    engine: Arc<dyn SpeechEngine>,
    store: ModelStore,
    slot: Mutex<Slot>,
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("store", &self.store)
            .field("loaded", &self.loaded_model())
            .finish_non_exhaustive()
    }
}

impl ModelContext {
    pub fn new(engine: Arc<dyn SpeechEngine>, store: ModelStore) -> Self {
        Self {
            engine,
            store,
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Take exclusive access.  Blocks while another caller holds it.
    pub fn lock(&self) -> ContextGuard<'_> {
        // A panic while holding the lock cannot leave the slot half-written:
        // it is only ever assigned whole values.
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        ContextGuard { ctx: self, slot }
    }

    /// See [`ContextGuard::load`].
    pub fn load(&self, model_name: &str) -> Result<(), SttError> {
        self.lock().load(model_name)
    }

    /// See [`ContextGuard::release`].
    pub fn release(&self) {
        self.lock().release()
    }

    /// See [`ContextGuard::is_loaded`].
    pub fn is_loaded(&self, model_name: &str) -> bool {
        self.lock().is_loaded(model_name)
    }

    /// Name of the currently loaded model, if any.
    pub fn loaded_model(&self) -> Option<String> {
        self.lock().slot.loaded.as_ref().map(|m| m.name.clone())
    }
}

/// Exclusive access to a [`ModelContext`].
pub struct ContextGuard<'a> {
    ctx: &'a ModelContext,
    slot: MutexGuard<'a, Slot>,
}

impl ContextGuard<'_> {
    /// Make `model_name` the loaded model.
    ///
    /// A no-op when it already is.  Otherwise the previous handle is fully
    /// released before the new one is initialised.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: no `ggml-<name>.bin`; the current
    ///   model (if any) stays loaded.
    /// - [`SttError::ContextInitializationFailed`]: the context is left
    ///   unloaded.
    pub fn load(&mut self, model_name: &str) -> Result<(), SttError> {
        let path = self.ctx.store.resolve(model_name)?;

        if self.is_current(model_name, &path) {
            log::debug!("stt: model '{model_name}' already loaded");
            return Ok(());
        }

        self.release();

        log::info!("stt: loading model '{model_name}' from {}", path.display());
        let handle = self.ctx.engine.init(&path).map_err(|e| {
            log::error!("stt: failed to initialise '{model_name}': {e}");
            e
        })?;

        self.slot.loaded = Some(LoadedModel {
            name: model_name.to_string(),
            path,
            handle,
        });
        log::info!("stt: model '{model_name}' loaded");
        Ok(())
    }

    /// Free the loaded model.  Idempotent.
    pub fn release(&mut self) {
        if let Some(old) = self.slot.loaded.take() {
            log::info!("stt: releasing model '{}'", old.name);
            drop(old.handle);
        }
    }

    pub fn is_loaded(&self, model_name: &str) -> bool {
        self.slot
            .loaded
            .as_ref()
            .is_some_and(|m| m.name == model_name)
    }

    fn is_current(&self, model_name: &str, path: &Path) -> bool {
        self.slot
            .loaded
            .as_ref()
            .is_some_and(|m| m.name == model_name && m.path == path)
    }

    /// Run inference on the loaded model and read back every segment in
    /// emission order.
    ///
    /// # Errors
    ///
    /// - [`SttError::ContextInitializationFailed`]: nothing is loaded.
    /// - [`SttError::InferenceFailed`]: the engine returned an error code.
    pub fn run(&mut self, params: &RunParameters, samples: &[f32]) -> Result<Vec<Segment>, SttError> {
        let model = self.slot.loaded.as_mut().ok_or_else(|| {
            SttError::ContextInitializationFailed("no model loaded".into())
        })?;

        log::info!(
            "stt: running inference on {} samples with '{}'",
            samples.len(),
            model.name
        );
        model.handle.full(params, samples)?;

        let n = model.handle.n_segments()?;
        (0..n)
            .map(|i| model.handle.segment(i).map(Segment::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::engine::{MockSpeechEngine, RawSegment};
    use crate::stt::transcribe::LanguageHint;
    use tempfile::{tempdir, TempDir};

    fn models_dir(names: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(ModelStore::file_name(name)), b"x").unwrap();
        }
        dir
    }

    fn context(engine: &MockSpeechEngine, dir: &TempDir) -> ModelContext {
        ModelContext::new(Arc::new(engine.clone()), ModelStore::new(dir.path()))
    }

    #[test]
    fn loading_same_model_twice_initialises_once() {
        let dir = models_dir(&["tiny"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = context(&engine, &dir);

        ctx.load("tiny").unwrap();
        ctx.load("tiny").unwrap();

        assert_eq!(engine.inits(), 1);
        assert!(ctx.is_loaded("tiny"));
    }

    #[test]
    fn swapping_models_releases_before_init() {
        let dir = models_dir(&["tiny", "base"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = context(&engine, &dir);

        ctx.load("tiny").unwrap();
        ctx.load("base").unwrap();

        assert_eq!(engine.inits(), 2);
        assert_eq!(engine.frees(), 1);
        assert_eq!(engine.max_live(), 1, "two handles were alive at once");
        assert!(ctx.is_loaded("base"));
        assert!(!ctx.is_loaded("tiny"));
        assert_eq!(
            *engine.log.init_paths.lock().unwrap(),
            vec![dir.path().join("ggml-tiny.bin"), dir.path().join("ggml-base.bin")]
        );
    }

    #[test]
    fn missing_model_keeps_current_one() {
        let dir = models_dir(&["tiny"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = context(&engine, &dir);

        ctx.load("tiny").unwrap();
        assert_eq!(ctx.load("medium"), Err(SttError::ModelNotFound("medium".into())));
        assert!(ctx.is_loaded("tiny"));
        assert_eq!(engine.frees(), 0);
    }

    #[test]
    fn failed_init_leaves_context_unloaded() {
        let dir = models_dir(&["tiny"]);
        let engine = MockSpeechEngine::failing_init();
        let ctx = context(&engine, &dir);

        let err = ctx.load("tiny").unwrap_err();
        assert!(matches!(err, SttError::ContextInitializationFailed(_)));
        assert_eq!(ctx.loaded_model(), None);
    }

    #[test]
    fn release_is_idempotent() {
        let dir = models_dir(&["small"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = context(&engine, &dir);

        ctx.release();
        ctx.load("small").unwrap();
        ctx.release();
        ctx.release();

        assert_eq!(engine.frees(), 1);
        assert!(!ctx.is_loaded("small"));
    }

    #[test]
    fn dropping_context_frees_handle() {
        let dir = models_dir(&["tiny"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        {
            let ctx = context(&engine, &dir);
            ctx.load("tiny").unwrap();
            assert_eq!(engine.live(), 1);
        }
        assert_eq!(engine.live(), 0);
    }

    #[test]
    fn run_without_model_is_an_error() {
        let dir = models_dir(&[]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = context(&engine, &dir);

        let params = RunParameters::new(LanguageHint::Auto);
        let err = ctx.lock().run(&params, &[0.0; 16]).unwrap_err();
        assert!(matches!(err, SttError::ContextInitializationFailed(_)));
        assert_eq!(engine.runs(), 0);
    }

    #[test]
    fn run_reads_back_segments_in_order() {
        let dir = models_dir(&["base"]);
        let engine = MockSpeechEngine::with_segments(vec![
            RawSegment { text: " one".into(), t0: 0, t1: 120 },
            RawSegment { text: "two ".into(), t0: 120, t1: 300 },
        ]);
        let ctx = context(&engine, &dir);

        let mut guard = ctx.lock();
        guard.load("base").unwrap();
        let segments = guard
            .run(&RunParameters::new(LanguageHint::Auto), &[0.0; 32])
            .unwrap();

        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["one", "two"]);
        assert_eq!(segments[1].start_cs, 120);
    }

    #[test]
    fn concurrent_callers_never_overlap() {
        let dir = models_dir(&["tiny", "base"]);
        let engine = MockSpeechEngine::with_segments(Vec::new());
        let ctx = Arc::new(context(&engine, &dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    let name = if i % 2 == 0 { "tiny" } else { "base" };
                    let mut guard = ctx.lock();
                    guard.load(name).unwrap();
                    guard
                        .run(&RunParameters::new(LanguageHint::Auto), &[0.0; 8])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(engine.max_live(), 1);
        assert_eq!(engine.runs(), 8);
    }
}
