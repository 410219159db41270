//! Model registry to ensure engines are constructed once and shared across requests.
//!
//! Each engine kind has its own `OnceCell`. The first caller runs the factory
//! while concurrent callers for the same kind wait on that construction; once
//! a cell is filled, reads are a lock-free atomic check. A failed construction
//! leaves the cell empty so other kinds are unaffected and a later request can
//! retry.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::engines::{
    Captioner, EngineFactory, EngineKind, NoiseReducer, ObjectDetector, SpeechToText,
    TextToSpeech, Translator,
};
use crate::{Error, Result};

/// Lazily constructed, process-lifetime engine handles
pub struct ModelRegistry {
    factory: Arc<dyn EngineFactory>,
    speech_to_text: OnceCell<Arc<dyn SpeechToText>>,
    noise_reducer: OnceCell<Arc<dyn NoiseReducer>>,
    object_detector: OnceCell<Arc<dyn ObjectDetector>>,
    captioner: OnceCell<Arc<dyn Captioner>>,
    translator: OnceCell<Arc<dyn Translator>>,
    text_to_speech: OnceCell<Arc<dyn TextToSpeech>>,
}

impl ModelRegistry {
    /// Create an empty registry backed by `factory`
    #[must_use]
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            speech_to_text: OnceCell::new(),
            noise_reducer: OnceCell::new(),
            object_detector: OnceCell::new(),
            captioner: OnceCell::new(),
            translator: OnceCell::new(),
            text_to_speech: OnceCell::new(),
        }
    }

    /// Speech recognition engine
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>> {
        load(&self.speech_to_text, EngineKind::SpeechToText, || {
            self.factory.speech_to_text()
        })
        .await
    }

    /// Noise reducer
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn noise_reducer(&self) -> Result<Arc<dyn NoiseReducer>> {
        load(&self.noise_reducer, EngineKind::NoiseReducer, || {
            self.factory.noise_reducer()
        })
        .await
    }

    /// Object detector
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>> {
        load(&self.object_detector, EngineKind::ObjectDetector, || {
            self.factory.object_detector()
        })
        .await
    }

    /// Image captioner
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn captioner(&self) -> Result<Arc<dyn Captioner>> {
        load(&self.captioner, EngineKind::Captioner, || self.factory.captioner()).await
    }

    /// Translator
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn translator(&self) -> Result<Arc<dyn Translator>> {
        load(&self.translator, EngineKind::Translator, || self.factory.translator()).await
    }

    /// Speech synthesizer
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn text_to_speech(&self) -> Result<Arc<dyn TextToSpeech>> {
        load(&self.text_to_speech, EngineKind::TextToSpeech, || {
            self.factory.text_to_speech()
        })
        .await
    }

    /// Construct `kind` if it is not loaded yet
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`] if the engine cannot be built
    pub async fn ensure(&self, kind: EngineKind) -> Result<()> {
        match kind {
            EngineKind::SpeechToText => self.speech_to_text().await.map(drop),
            EngineKind::NoiseReducer => self.noise_reducer().await.map(drop),
            EngineKind::ObjectDetector => self.object_detector().await.map(drop),
            EngineKind::Captioner => self.captioner().await.map(drop),
            EngineKind::Translator => self.translator().await.map(drop),
            EngineKind::TextToSpeech => self.text_to_speech().await.map(drop),
        }
    }

    /// Eagerly construct every kind in `kinds`, returning the failures
    ///
    /// A failing kind does not stop the others from loading.
    pub async fn preload(&self, kinds: &[EngineKind]) -> Vec<Error> {
        let mut failures = Vec::new();
        for &kind in kinds {
            if let Err(e) = self.ensure(kind).await {
                tracing::warn!(engine = %kind, error = %e, "preload failed");
                failures.push(e);
            }
        }
        failures
    }

    /// Whether `kind` has been constructed
    #[must_use]
    pub fn is_loaded(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::SpeechToText => self.speech_to_text.initialized(),
            EngineKind::NoiseReducer => self.noise_reducer.initialized(),
            EngineKind::ObjectDetector => self.object_detector.initialized(),
            EngineKind::Captioner => self.captioner.initialized(),
            EngineKind::Translator => self.translator.initialized(),
            EngineKind::TextToSpeech => self.text_to_speech.initialized(),
        }
    }

    /// Every constructed kind, in pipeline order
    #[must_use]
    pub fn loaded(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .into_iter()
            .filter(|&kind| self.is_loaded(kind))
            .collect()
    }
}

/// Return the cached handle or run `build` exactly once for this cell
async fn load<T, F, Fut>(cell: &OnceCell<Arc<T>>, kind: EngineKind, build: F) -> Result<Arc<T>>
where
    T: ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<T>>>,
{
    if let Some(handle) = cell.get() {
        return Ok(Arc::clone(handle));
    }

    let handle = cell
        .get_or_try_init(move || async move {
            tracing::info!(engine = %kind, "loading engine");
            let started = std::time::Instant::now();
            let handle = build().await.map_err(|e| Error::EngineConstruction {
                kind,
                reason: e.to_string(),
            })?;
            tracing::info!(
                engine = %kind,
                elapsed_ms = started.elapsed().as_millis(),
                "engine ready"
            );
            Ok::<_, Error>(handle)
        })
        .await
        .inspect_err(|e| tracing::error!(engine = %kind, error = %e, "engine construction failed"))?;

    Ok(Arc::clone(handle))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::engines::{DecodingOptions, MediaBlob};

    struct Echo;

    #[async_trait]
    impl SpeechToText for Echo {
        async fn transcribe(&self, _audio: &MediaBlob, _options: &DecodingOptions) -> Result<String> {
            Ok("echo".to_string())
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    /// Builds speech engines only, failing the first `fail_first` attempts
    struct Counting {
        builds: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl EngineFactory for Counting {
        async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if n < self.fail_first {
                return Err(Error::Config("model file missing".to_string()));
            }
            Ok(Arc::new(Echo))
        }

        async fn noise_reducer(&self) -> Result<Arc<dyn NoiseReducer>> {
            Err(Error::Config("unavailable".to_string()))
        }

        async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>> {
            Err(Error::Config("unavailable".to_string()))
        }

        async fn captioner(&self) -> Result<Arc<dyn Captioner>> {
            Err(Error::Config("unavailable".to_string()))
        }

        async fn translator(&self) -> Result<Arc<dyn Translator>> {
            Err(Error::Config("unavailable".to_string()))
        }

        async fn text_to_speech(&self) -> Result<Arc<dyn TextToSpeech>> {
            Err(Error::Config("unavailable".to_string()))
        }
    }

    fn registry(fail_first: usize) -> (Arc<Counting>, ModelRegistry) {
        let factory = Arc::new(Counting {
            builds: AtomicUsize::new(0),
            fail_first,
        });
        let registry = ModelRegistry::new(factory.clone());
        (factory, registry)
    }

    #[tokio::test]
    async fn constructs_once_and_caches() {
        let (factory, registry) = registry(0);

        let first = registry.speech_to_text().await.unwrap();
        let second = registry.speech_to_text().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded(EngineKind::SpeechToText));
        assert_eq!(registry.loaded(), vec![EngineKind::SpeechToText]);
    }

    #[tokio::test]
    async fn failure_is_reported_and_retried() {
        let (factory, registry) = registry(1);

        let err = registry.speech_to_text().await.err().unwrap();
        assert!(matches!(
            err,
            Error::EngineConstruction {
                kind: EngineKind::SpeechToText,
                ..
            }
        ));
        assert!(err.is_fatal());
        assert!(!registry.is_loaded(EngineKind::SpeechToText));

        assert!(registry.speech_to_text().await.is_ok());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_kind_does_not_block_others() {
        let (_factory, registry) = registry(0);

        assert!(registry.translator().await.is_err());
        assert!(registry.speech_to_text().await.is_ok());

        let failures = registry.preload(&EngineKind::ALL).await;
        assert_eq!(failures.len(), 5);
        assert_eq!(registry.loaded(), vec![EngineKind::SpeechToText]);
    }
}
