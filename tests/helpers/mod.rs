#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shelfvec::embedding::{BackendLoader, EmbedOptions, EmbeddingError, EmbeddingProvider};
use shelfvec::enrich::{EnrichConfig, EnrichmentService};

pub const DIM: usize = 8;
pub const MODEL: &str = "stub-model";

/// Deterministic vector `[0.1, 0.2, ..., 0.1]` of length `dim`.
pub fn stub_vector(dim: usize) -> Vec<f32> {
    (0..dim).map(|i| if i + 1 == dim { 0.1 } else { 0.1 * (i % 9 + 1) as f32 }).collect()
}

#[derive(Clone, Copy)]
pub enum Behavior {
    /// Return `stub_vector(len)`.
    Answer { len: usize },
    Fail,
    /// Sleep before answering.
    Hang(Duration),
}

/// Backend that records every text it receives.
pub struct StubBackend {
    behavior: Behavior,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for StubBackend {
    async fn embed(&self, text: &str, _options: &EmbedOptions) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        match self.behavior {
            Behavior::Answer { len } => Ok(stub_vector(len)),
            Behavior::Fail => Err(EmbeddingError::CallFailed("stub backend exploded".into())),
            Behavior::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(stub_vector(DIM))
            }
        }
    }

    fn dimensions(&self) -> usize {
        match self.behavior {
            Behavior::Answer { len } => len,
            _ => DIM,
        }
    }
}

/// Loader that hands out a shared backend and counts initializations.
pub struct CountingLoader {
    pub backend: Arc<StubBackend>,
    pub loads: AtomicUsize,
    pub load_delay: Duration,
    pub fail: bool,
}

impl CountingLoader {
    pub fn new(backend: Arc<StubBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            loads: AtomicUsize::new(0),
            load_delay: Duration::ZERO,
            fail: false,
        })
    }

    pub fn slow(backend: Arc<StubBackend>, load_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            backend,
            loads: AtomicUsize::new(0),
            load_delay,
            fail: false,
        })
    }

    pub fn failing(backend: Arc<StubBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            loads: AtomicUsize::new(0),
            load_delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail {
            return Err(EmbeddingError::Unavailable("model files missing".into()));
        }
        Ok(self.backend.clone())
    }
}

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().next() == Some(level))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's events at DEBUG and above into a [`CapturedLogs`]
/// until the guard drops. Use with the current-thread test runtime.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub fn test_config(timeout: Duration) -> EnrichConfig {
    EnrichConfig {
        dimensions: DIM,
        timeout,
        options: EmbedOptions::default(),
    }
}

/// Service over `loader` with length [`DIM`] and a 1 s timeout.
pub fn service(loader: Arc<CountingLoader>) -> EnrichmentService {
    EnrichmentService::new(loader, test_config(Duration::from_secs(1)))
}
