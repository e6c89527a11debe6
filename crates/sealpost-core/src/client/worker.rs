//! Isolated key-derivation worker.
//!
//! The reader side re-runs the same Argon2id derivation as the build, which
//! claims 64 MiB and takes long enough to freeze anything sharing its thread.
//! A [`KeyWorker`] owns a dedicated OS thread that loads the derivation module
//! lazily on its first message and answers [`WorkerRequest`]s over a mailbox.
//!
//! ```text
//! Uninitialized ──DERIVE_KEY──▶ Deriving ──KEY_DERIVED──▶ Ready
//!                                   │
//!                                   └────────ERROR───────▶ Failed
//! ```
//!
//! A failed worker is never reused; callers spawn a new one.

use std::fmt;
use std::thread;

use argon2::Argon2;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{derive_key_with, DerivedKey, KdfParams, Salt};
use crate::error::{Result, SealError};

/// Request sent to the worker.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    DeriveKey { password: String, salt: Vec<u8> },
}

impl fmt::Debug for WorkerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRequest::DeriveKey { salt, .. } => f
                .debug_struct("DeriveKey")
                .field("password", &"[REDACTED]")
                .field("salt_len", &salt.len())
                .finish(),
        }
    }
}

/// Reply from the worker.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    KeyDerived { key: Vec<u8> },
    Error { error: String },
}

impl fmt::Debug for WorkerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerResponse::KeyDerived { .. } => f
                .debug_struct("KeyDerived")
                .field("key", &"[REDACTED]")
                .finish(),
            WorkerResponse::Error { error } => {
                f.debug_struct("Error").field("error", error).finish()
            }
        }
    }
}

/// Lifecycle of a [`KeyWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Deriving,
    Ready,
    Failed(String),
}

/// A loaded memory-hard derivation module.
pub trait KdfModule: Send {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey>;
}

/// Argon2id with the shared build parameters.
pub struct Argon2Module {
    argon2: Argon2<'static>,
}

impl Argon2Module {
    pub fn load() -> Result<Self> {
        Ok(Self {
            argon2: KdfParams::CURRENT.argon2()?,
        })
    }
}

impl KdfModule for Argon2Module {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey> {
        derive_key_with(&self.argon2, password, salt)
    }
}

/// Builds the derivation module inside the worker thread.
pub type ModuleLoader = Box<dyn FnOnce() -> Result<Box<dyn KdfModule>> + Send>;

fn default_loader() -> ModuleLoader {
    Box::new(|| Ok(Box::new(Argon2Module::load()?) as Box<dyn KdfModule>))
}

struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerResponse>,
}

/// Handle to one derivation thread.
pub struct KeyWorker {
    id: Uuid,
    mailbox: Option<mpsc::Sender<Job>>,
    state: WorkerState,
}

impl KeyWorker {
    /// Spawn a worker using Argon2id.
    pub fn spawn() -> Result<Self> {
        Self::spawn_with(default_loader())
    }

    /// Spawn a worker with a custom module loader.
    pub fn spawn_with(loader: ModuleLoader) -> Result<Self> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);

        thread::Builder::new()
            .name(format!("sealpost-kdf-{}", id.simple()))
            .spawn(move || run(id, loader, rx))
            .map_err(|e| SealError::Derivation(format!("Failed to start worker: {}", e)))?;

        debug!(worker = %id, "spawned key worker");
        Ok(Self {
            id,
            mailbox: Some(tx),
            state: WorkerState::Uninitialized,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Derive the key for `password` under `salt`.
    ///
    /// The mutable borrow keeps at most one request in flight. Dropping the
    /// returned future abandons the request; the worker finishes the run and
    /// discards the result.
    pub async fn derive_key(&mut self, password: &str, salt: &Salt) -> Result<DerivedKey> {
        if let WorkerState::Failed(reason) = &self.state {
            return Err(SealError::Derivation(format!(
                "Worker already failed: {}",
                reason
            )));
        }

        let Some(mailbox) = self.mailbox.as_ref() else {
            return Err(SealError::Derivation("Worker was terminated".to_string()));
        };

        let (reply, response) = oneshot::channel();
        let job = Job {
            request: WorkerRequest::DeriveKey {
                password: password.to_string(),
                salt: salt.as_bytes().to_vec(),
            },
            reply,
        };

        self.state = WorkerState::Deriving;
        if mailbox.send(job).await.is_err() {
            return Err(self.fail("worker exited".to_string()));
        }

        match response.await {
            Ok(WorkerResponse::KeyDerived { key }) => {
                let key = Zeroizing::new(key);
                match DerivedKey::from_slice(&key) {
                    Ok(derived) => {
                        self.state = WorkerState::Ready;
                        Ok(derived)
                    }
                    Err(err) => Err(self.fail(err.to_string())),
                }
            }
            Ok(WorkerResponse::Error { error }) => Err(self.fail(error)),
            Err(_) => Err(self.fail("worker stopped without replying".to_string())),
        }
    }

    fn fail(&mut self, reason: String) -> SealError {
        warn!(worker = %self.id, error = %reason, "key worker failed");
        self.mailbox = None;
        self.state = WorkerState::Failed(reason.clone());
        SealError::Derivation(reason)
    }

    /// Stop the worker. An in-flight derivation is abandoned.
    pub fn terminate(mut self) {
        self.mailbox = None;
        debug!(worker = %self.id, "terminated key worker");
    }
}

impl fmt::Debug for KeyWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyWorker")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

fn run(id: Uuid, loader: ModuleLoader, mut mailbox: mpsc::Receiver<Job>) {
    let Some(first) = mailbox.blocking_recv() else {
        return;
    };

    let module = match loader() {
        Ok(module) => module,
        Err(err) => {
            warn!(worker = %id, error = %err, "key worker could not load its module");
            let _ = first.reply.send(WorkerResponse::Error {
                error: err.to_string(),
            });
            return;
        }
    };

    handle(module.as_ref(), first);
    while let Some(job) = mailbox.blocking_recv() {
        handle(module.as_ref(), job);
    }
}

fn handle(module: &dyn KdfModule, job: Job) {
    let response = match job.request {
        WorkerRequest::DeriveKey { password, salt } => {
            let password = Zeroizing::new(password);
            match module.derive(&password, &salt) {
                Ok(key) => WorkerResponse::KeyDerived {
                    key: key.as_bytes().to_vec(),
                },
                Err(err) => WorkerResponse::Error {
                    error: err.to_string(),
                },
            }
        }
    };

    // The caller may have given up; the result is simply discarded.
    let _ = job.reply.send(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Cheap stand-in so protocol tests skip the 64 MiB derivation.
    struct XorModule;

    impl KdfModule for XorModule {
        fn derive(&self, password: &str, salt: &[u8]) -> Result<DerivedKey> {
            let mut key = [0u8; 32];
            for (i, byte) in key.iter_mut().enumerate() {
                let p = password.as_bytes()[i % password.len()];
                *byte = p ^ salt[i % salt.len()];
            }
            DerivedKey::from_slice(&key)
        }
    }

    fn xor_loader(loads: Arc<AtomicUsize>) -> ModuleLoader {
        Box::new(move || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(XorModule) as Box<dyn KdfModule>)
        })
    }

    fn salt() -> Salt {
        Salt::from_slice(&[3u8; 32]).unwrap()
    }

    #[test]
    fn test_request_wire_shape() {
        let request = WorkerRequest::DeriveKey {
            password: "pw".to_string(),
            salt: vec![1, 2],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "DERIVE_KEY");
        assert_eq!(json["salt"], serde_json::json!([1, 2]));

        let response: WorkerResponse =
            serde_json::from_str(r#"{"type":"ERROR","error":"boom"}"#).unwrap();
        assert!(matches!(response, WorkerResponse::Error { error } if error == "boom"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let request = WorkerRequest::DeriveKey {
            password: "hunter2".to_string(),
            salt: vec![0; 32],
        };
        assert!(!format!("{:?}", request).contains("hunter2"));

        let response = WorkerResponse::KeyDerived { key: vec![0xab; 32] };
        assert!(!format!("{:?}", response).contains("171"));
    }

    #[tokio::test]
    async fn test_module_loads_once_across_requests() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut worker = KeyWorker::spawn_with(xor_loader(Arc::clone(&loads))).unwrap();
        assert_eq!(worker.state(), &WorkerState::Uninitialized);

        let first = worker.derive_key("pw", &salt()).await.unwrap();
        let second = worker.derive_key("pw", &salt()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(worker.state(), &WorkerState::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        worker.terminate();
    }

    #[tokio::test]
    async fn test_loader_failure_fails_worker_for_good() {
        let loader: ModuleLoader =
            Box::new(|| Err(SealError::Derivation("module unavailable".to_string())));
        let mut worker = KeyWorker::spawn_with(loader).unwrap();

        let err = worker.derive_key("pw", &salt()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("module unavailable"));
        assert!(matches!(worker.state(), WorkerState::Failed(_)));

        assert!(worker.derive_key("pw", &salt()).await.is_err());
    }

    #[tokio::test]
    async fn test_argon2_worker_matches_build_derivation() {
        let mut worker = KeyWorker::spawn().unwrap();
        let from_worker = worker.derive_key("hunter2", &salt()).await.unwrap();
        let direct = crate::crypto::derive_key("hunter2", salt().as_bytes()).unwrap();

        assert_eq!(from_worker, direct);
    }
}
