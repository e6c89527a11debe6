//! Unlocking one protected page.

use std::sync::Arc;

use tracing::debug;

use super::decrypt::{decrypt_block, ContentKey};
use super::worker::{KeyWorker, ModuleLoader, WorkerState};
use crate::crypto::Salt;
use crate::error::{Result, SealError};
use crate::payload::{BlockKind, EncryptedBlock, ProtectedPage};

/// Produces a module loader for each new worker.
pub type LoaderFactory = Arc<dyn Fn() -> ModuleLoader + Send + Sync>;

/// A block after successful decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedBlock {
    pub kind: BlockKind,
    pub text: String,
}

/// Drives password submissions for one page.
///
/// A worker is created on the first submission. It is discarded on any
/// failure and terminated after a successful unlock.
pub struct DecryptSession {
    hint: String,
    blocks: Vec<EncryptedBlock>,
    worker: Option<KeyWorker>,
    loader: Option<LoaderFactory>,
    unlocked: bool,
}

impl DecryptSession {
    pub fn new(hint: impl Into<String>, blocks: Vec<EncryptedBlock>) -> Self {
        Self {
            hint: hint.into(),
            blocks,
            worker: None,
            loader: None,
            unlocked: false,
        }
    }

    pub fn for_page(page: &ProtectedPage) -> Self {
        Self::new(page.hint.clone(), page.blocks.clone())
    }

    /// Use `factory` instead of Argon2id for every worker this session spawns.
    pub fn with_loader(mut self, factory: LoaderFactory) -> Self {
        self.loader = Some(factory);
        self
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn worker_state(&self) -> Option<&WorkerState> {
        self.worker.as_ref().map(KeyWorker::state)
    }

    /// Try `password` against every block.
    ///
    /// Returns the decrypted blocks in page order. A wrong password and a
    /// corrupted block produce the same [`SealError::Decryption`].
    pub async fn submit(&mut self, password: &str) -> Result<Vec<DecryptedBlock>> {
        if self.blocks.is_empty() {
            return Ok(Vec::new());
        }

        let password = password.trim();
        if password.is_empty() {
            return Err(SealError::PasswordRequired(self.hint.clone()));
        }

        let salt = self.key_salt()?;

        if self.worker.is_none() {
            self.worker = Some(self.spawn_worker()?);
        }
        let Some(worker) = self.worker.as_mut() else {
            return Err(SealError::Derivation("Worker unavailable".to_string()));
        };

        let derived = match worker.derive_key(password, &salt).await {
            Ok(derived) => derived,
            Err(err) => {
                self.worker = None;
                return Err(err);
            }
        };
        let key = ContentKey::from(derived);

        let mut decrypted = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            match decrypt_block(&key, &block.data) {
                Ok(text) => decrypted.push(DecryptedBlock {
                    kind: block.kind,
                    text,
                }),
                Err(_) => {
                    debug!(block = %block.kind, "block failed to decrypt");
                    self.discard_worker();
                    return Err(SealError::Decryption);
                }
            }
        }

        self.discard_worker();
        self.unlocked = true;
        Ok(decrypted)
    }

    /// Salt from the content block, else the toc, else whatever comes first.
    fn key_salt(&self) -> Result<Salt> {
        let source = self
            .block(BlockKind::Content)
            .or_else(|| self.block(BlockKind::Toc))
            .or_else(|| self.blocks.first());

        match source {
            Some(block) => block.data.salt().map_err(|_| SealError::Decryption),
            None => Err(SealError::Decryption),
        }
    }

    fn block(&self, kind: BlockKind) -> Option<&EncryptedBlock> {
        self.blocks.iter().find(|block| block.kind == kind)
    }

    fn spawn_worker(&self) -> Result<KeyWorker> {
        match &self.loader {
            Some(factory) => KeyWorker::spawn_with(factory()),
            None => KeyWorker::spawn(),
        }
    }

    fn discard_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.terminate();
        }
    }
}

impl std::fmt::Debug for DecryptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptSession")
            .field("blocks", &self.blocks.len())
            .field("worker", &self.worker)
            .field("unlocked", &self.unlocked)
            .finish_non_exhaustive()
    }
}
