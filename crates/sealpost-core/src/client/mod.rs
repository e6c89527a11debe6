//! Reader-side unlocking.
//!
//! The reader only ever sees a [`ProtectedPage`](crate::payload::ProtectedPage).
//! From a typed password and the embedded salt it re-derives the build key on
//! an isolated worker, then decrypts each block with its own nonce.

pub mod decrypt;
pub mod session;
pub mod worker;

pub use decrypt::{decrypt_block, ContentKey};
pub use session::{DecryptSession, DecryptedBlock, LoaderFactory};
pub use worker::{
    Argon2Module, KdfModule, KeyWorker, ModuleLoader, WorkerRequest, WorkerResponse, WorkerState,
};
