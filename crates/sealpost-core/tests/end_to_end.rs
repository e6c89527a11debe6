use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use sealpost_core::client::{
    Argon2Module, DecryptSession, KdfModule, LoaderFactory, ModuleLoader, WorkerState,
};
use sealpost_core::{
    BlockKind, CacheKey, KeyCache, PasswordMap, PostSealer, PromptDefaults, ProtectedPage,
    ProtectedPost, SealError, SqliteCacheStore, DECRYPTION_FAILED_MESSAGE,
};

fn sealer(passwords: &str) -> PostSealer {
    let store = Arc::new(SqliteCacheStore::open_in_memory().expect("open cache"));
    let cache = KeyCache::new(store, b"master-secret", b"master-salt").expect("cache handle");
    let passwords = PasswordMap::from_json(passwords).expect("password map");
    PostSealer::new(cache, passwords, PromptDefaults::default())
}

async fn seal_hello(blocks: Vec<(BlockKind, String)>) -> ProtectedPage {
    let sealer = sealer(r#"{"posts:hello":"hunter2"}"#);
    let post = ProtectedPost::new(CacheKey::new("posts", "hello").expect("valid key"));
    let page = sealer.seal(&post, &blocks).await.expect("seal should succeed");
    sealer.finish().await;
    page
}

#[tokio::test]
async fn test_correct_password_unlocks_body() {
    let page = seal_hello(vec![(BlockKind::Content, "<p>secret</p>".to_string())]).await;
    assert_eq!(page.hint, "Enter password");

    let mut session = DecryptSession::for_page(&page);
    let blocks = session.submit("hunter2").await.expect("unlock should succeed");

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].kind, BlockKind::Content);
    assert_eq!(blocks[0].text, "<p>secret</p>");
    assert!(session.is_unlocked());
    assert!(session.worker_state().is_none());
}

#[tokio::test]
async fn test_surrounding_whitespace_is_trimmed() {
    let page = seal_hello(vec![(BlockKind::Content, "<p>secret</p>".to_string())]).await;

    let mut session = DecryptSession::for_page(&page);
    let blocks = session.submit("  hunter2\n").await.expect("unlock should succeed");
    assert_eq!(blocks[0].text, "<p>secret</p>");
}

#[tokio::test]
async fn test_wrong_password_is_generic_and_retryable() {
    let page = seal_hello(vec![(BlockKind::Content, "<p>secret</p>".to_string())]).await;

    let mut session = DecryptSession::for_page(&page);
    let err = session.submit("wrong").await.expect_err("wrong password must fail");

    assert!(matches!(err, SealError::Decryption));
    assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
    assert!(!session.is_unlocked());
    assert!(session.worker_state().is_none());

    let blocks = session.submit("hunter2").await.expect("retry should succeed");
    assert_eq!(blocks[0].text, "<p>secret</p>");
}

#[tokio::test]
async fn test_body_and_toc_share_one_derivation() {
    let page = seal_hello(vec![
        (BlockKind::Content, "<p>body</p>".to_string()),
        (BlockKind::Toc, "<ol><li>intro</li></ol>".to_string()),
    ])
    .await;

    let content = page.block(BlockKind::Content).expect("content block");
    let toc = page.block(BlockKind::Toc).expect("toc block");
    assert_eq!(content.s, toc.s);
    assert_ne!(content.n, toc.n);

    let loads = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&loads);
    let factory: LoaderFactory = Arc::new(move || {
        counted.fetch_add(1, Ordering::SeqCst);
        let loader: ModuleLoader =
            Box::new(|| Ok(Box::new(Argon2Module::load()?) as Box<dyn KdfModule>));
        loader
    });

    let mut session = DecryptSession::for_page(&page).with_loader(factory);
    let blocks = session.submit("hunter2").await.expect("unlock should succeed");

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(blocks[0].text, "<p>body</p>");
    assert_eq!(blocks[1].kind, BlockKind::Toc);
    assert_eq!(blocks[1].text, "<ol><li>intro</li></ol>");
}

/// Flip one bit of the sealed bytes, picking the byte from their length
/// (ciphertext followed by the 16-byte tag), and try the right password.
async fn unlock_with_flipped_bit(pick: impl Fn(usize) -> usize, mask: u8) -> SealError {
    let mut page = seal_hello(vec![(BlockKind::Content, "<p>secret</p>".to_string())]).await;

    let data = &mut page.blocks[0].data;
    let mut sealed = STANDARD.decode(&data.c).expect("ciphertext is base64");
    let index = pick(sealed.len());
    sealed[index] ^= mask;
    data.c = STANDARD.encode(sealed);

    let mut session = DecryptSession::for_page(&page);
    let err = session.submit("hunter2").await.expect_err("tamper must fail");
    assert!(!session.is_unlocked());
    err
}

#[tokio::test]
async fn test_single_bit_tamper_is_generic_failure() {
    let err = unlock_with_flipped_bit(|_| 0, 0x01).await;
    assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_tamper_in_middle_of_ciphertext_is_generic_failure() {
    // "<p>secret</p>" is 13 bytes, so index 6 is ciphertext, not tag.
    let err = unlock_with_flipped_bit(|len| (len - 16) / 2, 0x10).await;
    assert!(matches!(err, SealError::Decryption));
    assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_tamper_in_auth_tag_is_generic_failure() {
    let err = unlock_with_flipped_bit(|len| len - 1, 0x80).await;
    assert!(matches!(err, SealError::Decryption));
    assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);

    let err = unlock_with_flipped_bit(|len| len - 16, 0x01).await;
    assert_eq!(err.to_string(), DECRYPTION_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_worker_init_failure_then_fresh_worker_succeeds() {
    let page = seal_hello(vec![(BlockKind::Content, "<p>secret</p>".to_string())]).await;

    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&attempts);
    let factory: LoaderFactory = Arc::new(move || {
        let attempt = counted.fetch_add(1, Ordering::SeqCst);
        let loader: ModuleLoader = Box::new(move || {
            if attempt == 0 {
                return Err(SealError::Derivation("module failed to load".to_string()));
            }
            Ok(Box::new(Argon2Module::load()?) as Box<dyn KdfModule>)
        });
        loader
    });

    let mut session = DecryptSession::for_page(&page).with_loader(factory);

    let err = session.submit("hunter2").await.expect_err("first worker fails");
    assert!(matches!(err, SealError::Derivation(_)));
    assert!(err.is_retryable());
    assert!(session.worker_state().is_none());

    let blocks = session.submit("hunter2").await.expect("fresh worker succeeds");
    assert_eq!(blocks[0].text, "<p>secret</p>");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert!(!matches!(session.worker_state(), Some(WorkerState::Failed(_))));
}

#[tokio::test]
async fn test_missing_password_fails_before_derivation() {
    let sealer = sealer(r#"{"posts:hello":"hunter2"}"#);
    let posts = vec![
        (
            ProtectedPost::new(CacheKey::new("posts", "hello").expect("valid key")),
            vec![(BlockKind::Content, "a".to_string())],
        ),
        (
            ProtectedPost::new(CacheKey::new("oi", "p1").expect("valid key")),
            vec![(BlockKind::Content, "b".to_string())],
        ),
    ];

    let err = sealer.seal_all(&posts).await.expect_err("missing password");
    assert!(err.to_string().contains("Password not found for oi:p1"));
    assert_eq!(sealer.cache().pending_writes(), 0);
    assert!(sealer.cache().store().is_empty().expect("count rows"));
}

#[tokio::test]
async fn test_page_round_trips_through_json() {
    let page = seal_hello(vec![
        (BlockKind::Content, "<p>body</p>".to_string()),
        (BlockKind::MathStyle, ".katex{}".to_string()),
    ])
    .await;

    let json = page.to_json_pretty().expect("serialize page");
    assert!(json.contains("\"type\": \"mathStyle\""));

    let parsed = ProtectedPage::from_json(&json).expect("parse page");
    let mut session = DecryptSession::for_page(&parsed);
    let blocks = session.submit("hunter2").await.expect("unlock should succeed");
    assert_eq!(blocks[1].text, ".katex{}");
}
