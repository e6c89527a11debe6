//! `sealpost inspect`: describe a sealed page. Never decrypts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use sealpost_core::payload::{EncryptedBlock, SALT_BASE64_LENGTH};
use sealpost_core::BlockKind;

use crate::cli::InspectArgs;
use crate::helpers::read_page;

#[derive(Debug, Serialize)]
struct BlockSummary {
    kind: BlockKind,
    version: u8,
    ciphertext_bytes: Option<usize>,
    salt_matches_page: bool,
    valid: bool,
}

fn summarize(page_salt: &str, block: &EncryptedBlock) -> BlockSummary {
    let ciphertext_bytes = STANDARD.decode(&block.data.c).ok().map(|bytes| bytes.len());
    BlockSummary {
        kind: block.kind,
        version: block.data.v,
        ciphertext_bytes,
        salt_matches_page: block.data.s == page_salt,
        valid: block.data.decode().is_ok(),
    }
}

pub fn handle_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let page = read_page(&args.page)?;
    let blocks: Vec<BlockSummary> = page
        .blocks
        .iter()
        .map(|block| summarize(&page.salt, block))
        .collect();

    if args.json {
        let summary = serde_json::json!({
            "key": page.key,
            "hint": page.hint,
            "prompt": page.prompt,
            "salt_ok": page.salt.len() == SALT_BASE64_LENGTH,
            "blocks": blocks,
        });
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| anyhow::anyhow!("Failed to serialize summary: {}", e))?;
        println!("{}", json);
        return Ok(());
    }

    println!("key:    {}", page.key);
    println!("hint:   {}", page.hint);
    println!("prompt: {}", page.prompt);
    for block in &blocks {
        let size = block
            .ciphertext_bytes
            .map(|bytes| format!("{} bytes", bytes))
            .unwrap_or_else(|| "unreadable".to_string());
        let status = if block.valid && block.salt_matches_page {
            "ok"
        } else {
            "malformed"
        };
        println!("  {:<10} v{}  {:<14} {}", block.kind.as_str(), block.version, size, status);
    }
    Ok(())
}
