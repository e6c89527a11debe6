//! `sealpost seal`: seal one post from explicit files.

use sealpost_core::{BlockKind, CacheKey, ProtectedPost};

use super::open_sealer;
use crate::cli::SealArgs;
use crate::config::SealpostConfig;
use crate::helpers::{read_text, write_page};

pub async fn handle_seal(config: &SealpostConfig, args: &SealArgs, quiet: bool) -> anyhow::Result<()> {
    let key = CacheKey::new(&args.collection, &args.post)?;
    let post = ProtectedPost {
        key,
        hint: args.hint.clone(),
        prompt: args.prompt.clone(),
    };

    let mut blocks = vec![(BlockKind::Content, read_text(&args.body)?)];
    if let Some(path) = &args.toc {
        blocks.push((BlockKind::Toc, read_text(path)?));
    }
    if let Some(path) = &args.math {
        blocks.push((BlockKind::MathStyle, read_text(path)?));
    }

    let sealer = open_sealer(config)?;
    sealer.check_configuration(std::slice::from_ref(&post))?;
    let page = sealer.seal(&post, &blocks).await?;
    sealer.finish().await;

    match &args.out {
        Some(path) => {
            write_page(path, &page)?;
            if !quiet {
                eprintln!("Sealed {} into {}", post.key, path.display());
            }
        }
        None => {
            let json = page
                .to_json_pretty()
                .map_err(|e| anyhow::anyhow!("Failed to serialize page: {}", e))?;
            println!("{}", json);
        }
    }
    Ok(())
}
