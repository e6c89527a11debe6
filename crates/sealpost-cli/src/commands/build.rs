//! `sealpost build`: seal every protected post in the config.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sealpost_core::{BlockKind, ProtectedPost};

use super::open_sealer;
use crate::cli::BuildArgs;
use crate::config::SealpostConfig;
use crate::helpers::{read_optional_text, read_text, write_page};

pub async fn handle_build(config: &SealpostConfig, args: &BuildArgs, quiet: bool) -> anyhow::Result<()> {
    let posts = config.protected_posts()?;
    if posts.is_empty() {
        if !quiet {
            println!("No protected posts configured.");
        }
        return Ok(());
    }

    let sealer = open_sealer(config)?;
    sealer.check_configuration(&posts)?;

    let progress = progress_bar(posts.len(), quiet);
    for post in &posts {
        progress.set_message(post.key.to_string());

        let blocks = load_blocks(&args.content_dir, post)?;
        let page = sealer.seal(post, &blocks).await?;
        write_page(&output_path(&args.out, post), &page)?;

        progress.inc(1);
    }
    progress.finish_and_clear();

    sealer.finish().await;
    info!(posts = posts.len(), "build finished");

    if !quiet {
        println!("Sealed {} post(s) into {}", posts.len(), args.out.display());
    }
    Ok(())
}

/// `<dir>/<collection>/<post>.html`, plus optional `.toc.html` and `.math.css`.
fn load_blocks(content_dir: &Path, post: &ProtectedPost) -> anyhow::Result<Vec<(BlockKind, String)>> {
    let base = content_dir.join(post.key.collection());
    let id = post.key.post_id();

    let mut blocks = vec![(BlockKind::Content, read_text(&base.join(format!("{}.html", id)))?)];
    if let Some(toc) = read_optional_text(&base.join(format!("{}.toc.html", id)))? {
        blocks.push((BlockKind::Toc, toc));
    }
    if let Some(math) = read_optional_text(&base.join(format!("{}.math.css", id)))? {
        blocks.push((BlockKind::MathStyle, math));
    }
    Ok(blocks)
}

fn output_path(out: &Path, post: &ProtectedPost) -> PathBuf {
    out.join(post.key.collection())
        .join(format!("{}.json", post.key.post_id()))
}

fn progress_bar(len: usize, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} sealing [{pos}/{len}] {msg}") {
        bar.set_style(style);
    }
    bar
}
