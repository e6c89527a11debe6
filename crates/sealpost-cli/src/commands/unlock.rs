//! `sealpost unlock`: decrypt a sealed page the way a reader's browser would.

use sealpost_core::{BlockKind, DecryptSession, SealError};
use tracing::debug;

use crate::cli::UnlockArgs;
use crate::helpers::{prompt_password, read_page, read_password_stdin};

pub async fn handle_unlock(args: &UnlockArgs, quiet: bool) -> anyhow::Result<()> {
    let page = read_page(&args.page)?;
    let wanted = BlockKind::from(args.block);

    let mut session = DecryptSession::for_page(&page);
    let attempts = if args.password_stdin { 1 } else { args.attempts };

    if !quiet && !args.password_stdin && !page.prompt.is_empty() {
        eprintln!("{}", page.prompt);
    }

    let mut last_err = SealError::Decryption;
    for attempt in 1..=attempts {
        let password = if args.password_stdin {
            read_password_stdin()?
        } else {
            prompt_password(session.hint())?
        };

        match session.submit(&password).await {
            Ok(blocks) => {
                let Some(block) = blocks.iter().find(|block| block.kind == wanted) else {
                    return Err(anyhow::anyhow!("Page has no {} block", wanted));
                };
                print!("{}", block.text);
                return Ok(());
            }
            Err(err) if err.is_retryable() => {
                debug!(attempt, "unlock attempt failed");
                eprintln!("{}", err);
                last_err = err;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(anyhow::anyhow!("{} after {} attempt(s)", last_err, attempts))
}
