use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use sealpost_core::{BlockKind, VERSION};

/// Sealpost - password-gated static content, unlocked on the reader's side
#[derive(Parser)]
#[command(name = "sealpost")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "SEALPOST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seal every protected post listed in the config
    Build(BuildArgs),

    /// Seal a single post from explicit files
    Seal(SealArgs),

    /// Unlock a sealed page the way a reader would
    Unlock(UnlockArgs),

    /// Describe a sealed page without decrypting it
    Inspect(InspectArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the `build` command
#[derive(Args)]
pub struct BuildArgs {
    /// Directory holding `<collection>/<post>.html` fragments
    #[arg(value_name = "CONTENT_DIR")]
    pub content_dir: PathBuf,

    /// Output directory for sealed pages
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,
}

/// Arguments for the `seal` command
#[derive(Args)]
pub struct SealArgs {
    /// Collection the post belongs to
    #[arg(long)]
    pub collection: String,

    /// Post id within the collection
    #[arg(long)]
    pub post: String,

    /// Rendered post body
    #[arg(long, value_name = "FILE")]
    pub body: PathBuf,

    /// Rendered table of contents
    #[arg(long, value_name = "FILE")]
    pub toc: Option<PathBuf>,

    /// Generated math stylesheet
    #[arg(long, value_name = "FILE")]
    pub math: Option<PathBuf>,

    /// Password field hint (overrides config)
    #[arg(long)]
    pub hint: Option<String>,

    /// Prompt shown above the password field (overrides config)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Write the sealed page here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Arguments for the `unlock` command
#[derive(Args)]
pub struct UnlockArgs {
    /// Sealed page JSON
    #[arg(value_name = "PAGE")]
    pub page: PathBuf,

    /// Read the password from the first line of stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Number of password attempts before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,

    /// Which block to print
    #[arg(long, value_enum, default_value_t = BlockArg::Content)]
    pub block: BlockArg,
}

/// Arguments for the `inspect` command
#[derive(Args)]
pub struct InspectArgs {
    /// Sealed page JSON
    #[arg(value_name = "PAGE")]
    pub page: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BlockArg {
    Content,
    Toc,
    Math,
}

impl From<BlockArg> for BlockKind {
    fn from(value: BlockArg) -> Self {
        match value {
            BlockArg::Content => BlockKind::Content,
            BlockArg::Toc => BlockKind::Toc,
            BlockArg::Math => BlockKind::MathStyle,
        }
    }
}
