use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "modlang",
    version,
    about = "Fill in missing entries of mod locale files using an LLM"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate every lang/<source>.json under DIR into lang/<target>.json
    #[command(visible_alias = "tr")]
    Translate(TranslateArgs),
}

#[derive(clap::Args, Debug)]
struct TranslateArgs {
    /// Root directory to scan
    dir: PathBuf,

    /// Source locale code
    #[arg(short = 's', long = "source", default_value = "en_us")]
    source: String,

    /// Target locale code
    #[arg(short = 't', long = "target", default_value = "ja_jp")]
    target: String,

    /// Glossary CSV with one column per locale code
    #[arg(short = 'g', long = "glossary")]
    glossary: Option<PathBuf>,

    /// Provider or provider:model (e.g. gemini:gemini-2.5-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Entries per request
    #[arg(short = 'b', long = "batch-size")]
    batch_size: Option<NonZeroUsize>,

    /// Report what is outstanding without calling the service or writing files
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    modlang_translator::logging::init(cli.verbose)?;

    match cli.command {
        Command::Translate(args) => {
            let config = modlang_translator::Config {
                root: args.dir,
                source_lang: args.source,
                target_lang: args.target,
                glossary: args.glossary,
                model: args.model,
                key: args.key,
                batch_size: args.batch_size,
                dry_run: args.dry_run,
                settings_path: args.read_settings,
            };
            modlang_translator::run(config).await?;
        }
    }
    Ok(())
}
