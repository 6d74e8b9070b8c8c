//! Command line inspector for dictionary authors.
//!
//! Resolves keys the way the engine would for a project and prints the result.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use page_i18n::I18n;
use page_i18n::config::ConfigManager;
use page_i18n::controller::{
    EnvLanguagePreference,
    FileStorage,
};
use page_i18n::dictionary::FileSource;
use tracing_subscriber::EnvFilter;

/// Name of the file, under the project root, that remembers the chosen locale
const STORAGE_FILE: &str = ".page-i18n-state.json";

#[derive(Debug, Parser)]
#[command(name = "page-i18n", version, about = "Resolve dictionary keys for a project")]
struct Cli {
    /// Project root holding `.page-i18n.json` and the dictionaries
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Locale to use instead of the detected one
    #[arg(long)]
    lang: Option<String>,

    /// Keys to resolve
    #[arg(required = true)]
    keys: Vec<String>,
}

#[tokio::main]
#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn main() -> ExitCode {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .init();

    let cli = Cli::parse();

    let mut config_manager = ConfigManager::new();
    if let Err(e) = config_manager.load_settings(Some(cli.root.clone())) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    let mut settings = config_manager.get_settings().clone();

    let source = FileSource::from_config(&cli.root, &settings.dictionaries);
    if settings.supported_locales.is_none() {
        match source.available_locales().await {
            Ok(locales) if !locales.is_empty() => {
                tracing::debug!(?locales, "Supported locales taken from the dictionary directory");
                settings.supported_locales =
                    Some(locales.iter().map(|l| l.as_str().to_string()).collect());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not list dictionaries"),
        }
    }
    let engine = I18n::builder(settings, Arc::new(source))
        .storage(Arc::new(FileStorage::new(cli.root.join(STORAGE_FILE))))
        .preference(Arc::new(EnvLanguagePreference))
        .build();

    match engine.init(cli.lang.as_deref()).await {
        Ok(outcome) => tracing::debug!(?outcome, "Engine ready"),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    }

    if let Some(locale) = engine.locale().await {
        println!("# {locale}");
    }
    for key in &cli.keys {
        let text = engine.text_or(key, "<unresolved>").await;
        println!("{key}\t{text}");
    }

    ExitCode::SUCCESS
}
