use crate::api::{self, store::NavStore, AppState};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub groups_path: Option<PathBuf>,
    pub token_secret: SecretString,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the groups seed cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = match &args.groups_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read groups file {}", path.display()))?;
            NavStore::from_json(&raw)
                .with_context(|| format!("Invalid groups file {}", path.display()))?
        }
        None => NavStore::builtin_seed().context("Invalid embedded groups seed")?,
    };

    log_startup_args(&args, &store);

    let state = Arc::new(AppState::new(store, args.token_secret));

    api::new(args.port, state).await
}

fn log_startup_args(args: &Args, store: &NavStore) {
    let groups_source = args
        .groups_path
        .as_ref()
        .map_or_else(|| "embedded".to_string(), |path| path.display().to_string());
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("groups", groups_source),
        ("group_count", store.len().to_string()),
        (
            "protected_count",
            store.protected_count().to_string(),
        ),
        // Secret value never logged.
        ("token_secret_set", "true".to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", faro_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn faro_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    FARO_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const FARO_BANNER: &str = r"
      __
     /  \
    | () |
    |    |   F A R O {VERSION}
    |____|
   /______\";
