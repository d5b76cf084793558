use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config_store::ConfigStore;
use crate::controller::{ForgeSettings, PromptForge};
use crate::generation::HttpGenerationClient;
use crate::local_storage::FileStorage;
use crate::path_utils::{get_base_dir, resolve_config_path, storage_path};
use crate::server::{AppServer, AppState};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: Option<String>,
}

pub fn parse_args<I>(args: I) -> Args
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(value) = args.next() {
                config = Some(value);
            }
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config = Some(value.to_string());
        }
    }

    Args { config }
}

/// Everything needed to start serving: shared state and the port to try first.
pub struct Launch {
    pub state: Arc<AppState>,
    pub preferred_port: u16,
    pub config_path: PathBuf,
}

pub fn prepare(args: Args) -> Result<Launch> {
    let base_dir = get_base_dir();
    let config_path = resolve_config_path(args.config, &base_dir);

    let config = ConfigStore::new(config_path.clone())
        .with_context(|| format!("config error: {}", config_path.display()))?;
    let storage = FileStorage::open(storage_path(&config_path))
        .context("storage error: failed to open storage file")?;
    tracing::info!("using storage {}", storage.path().display());

    let settings = ForgeSettings {
        choices: config.field_choices(),
        history_max_entries: config.history_max_entries(),
        export_default_name: config.export_default_name(),
        model: config.model(),
    };
    let forge = PromptForge::new(Box::new(storage), settings)
        .context("failed to restore the last form snapshot")?;

    let client = Arc::new(HttpGenerationClient::new(config.generate_url()));
    tracing::info!("generation endpoint {}", client.url());

    let state = Arc::new(AppState::new(forge, client, config.input_debounce()));
    tracing::debug!(
        "input gating debounce {} ms",
        state.input_debounce.window().as_millis()
    );
    Ok(Launch {
        state,
        preferred_port: config.server_port(),
        config_path,
    })
}

/// Prepares the state and starts the local server.
pub fn start(args: Args) -> Result<AppServer> {
    let launch = prepare(args)?;
    let server = AppServer::start(launch.state, launch.preferred_port)
        .context("failed to start local server")?;
    tracing::info!(
        "serving on http://127.0.0.1:{}/ (config {})",
        server.port(),
        launch.config_path.display()
    );
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::{parse_args, prepare, Args};
    use crate::local_storage::tests::fixture_dir;
    use std::fs;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reads_config_flag_in_both_forms() {
        assert_eq!(parse_args(args(&[])), Args::default());
        assert_eq!(
            parse_args(args(&["--config", "a.toml"])).config.as_deref(),
            Some("a.toml")
        );
        assert_eq!(
            parse_args(args(&["--config=b.toml"])).config.as_deref(),
            Some("b.toml")
        );
        assert_eq!(parse_args(args(&["--config"])).config, None);
    }

    #[test]
    fn prepare_creates_config_and_storage_beside_each_other() {
        let base = fixture_dir("launcher");
        let config_path = base.join("config.toml");

        let launch = prepare(Args {
            config: Some(config_path.display().to_string()),
        })
        .expect("prepare");

        assert_eq!(launch.preferred_port, 3000);
        assert!(config_path.exists());
        assert!(base.join("storage.json").exists());

        fs::remove_dir_all(base).ok();
    }
}
