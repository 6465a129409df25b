use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config;
use crate::data::{
    ImdbDetailService, ImdbTitleSource, MockTitleSource, TitleDetailService, TitleSource,
};
use crate::imdb;
use crate::logging;
use crate::poster::PosterFetcher;
use crate::session;
use crate::storage;
use crate::theme;
use crate::ui;

/// Startup choices taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub query: Option<String>,
    pub offline: bool,
}

struct Services {
    source: Arc<dyn TitleSource>,
    details: Arc<dyn TitleDetailService>,
    posters: Option<Arc<PosterFetcher>>,
    status: String,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    let log_path = logging::initialize(&cfg.log);
    info!("showland {} starting", crate::VERSION);

    let config_path = opts.config_file.clone().or_else(config::default_path);
    let display_path = friendly_path(config_path.as_ref());

    let store =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);
    let theme_mode = theme::load_mode(&store, theme::theme_mode_from_key(&cfg.ui.theme));

    let services = if opts.offline {
        offline_services()
    } else {
        online_services(&cfg).context("create imdb client")?
    };

    let mut status = format!("{} Config: {display_path}", services.status);
    if let Some(path) = log_path {
        status.push_str(&format!(" · Log: {}", friendly_path(Some(&path))));
    }

    let options = ui::Options {
        status_message: status,
        source: services.source,
        details: services.details,
        posters: services.posters,
        session: Arc::new(session::Store::new()),
        store: store.clone(),
        feed: cfg.feed.clone(),
        theme: theme_mode,
        dynamic_theme: cfg.ui.dynamic_theme,
        initial_query: opts.query.clone(),
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    drop(model);

    if let Ok(store) = Arc::try_unwrap(store) {
        if let Err(err) = store.close() {
            warn!("app: {err:#}");
        }
    }
    info!("showland exiting");

    result
}

fn offline_services() -> Services {
    let mock = Arc::new(MockTitleSource);
    Services {
        source: mock.clone(),
        details: mock,
        posters: None,
        status: "Browsing the offline sample catalogue.".to_string(),
    }
}

fn online_services(cfg: &config::Config) -> Result<Services> {
    let client = Arc::new(imdb::Client::new(imdb::ClientConfig {
        base_url: cfg.api.base_url.clone(),
        user_agent: cfg.api.user_agent.clone(),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })?);

    let posters = if cfg.ui.dynamic_theme {
        let fetcher =
            PosterFetcher::new(cfg.images.clone(), cfg.api.user_agent.clone(), cfg.api.timeout);
        match fetcher {
            Ok(fetcher) => Some(Arc::new(fetcher)),
            Err(err) => {
                warn!("app: poster accents disabled: {err:#}");
                None
            }
        }
    } else {
        None
    };

    let status = format!("Browsing {}.", client.base_url());
    Ok(Services {
        source: Arc::new(ImdbTitleSource::new(client.clone(), cfg.api.search_limit)),
        details: Arc::new(ImdbDetailService::new(client)),
        posters,
        status,
    })
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/showland/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_abbreviates_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let path = home.join(".config").join("showland").join("config.yaml");
        assert_eq!(
            friendly_path(Some(&path)),
            "~/.config/showland/config.yaml"
        );
        assert_eq!(friendly_path(Some(&home)), "~");
    }

    #[test]
    fn friendly_path_without_path_names_default() {
        assert_eq!(friendly_path(None), "~/.config/showland/config.yaml");
    }

    #[test]
    fn online_services_reject_blank_user_agent() {
        let mut cfg = config::Config::default();
        cfg.api.user_agent = "  ".into();
        assert!(online_services(&cfg).is_err());
    }

    #[test]
    fn offline_services_serve_the_sample_catalogue() {
        let services = offline_services();
        let page = services.source.list_titles(None).unwrap();
        assert!(!page.titles.is_empty());
        assert!(services.posters.is_none());
    }
}
