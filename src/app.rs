use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::{self, TokenSource};
use crate::auth::{ApiAuthService, AuthService, MockAuthService, DEMO_PASSWORD, DEMO_USERNAME};
use crate::config::{self, Config};
use crate::data::{
    ApiCatalogService, ApiCommentService, CatalogService, CommentService, MockCatalogService,
    MockCommentService,
};
use crate::logging;
use crate::routes::Route;
use crate::session::{Revalidation, Session};
use crate::storage;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use in-memory services instead of the configured server.
    pub demo: bool,
    /// Page to open first, e.g. `/video/42` or `/?tag=Rust`.
    pub start_path: Option<String>,
}

struct Services {
    catalog: Arc<dyn CatalogService>,
    comments: Arc<dyn CommentService>,
    auth: Arc<dyn AuthService>,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let start_route = resolve_start_route(&opts)?;
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    if let Err(err) = logging::init(&cfg.log) {
        eprintln!("logging disabled: {err:#}");
    }
    info!(version = crate::VERSION, demo = opts.demo, "starting");

    let store = open_store(&cfg)?;
    let session = Arc::new(Session::init(store).context("restore session")?);
    let services = if opts.demo {
        demo_services(&session)
    } else {
        api_services(&cfg, &session)?
    };

    let mut status = if opts.demo {
        format!("Demo mode · sign in as {DEMO_USERNAME}/{DEMO_PASSWORD}")
    } else {
        format!(
            "Connected to {} · config {}",
            cfg.api.base_url,
            friendly_path(config::default_path().as_ref())
        )
    };

    if cfg.auth.validate_on_start {
        match session.revalidate(services.auth.as_ref()) {
            Ok(Revalidation::Rejected) => {
                status = "Your session has expired. Please sign in again.".to_string();
            }
            Ok(Revalidation::Unreachable) => {
                status = "Could not verify your session; continuing offline.".to_string();
            }
            Ok(Revalidation::Confirmed | Revalidation::Skipped) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "session revalidation failed"),
        }
    }
    if let Some(user) = session.current_user() {
        info!(username = %user.username, "restored session");
    }

    let options = ui::Options {
        status_message: status,
        start_route,
        catalog_service: services.catalog,
        comment_service: services.comments,
        auth_service: services.auth,
        session,
        player: cfg.player.clone(),
    };

    let mut model = ui::Model::new(options);
    let result = model.run();
    info!("exiting");
    result
}

fn resolve_start_route(opts: &RunOptions) -> Result<Route> {
    match opts.start_path.as_deref() {
        Some(path) => Route::parse(path).context("start page"),
        None => Ok(Route::home()),
    }
}

/// Clears the stored credential without starting the UI.
pub fn logout() -> Result<bool> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let store = open_store(&cfg)?;
    let session = Session::init(store).context("restore session")?;
    let was_signed_in = session.is_authenticated();
    session.logout()?;
    Ok(was_signed_in)
}

fn open_store(cfg: &Config) -> Result<Arc<storage::Store>> {
    let store = storage::Store::open(storage::Options {
        path: cfg.storage.path.clone(),
    })
    .context("open storage")?;
    Ok(Arc::new(store))
}

fn api_services(cfg: &Config, session: &Arc<Session>) -> Result<Services> {
    let tokens: Arc<dyn TokenSource> = session.clone();
    let client = api::Client::new(
        api::ClientConfig {
            base_url: cfg.api.base_url.clone(),
            user_agent: cfg.api.user_agent.clone(),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        },
        Some(tokens),
    )
    .context("create api client")?;
    let client = Arc::new(client);

    Ok(Services {
        catalog: Arc::new(ApiCatalogService::new(client.clone())),
        comments: Arc::new(ApiCommentService::new(client.clone())),
        auth: Arc::new(ApiAuthService::new(client)),
    })
}

fn demo_services(session: &Arc<Session>) -> Services {
    Services {
        catalog: Arc::new(MockCatalogService::default()),
        comments: Arc::new(MockCommentService::with_session(session.clone())),
        auth: Arc::new(MockAuthService),
    }
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
        "~/.config/zutube/config.yaml".to_string()
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
        let path = home.join(".config").join("zutube").join("config.yaml");
        assert_eq!(friendly_path(Some(&path)), "~/.config/zutube/config.yaml");
        assert_eq!(friendly_path(None), "~/.config/zutube/config.yaml");
    }

    #[test]
    fn start_path_selects_the_first_page() {
        let opts = |path: Option<&str>| RunOptions {
            demo: true,
            start_path: path.map(str::to_string),
        };
        assert_eq!(resolve_start_route(&opts(None)).unwrap(), Route::home());
        assert_eq!(
            resolve_start_route(&opts(Some("/video/42"))).unwrap(),
            Route::video("42")
        );
        assert_eq!(
            resolve_start_route(&opts(Some("/?tag=Rust"))).unwrap().to_path(),
            "/?tag=Rust"
        );
        assert!(resolve_start_route(&opts(Some("/channels/7"))).is_err());
    }

    #[test]
    fn demo_comments_act_as_the_signed_in_user() {
        let store = Arc::new(storage::Store::open_in_memory().unwrap());
        let session = Arc::new(Session::init(store).unwrap());
        let services = demo_services(&session);

        let response = services
            .auth
            .login(&crate::auth::LoginRequest {
                email_or_username: DEMO_USERNAME.into(),
                password: DEMO_PASSWORD.into(),
            })
            .unwrap();
        session.login(response).unwrap();
        services.comments.delete_comment("seed-2").unwrap();
        assert_eq!(services.comments.list_comments("1").unwrap().len(), 1);
    }
}
