use std::{num::NonZeroU32, path::PathBuf};

use color_eyre::eyre::Context;
use db::setup_db_pool;
use sqlx::PgPool;
use tracing::instrument;
use url::Url;

const DEFAULT_PAGE_SIZE: u32 = 6;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: Url,
    pub port: u16,
    pub media_root: PathBuf,
    pub page_size: u32,
}

impl AppConfig {
    #[instrument(name = "AppConfig::from_env")]
    pub fn from_env() -> color_eyre::Result<Self> {
        let base_url = std::env::var("APP_BASE_URL")
            .wrap_err("Missing APP_BASE_URL, needed for app launch")?;
        let base_url = Url::parse(&base_url).wrap_err("Invalid APP_BASE_URL not parsable")?;

        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port.parse().wrap_err("Invalid PORT, expected a number")?;

        let media_root = std::env::var("MEDIA_ROOT").map_or_else(|_| "media".into(), PathBuf::from);

        let page_size = parse_page_size(std::env::var("PAGE_SIZE").ok().as_deref())?;

        Ok(Self {
            base_url,
            port,
            media_root,
            page_size,
        })
    }

    pub fn app_url(&self, path: &str) -> String {
        let mut url = self.base_url.clone();

        url.set_path(path);

        url.into()
    }

    /// Public URL of a file stored under the media root.
    pub fn media_url(&self, relative_path: &str) -> String {
        self.app_url(&format!("/media/{relative_path}"))
    }
}

fn parse_page_size(raw: Option<&str>) -> color_eyre::Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PAGE_SIZE);
    };

    let size: NonZeroU32 = raw
        .trim()
        .parse()
        .wrap_err("Invalid PAGE_SIZE, expected a positive number")?;

    Ok(size.get())
}

pub fn database_url() -> color_eyre::Result<String> {
    std::env::var("DATABASE_URL").wrap_err("Missing DATABASE_URL, needed to reach Postgres")
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub app: AppConfig,
    pub db: PgPool,
}

impl AppState {
    #[instrument(name = "AppState::from_env", err)]
    pub async fn from_env() -> color_eyre::Result<Self> {
        let app = AppConfig::from_env()?;
        let db = setup_db_pool(&database_url()?).await?;

        Ok(Self { app, db })
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            base_url: Url::parse("https://foodgram.example").unwrap(),
            port: 3000,
            media_root: PathBuf::from("media"),
            page_size: 6,
        }
    }

    #[test]
    fn test_media_url() {
        assert_eq!(
            config().media_url("recipes/images/abc.png"),
            "https://foodgram.example/media/recipes/images/abc.png"
        );
    }

    #[test]
    fn test_parse_page_size() {
        assert_eq!(parse_page_size(None).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(parse_page_size(Some("12")).unwrap(), 12);
        assert!(parse_page_size(Some("0")).is_err());
        assert!(parse_page_size(Some("-1")).is_err());
        assert!(parse_page_size(Some("six")).is_err());
    }

    #[test]
    fn test_app_url_replaces_path() {
        assert_eq!(
            config().app_url("/api/recipes/"),
            "https://foodgram.example/api/recipes/"
        );
    }
}
