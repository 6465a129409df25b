use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use url::{ParseError, Url};

use crate::config::ImageConfig;
use crate::imdb::Title;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    pub fit: String,
    pub quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 400,
            height: 600,
            fit: "cover".into(),
            quality: 55,
        }
    }
}

impl From<&ImageConfig> for ImageOptions {
    fn from(cfg: &ImageConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            quality: cfg.quality,
            ..Self::default()
        }
    }
}

/// Wraps `source` in the resizing proxy. The proxy serves `fallback` when the source fails.
pub fn proxied_image_url(
    proxy: &str,
    source: &str,
    fallback: &str,
    opts: &ImageOptions,
) -> Result<Url, ParseError> {
    let mut url = Url::parse(proxy)?;
    url.query_pairs_mut()
        .append_pair("url", source)
        .append_pair("default", fallback)
        .append_pair("l", "9")
        .append_pair("af", "")
        .append_pair("il", "")
        .append_pair("n", "-1")
        .append_pair("w", &opts.width.to_string())
        .append_pair("h", &opts.height.to_string())
        .append_pair("fit", &opts.fit)
        .append_pair("q", &opts.quality.to_string());
    Ok(url)
}

/// Proxied poster for `title`, or the fallback image when it has none.
pub fn poster_url(title: &Title, cfg: &ImageConfig) -> Result<Url, ParseError> {
    match title.poster_url() {
        Some(source) => proxied_image_url(
            &cfg.proxy_url,
            source,
            &cfg.fallback_url,
            &ImageOptions::from(cfg),
        ),
        None => Url::parse(&cfg.fallback_url),
    }
}

pub struct PosterFetcher {
    client: Client,
    cfg: ImageConfig,
    user_agent: String,
}

impl PosterFetcher {
    pub fn new(cfg: ImageConfig, user_agent: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("poster: build http client")?;
        Ok(Self {
            client,
            cfg,
            user_agent: user_agent.into(),
        })
    }

    pub fn fetch(&self, title: &Title) -> Result<Vec<u8>> {
        let url = poster_url(title, &self.cfg).context("poster: build url")?;
        log::debug!("poster: GET {url}");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .context("poster: download")?;

        if !response.status().is_success() {
            return Err(anyhow!("poster: request failed: {}", response.status()));
        }
        let bytes = response.bytes().context("poster: body")?;
        if bytes.is_empty() {
            return Err(anyhow!("poster: empty body"));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imdb::Image;
    use std::collections::HashMap;
    use std::thread;
    use tiny_http::{Response, Server};

    fn titled(poster: Option<&str>) -> Title {
        Title {
            id: "tt1".into(),
            primary_image: poster.map(|url| Image {
                url: url.into(),
                width: None,
                height: None,
            }),
            ..Title::default()
        }
    }

    #[test]
    fn proxy_url_carries_all_options() {
        let url = proxied_image_url(
            "https://wsrv.nl/",
            "https://m.media-amazon.com/images/a.jpg",
            "https://placehold.co/400x600",
            &ImageOptions::default(),
        )
        .unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("wsrv.nl"));
        assert_eq!(pairs["url"], "https://m.media-amazon.com/images/a.jpg");
        assert_eq!(pairs["default"], "https://placehold.co/400x600");
        assert_eq!(pairs["l"], "9");
        assert_eq!(pairs["af"], "");
        assert_eq!(pairs["il"], "");
        assert_eq!(pairs["n"], "-1");
        assert_eq!(pairs["w"], "400");
        assert_eq!(pairs["h"], "600");
        assert_eq!(pairs["fit"], "cover");
        assert_eq!(pairs["q"], "55");
    }

    #[test]
    fn missing_poster_uses_fallback() {
        let cfg = ImageConfig::default();
        let url = poster_url(&titled(None), &cfg).unwrap();
        assert_eq!(url.as_str(), cfg.fallback_url);

        let url = poster_url(&titled(Some("https://x.test/p.jpg")), &cfg).unwrap();
        assert!(url.as_str().starts_with("https://wsrv.nl/?url="));
    }

    #[test]
    fn fetcher_downloads_through_proxy() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let seen = request.url().to_string();
            request
                .respond(Response::from_data(vec![1u8, 2, 3]))
                .unwrap();
            seen
        });

        let cfg = ImageConfig {
            proxy_url: format!("http://127.0.0.1:{port}/"),
            ..ImageConfig::default()
        };
        let fetcher = PosterFetcher::new(cfg, "showland-test", Duration::from_secs(5)).unwrap();
        let bytes = fetcher
            .fetch(&titled(Some("https://x.test/p.jpg")))
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(handle.join().unwrap().contains("url=https%3A%2F%2Fx.test%2Fp.jpg"));
    }

    #[test]
    fn fetcher_reports_http_failure() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            request
                .respond(Response::from_string("nope").with_status_code(502))
                .unwrap();
        });

        let cfg = ImageConfig {
            proxy_url: format!("http://127.0.0.1:{port}/"),
            ..ImageConfig::default()
        };
        let fetcher = PosterFetcher::new(cfg, "showland-test", Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&titled(Some("https://x.test/p.jpg")))
            .unwrap_err();
        assert!(err.to_string().contains("502"));
        handle.join().unwrap();
    }
}
