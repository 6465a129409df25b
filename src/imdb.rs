use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::sanitize::{sanitize_input, sanitize_query};

pub const IMDB_API_BASE: &str = "https://api.imdbapi.dev";
pub const IMDB_TITLE_URL: &str = "https://www.imdb.com/title";
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Failures of a single API call. Every variant is a total failure of that call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("API request failed with status: {code} {reason}")]
    Status { code: u16, reason: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("imdb client user agent required");
        }

        let base_url = if config.base_url.trim().is_empty() {
            IMDB_API_BASE.to_string()
        } else {
            config.base_url.trim().trim_end_matches('/').to_string()
        };
        Url::parse(&base_url)?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One page of the listing. An absent token requests the first page.
    pub fn list_titles(&self, page_token: Option<&str>) -> Result<PageEnvelope, ApiError> {
        let mut url = self.endpoint("titles")?;
        url.query_pairs_mut()
            .append_pair("pageToken", page_token.unwrap_or_default());
        let envelope: PageEnvelope = self.get_json(url)?;
        Ok(envelope.normalized())
    }

    /// Free-text search. The API answers with a single batch and no token.
    pub fn search_titles(&self, query: &str, limit: usize) -> Result<PageEnvelope, ApiError> {
        let query = sanitize_query(query).unwrap_or_default();
        let mut url = self.endpoint("search/titles")?;
        url.query_pairs_mut()
            .append_pair("query", &query)
            .append_pair("limit", &limit.to_string());
        let envelope: PageEnvelope = self.get_json(url)?;
        Ok(envelope.normalized())
    }

    /// A single title. `Ok(None)` when the API does not know the id.
    pub fn title(&self, id: &str) -> Result<Option<Title>, ApiError> {
        let id = sanitize_input(id);
        if id.trim().is_empty() {
            return Ok(None);
        }
        let url = self.endpoint(&format!("titles/{}", id.trim()))?;
        match self.get_json::<Title>(url) {
            Ok(title) => Ok(Some(title)),
            Err(ApiError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        log::debug!("imdb: GET {}", url);
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Response body of the listing and search endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope {
    pub titles: Vec<Title>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl PageEnvelope {
    pub fn new(titles: Vec<Title>, next_page_token: Option<String>) -> Self {
        Self {
            titles,
            next_page_token,
        }
        .normalized()
    }

    // An empty token means the same thing as no token.
    fn normalized(mut self) -> Self {
        if self
            .next_page_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            self.next_page_token = None;
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Title {
    pub id: String,
    #[serde(default, rename = "type")]
    pub title_type: Option<String>,
    #[serde(default)]
    pub primary_title: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub primary_image: Option<Image>,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub runtime_seconds: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub directors: Vec<Person>,
    #[serde(default)]
    pub writers: Vec<Person>,
    #[serde(default)]
    pub stars: Vec<Person>,
    #[serde(default)]
    pub spoken_languages: Vec<NamedCode>,
    #[serde(default)]
    pub origin_countries: Vec<NamedCode>,
}

impl Title {
    pub fn display_name(&self) -> &str {
        self.primary_title
            .as_deref()
            .or(self.original_title.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }

    pub fn is_movie(&self) -> bool {
        self.title_type.as_deref() == Some("movie")
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_movie() {
            "Movie"
        } else {
            "TV Series"
        }
    }

    pub fn year_label(&self) -> String {
        match (self.start_year, self.end_year) {
            (Some(start), Some(end)) if end != start => format!("{start}–{end}"),
            (Some(start), _) => start.to_string(),
            _ => "N/A".to_string(),
        }
    }

    pub fn poster_url(&self) -> Option<&str> {
        self.primary_image
            .as_ref()
            .map(|image| image.url.as_str())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn aggregate_rating(&self) -> Option<f64> {
        self.rating.as_ref().and_then(|rating| rating.aggregate_rating)
    }

    pub fn imdb_url(&self) -> String {
        format!("{}/{}/", IMDB_TITLE_URL, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(default)]
    pub aggregate_rating: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedCode {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use tiny_http::{Response, Server};

    // Serves the canned (status, body) pairs in order and returns the request urls.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("tcp listener")
            .port();
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let request = server.recv().expect("receive request");
                seen.push(request.url().to_string());
                let response = Response::from_string(body).with_status_code(status);
                request.respond(response).expect("send response");
            }
            seen
        });
        (format!("http://127.0.0.1:{port}"), handle)
    }

    fn client(base_url: String) -> Client {
        Client::new(ClientConfig {
            base_url,
            user_agent: "showland-test".into(),
            timeout: Some(Duration::from_secs(5)),
            http_client: None,
        })
        .unwrap()
    }

    #[test]
    fn new_requires_user_agent() {
        let err = Client::new(ClientConfig::default()).err().unwrap();
        assert!(err.to_string().contains("user agent"));
    }

    #[test]
    fn list_titles_sends_page_token_and_parses_envelope() {
        let (base, handle) = serve(vec![(
            200,
            r#"{"titles":[{"id":"tt0111161","type":"movie","primaryTitle":"The Shawshank Redemption","startYear":1994}],"nextPageToken":"abc123"}"#,
        )]);
        let page = client(base).list_titles(Some("abc")).unwrap();
        assert_eq!(page.titles.len(), 1);
        assert_eq!(page.titles[0].display_name(), "The Shawshank Redemption");
        assert_eq!(page.next_page_token.as_deref(), Some("abc123"));
        let urls = handle.join().unwrap();
        assert_eq!(urls, vec!["/titles?pageToken=abc".to_string()]);
    }

    #[test]
    fn first_page_sends_empty_token_and_empty_next_token_is_none() {
        let (base, handle) = serve(vec![(200, r#"{"titles":[],"nextPageToken":""}"#)]);
        let page = client(base).list_titles(None).unwrap();
        assert!(page.titles.is_empty());
        assert_eq!(page.next_page_token, None);
        assert_eq!(handle.join().unwrap(), vec!["/titles?pageToken=".to_string()]);
    }

    #[test]
    fn server_error_maps_to_status_with_code() {
        let (base, handle) = serve(vec![(500, "boom")]);
        let err = client(base).list_titles(None).unwrap_err();
        assert!(matches!(err, ApiError::Status { code: 500, .. }));
        assert!(err.to_string().contains("500"));
        handle.join().unwrap();
    }

    #[test]
    fn missing_titles_array_is_a_decode_error() {
        let (base, handle) = serve(vec![(200, r#"{"nextPageToken":"x"}"#)]);
        let err = client(base).list_titles(None).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        handle.join().unwrap();
    }

    #[test]
    fn search_sanitizes_query_and_sends_limit() {
        let (base, handle) = serve(vec![(200, r#"{"titles":[]}"#)]);
        let page = client(base).search_titles(" bat<man> ", 50).unwrap();
        assert!(page.titles.is_empty());
        assert_eq!(
            handle.join().unwrap(),
            vec!["/search/titles?query=batman&limit=50".to_string()]
        );
    }

    #[test]
    fn unknown_title_is_none() {
        let (base, handle) = serve(vec![(404, r#"{"message":"not found"}"#)]);
        assert_eq!(client(base).title("tt0000000").unwrap(), None);
        assert_eq!(handle.join().unwrap(), vec!["/titles/tt0000000".to_string()]);
    }

    #[test]
    fn title_fields_deserialize() {
        let raw = r#"{
            "id":"tt0903747","type":"tvSeries","primaryTitle":"Breaking Bad",
            "primaryImage":{"url":"https://m.media-amazon.com/images/bb.jpg","width":1000,"height":1500},
            "startYear":2008,"endYear":2013,"genres":["Crime","Drama"],
            "rating":{"aggregateRating":9.5,"voteCount":2000000},
            "directors":[{"id":"nm1","displayName":"Vince Gilligan"}],
            "spokenLanguages":[{"code":"eng","name":"English"}]
        }"#;
        let title: Title = serde_json::from_str(raw).unwrap();
        assert_eq!(title.kind_label(), "TV Series");
        assert_eq!(title.year_label(), "2008–2013");
        assert_eq!(title.aggregate_rating(), Some(9.5));
        assert_eq!(title.directors[0].display_name, "Vince Gilligan");
        assert_eq!(
            title.poster_url(),
            Some("https://m.media-amazon.com/images/bb.jpg")
        );
        assert_eq!(title.imdb_url(), "https://www.imdb.com/title/tt0903747/");
    }
}
