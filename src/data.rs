use std::sync::Arc;

use crate::imdb::{self, ApiError, Image, PageEnvelope, Rating, Title};

pub trait TitleSource: Send + Sync {
    fn list_titles(&self, page_token: Option<&str>) -> Result<PageEnvelope, ApiError>;
    fn search_titles(&self, query: &str) -> Result<PageEnvelope, ApiError>;
}

pub trait TitleDetailService: Send + Sync {
    fn load_title(&self, id: &str) -> Result<Option<Title>, ApiError>;
}

pub struct ImdbTitleSource {
    client: Arc<imdb::Client>,
    search_limit: usize,
}

impl ImdbTitleSource {
    pub fn new(client: Arc<imdb::Client>, search_limit: usize) -> Self {
        let search_limit = if search_limit == 0 {
            imdb::DEFAULT_SEARCH_LIMIT
        } else {
            search_limit
        };
        Self {
            client,
            search_limit,
        }
    }
}

impl TitleSource for ImdbTitleSource {
    fn list_titles(&self, page_token: Option<&str>) -> Result<PageEnvelope, ApiError> {
        self.client.list_titles(page_token)
    }

    fn search_titles(&self, query: &str) -> Result<PageEnvelope, ApiError> {
        self.client.search_titles(query, self.search_limit)
    }
}

pub struct ImdbDetailService {
    client: Arc<imdb::Client>,
}

impl ImdbDetailService {
    pub fn new(client: Arc<imdb::Client>) -> Self {
        Self { client }
    }
}

impl TitleDetailService for ImdbDetailService {
    fn load_title(&self, id: &str) -> Result<Option<Title>, ApiError> {
        self.client.title(id)
    }
}

const MOCK_PAGE_SIZE: usize = 4;

/// Offline catalogue used by `--offline`. Pages are addressed by `mock-<index>` tokens.
#[derive(Default)]
pub struct MockTitleSource;

impl MockTitleSource {
    fn page_index(token: Option<&str>) -> Result<usize, ApiError> {
        match token {
            None => Ok(0),
            Some(token) => token
                .strip_prefix("mock-")
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| ApiError::Decode(format!("unknown page token {token:?}"))),
        }
    }
}

impl TitleSource for MockTitleSource {
    fn list_titles(&self, page_token: Option<&str>) -> Result<PageEnvelope, ApiError> {
        let catalogue = mock_catalogue();
        let index = Self::page_index(page_token)?;
        let start = index * MOCK_PAGE_SIZE;
        let end = (start + MOCK_PAGE_SIZE).min(catalogue.len());
        let titles = catalogue.get(start..end).map(<[Title]>::to_vec).unwrap_or_default();
        let next = (end < catalogue.len()).then(|| format!("mock-{}", index + 1));
        Ok(PageEnvelope::new(titles, next))
    }

    fn search_titles(&self, query: &str) -> Result<PageEnvelope, ApiError> {
        let needle = query.trim().to_lowercase();
        let titles = mock_catalogue()
            .into_iter()
            .filter(|title| title.display_name().to_lowercase().contains(&needle))
            .collect();
        Ok(PageEnvelope::new(titles, None))
    }
}

impl TitleDetailService for MockTitleSource {
    fn load_title(&self, id: &str) -> Result<Option<Title>, ApiError> {
        Ok(mock_catalogue().into_iter().find(|title| title.id == id))
    }
}

fn mock_catalogue() -> Vec<Title> {
    [
        ("tt0111161", "movie", "The Shawshank Redemption", 1994, 8520, 9.3, "Drama"),
        ("tt0068646", "movie", "The Godfather", 1972, 10500, 9.2, "Crime"),
        ("tt0468569", "movie", "The Dark Knight", 2008, 9120, 9.0, "Action"),
        ("tt0903747", "tvSeries", "Breaking Bad", 2008, 2700, 9.5, "Crime"),
        ("tt0944947", "tvSeries", "Game of Thrones", 2011, 3420, 9.2, "Fantasy"),
        ("tt0372784", "movie", "Batman Begins", 2005, 8400, 8.2, "Action"),
        ("tt0133093", "movie", "The Matrix", 1999, 8160, 8.7, "Sci-Fi"),
        ("tt0108778", "tvSeries", "Friends", 1994, 1320, 8.9, "Comedy"),
        ("tt1375666", "movie", "Inception", 2010, 8880, 8.8, "Sci-Fi"),
        ("tt0386676", "tvSeries", "The Office", 2005, 1320, 9.0, "Comedy"),
    ]
    .into_iter()
    .map(|(id, kind, name, year, runtime, rating, genre)| Title {
        id: id.into(),
        title_type: Some(kind.into()),
        primary_title: Some(name.into()),
        primary_image: Some(Image {
            url: format!("https://m.media-amazon.com/images/{id}.jpg"),
            width: Some(1000),
            height: Some(1500),
        }),
        start_year: Some(year),
        runtime_seconds: Some(runtime),
        genres: vec![genre.into()],
        rating: Some(Rating {
            aggregate_rating: Some(rating),
            vote_count: None,
        }),
        plot: Some(format!("{name} is part of the offline sample catalogue.")),
        ..Title::default()
    })
    .collect()
}
