use crate::data::TitleDetailService;
use crate::imdb::{NamedCode, Person, Title};

pub const NOT_FOUND_MESSAGE: &str = "Title not found.";
const MISSING: &str = "N/A";

/// Text content of the detail screen for one title.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: String,
    pub heading: String,
    pub overview: String,
    pub rows: Vec<(&'static str, String)>,
    pub imdb_url: String,
}

impl DetailView {
    pub fn from_title(title: &Title) -> Self {
        let heading = match title.start_year {
            Some(year) => format!("{} ({year})", title.display_name()),
            None => title.display_name().to_string(),
        };
        let overview = title
            .plot
            .as_deref()
            .filter(|plot| !plot.trim().is_empty())
            .unwrap_or(MISSING)
            .to_string();

        let rows = vec![
            ("Type", title.kind_label().to_string()),
            ("Release Year", title.year_label()),
            ("Genres", or_missing(title.genres.join(", "))),
            (
                "Rating",
                title
                    .aggregate_rating()
                    .map(|rating| format!("{rating:.1}"))
                    .unwrap_or_else(|| MISSING.into()),
            ),
            ("Directors", people(&title.directors)),
            ("Writers", people(&title.writers)),
            ("Stars", people(&title.stars)),
            ("Spoken Languages", names(&title.spoken_languages)),
            ("Origin Country", names(&title.origin_countries)),
            ("Running time", running_time(title.runtime_seconds)),
        ];

        Self {
            id: title.id.clone(),
            heading,
            overview,
            rows,
            imdb_url: title.imdb_url(),
        }
    }

    pub fn row(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Found(Box<Title>),
    NotFound,
    Failed(String),
}

impl DetailOutcome {
    pub fn load(service: &dyn TitleDetailService, id: &str) -> Self {
        match service.load_title(id) {
            Ok(Some(title)) => DetailOutcome::Found(Box::new(title)),
            Ok(None) => DetailOutcome::NotFound,
            Err(err) => {
                log::error!("detail: failed to load {id}: {err:?}");
                DetailOutcome::Failed(err.to_string())
            }
        }
    }
}

fn or_missing(value: String) -> String {
    if value.trim().is_empty() {
        MISSING.into()
    } else {
        value
    }
}

fn people(list: &[Person]) -> String {
    or_missing(
        list.iter()
            .map(|person| person.display_name.as_str())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn names(list: &[NamedCode]) -> String {
    or_missing(
        list.iter()
            .map(|entry| entry.name.as_str())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn running_time(seconds: Option<i64>) -> String {
    match seconds {
        Some(seconds) if seconds > 0 => format!("{} minutes", seconds / 60),
        _ => MISSING.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockTitleSource;
    use crate::imdb::Rating;

    #[test]
    fn full_title_fills_every_row() {
        let title = Title {
            id: "tt1375666".into(),
            title_type: Some("movie".into()),
            primary_title: Some("Inception".into()),
            start_year: Some(2010),
            runtime_seconds: Some(8880),
            genres: vec!["Action".into(), "Sci-Fi".into()],
            rating: Some(Rating {
                aggregate_rating: Some(8.8),
                vote_count: Some(10),
            }),
            plot: Some("A thief who steals secrets.".into()),
            directors: vec![Person {
                id: "nm0634240".into(),
                display_name: "Christopher Nolan".into(),
            }],
            spoken_languages: vec![NamedCode {
                code: "eng".into(),
                name: "English".into(),
            }],
            ..Title::default()
        };
        let view = DetailView::from_title(&title);
        assert_eq!(view.heading, "Inception (2010)");
        assert_eq!(view.overview, "A thief who steals secrets.");
        assert_eq!(view.row("Type"), Some("Movie"));
        assert_eq!(view.row("Genres"), Some("Action, Sci-Fi"));
        assert_eq!(view.row("Rating"), Some("8.8"));
        assert_eq!(view.row("Directors"), Some("Christopher Nolan"));
        assert_eq!(view.row("Spoken Languages"), Some("English"));
        assert_eq!(view.row("Running time"), Some("148 minutes"));
    }

    #[test]
    fn sparse_title_falls_back_to_na() {
        let title = Title {
            id: "tt0".into(),
            title_type: Some("tvSeries".into()),
            ..Title::default()
        };
        let view = DetailView::from_title(&title);
        assert_eq!(view.heading, "tt0");
        assert_eq!(view.overview, "N/A");
        assert_eq!(view.row("Type"), Some("TV Series"));
        for label in ["Writers", "Stars", "Rating", "Origin Country", "Running time"] {
            assert_eq!(view.row(label), Some("N/A"), "{label}");
        }
    }

    #[test]
    fn outcome_distinguishes_missing_titles() {
        let source = MockTitleSource;
        assert!(matches!(
            DetailOutcome::load(&source, "tt0068646"),
            DetailOutcome::Found(title) if title.display_name() == "The Godfather"
        ));
        assert_eq!(DetailOutcome::load(&source, "tt9999999"), DetailOutcome::NotFound);
    }
}
