use crate::error::{Error, Result};
use crate::metrics::QUALITY_MEASURES;

/// The `titleType` values IMDb actually ships in title.basics.
pub const TITLE_TYPES: &[&str] = &[
    "movie",
    "short",
    "tvEpisode",
    "tvMiniSeries",
    "tvMovie",
    "tvSeries",
    "tvShort",
    "tvSpecial",
    "video",
    "videoGame",
];

/// IMDb's published genre vocabulary.
pub const KNOWN_GENRES: &[&str] = &[
    "Action",
    "Adult",
    "Adventure",
    "Animation",
    "Biography",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Film-Noir",
    "Game-Show",
    "History",
    "Horror",
    "Music",
    "Musical",
    "Mystery",
    "News",
    "Reality-TV",
    "Romance",
    "Sci-Fi",
    "Short",
    "Sport",
    "Talk-Show",
    "Thriller",
    "War",
    "Western",
];

/// Everything an analysis run needs up front. Validated once before any
/// table gets loaded, so a typo'd metric fails fast instead of after the
/// multi-gigabyte TSV scan.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub title_type: String,
    pub years: (i32, i32),
    pub metric: String,
    pub vote_threshold: i64,
    pub repr_size: usize,
    pub countries: Vec<String>,
    pub genres: Vec<String>,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.years;
        if end < start {
            return Err(Error::Configuration(format!(
                "year range start {start} exceeds end {end}"
            )));
        }
        if self.vote_threshold < 0 {
            return Err(Error::Configuration(format!(
                "vote threshold must be non-negative, got {}",
                self.vote_threshold
            )));
        }
        if !TITLE_TYPES.contains(&self.title_type.as_str()) {
            return Err(Error::Configuration(format!(
                "unknown title type {:?}",
                self.title_type
            )));
        }
        if !QUALITY_MEASURES.contains_key(self.metric.as_str()) {
            return Err(Error::UnknownMetric(self.metric.clone()));
        }
        for genre in &self.genres {
            if !KNOWN_GENRES.contains(&genre.as_str()) {
                return Err(Error::Configuration(format!("unknown genre {genre:?}")));
            }
        }
        Ok(())
    }
}
