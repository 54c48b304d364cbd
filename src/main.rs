use cinematic_impact::config::AnalysisConfig;
use cinematic_impact::data::ImdbData;
use cinematic_impact::metrics::Cols;
use cinematic_impact::{geo, impact, rank, Result};
use rustc_hash::FxHashSet;
use std::path::Path;
use tracing::info;

const TITLE_BASICS_PATH: &str = "data/title.basics.tsv";
const TITLE_RATINGS_PATH: &str = "data/title.ratings.tsv";
const TITLE_AKAS_PATH: &str = "data/title.akas.tsv";

const POPULATION_PATH: &str = "data/API_SP.POP.TOTL_DS2_en_csv_v2_589802.csv";
const GDP_PATH: &str = "data/API_NY.GDP.MKTP.CD_DS2_en_csv_v2_595424.csv";
const GDP_PER_CAPITA_PATH: &str = "data/API_NY.GDP.PCAP.CD_DS2_en_csv_v2_593971.csv";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AnalysisConfig {
        title_type: "movie".to_string(),
        years: (1780, 2110),
        metric: "weighted_mean".to_string(),
        vote_threshold: 50_000,
        repr_size: 100,
        countries: vec!["Poland".to_string(), "Germany".to_string()],
        genres: vec!["Comedy".to_string()],
    };
    config.validate()?;

    let md = ImdbData::from_paths(
        Path::new(TITLE_BASICS_PATH),
        Path::new(TITLE_RATINGS_PATH),
        Path::new(TITLE_AKAS_PATH),
        &config.title_type,
        config.years,
    )?;

    let weak = impact::weak_impact(&md)?;
    info!("weak impact over {} countries", weak.height());
    println!("{}", weak.head(Some(20)));

    let geopolitical = geo::geopolitical_data(
        Path::new(POPULATION_PATH),
        Path::new(GDP_PATH),
        Path::new(GDP_PER_CAPITA_PATH),
    )?;
    println!("{}", geopolitical.head(Some(5)));

    let (regular_weak, stars) = rank::split_star_countries(&weak)?;
    println!("{stars}");

    rank::impact_vs_data(&regular_weak, "sum_votes", &geopolitical, "pop", None)?;

    let rating_cols = Cols::weighted("averageRating", "numVotes");
    let strong = impact::strong_impact(&md, config.metric.as_str(), &rating_cols)?;
    println!("{}", strong.head(Some(20)));

    let representation =
        impact::create_representation(&md, config.repr_size, config.vote_threshold)?;
    println!("{representation}");

    let top = impact::get_top_countries(&md, &representation, config.metric.as_str(), &rating_cols)?;
    println!("{top}");

    let (regular_strong, stars) = rank::split_star_countries(&strong)?;
    println!("{stars}");

    rank::impact_vs_data(&regular_strong, &config.metric, &geopolitical, "pc", None)?;

    impact::movies_quality(
        &md,
        config.repr_size,
        200_000,
        config.metric.as_str(),
        &rating_cols,
        None,
    )?;

    let by_genre = impact::region_genre_analysis(&md, config.metric.as_str(), &rating_cols)?;
    println!("{by_genre}");

    let countries: FxHashSet<&str> = config.countries.iter().map(String::as_str).collect();
    let genres: FxHashSet<&str> = config.genres.iter().map(String::as_str).collect();
    let comparison = rank::make_comparison(&by_genre, &countries, &genres, None)?;
    println!("{comparison}");

    Ok(())
}
