use crate::countries;
use crate::data::ImdbData;
use crate::error::{Error, Result};
use crate::load;
use crate::metrics::{Cols, Measure};
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Title-region pairs joined with their rating row: `tconst`, `region`,
/// `averageRating`, `numVotes`. Titles without a rating drop out here.
fn region_ratings(md: &ImdbData) -> Result<DataFrame> {
    let regions = md.title_region_table()?;
    let info = md.title_info_table()?;

    let info_ids = info.column("tconst")?.str()?;
    let ratings = info.column("averageRating")?.cast(&DataType::Float64)?;
    let ratings = ratings.f64()?.clone();
    let votes = info.column("numVotes")?.cast(&DataType::Int64)?;
    let votes = votes.i64()?.clone();
    let by_id: FxHashMap<&str, (f64, i64)> = info_ids
        .into_iter()
        .zip(ratings.into_iter())
        .zip(votes.into_iter())
        .filter_map(|((id, rating), votes)| Some((id?, (rating?, votes?))))
        .collect();

    let mut out_ids = Vec::new();
    let mut out_regions = Vec::new();
    let mut out_ratings = Vec::new();
    let mut out_votes = Vec::new();
    for (id, region) in regions
        .column("tconst")?
        .str()?
        .into_iter()
        .zip(regions.column("region")?.str()?.into_iter())
    {
        let (Some(id), Some(region)) = (id, region) else {
            continue;
        };
        if let Some(&(rating, votes)) = by_id.get(id) {
            out_ids.push(id);
            out_regions.push(region);
            out_ratings.push(rating);
            out_votes.push(votes);
        }
    }

    Ok(df!(
        "tconst" => out_ids,
        "region" => out_regions,
        "averageRating" => out_ratings,
        "numVotes" => out_votes,
    )?)
}

/// Row indices per key, keys in first-appearance order.
fn group_rows<K>(keys: impl Iterator<Item = Option<K>>) -> (Vec<K>, Vec<Vec<IdxSize>>)
where
    K: Eq + Hash + Clone,
{
    let mut slots: FxHashMap<K, usize> = FxHashMap::default();
    let mut order = Vec::new();
    let mut groups: Vec<Vec<IdxSize>> = Vec::new();
    for (row, key) in keys.enumerate() {
        let Some(key) = key else {
            continue;
        };
        let slot = match slots.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = groups.len();
                slots.insert(key.clone(), slot);
                order.push(key);
                groups.push(Vec::new());
                slot
            }
        };
        groups[slot].push(row as IdxSize);
    }
    (order, groups)
}

/// Applies `measure` per region group of `joined`, resolving region codes to
/// country names and dropping groups whose code resolves to nothing.
fn metric_by_region(joined: &DataFrame, measure: Measure<'_>, cols: &Cols<'_>) -> Result<DataFrame> {
    let func = measure.resolve()?;
    let codes = joined.column("region")?.str()?;
    let (order, groups) = group_rows(codes.into_iter().map(|c| c.map(str::to_string)));

    let mut names = Vec::new();
    let mut values = Vec::new();
    for (code, rows) in order.iter().zip(groups) {
        let country = countries::resolve(code);
        if country.is_empty() {
            continue;
        }
        let group = joined.take(&IdxCa::from_vec("rows".into(), rows))?;
        values.push(func(&group, cols)?);
        names.push(country);
    }
    Ok(df!("country" => names, measure.name() => values)?)
}

/// Total vote count per country, the no-parameter popularity measure.
pub fn weak_impact(md: &ImdbData) -> Result<DataFrame> {
    let joined = region_ratings(md)?;
    let codes = joined.column("region")?.str()?;
    let votes = joined.column("numVotes")?.i64()?;

    let mut order: Vec<&str> = Vec::new();
    let mut sums: FxHashMap<&str, i64> = FxHashMap::default();
    for (code, votes) in codes.into_iter().zip(votes.into_iter()) {
        let (Some(code), Some(votes)) = (code, votes) else {
            continue;
        };
        if !sums.contains_key(code) {
            order.push(code);
        }
        *sums.entry(code).or_insert(0) += votes;
    }

    let mut names = Vec::new();
    let mut values = Vec::new();
    for code in order {
        let country = countries::resolve(code);
        if country.is_empty() {
            continue;
        }
        values.push(sums[code]);
        names.push(country);
    }
    Ok(df!("country" => names, "sum_votes" => values)?)
}

/// Arbitrary quality metric per country over the title-region join.
pub fn strong_impact<'a>(
    md: &ImdbData,
    measure: impl Into<Measure<'a>>,
    cols: &Cols<'_>,
) -> Result<DataFrame> {
    metric_by_region(&region_ratings(md)?, measure.into(), cols)
}

/// Explodes each title's genre list and applies the metric per
/// (country, genre) pair.
pub fn region_genre_analysis<'a>(
    md: &ImdbData,
    measure: impl Into<Measure<'a>>,
    cols: &Cols<'_>,
) -> Result<DataFrame> {
    let measure = measure.into();
    let func = measure.resolve()?;
    let joined = region_ratings(md)?;
    let info = md.title_info_table()?;

    let genres_by_id: FxHashMap<&str, Vec<&str>> = info
        .column("tconst")?
        .str()?
        .into_iter()
        .zip(info.column("genres")?.str()?.into_iter())
        .filter_map(|(id, genres)| {
            let genres = genres.filter(|g| *g != "\\N")?;
            Some((id?, genres.split(',').filter(|g| !g.is_empty()).collect()))
        })
        .collect();

    let mut exp_regions = Vec::new();
    let mut exp_genres = Vec::new();
    let mut exp_ratings = Vec::new();
    let mut exp_votes = Vec::new();
    for (((id, region), rating), votes) in joined
        .column("tconst")?
        .str()?
        .into_iter()
        .zip(joined.column("region")?.str()?.into_iter())
        .zip(joined.column("averageRating")?.f64()?.into_iter())
        .zip(joined.column("numVotes")?.i64()?.into_iter())
    {
        let (Some(id), Some(region)) = (id, region) else {
            continue;
        };
        let Some(genres) = genres_by_id.get(id) else {
            continue;
        };
        for genre in genres {
            exp_regions.push(region);
            exp_genres.push(*genre);
            exp_ratings.push(rating);
            exp_votes.push(votes);
        }
    }
    let exploded = df!(
        "region" => &exp_regions,
        "genre" => &exp_genres,
        "averageRating" => exp_ratings,
        "numVotes" => exp_votes,
    )?;

    let keys = exp_regions
        .iter()
        .zip(exp_genres.iter())
        .map(|(region, genre)| Some((region.to_string(), genre.to_string())));
    let (order, groups) = group_rows(keys);

    let mut names = Vec::new();
    let mut genre_col = Vec::new();
    let mut values = Vec::new();
    for ((code, genre), rows) in order.iter().zip(groups) {
        let country = countries::resolve(code);
        if country.is_empty() {
            continue;
        }
        let group = exploded.take(&IdxCa::from_vec("rows".into(), rows))?;
        values.push(func(&group, cols)?);
        names.push(country);
        genre_col.push(genre.clone());
    }
    Ok(df!("country" => names, "genre" => genre_col, measure.name() => values)?)
}

/// The top titles by vote count among those strictly above the vote
/// threshold: a fixed-size sample for per-country quality ranking.
pub fn create_representation(
    md: &ImdbData,
    repr_size: usize,
    vote_threshold: i64,
) -> Result<DataFrame> {
    if vote_threshold < 0 {
        return Err(Error::Configuration(format!(
            "vote threshold must be non-negative, got {vote_threshold}"
        )));
    }
    let info = md.title_info_table()?;
    let votes = info.column("numVotes")?.cast(&DataType::Int64)?;

    let mut qualified: Vec<(IdxSize, i64)> = votes
        .i64()?
        .into_iter()
        .enumerate()
        .filter_map(|(row, votes)| {
            let votes = votes?;
            (votes > vote_threshold).then_some((row as IdxSize, votes))
        })
        .collect();
    // Stable sort: equal vote counts keep their join order.
    qualified.sort_by(|a, b| b.1.cmp(&a.1));
    qualified.truncate(repr_size);

    let rows: Vec<IdxSize> = qualified.into_iter().map(|(row, _)| row).collect();
    let sample = info.take(&IdxCa::from_vec("rows".into(), rows))?;
    Ok(sample.select(["tconst", "averageRating", "numVotes"])?)
}

/// Country metric restricted to the representative sample.
pub fn get_top_countries<'a>(
    md: &ImdbData,
    representation: &DataFrame,
    measure: impl Into<Measure<'a>>,
    cols: &Cols<'_>,
) -> Result<DataFrame> {
    let keep: FxHashSet<&str> = representation
        .column("tconst")?
        .str()?
        .into_iter()
        .flatten()
        .collect();

    let joined = region_ratings(md)?;
    let mask: Vec<bool> = joined
        .column("tconst")?
        .str()?
        .into_iter()
        .map(|id| id.is_some_and(|id| keep.contains(id)))
        .collect();
    let sample = joined.filter(&BooleanChunked::from_slice("mask".into(), &mask))?;
    metric_by_region(&sample, measure.into(), cols)
}

/// `create_representation` + `get_top_countries`, persisted as CSV.
pub fn movies_quality<'a>(
    md: &ImdbData,
    repr_size: usize,
    vote_threshold: i64,
    measure: impl Into<Measure<'a>>,
    cols: &Cols<'_>,
    output: Option<&Path>,
) -> Result<DataFrame> {
    let measure = measure.into();
    let representation = create_representation(md, repr_size, vote_threshold)?;
    let mut result = get_top_countries(md, &representation, measure, cols)?;
    let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(format!("out/movies_quality_{}.csv", measure.name()))
    });
    load::write_table(&mut result, &path)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;

    fn countries_of(df: &DataFrame) -> Vec<String> {
        df.column("country")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(str::to_string)
            .collect()
    }

    fn floats_of(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn weak_impact_sums_votes_per_country() -> Result<()> {
        let result = weak_impact(&fixtures::imdb())?;
        // First-appearance order of the region codes: US before GB.
        assert_eq!(countries_of(&result), vec!["United States", "United Kingdom"]);
        let sums: Vec<i64> = result
            .column("sum_votes")?
            .i64()?
            .into_no_null_iter()
            .collect();
        assert_eq!(sums, vec![100, 250]);
        Ok(())
    }

    #[test]
    fn strong_impact_applies_weighted_mean_per_country() -> Result<()> {
        let result = strong_impact(
            &fixtures::imdb(),
            "weighted_mean",
            &Cols::weighted("averageRating", "numVotes"),
        )?;
        assert_eq!(countries_of(&result), vec!["United States", "United Kingdom"]);
        let values = floats_of(&result, "weighted_mean");
        assert!((values[0] - 8.0).abs() < 1e-9);
        assert!((values[1] - 7.7).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn strong_impact_rejects_unknown_metric() {
        let err = strong_impact(&fixtures::imdb(), "median", &Cols::col("averageRating"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMetric(_)));
    }

    #[test]
    fn genre_analysis_explodes_genres_per_country() -> Result<()> {
        let result = region_genre_analysis(
            &fixtures::imdb(),
            "weighted_mean",
            &Cols::weighted("averageRating", "numVotes"),
        )?;

        let genres: Vec<&str> = result.column("genre")?.str()?.into_no_null_iter().collect();
        assert_eq!(
            countries_of(&result),
            vec![
                "United States",
                "United States",
                "United States",
                "United Kingdom",
                "United Kingdom",
                "United Kingdom",
                "United Kingdom",
                "United Kingdom",
            ]
        );
        assert_eq!(
            genres,
            vec![
                "Comedy", "Romantic", "Drama", "Comedy", "Romantic", "Drama", "Moving", "Action",
            ]
        );

        let values = floats_of(&result, "weighted_mean");
        let expected = [8.0, 8.0, 8.0, 8.0, 7.7, 8.0, 7.5, 7.5];
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn representation_keeps_top_titles_above_threshold() -> Result<()> {
        let sample = create_representation(&fixtures::imdb(), 2, 90)?;
        let ids: Vec<&str> = sample.column("tconst")?.str()?.into_no_null_iter().collect();
        assert_eq!(ids, vec!["tt002", "tt001"]);

        // Size one keeps only the most-voted title.
        let sample = create_representation(&fixtures::imdb(), 1, 90)?;
        let ids: Vec<&str> = sample.column("tconst")?.str()?.into_no_null_iter().collect();
        assert_eq!(ids, vec!["tt002"]);
        Ok(())
    }

    #[test]
    fn representation_rejects_negative_threshold() {
        let err = create_representation(&fixtures::imdb(), 2, -1).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn top_countries_restrict_to_the_sample() -> Result<()> {
        let md = fixtures::imdb();
        let representation = create_representation(&md, 2, 90)?;
        let result = get_top_countries(&md, &representation, "sum_votes", &Cols::col("numVotes"))?;
        assert_eq!(countries_of(&result), vec!["United States", "United Kingdom"]);
        assert_eq!(floats_of(&result, "sum_votes"), vec![100.0, 250.0]);

        // A one-title sample drops the other title's regions entirely.
        let representation = create_representation(&md, 1, 90)?;
        let result = get_top_countries(&md, &representation, "sum_votes", &Cols::col("numVotes"))?;
        assert_eq!(countries_of(&result), vec!["United Kingdom"]);
        assert_eq!(floats_of(&result, "sum_votes"), vec![150.0]);
        Ok(())
    }

    #[test]
    fn movies_quality_persists_its_result() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quality.csv");
        let result = movies_quality(
            &fixtures::imdb(),
            2,
            90,
            "sum_votes",
            &Cols::col("numVotes"),
            Some(&path),
        )?;
        let reloaded = crate::load::load_table(&path, b',', None)?;
        assert!(reloaded.equals(&result));
        Ok(())
    }
}
