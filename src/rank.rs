use crate::error::Result;
use crate::load;
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

/// Dense ranks: tied values share a rank and the rank space has no gaps.
/// Ranking an ascending rank vector ascending reproduces it.
pub fn dense_rank(values: &[f64], descending: bool) -> Vec<u32> {
    let mut distinct = values.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    values
        .iter()
        .map(|value| {
            let pos = match distinct.binary_search_by(|probe| probe.total_cmp(value)) {
                Ok(pos) => pos,
                Err(pos) => pos.min(distinct.len() - 1),
            };
            if descending {
                (distinct.len() - pos) as u32
            } else {
                (pos + 1) as u32
            }
        })
        .collect()
}

/// Ranks an impact metric against an external indicator.
///
/// Both sides are dense-ranked descending over their own full tables before
/// the inner join on `country`, so a country missing from one side never
/// shifts the other side's ranks. `difference = dataRating - impactRating`:
/// positive means the country places higher economically or demographically
/// than cinematically. Sorted ascending by difference and persisted as CSV
/// (a derived default path when none is given).
pub fn impact_vs_data(
    impact: &DataFrame,
    impact_col: &str,
    data: &DataFrame,
    data_col: &str,
    output: Option<&Path>,
) -> Result<DataFrame> {
    let impact_values: Vec<f64> = column_values(impact, impact_col)?;
    let impact_ranks = dense_rank(&impact_values, true);

    let data_values: Vec<f64> = column_values(data, data_col)?;
    let data_ranks = dense_rank(&data_values, true);
    let data_rank_by_country: FxHashMap<&str, u32> = data
        .column("country")?
        .str()?
        .into_iter()
        .zip(data_ranks)
        .filter_map(|(country, rank)| Some((country?, rank)))
        .collect();

    let mut rows: Vec<(&str, u32, u32, i64)> = Vec::new();
    for (country, impact_rank) in impact
        .column("country")?
        .str()?
        .into_iter()
        .zip(impact_ranks)
    {
        let Some(country) = country else {
            continue;
        };
        let Some(&data_rank) = data_rank_by_country.get(country) else {
            continue;
        };
        rows.push((
            country,
            impact_rank,
            data_rank,
            i64::from(data_rank) - i64::from(impact_rank),
        ));
    }
    rows.sort_by_key(|row| row.3);

    let mut result = df!(
        "country" => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        "impactRating" => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        "dataRating" => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        "difference" => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
    )?;

    let path = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(format!("out/task2_{impact_col}_to_{data_col}.csv"))
    });
    load::write_table(&mut result, &path)?;
    Ok(result)
}

/// Rows whose country AND genre are both in the requested sets, original
/// order preserved. A fixed point under repeated application.
pub fn make_comparison(
    table: &DataFrame,
    countries: &FxHashSet<&str>,
    genres: &FxHashSet<&str>,
    output: Option<&Path>,
) -> Result<DataFrame> {
    let mask: Vec<bool> = table
        .column("country")?
        .str()?
        .into_iter()
        .zip(table.column("genre")?.str()?.into_iter())
        .map(|(country, genre)| match (country, genre) {
            (Some(country), Some(genre)) => {
                countries.contains(country) && genres.contains(genre)
            }
            _ => false,
        })
        .collect();
    let mut result = table.filter(&BooleanChunked::from_slice("mask".into(), &mask))?;

    if let Some(path) = output {
        load::write_table(&mut result, path)?;
    }
    Ok(result)
}

/// Splits a country-keyed table into (regular, starred) partitions; starred
/// rows carry the `*`/`**` historical and unrecognized markers.
pub fn split_star_countries(table: &DataFrame) -> Result<(DataFrame, DataFrame)> {
    let starred: Vec<bool> = table
        .column("country")?
        .str()?
        .into_iter()
        .map(|country| country.is_some_and(|c| c.starts_with('*')))
        .collect();
    let regular: Vec<bool> = starred.iter().map(|s| !s).collect();

    Ok((
        table.filter(&BooleanChunked::from_slice("mask".into(), &regular))?,
        table.filter(&BooleanChunked::from_slice("mask".into(), &starred))?,
    ))
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_rank_shares_ranks_and_leaves_no_gaps() {
        assert_eq!(dense_rank(&[10.0, 20.0, 20.0, 5.0], true), vec![2, 1, 1, 3]);
        assert_eq!(dense_rank(&[10.0, 20.0, 20.0, 5.0], false), vec![2, 3, 3, 1]);
    }

    #[test]
    fn dense_rank_is_idempotent_on_ranked_output() {
        let values = [3.5, 1.0, 2.0, 2.0, 9.0];
        let ranks = dense_rank(&values, false);
        let rank_values: Vec<f64> = ranks.iter().map(|r| f64::from(*r)).collect();
        assert_eq!(dense_rank(&rank_values, false), ranks);
    }

    #[test]
    fn impact_vs_data_ranks_both_sides_independently() -> Result<()> {
        let impact = df!(
            "country" => ["United States", "United Kingdom", "Canada"],
            "impact_col" => [100i64, 80, 60],
        )?;
        let data = df!(
            "country" => ["United States", "United Kingdom", "Canada"],
            "pc" => [63543.0, 40384.0, 43559.0],
        )?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ranking.csv");
        let result = impact_vs_data(&impact, "impact_col", &data, "pc", Some(&path))?;

        let expected = df!(
            "country" => ["Canada", "United States", "United Kingdom"],
            "impactRating" => [3u32, 1, 2],
            "dataRating" => [2u32, 1, 3],
            "difference" => [-1i64, 0, 1],
        )?;
        assert!(result.equals(&expected));

        let reloaded = crate::load::load_table(&path, b',', None)?;
        let countries: Vec<&str> = reloaded
            .column("country")?
            .str()?
            .into_no_null_iter()
            .collect();
        assert_eq!(countries, vec!["Canada", "United States", "United Kingdom"]);
        Ok(())
    }

    #[test]
    fn impact_vs_data_drops_countries_missing_from_either_side() -> Result<()> {
        let impact = df!(
            "country" => ["United States", "Poland"],
            "votes" => [100i64, 50],
        )?;
        let data = df!(
            "country" => ["United States", "Germany"],
            "pop" => [331.0, 83.0],
        )?;
        let dir = tempfile::tempdir()?;
        let result = impact_vs_data(&impact, "votes", &data, "pop", Some(&dir.path().join("r.csv")))?;
        let countries: Vec<&str> = result
            .column("country")?
            .str()?
            .into_no_null_iter()
            .collect();
        assert_eq!(countries, vec!["United States"]);
        Ok(())
    }

    fn genre_table() -> DataFrame {
        df!(
            "country" => ["US", "GB", "IN", "US"],
            "genre" => ["Action", "Drama", "Comedy", "Comedy"],
            "sum_votes" => [100i64, 200, 300, 400],
        )
        .unwrap()
    }

    #[test]
    fn comparison_requires_both_memberships_per_row() -> Result<()> {
        let countries = FxHashSet::from_iter(["US", "GB"]);
        let genres = FxHashSet::from_iter(["Action", "Drama"]);
        let result = make_comparison(&genre_table(), &countries, &genres, None)?;

        // The US/Comedy row matches the country set but not the genre set.
        let expected = df!(
            "country" => ["US", "GB"],
            "genre" => ["Action", "Drama"],
            "sum_votes" => [100i64, 200],
        )?;
        assert!(result.equals(&expected));
        Ok(())
    }

    #[test]
    fn comparison_is_a_fixed_point() -> Result<()> {
        let countries = FxHashSet::from_iter(["US", "GB"]);
        let genres = FxHashSet::from_iter(["Action", "Drama"]);
        let once = make_comparison(&genre_table(), &countries, &genres, None)?;
        let twice = make_comparison(&once, &countries, &genres, None)?;
        assert!(twice.equals(&once));
        Ok(())
    }

    #[test]
    fn comparison_persists_when_asked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("comparison.csv");
        let countries = FxHashSet::from_iter(["US", "GB"]);
        let genres = FxHashSet::from_iter(["Action", "Drama"]);
        let result = make_comparison(&genre_table(), &countries, &genres, Some(&path))?;
        let reloaded = crate::load::load_table(&path, b',', None)?;
        assert!(reloaded.equals(&result));
        Ok(())
    }

    #[test]
    fn star_split_partitions_preserving_order() -> Result<()> {
        let table = df!(
            "country" => ["USA", "GBR", "*FR", "CAN", "*DE"],
            "value" => [100i64, 80, 70, 60, 50],
        )?;
        let (regulars, stars) = split_star_countries(&table)?;

        let expected_regulars = df!(
            "country" => ["USA", "GBR", "CAN"],
            "value" => [100i64, 80, 60],
        )?;
        let expected_stars = df!(
            "country" => ["*FR", "*DE"],
            "value" => [70i64, 50],
        )?;
        assert!(regulars.equals(&expected_regulars));
        assert!(stars.equals(&expected_stars));
        Ok(())
    }
}
