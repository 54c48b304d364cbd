use crate::countries;
use crate::error::Result;
use crate::load;
use ahash::HashMap;
use polars::prelude::*;
use std::path::Path;

/// Joins the three World Bank indicator tables into one latest-value row per
/// resolvable country: `country`, `pop`, `gdp`, `pc`.
pub fn geopolitical_data(
    population_path: &Path,
    gdp_path: &Path,
    per_capita_path: &Path,
) -> Result<DataFrame> {
    assemble(
        load::load_table(population_path, b',', None)?,
        load::load_table(gdp_path, b',', None)?,
        load::load_table(per_capita_path, b',', None)?,
    )
}

pub fn assemble(population: DataFrame, gdp: DataFrame, per_capita: DataFrame) -> Result<DataFrame> {
    let years = year_columns(&[&population, &gdp, &per_capita]);
    let population_latest = latest_values(&population, &years)?;
    let gdp_latest = latest_values(&gdp, &years)?;
    let per_capita_latest = latest_values(&per_capita, &years)?;

    let gdp_by_code: HashMap<&str, f64> = gdp
        .column("Country Code")?
        .str()?
        .into_iter()
        .zip(gdp_latest)
        .filter_map(|(code, value)| Some((code?, value)))
        .collect();
    let per_capita_by_code: HashMap<&str, f64> = per_capita
        .column("Country Code")?
        .str()?
        .into_iter()
        .zip(per_capita_latest)
        .filter_map(|(code, value)| Some((code?, value)))
        .collect();

    // Inner join on code in population row order; unresolvable codes
    // (aggregates like WLD or EUU) drop out with their empty names.
    let mut names = Vec::new();
    let mut pop_values = Vec::new();
    let mut gdp_values = Vec::new();
    let mut per_capita_values = Vec::new();
    for (code, pop) in population
        .column("Country Code")?
        .str()?
        .into_iter()
        .zip(population_latest)
    {
        let Some(code) = code else {
            continue;
        };
        let (Some(&gdp), Some(&pc)) = (gdp_by_code.get(code), per_capita_by_code.get(code)) else {
            continue;
        };
        let country = countries::resolve(code);
        if country.is_empty() {
            continue;
        }
        names.push(country);
        pop_values.push(pop);
        gdp_values.push(gdp);
        per_capita_values.push(pc);
    }

    Ok(df!(
        "country" => names,
        "pop" => pop_values,
        "gdp" => gdp_values,
        "pc" => per_capita_values,
    )?)
}

/// Column names that parse as integers, across all frames, sorted ascending.
fn year_columns(frames: &[&DataFrame]) -> Vec<String> {
    let mut years: Vec<i32> = frames
        .iter()
        .flat_map(|df| df.get_column_names())
        .filter_map(|name| name.as_str().trim().parse().ok())
        .collect();
    years.sort_unstable();
    years.dedup();
    years.into_iter().map(|year| year.to_string()).collect()
}

/// Per row, the most recent non-missing year value, scanning the year columns
/// in descending order; `0.0` when every year is missing.
fn latest_values(df: &DataFrame, years: &[String]) -> Result<Vec<f64>> {
    let mut columns = Vec::new();
    for year in years {
        if let Ok(column) = df.column(year) {
            columns.push(column.cast(&DataType::Float64)?.f64()?.clone());
        }
    }

    let mut latest = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let value = columns
            .iter()
            .rev()
            .find_map(|column| column.get(row))
            .unwrap_or(0.0);
        latest.push(value);
    }
    Ok(latest)
}
