use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use rustc_hash::FxHashMap;

/// A rating strictly below this counts as a flop.
pub const FLOP_THRESHOLD: f64 = 3.0;
/// A rating strictly above this counts as a masterpiece.
pub const MASTERPIECE_THRESHOLD: f64 = 7.0;

/// Named column references a metric reads from its group: `col` for the
/// single-column metrics, `data`/`weight` for `weighted_mean`.
#[derive(Clone, Copy, Default)]
pub struct Cols<'a> {
    pub col: Option<&'a str>,
    pub data: Option<&'a str>,
    pub weight: Option<&'a str>,
}

impl<'a> Cols<'a> {
    pub fn col(name: &'a str) -> Self {
        Self {
            col: Some(name),
            ..Self::default()
        }
    }

    pub fn weighted(data: &'a str, weight: &'a str) -> Self {
        Self {
            data: Some(data),
            weight: Some(weight),
            col: None,
        }
    }

    fn require(field: Option<&'a str>, field_name: &str, metric: &str) -> Result<&'a str> {
        field.ok_or_else(|| {
            Error::Configuration(format!("metric {metric:?} needs a {field_name:?} column"))
        })
    }
}

/// A metric is a plain function over a grouped subset plus named columns; the
/// registry and caller-supplied closures share this exact signature.
pub type MetricFn = fn(&DataFrame, &Cols) -> Result<f64>;

/// Either a registry key or a caller-supplied function carrying its own output
/// column name. Both resolve through [`Measure::resolve`] identically.
#[derive(Clone, Copy)]
pub enum Measure<'a> {
    Named(&'a str),
    Custom { name: &'a str, func: MetricFn },
}

impl<'a> Measure<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Measure::Named(name) => name,
            Measure::Custom { name, .. } => name,
        }
    }

    pub fn resolve(&self) -> Result<MetricFn> {
        match self {
            Measure::Named(name) => QUALITY_MEASURES
                .get(name)
                .copied()
                .ok_or_else(|| Error::UnknownMetric((*name).to_string())),
            Measure::Custom { func, .. } => Ok(*func),
        }
    }
}

impl<'a> From<&'a str> for Measure<'a> {
    fn from(name: &'a str) -> Self {
        Measure::Named(name)
    }
}

pub static QUALITY_MEASURES: Lazy<FxHashMap<&'static str, MetricFn>> = Lazy::new(|| {
    let mut measures: FxHashMap<&'static str, MetricFn> = FxHashMap::default();
    measures.insert("sum_votes", sum_votes as MetricFn);
    measures.insert("mean", mean);
    measures.insert("weighted_mean", weighted_mean);
    measures.insert("flop_prob", flop_prob);
    measures.insert("masterpiece_prob", masterpiece_prob);
    measures.insert("two-sided", two_sided);
    measures
});

fn numeric(group: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = group.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.clone())
}

fn sum_votes(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let name = Cols::require(cols.col, "col", "sum_votes")?;
    Ok(numeric(group, name)?.sum().unwrap_or(0.0))
}

// Denominator is the full group height, nulls included. Historical outputs
// depend on it, so a non-null count would be wrong here.
fn mean(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let name = Cols::require(cols.col, "col", "mean")?;
    Ok(numeric(group, name)?.sum().unwrap_or(0.0) / group.height() as f64)
}

fn weighted_mean(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let data = numeric(group, Cols::require(cols.data, "data", "weighted_mean")?)?;
    let weight = numeric(group, Cols::require(cols.weight, "weight", "weighted_mean")?)?;
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (value, weight) in data.into_iter().zip(weight.into_iter()) {
        if let (Some(value), Some(weight)) = (value, weight) {
            weighted_sum += value * weight;
            weight_sum += weight;
        }
    }
    Ok(weighted_sum / weight_sum)
}

fn fraction_where(group: &DataFrame, name: &str, pred: impl Fn(f64) -> bool) -> Result<f64> {
    let hits = numeric(group, name)?
        .into_iter()
        .flatten()
        .filter(|v| pred(*v))
        .count();
    Ok(hits as f64 / group.height() as f64)
}

fn flop_prob(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let name = Cols::require(cols.col, "col", "flop_prob")?;
    fraction_where(group, name, |v| v < FLOP_THRESHOLD)
}

fn masterpiece_prob(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let name = Cols::require(cols.col, "col", "masterpiece_prob")?;
    fraction_where(group, name, |v| v > MASTERPIECE_THRESHOLD)
}

fn two_sided(group: &DataFrame, cols: &Cols) -> Result<f64> {
    let name = Cols::require(cols.col, "col", "two-sided")?;
    let mut above = 0i64;
    let mut below = 0i64;
    for value in numeric(group, name)?.into_iter().flatten() {
        if value > MASTERPIECE_THRESHOLD {
            above += 1;
        } else if value < FLOP_THRESHOLD {
            below += 1;
        }
    }
    Ok((above - below) as f64 / group.height() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes() -> DataFrame {
        df!("numVotes" => [1i64, 2, 3, 4]).unwrap()
    }

    fn run(name: &str, group: &DataFrame, cols: &Cols) -> f64 {
        Measure::Named(name)
            .resolve()
            .unwrap()(group, cols)
        .unwrap()
    }

    #[test]
    fn registry_metrics_over_simple_group() {
        let group = votes();
        let cols = Cols::col("numVotes");
        assert_eq!(run("sum_votes", &group, &cols), 10.0);
        assert_eq!(run("mean", &group, &cols), 2.5);
        assert_eq!(run("flop_prob", &group, &cols), 0.5);
        assert_eq!(run("masterpiece_prob", &group, &cols), 0.0);
        assert_eq!(run("two-sided", &group, &cols), -0.5);
    }

    #[test]
    fn weighted_mean_matches_hand_computation() {
        let group = df!("data" => [4.0, 5.0, 6.0], "weight" => [1.0, 2.0, 3.0]).unwrap();
        let result = run("weighted_mean", &group, &Cols::weighted("data", "weight"));
        assert!((result - 32.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn mean_divides_by_full_group_height() {
        let group = df!("rating" => [Some(2.0), None, Some(4.0), None]).unwrap();
        assert_eq!(run("mean", &group, &Cols::col("rating")), 1.5);
    }

    #[test]
    fn unknown_metric_is_fatal_at_lookup() {
        let err = Measure::Named("median").resolve().unwrap_err();
        assert!(matches!(err, Error::UnknownMetric(name) if name == "median"));
    }

    #[test]
    fn custom_measure_runs_like_a_registered_one() {
        fn row_count(group: &DataFrame, _cols: &Cols) -> Result<f64> {
            Ok(group.height() as f64)
        }
        let measure = Measure::Custom {
            name: "row_count",
            func: row_count,
        };
        assert_eq!(measure.name(), "row_count");
        let value = measure.resolve().unwrap()(&votes(), &Cols::default()).unwrap();
        assert_eq!(value, 4.0);
    }

    #[test]
    fn missing_named_column_is_a_configuration_error() {
        let err = run_err("weighted_mean", &votes(), &Cols::col("numVotes"));
        assert!(matches!(err, Error::Configuration(_)));
    }

    fn run_err(name: &str, group: &DataFrame, cols: &Cols) -> Error {
        Measure::Named(name).resolve().unwrap()(group, cols).unwrap_err()
    }
}
