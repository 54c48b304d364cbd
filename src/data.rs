use crate::error::{Error, Result};
use crate::load;
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use tracing::debug;

pub const BASICS_COLUMNS: &[&str] = &["tconst", "titleType", "startYear", "genres"];
pub const AKAS_COLUMNS: &[&str] = &["titleId", "title", "region", "isOriginalTitle"];
pub const RATINGS_COLUMNS: &[&str] = &["tconst", "averageRating", "numVotes"];

/// The per-session IMDb working set: title basics, regional aliases and
/// ratings, scoped at construction to one production type and an inclusive
/// start-year range. The source frames are never mutated; the scope lives in
/// `selected_rows` (indices into `basics`) and `selected` (the id set).
#[derive(Debug)]
pub struct ImdbData {
    basics: DataFrame,
    akas: DataFrame,
    ratings: DataFrame,
    selected_rows: Vec<IdxSize>,
    selected: FxHashSet<String>,
}

impl ImdbData {
    pub fn from_paths(
        basics_path: &Path,
        ratings_path: &Path,
        akas_path: &Path,
        title_type: &str,
        years: (i32, i32),
    ) -> Result<Self> {
        let basics = load::load_table(basics_path, b'\t', Some(BASICS_COLUMNS))?;
        let ratings = load::load_table(ratings_path, b'\t', Some(RATINGS_COLUMNS))?;
        let akas = load::load_table(akas_path, b'\t', Some(AKAS_COLUMNS))?;
        Self::from_frames(basics, ratings, akas, title_type, years)
    }

    pub fn from_frames(
        basics: DataFrame,
        ratings: DataFrame,
        akas: DataFrame,
        title_type: &str,
        years: (i32, i32),
    ) -> Result<Self> {
        let (start, end) = years;
        if end < start {
            return Err(Error::Configuration(format!(
                "year range end {end} precedes start {start}"
            )));
        }

        let ids = basics.column("tconst")?.str()?.clone();
        let types = basics.column("titleType")?.str()?.clone();
        // Tolerant cast: raw IMDb dumps carry startYear as text with `\N`
        // holes, inferred fixtures carry it as integers. Unparseable years
        // become null and fall out of the range test.
        let start_years = basics.column("startYear")?.cast(&DataType::Int32)?;
        let start_years = start_years.i32()?.clone();

        let mut selected_rows = Vec::new();
        let mut selected = FxHashSet::default();
        for (row, ((id, ty), year)) in ids
            .into_iter()
            .zip(types.into_iter())
            .zip(start_years.into_iter())
            .enumerate()
        {
            let (Some(id), Some(ty), Some(year)) = (id, ty, year) else {
                continue;
            };
            if ty == title_type && (start..=end).contains(&year) {
                selected_rows.push(row as IdxSize);
                selected.insert(id.to_string());
            }
        }
        debug!(
            titles = basics.height(),
            selected = selected_rows.len(),
            title_type,
            "scoped title working set"
        );

        Ok(Self {
            basics,
            akas,
            ratings,
            selected_rows,
            selected,
        })
    }

    /// One row per in-scope title that has a rating: the basics columns plus
    /// `averageRating` and `numVotes`, in filtered-basics order. Titles
    /// without a rating drop out (inner-join semantics, intentional).
    pub fn title_info_table(&self) -> Result<DataFrame> {
        let ids = self.basics.column("tconst")?.str()?;
        let rating_rows: FxHashMap<&str, IdxSize> = self
            .ratings
            .column("tconst")?
            .str()?
            .into_iter()
            .enumerate()
            .filter_map(|(row, id)| id.map(|id| (id, row as IdxSize)))
            .collect();

        let mut basics_rows = Vec::new();
        let mut ratings_rows = Vec::new();
        for &row in &self.selected_rows {
            let Some(id) = ids.get(row as usize) else {
                continue;
            };
            if let Some(&rating_row) = rating_rows.get(id) {
                basics_rows.push(row);
                ratings_rows.push(rating_row);
            }
        }

        let left = self
            .basics
            .take(&IdxCa::from_vec("rows".into(), basics_rows))?;
        let right = self
            .ratings
            .take(&IdxCa::from_vec("rows".into(), ratings_rows))?
            .drop("tconst")?;
        Ok(left.hstack(right.get_columns())?)
    }

    /// Deduplicated `(tconst, region)` pairs for the in-scope titles.
    ///
    /// The original-title alias text is matched back against the non-original
    /// aliases of the same title; the region of an exact-text re-release is
    /// what ties a title to a country. A localized release that renamed the
    /// title entirely never matches and is silently lost. That loss is the
    /// documented semantics of this join, not a defect; `region_join_stats`
    /// exposes its rate.
    pub fn title_region_table(&self) -> Result<DataFrame> {
        Ok(self.region_join()?.0)
    }

    /// Candidate non-original alias rows in vs. region rows out.
    pub fn region_join_stats(&self) -> Result<(usize, usize)> {
        Ok(self.region_join()?.1)
    }

    fn region_join(&self) -> Result<(DataFrame, (usize, usize))> {
        let ids = self.akas.column("titleId")?.str()?;
        let titles = self.akas.column("title")?.str()?;
        let regions = self.akas.column("region")?.str()?;
        let original = self.akas.column("isOriginalTitle")?.cast(&DataType::Int32)?;
        let original = original.i32()?.clone();

        let mut original_titles: FxHashSet<(&str, &str)> = FxHashSet::default();
        for ((id, title), flag) in ids
            .into_iter()
            .zip(titles.into_iter())
            .zip(original.into_iter())
        {
            let (Some(id), Some(title), Some(1)) = (id, title, flag) else {
                continue;
            };
            if self.selected.contains(id) {
                original_titles.insert((id, title));
            }
        }

        let mut candidates = 0usize;
        let mut seen: FxHashSet<(&str, &str)> = FxHashSet::default();
        let mut out_ids = Vec::new();
        let mut out_regions = Vec::new();
        for (((id, title), region), flag) in ids
            .into_iter()
            .zip(titles.into_iter())
            .zip(regions.into_iter())
            .zip(original.into_iter())
        {
            let (Some(id), Some(title), Some(0)) = (id, title, flag) else {
                continue;
            };
            if !self.selected.contains(id) {
                continue;
            }
            candidates += 1;
            let Some(region) = region.filter(|r| *r != "\\N") else {
                continue;
            };
            if original_titles.contains(&(id, title)) && seen.insert((id, region)) {
                out_ids.push(id);
                out_regions.push(region);
            }
        }
        debug!(
            rows_in = candidates,
            rows_out = out_ids.len(),
            "title-region alias join"
        );

        let out = out_ids.len();
        Ok((
            df!("tconst" => out_ids, "region" => out_regions)?,
            (candidates, out),
        ))
    }
}
