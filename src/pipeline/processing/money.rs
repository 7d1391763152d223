use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::constants::{cost_column, quota_column, ID, MONEY_CATEGORIES, YEAR};
use crate::error::Result;
use crate::metrics::CleaningMetrics;
use crate::pipeline::processing::Cleaner;
use crate::table;
use crate::types::TableKind;

/// Text written into missing cells of non-numeric money columns.
const TEXT_ZERO: &str = "0";

/// Derive whichever of quota/cost is missing from the other, in place.
/// Rows missing both are left alone. Returns the number of cells filled.
pub fn cross_impute(quota: &mut [Option<f64>], cost: &mut [Option<f64>], rate: f64) -> usize {
    let mut filled = 0;
    for (q, c) in quota.iter_mut().zip(cost.iter_mut()) {
        match (*q, *c) {
            (None, Some(c)) => {
                *q = Some(c / rate);
                filled += 1;
            }
            (Some(q), None) => {
                *c = Some(q * rate);
                filled += 1;
            }
            _ => {}
        }
    }
    filled
}

/// Clean the financing table.
///
/// Quota and cost of each financing category are derived from each other
/// through the category's fixed rate. Every column other than `ID` and
/// `year` is then zero-filled, so rows missing both quota and cost end at
/// zero; text columns get the text `"0"`. Missing years are forward-filled
/// last.
#[instrument(skip_all, fields(table = "money", rows = raw.height()))]
pub fn clean_money(raw: &DataFrame) -> Result<DataFrame> {
    let name = TableKind::Money.name();
    let mut out = raw.clone();

    let mut rate_filled = 0;
    for (category, rate) in MONEY_CATEGORIES {
        let quota_name = quota_column(category);
        let cost_name = cost_column(category);
        let mut quota = table::values(&out, name, &quota_name)?;
        let mut cost = table::values(&out, name, &cost_name)?;
        let filled = cross_impute(&mut quota, &mut cost, rate);
        debug!(category, rate, filled, "Rate-derived quota/cost");
        rate_filled += filled;
        table::put(&mut out, Series::new(quota_name.as_str().into(), quota))?;
        table::put(&mut out, Series::new(cost_name.as_str().into(), cost))?;
    }

    let mut zero_filled = 0;
    for column in table::numeric_columns_except(&out, &[ID, YEAR]) {
        let series = table::column(&out, name, &column)?.as_materialized_series().clone();
        zero_filled += series.null_count();
        table::put(&mut out, series.fill_null(FillNullStrategy::Zero)?)?;
    }
    for column in table::text_columns_except(&out, &[ID, YEAR]) {
        let cells = table::text(&out, name, &column)?;
        zero_filled += cells.null_count();
        let filled: Vec<&str> = cells.into_iter().map(|c| c.unwrap_or(TEXT_ZERO)).collect();
        let series = Series::new(column.as_str().into(), filled);
        table::put(&mut out, series)?;
    }

    let years = table::column(&out, name, YEAR)?.as_materialized_series().clone();
    let filled_years = years.fill_null(FillNullStrategy::Forward(None))?;
    let year_filled = years.null_count() - filled_years.null_count();
    let leading = filled_years.null_count();
    if leading > 0 {
        warn!(rows = leading, "Leading rows have no year to forward-fill from");
    }
    table::put(&mut out, filled_years)?;

    CleaningMetrics::record_imputed(name, "rate", rate_filled);
    CleaningMetrics::record_imputed(name, "zero", zero_filled);
    CleaningMetrics::record_imputed(name, "ffill", year_filled);
    info!(
        "🔧 Cleaned money: {} rate-derived, {} zero-filled, {} years forward-filled",
        rate_filled, zero_filled, year_filled
    );
    Ok(out)
}

pub struct MoneyCleaner;

impl Cleaner for MoneyCleaner {
    fn table(&self) -> TableKind {
        TableKind::Money
    }

    fn clean(&self, raw: &DataFrame) -> Result<DataFrame> {
        clean_money(raw)
    }
}
