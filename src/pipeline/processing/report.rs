use polars::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::constants::{
    EMPLOYEES, OPERATING_INCOME, OWNERS_EQUITY, REPORT_DRIVERS, TOTAL_ASSETS, TOTAL_LIABILITIES,
    YEAR,
};
use crate::error::Result;
use crate::metrics::CleaningMetrics;
use crate::pipeline::processing::Cleaner;
use crate::table;
use crate::types::TableKind;

/// Statistic substituted for a missing value or an undefined ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Mean,
    Median,
}

impl Fallback {
    fn compute(&self, values: &Float64Chunked) -> Option<f64> {
        match self {
            Fallback::Mean => values.mean(),
            Fallback::Median => values.median(),
        }
    }

    fn rule(&self) -> &'static str {
        match self {
            Fallback::Mean => "mean",
            Fallback::Median => "median",
        }
    }
}

/// Row-wise `target / driver`, missing where either side is missing, the
/// driver is zero or the result is not finite.
fn ratio(target: &Float64Chunked, driver: &Float64Chunked) -> Float64Chunked {
    target
        .into_iter()
        .zip(driver.into_iter())
        .map(|(t, d)| match (t, d) {
            (Some(t), Some(d)) if d != 0.0 => Some(t / d).filter(|r| r.is_finite()),
            _ => None,
        })
        .collect()
}

/// Fill missing values of `column` with its own mean or median.
fn impute_direct(frame: &mut DataFrame, column: &str, fallback: Fallback) -> Result<usize> {
    let values = table::numeric(frame, TableKind::Report.name(), column)?;
    let Some(fill) = fallback.compute(values) else {
        warn!(column, "Column has no values; left missing");
        return Ok(0);
    };
    let filled = values.null_count();
    let series = values.fill_null_with_values(fill)?.into_series();
    table::put(frame, series)?;
    debug!(column, fill, filled, rule = fallback.rule(), "Direct imputation");
    CleaningMetrics::record_imputed(TableKind::Report.name(), fallback.rule(), filled);
    Ok(filled)
}

/// Rebuild `target` as `ratio × driver`, where the ratio is the row's own
/// `target / driver` when defined and the fallback statistic of the defined
/// ratios otherwise. Returns how many rows used the fallback.
pub fn impute_by_ratio(
    frame: &mut DataFrame,
    target: &str,
    driver: &str,
    fallback: Fallback,
) -> Result<usize> {
    let table_name = TableKind::Report.name();
    let drivers = table::numeric(frame, table_name, driver)?.clone();
    let ratios = ratio(table::numeric(frame, table_name, target)?, &drivers);

    let Some(fill) = fallback.compute(&ratios) else {
        warn!(target, driver, "No defined ratios; column left unchanged");
        return Ok(0);
    };
    let substituted = ratios.null_count();
    let ratios = ratios.fill_null_with_values(fill)?;

    let rebuilt: Vec<Option<f64>> = ratios
        .into_iter()
        .zip(drivers.into_iter())
        .map(|(r, d)| match (r, d) {
            (Some(r), Some(d)) => Some(r * d),
            _ => None,
        })
        .collect();
    table::put(frame, Series::new(target.into(), rebuilt))?;

    debug!(target, driver, fill, substituted, rule = fallback.rule(), "Ratio imputation");
    CleaningMetrics::record_imputed(table_name, "ratio", substituted);
    Ok(substituted)
}

/// Clean the annual report table.
///
/// Steps run in order because each ratio uses the already-imputed driver:
/// owner's equity is dropped, years are forward-filled, employees take the
/// mean and total assets the median, liabilities and operating income are
/// rebuilt from their ratio to total assets (median and mean fallback
/// respectively), and every income breakdown column is rebuilt from its ratio
/// to operating income (median fallback).
#[instrument(skip_all, fields(table = "report", rows = raw.height()))]
pub fn clean_report(raw: &DataFrame) -> Result<DataFrame> {
    let name = TableKind::Report.name();
    let mut out = raw.clone();

    table::column(&out, name, OWNERS_EQUITY)?;
    out.drop_in_place(OWNERS_EQUITY)?;

    let years = table::column(&out, name, YEAR)?.as_materialized_series().clone();
    let filled_years = years.fill_null(FillNullStrategy::Forward(None))?;
    let year_filled = years.null_count() - filled_years.null_count();
    table::put(&mut out, filled_years)?;
    CleaningMetrics::record_imputed(name, "ffill", year_filled);

    let mut direct = impute_direct(&mut out, EMPLOYEES, Fallback::Mean)?;
    direct += impute_direct(&mut out, TOTAL_ASSETS, Fallback::Median)?;

    // Liabilities fall back to the median ratio, income to the mean ratio
    let mut by_ratio = impute_by_ratio(&mut out, TOTAL_LIABILITIES, TOTAL_ASSETS, Fallback::Median)?;
    by_ratio += impute_by_ratio(&mut out, OPERATING_INCOME, TOTAL_ASSETS, Fallback::Mean)?;

    let breakdown = table::numeric_columns_except(&out, &REPORT_DRIVERS);
    for column in &breakdown {
        by_ratio += impute_by_ratio(&mut out, column, OPERATING_INCOME, Fallback::Median)?;
    }

    info!(
        "🔧 Cleaned report: {} years forward-filled, {} direct, {} ratio fallbacks across {} breakdown columns",
        year_filled,
        direct,
        by_ratio,
        breakdown.len()
    );
    Ok(out)
}

pub struct ReportCleaner;

impl Cleaner for ReportCleaner {
    fn table(&self) -> TableKind {
        TableKind::Report
    }

    fn clean(&self, raw: &DataFrame) -> Result<DataFrame> {
        clean_report(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use crate::constants::ID;

    const MAIN_INCOME: &str = "主营业务收入";

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map_or(false, |a| (a - b).abs() < 1e-9)
    }

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        table::values(df, "report", name).unwrap()
    }

    /// Row 0 and 1 are complete, row 2 is missing everything but ID.
    fn raw_report() -> DataFrame {
        df!(
            ID => [1.0, 2.0, 3.0],
            YEAR => [Some(2015.0), Some(2016.0), None],
            EMPLOYEES => [Some(10.0), Some(30.0), None],
            TOTAL_ASSETS => [Some(100.0), Some(300.0), None],
            TOTAL_LIABILITIES => [Some(40.0), Some(60.0), None],
            OPERATING_INCOME => [Some(50.0), Some(300.0), None],
            OWNERS_EQUITY => [Some(60.0), Some(240.0), None],
            MAIN_INCOME => [Some(25.0), Some(60.0), None]
        )
        .unwrap()
    }

    #[test]
    fn drops_owners_equity_and_fills_year() {
        let cleaned = clean_report(&raw_report()).unwrap();
        assert!(cleaned.column(OWNERS_EQUITY).is_err());
        assert_eq!(values(&cleaned, YEAR)[2], Some(2016.0));
    }

    #[test]
    fn direct_fills_use_mean_and_median() {
        let cleaned = clean_report(&raw_report()).unwrap();
        assert_eq!(values(&cleaned, EMPLOYEES)[2], Some(20.0));
        assert_eq!(values(&cleaned, TOTAL_ASSETS)[2], Some(200.0));
    }

    #[test]
    fn liabilities_follow_ratio_to_assets() {
        let cleaned = clean_report(&raw_report()).unwrap();
        let assets = values(&cleaned, TOTAL_ASSETS);
        let liabilities = values(&cleaned, TOTAL_LIABILITIES);
        // clean rows keep their own ratio
        assert!(approx(liabilities[0], 40.0));
        assert!(approx(liabilities[1], 60.0));
        // ratios 0.4 and 0.2 -> median 0.3, times median-imputed assets 200
        assert!(approx(liabilities[2], 0.3 * assets[2].unwrap()));
        assert!(approx(liabilities[2], 60.0));
    }

    #[test]
    fn income_uses_mean_ratio_and_breakdown_follows_income() {
        let raw = df!(
            ID => [1.0, 2.0, 3.0, 4.0],
            YEAR => [2015.0; 4],
            EMPLOYEES => [1.0; 4],
            TOTAL_ASSETS => [100.0; 4],
            TOTAL_LIABILITIES => [10.0; 4],
            // ratios 0.1, 0.2, 0.9 -> mean 0.4, median 0.2
            OPERATING_INCOME => [Some(10.0), Some(20.0), Some(90.0), None],
            OWNERS_EQUITY => [None::<f64>; 4],
            // ratios to income 0.5, 0.5, 0.1 -> median 0.5
            MAIN_INCOME => [Some(5.0), Some(10.0), Some(9.0), None]
        )
        .unwrap();

        let cleaned = ReportCleaner.clean(&raw).unwrap();
        assert!(approx(values(&cleaned, OPERATING_INCOME)[3], 40.0));
        // breakdown uses the already-imputed income
        assert!(approx(values(&cleaned, MAIN_INCOME)[3], 0.5 * 40.0));
        assert!(approx(values(&cleaned, MAIN_INCOME)[2], 9.0));
    }

    #[test]
    fn zero_driver_takes_fallback_ratio() {
        let mut frame = df!("a" => [5.0, 2.0, 3.0], "d" => [0.0, 4.0, 6.0]).unwrap();
        let substituted = impute_by_ratio(&mut frame, "a", "d", Fallback::Median).unwrap();
        assert_eq!(substituted, 1);
        assert_eq!(values(&frame, "a")[0], Some(0.0));
    }

    #[test]
    fn no_defined_ratio_leaves_column_untouched() {
        let mut frame = df!("a" => [None::<f64>, None], "d" => [1.0, 2.0]).unwrap();
        assert_eq!(impute_by_ratio(&mut frame, "a", "d", Fallback::Mean).unwrap(), 0);
        assert_eq!(values(&frame, "a"), vec![None, None]);
    }

    #[test]
    fn missing_owners_equity_column_fails() {
        let mut raw = raw_report();
        raw.drop_in_place(OWNERS_EQUITY).unwrap();
        assert!(clean_report(&raw).is_err());
    }
}
