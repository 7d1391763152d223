//! Typed access to polars frames, with errors that name the table.

use polars::prelude::*;

use crate::error::{PrepError, Result};

const LEFT_ORDER: &str = "__left_order";
const RIGHT_ORDER: &str = "__right_order";

pub fn column<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PrepError::missing_column(table, name))
}

fn kind_error(table: &str, name: &str, found: &DataType, expected: &str) -> PrepError {
    PrepError::shape(
        table,
        format!("column '{}' is {}, expected {}", name, found, expected),
    )
}

pub fn numeric<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a Float64Chunked> {
    let column = column(df, table, name)?;
    column
        .f64()
        .map_err(|_| kind_error(table, name, column.dtype(), "f64"))
}

pub fn text<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a StringChunked> {
    let column = column(df, table, name)?;
    column
        .str()
        .map_err(|_| kind_error(table, name, column.dtype(), "str"))
}

/// Cells of a numeric column, nulls as `None`.
pub fn values(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(numeric(df, table, name)?.into_iter().collect())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect()
}

fn names_with_dtype(df: &DataFrame, dtype: &DataType, exclude: &[&str]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.dtype() == dtype)
        .map(|c| c.name().to_string())
        .filter(|n| !exclude.contains(&n.as_str()))
        .collect()
}

/// Names of `f64` columns not listed in `exclude`, in table order.
pub fn numeric_columns_except(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    names_with_dtype(df, &DataType::Float64, exclude)
}

/// Names of string columns not listed in `exclude`, in table order.
pub fn text_columns_except(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    names_with_dtype(df, &DataType::String, exclude)
}

/// Replace (or append) a column, keeping its position when it exists.
pub fn put(df: &mut DataFrame, series: Series) -> Result<()> {
    df.with_column(series)?;
    Ok(())
}

/// Inner join on equal key columns.
///
/// Output rows follow the left table's order, and for each left row the
/// matching right rows in right-table order. Output columns are the left
/// columns followed by the right columns minus the keys; any other name
/// present on both sides gets an `_x` / `_y` suffix. Null keys never match.
pub fn inner_join(left: &DataFrame, right: &DataFrame, on: &[&str]) -> Result<DataFrame> {
    for key in on {
        column(left, "left", key)?;
        column(right, "right", key)?;
    }

    let right_names = column_names(right);
    let mut left = left.clone();
    let mut right = right.clone();
    for name in column_names(&left) {
        if !on.contains(&name.as_str()) && right_names.contains(&name) {
            left.rename(&name, format!("{}_x", name).into())?;
            right.rename(&name, format!("{}_y", name).into())?;
        }
    }

    let left = left.with_row_index(LEFT_ORDER.into(), None)?;
    let right = right.with_row_index(RIGHT_ORDER.into(), None)?;
    let keys: Vec<Expr> = on.iter().map(|k| col(*k)).collect();

    let joined = left
        .lazy()
        .join(right.lazy(), keys.clone(), keys, JoinArgs::new(JoinType::Inner))
        .sort_by_exprs(
            [col(LEFT_ORDER), col(RIGHT_ORDER)],
            SortMultipleOptions::default(),
        )
        .collect()?;
    Ok(joined.drop(LEFT_ORDER)?.drop(RIGHT_ORDER)?)
}
