// Pipeline processing: per-table cleaning and indicator expansion

pub mod base;
pub mod encode;
pub mod money;
pub mod patent;
pub mod report;

use polars::prelude::DataFrame;

use crate::error::Result;
use crate::types::TableKind;

pub use base::{clean_base, BaseCleaner};
pub use encode::Vocabulary;
pub use money::{clean_money, MoneyCleaner};
pub use patent::{clean_patent, PatentCleaner};
pub use report::{clean_report, ReportCleaner};

/// A cleaning step turning one raw source table into its cleaned form.
pub trait Cleaner {
    /// The source table this cleaner accepts
    fn table(&self) -> TableKind;

    fn clean(&self, raw: &DataFrame) -> Result<DataFrame>;
}
