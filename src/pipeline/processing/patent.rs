use polars::prelude::*;
use tracing::{info, instrument};

use crate::constants::{ID, PATENT_CATEGORICAL};
use crate::error::Result;
use crate::pipeline::processing::encode::{expand, Vocabulary};
use crate::pipeline::processing::Cleaner;
use crate::table;
use crate::types::TableKind;

/// Clean the patent/trademark/copyright table: `ID` followed by the
/// indicator groups of the three flags. Other raw columns are dropped.
#[instrument(skip_all, fields(table = "patent", rows = raw.height()))]
pub fn clean_patent(raw: &DataFrame, vocab: &Vocabulary) -> Result<DataFrame> {
    let name = TableKind::Patent.name();
    let mut columns: Vec<Column> = vec![table::column(raw, name, ID)?.clone()];
    for column in PATENT_CATEGORICAL {
        columns.extend(expand(raw, name, column, vocab)?.into_iter().map(Column::from));
    }
    let out = DataFrame::new(columns)?;
    info!("🔧 Cleaned patent: {} indicator columns", out.width() - 1);
    Ok(out)
}

pub struct PatentCleaner<'a> {
    pub vocab: &'a Vocabulary,
}

impl Cleaner for PatentCleaner<'_> {
    fn table(&self) -> TableKind {
        TableKind::Patent
    }

    fn clean(&self, raw: &DataFrame) -> Result<DataFrame> {
        clean_patent(raw, self.vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use crate::constants::{COPYRIGHT, PATENT, TRADEMARK};

    #[test]
    fn keeps_id_and_indicators_only() {
        let raw = df!(
            ID => [7.0, 8.0],
            "申请数" => [Some(3.0), None],
            PATENT => ["1", "0"],
            TRADEMARK => [Some("0"), None],
            COPYRIGHT => ["1", "1"]
        )
        .unwrap();
        let mut vocab = Vocabulary::new();
        vocab.fit_columns(&raw, "patent", &PATENT_CATEGORICAL).unwrap();

        let cleaned = PatentCleaner { vocab: &vocab }.clean(&raw).unwrap();
        assert_eq!(
            table::column_names(&cleaned),
            vec![ID, "专利_0", "专利_1", "商标_0", "著作权_1"]
        );
        let trademark: Vec<u8> = cleaned
            .column("商标_0")
            .unwrap()
            .u8()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(trademark, vec![1, 0]);
    }
}
