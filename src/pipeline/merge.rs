use polars::prelude::*;
use tracing::{info, instrument};

use crate::constants::{FLAG, ID, YEAR};
use crate::error::Result;
use crate::table::{self, inner_join};
use crate::types::TableKind;

/// Corp: cleaned base joined with cleaned patent on `ID`.
#[instrument(skip_all)]
pub fn build_corp(base: &DataFrame, patent: &DataFrame) -> Result<DataFrame> {
    let corp = inner_join(base, patent, &[ID])?;
    info!(
        "🔗 Corp: {} of {} base rows matched a patent row",
        corp.height(),
        base.height()
    );
    Ok(corp)
}

/// Finance: financing lines joined with annual reports on `ID` and `year`,
/// then labelled with Corp's `flag` on `ID`.
#[instrument(skip_all)]
pub fn build_finance(money: &DataFrame, report: &DataFrame, corp: &DataFrame) -> Result<DataFrame> {
    let lines = inner_join(money, report, &[ID, YEAR])?;
    let labels = DataFrame::new(vec![
        table::column(corp, TableKind::Corp.name(), ID)?.clone(),
        table::column(corp, TableKind::Corp.name(), FLAG)?.clone(),
    ])?;
    let finance = inner_join(&lines, &labels, &[ID])?;
    info!(
        "🔗 Finance: {} financing-year rows ({} before labelling)",
        finance.height(),
        lines.height()
    );
    Ok(finance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn corp_excludes_ids_missing_from_patent() {
        let base = df!(ID => [1.0, 2.0, 3.0], FLAG => [0.0, 1.0, 0.0]).unwrap();
        let patent = df!(ID => [3.0, 1.0], "专利_1" => [1u8, 0]).unwrap();

        let corp = build_corp(&base, &patent).unwrap();
        assert_eq!(table::values(&corp, "corp", ID).unwrap(), vec![Some(1.0), Some(3.0)]);
        assert_eq!(table::column_names(&corp), vec![ID, FLAG, "专利_1"]);
    }

    #[test]
    fn finance_matches_id_year_pairs_and_attaches_label() {
        let money = df!(
            ID => [1.0, 1.0, 2.0, 9.0],
            YEAR => [2015.0, 2016.0, 2015.0, 2015.0],
            "债权融资额度" => [1.0, 2.0, 3.0, 4.0]
        )
        .unwrap();
        let report = df!(
            ID => [1.0, 2.0, 2.0, 9.0],
            YEAR => [2016.0, 2015.0, 2016.0, 2015.0],
            "资产总额" => [10.0, 20.0, 30.0, 40.0]
        )
        .unwrap();
        let corp = df!(ID => [1.0, 2.0], FLAG => [1.0, 0.0]).unwrap();

        let finance = build_finance(&money, &report, &corp).unwrap();
        assert_eq!(
            table::column_names(&finance),
            vec![ID, YEAR, "债权融资额度", "资产总额", FLAG]
        );
        let values = |name| table::values(&finance, "finance", name).unwrap();
        assert_eq!(values(ID), vec![Some(1.0), Some(2.0)]);
        assert_eq!(values(YEAR), vec![Some(2016.0), Some(2015.0)]);
        assert_eq!(values(FLAG), vec![Some(1.0), Some(0.0)]);
    }
}
