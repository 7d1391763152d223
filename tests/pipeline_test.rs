use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use risk_prep::config::{Config, DatasetFiles};
use polars::prelude::DataFrame;
use risk_prep::pipeline::{Pipeline, VocabularySource};
use risk_prep::storage::{InMemoryStore, SqliteStore, Store};
use risk_prep::table::{self, column_names};
use risk_prep::types::Mode;

const BASE_HEADER: &str = "ID,注册时间,注册资本,行业,区域,企业类型,控制人类型,控制人持股比例,flag";
const MONEY_HEADER: &str = "ID,year,债权融资额度,债权融资成本,股权融资额度,股权融资成本,\
内部融资和贸易融资额度,内部融资和贸易融资成本,项目融资和政策融资额度,项目融资和政策融资成本";
const REPORT_HEADER: &str = "ID,year,从业人数,资产总额,负债总额,营业总收入,所有者权益合计,主营业务收入";

fn write(dir: &Path, name: &str, lines: &[&str]) -> Result<()> {
    fs::write(dir.join(name), lines.join("\n") + "\n")?;
    Ok(())
}

/// Train and validate CSVs in a temp dir, plus a config pointing at them.
fn fixture() -> Result<(TempDir, Config)> {
    let dir = tempdir()?;
    let data = dir.path();

    // ID 2 has no registered capital and no patent row
    write(
        data,
        "base_train.csv",
        &[
            BASE_HEADER,
            "1,2010,100,零售业,湖北,有限责任公司,自然人,0.6,0",
            "2,2012,,工业,湖南,股份有限公司,企业法人,0.8,1",
            "3,2014,300,零售业,湖北,有限责任公司,自然人,0.5,0",
        ],
    )?;
    write(data, "patent_train.csv", &["ID,专利,商标,著作权", "1,1,0,1", "3,0,1,0"])?;
    write(
        data,
        "money_train.csv",
        &[
            MONEY_HEADER,
            "1,2015,100,,,,,,,",
            "1,,,4,,,,,,",
            "2,2015,,,,,,,,",
            "3,2016,10,0.8,,,,,,",
        ],
    )?;
    write(
        data,
        "report_train.csv",
        &[
            REPORT_HEADER,
            "1,2015,10,100,40,50,60,25",
            "2,2015,30,300,60,300,240,60",
            "3,2016,,,,,,",
        ],
    )?;

    write(
        data,
        "base_verify.csv",
        &[BASE_HEADER, "4,2011,50,建筑业,湖北,有限责任公司,自然人,0.4,1", "5,2013,70,工业,,股份有限公司,企业法人,,0"],
    )?;
    write(data, "patent_verify.csv", &["ID,专利,商标,著作权", "4,1,1,1", "5,0,0,0"])?;
    write(data, "money_verify.csv", &[MONEY_HEADER, "4,2017,,2,,,,,,", "5,2017,20,,,,,,,"])?;
    write(
        data,
        "report_verify.csv",
        &[REPORT_HEADER, "4,2017,5,50,10,20,40,10", "5,2017,8,80,20,40,60,"],
    )?;

    let mut config = Config::default();
    config.dataset.dir = data.to_path_buf();
    config.dataset.store = data.join("out").join("preprocessed-data.sqlite");
    config.dataset.log_dir = data.join("logs");
    let files = |mode: &str| DatasetFiles {
        base: format!("base_{}.csv", mode),
        money: format!("money_{}.csv", mode),
        patent: format!("patent_{}.csv", mode),
        report: format!("report_{}.csv", mode),
    };
    config.files = BTreeMap::from([
        ("train".to_string(), files("train")),
        ("validate".to_string(), files("verify")),
    ]);
    config.validate()?;
    Ok((dir, config))
}

fn approx(a: Option<f64>, b: f64) -> bool {
    a.map_or(false, |a| (a - b).abs() < 1e-9)
}

fn values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(table::values(frame, "test", name)?)
}

fn indicator_group(frame: &DataFrame, prefix: &str) -> Result<Vec<Vec<u8>>> {
    let mut group = Vec::new();
    for column in frame.get_columns() {
        if column.name().starts_with(prefix) {
            group.push(column.u8()?.into_no_null_iter().collect());
        }
    }
    Ok(group)
}

#[test]
fn train_run_writes_all_keys() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    let result = Pipeline::run(&config, Mode::Train, &mut store)?;

    assert_eq!(result.vocabulary, VocabularySource::Fitted);
    assert_eq!(result.inputs.len(), 4);
    assert!(result.inputs.iter().all(|i| i.sha256.len() == 64));

    let expected = [
        "base_train",
        "corp_train",
        "finance_train",
        "money_train",
        "patent_train",
        "report_train",
    ];
    assert_eq!(store.keys()?, expected);

    let manifest = store.manifest()?;
    assert_eq!(manifest.len(), 6);
    assert!(manifest.iter().all(|m| m.run_id == result.run_id && m.mode == "train"));
    Ok(())
}

#[test]
fn base_capital_is_mean_imputed_and_groups_are_one_hot() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    Pipeline::run(&config, Mode::Train, &mut store)?;

    let base = store.read_frame("base_train")?;
    assert_eq!(
        values(&base, "注册资本")?,
        vec![Some(100.0), Some(200.0), Some(300.0)]
    );
    for name in ["注册时间", "注册资本", "控制人持股比例"] {
        assert!(values(&base, name)?.iter().all(Option::is_some), "{} has gaps", name);
    }

    let industry = indicator_group(&base, "行业_")?;
    assert_eq!(industry.len(), 2);
    for row in 0..base.height() {
        assert_eq!(industry.iter().map(|c| c[row]).sum::<u8>(), 1);
    }
    assert_eq!(column_names(&base).last().map(String::as_str), Some("flag"));
    Ok(())
}

#[test]
fn corp_and_finance_keep_only_matching_keys() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    Pipeline::run(&config, Mode::Train, &mut store)?;

    let corp = store.read_frame("corp_train")?;
    assert_eq!(values(&corp, "ID")?, vec![Some(1.0), Some(3.0)]);

    // money (1,2015) twice after year fill, (2,2015) dropped by corp, (3,2016)
    let finance = store.read_frame("finance_train")?;
    assert_eq!(values(&finance, "ID")?, vec![Some(1.0), Some(1.0), Some(3.0)]);
    assert_eq!(
        values(&finance, "year")?,
        vec![Some(2015.0), Some(2015.0), Some(2016.0)]
    );
    assert_eq!(values(&finance, "flag")?, vec![Some(0.0), Some(0.0), Some(0.0)]);
    Ok(())
}

#[test]
fn money_rates_zero_fill_and_year_fill() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    Pipeline::run(&config, Mode::Train, &mut store)?;

    let money = store.read_frame("money_train")?;
    let quota = values(&money, "债权融资额度")?;
    let cost = values(&money, "债权融资成本")?;
    assert!(approx(cost[0], 8.0));
    assert!(approx(quota[1], 50.0));
    assert_eq!((quota[2], cost[2]), (Some(0.0), Some(0.0)));
    assert!(values(&money, "股权融资额度")?.iter().all(|v| *v == Some(0.0)));
    assert_eq!(values(&money, "year")?[1], Some(2015.0));
    Ok(())
}

#[test]
fn report_ratios_follow_imputed_drivers() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    Pipeline::run(&config, Mode::Train, &mut store)?;

    let report = store.read_frame("report_train")?;
    assert!(!column_names(&report).contains(&"所有者权益合计".to_string()));

    let assets = values(&report, "资产总额")?;
    let liabilities = values(&report, "负债总额")?;
    let income = values(&report, "营业总收入")?;
    assert_eq!(values(&report, "从业人数")?[2], Some(20.0));
    assert_eq!(assets[2], Some(200.0));
    // liabilities ratios 0.4, 0.2 -> median 0.3
    assert!(approx(liabilities[0], 40.0));
    assert!(approx(liabilities[2], 0.3 * 200.0));
    // income ratios 0.5, 1.0 -> mean 0.75
    assert!(approx(income[2], 150.0));
    // breakdown ratios 0.5, 0.2 -> median 0.35 of imputed income
    assert!(approx(values(&report, "主营业务收入")?[2], 0.35 * 150.0));
    Ok(())
}

#[test]
fn validate_reuses_training_vocabulary() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = SqliteStore::open(&config.dataset.store)?;
    Pipeline::run(&config, Mode::Train, &mut store)?;
    let result = Pipeline::run(&config, Mode::Validate, &mut store)?;
    assert_eq!(result.vocabulary, VocabularySource::Stored);

    let train = store.read_frame("base_train")?;
    let validate = store.read_frame("base_validate")?;
    assert_eq!(column_names(&train), column_names(&validate));

    // 建筑业 was never seen in training
    let industry = indicator_group(&validate, "行业_")?;
    assert_eq!(industry.iter().map(|c| c[0]).sum::<u8>(), 0);
    assert_eq!(industry.iter().map(|c| c[1]).sum::<u8>(), 1);
    // missing region
    assert_eq!(indicator_group(&validate, "区域_")?.iter().map(|c| c[1]).sum::<u8>(), 0);

    assert_eq!(store.keys()?.len(), 12);
    Ok(())
}

#[test]
fn validate_without_stored_vocabulary_refits_from_train_files() -> Result<()> {
    let (_dir, config) = fixture()?;
    let mut store = InMemoryStore::new();
    let result = Pipeline::run(&config, Mode::Validate, &mut store)?;
    assert_eq!(result.vocabulary, VocabularySource::Refitted);

    let base = store.read_frame("base_validate")?;
    let names: Vec<String> = column_names(&base)
        .into_iter()
        .filter(|n| n.starts_with("行业_"))
        .collect();
    assert_eq!(names, vec!["行业_工业", "行业_零售业"]);
    assert!(store.load_vocabulary()?.is_some());
    Ok(())
}

#[test]
fn missing_source_file_aborts_before_writing() -> Result<()> {
    let (dir, config) = fixture()?;
    fs::remove_file(dir.path().join("report_train.csv"))?;
    let mut store = InMemoryStore::new();
    assert!(Pipeline::run(&config, Mode::Train, &mut store).is_err());
    assert!(store.keys()?.is_empty());
    Ok(())
}
