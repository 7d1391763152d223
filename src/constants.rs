//! Column names of the source CSVs. The dataset ships with Chinese headers,
//! so these constants are the single place that spells them.

pub const ID: &str = "ID";
pub const YEAR: &str = "year";
pub const FLAG: &str = "flag";

// base
pub const REGISTRATION_TIME: &str = "注册时间";
pub const REGISTERED_CAPITAL: &str = "注册资本";
pub const CONTROLLER_SHARE: &str = "控制人持股比例";
pub const INDUSTRY: &str = "行业";
pub const REGION: &str = "区域";
pub const ENTERPRISE_TYPE: &str = "企业类型";
pub const CONTROLLER_TYPE: &str = "控制人类型";

pub const BASE_NUMERIC: [&str; 3] = [REGISTRATION_TIME, REGISTERED_CAPITAL, CONTROLLER_SHARE];
pub const BASE_CATEGORICAL: [&str; 4] = [INDUSTRY, REGION, ENTERPRISE_TYPE, CONTROLLER_TYPE];

// patent
pub const PATENT: &str = "专利";
pub const TRADEMARK: &str = "商标";
pub const COPYRIGHT: &str = "著作权";

pub const PATENT_CATEGORICAL: [&str; 3] = [PATENT, TRADEMARK, COPYRIGHT];

// money
pub const QUOTA_SUFFIX: &str = "额度";
pub const COST_SUFFIX: &str = "成本";

/// Financing categories and the fixed cost/quota rate of each.
pub const MONEY_CATEGORIES: [(&str, f64); 4] = [
    ("债权融资", 0.08),
    ("股权融资", 0.04),
    ("内部融资和贸易融资", 0.06),
    ("项目融资和政策融资", 0.06),
];

// report
pub const EMPLOYEES: &str = "从业人数";
pub const TOTAL_ASSETS: &str = "资产总额";
pub const TOTAL_LIABILITIES: &str = "负债总额";
pub const OPERATING_INCOME: &str = "营业总收入";
pub const OWNERS_EQUITY: &str = "所有者权益合计";

/// Report columns with their own imputation rule; every other numeric
/// column is an income breakdown.
pub const REPORT_DRIVERS: [&str; 6] = [
    ID,
    YEAR,
    EMPLOYEES,
    TOTAL_ASSETS,
    TOTAL_LIABILITIES,
    OPERATING_INCOME,
];

/// Cell texts read as missing values.
pub const NULL_TOKENS: [&str; 11] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A",
];

pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

pub fn quota_column(category: &str) -> String {
    format!("{}{}", category, QUOTA_SUFFIX)
}

pub fn cost_column(category: &str) -> String {
    format!("{}{}", category, COST_SUFFIX)
}
