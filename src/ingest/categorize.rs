// src/ingest/categorize.rs
//! Keyword categorizer. The table is evaluated top to bottom; the first
//! category with a matching keyword wins.

use crate::ingest::types::Category;

/// Returned when no keyword matches.
pub const DEFAULT_CATEGORY: Category = Category::Market;

/// Ordered `(category, keywords)` table. Keywords are lowercase.
pub const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Policy,
        &[
            "监管", "政策", "法案", "立法", "央行", "美联储", "证监会", "合规", "regulat",
            "lawmaker", "congress", "senate", "legislation", "cftc", "u.s. sec", "sec chair",
            "federal reserve", "sanction", "compliance",
        ],
    ),
    (
        Category::Exchange,
        &[
            "交易所", "币安", "上线", "下架", "binance", "coinbase", "okx", "bybit", "kraken",
            "bitget", "exchange", "listing", "delist",
        ],
    ),
    (
        Category::Defi,
        &[
            "defi", "去中心化金融", "流动性", "质押", "借贷", "uniswap", "aave", "lido", "curve",
            "liquidity", "staking", "lending", "tvl", "yield",
        ],
    ),
    (
        Category::Nft,
        &["nft", "数字藏品", "opensea", "ordinals", "铭文", "inscription", "collectible"],
    ),
    (
        Category::Market,
        &["行情", "价格", "上涨", "下跌", "大涨", "暴跌", "price", "rally", "surge", "plunge"],
    ),
];

/// `(title, summary)` → category; case-insensitive substring match.
pub fn categorize(title: &str, summary: &str) -> Category {
    let haystack = format!("{title} {summary}").to_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}
