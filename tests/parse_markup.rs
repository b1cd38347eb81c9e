// tests/parse_markup.rs
use chrono::NaiveDate;
use fx_rate_watcher::error::ParseError;
use fx_rate_watcher::ingest::parse::{parse_markup, parse_snapshot_file};

const FIXTURE: &str = include_str!("fixtures/icbc_quotation.html");

#[test]
fn fixture_yields_every_currency_row() {
    let table = parse_markup(FIXTURE).expect("parse fixture");
    assert_eq!(table.len(), 5);
    assert_eq!(
        table.codes().collect::<Vec<_>>(),
        vec!["GBP", "HKD", "USD", "EUR", "PKR"]
    );
    assert_eq!(
        table.published_at(),
        NaiveDate::from_ymd_opt(2023, 4, 1)
            .unwrap()
            .and_hms_opt(4, 14, 5)
            .unwrap()
    );
}

#[test]
fn columns_follow_the_header_positions() {
    let table = parse_markup(FIXTURE).unwrap();
    let eur = table.get("EUR").expect("EUR row");
    assert_eq!(eur.name, "欧元");
    assert_eq!(eur.exchange_buy, Some(745.80));
    assert_eq!(eur.cash_buy, Some(722.58));
    assert_eq!(eur.exchange_sell, Some(751.23));
    assert_eq!(eur.cash_sell, Some(751.23));
}

#[test]
fn missing_quotes_stay_null() {
    let table = parse_markup(FIXTURE).unwrap();
    let pkr = table.get("PKR").unwrap();
    assert_eq!(pkr.exchange_buy, Some(2.413));
    assert_eq!(pkr.cash_buy, None);
    assert_eq!(pkr.cash_sell, None);
}

#[test]
fn markup_without_signature_table_is_rejected() {
    let html = "<table><tr><td>Currency</td><td>Buy</td></tr><tr><td>EUR</td><td>1</td></tr></table>";
    assert!(matches!(parse_markup(html), Err(ParseError::TableNotFound)));
    assert!(matches!(parse_markup(""), Err(ParseError::TableNotFound)));
}

#[test]
fn header_without_rows_is_empty() {
    let html = "<table><tr><td>币种</td><td>现汇买入价</td><td>现钞买入价</td>\
                <td>现汇卖出价</td><td>现钞卖出价</td><td>发布时间</td></tr></table>";
    assert!(matches!(parse_markup(html), Err(ParseError::Empty)));
}

#[test]
fn short_row_fails_the_whole_table() {
    let html = FIXTURE.replace("<td>87.74</td>\n            <td>87.74</td>", "<td>87.74</td>");
    assert!(matches!(
        parse_markup(&html),
        Err(ParseError::CellCount { row: 2, expected: 6, found: 5 })
    ));
}

#[test]
fn bad_timestamp_fails_the_whole_table() {
    let html = FIXTURE.replacen("2023年04月01日 04:14:05", "last tuesday", 1);
    assert!(matches!(parse_markup(&html), Err(ParseError::Timestamp(_))));
}

#[test]
fn missing_snapshot_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let res = parse_snapshot_file(&dir.path().join("2023_04_01-04_14_05.csv"));
    assert!(matches!(res, Err(ParseError::Snapshot { .. })));
}
