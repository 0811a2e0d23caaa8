use chrono::TimeZone;
use strum::IntoEnumIterator;

use super::*;

fn equity(name: &str) -> Symbol {
    Symbol::new(name, "usa", SecurityType::Equity)
}

#[test]
fn symbol_defaults() {
    let symbol = Symbol::default();

    assert!(symbol.active());
    assert_eq!(symbol.name(), "symbol");
    assert_eq!(symbol.market(), "");
    assert_eq!(symbol.security(), SecurityType::Base);
    assert_eq!(symbol.id(), None);
}

#[test]
fn symbol_display_is_security_market_name() {
    let symbol = Symbol::new("AAPL", "usa", SecurityType::Equity);
    assert_eq!(symbol.to_string(), "Equity usa AAPL");
}

#[test]
fn symbol_key_ignores_case() {
    let a = Symbol::new("AAPL", "USA", SecurityType::Equity);
    let b = Symbol::new("aapl", "usa", SecurityType::Equity);
    let c = Symbol::new("aapl", "usa", SecurityType::Option);

    assert_eq!(a.key(), b.key());
    assert_ne!(a.key(), c.key());
}

#[test]
fn symbols_sort_by_name_then_market_then_security() {
    let mut symbols = vec![
        Symbol::new("msft", "usa", SecurityType::Equity),
        Symbol::new("AAPL", "usa", SecurityType::Option),
        Symbol::new("aapl", "usa", SecurityType::Equity),
        Symbol::new("aapl", "FXCM", SecurityType::Forex),
    ];

    symbols.sort_by(Symbol::cmp_by_key);

    let labels: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        labels,
        vec![
            "Forex FXCM aapl",
            "Equity usa aapl",
            "Option usa AAPL",
            "Equity usa msft",
        ]
    );
}

#[test]
fn security_type_order_follows_declaration() {
    let all: Vec<SecurityType> = SecurityType::iter().collect();
    let mut sorted = all.clone();
    sorted.sort();

    assert_eq!(all, sorted);
    assert_eq!("Crypto".parse::<SecurityType>(), Ok(SecurityType::Crypto));
}

#[test]
fn resolution_display_and_parse() {
    assert_eq!(Resolution::default(), Resolution::Daily);
    assert_eq!(Resolution::Minute.to_string(), "minute");
    assert_eq!("hour".parse::<Resolution>(), Ok(Resolution::Hour));
    assert_eq!(Resolution::iter().count(), 5);
}

#[test]
fn new_market_is_inactive_and_empty() {
    let market = MarketState::new("US Equities", "quantconnect");

    assert!(!market.active());
    assert_eq!(market.name(), "US Equities");
    assert_eq!(market.provider(), "quantconnect");
    assert_eq!(market.resolution(), Resolution::Daily);
    assert!(market.symbols().is_empty());
    assert!(market.folders().is_empty());
    assert_eq!(market.last_date(), None);
}

#[test]
fn add_symbol_rejects_duplicates() {
    let mut market = MarketState::new("m", "p");

    market.add_symbol(equity("AAPL")).expect("first insert");
    let err = market
        .add_symbol(equity("aapl"))
        .expect_err("duplicate must fail");

    assert_eq!(err, MarketStateError::DuplicateSymbol(equity("aapl").key()));
    assert_eq!(market.symbols().len(), 1);
}

#[test]
fn upsert_symbol_replaces_in_place() {
    let mut market = MarketState::new("m", "p")
        .with_symbol(equity("aapl"))
        .and_then(|m| m.with_symbol(equity("msft")))
        .expect("valid market");

    let replaced = market.upsert_symbol(equity("AAPL").with_active(false));

    assert_eq!(replaced, Some(equity("aapl")));
    assert_eq!(market.symbols()[0].name(), "AAPL");
    assert!(!market.symbols()[0].active());
    assert_eq!(market.symbols()[1].name(), "msft");

    assert_eq!(market.upsert_symbol(equity("ibm")), None);
    assert_eq!(market.symbols().len(), 3);
    assert_eq!(market.active_symbol_count(), 2);
}

#[test]
fn remove_symbol_reports_missing() {
    let mut market = MarketState::new("m", "p")
        .with_symbol(equity("aapl"))
        .expect("valid market");

    let removed = market
        .remove_symbol(&SymbolKey::new("AAPL", "USA", SecurityType::Equity))
        .expect("symbol exists");
    assert_eq!(removed.name(), "aapl");

    let key = SymbolKey::new("aapl", "usa", SecurityType::Equity);
    assert_eq!(
        market.remove_symbol(&key),
        Err(MarketStateError::SymbolNotFound(key))
    );
}

#[test]
fn folders_nest_and_count_symbols() {
    let tech = Folder::new("tech")
        .with_symbol(equity("aapl"))
        .and_then(|f| f.with_symbol(equity("msft")))
        .expect("valid folder");

    let favorites = Folder::new("favorites")
        .with_symbol(equity("ibm"))
        .and_then(|f| f.with_folder(tech))
        .expect("valid folder");

    assert_eq!(favorites.symbol_count(), 3);

    let mut market = MarketState::new("m", "p")
        .with_folder(favorites)
        .expect("valid market");

    assert_eq!(
        market.add_folder(Folder::new("favorites")),
        Err(MarketStateError::DuplicateFolder("favorites".to_string()))
    );

    let folder = market.folder_mut("favorites").expect("folder exists");
    folder
        .remove_folder("tech")
        .expect("sub-folder exists");
    assert_eq!(
        market.folder("favorites").map(Folder::symbol_count),
        Some(1)
    );

    market.remove_folder("favorites").expect("folder exists");
    assert!(market.folders().is_empty());
}

#[test]
fn validate_detects_duplicates_in_deserialized_state() {
    let market = MarketState::new("m", "p")
        .with_symbol(equity("aapl"))
        .expect("valid market");
    assert_eq!(market.validate(), Ok(()));

    let mut json = serde_json::to_value(&market).expect("serializable");
    let symbols = json["symbols"].as_array_mut().expect("symbols array");
    let mut duplicate = symbols[0].clone();
    duplicate["name"] = serde_json::Value::from("AAPL");
    symbols.push(duplicate);

    let tampered: MarketState = serde_json::from_value(json).expect("deserializable");
    assert_eq!(
        tampered.validate(),
        Err(MarketStateError::DuplicateSymbol(equity("aapl").key()))
    );
}

#[test]
fn check_identity_rejects_renamed_market() {
    let market = MarketState::new("m", "p");

    let mut same = market.clone();
    same.set_resolution(Resolution::Minute);
    same.add_symbol(equity("aapl")).expect("insert");
    assert_eq!(market.check_identity(&same), Ok(()));

    let other = MarketState::new("m", "p");
    assert!(matches!(
        market.check_identity(&other),
        Err(MarketStateError::IdentityChanged { field: "id", .. })
    ));
}

#[test]
fn summary_describes_inventory() {
    let from = Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap();
    let mut market = MarketState::new("US Equities", "quantconnect")
        .with_from_date(from)
        .with_symbol(equity("aapl"))
        .and_then(|m| m.with_symbol(equity("msft").with_active(false)))
        .expect("valid market");

    assert_eq!(
        market.summary(),
        "quantconnect US Equities: 2 symbols (1 active), 0 folders, daily from 2019-05-01 to -"
    );

    market.set_last_date(Some(Utc.with_ymd_and_hms(2019, 6, 3, 0, 0, 0).unwrap()));
    assert!(market.summary().ends_with("to 2019-06-03"));
}
