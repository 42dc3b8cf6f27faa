use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use cli_helpers::{decimal_at, gainbook, run_json, write_file, DOCUMENTED_LEDGER};

#[test]
fn report_json_matches_documented_example() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(&home, "ledger.toml", DOCUMENTED_LEDGER)?;

    let report = run_json(&home, &["report", ledger.to_str().unwrap()])?;

    assert_eq!(report["warnings_count"], 0);
    assert_eq!(report["events"][0]["is_indexed"], true);
    assert_eq!(report["by_ticker"][0]["ticker"], "AAPL");
    assert_eq!(report["by_ticker"][0]["event_count"], 1);
    assert_eq!(
        decimal_at(&report, "/events/0/adjusted_cost_local")?.round_dp(2),
        dec!(522187.55)
    );
    assert_eq!(
        decimal_at(&report, "/summary/total_taxable_income")?.round_dp(2),
        dec!(123412.45)
    );
    assert_eq!(decimal_at(&report, "/summary/foreign_tax_credit")?, dec!(2880));
    assert_eq!(
        decimal_at(&report, "/summary/final_payable")?.round_dp(2),
        dec!(18302.49)
    );
    Ok(())
}

#[test]
fn report_table_without_color_when_requested() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(&home, "ledger.toml", DOCUMENTED_LEDGER)?;

    gainbook(&home)
        .arg("--no-color")
        .arg("report")
        .arg(&ledger)
        .assert()
        .success()
        .stdout(predicate::str::contains("Final payable"))
        .stdout(predicate::str::contains("18302.49"))
        .stdout(predicate::str::contains("522187.55"))
        .stdout(predicate::str::contains("\u{001b}[").not());
    Ok(())
}

#[test]
fn oversold_ledger_fails_with_shortfall() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.toml",
        &DOCUMENTED_LEDGER.replacen("quantity = \"100\"", "quantity = \"50\"", 1),
    )?;

    gainbook(&home)
        .arg("report")
        .arg(&ledger)
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient inventory for AAPL"))
        .stderr(predicate::str::contains("short by 50"))
        .stderr(predicate::str::contains("exceeds holdings").not());
    Ok(())
}

#[test]
fn invalid_record_names_the_field() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.toml",
        &DOCUMENTED_LEDGER.replace("withholding = \"90\"", "withholding = \"900\""),
    )?;

    gainbook(&home)
        .arg("report")
        .arg(&ledger)
        .assert()
        .failure()
        .stderr(predicate::str::contains("d1: withholding_foreign"));
    Ok(())
}

#[test]
fn missing_index_warns_but_succeeds() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.toml",
        &DOCUMENTED_LEDGER.replace("2024-03-15", "2022-06-10"),
    )?;

    gainbook(&home)
        .arg("--no-color")
        .arg("gains")
        .arg(&ledger)
        .assert()
        .success()
        .stderr(predicate::str::contains("without inflation indexation"))
        .stderr(predicate::str::contains("2022-05"))
        .stderr(predicate::str::contains("cost left unindexed").not())
        .stdout(predicate::str::contains("153900.00"));
    Ok(())
}

#[test]
fn positions_lists_remaining_lot() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.json",
        r#"{"transactions": [
            {"id": "b1", "ticker": "MSFT", "kind": "BUY", "date": "10/01/2024",
             "quantity": "10", "unit_price": "380", "conversion_rate": "30"},
            {"id": "s1", "ticker": "MSFT", "kind": "SELL", "date": "10/06/2024",
             "quantity": "4", "unit_price": "420", "conversion_rate": "32"}
        ]}"#,
    )?;

    let lots = run_json(&home, &["positions", ledger.to_str().unwrap()])?;
    let lots = lots.as_array().unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0]["source_id"], "b1");
    assert_eq!(decimal_at(&lots[0], "/remaining_quantity")?, dec!(6));
    Ok(())
}

#[test]
fn scenario_estimates_priced_lots_and_lists_unpriced() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.toml",
        r#"
[[transactions]]
id = "b1"
ticker = "AAPL"
kind = "BUY"
date = "2025-10-10"
quantity = 10
unit_price = "100"
conversion_rate = "30"

[[transactions]]
id = "b2"
ticker = "MSFT"
kind = "BUY"
date = "2025-10-10"
quantity = 1
unit_price = "400"
conversion_rate = "30"
"#,
    )?;

    let estimate = run_json(
        &home,
        &[
            "scenario",
            ledger.to_str().unwrap(),
            "--price",
            "AAPL=120",
            "--rate",
            "30",
            "--date",
            "2025-11-15",
        ],
    )?;

    assert_eq!(estimate["unpriced_tickers"][0], "MSFT");
    assert_eq!(decimal_at(&estimate, "/total_market_value")?, dec!(36000));
    assert_eq!(decimal_at(&estimate, "/total_unrealized_profit")?, dec!(6000));
    assert_eq!(decimal_at(&estimate, "/estimated_tax")?, dec!(900));
    Ok(())
}

#[test]
fn scenario_requires_price_and_rate() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(&home, "ledger.toml", DOCUMENTED_LEDGER)?;

    gainbook(&home)
        .arg("scenario")
        .arg(&ledger)
        .arg("--price")
        .arg("AAPL")
        .arg("--rate")
        .arg("30")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TICKER=PRICE"));
    Ok(())
}

#[test]
fn opportunities_find_lot_near_threshold() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(
        &home,
        "ledger.toml",
        r#"
[[transactions]]
id = "near"
ticker = "AAPL"
kind = "BUY"
date = "2025-09-10"
quantity = "10"
unit_price = "100"
conversion_rate = "30"
"#,
    )?;

    let result = run_json(&home, &["opportunities", ledger.to_str().unwrap()])?;
    assert_eq!(result["near_indexation"][0]["source_id"], "near");
    assert_eq!(decimal_at(&result, "/headroom/current_rate")?, dec!(0.15));
    assert_eq!(decimal_at(&result, "/headroom/distance_to_next")?, dec!(70000));
    Ok(())
}

#[test]
fn params_file_overrides_builtin_brackets() -> Result<()> {
    let home = TempDir::new()?;
    let ledger = write_file(&home, "ledger.toml", DOCUMENTED_LEDGER)?;
    let params = write_file(
        &home,
        "flat.toml",
        r#"
tax_year = 2025
dividend_exemption_limit = 100000

[[brackets]]
rate = 0.10
"#,
    )?;

    // no price index: the sale stays unindexed, dividends are exempt
    let report = run_json(
        &home,
        &["--params", params.to_str().unwrap(), "report", ledger.to_str().unwrap()],
    )?;
    assert_eq!(report["warnings_count"], 1);
    assert_eq!(decimal_at(&report, "/summary/computed_tax")?, dec!(15390));

    // same file through the environment
    let output = gainbook(&home)
        .env("GAINBOOK_PARAMS", &params)
        .args(["--json", "report"])
        .arg(&ledger)
        .output()?;
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(decimal_at(&report, "/summary/final_payable")?, dec!(15390));
    Ok(())
}

#[test]
fn missing_ledger_fails() -> Result<()> {
    let home = TempDir::new()?;
    gainbook(&home)
        .arg("report")
        .arg(home.path().join("nope.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read ledger"));
    Ok(())
}
