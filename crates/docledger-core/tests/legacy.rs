//! Legacy operation names keep their original argument shapes.

use docledger_core::{
    config::Config,
    dispatch::{Dispatcher, Operation},
    error::ErrorClass,
    ledger::memory::MemoryLedger,
    model::Preset,
};
use serde_json::Value as Json;

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

fn rows(bytes: &[u8]) -> Vec<Json> {
    serde_json::from_slice::<Json>(bytes)
        .expect("rows should be JSON")
        .as_array()
        .expect("rows should be an array")
        .clone()
}

#[test]
fn every_preset_alias_resolves() {
    for preset in Preset::ALL {
        let d = Dispatcher::from_config(&Config::for_preset(preset))
            .expect("preset config should build");

        for (name, alias) in preset.legacy_aliases() {
            assert_eq!(
                d.resolve(name),
                Operation::from_name(&alias.op),
                "{preset}: {name}"
            );
        }
    }
}

#[test]
fn marble_chaincode_flow() {
    let d = Dispatcher::from_config(&Config::for_preset(Preset::Marble))
        .expect("preset config should build");
    let mut ledger = MemoryLedger::with_rich_queries();

    for row in [
        ["marble1", "blue", "35", "tom"],
        ["marble2", "red", "50", "tom"],
        ["marble3", "blue", "70", "jerry"],
    ] {
        d.invoke(&mut ledger, "initMarble", &args(&row))
            .expect("initMarble should succeed");
    }

    let by_range = d
        .invoke(&mut ledger, "getMarblesByRange", &args(&["marble1", "marble3"]))
        .expect("range should succeed");
    assert_eq!(rows(&by_range).len(), 2);

    let by_owner = d
        .invoke(&mut ledger, "queryMarblesByOwner", &args(&["tom"]))
        .expect("owner query should succeed");
    assert_eq!(rows(&by_owner).len(), 2);

    let moved = d
        .invoke(&mut ledger, "transferMarblesBasedOnColor", &args(&["blue", "jerry"]))
        .expect("transfer should succeed");
    assert_eq!(String::from_utf8(moved).unwrap(), r#"{"updated":2}"#);

    let by_owner = d
        .invoke(&mut ledger, "queryMarblesByOwner", &args(&["jerry"]))
        .expect("owner query should succeed");
    let names: Vec<_> = rows(&by_owner)
        .iter()
        .map(|row| row["Key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["marble1", "marble3"]);

    let history = d
        .invoke(&mut ledger, "getHistoryForMarble", &args(&["marble1"]))
        .expect("history should succeed");
    assert_eq!(rows(&history).len(), 2);
}

#[test]
fn student_chaincode_flow() {
    let d = Dispatcher::from_config(&Config::for_preset(Preset::Student))
        .expect("preset config should build");
    let mut ledger = MemoryLedger::new();
    let student = |total: &str| {
        args(&[
            "51114214", "女", "京籍", "首都师范大学附属密云中学", "28101", total, "106.5", "100",
            "97", "233",
        ])
    };

    d.invoke(&mut ledger, "initStudent", &student("536.5"))
        .expect("initStudent should succeed");

    let err = d
        .invoke(&mut ledger, "updateStudent", &student("600"))
        .expect_err("mismatched total should fail");
    assert_eq!(err.class, ErrorClass::ValidationError);

    let stored = d
        .invoke(&mut ledger, "readStudent", &args(&["51114214"]))
        .expect("readStudent should succeed");
    let record: Json = serde_json::from_slice(&stored).expect("record should be JSON");
    assert_eq!(record["collegeEntranceExaminationScore"], 536.5);
    assert_eq!(record["schoolCode"], 28101);

    let err = d
        .invoke(&mut ledger, "initStudent", &student("abc"))
        .expect_err("non-numeric score should fail");
    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn configured_alias_binds_arguments() {
    let config = Config::from_toml_str(
        r#"
        [record]
        preset = "marble"

        [ledger]
        rich_queries = true

        [dispatch]
        legacy_aliases = false
        aliases = { redMarbles = { op = "prefix-query", bind = ["color~name", "red"] } }
        "#,
    )
    .expect("config should parse");
    let d = Dispatcher::from_config(&config).expect("dispatcher should build");
    let mut ledger = MemoryLedger::with_rich_queries();

    d.invoke(&mut ledger, "create", &args(&["m1", "red", "1", "tom"]))
        .expect("create should succeed");
    d.invoke(&mut ledger, "create", &args(&["m2", "blue", "1", "tom"]))
        .expect("create should succeed");

    let red = d
        .invoke(&mut ledger, "redMarbles", &[])
        .expect("alias should succeed");
    assert_eq!(rows(&red).len(), 1);
    assert!(d.resolve("initMarble").is_none());
}
