use fincraft_tools::{Arguments, Tool, ToolRegistry, ToolResult, Toolbox};
use serde_json::{json, Value};
use tempfile::TempDir;

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("aapl_balance_sheet.json"),
        r#"{"ticker":"AAPL","totalAssets":352583000000,"ratios":{"current":0.988,"quick":0.843},"notes":null,"years":[2023,2022]}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("prices.csv"),
        "date,close\n2024-01-02,185.64\n2024-01-03,184.25\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("summary.md"), "# Summary\n").unwrap();
    dir
}

fn file_args(name: &str) -> Arguments {
    let mut args = Arguments::new();
    args.insert("file_name".into(), json!(name));
    args
}

#[test]
fn list_files_is_idempotent() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path()));

    let first = registry.invoke(&Tool::ListFiles, &Arguments::new());
    let second = registry.invoke(&Tool::ListFiles, &Arguments::new());

    assert_eq!(first, second);
    assert_eq!(
        first,
        ToolResult::Ok(json!(["aapl_balance_sheet.json", "prices.csv", "summary.md"]))
    );
}

#[test]
fn structured_json_survives_the_message_round_trip() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path()));

    let result = registry.invoke(&Tool::ReadStructuredFile, &file_args("aapl_balance_sheet.json"));
    let message = result.to_message();

    let parsed: Value = serde_json::from_str(&message).unwrap();
    let original: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("aapl_balance_sheet.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(parsed["result"]["data"], original);
    assert_eq!(parsed["result"]["type"], "json");
}

#[test]
fn missing_file_error_names_the_data_dir() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path()));

    let result = registry.invoke(&Tool::ReadStructuredFile, &file_args("missing.json"));
    let value = result.to_value();

    assert!(result.is_error());
    assert_eq!(
        value["error"],
        format!("file 'missing.json' not found in {}.", dir.path().display())
    );
    assert_eq!(value["tool"], "read_structured_file");
}

#[test]
fn csv_rows_are_string_valued() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path()));

    let result = registry.invoke(&Tool::ReadStructuredFile, &file_args("prices.csv"));
    let ToolResult::Ok(value) = result else {
        panic!("expected rows");
    };
    assert_eq!(
        value["data"],
        json!([
            {"date": "2024-01-02", "close": "185.64"},
            {"date": "2024-01-03", "close": "184.25"}
        ])
    );
}

#[test]
fn text_file_through_registry() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path()));

    let result = registry.invoke(&Tool::ReadTextFile, &file_args("summary.md"));
    assert_eq!(result.to_value(), json!({"result": "# Summary\n"}));
}

#[test]
fn traversal_is_rejected() {
    let dir = data_dir();
    let registry = ToolRegistry::new(Toolbox::new(dir.path().join("..")));

    let result = registry.invoke(&Tool::ReadTextFile, &file_args("../etc/passwd"));
    assert_eq!(result.to_value()["kind"], "InvalidArgument");
}
