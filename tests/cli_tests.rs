mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use common::fixture_path;

fn spinner() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("lambda-spinner").unwrap();
    for var in [
        "LAMBDA_SPINNER_DISABLE_EAGER_INIT",
        "LAMBDA_SPINNER_STABLE_NAMES",
        "LAMBDA_SPINNER_DUMP_DIR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_check_valid_request() {
    spinner()
        .arg("check")
        .arg(fixture_path("int_function.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "java/util/function/IntFunction.apply is a valid creation call",
        ));
}

#[test]
fn test_check_reports_contract_violation() {
    let output = spinner()
        .arg("check")
        .arg(fixture_path("bad_arity.json"))
        .arg("--json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("incorrect number of parameters"))
        .get_output()
        .clone();
    let json = json_stdout(&output);
    assert_eq!(json["valid"], false);
    assert_eq!(json["interface_method"], "java/util/function/IntFunction.apply");
}

#[test]
fn test_missing_request_file() {
    spinner()
        .arg("check")
        .arg(fixture_path("does_not_exist.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read request file"));
}

#[test]
fn test_name_simple_and_stable() {
    let output = spinner()
        .arg("name")
        .arg(fixture_path("int_function.json"))
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();
    let simple = json_stdout(&output);
    assert_eq!(simple["name"], "com/acme/Main$$Lambda");
    assert_eq!(simple["stable"], false);
    let fingerprint = simple["fingerprint"].as_str().unwrap().to_string();
    assert!(!fingerprint.starts_with('0') || fingerprint == "0");

    let output = spinner()
        .arg("name")
        .arg(fixture_path("int_function.json"))
        .arg("--stable-names")
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();
    let stable = json_stdout(&output);
    let name = stable["name"].as_str().unwrap();
    let suffix = name.strip_prefix("com/acme/Main$$Lambda").unwrap();
    assert!(!suffix.is_empty());
    assert_eq!(suffix, fingerprint);
}

#[test]
fn test_stable_names_from_environment() {
    spinner()
        .env("LAMBDA_SPINNER_STABLE_NAMES", "true")
        .arg("name")
        .arg(fixture_path("int_function.json"))
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^com/acme/Main\$\$Lambda[0-9a-f]+\n").unwrap());
}

#[test]
fn test_spin_writes_class_file_and_inspect_reads_it() {
    let temp_dir = TempDir::new().unwrap();

    let output = spinner()
        .arg("spin")
        .arg(fixture_path("capturing_supplier.json"))
        .arg("--out")
        .arg(temp_dir.path())
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();
    let summary = json_stdout(&output);
    assert_eq!(summary["name"], "com/acme/Main$$Lambda");
    assert_eq!(summary["dispatch"], "static");
    assert_eq!(summary["indirect"], false);
    assert_eq!(summary["interfaces"][0], "java/util/function/IntSupplier");

    let class_file = temp_dir.path().join("com/acme/Main$$Lambda.class");
    assert!(class_file.exists());
    let bytes = std::fs::read(&class_file).unwrap();
    assert_eq!(summary["size"], bytes.len());
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

    let output = spinner()
        .arg("inspect")
        .arg(&class_file)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();
    let listing = json_stdout(&output);
    assert_eq!(listing["name"], "com/acme/Main$$Lambda");
    assert_eq!(listing["super"], "java/lang/Object");
    let methods: Vec<&str> = listing["methods"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert!(methods.contains(&"<init>"));
    assert!(methods.contains(&"getAsInt"));
    let fields = listing["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["descriptor"], "I");
    assert_eq!(fields[0]["static"], false);

    spinner()
        .arg("inspect")
        .arg(&class_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("getfield com/acme/Main$$Lambda.arg$1:I"))
        .stdout(predicate::str::contains(
            "invokestatic com/acme/Main.lambda$main$0:(I)I",
        ));
}

#[test]
fn test_spin_honors_dump_dir_from_environment() {
    let dump_dir = TempDir::new().unwrap();
    spinner()
        .env("LAMBDA_SPINNER_DUMP_DIR", dump_dir.path())
        .arg("spin")
        .arg(fixture_path("capturing_supplier.json"))
        .assert()
        .success();

    let dumped = dump_dir.path().join("com/acme/Main$$Lambda.0.class");
    assert!(dumped.exists());
    let bytes = std::fs::read(&dumped).unwrap();
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
}

#[test]
fn test_spin_lazy_singleton_field() {
    let temp_dir = TempDir::new().unwrap();
    spinner()
        .arg("spin")
        .arg(fixture_path("int_function.json"))
        .arg("--disable-eager-init")
        .arg("--out")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("method: <clinit>()V"));

    spinner()
        .arg("inspect")
        .arg(temp_dir.path().join("com/acme/Main$$Lambda.class"))
        .assert()
        .success()
        .stdout(predicate::str::contains("LAMBDA_INSTANCE$"));
}

#[test]
fn test_spin_cross_package_protected_is_indirect() {
    let output = spinner()
        .arg("spin")
        .arg(fixture_path("protected_cross_package.json"))
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();
    let summary = json_stdout(&output);
    assert_eq!(summary["name"], "com/other/Child$$Lambda");
    assert_eq!(summary["dispatch"], "virtual");
    assert_eq!(summary["indirect"], true);
    assert!(summary.get("path").is_none());
}

#[test]
fn test_inspect_rejects_non_class_file() {
    spinner()
        .arg("inspect")
        .arg(fixture_path("int_function.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to decode"));
}
