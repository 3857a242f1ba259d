use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_titvo"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "titvo init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".titvo.toml");
    assert!(config_path.exists(), ".titvo.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[bitbucket]"));
    assert!(content.contains("[mirror]"));
    assert!(content.contains("[report]"));

    let config: titvo_core::TitvoConfig = toml::from_str(&content).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".titvo.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_titvo"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".titvo.toml")).unwrap();
    assert_eq!(content, "# existing");
}
