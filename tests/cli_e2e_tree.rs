//! End-to-end tests for the `tree` command.

mod common;
use common::prelude::*;

const CONFIG: &str = r#"
osnames: { updates: ubuntu }
repositories:
  base: [ { type: flat, url: /srv/base } ]
  updates: [ { type: flat, url: /srv/updates }, { type: flat, url: /srv/security } ]
  extras: [ { type: flat, url: /srv/extras } ]
inheritance: { updates: base }
"#;

#[test]
fn test_tree_help() {
    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("tree")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Display the repository group inheritance tree",
        ));
}

#[test]
fn test_tree_shows_groups() {
    let fixture = MirrorFixture::new();
    let config = fixture.write_config(CONFIG);

    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("--color=always")
        .arg("tree")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("🌳 Repository groups in"))
        .stdout(predicate::str::contains("base (flat, 1 repositories)"))
        .stdout(predicate::str::contains(
            "updates (flat, 2 repositories) -> ubuntu",
        ))
        .stdout(predicate::str::contains("extras (flat, 1 repositories)"));
}

#[test]
fn test_tree_depth_zero_hides_derived_groups() {
    let fixture = MirrorFixture::new();
    let config = fixture.write_config(CONFIG);

    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("--color=never")
        .arg("tree")
        .arg("--config")
        .arg(&config)
        .arg("--depth")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("[TREE] Repository groups in"))
        .stdout(predicate::str::contains("base (flat"))
        .stdout(predicate::str::contains("updates").not());
}

#[test]
fn test_tree_cycle_is_an_error() {
    let fixture = MirrorFixture::new();
    let config = fixture.write_config(
        r#"
repositories:
  a: [ { type: flat, url: /a } ]
  b: [ { type: flat, url: /b } ]
inheritance: { a: b, b: a }
"#,
    );

    let mut cmd = cargo_bin_cmd!("package-mirror");
    cmd.arg("tree")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cycle detected"));
}
