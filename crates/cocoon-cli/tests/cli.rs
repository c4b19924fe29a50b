//! End-to-end runs of the `cocoon` binary, installed under a temporary name.

#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use cocoon_test::CocoonFixture;

/// Copy the built wrapper into the fixture under the fixture's stem.
fn install(fixture: &CocoonFixture) -> PathBuf {
    let exe = fixture.exe();
    fs::copy(env!("CARGO_BIN_EXE_cocoon"), &exe).expect("copy wrapper binary");
    exe
}

fn run(exe: &PathBuf, args: &[&str]) -> Output {
    Command::new(exe).args(args).output().expect("run wrapper")
}

#[test]
fn cli_launches_default_script_without_config() {
    let fixture = CocoonFixture::new("MyApp");
    let exe = install(&fixture);
    fixture.write_script(".", "MyApp", "printf '%s' \"$COCOON_ARGUMENTS\" > ran.txt\n");

    let out = run(&exe, &["--mode", "fast"]);

    assert_eq!(out.status.code(), Some(0), "{out:?}");
    let ran = fs::read_to_string(fixture.path().join("ran.txt")).unwrap();
    assert!(ran.starts_with("--mode fast --cocoon-pid="), "arguments: {ran}");
}

#[test]
fn cli_child_failure_is_not_propagated() {
    let fixture = CocoonFixture::new("MyApp");
    let exe = install(&fixture);
    fixture.write_script(".", "MyApp", "exit 7\n");

    let out = run(&exe, &[]);
    assert_eq!(out.status.code(), Some(0), "{out:?}");
}

#[test]
fn cli_missing_startup_script_is_fatal() {
    let fixture = CocoonFixture::new("MyApp");
    let exe = install(&fixture);

    let out = run(&exe, &[]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("MyApp.sh"), "stderr: {stderr}");
}

#[test]
fn cli_morph_exit_codes() {
    let fixture = CocoonFixture::new("MyApp");
    let exe = install(&fixture);

    let out = run(&exe, &["metamorphose", "morph", "--larva-startup", "boot_app.sh"]);
    assert_eq!(out.status.code(), Some(0), "{out:?}");
    assert!(fixture.read_config().contains("boot_app.sh"));

    let out = run(&exe, &["metamorphose", "morph"]);
    assert_eq!(out.status.code(), Some(2), "{out:?}");

    let out = run(&exe, &["metamorphose", "morph", "--no-such-flag"]);
    assert_eq!(out.status.code(), Some(3), "{out:?}");
}

#[test]
#[cfg(target_pointer_width = "64")]
fn cli_morphed_config_drives_launch() {
    let fixture = CocoonFixture::new("MyApp");
    let exe = install(&fixture);
    fixture.create_dir("runtime/v1/x64");
    fixture.write_script("runtime/v1", "init", "echo init > order.txt\n");
    fixture.write_script("app", "start", "echo \"app $COCOON_RUNTIME\" >> order.txt\n");

    let out = run(
        &exe,
        &["metamorphose", "morph", "--larva-startup", "app/start.sh"],
    );
    assert_eq!(out.status.code(), Some(0), "{out:?}");

    let out = run(&exe, &[]);
    assert_eq!(out.status.code(), Some(0), "{out:?}");
    let order = fs::read_to_string(fixture.path().join("order.txt")).unwrap();
    let lines: Vec<&str> = order.lines().collect();
    assert_eq!(lines.len(), 2, "{order}");
    assert_eq!(lines[0], "init");
    assert!(lines[1].starts_with("app ") && lines[1].ends_with("runtime/v1/x64"), "{order}");
}
