//! Bundle injection against a real registry directory.

use std::fs;

use cocoon_config::{Settings, keys};
use cocoon_metamorphosis::{
    InjectRequest, MetamorphosisError, MorphOverrides, inject, morph, try_inject,
};
use cocoon_test::{CocoonFixture, write_tar_gz, write_zip};

const DESCRIPTOR: &str = "\"dir.64bit\" = \"amd64\"\n\"dir.32bit\" = \"x86\"\ninitscript = \"setup.sh\"\n";

fn registry_with_v1() -> (CocoonFixture, Settings) {
    let fixture = CocoonFixture::new("MyApp");
    fixture.write_file("runtime/v1/64bit/bin/java", "old");
    let mut settings = Settings::new();
    settings.set(keys::CHRYSALIS, keys::DIR_VERSION, "v1");
    settings.set(keys::CHRYSALIS, keys::DIR_64BIT, "64bit");
    (fixture, settings)
}

#[test]
fn test_inject_with_drop_others_replaces_version() {
    let (fixture, mut settings) = registry_with_v1();
    let bundle = fixture.path().join("bundle.zip");
    write_zip(
        &bundle,
        &[
            ("amd64/", ""),
            ("amd64/bin/java", "new"),
            ("setup.sh", "true\n"),
            ("chrysalis.toml", DESCRIPTOR),
        ],
    );

    let request = InjectRequest::new("v2", &bundle).with_drop_flag(Some("yes"));
    assert!(inject(&request, &mut settings, &fixture.paths()));

    assert_eq!(fixture.subdirs("runtime"), vec!["v2"]);
    assert_eq!(
        fs::read_to_string(fixture.path().join("runtime/v2/amd64/bin/java")).unwrap(),
        "new"
    );
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(), Some("v2"));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_64BIT).as_deref(), Some("amd64"));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_32BIT).as_deref(), Some("x86"));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::INIT_SCRIPT).as_deref(), Some("setup.sh"));
}

#[test]
fn test_inject_without_descriptor_keeps_arch_dirs() {
    let (fixture, mut settings) = registry_with_v1();
    let bundle = fixture.path().join("bundle.zip");
    write_zip(&bundle, &[("64bit/bin/java", "new")]);

    let outcome = try_inject(&InjectRequest::new("v2", &bundle), &mut settings, &fixture.paths())
        .unwrap();

    assert!(outcome.pruned.is_none());
    assert_eq!(outcome.version_dir, fixture.path().join("runtime").join("v2"));
    assert_eq!(fixture.subdirs("runtime"), vec!["v1", "v2"]);
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(), Some("v2"));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_64BIT).as_deref(), Some("64bit"));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::INIT_SCRIPT), None);
}

#[test]
fn test_inject_into_existing_target_changes_nothing() {
    let (fixture, mut settings) = registry_with_v1();
    let bundle = fixture.path().join("bundle.zip");
    write_zip(&bundle, &[("64bit/bin/java", "new")]);
    let before = settings.clone();

    let result = try_inject(
        &InjectRequest::new("v1", &bundle).with_drop_others(true),
        &mut settings,
        &fixture.paths(),
    );

    assert!(matches!(result, Err(MetamorphosisError::TargetExists { .. })));
    assert_eq!(settings, before);
    assert_eq!(
        fs::read_to_string(fixture.path().join("runtime/v1/64bit/bin/java")).unwrap(),
        "old"
    );
    assert_eq!(fixture.subdirs("runtime"), vec!["v1"]);
}

#[test]
fn test_inject_missing_archive_or_registry_fails() {
    let (fixture, mut settings) = registry_with_v1();
    let request = InjectRequest::new("v2", fixture.path().join("absent.zip"));
    assert!(matches!(
        try_inject(&request, &mut settings, &fixture.paths()),
        Err(MetamorphosisError::ArchiveNotFound { .. })
    ));

    let bundle = fixture.path().join("bundle.zip");
    write_zip(&bundle, &[("x", "y")]);
    settings.set(keys::CHRYSALIS, keys::DIR_BASE, "nowhere");
    assert!(!inject(
        &InjectRequest::new("v2", &bundle),
        &mut settings,
        &fixture.paths()
    ));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(), Some("v1"));
}

#[test]
fn test_failed_extraction_leaves_no_partial_version() {
    let (fixture, mut settings) = registry_with_v1();
    let bundle = fixture.path().join("bundle.zip");
    write_zip(&bundle, &[("ok.txt", "fine"), ("../escape.txt", "bad")]);

    assert!(!inject(
        &InjectRequest::new("v2", &bundle),
        &mut settings,
        &fixture.paths()
    ));

    // Neither the version nor a leftover staging directory remains.
    assert_eq!(fixture.subdirs("runtime"), vec!["v1"]);
    assert!(!fixture.path().join("escape.txt").exists());
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_VERSION).as_deref(), Some("v1"));
}

#[test]
fn test_inject_tar_gz_bundle() {
    let (fixture, mut settings) = registry_with_v1();
    let bundle = fixture.path().join("bundle.tar.gz");
    write_tar_gz(
        &bundle,
        &[("amd64/bin/java", "new"), ("chrysalis.toml", DESCRIPTOR)],
    );

    let outcome = try_inject(&InjectRequest::new("v3", &bundle), &mut settings, &fixture.paths())
        .unwrap();

    assert_eq!(outcome.entries, 2);
    assert!(fixture.path().join("runtime/v3/amd64/bin/java").is_file());
    assert_eq!(settings.get(keys::CHRYSALIS, keys::DIR_64BIT).as_deref(), Some("amd64"));
}

#[test]
fn test_morph_then_inject_share_version_logic() {
    let (fixture, mut settings) = registry_with_v1();
    fixture.write_file("runtime/v1/chrysalis.toml", "initscript = \"v1.sh\"\n");

    let overrides = MorphOverrides {
        chrysalis_dir: Some("v1".to_owned()),
        cocoon_usepipe: Some("yes".to_owned()),
        ..MorphOverrides::default()
    };
    assert!(morph(&overrides, &mut settings, &fixture.paths()));
    assert_eq!(settings.get(keys::CHRYSALIS, keys::INIT_SCRIPT).as_deref(), Some("v1.sh"));
    assert_eq!(settings.get(keys::COCOON, keys::USE_PIPE).as_deref(), Some("yes"));
}
