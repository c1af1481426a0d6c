//! Environment overrides for Settings.
//!
//! Kept in its own test binary: environment variables are process-wide and
//! would leak into the file-based config tests.

use std::fs;

use tempfile::TempDir;

use mindtab::config::Settings;
use mindtab::domain::{ExtractMode, RootTagPolicy};

#[test]
fn given_mindtab_env_vars_when_loading_then_override_all_file_layers() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("local.toml");
    fs::write(
        &local,
        r#"
node_columns = 3
extract_mode = "every-node"
unclassified_label = "misc"

[attributes]
default_owner = "team-a"
"#,
    )
    .unwrap();

    std::env::set_var("MINDTAB_NODE_COLUMNS", "8");
    std::env::set_var("MINDTAB_EXTRACT_MODE", "leaves");
    std::env::set_var("MINDTAB_ROOT_TAG_POLICY", "retain");
    std::env::set_var("MINDTAB_PATH_SEPARATORS", "|,::");
    std::env::set_var("MINDTAB_ATTRIBUTES__DEFAULT_OWNER", "team-b");

    // Act
    let result = Settings::load_from(None, Some(&local));

    // Invalid enum values are reported, not ignored
    std::env::set_var("MINDTAB_EXTRACT_MODE", "sideways");
    let invalid = Settings::load_from(None, Some(&local));

    for key in [
        "MINDTAB_NODE_COLUMNS",
        "MINDTAB_EXTRACT_MODE",
        "MINDTAB_ROOT_TAG_POLICY",
        "MINDTAB_PATH_SEPARATORS",
        "MINDTAB_ATTRIBUTES__DEFAULT_OWNER",
    ] {
        std::env::remove_var(key);
    }

    // Assert
    let settings = result.expect("load settings");
    assert_eq!(settings.node_columns, 8);
    assert_eq!(settings.extract_mode, ExtractMode::Leaves);
    assert_eq!(settings.root_tag_policy, RootTagPolicy::Retain);
    assert_eq!(settings.path_separators, vec!["|", "::"]);
    assert_eq!(settings.attributes.default_owner, "team-b");
    // not overridden: file value survives
    assert_eq!(settings.unclassified_label, "misc");

    assert!(invalid.is_err());
}
