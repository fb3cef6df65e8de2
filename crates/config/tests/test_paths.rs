//! Tests for path utilities

use webpilot_config::paths::{config_path, data_dir, profile_dir};

#[test]
fn test_data_dir_is_webpilot() {
    let dir = data_dir();
    assert!(dir.ends_with(".webpilot"));
}

#[test]
fn test_config_path_inside_data_dir() {
    let path = config_path();
    assert_eq!(path.parent(), Some(data_dir().as_path()));
    assert_eq!(path.file_name().unwrap(), "config.json");
}

#[test]
fn test_profile_dir_inside_data_dir() {
    let path = profile_dir();
    assert!(path.starts_with(data_dir()));
    assert!(path.ends_with("profile"));
}
