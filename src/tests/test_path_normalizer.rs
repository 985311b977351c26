// src/tests/test_path_normalizer.rs

use crate::path_normalizer::{normalize_path, CanonicalPath, PathNormalizer};

fn keys(paths: impl Iterator<Item = CanonicalPath>) -> Vec<String> {
    paths.map(|p| p.as_str().to_string()).collect()
}

#[test]
fn test_backslashes_and_forward_slashes_are_equivalent() {
    assert_eq!(normalize_path("C:\\Users\\bob"), normalize_path("c:/Users/bob"));
    assert_eq!(normalize_path("C:\\Users\\bob").as_str(), "c:/users/bob");
}

#[test]
fn test_blank_input_is_root() {
    assert_eq!(normalize_path("").as_str(), "/");
    assert_eq!(normalize_path("   ").as_str(), "/");
    assert_eq!(normalize_path("\t\n").as_str(), "/");
}

#[test]
fn test_drive_prefix_gets_slash() {
    assert_eq!(normalize_path("C:").as_str(), "c:/");
    assert_eq!(normalize_path("C:\\").as_str(), "c:/");
    assert_eq!(normalize_path("d:Data").as_str(), "d:/data");
    assert_eq!(normalize_path("E:/").as_str(), "e:/");
}

#[test]
fn test_relative_paths_gain_leading_slash() {
    assert_eq!(normalize_path("shared/finance").as_str(), "/shared/finance");
    assert_eq!(normalize_path("report.xlsx").as_str(), "/report.xlsx");
}

#[test]
fn test_trailing_and_repeated_separators_removed() {
    assert_eq!(normalize_path("/shared/").as_str(), "/shared");
    assert_eq!(normalize_path("//shared///finance//").as_str(), "/shared/finance");
    assert_eq!(normalize_path("C:\\\\Data\\\\").as_str(), "c:/data");
    assert_eq!(normalize_path("/").as_str(), "/");
}

#[test]
fn test_dot_segments_resolved_lexically() {
    assert_eq!(normalize_path("/shared/./finance").as_str(), "/shared/finance");
    assert_eq!(normalize_path("/shared/finance/../hr").as_str(), "/shared/hr");
    assert_eq!(normalize_path("/../../etc").as_str(), "/etc");
    assert_eq!(normalize_path("C:\\..\\Windows").as_str(), "c:/windows");
}

#[test]
fn test_case_folding_is_default() {
    let normalizer = PathNormalizer::default();
    assert!(!normalizer.is_case_sensitive());
    assert_eq!(normalizer.normalize("/Shared/Finance").as_str(), "/shared/finance");
}

#[test]
fn test_case_sensitive_mode_keeps_case_but_folds_drive() {
    let normalizer = PathNormalizer::new(true);
    assert_eq!(normalizer.normalize("/Shared/Finance").as_str(), "/Shared/Finance");
    assert_eq!(normalizer.normalize("C:\\Users\\Bob").as_str(), "c:/Users/Bob");
    assert_ne!(normalizer.normalize("/Shared"), normalizer.normalize("/shared"));
}

#[test]
fn test_inner_whitespace_is_part_of_the_name() {
    let normalizer = PathNormalizer::new(true);
    assert_eq!(normalizer.normalize("/srv/ secret/x").as_str(), "/srv/ secret/x");
    assert_ne!(normalizer.normalize("/srv/ secret/x"), normalizer.normalize("/srv/secret/x"));
    assert_ne!(normalize_path("/srv/secret /x"), normalize_path("/srv/secret/x"));

    // Surrounding whitespace still goes
    assert_eq!(normalize_path("  /srv/secret \t").as_str(), "/srv/secret");
}

#[test]
fn test_dot_segments_never_leave_trailing_whitespace() {
    assert_eq!(normalize_path("/a/b /c/..").as_str(), "/a/b");
    assert_eq!(normalize_path("/a/b /.").as_str(), "/a/b");
    assert_eq!(normalize_path("/a/.. /x/..").as_str(), "/");
}

#[test]
fn test_normalize_is_idempotent_on_samples() {
    let samples = [
        "",
        "/",
        "C:",
        "c:\\Users\\Bob\\",
        " /a /b ",
        "/a/b /c/..",
        "/a/.. /x/..",
        "/srv/ secret/x",
        "relative\\path",
        "/x:/odd",
        "//server\\share\\dir",
        "/a/../../b/./c",
    ];
    for normalizer in [PathNormalizer::new(false), PathNormalizer::new(true)] {
        for raw in samples {
            let once = normalizer.normalize(raw);
            let twice = normalizer.normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }
}

#[test]
fn test_parent_and_root() {
    let path = normalize_path("c:/data/reports");
    assert_eq!(path.parent().unwrap().as_str(), "c:/data");
    assert_eq!(normalize_path("c:/data").parent().unwrap().as_str(), "c:/");
    assert_eq!(normalize_path("/shared").parent().unwrap().as_str(), "/");
    assert!(normalize_path("/").parent().is_none());
    assert!(normalize_path("c:").parent().is_none());
    assert!(normalize_path("c:/").is_root());
    assert!(!path.is_root());
}

#[test]
fn test_ancestors_walk_to_root() {
    assert_eq!(
        keys(normalize_path("C:\\Data\\Reports\\q1.csv").ancestors()),
        vec!["c:/data/reports/q1.csv", "c:/data/reports", "c:/data", "c:/"]
    );
    assert_eq!(
        keys(normalize_path("/shared/finance").ancestors()),
        vec!["/shared/finance", "/shared", "/"]
    );
    assert_eq!(keys(normalize_path("/").ancestors()), vec!["/"]);
}

#[test]
fn test_depth() {
    assert_eq!(normalize_path("/").depth(), 0);
    assert_eq!(normalize_path("c:/").depth(), 0);
    assert_eq!(normalize_path("/shared").depth(), 1);
    assert_eq!(normalize_path("c:/a/b/c").depth(), 3);
}

#[test]
fn test_serializes_as_plain_string() {
    let json = serde_json::to_string(&normalize_path("C:\\Data")).unwrap();
    assert_eq!(json, "\"c:/data\"");
}
