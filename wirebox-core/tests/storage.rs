//! Storage: typed nodes, conflicts, array extension and snapshots.

use wirebox_core::{split_path, CoreError, ErrorKind, PathSegment, Storage};

#[test]
fn split_path_scenario() {
    assert_eq!(
        split_path("a[0].b").unwrap(),
        vec![
            PathSegment::Key("a".into()),
            PathSegment::Index("0".into()),
            PathSegment::Key("b".into()),
        ]
    );
    let err = split_path("a.[0]").unwrap_err();
    assert_eq!(err.to_string(), "invalid key 'a.[0]'");
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn value_over_map_is_rejected() {
    let mut s = Storage::new();
    s.set("m.x", "y").unwrap();
    let err = s.set("m", "w").unwrap_err();
    assert_eq!(err.to_string(), "property 'm' is a map but 'm' wants other type");
    assert_eq!(s.keys(), vec!["m.x".to_string()]);
    assert_eq!(s.get("m.x"), Some("y"));
}

#[test]
fn key_under_value_is_rejected() {
    let mut s = Storage::new();
    s.set("a", "1").unwrap();
    match s.set("a.b", "2").unwrap_err() {
        CoreError::TypeConflict { path, kind, key } => {
            assert_eq!(path, "a");
            assert_eq!(kind, "value");
            assert_eq!(key, "a.b");
        }
        other => panic!("expected TypeConflict, got {other:?}"),
    }
    assert_eq!(s.get("a"), Some("1"));
}

#[test]
fn index_under_map_is_rejected() {
    let mut s = Storage::new();
    s.set("a.b", "1").unwrap();
    let before = s.copy();
    assert!(s.set("a[0]", "x").is_err());
    assert_eq!(s, before);
}

#[test]
fn array_sub_keys() {
    let mut s = Storage::new();
    s.set("s[0]", "p").unwrap();
    s.set("s[1]", "o").unwrap();
    assert_eq!(s.sub_keys("s").unwrap(), vec!["0", "1"]);
    assert_eq!(s.keys(), vec!["s[0]", "s[1]"]);
}

#[test]
fn array_writes_past_end_leave_holes() {
    let mut s = Storage::new();
    s.set("s[0]", "a").unwrap();
    s.set("s[3]", "d").unwrap();
    assert!(s.has("s[3]"));
    assert!(!s.has("s[1]"));
    assert_eq!(s.sub_keys("s").unwrap(), vec!["0", "3"]);
    assert_eq!(s.keys(), vec!["s[0]", "s[3]"]);
}

#[test]
fn sub_keys_of_map_are_sorted_and_missing_is_empty() {
    let mut s = Storage::new();
    s.set("m.b", "2").unwrap();
    s.set("m.a", "1").unwrap();
    assert_eq!(s.sub_keys("m").unwrap(), vec!["a", "b"]);
    assert!(s.sub_keys("nope").unwrap().is_empty());
    assert_eq!(s.sub_keys("m.a").unwrap_err().kind(), ErrorKind::TypeConflict);
}

#[test]
fn keys_list_every_leaf_in_order() {
    let mut s = Storage::new();
    s.set("z", "1").unwrap();
    s.set("a.c[0].x", "2").unwrap();
    s.set("a.b", "3").unwrap();
    let keys = s.keys();
    assert_eq!(keys, vec!["a.b", "a.c[0].x", "z"]);
    for k in &keys {
        assert!(s.get(k).is_some(), "{k} must be readable");
    }
}

#[test]
fn copy_is_independent() {
    let mut s = Storage::new();
    s.set("a", "1").unwrap();
    let snapshot = s.copy();
    s.set("a", "2").unwrap();
    s.set("b", "3").unwrap();
    assert_eq!(snapshot.get("a"), Some("1"));
    assert!(!snapshot.has("b"));
}

#[test]
fn empty_and_malformed_keys() {
    let mut s = Storage::new();
    assert_eq!(s.set("", "x").unwrap_err().kind(), ErrorKind::Parse);
    assert_eq!(s.set("a..b", "x").unwrap_err().kind(), ErrorKind::Parse);
    assert_eq!(s.set("a[x]", "x").unwrap_err().kind(), ErrorKind::Parse);
    assert!(s.keys().is_empty());
}

#[test]
fn overwrite_value_and_root_index() {
    let mut s = Storage::new();
    s.set("a", "1").unwrap();
    s.set("a", "2").unwrap();
    assert_eq!(s.get("a"), Some("2"));

    let mut arr = Storage::new();
    arr.set("[0]", "x").unwrap();
    assert_eq!(arr.get("[0]"), Some("x"));
}

#[test]
fn conflict_at_the_root_names_the_root() {
    let mut arr = Storage::new();
    arr.set("[0]", "x").unwrap();
    let err = arr.set("a", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeConflict);
    assert_eq!(err.to_string(), "property '<root>' is a array but 'a' wants other type");

    let mut map = Storage::new();
    map.set("a", "1").unwrap();
    assert!(map.set("[0]", "x").unwrap_err().to_string().starts_with("property '<root>'"));
}
