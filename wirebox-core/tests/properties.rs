//! Placeholder resolution and typed binding.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use wirebox_core::{BindParam, Bindable, CoreError, ErrorKind, Properties, Result};

fn props(pairs: &[(&str, &str)]) -> Properties {
    Properties::from_pairs(pairs.iter().copied()).unwrap()
}

#[test]
fn present_key_ignores_default() {
    let p = props(&[("host", "example.org")]);
    assert_eq!(p.resolve("${host:=localhost}").unwrap(), "example.org");
}

#[test]
fn missing_key_uses_default() {
    let p = Properties::new();
    assert_eq!(p.resolve("${host:=localhost}").unwrap(), "localhost");
    assert_eq!(p.resolve("${host:=}").unwrap(), "");
}

#[test]
fn missing_key_without_default_fails() {
    let err = Properties::new().resolve("${host}").unwrap_err();
    match err {
        CoreError::PropertyNotExist(key) => assert_eq!(key, "host"),
        other => panic!("expected PropertyNotExist, got {other:?}"),
    }
}

#[test]
fn nested_references_and_defaults() {
    let p = props(&[("a", "${b}"), ("b", "${c:=deep}"), ("port", "8080")]);
    assert_eq!(p.resolve("${a}").unwrap(), "deep");
    assert_eq!(p.resolve("x-${nope:=${port}}-y").unwrap(), "x-8080-y");
}

#[test]
fn circular_references_are_detected() {
    let p = props(&[("a", "${b}"), ("b", "${a}")]);
    match p.resolve("${a}").unwrap_err() {
        CoreError::CircularReference(chain) => assert_eq!(chain, "a -> b -> a"),
        other => panic!("expected CircularReference, got {other:?}"),
    }
}

#[test]
fn unterminated_placeholder_is_a_parse_error() {
    let err = Properties::new().resolve("${a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.to_string(), "resolve string \"${a\" error: invalid syntax");
}

#[test]
fn binds_scalars() {
    let p = props(&[("port", "8080"), ("debug", "true"), ("ratio", "0.5"), ("timeout", "1m 30s")]);
    assert_eq!(p.bind::<u16>("${port}").unwrap(), 8080);
    assert!(p.bind::<bool>("${debug}").unwrap());
    assert_eq!(p.bind::<f64>("${ratio}").unwrap(), 0.5);
    assert_eq!(p.bind::<Duration>("${timeout}").unwrap(), Duration::from_secs(90));
    assert_eq!(p.bind::<i32>("${missing:=-3}").unwrap(), -3);
}

#[test]
fn bad_scalar_reports_target() {
    let p = props(&[("port", "http")]);
    match p.bind::<u16>("${port}").unwrap_err() {
        CoreError::Bind { target, .. } => assert_eq!(target, "port"),
        other => panic!("expected Bind, got {other:?}"),
    }
}

#[test]
fn option_is_none_when_missing() {
    let p = props(&[("port", "1")]);
    assert_eq!(p.bind::<Option<u16>>("${port}").unwrap(), Some(1));
    assert_eq!(p.bind::<Option<u16>>("${other}").unwrap(), None);
    assert_eq!(p.bind::<Option<u16>>("${other:=2}").unwrap(), Some(2));
}

#[test]
fn vec_from_array_node() {
    let p = props(&[("hosts[0]", "a"), ("hosts[1]", "b"), ("hosts[2]", "${extra:=c}")]);
    assert_eq!(p.bind::<Vec<String>>("${hosts}").unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn vec_from_comma_list_and_default() {
    let p = props(&[("ports", "1, 2,3")]);
    assert_eq!(p.bind::<Vec<u16>>("${ports}").unwrap(), vec![1, 2, 3]);
    assert_eq!(p.bind::<Vec<u16>>("${none:=4,5}").unwrap(), vec![4, 5]);
    assert!(p.bind::<Vec<u16>>("${none:=}").unwrap().is_empty());
}

#[test]
fn maps_enumerate_sub_keys() {
    let p = props(&[("labels.b", "2"), ("labels.a", "1")]);
    let sorted = p.bind::<BTreeMap<String, u8>>("${labels}").unwrap();
    let expected: Vec<(String, u8)> = vec![("a".into(), 1), ("b".into(), 2)];
    assert_eq!(sorted.into_iter().collect::<Vec<_>>(), expected);
    let hashed = p.bind::<HashMap<String, String>>("${labels}").unwrap();
    assert_eq!(hashed.get("b").map(String::as_str), Some("2"));
    assert!(p.bind::<HashMap<String, String>>("${nothing:=}").unwrap().is_empty());
}

#[test]
fn map_node_is_not_a_string() {
    let p = props(&[("db.host", "x")]);
    assert_eq!(p.bind::<String>("${db}").unwrap_err().kind(), ErrorKind::Unresolved);
}

#[test]
fn validator_rejects_with_source_in_message() {
    let p = props(&[("port", "80")]);
    let param = BindParam::from_tag("${port}").unwrap().with_validate(Some("$ > 1024"));
    let err = p.bind_param::<u16>(&param).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "validate failed on \"$ > 1024\" for value 80");

    let ok = BindParam::from_tag("${port}").unwrap().with_validate(Some("$ >= 80 && $ < 90"));
    assert_eq!(p.bind_param::<u16>(&ok).unwrap(), 80);
}

#[derive(Debug, PartialEq)]
struct Server {
    host: String,
    port: u16,
    tags: Vec<String>,
}

impl Bindable for Server {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        Ok(Server {
            host: props.bind_field(param, "host", "${host:=localhost}", None)?,
            port: props.bind_field(param, "port", "${port}", Some("$ > 0"))?,
            tags: props.bind_field(param, "tags", "${tags:=}", None)?,
        })
    }
}

#[test]
fn struct_fields_are_relative_to_parent() {
    let p = props(&[("server.port", "9000"), ("server.tags[0]", "blue")]);
    let server: Server = p.bind("${server}").unwrap();
    assert_eq!(
        server,
        Server {
            host: "localhost".into(),
            port: 9000,
            tags: vec!["blue".into()],
        }
    );
}

#[test]
fn struct_list_binds_each_element() {
    let p = props(&[("servers[0].port", "1"), ("servers[1].port", "2"), ("servers[1].host", "h")]);
    let servers: Vec<Server> = p.bind("${servers}").unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[1].host, "h");
    assert_eq!(servers[0].port, 1);
}

#[test]
fn struct_field_error_names_the_field() {
    let p = props(&[("server.port", "0")]);
    let err = p.bind::<Server>("${server}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn bind_expr_accepts_templates() {
    let p = props(&[("host", "h")]);
    assert_eq!(p.bind_expr::<String>("http://${host}:${port:=80}").unwrap(), "http://h:80");
    assert_eq!(p.bind_expr::<String>("$host").unwrap(), "h");
    assert_eq!(p.bind_expr::<u16>("${port:=81}").unwrap(), 81);
}

#[test]
fn expressions_over_keys() {
    let p = props(&[("mode", "prod"), ("workers", "4")]);
    assert!(p.eval(r#"mode == "prod" && workers > 2"#).unwrap());
    assert!(!p.eval("len(mode) > 4").unwrap());
    assert_eq!(p.eval("mode ==").unwrap_err().kind(), ErrorKind::Parse);
    assert_eq!(p.eval("missing > 1").unwrap_err().kind(), ErrorKind::Unresolved);
    assert!(p.eval("workers / 2 == 2 && workers != 3").unwrap());
}
