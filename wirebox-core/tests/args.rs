//! Argument placement and call-time resolution.

use std::sync::Arc;

use wirebox_core::{
    Arg, Bean, BoxError, Callable, Condition, Container, ErrorKind, Lazy, Prop, Runtime, Variadic,
};

fn runtime(pairs: &[(&str, &str)]) -> Runtime {
    let mut c = Container::new();
    for (k, v) in pairs {
        c.set_property(k, v).unwrap();
    }
    c.object(Greeter("hi")).name("greeter");
    c.refresh().unwrap()
}

#[derive(Debug)]
struct Greeter(&'static str);
impl Bean for Greeter {}

type Eight = (i32, i32, i32, i32, i32, i32, i32, Option<i32>);

#[allow(clippy::too_many_arguments)]
fn eight(a: i32, b: i32, c: i32, d: i32, e: i32, f: i32, g: i32, h: Option<i32>) -> Result<Eight, BoxError> {
    Ok((a, b, c, d, e, f, g, h))
}

#[test]
fn indexed_values_and_nil() {
    let rt = runtime(&[]);
    let mut args: Vec<Arg> = (0..7).map(|i| Arg::index(i as usize, Arg::value(i))).collect();
    args.push(Arg::index(7, Arg::Nil));
    let out = rt.context().invoke(eight, args).unwrap();
    assert_eq!(out, (0, 1, 2, 3, 4, 5, 6, None));
}

#[test]
fn positional_args_keep_their_order() {
    let rt = runtime(&[]);
    let args: Vec<Arg> = (10..17).map(Arg::value).chain([Arg::value(Some(17))]).collect();
    let out = rt.context().invoke(eight, args).unwrap();
    assert_eq!(out, (10, 11, 12, 13, 14, 15, 16, Some(17)));
}

#[test]
fn placement_errors() {
    let callable = Callable::new(eight);
    let mixed = callable.bind(vec![Arg::index(0, Arg::value(1)), Arg::value(2)]);
    assert_eq!(mixed.unwrap_err().kind(), ErrorKind::Usage);

    let out_of_range = callable.bind(vec![Arg::index(8, Arg::value(1))]);
    assert!(out_of_range.unwrap_err().to_string().contains("out of range"));

    let duplicate = callable.bind(vec![Arg::index(1, Arg::value(1)), Arg::index(1, Arg::value(2))]);
    assert!(duplicate.unwrap_err().to_string().contains("already set"));

    let too_many = Callable::new(|a: i32| -> Result<i32, BoxError> { Ok(a) })
        .bind(vec![Arg::value(1), Arg::value(2)]);
    assert!(too_many.unwrap_err().to_string().contains("too many args"));

    let option_without_tail = Callable::new(|a: i32| -> Result<i32, BoxError> { Ok(a) }).bind(vec![
        Arg::option(|| -> Result<i32, BoxError> { Ok(1) }, vec![]),
    ]);
    assert_eq!(option_without_tail.unwrap_err().kind(), ErrorKind::Usage);
}

#[test]
fn missing_slots_default_to_autowire() {
    let callable = Callable::new(|g: Arc<Greeter>, n: Option<i32>| -> Result<String, BoxError> {
        Ok(format!("{}{:?}", g.0, n))
    });
    let list = callable.bind(vec![]).unwrap();
    assert_eq!(list.slots().len(), 2);
    assert!(matches!(&list.slots()[0], Arg::Expr(s) if s.is_empty()));
}

#[test]
fn property_expressions_and_bean_tags() {
    let rt = runtime(&[("name", "world"), ("count", "3")]);
    let greet = |g: Arc<Greeter>, name: String, count: u8| -> Result<String, BoxError> {
        Ok(format!("{} {} x{}", g.0, name, count))
    };
    let out = rt
        .context()
        .invoke(greet, vec!["greeter".into(), "${name}".into(), "$count".into()])
        .unwrap();
    assert_eq!(out, "hi world x3");

    let by_type = rt
        .context()
        .invoke(greet, vec!["".into(), "hello ${name}".into(), Arg::value(1u8)])
        .unwrap();
    assert_eq!(by_type, "hi hello world x1");
}

#[test]
fn unknown_bean_tag_is_unresolved() {
    let rt = runtime(&[]);
    let err = rt
        .context()
        .invoke(|g: Arc<Greeter>| -> Result<&'static str, BoxError> { Ok(g.0) }, vec!["nobody".into()])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unresolved);
}

#[test]
fn wrong_value_type_is_usage_error() {
    let rt = runtime(&[]);
    let err = rt
        .context()
        .invoke(|n: i32| -> Result<i32, BoxError> { Ok(n) }, vec![Arg::value("text")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn option_args_are_skipped_when_their_condition_fails() {
    let rt = runtime(&[("plugins.b", "on")]);
    let collect = |names: Variadic<String>| -> Result<Vec<String>, BoxError> { Ok(names.into_inner()) };
    let out = rt
        .context()
        .invoke(
            collect,
            vec![
                Arg::option(|| -> Result<String, BoxError> { Ok("a".into()) }, vec![])
                    .on(Condition::on_property("plugins.a")),
                Arg::option(|| -> Result<String, BoxError> { Ok("b".into()) }, vec![])
                    .on(Condition::on_property("plugins.b")),
                Arg::option(|n: String| -> Result<String, BoxError> { Ok(n) }, vec!["${tail:=c}".into()]),
            ],
        )
        .unwrap();
    assert_eq!(out, vec!["b", "c"]);
}

#[test]
fn variadic_takes_extra_positional_args() {
    let rt = runtime(&[]);
    let sum = |first: i32, rest: Variadic<i32>| -> Result<i32, BoxError> { Ok(first + rest.iter().sum::<i32>()) };
    assert_eq!(rt.context().invoke(sum, vec![Arg::value(1), Arg::value(2), Arg::value(3)]).unwrap(), 6);
    assert_eq!(rt.context().invoke(sum, vec![Arg::value(1)]).unwrap(), 1);
}

#[test]
fn nested_calls_forward_their_result() {
    let rt = runtime(&[("base", "40")]);
    let out = rt
        .context()
        .invoke(
            |n: i32| -> Result<i32, BoxError> { Ok(n) },
            vec![Arg::call(|b: i32| -> Result<i32, BoxError> { Ok(b + 2) }, vec!["${base}".into()])],
        )
        .unwrap();
    assert_eq!(out, 42);
}

#[derive(Debug, PartialEq)]
struct Limits {
    max: u32,
}

impl wirebox_core::Bindable for Limits {
    fn bind(props: &wirebox_core::Properties, param: &wirebox_core::BindParam) -> wirebox_core::Result<Self> {
        Ok(Limits {
            max: props.bind_field(param, "max", "${max:=10}", None)?,
        })
    }
}

#[test]
fn prop_param_binds_structs() {
    let rt = runtime(&[("limits.max", "99")]);
    let out = rt
        .context()
        .invoke(|l: Prop<Limits>| -> Result<u32, BoxError> { Ok(l.max) }, vec!["${limits}".into()])
        .unwrap();
    assert_eq!(out, 99);
}

#[test]
fn user_errors_and_panics_are_lifecycle_errors() {
    let rt = runtime(&[]);
    let err = rt
        .context()
        .invoke(|| -> Result<(), BoxError> { Err("nope".into()) }, vec![])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(err.to_string().contains("nope"));

    let err = rt
        .context()
        .invoke(|| -> Result<(), BoxError> { panic!("kaboom") }, vec![])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(err.to_string().contains("panic: kaboom"));
}

#[test]
fn lazy_and_optional_params() {
    let rt = runtime(&[]);
    let out = rt
        .context()
        .invoke(
            |g: Lazy<Greeter>, missing: Option<Arc<Limits2>>| -> Result<bool, BoxError> {
                Ok(g.get().is_some() && missing.is_none())
            },
            vec![],
        )
        .unwrap();
    assert!(out);
}

struct Limits2;
impl Bean for Limits2 {}
