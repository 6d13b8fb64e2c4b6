use std::collections::BTreeMap;

use anyhow::Result;
use indoc::indoc;
use rendering_suffix::{
    AnyObject, BaseField, BoxError, Error, Value, from_str, impl_fields, init, resolve,
};
use serde_json::json;

fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
    Ok(v)
}

/// `defaults` returns a fixed document; everything else passes through.
fn defaults(name: &str, v: Value) -> Result<Value, BoxError> {
    match name {
        "defaults" => Ok(Value::from_json(json!({"replicas": 1, "ports": [80]}))),
        _ => Ok(v),
    }
}

#[derive(Default, Debug)]
struct Deployment {
    base: BaseField,
    tags: Vec<String>,
    settings: AnyObject,
    ports: Vec<i64>,
    first: String,
}

impl_fields!(Deployment { base, tags, settings, ports, first });

fn load(yaml: &str) -> Result<Deployment> {
    let mut d = Deployment::default();
    init(&mut d, Default::default())?;
    from_str(yaml, &mut d)?;
    Ok(d)
}

#[test]
fn list_merge_with_unique() -> Result<()> {
    let mut d = load(indoc! {"
        tags@echo!:
          value: [a, b]
          merge:
          - value: [b, c]
          unique: true
    "})?;
    resolve(&mut d, &echo, -1)?;
    assert_eq!(d.tags, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn patch_without_renderer_name() -> Result<()> {
    let mut d = load(indoc! {"
        ports@!:
          value: [1, 2]
          merge:
          - value: [3]
    "})?;
    resolve(&mut d, &echo, -1)?;
    assert_eq!(d.ports, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn merge_into_rendered_map() -> Result<()> {
    let mut d = load(indoc! {"
        settings@defaults!:
          merge:
          - value: {ports: [443]}
          map_list_append: true
    "})?;
    resolve(&mut d, &defaults, -1)?;
    assert_eq!(
        d.settings.to_value()?.to_json()?,
        json!({"replicas": 1, "ports": [80, 443]})
    );
    Ok(())
}

#[test]
fn nested_suffixes_in_patch_values_resolve() -> Result<()> {
    let mut d = load(indoc! {"
        settings@!:
          value:
            a@echo: 1
          merge:
          - value: {b@echo: 2}
    "})?;
    resolve(&mut d, &echo, -1)?;
    assert_eq!(d.settings.to_value()?.to_json()?, json!({"a": 1, "b": 2}));
    Ok(())
}

#[test]
fn unresolved_patch_values_keep_their_keys() -> Result<()> {
    let mut d = load(indoc! {"
        settings@!:
          value: {a@echo: 1}
          resolve: false
    "})?;
    // one level only, so the rendered map is not resolved afterwards
    resolve(&mut d, &echo, 1)?;
    assert!(d.settings.get("a").is_none());
    let text = rendering_suffix::to_string(&d)?;
    assert!(text.contains("a@echo: 1"), "{text}");

    let mut d = load(indoc! {"
        settings@!:
          value: {a@echo: 1}
    "})?;
    resolve(&mut d, &echo, 1)?;
    assert!(d.settings.get("a").is_some());
    Ok(())
}

#[test]
fn json_patch_and_select() -> Result<()> {
    let mut d = load(indoc! {"
        first@!:
          value: {names: [x, y]}
          patch:
          - {op: add, path: /names/0, value: w}
          select: .names[0]
    "})?;
    resolve(&mut d, &echo, -1)?;
    assert_eq!(d.first, "w");
    Ok(())
}

#[test]
fn select_with_several_results_is_a_list() -> Result<()> {
    let mut d = load(indoc! {"
        tags@!:
          value: [{n: a}, {n: b}]
          select: .[].n
    "})?;
    resolve(&mut d, &echo, -1)?;
    assert_eq!(d.tags, vec!["a", "b"]);
    Ok(())
}

#[test]
fn merging_a_list_into_a_map_fails() -> Result<()> {
    let mut d = load(indoc! {"
        settings@!:
          value: {a: 1}
          merge:
          - value: [1]
    "})?;
    let err = resolve(&mut d, &echo, -1).unwrap_err();
    assert!(matches!(err.root_cause(), Error::Patch { .. }), "{err}");
    Ok(())
}

#[test]
fn merge_map_helper() {
    let mut original: serde_json::Map<String, serde_json::Value> =
        serde_json::from_value(json!({"a": {"x": [1]}, "b": 1})).unwrap();
    let additional = serde_json::from_value(json!({"a": {"x": [1, 2]}, "c": 3})).unwrap();
    rendering_suffix::merge_map(&mut original, additional, true, true);
    assert_eq!(
        serde_json::Value::Object(original),
        json!({"a": {"x": [1, 2]}, "b": 1, "c": 3})
    );
}

#[test]
fn unique_list_is_idempotent() {
    let items = vec!["b", "a", "b", "c", "a"];
    let once = rendering_suffix::unique_list(items);
    assert_eq!(once, vec!["b", "a", "c"]);
    assert_eq!(rendering_suffix::unique_list(once.clone()), once);
}

#[derive(Default, Debug)]
struct Labels {
    base: BaseField,
    labels: BTreeMap<String, String>,
}

impl_fields!(Labels { base, labels });

#[test]
fn select_without_match_gives_null() -> Result<()> {
    let mut l = Labels::default();
    init(&mut l, Default::default())?;
    from_str(
        indoc! {"
            labels@!:
              value: {a: 1}
              select: .[] | select(. > 5)
        "},
        &mut l,
    )?;
    resolve(&mut l, &echo, -1)?;
    assert!(l.labels.is_empty());
    Ok(())
}
