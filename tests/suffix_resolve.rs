use std::collections::BTreeMap;

use anyhow::Result;
use indoc::indoc;
use rendering_suffix::{BaseField, BoxError, FieldsExt, Value, from_str, impl_fields, init, resolve};

fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
    Ok(v)
}

fn upper(name: &str, v: Value) -> Result<Value, BoxError> {
    match name {
        "upper" => Ok(Value::Str(v.decoded()?.as_str().unwrap_or_default().to_uppercase())),
        _ => Ok(v),
    }
}

#[derive(Default, Debug)]
struct Simple {
    base: BaseField,
    my_value: String,
    count: i64,
}

impl_fields!(Simple { base, my_value, count });

#[test]
fn suffixed_value_waits_for_resolve() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("my_value@echo: 123\n", &mut s)?;
    assert_eq!(s.my_value, "");
    assert_eq!(s.unresolved_keys(), vec!["my_value@echo".to_string()]);

    resolve(&mut s, &echo, -1)?;
    assert_eq!(s.my_value, "123");
    assert!(s.unresolved_keys().is_empty());
    Ok(())
}

#[test]
fn chain_with_type_hint() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("count@echo|echo?int: \"42\"\n", &mut s)?;
    resolve(&mut s, &echo, -1)?;
    assert_eq!(s.count, 42);
    Ok(())
}

#[test]
fn plain_keys_decode_immediately() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("my_value: plain\ncount: 7\n", &mut s)?;
    assert_eq!(s.my_value, "plain");
    assert_eq!(s.count, 7);
    Ok(())
}

#[test]
fn rs_tag_on_value_is_a_suffix() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("my_value: !rs:upper shout\n", &mut s)?;
    assert_eq!(s.my_value, "");
    resolve(&mut s, &upper, -1)?;
    assert_eq!(s.my_value, "SHOUT");
    Ok(())
}

#[test]
fn later_decode_replaces_pending_entry() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("my_value@upper: first\n", &mut s)?;
    from_str("my_value: second\n", &mut s)?;
    assert!(s.unresolved_keys().is_empty());
    resolve(&mut s, &upper, -1)?;
    assert_eq!(s.my_value, "second");
    Ok(())
}

#[derive(Default, Debug)]
struct WithExtra {
    base: BaseField,
    name: String,
    extra: BTreeMap<String, i64>,
}

impl_fields!(WithExtra {
    base,
    name,
    #[rs = "other"] extra,
});

#[test]
fn catch_all_map_takes_unknown_keys() -> Result<()> {
    let mut w = WithExtra::default();
    init(&mut w, Default::default())?;
    from_str(
        indoc! {"
            name: n
            a: 1
            b@echo: 2
            c: 3
        "},
        &mut w,
    )?;
    assert_eq!(w.extra.len(), 2);
    assert_eq!(w.extra["a"], 1);
    assert_eq!(w.extra["c"], 3);

    resolve(&mut w, &echo, -1)?;
    assert_eq!(w.extra["b"], 2);
    assert_eq!(w.name, "n");
    Ok(())
}

#[derive(Default, Debug)]
struct Pair {
    base: BaseField,
    name: String,
    other: String,
}

impl_fields!(Pair { base, name, other });

#[test]
fn virtual_key_merges_and_static_keys_win() -> Result<()> {
    let mut p = Pair::default();
    init(&mut p, Default::default())?;
    from_str(
        indoc! {"
            __@echo:
              name: from-virtual
              other: overridden
            other: x
        "},
        &mut p,
    )?;
    assert_eq!(p.name, "");
    assert_eq!(p.other, "");

    resolve(&mut p, &echo, -1)?;
    assert_eq!(p.name, "from-virtual");
    assert_eq!(p.other, "x");
    Ok(())
}

#[test]
fn virtual_keys_apply_in_order() -> Result<()> {
    let mut p = Pair::default();
    init(&mut p, Default::default())?;
    from_str(
        indoc! {"
            __: !rs:echo {name: first, other: first}
            __@echo: {name: second}
        "},
        &mut p,
    )?;
    resolve(&mut p, &echo, -1)?;
    assert_eq!(p.name, "second");
    assert_eq!(p.other, "first");
    Ok(())
}

#[derive(Default, Debug)]
struct Lists {
    base: BaseField,
    items: Vec<String>,
}

impl_fields!(Lists { base, items });

#[test]
fn lazy_list_items_render_individually() -> Result<()> {
    let mut l = Lists::default();
    init(&mut l, Default::default())?;
    from_str(
        indoc! {"
            items:
            - a
            - __@upper: b
            - c
        "},
        &mut l,
    )?;
    assert!(l.items.is_empty());
    resolve(&mut l, &upper, -1)?;
    assert_eq!(l.items, vec!["a", "B", "c"]);
    Ok(())
}

#[derive(Default, Debug)]
struct Inner {
    base: BaseField,
    w: String,
}

impl_fields!(Inner { base, w });

#[derive(Default, Debug)]
struct Outer {
    base: BaseField,
    v: String,
    inner: Inner,
    deep: Option<Box<Outer>>,
}

impl_fields!(Outer { base, v, inner, deep });

const NESTED: &str = indoc! {"
    v@echo: a
    inner:
      w@echo: b
    deep:
      v@echo: c
      inner:
        w@echo: d
"};

#[test]
fn depth_limits_struct_levels() -> Result<()> {
    let mut o = Outer::default();
    init(&mut o, Default::default())?;
    from_str(NESTED, &mut o)?;

    resolve(&mut o, &echo, 0)?;
    assert_eq!(o.v, "");

    resolve(&mut o, &echo, 1)?;
    assert_eq!(o.v, "a");
    assert_eq!(o.inner.w, "");

    resolve(&mut o, &echo, 2)?;
    assert_eq!(o.inner.w, "b");
    let deep = o.deep.as_ref().unwrap();
    assert_eq!(deep.v, "c");
    assert_eq!(deep.inner.w, "");

    resolve(&mut o, &echo, -1)?;
    assert_eq!(o.deep.as_ref().unwrap().inner.w, "d");
    Ok(())
}

#[test]
fn deeper_resolve_covers_shallower() -> Result<()> {
    let mut a = Outer::default();
    init(&mut a, Default::default())?;
    from_str(NESTED, &mut a)?;
    resolve(&mut a, &echo, 2)?;

    let mut b = Outer::default();
    init(&mut b, Default::default())?;
    from_str(NESTED, &mut b)?;
    resolve(&mut b, &echo, 1)?;

    assert_eq!(a.v, b.v);
    assert_eq!(a.inner.w, "b");
    Ok(())
}

#[test]
fn resolve_selected_fields_only() -> Result<()> {
    let mut p = Pair::default();
    init(&mut p, Default::default())?;
    from_str("name@echo: n\nother@echo: o\n", &mut p)?;

    p.resolve_fields(&echo, -1, &["other"])?;
    assert_eq!(p.name, "");
    assert_eq!(p.other, "o");
    assert_eq!(p.unresolved_keys(), vec!["name@echo".to_string()]);
    Ok(())
}

#[derive(Default, Debug)]
struct Common {
    base: BaseField,
    region: String,
}

impl_fields!(Common { base, region });

#[derive(Default, Debug)]
struct Service {
    base: BaseField,
    common: Common,
    name: String,
}

impl_fields!(Service {
    base,
    #[yaml = ",inline"] common,
    name,
});

#[test]
fn inline_struct_keys_belong_to_the_child() -> Result<()> {
    let mut s = Service::default();
    init(&mut s, Default::default())?;
    from_str("name: api\nregion@upper: eu\n", &mut s)?;
    assert!(!s.base.has_unresolved());
    assert!(s.common.base.has_unresolved());
    assert_eq!(s.unresolved_keys(), vec!["region@upper".to_string()]);

    resolve(&mut s, &upper, 1)?;
    assert_eq!(s.common.region, "EU");
    assert_eq!(s.name, "api");
    Ok(())
}

#[test]
fn merge_keys_are_flattened() -> Result<()> {
    let mut p = Pair::default();
    init(&mut p, Default::default())?;
    from_str(
        indoc! {"
            <<: {name: merged, other: merged}
            name: own
        "},
        &mut p,
    )?;
    assert_eq!(p.name, "own");
    assert_eq!(p.other, "merged");

    // a merged key and a suffixed key name the same field
    let err = from_str("<<: {other: merged}\nother@echo: own\n", &mut p).unwrap_err();
    assert!(
        matches!(err, rendering_suffix::Error::DuplicateField { ref key, .. } if key == "other"),
        "{err}"
    );
    Ok(())
}

#[derive(Default, Debug)]
struct ServiceMap {
    base: BaseField,
    services: BTreeMap<String, Pair>,
}

impl_fields!(ServiceMap { base, services });

#[test]
fn struct_values_inside_maps_resolve_through_the_map() -> Result<()> {
    let mut m = ServiceMap::default();
    init(&mut m, Default::default())?;
    from_str(
        indoc! {"
            services:
              web:
                name@upper: w
        "},
        &mut m,
    )?;
    resolve(&mut m, &upper, -1)?;
    assert_eq!(m.services["web"].name, "W");
    Ok(())
}

#[test]
fn suffix_on_a_map_entry_key_stays_in_the_key() -> Result<()> {
    let mut m = ServiceMap::default();
    init(&mut m, Default::default())?;
    from_str("services:\n  web@echo: {name: w}\n", &mut m)?;
    resolve(&mut m, &echo, -1)?;
    assert!(m.services.contains_key("web@echo"));
    Ok(())
}

#[test]
fn from_slice_reads_bytes() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    rendering_suffix::from_slice(b"count: 3\n", &mut s)?;
    assert_eq!(s.count, 3);
    Ok(())
}

#[test]
fn static_keys_win_after_a_named_resolve() -> Result<()> {
    let mut p = Pair::default();
    init(&mut p, Default::default())?;
    from_str(
        indoc! {"
            __@echo:
              name: from-virtual
              other: from-virtual
            other: static
        "},
        &mut p,
    )?;

    p.resolve_fields(&echo, -1, &["other"])?;
    assert_eq!(p.other, "static");
    assert_eq!(p.unresolved_keys(), vec!["__@echo".to_string()]);

    resolve(&mut p, &echo, -1)?;
    assert_eq!(p.name, "from-virtual");
    assert_eq!(p.other, "static");
    Ok(())
}

fn refuse(name: &str, v: Value) -> Result<Value, BoxError> {
    match name {
        "refuse" => Err("refused".into()),
        _ => Ok(v),
    }
}

#[test]
fn failed_item_leaves_its_siblings_pending() -> Result<()> {
    let mut w = WithExtra::default();
    init(&mut w, Default::default())?;
    from_str("a@refuse: 1\nb@echo: 2\n", &mut w)?;

    let err = resolve(&mut w, &refuse, -1).unwrap_err();
    assert!(
        matches!(err.root_cause(), rendering_suffix::Error::Renderer { .. }),
        "{err}"
    );
    assert_eq!(w.unresolved_keys(), vec!["a@refuse", "b@echo"]);

    resolve(&mut w, &echo, -1)?;
    assert_eq!(w.extra["a"], 1);
    assert_eq!(w.extra["b"], 2);
    assert!(w.unresolved_keys().is_empty());
    Ok(())
}

#[test]
fn failed_field_stays_pending() -> Result<()> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str("my_value@refuse: x\n", &mut s)?;
    assert!(resolve(&mut s, &refuse, -1).is_err());
    assert_eq!(s.unresolved_keys(), vec!["my_value@refuse"]);

    resolve(&mut s, &echo, -1)?;
    assert_eq!(s.my_value, "x");
    Ok(())
}

#[derive(Default, Debug)]
struct Groups {
    base: BaseField,
    groups: BTreeMap<String, Vec<String>>,
    matrix: Vec<Vec<String>>,
}

impl_fields!(Groups { base, groups, matrix });

#[test]
fn lazy_items_inside_nested_containers() -> Result<()> {
    let mut g = Groups::default();
    init(&mut g, Default::default())?;
    from_str(
        indoc! {"
            groups:
              x: [a, {__@upper: b}]
              y: [c]
            matrix:
            - [d, {__@upper: e}]
            - [f]
        "},
        &mut g,
    )?;
    assert!(g.groups.is_empty());
    assert_eq!(g.unresolved_keys(), vec!["groups", "matrix"]);

    resolve(&mut g, &upper, -1)?;
    assert_eq!(g.groups["x"], vec!["a", "B"]);
    assert_eq!(g.groups["y"], vec!["c"]);
    assert_eq!(g.matrix, vec![vec!["d", "E"], vec!["f"]]);
    Ok(())
}
