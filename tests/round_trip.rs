use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use indoc::indoc;
use rendering_suffix::{
    BaseField, BoxError, FieldsExt, Plain, Value, format_renderers, from_str, impl_fields, init,
    parse_renderers, resolve, to_string,
};
use serde::{Deserialize, Serialize};

fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
    Ok(v)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Limits {
    cpu: String,
    memory: u32,
}

#[derive(Default, Debug)]
struct App {
    base: BaseField,
    name: String,
    replicas: i64,
    env: HashMap<String, String>,
    limits: Plain<Limits>,
    rest: BTreeMap<String, Value>,
}

impl_fields!(App {
    base,
    name,
    #[yaml = "replicas,omitempty"] replicas,
    env,
    #[yaml = "resources"] limits,
    #[rs = "other"] rest,
});

fn app(yaml: &str) -> Result<App> {
    let mut a = App::default();
    init(&mut a, Default::default())?;
    from_str(yaml, &mut a)?;
    Ok(a)
}

#[test]
fn pending_entries_survive_marshaling() -> Result<()> {
    let first = app(indoc! {"
        name@echo: web
        env:
          B: b
          A: a
        resources: {cpu: 500m, memory: 64}
        zone@echo: eu
    "})?;
    let text = to_string(&first)?;
    assert!(text.contains("name@echo: web"), "{text}");
    assert!(text.contains("zone@echo: eu"), "{text}");
    assert!(!text.contains("replicas"), "{text}");
    // hash maps are written in key order
    let a = text.find("A: a").unwrap();
    let b = text.find("B: b").unwrap();
    assert!(a < b, "{text}");

    let second = app(&text)?;
    assert_eq!(first.unresolved_keys(), second.unresolved_keys());
    assert_eq!(*second.limits, Limits { cpu: "500m".into(), memory: 64 });
    assert_eq!(to_string(&second)?, text);
    Ok(())
}

#[test]
fn resolved_values_marshal_plainly() -> Result<()> {
    let mut a = app("name@echo: web\nreplicas: 3\nzone@echo: eu\n")?;
    resolve(&mut a, &echo, -1)?;
    let text = to_string(&a)?;
    assert!(text.contains("name: web"), "{text}");
    assert!(text.contains("replicas: 3"), "{text}");
    assert!(text.contains("zone: eu"), "{text}");
    assert!(!text.contains('@'), "{text}");
    Ok(())
}

#[test]
fn catch_all_holds_any_value() -> Result<()> {
    let a = app("port: 8080\nflags: [x, y]\n")?;
    assert_eq!(a.rest["port"], Value::Int(8080));
    assert_eq!(
        a.rest["flags"].to_json()?,
        serde_json::json!(["x", "y"])
    );
    Ok(())
}

#[test]
fn suffix_text_round_trips() -> Result<()> {
    for suffix in ["echo", "a|b?int", "tpl!|file?[]obj", "?str", "x?[]byte!"] {
        let parsed = parse_renderers(suffix)?;
        assert_eq!(format_renderers(&parsed), suffix);
        assert_eq!(parse_renderers(&format_renderers(&parsed))?, parsed);
    }
    // empty segments disappear from the canonical form
    assert_eq!(format_renderers(&parse_renderers("a||b")?), "a|b");
    Ok(())
}
