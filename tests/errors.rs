use std::collections::BTreeMap;

use rendering_suffix::{
    BaseField, BoxError, Budget, BudgetBreach, Error, Value, from_str, impl_fields, init, resolve,
};

fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
    Ok(v)
}

#[derive(Default, Debug)]
struct Simple {
    base: BaseField,
    name: String,
    count: i64,
}

impl_fields!(Simple { base, name, count });

fn loaded(yaml: &str) -> Result<Simple, Error> {
    let mut s = Simple::default();
    init(&mut s, Default::default())?;
    from_str(yaml, &mut s)?;
    Ok(s)
}

#[test]
fn operations_need_init() {
    let mut s = Simple::default();
    let err = from_str("name: x\n", &mut s).unwrap_err();
    assert!(matches!(err, Error::NotInitialized { .. }), "{err}");

    let err = resolve(&mut s, &echo, -1).unwrap_err();
    assert!(matches!(err, Error::NotInitialized { .. }), "{err}");

    let err = rendering_suffix::to_node(&s).unwrap_err();
    assert!(matches!(err, Error::NotInitialized { .. }), "{err}");
}

#[test]
fn init_twice_is_harmless() {
    let mut s = Simple::default();
    init(&mut s, Default::default()).unwrap();
    from_str("name@echo: x\n", &mut s).unwrap();
    init(&mut s, rendering_suffix::options! { allow_unknown_fields: true }).unwrap();
    assert!(s.base.has_unresolved());
    assert!(!s.base.options().allow_unknown_fields);
}

#[test]
fn unknown_keys_are_rejected_with_location() {
    let err = loaded("name: x\nnope: 1\n").unwrap_err();
    match &err {
        Error::UnknownField { key, .. } => assert_eq!(key, "nope"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.location().is_some());

    let err = loaded("nope@echo: 1\n").unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref key, .. } if key == "nope@echo"), "{err}");
}

#[test]
fn unknown_keys_may_be_skipped() {
    let mut s = Simple::default();
    init(&mut s, rendering_suffix::options! { allow_unknown_fields: true }).unwrap();
    from_str("name: x\nnope: 1\nother@echo: 2\n", &mut s).unwrap();
    assert_eq!(s.name, "x");
    assert!(!s.base.has_unresolved());
}

#[test]
fn same_field_twice() {
    let err = loaded("count: 1\ncount@echo: 2\n").unwrap_err();
    assert!(matches!(err, Error::DuplicateField { ref key, .. } if key == "count"), "{err}");

    let err = loaded("count@a: 1\ncount@b: 2\n").unwrap_err();
    assert!(matches!(err, Error::DuplicateField { .. }), "{err}");
}

#[test]
fn suffix_on_key_and_tag() {
    let err = loaded("count@echo: !rs:echo 1\n").unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");
}

#[test]
fn bad_type_hint_name() {
    let err = loaded("count@echo?bogus: 1\n").unwrap_err();
    assert!(matches!(err.root_cause(), Error::SuffixParse { .. }), "{err}");
}

#[test]
fn mapping_expected() {
    let err = loaded("[1, 2]\n").unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");
    // an empty document decodes to nothing
    assert!(loaded("").is_ok());
}

#[test]
fn plain_value_of_wrong_type_names_the_field() {
    let err = loaded("count: [1]\n").unwrap_err();
    assert!(matches!(err, Error::Field { ref key, .. } if key == "count"), "{err}");
}

#[test]
fn rendered_value_of_wrong_type() {
    let mut s = loaded("count@echo: [1]\n").unwrap();
    let err = resolve(&mut s, &echo, -1).unwrap_err();
    assert!(matches!(err, Error::Assignability { ref key, .. } if key == "count"), "{err}");
}

#[test]
fn type_hint_failure() {
    let mut s = loaded("count@echo?int: abc\n").unwrap();
    let err = resolve(&mut s, &echo, -1).unwrap_err();
    assert!(matches!(err.root_cause(), Error::TypeHint { hint: "int", .. }), "{err}");
}

#[test]
fn renderer_failure_is_reported() {
    let failing = |name: &str, _: Value| -> Result<Value, BoxError> { Err(format!("{name} is down").into()) };
    let mut s = loaded("name@vault: secret/x\n").unwrap();
    let err = resolve(&mut s, &failing, -1).unwrap_err();
    match err.root_cause() {
        Error::Renderer { renderer, source } => {
            assert_eq!(renderer, "vault");
            assert_eq!(source.to_string(), "vault is down");
        }
        other => panic!("unexpected error: {other}"),
    }
    // the entry is consumed even on failure
    assert_eq!(s.name, "");
}

#[test]
fn renderer_whitelist() {
    let options = rendering_suffix::options! {
        allowed_renderers: Some(["echo".to_string()].into_iter().collect()),
    };
    let mut s = Simple::default();
    init(&mut s, options).unwrap();
    from_str("name@shell: rm\n", &mut s).unwrap();
    let err = resolve(&mut s, &echo, -1).unwrap_err();
    assert!(
        matches!(err.root_cause(), Error::RendererNotAllowed { renderer } if renderer == "shell"),
        "{err}"
    );
}

#[derive(Default, Debug)]
struct Locked {
    base: BaseField,
    token: String,
}

impl_fields!(Locked {
    base,
    #[rs = "disabled"] token,
});

#[test]
fn disabled_slots_refuse_suffixes() {
    let mut l = Locked::default();
    init(&mut l, Default::default()).unwrap();
    from_str("token: abc\n", &mut l).unwrap();
    assert_eq!(l.token, "abc");

    let err = from_str("token@echo: abc\n", &mut l).unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");

    let err = from_str("token: !rs:echo abc\n", &mut l).unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");
}

#[derive(Default, Debug)]
struct TwoCatchAll {
    base: BaseField,
    a: BTreeMap<String, String>,
    b: BTreeMap<String, String>,
}

impl_fields!(TwoCatchAll {
    base,
    #[rs = "other"] a,
    #[rs = "other"] b,
});

#[derive(Default, Debug)]
struct BadTag {
    base: BaseField,
    x: String,
}

impl_fields!(BadTag {
    base,
    #[rs = "sometimes"] x,
});

#[derive(Default, Debug)]
struct SameKey {
    base: BaseField,
    x: String,
    y: String,
}

impl_fields!(SameKey {
    base,
    #[yaml = "k"] x,
    #[yaml = "k"] y,
});

#[test]
fn registry_errors() {
    let err = init(&mut TwoCatchAll::default(), Default::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");

    let err = init(&mut BadTag::default(), Default::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");

    let err = init(&mut SameKey::default(), Default::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidTag { .. }), "{err}");
}

/// Each level is a list of ten aliases to the level below.
fn nested_aliases(levels: usize) -> String {
    let mut doc = String::from("l0: &l0 [lol, lol, lol, lol, lol, lol, lol, lol, lol, lol]\n");
    for i in 1..levels {
        let refs = vec![format!("*l{}", i - 1); 10].join(", ");
        doc.push_str(&format!("l{i}: &l{i} [{refs}]\n"));
    }
    doc
}

#[test]
fn alias_expansion_is_bounded() {
    assert!(rendering_suffix::parse(&nested_aliases(3)).is_ok());

    let err = rendering_suffix::parse(&nested_aliases(9)).unwrap_err();
    assert!(
        matches!(err, Error::Budget { breach: BudgetBreach::Nodes { .. }, .. }),
        "{err}"
    );
}

#[test]
fn struct_options_carry_the_budget() {
    let mut s = Simple::default();
    init(
        &mut s,
        rendering_suffix::options! {
            budget: Budget { max_aliases: 1, ..Budget::default() },
        },
    )
    .unwrap();
    from_str("name: &n x\n", &mut s).unwrap();

    let err = from_str("name: &n x\ncount: 1\nextra: [*n, *n]\n", &mut s).unwrap_err();
    assert!(
        matches!(err, Error::Budget { breach: BudgetBreach::Aliases { aliases: 2 }, .. }),
        "{err}"
    );
}
