//! JQ-style selection over JSON values, backed by jaq.

use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};

use crate::error::Error;

/// Evaluate `query` against `input`.
///
/// No output gives `null`, one output is returned as is, several outputs are collected into an
/// array.
pub fn select(query: &str, input: serde_json::Value) -> Result<serde_json::Value, Error> {
    let mut defs = ParseCtx::new(Vec::new());
    defs.insert_natives(jaq_core::core());
    defs.insert_defs(jaq_std::std());

    let (filter, errs) = jaq_parse::parse(query, jaq_parse::main());
    if !errs.is_empty() {
        return Err(Error::patch(format!("invalid query `{query}`: {errs:?}")));
    }
    let Some(filter) = filter else {
        return Err(Error::patch(format!("invalid query `{query}`")));
    };
    let filter = defs.compile(filter);
    if !defs.errs.is_empty() {
        return Err(Error::patch(format!(
            "invalid query `{query}`: {} undefined name(s)",
            defs.errs.len()
        )));
    }

    let inputs = RcIter::new(core::iter::empty());
    let mut results = Vec::new();
    for out in filter.run((Ctx::new([], &inputs), Val::from(input))) {
        let val = out.map_err(|e| Error::patch(format!("query `{query}` failed: {e}")))?;
        results.push(serde_json::Value::from(val));
    }
    Ok(match results.len() {
        0 => serde_json::Value::Null,
        1 => results.remove(0),
        _ => serde_json::Value::Array(results),
    })
}
