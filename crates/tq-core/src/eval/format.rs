//! Format directive codecs (`@name`).
//!
//! Each directive maps one input value to one output value. String-shaped
//! directives apply `tostring` semantics to non-string inputs first;
//! `@csv`/`@tsv` require an array of scalars. `@json` serialises as TOON
//! (frozen behavior of this engine, the name notwithstanding).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};

/// Everything except unreserved characters (`A-Z a-z 0-9 - _ . ~`) is
/// percent-encoded.
const URI_ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(super) fn apply(name: &str, input: &Value) -> EvalResult<Value> {
    match name {
        "text" => Ok(Value::String(text_form(input))),
        "json" => Ok(Value::String(input.to_toon())),
        "base64" => Ok(Value::String(BASE64.encode(text_form(input)))),
        "base64d" => {
            let Value::String(encoded) = input else {
                return Err(EvalError::new(format!(
                    "@base64d cannot be applied to {}",
                    input.type_name()
                )));
            };
            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|e| EvalError::new(format!("@base64d: {}", e)))?;
            Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        }
        "uri" => Ok(Value::String(
            utf8_percent_encode(&text_form(input), URI_ESCAPED).to_string(),
        )),
        "csv" => delimited(input, "@csv", ",", csv_cell),
        "tsv" => delimited(input, "@tsv", "\t", tsv_cell),
        "html" => {
            let mut out = String::new();
            for c in text_form(input).chars() {
                match c {
                    '&' => out.push_str("&amp;"),
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '\'' => out.push_str("&#39;"),
                    '"' => out.push_str("&quot;"),
                    _ => out.push(c),
                }
            }
            Ok(Value::String(out))
        }
        _ => Err(EvalError::new(format!("Unknown format directive: @{}", name))),
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_toon(),
    }
}

fn delimited(
    input: &Value,
    name: &str,
    separator: &str,
    cell: impl Fn(&Value) -> EvalResult<String>,
) -> EvalResult<Value> {
    let Value::Array(arr) = input else {
        return Err(EvalError::new(format!(
            "{} expects an array, got {}",
            name,
            input.type_name()
        )));
    };
    let cells = arr.iter().map(cell).collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::String(cells.join(separator)))
}

fn csv_cell(value: &Value) -> EvalResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::String(s) => Ok(format!("\"{}\"", s.replace('"', "\"\""))),
        other => Err(EvalError::new(format!(
            "@csv cannot format {} cells",
            other.type_name()
        ))),
    }
}

fn tsv_cell(value: &Value) -> EvalResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::String(s) => Ok(s
            .replace('\\', "\\\\")
            .replace('\t', "\\t")
            .replace('\n', "\\n")
            .replace('\r', "\\r")),
        other => Err(EvalError::new(format!(
            "@tsv cannot format {} cells",
            other.type_name()
        ))),
    }
}
