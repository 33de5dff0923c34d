//! TOON encoder — a [`Value`] tree into canonical TOON text.
//!
//! Every array is emitted in its most compact lossless form:
//!
//! - **Inline** for all-primitive arrays: `key[N]: v1,v2,v3`
//! - **Tabular** for uniform primitive-valued object rows:
//!   `key[N]{f1,f2}:` with one cell row per line
//! - **Expanded list** for everything else: `- item` lines
//!
//! Strings are quoted only when the decoder would otherwise read them back
//! as a different type or split them on an active delimiter: colon at the
//! document level, the cell delimiter inside inline arrays and tabular
//! rows. Object fields appear in key order (the container's native order).

use crate::value::{format_number, Value};

/// Encode a value tree as a TOON document. This is also the canonical
/// single-value serialization: the form the public `query` API prints and
/// the key form `group_by` groups by.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(map) => encode_object_fields(map, 0, &mut out),
        Value::Array(arr) => encode_root_array(arr, &mut out),
        other => encode_primitive_value(other, QuoteContext::Document, &mut out),
    }
    out
}

fn encode_root_array(arr: &[Value], out: &mut String) {
    if arr.is_empty() {
        out.push_str("[0]:");
    } else if all_primitives(arr) {
        out.push_str(&format!("[{}]: ", arr.len()));
        encode_inline_values(arr, out);
    } else if let Some(fields) = detect_tabular(arr) {
        out.push_str(&format!("[{}]{{{}}}:", arr.len(), fields.join(",")));
        encode_tabular_rows(arr, &fields, 0, out);
    } else {
        out.push_str(&format!("[{}]:", arr.len()));
        encode_list_items(arr, 0, out);
    }
}

fn encode_object_fields(
    map: &std::collections::BTreeMap<String, Value>,
    depth: usize,
    out: &mut String,
) {
    let indent = make_indent(depth);
    let mut first = true;
    for (key, value) in map {
        if !first {
            out.push('\n');
        }
        first = false;
        out.push_str(&indent);
        out.push_str(&encode_key(key));
        encode_field_value(value, depth, out);
    }
}

/// Dispatch a field's value: `key:` for empty objects, an indented block
/// for non-empty objects, array syntax for arrays, `key: value` otherwise.
fn encode_field_value(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Object(map) if map.is_empty() => out.push(':'),
        Value::Object(map) => {
            out.push_str(":\n");
            encode_object_fields(map, depth + 1, out);
        }
        Value::Array(arr) => encode_array_field(arr, depth, out),
        other => {
            out.push_str(": ");
            encode_primitive_value(other, QuoteContext::Document, out);
        }
    }
}

/// Select the most compact representation for an array field.
fn encode_array_field(arr: &[Value], depth: usize, out: &mut String) {
    if arr.is_empty() {
        out.push_str("[0]:");
        return;
    }
    if let Some(fields) = detect_tabular(arr) {
        out.push_str(&format!("[{}]{{{}}}:", arr.len(), fields.join(",")));
        encode_tabular_rows(arr, &fields, depth, out);
        return;
    }
    if all_primitives(arr) {
        out.push_str(&format!("[{}]: ", arr.len()));
        encode_inline_values(arr, out);
        return;
    }
    out.push_str(&format!("[{}]:", arr.len()));
    encode_list_items(arr, depth, out);
}

fn encode_inline_values(arr: &[Value], out: &mut String) {
    for (i, value) in arr.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_primitive_value(value, QuoteContext::InlineArray, out);
    }
}

fn encode_tabular_rows(arr: &[Value], fields: &[String], depth: usize, out: &mut String) {
    let row_indent = make_indent(depth + 1);
    for row in arr {
        out.push('\n');
        out.push_str(&row_indent);
        if let Value::Object(map) = row {
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                if let Some(cell) = map.get(field) {
                    encode_primitive_value(cell, QuoteContext::TabularCell, out);
                }
            }
        }
    }
}

/// Expanded list items. An object item carries its first field on the
/// hyphen line; sibling fields continue at the content indent.
fn encode_list_items(arr: &[Value], depth: usize, out: &mut String) {
    let item_indent = make_indent(depth + 1);
    for item in arr {
        out.push('\n');
        out.push_str(&item_indent);
        out.push_str("- ");
        match item {
            Value::Object(map) => {
                let mut first = true;
                for (key, value) in map {
                    if first {
                        first = false;
                    } else {
                        out.push('\n');
                        out.push_str(&item_indent);
                        out.push_str("  ");
                    }
                    out.push_str(&encode_key(key));
                    encode_list_item_field_value(value, depth + 1, out);
                }
            }
            Value::Array(inner) => {
                if all_primitives(inner) {
                    if inner.is_empty() {
                        out.push_str("[0]:");
                    } else {
                        out.push_str(&format!("[{}]: ", inner.len()));
                        encode_inline_values(inner, out);
                    }
                } else {
                    out.push_str(&format!("[{}]:", inner.len()));
                    encode_list_items(inner, depth + 1, out);
                }
            }
            other => encode_primitive_value(other, QuoteContext::Document, out),
        }
    }
}

/// Like [`encode_field_value`] but for fields inside a list item, where
/// nested objects need one extra indent level for the `- ` offset.
fn encode_list_item_field_value(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Object(map) if map.is_empty() => out.push(':'),
        Value::Object(map) => {
            out.push_str(":\n");
            encode_object_fields(map, depth + 2, out);
        }
        // One extra level keeps tabular rows below the sibling-field indent.
        Value::Array(arr) => encode_array_field(arr, depth + 1, out),
        other => {
            out.push_str(": ");
            encode_primitive_value(other, QuoteContext::Document, out);
        }
    }
}

/// Quoting context per the delimiter scoping rules: colon is active at the
/// document level, the cell delimiter inside inline arrays and tabular rows.
#[derive(Clone, Copy, PartialEq)]
enum QuoteContext {
    Document,
    InlineArray,
    TabularCell,
}

fn encode_primitive_value(value: &Value, ctx: QuoteContext, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::String(s) => encode_string_value(s, ctx, out),
        // Containers never reach primitive context; the array/object paths
        // above handle them.
        _ => out.push_str("null"),
    }
}

fn encode_string_value(s: &str, ctx: QuoteContext, out: &mut String) {
    if !needs_quoting(s, ctx) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// A string must be quoted when the decoder would otherwise read it back
/// differently: empty, whitespace-edged, bool/null/number lookalikes,
/// escape-relevant or bracketed characters, a leading hyphen (list marker
/// ambiguity), or the context's active delimiter.
fn needs_quoting(s: &str, ctx: QuoteContext) -> bool {
    if s.is_empty() || s != s.trim() {
        return true;
    }
    if s == "true" || s == "false" || s == "null" {
        return true;
    }
    if looks_numeric(s) {
        return true;
    }
    if s.contains(['\\', '"', '[', ']', '{', '}', '\n', '\r', '\t']) {
        return true;
    }
    if s.starts_with('-') {
        return true;
    }
    match ctx {
        QuoteContext::Document => s.contains(':'),
        QuoteContext::InlineArray | QuoteContext::TabularCell => s.contains(','),
    }
}

/// Would the decoder's type inference read this as a number? Covers signed
/// forms, decimals, exponents, and leading-zero strings like "05".
fn looks_numeric(s: &str) -> bool {
    let rest = s.strip_prefix(['-', '+']).unwrap_or(s);
    if rest.is_empty() {
        return false;
    }
    if rest.len() > 1 && rest.starts_with('0') && rest.as_bytes()[1] != b'.' {
        return true;
    }
    let mut has_dot = false;
    let mut has_e = false;
    for (i, b) in rest.bytes().enumerate() {
        match b {
            b'0'..=b'9' => {}
            b'.' if !has_dot && !has_e => has_dot = true,
            b'e' | b'E' if !has_e && i > 0 => has_e = true,
            b'+' | b'-' if has_e => {}
            _ => return false,
        }
    }
    rest.bytes().any(|b| b.is_ascii_digit())
}

/// Keys matching `^[A-Za-z_][A-Za-z0-9_.]*$` are emitted bare; everything
/// else is quoted with the shared escape set.
fn encode_key(key: &str) -> String {
    if is_valid_unquoted_key(key) {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 2);
    out.push('"');
    for c in key.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_valid_unquoted_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// All elements are scalars (no nested containers).
fn all_primitives(arr: &[Value]) -> bool {
    arr.iter()
        .all(|v| !matches!(v, Value::Array(_) | Value::Object(_)))
}

/// Tabular form applies when every element is an object with the same key
/// set and only primitive values.
fn detect_tabular(arr: &[Value]) -> Option<Vec<String>> {
    let first = arr.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<String> = first.keys().cloned().collect();
    for item in arr {
        let obj = item.as_object()?;
        if obj.len() != fields.len() {
            return None;
        }
        for field in &fields {
            let cell = obj.get(field)?;
            if matches!(cell, Value::Array(_) | Value::Object(_)) {
                return None;
            }
        }
    }
    Some(fields)
}

fn make_indent(depth: usize) -> String {
    "  ".repeat(depth)
}
