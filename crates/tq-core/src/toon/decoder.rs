//! TOON decoder — indentation-structured text into a [`Value`] tree.
//!
//! Handles the full reader surface the engine depends on:
//!
//! - Flat and nested objects (indentation-based, 2 spaces per level)
//! - Inline primitive arrays (`key[N]: v1,v2`) with optional delimiter
//!   suffixes (`key[N\t]:`, `key[N|]:`)
//! - Tabular arrays (`key[N]{f1,f2}:` with one row per line below)
//! - Expanded lists (`key[N]:` with `- item` lines below)
//! - Quoted/unquoted keys and values with escape sequences
//! - Type inference: unquoted `true`/`false`/`null`/numbers
//! - Declared array lengths validated against the parsed element count
//!
//! Two details matter for correct line advancement: key-value parsing
//! returns the next line index so callers can skip past array bodies, and
//! expanded-list skipping treats a non-`- ` line at the item indent as a
//! sibling field rather than list content.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// Decode a TOON document into a value tree.
pub fn decode(toon: &str) -> Result<Value> {
    let toon = toon.trim_end_matches('\n');

    if toon.is_empty() {
        return Ok(Value::Object(BTreeMap::new()));
    }

    // Root array: starts with [N]
    if toon.starts_with('[') {
        let lines: Vec<&str> = toon.lines().collect();
        if let Some(header) = parse_array_header(lines[0]) {
            return parse_array_body(&header, &lines, 0, 0);
        }
    }

    // Root primitive: a single line with no key-colon structure
    let lines: Vec<&str> = toon.lines().collect();
    if lines.len() == 1 && !line_has_key_colon(lines[0]) {
        return Ok(parse_primitive_token(lines[0].trim()));
    }

    parse_object_from_lines(&lines, 0, 0, lines.len())
}

fn toon_error(line: usize, message: impl Into<String>) -> Error {
    Error::Toon {
        line,
        message: message.into(),
    }
}

/// Does this line carry a `key:` pattern (rather than being a bare
/// primitive that happens to contain a colon)?
fn line_has_key_colon(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with('"') {
        if let Some(end) = find_closing_quote(trimmed, 1) {
            return trimmed.as_bytes().get(end + 1) == Some(&b':')
                || trimmed.as_bytes().get(end + 1) == Some(&b'[');
        }
        return false;
    }
    if trimmed.starts_with('[') {
        return false;
    }
    match trimmed.find(':') {
        Some(colon_pos) => {
            let before = &trimmed[..colon_pos];
            !before.contains(' ') && !before.is_empty()
        }
        None => false,
    }
}

/// Parsed metadata from an array header like `[3]:`, `[3]: v1,v2`,
/// `[3|]: a|b|c`, or `[3]{a,b}:`.
struct ArrayHeader {
    len: usize,
    delimiter: char,
    fields: Option<Vec<String>>,
    inline_values: Option<String>,
}

/// Parse an array header from the text at or after the key: `[N]`,
/// optionally with a delimiter suffix (`[N\t]`, `[N|]`), then either a
/// tabular field list, inline values after `: `, or a bare `:`.
fn parse_array_header(line: &str) -> Option<ArrayHeader> {
    let trimmed = line.trim();
    let bracket_start = trimmed.find('[')?;
    let after_open = &trimmed[bracket_start + 1..];

    let digits_end = after_open
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_open.len());
    let len: usize = after_open[..digits_end].parse().ok()?;

    let mut rest = &after_open[digits_end..];
    let delimiter = match rest.chars().next()? {
        '\t' => {
            rest = &rest[1..];
            '\t'
        }
        '|' => {
            rest = &rest[1..];
            '|'
        }
        _ => ',',
    };
    let after_bracket = rest.strip_prefix(']')?;

    // Tabular field list: {f1,f2}:
    if let Some(after_brace_open) = after_bracket.strip_prefix('{') {
        let brace_end = after_brace_open.find('}')?;
        let fields = after_brace_open[..brace_end]
            .split(delimiter)
            .map(str::to_string)
            .collect();
        let after_brace = &after_brace_open[brace_end + 1..];
        if after_brace.starts_with(':') {
            return Some(ArrayHeader {
                len,
                delimiter,
                fields: Some(fields),
                inline_values: None,
            });
        }
        return None;
    }

    // Inline values on the same line: `: v1,v2`
    if let Some(values) = after_bracket.strip_prefix(": ") {
        return Some(ArrayHeader {
            len,
            delimiter,
            fields: None,
            inline_values: Some(values.to_string()),
        });
    }

    // Expanded or empty: bare `:`
    if after_bracket.starts_with(':') {
        return Some(ArrayHeader {
            len,
            delimiter,
            fields: None,
            inline_values: None,
        });
    }

    None
}

/// Parse an array body given its parsed header, dispatching to inline,
/// tabular, or expanded-list parsing. Validates the declared length.
fn parse_array_body(
    header: &ArrayHeader,
    lines: &[&str],
    line_idx: usize,
    base_indent: usize,
) -> Result<Value> {
    let arr = parse_array_body_inner(header, lines, line_idx, base_indent)?;
    if arr.len() != header.len {
        return Err(toon_error(
            line_idx + 1,
            format!(
                "Array declares {} element(s) but contains {}",
                header.len,
                arr.len()
            ),
        ));
    }
    Ok(Value::Array(arr))
}

fn parse_array_body_inner(
    header: &ArrayHeader,
    lines: &[&str],
    line_idx: usize,
    base_indent: usize,
) -> Result<Vec<Value>> {
    if header.len == 0 {
        return Ok(vec![]);
    }

    if let Some(ref inline) = header.inline_values {
        return parse_inline_values(inline, header.delimiter, line_idx + 1);
    }

    // Tabular rows: one comma-separated line per element below the header.
    if let Some(ref fields) = header.fields {
        let mut rows = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(line_idx + 1) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = count_indent(line);
            if indent <= base_indent && i > line_idx + 1 {
                break;
            }
            rows.push(parse_tabular_row(trimmed, fields, header.delimiter, i + 1)?);
        }
        return Ok(rows);
    }

    // Expanded list: auto-detect the indent of the first "- " marker rather
    // than assuming a fixed offset.
    let mut item_indent = base_indent + 2;
    for line in &lines[line_idx + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("- ") {
            item_indent = count_indent(line);
        }
        break;
    }
    parse_list_items(lines, line_idx + 1, item_indent)
}

/// Parse delimiter-separated scalar values, honoring quoted cells.
fn parse_inline_values(s: &str, delimiter: char, line: usize) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            let end = find_closing_quote(s, i + 1)
                .ok_or_else(|| toon_error(line, "Unterminated quoted string in inline array"))?;
            values.push(Value::String(unescape_string(&s[i + 1..end])));
            i = end + 1;
        } else {
            let end = s[i..]
                .find(delimiter)
                .map(|p| p + i)
                .unwrap_or(s.len());
            values.push(parse_primitive_token(&s[i..end]));
            i = end;
        }
        if i < bytes.len() && s[i..].starts_with(delimiter) {
            i += delimiter.len_utf8();
        }
    }

    Ok(values)
}

/// A tabular row maps its delimiter-separated cells onto the header's field
/// names; short rows pad with null.
fn parse_tabular_row(row: &str, fields: &[String], delimiter: char, line: usize) -> Result<Value> {
    let cells = parse_inline_values(row, delimiter, line)?;
    let mut map = BTreeMap::new();
    for (i, field) in fields.iter().enumerate() {
        map.insert(field.clone(), cells.get(i).cloned().unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}

/// Parse `- item` lines at `item_indent`. Lines deeper belong to the
/// current item; shallower lines (or non-`- ` lines at the item indent)
/// terminate the list.
fn parse_list_items(lines: &[&str], start_line: usize, item_indent: usize) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut i = start_line;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        let indent = count_indent(line);
        if indent < item_indent {
            break;
        }
        if indent > item_indent {
            i += 1;
            continue;
        }
        if !trimmed.starts_with("- ") {
            break;
        }

        let content = &trimmed[2..];

        // Nested array as list item
        if content.starts_with('[') {
            if let Some(header) = parse_array_header(content) {
                items.push(parse_array_body(&header, lines, i, indent + 2)?);
                i = skip_nested_lines(lines, i + 1, indent + 2);
                continue;
            }
        }

        // Object list item: first field on the hyphen line itself
        if item_content_is_object(content) {
            let (obj, next_i) = parse_list_item_object(lines, i, indent + 2, content)?;
            items.push(obj);
            i = next_i;
            continue;
        }

        items.push(parse_primitive_token(content));
        i += 1;
    }

    Ok(items)
}

/// Does the content after `- ` look like an object field (`key:` or
/// `key[N]`)?
fn item_content_is_object(content: &str) -> bool {
    if content.starts_with('"') {
        if let Some(end) = find_closing_quote(content, 1) {
            return content.as_bytes().get(end + 1) == Some(&b':');
        }
        return false;
    }
    for terminator in [':', '['] {
        if let Some(pos) = content.find(terminator) {
            let before = &content[..pos];
            if !before.contains(' ') && !before.is_empty() {
                return true;
            }
        }
    }
    false
}

/// Parse an object whose first field sits on the `- ` line; sibling fields
/// follow at the indent of the hyphen content. Returns the object and the
/// next line index after it.
fn parse_list_item_object(
    lines: &[&str],
    start_line: usize,
    content_indent: usize,
    first_field: &str,
) -> Result<(Value, usize)> {
    let mut map = BTreeMap::new();
    let mut i = parse_key_value_into_map(first_field, &mut map, lines, start_line, content_indent)?;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if count_indent(line) != content_indent {
            break;
        }
        if !line_has_key_colon(trimmed) && !trimmed.contains('[') {
            break;
        }
        i = parse_key_value_into_map(trimmed, &mut map, lines, i, content_indent)?;
    }

    Ok((Value::Object(map), i))
}

/// Skip past an array body. Distinct from [`skip_nested_lines`] because a
/// line at the list-item indent that does not start with `- ` is a sibling
/// field, not array content.
fn skip_array_body(lines: &[&str], start: usize, base_indent: usize) -> usize {
    let mut body_indent = base_indent + 2;
    let mut is_list = false;
    for line in &lines[start..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        body_indent = count_indent(line);
        is_list = trimmed.starts_with("- ");
        break;
    }

    if !is_list {
        return skip_nested_lines(lines, start, body_indent);
    }

    let mut i = start;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        let indent = count_indent(line);
        if indent < body_indent {
            break;
        }
        if indent == body_indent && !trimmed.starts_with("- ") {
            break;
        }
        i += 1;
    }
    i
}

/// Skip lines at or deeper than `base_indent`.
fn skip_nested_lines(lines: &[&str], start: usize, base_indent: usize) -> usize {
    let mut i = start;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if count_indent(lines[i]) < base_indent {
            break;
        }
        i += 1;
    }
    i
}

/// Parse one `key...` line into `map` and return the next line index after
/// its content (including any array body or nested object lines).
fn parse_key_value_into_map(
    content: &str,
    map: &mut BTreeMap<String, Value>,
    lines: &[&str],
    line_idx: usize,
    base_indent: usize,
) -> Result<usize> {
    let (key, rest) = parse_key_from_content(content, line_idx + 1)?;

    // Array field: key[N]...
    if rest.starts_with('[') {
        if let Some(header) = parse_array_header(&rest) {
            let skip_body = header.inline_values.is_none() && header.len != 0;
            let arr = parse_array_body(&header, lines, line_idx, base_indent)?;
            map.insert(key, arr);
            if skip_body {
                return Ok(skip_array_body(lines, line_idx + 1, base_indent));
            }
            return Ok(line_idx + 1);
        }
    }

    if rest == ":" {
        // Empty object, or a nested object with children on deeper lines.
        let child_indent = base_indent + 2;
        if let Some(next_line) = lines.get(line_idx + 1) {
            if count_indent(next_line) >= child_indent && !next_line.trim().is_empty() {
                let end = find_block_end(lines, line_idx + 1, child_indent);
                let obj = parse_object_from_lines(lines, child_indent, line_idx + 1, end)?;
                map.insert(key, obj);
                return Ok(end);
            }
        }
        map.insert(key, Value::Object(BTreeMap::new()));
    } else if let Some(value_str) = rest.strip_prefix(": ") {
        map.insert(key, parse_primitive_token(value_str));
    } else {
        return Err(toon_error(
            line_idx + 1,
            format!("Malformed field line: '{}'", content),
        ));
    }

    Ok(line_idx + 1)
}

/// Split `key: ...` / `key[N]...` content into the key and the remainder.
/// For unquoted keys the earliest of `:` or `[` terminates the key, so
/// `items[2]:` parses as key `items`.
fn parse_key_from_content(content: &str, line: usize) -> Result<(String, String)> {
    if content.starts_with('"') {
        let end = find_closing_quote(content, 1)
            .ok_or_else(|| toon_error(line, "Unterminated quoted key"))?;
        let key = unescape_string(&content[1..end]);
        Ok((key, content[end + 1..].to_string()))
    } else {
        let colon = content.find(':');
        let bracket = content.find('[');
        let end = match (colon, bracket) {
            (Some(c), Some(b)) => c.min(b),
            (Some(c), None) => c,
            (None, Some(b)) => b,
            (None, None) => content.len(),
        };
        Ok((content[..end].to_string(), content[end..].to_string()))
    }
}

/// Parse an object from the lines in `[start, end)` at `expected_indent`.
fn parse_object_from_lines(
    lines: &[&str],
    expected_indent: usize,
    start: usize,
    end: usize,
) -> Result<Value> {
    let mut map = BTreeMap::new();
    let mut i = start;

    while i < end {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        let indent = count_indent(line);
        if indent < expected_indent {
            break;
        }
        if indent > expected_indent {
            // Child line of a previous key, already consumed.
            i += 1;
            continue;
        }
        i = parse_key_value_into_map(trimmed, &mut map, lines, i, indent)?;
    }

    Ok(Value::Object(map))
}

/// Find the end of a block at the given minimum indent.
fn find_block_end(lines: &[&str], start: usize, min_indent: usize) -> usize {
    let mut i = start;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if count_indent(lines[i]) < min_indent {
            break;
        }
        i += 1;
    }
    i
}

/// Type inference for an unquoted or quoted scalar token: quoted string →
/// null → bool → number → unquoted string. The encoder quotes any string
/// that would otherwise be read back as a different type.
fn parse_primitive_token(s: &str) -> Value {
    let s = s.trim();

    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return Value::String(unescape_string(&s[1..s.len() - 1]));
    }
    match s {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = s.parse::<f64>() {
        if n.is_finite() {
            return Value::Number(n);
        }
    }
    Value::String(s.to_string())
}

/// Leading spaces of a line.
fn count_indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Position of the closing quote, skipping escaped characters.
fn find_closing_quote(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Resolve the escape set `\n \t \r \\ \" \/` inside a quoted key or value.
fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
