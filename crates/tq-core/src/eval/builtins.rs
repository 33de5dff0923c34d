//! Value-parameterised operators.
//!
//! Every operator here receives the current input as an implicit first
//! argument plus its declared arguments already evaluated to value lists.
//! The registry is a single const dispatch match; any name that neither
//! this table nor the datetime table knows is an unknown-function error at
//! the call site.

use std::collections::BTreeMap;

use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};

/// Dispatch a value-parameterised operator, or `None` when `name` is not in
/// this registry.
pub(super) fn call(
    name: &str,
    input: &Value,
    args: &[Vec<Value>],
) -> Option<EvalResult<Vec<Value>>> {
    let result = match name {
        // Introspection & basic
        "type" => Ok(vec![Value::String(input.type_name().to_string())]),
        "length" => length(input),
        "keys" | "keys_unsorted" => keys(input),
        "values" => values(input),
        "has" => has(input, args),
        "empty" => Ok(vec![]),
        "error" => error(input, args),
        "debug" => debug(input),

        // Conversion
        "tostring" => Ok(vec![Value::String(stringify(input))]),
        "tonumber" => tonumber(input),
        "to_array" => to_array(input),
        "to_object" => to_object(input),
        "to_entries" => to_entries(input),
        "from_entries" => from_entries(input),

        // Math
        "floor" => math1(input, "floor", f64::floor),
        "ceil" => math1(input, "ceil", f64::ceil),
        "round" => math1(input, "round", f64::round),
        "abs" => math1(input, "abs", f64::abs),
        "sqrt" => sqrt(input),
        "pow" => pow(args),
        "log" => checked_math1(input, "log", f64::ln, |n| n > 0.0),
        "log10" => checked_math1(input, "log10", f64::log10, |n| n > 0.0),
        "log2" => checked_math1(input, "log2", f64::log2, |n| n > 0.0),
        "exp" => math1(input, "exp", f64::exp),
        "exp10" => math1(input, "exp10", |n| 10f64.powf(n)),
        "exp2" => math1(input, "exp2", f64::exp2),
        "sin" => math1(input, "sin", f64::sin),
        "cos" => math1(input, "cos", f64::cos),
        "tan" => math1(input, "tan", f64::tan),
        "asin" => checked_math1(input, "asin", f64::asin, |n| (-1.0..=1.0).contains(&n)),
        "acos" => checked_math1(input, "acos", f64::acos, |n| (-1.0..=1.0).contains(&n)),
        "atan" => math1(input, "atan", f64::atan),

        // Strings
        "split" => split(input, args),
        "join" => join(input, args),
        "startswith" => string_predicate(input, args, "startswith", |s, n| s.starts_with(n)),
        "endswith" => string_predicate(input, args, "endswith", |s, n| s.ends_with(n)),
        "ltrimstr" => trimstr(input, args, true),
        "rtrimstr" => trimstr(input, args, false),
        "ascii_downcase" => ascii_case(input, "ascii_downcase", str::to_ascii_lowercase),
        "ascii_upcase" => ascii_case(input, "ascii_upcase", str::to_ascii_uppercase),
        "explode" => explode(input),
        "implode" => implode(input),
        "ascii" => ascii(input),

        // Collections
        "add" => add(input),
        "sort" => sort(input),
        "reverse" => reverse(input),
        "unique" => unique(input),
        "min" => extreme(input, true),
        "max" => extreme(input, false),
        "min_by_value" => extreme_by_value(input, args, true),
        "max_by_value" => extreme_by_value(input, args, false),
        "first" => element_at(input, "first", |_| Some(0)),
        "last" => element_at(input, "last", |len| len.checked_sub(1)),
        "nth" => nth(input, args),
        "range" => range(args),
        "flatten" => flatten(input, args),
        "transpose" => transpose(input),
        "contains" => containment(input, args, false),
        "inside" => containment(input, args, true),
        "index" => occurrences(input, args, Occurrence::First),
        "rindex" => occurrences(input, args, Occurrence::Last),
        "indices" => occurrences(input, args, Occurrence::All),
        "combinations" => combinations(input),

        // Recursion
        "paths" => paths(input, false),
        "leaf_paths" => paths(input, true),

        // Type filters
        "numbers" => type_filter(input, matches!(input, Value::Number(_))),
        "strings" => type_filter(input, matches!(input, Value::String(_))),
        "arrays" => type_filter(input, matches!(input, Value::Array(_))),
        "objects" => type_filter(input, matches!(input, Value::Object(_))),
        "nulls" => type_filter(input, matches!(input, Value::Null)),
        "booleans" => type_filter(input, matches!(input, Value::Bool(_))),
        "scalars" => type_filter(input, !matches!(input, Value::Array(_) | Value::Object(_))),
        "iterables" => type_filter(input, matches!(input, Value::Array(_) | Value::Object(_))),

        // SQL-style membership lookup
        "IN" => membership(args),

        _ => return None,
    };
    Some(result)
}

// ----------------------------------------------------------------------
// Argument plumbing
// ----------------------------------------------------------------------

fn arg<'a>(args: &'a [Vec<Value>], index: usize, name: &str) -> EvalResult<&'a Value> {
    args.get(index)
        .and_then(|stream| stream.first())
        .ok_or_else(|| EvalError::new(format!("{} is missing argument {}", name, index + 1)))
}

fn number_arg(args: &[Vec<Value>], index: usize, name: &str) -> EvalResult<f64> {
    match arg(args, index, name)? {
        Value::Number(n) => Ok(*n),
        other => Err(EvalError::new(format!(
            "{} expects a number argument, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn string_arg<'a>(args: &'a [Vec<Value>], index: usize, name: &str) -> EvalResult<&'a str> {
    match arg(args, index, name)? {
        Value::String(s) => Ok(s),
        other => Err(EvalError::new(format!(
            "{} expects a string argument, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn type_error(name: &str, input: &Value) -> EvalError {
    EvalError::new(format!("{} cannot be applied to {}", name, input.type_name()))
}

// ----------------------------------------------------------------------
// Introspection & basic
// ----------------------------------------------------------------------

fn length(input: &Value) -> EvalResult<Vec<Value>> {
    let len = match input {
        Value::Null => 0,
        Value::String(s) => s.len(),
        Value::Array(arr) => arr.len(),
        Value::Object(map) => map.len(),
        _ => return Err(type_error("length", input)),
    };
    Ok(vec![Value::Number(len as f64)])
}

fn keys(input: &Value) -> EvalResult<Vec<Value>> {
    match input {
        Value::Object(map) => Ok(vec![Value::Array(
            map.keys().map(|k| Value::String(k.clone())).collect(),
        )]),
        Value::Array(arr) => Ok(vec![Value::Array(
            (0..arr.len()).map(|i| Value::Number(i as f64)).collect(),
        )]),
        _ => Err(type_error("keys", input)),
    }
}

fn values(input: &Value) -> EvalResult<Vec<Value>> {
    match input {
        Value::Object(map) => Ok(map.values().cloned().collect()),
        Value::Array(arr) => Ok(arr.clone()),
        _ => Err(type_error("values", input)),
    }
}

fn has(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    match (input, arg(args, 0, "has")?) {
        (Value::Object(map), Value::String(key)) => Ok(vec![Value::Bool(map.contains_key(key))]),
        (Value::Array(arr), Value::Number(n)) => {
            // Negative indices wrap once before the bounds check.
            let len = arr.len() as i64;
            let idx = *n as i64;
            let idx = if idx < 0 { len + idx } else { idx };
            Ok(vec![Value::Bool((0..len).contains(&idx))])
        }
        (_, key) => Err(EvalError::new(format!(
            "has({}) cannot be applied to {}",
            key.type_name(),
            input.type_name()
        ))),
    }
}

fn error(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let message = match args.first().and_then(|stream| stream.first()) {
        Some(value) => stringify(value),
        None => stringify(input),
    };
    Err(EvalError::new(message))
}

fn debug(input: &Value) -> EvalResult<Vec<Value>> {
    eprintln!("DEBUG: {}", input.to_toon());
    Ok(vec![input.clone()])
}

// ----------------------------------------------------------------------
// Conversion
// ----------------------------------------------------------------------

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_toon(),
    }
}

fn tonumber(input: &Value) -> EvalResult<Vec<Value>> {
    match input {
        Value::Number(_) => Ok(vec![input.clone()]),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(|n| vec![Value::Number(n)])
            .map_err(|_| EvalError::new(format!("Cannot parse '{}' as a number", s))),
        _ => Err(type_error("tonumber", input)),
    }
}

fn to_array(input: &Value) -> EvalResult<Vec<Value>> {
    let arr = match input {
        Value::Array(_) => return Ok(vec![input.clone()]),
        Value::Object(map) => map.values().cloned().collect(),
        other => vec![other.clone()],
    };
    Ok(vec![Value::Array(arr)])
}

fn to_object(input: &Value) -> EvalResult<Vec<Value>> {
    match input {
        Value::Object(_) => Ok(vec![input.clone()]),
        Value::Array(_) => from_entries(input),
        _ => Err(type_error("to_object", input)),
    }
}

fn to_entries(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Object(map) = input else {
        return Err(type_error("to_entries", input));
    };
    let entries = map
        .iter()
        .map(|(key, value)| {
            let mut entry = BTreeMap::new();
            entry.insert("key".to_string(), Value::String(key.clone()));
            entry.insert("value".to_string(), value.clone());
            Value::Object(entry)
        })
        .collect();
    Ok(vec![Value::Array(entries)])
}

fn from_entries(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Err(type_error("from_entries", input));
    };
    let mut map = BTreeMap::new();
    for entry in arr {
        let (key, value) = match entry {
            Value::Object(fields) => {
                let key = fields
                    .get("key")
                    .or_else(|| fields.get("k"))
                    .or_else(|| fields.get("name"))
                    .ok_or_else(|| EvalError::new("from_entries entry has no key"))?;
                let value = fields
                    .get("value")
                    .or_else(|| fields.get("v"))
                    .cloned()
                    .unwrap_or(Value::Null);
                (key.clone(), value)
            }
            Value::Array(pair) if pair.len() == 2 => (pair[0].clone(), pair[1].clone()),
            other => {
                return Err(EvalError::new(format!(
                    "from_entries cannot use {} as an entry",
                    other.type_name()
                )))
            }
        };
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => format_number(n),
            other => {
                return Err(EvalError::new(format!(
                    "from_entries key must be a string, got {}",
                    other.type_name()
                )))
            }
        };
        map.insert(key, value);
    }
    Ok(vec![Value::Object(map)])
}

// ----------------------------------------------------------------------
// Math
// ----------------------------------------------------------------------

fn number_input(input: &Value, name: &str) -> EvalResult<f64> {
    input
        .as_f64()
        .ok_or_else(|| type_error(name, input))
}

fn math1(input: &Value, name: &str, f: impl Fn(f64) -> f64) -> EvalResult<Vec<Value>> {
    let n = number_input(input, name)?;
    Ok(vec![Value::Number(f(n))])
}

fn checked_math1(
    input: &Value,
    name: &str,
    f: impl Fn(f64) -> f64,
    domain: impl Fn(f64) -> bool,
) -> EvalResult<Vec<Value>> {
    let n = number_input(input, name)?;
    if !domain(n) {
        return Err(EvalError::new(format!("{} of {} is out of domain", name, format_number(n))));
    }
    Ok(vec![Value::Number(f(n))])
}

fn sqrt(input: &Value) -> EvalResult<Vec<Value>> {
    checked_math1(input, "sqrt", f64::sqrt, |n| n >= 0.0)
}

fn pow(args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let base = number_arg(args, 0, "pow")?;
    let exponent = number_arg(args, 1, "pow")?;
    Ok(vec![Value::Number(base.powf(exponent))])
}

// ----------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------

fn split(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let Value::String(s) = input else {
        return Err(type_error("split", input));
    };
    let separator = string_arg(args, 0, "split")?;
    if separator.is_empty() {
        return Err(EvalError::new("split separator must be non-empty"));
    }
    Ok(vec![Value::Array(
        s.split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    )])
}

fn join(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Err(type_error("join", input));
    };
    let separator = string_arg(args, 0, "join")?;
    let mut parts = Vec::with_capacity(arr.len());
    for element in arr {
        let part = match element {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(EvalError::new(format!(
                    "Cannot join {} elements",
                    other.type_name()
                )))
            }
        };
        parts.push(part);
    }
    Ok(vec![Value::String(parts.join(separator))])
}

fn string_predicate(
    input: &Value,
    args: &[Vec<Value>],
    name: &str,
    test: impl Fn(&str, &str) -> bool,
) -> EvalResult<Vec<Value>> {
    let Value::String(s) = input else {
        return Err(type_error(name, input));
    };
    let needle = string_arg(args, 0, name)?;
    Ok(vec![Value::Bool(test(s, needle))])
}

/// `ltrimstr`/`rtrimstr` pass the input through unchanged on any type
/// mismatch or non-matching prefix/suffix.
fn trimstr(input: &Value, args: &[Vec<Value>], left: bool) -> EvalResult<Vec<Value>> {
    let name = if left { "ltrimstr" } else { "rtrimstr" };
    let (Value::String(s), Value::String(fix)) = (input, arg(args, 0, name)?) else {
        return Ok(vec![input.clone()]);
    };
    let trimmed = if left {
        s.strip_prefix(fix.as_str())
    } else {
        s.strip_suffix(fix.as_str())
    };
    Ok(vec![match trimmed {
        Some(rest) => Value::String(rest.to_string()),
        None => input.clone(),
    }])
}

fn ascii_case(input: &Value, name: &str, f: impl Fn(&str) -> String) -> EvalResult<Vec<Value>> {
    match input {
        Value::String(s) => Ok(vec![Value::String(f(s))]),
        _ => Err(type_error(name, input)),
    }
}

fn explode(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::String(s) = input else {
        return Err(type_error("explode", input));
    };
    Ok(vec![Value::Array(
        s.bytes().map(|b| Value::Number(b as f64)).collect(),
    )])
}

fn implode(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Err(type_error("implode", input));
    };
    let mut bytes = Vec::with_capacity(arr.len());
    for element in arr {
        match element {
            Value::Number(n) if n.fract() == 0.0 && (0.0..=255.0).contains(n) => {
                bytes.push(*n as u8);
            }
            other => {
                return Err(EvalError::new(format!(
                    "implode expects byte values, got {}",
                    other.to_toon()
                )))
            }
        }
    }
    String::from_utf8(bytes)
        .map(|s| vec![Value::String(s)])
        .map_err(|_| EvalError::new("implode produced an invalid byte sequence"))
}

fn ascii(input: &Value) -> EvalResult<Vec<Value>> {
    match input {
        Value::Number(n) if n.fract() == 0.0 && (0.0..=127.0).contains(n) => {
            Ok(vec![Value::String((*n as u8 as char).to_string())])
        }
        _ => Err(EvalError::new("ascii expects a code point in 0..=127")),
    }
}

// ----------------------------------------------------------------------
// Collections
// ----------------------------------------------------------------------

/// Sums numbers, concatenates strings or arrays, dispatching on the first
/// element's type and skipping elements of any other type. Empty arrays add
/// to null; non-array inputs pass through.
fn add(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Ok(vec![input.clone()]);
    };
    let Some(first) = arr.first() else {
        return Ok(vec![Value::Null]);
    };
    let total = match first {
        Value::Number(_) => Value::Number(
            arr.iter()
                .filter_map(Value::as_f64)
                .sum(),
        ),
        Value::String(_) => Value::String(
            arr.iter()
                .filter_map(Value::as_str)
                .collect(),
        ),
        Value::Array(_) => Value::Array(
            arr.iter()
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect(),
        ),
        _ => Value::Null,
    };
    Ok(vec![total])
}

fn sort(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Ok(vec![input.clone()]);
    };
    let mut sorted = arr.clone();
    sorted.sort_by(Value::compare);
    Ok(vec![Value::Array(sorted)])
}

fn reverse(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Ok(vec![input.clone()]);
    };
    let mut reversed = arr.clone();
    reversed.reverse();
    Ok(vec![Value::Array(reversed)])
}

/// Sorted-unique, not order-preserving-unique.
fn unique(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Ok(vec![input.clone()]);
    };
    let mut sorted = arr.clone();
    sorted.sort_by(Value::compare);
    sorted.dedup();
    Ok(vec![Value::Array(sorted)])
}

fn extreme(input: &Value, minimum: bool) -> EvalResult<Vec<Value>> {
    let Some(arr) = input.as_array() else {
        return Ok(vec![Value::Null]);
    };
    let best = arr.iter().fold(None::<&Value>, |best, candidate| {
        match best {
            None => Some(candidate),
            Some(current) => {
                let replaces = if minimum {
                    candidate.compare(current).is_lt()
                } else {
                    candidate.compare(current).is_gt()
                };
                if replaces {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        }
    });
    Ok(vec![best.cloned().unwrap_or(Value::Null)])
}

/// `min_by_value(k)` / `max_by_value(k)`: extremal element of an array of
/// objects by the value at field `k` (missing keys compare as null).
fn extreme_by_value(input: &Value, args: &[Vec<Value>], minimum: bool) -> EvalResult<Vec<Value>> {
    let name = if minimum { "min_by_value" } else { "max_by_value" };
    let key = string_arg(args, 0, name)?;
    let Some(arr) = input.as_array() else {
        return Ok(vec![Value::Null]);
    };

    let key_of = |element: &Value| -> Value {
        element
            .as_object()
            .and_then(|map| map.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut best: Option<(Value, &Value)> = None;
    for element in arr {
        let candidate_key = key_of(element);
        let replaces = match &best {
            None => true,
            Some((best_key, _)) => {
                if minimum {
                    candidate_key.compare(best_key).is_lt()
                } else {
                    candidate_key.compare(best_key).is_gt()
                }
            }
        };
        if replaces {
            best = Some((candidate_key, element));
        }
    }
    Ok(vec![best.map(|(_, v)| v.clone()).unwrap_or(Value::Null)])
}

fn element_at(
    input: &Value,
    name: &str,
    pick: impl Fn(usize) -> Option<usize>,
) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Err(type_error(name, input));
    };
    let element = pick(arr.len())
        .and_then(|i| arr.get(i))
        .cloned()
        .unwrap_or(Value::Null);
    Ok(vec![element])
}

fn nth(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let n = number_arg(args, 0, "nth")?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(EvalError::new("nth expects a non-negative integer"));
    }
    element_at(input, "nth", |_| Some(n as usize))
}

/// `range(n)` / `range(lo;hi)` — emits a stream of numbers stepping by 1.
fn range(args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let (lo, hi) = match args.len() {
        1 => (0.0, number_arg(args, 0, "range")?),
        2 => (number_arg(args, 0, "range")?, number_arg(args, 1, "range")?),
        n => {
            return Err(EvalError::new(format!(
                "range expects 1 or 2 arguments, got {}",
                n
            )))
        }
    };
    let mut out = Vec::new();
    let mut current = lo;
    while current < hi {
        out.push(Value::Number(current));
        current += 1.0;
    }
    Ok(out)
}

fn flatten(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = input else {
        return Err(type_error("flatten", input));
    };
    let depth = match args.len() {
        0 => u32::MAX,
        1 => {
            let n = number_arg(args, 0, "flatten")?;
            if n < 0.0 || n.fract() != 0.0 {
                return Err(EvalError::new("flatten depth must be a non-negative integer"));
            }
            n as u32
        }
        n => {
            return Err(EvalError::new(format!(
                "flatten expects 0 or 1 arguments, got {}",
                n
            )))
        }
    };

    fn flatten_into(arr: &[Value], depth: u32, out: &mut Vec<Value>) {
        for element in arr {
            match element {
                Value::Array(inner) if depth > 0 => flatten_into(inner, depth - 1, out),
                other => out.push(other.clone()),
            }
        }
    }

    let mut out = Vec::new();
    flatten_into(arr, depth, &mut out);
    Ok(vec![Value::Array(out)])
}

fn transpose(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(rows) = input else {
        return Err(type_error("transpose", input));
    };
    let mut width = 0;
    for row in rows {
        let Value::Array(cells) = row else {
            return Err(EvalError::new("transpose requires an array of arrays"));
        };
        width = width.max(cells.len());
    }
    let mut out = Vec::with_capacity(width);
    for column in 0..width {
        let cells = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .and_then(|cells| cells.get(column))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect();
        out.push(Value::Array(cells));
    }
    Ok(vec![Value::Array(out)])
}

/// Structural containment: strings by substring, arrays element-wise,
/// objects key-wise, scalars by equality.
fn value_contains(haystack: &Value, needle: &Value) -> EvalResult<bool> {
    match (haystack, needle) {
        (Value::String(a), Value::String(b)) => Ok(a.contains(b.as_str())),
        (Value::Array(a), Value::Array(b)) => {
            for inner in b {
                let mut found = false;
                for outer in a {
                    if value_contains(outer, inner)? {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Object(a), Value::Object(b)) => {
            for (key, inner) in b {
                match a.get(key) {
                    Some(outer) if value_contains(outer, inner)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (a, b) if a.type_name() == b.type_name() => Ok(a == b),
        (a, b) => Err(EvalError::new(format!(
            "Cannot check if {} contains {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn containment(input: &Value, args: &[Vec<Value>], inverted: bool) -> EvalResult<Vec<Value>> {
    let name = if inverted { "inside" } else { "contains" };
    let other = arg(args, 0, name)?;
    let held = if inverted {
        value_contains(other, input)?
    } else {
        value_contains(input, other)?
    };
    Ok(vec![Value::Bool(held)])
}

enum Occurrence {
    First,
    Last,
    All,
}

fn occurrences(input: &Value, args: &[Vec<Value>], which: Occurrence) -> EvalResult<Vec<Value>> {
    let name = match which {
        Occurrence::First => "index",
        Occurrence::Last => "rindex",
        Occurrence::All => "indices",
    };
    let needle = arg(args, 0, name)?;

    let positions: Vec<usize> = match (input, needle) {
        (Value::String(s), Value::String(sub)) => {
            if sub.is_empty() {
                vec![]
            } else {
                s.match_indices(sub.as_str()).map(|(i, _)| i).collect()
            }
        }
        (Value::Array(arr), Value::Array(sub)) => {
            if sub.is_empty() || sub.len() > arr.len() {
                vec![]
            } else {
                (0..=arr.len() - sub.len())
                    .filter(|&i| arr[i..i + sub.len()] == sub[..])
                    .collect()
            }
        }
        (Value::Array(arr), single) => arr
            .iter()
            .enumerate()
            .filter(|(_, element)| *element == single)
            .map(|(i, _)| i)
            .collect(),
        _ => return Err(type_error(name, input)),
    };

    let result = match which {
        Occurrence::First => positions
            .first()
            .map(|&i| Value::Number(i as f64))
            .unwrap_or(Value::Null),
        Occurrence::Last => positions
            .last()
            .map(|&i| Value::Number(i as f64))
            .unwrap_or(Value::Null),
        Occurrence::All => {
            Value::Array(positions.into_iter().map(|i| Value::Number(i as f64)).collect())
        }
    };
    Ok(vec![result])
}

/// Cartesian product of an array of arrays, emitted as a stream.
fn combinations(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Array(axes) = input else {
        return Err(type_error("combinations", input));
    };
    let mut lists = Vec::with_capacity(axes.len());
    for axis in axes {
        let Value::Array(options) = axis else {
            return Err(EvalError::new("combinations requires an array of arrays"));
        };
        lists.push(options);
    }

    let mut out = vec![Vec::new()];
    for options in lists {
        let mut next = Vec::with_capacity(out.len() * options.len());
        for prefix in &out {
            for option in options {
                let mut extended = prefix.clone();
                extended.push(option.clone());
                next.push(extended);
            }
        }
        out = next;
    }
    Ok(out.into_iter().map(Value::Array).collect())
}

// ----------------------------------------------------------------------
// Recursion
// ----------------------------------------------------------------------

/// Every non-root path in pre-order. With `leaves_only`, keeps only paths
/// whose target is a scalar or an empty container.
fn paths(input: &Value, leaves_only: bool) -> EvalResult<Vec<Value>> {
    fn is_leaf(value: &Value) -> bool {
        match value {
            Value::Array(arr) => arr.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => true,
        }
    }

    fn collect(value: &Value, prefix: &[Value], leaves_only: bool, out: &mut Vec<Value>) {
        let children: Vec<(Value, &Value)> = match value {
            Value::Array(arr) => arr
                .iter()
                .enumerate()
                .map(|(i, child)| (Value::Number(i as f64), child))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(key, child)| (Value::String(key.clone()), child))
                .collect(),
            _ => return,
        };
        for (step, child) in children {
            let mut path = prefix.to_vec();
            path.push(step);
            if !leaves_only || is_leaf(child) {
                out.push(Value::Array(path.clone()));
            }
            collect(child, &path, leaves_only, out);
        }
    }

    let mut out = Vec::new();
    collect(input, &[], leaves_only, &mut out);
    Ok(out)
}

// ----------------------------------------------------------------------
// Type filters & membership
// ----------------------------------------------------------------------

fn type_filter(input: &Value, keep: bool) -> EvalResult<Vec<Value>> {
    if keep {
        Ok(vec![input.clone()])
    } else {
        Ok(vec![])
    }
}

/// `IN(arr)` — membership lookup object keyed by each element's canonical
/// TOON serialization.
fn membership(args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let Value::Array(arr) = arg(args, 0, "IN")? else {
        return Err(EvalError::new("IN expects an array argument"));
    };
    let map: BTreeMap<String, Value> = arr
        .iter()
        .map(|element| (element.to_toon(), Value::Bool(true)))
        .collect();
    Ok(vec![Value::Object(map)])
}
