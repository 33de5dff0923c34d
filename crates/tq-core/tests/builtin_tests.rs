use serde_json::json;
use tq_core::json::from_json;
use tq_core::query_values;

fn run(expr: &str, input: serde_json::Value) -> Vec<serde_json::Value> {
    let results = query_values(expr, &from_json(&input)).unwrap();
    results.iter().map(tq_core::json::to_json).collect()
}

fn run_one(expr: &str, input: serde_json::Value) -> serde_json::Value {
    let mut results = run(expr, input);
    assert_eq!(results.len(), 1, "expected exactly one result");
    results.remove(0)
}

fn run_err(expr: &str, input: serde_json::Value) -> String {
    match query_values(expr, &from_json(&input)) {
        Err(e) => e.to_string(),
        Ok(v) => panic!("expected evaluation error, got {:?}", v),
    }
}

// ============================================================================
// Introspection
// ============================================================================

#[test]
fn type_names() {
    assert_eq!(run_one("type", json!(null)), json!("null"));
    assert_eq!(run_one("type", json!(true)), json!("boolean"));
    assert_eq!(run_one("type", json!(1)), json!("number"));
    assert_eq!(run_one("type", json!("x")), json!("string"));
    assert_eq!(run_one("type", json!([])), json!("array"));
    assert_eq!(run_one("type", json!({})), json!("object"));
}

#[test]
fn length_by_type() {
    assert_eq!(run_one("length", json!([1, 2, 3])), json!(3.0));
    assert_eq!(run_one("length", json!({"a": 1, "b": 2})), json!(2.0));
    assert_eq!(run_one("length", json!("hello")), json!(5.0));
    assert_eq!(run_one("length", json!(null)), json!(0.0));
    assert!(run_err("length", json!(true)).contains("length"));
}

#[test]
fn keys_are_sorted() {
    assert_eq!(
        run_one("keys", json!({"b": 1, "a": 2, "c": 3})),
        json!(["a", "b", "c"])
    );
    assert_eq!(
        run_one("keys_unsorted", json!({"b": 1, "a": 2})),
        json!(["a", "b"])
    );
}

#[test]
fn keys_of_array_are_indices() {
    assert_eq!(run_one("keys", json!(["x", "y"])), json!([0.0, 1.0]));
}

#[test]
fn keys_on_scalar_fails() {
    assert!(run_err("keys", json!(5)).contains("keys"));
}

#[test]
fn values_streams_container_contents() {
    assert_eq!(
        run("values", json!({"b": 2, "a": 1})),
        vec![json!(1.0), json!(2.0)]
    );
    assert_eq!(run("values", json!([1, 2])), vec![json!(1.0), json!(2.0)]);
}

#[test]
fn has_key_and_index() {
    assert_eq!(run_one("has(\"a\")", json!({"a": 1})), json!(true));
    assert_eq!(run_one("has(\"z\")", json!({"a": 1})), json!(false));
    assert_eq!(run_one("has(1)", json!([10, 20])), json!(true));
    assert_eq!(run_one("has(2)", json!([10, 20])), json!(false));
    // Negative indices wrap once before the bounds check.
    assert_eq!(run_one("has(-1)", json!([10, 20])), json!(true));
    assert_eq!(run_one("has(-3)", json!([10, 20])), json!(false));
}

#[test]
fn debug_passes_input_through() {
    assert_eq!(run_one("debug", json!({"a": 1})), json!({"a": 1.0}));
}

// ============================================================================
// Conversion
// ============================================================================

#[test]
fn tostring_scalars_and_containers() {
    assert_eq!(run_one("tostring", json!("s")), json!("s"));
    assert_eq!(run_one("tostring", json!(3.0)), json!("3"));
    assert_eq!(run_one("tostring", json!(2.5)), json!("2.5"));
    assert_eq!(run_one("tostring", json!(null)), json!("null"));
    assert_eq!(run_one("tostring", json!([1, 2])), json!("[2]: 1,2"));
}

#[test]
fn tonumber_parses_strings() {
    assert_eq!(run_one("tonumber", json!("42")), json!(42.0));
    assert_eq!(run_one("tonumber", json!(" 2.5 ")), json!(2.5));
    assert_eq!(run_one("tonumber", json!(7)), json!(7.0));
    assert!(run_err("tonumber", json!("abc")).contains("abc"));
}

#[test]
fn to_array_wraps_and_unwraps() {
    assert_eq!(run_one("to_array", json!([1])), json!([1.0]));
    assert_eq!(run_one("to_array", json!({"b": 2, "a": 1})), json!([1.0, 2.0]));
    assert_eq!(run_one("to_array", json!(5)), json!([5.0]));
}

#[test]
fn to_entries_in_key_order() {
    assert_eq!(
        run_one("to_entries", json!({"b": 2, "a": 1})),
        json!([
            {"key": "a", "value": 1.0},
            {"key": "b", "value": 2.0},
        ])
    );
}

#[test]
fn from_entries_accepts_aliases_and_pairs() {
    assert_eq!(
        run_one("from_entries", json!([{"key": "a", "value": 1}])),
        json!({"a": 1.0})
    );
    assert_eq!(
        run_one("from_entries", json!([{"k": "a", "v": 1}, {"name": "b", "value": 2}])),
        json!({"a": 1.0, "b": 2.0})
    );
    assert_eq!(
        run_one("from_entries", json!([["a", 1], ["b", 2]])),
        json!({"a": 1.0, "b": 2.0})
    );
}

#[test]
fn entries_round_trip() {
    assert_eq!(
        run_one("to_entries | from_entries", json!({"x": [1], "y": null})),
        json!({"x": [1.0], "y": null})
    );
}

#[test]
fn to_object_from_pairs() {
    assert_eq!(
        run_one("to_object", json!([["a", 1]])),
        json!({"a": 1.0})
    );
    assert_eq!(run_one("to_object", json!({"a": 1})), json!({"a": 1.0}));
}

// ============================================================================
// Math
// ============================================================================

#[test]
fn rounding_family() {
    assert_eq!(run_one("floor", json!(2.7)), json!(2.0));
    assert_eq!(run_one("ceil", json!(2.1)), json!(3.0));
    assert_eq!(run_one("round", json!(2.5)), json!(3.0));
    assert_eq!(run_one("abs", json!(-4)), json!(4.0));
}

#[test]
fn powers_and_roots() {
    assert_eq!(run_one("sqrt", json!(9)), json!(3.0));
    assert_eq!(run_one("pow(2; 10)", json!(null)), json!(1024.0));
    assert_eq!(run_one("exp2", json!(3)), json!(8.0));
    assert_eq!(run_one("exp10", json!(2)), json!(100.0));
    assert_eq!(run_one("log2", json!(8)), json!(3.0));
    assert_eq!(run_one("log10", json!(100)), json!(2.0));
}

#[test]
fn trig_identities() {
    assert_eq!(run_one("sin", json!(0)), json!(0.0));
    assert_eq!(run_one("cos", json!(0)), json!(1.0));
    assert_eq!(run_one("atan", json!(0)), json!(0.0));
    assert_eq!(run_one("asin", json!(1)), json!(std::f64::consts::FRAC_PI_2));
}

#[test]
fn math_domain_violations_fail() {
    assert!(run_err("sqrt", json!(-1)).contains("sqrt"));
    assert!(run_err("log", json!(0)).contains("log"));
    assert!(run_err("asin", json!(2)).contains("asin"));
    assert!(run_err("acos", json!(-1.5)).contains("acos"));
}

#[test]
fn math_on_non_number_fails() {
    assert!(run_err("floor", json!("x")).contains("floor"));
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn split_and_join() {
    assert_eq!(
        run_one("split(\",\")", json!("a,b,c")),
        json!(["a", "b", "c"])
    );
    assert_eq!(run_one("join(\"-\")", json!(["a", "b"])), json!("a-b"));
    assert_eq!(
        run_one("split(\",\") | join(\",\")", json!("a,b")),
        json!("a,b")
    );
    assert_eq!(run_one("join(\",\")", json!([1, null, true])), json!("1,,true"));
}

#[test]
fn split_empty_separator_fails() {
    assert!(run_err("split(\"\")", json!("abc")).contains("separator"));
}

#[test]
fn starts_and_ends_with() {
    assert_eq!(run_one("startswith(\"he\")", json!("hello")), json!(true));
    assert_eq!(run_one("endswith(\"lo\")", json!("hello")), json!(true));
    assert_eq!(run_one("startswith(\"x\")", json!("hello")), json!(false));
    assert!(run_err("startswith(\"x\")", json!(5)).contains("startswith"));
}

#[test]
fn trimstr_family() {
    assert_eq!(run_one("ltrimstr(\"ab\")", json!("abcd")), json!("cd"));
    assert_eq!(run_one("rtrimstr(\"cd\")", json!("abcd")), json!("ab"));
    // Non-matching or mistyped inputs pass through unchanged.
    assert_eq!(run_one("ltrimstr(\"x\")", json!("abcd")), json!("abcd"));
    assert_eq!(run_one("ltrimstr(\"x\")", json!(7)), json!(7.0));
}

#[test]
fn ascii_case_conversion() {
    assert_eq!(run_one("ascii_upcase", json!("aBc")), json!("ABC"));
    assert_eq!(run_one("ascii_downcase", json!("aBc")), json!("abc"));
}

#[test]
fn explode_implode_round_trip() {
    assert_eq!(
        run_one("explode", json!("hi")),
        json!([104.0, 105.0])
    );
    assert_eq!(run_one("implode", json!([104, 105])), json!("hi"));
    assert_eq!(run_one("explode | implode", json!("héllo")), json!("héllo"));
}

#[test]
fn implode_rejects_non_bytes() {
    assert!(run_err("implode", json!([300])).contains("byte"));
    assert!(run_err("implode", json!(["x"])).contains("byte"));
}

#[test]
fn ascii_code_to_char() {
    assert_eq!(run_one("ascii", json!(104)), json!("h"));
    assert!(run_err("ascii", json!(200)).contains("ascii"));
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn add_dispatches_on_first_element() {
    assert_eq!(run_one("add", json!([1, 2, 3])), json!(6.0));
    assert_eq!(run_one("add", json!(["a", "b"])), json!("ab"));
    assert_eq!(run_one("add", json!([[1], [2, 3]])), json!([1.0, 2.0, 3.0]));
    assert_eq!(run_one("add", json!([])), json!(null));
}

#[test]
fn sort_uses_total_order() {
    assert_eq!(
        run_one("sort", json!([3, "a", null, 1, true])),
        json!([null, true, 1.0, 3.0, "a"])
    );
}

#[test]
fn sort_is_idempotent() {
    assert_eq!(
        run_one("sort | sort", json!([3, 1, 2])),
        run_one("sort", json!([3, 1, 2]))
    );
}

#[test]
fn reverse_reverses() {
    assert_eq!(run_one("reverse", json!([1, 2, 3])), json!([3.0, 2.0, 1.0]));
}

#[test]
fn unique_is_sorted_unique() {
    assert_eq!(
        run_one("unique", json!([3, 1, 3, 2, 1])),
        json!([1.0, 2.0, 3.0])
    );
    assert_eq!(
        run_one("unique | unique", json!([2, 1, 2])),
        json!([1.0, 2.0])
    );
}

#[test]
fn min_max_and_null_cases() {
    assert_eq!(run_one("min", json!([3, 1, 2])), json!(1.0));
    assert_eq!(run_one("max", json!([3, 1, 2])), json!(3.0));
    assert_eq!(run_one("min", json!([])), json!(null));
    assert_eq!(run_one("max", json!([])), json!(null));
}

#[test]
fn min_max_by_field_value() {
    let rows = json!([
        {"name": "a", "price": 9},
        {"name": "b", "price": 3},
        {"name": "c", "price": 7},
    ]);
    assert_eq!(
        run_one("min_by_value(\"price\")", rows.clone()),
        json!({"name": "b", "price": 3.0})
    );
    assert_eq!(
        run_one("max_by_value(\"price\")", rows),
        json!({"name": "a", "price": 9.0})
    );
}

#[test]
fn first_last_nth() {
    assert_eq!(run_one("first", json!([1, 2, 3])), json!(1.0));
    assert_eq!(run_one("last", json!([1, 2, 3])), json!(3.0));
    assert_eq!(run_one("nth(1)", json!([1, 2, 3])), json!(2.0));
    assert_eq!(run_one("first", json!([])), json!(null));
    assert_eq!(run_one("nth(9)", json!([1])), json!(null));
}

#[test]
fn range_emits_streams() {
    assert_eq!(run("range(3)", json!(null)), vec![json!(0.0), json!(1.0), json!(2.0)]);
    assert_eq!(run("range(2; 5)", json!(null)), vec![json!(2.0), json!(3.0), json!(4.0)]);
    assert_eq!(run("range(0)", json!(null)), Vec::<serde_json::Value>::new());
}

#[test]
fn flatten_depths() {
    assert_eq!(
        run_one("flatten", json!([1, [2, [3, [4]]]])),
        json!([1.0, 2.0, 3.0, 4.0])
    );
    assert_eq!(
        run_one("flatten(1)", json!([1, [2, [3]]])),
        json!([1.0, 2.0, [3.0]])
    );
    // flatten(0) is the identity on arrays.
    assert_eq!(run_one("flatten(0)", json!([1, [2]])), json!([1.0, [2.0]]));
}

#[test]
fn transpose_pads_with_null() {
    assert_eq!(
        run_one("transpose", json!([[1, 2], [3, 4]])),
        json!([[1.0, 3.0], [2.0, 4.0]])
    );
    assert_eq!(
        run_one("transpose", json!([[1, 2], [3]])),
        json!([[1.0, 3.0], [2.0, null]])
    );
}

#[test]
fn contains_and_inside() {
    assert_eq!(run_one("contains(\"ell\")", json!("hello")), json!(true));
    assert_eq!(
        run_one("contains([\"b\"])", json!(["a", "b", "c"])),
        json!(true)
    );
    assert_eq!(
        run_one("contains({\"a\": 1})", json!({"a": 1, "b": 2})),
        json!(true)
    );
    assert_eq!(
        run_one("inside([1, 2, 3])", json!([1, 3])),
        json!(true)
    );
}

#[test]
fn index_rindex_indices() {
    assert_eq!(run_one("index(\"bc\")", json!("abcabc")), json!(1.0));
    assert_eq!(run_one("rindex(\"bc\")", json!("abcabc")), json!(4.0));
    assert_eq!(run_one("indices(\"bc\")", json!("abcabc")), json!([1.0, 4.0]));
    assert_eq!(run_one("index(2)", json!([1, 2, 3, 2])), json!(1.0));
    assert_eq!(run_one("rindex(2)", json!([1, 2, 3, 2])), json!(3.0));
    assert_eq!(run_one("index(\"zz\")", json!("abc")), json!(null));
    assert_eq!(
        run_one("indices([1, 2])", json!([0, 1, 2, 1, 2])),
        json!([1.0, 3.0])
    );
}

#[test]
fn combinations_cartesian_product() {
    assert_eq!(
        run("combinations", json!([[1, 2], ["a", "b"]])),
        vec![
            json!([1.0, "a"]),
            json!([1.0, "b"]),
            json!([2.0, "a"]),
            json!([2.0, "b"]),
        ]
    );
}

// ============================================================================
// Expression-parameterised operators
// ============================================================================

#[test]
fn map_concatenates_per_element_streams() {
    assert_eq!(
        run_one("map(. * 2)", json!([1, 2])),
        json!([2.0, 4.0])
    );
    // select inside map drops elements entirely.
    assert_eq!(
        run_one("map(select(. > 2))", json!([1, 2, 3, 4, 5])),
        json!([3.0, 4.0, 5.0])
    );
}

#[test]
fn select_filters_by_first_truthy() {
    assert_eq!(run("select(. > 1)", json!(5)), vec![json!(5.0)]);
    assert_eq!(run("select(. > 9)", json!(5)), Vec::<serde_json::Value>::new());
}

#[test]
fn sort_by_is_stable_on_equal_keys() {
    assert_eq!(
        run_one(
            "sort_by(.k)",
            json!([{"k": 2, "i": 0}, {"k": 1, "i": 1}, {"k": 2, "i": 2}])
        ),
        json!([
            {"i": 1.0, "k": 1.0},
            {"i": 0.0, "k": 2.0},
            {"i": 2.0, "k": 2.0},
        ])
    );
}

#[test]
fn unique_by_keeps_first_per_key() {
    assert_eq!(
        run_one("unique_by(.k)", json!([{"k": 1, "v": "a"}, {"k": 1, "v": "b"}])),
        json!([{"k": 1.0, "v": "a"}])
    );
}

#[test]
fn group_by_orders_groups_by_key() {
    assert_eq!(
        run_one(
            "group_by(.k) | map(length)",
            json!([{"k": 1}, {"k": 2}, {"k": 1}, {"k": 2}, {"k": 1}])
        ),
        json!([3.0, 2.0])
    );
}

#[test]
fn group_by_empty_array() {
    assert_eq!(run_one("group_by(.k)", json!([])), json!([]));
}

#[test]
fn min_by_max_by_expression_keys() {
    let rows = json!([{"p": 9}, {"p": 3}, {"p": 7}]);
    assert_eq!(run_one("min_by(.p)", rows.clone()), json!({"p": 3.0}));
    assert_eq!(run_one("max_by(.p)", rows), json!({"p": 9.0}));
    assert_eq!(run_one("min_by(.p)", json!([])), json!(null));
}

#[test]
fn any_all_predicates() {
    assert_eq!(run_one("any(. > 2)", json!([1, 2, 3])), json!(true));
    assert_eq!(run_one("any(. > 9)", json!([1, 2, 3])), json!(false));
    assert_eq!(run_one("all(. > 0)", json!([1, 2, 3])), json!(true));
    assert_eq!(run_one("all(. > 1)", json!([1, 2, 3])), json!(false));
    // Vacuous cases
    assert_eq!(run_one("any(.)", json!([])), json!(false));
    assert_eq!(run_one("all(.)", json!([])), json!(true));
}

#[test]
fn walk_transforms_post_order() {
    assert_eq!(
        run_one(
            "walk(if type == \"number\" then . + 1 else . end)",
            json!([1, {"a": 2}, [3]])
        ),
        json!([2.0, {"a": 3.0}, [4.0]])
    );
}

#[test]
fn limit_truncates_generator() {
    assert_eq!(run("limit(2; .[])", json!([1, 2, 3, 4])), vec![json!(1.0), json!(2.0)]);
    assert_eq!(run("limit(0; .[])", json!([1, 2])), Vec::<serde_json::Value>::new());
}

// ============================================================================
// Recursion: paths
// ============================================================================

#[test]
fn paths_preorder_with_sorted_keys() {
    assert_eq!(
        run("paths", json!({"b": [1], "a": 2})),
        vec![json!(["a"]), json!(["b"]), json!(["b", 0.0])]
    );
}

#[test]
fn paths_never_emits_empty_path() {
    assert_eq!(run("paths", json!(5)), Vec::<serde_json::Value>::new());
}

#[test]
fn leaf_paths_only_scalars_and_empty_containers() {
    assert_eq!(
        run("leaf_paths", json!({"a": {"b": 1}, "c": [], "d": 2})),
        vec![json!(["a", "b"]), json!(["c"]), json!(["d"])]
    );
}

// ============================================================================
// Type filters
// ============================================================================

#[test]
fn type_filters_keep_or_drop() {
    assert_eq!(
        run(".[] | numbers", json!([1, "a", null, 2])),
        vec![json!(1.0), json!(2.0)]
    );
    assert_eq!(run(".[] | strings", json!([1, "a"])), vec![json!("a")]);
    assert_eq!(run("nulls", json!(null)), vec![json!(null)]);
    assert_eq!(run("booleans", json!(null)), Vec::<serde_json::Value>::new());
    assert_eq!(
        run(".[] | scalars", json!([1, [2], {"a": 3}, "s"])),
        vec![json!(1.0), json!("s")]
    );
    assert_eq!(
        run(".[] | iterables", json!([1, [2], {"a": 3}])),
        vec![json!([2.0]), json!({"a": 3.0})]
    );
}

// ============================================================================
// SQL-style operators
// ============================================================================

#[test]
fn index_builds_position_keyed_object() {
    assert_eq!(
        run_one("INDEX(.id)", json!([{"id": "x"}, {"id": "y"}])),
        json!({"0": {"id": "x"}, "1": {"id": "y"}})
    );
}

#[test]
fn in_builds_membership_object() {
    assert_eq!(
        run_one("IN([1, \"a\"])", json!(null)),
        json!({"1": true, "a": true})
    );
}

// ============================================================================
// Dates
// ============================================================================

#[test]
fn now_returns_recent_epoch_seconds() {
    assert_eq!(run_one("now > 1700000000", json!(null)), json!(true));
}

#[test]
fn gmtime_breaks_down_epoch() {
    // 1970-01-01 was a Thursday (weekday 4, yday 0).
    assert_eq!(
        run_one("gmtime", json!(0)),
        json!([1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 4.0, 0.0])
    );
    // One day later: Friday, yday 1.
    assert_eq!(
        run_one("gmtime", json!(86400)),
        json!([1970.0, 0.0, 2.0, 0.0, 0.0, 0.0, 5.0, 1.0])
    );
}

#[test]
fn mktime_inverts_gmtime() {
    assert_eq!(run_one("gmtime | mktime", json!(1700000000)), json!(1700000000.0));
}

#[test]
fn todate_fromdate_round_trip() {
    assert_eq!(run_one("todate", json!(0)), json!("1970-01-01T00:00:00Z"));
    assert_eq!(
        run_one("fromdate", json!("2024-05-01T12:30:00Z")),
        json!(1714566600.0)
    );
    assert_eq!(
        run_one("fromdate | todate", json!("2024-05-01T12:30:00Z")),
        json!("2024-05-01T12:30:00Z")
    );
    assert_eq!(run_one("todateiso8601", json!(0)), json!("1970-01-01T00:00:00Z"));
}

#[test]
fn strftime_formats_epoch_and_arrays() {
    assert_eq!(
        run_one("strftime(\"%Y/%m/%d\")", json!(0)),
        json!("1970/01/01")
    );
    assert_eq!(
        run_one("gmtime | strftime(\"%Y-%m-%d\")", json!(86400)),
        json!("1970-01-02")
    );
}

#[test]
fn strptime_parses_to_broken_down_time() {
    assert_eq!(
        run_one("strptime(\"%d.%m.%Y %H:%M:%S\") | mktime", json!("01.01.1970 00:01:00")),
        json!(60.0)
    );
}

// ============================================================================
// Format directives
// ============================================================================

#[test]
fn base64_round_trip() {
    assert_eq!(run_one("@base64", json!("hello")), json!("aGVsbG8="));
    assert_eq!(run_one("@base64 | @base64d", json!("hello")), json!("hello"));
}

#[test]
fn uri_percent_encodes() {
    assert_eq!(run_one("@uri", json!("a b&c")), json!("a%20b%26c"));
    assert_eq!(run_one("@uri", json!("safe-chars_.~")), json!("safe-chars_.~"));
}

#[test]
fn csv_and_tsv_rows() {
    assert_eq!(
        run_one("@csv", json!([1, "x,y", null, true])),
        json!("1,\"x,y\",,true")
    );
    assert_eq!(
        run_one("@tsv", json!(["a\tb", "c"])),
        json!("a\\tb\tc")
    );
}

#[test]
fn csv_rejects_nested_containers() {
    assert!(run_err("@csv", json!([[1]])).contains("@csv"));
}

#[test]
fn html_escapes_markup() {
    assert_eq!(
        run_one("@html", json!("<a href=\"x\">&'</a>")),
        json!("&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;")
    );
}

#[test]
fn json_directive_emits_toon() {
    assert_eq!(run_one("@json", json!({"a": 1})), json!("a: 1"));
    assert_eq!(run_one("@text", json!(42)), json!("42"));
}

#[test]
fn unknown_format_fails() {
    assert!(run_err("@nope", json!(null)).contains("@nope"));
}
