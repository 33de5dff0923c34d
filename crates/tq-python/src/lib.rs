//! # tq-python
//!
//! Python bindings for the tq TOON query engine, built with PyO3.
//!
//! Exposes the following functions to Python as the `tq_engine` module:
//!
//! - `query(expression, document)` -- TOON document -> list of TOON results
//! - `query_json(expression, json_document)` -- JSON document -> list of
//!   TOON results (host-data path, skips the TOON reader)

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Run a query expression over a TOON document.
///
/// Args:
///     expression: A tq query expression (e.g. ".users[].email").
///     document: The input document in TOON format.
///
/// Returns:
///     A list of results, each serialized as a TOON string.
///
/// Raises:
///     ValueError: If the expression or the document fails to parse, or
///         evaluation fails.
#[pyfunction]
fn query(expression: &str, document: &str) -> PyResult<Vec<String>> {
    tq_core::query(expression, document).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Run a query expression over a JSON document.
///
/// The document is converted into the engine's value model (object keys
/// land in sorted order) and each result comes back as a TOON string.
///
/// Args:
///     expression: A tq query expression.
///     json_document: The input document as a JSON string.
///
/// Returns:
///     A list of results, each serialized as a TOON string.
///
/// Raises:
///     ValueError: If the JSON or the expression is invalid, or
///         evaluation fails.
#[pyfunction]
fn query_json(expression: &str, json_document: &str) -> PyResult<Vec<String>> {
    let json: serde_json::Value =
        serde_json::from_str(json_document).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let value = tq_core::json::from_json(&json);
    let results = tq_core::query_values(expression, &value)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(results.iter().map(tq_core::Value::to_toon).collect())
}

/// The `tq_engine` Python module, implemented in Rust via PyO3.
#[pymodule]
fn tq_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(query, m)?)?;
    m.add_function(wrap_pyfunction!(query_json, m)?)?;
    Ok(())
}
