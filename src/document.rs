//! Decoding the upstream RUM insights document.
//!
//! Three shapes are accepted:
//!
//! ```text
//! { "<page url>": [ { "experiment": ..., "variants": [...] }, ... ], ... }
//! [ { "experiment": ..., "variants": [...] }, ... ]
//! { "experiment": ..., "variants": [...] }
//! ```
//!
//! Pages come out in lexicographic URL order, experiments in document order.
//!
//! Only the top level has to be well formed. Each experiment is decoded on its
//! own, so one experiment with a bad field becomes one `Err` entry (naming its
//! page and experiment) while its siblings still decode.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::{
    compute_batch_entries, AllocationConfig, ExperimentOutcome, ExperimentRecord, PageExperiment,
};

fn experiment_name(v: &Value) -> Option<&str> {
    v.get("experiment").and_then(Value::as_str)
}

fn decode_experiment(page: Option<&str>, v: Value) -> Result<PageExperiment> {
    let name = experiment_name(&v).map(str::to_string);
    serde_json::from_value::<ExperimentRecord>(v)
        .map(|experiment| PageExperiment {
            page: page.map(str::to_string),
            experiment,
        })
        .map_err(|e| Error::document(page, name.as_deref(), e))
}

fn decode_page(page: Option<&str>, v: Value, out: &mut Vec<Result<PageExperiment>>) {
    match v {
        Value::Array(items) => {
            out.extend(items.into_iter().map(|item| decode_experiment(page, item)));
        }
        other => {
            // A page must hold a list; report the whole page as one failed entry.
            let err = serde_json::from_value::<Vec<Value>>(other)
                .err()
                .map(|e| Error::document(page, None, e));
            out.extend(err.map(Err));
        }
    }
}

fn is_single_experiment(map: &Map<String, Value>) -> bool {
    map.contains_key("variants") || map.get("experiment").is_some_and(Value::is_string)
}

/// Parse a RUM document into one entry per experiment.
///
/// Fails as a whole only when the text is not JSON or the top level is neither
/// an object nor an array.
pub fn parse_document(json: &str) -> Result<Vec<Result<PageExperiment>>> {
    let doc: Value = serde_json::from_str(json)?;
    let mut out = Vec::new();
    match doc {
        Value::Array(items) => {
            out.extend(items.into_iter().map(|item| decode_experiment(None, item)));
        }
        Value::Object(map) if is_single_experiment(&map) => {
            out.push(decode_experiment(None, Value::Object(map)));
        }
        Value::Object(map) => {
            let pages: BTreeMap<String, Value> = map.into_iter().collect();
            for (page, v) in pages {
                decode_page(Some(&page), v, &mut out);
            }
        }
        other => {
            serde_json::from_value::<Map<String, Value>>(other)?;
        }
    }
    tracing::debug!(
        experiments = out.len(),
        malformed = out.iter().filter(|e| e.is_err()).count(),
        "parsed RUM document"
    );
    Ok(out)
}

/// Parse a RUM document and compute every experiment in it.
///
/// Experiments that fail to decode show up as failed outcomes alongside the
/// computed ones.
pub fn compute_document(json: &str, cfg: &AllocationConfig) -> Result<Vec<ExperimentOutcome>> {
    Ok(compute_batch_entries(parse_document(json)?, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_names(entries: &[Result<PageExperiment>]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|e| {
                let pe = e.as_ref().unwrap();
                (pe.page.as_deref().unwrap(), pe.experiment.name.as_str())
            })
            .collect()
    }

    #[test]
    fn parses_pages() {
        let json = r##"{
            "https://example.com/b": [
                {"experiment": "hero", "variants": [{"name": "control", "views": 10}]}
            ],
            "https://example.com/a": [
                {"experiment": "cta", "variants": []},
                {"experiment": "nav", "variants": [{"name": "x", "views": 1, "clicks": {"#a": 1}}]}
            ]
        }"##;
        let out = parse_document(json).unwrap();
        assert_eq!(
            ok_names(&out),
            vec![
                ("https://example.com/a", "cta"),
                ("https://example.com/a", "nav"),
                ("https://example.com/b", "hero"),
            ]
        );
    }

    #[test]
    fn parses_single_and_list() {
        let one = r#"{"experiment": "e", "variants": [{"name": "a", "views": 5}]}"#;
        let out = parse_document(one).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().page, None);

        let list = format!("[{one}, {one}]");
        let out = parse_document(&list).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.is_ok()));
    }

    #[test]
    fn negative_counts_decode_for_later_rejection() {
        let json = r#"{"experiment": "e", "variants": [{"name": "a", "views": -5}]}"#;
        let out = parse_document(json).unwrap();
        assert_eq!(out[0].as_ref().unwrap().experiment.variants[0].views, -5);
    }

    #[test]
    fn bad_field_fails_only_its_experiment() {
        let json = r#"{
            "/a": [{"experiment": "good", "variants": [{"name": "x", "views": 10}]}],
            "/b": [
                {"experiment": "fractional", "variants": [{"name": "y", "views": 10.5}]},
                {"experiment": "null-views", "variants": [{"name": "z", "views": null}]},
                {"experiment": "string-views", "variants": [{"name": "w", "views": "3"}]}
            ]
        }"#;
        let out = parse_document(json).unwrap();
        assert_eq!(out.len(), 4);

        assert_eq!(out[0].as_ref().unwrap().experiment.name, "good");
        for (entry, name) in out[1..].iter().zip(["fractional", "null-views", "string-views"]) {
            let err = entry.as_ref().unwrap_err();
            assert!(matches!(err, Error::Document { .. }));
            assert_eq!(err.page(), Some("/b"));
            assert_eq!(err.experiment(), Some(name));
        }
    }

    #[test]
    fn page_that_is_not_a_list_fails_alone() {
        let json = r#"{
            "/a": [{"experiment": "good", "variants": [{"name": "x", "views": 1}]}],
            "/b": 7
        }"#;
        let out = parse_document(json).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        let err = out[1].as_ref().unwrap_err();
        assert_eq!(err.page(), Some("/b"));
        assert_eq!(err.experiment(), None);
    }

    #[test]
    fn compute_document_keeps_siblings_of_a_malformed_experiment() {
        let json = r#"{
            "/a": [{"experiment": "good", "variants": [
                {"name": "x", "views": 100, "conversions": {"convert": 10}},
                {"name": "y", "views": 100, "conversions": {"convert": 20}}
            ]}],
            "/b": [{"experiment": "bad", "variants": [{"name": "y", "views": 10.5}]}]
        }"#;
        let out = compute_document(json, &AllocationConfig::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].experiment, "good");
        assert_eq!(out[0].result.as_ref().unwrap().total(), 100);
        assert_eq!(out[1].experiment, "bad");
        assert_eq!(out[1].page.as_deref(), Some("/b"));
        assert!(out[1].result.is_err());
    }

    #[test]
    fn malformed_top_level_is_a_document_error() {
        assert!(matches!(parse_document("{"), Err(Error::Document { .. })));
        assert!(matches!(parse_document("3"), Err(Error::Document { .. })));
        assert!(matches!(
            parse_document(r#""text""#),
            Err(Error::Document { .. })
        ));
    }

    #[test]
    fn single_experiment_with_bad_shape_is_one_failed_entry() {
        let out = parse_document(r#"{"experiment": "e", "variants": 3}"#).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap_err().experiment(), Some("e"));
    }
}
