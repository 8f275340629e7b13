//! Request decoding: JSON bodies and query strings into typed messages.
//!
//! Both paths build a `serde_json::Value` object first and then hand it to
//! the same `from_value` + [`Message::validate`] step, so a message decoded
//! from `?a=1&b=x` and one decoded from `{"a":1,"b":"x"}` are identical.
//!
//! | Problem | Code |
//! |---------|------|
//! | Body is not JSON, or not a JSON object | `BAD_REQUEST` |
//! | Query string has invalid percent-encoding | `BAD_REQUEST` |
//! | Value has the wrong type for its field | `INVALID_PARAMETER_VALUE` |
//! | Required field missing | `INVALID_PARAMETER_VALUE` |
//!
//! Unknown fields and parameters are ignored.

use runledger_api::{Failure, FieldKind, FieldSpec, Message};
use serde_json::{Map, Number, Value};

/// Decode a JSON request body. An empty body decodes as `{}`.
pub fn decode_body<M: Message>(body: &[u8]) -> Result<M, Failure> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice::<Value>(body)
            .map_err(|e| Failure::bad_request(format!("malformed JSON request body: {e}")))?
    };
    if !value.is_object() {
        return Err(Failure::bad_request("request body must be a JSON object"));
    }
    from_value(value)
}

/// Decode a raw (still percent-encoded) query string, without the leading `?`.
pub fn decode_query<M: Message>(query: &str) -> Result<M, Failure> {
    let mut object = Map::new();
    for (key, raw) in parse_pairs(query)? {
        let path = key_path(&key);
        insert_param(&mut object, M::FIELDS, &key, &path, &raw)?;
    }
    from_value(Value::Object(object))
}

fn from_value<M: Message>(value: Value) -> Result<M, Failure> {
    let message: M = serde_json::from_value(value).map_err(|e| {
        Failure::invalid_parameter(format!("invalid value for {}: {e}", M::NAME))
    })?;
    message.validate()?;
    Ok(message)
}

// ---------------------------------------------------------------------------
// Query string parsing
// ---------------------------------------------------------------------------

/// Split `a=1&b=2` into decoded pairs, following form-urlencoded rules.
fn parse_pairs(query: &str) -> Result<Vec<(String, String)>, Failure> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            Ok((form_decode(key)?, form_decode(value)?))
        })
        .collect()
}

fn form_decode(raw: &str) -> Result<String, Failure> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| Failure::bad_request(format!("invalid query string encoding: {e}")))
}

/// `experiment.name`, `experiment[name]` and `stages[]` all flatten to
/// dotted segments; empty segments (from `[]`) are dropped.
fn key_path(key: &str) -> Vec<&str> {
    key.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn insert_param(
    object: &mut Map<String, Value>,
    fields: &'static [FieldSpec],
    key: &str,
    path: &[&str],
    raw: &str,
) -> Result<(), Failure> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(());
    };
    let Some(spec) = FieldSpec::lookup(fields, head) else {
        tracing::trace!(parameter = key, "ignoring unknown query parameter");
        return Ok(());
    };

    match spec.kind {
        FieldKind::Message(nested) => {
            if spec.repeated {
                return Err(Failure::invalid_parameter(format!(
                    "parameter '{}' is a list of messages and cannot be sent in a query string",
                    spec.name
                )));
            }
            if rest.is_empty() {
                return Err(Failure::invalid_parameter(format!(
                    "parameter '{key}' must name a field of '{}'",
                    spec.name
                )));
            }
            let child = object
                .entry(spec.name)
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(child) => insert_param(child, nested, key, rest, raw),
                _ => Err(Failure::invalid_parameter(format!(
                    "conflicting values for parameter '{}'",
                    spec.name
                ))),
            }
        }
        kind => {
            if !rest.is_empty() {
                tracing::trace!(parameter = key, "ignoring sub-field of scalar parameter");
                return Ok(());
            }
            let value = coerce(kind, key, raw)?;
            if spec.repeated {
                match object
                    .entry(spec.name)
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(items) => items.push(value),
                    other => *other = Value::Array(vec![value]),
                }
            } else {
                // Last occurrence wins for scalar fields.
                object.insert(spec.name.to_string(), value);
            }
            Ok(())
        }
    }
}

fn coerce(kind: FieldKind, key: &str, raw: &str) -> Result<Value, Failure> {
    let invalid = || {
        Failure::invalid_parameter(format!(
            "Invalid value {raw:?} for parameter '{key}' supplied"
        ))
    };
    match kind {
        FieldKind::String => Ok(Value::String(raw.to_string())),
        FieldKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid()),
        FieldKind::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        FieldKind::Message(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runledger_api::{
        CreateExperiment, ErrorCode, GetLatestVersions, SearchExperiments,
        TransitionModelVersionStage, ViewType,
    };
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Inner {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Probe {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flag: Option<bool>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inner: Option<Inner>,
    }

    const INNER_FIELDS: &[FieldSpec] = &[
        FieldSpec::scalar("name", FieldKind::String),
        FieldSpec::scalar("weight", FieldKind::Float),
    ];

    impl Message for Probe {
        const NAME: &'static str = "Probe";
        const FIELDS: &'static [FieldSpec] = &[
            FieldSpec::scalar("id", FieldKind::String),
            FieldSpec::scalar("count", FieldKind::Int),
            FieldSpec::scalar("flag", FieldKind::Bool),
            FieldSpec::repeated("labels", FieldKind::String),
            FieldSpec::scalar("inner", FieldKind::Message(INNER_FIELDS)),
        ];
    }

    #[test]
    fn query_and_body_decode_identically() {
        let from_query: Probe = decode_query(
            "id=run%201&count=7&flag=true&labels=a&labels=b&inner.name=x&inner[weight]=0.5",
        )
        .unwrap();
        let from_body: Probe = decode_body(
            br#"{"id":"run 1","count":7,"flag":true,"labels":["a","b"],"inner":{"name":"x","weight":0.5}}"#,
        )
        .unwrap();
        assert_eq!(from_query, from_body);
        assert_eq!(
            serde_json::to_vec(&from_query).unwrap(),
            serde_json::to_vec(&from_body).unwrap()
        );
    }

    #[test]
    fn absent_query_fields_stay_unset() {
        let p: Probe = decode_query("id=").unwrap();
        assert_eq!(p.id.as_deref(), Some(""));
        assert_eq!(p.count, None);
        assert_eq!(p.inner, None);
        assert!(p.labels.is_empty());
    }

    #[test]
    fn plus_decodes_as_space() {
        let p: Probe = decode_query("id=a+b").unwrap();
        assert_eq!(p.id.as_deref(), Some("a b"));
    }

    #[test]
    fn escaped_separators_stay_in_value() {
        let p: Probe = decode_query("id=a%26b%3Dc&&labels=x%2By").unwrap();
        assert_eq!(p.id.as_deref(), Some("a&b=c"));
        assert_eq!(p.labels, vec!["x+y"]);
    }

    #[test]
    fn bracketed_repeated_key() {
        let p: Probe = decode_query("labels[]=a&labels[]=b").unwrap();
        assert_eq!(p.labels, vec!["a", "b"]);
    }

    #[test]
    fn last_scalar_occurrence_wins() {
        let p: Probe = decode_query("count=1&count=2").unwrap();
        assert_eq!(p.count, Some(2));
    }

    #[test]
    fn unknown_params_and_fields_are_ignored() {
        let q: Probe = decode_query("id=x&unknown=1&inner.bogus=2").unwrap();
        assert_eq!(q.id.as_deref(), Some("x"));
        let b: Probe = decode_body(br#"{"id":"x","unknown":{"deep":true}}"#).unwrap();
        assert_eq!(b.id.as_deref(), Some("x"));
    }

    #[test]
    fn query_type_mismatch_is_invalid_parameter() {
        let err = decode_query::<Probe>("count=seven").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        assert!(err.message().contains("'count'"));

        let err = decode_query::<Probe>("flag=maybe").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[test]
    fn body_type_mismatch_is_invalid_parameter() {
        let err = decode_body::<Probe>(br#"{"count":"seven"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = decode_body::<Probe>(b"{not json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
        let err = decode_body::<Probe>(b"[1,2]").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn empty_body_is_empty_message() {
        let p: Probe = decode_body(b"").unwrap();
        assert_eq!(p, Probe::default());
    }

    #[test]
    fn bad_utf8_escape_is_bad_request() {
        let err = decode_query::<Probe>("id=%ff").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let err = decode_body::<CreateExperiment>(br#"{"artifact_location":"/tmp"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
        assert!(err.message().contains("'name'"));
    }

    #[test]
    fn repeated_messages_rejected_in_query() {
        let err = decode_query::<CreateExperiment>("name=a&tags.key=k").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[test]
    fn search_query_matches_body() {
        let q: SearchExperiments = decode_query(
            "max_results=10&view_type=ALL&order_by=name&order_by=creation_time+DESC",
        )
        .unwrap();
        let b: SearchExperiments = decode_body(
            br#"{"max_results":10,"view_type":"ALL","order_by":["name","creation_time DESC"]}"#,
        )
        .unwrap();
        assert_eq!(q, b);
        assert_eq!(q.view_type, Some(ViewType::All));
    }

    #[test]
    fn unknown_enum_value_is_invalid_parameter() {
        let err = decode_query::<SearchExperiments>("view_type=SOME").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
    }

    #[test]
    fn latest_versions_repeated_stages() {
        let q: GetLatestVersions =
            decode_query("name=model&stages=Staging&stages=Production").unwrap();
        assert_eq!(q.stages, vec!["Staging", "Production"]);
    }

    #[test]
    fn bool_field_from_query() {
        let q: TransitionModelVersionStage =
            decode_query("name=m&version=1&stage=Production&archive_existing_versions=TRUE")
                .unwrap();
        assert_eq!(q.archive_existing_versions, Some(true));
    }
}
