//! Return-body templates.
//!
//! The put policy carries a JSON template whose `$(var)` placeholders the
//! storage replaces after a successful upload. The filled-in JSON becomes the
//! attachment row.

use crate::attachments::{DatePartition, Drive, NewAttachment};
use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum ReturnBodyError {
    #[error("return body is not a JSON object")]
    NotAnObject,

    #[error("return body is missing `{0}`")]
    Missing(&'static str),

    #[error("return body has an invalid `{field}`: {value}")]
    Invalid { field: &'static str, value: String },
}

/// The attachment-shaped template sent with every upload token.
pub fn default_return_body() -> Map<String, Value> {
    let body = json!({
        "drive": "qiniu",
        "specific_type": "$(mimeType)",
        "path": "$(key)",
        "hash": "$(etag)",
        "size": "$(fsize)",
        "name": "$(x:name)",
        "extension": "$(x:extension)",
        "member_id": "$(x:member_id)",
        "width": "$(imageInfo.width)",
        "height": "$(imageInfo.height)",
        "year": "$(x:year)",
        "month": "$(x:month)",
        "day": "$(x:day)",
    });
    match body {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Replaces every `$(var)` in `template` with its value from `vars`.
///
/// Values are JSON-escaped so the result stays valid JSON; unknown
/// variables become empty strings.
pub fn render_return_body(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find(')') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let value = vars.get(&after[..end]).map(String::as_str).unwrap_or("");
        out.push_str(&escape_json_fragment(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn escape_json_fragment(value: &str) -> String {
    let quoted = Value::String(value.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}

/// Reads a filled-in return body into a new attachment row.
///
/// Numbers may arrive as JSON numbers or as strings; empty strings count as
/// absent. Missing date parts fall back to `today`.
pub fn attachment_from_return_body(
    body: &Value,
    today: NaiveDate,
) -> Result<NewAttachment, ReturnBodyError> {
    let object = body.as_object().ok_or(ReturnBodyError::NotAnObject)?;

    let drive = match text(object, "drive") {
        Some(raw) => Drive::try_from(raw.as_str()).map_err(|_| ReturnBodyError::Invalid {
            field: "drive",
            value: raw,
        })?,
        None => Drive::Qiniu,
    };
    let path = text(object, "path").ok_or(ReturnBodyError::Missing("path"))?;
    let size = integer(object, "size")?.ok_or(ReturnBodyError::Missing("size"))?;

    let year = text(object, "year");
    let month = text(object, "month");
    let day = text(object, "day");

    Ok(NewAttachment {
        member_id: integer(object, "member_id")?.unwrap_or(0),
        drive,
        specific_type: text(object, "specific_type").unwrap_or_default(),
        name: text(object, "name").unwrap_or_default(),
        size,
        path,
        hash: text(object, "hash"),
        extension: text(object, "extension").unwrap_or_default(),
        width: small_integer(object, "width")?,
        height: small_integer(object, "height")?,
        partition: DatePartition::from_fields(
            year.as_deref(),
            month.as_deref(),
            day.as_deref(),
            today,
        ),
    })
}

fn text(object: &Map<String, Value>, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(object: &Map<String, Value>, field: &'static str) -> Result<Option<i64>, ReturnBodyError> {
    let Some(raw) = text(object, field) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ReturnBodyError::Invalid { field, value: raw })
}

fn small_integer(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<i32>, ReturnBodyError> {
    integer(object, field)?
        .map(|v| {
            i32::try_from(v).map_err(|_| ReturnBodyError::Invalid {
                field,
                value: v.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn render_substitutes_known_and_blanks_unknown() {
        let rendered = render_return_body(
            r#"{"k":"$(key)","s":"$(fsize)","w":"$(imageInfo.width)"}"#,
            &vars(&[("key", "uploads/a.png"), ("fsize", "12")]),
        );
        assert_eq!(rendered, r#"{"k":"uploads/a.png","s":"12","w":""}"#);
    }

    #[test]
    fn render_escapes_values() {
        let rendered = render_return_body(r#"{"n":"$(x:name)"}"#, &vars(&[("x:name", "a\"b.png")]));
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["n"], "a\"b.png");
    }

    #[test]
    fn render_keeps_unterminated_placeholder() {
        assert_eq!(render_return_body("x $(key", &HashMap::new()), "x $(key");
    }

    #[test]
    fn default_template_fills_an_attachment() {
        let template = Value::Object(default_return_body()).to_string();
        let rendered = render_return_body(
            &template,
            &vars(&[
                ("mimeType", "image/png"),
                ("key", "uploads/20261016/a.png"),
                ("etag", "Fhash"),
                ("fsize", "2048"),
                ("x:name", "cat.png"),
                ("x:extension", "png"),
                ("x:member_id", "42"),
                ("imageInfo.width", "640"),
                ("imageInfo.height", "480"),
                ("x:year", "2026"),
                ("x:month", "10"),
                ("x:day", "16"),
            ]),
        );
        let body: Value = serde_json::from_str(&rendered).unwrap();
        let attachment = attachment_from_return_body(&body, today()).unwrap();

        assert_eq!(attachment.drive, Drive::Qiniu);
        assert_eq!(attachment.path, "uploads/20261016/a.png");
        assert_eq!(attachment.size, 2048);
        assert_eq!(attachment.member_id, 42);
        assert_eq!(attachment.hash.as_deref(), Some("Fhash"));
        assert_eq!(attachment.width, Some(640));
        assert_eq!(attachment.partition.month, 10);
    }

    #[test]
    fn numbers_and_blank_dimensions_are_accepted() {
        let body = json!({
            "path": "k",
            "size": 10,
            "width": "",
            "member_id": 3,
        });
        let attachment = attachment_from_return_body(&body, today()).unwrap();
        assert_eq!(attachment.size, 10);
        assert_eq!(attachment.member_id, 3);
        assert_eq!(attachment.width, None);
        assert_eq!(attachment.hash, None);
        assert_eq!(attachment.partition.year, 2026);
    }

    #[test]
    fn missing_path_or_bad_size_is_an_error() {
        assert!(matches!(
            attachment_from_return_body(&json!({"size": "1"}), today()),
            Err(ReturnBodyError::Missing("path"))
        ));
        assert!(matches!(
            attachment_from_return_body(&json!({"path": "k", "size": "big"}), today()),
            Err(ReturnBodyError::Invalid { field: "size", .. })
        ));
        assert!(matches!(
            attachment_from_return_body(&json!([1]), today()),
            Err(ReturnBodyError::NotAnObject)
        ));
    }
}
