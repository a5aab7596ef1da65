//! Flattening of multipart payloads into form parts.
//!
//! Arrays go out as repeated `name[]` parts and nested objects as
//! `name[member]`, the layout Freshdesk expects for `tags` or
//! `custom_fields`. Nulls are dropped.

use serde_json::{Map, Value};

use crate::http::FormPart;
use crate::types::Attachment;

const ATTACHMENTS_FIELD: &str = "attachments[]";
const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

pub(crate) fn encode_form(fields: Map<String, Value>, attachments: Vec<Attachment>) -> Vec<FormPart> {
    let mut parts = Vec::with_capacity(fields.len() + attachments.len());
    for (name, value) in fields {
        push_field(&mut parts, name, value);
    }
    parts.extend(attachments.into_iter().map(|attachment| FormPart::File {
        name: ATTACHMENTS_FIELD.to_owned(),
        file_name: attachment.file_name,
        content_type: Some(
            attachment
                .content_type
                .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_owned()),
        ),
        bytes: attachment.bytes,
    }));
    parts
}

fn push_field(parts: &mut Vec<FormPart>, name: String, value: Value) {
    match value {
        Value::Null => {}
        Value::String(value) => parts.push(FormPart::Text { name, value }),
        Value::Bool(_) | Value::Number(_) => parts.push(FormPart::Text {
            name,
            value: value.to_string(),
        }),
        Value::Array(items) => {
            let key = format!("{name}[]");
            for item in items {
                push_field(parts, key.clone(), item);
            }
        }
        Value::Object(members) => {
            for (member, item) in members {
                push_field(parts, format!("{name}[{member}]"), item);
            }
        }
    }
}
