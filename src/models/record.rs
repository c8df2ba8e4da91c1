//! Process record model

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value that is an integer when its source text was all decimal digits,
/// and the original text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// Key used to match identifiers coming back from the model
    pub fn lookup_key(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// Keys an [`Annotation`] adds to a serialized record
const ANNOTATION_KEYS: [&str; 3] = ["description", "suspicious", "reason"];

/// Per-process enrichment produced by the annotator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub description: String,
    pub suspicious: bool,
    pub reason: String,
}

impl Annotation {
    pub fn new(description: impl Into<String>, suspicious: bool, reason: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            suspicious,
            reason: reason.into(),
        }
    }
}

/// One row of the process listing.
///
/// Named fields are `None` when the listing has no such column and
/// `Some("")` when the column exists but the value was blank or a
/// placeholder. Columns without a named field land in `extra` under
/// their header name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: FieldValue,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppid: Option<FieldValue>,

    #[serde(rename = "ImageFileName", skip_serializing_if = "Option::is_none")]
    pub image_file_name: Option<String>,

    #[serde(rename = "Offset", skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,

    #[serde(rename = "Threads", skip_serializing_if = "Option::is_none")]
    pub threads: Option<FieldValue>,

    #[serde(rename = "Handles", skip_serializing_if = "Option::is_none")]
    pub handles: Option<String>,

    #[serde(rename = "SessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(rename = "Wow64", skip_serializing_if = "Option::is_none")]
    pub wow64: Option<String>,

    #[serde(rename = "CreateTime", skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    #[serde(rename = "ExitTime", skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<String>,

    #[serde(rename = "Audit", skip_serializing_if = "Option::is_none")]
    pub audit: Option<String>,

    #[serde(rename = "Cmd", skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,

    #[serde(flatten)]
    pub annotation: Option<Annotation>,
}

impl ProcessRecord {
    pub fn new(pid: FieldValue) -> Self {
        Self {
            pid,
            ppid: None,
            image_file_name: None,
            offset: None,
            threads: None,
            handles: None,
            session_id: None,
            wow64: None,
            create_time: None,
            exit_time: None,
            audit: None,
            cmd: None,
            path: None,
            extra: BTreeMap::new(),
            annotation: None,
        }
    }

    /// Copy of the record without its annotation, as sent to the model
    pub fn without_annotation(&self) -> Self {
        Self {
            annotation: None,
            ..self.clone()
        }
    }

    /// Attach an annotation. Listing columns named like an annotation key
    /// are replaced by it, so the artifact never repeats a key.
    pub fn annotate(&mut self, annotation: Annotation) {
        for key in ANNOTATION_KEYS {
            self.extra.remove(key);
        }
        self.annotation = Some(annotation);
    }
}
