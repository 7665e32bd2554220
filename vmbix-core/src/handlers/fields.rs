//! Single-property accessors.

use super::{as_int, as_text, Located, Services, StatusMap};
use crate::dispatch::{Args, Handler};
use crate::error::Result;
use crate::types::ObjectType;
use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

/// How a property value becomes a reply.
#[derive(Debug, Clone, Copy)]
pub enum Read {
    Int,
    Text,
    /// Boolean as `1`/`0`.
    Flag,
    /// Negated boolean as `1`/`0`, unset reading as false.
    NotFlag,
    /// `1` if the property is set at all.
    Present,
    Status(StatusMap),
}

impl Read {
    fn default_reply(&self) -> String {
        match self {
            Read::Text => String::new(),
            Read::Status(map) => map.other().to_string(),
            _ => "0".to_string(),
        }
    }

    /// Format a reading; `None` means the value could not be interpreted.
    fn format(&self, value: Option<&Value>) -> Option<String> {
        match self {
            Read::Int => value.and_then(as_int).map(|v| v.to_string()),
            Read::Text => Some(value.map(as_text).unwrap_or_default()),
            Read::Flag => Some(flag(value.and_then(Value::as_bool).unwrap_or(false))),
            Read::NotFlag => Some(flag(!value.and_then(Value::as_bool).unwrap_or(false))),
            Read::Present => Some(flag(value.is_some())),
            Read::Status(map) => value.and_then(Value::as_str).map(|s| map.code(s).to_string()),
        }
    }
}

fn flag(on: bool) -> String {
    if on { "1" } else { "0" }.to_string()
}

/// Reads `path` on the object named by the first argument.
#[derive(Debug, Clone)]
pub struct FieldQuery {
    kind: ObjectType,
    path: &'static str,
    read: Read,
    missing: String,
    failed: String,
}

impl FieldQuery {
    pub fn new(kind: ObjectType, path: &'static str, read: Read) -> Self {
        let default = read.default_reply();
        Self { kind, path, read, missing: default.clone(), failed: default }
    }

    pub fn int(kind: ObjectType, path: &'static str) -> Self {
        Self::new(kind, path, Read::Int)
    }

    pub fn text(kind: ObjectType, path: &'static str) -> Self {
        Self::new(kind, path, Read::Text)
    }

    pub fn flag(kind: ObjectType, path: &'static str) -> Self {
        Self::new(kind, path, Read::Flag)
    }

    pub fn status(kind: ObjectType, path: &'static str, map: StatusMap) -> Self {
        Self::new(kind, path, Read::Status(map))
    }

    /// Reply when the lookup or the read fails.
    pub fn when_failed(mut self, reply: &str) -> Self {
        self.failed = reply.to_string();
        self
    }
}

#[async_trait]
impl Handler<Services> for FieldQuery {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let resolved = match services.locate(args.get(0), self.kind).await {
            Located::Found(resolved) => resolved,
            Located::Missing => return Ok(self.missing.clone()),
            Located::Failed => return Ok(self.failed.clone()),
        };

        match resolved.session.navigator.get_field(&resolved.object, self.path).await {
            Ok(value) => Ok(self.read.format(value.as_ref()).unwrap_or_else(|| self.failed.clone())),
            Err(e) => {
                error!(object = %resolved.object.name, path = self.path, error = %e, "Property read failed");
                Ok(self.failed.clone())
            }
        }
    }
}
