//! Current date and time.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::error::Result;
use crate::invocation::Invocation;
use crate::schema::{Attrs, Schema, SchemaBuilder};
use crate::tool::Capability;

pub struct CurrentTimeTool;

#[async_trait]
impl Capability for CurrentTimeTool {
    fn description(&self) -> Option<&str> {
        Some("Get the current date and time in UTC")
    }

    fn arguments_schema(&self) -> Result<&Schema> {
        static SCHEMA: OnceCell<Schema> = OnceCell::new();
        SCHEMA.get_or_try_init(|| {
            SchemaBuilder::new()
                .string(
                    "format",
                    Attrs::described("Output format: 'iso', 'human', or 'unix'")
                        .enum_values(["iso", "human", "unix"]),
                )
                .build()
        })
    }

    fn example_invocation(&self) -> Option<Value> {
        Some(json!({ "format": "human" }))
    }

    async fn process_invocation(&self, invocation: &Invocation) -> Result<Value> {
        let format = invocation
            .arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("human");

        let now = chrono::Utc::now();

        let output = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        Ok(Value::String(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::SourceRef;

    #[tokio::test]
    async fn test_unix_format() {
        let invocation = Invocation::new(
            &CurrentTimeTool,
            json!({"format": "unix"}),
            SourceRef::Caller { id: "test".into() },
        )
        .unwrap();

        let result = CurrentTimeTool.process_invocation(&invocation).await.unwrap();
        let seconds: i64 = result.as_str().unwrap().parse().unwrap();
        assert!(seconds > 1_600_000_000);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let result = Invocation::new(
            &CurrentTimeTool,
            json!({"format": "roman"}),
            SourceRef::Caller { id: "test".into() },
        );
        assert!(result.is_err());
    }
}
