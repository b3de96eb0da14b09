//! Tool System
//!
//! A capability is a stateless descriptor of something the model may ask the
//! agent to do: name, description, strict argument schema, example call and
//! the execution logic. One value per tool type, shared by every agent.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::gateway::ToolDescriptor;
use crate::invocation::Invocation;
use crate::schema::Schema;

/// Capability trait - implement to add new tools
///
/// Schemas are built once per type. The usual shape is a function-local
/// `static` cell:
///
/// ```rust,ignore
/// fn arguments_schema(&self) -> Result<&Schema> {
///     static SCHEMA: OnceCell<Schema> = OnceCell::new();
///     SCHEMA.get_or_try_init(|| SchemaBuilder::new().string("q", "Query").build())
/// }
/// ```
#[async_trait]
pub trait Capability: Send + Sync {
    /// Stable identifier. Defaults to the snake_cased type name with any
    /// `Tool`/`Capability` suffix removed.
    fn name(&self) -> String {
        default_name(std::any::type_name::<Self>())
    }

    /// Shown to the model. No default.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Strict schema the arguments must satisfy
    fn arguments_schema(&self) -> Result<&Schema>;

    /// Example arguments object. No default.
    fn example_invocation(&self) -> Option<Value> {
        None
    }

    /// Executed by the provider itself rather than by the agent
    fn provider_managed(&self) -> bool {
        false
    }

    /// Whether the formatted result is shown to the model on the next turn.
    ///
    /// When `false`, the model only receives the acknowledgement
    /// `Tool '<name>' completed.` and the loop continues as usual.
    fn renders_observation_to_model(&self) -> bool {
        true
    }

    /// Execution logic. The invocation has already been validated.
    async fn process_invocation(&self, invocation: &Invocation) -> Result<Value>;

    /// Text the model sees as the observation for a completed invocation
    fn format_observation(&self, invocation: &Invocation) -> String {
        match &invocation.result {
            Some(Value::String(text)) => text.clone(),
            Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            None => String::new(),
        }
    }
}

/// Derived behaviour shared by every capability
pub trait CapabilityExt: Capability {
    fn require_description(&self) -> Result<&str> {
        self.description()
            .ok_or_else(|| AgentError::CapabilityIncomplete {
                capability: self.name(),
                field: "description",
            })
    }

    fn require_example(&self) -> Result<Value> {
        self.example_invocation()
            .ok_or_else(|| AgentError::CapabilityIncomplete {
                capability: self.name(),
                field: "example invocation",
            })
    }

    /// Deterministic block used verbatim in system prompts
    fn description_for_llm(&self) -> Result<String> {
        let name = self.name();
        let description = self.require_description()?;
        let schema = self.arguments_schema()?.to_pretty_json();
        let example = json!({ "tool": name, "arguments": self.require_example()? });
        let example = serde_json::to_string_pretty(&example)?;

        Ok(format!(
            "Name: {name}\nDescription: {description}\nArguments Schema:\n{schema}\nExample Usage:\n{example}"
        ))
    }

    /// Descriptor handed to the gateway for native tool calling
    fn descriptor(&self) -> Result<ToolDescriptor> {
        Ok(ToolDescriptor {
            name: self.name(),
            description: self.require_description()?.to_string(),
            parameters: self.arguments_schema()?.as_value().clone(),
            provider_managed: self.provider_managed(),
        })
    }
}

impl<T: Capability + ?Sized> CapabilityExt for T {}

/// `crate::tools::WebSearchTool` -> `web_search`
pub fn default_name(type_name: &str) -> String {
    let path = type_name.split('<').next().unwrap_or(type_name);
    let ident = path.rsplit("::").next().unwrap_or(path);
    let ident = ["Capability", "Tool"]
        .iter()
        .find_map(|suffix| ident.strip_suffix(suffix).filter(|s| !s.is_empty()))
        .unwrap_or(ident);
    snake_case(ident)
}

fn snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1);
            let boundary = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
                || (prev.is_some_and(char::is_uppercase) && next.is_some_and(|n| n.is_lowercase()));
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoTool, Undocumented};

    #[test]
    fn test_default_name() {
        assert_eq!(default_name("agent_core::tools::WebSearchTool"), "web_search");
        assert_eq!(default_name("my_crate::FinalAnswer"), "final_answer");
        assert_eq!(default_name("my_crate::HTTPGetCapability"), "http_get");
        assert_eq!(default_name("my_crate::Tool"), "tool");
        assert_eq!(default_name("my_crate::Wrapper<my_crate::Inner>"), "wrapper");
    }

    #[test]
    fn test_name_derives_from_type() {
        assert_eq!(EchoTool.name(), "echo");
        assert_eq!(Undocumented.name(), "undocumented");
    }

    #[test]
    fn test_description_for_llm_layout() {
        let text = EchoTool.description_for_llm().unwrap();
        let expected_schema = EchoTool.arguments_schema().unwrap().to_pretty_json();

        assert!(text.starts_with("Name: echo\nDescription: Echoes its input back\nArguments Schema:\n"));
        assert!(text.contains(&expected_schema));
        let (_, example) = text.split_once("Example Usage:\n").unwrap();
        let example: Value = serde_json::from_str(example).unwrap();
        assert_eq!(example, json!({"tool": "echo", "arguments": {"text": "hello"}}));
    }

    #[test]
    fn test_description_for_llm_is_stable() {
        assert_eq!(
            EchoTool.description_for_llm().unwrap(),
            EchoTool.description_for_llm().unwrap()
        );
    }

    #[test]
    fn test_missing_fields_raise_at_first_use() {
        let err = Undocumented.description_for_llm().unwrap_err();
        assert!(matches!(
            err,
            AgentError::CapabilityIncomplete { field: "description", .. }
        ));

        let err = Undocumented.require_example().unwrap_err();
        assert!(matches!(
            err,
            AgentError::CapabilityIncomplete { field: "example invocation", .. }
        ));
    }

    #[test]
    fn test_descriptor() {
        let descriptor = EchoTool.descriptor().unwrap();
        assert_eq!(descriptor.name, "echo");
        assert_eq!(descriptor.parameters["required"], json!(["text"]));
        assert!(!descriptor.provider_managed);
    }
}
