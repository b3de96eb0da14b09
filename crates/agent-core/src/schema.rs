//! Argument Schemas
//!
//! Declarative builder for the JSON-schema subset used to describe tool
//! arguments to the model and to validate what the model sends back.
//!
//! The builder is strict: every property lands in its object's `required`
//! list and every object node carries `additionalProperties: false`. There
//! is no optional property. Providers that offer "structured outputs" only
//! accept schemas of this shape.
//!
//! ```rust,ignore
//! let schema = SchemaBuilder::new()
//!     .string("query", "What to search for")
//!     .integer("limit", Attrs::described("Max results").minimum(1))
//!     .array("tags", Attrs::default(), |a| a.items(json!({"type": "string"})))
//!     .object("filters", Attrs::default(), |o| o.string("lang", "ISO code"))
//!     .build()?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};

/// A finished, strict argument schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Value);

impl Schema {
    /// Wrap a raw schema value, forcing strict mode on every object node
    pub fn from_value(mut value: Value) -> Self {
        enforce_strict(&mut value);
        Self(value)
    }

    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Pretty-printed form used inside prompts and observations
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }

    /// Validate an instance, collecting every violation
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        validate_node(&self.0, instance, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance).is_ok()
    }
}

/// One schema violation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-pointer style location, empty for the root
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Options attached to a single property
#[derive(Clone, Debug, Default)]
pub struct Attrs {
    fields: Map<String, Value>,
    nullable: bool,
}

impl Attrs {
    pub fn described(description: impl Into<String>) -> Self {
        Self::default().description(description)
    }

    #[must_use]
    pub fn description(self, description: impl Into<String>) -> Self {
        self.with("description", Value::String(description.into()))
    }

    /// Restrict the value to a fixed set
    #[must_use]
    pub fn enum_values<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with("enum", Value::Array(values))
    }

    #[must_use]
    pub fn minimum(self, minimum: impl Into<Value>) -> Self {
        self.with("minimum", minimum.into())
    }

    #[must_use]
    pub fn maximum(self, maximum: impl Into<Value>) -> Self {
        self.with("maximum", maximum.into())
    }

    #[must_use]
    pub fn min_items(self, count: u64) -> Self {
        self.with("minItems", json!(count))
    }

    #[must_use]
    pub fn max_items(self, count: u64) -> Self {
        self.with("maxItems", json!(count))
    }

    /// Still required, but `null` is an accepted value
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Any other keyword, passed through as-is
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    fn into_node(self, kind: &str) -> Map<String, Value> {
        let mut node = Map::new();
        node.insert("type".into(), type_value(kind, self.nullable));
        node.extend(self.fields);
        node
    }
}

impl From<&str> for Attrs {
    fn from(description: &str) -> Self {
        Self::described(description)
    }
}

impl From<String> for Attrs {
    fn from(description: String) -> Self {
        Self::described(description)
    }
}

fn type_value(kind: &str, nullable: bool) -> Value {
    if nullable {
        json!([kind, "null"])
    } else {
        Value::String(kind.into())
    }
}

/// Builder for an object node (the root, or a nested object)
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
    misuse: Vec<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn string(self, name: impl Into<String>, attrs: impl Into<Attrs>) -> Self {
        self.primitive(name.into(), "string", attrs.into())
    }

    #[must_use]
    pub fn integer(self, name: impl Into<String>, attrs: impl Into<Attrs>) -> Self {
        self.primitive(name.into(), "integer", attrs.into())
    }

    #[must_use]
    pub fn number(self, name: impl Into<String>, attrs: impl Into<Attrs>) -> Self {
        self.primitive(name.into(), "number", attrs.into())
    }

    #[must_use]
    pub fn boolean(self, name: impl Into<String>, attrs: impl Into<Attrs>) -> Self {
        self.primitive(name.into(), "boolean", attrs.into())
    }

    /// Attach a nested, required sub-object
    #[must_use]
    pub fn object<F>(self, name: impl Into<String>, attrs: impl Into<Attrs>, build: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let nested = build(Self::new());
        let mut misuse = nested.misuse.clone();
        let node = nested.into_object_node(attrs.into());
        let name = name.into();
        let mut this = self.insert(name.clone(), node);
        this.misuse
            .extend(misuse.drain(..).map(|m| format!("{name}.{m}")));
        this
    }

    /// Attach a required array; the block defines its items
    #[must_use]
    pub fn array<F>(self, name: impl Into<String>, attrs: impl Into<Attrs>, build: F) -> Self
    where
        F: FnOnce(ArrayBuilder) -> ArrayBuilder,
    {
        let name = name.into();
        let array = build(ArrayBuilder::default());
        let mut node = attrs.into().into_node("array");
        let mut this = self;

        match array.items {
            Some(Ok(items)) => {
                node.insert("items".into(), items);
            }
            Some(Err(mut misuse)) => {
                this.misuse
                    .extend(misuse.drain(..).map(|m| format!("{name}[].{m}")));
            }
            None => this
                .misuse
                .push(format!("array '{name}' declares no item schema")),
        }

        this.insert(name, Value::Object(node))
    }

    /// Produce the canonical root schema
    pub fn build(self) -> Result<Schema> {
        if !self.misuse.is_empty() {
            return Err(AgentError::SchemaMisuse(self.misuse.join("; ")));
        }
        Ok(Schema(self.into_object_node(Attrs::default())))
    }

    fn primitive(self, name: String, kind: &str, attrs: Attrs) -> Self {
        let node = attrs.into_node(kind);
        self.insert(name, Value::Object(node))
    }

    fn insert(mut self, name: String, node: Value) -> Self {
        if self.properties.contains_key(&name) {
            self.misuse.push(format!("property '{name}' declared twice"));
            return self;
        }
        self.required.push(name.clone());
        self.properties.insert(name, node);
        self
    }

    fn into_object_node(self, attrs: Attrs) -> Value {
        let mut node = attrs.into_node("object");
        node.insert("additionalProperties".into(), Value::Bool(false));
        node.insert("properties".into(), Value::Object(self.properties));
        node.insert(
            "required".into(),
            Value::Array(self.required.into_iter().map(Value::String).collect()),
        );
        Value::Object(node)
    }
}

/// Item definition for an array property
#[derive(Debug, Default)]
pub struct ArrayBuilder {
    items: Option<std::result::Result<Value, Vec<String>>>,
}

impl ArrayBuilder {
    /// Use a raw item descriptor; object nodes inside it are made strict
    #[must_use]
    pub fn items(mut self, descriptor: Value) -> Self {
        let mut descriptor = descriptor;
        enforce_strict(&mut descriptor);
        self.items = Some(Ok(descriptor));
        self
    }

    /// Items are objects described by the block
    #[must_use]
    pub fn object<F>(mut self, build: F) -> Self
    where
        F: FnOnce(SchemaBuilder) -> SchemaBuilder,
    {
        let nested = build(SchemaBuilder::new());
        self.items = Some(if nested.misuse.is_empty() {
            Ok(nested.into_object_node(Attrs::default()))
        } else {
            Err(nested.misuse)
        });
        self
    }
}

/// Make every object node in `value` strict, recursively
fn enforce_strict(value: &mut Value) {
    let Value::Object(node) = value else {
        return;
    };

    let is_object = match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(ts)) => ts.iter().any(|t| t == "object"),
        _ => node.contains_key("properties"),
    };

    if let Some(Value::Object(props)) = node.get_mut("properties") {
        for child in props.values_mut() {
            enforce_strict(child);
        }
    }
    if let Some(items) = node.get_mut("items") {
        enforce_strict(items);
    }

    if is_object {
        let keys: Vec<Value> = match node.get("properties") {
            Some(Value::Object(props)) => props.keys().cloned().map(Value::String).collect(),
            _ => Vec::new(),
        };
        node.entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        node.insert("required".into(), Value::Array(keys));
        node.insert("additionalProperties".into(), Value::Bool(false));
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(expected: &str, instance: &Value) -> bool {
    match expected {
        "null" => instance.is_null(),
        "boolean" => instance.is_boolean(),
        "string" => instance.is_string(),
        "array" => instance.is_array(),
        "object" => instance.is_object(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => true,
    }
}

fn validate_node(schema: &Value, instance: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Value::Object(schema) = schema else {
        return;
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, instance)) {
            errors.push(ValidationError::new(
                path,
                format!("expected {}, found {}", allowed.join(" or "), type_name(instance)),
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(instance) {
            let listed = options.iter().map(ToString::to_string).collect::<Vec<_>>();
            errors.push(ValidationError::new(
                path,
                format!("must be one of {}", listed.join(", ")),
            ));
        }
    }

    match instance {
        Value::Object(map) => validate_object(schema, map, path, errors),
        Value::Array(items) => validate_array(schema, items, path, errors),
        Value::Number(n) => {
            let value = n.as_f64().unwrap_or_default();
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if value < min {
                    errors.push(ValidationError::new(path, format!("must be >= {min}")));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if value > max {
                    errors.push(ValidationError::new(path, format!("must be <= {max}")));
                }
            }
        }
        _ => {}
    }
}

fn validate_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                errors.push(ValidationError::new(format!("{path}/{key}"), "is required"));
            }
        }
    }

    let closed = matches!(schema.get("additionalProperties"), Some(Value::Bool(false)));

    for (key, value) in map {
        let child_path = format!("{path}/{key}");
        match properties.and_then(|p| p.get(key)) {
            Some(child) => validate_node(child, value, &child_path, errors),
            None if closed => errors.push(ValidationError::new(child_path, "is not allowed")),
            None => {}
        }
    }
}

fn validate_array(
    schema: &Map<String, Value>,
    items: &[Value],
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let len = items.len() as u64;
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if len < min {
            errors.push(ValidationError::new(path, format!("needs at least {min} items")));
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if len > max {
            errors.push(ValidationError::new(path, format!("allows at most {max} items")));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter().enumerate() {
            validate_node(item_schema, item, &format!("{path}/{i}"), errors);
        }
    }
}
