use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value, json};

use super::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Closed set of string literals.
    Enum(Vec<String>),
    Object(SchemaDescriptor),
    List(Box<FieldKind>),
}

impl FieldKind {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn list_of(item: FieldKind) -> Self {
        Self::List(Box::new(item))
    }

    fn validate<'a>(
        &'a self,
        schema_name: &str,
        field_name: &str,
        seen: &mut BTreeMap<&'a str, &'a SchemaDescriptor>,
    ) -> Result<(), GenerationError> {
        match self {
            Self::Enum(values) => {
                if values.is_empty() {
                    return Err(GenerationError::invalid_request(format!(
                        "enum field '{schema_name}.{field_name}' must allow at least one value"
                    )));
                }
                let mut unique = HashSet::new();
                for value in values {
                    if !unique.insert(value.as_str()) {
                        return Err(GenerationError::invalid_request(format!(
                            "enum field '{schema_name}.{field_name}' lists '{value}' more than once"
                        )));
                    }
                }
                Ok(())
            }
            Self::Object(schema) => schema.validate_nested(seen),
            Self::List(item) => item.validate(schema_name, field_name, seen),
            Self::String | Self::Integer | Self::Number | Self::Boolean => Ok(()),
        }
    }

    fn requires_every_field(&self) -> bool {
        match self {
            Self::Object(schema) => schema.requires_every_field(),
            Self::List(item) => item.requires_every_field(),
            _ => true,
        }
    }

    fn type_schema(&self, defs: &mut BTreeMap<String, Value>) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
            Self::Object(schema) => {
                schema.register_definition(defs);
                json!({ "$ref": format!("#/$defs/{}", schema.name) })
            }
            Self::List(item) => json!({ "type": "array", "items": item.type_schema(defs) }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Steers the model; rendered as the JSON Schema `description`.
    pub description: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    pub fn enumeration<I, S>(
        name: impl Into<String>,
        values: I,
        description: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, FieldKind::enumeration(values), description)
    }

    pub fn object(
        name: impl Into<String>,
        schema: SchemaDescriptor,
        description: impl Into<String>,
    ) -> Self {
        Self::new(name, FieldKind::Object(schema), description)
    }

    pub fn list(name: impl Into<String>, item: FieldKind, description: impl Into<String>) -> Self {
        Self::new(name, FieldKind::list_of(item), description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn property_schema(&self, defs: &mut BTreeMap<String, Value>) -> Value {
        let mut schema = self.kind.type_schema(defs);
        let description = self.description.trim();
        if !description.is_empty()
            && let Value::Object(map) = &mut schema
        {
            map.insert("description".to_string(), json!(description));
        }
        schema
    }
}

/// Language-agnostic description of the value a backend must produce.
///
/// Built with [`SchemaDescriptor::new`] and [`SchemaDescriptor::field`]; the
/// structural invariants are checked by [`SchemaDescriptor::validate`], which
/// every generation call runs before touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    name: String,
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// True when no field, here or in a nested object, is optional.
    /// OpenAI strict mode only accepts such schemas.
    pub fn requires_every_field(&self) -> bool {
        self.fields
            .iter()
            .all(|field| field.required && field.kind.requires_every_field())
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        let mut seen = BTreeMap::new();
        self.validate_nested(&mut seen)
    }

    fn validate_nested<'a>(
        &'a self,
        seen: &mut BTreeMap<&'a str, &'a SchemaDescriptor>,
    ) -> Result<(), GenerationError> {
        let name = self.name.as_str();
        if !is_valid_schema_name(name) {
            return Err(GenerationError::invalid_request(format!(
                "schema name '{name}' must be non-empty and use only ASCII letters, digits, '_' or '-'"
            )));
        }
        if let Some(existing) = seen.get(name) {
            // Nested descriptors share one `$defs` entry per name.
            if *existing != self {
                return Err(GenerationError::invalid_request(format!(
                    "schema name '{name}' is used by two different descriptors"
                )));
            }
            return Ok(());
        }
        seen.insert(name, self);

        if self.fields.is_empty() {
            return Err(GenerationError::invalid_request(format!(
                "schema '{name}' must declare at least one field"
            )));
        }

        let mut field_names = HashSet::new();
        for field in &self.fields {
            let field_name = field.name.as_str();
            if field_name.trim().is_empty() {
                return Err(GenerationError::invalid_request(format!(
                    "schema '{name}' has a field with an empty name"
                )));
            }
            if !field_names.insert(field_name) {
                return Err(GenerationError::invalid_request(format!(
                    "schema '{name}' declares field '{field_name}' more than once"
                )));
            }
            field.kind.validate(name, field_name, seen)?;
        }
        Ok(())
    }

    /// Renders the descriptor as a JSON Schema object. Nested objects are
    /// emitted once under `$defs` and referenced by `$ref`.
    pub fn to_json_schema(&self) -> Value {
        let mut defs = BTreeMap::new();
        let mut root = self.object_schema(&mut defs);
        if !defs.is_empty()
            && let Value::Object(map) = &mut root
        {
            map.insert(
                "$defs".to_string(),
                Value::Object(defs.into_iter().collect()),
            );
        }
        root
    }

    fn object_schema(&self, defs: &mut BTreeMap<String, Value>) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.property_schema(defs));
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("title".to_string(), json!(self.name));
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), json!(description));
        }
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        schema.insert("additionalProperties".to_string(), Value::Bool(false));
        Value::Object(schema)
    }

    fn register_definition(&self, defs: &mut BTreeMap<String, Value>) {
        if defs.contains_key(&self.name) {
            return;
        }
        // Placeholder first so self-referencing descriptors terminate.
        defs.insert(self.name.clone(), Value::Null);
        let rendered = self.object_schema(defs);
        defs.insert(self.name.clone(), rendered);
    }
}

fn is_valid_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}
