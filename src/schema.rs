//! Logical schema supplied by the auth framework, and lookups over it.
//!
//! A [`Schema`] maps model names to their fields. It can be loaded from JSON:
//!
//! ```
//! use gel_auth::schema::{FieldType, Schema};
//!
//! let json = r#"{
//!     "user": {
//!         "modelName": "user",
//!         "fields": {
//!             "email": { "type": "string", "unique": true, "required": true },
//!             "role": { "type": ["admin", "member"] }
//!         }
//!     }
//! }"#;
//!
//! let schema: Schema = serde_json::from_str(json).unwrap();
//! let user = schema.model("user").unwrap();
//! assert_eq!(user.fields["email"].field_type, FieldType::String);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::Operator;
use crate::error::{GelError, GelResult};

/// Name of the identity field every Gel object carries.
pub const IDENTITY_FIELD: &str = "id";

/// Logical type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldTypeRepr", into = "FieldTypeRepr")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    StringArray,
    NumberArray,
    /// A closed set of literal values.
    Enum(Vec<String>),
}

impl FieldType {
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::StringArray | FieldType::NumberArray)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FieldTypeRepr {
    Name(String),
    Literals(Vec<String>),
}

impl TryFrom<FieldTypeRepr> for FieldType {
    type Error = String;

    fn try_from(repr: FieldTypeRepr) -> Result<Self, Self::Error> {
        match repr {
            FieldTypeRepr::Name(name) => match name.as_str() {
                "string" => Ok(FieldType::String),
                "number" => Ok(FieldType::Number),
                "boolean" => Ok(FieldType::Boolean),
                "date" => Ok(FieldType::Date),
                "json" => Ok(FieldType::Json),
                "string[]" => Ok(FieldType::StringArray),
                "number[]" => Ok(FieldType::NumberArray),
                other => Err(format!("unknown field type '{other}'")),
            },
            FieldTypeRepr::Literals(literals) if literals.is_empty() => {
                Err("enum field type needs at least one literal".to_string())
            }
            FieldTypeRepr::Literals(literals) => Ok(FieldType::Enum(literals)),
        }
    }
}

impl From<FieldType> for FieldTypeRepr {
    fn from(ty: FieldType) -> Self {
        let name = match ty {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::StringArray => "string[]",
            FieldType::NumberArray => "number[]",
            FieldType::Enum(literals) => return FieldTypeRepr::Literals(literals),
        };
        FieldTypeRepr::Name(name.to_string())
    }
}

/// What happens to a referencing object when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    #[serde(rename = "cascade")]
    Cascade,
    #[serde(rename = "restrict")]
    Restrict,
    #[serde(rename = "set null")]
    SetNull,
    #[serde(rename = "set default")]
    SetDefault,
    #[serde(rename = "no action")]
    NoAction,
}

/// Foreign-key-like reference to another model's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub model: String,
    #[serde(default = "default_reference_field")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<OnDelete>,
}

fn default_reference_field() -> String {
    IDENTITY_FIELD.to_string()
}

impl Reference {
    pub fn cascades(&self) -> bool {
        self.on_delete == Some(OnDelete::Cascade)
    }
}

/// Metadata describing one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAttribute {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    /// Name the framework uses for this field when it differs from the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

impl FieldAttribute {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            unique: false,
            field_name: None,
            references: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    pub fn references(mut self, reference: Reference) -> Self {
        self.references = Some(reference);
        self
    }
}

static IDENTITY: FieldAttribute = FieldAttribute {
    field_type: FieldType::String,
    required: true,
    unique: true,
    field_name: None,
    references: None,
};

/// A named entity type and its fields, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldAttribute>,
}

impl Model {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, attr: FieldAttribute) -> Self {
        self.fields.insert(key.into(), attr);
        self
    }
}

/// Logical schema: model name to model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(IndexMap<String, Model>);

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model(&mut self, key: impl Into<String>, model: Model) {
        self.0.insert(key.into(), model);
    }

    pub fn with_model(mut self, key: impl Into<String>, model: Model) -> Self {
        self.add_model(key, model);
        self
    }

    /// Look up a model, failing when it is absent.
    pub fn model(&self, name: &str) -> GelResult<&Model> {
        self.0
            .get(name)
            .ok_or_else(|| GelError::ModelNotFound(name.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &Model)> {
        self.0.iter().map(|(k, m)| (k.as_str(), m))
    }

    /// Gel type name for a model: its `modelName` (or key), pluralized on request.
    pub fn type_name(&self, model: &str, use_plural: bool) -> GelResult<String> {
        let base = self
            .model(model)?
            .model_name
            .as_deref()
            .unwrap_or(model);
        if use_plural && !base.ends_with('s') {
            Ok(format!("{base}s"))
        } else {
            Ok(base.to_string())
        }
    }
}

/// A resolved field: its logical key and attributes.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub key: &'a str,
    pub attr: &'a FieldAttribute,
}

impl<'a> FieldRef<'a> {
    /// The framework-facing name of the field.
    pub fn physical_name(&self) -> &'a str {
        self.attr.field_name.as_deref().unwrap_or(self.key)
    }

    pub fn is_identity(&self) -> bool {
        self.key == IDENTITY_FIELD
    }

    pub fn reference(&self) -> Option<&'a Reference> {
        self.attr.references.as_ref()
    }

    /// Path used to compare this field inside a filter.
    pub fn filter_path(&self) -> String {
        match self.reference() {
            Some(r) => format!(".{}.{IDENTITY_FIELD}", r.model),
            None => format!(".{}", self.key),
        }
    }
}

/// Field lookup table for one model, keyed by both logical and physical names.
#[derive(Debug, Clone)]
pub struct FieldMapping<'a> {
    model: &'a str,
    fields: &'a IndexMap<String, FieldAttribute>,
    by_name: IndexMap<&'a str, FieldRef<'a>>,
}

impl<'a> FieldMapping<'a> {
    pub fn model(&self) -> &'a str {
        self.model
    }

    /// Look up a field by logical or physical name.
    pub fn get(&self, name: &str) -> Option<FieldRef<'a>> {
        if let Some(field) = self.by_name.get(name) {
            return Some(*field);
        }
        (name == IDENTITY_FIELD).then_some(FieldRef {
            key: IDENTITY_FIELD,
            attr: &IDENTITY,
        })
    }

    /// Like [`FieldMapping::get`] but fails on unknown names.
    pub fn resolve(&self, name: &str) -> GelResult<FieldRef<'a>> {
        self.get(name)
            .ok_or_else(|| GelError::field_not_found(self.model, name))
    }

    /// Declared fields in schema order (the implicit identity is not included).
    pub fn fields(&self) -> impl Iterator<Item = FieldRef<'a>> + 'a {
        let fields: &'a IndexMap<String, FieldAttribute> = self.fields;
        fields.iter().map(|(key, attr)| FieldRef {
            key: key.as_str(),
            attr,
        })
    }
}

/// Build the field lookup table for `model`.
///
/// Both the logical key and, when present and different, the physical
/// `fieldName` point at the same attribute.
pub fn field_mapping<'a>(model: &'a str, schema: &'a Schema) -> GelResult<FieldMapping<'a>> {
    let fields = &schema.model(model)?.fields;
    let mut by_name = IndexMap::new();

    for (key, attr) in fields {
        let field = FieldRef {
            key: key.as_str(),
            attr,
        };
        by_name.insert(key.as_str(), field);
        if let Some(name) = attr.field_name.as_deref() {
            if name != key {
                by_name.insert(name, field);
            }
        }
    }

    Ok(FieldMapping {
        model,
        fields,
        by_name,
    })
}

/// Gel type used in `<type>` casts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GelType {
    Uuid,
    Str,
    Int,
    Bool,
    Datetime,
    Json,
    /// A synthesized scalar enum.
    Enum(String),
    Array(Box<GelType>),
}

impl GelType {
    pub fn array(self) -> Self {
        match self {
            GelType::Array(_) => self,
            other => GelType::Array(Box::new(other)),
        }
    }
}

impl std::fmt::Display for GelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GelType::Uuid => f.write_str("uuid"),
            GelType::Str => f.write_str("str"),
            GelType::Int => f.write_str("int"),
            GelType::Bool => f.write_str("bool"),
            GelType::Datetime => f.write_str("datetime"),
            GelType::Json => f.write_str("json"),
            GelType::Enum(name) => f.write_str(name),
            GelType::Array(inner) => write!(f, "array<{inner}>"),
        }
    }
}

/// Uppercase the first character, leaving the rest untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cast target for a field.
///
/// The identity field is always `uuid`. Under `in` every scalar type takes
/// its array form, since the bound argument is unpacked at the predicate.
pub fn gel_type(
    field: &str,
    field_type: &FieldType,
    field_name: Option<&str>,
    operator: Option<Operator>,
) -> GelType {
    let membership = operator == Some(Operator::In);

    let scalar = if field == IDENTITY_FIELD {
        GelType::Uuid
    } else {
        match field_type {
            FieldType::String => GelType::Str,
            FieldType::Number => GelType::Int,
            FieldType::Boolean => GelType::Bool,
            FieldType::Date => GelType::Datetime,
            FieldType::Json => GelType::Json,
            FieldType::StringArray => return GelType::Str.array(),
            FieldType::NumberArray => return GelType::Int.array(),
            FieldType::Enum(_) => GelType::Enum(capitalize(field_name.unwrap_or(field))),
        }
    };

    if membership { scalar.array() } else { scalar }
}
