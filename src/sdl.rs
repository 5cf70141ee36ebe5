//! Gel schema (SDL) generation.
//!
//! ```text
//! module auth {
//!   scalar type Role extending enum<admin, member>;
//!
//!   type user {
//!     required email: str {
//!       constraint exclusive;
//!     }
//!     role: Role;
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{AdapterConfig, IndexSpec};
use crate::error::{GelError, GelResult};
use crate::schema::*;

/// Field declarations of one type plus the enums they need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFields {
    /// Enum name to its `scalar type` declaration.
    pub scalar_enum_types: IndexMap<String, String>,
    /// Declaration lines, joined for a type body.
    pub fields: String,
}

fn insert_enum(
    enums: &mut IndexMap<String, String>,
    name: String,
    declaration: String,
) -> GelResult<bool> {
    match enums.get(&name) {
        Some(existing) if *existing == declaration => Ok(false),
        Some(_) => Err(GelError::ConflictingEnum { name }),
        None => {
            enums.insert(name, declaration);
            Ok(true)
        }
    }
}

/// A primitive kind, and whether the field is multi-valued.
fn primitive_kind(
    key: &str,
    attr: &FieldAttribute,
    enums: &mut IndexMap<String, String>,
) -> GelResult<(String, bool)> {
    let kind = match &attr.field_type {
        FieldType::String => ("str".to_string(), false),
        FieldType::Number => ("int".to_string(), false),
        FieldType::Boolean => ("bool".to_string(), false),
        FieldType::Date => ("datetime".to_string(), false),
        FieldType::Json => ("json".to_string(), false),
        FieldType::StringArray => ("str".to_string(), true),
        FieldType::NumberArray => ("int".to_string(), true),
        FieldType::Enum(literals) => {
            let name = capitalize(attr.field_name.as_deref().unwrap_or(key));
            let declaration = format!(
                "scalar type {name} extending enum<{}>;",
                literals.join(", ")
            );
            insert_enum(enums, name.clone(), declaration)?;
            (name, false)
        }
    };
    Ok(kind)
}

/// Generate the body of one type.
///
/// Reference fields become links named after the target model, typed with
/// its Gel type name, and get a `key := .link.id` shortcut. Single-field
/// indexes on unique or reference fields are skipped since those already
/// carry one; composite indexes are always emitted.
pub fn generate_fields(
    schema: &Schema,
    fields: &IndexMap<String, FieldAttribute>,
    indexes: &[IndexSpec],
    use_plural: bool,
) -> GelResult<GeneratedFields> {
    let mut scalar_enum_types = IndexMap::new();
    let mut lines = Vec::new();
    let mut shortcuts = Vec::new();

    for (key, attr) in fields {
        if key == IDENTITY_FIELD {
            continue;
        }

        let (mut kind, multi) = primitive_kind(key, attr, &mut scalar_enum_types)?;
        let mut name = key.clone();
        let mut constraints = Vec::new();

        if attr.unique {
            constraints.push("constraint exclusive");
        }

        if let Some(reference) = &attr.references {
            kind = schema.type_name(&reference.model, use_plural)?;
            name = reference.model.clone();
            shortcuts.push(format!("{key} := .{name}.{IDENTITY_FIELD};"));
            match reference.on_delete {
                Some(OnDelete::Cascade) => constraints.push("on target delete delete source"),
                Some(OnDelete::SetNull) => constraints.push("on target delete allow"),
                _ => {}
            }
        }

        let mut decl = format!("{name}: {kind}");
        if multi {
            decl = format!("multi {decl}");
        }
        if attr.required {
            decl = format!("required {decl}");
        }
        if constraints.is_empty() {
            lines.push(format!("{decl};"));
        } else {
            lines.push(format!(
                "{decl} {{\n      {};\n    }}",
                constraints.join(";\n      ")
            ));
        }
    }

    lines.extend(shortcuts);

    for index in indexes {
        match index {
            IndexSpec::Single(field) => {
                let Some(attr) = fields.get(field) else {
                    continue;
                };
                if attr.unique || attr.references.is_some() {
                    continue;
                }
                lines.push(format!("index on (.{field});"));
            }
            IndexSpec::Composite(group) => {
                let paths: Vec<String> = group.iter().map(|f| format!(".{f}")).collect();
                lines.push(format!("index on (({}));", paths.join(", ")));
            }
        }
    }

    Ok(GeneratedFields {
        scalar_enum_types,
        fields: lines.join("\n    "),
    })
}

/// Generate a complete module block for every model in `schema`.
///
/// Enum declarations are emitted once per module, before the first type
/// that needs them.
pub fn emit_module(schema: &Schema, config: &AdapterConfig) -> GelResult<String> {
    let mut enums = IndexMap::new();
    let mut blocks = Vec::new();

    for (key, model) in schema.models() {
        let generated = generate_fields(
            schema,
            &model.fields,
            config.indexes_for(key),
            config.use_plural,
        )?;

        for (name, declaration) in generated.scalar_enum_types {
            if insert_enum(&mut enums, name, declaration.clone())? {
                blocks.push(declaration);
            }
        }

        let type_name = schema.type_name(key, config.use_plural)?;
        if generated.fields.is_empty() {
            blocks.push(format!("type {type_name} {{}}"));
        } else {
            blocks.push(format!(
                "type {type_name} {{\n    {}\n  }}",
                generated.fields
            ));
        }
    }

    Ok(format!(
        "module {} {{\n  {}\n}}\n",
        config.module_name,
        blocks.join("\n\n  ")
    ))
}

/// A generated schema file, ready for whoever writes files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaFile {
    pub path: PathBuf,
    pub append: bool,
    pub overwrite: bool,
    pub code: String,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>, code: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            append: false,
            overwrite: true,
            code: code.into(),
        }
    }

    /// Write the file under `base`, creating parent directories.
    pub fn write(&self, base: &Path) -> GelResult<PathBuf> {
        let path = base.join(&self.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &self.code)?;
        Ok(path)
    }
}
