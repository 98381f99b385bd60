//! Backup file decoding.

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::VersionToken;

const DATA_MODULE_PREFIX: &str = "export const INITIAL_DATA =";

/// Parse backup text. Plain JSON is tried first; failing that, the text is
/// treated as an exported data module and the object literal is extracted.
pub fn parse_backup_text(text: &str) -> Result<Value, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Parse("Backup file is empty".to_string()));
    }

    let strict_err = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let Some(cleaned) = strip_data_module(text) else {
        return Err(AppError::Parse(format!("Backup is not valid JSON: {}", strict_err)));
    };
    tracing::info!("Backup is not plain JSON, recovered object literal from data module");
    serde_json::from_str(&cleaned)
        .map_err(|err| AppError::Parse(format!("Backup is not valid JSON: {}", err)))
}

/// Object literal of a `export const INITIAL_DATA = {...};` module, without
/// import statements or whole-line comments.
fn strip_data_module(text: &str) -> Option<String> {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let line = line.trim();
            let is_import = line.starts_with("import ") && line.ends_with(';');
            !is_import && !line.starts_with("//")
        })
        .collect();
    let joined = kept.join("\n").replacen(DATA_MODULE_PREFIX, "", 1);

    let body = joined.trim();
    let body = body.strip_suffix(';').unwrap_or(body);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| body[start..=end].to_string())
}

/// A backup that passed structural validation. Sections are still raw; they
/// go through the sanitizer when the write plan is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBackup {
    pub version: VersionToken,
    pub theme: Map<String, Value>,
    pub products: Vec<Value>,
    pub categories: Value,
}

/// Layouts a backup file may use.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupSchema {
    /// `{version, theme, products, categories}`
    Current(ValidatedBackup),
    /// `{version, theme, content: {products, categories}}` from older exports
    LegacyNested(ValidatedBackup),
    Invalid(String),
}

impl BackupSchema {
    pub fn decode(mut json: Value) -> Self {
        let Some(root) = json.as_object_mut() else {
            return BackupSchema::Invalid("Backup is not a JSON object".to_string());
        };

        let version = match VersionToken::from_json(root.get("version")) {
            v if v.is_empty() => VersionToken::now(),
            v => v,
        };
        let theme = match root.remove("theme") {
            Some(Value::Object(theme)) => theme,
            _ => return BackupSchema::Invalid("Invalid structure: missing theme".to_string()),
        };

        let (products, categories, nested) = match root.remove("products") {
            Some(Value::Array(products)) => (products, root.remove("categories"), false),
            _ => {
                let Some(Value::Object(mut content)) = root.remove("content") else {
                    return BackupSchema::Invalid(
                        "Invalid structure: missing products".to_string(),
                    );
                };
                match content.remove("products") {
                    Some(Value::Array(products)) => (products, content.remove("categories"), true),
                    _ => {
                        return BackupSchema::Invalid(
                            "Invalid structure: missing products".to_string(),
                        )
                    }
                }
            }
        };

        let categories = match categories {
            Some(categories @ Value::Array(_)) => categories,
            _ => return BackupSchema::Invalid("Invalid structure: missing categories".to_string()),
        };

        let backup = ValidatedBackup {
            version,
            theme,
            products,
            categories,
        };
        if nested {
            BackupSchema::LegacyNested(backup)
        } else {
            BackupSchema::Current(backup)
        }
    }

    pub fn into_result(self) -> Result<ValidatedBackup, AppError> {
        match self {
            BackupSchema::Current(backup) => Ok(backup),
            BackupSchema::LegacyNested(backup) => {
                tracing::info!("Restoring backup in the nested content layout");
                Ok(backup)
            }
            BackupSchema::Invalid(reason) => Err(AppError::Validation(reason)),
        }
    }
}
