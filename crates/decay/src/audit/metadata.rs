//! Front matter: the YAML header block between `---` fences at the top of a
//! document.
//!
//! ```text
//! ---
//! title: Deploying the API
//! owner: alice@example.com
//! ---
//! # Deploying the API
//! ```

use super::error::MetadataError;
use serde_yaml::{Mapping, Value};

const FENCE: &str = "---";

/// Parsed front matter plus the untouched body that follows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Keys in document order. Empty when the document has no header block.
    pub fields: Mapping,
    pub body: String,
    /// Whether the document carried a header block at all.
    pub present: bool,
}

impl FrontMatter {
    /// String value of `key`, if present and scalar.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<String> {
        self.get_str("title").filter(|t| !t.trim().is_empty())
    }

    pub fn owner(&self) -> Option<String> {
        self.get_str("owner").filter(|o| !o.trim().is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(Value::String(key.to_string()), value);
    }

    /// Render the header block followed by the body.
    pub fn render(&self) -> Result<String, MetadataError> {
        if self.fields.is_empty() && !self.present {
            return Ok(self.body.clone());
        }
        let yaml = if self.fields.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.fields)?
        };
        Ok(format!("{FENCE}\n{yaml}{FENCE}\n{}", self.body))
    }
}

/// Parse front matter from raw document bytes.
///
/// A document without a header block yields empty fields and the full content
/// as body; only a header that is present but unusable is an error.
pub fn parse_front_matter(content: &[u8]) -> Result<FrontMatter, MetadataError> {
    let text = std::str::from_utf8(content).map_err(|_| MetadataError::NotUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return Ok(FrontMatter::default()),
    };
    if first.trim_end() != FENCE {
        return Ok(FrontMatter {
            fields: Mapping::new(),
            body: text.to_string(),
            present: false,
        });
    }

    let mut yaml = String::new();
    let mut consumed = first.len();
    let mut closed = false;
    for line in lines {
        consumed += line.len();
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == "..." {
            closed = true;
            break;
        }
        yaml.push_str(line);
    }
    if !closed {
        return Err(MetadataError::Unterminated);
    }

    let fields = if yaml.trim().is_empty() {
        Mapping::new()
    } else {
        match serde_yaml::from_str::<Value>(&yaml)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => return Err(MetadataError::NotAMapping),
        }
    };

    Ok(FrontMatter {
        fields,
        body: text[consumed..].to_string(),
        present: true,
    })
}
