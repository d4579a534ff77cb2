use std::borrow::Cow;

use crate::error::TemplateError;
use crate::sanitize::sanitize_key;

/// Substitutes the sanitized, percent-encoded key for the first
/// occurrence of `placeholder` in `template`.
pub fn resolve_url(template: &str, placeholder: &str, key: &[u8]) -> Result<String, TemplateError> {
    let sanitized = sanitize_key(key);
    if sanitized.is_empty() {
        return Err(TemplateError::EmptySanitizedKey);
    }
    if placeholder.is_empty() || !template.contains(placeholder) {
        return Err(TemplateError::PlaceholderNotFound(placeholder.to_string()));
    }
    Ok(template.replacen(placeholder, &urlencoding::encode(&sanitized), 1))
}

/// Configured target URL with an optional key placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    placeholder: Option<String>,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>, placeholder: Option<String>) -> Self {
        Self {
            template: template.into(),
            placeholder,
        }
    }

    /// Static URLs are returned as-is; otherwise the key is substituted.
    pub fn resolve(&self, key: &[u8]) -> Result<Cow<'_, str>, TemplateError> {
        match &self.placeholder {
            None => Ok(Cow::Borrowed(&self.template)),
            Some(placeholder) => resolve_url(&self.template, placeholder, key).map(Cow::Owned),
        }
    }
}
