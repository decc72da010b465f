use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} is not a valid URL: {value}")]
    MalformedUrl { field: &'static str, value: String },
    #[error("{field} must use http or https, got {scheme}")]
    UnsupportedScheme { field: &'static str, scheme: String },
    #[error("Unknown language '{0}', expected 'en' or 'te'")]
    UnknownLanguage(String),
    #[error("Unknown content kind '{0}'")]
    UnknownKind(String),
    #[error("Unknown time window '{0}'")]
    UnknownTimeWindow(String),
    #[error("Invalid details for {kind}: {reason}")]
    InvalidDetails { kind: &'static str, reason: String },
}

/// Returns the trimmed value, or `MissingField` when nothing is left.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Media links must be absolute http(s) URLs with a host.
pub fn validate_media_url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }

    let url = Url::parse(trimmed).map_err(|_| ValidationError::MalformedUrl {
        field,
        value: trimmed.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ValidationError::UnsupportedScheme {
                field,
                scheme: scheme.to_string(),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::MalformedUrl {
            field,
            value: trimmed.to_string(),
        });
    }

    Ok(url.to_string())
}

/// Trims every tag and drops the blank ones, keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}
