use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedirectStyle {
    /// `<page>/file/<id>`
    #[default]
    Id,
    /// `<page>/file/<id>.<ext>`
    IdExt,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormMethod {
    #[default]
    Post,
    Put,
}

impl FormMethod {
    pub fn as_method(self) -> reqwest::Method {
        match self {
            FormMethod::Post => reqwest::Method::POST,
            FormMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// Parses `-F key=value` pairs.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}
