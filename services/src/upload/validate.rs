//! File rules applied before anything is stored.

use super::types::UploadedFile;
use serde::Deserialize;

/// Constraints an upload must satisfy. Unset limits are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub max_size: Option<u64>,
    pub min_size: Option<u64>,
    /// Allowed extensions, compared case-insensitively. Empty allows any.
    pub extensions: Vec<String>,
    /// Allowed MIME types; `image/*` style wildcards match a whole family.
    pub mime_types: Vec<String>,
    /// Also require the extension to fit the sniffed content type.
    pub check_extension_by_mime_type: bool,
    pub images_only: bool,
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_size: None,
            min_size: None,
            extensions: Vec::new(),
            mime_types: Vec::new(),
            check_extension_by_mime_type: true,
            images_only: false,
            min_width: None,
            max_width: None,
            min_height: None,
            max_height: None,
        }
    }
}

impl ValidationRules {
    fn checks_dimensions(&self) -> bool {
        self.images_only
            || self.min_width.is_some()
            || self.max_width.is_some()
            || self.min_height.is_some()
            || self.max_height.is_some()
    }
}

/// Why a file was refused. `Display` is the message shown in the editor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Please upload a file.")]
    NoFile,

    #[error("The file \"{file}\" is empty.")]
    Empty { file: String },

    #[error("The file \"{file}\" is too big. Its size cannot exceed {}.", size_limit(.limit))]
    TooBig { file: String, limit: u64 },

    #[error("The file \"{file}\" is too small. Its size cannot be smaller than {}.", size_limit(.limit))]
    TooSmall { file: String, limit: u64 },

    #[error("Only files with these extensions are allowed: {}.", list(.allowed))]
    WrongExtension { file: String, allowed: Vec<String> },

    #[error("Only files with these MIME types are allowed: {}.", list(.allowed))]
    WrongMimeType { file: String, allowed: Vec<String> },

    #[error("The file \"{file}\" is not an image.")]
    NotImage { file: String },

    #[error("The image \"{file}\" is too small. The width cannot be smaller than {} {}.", .limit, pixels(.limit))]
    UnderWidth { file: String, limit: u32 },

    #[error("The image \"{file}\" is too large. The width cannot be larger than {} {}.", .limit, pixels(.limit))]
    OverWidth { file: String, limit: u32 },

    #[error("The image \"{file}\" is too small. The height cannot be smaller than {} {}.", .limit, pixels(.limit))]
    UnderHeight { file: String, limit: u32 },

    #[error("The image \"{file}\" is too large. The height cannot be larger than {} {}.", .limit, pixels(.limit))]
    OverHeight { file: String, limit: u32 },
}

fn pixels(n: &u32) -> &'static str {
    if *n == 1 { "pixel" } else { "pixels" }
}

fn size_limit(limit: &u64) -> String {
    short_size(*limit)
}

fn list(items: &[String]) -> String {
    items.join(", ")
}

/// Byte count as `N bytes`, or in binary units with up to two decimals.
pub fn short_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} {}", if bytes == 1 { "byte" } else { "bytes" });
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{value:.2}");
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{formatted} {}", UNITS[unit])
}

fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let mime = mime.to_ascii_lowercase();
    match pattern.strip_suffix("/*") {
        Some(family) => mime.split_once('/').is_some_and(|(top, _)| top == family),
        None => pattern == mime,
    }
}

/// Checks `file` against `rules`, reporting the first violation.
pub fn validate(file: &UploadedFile, rules: &ValidationRules) -> Result<(), Rejection> {
    let name = || file.name().to_owned();

    if file.name().is_empty() {
        return Err(Rejection::NoFile);
    }
    if file.size() == 0 {
        return Err(Rejection::Empty { file: name() });
    }
    if let Some(limit) = rules.max_size
        && file.size() > limit
    {
        return Err(Rejection::TooBig {
            file: name(),
            limit,
        });
    }
    if let Some(limit) = rules.min_size
        && file.size() < limit
    {
        return Err(Rejection::TooSmall {
            file: name(),
            limit,
        });
    }

    let sniffed = file.detected_image_mime();

    if !rules.extensions.is_empty() {
        let extension = file.extension();
        let wrong_extension = || Rejection::WrongExtension {
            file: name(),
            allowed: rules.extensions.clone(),
        };
        if !rules
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(wrong_extension());
        }
        if rules.check_extension_by_mime_type
            && let Some(known) = sniffed.and_then(mime_guess::get_mime_extensions_str)
            && !known.iter().any(|ext| ext.eq_ignore_ascii_case(&extension))
        {
            return Err(wrong_extension());
        }
    }

    if !rules.mime_types.is_empty() {
        let mime = sniffed.unwrap_or(file.content_type());
        if !rules.mime_types.iter().any(|pattern| mime_matches(pattern, mime)) {
            return Err(Rejection::WrongMimeType {
                file: name(),
                allowed: rules.mime_types.clone(),
            });
        }
    }

    if rules.checks_dimensions() {
        let Some((width, height)) = file.dimensions() else {
            return Err(Rejection::NotImage { file: name() });
        };
        if let Some(limit) = rules.min_width
            && width < limit
        {
            return Err(Rejection::UnderWidth { file: name(), limit });
        }
        if let Some(limit) = rules.max_width
            && width > limit
        {
            return Err(Rejection::OverWidth { file: name(), limit });
        }
        if let Some(limit) = rules.min_height
            && height < limit
        {
            return Err(Rejection::UnderHeight { file: name(), limit });
        }
        if let Some(limit) = rules.max_height
            && height > limit
        {
            return Err(Rejection::OverHeight { file: name(), limit });
        }
    }

    Ok(())
}
