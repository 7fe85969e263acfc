//! The editor form widget.
//!
//! Renders a `<textarea>` and registers the assets and the init script
//! that turn it into a Redactor editor.

use crate::bundle::{RedactorBundle, image_manager, redactor};
use crate::view::View;
use serde_json::{Map, Value};

/// Plugin that needs the extra image manager bundle.
const IMAGE_MANAGER_PLUGIN: &str = "imagemanager";

/// Editor widget bound to one form field.
#[derive(Debug, Clone)]
pub struct RedactorWidget {
    id: String,
    name: String,
    value: String,
    settings: Map<String, Value>,
}

impl RedactorWidget {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value: String::new(),
            settings: Map::new(),
        }
    }

    /// Initial editor content.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Sets one entry of the settings object passed to `redactor()`.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Points image uploads at an upload endpoint, e.g. `/redactor/upload/local`.
    #[must_use]
    pub fn with_image_upload(self, url: impl Into<String>) -> Self {
        self.with_setting("imageUpload", url.into())
    }

    #[must_use]
    pub fn with_file_upload(self, url: impl Into<String>) -> Self {
        self.with_setting("fileUpload", url.into())
    }

    #[must_use]
    pub fn with_plugins<I, S>(self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let plugins: Vec<Value> = plugins
            .into_iter()
            .map(|p| Value::String(p.into()))
            .collect();
        self.with_setting("plugins", plugins)
    }

    #[must_use]
    pub fn with_language(self, language: impl Into<String>) -> Self {
        self.with_setting("lang", language.into())
    }

    #[must_use]
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Registers assets plus the init script on `view`, returns the textarea markup.
    pub fn render(&self, view: &mut View) -> String {
        self.register_assets(view);
        let selector = Value::String(format!("#{}", self.id));
        view.register_js(format!(
            "jQuery({}).redactor({});",
            script_json(&selector),
            script_json(&Value::Object(self.settings.clone()))
        ));

        format!(
            "<textarea id=\"{}\" name=\"{}\">{}</textarea>",
            escape_html(&self.id),
            escape_html(&self.name),
            escape_html(&self.value)
        )
    }

    fn plugins(&self) -> Vec<&str> {
        self.settings
            .get("plugins")
            .and_then(Value::as_array)
            .map(|plugins| plugins.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn register_assets(&self, view: &mut View) {
        let plugins = self.plugins();
        let asset = view.register(redactor());

        // English ships inside the core script.
        if let Some(lang) = self.settings.get("lang").and_then(Value::as_str)
            && lang != "en"
        {
            asset.add_language(lang);
        }
        if !plugins.is_empty() {
            asset.add_plugins(&plugins);
        }
        if plugins.contains(&IMAGE_MANAGER_PLUGIN) {
            view.register(image_manager());
        }
    }
}

/// JSON safe to inline in a `<script>` element: `<` only occurs inside
/// strings, where `\u003c` means the same.
fn script_json(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
