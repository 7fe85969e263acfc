//! Asset bundle declarations.
//!
//! A bundle is a named, ordered list of stylesheets and scripts that live
//! under one source directory, plus the bundles it must be loaded after.

/// Directory the Redactor distribution is unpacked into.
pub const REDACTOR_SOURCE_PATH: &str = "assets/redactor";

/// A declarative set of static CSS/JS files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    name: String,
    source_path: String,
    css: Vec<String>,
    js: Vec<String>,
    depends: Vec<AssetBundle>,
}

impl AssetBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new(name: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            css: Vec::new(),
            js: Vec::new(),
            depends: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_css(mut self, file: impl Into<String>) -> Self {
        self.css.push(file.into());
        self
    }

    #[must_use]
    pub fn with_js(mut self, file: impl Into<String>) -> Self {
        self.js.push(file.into());
        self
    }

    /// Declares a bundle that has to be registered before this one.
    #[must_use]
    pub fn with_dependency(mut self, bundle: Self) -> Self {
        self.depends.push(bundle);
        self
    }

    /// Overrides where the files are read from, e.g. for a vendored copy.
    #[must_use]
    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = source_path.into();
        self
    }

    pub fn push_css(&mut self, file: impl Into<String>) {
        self.css.push(file.into());
    }

    pub fn push_js(&mut self, file: impl Into<String>) {
        self.js.push(file.into());
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    #[must_use]
    pub fn css(&self) -> &[String] {
        &self.css
    }

    #[must_use]
    pub fn js(&self) -> &[String] {
        &self.js
    }

    #[must_use]
    pub fn depends(&self) -> &[Self] {
        &self.depends
    }
}

/// The jQuery bundle the editor runs on.
#[must_use]
pub fn jquery() -> AssetBundle {
    AssetBundle::new("jquery", "assets/jquery").with_js("jquery.js")
}

/// The editor core: `redactor.css` and `redactor.min.js`, loaded after jQuery.
#[must_use]
pub fn redactor() -> AssetBundle {
    AssetBundle::new("redactor", REDACTOR_SOURCE_PATH)
        .with_css("redactor.css")
        .with_js("redactor.min.js")
        .with_dependency(jquery())
}

/// Script for the custom image manager plugin.
#[must_use]
pub fn image_manager() -> AssetBundle {
    AssetBundle::new("redactor-imagemanager", REDACTOR_SOURCE_PATH)
        .with_js("custom/plugins/imagemanager/imagemanager.js")
}

/// Plugin and locale layout of the Redactor distribution.
///
/// Both methods only append; nothing is validated against the files on disk.
pub trait RedactorBundle {
    /// Appends `plugins/{name}/{name}.js` for each plugin, in order.
    ///
    /// `clips` is the only plugin shipping a stylesheet, so it also gets
    /// `plugins/clips/clips.css`.
    fn add_plugins<I, S>(&mut self, plugins: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>;

    /// Appends `lang/{language}.js`.
    fn add_language(&mut self, language: &str);
}

impl RedactorBundle for AssetBundle {
    fn add_plugins<I, S>(&mut self, plugins: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for plugin in plugins {
            let plugin = plugin.as_ref();
            if plugin == "clips" {
                self.push_css(format!("plugins/{plugin}/{plugin}.css"));
            }
            self.push_js(format!("plugins/{plugin}/{plugin}.js"));
        }
    }

    fn add_language(&mut self, language: &str) {
        self.push_js(format!("lang/{language}.js"));
    }
}
