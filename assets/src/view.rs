//! Page-level registry of asset bundles and inline scripts.

use crate::bundle::AssetBundle;

/// Collects the bundles a page needs and renders their tags.
///
/// Bundles are keyed by name. Registering a bundle registers its
/// dependencies first, and registering a name twice returns the bundle that
/// is already there.
#[derive(Debug, Clone, Default)]
pub struct View {
    base_url: String,
    bundles: Vec<AssetBundle>,
    scripts: Vec<String>,
}

impl View {
    /// Creates a view whose bundles are published under `base_url`.
    ///
    /// Each bundle is served from `{base_url}/{bundle name}/`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            ..Self::default()
        }
    }

    /// Registers `bundle` and everything it depends on.
    ///
    /// The returned reference stays mutable so plugins and languages can be
    /// appended after registration; the tags are rendered from it later.
    pub fn register(&mut self, bundle: AssetBundle) -> &mut AssetBundle {
        for dependency in bundle.depends() {
            self.register(dependency.clone());
        }

        let index = match self.position(bundle.name()) {
            Some(index) => index,
            None => {
                self.bundles.push(bundle);
                self.bundles.len() - 1
            }
        };
        &mut self.bundles[index]
    }

    /// Names of the registered bundles, dependencies first.
    #[must_use]
    pub fn asset_bundles(&self) -> Vec<&str> {
        self.bundles.iter().map(AssetBundle::name).collect()
    }

    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&AssetBundle> {
        self.bundles.iter().find(|b| b.name() == name)
    }

    /// Queues an inline script that runs once the DOM is ready.
    pub fn register_js(&mut self, script: impl Into<String>) {
        self.scripts.push(script.into());
    }

    /// `<link>` tags for every registered stylesheet.
    #[must_use]
    pub fn render_head(&self) -> String {
        self.bundles
            .iter()
            .flat_map(|bundle| {
                bundle
                    .css()
                    .iter()
                    .map(move |file| self.asset_url(bundle, file))
            })
            .map(|href| format!("<link href=\"{href}\" rel=\"stylesheet\">\n"))
            .collect()
    }

    /// `<script>` tags for every registered script, then the queued inline code.
    #[must_use]
    pub fn render_body_end(&self) -> String {
        let mut out: String = self
            .bundles
            .iter()
            .flat_map(|bundle| {
                bundle
                    .js()
                    .iter()
                    .map(move |file| self.asset_url(bundle, file))
            })
            .map(|src| format!("<script src=\"{src}\"></script>\n"))
            .collect();

        if !self.scripts.is_empty() {
            out.push_str("<script>jQuery(function ($) {\n");
            for script in &self.scripts {
                out.push_str(script);
                out.push('\n');
            }
            out.push_str("});</script>\n");
        }
        out
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.bundles.iter().position(|b| b.name() == name)
    }

    fn asset_url(&self, bundle: &AssetBundle, file: &str) -> String {
        format!("{}/{}/{file}", self.base_url, bundle.name())
    }
}
