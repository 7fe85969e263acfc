//! Imperavi Redactor assets for server-rendered pages.
//!
//! This crate declares the editor's CSS/JS bundles, lets a page register
//! them (with plugins and locales) and renders the editor widget.
//!
//! # Usage
//!
//! ```rust
//! use redactor_assets::{RedactorBundle, View, redactor};
//!
//! let mut view = View::new("/assets");
//! let asset = view.register(redactor());
//! asset.add_plugins(["clips", "fullscreen"]);
//! asset.add_language("zh");
//!
//! assert!(view.render_head().contains("clips.css"));
//! ```

pub mod bundle;
pub mod view;
pub mod widget;

#[rustfmt::skip]
pub use bundle::{AssetBundle, REDACTOR_SOURCE_PATH, RedactorBundle, image_manager, jquery, redactor};
pub use view::View;
pub use widget::RedactorWidget;
