//! Version information populated at build time.
//!
//! Services pick the label at runtime from their configured environment:
//! - Prod: `stable:{version}`
//! - Test: `test:{commit}`
//! - Local: `local:{commit}`

/// Environment a service process reports itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Local,
    Test,
    Prod,
}

impl RuntimeEnv {
    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Test => "test",
            Self::Prod => "stable",
        }
    }
}

/// Build date in RFC3339 format.
pub fn build_date() -> &'static str {
    env!("BUILD_DATE")
}

/// Short git commit hash, or `unknown`.
pub fn build_commit() -> &'static str {
    env!("BUILD_COMMIT")
}

pub fn build_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Format the `{env}:{info}` string sent in the `x-service-version` header.
pub fn format_version_for_runtime_env(env: RuntimeEnv) -> String {
    match env {
        RuntimeEnv::Prod => format!("{}:{}", env.label(), build_version()),
        RuntimeEnv::Local | RuntimeEnv::Test => format!("{}:{}", env.label(), build_commit()),
    }
}
