//! Read-only view of environment defaults for credentials.

/// Source of environment-provided credential values.
///
/// Implemented for closures so tests can supply fixed maps.
pub trait EnvironmentSource: Send + Sync {
    /// Returns the non-blank value of `name`, if any.
    fn var(&self, name: &str) -> Option<String>;
}

impl<F> EnvironmentSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }
}
