//! Prompt templates with `{{variable}}` substitution.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder had neither a runtime value nor a default.
    #[error("template `{template}` is missing variable `{name}`")]
    MissingVariable {
        /// Template name.
        template: String,
        /// Name of the missing variable.
        name: String,
    },

    /// A placeholder was opened but never closed.
    #[error("template `{template}` has an unterminated placeholder")]
    Unterminated {
        /// Template name.
        template: String,
    },
}

/// A named prompt template.
///
/// Every placeholder must be satisfied at render time, either by a runtime
/// value or by a default declared with [`PromptTemplate::with_default`].
/// Substituted values are inserted verbatim and never re-scanned, so user
/// text containing `{{...}}` is safe to pass through.
///
/// # Examples
///
/// ```
/// use agent_prompts::template::PromptTemplate;
///
/// let template = PromptTemplate::parse("greeting", "Hello {{name}}!").unwrap();
/// let rendered = template.render(&[("name", "tool author")]).unwrap();
/// assert_eq!(rendered, "Hello tool author!");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
    defaults: HashMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(String),
}

impl PromptTemplate {
    /// Parses template text.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unterminated`] when a `{{` has no matching `}}`.
    pub fn parse(name: impl Into<String>, text: &str) -> TemplateResult<Self> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_owned()));
            }
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(TemplateError::Unterminated { template: name });
            };
            segments.push(Segment::Variable(after[..end].trim().to_owned()));
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }
        Ok(Self {
            name,
            segments,
            defaults: HashMap::new(),
        })
    }

    /// Declares a default used when no runtime value is supplied.
    #[must_use]
    pub fn with_default(mut self, variable: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(variable.into(), value.into());
        self
    }

    /// Returns the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the distinct variable names referenced by the template.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Renders the template with runtime values, which override defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] for an unsatisfied placeholder.
    pub fn render(&self, values: &[(&str, &str)]) -> TemplateResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .iter()
                        .find_map(|(key, value)| (*key == name.as_str()).then_some(*value))
                        .or_else(|| self.defaults.get(name).map(String::as_str))
                        .ok_or_else(|| TemplateError::MissingVariable {
                            template: self.name.clone(),
                            name: name.clone(),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => f.write_str(text)?,
                Segment::Variable(name) => write!(f, "{{{{{name}}}}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_multiple_variables() {
        let template = PromptTemplate::parse("t", "{{greeting}} {{ name }}, {{greeting}}").unwrap();
        let rendered = template
            .render(&[("greeting", "hi"), ("name", "Ada")])
            .unwrap();
        assert_eq!(rendered, "hi Ada, hi");
        assert_eq!(template.variables().len(), 2);
    }

    #[test]
    fn runtime_values_override_defaults() {
        let template = PromptTemplate::parse("t", "[{{feedback}}]")
            .unwrap()
            .with_default("feedback", "");
        assert_eq!(template.render(&[]).unwrap(), "[]");
        assert_eq!(template.render(&[("feedback", "x")]).unwrap(), "[x]");
    }

    #[test]
    fn missing_variable_names_template() {
        let template = PromptTemplate::parse("review", "Review {{code}}").unwrap();
        let err = template.render(&[]).expect_err("should error");
        assert!(
            matches!(err, TemplateError::MissingVariable { template, name } if template == "review" && name == "code")
        );
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let template = PromptTemplate::parse("t", "{{a}}").unwrap();
        let rendered = template.render(&[("a", "{{b}}")]).unwrap();
        assert_eq!(rendered, "{{b}}");
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        assert!(matches!(
            PromptTemplate::parse("t", "Hello {{name"),
            Err(TemplateError::Unterminated { .. })
        ));
    }

    #[test]
    fn display_restores_source() {
        let template = PromptTemplate::parse("t", "a {{x}} b").unwrap();
        assert_eq!(template.to_string(), "a {{x}} b");
    }
}
