//! Prompt texts used by the synthesis pipeline and the agent turn loop.

use serde::{Deserialize, Serialize};

use crate::template::{PromptTemplate, TemplateResult};

/// System instruction for code synthesis.
pub const SYNTHESIS_SYSTEM: &str = "\
You write one Python function that an AI agent will call as a tool.

Rules:
- Output only Python source code. No prose and no markdown fences.
- Define exactly one top-level function. Every parameter and the return value carry type hints.
- The first statement in the function body is a docstring describing the behaviour and arguments.
- No classes, no decorators, no top-level statements other than imports and the function.
- Allowed imports: json, requests, math, re, datetime, decimal, typing, os.
- Read a credential only as os.getenv('EXACT_NAME') with a literal name. Never use os.environ.
- If a credential is missing, return the string 'Please add your [EXACT_NAME] in settings'.
- Forbidden: open(), pathlib, os.path, listing or deleting files, glob, __file__, subprocess,
  os.system, shutil, eval, exec, compile, __import__, pickle, shelve, sockets or servers.
- Pass a timeout to every requests call and return JSON-serialisable values.";

const SYNTHESIS_PROMPT: &str = "\
Build a tool for this request:
{{request}}

Credentials available to the tool (read each with os.getenv): {{credentials}}
{{feedback}}";

/// System instruction for the safety classifier.
pub const REVIEW_SYSTEM: &str = "\
You are a security reviewer for Python tools generated for AI agents.
Permitted: outbound HTTP requests, parsing JSON or text, reading one credential by exact name with os.getenv('NAME').
Forbidden: filesystem access, spawning processes, evaluating strings as code, listening on sockets,
enumerating or returning environment variables, reading credentials other than by exact name.
Reply with exactly SAFE, or with UNSAFE: followed by the reasons separated by semicolons.";

const REVIEW_PROMPT: &str = "\
Review this code:
```python
{{code}}
```";

/// System instruction for public credential discovery.
pub const DISCOVERY_SYSTEM: &str = "\
You know directories of public and free-tier APIs.
Answer with JSON only. When the service behind a credential publishes a demo or free key
that works without sign-up, answer {\"found\": true, \"value\": \"<key>\"}.
Otherwise answer {\"found\": false}. Never invent keys.";

const DISCOVERY_PROMPT: &str = "\
Credential name: {{name}}
Tool description: {{description}}";

const TURN_SYSTEM: &str = "\
{{instruction}}

Tools you can call:
{{tools}}

To call a tool, reply with only this JSON object and nothing else:
{\"tool_call\": {\"name\": \"<tool>\", \"arguments\": { ... }}}
After a tool result arrives, call another tool or answer the user in plain text.";

const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant.";

/// Prompt texts, overridable per deployment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptLibrary {
    /// Synthesis system instruction.
    pub synthesis_system: String,
    /// Synthesis user prompt with `request`, `credentials`, `feedback`.
    pub synthesis_prompt: String,
    /// Classifier system instruction.
    pub review_system: String,
    /// Classifier user prompt with `code`.
    pub review_prompt: String,
    /// Discovery system instruction.
    pub discovery_system: String,
    /// Discovery user prompt with `name`, `description`.
    pub discovery_prompt: String,
    /// Agent turn system prompt with `instruction`, `tools`.
    pub turn_system: String,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self {
            synthesis_system: SYNTHESIS_SYSTEM.to_owned(),
            synthesis_prompt: SYNTHESIS_PROMPT.to_owned(),
            review_system: REVIEW_SYSTEM.to_owned(),
            review_prompt: REVIEW_PROMPT.to_owned(),
            discovery_system: DISCOVERY_SYSTEM.to_owned(),
            discovery_prompt: DISCOVERY_PROMPT.to_owned(),
            turn_system: TURN_SYSTEM.to_owned(),
        }
    }
}

impl PromptLibrary {
    /// Renders the synthesis prompt.
    ///
    /// Prior rejection reasons, when present, are listed so the next attempt
    /// can avoid them.
    ///
    /// # Errors
    ///
    /// Propagates template errors from customised prompt texts.
    pub fn synthesis(
        &self,
        request: &str,
        credentials: &[String],
        rejection_reasons: &[String],
    ) -> TemplateResult<String> {
        let credentials = if credentials.is_empty() {
            "none".to_owned()
        } else {
            credentials.join(", ")
        };
        let feedback = if rejection_reasons.is_empty() {
            String::new()
        } else {
            let mut text =
                String::from("\nA previous attempt was rejected by the safety review. Fix every point:\n");
            for reason in rejection_reasons {
                text.push_str("- ");
                text.push_str(reason);
                text.push('\n');
            }
            text
        };
        PromptTemplate::parse("synthesis", &self.synthesis_prompt)?.render(&[
            ("request", request.trim()),
            ("credentials", &credentials),
            ("feedback", &feedback),
        ])
    }

    /// Renders the classifier prompt for a candidate.
    ///
    /// # Errors
    ///
    /// Propagates template errors from customised prompt texts.
    pub fn review(&self, code: &str) -> TemplateResult<String> {
        PromptTemplate::parse("review", &self.review_prompt)?.render(&[("code", code)])
    }

    /// Renders the discovery prompt for one credential.
    ///
    /// # Errors
    ///
    /// Propagates template errors from customised prompt texts.
    pub fn discovery(&self, name: &str, description: &str) -> TemplateResult<String> {
        PromptTemplate::parse("discovery", &self.discovery_prompt)?
            .render(&[("name", name), ("description", description)])
    }

    /// Renders the agent turn system prompt.
    ///
    /// `tools` is a pre-formatted listing, one tool per line.
    ///
    /// # Errors
    ///
    /// Propagates template errors from customised prompt texts.
    pub fn turn_system(&self, instruction: Option<&str>, tools: &str) -> TemplateResult<String> {
        let tools = if tools.trim().is_empty() {
            "(none)"
        } else {
            tools
        };
        PromptTemplate::parse("turn", &self.turn_system)?.render(&[
            ("instruction", instruction.unwrap_or(DEFAULT_INSTRUCTION)),
            ("tools", tools),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_lists_credentials_and_feedback() {
        let library = PromptLibrary::default();
        let first = library
            .synthesis("  weather for a city ", &["WEATHER_KEY".to_owned()], &[])
            .unwrap();
        assert!(first.contains("weather for a city\n"));
        assert!(first.contains("WEATHER_KEY"));
        assert!(!first.contains("rejected"));

        let retry = library
            .synthesis(
                "weather",
                &[],
                &["line 3: filesystem access (`open(`)".to_owned()],
            )
            .unwrap();
        assert!(retry.contains("os.getenv): none"));
        assert!(retry.contains("- line 3: filesystem access"));
    }

    #[test]
    fn review_embeds_code_verbatim() {
        let library = PromptLibrary::default();
        let prompt = library.review("def f() -> str:\n    return '{{x}}'").unwrap();
        assert!(prompt.contains("return '{{x}}'"));
    }

    #[test]
    fn turn_prompt_defaults_instruction() {
        let library = PromptLibrary::default();
        let prompt = library.turn_system(None, "").unwrap();
        assert!(prompt.starts_with(DEFAULT_INSTRUCTION));
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("\"tool_call\""));
    }

    #[test]
    fn customised_prompt_errors_surface() {
        let library = PromptLibrary {
            review_prompt: "{{code}} {{extra}}".to_owned(),
            ..PromptLibrary::default()
        };
        assert!(library.review("x").is_err());
    }
}
