//! Deterministic scan of candidate tool source.
//!
//! The scan enforces two things independently of any classifier: the
//! forbidden-capability list and the structural contract every artifact must
//! satisfy (one annotated top-level function with a docstring, imports only
//! from the allowlist, credentials read as `os.getenv('NAME')`).

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use agent_primitives::CredentialName;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::{LogicalLine, MaskedSource};

/// Modules a tool may import.
pub const ALLOWED_IMPORTS: &[&str] = &[
    "json",
    "requests",
    "math",
    "re",
    "datetime",
    "decimal",
    "typing",
    "os",
    "__future__",
];

/// Capability classes a tool must not exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenCapability {
    /// Opening, listing or modifying files.
    FilesystemAccess,
    /// Spawning or signalling processes.
    ProcessSpawning,
    /// Evaluating strings as code or reflective access.
    DynamicEvaluation,
    /// Accepting inbound connections.
    NetworkListening,
    /// Iterating over or mutating the environment.
    EnvironmentEnumeration,
    /// Reading a credential without an exact literal name.
    UndeclaredCredentialAccess,
    /// Any other use of the `os` module.
    OsAccess,
    /// Importing a module outside the allowlist.
    DisallowedImport,
    /// Violating the single-function shape.
    StructuralContract,
}

impl ForbiddenCapability {
    /// Human-readable label used in rejection reasons.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FilesystemAccess => "filesystem access",
            Self::ProcessSpawning => "process spawning",
            Self::DynamicEvaluation => "dynamic code evaluation",
            Self::NetworkListening => "network listening",
            Self::EnvironmentEnumeration => "raw environment enumeration",
            Self::UndeclaredCredentialAccess => "credential access without an exact name",
            Self::OsAccess => "operating-system access beyond os.getenv",
            Self::DisallowedImport => "disallowed import",
            Self::StructuralContract => "structural contract violation",
        }
    }
}

impl fmt::Display for ForbiddenCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One forbidden construct located in the source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    line: Option<usize>,
    capability: ForbiddenCapability,
    detail: String,
}

impl Finding {
    fn at(line: usize, capability: ForbiddenCapability, detail: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            capability,
            detail: detail.into(),
        }
    }

    fn whole(capability: ForbiddenCapability, detail: impl Into<String>) -> Self {
        Self {
            line: None,
            capability,
            detail: detail.into(),
        }
    }

    /// 1-based line, absent for findings about the source as a whole.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Capability class that was violated.
    #[must_use]
    pub fn capability(&self) -> ForbiddenCapability {
        self.capability
    }

    /// Offending construct or explanation.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        write!(f, "{}: {}", self.capability, self.detail)
    }
}

/// Result of scanning one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAnalysis {
    entrypoint: Option<String>,
    credential_names: Vec<String>,
    findings: Vec<Finding>,
}

impl SourceAnalysis {
    /// Name of the single top-level function, when there is exactly one.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Literal `os.getenv` names in source order, deduplicated.
    #[must_use]
    pub fn credential_names(&self) -> &[String] {
        &self.credential_names
    }

    /// Forbidden constructs ordered by line.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// True when nothing forbidden was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings rendered as rejection reasons.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.findings.iter().map(ToString::to_string).collect()
    }
}

struct Rule {
    capability: ForbiddenCapability,
    pattern: Regex,
}

fn rule(capability: ForbiddenCapability, pattern: &str) -> Rule {
    Rule {
        capability,
        pattern: Regex::new(pattern).expect("valid regex"),
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use ForbiddenCapability::{
        DynamicEvaluation, EnvironmentEnumeration, FilesystemAccess, NetworkListening,
        ProcessSpawning,
    };
    vec![
        rule(FilesystemAccess, r"(?m)(?:^|[^\w.])(?P<hit>(?:open|Path)\s*\()"),
        rule(
            FilesystemAccess,
            r"\b(?P<hit>pathlib|glob|shutil|tempfile|fileinput|__file__)\b",
        ),
        rule(FilesystemAccess, r"\b(?P<hit>io\s*\.\s*open)\b"),
        rule(
            ProcessSpawning,
            r"\b(?P<hit>subprocess|multiprocessing|pty|pexpect)\b",
        ),
        rule(
            DynamicEvaluation,
            r"(?m)(?:^|[^\w.])(?P<hit>(?:eval|exec|compile|globals|locals|vars|dir|getattr|setattr|delattr|breakpoint)\s*\()",
        ),
        rule(
            DynamicEvaluation,
            r"\b(?P<hit>__import__|importlib|pickle|shelve|marshal|ctypes|builtins|__builtins__|__subclasses__|__globals__|__bases__|__mro__|__class__|__dict__|__code__|__getattribute__|__loader__)\b",
        ),
        rule(
            NetworkListening,
            r"\b(?P<hit>socket|socketserver|asyncore|xmlrpc|start_server|HTTPServer|TCPServer)\b",
        ),
        rule(NetworkListening, r"\b(?P<hit>http\s*\.\s*server)\b"),
        rule(
            NetworkListening,
            r"\.\s*(?P<hit>(?:listen|bind|serve_forever|accept)\s*\()",
        ),
        rule(
            EnvironmentEnumeration,
            r"(?m)(?:^|[^\w.])(?P<hit>environb?|getenvb|putenv|unsetenv)\b",
        ),
    ]
});

static OS_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|[^\w.])(?P<hit>os)\b").expect("valid regex"));

static DEF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^def\s+(?P<name>[A-Za-z_]\w*)\s*\(").expect("valid regex")
});

static DOCSTRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[rRuU]?(?:"""_*"""|'''_*'''|"_*"|'_*')$"#).expect("valid regex")
});

/// Scans candidate source for forbidden constructs and the structural
/// contract.
#[must_use]
pub fn analyze(source: &str) -> SourceAnalysis {
    let masked = MaskedSource::new(source);
    let lines = masked.logical_lines();
    let mut findings = BTreeSet::new();

    scan_rules(&masked, &mut findings);
    let import_lines = scan_imports(&lines, &mut findings);
    let credential_names = scan_os_references(&masked, &import_lines, &mut findings);
    let entrypoint = scan_structure(&lines, &mut findings);

    SourceAnalysis {
        entrypoint,
        credential_names,
        findings: findings.into_iter().collect(),
    }
}

/// Returns the literal credential names read with `os.getenv`, in source
/// order without duplicates.
#[must_use]
pub fn extract_credential_names(source: &str) -> Vec<String> {
    analyze(source).credential_names
}

fn scan_rules(masked: &MaskedSource<'_>, findings: &mut BTreeSet<Finding>) {
    for rule in RULES.iter() {
        for captures in rule.pattern.captures_iter(masked.masked()) {
            let Some(hit) = captures.name("hit") else {
                continue;
            };
            findings.insert(Finding::at(
                masked.line_of(hit.start()),
                rule.capability,
                format!("`{}`", hit.as_str().trim()),
            ));
        }
    }
}

fn statements(line: &LogicalLine) -> impl Iterator<Item = &str> {
    line.text.split(';').map(str::trim).filter(|part| !part.is_empty())
}

/// Checks every import statement, returning the lines that hold imports.
fn scan_imports(lines: &[LogicalLine], findings: &mut BTreeSet<Finding>) -> BTreeSet<usize> {
    let mut import_lines = BTreeSet::new();
    for line in lines {
        for statement in statements(line) {
            if let Some(rest) = keyword_rest(statement, "import") {
                import_lines.insert(line.line);
                for item in rest.split(',') {
                    check_import_item(line.line, item, findings);
                }
            } else if let Some(rest) = keyword_rest(statement, "from") {
                import_lines.insert(line.line);
                let module = rest.split_whitespace().next().unwrap_or_default();
                check_from_import(line.line, module, findings);
            }
        }
    }
    import_lines
}

fn keyword_rest<'a>(statement: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = statement.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn check_import_item(line: usize, item: &str, findings: &mut BTreeSet<Finding>) {
    let item = item.trim().trim_matches(|c: char| c == '(' || c == ')').trim();
    if item.is_empty() {
        return;
    }
    let mut parts = item.split_whitespace();
    let module = parts.next().unwrap_or_default();
    let aliased = parts.next().is_some();
    let root = module.split('.').next().unwrap_or_default();
    if !ALLOWED_IMPORTS.contains(&root) {
        findings.insert(Finding::at(
            line,
            ForbiddenCapability::DisallowedImport,
            format!("`import {module}`"),
        ));
    } else if root == "os" && (module != "os" || aliased) {
        findings.insert(Finding::at(
            line,
            ForbiddenCapability::OsAccess,
            format!("`import {item}` (os may only be imported as `import os`)"),
        ));
    }
}

fn check_from_import(line: usize, module: &str, findings: &mut BTreeSet<Finding>) {
    if module.starts_with('.') {
        findings.insert(Finding::at(
            line,
            ForbiddenCapability::DisallowedImport,
            format!("relative import `from {module}`"),
        ));
        return;
    }
    let root = module.split('.').next().unwrap_or_default();
    if root == "os" {
        findings.insert(Finding::at(
            line,
            ForbiddenCapability::OsAccess,
            format!("`from {module} import ...` (os may only be imported as `import os`)"),
        ));
    } else if !ALLOWED_IMPORTS.contains(&root) {
        findings.insert(Finding::at(
            line,
            ForbiddenCapability::DisallowedImport,
            format!("`from {module} import ...`"),
        ));
    }
}

/// Classifies every reference to `os` and collects literal credential names.
fn scan_os_references(
    masked: &MaskedSource<'_>,
    import_lines: &BTreeSet<usize>,
    findings: &mut BTreeSet<Finding>,
) -> Vec<String> {
    let text = masked.masked();
    let bytes = text.as_bytes();
    let mut names: Vec<String> = Vec::new();

    for captures in OS_REFERENCE.captures_iter(text) {
        let Some(hit) = captures.name("hit") else {
            continue;
        };
        let line = masked.line_of(hit.start());
        let dot = skip_whitespace(bytes, hit.end());
        if bytes.get(dot) != Some(&b'.') {
            if !import_lines.contains(&line) {
                findings.insert(Finding::at(
                    line,
                    ForbiddenCapability::OsAccess,
                    "bare reference to `os`",
                ));
            }
            continue;
        }
        let attr_start = skip_whitespace(bytes, dot + 1);
        let attr_end = attr_start
            + bytes[attr_start..]
                .iter()
                .take_while(|byte| byte.is_ascii_alphanumeric() || **byte == b'_')
                .count();
        let attribute = &text[attr_start..attr_end];

        if attribute == "getenv" {
            match literal_getenv_name(masked, attr_end) {
                Ok(name) => {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                Err(detail) => {
                    findings.insert(Finding::at(
                        line,
                        ForbiddenCapability::UndeclaredCredentialAccess,
                        detail,
                    ));
                }
            }
            continue;
        }

        findings.insert(Finding::at(
            line,
            classify_os_attribute(attribute),
            format!("`os.{attribute}`"),
        ));
    }
    names
}

fn classify_os_attribute(attribute: &str) -> ForbiddenCapability {
    const FILESYSTEM: &[&str] = &[
        "path", "listdir", "remove", "unlink", "mkdir", "makedirs", "rmdir", "removedirs",
        "rename", "renames", "replace", "walk", "scandir", "chdir", "chmod", "chown", "stat",
        "lstat", "open", "truncate", "link", "symlink", "getcwd", "fdopen", "read", "write",
    ];
    const PROCESS_PREFIXES: &[&str] = &["system", "popen", "spawn", "exec", "fork", "kill", "posix_spawn"];
    const ENVIRONMENT: &[&str] = &["environ", "environb", "getenvb", "putenv", "unsetenv"];

    if FILESYSTEM.contains(&attribute) {
        ForbiddenCapability::FilesystemAccess
    } else if attribute == "startfile"
        || PROCESS_PREFIXES
            .iter()
            .any(|prefix| attribute.starts_with(prefix))
    {
        ForbiddenCapability::ProcessSpawning
    } else if ENVIRONMENT.contains(&attribute) {
        ForbiddenCapability::EnvironmentEnumeration
    } else {
        ForbiddenCapability::OsAccess
    }
}

/// Reads the literal argument of an `os.getenv` call whose attribute ends at
/// `after_attribute`.
fn literal_getenv_name(masked: &MaskedSource<'_>, after_attribute: usize) -> Result<String, String> {
    let bytes = masked.masked().as_bytes();
    let original = masked.original();

    let open = skip_whitespace(bytes, after_attribute);
    if bytes.get(open) != Some(&b'(') {
        return Err("`os.getenv` used without calling it".to_owned());
    }
    let quote_at = skip_whitespace(bytes, open + 1);
    let quote = match bytes.get(quote_at) {
        Some(&byte) if byte == b'\'' || byte == b'"' => byte,
        _ => return Err("`os.getenv` called with a non-literal name".to_owned()),
    };
    let name_start = quote_at + 1;
    let Some(length) = original[name_start..].bytes().position(|byte| byte == quote) else {
        return Err("`os.getenv` called with an unterminated name".to_owned());
    };
    let name = &original[name_start..name_start + length];
    let after = skip_whitespace(bytes, name_start + length + 1);
    if !matches!(bytes.get(after), Some(b',' | b')')) {
        return Err(format!("`os.getenv('{name}' ...)` builds the name dynamically"));
    }
    CredentialName::new(name)
        .map(|name| name.as_str().to_owned())
        .map_err(|_| format!("`os.getenv('{name}')` is not a valid credential name"))
}

fn skip_whitespace(bytes: &[u8], mut index: usize) -> usize {
    while bytes.get(index).is_some_and(u8::is_ascii_whitespace) {
        index += 1;
    }
    index
}

/// Enforces the single annotated function shape, returning its name.
fn scan_structure(lines: &[LogicalLine], findings: &mut BTreeSet<Finding>) -> Option<String> {
    let mut functions = Vec::new();

    for (position, line) in lines.iter().enumerate() {
        let text = line.text.as_str();
        if starts_with_keyword(text, "class") {
            findings.insert(Finding::at(
                line.line,
                ForbiddenCapability::StructuralContract,
                "class definitions are not allowed",
            ));
        }
        if text.starts_with('@') {
            findings.insert(Finding::at(
                line.line,
                ForbiddenCapability::StructuralContract,
                "decorators are not allowed",
            ));
        }
        if line.indent > 0 {
            continue;
        }

        if starts_with_keyword(text, "async") {
            findings.insert(Finding::at(
                line.line,
                ForbiddenCapability::StructuralContract,
                "async functions are not allowed",
            ));
        } else if starts_with_keyword(text, "def") {
            if let Some(name) = check_function(line, lines.get(position + 1), findings) {
                functions.push(name);
            }
        } else if !(starts_with_keyword(text, "class")
            || text.starts_with('@')
            || statements(line).all(is_import_or_docstring))
        {
            findings.insert(Finding::at(
                line.line,
                ForbiddenCapability::StructuralContract,
                "only imports and the function may appear at top level",
            ));
        }
    }

    match functions.len() {
        0 => {
            findings.insert(Finding::whole(
                ForbiddenCapability::StructuralContract,
                "no top-level function is defined",
            ));
            None
        }
        1 => functions.pop(),
        count => {
            findings.insert(Finding::whole(
                ForbiddenCapability::StructuralContract,
                format!("{count} top-level functions are defined; exactly one is allowed"),
            ));
            None
        }
    }
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == ':'))
}

fn is_import_or_docstring(statement: &str) -> bool {
    keyword_rest(statement, "import").is_some()
        || keyword_rest(statement, "from").is_some()
        || DOCSTRING.is_match(statement)
}

/// Validates one top-level `def`, returning its name when the header parses.
fn check_function(
    line: &LogicalLine,
    next: Option<&LogicalLine>,
    findings: &mut BTreeSet<Finding>,
) -> Option<String> {
    let text = line.text.as_str();
    let mut violation = |detail: String| {
        findings.insert(Finding::at(
            line.line,
            ForbiddenCapability::StructuralContract,
            detail,
        ));
    };

    let Some(captures) = DEF_HEADER.captures(text) else {
        violation("function header could not be read".to_owned());
        return None;
    };
    let name = captures["name"].to_owned();
    let open = captures.get(0).map_or(0, |m| m.end() - 1);
    let Some(close) = matching_close(text, open) else {
        violation(format!("`{name}` has an unterminated parameter list"));
        return Some(name);
    };

    for parameter in split_top_level(&text[open + 1..close], b',') {
        let parameter = parameter.trim();
        if parameter.is_empty() || parameter == "*" || parameter == "/" {
            continue;
        }
        let bare = parameter.trim_start_matches('*');
        if !is_annotated(bare) {
            let param_name = bare.split([':', '=']).next().unwrap_or(bare).trim();
            violation(format!("parameter `{param_name}` of `{name}` has no type annotation"));
        }
    }

    let Some(colon) = top_level_position(text, close + 1, b':') else {
        violation(format!("`{name}` has no body"));
        return Some(name);
    };
    let returns = text[close + 1..colon].trim();
    if !returns.strip_prefix("->").is_some_and(|annotation| !annotation.trim().is_empty()) {
        violation(format!("`{name}` has no return type annotation"));
    }

    let inline_body = text[colon + 1..].trim();
    let first_statement = if inline_body.is_empty() {
        next.filter(|body| body.indent > 0)
            .and_then(|body| statements(body).next())
    } else {
        inline_body.split(';').map(str::trim).next()
    };
    if !first_statement.is_some_and(|statement| DOCSTRING.is_match(statement)) {
        violation(format!("`{name}` does not start with a docstring"));
    }
    Some(name)
}

fn is_annotated(parameter: &str) -> bool {
    top_level_position_of_any(parameter, b":=") == Some(b':')
}

fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in text.bytes().enumerate().skip(open) {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn top_level_position(text: &str, from: usize, target: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (index, byte) in text.bytes().enumerate().skip(from) {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if byte == target && depth == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

fn top_level_position_of_any(text: &str, targets: &[u8]) -> Option<u8> {
    let mut depth = 0usize;
    for byte in text.bytes() {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && targets.contains(&byte) => return Some(byte),
            _ => {}
        }
    }
    None
}

fn split_top_level(text: &str, separator: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, byte) in text.bytes().enumerate() {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if byte == separator && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const BITCOIN: &str = r#"import requests


def get_bitcoin_price(currency: str = "usd") -> dict:
    """Fetch the current Bitcoin price in the given currency."""
    response = requests.get(
        "https://api.coingecko.com/api/v3/simple/price",
        params={"ids": "bitcoin", "vs_currencies": currency},
        timeout=10,
    )
    response.raise_for_status()
    return response.json()
"#;

    const WEATHER: &str = r#"import os
import requests


def current_weather(city: str, units: str = "metric") -> dict:
    '''Return the weather for a city.'''
    key = os.getenv('WEATHER_KEY')
    if not key:
        return {"error": "Please add your [WEATHER_KEY] in settings"}
    backup = os.getenv("WEATHER_KEY", "")
    region = os.getenv( "WEATHER_REGION" )
    url = "https://api.example.com/weather?open(x)"
    return requests.get(url, params={"q": city, "key": key or backup, "r": region}, timeout=10).json()
"#;

    fn capabilities(analysis: &SourceAnalysis) -> Vec<ForbiddenCapability> {
        analysis.findings().iter().map(Finding::capability).collect()
    }

    #[test]
    fn public_http_tool_is_clean() {
        let analysis = analyze(BITCOIN);
        assert!(analysis.is_clean(), "{:?}", analysis.reasons());
        assert_eq!(analysis.entrypoint(), Some("get_bitcoin_price"));
        assert!(analysis.credential_names().is_empty());
    }

    #[test]
    fn literal_getenv_names_are_declared() {
        let analysis = analyze(WEATHER);
        assert!(analysis.is_clean(), "{:?}", analysis.reasons());
        assert_eq!(analysis.credential_names(), ["WEATHER_KEY", "WEATHER_REGION"]);
        assert_eq!(
            extract_credential_names(WEATHER),
            ["WEATHER_KEY", "WEATHER_REGION"]
        );
    }

    #[test]
    fn environment_enumeration_is_cited() {
        let source = "import os\n\n\ndef dump_env() -> dict:\n    \"\"\"Return every variable.\"\"\"\n    return dict(os.environ)\n";
        let analysis = analyze(source);
        assert_eq!(
            capabilities(&analysis),
            [ForbiddenCapability::EnvironmentEnumeration]
        );
        assert_eq!(
            analysis.reasons(),
            ["line 6: raw environment enumeration: `os.environ`"]
        );
    }

    #[test]
    fn forbidden_calls_are_found_outside_strings() {
        let source = "import subprocess\n\n\ndef run(cmd: str) -> str:\n    \"\"\"Run eval( in docs.\"\"\"\n    data = open('/etc/passwd').read()  # exec(\n    value = eval(cmd)\n    subprocess.run(['ls'])\n    return data\n";
        let analysis = analyze(source);
        let found = capabilities(&analysis);
        assert!(found.contains(&ForbiddenCapability::FilesystemAccess));
        assert!(found.contains(&ForbiddenCapability::DynamicEvaluation));
        assert!(found.contains(&ForbiddenCapability::ProcessSpawning));
        assert!(found.contains(&ForbiddenCapability::DisallowedImport));
        let lines: Vec<_> = analysis
            .findings()
            .iter()
            .filter(|finding| finding.capability() == ForbiddenCapability::DynamicEvaluation)
            .map(Finding::line)
            .collect();
        assert_eq!(lines, [Some(7)]);
    }

    #[test]
    fn method_calls_named_like_builtins_are_allowed() {
        let source = "import re\n\n\ndef words(text: str) -> list:\n    \"\"\"Split words.\"\"\"\n    pattern = re.compile(r'\\w+')\n    return pattern.findall(text)\n";
        assert!(analyze(source).is_clean());
    }

    #[test]
    fn non_literal_credential_reads_are_rejected() {
        let source = "import os\n\n\ndef read(name: str) -> str:\n    \"\"\"Read.\"\"\"\n    a = os.getenv(name)\n    b = os.getenv('API_' + name)\n    c = os.getenv(f'{name}_KEY')\n    getter = os.getenv\n    return a\n";
        let analysis = analyze(source);
        let undeclared = analysis
            .findings()
            .iter()
            .filter(|finding| {
                finding.capability() == ForbiddenCapability::UndeclaredCredentialAccess
            })
            .count();
        assert_eq!(undeclared, 4);
        assert!(analysis.credential_names().is_empty());
    }

    #[test]
    fn os_is_limited_to_getenv() {
        let source = "import os\nimport os.path\nfrom os import environ\n\n\ndef f(path: str) -> bool:\n    \"\"\"Check.\"\"\"\n    os.system('ls')\n    return os.path.exists(path) or os.cpu_count() > 1\n";
        let found = capabilities(&analyze(source));
        assert!(found.contains(&ForbiddenCapability::ProcessSpawning));
        assert!(found.contains(&ForbiddenCapability::FilesystemAccess));
        assert!(found.contains(&ForbiddenCapability::OsAccess));
        assert!(found.contains(&ForbiddenCapability::EnvironmentEnumeration));
    }

    #[test]
    fn imports_outside_the_allowlist_are_rejected() {
        let source = "import json, yaml\nfrom typing import Any\nfrom .local import thing\n\n\ndef f(x: Any) -> str:\n    \"\"\"Dump.\"\"\"\n    return json.dumps(x)\n";
        let reasons = analyze(source).reasons();
        assert!(reasons.iter().any(|r| r.contains("`import yaml`")));
        assert!(reasons.iter().any(|r| r.contains("relative import")));
        assert!(!reasons.iter().any(|r| r.contains("typing")));
    }

    #[test]
    fn structural_contract_requires_one_annotated_documented_function() {
        let source = "import json\n\nCACHE = {}\n\n\nclass Helper:\n    pass\n\n\ndef first(a, *args: int, **kwargs) -> str:\n    return ''\n\n\ndef second(b: int):\n    \"\"\"Doc.\"\"\"\n    return b\n";
        let analysis = analyze(source);
        assert_eq!(analysis.entrypoint(), None);
        let reasons = analysis.reasons();
        let expected = [
            "structural contract violation: 2 top-level functions are defined; exactly one is allowed",
            "line 3: structural contract violation: only imports and the function may appear at top level",
            "line 6: structural contract violation: class definitions are not allowed",
            "line 10: structural contract violation: parameter `a` of `first` has no type annotation",
            "line 10: structural contract violation: parameter `kwargs` of `first` has no type annotation",
            "line 10: structural contract violation: `first` does not start with a docstring",
            "line 14: structural contract violation: `second` has no return type annotation",
        ];
        for reason in expected {
            assert!(reasons.iter().any(|r| r == reason), "missing {reason}: {reasons:?}");
        }
    }

    #[test]
    fn multiline_signatures_and_keyword_only_markers_parse() {
        let source = "from typing import Optional\n\n\ndef lookup(\n    symbol: str,\n    *,\n    limit: Optional[int] = None,\n) -> dict[str, int]:\n    r\"\"\"Look up a symbol.\n\n    Args are documented here.\n    \"\"\"\n    return {symbol: limit or 0}\n";
        let analysis = analyze(source);
        assert!(analysis.is_clean(), "{:?}", analysis.reasons());
        assert_eq!(analysis.entrypoint(), Some("lookup"));
    }

    #[test]
    fn missing_function_is_reported_without_line() {
        let analysis = analyze("import json\n");
        assert_eq!(
            analysis.reasons(),
            ["structural contract violation: no top-level function is defined"]
        );
    }
}
