//! Execution of persisted artifacts.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use agent_policy::ALLOWED_IMPORTS;
use agent_primitives::ToolId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::scope::CredentialScope;
use crate::{ToolError, ToolResult};

const MAX_STDERR_CHARS: usize = 2_000;

/// Artifact source bound to its entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactProgram {
    id: ToolId,
    entrypoint: String,
    source: String,
}

impl ArtifactProgram {
    /// Creates a program.
    #[must_use]
    pub fn new(id: ToolId, entrypoint: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id,
            entrypoint: entrypoint.into(),
            source: source.into(),
        }
    }

    /// Artifact identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Function called with the arguments.
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    /// Source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Runs artifact programs.
#[async_trait]
pub trait ToolRuntime: Send + Sync {
    /// Calls the program's entrypoint with `arguments`.
    async fn run(
        &self,
        program: &ArtifactProgram,
        arguments: Value,
        scope: &CredentialScope,
    ) -> ToolResult<Value>;
}

#[async_trait]
impl<F> ToolRuntime for F
where
    F: Fn(&ArtifactProgram, Value, &CredentialScope) -> ToolResult<Value> + Send + Sync,
{
    async fn run(
        &self,
        program: &ArtifactProgram,
        arguments: Value,
        scope: &CredentialScope,
    ) -> ToolResult<Value> {
        (self)(program, arguments, scope)
    }
}

const HARNESS: &str = r#"
import builtins, json, sys, types
import os as _os

_ALLOWED = set(json.loads(sys.argv[1]))
_shim = types.ModuleType("os")
_shim.getenv = _os.getenv
_real_import = builtins.__import__

def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    root = name.split(".")[0]
    if level != 0 or root not in _ALLOWED:
        raise ImportError("import of " + name + " is not allowed")
    if root == "os":
        return _shim
    return _real_import(name, globals, locals, fromlist, level)

def _print(*args, sep=" ", end="\n", flush=False):
    builtins.print(*args, sep=sep, end=end, file=sys.stderr, flush=flush)

_SAFE = {}
for _name in (
    "abs", "all", "any", "bool", "callable", "chr", "dict", "divmod", "enumerate",
    "filter", "float", "format", "getattr", "hasattr", "hash", "id", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min", "next",
    "ord", "pow", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "str", "sum", "tuple", "type", "zip", "Exception", "AttributeError",
    "IndexError", "KeyError", "RuntimeError", "TypeError", "ValueError",
    "ZeroDivisionError",
):
    _SAFE[_name] = getattr(builtins, _name)
_SAFE["print"] = _print
_SAFE["__import__"] = _guarded_import

_request = json.loads(sys.stdin.read())
_namespace = {"__builtins__": _SAFE, "__name__": "artifact"}
try:
    exec(compile(_request["source"], _request["entrypoint"] + ".py", "exec"), _namespace)
    _result = _namespace[_request["entrypoint"]](**_request["arguments"])
    _reply = {"ok": True, "result": _result}
except BaseException as _exc:
    _reply = {"ok": False, "error": type(_exc).__name__ + ": " + str(_exc)}
sys.stdout.write(json.dumps(_reply, default=str))
"#;

#[derive(Serialize)]
struct HarnessRequest<'a> {
    source: &'a str,
    entrypoint: &'a str,
    arguments: Value,
}

#[derive(Deserialize)]
struct HarnessReply {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Runs artifacts in a `python3` child process.
///
/// The child starts from an empty environment holding only `PATH` and the
/// scoped credentials. Imports are limited to the allowlist and `os`
/// exposes `getenv` alone. `print` writes to stderr, leaving stdout to the
/// JSON reply.
#[derive(Clone)]
pub struct PythonRuntime {
    interpreter: PathBuf,
    timeout: Duration,
}

impl fmt::Debug for PythonRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonRuntime")
            .field("interpreter", &self.interpreter)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PythonRuntime {
    /// Creates a runtime using `interpreter` with a per-call `timeout`.
    #[must_use]
    pub fn new(interpreter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ToolRuntime for PythonRuntime {
    async fn run(
        &self,
        program: &ArtifactProgram,
        arguments: Value,
        scope: &CredentialScope,
    ) -> ToolResult<Value> {
        let arguments = match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::Object(map) => Value::Object(map),
            _ => return Err(ToolError::execution("tool arguments must be a JSON object")),
        };
        let request = serde_json::to_vec(&HarnessRequest {
            source: program.source(),
            entrypoint: program.entrypoint(),
            arguments,
        })
        .map_err(|err| ToolError::execution(err.to_string()))?;
        let allowed = serde_json::to_string(ALLOWED_IMPORTS)
            .map_err(|err| ToolError::execution(err.to_string()))?;

        let mut command = Command::new(&self.interpreter);
        command
            .arg("-I")
            .arg("-c")
            .arg(HARNESS)
            .arg(allowed)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        for (name, value) in scope.iter() {
            command.env(name.as_str(), value);
        }

        let mut child = command
            .spawn()
            .map_err(|err| ToolError::execution(format!("failed to start interpreter: {err}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|err| ToolError::execution(err.to_string()))?;
            stdin
                .shutdown()
                .await
                .map_err(|err| ToolError::execution(err.to_string()))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|err| ToolError::execution(err.to_string()))?;
        debug!(tool = %program.id(), status = ?output.status, "artifact process finished");

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(ToolError::execution(format!(
                "interpreter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let reply: HarnessReply = serde_json::from_slice(&output.stdout)
            .map_err(|err| ToolError::execution(format!("unreadable tool output: {err}")))?;
        if reply.ok {
            Ok(reply.result)
        } else {
            Err(ToolError::execution(
                reply.error.unwrap_or_else(|| "tool failed".to_owned()),
            ))
        }
    }
}
