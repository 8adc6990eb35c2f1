use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agent_adapters::{
    FailoverGenerator, GenerationError, GenerationRequest, GenerationResult, TextGenerator,
};
use agent_catalog::{
    ArtifactPersister, Catalog, CredentialRecord, CredentialSource, FileStore,
    MemoryDocumentStore, MemoryFileStore, NewArtifact,
};
use agent_credentials::{CredentialResolver, GeneratorDirectory};
use agent_kernel::{
    CodeSynthesizer, CreateToolRequest, FactoryError, InvokeError, ReviewObserver, ToolFactory,
};
use agent_policy::{ClassifierReviewer, GatedReviewer, SafetyVerdict};
use agent_primitives::{AgentId, CredentialName, ToolId};
use agent_prompts::PromptLibrary;
use agent_prompts::library::{DISCOVERY_SYSTEM, REVIEW_SYSTEM, SYNTHESIS_SYSTEM};
use agent_tools::{
    ArtifactProgram, CredentialScope, ExecutionGuard, ToolLoader, ToolResult,
};
use async_trait::async_trait;
use serde_json::{Value, json};

const BITCOIN: &str = r#"```python
import requests


def get_bitcoin_price() -> dict:
    """Return the current Bitcoin price in USD from a public API."""
    response = requests.get(
        "https://api.coingecko.com/api/v3/simple/price",
        params={"ids": "bitcoin", "vs_currencies": "usd"},
        timeout=10,
    )
    response.raise_for_status()
    return response.json()
```"#;

const ENV_DUMP: &str = r#"import os


def dump_settings() -> dict:
    """Return the configuration."""
    return dict(os.environ)
"#;

const WEATHER: &str = r#"import os
import requests


def current_weather(city: str) -> dict:
    """Return the weather for a city."""
    key = os.getenv('WEATHER_KEY')
    if not key:
        return {"error": "Please add your [WEATHER_KEY] in settings"}
    return requests.get("https://api.example.com/weather", params={"q": city, "key": key}, timeout=10).json()
"#;

const NASA: &str = r#"import os
import requests


def picture_of_the_day() -> dict:
    """Return NASA's astronomy picture of the day."""
    key = os.getenv('NASA_API_KEY')
    if not key:
        return {"error": "Please add your [NASA_API_KEY] in settings"}
    return requests.get("https://api.nasa.gov/planetary/apod", params={"api_key": key}, timeout=10).json()
"#;

const READS_K1: &str = r#"import os


def tool_a() -> str:
    """Reads K1."""
    return os.getenv('K1') or ''
"#;

const READS_NOTHING: &str = r#"def tool_b() -> str:
    """Reads nothing."""
    return 'b'
"#;

type Replies = Mutex<VecDeque<GenerationResult<String>>>;

#[derive(Default)]
struct Scripted {
    synthesis: Replies,
    review: Replies,
    discovery: Replies,
    synthesis_prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn synthesize(self: Arc<Self>, replies: &[GenerationResult<&str>]) -> Arc<Self> {
        push(&self.synthesis, replies);
        self
    }

    fn review(self: Arc<Self>, replies: &[GenerationResult<&str>]) -> Arc<Self> {
        push(&self.review, replies);
        self
    }

    fn discover(self: Arc<Self>, replies: &[GenerationResult<&str>]) -> Arc<Self> {
        push(&self.discovery, replies);
        self
    }
}

fn push(queue: &Replies, replies: &[GenerationResult<&str>]) {
    let mut queue = queue.lock().unwrap();
    for reply in replies {
        queue.push_back(match reply {
            Ok(text) => Ok((*text).to_owned()),
            Err(err) => Err(match err {
                GenerationError::Capacity { reason } => GenerationError::capacity(reason.clone()),
                GenerationError::Generation { reason } => {
                    GenerationError::generation(reason.clone())
                }
            }),
        });
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    fn label(&self) -> &str {
        "scripted"
    }

    async fn generate_text(&self, request: &GenerationRequest) -> GenerationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (queue, fallback) = if request.system() == SYNTHESIS_SYSTEM {
            self.synthesis_prompts
                .lock()
                .unwrap()
                .push(request.prompt().to_owned());
            (&self.synthesis, None)
        } else if request.system() == REVIEW_SYSTEM {
            (&self.review, Some("SAFE"))
        } else if request.system() == DISCOVERY_SYSTEM {
            (&self.discovery, Some(r#"{"found": false}"#))
        } else {
            return Err(GenerationError::generation("unexpected request"));
        };
        match queue.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => fallback
                .map(str::to_owned)
                .ok_or_else(|| GenerationError::generation("script exhausted")),
        }
    }
}

#[derive(Default)]
struct Verdicts(Mutex<Vec<(u32, bool)>>);

impl ReviewObserver for Verdicts {
    fn on_verdict(&self, _request: &str, attempt: u32, verdict: &SafetyVerdict) {
        self.0.lock().unwrap().push((attempt, verdict.is_safe()));
    }
}

struct Harness {
    factory: ToolFactory,
    catalog: Catalog,
    files: Arc<MemoryFileStore>,
    runs: Arc<Mutex<Vec<String>>>,
    verdicts: Arc<Verdicts>,
}

fn harness(generator: Arc<dyn TextGenerator>, env: &[(&str, &str)]) -> Harness {
    let prompts = Arc::new(PromptLibrary::default());
    let files = Arc::new(MemoryFileStore::new());
    let catalog = Catalog::new(Arc::new(MemoryDocumentStore::new()), files.clone());

    let env: BTreeMap<String, String> = env
        .iter()
        .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
        .collect();
    let resolver = CredentialResolver::new(
        catalog.clone(),
        Arc::new(move |name: &str| env.get(name).cloned()),
        Arc::new(GeneratorDirectory::new(generator.clone(), prompts.clone())),
    );

    let runs = Arc::new(Mutex::new(Vec::new()));
    let runtime = {
        let runs = Arc::clone(&runs);
        move |program: &ArtifactProgram, args: Value, scope: &CredentialScope| -> ToolResult<Value> {
            runs.lock().unwrap().push(program.id().to_string());
            Ok(json!({
                "entrypoint": program.entrypoint(),
                "args": args,
                "scoped": scope.names().map(ToString::to_string).collect::<Vec<_>>(),
                "k1": scope.get("K1"),
            }))
        }
    };
    let loader = ToolLoader::new(catalog.clone(), Arc::new(runtime), true);
    let guard = ExecutionGuard::new(resolver.clone());
    let reviewer = Arc::new(GatedReviewer::new(Arc::new(ClassifierReviewer::new(
        generator.clone(),
        prompts.clone(),
    ))));
    let verdicts = Arc::new(Verdicts::default());
    let factory = ToolFactory::new(
        catalog.clone(),
        CodeSynthesizer::new(generator, prompts),
        reviewer,
        resolver,
        loader,
        guard,
    )
    .with_observer(verdicts.clone());

    Harness {
        factory,
        catalog,
        files,
        runs,
        verdicts,
    }
}

async fn persist(catalog: &Catalog, hint: &str, source: &str, credentials: &[&str]) -> ToolId {
    ArtifactPersister::new(catalog.clone(), 40)
        .persist(NewArtifact {
            name_hint: Some(hint.to_owned()),
            description: format!("{hint} tool"),
            source: source.to_owned(),
            credentials: credentials
                .iter()
                .map(|name| CredentialName::new(*name).unwrap())
                .collect(),
            owner: None,
            verdict: SafetyVerdict::safe(),
        })
        .await
        .unwrap()
        .record
        .id()
        .clone()
}

#[tokio::test]
async fn public_bitcoin_tool_is_created_and_invoked() {
    let script = Scripted::new().synthesize(&[Ok(BITCOIN)]);
    let h = harness(script.clone(), &[]);

    let created = h
        .factory
        .create_tool(CreateToolRequest::new(
            "fetch the current price of Bitcoin in USD using a public API",
        ))
        .await
        .unwrap();

    assert_eq!(
        created.record.id().as_str(),
        "tool_fetch_the_current_price_of_bitcoin_in_us"
    );
    assert!(created.record.credentials().is_empty());
    assert!(created.record.verdict().is_safe());
    assert_eq!(created.attempts, 1);
    assert!(!created.linked);
    let source = h.catalog.tool_source(created.record.id()).await.unwrap().unwrap();
    assert!(source.starts_with("import requests"));
    assert!(!source.contains("```"));

    let output = h
        .factory
        .invoke_tool(created.record.id().as_str(), None, json!({}))
        .await
        .unwrap();
    assert_eq!(output["entrypoint"], "get_bitcoin_price");
}

#[tokio::test]
async fn environment_enumeration_is_rejected_after_the_budget() {
    let script = Scripted::new().synthesize(&[Ok(ENV_DUMP), Ok(ENV_DUMP), Ok(ENV_DUMP)]);
    let h = harness(script.clone(), &[]);

    let err = h
        .factory
        .create_tool(CreateToolRequest::new("show me every setting you have"))
        .await
        .unwrap_err();

    let FactoryError::SafetyRejected { reasons } = err else {
        panic!("expected a safety rejection, got {err:?}");
    };
    assert!(
        reasons
            .iter()
            .any(|reason| reason.contains("raw environment enumeration")),
        "{reasons:?}"
    );
    assert!(h.catalog.list_tools().await.is_empty());
    assert!(h.files.list().await.unwrap().is_empty());

    let prompts = script.synthesis_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("rejected"));
    assert!(prompts[1].contains("raw environment enumeration"));
    assert_eq!(
        *h.verdicts.0.lock().unwrap(),
        [(1, false), (2, false), (3, false)]
    );
}

#[tokio::test]
async fn classifier_rejection_feeds_the_next_attempt() {
    let script = Scripted::new()
        .synthesize(&[Ok(BITCOIN), Ok(BITCOIN)])
        .review(&[Ok("UNSAFE: sends data to an unknown host"), Ok("SAFE")]);
    let h = harness(script.clone(), &[]);

    let created = h
        .factory
        .create_tool(CreateToolRequest::new("bitcoin price").with_name_hint("btc"))
        .await
        .unwrap();

    assert_eq!(created.attempts, 2);
    assert_eq!(created.record.id().as_str(), "btc");
    let prompts = script.synthesis_prompts.lock().unwrap();
    assert!(prompts[1].contains("classifier: sends data to an unknown host"));
    assert_eq!(*h.verdicts.0.lock().unwrap(), [(1, false), (2, true)]);
}

#[tokio::test]
async fn missing_weather_key_never_runs_the_tool() {
    let script = Scripted::new().discover(&[Ok(r#"{"found": false}"#)]);
    let h = harness(script, &[]);
    let id = persist(&h.catalog, "weather", WEATHER, &["WEATHER_KEY"]).await;

    let err = h
        .factory
        .invoke_tool(id.as_str(), None, json!({"city": "Paris"}))
        .await
        .unwrap_err();

    let InvokeError::MissingCredential { names } = &err else {
        panic!("expected missing credential, got {err:?}");
    };
    assert_eq!(names, &[CredentialName::new("WEATHER_KEY").unwrap()]);
    assert!(err.to_string().contains("WEATHER_KEY"));
    assert!(h.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsatisfiable_declared_credentials_stop_creation() {
    let script = Scripted::new().synthesize(&[Ok(WEATHER)]);
    let h = harness(script, &[]);

    let err = h
        .factory
        .create_tool(CreateToolRequest::new("current weather for a city"))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, FactoryError::MissingCredentials { names } if names[0].as_str() == "WEATHER_KEY")
    );
    assert!(h.files.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn environment_defaults_satisfy_declared_credentials() {
    let script = Scripted::new().synthesize(&[Ok(WEATHER)]);
    let h = harness(script, &[("WEATHER_KEY", "from-env")]);

    let created = h
        .factory
        .create_tool(CreateToolRequest::new("current weather for a city"))
        .await
        .unwrap();
    assert_eq!(
        created.record.credentials(),
        [CredentialName::new("WEATHER_KEY").unwrap()]
    );

    let output = h
        .factory
        .invoke_tool(created.record.id().as_str(), None, json!({"city": "Lyon"}))
        .await
        .unwrap();
    assert_eq!(output["scoped"], json!(["WEATHER_KEY"]));
}

#[tokio::test]
async fn discovered_keys_are_registered() {
    let script = Scripted::new()
        .synthesize(&[Ok(NASA)])
        .discover(&[Ok(r#"{"found": true, "value": "DEMO_KEY"}"#)]);
    let h = harness(script.clone(), &[]);

    h.factory
        .create_tool(CreateToolRequest::new(
            "NASA picture of the day using NASA_API_KEY",
        ))
        .await
        .unwrap();

    let record = h
        .catalog
        .credential(&CredentialName::new("NASA_API_KEY").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.source(), CredentialSource::Discovered);
    assert_eq!(record.value(), "DEMO_KEY");
    assert!(script.synthesis_prompts.lock().unwrap()[0].contains("NASA_API_KEY"));
}

#[tokio::test]
async fn capacity_on_both_keys_surfaces_without_persisting() {
    let primary = Scripted::new().synthesize(&[Err(GenerationError::capacity("429"))]);
    let secondary = Scripted::new().synthesize(&[Err(GenerationError::capacity("429"))]);
    let failover = FailoverGenerator::new(vec![
        primary.clone() as Arc<dyn TextGenerator>,
        secondary.clone() as Arc<dyn TextGenerator>,
    ])
    .unwrap();
    let h = harness(Arc::new(failover), &[]);

    let err = h
        .factory
        .create_tool(CreateToolRequest::new("bitcoin price"))
        .await
        .unwrap_err();

    assert!(matches!(err, FactoryError::Capacity { .. }));
    assert!(err.is_retryable());
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    assert!(h.files.list().await.unwrap().is_empty());
    assert!(h.catalog.list_tools().await.is_empty());
}

#[tokio::test]
async fn capacity_on_the_first_key_fails_over() {
    let primary = Scripted::new().synthesize(&[Err(GenerationError::capacity("quota"))]);
    let secondary = Scripted::new().synthesize(&[Ok(BITCOIN)]);
    let failover = FailoverGenerator::new(vec![
        primary as Arc<dyn TextGenerator>,
        secondary as Arc<dyn TextGenerator>,
    ])
    .unwrap();
    let h = harness(Arc::new(failover), &[]);

    let created = h
        .factory
        .create_tool(CreateToolRequest::new("bitcoin price"))
        .await
        .unwrap();
    assert_eq!(created.record.id().as_str(), "tool_bitcoin_price");
}

#[tokio::test]
async fn colliding_hints_get_suffixes_and_owner_links() {
    let script = Scripted::new().synthesize(&[Ok(BITCOIN), Ok(BITCOIN)]);
    let h = harness(script, &[]);
    let agent = h.catalog.ensure_default_agent().await.unwrap();

    let first = h
        .factory
        .create_tool(
            CreateToolRequest::new("bitcoin price")
                .with_name_hint("Crypto Price")
                .with_owner(agent.id()),
        )
        .await
        .unwrap();
    let second = h
        .factory
        .create_tool(
            CreateToolRequest::new("bitcoin price again")
                .with_name_hint("crypto price")
                .with_owner(agent.id()),
        )
        .await
        .unwrap();

    assert_eq!(first.record.id().as_str(), "crypto_price");
    assert_eq!(second.record.id().as_str(), "crypto_price_1");
    assert!(first.linked && second.linked);

    let agent = h.catalog.agent(agent.id()).await.unwrap().unwrap();
    assert_eq!(agent.tools().len(), 2);

    let loader = h.factory.loader();
    let once = loader.load_tools_for_agent(Some(&agent)).await;
    let twice = loader.load_tools_for_agent(Some(&agent)).await;
    assert_eq!(once.registry().ids(), twice.registry().ids());
    assert!(once.skipped().is_empty());

    let output = h
        .factory
        .invoke_tool("crypto_price_1", Some(agent.id()), Value::Null)
        .await
        .unwrap();
    assert_eq!(output["entrypoint"], "get_bitcoin_price");
}

#[tokio::test]
async fn credentials_do_not_leak_between_invocations() {
    let h = harness(Scripted::new(), &[]);
    h.catalog
        .upsert_credential(&CredentialRecord::new(
            CredentialName::new("K1").unwrap(),
            "secret-one",
            "",
            CredentialSource::Admin,
        ))
        .await
        .unwrap();
    let a = persist(&h.catalog, "tool_a", READS_K1, &["K1"]).await;
    let b = persist(&h.catalog, "tool_b", READS_NOTHING, &[]).await;

    let during_a = h.factory.invoke_tool(a.as_str(), None, Value::Null).await.unwrap();
    let during_b = h.factory.invoke_tool(b.as_str(), None, Value::Null).await.unwrap();

    assert_eq!(during_a["k1"], "secret-one");
    assert_eq!(during_a["scoped"], json!(["K1"]));
    assert!(during_b["k1"].is_null());
    assert_eq!(during_b["scoped"], json!([]));

    let again = h.factory.invoke_tool(a.as_str(), None, Value::Null).await.unwrap();
    assert_eq!(again["k1"], "secret-one");
    assert_eq!(
        *h.runs.lock().unwrap(),
        [a.to_string(), b.to_string(), a.to_string()]
    );
}

#[tokio::test]
async fn unknown_tools_and_agents_are_reported() {
    let h = harness(Scripted::new(), &[]);
    let id = persist(&h.catalog, "lonely", READS_NOTHING, &[]).await;

    assert!(matches!(
        h.factory.invoke_tool("nope", None, Value::Null).await,
        Err(InvokeError::UnknownTool { .. })
    ));
    assert!(matches!(
        h.factory.invoke_tool("Not Valid!", None, Value::Null).await,
        Err(InvokeError::UnknownTool { .. })
    ));
    assert!(matches!(
        h.factory
            .invoke_tool(id.as_str(), Some(AgentId::random()), Value::Null)
            .await,
        Err(InvokeError::UnknownAgent { .. })
    ));

    let agent = h.catalog.ensure_default_agent().await.unwrap();
    assert!(matches!(
        h.factory
            .invoke_tool(id.as_str(), Some(agent.id()), Value::Null)
            .await,
        Err(InvokeError::UnknownTool { .. })
    ));
}

#[tokio::test]
async fn blank_prompts_are_invalid() {
    let script = Scripted::new();
    let h = harness(script.clone(), &[]);
    let err = h
        .factory
        .create_tool(CreateToolRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, FactoryError::InvalidRequest { .. }));
    assert_eq!(script.calls.load(Ordering::SeqCst), 0);
}
