//! CLI command definitions for vyvchai.
//!
//! `run` processes one tutoring request end to end against the configured
//! backends; `cache-key` prints the response-cache key for a conversation.

use crate::agents::{AgentState, MultiAgentOrchestrator, Subject, TutorRequest};
use crate::config::TutorConfig;
use crate::llm::{
    CacheBackend, InMemoryCacheBackend, Message, ModelPricing, OpenAiCompatibleClient, RedisCacheBackend,
    ResponseCache, RoutedGateway,
};
use crate::metrics::{export_metrics, init_metrics, MetricsCollector, NoopTelemetry, TelemetrySink};
use crate::retrieval::{IndexRetriever, InMemoryIndex};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

/// Multi-agent AI tutor for Ukrainian school subjects.
#[derive(Parser)]
#[command(name = "vyvchai")]
#[command(about = "Generate lessons, quizzes, solutions and feedback with a supervised team of LLM agents")]
#[command(version)]
#[command(
    long_about = "vyvchai runs a supervisor and specialist agents over one tutoring request: it retrieves grounding material, writes a lesson and quiz, solves problems, grades answers, and regenerates content the quality reviewer rejects.\n\nExample usage:\n  vyvchai run --grade 8 --subject algebra --topic \"Квадратні рівняння\" --corpus ./corpus.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Process one tutoring request.
    Run(RunArgs),

    /// Print the response-cache key for a conversation.
    CacheKey(CacheKeyArgs),
}

/// Arguments for `vyvchai run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// School grade (1-12).
    #[arg(short, long)]
    pub grade: u8,

    /// Subject: ukrainian, history, algebra or mathematics.
    #[arg(short, long)]
    pub subject: String,

    /// Topic or question the lesson is about.
    #[arg(short, long)]
    pub topic: String,

    /// Student answers, one per quiz question, in order.
    #[arg(short, long = "answers")]
    pub answers: Vec<String>,

    /// Restrict retrieval to these topics.
    #[arg(long = "topic-filter")]
    pub topic_filter: Vec<String>,

    /// Student profile as a JSON object.
    #[arg(long)]
    pub profile: Option<String>,

    /// JSON corpus of grounding documents.
    #[arg(long, env = "CORPUS_PATH")]
    pub corpus: Option<String>,

    /// YAML configuration file. Environment variables override it.
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, default_value = "cli-class")]
    pub class_id: String,

    #[arg(long, default_value = "cli-student")]
    pub student_id: String,

    #[arg(long, default_value = "cli-teacher")]
    pub teacher_id: String,

    /// Print the final state as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for `vyvchai cache-key`.
#[derive(Parser, Debug)]
pub struct CacheKeyArgs {
    /// Model name the request targets.
    #[arg(short, long)]
    pub model: String,

    /// Sampling temperature.
    #[arg(short, long, default_value = "0.7")]
    pub temperature: f64,

    /// Conversation messages as `role:text`, in order.
    #[arg(long = "message", required = true)]
    pub messages: Vec<String>,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_tutor_command(args).await,
        Commands::CacheKey(args) => run_cache_key_command(args),
    }
}

fn load_config(args: &RunArgs) -> anyhow::Result<TutorConfig> {
    let mut config = match &args.config {
        Some(path) => TutorConfig::from_yaml_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e))?,
        None => TutorConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    if let Some(corpus) = &args.corpus {
        config = config.with_corpus_path(corpus);
    }
    config.validate()?;
    Ok(config)
}

async fn build_cache(config: &TutorConfig) -> Option<ResponseCache> {
    if !config.cache_enabled {
        return None;
    }

    let backend: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => match RedisCacheBackend::connect(url).await {
            Ok(redis) => {
                info!(url = %url, "Using Redis response cache");
                Arc::new(redis)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, using in-memory response cache");
                Arc::new(InMemoryCacheBackend::new())
            }
        },
        None => Arc::new(InMemoryCacheBackend::new()),
    };
    Some(ResponseCache::new(backend, config.cache_ttl()))
}

async fn build_gateway(
    config: &TutorConfig,
    telemetry: Arc<dyn TelemetrySink>,
) -> anyhow::Result<Arc<RoutedGateway>> {
    let local = OpenAiCompatibleClient::new(&config.local_llm_url, None, &config.local_llm_model)?;
    let cloud = OpenAiCompatibleClient::new(
        &config.cloud_api_base,
        config.cloud_api_key.clone(),
        &config.cloud_llm_model,
    )?;
    if !cloud.has_api_key() {
        warn!("OPENAI_API_KEY is not set; cloud calls will be unauthenticated");
    }

    let mut gateway = RoutedGateway::new()
        .with_local(Arc::new(local), ModelPricing::FREE)
        .with_cloud(Arc::new(cloud), config.cloud_pricing())
        .with_fallback(config.fallback_to_cloud)
        .with_telemetry(telemetry);
    if let Some(cache) = build_cache(config).await {
        gateway = gateway.with_cache(cache);
    }
    Ok(Arc::new(gateway))
}

fn build_retriever(config: &TutorConfig) -> anyhow::Result<IndexRetriever> {
    match &config.corpus_path {
        Some(path) => {
            let index = InMemoryIndex::from_json_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load corpus {}: {}", path.display(), e))?;
            info!(documents = index.len(), "Loaded corpus");
            Ok(IndexRetriever::new(Arc::new(index)))
        }
        None => {
            warn!("No corpus configured; lessons will not be grounded");
            Ok(IndexRetriever::unavailable())
        }
    }
}

async fn run_tutor_command(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let subject: Subject = args.subject.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let student_profile = args
        .profile
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid --profile JSON: {}", e))?;

    let telemetry: Arc<dyn TelemetrySink> = if args.metrics {
        init_metrics()?;
        Arc::new(MetricsCollector::new())
    } else {
        Arc::new(NoopTelemetry)
    };

    let gateway = build_gateway(&config, telemetry.clone()).await?;
    let retriever = build_retriever(&config)?;
    let orchestrator = MultiAgentOrchestrator::new(gateway.clone(), Arc::new(retriever), config.orchestrator_config())
        .with_telemetry(telemetry);

    let request = TutorRequest {
        request_id: None,
        class_id: args.class_id,
        student_id: args.student_id,
        teacher_id: args.teacher_id,
        grade: args.grade,
        subject,
        topic_query: args.topic,
        topic_filter: Some(args.topic_filter).filter(|t| !t.is_empty()),
        student_profile,
        student_answers: Some(args.answers).filter(|a| !a.is_empty()),
        trace_id: None,
    };

    let state = orchestrator.process_request(request).await?;

    let costs = gateway.cost_tracker().report();
    info!(calls = costs.calls, total_cents = costs.total_cents, "LLM spend");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state);
    }

    if args.metrics {
        println!("{}", export_metrics());
    }
    Ok(())
}

fn print_summary(state: &AgentState) {
    let ctx = &state.context;
    println!("=== {} · {} клас · {} ===", ctx.topic_query, ctx.grade, ctx.subject.display_name());
    println!("Request: {}", ctx.request_id);
    println!();

    if !state.lesson_content.is_empty() {
        println!("--- Урок ---");
        println!("{}", state.lesson_content);
        if !state.lesson_sources.is_empty() {
            println!("Джерела: {}", state.lesson_sources.join("; "));
        }
        println!();
    }

    if !state.quiz.is_empty() {
        println!("--- Тест ({} питань) ---", state.quiz.len());
        for (i, q) in state.quiz.iter().enumerate() {
            println!("{}. {}", i + 1, q.question);
            if let Some(options) = &q.options {
                for option in options {
                    println!("   - {}", option);
                }
            }
        }
        println!();
    }

    for solved in &state.solved_problems {
        println!("--- Розв'язок до питання {} ---", solved.question_index + 1);
        println!("{}", solved.solution);
        println!();
    }

    if let Some(grading) = &state.grading_result {
        println!(
            "Оцінювання: {}/{} правильних, середній бал {:.1}",
            grading.correct_answers, grading.total_questions, grading.average_score
        );
    }
    if let Some(recs) = &state.recommendations {
        println!("--- Рекомендації ---");
        println!("{}", recs.recommendations);
        println!();
    }

    println!(
        "Validation: {} (regenerations: {})",
        if state.validation_passed { "passed" } else { "failed" },
        state.regeneration_count
    );
    for issue in &state.feedback.issues {
        println!("  issue: {}", issue);
    }
    for error in &state.errors {
        println!("  error: {}", error);
    }
}

/// Parse `role:text` into a message.
fn parse_message(raw: &str) -> anyhow::Result<Message> {
    let (role, text) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Message must be 'role:text', got '{}'", raw))?;
    let role = role.trim();
    match role {
        "system" | "user" | "assistant" => Ok(Message::new(role, text)),
        other => Err(anyhow::anyhow!("Unknown message role '{}'", other)),
    }
}

fn run_cache_key_command(args: CacheKeyArgs) -> anyhow::Result<()> {
    let messages = args
        .messages
        .iter()
        .map(|m| parse_message(m))
        .collect::<anyhow::Result<Vec<_>>>()?;
    println!("{}", ResponseCache::cache_key(&messages, &args.model, args.temperature));
    Ok(())
}
