use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use news_assistant::utils::text::strip_code_fences;
use news_assistant::{
    AppConfig, AssistantError, ContextPromptBuilder, ConversationOrchestrator, FeedAggregator,
    Fetcher, GeminiClient, NewsItem, NewsResponse, ResponseAgent,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const PREVIEW_CHARS: usize = 200;

#[derive(Parser, Debug)]
#[command(name = "news-assistant", version, about = "Ask questions about the latest IoT news")]
struct Cli {
    /// Feed URL to aggregate (repeatable; replaces the configured feeds)
    #[arg(long = "feed", value_name = "URL")]
    feeds: Vec<String>,

    /// Ask a single question and exit
    #[arg(long, value_name = "QUERY")]
    ask: Option<String>,

    /// Print answers in one piece instead of streaming them
    #[arg(long)]
    no_stream: bool,

    /// Print the aggregated news as JSON and exit
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if !cli.feeds.is_empty() {
        config.feeds = cli.feeds.clone();
    }

    let orchestrator = build_orchestrator(&config)?;
    info!("Starting news assistant with {} feeds", orchestrator.feed_urls().len());

    refresh(&orchestrator).await;

    if cli.json {
        let response = NewsResponse {
            section_title: "Latest IoT News".to_string(),
            items: orchestrator.items().await,
            summary: None,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if let Some(query) = cli.ask.as_deref() {
        answer(&orchestrator, query, !cli.no_stream).await?;
        return Ok(());
    }

    print_news(&orchestrator.items().await);
    println!("Commands: /refresh, /news, /history, /quit. Anything else is a question.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/refresh" => {
                refresh(&orchestrator).await;
                print_news(&orchestrator.items().await);
            }
            "/news" => print_news(&orchestrator.items().await),
            "/history" => {
                for message in orchestrator.history().await {
                    println!("[{}] {}\n", message.role, message.content);
                }
            }
            query => answer(&orchestrator, query, !cli.no_stream).await?,
        }
    }

    Ok(())
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<ConversationOrchestrator> {
    let api_key = config
        .api_key()
        .context("Set GEMINI_API_KEY in the environment or in secrets.toml")?;
    let client = GeminiClient::new(api_key, config.model_or_default())?
        .with_base_url(config.api_base_url_or_default());

    let fetch_config = config.fetch_config();
    let fetcher = Fetcher::new(fetch_config.clone()).context("Failed to create feed fetcher")?;
    let aggregator = FeedAggregator::new(Arc::new(fetcher), &fetch_config);

    let agent = ResponseAgent::new(Arc::new(client))
        .with_prompt(ContextPromptBuilder::new(config.assistant_name_or_default()))
        .with_params(config.generation_params())
        .with_timeout(config.llm_timeout());

    Ok(ConversationOrchestrator::new(
        config.feeds_or_default(),
        aggregator,
        agent,
    ))
}

async fn refresh(orchestrator: &ConversationOrchestrator) {
    match orchestrator.refresh().await {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("{}", warning);
            }
            info!("Loaded {} news items", report.items.len());
        }
        Err(AssistantError::NoNewsAvailable { warnings }) => {
            for warning in &warnings {
                eprintln!("{}", warning);
            }
            error!("No news could be loaded; try /refresh later");
        }
        Err(e) => error!("Refresh failed: {}", e),
    }
}

async fn answer(
    orchestrator: &ConversationOrchestrator,
    query: &str,
    stream: bool,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    if !stream {
        let text = orchestrator.ask(query).await;
        writeln!(stdout, "{}\n", strip_code_fences(&text))?;
        return Ok(());
    }

    let mut chunks = orchestrator.ask_stream(query).await;
    let mut fenced = None;
    while let Some(chunk) = chunks.next().await {
        let is_fenced = *fenced.get_or_insert_with(|| chunk.trim_start().starts_with("```"));
        if is_fenced {
            write!(stdout, "{}", drop_fence_lines(&chunk))?;
        } else {
            write!(stdout, "{}", chunk)?;
        }
        stdout.flush()?;
    }
    writeln!(stdout, "\n")?;
    Ok(())
}

fn drop_fence_lines(chunk: &str) -> String {
    chunk
        .split_inclusive('\n')
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect()
}

fn print_news(items: &[NewsItem]) {
    if items.is_empty() {
        println!("No news loaded.");
        return;
    }
    println!("Latest IoT News\n");
    for item in items {
        println!("### {}", item.title);
        println!("📅 {}", item.published_at);
        println!("{}", item.preview(PREVIEW_CHARS));
        println!("{}\n", item.link);
    }
}
