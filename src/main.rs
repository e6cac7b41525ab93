use clap::Parser;
use site_summary::config::{ModelConfig, PromptPair};
use site_summary::listings::{self, ListingProcessor};
use site_summary::{AppConfig, ChatModel, ConfigError, ListingScraper, OpenAiClient, WebsiteContentSummarizer};
use std::path::PathBuf;
use std::sync::Arc;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // A missing .env file is fine, the key may already be in the environment
    if let Err(e) = dotenvy::dotenv() {
        ::log::debug!("No .env file loaded: {}", e);
    }

    let args = Args::parse();

    if let Err(e) = run(args).await {
        ::log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            ::log::info!("Loading configuration from {}", path.display());
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(model) = args.model {
        config.model.model = model;
    }
    if args.stream {
        config.model.streaming = true;
    }

    let start_time = std::time::Instant::now();
    match args.command {
        Command::Summarize {
            url,
            follow_links,
            max_links,
            select_links,
            system_prompt,
            user_prompt,
        } => {
            let settings = &mut config.summary;
            settings.follow_links |= follow_links;
            if let Some(max_links) = max_links {
                settings.max_links = max_links;
            }
            if select_links && settings.link_selection.is_none() {
                settings.link_selection = Some(PromptPair::new(
                    site_summary::prompt::LINK_SELECTION_SYSTEM_PROMPT,
                    site_summary::prompt::LINK_SELECTION_USER_PROMPT,
                ));
            }
            if let Some(system) = system_prompt {
                settings.prompts.system = system;
            }
            if let Some(user) = user_prompt {
                settings.prompts.user = user;
            }

            ::log::info!("Starting summary for URL: {}", url);
            let client = model_client(&config.model)?;
            let summarizer =
                WebsiteContentSummarizer::from_config(&url, client, &config.model.model, settings)?;
            let summary = summarizer
                .summarize(&settings.prompts.system, &settings.prompts.user)
                .await?;

            println!("{}", summary);
        }
        Command::ProcessListings {
            input,
            output,
            documents,
            concurrency,
        } => {
            let client = model_client(&config.model)?;
            process_listings(&config, client, input, output, documents, concurrency).await?;
        }
        Command::ScrapeListings {
            search_url,
            max_pages,
            output,
        } => {
            if let Some(max_pages) = max_pages {
                config.listings.max_pages = max_pages;
            }
            let scraped = ListingScraper::from_config(&search_url, &config.listings)
                .scrape()
                .await?;
            listings::save_listings(&output, &scraped)?;
            ::log::info!("Saved {} listings to {}", scraped.len(), output.display());
        }
    }

    ::log::info!(
        "Done in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Resolve the API key and build the model client; only model-backed commands need it
fn model_client(model: &ModelConfig) -> Result<Arc<dyn ChatModel>, ConfigError> {
    let api_key = model.api_key_from_env()?;
    ::log::info!("Using model {}", model.model);
    Ok(Arc::new(OpenAiClient::from_config(model, api_key)))
}

async fn process_listings(
    config: &AppConfig,
    client: Arc<dyn ChatModel>,
    input: PathBuf,
    output: PathBuf,
    documents: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = listings::load_listings(&input)?;
    ::log::info!("Loaded {} listings from {}", loaded.len(), input.display());

    let mut processor = ListingProcessor::from_config(&config.listings, client, &config.model.model);
    if let Some(limit) = concurrency {
        processor = processor.with_concurrency_limit(limit);
    }

    let processed = Arc::new(processor).process(loaded).await?;

    listings::save_listings(&output, &processed)?;
    ::log::info!("Saved {} listings to {}", processed.len(), output.display());

    if let Some(path) = documents {
        listings::save_documents(&path, &processed)?;
        ::log::info!("Saved listing documents to {}", path.display());
    }
    Ok(())
}
