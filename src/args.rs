use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "site-summary")]
#[command(about = "Fetches a website and summarizes it with a hosted language model")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model identifier, overrides the configuration
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Stream the completion and accumulate it
    #[arg(long, global = true)]
    pub stream: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a website
    Summarize {
        /// Seed URL of the website
        url: String,

        /// Also fetch pages linked from the seed page
        #[arg(short, long)]
        follow_links: bool,

        /// Maximum number of linked pages to fetch
        #[arg(long)]
        max_links: Option<usize>,

        /// Let the model pick which links are worth following
        #[arg(long)]
        select_links: bool,

        /// System prompt, overrides the configuration
        #[arg(long)]
        system_prompt: Option<String>,

        /// User prompt prefix, overrides the configuration
        #[arg(long)]
        user_prompt: Option<String>,
    },

    /// Discover business listings on a paginated search site and fetch their content
    ScrapeListings {
        /// First search results page; later pages are `<url>-2`, `<url>-3`, ...
        search_url: String,

        /// Number of result pages to walk
        #[arg(long)]
        max_pages: Option<usize>,

        /// Where to write the scraped listings
        #[arg(short, long, default_value = "listings_output.json")]
        output: PathBuf,
    },

    /// Clean and extract structured info from scraped business listings
    ProcessListings {
        /// JSON file holding an array of listings
        input: PathBuf,

        /// Where to write the processed listings
        #[arg(short, long, default_value = "processed_listings.json")]
        output: PathBuf,

        /// Also write one formatted document per listing to this file
        #[arg(short, long)]
        documents: Option<PathBuf>,

        /// Number of listings processed at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },
}
