use clap::Parser;
use linkwatch::{WatcherConfig, DEFAULT_ACCOUNT};
use simplelog::LevelFilter;

/// Watch accounts on the streaming API and print the links they post
#[derive(Debug, Parser)]
#[command(name = "linkwatch-cli", version)]
pub struct Args {
    /// Account to watch, with or without a leading @ (repeatable)
    #[arg(short, long = "account", value_name = "HANDLE")]
    pub accounts: Vec<String>,

    /// Keyword a message must contain for its links to be reported (repeatable)
    #[arg(short, long = "keyword", value_name = "WORD")]
    pub keywords: Vec<String>,

    /// Only report links from messages containing one of the keywords
    #[arg(long)]
    pub filter: bool,

    #[arg(long, env = "LINKWATCH_CONSUMER_KEY", hide_env_values = true)]
    pub consumer_key: String,

    #[arg(long, env = "LINKWATCH_CONSUMER_SECRET", hide_env_values = true)]
    pub consumer_secret: String,

    #[arg(long, env = "LINKWATCH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    #[arg(long, env = "LINKWATCH_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_token_secret: String,

    /// Base URL of the REST API
    #[arg(long, env = "LINKWATCH_API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// URL of the filtered stream endpoint
    #[arg(long, env = "LINKWATCH_STREAM_URL")]
    pub stream_url: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn keys(&self) -> [&str; 4] {
        [
            self.consumer_key.as_str(),
            self.consumer_secret.as_str(),
            self.access_token.as_str(),
            self.access_token_secret.as_str(),
        ]
    }

    /// Accounts to watch; the default account when none were given
    pub fn watched_accounts(&self) -> Vec<String> {
        if self.accounts.is_empty() {
            vec![DEFAULT_ACCOUNT.to_string()]
        } else {
            self.accounts.clone()
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn watcher_config(&self) -> Result<WatcherConfig, String> {
        let mut config = WatcherConfig::production();
        if let Some(ref url) = self.api_base_url {
            config = config.with_api_base_url(url.as_str())?;
        }
        if let Some(ref url) = self.stream_url {
            config = config.with_stream_url(url.as_str())?;
        }
        Ok(config)
    }
}
