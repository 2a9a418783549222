//! Command-line arguments for the stock server.
use stock_server::model::stock_feed::FeedConfig;
use clap::Parser;
use std::time::Duration;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Local IP address to bind the command (TCP) and data (UDP) sockets to.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind_ip: String,

    /// Comma-separated product ids the synthetic feed publishes updates for.
    /// Pass an empty string to run without the feed.
    #[clap(long, value_delimiter = ',', default_value = "1,2,42")]
    pub products: Vec<String>,

    /// Milliseconds between two feed ticks.
    #[clap(long, default_value_t = 500)]
    pub interval_ms: u64,

    /// Quantity each product starts with.
    #[clap(long, default_value_t = 20)]
    pub initial_quantity: i64,

    /// Quantities below this value are reported as LOW_STOCK.
    #[clap(long, default_value_t = 5)]
    pub low_stock_threshold: i64,
}

impl Args {
    /// Feed settings derived from the arguments.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            products: self
                .products
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            interval: Duration::from_millis(self.interval_ms),
            initial_quantity: self.initial_quantity,
            low_stock_threshold: self.low_stock_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["stock_server"]);
        let config = args.feed_config();

        assert_eq!(args.bind_ip, "0.0.0.0");
        assert_eq!(config.products, vec!["1", "2", "42"]);
        assert_eq!(config.interval, Duration::from_millis(500));
    }

    #[test]
    fn test_product_list_is_trimmed() {
        let args = Args::parse_from(["stock_server", "--products", " 7, ,9"]);
        assert_eq!(args.feed_config().products, vec!["7", "9"]);
    }
}
