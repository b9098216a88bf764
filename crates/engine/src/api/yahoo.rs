//! Yahoo Finance chart client for daily/intraday OHLCV (no authentication required)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::error::{AnalysisError, Result};
use crate::types::{PriceBar, PriceSeries};

use super::source::MarketDataSource;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const MAX_ATTEMPTS: u32 = 3;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stock-advisor)";

/// Yahoo Finance v8 chart endpoint client
#[derive(Clone)]
pub struct YahooChartClient {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Parallel arrays; Yahoo reports null for bars without trades
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl Default for YahooChartClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooChartClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Base back-off; attempt `n` waits `n` times this long
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn get_chart(&self, symbol: &str, period: &str, interval: &str) -> Result<String> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            self.base_url, symbol, period, interval
        );

        let mut attempt = 0;
        loop {
            debug!(symbol, period, interval, attempt = attempt + 1, "Fetching chart from Yahoo");
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .map_err(|e| AnalysisError::upstream(symbol, e.to_string()))?;
                    if !status.is_success() {
                        let detail = serde_json::from_str::<ChartResponse>(&body)
                            .ok()
                            .and_then(|r| r.chart.error)
                            .map(|e| format!("{}: {}", e.code, e.description))
                            .unwrap_or(body);
                        return Err(AnalysisError::upstream(
                            symbol,
                            format!("Yahoo API error {}: {}", status, detail),
                        ));
                    }
                    return Ok(body);
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt + 1 < MAX_ATTEMPTS => {
                    attempt += 1;
                    warn!(
                        symbol,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Network error fetching chart, retrying"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => {
                    error!(symbol, attempts = attempt + 1, error = %e, "Failed to fetch chart");
                    return Err(AnalysisError::upstream(symbol, e.to_string()));
                }
            }
        }
    }
}

/// Turn a chart payload into a price series
fn parse_chart(symbol: &str, body: &str) -> Result<PriceSeries> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::upstream(symbol, format!("malformed chart payload: {}", e)))?;
    if let Some(err) = response.chart.error {
        return Err(AnalysisError::upstream(
            symbol,
            format!("{}: {}", err.code, err.description),
        ));
    }
    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(AnalysisError::upstream(symbol, "no chart result"));
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let field = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let bars: Vec<PriceBar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = Utc.timestamp_opt(*ts, 0).single()?;
            Some(PriceBar {
                date,
                open: field(&quote.open, i),
                high: field(&quote.high, i),
                low: field(&quote.low, i),
                close: field(&quote.close, i),
                volume: field(&quote.volume, i),
            })
        })
        .collect();

    if bars.is_empty() {
        return Err(AnalysisError::upstream(symbol, "no bars returned"));
    }
    debug!(symbol, count = bars.len(), "Fetched bars");
    Ok(PriceSeries::new(symbol, bars))
}

#[async_trait]
impl MarketDataSource for YahooChartClient {
    async fn fetch_price_series(&self, symbol: &str, period: &str, interval: &str) -> Result<PriceSeries> {
        let body = self.get_chart(symbol, period, interval).await?;
        parse_chart(symbol, &body)
    }
}
