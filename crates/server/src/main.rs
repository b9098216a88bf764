//! Stock Advisor - technical analysis CLI and HTTP server
//!
//! Usage:
//!   stock-advisor serve --port 3001          - Launch the HTTP API
//!   stock-advisor analyze --symbol AAPL      - Analyze one symbol, print JSON
//!   stock-advisor scan --symbols AAPL,MSFT   - Analyze several symbols concurrently

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::api::source::{StaticSource, DEFAULT_INTERVAL, DEFAULT_PERIOD};
use engine::{
    Analysis, AnalysisConfig, AnalysisError, Analyzer, MarketDataSource, PriceBar, PriceSeries,
    Signal, YahooChartClient,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "stock-advisor")]
#[command(about = "Technical analysis and buy/sell/hold signals for stocks", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long, env = "ADVISOR_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, env = "ADVISOR_PORT", default_value_t = 3001)]
        port: u16,
    },
    /// Analyze a single symbol and print the result as JSON
    Analyze {
        /// Ticker symbol
        #[arg(long)]
        symbol: String,
        /// Read bars from a JSON file instead of fetching them
        #[arg(long)]
        input: Option<String>,
        /// History range, e.g. 6mo, 1y, 5y
        #[arg(long, default_value = DEFAULT_PERIOD)]
        period: String,
        /// Bar interval, e.g. 1d, 1wk
        #[arg(long, default_value = DEFAULT_INTERVAL)]
        interval: String,
        /// External fundamental call, e.g. buy:0.7
        #[arg(long)]
        fundamental: Option<String>,
        /// Include every indicator value, not just the latest bar
        #[arg(long)]
        full: bool,
    },
    /// Analyze several symbols concurrently and print one line each
    Scan {
        /// Symbols to scan (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        #[arg(long, default_value = DEFAULT_PERIOD)]
        period: String,
        #[arg(long, default_value = DEFAULT_INTERVAL)]
        interval: String,
    },
}

#[derive(Clone)]
struct AppState {
    source: Arc<dyn MarketDataSource>,
    analyzer: Arc<Analyzer>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,stock_advisor=debug")
    } else {
        EnvFilter::new("info,engine=info,stock_advisor=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

/// `buy:0.7`, `sell:0.4`, `hold`
fn parse_fundamental(s: &str) -> anyhow::Result<Signal> {
    let (kind, strength) = match s.split_once(':') {
        Some((kind, strength)) => (kind, Some(strength)),
        None => (s, None),
    };
    let strength = strength
        .map(|v| v.trim().parse::<f64>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid fundamental strength in '{}': {}", s, e))?
        .unwrap_or(0.5);
    if !(0.0..=1.0).contains(&strength) {
        anyhow::bail!("Fundamental strength must be within [0, 1], got {}", strength);
    }

    let reason = "External fundamental signal";
    match kind.trim().to_lowercase().as_str() {
        "buy" => Ok(Signal::buy(strength, reason)),
        "sell" => Ok(Signal::sell(strength, reason)),
        "hold" => Ok(Signal::hold(reason)),
        other => anyhow::bail!("Unknown fundamental signal '{}' (expected buy, sell or hold)", other),
    }
}

/// Fetch then analyze; the CPU-bound part runs off the async workers
async fn fetch_and_analyze(
    source: &dyn MarketDataSource,
    analyzer: Arc<Analyzer>,
    symbol: &str,
    period: &str,
    interval: &str,
) -> Result<Analysis, AnalysisError> {
    let series = source.fetch_price_series(symbol, period, interval).await?;
    tokio::task::spawn_blocking(move || analyzer.analyze(&series))
        .await
        .map_err(|e| AnalysisError::Internal(format!("analysis task for {} failed: {}", symbol, e)))?
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap reads ADVISOR_HOST / ADVISOR_PORT
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AnalysisConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port, config).await?;
        }
        Commands::Analyze {
            symbol,
            input,
            period,
            interval,
            fundamental,
            full,
        } => {
            cmd_analyze(config, symbol, input, period, interval, fundamental, full).await?;
        }
        Commands::Scan {
            symbols,
            period,
            interval,
        } => {
            cmd_scan(config, symbols, period, interval).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16, config: AnalysisConfig) -> anyhow::Result<()> {
    info!("Stock Advisor v{} starting...", APP_VERSION);

    let state = AppState {
        source: Arc::new(YahooChartClient::new()),
        analyzer: Arc::new(Analyzer::new(config)?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new().nest("/api", api_routes(state)).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Stock Advisor v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                      - Health check");
    println!("  GET  /api/stocks/:symbol/technical    - Indicators, patterns and signals");
    println!("  GET  /api/stocks/:symbol/signals      - Signals and recommendation only");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/stocks/:symbol/technical", get(api_technical))
        .route("/stocks/:symbol/signals", get(api_signals))
        .with_state(state)
}

// ============================================================================
// Analyze command - single symbol, JSON output
// ============================================================================

async fn cmd_analyze(
    mut config: AnalysisConfig,
    symbol: String,
    input: Option<String>,
    period: String,
    interval: String,
    fundamental: Option<String>,
    full: bool,
) -> anyhow::Result<()> {
    config.include_series = full;
    let analyzer = Arc::new(Analyzer::new(config)?);
    let fundamental = fundamental.as_deref().map(parse_fundamental).transpose()?;

    let source: Box<dyn MarketDataSource> = match input {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let bars: Vec<PriceBar> = serde_json::from_str(&raw)?;
            info!(path = %path, bars = bars.len(), "Loaded bars from file");
            Box::new(StaticSource::new().with_series(PriceSeries::new(symbol.as_str(), bars)))
        }
        None => Box::new(YahooChartClient::new()),
    };

    let analysis = fetch_and_analyze(source.as_ref(), analyzer.clone(), &symbol, &period, &interval).await?;
    let fundamental = match fundamental {
        Some(signal) => Some(signal),
        None => source.fetch_fundamental_signal(&symbol).await?,
    };
    let recommendation = analyzer.recommend(&analysis, fundamental.as_ref());

    let output = serde_json::json!({
        "symbol": symbol,
        "version": APP_VERSION,
        "analysis": analysis,
        "recommendation": recommendation,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// Scan command - one task per symbol
// ============================================================================

async fn cmd_scan(
    config: AnalysisConfig,
    symbols: Vec<String>,
    period: String,
    interval: String,
) -> anyhow::Result<()> {
    println!("\n=== Stock Advisor v{} ===", APP_VERSION);
    println!("Scanning: {} | Period: {} | Interval: {}\n", symbols.join(", "), period, interval);

    let analyzer = Arc::new(Analyzer::new(config)?);
    let source: Arc<dyn MarketDataSource> = Arc::new(YahooChartClient::new());
    let results = scan_symbols(source, analyzer, symbols, &period, &interval).await;

    println!("{:<8} {:<8} {:>8}  {}", "SYMBOL", "SIGNAL", "STRENGTH", "REASON");
    let mut failed = 0;
    for (symbol, result) in results {
        match result {
            Ok(analysis) => match &analysis.combined {
                Some(combined) => println!(
                    "{:<8} {:<8} {:>8.2}  {}",
                    symbol, combined.signal, combined.strength, combined.reason
                ),
                None => println!("{:<8} {:<8} {:>8}  {}", symbol, "-", "-", "no bars"),
            },
            Err(e) => {
                failed += 1;
                warn!(symbol = %symbol, error = %e, "Scan failed for symbol");
                println!("{:<8} {:<8} {:>8}  {}", symbol, "ERROR", "-", e);
            }
        }
    }
    if failed > 0 {
        println!("\n{} symbol(s) failed", failed);
    }
    Ok(())
}

/// One task per symbol; results come back in input order
async fn scan_symbols(
    source: Arc<dyn MarketDataSource>,
    analyzer: Arc<Analyzer>,
    symbols: Vec<String>,
    period: &str,
    interval: &str,
) -> Vec<(String, Result<Analysis, AnalysisError>)> {
    let handles: Vec<_> = symbols
        .into_iter()
        .map(|symbol| {
            let symbol = symbol.trim().to_uppercase();
            let analyzer = analyzer.clone();
            let source = source.clone();
            let period = period.to_string();
            let interval = interval.to_string();
            let task_symbol = symbol.clone();
            let task = tokio::spawn(async move {
                fetch_and_analyze(source.as_ref(), analyzer, &task_symbol, &period, &interval).await
            });
            (symbol, task)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (symbol, task) in handles {
        let result = task.await.unwrap_or_else(|e| {
            error!(symbol = %symbol, error = %e, "Scan task panicked");
            Err(AnalysisError::Internal(format!("scan task for {} failed: {}", symbol, e)))
        });
        results.push((symbol, result));
    }
    results
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Deserialize)]
struct HistoryParams {
    period: Option<String>,
    interval: Option<String>,
}

type ApiResult = Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)>;

fn error_status(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::UpstreamData { .. } => StatusCode::NOT_FOUND,
        AnalysisError::MissingColumn { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        AnalysisError::InsufficientHistory { .. }
        | AnalysisError::Backend { .. }
        | AnalysisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(symbol: &str, err: AnalysisError) -> (StatusCode, Json<serde_json::Value>) {
    let status = error_status(&err);
    if status.is_server_error() {
        error!(symbol, error = %err, "Analysis failed");
    } else {
        warn!(symbol, error = %err, "Analysis rejected");
    }
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "symbol": symbol,
            "message": err.to_string(),
        })),
    )
}

async fn run_analysis(state: &AppState, symbol: &str, params: &HistoryParams) -> Result<Analysis, AnalysisError> {
    fetch_and_analyze(
        state.source.as_ref(),
        state.analyzer.clone(),
        symbol,
        params.period.as_deref().unwrap_or(DEFAULT_PERIOD),
        params.interval.as_deref().unwrap_or(DEFAULT_INTERVAL),
    )
    .await
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stock-advisor",
        "version": APP_VERSION,
    }))
}

/// GET /api/stocks/:symbol/technical - latest indicators, patterns, signals
async fn api_technical(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult {
    let symbol = symbol.to_uppercase();
    let analysis = run_analysis(&state, &symbol, &params)
        .await
        .map_err(|e| error_response(&symbol, e))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "symbol": symbol,
        "bars": analysis.bars,
        "indicators": analysis.latest,
        "patterns": analysis.patterns,
        "signals": analysis.signals,
        "combined": analysis.combined,
    })))
}

/// GET /api/stocks/:symbol/signals - per-family signals and the fused call
async fn api_signals(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult {
    let symbol = symbol.to_uppercase();
    let analysis = run_analysis(&state, &symbol, &params)
        .await
        .map_err(|e| error_response(&symbol, e))?;
    let fundamental = state
        .source
        .fetch_fundamental_signal(&symbol)
        .await
        .map_err(|e| error_response(&symbol, e))?;
    let recommendation = state.analyzer.recommend(&analysis, fundamental.as_ref());

    Ok(Json(serde_json::json!({
        "success": true,
        "symbol": symbol,
        "signals": analysis.signals,
        "combined": analysis.combined,
        "recommendation": recommendation,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use engine::SignalKind;

    fn rising_bars(n: i64) -> Vec<PriceBar> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                let date = Utc.timestamp_opt(1_600_000_000 + i * 86_400, 0).unwrap();
                PriceBar::new(date, close, close + 1.0, close - 1.0, close, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_app_version_carries_build_hash() {
        let (version, hash) = APP_VERSION.split_once('-').unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
        assert!(!hash.is_empty());
    }

    #[test]
    fn test_parse_fundamental() {
        let buy = parse_fundamental("buy:0.7").unwrap();
        assert_eq!(buy.signal, SignalKind::Buy);
        assert_eq!(buy.strength, 0.7);

        let sell = parse_fundamental("SELL:0.25").unwrap();
        assert_eq!(sell.signal, SignalKind::Sell);

        assert_eq!(parse_fundamental("hold").unwrap().signal, SignalKind::Hold);
        assert!(parse_fundamental("buy:1.5").is_err());
        assert!(parse_fundamental("maybe:0.5").is_err());
        assert!(parse_fundamental("buy:abc").is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&AnalysisError::upstream("ZZZZ", "no bars")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&AnalysisError::MissingColumn { column: "Volume" }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_status(&AnalysisError::InvalidConfig("rsi_period".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&AnalysisError::Internal("analysis task panicked".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_fetch_and_analyze_from_static_source() {
        let source = StaticSource::new().with_series(PriceSeries::new("TEST", rising_bars(40)));
        let analyzer = Arc::new(Analyzer::new(AnalysisConfig::default()).unwrap());

        let analysis = fetch_and_analyze(&source, analyzer.clone(), "test", "1y", "1d")
            .await
            .unwrap();
        assert_eq!(analysis.bars, 40);
        assert!(analysis.combined.is_some());

        let missing = fetch_and_analyze(&source, analyzer, "NOPE", "1y", "1d")
            .await
            .unwrap_err();
        assert_eq!(error_status(&missing), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_symbols_keeps_order_and_isolates_failures() {
        let source: Arc<dyn MarketDataSource> = Arc::new(
            StaticSource::new()
                .with_series(PriceSeries::new("AAA", rising_bars(40)))
                .with_series(PriceSeries::new("CCC", rising_bars(60))),
        );
        let analyzer = Arc::new(Analyzer::new(AnalysisConfig::default()).unwrap());
        let symbols = vec!["aaa".to_string(), " bbb".to_string(), "CCC".to_string()];

        let results = scan_symbols(source, analyzer, symbols, "1y", "1d").await;
        let names: Vec<_> = results.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(results[0].1.as_ref().unwrap().bars, 40);
        assert!(matches!(results[1].1, Err(AnalysisError::UpstreamData { .. })));
        assert_eq!(results[2].1.as_ref().unwrap().bars, 60);
    }
}
