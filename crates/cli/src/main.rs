use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::{Product, ProductId};
use server::demand::ProductDemand;
use server::{init_tracing, AppState, LogFormat, ProductForecast, RecommendationResponse, ServiceConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// ShopSense - Product Recommendations and Demand Forecasts
#[derive(Parser)]
#[command(name = "shopsense")]
#[command(about = "Product recommender and demand forecaster", long_about = None)]
struct Cli {
    #[command(flatten)]
    service: ServiceConfig,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Collaborative,
    Content,
    Hybrid,
}

#[derive(Subcommand)]
enum Commands {
    /// Get recommendations for a product
    Recommend {
        /// Product ID (ASIN) to recommend from
        #[arg(long)]
        product_id: ProductId,

        #[arg(long, value_enum, default_value_t = StrategyArg::Hybrid)]
        strategy: StrategyArg,

        /// Number of recommendations to return
        #[arg(long, default_value = "6")]
        limit: usize,

        /// Collaborative weight for the hybrid strategy
        #[arg(long, default_value = "0.6")]
        cf_weight: f64,
    },

    /// Show one product's catalog attributes
    Product {
        #[arg(long)]
        product_id: ProductId,
    },

    /// Search products by title
    Search {
        /// Case-insensitive substring of the title
        #[arg(long)]
        query: String,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List the products with the most demand
    TopProducts {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one product's weekly demand
    Demand {
        #[arg(long)]
        product_id: ProductId,
    },

    /// Forecast a product's demand
    Forecast {
        #[arg(long)]
        product_id: ProductId,

        /// Weeks to forecast
        #[arg(long, default_value = "8")]
        weeks: usize,
    },

    /// Show which artifacts loaded and what can be served
    Status,

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        #[arg(long, value_enum, default_value_t = StrategyArg::Hybrid)]
        strategy: StrategyArg,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // Load every artifact once (this may take a moment)
    println!(
        "Loading models from {} and data from {}...",
        cli.service.models_dir.display(),
        cli.service.dataset_dir.display()
    );
    let start = Instant::now();
    let config = cli.service.clone();
    let state = Arc::new(
        tokio::task::spawn_blocking(move || AppState::build(config))
            .await
            .context("Failed to load artifacts")?,
    );
    println!("{} Loaded in {:?}", "✓".green(), start.elapsed());
    info!(ready = state.readiness.is_ready(), "State built");

    match cli.command {
        Commands::Recommend {
            product_id,
            strategy,
            limit,
            cf_weight,
        } => handle_recommend(&state, &product_id, strategy, limit, cf_weight)?,
        Commands::Product { product_id } => handle_product(&state, &product_id)?,
        Commands::Search { query, limit } => handle_search(&state, &query, limit)?,
        Commands::TopProducts { limit } => handle_top_products(&state, limit)?,
        Commands::Demand { product_id } => handle_demand(&state, &product_id)?,
        Commands::Forecast { product_id, weeks } => handle_forecast(&state, &product_id, weeks)?,
        Commands::Status => handle_status(&state),
        Commands::Benchmark {
            requests,
            concurrent,
            strategy,
        } => handle_benchmark(state, requests, concurrent, strategy).await?,
    }

    Ok(())
}

fn recommend(
    state: &AppState,
    product_id: &str,
    strategy: StrategyArg,
    limit: usize,
    cf_weight: f64,
) -> server::Result<RecommendationResponse> {
    let service = &state.recommendations;
    match strategy {
        StrategyArg::Collaborative => service.collaborative(product_id, limit),
        StrategyArg::Content => service.content(product_id, limit),
        StrategyArg::Hybrid => service.hybrid(product_id, limit, cf_weight),
    }
}

/// Handle the 'recommend' command
fn handle_recommend(
    state: &AppState,
    product_id: &str,
    strategy: StrategyArg,
    limit: usize,
    cf_weight: f64,
) -> Result<()> {
    let response = recommend(state, product_id, strategy, limit, cf_weight)?;
    print_recommendations(&response);
    Ok(())
}

/// Handle the 'product' command
fn handle_product(state: &AppState, product_id: &str) -> Result<()> {
    let product = state.recommendations.product_details(product_id)?;
    print_product(&product);
    Ok(())
}

/// Handle the 'search' command
fn handle_search(state: &AppState, query: &str, limit: usize) -> Result<()> {
    let found = state.recommendations.search_products(query, limit)?;
    println!(
        "{}",
        format!("Search results for '{}' ({}):", query, found.count).bold().blue()
    );
    for product in &found.results {
        println!(
            "{}: {} {}",
            product.id.yellow(),
            product.title,
            format_rating(product)
        );
    }
    Ok(())
}

/// Handle the 'top-products' command
fn handle_top_products(state: &AppState, limit: usize) -> Result<()> {
    let top = state.demand.top_products(limit)?;
    println!("{}", "Top products by demand:".bold().blue());
    for (rank, product) in top.iter().enumerate() {
        println!(
            "{}. {} {} - {} total over {} weeks (avg {:.2}/week)",
            (rank + 1).to_string().green(),
            product.asin.yellow(),
            product.title,
            product.total_demand,
            product.num_weeks,
            product.avg_weekly_demand
        );
    }
    Ok(())
}

/// Handle the 'demand' command
fn handle_demand(state: &AppState, product_id: &str) -> Result<()> {
    let demand = state.demand.product_demand(product_id)?;
    print_demand(&demand);
    Ok(())
}

/// Handle the 'forecast' command
fn handle_forecast(state: &AppState, product_id: &str, weeks: usize) -> Result<()> {
    let forecast = state.demand.forecast(product_id, weeks)?;
    print_forecast(&forecast);
    Ok(())
}

/// Handle the 'status' command
fn handle_status(state: &AppState) {
    let readiness = &state.readiness;
    let headline = if readiness.is_ready() {
        "All capabilities ready".green()
    } else {
        "Running degraded".yellow()
    };
    println!("{}", headline.bold());

    let caps = readiness.capabilities;
    for (name, ready) in [
        ("collaborative", caps.collaborative),
        ("content", caps.content),
        ("catalog", caps.catalog),
        ("demand", caps.demand),
        ("forecast", caps.forecast),
    ] {
        let mark = if ready { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, name);
    }

    println!("{}", "Artifacts:".bold());
    for (artifact, status) in readiness.artifacts.iter() {
        println!("  {:<32} {:?}", artifact, status);
    }
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    state: Arc<AppState>,
    requests: usize,
    concurrent: usize,
    strategy: StrategyArg,
) -> Result<()> {
    // Pick random products from the listable ones
    let pool: Vec<ProductId> = state
        .recommendations
        .list_products(100, 0)?
        .products
        .into_iter()
        .map(|product| product.id)
        .collect();
    if pool.is_empty() {
        bail!("No products available to benchmark");
    }
    let product_ids: Vec<ProductId> = (0..requests)
        .map(|_| pool[rand::random::<u64>() as usize % pool.len()].clone())
        .collect();

    let wall = Instant::now();
    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for batch in product_ids.chunks(concurrent.max(1)) {
        let mut handles = Vec::with_capacity(batch.len());
        for product_id in batch {
            let state = state.clone();
            let product_id = product_id.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                recommend(&state, &product_id, strategy, 6, 0.6)?;
                Ok::<_, anyhow::Error>(start.elapsed())
            }));
        }
        for handle in handles {
            timings.push(handle.await??);
        }
    }
    let total_time = wall.elapsed();

    if timings.is_empty() {
        println!("No requests made");
        return Ok(());
    }
    timings.sort();
    let avg_latency = timings.iter().sum::<Duration>() / (timings.len() as u32);
    let percentile = |p: f32| timings[((timings.len() as f32 * p) as usize).min(timings.len() - 1)];
    let throughput = timings.len() as f32 / total_time.as_secs_f32();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn format_rating(product: &Product) -> String {
    match (product.rating, product.rating_count) {
        (Some(rating), Some(count)) => format!("★ {:.1} ({} ratings)", rating, count),
        (Some(rating), None) => format!("★ {:.1}", rating),
        _ => String::new(),
    }
}

fn print_product(product: &Product) {
    println!("{}", product.title.bold().blue());
    println!("  ID: {}", product.id);
    if let Some(price) = product.price {
        println!("  Price: ${:.2}", price);
    }
    let rating = format_rating(product);
    if !rating.is_empty() {
        println!("  Rating: {}", rating);
    }
    if let Some(store) = &product.store {
        println!("  Store: {}", store);
    }
    if !product.categories.is_empty() {
        println!("  Categories: {}", product.categories.join(" > "));
    }
    if let Some(image) = &product.image_url {
        println!("  Image: {}", image);
    }
    if !product.description.is_empty() {
        println!("  {}", product.description.dimmed());
    }
}

/// Helper function to format and print recommendations
fn print_recommendations(response: &RecommendationResponse) {
    let source = response
        .source_product
        .as_ref()
        .map_or(response.product_asin.as_str(), |p| p.title.as_str());
    println!(
        "{}",
        format!("{} recommendations for {}:", response.method, source)
            .bold()
            .blue()
    );
    if response.recommendations.is_empty() {
        println!("  (no displayable recommendations)");
    }
    for (rank, item) in response.recommendations.iter().enumerate() {
        let (label, value) = match (item.score, item.similarity) {
            (Some(score), _) => ("Score", score),
            (None, Some(similarity)) => ("Similarity", similarity),
            (None, None) => ("Score", 0.0),
        };
        println!(
            "{}. {} {} - {}: {:.3} [{}]",
            (rank + 1).to_string().green(),
            item.product.id.yellow(),
            item.product.title,
            label,
            value,
            item.method
        );
    }
}

fn print_demand(demand: &ProductDemand) {
    println!("{}", format!("Weekly demand for {}:", demand.title).bold().blue());
    println!(
        "Total {} | avg {:.2} | max {} | min {} | trend {}",
        demand.total_demand, demand.avg_demand, demand.max_demand, demand.min_demand, demand.trend
    );
    for point in &demand.time_series {
        let rating = point
            .rating
            .map(|r| format!(" (rating {:.2})", r))
            .unwrap_or_default();
        println!("  {}: {:>6.2}{}", point.week, point.demand, rating);
    }
}

fn print_forecast(forecast: &ProductForecast) {
    println!(
        "{}",
        format!("{}-week forecast for {}:", forecast.forecast_weeks, forecast.title)
            .bold()
            .blue()
    );
    println!(
        "Model: {} (MAE {:.3})",
        forecast.model_type, forecast.model_mae
    );
    for point in &forecast.combined {
        let line = format!("  {:>12}: {:>6.2}", point.period, point.demand);
        if point.is_forecast {
            println!("{}", line.cyan());
        } else {
            println!("{}", line);
        }
    }
}
