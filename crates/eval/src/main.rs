//! Evaluation CLI for exercising the matching engine.
//!
//! Usage:
//!     gmatch extract "Great Value 2% Milk 1 Gal"
//!     gmatch match "milk" --products products.txt
//!     gmatch batch --queries queries.txt --products products.txt --format json
//!     gmatch health --remote-url http://127.0.0.1:7700

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grocermatch_backend_http::{HttpCacheConfig, HttpCacheTier};
use grocermatch_cache::RemoteTier;
use grocermatch_engine::{EngineConfig, MatchingEngine};
use grocermatch_explain::summarize_match;

#[derive(Parser)]
#[command(name = "gmatch")]
#[command(about = "Evaluate grocery product matching quality")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Shared cache tier URL (optional; local tiers only when absent)
    #[arg(long, global = true)]
    remote_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the feature bundle extracted from a string
    Extract {
        /// Product or query text
        text: String,
    },

    /// Match one query against a product list
    Match {
        /// The shopping query
        query: String,

        /// Path to a product list (JSON array or one name per line)
        #[arg(short, long)]
        products: String,

        /// Maximum results to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Score a query list against a product list
    Batch {
        /// Path to the query list
        #[arg(short, long)]
        queries: String,

        /// Path to the product list
        #[arg(short, long)]
        products: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check shared cache tier health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("grocermatch=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.remote_url {
        Some(url) => {
            let config = HttpCacheConfig {
                base_url: url,
                ..Default::default()
            };
            let tier = HttpCacheTier::new(config);
            if matches!(cli.command, Commands::Health) {
                return run_health(&tier).await;
            }
            let engine = MatchingEngine::with_remote(EngineConfig::default(), tier);
            run(engine, cli.command).await
        }
        None => {
            if matches!(cli.command, Commands::Health) {
                println!("No shared cache tier configured (pass --remote-url)");
                return Ok(());
            }
            let engine = MatchingEngine::new(EngineConfig::default());
            run(engine, cli.command).await
        }
    }
}

async fn run<R: RemoteTier + 'static>(engine: MatchingEngine<R>, command: Commands) -> Result<()> {
    match command {
        Commands::Extract { text } => {
            let features = engine.features(&text).await;
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        Commands::Match {
            query,
            products,
            limit,
        } => {
            let products = load_list(&products)?;
            run_match(&engine, &query, &products, limit).await?;
        }
        Commands::Batch {
            queries,
            products,
            format,
        } => {
            let queries = load_list(&queries)?;
            let products = load_list(&products)?;
            run_batch(&engine, &queries, &products, &format).await?;
        }
        Commands::Health => unreachable!("handled in main"),
    }

    Ok(())
}

async fn run_match<R: RemoteTier + 'static>(
    engine: &MatchingEngine<R>,
    query: &str,
    products: &[String],
    limit: usize,
) -> Result<()> {
    println!("Matching: {}", query);
    println!("---");

    let report = engine.match_batch(&[query.to_string()], products).await;

    let mut ranked = report.scores.clone();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let query_features = engine.features(query).await;
    for (i, pair) in ranked.iter().take(limit).enumerate() {
        let metrics = engine.score_metrics(query, &pair.product).await;
        let product_features = engine.features(&pair.product).await;

        println!("\n{}. {} (score {:.3})", i + 1, pair.product, pair.score);
        println!(
            "   lexical {:.2} | semantic {:.2} | brand {:.2} | category {:.2} | size {:.2}",
            metrics.lexical, metrics.semantic, metrics.brand, metrics.category, metrics.size
        );
        println!(
            "   {}",
            summarize_match(&metrics, &query_features, &product_features)
        );
    }

    println!("\n---");
    println!(
        "Scored {} products in {:?} (cache hit rate {:.0}%)",
        report.total_pairs,
        report.elapsed,
        report.cache_hit_rate * 100.0
    );

    Ok(())
}

async fn run_batch<R: RemoteTier + 'static>(
    engine: &MatchingEngine<R>,
    queries: &[String],
    products: &[String],
    format: &str,
) -> Result<()> {
    let report = engine.match_batch(queries, products).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} queries x {} products = {} pairs",
        queries.len(),
        products.len(),
        report.total_pairs
    );
    println!(
        "Elapsed {:?}, cache hit rate {:.0}%",
        report.elapsed,
        report.cache_hit_rate * 100.0
    );

    for query in queries {
        let mut row: Vec<_> = report
            .scores
            .iter()
            .filter(|p| &p.query == query)
            .collect();
        row.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        println!("\n{}", query);
        for pair in row.iter().take(5) {
            println!("   {:.3}  {}", pair.score, pair.product);
        }
    }

    println!("\nCache stats: {:?}", engine.cache_stats());

    Ok(())
}

async fn run_health(tier: &HttpCacheTier) -> Result<()> {
    print!("Checking {} cache tier... ", tier.name());

    match tier.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load a list of strings from a JSON array file or a one-per-line file.
fn load_list(path: &str) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;

    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path));
    }

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
