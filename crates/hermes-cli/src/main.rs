use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hermes_core::batch::{BatchConfig, BatchPipeline, TracingBatchReporter};
use hermes_core::cache::{GeocodeCache, MemoryStore};
use hermes_core::geocode::GeocodeService;
use hermes_core::models::{AddressRecord, CountryFilter};
use hermes_export::kml_documents;
use hermes_providers::{ProviderCredentials, ProviderKind, configured_providers, select_providers};

#[derive(Parser)]
#[command(name = "hermes", version, about = "Resilient batch geocoder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode a CSV of addresses and export the results as KML
    Geocode {
        /// Input CSV; recognized columns (street, number, neighborhood,
        /// city, region, postal_code and common aliases) become address
        /// fields, everything else rides along into the export
        #[arg(short, long)]
        input: PathBuf,

        /// Output KML path (oversized runs produce numbered part files)
        #[arg(short, long)]
        output: PathBuf,

        /// Country restriction: 'br' or an 'alpha2:alpha3:Name' triple
        #[arg(long, env = "HERMES_COUNTRY")]
        country: Option<CountryFilter>,

        /// Override the provider cascade, comma separated (e.g. "here,nominatim")
        #[arg(long, value_delimiter = ',')]
        providers: Option<Vec<ProviderKind>>,

        /// Worker tasks; 1 processes strictly in order
        #[arg(long, default_value_t = 1)]
        parallelism: usize,

        /// Only process the first N records
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the in-process result cache
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// Max placemarks per KML document before splitting into parts
        #[arg(long, default_value_t = hermes_export::DEFAULT_MAX_PLACEMARKS)]
        max_kml_placemarks: usize,
    },

    /// Show the provider cascade the current credentials configure
    Providers {
        /// Country restriction applied to the cascade
        #[arg(long, env = "HERMES_COUNTRY")]
        country: Option<CountryFilter>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hermes=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Geocode {
            input,
            output,
            country,
            providers,
            parallelism,
            limit,
            no_cache,
            max_kml_placemarks,
        } => {
            cmd_geocode(
                &input,
                &output,
                country,
                providers,
                parallelism,
                limit,
                no_cache,
                max_kml_placemarks,
            )
            .await?;
        }
        Commands::Providers { country } => cmd_providers(country)?,
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_geocode(
    input: &Path,
    output: &Path,
    country: Option<CountryFilter>,
    providers: Option<Vec<ProviderKind>>,
    parallelism: usize,
    limit: Option<usize>,
    no_cache: bool,
    max_kml_placemarks: usize,
) -> Result<()> {
    let records = read_records(input, limit)?;
    anyhow::ensure!(
        !records.is_empty(),
        "No address records found in {}",
        input.display()
    );
    let total = records.len();
    tracing::info!(total, input = %input.display(), "Loaded address records");

    let credentials = ProviderCredentials::from_env();
    if credentials.is_empty() {
        tracing::warn!("No provider API keys configured; only Nominatim will be used");
    }
    let cascade = match &providers {
        Some(kinds) => select_providers(&credentials, country.as_ref(), kinds)?,
        None => configured_providers(&credentials, country.as_ref())?,
    };

    let mut service = if no_cache {
        GeocodeService::new(cascade)
    } else {
        GeocodeService::with_cache(cascade, GeocodeCache::new(MemoryStore::default()))
    };
    if let Some(country) = country {
        service = service.with_country(country);
    }

    let pipeline = BatchPipeline::new(service)
        .with_config(BatchConfig::default().with_parallelism(parallelism));

    // Ctrl-C stops at the next record boundary; in-flight calls finish.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current record");
            signal_token.cancel();
        }
    });

    let results = pipeline
        .process(records, &cancel, &TracingBatchReporter)
        .await;

    let succeeded = results.iter().filter(|r| r.success).count();
    if results.len() < total {
        println!(
            "Cancelled after {}/{} records ({} geocoded)",
            results.len(),
            total,
            succeeded
        );
    } else {
        println!("Geocoded {succeeded}/{total} addresses");
    }

    if results.is_empty() {
        return Ok(());
    }

    let doc_name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Geocoding results");
    let documents = kml_documents(&results, doc_name, max_kml_placemarks);

    if documents.len() == 1 {
        std::fs::write(output, &documents[0])
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote {}", output.display());
    } else {
        for (i, document) in documents.iter().enumerate() {
            let path = part_path(output, i + 1);
            std::fs::write(&path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn cmd_providers(country: Option<CountryFilter>) -> Result<()> {
    let credentials = ProviderCredentials::from_env();
    let cascade = configured_providers(&credentials, country.as_ref())?;

    println!("Provider cascade ({} configured):", cascade.len());
    for (i, entry) in cascade.iter().enumerate() {
        println!("  {}. {}", i + 1, entry.name());
    }
    if credentials.is_empty() {
        println!("\nNo HERMES_*_API_KEY variables set; add keys to enable commercial backends.");
    }

    Ok(())
}

/// `out.kml` → `out_part3.kml`
fn part_path(output: &Path, part: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let extension = output.extension().and_then(|s| s.to_str()).unwrap_or("kml");
    output.with_file_name(format!("{stem}_part{part}.{extension}"))
}

// ---------------------------------------------------------------------------
// CSV input
// ---------------------------------------------------------------------------

/// Map a CSV header onto a semantic address field, tolerating the common
/// English and Portuguese spellings.
fn assign_field(record: &mut AddressRecord, header: &str, value: &str) {
    let target = match header.trim().to_lowercase().as_str() {
        "street" | "rua" | "logradouro" | "endereco" | "endereço" => &mut record.street,
        "number" | "numero" | "número" | "num" => &mut record.number,
        "neighborhood" | "bairro" => &mut record.neighborhood,
        "city" | "cidade" | "municipio" | "município" => &mut record.city,
        "region" | "state" | "estado" | "uf" => &mut record.region,
        "postal_code" | "postalcode" | "cep" | "zip" | "zipcode" => &mut record.postal_code,
        _ => {
            record.extra.insert(
                header.to_string(),
                serde_json::Value::String(value.to_string()),
            );
            return;
        }
    };
    *target = Some(value.to_string());
}

fn read_records(path: &Path, limit: Option<usize>) -> Result<Vec<AddressRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let mut record = AddressRecord::default();
        for (header, value) in headers.iter().zip(row.iter()) {
            let value = value.trim();
            if !value.is_empty() {
                assign_field(&mut record, header, value);
            }
        }
        records.push(record);

        if let Some(limit) = limit
            && records.len() >= limit
        {
            break;
        }
    }

    Ok(records)
}
