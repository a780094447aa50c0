/*!
 * Stratus CLI - Command Line Interface
 *
 * Version: 0.1.0
 */

use clap::{Parser, Subcommand, ValueEnum};
use futures::TryStreamExt;
use std::path::PathBuf;
use stratus::{
    config::{Config, LogLevel},
    error::{Result, StratusError, EXIT_SUCCESS},
    logging,
    s3::{S3Client, S3Error},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

const MIB: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(version, about = "Streaming multipart uploads and listings for S3-compatible object stores", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/stratus/config.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Bucket name (overrides config and S3_BUCKET)
    #[arg(short, long, global = true)]
    bucket: Option<String>,

    /// Region used for signing (overrides config and S3_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[arg(long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Use path-style addressing
    #[arg(long, global = true)]
    path_style: bool,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file
    #[arg(long = "log", value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a file or stdin into a multipart upload
    Upload {
        /// Destination object key
        key: String,

        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Part size in MiB (min: 5)
        #[arg(long)]
        part_size: Option<usize>,

        /// Number of parts uploaded in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        /// Content type stored with the object
        #[arg(long)]
        content_type: Option<String>,

        /// Abort the upload if streaming or completion fails
        #[arg(long)]
        abort_on_failure: bool,
    },

    /// Download an object to a file or stdout
    Get {
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an object
    Delete { key: String },

    /// List objects
    List {
        /// Only keys starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Abort an open multipart upload
    Abort {
        /// Object key the upload was started on
        key: String,

        upload_id: String,
    },

    /// Upload stdin, read it back to stdout, then delete it
    Roundtrip {
        key: String,

        /// Part size in MiB (min: 5)
        #[arg(long)]
        part_size: Option<usize>,

        /// Number of parts uploaded in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(bytes) = e.transferred() {
                eprintln!("{} bytes were read before the failure", bytes);
            }
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| StratusError::Config(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(execute(cli.command, config))
}

/// File, then environment, then command line
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();

    if let Some(ref bucket) = cli.bucket {
        config.s3.bucket = bucket.clone();
    }
    if let Some(ref region) = cli.region {
        config.s3.region = region.clone();
    }
    if let Some(ref endpoint) = cli.endpoint {
        config.s3.endpoint = Some(endpoint.clone());
    }
    if cli.path_style {
        config.s3.force_path_style = true;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    config.verbose |= cli.verbose;

    if config.s3.bucket.is_empty() {
        return Err(StratusError::Config(
            "Bucket required (--bucket, S3_BUCKET or [s3] bucket)".to_string(),
        ));
    }
    Ok(config)
}

async fn execute(command: Commands, config: Config) -> Result<()> {
    let default_part_size = config.s3.part_size;
    let default_concurrency = config.s3.concurrency;
    let client = S3Client::new(config.s3)?;

    let part_size = |mib: Option<usize>| part_size_bytes(mib, default_part_size);
    let concurrency = |n: Option<usize>| n.unwrap_or(default_concurrency);

    match command {
        Commands::Upload {
            key,
            file,
            part_size: mib,
            concurrency: workers,
            content_type,
            abort_on_failure,
        } => {
            let reader: Box<dyn AsyncRead + Unpin + Send> = match file {
                Some(path) => Box::new(tokio::fs::File::open(&path).await?),
                None => Box::new(tokio::io::stdin()),
            };
            let headers: Vec<(String, String)> = content_type
                .map(|ct| ("Content-Type".to_string(), ct))
                .into_iter()
                .collect();
            upload(
                &client,
                &key,
                reader,
                headers,
                part_size(mib)?,
                concurrency(workers),
                abort_on_failure,
            )
            .await
            .map(|_| ())
        }

        Commands::Get { key, output } => {
            let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match output {
                Some(path) => Box::new(tokio::fs::File::create(&path).await?),
                None => Box::new(tokio::io::stdout()),
            };
            download(&client, &key, &mut *writer).await
        }

        Commands::Delete { key } => Ok(client.delete(&key).await?),

        Commands::List { prefix, json } => {
            if json {
                let objects = client.list_prefix(&prefix).await?;
                println!("{}", serde_json::to_string_pretty(&objects)?);
            } else {
                let mut objects = client.list_stream(prefix);
                while let Some(object) = objects.try_next().await? {
                    let size = object.size.map(|s| s.to_string()).unwrap_or_default();
                    let modified = object
                        .last_modified
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default();
                    println!("{:>12}  {:<25}  {}", size, modified, object.key);
                }
            }
            Ok(())
        }

        Commands::Abort { key, upload_id } => Ok(client.abort_upload(&key, &upload_id).await?),

        Commands::Roundtrip {
            key,
            part_size: mib,
            concurrency: workers,
        } => {
            let bytes = upload(
                &client,
                &key,
                tokio::io::stdin(),
                Vec::new(),
                part_size(mib)?,
                concurrency(workers),
                true,
            )
            .await?;
            info!(key = %key, bytes, "uploaded, reading back");

            let mut stdout = tokio::io::stdout();
            download(&client, &key, &mut stdout).await?;
            client.delete(&key).await?;
            Ok(())
        }
    }
}

/// `--part-size` in MiB to bytes, falling back to the configured size
fn part_size_bytes(mib: Option<usize>, default: usize) -> Result<usize> {
    match mib {
        Some(mib) => mib
            .checked_mul(MIB)
            .ok_or_else(|| StratusError::Config(format!("Part size of {} MiB is too large", mib))),
        None => Ok(default),
    }
}

/// Initiate, stream and complete; optionally abort on failure
async fn upload<R>(
    client: &S3Client,
    key: &str,
    reader: R,
    headers: Vec<(String, String)>,
    part_size: usize,
    concurrency: usize,
    abort_on_failure: bool,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let upload = client.initiate_upload(key, headers).await?;

    let outcome = match upload.stream(reader, part_size, concurrency).await {
        Ok(bytes) => upload
            .complete()
            .await
            .map(|_| bytes)
            .map_err(StratusError::from),
        Err(failure) => Err(StratusError::from(failure)),
    };

    match outcome {
        Ok(bytes) => {
            eprintln!(
                "Uploaded {} bytes to {} in {} parts",
                bytes,
                upload.key(),
                upload.parts_assigned()
            );
            Ok(bytes)
        }
        Err(e) => {
            if abort_on_failure {
                if let Err(abort_err) = upload.abort().await {
                    warn!(upload_id = %upload.upload_id(), error = %abort_err, "abort failed");
                }
            } else {
                eprintln!(
                    "Upload {} left open; remove it with: stratus abort {} {}",
                    upload.upload_id(),
                    upload.key(),
                    upload.upload_id()
                );
            }
            Err(e)
        }
    }
}

async fn download<W>(client: &S3Client, key: &str, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let body = client.get(key).await?;
    let copied = body.copy_to(writer).await.map_err(S3Error::from)?;
    info!(key, bytes = copied, "object downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_size_in_mib() {
        assert_eq!(part_size_bytes(Some(8), MIB).unwrap(), 8 * MIB);
        assert_eq!(part_size_bytes(None, 5 * MIB).unwrap(), 5 * MIB);
    }

    #[test]
    fn test_oversized_part_size_is_config_error() {
        let err = part_size_bytes(Some(usize::MAX), 5 * MIB).unwrap_err();
        assert!(matches!(err, StratusError::Config(_)));
        assert_eq!(err.exit_code(), stratus::error::EXIT_FATAL);
    }
}
