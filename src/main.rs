mod cli;

use vidpress::{
    config::{self, Config},
    dispatch::{Batch, Dispatcher, JobError, JobOutcome},
    server,
};
use vidpress_av::{check_tools, FfmpegTranscoder};
use vidpress_common::{paths::is_video_file, JobDescriptor, ProfileId};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidpress=trace,vidpress_av=trace,vidpress_common=debug,ffmpeg=info,tower_http=debug".to_string()
        } else {
            "vidpress=info,vidpress_av=info,ffmpeg=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compress {
            level,
            threads,
            concurrency,
            output_dir,
            files,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let options = CompressOptions::resolve(&config, level, threads, concurrency, output_dir)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(compress_files(&config, options, files))
        }
        Commands::Serve { host, port } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;

            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            tracing::info!(
                "Server will listen on {}:{}",
                config.server.host,
                config.server.port
            );

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::start_server(config))
        }
        Commands::Profiles => {
            list_profiles();
            Ok(())
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_external_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidpress {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Command-line overrides merged with config defaults.
struct CompressOptions {
    profile: ProfileId,
    threads: NonZeroUsize,
    concurrency: NonZeroUsize,
    output_dir: Option<PathBuf>,
}

impl CompressOptions {
    fn resolve(
        config: &Config,
        level: Option<String>,
        threads: Option<usize>,
        concurrency: Option<usize>,
        output_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let profile = match level {
            Some(level) => {
                if level.parse::<ProfileId>().is_err() {
                    tracing::warn!("Unknown compression level '{}'; using normal", level);
                }
                ProfileId::resolve(&level)
            }
            None => config.defaults.profile(),
        };

        let threads = match threads {
            Some(n) => NonZeroUsize::new(n)
                .ok_or_else(|| anyhow::anyhow!("--threads must be at least 1"))?,
            None => config.defaults.threads(),
        };

        let concurrency = match concurrency {
            Some(n) => NonZeroUsize::new(n)
                .ok_or_else(|| anyhow::anyhow!("--concurrency must be at least 1"))?,
            None => config.defaults.concurrency(),
        };

        Ok(Self {
            profile,
            threads,
            concurrency,
            output_dir: output_dir.or_else(|| config.defaults.output_dir.clone()),
        })
    }
}

async fn compress_files(config: &Config, options: CompressOptions, files: Vec<PathBuf>) -> Result<()> {
    let transcoder = FfmpegTranscoder::discover(config.tools.ffmpeg_path.as_deref())
        .with_timeout(config.tools.timeout());
    let dispatcher = Dispatcher::new(Arc::new(transcoder));

    let jobs: Vec<JobDescriptor> = files
        .into_iter()
        .map(|file| {
            if !is_video_file(&file) {
                tracing::warn!("{:?} does not look like a video file", file);
            }
            JobDescriptor::new(file, options.profile, options.threads)
                .with_output_dir(options.output_dir.clone())
        })
        .collect();

    tracing::info!(
        "Compressing {} file(s) at level {} ({} at a time, {} threads each)",
        jobs.len(),
        options.profile,
        options.concurrency,
        options.threads
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling remaining jobs");
            ctrl_c.cancel();
        }
    });

    let batch = Batch::new(jobs, options.concurrency)
        .with_cancellation(cancel)
        .on_complete(Arc::new(print_outcome));

    dispatcher.run_batch(batch).await?;

    println!("All files processed.");
    Ok(())
}

fn print_outcome(outcome: &JobOutcome) {
    let input = outcome.input_path.display();
    match &outcome.result {
        Ok(()) => println!(
            "Successfully compressed {} to {}",
            input,
            outcome.output_path.display()
        ),
        Err(JobError::Cancelled) => println!("Cancelled {}", input),
        Err(e) => eprintln!("Error compressing {}: {}", input, e),
    }
}

fn list_profiles() {
    println!("{:<10} {:>4}  preset", "level", "crf");
    for id in ProfileId::ALL {
        let params = id.params();
        println!("{:<10} {:>4}  {}", id, params.crf, params.preset);
    }
}

fn check_external_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = check_tools(config.tools.ffmpeg_path.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path in the config.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Default level: {}", config.defaults.profile());
    println!("  Concurrency: {}", config.defaults.concurrency());
    println!("  Threads per file: {}", config.defaults.threads());
    if let Some(ref dir) = config.defaults.output_dir {
        println!("  Output dir: {}", dir.display());
    }
    println!(
        "  Upload limit: {} bytes, {} concurrent job(s)",
        config.server.max_upload_bytes,
        config.server.max_concurrent_jobs()
    );

    Ok(())
}
