mod cli;

use heicforge::{
    batch::{BatchConverter, ItemStatus},
    codec, config,
    output::write_artifact,
    server::{self, AppContext},
    watch::{FileWatcher, SettledFileHandler},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use heicforge_common::paths::{has_extension, is_hidden};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "heicforge=trace,heicforge_common=trace,tower_http=debug".to_string()
        } else {
            "heicforge=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            inputs,
            concurrency,
            output_dir,
            remote,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_files(
                &inputs,
                concurrency,
                output_dir,
                remote.as_deref(),
                cli.config.as_deref(),
            ))
        }
        Commands::Watch { paths } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(watch_folders(paths, cli.config.as_deref()))
        }
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::InitConfig { path, force } => {
            init_config(path.as_deref().unwrap_or(Path::new("heicforge.toml")), force)
        }
        Commands::Version => {
            println!("heicforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_files(
    inputs: &[PathBuf],
    concurrency: Option<usize>,
    output_dir: Option<PathBuf>,
    remote: Option<&str>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let concurrency = concurrency.unwrap_or(config.batch.concurrency);
    let output_dir = config::expand_path(&output_dir.unwrap_or_else(|| config.output.dir.clone()));

    let files = collect_inputs(inputs, &config.output.source_extensions)?;
    if files.is_empty() {
        anyhow::bail!("No convertible files found");
    }

    let codec = codec::from_config(&config, remote)?;
    let batch = BatchConverter::from_config(&config);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight conversions");
            on_ctrl_c.cancel();
        }
    });

    tracing::info!(
        "Converting {} files into {:?} ({} at a time)",
        files.len(),
        output_dir,
        concurrency
    );

    let mut succeeded = 0;
    let mut failed = 0;
    let mut skipped = 0;

    // The working set is bounded, so large inputs are converted in batches.
    for chunk in files.chunks(batch.capacity()) {
        for path in chunk {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            batch.enqueue(name, codec::SourceRef::Path(path.clone()))?;
        }

        let summary = batch
            .convert_all_with_cancel(codec.as_ref(), concurrency, &cancel)
            .await?;
        skipped += summary.skipped;

        for item in batch.items() {
            match (item.status, &item.result) {
                (ItemStatus::Done, Some(result)) => {
                    match write_artifact(&output_dir, result).await {
                        Ok(written) => {
                            succeeded += 1;
                            println!("✓ {} -> {}", item.source_name, written.display());
                        }
                        Err(e) => {
                            failed += 1;
                            println!("✗ {}: {:#}", item.source_name, e);
                        }
                    }
                }
                (ItemStatus::Error, _) => {
                    failed += 1;
                    println!(
                        "✗ {}: {}",
                        item.source_name,
                        item.error.as_deref().unwrap_or("unknown error")
                    );
                }
                _ => {}
            }
        }
        batch.reset();

        if cancel.is_cancelled() {
            break;
        }
    }

    // Chunks never reached after cancellation count as skipped too.
    skipped += files.len() - (succeeded + failed + skipped);

    println!();
    println!(
        "Converted {} of {} files ({} failed, {} skipped)",
        succeeded,
        files.len(),
        failed,
        skipped
    );

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to convert", failed, files.len());
    }
    if cancel.is_cancelled() {
        anyhow::bail!("Interrupted");
    }
    Ok(())
}

/// Expand directories (non-recursively) into the convertible files they hold.
fn collect_inputs(inputs: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read directory: {:?}", input))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && !is_hidden(path) && has_extension(path, extensions))
                .collect();
            found.sort();
            tracing::debug!("Found {} files in {:?}", found.len(), input);
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            anyhow::bail!("Input does not exist: {:?}", input);
        }
    }

    Ok(files)
}

async fn watch_folders(paths: Vec<PathBuf>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if !paths.is_empty() {
        config.watch.paths = paths;
    }

    let batch = Arc::new(BatchConverter::from_config(&config));
    let codec = codec::from_config(&config, None)?;
    let handler = Arc::new(SettledFileHandler::new(
        batch,
        codec,
        config::expand_path(&config.output.dir),
        config.watch.auto_convert,
    ));

    let mut watcher = FileWatcher::new(config.watch.clone(), handler);
    watcher.start()?;

    tracing::info!("Watching for new files, press Ctrl+C to stop");
    server::shutdown_signal().await;
    watcher.stop();

    Ok(())
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting heicforge server");

    let batch = Arc::new(BatchConverter::from_config(&config));
    let ctx = AppContext::new(config.clone(), Arc::clone(&batch))?;

    // The watcher shares the server's working set so its items show up in the API.
    let mut watcher = if config.watch.enabled {
        let handler = Arc::new(SettledFileHandler::new(
            batch,
            Arc::clone(&ctx.codec),
            config::expand_path(&config.output.dir),
            config.watch.auto_convert,
        ));
        let mut watcher = FileWatcher::new(config.watch.clone(), handler);
        watcher.start()?;
        Some(watcher)
    } else {
        tracing::info!("File watcher is disabled");
        None
    };

    let result = server::start_server(ctx).await;

    if let Some(ref mut watcher) = watcher {
        watcher.stop();
    }

    result
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  Batch: capacity {}, concurrency {}",
                config.batch.capacity, config.batch.concurrency
            );
            println!(
                "  Output: {:?} (.{}, quality {})",
                config.output.dir, config.output.extension, config.output.quality
            );
            println!("  Watch enabled: {}", config.watch.enabled);
            println!("  Watch paths: {}", config.watch.paths.len());
            match config.remote.url {
                Some(ref url) => println!("  Remote codec: {}", url),
                None => println!("  Remote codec: none"),
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }

    config::save_config(path, &config::Config::default())?;
    println!("Wrote default configuration to {:?}", path);
    Ok(())
}
