mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, EncodingArgs};
use fj_av::job::filters;
use fj_av::{
    EncodingResult, FfprobeProber, JobBuilder, MediaInput, StreamDestination, ToolRegistry,
};
use fj_core::config::Config;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults based on --verbose
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ffjob=debug,fj_av=debug,fj_core=debug".to_string()
        } else {
            "ffjob=info,fj_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Transcode {
            input,
            output,
            encoding,
            volume,
            metadata,
            timeout,
            dry_run,
            json,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let mut builder = apply_encoding(
                MediaInput::open(&input)?.output(output).with_config(&config),
                encoding,
            )?;
            if let Some(v) = volume {
                builder = builder.add_filter(filters::volume(v)?);
            }
            for (key, value) in metadata {
                builder = builder.with_metadata(key, value);
            }
            if let Some(secs) = timeout {
                builder = builder.timeout(secs);
            }
            if dry_run {
                return print_command(&builder, json);
            }

            let builder = builder.on_progress(|_, frame, kbps| {
                tracing::debug!("frame {frame}, {kbps:.1} kbit/s");
            });
            let result = builder.execute()?;
            print_result(&result, json)
        }
        Commands::Stream {
            input,
            destination,
            encoding,
            live,
            read_rate,
            sdp,
            rtcp_port,
            instant_startup,
            timeout,
            dry_run,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let destination: StreamDestination = destination.parse()?;
            let mut builder = JobBuilder::new(input).with_config(&config);
            if live {
                builder = builder.as_live_source();
            }
            builder = apply_encoding(builder.to_stream(destination), encoding)?;
            if let Some(rate) = read_rate {
                builder = builder.with_read_rate(rate);
            }
            if let Some(port) = rtcp_port {
                let mut network = builder.spec().network.unwrap_or_default();
                network.rtcp_port = Some(port);
                builder = builder.with_network_config(network);
            }
            if instant_startup {
                builder = builder.with_instant_startup();
            }
            if let Some(path) = sdp {
                builder = builder
                    .save_sdp_to(path)
                    .on_sdp_created(|p| println!("Session description written to {}", p.display()));
            }
            if let Some(secs) = timeout {
                builder = builder.timeout(secs);
            }
            if dry_run {
                return print_command(&builder, false);
            }

            let builder = builder.on_stream_stats(|bps, speed, _| {
                tracing::info!("{:.1} kbit/s at {speed:.2}x", bps as f64 / 1000.0);
            });
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_stream(builder))
        }
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            probe_file(&file, &config, json)
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ffjob {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn apply_encoding(mut builder: JobBuilder, args: EncodingArgs) -> Result<JobBuilder> {
    if let Some(codec) = args.codec {
        builder = builder.with_codec(codec);
    }
    if let Some(bitrate) = args.bitrate {
        builder = builder.with_bitrate(bitrate)?;
    }
    if let Some(rate) = args.sample_rate {
        builder = builder.with_sample_rate(rate);
    }
    if let Some(layout) = args.channels {
        builder = builder.with_channels(layout);
    }
    for filter in args.filters {
        builder = builder.add_filter(filter);
    }
    Ok(builder)
}

fn print_command(builder: &JobBuilder, json: bool) -> Result<()> {
    let command = builder.compile()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&command)?);
    } else {
        println!("{command}");
    }
    Ok(())
}

fn print_result(result: &EncodingResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match result.output_path {
        Some(ref path) => println!(
            "✓ Wrote {} ({:.1} KB) in {} ms",
            path.display(),
            result.file_size_kb(),
            result.time_taken_ms
        ),
        None => println!("✓ Finished in {} ms", result.time_taken_ms),
    }
    Ok(())
}

async fn run_stream(builder: JobBuilder) -> Result<()> {
    let handle = builder.spawn()?;
    tracing::info!("Streaming: {}", handle.command_line());

    let cancel: CancellationToken = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping stream");
            cancel.cancel();
        }
    });

    match handle.wait().await {
        Ok(result) => print_result(&result, false),
        Err(fj_core::Error::Cancelled) => {
            println!("Stream stopped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn probe_file(file: &Path, config: &Config, json: bool) -> Result<()> {
    let input = MediaInput::open(file)?;
    let registry = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_locator(&registry)?;
    let meta = input
        .probe_with(&prober)
        .with_context(|| format!("failed to probe {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Format: {}", meta.format);
    let secs = meta.duration_secs as u64;
    println!(
        "Duration: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    );
    println!("Bitrate: {} bit/s", meta.bitrate);
    println!("Sample rate: {} Hz", meta.sample_rate);
    println!("Channels: {}", meta.channel_layout);
    if !meta.tags.is_empty() {
        println!("\nTags:");
        for (key, value) in &meta.tags {
            println!("  {key}: {value}");
        }
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
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
            print!(" ({})", version.lines().next().unwrap_or(""));
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
        println!("Some tools are missing. Install ffmpeg to run jobs.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }
    println!("  Job timeout: {} s", config.job.timeout_secs);
    println!(
        "  Drain grace: {} ms after exit, {} ms after kill",
        config.supervisor.exit_drain_grace_ms, config.supervisor.timeout_drain_grace_ms
    );
    println!(
        "  SDP polling: {} x {} ms",
        config.artifact_poll.attempts, config.artifact_poll.interval_ms
    );
    Ok(())
}
