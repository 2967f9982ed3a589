use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docfill::config::{find_default_config, init_default_config, load_config, AppConfig};
use docfill::progress::{ConsoleProgress, ProgressObserver};
use docfill::{FillOptions, Filler, LocalFiller, OpenAiChatModel, RemoteFiller};

#[derive(Parser, Debug)]
#[command(name = "docfill")]
#[command(about = "Fill DOCX template placeholders from natural-language instructions", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx template
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Natural-language filling instructions
    #[arg(short, long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Output .docx (default: <input_stem>_filled.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Config file path (default: search for docfill.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delegate to a deployed docfill server instead of filling locally
    #[arg(long)]
    remote: bool,

    /// Remote server base URL (implies --remote)
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,

    /// Chat model override (local mode)
    #[arg(long)]
    model: Option<String>,

    /// Retry budget override for collaborator calls
    #[arg(long)]
    max_retries: Option<u32>,

    /// Output-token ceiling override for collaborator calls
    #[arg(long)]
    max_output_tokens: Option<u32>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let (Some(input), Some(prompt)) = (args.input.clone(), args.prompt.clone()) else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        eprintln!("\n\nUSAGE:\n  docfill <template.docx> -p \"Client is Acme Corp, date 2026-09-01\"\n");
        return Ok(());
    };

    let output = match args.output.clone() {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            input.with_file_name(format!("{stem}_filled.docx"))
        }
    };

    let workdir = input
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg_path = args.config.clone().or_else(|| find_default_config(&workdir));
    let mut cfg = AppConfig::default();
    if let Some(p) = cfg_path.as_ref() {
        if p.exists() {
            cfg = load_config(p)?;
        }
    }

    let console = ConsoleProgress::new(!args.quiet);
    let observer: Box<ProgressObserver> = Box::new(move |ev| console.observe(ev));

    let opts = FillOptions {
        max_retries: args.max_retries.or(cfg.api.max_retries),
        max_output_tokens: args.max_output_tokens.or(cfg.api.max_output_tokens),
        on_progress: Some(observer.as_ref()),
    };

    let remote_endpoint = args
        .api_base
        .clone()
        .or_else(|| (args.remote).then(|| cfg.remote.endpoint.clone()).flatten());
    let use_remote = args.remote || args.api_base.is_some();

    let result = if use_remote {
        let endpoint = remote_endpoint
            .context("remote mode requires --api-base or [remote].endpoint in docfill.toml")?;
        RemoteFiller::new(endpoint).fill_path(&input, &prompt, &opts)?
    } else {
        let model_name = args.model.as_deref().unwrap_or(cfg.api.model());
        let model =
            OpenAiChatModel::from_env(cfg.api.base_url(), model_name, cfg.api.api_key_env())?;
        LocalFiller::new(Box::new(model)).fill_path(&input, &prompt, &opts)?
    };

    let written = result.save(&output)?;
    if !args.quiet {
        eprintln!(
            "Filled {}/{} slots ({} skipped) in {} ms",
            result.metadata.filled_slots,
            result.metadata.total_slots,
            result.metadata.skipped_slots,
            result.metadata.processing_time_ms
        );
        eprintln!("Summary: {}", result.document_summary);
        for change in &result.changes {
            eprintln!(
                "  {} [{:?}] {:?} -> {:?}",
                change.id, change.source, change.original_text, change.filled_value
            );
        }
    }
    println!("{}", written.display());
    Ok(())
}
