//! bitnet-scribe: 本地 BitNet 推理服务的命令行前端
//!
//! Usage:
//!   bitnet-scribe health [--endpoint <url>]              Probe the inference server
//!   bitnet-scribe process <file|-> [--prompt <text>]     Turn a transcript into notes
//!   bitnet-scribe chat                                   Interactive chat session
//!   bitnet-scribe config                                 Show effective configuration

use anyhow::{anyhow, bail, Context};
use bitnet_scribe::{
    ChatService, InferenceConfig, InferenceService, ProcessingOutcome, ProcessingRequest,
    ProcessingStage,
};
use std::io::{self, BufRead, Read, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let result = match args[1].as_str() {
        "health" => cmd_health(&args[2..]),
        "process" => cmd_process(&args[2..]),
        "chat" => cmd_chat(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("bitnet-scribe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_usage() {
    println!(
        r#"bitnet-scribe: local BitNet inference pipeline

USAGE:
    bitnet-scribe <COMMAND> [OPTIONS]

COMMANDS:
    health [--endpoint <url>]           Probe the inference server
    process <file|-> [OPTIONS]          Turn a transcript into notes
        --prompt <text>                 Instruction replacing the default one
        --max-tokens <n>                Token budget for this request
        --temperature <t>               Sampling temperature for this request
    chat                                Interactive chat (/clear, /history, /quit)
    config                              Show effective configuration and issues
    version                             Show version information
    help                                Show this help message

GLOBAL OPTIONS:
    --config <path>                     YAML configuration file
    --endpoint <url>                    Override the completion endpoint

ENVIRONMENT:
    BITNET_CONFIG                       YAML configuration file
    BITNET_ENDPOINT_URL, BITNET_TIMEOUT_SECS, BITNET_MAX_TOKENS, BITNET_TEMPERATURE,
    BITNET_TOP_P, BITNET_TOP_K, BITNET_REPEAT_PENALTY, BITNET_REPEAT_LAST_N,
    BITNET_SYSTEM_PROMPT                Configuration overrides
    RUST_LOG                            Log filter (default: warn)"#
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parsed_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> anyhow::Result<Option<T>> {
    flag_value(args, flag)
        .map(|v| v.parse::<T>().map_err(|_| anyhow!("invalid value for {flag}: {v}")))
        .transpose()
}

/// Defaults ← YAML file ← environment ← `--endpoint`.
fn load_config(args: &[String]) -> anyhow::Result<InferenceConfig> {
    let path = flag_value(args, "--config")
        .map(str::to_string)
        .or_else(|| std::env::var("BITNET_CONFIG").ok());

    let base = match path {
        Some(p) => InferenceConfig::from_yaml_file(&p)
            .with_context(|| format!("cannot load configuration from {p}"))?,
        None => InferenceConfig::default(),
    };
    let mut config = base.with_env_overrides();
    if let Some(endpoint) = flag_value(args, "--endpoint") {
        config.endpoint_url = endpoint.to_string();
    }
    Ok(config)
}

fn load_valid_config(args: &[String]) -> anyhow::Result<InferenceConfig> {
    let config = load_config(args)?;
    config.validate()?;
    Ok(config)
}

fn print_stage(stage: ProcessingStage) {
    eprintln!("[{stage}]");
}

fn cmd_health(args: &[String]) -> anyhow::Result<()> {
    let config = load_valid_config(args)?;
    let status = InferenceService::check_availability(&config.endpoint_url);
    if status.available {
        println!("OK  {}", config.endpoint_url);
        Ok(())
    } else {
        bail!(
            "{} unavailable: {}",
            config.endpoint_url,
            status.message.unwrap_or_default()
        )
    }
}

fn cmd_process(args: &[String]) -> anyhow::Result<()> {
    let source = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("process needs a transcript file or '-' for stdin"))?;

    let transcript = if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("cannot read stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("cannot read {source}"))?
    };

    let mut request = ProcessingRequest::new(transcript);
    if let Some(prompt) = flag_value(args, "--prompt") {
        request = request.custom_prompt(prompt);
    }
    if let Some(n) = parsed_flag::<u32>(args, "--max-tokens")? {
        request = request.max_tokens(n);
    }
    if let Some(t) = parsed_flag::<f64>(args, "--temperature")? {
        request = request.temperature(t);
    }

    let service = InferenceService::new(load_valid_config(args)?)?;
    let outcome = service.process(&request, Some(&print_stage));
    service.close();

    let elapsed = outcome.elapsed_ms();
    let text = outcome.into_result()?;
    println!("{text}");
    if let Some(ms) = elapsed {
        eprintln!("({ms:.0} ms)");
    }
    Ok(())
}

fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let service = ChatService::new(load_valid_config(args)?)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("Chatting with {} (/clear, /history, /quit)", service.config().endpoint_url);
    loop {
        print!("you> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                service.clear_history();
                println!("(history cleared)");
            }
            "/history" => {
                for msg in service.get_history() {
                    println!("{}", msg.render());
                }
            }
            "" => {}
            message => match service.send_message(message, Some(&print_stage)) {
                ProcessingOutcome::Success { text, .. } => println!("assistant> {text}"),
                ProcessingOutcome::Failure { error, .. } => eprintln!("{error}"),
                ProcessingOutcome::Cancelled => eprintln!("(cancelled)"),
            },
        }
    }

    service.close();
    Ok(())
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", serde_yaml::to_string(&config)?);

    let issues = config.issues();
    if issues.is_empty() {
        println!("# configuration is valid");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("  - {issue}");
        }
        bail!("{} configuration issue(s)", issues.len())
    }
}
