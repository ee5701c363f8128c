//! houndctl - 单用户 BloodHound CE 容器启动器
//!
//! Usage:
//! - Start the stack: `houndctl`
//! - Custom port: `houndctl --port 9000`
//! - Separate workspace: `houndctl --workspace audit-acme`
//! - Expose neo4j bolt: `houndctl --bolt-port 7687`
//! - Pull images only: `houndctl pull`

use houndctl::config::env::{constants, CliArgs, CliCommand, LaunchConfig};
use houndctl::error::{LaunchError, LaunchResult};
use houndctl::infra::backend::CliBackend;
use houndctl::services::launch;

/// 解析命令行参数；取值错误直接退出码 2
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--backend" if i + 1 < args.len() => {
                cli.backend = Some(args[i + 1].clone());
                i += 2;
            }
            "--port" if i + 1 < args.len() => {
                cli.port = Some(parse_value("--port", &args[i + 1]));
                i += 2;
            }
            "--bolt-port" if i + 1 < args.len() => {
                cli.bolt_port = Some(parse_value("--bolt-port", &args[i + 1]));
                i += 2;
            }
            "--workspace" if i + 1 < args.len() => {
                cli.workspace = Some(args[i + 1].clone());
                i += 2;
            }
            "--data-dir" if i + 1 < args.len() => {
                cli.data_dir = Some(std::path::PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--debug" => {
                cli.debug = true;
                i += 1;
            }
            "--version" | "-V" => {
                println!("houndctl {}", constants::VERSION);
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "pull" => {
                cli.command = CliCommand::Pull;
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Run 'houndctl --help' for usage.");
                std::process::exit(2);
            }
        }
    }

    cli
}

fn parse_value<T: std::str::FromStr>(flag: &str, raw: &str) -> T {
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Invalid value for {}: '{}'", flag, raw);
            std::process::exit(2);
        }
    }
}

fn print_help() {
    println!("houndctl - single-user BloodHound CE launcher");
    println!();
    println!("USAGE:");
    println!("    houndctl [OPTIONS] [COMMAND]");
    println!();
    println!("OPTIONS:");
    println!("    --backend <NAME>     Container backend: podman or docker (default: auto, podman first)");
    println!("    --port <PORT>        Web UI port on 127.0.0.1 (default: {})", constants::DEFAULT_PORT);
    println!("    --bolt-port <PORT>   Also publish the neo4j bolt port on 127.0.0.1");
    println!("    --workspace <NAME>   Workspace for data and container names (default: {})", constants::DEFAULT_WORKSPACE);
    println!("    --data-dir <DIR>     Override the workspace data directory");
    println!("    --debug              Verbose logging, echo backend commands");
    println!("    -V, --version        Print version information");
    println!("    -h, --help           Print help information");
    println!();
    println!("COMMANDS:");
    println!("    pull                 Pull the three images and exit");
    println!();
    println!("EXAMPLES:");
    println!("    houndctl                           # Start on http://127.0.0.1:{}", constants::DEFAULT_PORT);
    println!("    houndctl --workspace audit-acme    # Isolated data and container names");
    println!("    houndctl pull                      # Pre-fetch images");
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "houndctl=debug" } else { "houndctl=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: &CliArgs) -> LaunchResult<()> {
    let config = LaunchConfig::from_cli(cli)?;
    let backend = match config.backend {
        Some(kind) => CliBackend::new(kind),
        None => CliBackend::detect().await?,
    };
    match cli.command {
        CliCommand::Run => launch::run(&backend, &config).await,
        CliCommand::Pull => launch::pull_images(&backend, &config).await,
    }
}

fn main() {
    let cli = parse_args();
    init_tracing(cli.debug);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    match rt.block_on(dispatch(&cli)) {
        Ok(()) => {}
        // Ctrl-C 是正常退出路径，清理已经做完
        Err(LaunchError::Interrupted) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
