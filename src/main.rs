use std::path::PathBuf;

use showland::RunOptions;

const HELP: &str = "Showland — Browse movies and TV series from the terminal.

  --query <text>       Start with a search
  --offline            Browse the built-in sample catalogue
  --config <path>      Read configuration from <path>
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

enum Cli {
    Exit(i32),
    Run(RunOptions),
}

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Cli::Exit(code) => std::process::exit(code),
        Cli::Run(opts) => opts,
    };

    if let Err(err) = showland::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Cli {
    let mut opts = RunOptions::default();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Showland {}", showland::VERSION);
                return Cli::Exit(0);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Cli::Exit(0);
            }
            "--offline" => opts.offline = true,
            "--query" | "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("{arg} needs a value\n\n{HELP}");
                    return Cli::Exit(2);
                };
                if arg == "--query" {
                    opts.query = Some(value);
                } else {
                    opts.config_file = Some(PathBuf::from(value));
                }
            }
            other => {
                eprintln!("unknown argument: {other}\n\n{HELP}");
                return Cli::Exit(2);
            }
        }
    }
    Cli::Run(opts)
}
