//! meowc - компилятор бегущей строки и эталонная машина FIS-25.
//!
//! Использование:
//!   meowc marquee [--config FILE]   - сообщение из stdin -> программа FIS-25
//!   meowc run FILE [--steps N]      - выполнить листинг и показать экран
//!   meowc --help                    - справка

use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::process;

use meow_lang::config::MarqueeConfig;
use meow_lang::machine::{Halt, Machine, KEY_COUNT};
use meow_lang::marquee::{filter_message, marquee_program};
use meow_lang::target::parse_listing;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = r#"
meowc - Meow to FIS-25 compiler

USAGE:
    meowc marquee [--config FILE]
        Read a message line from stdin (only 0-9 . $ are kept)
        and print the marquee program as FIS-25 text.

    meowc run FILE [--steps N] [--keys K,...]
        Execute a FIS-25 listing on the reference machine for at most
        N steps (default 100000) with the given input lines held down,
        then print the 64x64 screen.

    meowc --help, -h       Show this help
    meowc --version, -v    Show version

ENVIRONMENT:
    RUST_LOG               Log filter (env_logger syntax)
    MEOW_DEBUG             Enable debug logging when RUST_LOG is unset

EXAMPLES:
    echo "12.50$" | meowc marquee > marquee.fis
    meowc run marquee.fis --steps 20000 --keys 7
"#;

const DEFAULT_STEPS: u64 = 100_000;

fn main() {
    init_logging();
    let args: Vec<String> = env::args().skip(1).collect();

    let code = match args.first().map(String::as_str) {
        None | Some("--help") | Some("-h") => {
            println!("{}", HELP);
            0
        }
        Some("--version") | Some("-v") => {
            println!("meowc {}", VERSION);
            0
        }
        Some("marquee") => run_marquee(&args[1..]),
        Some("run") => run_listing(&args[1..]),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Use --help for usage information.");
            1
        }
    };
    process::exit(code);
}

fn init_logging() {
    let default = if env::var_os("MEOW_DEBUG").is_some() {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
    log::debug!("MEOW_DEBUG enabled");
}

/// `meowc marquee [--config FILE]`
fn run_marquee(args: &[String]) -> i32 {
    let config = match args {
        [] => MarqueeConfig::default(),
        [flag, path] if flag == "--config" => match MarqueeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading '{}': {}", path, e);
                return 1;
            }
        },
        _ => {
            eprintln!("Usage: meowc marquee [--config FILE]");
            return 1;
        }
    };

    eprint!("Marquee message (only 0-9 . $): ");
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        log::warn!("failed to read stdin: {}", e);
        line.clear();
    }
    let message = filter_message(&line, config.max_message_len);

    match marquee_program(&message, &config) {
        Ok(program) => {
            print!("{}", program);
            0
        }
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            2
        }
    }
}

/// `meowc run FILE [--steps N] [--keys K,...]`
fn run_listing(args: &[String]) -> i32 {
    let Some((path, options)) = args.split_first() else {
        eprintln!("Usage: meowc run FILE [--steps N] [--keys K,...]");
        return 1;
    };

    let mut steps = DEFAULT_STEPS;
    let mut keys = Vec::new();
    let mut rest = options.iter();
    while let Some(flag) = rest.next() {
        let value = match rest.next() {
            Some(value) => value,
            None => {
                eprintln!("Missing value for {}", flag);
                return 1;
            }
        };
        match flag.as_str() {
            "--steps" => match value.parse() {
                Ok(n) => steps = n,
                Err(_) => {
                    eprintln!("Invalid step count: {}", value);
                    return 1;
                }
            },
            "--keys" => match parse_keys(value) {
                Some(parsed) => keys = parsed,
                None => {
                    eprintln!("Invalid key list: {} (expected codes 0..=7)", value);
                    return 1;
                }
            },
            other => {
                eprintln!("Unknown option: {}", other);
                return 1;
            }
        }
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path, e);
            return 1;
        }
    };
    let program = match parse_listing(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return 2;
        }
    };

    let mut machine = match Machine::new(&program) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("{}", e);
            return 2;
        }
    };
    for key in keys {
        machine.set_key(key, true);
    }

    match machine.run(steps) {
        Ok(halt) => {
            print!("{}", machine.render());
            let status = match halt {
                Halt::Finished => "finished",
                Halt::StepLimit => "step limit reached",
            };
            eprintln!("{} after {} steps", status, machine.steps());
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            3
        }
    }
}

fn parse_keys(text: &str) -> Option<Vec<usize>> {
    text.split(',')
        .map(|part| part.trim().parse::<usize>().ok().filter(|&k| k < KEY_COUNT))
        .collect()
}
