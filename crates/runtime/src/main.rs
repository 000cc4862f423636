//! Kestrel interpreter, command-line interface

use clap::Parser;
use kestrel_runtime::{Context, run_source};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kestrel interpreter, commandline interface", long_about = None)]
struct Cli {
    /// Compile and evaluate an expression
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    expr: Option<String>,

    /// Compile and execute code
    #[arg(short = 'c', long = "code", value_name = "CODE")]
    code: Option<String>,

    /// Import a module before running anything (repeatable)
    #[arg(short = 'i', long = "import", value_name = "NAME")]
    imports: Vec<String>,

    /// Increase the logger verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// File to run ('-' for interactive) and arguments given to it
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print the pending exception and exit nonzero.
fn exit_on_error(ctx: &mut Context) -> ! {
    if let Some(exc) = ctx.catch_exc() {
        eprint!("{}", ctx.format_exc(&exc));
    }
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut ctx = Context::new();

    for name in &cli.imports {
        match ctx.import_module(name) {
            Ok(module) => {
                let vars = ctx.inter_vars.clone();
                if ctx.dict_set_str(&vars, name, module).is_err() {
                    exit_on_error(&mut ctx);
                }
            }
            Err(_) => exit_on_error(&mut ctx),
        }
    }

    if cli.expr.is_some() && cli.code.is_some() {
        eprintln!("Error: Given both '-e' and '-c'");
        std::process::exit(1);
    }

    if let Some(src) = cli.expr.as_deref().or(cli.code.as_deref()) {
        let fname = if cli.expr.is_some() { "<expr>" } else { "<code>" };
        let vars = ctx.inter_vars.clone();
        match run_source(&mut ctx, fname, src, &vars) {
            Ok((result, is_expr)) => {
                if is_expr && !result.is_none() {
                    match ctx.str_of(&result) {
                        Ok(s) => println!("{s}"),
                        Err(_) => exit_on_error(&mut ctx),
                    }
                }
            }
            Err(_) => exit_on_error(&mut ctx),
        }
        return;
    }

    match cli.args.first().map(String::as_str) {
        Some("-") | None => {
            let code = kestrel_runtime::repl::run_repl(&mut ctx);
            std::process::exit(code);
        }
        Some(path) => {
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: failed to read '{path}': {e}");
                    std::process::exit(1);
                }
            };
            let locals = ctx.new_dict();
            match run_source(&mut ctx, path, &src, &locals) {
                Ok((result, is_expr)) => {
                    if is_expr && !result.is_none() {
                        match ctx.str_of(&result) {
                            Ok(s) => println!("{s}"),
                            Err(_) => exit_on_error(&mut ctx),
                        }
                    }
                }
                Err(_) => exit_on_error(&mut ctx),
            }
        }
    }
}
