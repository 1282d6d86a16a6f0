use benchkeeper::app::cli::split_global_flags;
use benchkeeper::app::command_handlers;
use benchkeeper::runtime::install_interrupt_handler;
use benchkeeper::shared::logging::init_tracing;

fn run() -> Result<bool, String> {
    let (verbose, args) = split_global_flags(std::env::args().skip(1).collect());
    init_tracing(verbose);
    if let Err(err) = install_interrupt_handler() {
        tracing::warn!(error = %err, "interrupt handler unavailable");
    }
    let outcome = command_handlers::run_cli(args)?;
    if !outcome.output.is_empty() {
        println!("{}", outcome.output);
    }
    Ok(outcome.success)
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
