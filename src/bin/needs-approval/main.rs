use std::sync::Arc;

use needs_approval::{AwsCodeCommit, LogSink, OnDisable, StatusLine, parse_args, run};

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

/// Other crates stay at `warn` either way so SDK warnings are never hidden.
fn default_filter(debug: bool) -> &'static str {
    if debug {
        "warn,needs_approval=debug"
    } else {
        "warn"
    }
}

fn init_tracing(debug: bool, status: &Arc<StatusLine>) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(status.stderr_is_terminal())
                .with_writer(LogSink::new(Arc::clone(status))),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match parse_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let status = Arc::new(StatusLine::stdio(config.debug));
    init_tracing(config.debug, &status);

    if config.debug {
        status.disable_single_line_mode(OnDisable::NewLine);
    }

    let client = AwsCodeCommit::from_config(&config).await;

    if let Err(err) = run(&client, &config, &status).await {
        status.fatal(err);
    }

    Ok(())
}
