use std::env;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use credit_exchange::Engine;
use credit_exchange::csv::{read_commands, write_balances, write_project_export};
use credit_exchange::query::{self, ProjectQuery};
use credit_exchange::seed::demo_store;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: credit-exchange <commands.csv> [balances|projects]";

#[derive(Clone, Copy)]
enum Report {
    Balances,
    Projects,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        error!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let report = match args.next().as_deref() {
        None | Some("balances") => Report::Balances,
        Some("projects") => Report::Projects,
        Some(other) => {
            error!(report = other, "{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let commands = match read_commands(Path::new(&path)) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let store = match demo_store() {
        Ok(store) => store,
        Err(e) => {
            error!("demo catalog is invalid: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new(store);
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(command_receiver)).await;

    let store = engine.store();
    let stdout = io::stdout();
    let written = match report {
        Report::Balances => {
            let mut users: Vec<_> = store.users().collect();
            users.sort_by(|a, b| a.id.cmp(&b.id));
            write_balances(stdout.lock(), users)
        }
        Report::Projects => {
            let projects = query::projects(store, &ProjectQuery::all());
            write_project_export(stdout.lock(), store, projects)
        }
    };

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to write report: {e}");
            ExitCode::FAILURE
        }
    }
}
