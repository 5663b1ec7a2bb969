// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT license.

//! Command-line entry point: loads a configuration and table, stands up the
//! full simulated topology they describe in this one process, and runs a
//! single batch of queries against it end to end.
//!
//! Grounded on `drivacy/main.cc`'s `--config`/`--table` flags and
//! mock-protocol demo flow; `clap` supplies the flag parsing the original
//! hand-rolled with `gflags`.

use std::process::ExitCode;

use clap::Parser;
use drivacy::client::Client;
use drivacy::config::{load_table, Configuration};
use drivacy::io::socket::SimulatedBus;
use drivacy::party::Party;
use drivacy::ProtocolError;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "drivacy", about = "Multi-party private lookup protocol engine")]
struct Args {
    /// Path to the JSON configuration (party count, parallelism, modulus).
    #[arg(long)]
    config: std::path::PathBuf,

    /// Path to the JSON lookup table queried against.
    #[arg(long)]
    table: std::path::PathBuf,

    /// Comma-separated keys to query in a single demo batch.
    #[arg(long, value_delimiter = ',', default_value = "1")]
    values: Vec<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("drivacy: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(args: Args) -> Result<(), ProtocolError> {
    let config = Configuration::load(&args.config)?;
    let table = load_table(&args.table)?;

    let bus = SimulatedBus::new();
    let mut tasks = Vec::new();

    for party_id in 1..=config.parties {
        for machine_id in 1..=config.parallelism {
            let (socket, inbox) = bus.connect(party_id, machine_id);
            let mut party = Party::new(party_id, machine_id, config.clone(), table.clone(), socket, inbox);
            tasks.push(tokio::spawn(async move {
                loop {
                    if let Err(err) = party.run_batch().await {
                        return Err::<(), ProtocolError>(err);
                    }
                }
            }));
        }
    }

    let (client_socket, client_inbox) = bus.connect(drivacy::party::CLIENT_PARTY_ID, 1);
    let mut client = Client::new(config.clone(), client_socket, client_inbox);

    info!("submitting batch of {} quer{}", args.values.len(), if args.values.len() == 1 { "y" } else { "ies" });
    client.send_batch(&args.values, 1)?;
    for value in &args.values {
        let result = client.recv_next_response().await?;
        println!("{value} -> {result}");
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}
