mod cli;

use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use log::{error, info};

use dxl_recorder::logfile;
use dxl_recorder::port;
use dxl_recorder::protocol;
use dxl_recorder::scanner;
use dxl_recorder::session::{MeasurementPair, Session};

use cli::Cli;

fn render_pairs(pairs: &[MeasurementPair], json: bool) -> String {
    if json {
        json::stringify(
            pairs
                .iter()
                .map(|pair| json::array![pair.0, pair.1])
                .collect::<Vec<_>>(),
        )
    } else {
        pairs
            .iter()
            .enumerate()
            .map(|(index, pair)| format!("Pair {}: {}", index + 1, pair))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

fn do_main() -> Result<()> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(Bash, &mut Cli::command(), "dxl-recorder", &mut io::stdout());
        return Ok(());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let candidates = if cli.port == "auto" {
        port::candidate_ports()?
    } else {
        vec![cli.port.clone()]
    };

    let (mut port, port_name) = scanner::find_device(
        &candidates,
        cli.baudrate,
        cli.protocol,
        cli.id,
        cli.retries,
        cli.force,
    )?;
    info!("recorder {} connected via {}", cli.id, port_name);

    let mut proto_box = protocol::make_protocol(cli.protocol, port.as_mut(), cli.retries);
    let proto = proto_box.as_mut();

    let hub_port = scanner::find_sensor_port(proto, cli.id, cli.sensor)?;

    let mut session = Session::new(proto, cli.id);
    session.select_range(hub_port, cli.range)?;
    session.warm_up(Duration::from_secs(cli.warmup));
    session.start()?;

    let sampled = session.sample(cli.cycles, Duration::from_secs(cli.interval));

    // the hub must not be left measuring, whatever sampling returned
    let stopped = session.stop();
    let reset = session.reset();

    let pairs = sampled?;
    stopped?;
    reset?;

    println!("{}", render_pairs(&pairs, cli.json));

    logfile::append_block(&cli.output, &pairs)?;
    info!("data written to {}", cli.output.display());

    logfile::verify_block(&cli.output, &pairs)?;
    info!("write verified, measurements can continue");

    Ok(())
}

fn main() {
    match do_main() {
        Ok(()) => {}
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
