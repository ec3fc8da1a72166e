mod action;
mod app;
mod player;
mod session;
mod station;
mod theme;
mod ui;
mod widgets;

use tape_proto::config::Config;

struct Args {
    station_id: Option<u64>,
    debug: bool,
}

const USAGE: &str = "usage: mixzatape [--debug] [--station-id <id>] [<id>]";

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        station_id: None,
        debug: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--debug" => args.debug = true,
            "--station-id" => {
                let value = it.next().ok_or("--station-id needs a value")?;
                args.station_id = Some(parse_station_id(&value)?);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if !other.starts_with('-') => {
                args.station_id = Some(parse_station_id(other)?);
            }
            other => return Err(format!("unknown option: {other}\n{USAGE}")),
        }
    }
    Ok(args)
}

fn parse_station_id(value: &str) -> Result<u64, String> {
    let id: u64 = value
        .parse()
        .map_err(|_| format!("station id must be a number, got {value:?}"))?;
    if id == 0 {
        return Err("station id must be positive".to_string());
    }
    Ok(id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let config = Config::load().unwrap_or_default();
    std::fs::create_dir_all(&config.paths.buffer_dir)?;

    // The log is truncated every run; one session's worth is all anyone
    // ever wants to read.
    let log_file = std::fs::File::create(&config.paths.log_file)?;

    // Allow RUST_LOG override; suppress noisy connection-level DEBUG from
    // HTTP client internals (hyper_util, reqwest) either way.
    let default_filter = if args.debug {
        "debug,hyper_util=warn,reqwest=warn,hyper=warn"
    } else {
        "info,hyper_util=warn,reqwest=warn,hyper=warn"
    };
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("mixzatape log: {}", config.paths.log_file.display());

    tracing::info!("mixzatape starting…");

    let player = player::Player::new(&config.player)?;
    let station = station::StationClient::new(&config.station);
    let session = session::Session::new(
        args.station_id.unwrap_or(session::DEFAULT_STATION_ID),
        &config.paths.buffer_dir,
    );
    let display = ui::TerminalDisplay::new()?;

    // A station named on the command line starts playing immediately; the
    // default station waits for the first skip.
    let autoplay = args.station_id.is_some();
    let mut app = app::App::new(config, player, station, session, display, autoplay);
    app.run().await?;

    Ok(())
}
