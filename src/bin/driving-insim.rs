use clap::{App, Arg, ArgMatches};
use colored::*;
use driving_insim::config::AppConfig;
use driving_insim::indicator::MIN_DEBOUNCE_MS;
use driving_insim::service;
use tracing::Level;

fn port_validator(v: String) -> Result<(), String> {
    match v.parse::<u16>() {
        Ok(_) => Ok(()),
        Err(_) => Err("Port must be a number between 0 and 65535".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("driving-insim")
        .version("0.1.0")
        .author("Driving InSim Team")
        .about("🚦 Turn signals and traffic lights for Live for Speed")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file (intersections, ports, debounce)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("InSim host address")
                .takes_value(true)
                .env("INSIM_HOST"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("InSim TCP port")
                .takes_value(true)
                .env("INSIM_PORT")
                .validator(port_validator),
        )
        .arg(
            Arg::with_name("admin")
                .long("admin")
                .value_name("PASSWORD")
                .help("InSim admin password")
                .takes_value(true)
                .env("ADMIN"),
        )
        .arg(
            Arg::with_name("outgauge-host")
                .long("outgauge-host")
                .value_name("HOST")
                .help("Address to receive OutGauge datagrams on")
                .takes_value(true)
                .env("OUTGAUGE_HOST"),
        )
        .arg(
            Arg::with_name("outgauge-port")
                .long("outgauge-port")
                .value_name("PORT")
                .help("OutGauge UDP port")
                .takes_value(true)
                .env("OUTGAUGE_PORT")
                .validator(port_validator),
        )
        .arg(
            Arg::with_name("debounce-ms")
                .long("debounce-ms")
                .value_name("MS")
                .help("Quiet time before an indicator counts as switched off")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(ms) if ms >= MIN_DEBOUNCE_MS => Ok(()),
                    _ => Err(format!("Debounce must be at least {} ms", MIN_DEBOUNCE_MS)),
                }),
        )
        .arg(
            Arg::with_name("print-config")
                .long("print-config")
                .help("Print the effective configuration as JSON and exit"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = load_config(&matches)?;

    if matches.is_present("print-config") {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    println!("{}", "🚦 Driving InSim".bright_blue().bold());
    println!(
        "{} {}:{}",
        "InSim".dimmed(),
        config.insim.host,
        config.insim.port
    );
    println!(
        "{} {}:{}",
        "OutGauge".dimmed(),
        config.outgauge.host,
        config.outgauge.port
    );
    println!(
        "{} {} ms, {} {}",
        "Indicator debounce".dimmed(),
        config.indicators.debounce_ms,
        config.intersections.len().to_string().bright_green(),
        "intersection(s)".dimmed()
    );

    if let Err(e) = service::run(config).await {
        eprintln!("{} {}", "❌".red(), e.to_string().bright_red());
        return Err(e.into());
    }

    println!("{}", "Driving InSim stopped".dimmed());
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    if let Some(host) = matches.value_of("host") {
        config.insim.host = host.to_string();
    }
    if let Some(port) = matches.value_of("port") {
        config.insim.port = port.parse()?;
    }
    if let Some(admin) = matches.value_of("admin") {
        config.insim.admin = admin.to_string();
    }
    if let Some(host) = matches.value_of("outgauge-host") {
        config.outgauge.host = host.to_string();
    }
    if let Some(port) = matches.value_of("outgauge-port") {
        config.outgauge.port = port.parse()?;
    }
    if let Some(ms) = matches.value_of("debounce-ms") {
        config.indicators.debounce_ms = ms.parse()?;
    }

    config.validate()?;
    Ok(config)
}
