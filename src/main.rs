use log::LevelFilter;
use std::process::ExitCode;
use tokio::time::sleep;

// --------------------------------------------------------------------------------------------------------------

mod configuration;
use configuration::config::load_config;

mod error;
mod models;

mod handlers;
use handlers::eagle::reader::{build_meter_client, MeterClient};
use handlers::insteon::controller::{build_hub_client, SwitchActuator};
use handlers::insteon::gateway::GatewayRecovery;
use handlers::mail::notifier::Mailer;

mod engine;
use engine::controller::DecisionEngine;
use engine::policy::Policy;

mod scheduler;

// --------------------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialise logger.
    if let Err(e) = env_logger::Builder::new()
        .filter_level(config.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info))
        .try_init()
    {
        eprintln!("Failed to initialise logger: {}", e);
        panic!("Cannot start without logging");
    }

    log::info!("=== EV Charger Controller starting ===");
    log::info!("Meter URL:     {}", config.meter.url);
    log::info!("Hub URL:       {}", config.hub.url);
    log::info!("Poll interval: {}s", config.poll_interval_seconds);
    log::info!(
        "Value window:  {:02}:00-{:02}:00 | load {:.1} kW | threshold {} kW",
        config.value_window.start_hour,
        config.value_window.end_hour,
        config.load_current_kw,
        config.switching_threshold_kw,
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[Loop] {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: configuration::config::Config) -> Result<(), error::StartupError> {
    let hub_client   = build_hub_client(&config.hub)?;
    let meter_client = build_meter_client(&config.meter)?;

    let switch   = SwitchActuator::new(hub_client.clone(), config.hub.clone(), config.charger.clone());
    let gateway  = GatewayRecovery::new(hub_client, config.hub.clone(), &config.gateway);
    let notifier = Mailer::new(&config.mail, config.switching_threshold_kw)?;

    // Step 1: gateway powered, charger off.
    let mode = scheduler::establish_startup_state(&switch, &gateway, &notifier, &config.startup).await?;

    // Step 2: let the gateway boot before talking to it.
    log::info!("[Loop] Waiting {:?} before reading the meter to allow the gateway to boot up...", gateway.boot_delay());
    sleep(gateway.boot_delay()).await;

    // Step 3: meter address, fixed for the life of the process.
    let mac_id = scheduler::resolve_meter_address(&meter_client, &config.meter, config.poll_interval()).await;
    let meter  = MeterClient::new(meter_client, config.meter.clone(), mac_id);
    log::info!("[Loop] Reading meter {}", meter.mac_id());

    let engine = DecisionEngine::new(meter, switch, gateway, notifier, Policy::from_config(&config))
        .with_mode(mode)
        .with_value_window_reads(config.meter.read_in_value_window);

    scheduler::run(engine, config.poll_interval()).await;
    Ok(())
}
