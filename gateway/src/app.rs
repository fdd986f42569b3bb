use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use tokio::{net::TcpListener, sync::Mutex, time::Instant};
use tracing::{info, warn};

use crate::http::{self, AppState};
use crate::restart::RestartHandle;
use crate::sensor::SensorReader;
use crate::store::ConfigStore;
use crate::telemetry::Telemetry;
use crate::update::UpdateAgent;

/// Fixed sleep capping main-loop frequency.
const LOOP_TICK: Duration = Duration::from_millis(100);
const FATAL_BOOT_DELAY: Duration = Duration::from_secs(3);
const RESTART_DELAY: Duration = Duration::from_secs(1);
/// Clocks before this are treated as not yet synced (a device booting
/// without an RTC starts in 1970 until NTP catches up).
const CLOCK_SANITY_EPOCH: i64 = 1_700_000_000;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("airdry gateway starting");

    let data_dir = std::env::var("AIRDRY_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.airdry"));

    if let Err(err) = tokio::fs::create_dir_all(&data_dir).await {
        // Without storage there is nothing to run; bail so the
        // supervisor restarts us against a hopefully healthier disk.
        warn!("data directory init failed: {err}");
        tokio::time::sleep(FATAL_BOOT_DELAY).await;
        anyhow::bail!("failed to initialize data directory {}", data_dir.display());
    }

    let store = ConfigStore::new(&data_dir);
    let (config, loaded) = store.load().await;
    if !loaded {
        info!("running with default configuration");
    }

    if config.system.debug_mode {
        info!(
            device = %config.device.name,
            id = %config.device.id,
            broker = %config.mqtt.broker,
            base_topic = %config.mqtt.base_topic,
            "active configuration"
        );
    }

    if config.control.relay_pin > 0 {
        info!(pin = config.control.relay_pin, "relay output configured, defaulting off");
    }
    if config.control.has_speed_control && config.control.speed_control_pin > 0 {
        info!(
            pin = config.control.speed_control_pin,
            "speed control output configured, defaulting off"
        );
    }

    let telemetry = Telemetry::connect(&config.mqtt);
    if let Err(err) = telemetry.publish_status("online").await {
        warn!("status publish failed: {err:#}");
    }

    let restart = RestartHandle::new();
    let reader = Arc::new(Mutex::new(SensorReader::new(
        config.device.id.clone(),
        config.sensors.clone(),
    )));
    let mut updater = UpdateAgent::new(&data_dir);

    let state = AppState {
        config: Arc::new(Mutex::new(config)),
        store,
        reader,
        restart: restart.clone(),
    };

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = http::router(state.clone(), &web_root);

    let port = std::env::var("AIRDRY_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind admin server at {addr}"))?;
    info!("admin interface listening on http://{addr}");

    let serve_restart = restart.clone();
    let server = tokio::spawn(async move {
        let shutdown = async move { serve_restart.wait().await };
        if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            warn!("admin server error: {err}");
        }
    });

    main_loop(&state, &telemetry, &mut updater, &restart).await;

    // Let the admin server finish in-flight responses before the
    // process goes down.
    let _ = server.await;
    info!("gateway shut down for restart");
    Ok(())
}

async fn main_loop(
    state: &AppState,
    telemetry: &Telemetry,
    updater: &mut UpdateAgent,
    restart: &RestartHandle,
) {
    // Interval and flag changes only arrive through the admin write
    // path, which restarts the process, so one snapshot at boot is the
    // live value for this run.
    let (read_interval, reporting_interval, ota_enabled, debug_mode) = {
        let config = state.config.lock().await;
        (
            Duration::from_secs(config.system.read_interval.max(1)),
            Duration::from_secs(config.system.reporting_interval.max(1)),
            config.system.ota_enabled,
            config.system.debug_mode,
        )
    };

    let mut last_read = Instant::now();
    let mut last_report = Instant::now();
    let mut clock_synced = false;

    loop {
        tokio::select! {
            _ = restart.wait() => break,
            _ = tokio::time::sleep(LOOP_TICK) => {}
        }

        // NTP itself is the host's job; note when the clock becomes sane
        // so reading timestamps can be trusted.
        if !clock_synced && Utc::now().timestamp() >= CLOCK_SANITY_EPOCH {
            clock_synced = true;
            info!("system clock synchronized");
        }

        if ota_enabled {
            if let Some(applied) = updater.service().await {
                info!(
                    bytes = applied.bytes,
                    sha256 = %applied.sha256,
                    "update applied, restarting"
                );
                restart.schedule(RESTART_DELAY);
            }
        }

        if last_read.elapsed() < read_interval {
            continue;
        }
        last_read = Instant::now();

        let reading = {
            let mut reader = state.reader.lock().await;
            reader.read()
        };

        if debug_mode {
            info!(?reading, "sensor poll");
        }

        if last_report.elapsed() < reporting_interval {
            continue;
        }
        last_report = Instant::now();

        if telemetry.is_connected() {
            if let Err(err) = telemetry.publish_reading(&reading).await {
                warn!("telemetry publish failed: {err:#}");
            }
        } else {
            // No queueing: a reading produced while offline is dropped.
            warn!("broker link down, dropping reading");
        }
    }
}
