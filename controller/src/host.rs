use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use light_timer_common::{
    parse_brightness_payload, parse_on_payload, AccessoryAction, ChangeReason, LightTimer,
    LightTimerStatePayload, OutputSwitch, RuntimeConfig, TimerConfig, TOPIC_CMD_BRIGHTNESS,
    TOPIC_CMD_ON, TOPIC_LIGHT_TIMER_STATE,
};

use crate::relay::RelayOutput;

type Accessory = LightTimer<OutputSwitch<RelayOutput>>;

const MAX_MQTT_PAYLOAD_BYTES: usize = 64;
const POLL_INTERVAL_MS: u64 = 200;

#[derive(Clone)]
struct AppState {
    accessory: Arc<Mutex<Accessory>>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StateMessage {
    #[serde(flatten)]
    state: LightTimerStatePayload,
    timestamp: i64,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();

    let base = OutputSwitch::new(RelayOutput::default(), runtime.switch.clone());
    let mut accessory = LightTimer::new(base, runtime.timer.clone());
    accessory.init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new(
        format!("light-timer-{}", runtime.switch.id),
        mqtt_host,
        mqtt_port,
    );
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        accessory: Arc::new(Mutex::new(accessory)),
        mqtt,
        store,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_poll_loop(app_state.clone());
    execute_accessory_actions(&app_state, vec![AccessoryAction::Notify]).await;

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/on", post(handle_set_on))
        .route("/api/brightness", post(handle_set_brightness))
        .route(
            "/api/config",
            get(handle_get_config).put(handle_put_config),
        )
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("light timer listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_CMD_ON, TOPIC_CMD_BRIGHTNESS] {
        mqtt.subscribe(topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Single cooperative driver for countdown expiry and the refresh tick.
fn spawn_poll_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));

        loop {
            interval.tick().await;

            let actions = {
                let mut accessory = app_state.accessory.lock().await;
                accessory.poll(monotonic_ms())
            };

            if !actions.is_empty() {
                execute_accessory_actions(&app_state, actions).await;
            }
        }
    });
}

async fn execute_accessory_actions(app_state: &AppState, actions: Vec<AccessoryAction>) {
    for action in actions {
        match action {
            AccessoryAction::Notify => {
                if let Err(err) = publish_state(app_state).await {
                    warn!("light timer state publish failed: {err:#}");
                }
            }
            AccessoryAction::OutputChanged { on, reason } => {
                let switch_count = {
                    let accessory = app_state.accessory.lock().await;
                    accessory.base().output().switch_count()
                };
                info!("output changed to {on} ({reason}), relay switches: {switch_count}");
                if let Err(err) = persist_runtime_from_state(app_state).await {
                    warn!("failed to persist switch state: {err:#}");
                }
            }
        }
    }
}

/// Snapshots and queues under the accessory lock so concurrent publishers
/// enqueue in snapshot order. `try_publish` never waits on the MQTT loop,
/// which itself needs the lock to handle commands.
async fn publish_state(app_state: &AppState) -> anyhow::Result<()> {
    let accessory = app_state.accessory.lock().await;
    let body = serde_json::to_vec(&state_message(accessory.state_payload(monotonic_ms())))
        .context("light timer state serialization failed")?;

    app_state
        .mqtt
        .try_publish(TOPIC_LIGHT_TIMER_STATE, QoS::AtLeastOnce, true, body)
        .context("light timer state could not be queued")?;
    drop(accessory);
    Ok(())
}

fn state_message(state: LightTimerStatePayload) -> StateMessage {
    StateMessage {
        state,
        timestamp: Utc::now().timestamp(),
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    let actions = match topic.as_str() {
        TOPIC_CMD_ON => {
            let value = parse_on_payload(&message)?;
            let mut accessory = app_state.accessory.lock().await;
            accessory.write_on(value, ChangeReason::Mqtt, now_ms)
        }
        TOPIC_CMD_BRIGHTNESS => {
            let value = parse_brightness_payload(&message)?;
            let mut accessory = app_state.accessory.lock().await;
            accessory.write_brightness(value, ChangeReason::Mqtt, now_ms)
        }
        _ => Vec::new(),
    };

    execute_accessory_actions(app_state, actions).await;
    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = {
        let accessory = state.accessory.lock().await;
        accessory.status(monotonic_ms())
    };
    Json(status)
}

async fn handle_set_on(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let value = match parse_on_payload(value) {
        Ok(value) => value,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let actions = {
        let mut accessory = state.accessory.lock().await;
        accessory.write_on(value, ChangeReason::Http, monotonic_ms())
    };
    execute_accessory_actions(&state, actions).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_brightness(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let value = match parse_brightness_payload(value) {
        Ok(value) => value,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let actions = {
        let mut accessory = state.accessory.lock().await;
        accessory.write_brightness(value, ChangeReason::Http, monotonic_ms())
    };
    execute_accessory_actions(&state, actions).await;

    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.accessory.lock().await.timer_config().clone();
    Json(config)
}

async fn handle_put_config(
    State(state): State<AppState>,
    Json(update): Json<TimerConfig>,
) -> impl IntoResponse {
    let actions = {
        let mut accessory = state.accessory.lock().await;
        accessory.set_timer_config(update)
    };

    if let Err(err) = persist_runtime_from_state(&state).await {
        warn!("failed to persist timer config update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist timer settings",
        );
    }
    execute_accessory_actions(&state, actions).await;

    handle_get_config(State(state)).await.into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("LIGHT_TIMER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.light-timer"));

        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

async fn persist_runtime_from_state(state: &AppState) -> anyhow::Result<()> {
    let (switch, timer) = {
        let accessory = state.accessory.lock().await;
        (
            accessory.switch_config().clone(),
            accessory.timer_config().clone(),
        )
    };

    let mut runtime = state.store.load_runtime_config().await?;
    runtime.switch = switch;
    runtime.timer = timer;
    state.store.save_runtime_config(&runtime).await
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_message_flattens_payload() {
        let message = state_message(LightTimerStatePayload {
            on: true,
            brightness: 42,
            mode: "COUNTING_DOWN",
            remaining_secs: 410,
        });

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["on"], true);
        assert_eq!(value["brightness"], 42);
        assert_eq!(value["mode"], "COUNTING_DOWN");
        assert_eq!(value["remainingSecs"], 410);
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let first = monotonic_ms();
        let second = monotonic_ms();
        assert!(second >= first);
    }

    fn app_state_with_queue(capacity: usize) -> (AppState, rumqttc::EventLoop) {
        let mut accessory = LightTimer::new(
            OutputSwitch::new(RelayOutput::default(), Default::default()),
            TimerConfig {
                rate: 10,
                ..TimerConfig::default()
            },
        );
        accessory.init();
        let (mqtt, eventloop) =
            AsyncClient::new(MqttOptions::new("light-timer-test", "127.0.0.1", 1883), capacity);
        let dir = std::env::temp_dir().join(format!("light-timer-publish-{}", std::process::id()));
        let app_state = AppState {
            accessory: Arc::new(Mutex::new(accessory)),
            mqtt,
            store: AppStore::at(dir),
        };
        (app_state, eventloop)
    }

    #[tokio::test]
    async fn publish_queues_without_waiting_on_mqtt_loop() {
        let (app_state, _eventloop) = app_state_with_queue(2);

        publish_state(&app_state).await.unwrap();
        publish_state(&app_state).await.unwrap();
        // Nobody drains the queue; a full queue is an error, not a stall.
        assert!(publish_state(&app_state).await.is_err());

        // The accessory lock is released on every path.
        assert!(app_state.accessory.try_lock().is_ok());
    }

    #[tokio::test]
    async fn store_round_trips_runtime_config() {
        let dir = std::env::temp_dir().join(format!("light-timer-store-{}", std::process::id()));
        let store = AppStore::at(dir.clone());

        let missing = store.load_runtime_config().await.unwrap();
        assert_eq!(missing.timer, TimerConfig::default());

        let mut runtime = RuntimeConfig::default();
        runtime.switch.state = true;
        runtime.timer.rate = 30;
        runtime.timer.start_value = 40;
        store.save_runtime_config(&runtime).await.unwrap();

        let loaded = store.load_runtime_config().await.unwrap();
        assert!(loaded.switch.state);
        assert_eq!(loaded.timer, runtime.timer);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn store_keeps_raw_out_of_range_values_until_sanitized() {
        let dir = std::env::temp_dir().join(format!("light-timer-raw-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("runtime.json"),
            br#"{"timer":{"rate":-3,"step":0,"always_on_enabled":4,"start_value":150}}"#,
        )
        .await
        .unwrap();

        let store = AppStore::at(dir.clone());
        let mut runtime = store.load_runtime_config().await.unwrap();
        assert_eq!(runtime.timer.rate, -3);

        runtime.sanitize();
        assert_eq!(
            runtime.timer,
            TimerConfig {
                rate: 0,
                step: 1,
                always_on_enabled: 0,
                start_value: 100,
            }
        );

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
