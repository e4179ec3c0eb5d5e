use std::{
    fmt::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::{
    config::BrokerAddress,
    pipeline::{BusError, Publisher},
};

pub const KEEP_ALIVE: Duration = Duration::from_secs(2);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("connection to {broker} failed: {reason}")]
    Failed { broker: String, reason: String },
    #[error("broker {broker} refused the connection: {code:?}")]
    Refused { broker: String, code: ConnectReturnCode },
    #[error("no CONNACK from {broker} within {timeout:?}")]
    Timeout { broker: String, timeout: Duration },
}

/// `<prefix>-<12 hex chars>`, unique enough to tell concurrent instances apart.
pub fn client_id(prefix: &str) -> String {
    let bytes: [u8; 6] = rand::random();
    let mut id = String::with_capacity(prefix.len() + 13);
    id.push_str(prefix);
    id.push('-');
    for b in bytes {
        let _ = write!(id, "{b:02x}");
    }
    id
}

/// MQTT publisher delivering retained messages with QoS 1.
///
/// The event loop runs on a background task for the lifetime of the process;
/// after a connection loss the next poll reconnects. Publishing never waits:
/// it fails while the broker is unreachable or the request queue is full.
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    connected: Arc<AtomicBool>,
}

impl MqttPublisher {
    pub async fn connect(broker: &BrokerAddress, client_id: &str) -> Result<Self, ConnectError> {
        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut eventloop, broker))
            .await
            .map_err(|_| ConnectError::Timeout {
                broker: broker.to_string(),
                timeout: CONNECT_TIMEOUT,
            })??;

        tracing::info!(%broker, client_id, "connected to MQTT broker");
        Ok(Self::spawn(client, eventloop, true))
    }

    fn spawn(client: AsyncClient, eventloop: EventLoop, connected: bool) -> Self {
        let connected = Arc::new(AtomicBool::new(connected));
        tokio::spawn(drive(eventloop, connected.clone()));

        Self {
            client,
            qos: QoS::AtLeastOnce,
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop, broker: &BrokerAddress) -> Result<(), ConnectError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(ConnectError::Refused {
                    broker: broker.to_string(),
                    code: ack.code,
                });
            }
            Ok(_) => {}
            Err(e) => {
                return Err(ConnectError::Failed {
                    broker: broker.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

async fn drive(mut eventloop: EventLoop, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let ok = ack.code == ConnectReturnCode::Success;
                if ok {
                    tracing::info!("MQTT connection re-established");
                } else {
                    tracing::warn!(code = ?ack.code, "broker refused reconnect");
                }
                connected.store(ok, Ordering::Release);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::AcqRel) {
                    tracing::warn!(error = %e, "MQTT connection lost, reconnecting");
                } else {
                    tracing::debug!(error = %e, "MQTT reconnect failed");
                }
                metrics::counter!("smard_mqtt_connection_errors_total").increment(1);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait::async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError("not connected to MQTT broker".to_string()));
        }

        self.client
            .try_publish(topic, self.qos, retain, payload)
            .map_err(|e| BusError(e.to_string()))
    }
}
