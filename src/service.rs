//! Network runtime: one InSim TCP session, one OutGauge UDP listener, and
//! the engine task that owns all signal state.

use crate::clock::Millis;
use crate::config::{AppConfig, OutGaugeConfig};
use crate::engine::{Input, SignalEngine};
use crate::intersection::ConfigurationError;
use crate::outgauge::OutGaugePacket;
use crate::protocol::{
    decode, packet_len, IncomingPacket, InitRequest, OutgoingPacket, PacketBuffer, ProtocolError,
    HEADER_SIZE, REQI_SEND_VERSION, SND_SILENT, SND_SYSMESSAGE, TINY_NONE,
};
use crate::signal::{LightBits, LightId};
use crate::sink::CommandSink;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, info, warn};

const OUTGOING_QUEUE_SIZE: usize = 256;
const INPUT_QUEUE_SIZE: usize = 256;
const OUTGAUGE_BUFFER_SIZE: usize = 256;

/// Shown once the OutGauge listener is up.
pub const CONNECTED_MESSAGE: &str = "Driving InSim Local connected";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("outgoing packet queue closed")]
    ChannelClosed,
}

/// Sink that encodes commands as InSim packets and queues them for the
/// writer task. Never blocks; a full or closed queue drops the packet.
#[derive(Debug, Clone)]
pub struct InSimSink {
    outgoing: mpsc::Sender<PacketBuffer>,
}

impl InSimSink {
    pub fn new(outgoing: mpsc::Sender<PacketBuffer>) -> Self {
        Self { outgoing }
    }

    fn queue(&self, packet: Result<OutgoingPacket, ProtocolError>) {
        queue_packet(&self.outgoing, packet);
    }
}

impl CommandSink for InSimSink {
    fn set_light_state(&mut self, light: LightId, bits: LightBits) {
        self.queue(Ok(OutgoingPacket::Lights { light, bits }));
    }

    fn send_text(&mut self, message: &str) {
        self.queue(OutgoingPacket::command(message));
    }

    fn show_message(&mut self, message: &str) {
        self.queue(OutgoingPacket::local_message(message, SND_SILENT));
    }
}

fn queue_packet(outgoing: &mpsc::Sender<PacketBuffer>, packet: Result<OutgoingPacket, ProtocolError>) {
    let encoded = packet.and_then(|packet| packet.encode());
    match encoded {
        Ok(bytes) => {
            if let Err(e) = outgoing.try_send(bytes) {
                warn!("Dropping outgoing packet: {}", e);
            }
        }
        Err(e) => warn!("Failed to encode outgoing packet: {}", e),
    }
}

/// Connects to the simulator and runs until the InSim connection closes or
/// Ctrl+C is pressed.
pub async fn run(config: AppConfig) -> Result<(), ServiceError> {
    let stream = TcpStream::connect((config.insim.host.as_str(), config.insim.port)).await?;
    info!("InSim connected to {}:{}", config.insim.host, config.insim.port);

    let (reader, writer) = stream.into_split();
    let (packet_tx, packet_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE_SIZE);

    let init = OutgoingPacket::Init(InitRequest::new(&config.insim.admin, &config.insim.name)?).encode()?;
    packet_tx
        .send(init)
        .await
        .map_err(|_| ServiceError::ChannelClosed)?;

    let writer_task = tokio::spawn(write_packets(writer, packet_rx));
    let mut reader_task = tokio::spawn(read_packets(
        reader,
        input_tx,
        packet_tx.clone(),
        config.outgauge.clone(),
    ));

    let start = Instant::now();
    let mut engine = SignalEngine::from_config(&config, InSimSink::new(packet_tx), 0)?;

    tokio::select! {
        _ = drive(&mut engine, input_rx, start) => {
            info!("Input channel closed");
        }
        result = &mut reader_task => {
            match result {
                Ok(Ok(())) => info!("InSim disconnected"),
                Ok(Err(e)) => error!("InSim connection error: {}", e),
                Err(e) => error!("InSim reader task failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    let state = engine.get_state();
    info!(
        telemetry = state.telemetry_count,
        announcements = state.announcements,
        timers_fired = state.timers_fired,
        "Engine stopped"
    );

    reader_task.abort();
    writer_task.abort();
    Ok(())
}

/// Feeds inputs into the engine and wakes it for its next timer. Returns
/// when every input sender is gone.
pub async fn drive<S: CommandSink>(
    engine: &mut SignalEngine<S>,
    mut inputs: mpsc::Receiver<Input>,
    start: Instant,
) {
    loop {
        let deadline = engine.next_deadline();

        tokio::select! {
            input = inputs.recv() => match input {
                Some(input) => engine.handle(input, elapsed_ms(start)),
                None => break,
            },
            _ = sleep_until_deadline(start, deadline) => {
                engine.advance_to(elapsed_ms(start));
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> Millis {
    start.elapsed().as_millis() as Millis
}

async fn sleep_until_deadline(start: Instant, deadline: Option<Millis>) {
    match deadline {
        Some(ms) => time::sleep_until(start + Duration::from_millis(ms)).await,
        None => std::future::pending::<()>().await,
    }
}

async fn write_packets(mut writer: OwnedWriteHalf, mut packets: mpsc::Receiver<PacketBuffer>) {
    while let Some(packet) = packets.recv().await {
        if let Err(e) = writer.write_all(&packet).await {
            warn!("Failed to send InSim packet: {}", e);
            break;
        }
    }
}

async fn read_packets(
    mut reader: OwnedReadHalf,
    inputs: mpsc::Sender<Input>,
    outgoing: mpsc::Sender<PacketBuffer>,
    outgauge: OutGaugeConfig,
) -> Result<(), ServiceError> {
    let mut outgauge_task: Option<JoinHandle<()>> = None;
    let mut header = [0u8; HEADER_SIZE];

    let result = loop {
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break Ok(()),
            Err(e) => break Err(e.into()),
        }

        // A zero size byte leaves no way to find the next header
        let len = packet_len(header[0]);
        if len < HEADER_SIZE {
            break Err(ProtocolError::ZeroSize.into());
        }

        let mut frame = vec![0u8; len];
        frame[..HEADER_SIZE].copy_from_slice(&header);
        if let Err(e) = reader.read_exact(&mut frame[HEADER_SIZE..]).await {
            break Err(e.into());
        }

        let packet = match decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping malformed InSim packet: {}", e);
                continue;
            }
        };

        match packet {
            IncomingPacket::Version {
                request_id,
                version,
                product,
                insim_version,
            } => {
                if request_id != REQI_SEND_VERSION {
                    continue;
                }
                info!("Connected to LFS {} {} (InSim {})", product, version, insim_version);

                if outgauge_task.is_none() {
                    outgauge_task = Some(tokio::spawn(listen_outgauge(
                        outgauge.clone(),
                        inputs.clone(),
                        outgoing.clone(),
                    )));
                }
            }
            IncomingPacket::Tiny { subtype, .. } if subtype == TINY_NONE => {
                queue_packet(&outgoing, Ok(OutgoingPacket::keep_alive()));
            }
            IncomingPacket::HiddenMessage { text, .. } => {
                if inputs.send(Input::HiddenMessage(text)).await.is_err() {
                    break Ok(());
                }
            }
            IncomingPacket::PlayerLeft { player } => {
                if inputs.send(Input::PlayerLeft(player)).await.is_err() {
                    break Ok(());
                }
            }
            other => debug!(?other, "ignoring InSim packet"),
        }
    };

    if let Some(task) = outgauge_task {
        task.abort();
    }
    result
}

async fn listen_outgauge(
    config: OutGaugeConfig,
    inputs: mpsc::Sender<Input>,
    outgoing: mpsc::Sender<PacketBuffer>,
) {
    if let Err(e) = receive_outgauge(config, inputs, outgoing).await {
        error!("OutGauge listener error: {}", e);
    }
}

async fn receive_outgauge(
    config: OutGaugeConfig,
    inputs: mpsc::Sender<Input>,
    outgoing: mpsc::Sender<PacketBuffer>,
) -> Result<(), ServiceError> {
    let socket = UdpSocket::bind((config.host.as_str(), config.port)).await?;
    info!("OutGauge listening on {}", socket.local_addr()?);
    queue_packet(
        &outgoing,
        OutgoingPacket::local_message(CONNECTED_MESSAGE, SND_SYSMESSAGE),
    );

    let mut buf = [0u8; OUTGAUGE_BUFFER_SIZE];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;

        match OutGaugePacket::decode(&buf[..len]) {
            Ok(packet) => {
                if inputs.send(Input::Telemetry(packet.sample())).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => warn!("Dropping OutGauge datagram from {}: {}", peer, e),
        }
    }
}
