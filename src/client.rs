//! High-level [`Sds011`] client.
//!
//! Thin typed wrappers over the protocol engine: each operation submits one
//! command and decodes the raw reply payload into its typed result.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::engine::{Directive, Engine, ReplyPayload, Submission};
use crate::error::{Error, Result};
use crate::protocol::{CommandCode, Mode};
use crate::transport::{self, SerialConfig};
use crate::types::{Sample, Version};

/// Maximum supported cycle interval in minutes.
const MAX_CYCLE_MINUTES: u8 = 30;

/// Client for an SDS011 particulate matter sensor.
///
/// The client owns a background engine task that serializes commands onto
/// the wire, correlates replies and retries unconfirmed commands. Dropping
/// the client closes the directive channel, which shuts the engine down;
/// use [`shutdown`](Self::shutdown) to observe a fatal transport error.
///
/// # Example
///
/// ```no_run
/// use sds011::Sds011;
///
/// #[tokio::main]
/// async fn main() -> Result<(), sds011::Error> {
///     let sensor = Sds011::open("/dev/ttyUSB0").await?;
///
///     // Readings arrive as broadcasts; deduplicate in the observer if the
///     // device repeats unchanged values.
///     sensor.register_sample_observer(|sample| {
///         println!("PM2.5 {:.1}, PM10 {:.1}", sample.pm2_5, sample.pm10);
///     });
///
///     sensor.set_work_state(true).await?;
///     sensor.set_cycle_interval(5).await?;
///     Ok(())
/// }
/// ```
pub struct Sds011 {
    directives: mpsc::UnboundedSender<Directive>,
    engine: JoinHandle<Result<()>>,
}

impl Sds011 {
    /// Opens the serial port with default settings (9600 baud, no flow
    /// control) and starts the engine.
    pub async fn open(port: impl Into<String>) -> Result<Self> {
        Self::with_serial_config(SerialConfig::new(port)).await
    }

    /// Opens the serial port described by `config` and starts the engine.
    pub async fn with_serial_config(config: SerialConfig) -> Result<Self> {
        let stream = transport::open(&config)?;
        Ok(Self::new(stream))
    }

    /// Starts the engine on an already-open duplex byte stream.
    ///
    /// Must be called from within a Tokio runtime. Queries the firmware
    /// version once as a liveness probe; the result is logged only and does
    /// not gate other operations.
    #[must_use]
    pub fn new<T>(stream: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (directives, rx) = mpsc::unbounded_channel();
        let engine = tokio::spawn(Engine::new(stream, rx).run());

        if let Ok(probe) = Self::submit(&directives, CommandCode::Firmware, Mode::Get, false, 0) {
            tokio::spawn(async move {
                match probe.await {
                    Ok(Ok(payload)) => {
                        tracing::debug!("firmware: {}", Version::from_payload(&payload));
                    }
                    Ok(Err(e)) => tracing::warn!("failed to check version: {e}"),
                    Err(_) => {}
                }
            });
        }

        Self { directives, engine }
    }

    /// Registers the callback invoked once per validated sample broadcast.
    ///
    /// There is a single observer slot; registering again replaces the
    /// previous callback. No deduplication is performed: the device may
    /// repeat unchanged readings, and any "ignore unchanged" policy belongs
    /// to the caller.
    pub fn register_sample_observer(&self, observer: impl FnMut(Sample) + Send + 'static) {
        if self
            .directives
            .send(Directive::Observe(Box::new(observer)))
            .is_err()
        {
            tracing::debug!("engine gone, sample observer dropped");
        }
    }

    /// Reads the reporting mode. Returns `true` when the sensor is in
    /// passive (query) mode, `false` when it pushes readings actively.
    pub async fn report_mode(&self) -> Result<bool> {
        let payload = self
            .request(CommandCode::ReportMode, Mode::Get, true, 0)
            .await?;
        Ok(payload[2] != 0)
    }

    /// Sets the reporting mode. Returns the mode echoed by the sensor.
    pub async fn set_report_mode(&self, passive: bool) -> Result<bool> {
        let payload = self
            .request(CommandCode::ReportMode, Mode::Set, true, u8::from(passive))
            .await?;
        Ok(payload[2] != 0)
    }

    /// Reads the working state. Returns `true` when the sensor is measuring,
    /// `false` when it is sleeping.
    pub async fn work_state(&self) -> Result<bool> {
        let payload = self
            .request(CommandCode::WorkState, Mode::Get, true, 0)
            .await?;
        Ok(payload[2] != 0)
    }

    /// Sets the working state. Returns the state echoed by the sensor.
    pub async fn set_work_state(&self, active: bool) -> Result<bool> {
        tracing::debug!("{}", if active { "starting" } else { "stopping" });
        let payload = self
            .request(CommandCode::WorkState, Mode::Set, true, u8::from(active))
            .await?;
        Ok(payload[2] != 0)
    }

    /// Reads the cycle interval in minutes (0 = continuous reporting).
    pub async fn cycle_interval(&self) -> Result<u8> {
        let payload = self.request(CommandCode::Cycle, Mode::Get, true, 0).await?;
        Ok(payload[2])
    }

    /// Sets the cycle interval: minutes between automatic readings in active
    /// mode, 0 for continuous reporting. Returns the interval echoed by the
    /// sensor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCycleInterval`] for intervals above 30
    /// minutes, the device's maximum.
    pub async fn set_cycle_interval(&self, minutes: u8) -> Result<u8> {
        if minutes > MAX_CYCLE_MINUTES {
            return Err(Error::InvalidCycleInterval { minutes });
        }
        tracing::debug!("setting cycle interval to {minutes} min");
        let payload = self
            .request(CommandCode::Cycle, Mode::Set, true, minutes)
            .await?;
        Ok(payload[2])
    }

    /// Queries the firmware version.
    pub async fn firmware_version(&self) -> Result<Version> {
        let payload = self
            .request(CommandCode::Firmware, Mode::Get, false, 0)
            .await?;
        Ok(Version::from_payload(&payload))
    }

    /// Requests a one-shot reading.
    ///
    /// The sensor answers with a Sample broadcast rather than an explicit
    /// reply; the next sample confirms the poll implicitly and is delivered
    /// through the sample observer.
    pub async fn poll(&self) -> Result<()> {
        self.request(CommandCode::Query, Mode::Get, false, 0)
            .await?;
        Ok(())
    }

    /// Closes the directive channel and waits for the engine to finish,
    /// surfacing a fatal transport error if one terminated it.
    pub async fn shutdown(self) -> Result<()> {
        let Self { directives, engine } = self;
        drop(directives);
        engine.await.map_err(|_| Error::Shutdown)?
    }

    /// Submits a command and waits for its raw reply payload.
    async fn request(
        &self,
        command: CommandCode,
        mode: Mode,
        has_mode: bool,
        payload: u8,
    ) -> Result<ReplyPayload> {
        let reply = Self::submit(&self.directives, command, mode, has_mode, payload)?;
        reply.await.map_err(|_| Error::Superseded)?
    }

    fn submit(
        directives: &mpsc::UnboundedSender<Directive>,
        command: CommandCode,
        mode: Mode,
        has_mode: bool,
        payload: u8,
    ) -> Result<oneshot::Receiver<Result<ReplyPayload>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        directives
            .send(Directive::Submit(Submission {
                command,
                mode,
                has_mode,
                payload,
                reply_tx,
            }))
            .map_err(|_| Error::Shutdown)?;
        Ok(reply_rx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::protocol::frame::{
        COMMAND_FRAME_LEN, MARKER, REPLY_TYPE, SAMPLE_TYPE, TAIL_MARKER, checksum,
    };

    fn reply_frame(payload: [u8; 6]) -> Vec<u8> {
        let mut bytes = vec![MARKER, REPLY_TYPE];
        bytes.extend_from_slice(&payload);
        bytes.push(checksum(&bytes[1..]));
        bytes.push(TAIL_MARKER);
        bytes
    }

    fn sample_frame() -> Vec<u8> {
        let mut bytes = vec![MARKER, SAMPLE_TYPE, 0x0A, 0x00, 0x14, 0x00, 0xAB, 0xCD];
        bytes.push(checksum(&bytes[1..]));
        bytes.push(TAIL_MARKER);
        bytes
    }

    /// Answers the firmware probe the constructor always sends first.
    async fn answer_probe(device: &mut DuplexStream) {
        let mut wire = [0u8; COMMAND_FRAME_LEN];
        device.read_exact(&mut wire).await.unwrap();
        assert_eq!(wire[2], u8::from(CommandCode::Firmware));
        device
            .write_all(&reply_frame([7, 18, 11, 16, 0xAB, 0xCD]))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_work_state() {
        let (stream, mut device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);
        answer_probe(&mut device).await;

        let (result, ()) = tokio::join!(sensor.set_work_state(true), async {
            let mut wire = [0u8; COMMAND_FRAME_LEN];
            device.read_exact(&mut wire).await.unwrap();
            assert_eq!(wire[2], u8::from(CommandCode::WorkState));
            assert_eq!(wire[3], u8::from(Mode::Set));
            assert_eq!(wire[4], 1);
            device
                .write_all(&reply_frame([6, 1, 1, 0, 0xAB, 0xCD]))
                .await
                .unwrap();
        });

        assert!(result.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_firmware_version() {
        let (stream, mut device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);
        answer_probe(&mut device).await;

        let (result, ()) = tokio::join!(sensor.firmware_version(), async {
            answer_probe(&mut device).await;
        });

        assert_eq!(
            result.unwrap(),
            Version {
                year: 18,
                month: 11,
                day: 16
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_interval_roundtrip() {
        let (stream, mut device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);
        answer_probe(&mut device).await;

        let (result, ()) = tokio::join!(sensor.set_cycle_interval(5), async {
            let mut wire = [0u8; COMMAND_FRAME_LEN];
            device.read_exact(&mut wire).await.unwrap();
            assert_eq!(wire[2], u8::from(CommandCode::Cycle));
            assert_eq!(wire[4], 5);
            device
                .write_all(&reply_frame([8, 1, 5, 0, 0xAB, 0xCD]))
                .await
                .unwrap();
        });

        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_cycle_interval_out_of_range() {
        let (stream, _device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);

        let err = sensor.set_cycle_interval(31).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCycleInterval { minutes: 31 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_and_observer() {
        let (stream, mut device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);
        answer_probe(&mut device).await;

        let samples = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&samples);
        sensor.register_sample_observer(move |sample| {
            assert!((sample.pm2_5 - 1.0).abs() < f32::EPSILON);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (result, ()) = tokio::join!(sensor.poll(), async {
            let mut wire = [0u8; COMMAND_FRAME_LEN];
            device.read_exact(&mut wire).await.unwrap();
            assert_eq!(wire[2], u8::from(CommandCode::Query));
            device.write_all(&sample_frame()).await.unwrap();
        });

        result.unwrap();
        assert_eq!(samples.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_clean() {
        let (stream, mut device) = tokio::io::duplex(512);
        let sensor = Sds011::new(stream);
        answer_probe(&mut device).await;

        sensor.shutdown().await.unwrap();
    }
}
