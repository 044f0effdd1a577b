//! Capture worker: reads raw samples, converts and demodulates them, and
//! hands frames to a sink
//!
//! The worker owns a rolling capture buffer. Each read appends to it, the
//! demodulator reports how many leading samples it is done with, and the
//! unconsumed tail slides to the front for the next pass. Across the whole
//! run `bytes_read == bytes_consumed + bytes_used` holds between iterations.

use crossbeam_channel::Sender;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::demod::{Demodulator, Frame, BYTES_PER_SAMPLE};
use crate::config::Config;
use crate::error::CaptureError;

/// Reads are issued in multiples of this many bytes
pub const MIN_READ_UNIT: usize = 512;

/// Interval between throughput log lines
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Blocking source of raw I/Q bytes
pub trait SampleSource: Send {
    /// Read into `buf`. `Ok(0)` means the stream has ended.
    fn read_samples(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Receives every frame the demodulator produces
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: Frame);
}

/// State shared between the lifecycle and the capture worker
#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    shutdown: Arc<AtomicBool>,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to stop after its current read
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Receiver lifecycle, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    DeviceOpen,
    Streaming,
    ShuttingDown,
    Closed,
}

impl PipelineState {
    pub fn advance(&mut self, next: PipelineState) {
        info!("Pipeline state: {} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DeviceOpen => "device open",
            Self::Streaming => "streaming",
            Self::ShuttingDown => "shutting down",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Worker tuning
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Capture buffer size in bytes
    pub buffer_bytes: usize,
    /// Consecutive failed reads tolerated
    pub max_read_retries: u32,
    /// Backoff step; the n-th consecutive failure waits n steps
    pub retry_backoff: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            buffer_bytes: config.capture_buffer_bytes,
            max_read_retries: config.read_retry_limit.max(1),
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Counters for one worker run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub bytes_read: u64,
    /// Bytes the demodulator finished with, plus forced discards
    pub bytes_consumed: u64,
    /// Bytes dropped by forced compaction
    pub bytes_discarded: u64,
    /// Bytes still held in the buffer
    pub bytes_buffered: u64,
    pub frames: u64,
    pub read_failures: u64,
}

/// Rolling capture buffer with its converted-sample shadow
pub struct SampleBuffer {
    raw: Vec<u8>,
    samples: Vec<u16>,
    /// Valid bytes at the front of `raw`
    bytes_used: usize,
    /// Leading samples already converted (always `bytes_used / 2`)
    converted: usize,
    /// Absolute index of `samples[0]`
    offset: u64,
}

impl SampleBuffer {
    /// Capacity is rounded down to whole samples and holds at least two
    /// read units.
    pub fn new(capacity: usize) -> Self {
        let capacity = (capacity.max(2 * MIN_READ_UNIT) / BYTES_PER_SAMPLE) * BYTES_PER_SAMPLE;
        Self {
            raw: vec![0u8; capacity],
            samples: vec![0u16; capacity / BYTES_PER_SAMPLE],
            bytes_used: 0,
            converted: 0,
            offset: 0,
        }
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Largest whole number of read units that fits the free space
    pub fn read_len(&self) -> usize {
        (self.raw.len() - self.bytes_used) / MIN_READ_UNIT * MIN_READ_UNIT
    }

    /// Free space for the next read
    pub fn spare(&mut self, len: usize) -> &mut [u8] {
        &mut self.raw[self.bytes_used..self.bytes_used + len]
    }

    /// Drop the oldest read unit to make room. Returns the bytes dropped.
    pub fn force_compaction(&mut self) -> usize {
        let drop_bytes = MIN_READ_UNIT.min(self.bytes_used);
        self.discard_front(drop_bytes / BYTES_PER_SAMPLE);
        drop_bytes
    }

    /// Account for `n` freshly read bytes and convert every sample they
    /// complete.
    pub fn commit(&mut self, n: usize, demod: &dyn Demodulator) {
        self.bytes_used += n;
        let complete = self.bytes_used / BYTES_PER_SAMPLE;
        if complete > self.converted {
            let raw = &self.raw[self.converted * BYTES_PER_SAMPLE..complete * BYTES_PER_SAMPLE];
            demod.convert(raw, &mut self.samples[self.converted..complete]);
            self.converted = complete;
        }
    }

    /// Run the demodulator over every converted sample and slide the
    /// unconsumed tail to the front. Returns samples consumed.
    pub fn process(&mut self, demod: &mut dyn Demodulator, sink: &mut dyn FnMut(Frame)) -> usize {
        let consumed = demod
            .process(&self.samples[..self.converted], self.offset, sink)
            .min(self.converted);
        self.discard_front(consumed);
        consumed
    }

    fn discard_front(&mut self, samples: usize) {
        let bytes = samples * BYTES_PER_SAMPLE;
        self.raw.copy_within(bytes..self.bytes_used, 0);
        self.samples.copy_within(samples..self.converted, 0);
        self.bytes_used -= bytes;
        self.converted -= samples;
        self.offset += samples as u64;
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Capture loop. Runs until the shutdown flag is seen or the stream ends.
pub fn run_worker(
    source: &mut dyn SampleSource,
    demod: &mut dyn Demodulator,
    sink: &mut dyn FrameSink,
    ctx: &CaptureContext,
    settings: &WorkerSettings,
) -> Result<PipelineStats, CaptureError> {
    let mut buffer = SampleBuffer::new(settings.buffer_bytes);
    let mut stats = PipelineStats::default();
    let mut consecutive_failures = 0u32;
    let mut first_data = true;
    let mut last_stats_time = Instant::now();
    let mut last_bytes_read = 0u64;

    while !ctx.is_shutdown() {
        let mut read_len = buffer.read_len();
        if read_len == 0 {
            let dropped = buffer.force_compaction() as u64;
            stats.bytes_consumed += dropped;
            stats.bytes_discarded += dropped;
            warn!(
                "Capture buffer full, discarded {} unconsumed bytes at sample {}",
                dropped,
                buffer.offset()
            );
            read_len = buffer.read_len();
        }

        match source.read_samples(buffer.spare(read_len)) {
            Ok(0) => {
                info!("Sample stream ended");
                break;
            }
            Ok(n) => {
                let n = n.min(read_len);
                consecutive_failures = 0;
                if first_data {
                    info!("First IQ data received ({} bytes)", n);
                    first_data = false;
                }

                stats.bytes_read += n as u64;
                buffer.commit(n, demod);

                let mut frames = 0u64;
                let consumed = buffer.process(demod, &mut |frame| {
                    frames += 1;
                    sink.deliver(frame);
                });
                stats.frames += frames;
                stats.bytes_consumed += (consumed * BYTES_PER_SAMPLE) as u64;
            }
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                consecutive_failures += 1;
                stats.read_failures += 1;
                if consecutive_failures >= settings.max_read_retries {
                    return Err(CaptureError::HardwareRead {
                        attempts: consecutive_failures,
                        source: e,
                    });
                }
                warn!(
                    "Sample read failed ({}/{}): {}",
                    consecutive_failures, settings.max_read_retries, e
                );
                if !ctx.is_shutdown() {
                    thread::sleep(settings.retry_backoff * consecutive_failures);
                }
            }
        }

        stats.bytes_buffered = buffer.bytes_used() as u64;
        debug_assert_eq!(stats.bytes_read, stats.bytes_consumed + stats.bytes_buffered);

        if last_stats_time.elapsed() >= STATS_LOG_INTERVAL {
            let elapsed = last_stats_time.elapsed().as_secs_f64();
            let rate = (stats.bytes_read - last_bytes_read) as f64 / BYTES_PER_SAMPLE as f64 / elapsed;
            info!(
                "[SDR Stats] Rate: {:.2} MSPS | Frames: {} | Discarded: {} bytes | Read failures: {}",
                rate / 1_000_000.0,
                stats.frames,
                stats.bytes_discarded,
                stats.read_failures
            );
            demod.log_stats();
            last_stats_time = Instant::now();
            last_bytes_read = stats.bytes_read;
        }
    }

    stats.bytes_buffered = buffer.bytes_used() as u64;
    debug!("Capture worker exiting: {:?}", stats);
    demod.log_stats();
    Ok(stats)
}

/// Start the capture worker on its own thread. `done` is signalled when the
/// worker returns, whatever the reason.
pub fn spawn_worker(
    mut source: Box<dyn SampleSource>,
    mut demod: Box<dyn Demodulator>,
    mut sink: Box<dyn FrameSink>,
    ctx: CaptureContext,
    settings: WorkerSettings,
    done: Sender<()>,
) -> Result<JoinHandle<Result<PipelineStats, CaptureError>>, CaptureError> {
    thread::Builder::new()
        .name("sdr-capture".to_string())
        .spawn(move || {
            let result = run_worker(source.as_mut(), demod.as_mut(), sink.as_mut(), &ctx, &settings);
            let _ = done.send(());
            result
        })
        .map_err(CaptureError::ThreadCreate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdr::demod::{AdsbFrame, UplinkFrame};
    use crate::sdr::detect::{tests::synthesize, ModeSDemodulator};
    use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Replays a script of reads, then reports end of stream
    struct ScriptedSource {
        script: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<io::Result<Vec<u8>>>) -> Self {
            Self { script: script.into() }
        }

        fn chunks(data: &[u8], sizes: &[usize]) -> Self {
            let mut script = Vec::new();
            let mut pos = 0;
            for &size in sizes.iter().cycle() {
                if pos >= data.len() {
                    break;
                }
                let end = (pos + size).min(data.len());
                script.push(Ok(data[pos..end].to_vec()));
                pos = end;
            }
            Self::new(script)
        }
    }

    impl SampleSource for ScriptedSource {
        fn read_samples(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(mut chunk)) => {
                    if chunk.len() > buf.len() {
                        let rest = chunk.split_off(buf.len());
                        self.script.push_front(Ok(rest));
                    }
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    /// Blocks until data arrives; end of stream once the sender is dropped
    struct ChannelSource {
        rx: Receiver<Vec<u8>>,
        poll: Option<Duration>,
    }

    impl SampleSource for ChannelSource {
        fn read_samples(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let chunk = match self.poll {
                Some(timeout) => match self.rx.recv_timeout(timeout) {
                    Ok(chunk) => chunk,
                    Err(RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                    Err(RecvTimeoutError::Disconnected) => return Ok(0),
                },
                None => match self.rx.recv() {
                    Ok(chunk) => chunk,
                    Err(_) => return Ok(0),
                },
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            Ok(n)
        }
    }

    /// Packs each I/Q pair into one sample and keeps `hold_back` samples
    /// unconsumed on every pass
    struct EchoDemod {
        hold_back: usize,
        seen: Vec<(u64, Vec<u16>)>,
        stats_logged: Cell<u32>,
    }

    impl EchoDemod {
        fn new(hold_back: usize) -> Self {
            Self {
                hold_back,
                seen: Vec::new(),
                stats_logged: Cell::new(0),
            }
        }
    }

    impl Demodulator for EchoDemod {
        fn convert(&self, raw: &[u8], out: &mut [u16]) {
            for (pair, o) in raw.chunks_exact(2).zip(out.iter_mut()) {
                *o = u16::from_be_bytes([pair[0], pair[1]]);
            }
        }

        fn process(&mut self, samples: &[u16], offset: u64, sink: &mut dyn FnMut(Frame)) -> usize {
            self.seen.push((offset, samples.to_vec()));
            if let Some(&last) = samples.last() {
                sink(Frame::Uplink(UplinkFrame {
                    timestamp: offset,
                    payload: last.to_be_bytes().to_vec(),
                    errors: 0,
                }));
            }
            samples.len().saturating_sub(self.hold_back)
        }

        fn log_stats(&self) {
            self.stats_logged.set(self.stats_logged.get() + 1);
        }
    }

    #[derive(Default)]
    struct CollectSink {
        frames: Vec<Frame>,
    }

    impl FrameSink for CollectSink {
        fn deliver(&mut self, frame: Frame) {
            self.frames.push(frame);
        }
    }

    fn settings(buffer_bytes: usize) -> WorkerSettings {
        WorkerSettings {
            buffer_bytes,
            max_read_retries: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    /// Byte stream whose sample k is the big-endian u16 `k`
    fn counting_stream(samples: usize) -> Vec<u8> {
        (0..samples as u16).flat_map(|k| k.to_be_bytes()).collect()
    }

    #[test]
    fn test_accounting_with_ragged_reads() {
        let data = counting_stream(3000);
        let mut source = ScriptedSource::chunks(&data, &[1, 3, 511, 512, 513, 1000, 7, 2]);
        let mut demod = EchoDemod::new(37);
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(4096)).unwrap();

        assert_eq!(stats.bytes_read, data.len() as u64);
        assert_eq!(stats.bytes_read, stats.bytes_consumed + stats.bytes_buffered);
        assert_eq!(stats.bytes_discarded, 0);
        assert_eq!(stats.frames, sink.frames.len() as u64);

        // Each pass starts where the last one stopped, and every sample is
        // the one at that absolute position in the stream
        let mut expected_offset = 0u64;
        for (offset, samples) in &demod.seen {
            assert_eq!(*offset, expected_offset);
            for (k, &s) in samples.iter().enumerate() {
                assert_eq!(s as u64, offset + k as u64);
            }
            expected_offset = offset + samples.len().saturating_sub(37) as u64;
        }
    }

    #[test]
    fn test_forced_compaction() {
        let data = counting_stream(4096);
        let mut source = ScriptedSource::chunks(&data, &[MIN_READ_UNIT]);
        // Never consumes anything
        let mut demod = EchoDemod::new(usize::MAX);
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(2048)).unwrap();

        assert_eq!(stats.bytes_read, 8192);
        assert_eq!(stats.bytes_discarded, 13 * MIN_READ_UNIT as u64);
        assert_eq!(stats.bytes_consumed, stats.bytes_discarded);
        assert_eq!(stats.bytes_buffered, 1536);

        // After each discard the oldest sample still lines up with the stream
        let (offset, samples) = demod.seen.last().unwrap();
        assert_eq!(*offset, 12 * 256);
        assert_eq!(samples[0] as u64, *offset);
        assert_eq!(samples.len(), 1024);
    }

    #[test]
    fn test_bounded_retry() {
        let script = (0..10)
            .map(|_| Err(io::Error::new(io::ErrorKind::Other, "usb fault")))
            .collect();
        let mut source = ScriptedSource::new(script);
        let mut demod = EchoDemod::new(0);
        let mut sink = CollectSink::default();

        match run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(4096)) {
            Err(CaptureError::HardwareRead { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recovers_between_failures() {
        let fault = || Err(io::Error::new(io::ErrorKind::Other, "usb fault"));
        let script = vec![
            fault(),
            fault(),
            Ok(vec![1, 2, 3, 4]),
            Err(io::ErrorKind::Interrupted.into()),
            fault(),
            fault(),
        ];
        let mut source = ScriptedSource::new(script);
        let mut demod = EchoDemod::new(0);
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(4096)).unwrap();
        assert_eq!(stats.read_failures, 4);
        assert_eq!(stats.bytes_read, 4);
        assert_eq!(stats.bytes_consumed, 4);
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_end_of_stream() {
        let mut source = ScriptedSource::new(Vec::new());
        let mut demod = EchoDemod::new(0);
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(4096)).unwrap();
        assert_eq!(stats, PipelineStats::default());
        assert!(demod.seen.is_empty());
        // Demodulator counters are logged on the way out
        assert_eq!(demod.stats_logged.get(), 1);
    }

    #[test]
    fn test_shutdown_before_start() {
        let ctx = CaptureContext::new();
        ctx.request_shutdown();
        let mut source = ScriptedSource::new(vec![Ok(vec![0; 64])]);
        let mut demod = EchoDemod::new(0);
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &ctx, &settings(4096)).unwrap();
        assert_eq!(stats.bytes_read, 0);
    }

    #[test]
    fn test_cancel_unblocks_worker() {
        let (tx, rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);
        let ctx = CaptureContext::new();
        let sink = CollectSink::default();

        let handle = spawn_worker(
            Box::new(ChannelSource { rx, poll: None }),
            Box::new(EchoDemod::new(0)),
            Box::new(sink),
            ctx.clone(),
            settings(4096),
            done_tx,
        )
        .unwrap();

        tx.send(vec![0u8; 100]).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(done_rx.try_recv().is_err(), "worker should still be blocked");

        // Flag first, then cancel the pending read
        ctx.request_shutdown();
        drop(tx);

        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker did not exit");
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.bytes_read, 100);
    }

    #[test]
    fn test_flag_seen_between_polled_reads() {
        let (_tx, rx) = unbounded::<Vec<u8>>();
        let (done_tx, done_rx) = bounded(1);
        let ctx = CaptureContext::new();

        let handle = spawn_worker(
            Box::new(ChannelSource {
                rx,
                poll: Some(Duration::from_millis(5)),
            }),
            Box::new(EchoDemod::new(0)),
            Box::new(CollectSink::default()),
            ctx.clone(),
            settings(4096),
            done_tx,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        ctx.request_shutdown();

        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker did not exit");
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_mode_s_end_to_end() {
        let msg = hex::decode("8D4840D6202CC371C32CE0576098").unwrap();
        let iq: Vec<u8> = synthesize(&msg, 2000, 1000)
            .iter()
            .flat_map(|&m| if m > 0 { [255u8, 127] } else { [127u8, 127] })
            .collect();

        let mut source = ScriptedSource::chunks(&iq, &[1001, 777, 2049]);
        let mut demod = ModeSDemodulator::new();
        let mut sink = CollectSink::default();

        let stats = run_worker(&mut source, &mut demod, &mut sink, &CaptureContext::new(), &settings(8192)).unwrap();

        assert_eq!(stats.bytes_read, iq.len() as u64);
        assert_eq!(
            sink.frames,
            vec![Frame::Adsb(AdsbFrame {
                timestamp: 2000,
                payload: msg,
                errors: 0,
                signal_level: 128,
            })]
        );
    }
}
