//! RTL-SDR tuner access through the `rtl_sdr` tool
//!
//! The tool lists attached devices on stderr and streams raw 8-bit I/Q to
//! stdout. An opened tuner is split in two: the stdout reader moves into the
//! capture worker, while `RtlSdr` stays with the lifecycle to cancel and
//! close the stream.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use tracing::{debug, info, warn};

use super::pipeline::SampleSource;
use crate::config::Config;
use crate::error::CaptureError;

/// One attached tuner as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: u32,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

/// Sanitize a string to only contain printable ASCII characters
fn sanitize_string(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse the device listing `rtl_sdr` prints on startup
///
/// Listing lines look like `  0:  Realtek, RTL2838UHIDIR, SN: 00000001`.
pub fn parse_device_list(text: &str) -> Vec<DeviceInfo> {
    text.lines()
        .filter_map(|line| {
            let (index, info) = line.trim().split_once(':')?;
            let index = index.parse().ok()?;

            let mut fields = info.trim().splitn(3, ',');
            let manufacturer = sanitize_string(fields.next()?);
            let product = sanitize_string(fields.next()?);
            let serial = fields.next()?.trim().strip_prefix("SN:")?;

            Some(DeviceInfo {
                index,
                manufacturer,
                product,
                serial: sanitize_string(serial),
            })
        })
        .collect()
}

/// Enumerate attached tuners
pub fn list_devices(rtl_sdr_path: &Path) -> io::Result<Vec<DeviceInfo>> {
    // rtl_sdr prints the listing before it opens anything; reading a single
    // sample makes it exit right after
    let output = Command::new(rtl_sdr_path)
        .args(["-n", "1", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;

    Ok(parse_device_list(&String::from_utf8_lossy(&output.stderr)))
}

/// Control half of an open tuner
pub struct RtlSdr {
    serial: String,
    child: Child,
    reader: Option<ChildStdout>,
}

/// Find the tuner with the configured serial and start streaming from it.
///
/// Every error means the receiver runs without this tuner;
/// `CaptureError::DeviceNotFound` when no attached tuner has the serial.
pub fn open_tuner(config: &Config) -> Result<RtlSdr, CaptureError> {
    let serial = &config.tuner_serial;
    let open_error = |source| CaptureError::DeviceOpen {
        serial: serial.clone(),
        source,
    };

    let devices = list_devices(&config.rtl_sdr_path).map_err(open_error)?;
    for device in &devices {
        debug!(
            "Found tuner {}: {} {} SN {}",
            device.index, device.manufacturer, device.product, device.serial
        );
    }

    let device = devices
        .iter()
        .find(|d| &d.serial == serial)
        .ok_or_else(|| CaptureError::DeviceNotFound(serial.clone()))?;

    info!("Opening tuner {} ({} {})", serial, device.manufacturer, device.product);
    info!("  Center frequency: {} Hz", config.center_freq_hz);
    info!("  Sample rate: {} SPS", config.sample_rate);
    info!("  Gain: {:.1} dB", config.gain_db);

    // rtl_sdr -d <device> -f <freq> -s <rate> -g <gain> -
    // A fixed gain selects manual gain mode; "-" streams to stdout
    let mut cmd = Command::new(&config.rtl_sdr_path);
    cmd.arg("-d")
        .arg(device.index.to_string())
        .arg("-f")
        .arg(config.center_freq_hz.to_string())
        .arg("-s")
        .arg(config.sample_rate.to_string())
        .arg("-g")
        .arg(config.gain_db.to_string())
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Executing: {:?}", cmd);
    let mut child = cmd.spawn().map_err(open_error)?;

    let Some(reader) = child.stdout.take() else {
        let _ = child.kill();
        return Err(open_error(io::Error::new(io::ErrorKind::BrokenPipe, "rtl_sdr stdout not captured")));
    };

    // Driver chatter goes to the log
    if let Some(stderr) = child.stderr.take() {
        let spawned = thread::Builder::new().name("rtl_sdr-stderr".to_string()).spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if !line.trim().is_empty() {
                    debug!("[rtl_sdr] {}", line.trim());
                }
            }
        });
        if let Err(e) = spawned {
            warn!("rtl_sdr stderr will not be logged: {}", e);
        }
    }

    Ok(RtlSdr {
        serial: serial.clone(),
        child,
        reader: Some(reader),
    })
}

impl RtlSdr {
    /// Hand the sample stream to the capture worker. Only the first call
    /// returns it.
    pub fn take_reader(&mut self) -> Option<ChildStdout> {
        self.reader.take()
    }

    /// Stop the stream. A read blocked on it returns end-of-file.
    pub fn cancel(&mut self) {
        match self.child.kill() {
            Ok(()) => debug!("Tuner {} stream cancelled", self.serial),
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => warn!("Failed to cancel tuner {}: {}", self.serial, e),
        }
    }

    /// Release the device. Call after the worker has been joined.
    pub fn close(mut self) {
        self.cancel();
        match self.child.wait() {
            Ok(status) => info!("Tuner {} closed ({})", self.serial, status),
            Err(e) => warn!("Failed to reap rtl_sdr for tuner {}: {}", self.serial, e),
        }
    }
}

impl Drop for RtlSdr {
    fn drop(&mut self) {
        // No-op after close(); otherwise keeps rtl_sdr from outliving us
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl SampleSource for ChildStdout {
    fn read_samples(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}
