//! ADS1115 sample source over Linux `/dev/i2c-*` (feature `hardware`).
//!
//! Talks to the ADC with raw `open`/`ioctl`/`read`/`write` syscalls, no
//! kernel driver beyond i2c-dev. Matches the reference deployment: ±4.096 V
//! gain, 860 samples per second, continuous conversion, differential inputs
//! AIN0/AIN1 for channel 0 and AIN2/AIN3 for channel 1.
//!
//! The bus handle is opened and released per `sample` call. At multi-second
//! sampling periods this is cheap and keeps the device free between cycles.

use std::{
    ffi::CString,
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
    time::Duration,
};

use super::{Channel, SampleSource, SensorError, SensorResult};

const I2C_SLAVE: u64 = 0x0703;

/// Register pointer values.
const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// Full-scale range in millivolts for the ±4.096 V PGA setting.
const FULL_SCALE_MV: f64 = 4096.0;

/// Sample period at 860 SPS, rounded up a little so each read sees a fresh
/// conversion.
const SAMPLE_PERIOD: Duration = Duration::from_micros(1170);

/// ADS1115 attached to a Linux I2C character device.
pub struct Ads1115Source {
    device: PathBuf,
    address: u16,
}

impl Ads1115Source {
    pub fn new(device: PathBuf, address: u16) -> Self {
        Ads1115Source { device, address }
    }

    /// Config register value: start continuous conversion on the channel's
    /// differential input pair, ±4.096 V gain, 860 SPS, comparator off.
    fn config_word(channel: Channel) -> u16 {
        let mux: u16 = match channel {
            Channel::System0 => 0b000, // AIN0 - AIN1
            Channel::System1 => 0b011, // AIN2 - AIN3
        };
        (1 << 15) | (mux << 12) | (0b001 << 9) | (0b111 << 5) | 0b11
    }
}

#[async_trait::async_trait]
impl SampleSource for Ads1115Source {
    async fn sample(&self, channel: Channel, count: usize) -> SensorResult<Vec<f64>> {
        let device = self.device.clone();
        let address = self.address;

        // The bus I/O is blocking syscall work; keep it off the runtime.
        tokio::task::spawn_blocking(move || acquire(&device, address, channel, count))
            .await
            .map_err(|e| SensorError::Unavailable(format!("sampling task died: {e}")))?
    }
}

fn acquire(device: &Path, address: u16, channel: Channel, count: usize) -> SensorResult<Vec<f64>> {
    let bus = Bus::open(device, address)?;

    let cfg = Ads1115Source::config_word(channel);
    bus.write(&[REG_CONFIG, (cfg >> 8) as u8, cfg as u8])
        .and_then(|_| bus.write(&[REG_CONVERSION]))
        .map_err(|source| SensorError::DeviceInit {
            path: device.display().to_string(),
            address,
            source,
        })?;

    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        std::thread::sleep(SAMPLE_PERIOD);
        let raw = bus
            .read_word()
            .map_err(|source| SensorError::SampleRead { channel, source })?;
        samples.push(raw as f64 * FULL_SCALE_MV / 32768.0);
    }
    Ok(samples)
}

/// RAII wrapper over the i2c-dev file descriptor.
struct Bus {
    fd: libc::c_int,
}

impl Bus {
    fn open(device: &Path, address: u16) -> SensorResult<Self> {
        let c_path = CString::new(device.as_os_str().as_bytes()).map_err(|_| {
            SensorError::BusOpen {
                path: device.display().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"),
            }
        })?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(SensorError::BusOpen {
                path: device.display().to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let bus = Bus { fd };

        let rc = unsafe { libc::ioctl(fd, I2C_SLAVE as _, address as libc::c_int) };
        if rc < 0 {
            return Err(SensorError::DeviceInit {
                path: device.display().to_string(),
                address,
                source: io::Error::last_os_error(),
            });
        }
        Ok(bus)
    }

    fn write(&self, buf: &[u8]) -> io::Result<()> {
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n == buf.len() as isize {
            Ok(())
        } else if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Err(io::Error::new(io::ErrorKind::WriteZero, "short I2C write"))
        }
    }

    /// Reads the 16-bit big-endian register the pointer currently selects.
    fn read_word(&self) -> io::Result<i16> {
        let mut buf = [0u8; 2];
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n == 2 {
            Ok(i16::from_be_bytes(buf))
        } else if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short I2C read"))
        }
    }
}

impl Drop for Bus {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
