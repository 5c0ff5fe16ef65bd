use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits,
};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Timeouts, Transport, DEFAULT_WRITE_TIMEOUT};

/// Serial port transport backed by the `serialport` crate.
///
/// Opens 8N1 without flow control. The handle can be closed and reopened
/// with the same settings, which is what link recovery relies on.
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open a serial port.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (e.g., 57600)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let mut transport = Self {
            path: path.to_string(),
            baud_rate,
            timeout: DEFAULT_WRITE_TIMEOUT,
            port: None,
        };
        Transport::open(&mut transport)?;
        Ok(transport)
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self) -> Result<Bytes> {
        let port = self.port_mut()?;
        let mut buf = BytesMut::new();

        loop {
            let waiting = port.bytes_to_read()? as usize;
            if waiting == 0 {
                break;
            }

            let mut chunk = vec![0u8; waiting];
            match port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(buf.freeze())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.write(data) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn open(&mut self) -> Result<()> {
        self.port = None;
        let port = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()?;
        info!(path = %self.path, baud = self.baud_rate, "opened serial port");
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "closed serial port");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Output)?;
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) -> Result<()> {
        // serialport exposes a single timeout; reads never wait on it because
        // only bytes already buffered are requested.
        self.timeout = timeouts.write;
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeouts.write)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }
}

/// A serial port found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    /// Device path or name to pass to [`SerialTransport::open`].
    pub name: String,
    /// Bus description, e.g. `usb 2341:0043 Arduino Uno`.
    pub kind: String,
}

/// List serial ports available on this machine.
pub fn list_ports() -> Result<Vec<PortSummary>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| PortSummary {
            kind: describe_port_type(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut kind = format!("usb {:04x}:{:04x}", info.vid, info.pid);
            if let Some(product) = &info.product {
                kind.push(' ');
                kind.push_str(product);
            }
            kind
        }
        SerialPortType::PciPort => "pci".to_string(),
        SerialPortType::BluetoothPort => "bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_usb_ports() {
        let info = serialport::UsbPortInfo {
            vid: 0x2341,
            pid: 0x0043,
            serial_number: None,
            manufacturer: None,
            product: Some("Arduino Uno".to_string()),
        };
        assert_eq!(
            describe_port_type(&SerialPortType::UsbPort(info)),
            "usb 2341:0043 Arduino Uno"
        );
        assert_eq!(describe_port_type(&SerialPortType::PciPort), "pci");
    }

    #[test]
    fn open_missing_device_fails() {
        let result = SerialTransport::open("/dev/bgserial-does-not-exist", 57600);
        assert!(matches!(result, Err(TransportError::Serial(_))));
    }
}
