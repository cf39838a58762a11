use std::{
    io::{self, Read},
    net::TcpStream,
    time::Duration,
};

use log::info;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Something that can (re)open a byte stream to a telemetry source.
///
/// `open` is called again after every transport fault, so implementations
/// must be able to open the same endpoint any number of times.
pub trait Transport: Send {
    type Stream: Read + Send;

    fn open(&mut self) -> Result<Self::Stream, TransportError>;

    fn describe(&self) -> String;
}

/// UART link to a micro-controller, 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            timeout,
        }
    }
}

impl Transport for SerialTransport {
    type Stream = Box<dyn SerialPort>;

    fn open(&mut self) -> Result<Self::Stream, TransportError> {
        let port = serialport::new(self.path.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()?;

        info!("Opened serial port {} at {} baud", self.path, self.baud_rate);

        Ok(port)
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.path, self.baud_rate)
    }
}

/// Plain TCP stream carrying the same line-framed records.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn open(&mut self) -> Result<Self::Stream, TransportError> {
        let stream = TcpStream::connect(self.address.as_str())?;
        stream.set_read_timeout(Some(self.timeout))?;

        info!("Connected to {}", self.address);

        Ok(stream)
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.address)
    }
}
