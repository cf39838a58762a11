pub mod cloud;
pub mod ingestor;
pub mod line_reader;
pub mod link;
pub mod transport;

pub use cloud::{BatchReport, CloudBatchIngestor};
pub use ingestor::{IngestStats, IngestorHandle, TelemetryIngestor};
pub use line_reader::FramedLineReader;
pub use link::ResilientLink;
pub use transport::{SerialTransport, TcpTransport, Transport, TransportError};
