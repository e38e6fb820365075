//! Network sink.
//!
//! Ships each formatted record to a TCP or UDP peer, either as the raw line
//! or wrapped in a JSON object.

use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LogError, Result};
use crate::format::{Record, RecordFormatter};
use crate::level::Level;
use crate::traits::Sink;

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Newline-delimited stream.
    Tcp,
    /// One datagram per record.
    #[default]
    Udp,
}

/// Payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// The formatted line as-is.
    #[default]
    Raw,
    /// `{ <json_key>: line, ...extra }`
    Json,
}

/// Connection settings for a [`SocketSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketSinkConfig {
    /// `host:port` of the peer.
    pub address: String,
    /// Transport.
    pub network: Network,
    /// Payload encoding.
    pub codec: Codec,
    /// Key holding the line under [`Codec::Json`].
    pub json_key: String,
    /// Extra fields merged into every JSON payload, as a JSON object string.
    pub json_ext: String,
}

impl SocketSinkConfig {
    /// Creates a raw UDP config for `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            network: Network::Udp,
            codec: Codec::Raw,
            json_key: "message".to_string(),
            json_ext: String::new(),
        }
    }

    /// Sets the transport.
    #[must_use]
    pub const fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Switches to the JSON codec.
    #[must_use]
    pub fn with_json(mut self, key: impl Into<String>, ext: impl Into<String>) -> Self {
        self.codec = Codec::Json;
        self.json_key = key.into();
        self.json_ext = ext.into();
        self
    }
}

enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// A sink that sends records over the network.
pub struct SocketSink {
    name: String,
    formatter: RecordFormatter,
    config: SocketSinkConfig,
    extra: Map<String, Value>,
    conn: Mutex<Option<Connection>>,
}

impl SocketSink {
    /// Connects to the configured peer.
    ///
    /// # Errors
    ///
    /// Returns an error if `json_ext` is not a JSON object or the connection
    /// cannot be established.
    pub fn connect(config: SocketSinkConfig, formatter: RecordFormatter) -> Result<Self> {
        let extra = if config.json_ext.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str::<Map<String, Value>>(&config.json_ext)?
        };

        let peer = resolve(&config.address)?;
        let conn = match config.network {
            Network::Tcp => Connection::Tcp(TcpStream::connect(peer)?),
            Network::Udp => {
                let local = if peer.is_ipv4() {
                    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
                } else {
                    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
                };
                let socket = UdpSocket::bind(local)?;
                socket.connect(peer)?;
                Connection::Udp(socket)
            }
        };

        let name = format!(
            "{}://{}",
            match config.network {
                Network::Tcp => "tcp",
                Network::Udp => "udp",
            },
            config.address
        );

        Ok(Self {
            name,
            formatter,
            config,
            extra,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Builds the wire payload for one formatted line.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn encode(&self, line: &str) -> Result<Vec<u8>> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut payload = match self.config.codec {
            Codec::Raw => line.as_bytes().to_vec(),
            Codec::Json => {
                let mut object = Map::new();
                object.insert(self.config.json_key.clone(), Value::String(line.to_string()));
                for (key, value) in &self.extra {
                    object.insert(key.clone(), value.clone());
                }
                serde_json::to_vec(&Value::Object(object))?
            }
        };
        if self.config.network == Network::Tcp {
            payload.push(b'\n');
        }
        Ok(payload)
    }
}

impl Sink for SocketSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Level {
        self.formatter.level()
    }

    fn write(&self, record: &Record<'_>) -> Result<usize> {
        if !self.formatter.admits(record.level) {
            return Ok(0);
        }
        let payload = self.encode(&self.formatter.format(record))?;

        let mut conn = self.conn.lock();
        match conn.as_mut() {
            Some(Connection::Tcp(stream)) => stream.write_all(&payload)?,
            Some(Connection::Udp(socket)) => {
                socket.send(&payload)?;
            }
            None => return Ok(0),
        }
        Ok(payload.len())
    }

    fn flush(&self) {
        if let Some(Connection::Tcp(stream)) = self.conn.lock().as_mut() {
            if let Err(e) = stream.flush() {
                tracing::warn!(sink = %self.name, error = %e, "failed to flush sink");
            }
        }
    }

    fn close(&self) {
        if let Some(Connection::Tcp(stream)) = self.conn.lock().take() {
            if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
                if e.kind() != io::ErrorKind::NotConnected {
                    tracing::warn!(sink = %self.name, error = %e, "failed to shut down connection");
                }
            }
        }
    }
}

fn resolve(address: &str) -> Result<SocketAddr> {
    address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            LogError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("address did not resolve: {address}"),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HeaderFlags;
    use crate::level::LevelRegistry;
    use chrono::Local;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Duration;

    fn formatter() -> RecordFormatter {
        RecordFormatter::new(LevelRegistry::shared(), Level::INFO).with_flags(HeaderFlags::NONE)
    }

    #[test]
    fn udp_sink_sends_raw_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set timeout");
        let address = receiver.local_addr().expect("local addr").to_string();

        let sink = SocketSink::connect(SocketSinkConfig::new(address), formatter())
            .expect("connect");
        let n = sink
            .write(&Record::new(Local::now(), Level::WARN, "over the wire"))
            .expect("write");

        let mut buf = [0u8; 256];
        let (len, _) = receiver.recv_from(&mut buf).expect("recv");
        assert_eq!(&buf[..len], b"WARN  over the wire");
        assert_eq!(n, len);
    }

    #[test]
    fn tcp_sink_sends_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let address = listener.local_addr().expect("local addr").to_string();
        let reader = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut line = String::new();
            BufReader::new(stream).read_line(&mut line).expect("read line");
            line
        });

        let config = SocketSinkConfig::new(address)
            .with_network(Network::Tcp)
            .with_json("msg", r#"{"service":"api"}"#);
        let sink = SocketSink::connect(config, formatter()).expect("connect");
        sink.write(&Record::new(Local::now(), Level::INFO, "hello"))
            .expect("write");
        sink.close();

        let line = reader.join().expect("reader thread");
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(line.trim_end()).expect("valid json");
        assert_eq!(value["msg"], "INFO  hello");
        assert_eq!(value["service"], "api");
    }

    #[test]
    fn tcp_sink_close_after_peer_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let address = listener.local_addr().expect("local addr").to_string();
        let peer = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            drop(stream);
        });

        let config = SocketSinkConfig::new(address).with_network(Network::Tcp);
        let sink = SocketSink::connect(config, formatter()).expect("connect");
        peer.join().expect("peer thread");

        sink.flush();
        sink.close();
        sink.close();
        let n = sink
            .write(&Record::new(Local::now(), Level::INFO, "late"))
            .expect("write after close");
        assert_eq!(n, 0);
    }

    #[test]
    fn socket_sink_rejects_non_object_ext() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        let address = receiver.local_addr().expect("local addr").to_string();
        let config = SocketSinkConfig::new(address).with_json("msg", "[1,2]");
        let result = SocketSink::connect(config, formatter());
        assert!(matches!(result, Err(LogError::Serialization(_))));
    }

    #[test]
    fn socket_sink_drops_records_above_level() {
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        let address = receiver.local_addr().expect("local addr").to_string();
        let sink = SocketSink::connect(SocketSinkConfig::new(address), formatter())
            .expect("connect");
        let n = sink
            .write(&Record::new(Local::now(), Level::DEBUG, "quiet"))
            .expect("write");
        assert_eq!(n, 0);
    }

    #[test]
    fn network_and_codec_parse_lowercase() {
        let network: Network = serde_json::from_str(r#""tcp""#).expect("network");
        let codec: Codec = serde_json::from_str(r#""json""#).expect("codec");
        assert_eq!(network, Network::Tcp);
        assert_eq!(codec, Codec::Json);
        assert_eq!(Network::default(), Network::Udp);
        assert_eq!(Codec::default(), Codec::Raw);
    }
}
