use crate::model::update_channel::UpdateChannel;
use crate::session::ClientSession;
use log::{debug, error, info};
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread;
use stock_common::Result;

/// TCP command receiver that accepts client connections.
///
/// Every accepted connection is served by its own `ClientSession` on a dedicated
/// thread, so a misbehaving client never affects the others.
pub struct CommandReceiver {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
}

impl CommandReceiver {
    /// Bind a new TCP receiver to the provided `bind_addr` (e.g., `0.0.0.0:8080`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking loop that accepts TCP connections and hands each one to a session
    /// thread. Accept errors are logged and the loop carries on.
    pub fn accept_loop(self, channel: Arc<UpdateChannel>, data_socket: Arc<UdpSocket>) -> Result<()> {
        info!("Command TCP server is started on {}", self.local_addr()?);

        for stream in self.socket.incoming() {
            match stream {
                Ok(stream) => {
                    let channel = Arc::clone(&channel);
                    let data_socket = Arc::clone(&data_socket);
                    thread::spawn(move || {
                        if let Err(e) = serve_connection(stream, channel, data_socket) {
                            error!("Client connection error: {}", e);
                        }
                    });
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    channel: Arc<UpdateChannel>,
    data_socket: Arc<UdpSocket>,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    info!("Client connected: {}", peer);

    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut session = ClientSession::new(channel, data_socket, peer.ip());
    let result = session.serve(reader, &mut writer);

    debug!("Client disconnected: {}", peer);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::time::Duration;
    use stock_common::{Command, Reply, SnapshotChange, StockUpdate};

    #[test]
    fn test_connection_subscribe_and_publish() {
        let channel = Arc::new(UpdateChannel::new());
        let data_socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let receiver = CommandReceiver::new("127.0.0.1:0").unwrap();
        let server_addr = receiver.local_addr().unwrap();
        {
            let channel = Arc::clone(&channel);
            thread::spawn(move || receiver.accept_loop(channel, data_socket));
        }

        let client_udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        client_udp
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = client_udp.local_addr().unwrap().port();

        let mut stream = TcpStream::connect(server_addr).unwrap();
        let mut replies = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();

        Command::subscribe("42", port).write_line(&mut stream).unwrap();
        replies.read_line(&mut line).unwrap();
        assert_eq!(Reply::from_line(&line).unwrap(), Reply::ok());

        line.clear();
        Command::Publish(StockUpdate::new("42").with_quantity(4))
            .write_line(&mut stream)
            .unwrap();
        replies.read_line(&mut line).unwrap();
        assert_eq!(
            Reply::from_line(&line).unwrap(),
            Reply::Ok { delivered: Some(1) }
        );

        let mut buf = [0u8; 2048];
        let mut last = None;
        for _ in 0..2 {
            let size = client_udp.recv(&mut buf).unwrap();
            last = Some(serde_json::from_slice::<SnapshotChange>(&buf[..size]).unwrap());
        }
        assert_eq!(last.unwrap().snapshot.stock_quantity, Some(4));
    }
}
