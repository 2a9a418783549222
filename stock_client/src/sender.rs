//! Sending commands to the stock server over TCP.
//!
//! Each command is written as one JSON line and answered by exactly one reply line.
use log::{debug, info};
use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use stock_common::{Command, Reply, Result, StockError};

/// Command connection to the server.
pub struct CommandSender {
    stream: TcpStream,
    replies: BufReader<TcpStream>,
}

impl CommandSender {
    /// Connect to the server's command port at `server_addr`.
    pub fn connect(server_addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(server_addr)
            .map_err(|e| StockError::Format(format!("Failed to connect to server: {}", e)))?;
        let replies = BufReader::new(stream.try_clone()?);
        info!("Connected to command server at {}", server_addr);
        Ok(Self { stream, replies })
    }

    /// Send `command` and wait for the server's reply.
    ///
    /// An error reply is turned into `StockError::Format` carrying the server message.
    pub fn send_command(&mut self, command: &Command) -> Result<Reply> {
        debug!("Sending command: {:?}", command);
        command.write_line(&mut self.stream)?;

        let mut line = String::new();
        if self.replies.read_line(&mut line)? == 0 {
            return Err(StockError::Format(
                "Server closed the connection".to_string(),
            ));
        }
        match Reply::from_line(&line)? {
            Reply::Error { message } => Err(StockError::Format(message)),
            reply => Ok(reply),
        }
    }
}
