//! Handle all the raw input directly from the end user.

use std::io::Read as _;

use color_eyre::eyre::Result;

/// Ctrl-C as it arrives on a raw mode STDIN.
const CTRL_C: u8 = 0x03;

/// The escape key.
const ESCAPE: u8 = 0x1b;

/// Handle input from the user
pub struct RawInput;

impl RawInput {
    /// Listen on STDIN in its own blocking thread.
    pub fn start(
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> std::thread::JoinHandle<Result<()>> {
        std::thread::spawn(move || Self::consume_stdin(&protocol_tx))
    }

    /// Read raw bytes from STDIN. The renderer put the terminal into raw mode, so keypresses
    /// arrive one byte at a time without waiting for a newline.
    fn consume_stdin(
        protocol_tx: &tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> Result<()> {
        tracing::debug!("Starting to listen on STDIN");

        let stdin = std::io::stdin();
        let mut reader = std::io::BufReader::new(stdin);

        loop {
            let mut buffer: [u8; 128] = [0; 128];
            let bytes_read = reader.read(&mut buffer[..])?;
            for byte in buffer.iter().take(bytes_read) {
                if matches!(*byte, b'q' | CTRL_C | ESCAPE) {
                    tracing::debug!("Quit keypress, broadcasting the protocol `End` message");
                    protocol_tx.send(crate::run::Protocol::End)?;
                    return Ok(());
                }
            }
        }
    }
}
