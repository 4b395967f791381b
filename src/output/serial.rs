//! Serial wire sink.
//!
//! Wire format per event: x (u8), y (u8), t (i32, native endian), u*100
//! (i16, truncated), v*100 (i16, truncated), followed by a separator byte
//! 0xFF. 0xFF is reserved and must never collide with a real coordinate,
//! which is why `Config::validate` rejects sensors wider or taller than
//! 254 pixels. A one-time handshake string is written when the port opens.

use std::io::Write;
use std::time::Duration;

use crate::event::Packet;
use crate::output::Sink;

const SEPARATOR: u8 = 0xFF;
const HANDSHAKE: &[u8] = b"DVS128UART";

pub struct SerialSink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialSink {
    pub fn open(path: &str, baud: u32) -> crate::error::Result<Self> {
        let mut port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.write_all(HANDSHAKE)?;
        Ok(SerialSink { port })
    }
}

impl Sink for SerialSink {
    fn write_packet(&mut self, packet: &Packet) -> std::io::Result<()> {
        for e in &packet.events {
            if !e.has_flow {
                continue;
            }
            self.port.write_all(&[e.x as u8, e.y as u8])?;
            self.port.write_all(&(e.t as i32).to_ne_bytes())?;
            self.port.write_all(&((e.u * 100.0) as i16).to_ne_bytes())?;
            self.port.write_all(&((e.v * 100.0) as i16).to_ne_bytes())?;
            self.port.write_all(&[SEPARATOR])?;
        }
        Ok(())
    }
}
