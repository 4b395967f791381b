//! CSV file sink.
//!
//! Writes a `#`-prefixed banner and column legend, then one row per
//! flow-annotated event: `x,y,t,p,u,v` with u and v rounded to three
//! decimal places. Caps the file at a fixed number of data rows and logs a
//! single notice when further rows start being dropped.

use std::fs::File;
use std::io::Write;

use log::warn;

use crate::event::Packet;
use crate::output::Sink;

const MAX_ROWS: u64 = 5_000_000;

#[derive(serde::Serialize, serde::Deserialize)]
struct Row {
    x: u16,
    y: u16,
    t: i64,
    p: u8,
    u: f64,
    v: f64,
}

pub struct CsvSink {
    writer: csv::Writer<File>,
    rows_written: u64,
    cap_notice_logged: bool,
}

impl CsvSink {
    pub fn open(path: &str) -> crate::error::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(file, "# dvs-opticflow output")?;
        writeln!(file, "# created_unix_us={}", current_unix_us())?;
        writeln!(file, "#x,y,t,p,u,v")?;

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        Ok(CsvSink {
            writer,
            rows_written: 0,
            cap_notice_logged: false,
        })
    }
}

impl Sink for CsvSink {
    fn write_packet(&mut self, packet: &Packet) -> std::io::Result<()> {
        for e in &packet.events {
            if !e.has_flow {
                continue;
            }
            if self.rows_written >= MAX_ROWS {
                if !self.cap_notice_logged {
                    warn!("CSV sink reached {MAX_ROWS} row cap, dropping further rows");
                    self.cap_notice_logged = true;
                }
                continue;
            }
            let row = Row {
                x: e.x,
                y: e.y,
                t: e.t,
                p: e.polarity as u8,
                u: round3(e.u),
                v: round3(e.v),
            };
            self.writer
                .serialize(row)
                .map_err(|err| std::io::Error::other(err.to_string()))?;
            self.rows_written += 1;
        }
        self.writer.flush()
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Timestamps the CSV header without relying on a system clock dependency
/// the rest of the pipeline doesn't otherwise need.
fn current_unix_us() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0)
}
