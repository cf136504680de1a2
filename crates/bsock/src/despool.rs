use std::fs::File;
use std::io::{Seek, SeekFrom};

use logging::{MessageType, trace_net};
use protocol::{ProtocolError, SpoolEntry, SpoolReader};

use crate::connection::Connection;
use crate::error::BsockError;

/// Messages between two progress reports.
pub const DESPOOL_PROGRESS_EVERY: u64 = 64;

impl Connection {
    /// Replays the attached spool file over the connection.
    ///
    /// The file is read from the start. Payload records are sent as data
    /// messages and header-only records as signals (or empty messages).
    /// `progress` receives byte deltas: one every
    /// [`DESPOOL_PROGRESS_EVERY`] messages and a final `total - reported`
    /// when the replay ends, so the deltas of a complete replay sum to
    /// `total`.
    ///
    /// The replay stops at the first send failure or when the owning job is
    /// canceled. A record whose payload is shorter than its header claims
    /// is fatal.
    pub fn despool<F>(&mut self, mut progress: F, total: i64) -> Result<(), BsockError>
    where
        F: FnMut(i64),
    {
        let mut spool = self.spool.take().ok_or(BsockError::NoSpool)?;
        let outcome = spool
            .file
            .seek(SeekFrom::Start(0))
            .map_err(BsockError::SpoolIo)
            .and_then(|_| self.replay(&mut spool.file, &mut progress, total));
        self.spool = Some(spool);
        outcome
    }

    fn replay<F>(&mut self, file: &mut File, progress: &mut F, total: i64) -> Result<(), BsockError>
    where
        F: FnMut(i64),
    {
        let mut reader = SpoolReader::new(file);
        let mut reported: i64 = 0;
        let mut count: u64 = 0;

        loop {
            let entry = match reader.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(ProtocolError::SpoolIo(source)) => {
                    progress(total - reported);
                    self.options
                        .sink
                        .emit(MessageType::Fatal, "fread attr spool I/O error.");
                    return Err(BsockError::SpoolIo(source));
                }
                Err(err) => {
                    self.options.sink.emit(MessageType::Fatal, &err.to_string());
                    progress(total - reported);
                    return Err(err.into());
                }
            };

            let sent = match entry {
                SpoolEntry::Data(_) => {
                    self.set_msg(reader.payload());
                    count += 1;
                    if count % DESPOOL_PROGRESS_EVERY == 0 {
                        let size = i64::try_from(reader.bytes()).unwrap_or(i64::MAX);
                        progress(size - reported);
                        reported = size;
                    }
                    self.send()
                }
                SpoolEntry::Marker(value) => self.send_marker(value),
            };
            if let Err(err) = sent {
                progress(total - reported);
                return Err(err);
            }
            if self.options.job.is_canceled() {
                trace_net!(peer = %self.peer, records = reader.records(), "despool canceled");
                return Err(BsockError::Canceled);
            }
        }

        progress(total - reported);
        trace_net!(peer = %self.peer, records = reader.records(), bytes = reader.bytes(), "despool complete");
        Ok(())
    }
}
