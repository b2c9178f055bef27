//! Repaired-output cursor.
//!
//! Every input byte is written optimistically. A completed message confirms everything
//! written so far; a rewind, a resync or a sync marker preceded by stray bytes drops back to the
//! last confirmed offset, and the final truncation removes any trailing partial message.

use crate::cursor::ByteSink;
use std::io;

pub struct RepairStream<'a> {
    sink: &'a mut dyn ByteSink,
    position: u64,
    confirmed: u64,
}

impl<'a> RepairStream<'a> {
    pub fn new(sink: &'a mut dyn ByteSink) -> Self {
        RepairStream {
            sink,
            position: 0,
            confirmed: 0,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// End of the last message known to be valid.
    pub fn confirmed(&self) -> u64 {
        self.confirmed
    }

    pub fn mirror(&mut self, byte: u8) -> io::Result<()> {
        self.sink.write_byte(byte)?;
        self.position += 1;
        Ok(())
    }

    pub fn confirm(&mut self) {
        self.confirmed = self.position;
    }

    /// Drop back to the confirmed offset; later writes overwrite the unconfirmed bytes.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.sink.seek_to(self.confirmed)?;
        self.position = self.confirmed;
        Ok(())
    }

    /// A sync marker was just mirrored: drop any unconfirmed bytes written before it.
    pub fn drop_before_marker(&mut self, marker: u8) -> io::Result<()> {
        if self.position == self.confirmed + 1 {
            return Ok(());
        }
        self.rewind()?;
        self.mirror(marker)
    }

    /// Replace everything after the confirmed offset with `message` and confirm it.
    pub fn replace_unconfirmed(&mut self, message: &[u8]) -> io::Result<()> {
        self.rewind()?;
        for &b in message {
            self.mirror(b)?;
        }
        self.confirm();
        Ok(())
    }

    /// Truncate at the confirmed offset. Returns the repaired length.
    pub fn finish(&mut self) -> io::Result<u64> {
        self.rewind()?;
        self.sink.truncate_at(self.confirmed)?;
        Ok(self.confirmed)
    }
}
