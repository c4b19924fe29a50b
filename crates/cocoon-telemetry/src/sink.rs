//! Deferred log sink.
//!
//! The wrapper starts logging before it knows where its diagnostics belong:
//! the capture file is only opened once the configuration has been read.
//! [`DeferredSink`] keeps formatted records in memory until a writer is
//! attached, then replays them in order and forwards everything after.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Records kept while no writer is attached.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

struct SinkState {
    target: Option<Box<dyn Write + Send>>,
    pending: VecDeque<Vec<u8>>,
    capacity: usize,
    dropped: u64,
}

impl SinkState {
    fn commit(&mut self, record: Vec<u8>) {
        if let Some(target) = self.target.as_mut() {
            // A broken log target must never take the wrapper down.
            let _ = target.write_all(&record);
            let _ = target.flush();
            return;
        }

        if self.capacity == 0 {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        while self.pending.len() >= self.capacity {
            self.pending.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.pending.push_back(record);
    }
}

/// Shared, cloneable log destination that buffers until attached.
#[derive(Clone)]
pub struct DeferredSink {
    state: Arc<Mutex<SinkState>>,
}

impl DeferredSink {
    /// Create a detached sink that keeps at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                target: None,
                pending: VecDeque::new(),
                capacity,
                dropped: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route all records to `writer`, first replaying what was buffered.
    ///
    /// Attaching again replaces the previous writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffered records cannot be written. The writer
    /// is attached regardless.
    pub fn attach<W>(&self, writer: W) -> io::Result<()>
    where
        W: Write + Send + 'static,
    {
        let mut writer: Box<dyn Write + Send> = Box::new(writer);
        let mut state = self.lock();

        let mut result = Ok(());
        if state.dropped > 0 {
            let notice = format!(
                "{} log records were dropped before the log sink was attached\n",
                state.dropped
            );
            result = writer.write_all(notice.as_bytes());
        }
        while let Some(record) = state.pending.pop_front() {
            if result.is_ok() {
                result = writer.write_all(&record);
            }
        }
        if result.is_ok() {
            result = writer.flush();
        }

        state.target = Some(writer);
        result
    }

    /// Whether a writer is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lock().target.is_some()
    }

    /// Records currently held in memory.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Records discarded because the buffer overflowed while detached.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

impl Default for DeferredSink {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl fmt::Debug for DeferredSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("DeferredSink")
            .field("attached", &state.target.is_some())
            .field("pending", &state.pending.len())
            .field("dropped", &state.dropped)
            .finish()
    }
}

/// Writer for a single formatted record; commits to the sink on drop.
pub struct RecordWriter {
    sink: DeferredSink,
    record: Vec<u8>,
}

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if !self.record.is_empty() {
            let record = std::mem::take(&mut self.record);
            self.sink.lock().commit(record);
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredSink {
    type Writer = RecordWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter {
            sink: self.clone(),
            record: Vec::new(),
        }
    }
}
