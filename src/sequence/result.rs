use tokio::sync::oneshot;

/// Create a result slot: one writer for the step that produces the result,
/// one reader for whoever reports it once the sequence has finished.
pub fn result_slot() -> (ResultWriter, ResultReader) {
    let (tx, rx) = oneshot::channel();
    (ResultWriter { tx }, ResultReader { rx })
}

#[derive(Debug)]
pub struct ResultWriter {
    tx: oneshot::Sender<String>,
}

impl ResultWriter {
    /// Store the result. A reader that is already gone is not an error.
    pub fn fill(self, value: String) {
        let _ = self.tx.send(value);
    }
}

#[derive(Debug)]
pub struct ResultReader {
    rx: oneshot::Receiver<String>,
}

impl ResultReader {
    /// Take the result, or an empty string when nothing was written.
    ///
    /// Only meaningful after the sequence owning the writer has finished:
    /// a writer that is still alive also reads as empty.
    pub fn take(mut self) -> String {
        self.rx.try_recv().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_slot() {
        let (writer, reader) = result_slot();
        writer.fill("42".to_string());
        assert_eq!(reader.take(), "42");
    }

    #[test]
    fn test_dropped_writer_reads_empty() {
        let (writer, reader) = result_slot();
        drop(writer);
        assert_eq!(reader.take(), "");
    }

    #[test]
    fn test_fill_after_reader_dropped() {
        let (writer, reader) = result_slot();
        drop(reader);
        writer.fill("ignored".to_string());
    }
}
