//! Output sinks for assembled documents.

use crate::Assembly;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Receives every finished document. Called from worker threads.
pub trait Printer: Send + Sync {
    fn print(&self, assembly: &Assembly);
}

impl<P: Printer + ?Sized> Printer for Arc<P> {
    fn print(&self, assembly: &Assembly) {
        (**self).print(assembly);
    }
}

/// Writes one document per line to any writer.
///
/// Write failures are logged and otherwise swallowed: a broken sink must not
/// take the worker down with it.
#[derive(Debug)]
pub struct WriterPrinter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write(&self, assembly: &Assembly) -> io::Result<()> {
        let mut out = self.out.lock();
        out.write_all(assembly.as_str().as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

impl WriterPrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Printer for WriterPrinter<W> {
    fn print(&self, assembly: &Assembly) {
        if let Err(_e) = self.write(assembly) {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, bytes = assembly.len(), "failed to write document");
        }
    }
}

/// Keeps every document in memory.
#[derive(Debug, Default)]
pub struct CollectingPrinter {
    documents: Mutex<Vec<String>>,
}

impl CollectingPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of the documents printed so far.
    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().clone()
    }

    /// Removes and returns the documents printed so far.
    pub fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.documents.lock())
    }
}

impl Printer for CollectingPrinter {
    fn print(&self, assembly: &Assembly) {
        self.documents.lock().push(assembly.as_str().to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_document_per_line() {
        let printer = WriterPrinter::new(Vec::new());
        printer.print(&Assembly::new("{\"a\":1}".into()));
        printer.print(&Assembly::new("{}".into()));
        let written = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(written, "{\"a\":1}\n{}\n");
    }

    #[test]
    fn swallows_write_failures() {
        let printer = WriterPrinter::new(Broken);
        printer.print(&Assembly::new("{}".into()));
    }

    #[test]
    fn collects_and_drains_documents() {
        let printer = Arc::new(CollectingPrinter::new());
        let shared: Arc<dyn Printer> = printer.clone();
        shared.print(&Assembly::new("x".into()));
        assert_eq!(printer.documents(), ["x"]);
        assert_eq!(printer.take(), ["x"]);
        assert!(printer.is_empty());
    }
}
