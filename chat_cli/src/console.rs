use crate::interactive::formatting::inbound_line;
use libchat::{Message, MessageListener};
use log::*;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// The operator's output stream, shared by the read loop, the send tasks and the inbound transports.
///
/// Every call writes its text under one lock acquisition, so concurrent writers never interleave inside a line.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        Console { out: Arc::new(Mutex::new(Box::new(out))) }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Writes `text` without a trailing newline, e.g. for a prompt.
    pub fn print<S: AsRef<str>>(&self, text: S) {
        self.write(text.as_ref(), false)
    }

    pub fn println<S: AsRef<str>>(&self, text: S) {
        self.write(text.as_ref(), true)
    }

    fn write(&self, text: &str, newline: bool) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = if newline { writeln!(out, "{text}") } else { write!(out, "{text}") };
        if let Err(err) = result.and_then(|_| out.flush()) {
            warn!("Could not write to the console: {err}");
        }
    }
}

impl MessageListener for Console {
    fn message_received(&self, message: Message) {
        self.println(inbound_line(&message));
    }
}

/// An in-memory sink that can be handed to [`Console::new`] and read back afterwards.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn inbound_messages_are_prefixed() {
        let buffer = SharedBuffer::default();
        let console = Console::new(buffer.clone());
        console.message_received(Message::new("bob", "hey"));
        assert_eq!(buffer.contents(), "\nfrom [bob] >>> hey\n");
    }

    #[test]
    fn concurrent_lines_do_not_interleave() {
        let buffer = SharedBuffer::default();
        let console = Console::new(buffer.clone());
        let writers = (0..8)
            .map(|i| {
                let console = console.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        console.println(format!("writer-{i}-{}", "x".repeat(64)));
                    }
                })
            })
            .collect::<Vec<_>>();
        for writer in writers {
            writer.join().unwrap();
        }
        let contents = buffer.contents();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|line| line.starts_with("writer-") && line.ends_with(&"x".repeat(64))));
    }
}
