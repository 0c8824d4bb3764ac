//! Event printer unit.
//!
//! Formats every event it listens to as `name: data` and writes one line per
//! turn, oldest first.

use std::collections::VecDeque;
use std::io::Write;

use tracing::warn;

use fancontrol_bus::{Event, EventRegistry, Unit, UnitContext};

/// Writes events to a stream.
pub struct PrintOutput<W> {
    name: String,
    events: Vec<String>,
    backlog: VecDeque<String>,
    out: W,
}

impl<W: Write> PrintOutput<W> {
    /// Print `events` to `out`.
    pub fn new(out: W, events: Vec<String>) -> Self {
        PrintOutput {
            name: "print_output".to_string(),
            events,
            backlog: VecDeque::new(),
            out,
        }
    }

    /// Lines waiting to be written.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Write the oldest waiting line, if any.
    pub fn flush_one(&mut self) -> std::io::Result<bool> {
        match self.backlog.pop_front() {
            Some(line) => {
                writeln!(self.out, "{}", line)?;
                self.out.flush()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Unit for PrintOutput<W> {
    type Listener = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, registry: &mut EventRegistry<()>) {
        for event in &self.events {
            registry.register(event.clone(), ());
        }
    }

    fn notify(&mut self, _listener: &(), event: &Event, _ctx: &UnitContext) {
        self.backlog.push_back(event.to_string());
    }

    fn update(&mut self, _ctx: &UnitContext) {
        if let Err(e) = self.flush_one() {
            warn!("could not write event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_line_per_flush_in_order() {
        let mut output = PrintOutput::new(Vec::new(), vec!["*".to_string()]);
        output.backlog.push_back(Event::new("a", json!(1)).to_string());
        output.backlog.push_back(Event::new("b", json!({"x": 2})).to_string());

        assert!(output.flush_one().unwrap());
        assert_eq!(output.backlog_len(), 1);
        assert!(output.flush_one().unwrap());
        assert!(!output.flush_one().unwrap());

        let text = String::from_utf8(output.into_inner()).unwrap();
        assert_eq!(text, "a: 1\nb: {\"x\":2}\n");
    }
}
