use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

use log::debug;

use crate::debugger::core::SessionEvent;

/// Everything the console loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One line typed by the user
    Input(String),
    /// Display update or message from the debug session
    Session(SessionEvent),
    /// Standard input reached end of file
    InputClosed,
}

impl From<SessionEvent> for Event {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}

/// Single-consumer event queue fed by the input thread and the session
pub struct Events {
    /// Event receiver channel
    rx: mpsc::Receiver<Event>,
    /// Event sender channel
    tx: mpsc::Sender<Event>,
}

impl Events {
    /// Queue fed by lines of standard input
    pub fn new() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    /// Queue fed by lines of any reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let input_tx = tx.clone();
        thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                if input_tx.send(Event::Input(line)).is_err() {
                    return;
                }
            }
            debug!("Input stream closed");
            let _ = input_tx.send(Event::InputClosed);
        });

        Self { rx, tx }
    }

    /// Sender handed to the debug session as publisher and message sink
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    /// Blocks until the next event arrives
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}
