//! Waiting for the instrument to accept the next command.
//!
//! Before every command the instrument is polled with `*OPC?` until it answers `1`.
//! A poll whose reply does not arrive within the read deadline is repeated
//! immediately; a poll answered with anything else is repeated after a short pause.
use std::{
    thread,
    time::{Duration, Instant},
};

use scope_protocol::Query;

use crate::{
    config::Config,
    error::Error,
    session::{Session, Transport, is_timeout},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateState {
    Waiting,
    Ready,
}

/// What a single `*OPC?` poll observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    Ready,
    /// The instrument answered, but not with `1`.
    Busy(String),
    TimedOut,
}

pub struct ReadinessGate {
    state: GateState,
    polls: u32,
    /// Polls sent whose reply has not been read yet.
    unanswered: u32,
    read_timeout: Duration,
    write_timeout: Duration,
    poll_interval: Duration,
    max_wait: Option<Duration>,
}

impl ReadinessGate {
    pub fn new(config: &Config) -> ReadinessGate {
        ReadinessGate {
            state: GateState::Waiting,
            polls: 0,
            unanswered: 0,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            poll_interval: config.poll_interval,
            max_wait: config.ready_timeout,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Number of polls since the gate last started waiting.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Sends one `*OPC?` and evaluates the reply.
    ///
    /// Polls that timed out earlier may still be answered. Those late replies
    /// arrive first and are discarded; only the reply to this poll is evaluated.
    pub fn poll<T: Transport>(&mut self, session: &mut Session<T>) -> Result<PollOutcome, Error> {
        self.polls += 1;
        log::debug!("Polling {} (attempt {})", Query::OperationComplete, self.polls);

        session
            .set_write_deadline(self.write_timeout)
            .map_err(Error::Handshake)?;
        session
            .send_line(Query::OperationComplete.as_str())
            .map_err(Error::Handshake)?;
        self.unanswered += 1;

        loop {
            session
                .set_read_deadline(self.read_timeout)
                .map_err(Error::Handshake)?;
            let reply = match session.read_line() {
                Ok(reply) => reply,
                Err(err) if is_timeout(&err) => return Ok(PollOutcome::TimedOut),
                Err(err) => return Err(Error::Handshake(err)),
            };
            self.unanswered -= 1;
            if self.unanswered > 0 {
                log::debug!("Discarding late reply {:?} to an earlier poll", reply);
                continue;
            }
            if reply.trim() == "1" {
                self.state = GateState::Ready;
                return Ok(PollOutcome::Ready);
            }
            return Ok(PollOutcome::Busy(reply));
        }
    }

    /// Polls until the instrument reports ready.
    ///
    /// Returns the number of polls performed. Fails with [`Error::NotReady`] once
    /// the configured maximum wait has elapsed.
    pub fn wait<T: Transport>(&mut self, session: &mut Session<T>) -> Result<u32, Error> {
        self.state = GateState::Waiting;
        self.polls = 0;
        let start = Instant::now();

        while self.state == GateState::Waiting {
            if let Some(max_wait) = self.max_wait
                && self.polls > 0
                && start.elapsed() >= max_wait
            {
                return Err(Error::NotReady {
                    waited: start.elapsed(),
                    polls: self.polls,
                });
            }
            match self.poll(session)? {
                PollOutcome::Ready => log::debug!("Instrument ready after {} polls", self.polls),
                PollOutcome::Busy(reply) => {
                    log::debug!("Instrument busy (replied {:?})", reply);
                    thread::sleep(self.poll_interval);
                }
                PollOutcome::TimedOut => log::debug!("Timeout waiting for reply, retrying"),
            }
        }
        Ok(self.polls)
    }
}
