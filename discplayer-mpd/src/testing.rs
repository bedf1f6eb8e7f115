// SPDX-License-Identifier: GPL-3.0-only

//! Scripted connector and session for client tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::connection::{Connector, Session};
use crate::error::{MpdError, Result};
use crate::protocol::{Command, Frame};

#[derive(Default)]
pub struct Script {
    /// Every request, in wire form without the newline
    pub calls: Vec<String>,
    /// Consumed front to back; an exhausted queue answers with an empty `OK`
    pub responses: VecDeque<Result<Frame>>,
    pub dials: usize,
    /// Number of leading dials that are refused
    pub refuse_dials: usize,
    pub closes: usize,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub script: Arc<Mutex<Script>>,
}

impl FakeConnector {
    pub fn respond(&self, response: Result<Frame>) -> &Self {
        self.script.lock().unwrap().responses.push_back(response);
        self
    }

    pub fn ok(&self) -> &Self {
        self.respond(Ok(Frame::new()))
    }

    pub fn refuse_dials(&self, count: usize) {
        self.script.lock().unwrap().refuse_dials = count;
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn dials(&self) -> usize {
        self.script.lock().unwrap().dials
    }

    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn dial(&self) -> Result<Box<dyn Session>> {
        let mut script = self.script.lock().unwrap();
        script.dials += 1;
        if script.dials <= script.refuse_dials {
            return Err(MpdError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
        }))
    }

    fn describe(&self) -> String {
        "fake://mpd".to_string()
    }
}

struct FakeSession {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Session for FakeSession {
    async fn request(&mut self, command: &Command) -> Result<Frame> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(command.to_string());
        script.responses.pop_front().unwrap_or_else(|| Ok(Frame::new()))
    }

    async fn close(&mut self) {
        self.script.lock().unwrap().closes += 1;
    }
}

pub fn broken_pipe() -> MpdError {
    MpdError::Io(std::io::ErrorKind::BrokenPipe.into())
}

pub fn ack(code: u32, command: &str, message: &str) -> MpdError {
    MpdError::Ack {
        code,
        command: command.to_string(),
        message: message.to_string(),
    }
}
