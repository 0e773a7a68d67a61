use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, Operation};

use crate::pms7003::commands;
use crate::report::Publish;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bus failure")]
pub struct BusError;

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Register-file backed I2C device.
pub struct RegisterBus {
    pub regs: [u8; 256],
    /// Every register write as `(register, payload)`.
    pub writes: Vec<(u8, Vec<u8>)>,
    /// First register of every read.
    pub reads: Vec<u8>,
    pub addresses: Vec<u8>,
    /// Fail this many transactions before behaving.
    pub fail_next: usize,
    /// Fail every transaction that touches this register.
    pub fail_register: Option<u8>,
    /// Fail the next transaction that touches this register, once.
    pub fail_once: Option<u8>,
}

impl Default for RegisterBus {
    fn default() -> Self {
        Self {
            regs: [0; 256],
            writes: Vec::new(),
            reads: Vec::new(),
            addresses: Vec::new(),
            fail_next: 0,
            fail_register: None,
            fail_once: None,
        }
    }
}

impl RegisterBus {
    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        let start = usize::from(start);
        self.regs[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn should_fail(&mut self, register: u8) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        if self.fail_once == Some(register) {
            self.fail_once = None;
            return true;
        }
        self.fail_register == Some(register)
    }
}

impl embedded_hal_async::i2c::ErrorType for RegisterBus {
    type Error = BusError;
}

impl embedded_hal_async::i2c::I2c for RegisterBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.addresses.push(address);
        match operations {
            [Operation::Write(request), Operation::Read(response)] => {
                let register = request[0];
                if self.should_fail(register) {
                    return Err(BusError);
                }
                self.reads.push(register);
                let start = usize::from(register);
                response.copy_from_slice(&self.regs[start..start + response.len()]);
                Ok(())
            }
            [Operation::Write(request)] => {
                let register = request[0];
                if self.should_fail(register) {
                    return Err(BusError);
                }
                self.writes.push((register, request[1..].to_vec()));
                Ok(())
            }
            _ => Err(BusError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("serial failure")]
pub struct SerialError;

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

/// Scripted UART. Reads block forever once `rx` runs dry, unless `closed`.
#[derive(Default)]
pub struct MockSerial {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub flushes: usize,
    /// Every call to `write`, failed ones included.
    pub write_calls: usize,
    /// Queued into `rx` every time a complete read request is written.
    pub answer: Option<Vec<u8>>,
    /// Maximum bytes handed out per read; 0 means no limit.
    pub read_chunk: usize,
    /// Maximum bytes accepted per write.
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
    /// Fail this many writes before behaving.
    pub failing_writes: usize,
    /// Reads on an empty `rx` report end of stream instead of blocking.
    pub closed: bool,
}

impl MockSerial {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn commands(&self) -> Vec<u8> {
        self.tx.chunks(7).map(|frame| frame[2]).collect()
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = SerialError;
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl embedded_io_async::Read for MockSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.rx.is_empty() {
            if self.closed {
                return Ok(0);
            }
            return core::future::pending().await;
        }
        let mut n = buf.len().min(self.rx.len());
        if self.read_chunk > 0 {
            n = n.min(self.read_chunk);
        }
        for slot in &mut buf[..n] {
            *slot = self.rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl embedded_io_async::Write for MockSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(SerialError);
        }
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(SerialError);
        }
        let n = buf.len().min(self.write_limit.unwrap_or(usize::MAX));
        self.tx.extend_from_slice(&buf[..n]);
        if buf[..n] == commands::READ {
            if let Some(answer) = &self.answer {
                self.rx.extend(answer.iter().copied());
            }
        }
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

/// Delay that returns immediately and remembers what it was asked for.
#[derive(Default)]
pub struct RecordingDelay {
    pub ms: Vec<u32>,
    pub ns: Vec<u32>,
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.ns.push(ns);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.ms.push(ms);
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Vec<(String, String)>,
    pub fail: bool,
}

impl Publish for RecordingPublisher {
    type Error = ();

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }
        self.messages.push((
            String::from(topic),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }
}
