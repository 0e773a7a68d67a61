use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use thiserror::Error;

use crate::fault::Fault;

pub mod commands;
mod frame;

pub use frame::{ANSWER_LEN, AnswerFrame, BODY_LEN, COMMAND_LEN, Command, FrameError, checksum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error<E> {
    #[error("serial transport error: {0:?}")]
    Transport(E),
    #[error("partial write: {0} of 7 bytes")]
    PartialWrite(usize),
    #[error("partial read: {0} of 30 bytes after the start marker")]
    PartialRead(usize),
    #[error("frame does not begin with the start marker")]
    MissingStart,
    #[error("check code mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch { expected: u16, calculated: u16 },
    #[error("no start marker before the deadline")]
    Timeout,
    #[error("serial stream closed")]
    Closed,
}

impl<E> Error<E> {
    pub fn fault(&self) -> Fault {
        match self {
            Error::Transport(_) | Error::Timeout | Error::Closed => Fault::Transport,
            _ => Fault::Protocol,
        }
    }
}

impl<E> From<FrameError> for Error<E> {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::MissingStart => Error::MissingStart,
            FrameError::ChecksumMismatch {
                expected,
                calculated,
            } => Error::ChecksumMismatch {
                expected,
                calculated,
            },
        }
    }
}

/// Read deadlines for [`Pms7003::receive`], in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveTimeouts {
    /// Upper bound on the search for the start marker. `None` searches forever.
    pub resync_ms: Option<u32>,
    /// How long a single read of the frame body may stall.
    pub byte_ms: u32,
}

/// PMS7003 particulate sensor on a UART.
#[derive(Debug)]
pub struct Pms7003<U> {
    uart: U,
}

impl<U> Pms7003<U> {
    pub fn new(uart: U) -> Self {
        Self { uart }
    }

    pub fn release(self) -> U {
        self.uart
    }
}

impl<U> Pms7003<U>
where
    U: Read + Write + ReadReady,
{
    /// Writes one command frame.
    pub async fn send(&mut self, command: Command) -> Result<(), Error<U::Error>> {
        let frame = command.encode();
        let written = self.uart.write(&frame).await.map_err(Error::Transport)?;
        if written != COMMAND_LEN {
            return Err(Error::PartialWrite(written));
        }
        self.uart.flush().await.map_err(Error::Transport)?;

        Ok(())
    }

    pub async fn change_mode_passive(&mut self) -> Result<(), Error<U::Error>> {
        self.send(Command::PassiveMode).await
    }

    pub async fn change_mode_active(&mut self) -> Result<(), Error<U::Error>> {
        self.send(Command::ActiveMode).await
    }

    pub async fn sleep(&mut self) -> Result<(), Error<U::Error>> {
        self.send(Command::Sleep).await
    }

    pub async fn wakeup(&mut self) -> Result<(), Error<U::Error>> {
        self.send(Command::Wakeup).await
    }

    /// Asks for one measurement; only meaningful in passive mode.
    pub async fn read_request(&mut self) -> Result<(), Error<U::Error>> {
        self.send(Command::Read).await
    }

    /// Drops whatever is already sitting in the receive buffer.
    pub async fn discard_input(&mut self) -> Result<usize, Error<U::Error>> {
        let mut scratch = [0u8; ANSWER_LEN];
        let mut dropped = 0;
        while self.uart.read_ready().map_err(Error::Transport)? {
            let n = self.uart.read(&mut scratch).await.map_err(Error::Transport)?;
            if n == 0 {
                break;
            }
            dropped += n;
        }

        Ok(dropped)
    }

    /// Waits for the next answer frame.
    ///
    /// Bytes preceding the start marker are discarded, which resynchronizes
    /// after line noise or a frame that was only partially buffered.
    pub async fn receive<D: DelayNs>(
        &mut self,
        delay: &mut D,
        timeouts: ReceiveTimeouts,
    ) -> Result<AnswerFrame, Error<U::Error>> {
        match timeouts.resync_ms {
            Some(ms) => match select(self.find_start(), delay.delay_ms(ms)).await {
                Either::First(found) => found?,
                Either::Second(()) => return Err(Error::Timeout),
            },
            None => self.find_start().await?,
        }

        let mut bytes = [0u8; ANSWER_LEN];
        bytes[0] = commands::START_1;
        bytes[1] = commands::START_2;

        let mut filled = 0;
        while filled < BODY_LEN {
            let body = &mut bytes[2 + filled..];
            match select(self.uart.read(body), delay.delay_ms(timeouts.byte_ms)).await {
                Either::First(Ok(0)) | Either::Second(()) => break,
                Either::First(Ok(n)) => filled += n,
                Either::First(Err(err)) => return Err(Error::Transport(err)),
            }
        }
        if filled < BODY_LEN {
            return Err(Error::PartialRead(filled));
        }

        Ok(AnswerFrame::decode(&bytes)?)
    }

    async fn find_start(&mut self) -> Result<(), Error<U::Error>> {
        let mut previous = 0u8;
        let mut byte = [0u8; 1];
        loop {
            if self.uart.read(&mut byte).await.map_err(Error::Transport)? == 0 {
                return Err(Error::Closed);
            }
            if previous == commands::START_1 && byte[0] == commands::START_2 {
                return Ok(());
            }
            previous = byte[0];
        }
    }
}
