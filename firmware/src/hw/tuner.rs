//! Blocking I2C wrapper for the Si4707 weather-band receiver.
//!
//! Only the command subset the core needs is implemented: power-up, channel
//! tuning, receive-quality status, and the SAME event/data buffer. The chip
//! detects the burst preamble and buffers header bytes itself; this wrapper
//! replays that buffer to the core as a polled byte stream.

use core::time::Duration;

use embassy_stm32::gpio::Output;
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_time::block_for;
use heapless::Deque;

use receiver_core::channels::Channel;
use receiver_core::tuner::{QualitySample, TunerDriver, TunerError, TunerEvent};

/// Bus address with SEN strapped low.
const ADDRESS: u8 = 0x11;

const CMD_POWER_UP: u8 = 0x01;
const CMD_GET_INT_STATUS: u8 = 0x14;
const CMD_WB_TUNE_FREQ: u8 = 0x50;
const CMD_WB_RSQ_STATUS: u8 = 0x53;
const CMD_WB_SAME_STATUS: u8 = 0x54;

// POWER_UP arguments: crystal oscillator on, weather-band receive function,
// analog audio output.
const POWER_UP_ARG1: u8 = 0x13;
const POWER_UP_ARG2: u8 = 0x05;

const STATUS_CTS: u8 = 0x80;
const STATUS_ERR: u8 = 0x40;
const STATUS_STC: u8 = 0x01;

const SAME_HDRRDY: u8 = 0x01;
const SAME_PREDET: u8 = 0x02;
const SAME_EOMDET: u8 = 0x08;

const SAME_INTACK: u8 = 0x01;
const SAME_CLRBUF: u8 = 0x02;

/// Bytes returned per SAME buffer read.
const SAME_CHUNK: u8 = 8;

const CTS_POLL_INTERVAL: Duration = Duration::from_millis(1);
const CTS_POLL_LIMIT: u32 = 500;
const STC_POLL_INTERVAL: Duration = Duration::from_millis(5);
const STC_POLL_LIMIT: u32 = 200;

/// Si4707 driver state.
pub struct Si4707<'d> {
    bus: I2c<'d, Blocking>,
    reset: Output<'d>,
    pending: Deque<TunerEvent, 16>,
    message_length: u8,
    consumed: u8,
    draining: bool,
}

impl<'d> Si4707<'d> {
    #[must_use]
    pub fn new(bus: I2c<'d, Blocking>, reset: Output<'d>) -> Self {
        Self {
            bus,
            reset,
            pending: Deque::new(),
            message_length: 0,
            consumed: 0,
            draining: false,
        }
    }

    /// Releases the reset line and brings the chip into weather-band receive.
    pub fn power_up(&mut self) -> Result<(), TunerError> {
        self.reset.set_low();
        block_for(embassy_duration(Duration::from_millis(10)));
        self.reset.set_high();
        block_for(embassy_duration(Duration::from_millis(10)));

        self.command(&[CMD_POWER_UP, POWER_UP_ARG1, POWER_UP_ARG2])?;
        self.wait_cts()
    }

    fn command(&mut self, bytes: &[u8]) -> Result<(), TunerError> {
        self.bus
            .blocking_write(ADDRESS, bytes)
            .map_err(|_| TunerError::Bus)
    }

    fn response(&mut self, buffer: &mut [u8]) -> Result<(), TunerError> {
        self.bus
            .blocking_read(ADDRESS, buffer)
            .map_err(|_| TunerError::Bus)
    }

    fn wait_cts(&mut self) -> Result<(), TunerError> {
        let mut status = [0_u8];
        for _ in 0..CTS_POLL_LIMIT {
            self.response(&mut status)?;
            if status[0] & STATUS_ERR != 0 {
                return Err(TunerError::Bus);
            }
            if status[0] & STATUS_CTS != 0 {
                return Ok(());
            }
            block_for(embassy_duration(CTS_POLL_INTERVAL));
        }
        Err(TunerError::Unresponsive)
    }

    fn wait_tune_complete(&mut self) -> Result<(), TunerError> {
        let mut status = [0_u8];
        for _ in 0..STC_POLL_LIMIT {
            self.command(&[CMD_GET_INT_STATUS])?;
            self.wait_cts()?;
            self.response(&mut status)?;
            if status[0] & STATUS_STC != 0 {
                return Ok(());
            }
            block_for(embassy_duration(STC_POLL_INTERVAL));
        }
        Err(TunerError::Unresponsive)
    }

    fn same_status(&mut self, acknowledge: u8, read_address: u8) -> Result<[u8; 12], TunerError> {
        self.command(&[CMD_WB_SAME_STATUS, acknowledge, read_address])?;
        self.wait_cts()?;
        let mut response = [0_u8; 12];
        self.response(&mut response)?;
        Ok(response)
    }

    // Pulls at most one chunk of work from the chip per call; the service
    // loop keeps polling until the queue runs dry.
    fn refresh(&mut self) -> Result<(), TunerError> {
        if self.draining {
            return self.drain_chunk();
        }

        let status = self.same_status(SAME_INTACK, 0)?;
        let flags = status[1];

        if flags & SAME_PREDET != 0 {
            let _ = self.pending.push_back(TunerEvent::PreambleSync);
        }
        if flags & SAME_HDRRDY != 0 {
            self.message_length = status[3];
            self.consumed = 0;
            self.draining = true;
        }
        if flags & SAME_EOMDET != 0 {
            // The chip reports end-of-message as a flag; replay it as the
            // burst the decoder expects.
            let _ = self.pending.push_back(TunerEvent::PreambleSync);
            for _ in 0..4 {
                let _ = self.pending.push_back(TunerEvent::Byte(b'N'));
            }
            let _ = self.pending.push_back(TunerEvent::BurstEnd);
            self.clear_buffer()?;
        }
        Ok(())
    }

    fn drain_chunk(&mut self) -> Result<(), TunerError> {
        let remaining = self.message_length.saturating_sub(self.consumed);
        if remaining == 0 {
            let _ = self.pending.push_back(TunerEvent::BurstEnd);
            self.draining = false;
            return self.clear_buffer();
        }

        let response = self.same_status(0, self.consumed)?;
        let take = remaining.min(SAME_CHUNK);
        for byte in &response[4..4 + take as usize] {
            let _ = self.pending.push_back(TunerEvent::Byte(*byte));
        }
        self.consumed += take;
        Ok(())
    }

    fn clear_buffer(&mut self) -> Result<(), TunerError> {
        self.message_length = 0;
        self.consumed = 0;
        self.same_status(SAME_INTACK | SAME_CLRBUF, 0).map(|_| ())
    }
}

impl TunerDriver for Si4707<'_> {
    fn tune(&mut self, channel: Channel) -> Result<(), TunerError> {
        // The tune frequency is programmed in 2.5 kHz units.
        let code = channel.frequency_khz * 2 / 5;
        let [high, low] = (code as u16).to_be_bytes();
        self.command(&[CMD_WB_TUNE_FREQ, 0x00, high, low])?;
        self.wait_cts()?;
        self.wait_tune_complete()?;

        self.pending.clear();
        self.message_length = 0;
        self.consumed = 0;
        self.draining = false;
        Ok(())
    }

    fn read_quality(&mut self) -> Result<QualitySample, TunerError> {
        self.command(&[CMD_WB_RSQ_STATUS, 0x01])?;
        self.wait_cts()?;
        let mut response = [0_u8; 6];
        self.response(&mut response)?;

        let rssi = f32::from(response[4] as i8);
        let snr = f32::from(response[5] as i8);
        Ok(QualitySample::new(snr, rssi))
    }

    fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        self.refresh()?;
        Ok(self.pending.pop_front())
    }

    fn pause(&mut self, interval: Duration) {
        block_for(embassy_duration(interval));
    }
}

fn embassy_duration(interval: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(interval.as_micros() as u64)
}
