//! Alert-burst decoding state machine.
//!
//! Consumes tone-symbol events polled from the tuner while locked and
//! recognizes the burst-tone header protocol: preamble, a header prefixed
//! with `ZCZC` repeated in three copies, and the `NNNN` end-of-message
//! marker. The protocol carries no checksum; integrity comes from 2-of-3
//! bit voting across the repeated bursts plus the restricted character set.
//!
//! Every state carries a deadline. A deadline miss, an unfindable prefix, or
//! an inconsistent triple discards the partial message and returns the
//! decoder to [`DecoderState::AwaitingEndOfMessage`]; a partial burst is
//! never escalated to an alarm.

use core::fmt;

use heapless::Vec;

use crate::Monotonic;
use crate::config::ReceiverConfig;
use crate::tuner::TunerEvent;

/// Longest header burst we will buffer, in bytes.
pub const MAX_HEADER_LENGTH: usize = 268;

/// Shortest voted header that can be a complete message
/// (`ZCZC-ORG-EEE-PSSCCC+TTTT-JJJHHMM-LLLLLLLL-`).
pub const MIN_HEADER_LENGTH: usize = 42;

/// Header bursts arrive in this many copies.
const BURST_COPIES: usize = 3;

// Once synchronized, search this many bytes for a start prefix: 16 bytes of
// remaining preamble, 4 bytes of prefix, one byte of margin.
const PREFIX_SEARCH_LEN: u8 = 21;

// Bit-error tolerance when matching the 4-byte start/end prefixes.
const MAX_PREFIX_BIT_ERRORS: u32 = 2;

// A burst ends once this many bytes outside the allowed set arrive.
const MAX_INVALID_BYTES: u8 = 10;

const HEADER_PREFIX: u32 = u32::from_be_bytes(*b"ZCZC");
const EOM_PREFIX: u32 = u32::from_be_bytes(*b"NNNN");

/// Storage for one header burst.
pub type HeaderBuffer = Vec<u8, MAX_HEADER_LENGTH>;

/// A header that survived voting and validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SameHeader {
    bytes: HeaderBuffer,
    bit_error_count: u16,
}

impl SameHeader {
    /// Voted header bytes, starting with the `ZCZC` prefix.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Header text. Validation restricts the bytes to ASCII, so this never
    /// loses data.
    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    /// Total bit disagreements corrected while voting.
    #[must_use]
    pub const fn bit_error_count(&self) -> u16 {
        self.bit_error_count
    }
}

impl fmt::Display for SameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder phases.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecoderState {
    /// Idle default. Despite the name, a fresh preamble is accepted here
    /// directly; no end-of-message marker is required first.
    AwaitingEndOfMessage,
    /// Synchronized; searching the byte stream for a start prefix.
    AwaitingPreamble,
    /// Accumulating header bytes for the current burst copy.
    AwaitingHeader,
    /// Transient: a consistent header was just assembled. Observable only
    /// through the emitted [`DecoderOutput`]; the decoder resets before
    /// returning.
    HeaderReady,
}

/// Why a partial message was dropped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiscardReason {
    /// The active timeout elapsed mid-message.
    DeadlineExpired,
    /// No start prefix appeared within the search window.
    PrefixNotFound,
    /// Three copies arrived but did not vote into a valid header.
    InconsistentBursts,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::DeadlineExpired => f.write_str("deadline-expired"),
            DiscardReason::PrefixNotFound => f.write_str("prefix-not-found"),
            DiscardReason::InconsistentBursts => f.write_str("inconsistent-bursts"),
        }
    }
}

/// Terminal result of a decoding attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecoderOutput {
    /// A consistent header was assembled and accepted.
    HeaderAccepted(SameHeader),
    /// An end-of-message burst was recognized.
    EndOfMessage,
    /// A partial or corrupt message was dropped.
    Discarded(DiscardReason),
}

/// The burst decoding state machine.
#[derive(Clone, Debug)]
pub struct BurstDecoder<I> {
    state: DecoderState,
    deadline: Option<I>,
    prefix_window: u32,
    prefix_seen: u8,
    burst: HeaderBuffer,
    invalid_bytes: u8,
    bursts: Vec<HeaderBuffer, BURST_COPIES>,
    test_window: bool,
}

impl<I: Monotonic> BurstDecoder<I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitingEndOfMessage,
            deadline: None,
            prefix_window: 0,
            prefix_seen: 0,
            burst: HeaderBuffer::new(),
            invalid_bytes: 0,
            bursts: Vec::new(),
            test_window: false,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> DecoderState {
        self.state
    }

    /// Deadline for the phase in progress, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<I> {
        self.deadline
    }

    /// Opens or closes the self-test window, switching the active timeout.
    pub fn set_test_window(&mut self, open: bool) {
        self.test_window = open;
    }

    /// Returns `true` while the self-test window is open.
    #[must_use]
    pub const fn test_window_open(&self) -> bool {
        self.test_window
    }

    /// Discards all in-progress state. The test window is left as-is.
    pub fn reset(&mut self) {
        self.state = DecoderState::AwaitingEndOfMessage;
        self.deadline = None;
        self.prefix_window = 0;
        self.prefix_seen = 0;
        self.burst.clear();
        self.invalid_bytes = 0;
        self.bursts.clear();
    }

    /// Enforces the active deadline. Call once per service tick.
    pub fn check_deadline(&mut self, now: I) -> Option<DecoderOutput> {
        if self.state == DecoderState::AwaitingEndOfMessage {
            return None;
        }
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.reset();
        Some(DecoderOutput::Discarded(DiscardReason::DeadlineExpired))
    }

    /// Feeds one polled tuner event through the state machine.
    pub fn handle_event(
        &mut self,
        event: TunerEvent,
        now: I,
        config: &ReceiverConfig,
    ) -> Option<DecoderOutput> {
        match event {
            TunerEvent::PreambleSync => {
                if self.state == DecoderState::AwaitingHeader {
                    // The previous burst ended without a carrier drop.
                    if let Some(output) = self.finish_burst(now, config) {
                        return Some(output);
                    }
                }
                self.begin_prefix_search(now, config);
                None
            }
            TunerEvent::Byte(byte) => match self.state {
                DecoderState::AwaitingEndOfMessage | DecoderState::HeaderReady => None,
                DecoderState::AwaitingPreamble => self.search_prefix(byte, now, config),
                DecoderState::AwaitingHeader => self.accumulate(byte, now, config),
            },
            TunerEvent::BurstEnd => {
                if self.state == DecoderState::AwaitingHeader {
                    self.finish_burst(now, config)
                } else {
                    None
                }
            }
        }
    }

    fn arm_deadline(&mut self, now: I, config: &ReceiverConfig) {
        self.deadline = Some(now + config.decoder_timeout(self.test_window));
    }

    fn begin_prefix_search(&mut self, now: I, config: &ReceiverConfig) {
        self.state = DecoderState::AwaitingPreamble;
        self.prefix_window = 0;
        self.prefix_seen = 0;
        self.arm_deadline(now, config);
    }

    fn search_prefix(
        &mut self,
        byte: u8,
        now: I,
        config: &ReceiverConfig,
    ) -> Option<DecoderOutput> {
        self.prefix_window = (self.prefix_window << 8) | u32::from(byte);
        self.prefix_seen = self.prefix_seen.saturating_add(1);

        if self.prefix_seen >= 4 {
            let end_errors = (self.prefix_window ^ EOM_PREFIX).count_ones();
            if end_errors <= MAX_PREFIX_BIT_ERRORS {
                self.reset();
                return Some(DecoderOutput::EndOfMessage);
            }

            let start_errors = (self.prefix_window ^ HEADER_PREFIX).count_ones();
            if start_errors <= MAX_PREFIX_BIT_ERRORS {
                let prefix = self.prefix_window.to_be_bytes();
                self.state = DecoderState::AwaitingHeader;
                self.burst.clear();
                self.invalid_bytes = 0;
                let _ = self.burst.extend_from_slice(&prefix);
                self.arm_deadline(now, config);
                return None;
            }
        }

        if self.prefix_seen > PREFIX_SEARCH_LEN {
            self.reset();
            return Some(DecoderOutput::Discarded(DiscardReason::PrefixNotFound));
        }

        None
    }

    fn accumulate(&mut self, byte: u8, now: I, config: &ReceiverConfig) -> Option<DecoderOutput> {
        if !is_allowed_byte(byte) {
            self.invalid_bytes = self.invalid_bytes.saturating_add(1);
            if self.invalid_bytes > MAX_INVALID_BYTES {
                return self.finish_burst(now, config);
            }
        }
        if self.burst.push(byte).is_err() {
            return self.finish_burst(now, config);
        }
        None
    }

    fn finish_burst(&mut self, now: I, config: &ReceiverConfig) -> Option<DecoderOutput> {
        let burst = core::mem::take(&mut self.burst);
        self.invalid_bytes = 0;

        if burst_is_eom(&burst) {
            self.reset();
            return Some(DecoderOutput::EndOfMessage);
        }

        let _ = self.bursts.push(burst);
        if self.bursts.len() < BURST_COPIES {
            // Await the next copy; each copy refreshes the deadline.
            self.begin_prefix_search(now, config);
            return None;
        }

        let verdict = vote_and_validate(&self.bursts);
        if verdict.is_some() {
            self.state = DecoderState::HeaderReady;
        }
        self.reset();
        Some(match verdict {
            Some(header) => DecoderOutput::HeaderAccepted(header),
            None => DecoderOutput::Discarded(DiscardReason::InconsistentBursts),
        })
    }
}

impl<I: Monotonic> Default for BurstDecoder<I> {
    fn default() -> Self {
        Self::new()
    }
}

// True if the burst starts with the end-of-message sequence. Two bytes are
// enough to tell `NNNN` from a header once voting is still pending.
fn burst_is_eom(burst: &[u8]) -> bool {
    burst.len() >= 2 && burst[0] == b'N' && burst[1] == b'N'
}

// Combine three burst copies into one header estimate.
//
// Bytes past a copy's end vote as zero, which falls outside the allowed set
// and terminates the output, so differing copy lengths resolve themselves.
fn vote_and_validate(bursts: &[HeaderBuffer]) -> Option<SameHeader> {
    let mut out = HeaderBuffer::new();
    let mut bit_errors: u16 = 0;

    for index in 0..MAX_HEADER_LENGTH {
        let b0 = byte_at(bursts, 0, index);
        let b1 = byte_at(bursts, 1, index);
        let b2 = byte_at(bursts, 2, index);

        let (voted, disputes) = bit_vote(b0, b1, b2);
        // The top bit is never part of the character set; a set top bit after
        // voting counts as one more corrected error.
        let masked = voted & 0x7f;
        if !is_allowed_byte(masked) {
            break;
        }

        bit_errors += disputes as u16 + u16::from(voted != masked);
        if out.push(masked).is_err() {
            break;
        }
    }

    if header_structure_ok(&out) {
        Some(SameHeader {
            bytes: out,
            bit_error_count: bit_errors,
        })
    } else {
        None
    }
}

// Positional validation of the voted header:
// `ZCZC-ORG-EEE-PSSCCC…+TTTT-JJJHHMM-LLLLLLLL-` with one or more six-digit
// location groups. Trailing bytes past the final dash are tolerated.
fn header_structure_ok(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_HEADER_LENGTH || !bytes.starts_with(b"ZCZC-") {
        return false;
    }

    // Originator and event code, three alphanumerics each.
    let Some(after_org) = expect_field(bytes, 5, 3, b'-') else {
        return false;
    };
    if bytes.len() < after_org + 3
        || !bytes[after_org..after_org + 3]
            .iter()
            .all(u8::is_ascii_alphanumeric)
    {
        return false;
    }
    let mut index = after_org + 3;

    // One or more `-PSSCCC` location groups.
    let mut groups = 0_u8;
    while index < bytes.len() && bytes[index] == b'-' {
        if bytes.len() < index + 7 || !bytes[index + 1..index + 7].iter().all(u8::is_ascii_digit) {
            return false;
        }
        index += 7;
        groups += 1;
        if groups > 31 {
            return false;
        }
    }
    if groups == 0 {
        return false;
    }

    // Purge time `+TTTT`.
    if index >= bytes.len() || bytes[index] != b'+' {
        return false;
    }
    if bytes.len() < index + 5 || !bytes[index + 1..index + 5].iter().all(u8::is_ascii_digit) {
        return false;
    }
    index += 5;

    // Issue time `-JJJHHMM`.
    if index >= bytes.len() || bytes[index] != b'-' {
        return false;
    }
    if bytes.len() < index + 8 || !bytes[index + 1..index + 8].iter().all(u8::is_ascii_digit) {
        return false;
    }
    index += 8;

    // Callsign `-LLLLLLLL-`, any allowed characters.
    if bytes.len() < index + 10 || bytes[index] != b'-' {
        return false;
    }
    bytes[index + 9] == b'-'
}

// Checks a fixed-width alphanumeric field followed by a separator; returns
// the index just past the separator.
fn expect_field(bytes: &[u8], start: usize, width: usize, separator: u8) -> Option<usize> {
    let end = start + width;
    if bytes.len() <= end {
        return None;
    }
    if !bytes[start..end].iter().all(u8::is_ascii_alphanumeric) {
        return None;
    }
    if bytes[end] != separator {
        return None;
    }
    Some(end + 1)
}

fn byte_at(bursts: &[HeaderBuffer], copy: usize, index: usize) -> u8 {
    bursts
        .get(copy)
        .and_then(|burst| burst.get(index))
        .copied()
        .unwrap_or(0)
}

// Two-of-three bit voting: for every bit, pick the state at least two copies
// agree on. Returns the voted byte and the count of disputed bits.
const fn bit_vote(b0: u8, b1: u8, b2: u8) -> (u8, u32) {
    let pair0 = !(b0 ^ b1);
    let pair1 = !(b1 ^ b2);
    let pair2 = !(b0 ^ b2);
    (
        (b0 & pair0) | (b2 & pair1) | (b2 & pair2),
        (pair0 & pair1 & pair2).count_zeros(),
    )
}

// The character set permitted inside a header burst. The preamble byte
// (0xAB) is deliberately excluded so residual preamble terminates voting.
const fn is_allowed_byte(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9'
        | b'A'..=b'Z'
        | b'a'..=b'z'
        | b'-' | b'+' | b'?' | b'(' | b')' | b'[' | b']'
        | b'.' | b'_' | b',' | b'/' | b' ')
}
