//! NewReno congestion control.
//!
//! Maintains a congestion window in bytes and gates the sender through
//! [`NewRenoController::can_send`]. Acks grow the window (exponentially in
//! slow start, linearly in congestion avoidance), losses halve it and open
//! a recovery period. Recovery ends implicitly: only acks of packets sent
//! after the recovery started grow the window again.
//!
//! The controller is driven from two sides, the sender and the
//! loss-detection thread, so its counters sit behind one lock and every
//! operation is a short critical section. Operations are total; the
//! controller never errors. Callers supply `now` so tests can pin time.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, trace};

use crate::packet::PacketNumber;

/// Congestion control constants.
pub mod constants {
    /// Assumed maximum datagram size in bytes.
    pub const MAX_DATAGRAM_SIZE: u64 = 1200;

    /// The window never shrinks below two datagrams.
    pub const MINIMUM_WINDOW: u64 = 2 * MAX_DATAGRAM_SIZE;

    /// Initial congestion window.
    pub const INITIAL_WINDOW: u64 = 10 * MAX_DATAGRAM_SIZE;

    /// Window divisor on a congestion event.
    pub const LOSS_REDUCTION_FACTOR: u64 = 2;
}

/// What the sender recorded when a packet left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    /// Number assigned to the packet.
    pub packet_number: PacketNumber,
    /// When the packet was handed to the socket.
    pub time_sent: Instant,
    /// Size on the wire in bytes.
    pub size: u64,
    /// Whether the packet counts toward bytes in flight.
    pub in_flight: bool,
}

/// Growth regime, derived from the window and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Window below the threshold; grows by one packet per acked packet.
    SlowStart,
    /// Window at or past the threshold; grows by about one datagram per
    /// window of acked data.
    CongestionAvoidance,
}

#[derive(Debug)]
struct WindowState {
    bytes_in_flight: u64,
    congestion_window: u64,
    slow_start_threshold: u64,
    recovery_start: Option<Instant>,
}

impl WindowState {
    fn grows_from(&self, time_sent: Instant) -> bool {
        self.recovery_start.is_none_or(|start| time_sent > start)
    }
}

/// NewReno congestion controller.
#[derive(Debug)]
pub struct NewRenoController {
    state: Mutex<WindowState>,
}

impl Default for NewRenoController {
    fn default() -> Self {
        Self::new()
    }
}

impl NewRenoController {
    /// Create a controller with the initial window and an unbounded
    /// threshold.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WindowState {
                bytes_in_flight: 0,
                congestion_window: constants::INITIAL_WINDOW,
                slow_start_threshold: u64::MAX,
                recovery_start: None,
            }),
        }
    }

    #[cfg(test)]
    fn with_state(
        bytes_in_flight: u64,
        congestion_window: u64,
        slow_start_threshold: u64,
        recovery_start: Option<Instant>,
    ) -> Self {
        Self {
            state: Mutex::new(WindowState {
                bytes_in_flight,
                congestion_window,
                slow_start_threshold,
                recovery_start,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the window admits another packet of `next_packet_size`.
    pub fn can_send(&self, next_packet_size: u64) -> bool {
        let state = self.state();
        state.bytes_in_flight + next_packet_size <= state.congestion_window
    }

    /// Record a sent packet.
    pub fn on_packet_sent(&self, packet: &PacketInfo) {
        if !packet.in_flight {
            return;
        }
        let mut state = self.state();
        state.bytes_in_flight += packet.size;
        trace!(
            target: "cc",
            pn = packet.packet_number,
            in_flight = state.bytes_in_flight,
            "packet sent"
        );
    }

    /// Process acknowledged packets in input order.
    ///
    /// Packets sent before the current recovery started shrink bytes in
    /// flight but do not grow the window.
    pub fn on_packets_acked(&self, acked: &[PacketInfo]) {
        let mut state = self.state();
        for packet in acked {
            if packet.in_flight {
                state.bytes_in_flight = state.bytes_in_flight.saturating_sub(packet.size);
            }
            if !state.grows_from(packet.time_sent) {
                continue;
            }
            if state.congestion_window < state.slow_start_threshold {
                state.congestion_window += packet.size;
            } else {
                state.congestion_window +=
                    constants::MAX_DATAGRAM_SIZE * packet.size / state.congestion_window;
            }
        }
        trace!(
            target: "cc",
            cwnd = state.congestion_window,
            in_flight = state.bytes_in_flight,
            "acked {} packets",
            acked.len()
        );
    }

    /// Process lost packets in input order.
    ///
    /// A non-empty list triggers at most one congestion event, keyed on
    /// the send time of the lost packet with the largest number.
    pub fn on_packets_lost(&self, now: Instant, lost: &[PacketInfo]) {
        let mut state = self.state();
        for packet in lost {
            if packet.in_flight {
                state.bytes_in_flight = state.bytes_in_flight.saturating_sub(packet.size);
            }
        }
        if let Some(largest) = lost.iter().max_by_key(|packet| packet.packet_number) {
            Self::on_congestion_event(&mut state, now, largest.time_sent);
        }
    }

    // A loss inside the current recovery period does not halve again.
    fn on_congestion_event(state: &mut WindowState, now: Instant, time_sent: Instant) {
        if !state.grows_from(time_sent) {
            return;
        }
        state.recovery_start = Some(now);
        state.congestion_window = (state.congestion_window / constants::LOSS_REDUCTION_FACTOR)
            .max(constants::MINIMUM_WINDOW);
        state.slow_start_threshold = state.congestion_window;
        debug!(
            target: "cc",
            cwnd = state.congestion_window,
            "congestion event, window halved"
        );
    }

    /// Current congestion window in bytes.
    pub fn congestion_window(&self) -> u64 {
        self.state().congestion_window
    }

    /// Bytes sent but neither acknowledged nor declared lost.
    pub fn bytes_in_flight(&self) -> u64 {
        self.state().bytes_in_flight
    }

    /// Current slow-start threshold.
    pub fn slow_start_threshold(&self) -> u64 {
        self.state().slow_start_threshold
    }

    /// Current growth regime.
    pub fn mode(&self) -> Mode {
        let state = self.state();
        if state.congestion_window < state.slow_start_threshold {
            Mode::SlowStart
        } else {
            Mode::CongestionAvoidance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::constants::*;
    use super::*;
    use std::time::Duration;

    fn sent(pn: u64, time_sent: Instant, size: u64) -> PacketInfo {
        PacketInfo {
            packet_number: pn,
            time_sent,
            size,
            in_flight: true,
        }
    }

    #[test]
    fn test_initial_state() {
        let cc = NewRenoController::new();
        assert_eq!(cc.congestion_window(), 12_000);
        assert_eq!(cc.bytes_in_flight(), 0);
        assert_eq!(cc.mode(), Mode::SlowStart);
        assert!(cc.can_send(12_000));
        assert!(!cc.can_send(12_001));
    }

    #[test]
    fn test_slow_start_growth() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        let packets = [
            sent(1, now, 1200),
            sent(2, now + Duration::from_millis(1), 1200),
            sent(3, now + Duration::from_millis(2), 1200),
        ];
        for packet in &packets {
            cc.on_packet_sent(packet);
        }
        assert_eq!(cc.bytes_in_flight(), 3600);

        cc.on_packets_acked(&packets);
        assert_eq!(cc.congestion_window(), 15_600);
        assert_eq!(cc.bytes_in_flight(), 0);
        assert_eq!(cc.mode(), Mode::SlowStart);
    }

    #[test]
    fn test_congestion_avoidance_growth() {
        let cc = NewRenoController::with_state(1200, 14_400, 14_400, None);
        assert_eq!(cc.mode(), Mode::CongestionAvoidance);

        cc.on_packets_acked(&[sent(10, Instant::now(), 1200)]);
        assert_eq!(cc.congestion_window(), 14_500);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn test_loss_halves_window() {
        let cc = NewRenoController::with_state(8000, 20_000, u64::MAX, None);
        let now = Instant::now();
        cc.on_packets_lost(now, &[sent(5, now - Duration::from_millis(5), 1200)]);

        assert_eq!(cc.congestion_window(), 10_000);
        assert_eq!(cc.slow_start_threshold(), 10_000);
        assert_eq!(cc.bytes_in_flight(), 6800);
        assert_eq!(cc.mode(), Mode::CongestionAvoidance);
    }

    #[test]
    fn test_second_loss_in_same_recovery_is_ignored() {
        let cc = NewRenoController::with_state(8000, 20_000, u64::MAX, None);
        let now = Instant::now();
        cc.on_packets_lost(now, &[sent(5, now - Duration::from_millis(5), 1200)]);
        assert_eq!(cc.congestion_window(), 10_000);

        // sent before the recovery started
        cc.on_packets_lost(
            now + Duration::from_millis(1),
            &[sent(6, now - Duration::from_millis(3), 1200)],
        );
        assert_eq!(cc.congestion_window(), 10_000);
        assert_eq!(cc.bytes_in_flight(), 5600);
    }

    #[test]
    fn test_loss_after_recovery_halves_again() {
        let cc = NewRenoController::with_state(8000, 20_000, u64::MAX, None);
        let now = Instant::now();
        cc.on_packets_lost(now, &[sent(5, now - Duration::from_millis(5), 1200)]);
        assert_eq!(cc.congestion_window(), 10_000);

        // sent after the recovery started
        cc.on_packets_lost(
            now + Duration::from_millis(10),
            &[sent(9, now + Duration::from_millis(2), 1200)],
        );
        assert_eq!(cc.congestion_window(), 5000);
    }

    #[test]
    fn test_ack_before_recovery_does_not_grow_window() {
        let cc = NewRenoController::with_state(8000, 20_000, u64::MAX, None);
        let now = Instant::now();
        cc.on_packets_lost(now, &[sent(5, now - Duration::from_millis(5), 1200)]);
        assert_eq!(cc.congestion_window(), 10_000);

        cc.on_packets_acked(&[sent(4, now - Duration::from_millis(10), 1200)]);
        assert_eq!(cc.bytes_in_flight(), 5600);
        assert_eq!(cc.congestion_window(), 10_000);
    }

    #[test]
    fn test_minimum_window_floor() {
        let cc = NewRenoController::with_state(0, MINIMUM_WINDOW, MINIMUM_WINDOW, None);
        let now = Instant::now();
        cc.on_packets_lost(now, &[sent(1, now - Duration::from_millis(1), 1200)]);
        assert_eq!(cc.congestion_window(), MINIMUM_WINDOW);
        assert_eq!(cc.slow_start_threshold(), MINIMUM_WINDOW);
    }

    #[test]
    fn test_loss_event_keyed_on_largest_packet_number() {
        let cc = NewRenoController::with_state(3600, 20_000, u64::MAX, None);
        let now = Instant::now();
        // a first loss opens recovery
        cc.on_packets_lost(now, &[sent(5, now - Duration::from_millis(5), 1200)]);
        assert_eq!(cc.congestion_window(), 10_000);

        // the largest-numbered packet was sent inside recovery, so its
        // older companion does not matter
        cc.on_packets_lost(
            now + Duration::from_millis(10),
            &[
                sent(9, now + Duration::from_millis(2), 1200),
                sent(6, now - Duration::from_millis(3), 1200),
            ],
        );
        assert_eq!(cc.congestion_window(), 5000);
    }

    #[test]
    fn test_bytes_in_flight_accounting() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        let a = sent(1, now, 1000);
        let b = sent(2, now, 800);
        let c = sent(3, now, 600);
        cc.on_packet_sent(&a);
        cc.on_packet_sent(&b);
        cc.on_packet_sent(&c);
        assert_eq!(cc.bytes_in_flight(), 2400);

        cc.on_packets_acked(&[b]);
        assert_eq!(cc.bytes_in_flight(), 1600);

        cc.on_packets_lost(now + Duration::from_millis(1), &[c]);
        assert_eq!(cc.bytes_in_flight(), 1000);

        cc.on_packets_acked(&[a]);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn test_bytes_in_flight_never_goes_negative() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        let packet = sent(1, now, 1200);
        cc.on_packet_sent(&packet);
        cc.on_packets_acked(&[packet]);
        // a late duplicate report must not underflow
        cc.on_packets_acked(&[packet]);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn test_non_in_flight_packets_are_not_counted() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        let ack_only = PacketInfo {
            packet_number: 1,
            time_sent: now,
            size: 40,
            in_flight: false,
        };
        cc.on_packet_sent(&ack_only);
        assert_eq!(cc.bytes_in_flight(), 0);
    }

    #[test]
    fn test_slow_start_is_monotonic() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        let mut last = cc.congestion_window();
        for pn in 0..20 {
            let packet = sent(pn, now + Duration::from_millis(pn as u64), 1200);
            cc.on_packet_sent(&packet);
            cc.on_packets_acked(&[packet]);
            let cwnd = cc.congestion_window();
            assert!(cwnd >= last);
            last = cwnd;
        }
    }

    #[test]
    fn test_window_never_below_minimum() {
        let cc = NewRenoController::new();
        let mut when = Instant::now();
        for pn in 0..10 {
            when += Duration::from_millis(10);
            cc.on_packets_lost(when, &[sent(pn, when - Duration::from_millis(1), 1200)]);
            assert!(cc.congestion_window() >= MINIMUM_WINDOW);
            assert!(cc.slow_start_threshold() >= MINIMUM_WINDOW);
        }
    }

    #[test]
    fn test_can_send_tracks_the_window() {
        let cc = NewRenoController::new();
        let now = Instant::now();
        cc.on_packet_sent(&sent(1, now, 11_000));
        assert!(cc.can_send(1000));
        assert!(!cc.can_send(1001));
    }
}
