//! FFT-based DTMF decoding with debounce
//!
//! Each fixed-size window is Hamming-windowed and transformed with an FFT.
//! The four low-group and four high-group DTMF frequencies are scored by
//! looking for a local spectral peak in a ±1 bin neighborhood of the bin
//! nearest each expected frequency. A window that shows exactly one winner per
//! group, with comparable magnitudes, is a candidate digit.
//!
//! Candidates feed a small state machine:
//!
//! ```text
//! IDLE -> CANDIDATE -> CONFIRMED -> (cooldown) -> IDLE
//! ```
//!
//! A digit is confirmed after `required_count` identical consecutive
//! candidates. Confirming the same digit again inside the cooldown window is
//! suppressed, and an inactivity timer clears all state when no tone has been
//! seen for `cleanup_interval`.

use crate::config::DtmfConfig;
use crate::events::{EventSender, RepeaterEvent};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Low (row) group frequencies in Hz
pub const LOW_FREQUENCIES_HZ: [f64; 4] = [697.0, 770.0, 852.0, 941.0];

/// High (column) group frequencies in Hz
pub const HIGH_FREQUENCIES_HZ: [f64; 4] = [1209.0, 1336.0, 1477.0, 1633.0];

/// Errors raised by the decoder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DtmfError {
    #[error("Invalid window size: expected at least {expected} samples, got {actual}")]
    InvalidWindowSize { expected: usize, actual: usize },
}

/// The fixed 4×4 keypad mapping from (low index, high index) to a symbol
#[derive(Debug, Clone, Copy)]
pub struct DigitMatrix;

impl DigitMatrix {
    const KEYS: [[char; 4]; 4] = [
        ['1', '2', '3', 'A'],
        ['4', '5', '6', 'B'],
        ['7', '8', '9', 'C'],
        ['*', '0', '#', 'D'],
    ];

    /// Symbol at (low, high), or `None` if an index is out of range
    pub fn lookup(low: usize, high: usize) -> Option<char> {
        Self::KEYS.get(low).and_then(|row| row.get(high)).copied()
    }

    /// Matrix position of a symbol
    pub fn position(digit: char) -> Option<(usize, usize)> {
        let digit = digit.to_ascii_uppercase();
        Self::KEYS.iter().enumerate().find_map(|(low, row)| {
            row.iter()
                .position(|&key| key == digit)
                .map(|high| (low, high))
        })
    }

    /// (low Hz, high Hz) pair that encodes a symbol
    pub fn frequencies(digit: char) -> Option<(f64, f64)> {
        Self::position(digit).map(|(low, high)| (LOW_FREQUENCIES_HZ[low], HIGH_FREQUENCIES_HZ[high]))
    }
}

/// Debounce state owned by one decoder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionState {
    /// Current candidate digit
    pub last_digit: Option<char>,
    /// Identical consecutive detections of `last_digit`
    pub consecutive_count: u32,
    /// When the inactivity timer fires (reset after each tone)
    pub armed_timeout: Option<Instant>,
    /// Digit already confirmed for the keypress still sounding
    pub held_digit: Option<char>,
}

/// Decoder state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderPhase {
    Idle,
    Candidate,
}

/// How a single window was classified
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowClass {
    /// RMS below `min_signal_level`, FFT skipped
    BelowLevel,
    /// Energy present but no qualifying peak in either group
    NoTone,
    /// Only one group qualified, or the dual-tone purity check failed
    Ambiguous,
    /// A valid dual tone for this digit
    Digit(char),
}

/// Counters for observability and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Windows accepted for analysis
    pub windows: u64,
    /// Windows rejected as too short
    pub rejected_windows: u64,
    /// Windows short-circuited by the RMS gate
    pub below_level: u64,
    /// FFTs actually computed
    pub fft_runs: u64,
    /// Digits confirmed
    pub confirmations: u64,
}

/// Best qualifying peak in one frequency group
#[derive(Debug, Clone, Copy, PartialEq)]
struct GroupPeak {
    index: usize,
    magnitude: f32,
}

/// DTMF decoder for one audio stream
///
/// Windows must be fed strictly in arrival order; the debounce counter
/// depends on temporal adjacency.
///
/// # Example
/// ```
/// use repeater_core::audio::dtmf::DtmfDecoder;
/// use repeater_core::config::DtmfConfig;
///
/// let mut decoder = DtmfDecoder::new(48000, &DtmfConfig::default());
/// let silence = vec![0.0f32; decoder.window_size()];
/// assert_eq!(decoder.detect(&silence), None);
/// ```
pub struct DtmfDecoder {
    sample_rate: u32,
    window_size: usize,
    threshold: f32,
    min_signal_level: f32,
    required_count: u32,
    purity_ratio: f32,
    cooldown: Duration,
    cleanup_interval: Duration,
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed Hamming coefficients
    hamming: Vec<f32>,
    /// Pre-allocated FFT buffers
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    low_bins: [usize; 4],
    high_bins: [usize; 4],
    state: DetectionState,
    last_confirmed: Option<(char, Instant)>,
    stats: DecoderStats,
    events: Option<EventSender>,
}

impl DtmfDecoder {
    /// Create a decoder for `sample_rate` using the given settings
    pub fn new(sample_rate: u32, config: &DtmfConfig) -> Self {
        let window_size = config.window_size.max(16);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let denom = (window_size - 1) as f32;
        let hamming = (0..window_size)
            .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
            .collect();

        let bin = |freq: f64| (freq * window_size as f64 / sample_rate as f64).round() as usize;

        Self {
            sample_rate,
            window_size,
            threshold: config.threshold,
            min_signal_level: config.min_signal_level,
            required_count: config.required_count.max(1),
            purity_ratio: config.purity_ratio,
            cooldown: Duration::from_millis(config.cooldown_ms),
            cleanup_interval: Duration::from_millis(config.cleanup_interval_ms),
            fft,
            hamming,
            spectrum: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
            low_bins: LOW_FREQUENCIES_HZ.map(bin),
            high_bins: HIGH_FREQUENCIES_HZ.map(bin),
            state: DetectionState::default(),
            last_confirmed: None,
            stats: DecoderStats::default(),
            events: None,
        }
    }

    /// Publish confirmed digits as [`RepeaterEvent::DigitDetected`]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Analyze one window and return a confirmed digit, if any
    ///
    /// A window shorter than the configured size is logged and dropped.
    pub fn detect(&mut self, window: &[f32]) -> Option<char> {
        self.detect_at(window, Instant::now())
    }

    /// [`detect`](Self::detect) with an explicit timestamp
    pub fn detect_at(&mut self, window: &[f32], now: Instant) -> Option<char> {
        match self.try_detect_at(window, now) {
            Ok(digit) => digit,
            Err(e) => {
                tracing::warn!(error = %e, "dtmf_window_dropped");
                None
            }
        }
    }

    /// Analyze PCM16 samples
    pub fn detect_i16(&mut self, window: &[i16]) -> Option<char> {
        let samples: Vec<f32> = window.iter().map(|&s| s as f32 / 32768.0).collect();
        self.detect(&samples)
    }

    /// Analyze one window, reporting short windows as an error
    ///
    /// Only the first `window_size` samples of a longer window are used.
    pub fn try_detect_at(
        &mut self,
        window: &[f32],
        now: Instant,
    ) -> Result<Option<char>, DtmfError> {
        if window.len() < self.window_size {
            self.stats.rejected_windows += 1;
            return Err(DtmfError::InvalidWindowSize {
                expected: self.window_size,
                actual: window.len(),
            });
        }

        self.expire_inactive(now);
        self.stats.windows += 1;

        match self.classify(&window[..self.window_size]) {
            WindowClass::Digit(digit) => Ok(self.register_candidate(digit, now)),
            other => {
                tracing::trace!(class = ?other, "dtmf_no_digit");
                self.state.last_digit = None;
                self.state.consecutive_count = 0;
                self.state.held_digit = None;
                Ok(None)
            }
        }
    }

    /// Classify one full window without touching the debounce state
    fn classify(&mut self, window: &[f32]) -> WindowClass {
        debug_assert_eq!(window.len(), self.window_size);
        if rms(window) < self.min_signal_level {
            self.stats.below_level += 1;
            return WindowClass::BelowLevel;
        }

        self.compute_spectrum(window);

        let low = self.best_peak(&self.low_bins);
        let high = self.best_peak(&self.high_bins);

        match (low, high) {
            (None, None) => WindowClass::NoTone,
            (Some(low), Some(high)) => {
                let ratio = low.magnitude.min(high.magnitude) / low.magnitude.max(high.magnitude);
                if ratio <= self.purity_ratio {
                    return WindowClass::Ambiguous;
                }
                DigitMatrix::lookup(low.index, high.index)
                    .map(WindowClass::Digit)
                    .unwrap_or(WindowClass::Ambiguous)
            }
            _ => WindowClass::Ambiguous,
        }
    }

    /// Hamming window + FFT; magnitudes are read from `self.spectrum`
    fn compute_spectrum(&mut self, window: &[f32]) {
        for ((c, &x), &w) in self.spectrum.iter_mut().zip(window).zip(&self.hamming) {
            *c = Complex::new(x * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
        self.stats.fft_runs += 1;
    }

    /// Normalized magnitude of bin `k` (full-scale on-bin sine ≈ 0.54)
    fn magnitude(&self, k: usize) -> f32 {
        self.spectrum
            .get(k)
            .map(|c| c.norm() * 2.0 / self.window_size as f32)
            .unwrap_or(0.0)
    }

    /// Strongest local peak above `threshold * 1.5` across a group
    fn best_peak(&self, bins: &[usize; 4]) -> Option<GroupPeak> {
        let limit = self.threshold * 1.5;
        let nyquist = self.window_size / 2;
        let mut best: Option<GroupPeak> = None;

        for (index, &center) in bins.iter().enumerate() {
            for k in center.saturating_sub(1)..=center + 1 {
                if k == 0 || k + 1 >= nyquist {
                    continue;
                }
                let mag = self.magnitude(k);
                let is_peak = mag >= self.magnitude(k - 1) && mag >= self.magnitude(k + 1);
                let beats_best = best.map(|b| mag > b.magnitude).unwrap_or(true);
                if is_peak && mag > limit && beats_best {
                    best = Some(GroupPeak {
                        index,
                        magnitude: mag,
                    });
                }
            }
        }
        best
    }

    fn register_candidate(&mut self, digit: char, now: Instant) -> Option<char> {
        self.state.armed_timeout = Some(now + self.cleanup_interval);

        // One keypress confirms once, however long it is held
        if self.state.held_digit == Some(digit) {
            return None;
        }
        self.state.held_digit = None;

        if self.state.last_digit == Some(digit) {
            self.state.consecutive_count += 1;
        } else {
            self.state.last_digit = Some(digit);
            self.state.consecutive_count = 1;
        }

        tracing::trace!(
            digit = %digit,
            count = self.state.consecutive_count,
            "dtmf_candidate"
        );

        if self.state.consecutive_count < self.required_count {
            return None;
        }

        // CONFIRMED -> IDLE
        self.state.last_digit = None;
        self.state.consecutive_count = 0;
        self.state.held_digit = Some(digit);

        if let Some((previous, at)) = self.last_confirmed {
            if previous == digit && now.saturating_duration_since(at) < self.cooldown {
                tracing::debug!(digit = %digit, "dtmf_cooldown_suppressed");
                return None;
            }
        }

        self.last_confirmed = Some((digit, now));
        self.stats.confirmations += 1;
        tracing::info!(digit = %digit, "dtmf_confirmed");

        if let Some(events) = &self.events {
            events.emit(RepeaterEvent::DigitDetected { digit });
        }
        Some(digit)
    }

    /// Inactivity timer: clear everything once no tone has been seen for a while
    fn expire_inactive(&mut self, now: Instant) {
        if let Some(deadline) = self.state.armed_timeout {
            if now >= deadline {
                tracing::debug!("dtmf_inactivity_reset");
                self.force_reset();
            }
        }
    }

    /// Clear the debounce state and the cooldown memory
    pub fn force_reset(&mut self) {
        self.state = DetectionState::default();
        self.last_confirmed = None;
    }

    /// Current phase of the state machine
    pub fn phase(&self) -> DecoderPhase {
        if self.state.last_digit.is_some() {
            DecoderPhase::Candidate
        } else {
            DecoderPhase::Idle
        }
    }

    /// Current debounce state
    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    /// Decoder counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Required window length in samples
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Root-mean-square level of a window
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|x| x * x).sum();
    (sum / samples.len() as f32).sqrt()
}
