//! Pull-based sample renderer over a tape item sequence.
//!
//! Edges are converted to runs of constant-level samples with
//! error-feedback rounding: each edge emits
//! `round(cumulative_tstates × rate / clock) − samples_already_emitted`
//! samples, so the rendered length of any prefix is within one sample of
//! exact and rounding error never accumulates.
//!
//! The consumer drives the stream through [`SampleStream::fill`], which
//! renders as much as fits in the caller's buffer and reports the stream
//! state. Stop-the-tape surfaces as [`RenderState::Stopped`] rather than
//! an error; cancellation is observed at edge boundaries only, so output
//! always ends on a whole edge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::block::{REFERENCE_CLOCK, TapeItem};
use crate::error::RenderError;
use crate::pulse::{PulseEdge, PulseEncoder, pulse_list_edges, tone_edges};

/// T-states per millisecond at the reference clock.
const TSTATES_PER_MS: u32 = REFERENCE_CLOCK / 1000;

/// Output sample rate and level.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    /// Samples per second.
    pub sample_rate: u32,
    /// Peak level; the line renders as ±amplitude, silence as −amplitude.
    pub amplitude: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            amplitude: 0.5,
        }
    }
}

/// Shared cancellation flag, checked between edges.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stream state reported by [`SampleStream::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// More samples follow.
    Running,
    /// A stop-the-tape marker was reached; call
    /// [`SampleStream::resume`] to continue.
    Stopped,
    /// The sequence is exhausted (or was cancelled).
    Finished,
}

enum Step {
    Edge(PulseEdge),
    Stop,
    Finished,
}

/// Renderer over one item sequence. Restarting means constructing a new
/// stream.
pub struct SampleStream<'a> {
    items: &'a [TapeItem],
    config: RenderConfig,
    cancel: CancelToken,
    /// Next item to start once the current edge source is drained.
    index: usize,
    edges: Option<Box<dyn Iterator<Item = PulseEdge> + 'a>>,
    /// Open loops: (body start index, repetitions left).
    loops: Vec<(usize, u16)>,
    /// Current edge partially written out: (sample value, samples left).
    pending: Option<(f32, u64)>,
    cum_tstates: u64,
    samples_emitted: u64,
    stopped: bool,
    finished: bool,
}

impl<'a> SampleStream<'a> {
    #[must_use]
    pub fn new(items: &'a [TapeItem], config: RenderConfig) -> Self {
        Self {
            items,
            config,
            cancel: CancelToken::new(),
            index: 0,
            edges: None,
            loops: Vec::new(),
            pending: None,
            cum_tstates: 0,
            samples_emitted: 0,
            stopped: false,
            finished: false,
        }
    }

    /// Token that cancels this stream from another thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Continue past a stop-the-tape marker.
    pub fn resume(&mut self) {
        self.stopped = false;
    }

    /// Render into `buf`, returning how many samples were written and the
    /// stream state afterwards. Fewer samples than `buf.len()` are written
    /// only when the stream stops, finishes, or is cancelled.
    ///
    /// # Errors
    ///
    /// [`RenderError::Encode`] for a block whose profile cannot be
    /// played; [`RenderError::Logic`] for a malformed loop structure.
    pub fn fill(&mut self, buf: &mut [f32]) -> Result<(usize, RenderState), RenderError> {
        let mut written = 0;

        loop {
            if self.stopped {
                return Ok((written, RenderState::Stopped));
            }
            if self.finished {
                return Ok((written, RenderState::Finished));
            }

            if let Some((value, remaining)) = self.pending {
                let space = (buf.len() - written) as u64;
                let n = remaining.min(space) as usize;
                buf[written..written + n].fill(value);
                written += n;

                let left = remaining - n as u64;
                self.pending = if left > 0 { Some((value, left)) } else { None };
                if written == buf.len() {
                    return Ok((written, RenderState::Running));
                }
                continue;
            }

            match self.next_edge()? {
                Step::Edge(edge) => {
                    self.cum_tstates += u64::from(edge.duration);
                    let clock = u64::from(REFERENCE_CLOCK);
                    let target = (self.cum_tstates * u64::from(self.config.sample_rate)
                        + clock / 2)
                        / clock;
                    let n = target - self.samples_emitted;
                    self.samples_emitted = target;
                    if n > 0 {
                        let value = if edge.level {
                            self.config.amplitude
                        } else {
                            -self.config.amplitude
                        };
                        self.pending = Some((value, n));
                    }
                }
                Step::Stop => {
                    self.stopped = true;
                    return Ok((written, RenderState::Stopped));
                }
                Step::Finished => {
                    self.finished = true;
                    return Ok((written, RenderState::Finished));
                }
            }
        }
    }

    /// Pull the next edge, advancing through items as sources drain.
    fn next_edge(&mut self) -> Result<Step, RenderError> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(samples = self.samples_emitted, "render cancelled");
                return Ok(Step::Finished);
            }

            if let Some(edges) = &mut self.edges {
                if let Some(edge) = edges.next() {
                    return Ok(Step::Edge(edge));
                }
                self.edges = None;
            }

            let Some(item) = self.items.get(self.index) else {
                return Ok(Step::Finished);
            };
            self.index += 1;

            match item {
                TapeItem::Block(block) => {
                    self.edges = Some(Box::new(PulseEncoder::new(block)?));
                }
                TapeItem::Tone { pulse_len, count } => {
                    self.edges = Some(Box::new(tone_edges(*pulse_len, *count)));
                }
                TapeItem::Pulses(pulses) => {
                    self.edges = Some(Box::new(pulse_list_edges(pulses)));
                }
                TapeItem::Pause(ms) => {
                    if *ms > 0 {
                        return Ok(Step::Edge(PulseEdge {
                            level: false,
                            duration: u32::from(*ms) * TSTATES_PER_MS,
                        }));
                    }
                }
                TapeItem::StopTheTape => return Ok(Step::Stop),
                TapeItem::LoopStart(count) => {
                    self.loops.push((self.index, *count));
                }
                TapeItem::LoopEnd => {
                    let Some(top) = self.loops.last_mut() else {
                        return Err(RenderError::Logic("loop end without loop start"));
                    };
                    top.1 = top.1.saturating_sub(1);
                    if top.1 > 0 {
                        self.index = top.0;
                    } else {
                        self.loops.pop();
                    }
                }
                TapeItem::GroupStart(name) => tracing::debug!(group = %name, "group start"),
                TapeItem::GroupEnd => tracing::debug!("group end"),
                TapeItem::Text(text) => tracing::info!(%text, "tape annotation"),
            }
        }
    }
}

/// Render a whole sequence into memory, resuming automatically across
/// stop-the-tape markers.
///
/// # Errors
///
/// Propagates any [`RenderError`] from the stream.
pub fn render_to_vec(items: &[TapeItem], config: RenderConfig) -> Result<Vec<f32>, RenderError> {
    let mut stream = SampleStream::new(items, config);
    let mut out = Vec::new();
    let mut buf = [0.0f32; 4096];

    loop {
        let (n, state) = stream.fill(&mut buf)?;
        out.extend_from_slice(&buf[..n]);
        match state {
            RenderState::Running => {}
            RenderState::Stopped => stream.resume(),
            RenderState::Finished => return Ok(out),
        }
    }
}
