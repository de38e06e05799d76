/// Effects used by the voices: low-pass filter, ping-pong delay, reverb
use std::f32::consts::PI;

/// Fixed-length sample delay with an optional decay applied on read.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    pointer: usize,
    decay_factor: f32,
}

impl DelayLine {
    /// decay_factor: 1.0 = no decay
    pub fn new(seconds: f32, sample_rate: f32, decay_factor: f32) -> Self {
        let size = (seconds * sample_rate).round().max(0.0) as usize;
        Self {
            buffer: vec![0.0; size],
            pointer: 0,
            decay_factor,
        }
    }

    pub fn peek(&self) -> f32 {
        self.buffer
            .get(self.pointer)
            .map_or(0.0, |s| s * self.decay_factor)
    }

    pub fn pop(&mut self, input: f32) -> f32 {
        if self.buffer.is_empty() {
            return input;
        }
        let out = self.peek();
        self.buffer[self.pointer] = input;
        self.pointer = (self.pointer + 1) % self.buffer.len();
        out
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Decay factor that brings a signal from 1.0 down to 0.001 over
/// `decay_seconds` when recirculated every `delay_seconds`.
fn recirculating_decay(delay_seconds: f32, decay_seconds: f32) -> f32 {
    0.001_f32.powf(delay_seconds / decay_seconds)
}

#[derive(Debug, Clone)]
struct CombFilter {
    delay: DelayLine,
}

impl CombFilter {
    fn new(delay_seconds: f32, decay_seconds: f32, sample_rate: f32) -> Self {
        Self {
            delay: DelayLine::new(
                delay_seconds,
                sample_rate,
                recirculating_decay(delay_seconds, decay_seconds),
            ),
        }
    }

    fn pop(&mut self, input: f32) -> f32 {
        let out = self.delay.peek();
        self.delay.pop(input + out);
        out
    }
}

#[derive(Debug, Clone)]
struct AllPassFilter {
    delay: DelayLine,
    gain: f32,
}

impl AllPassFilter {
    fn new(delay_seconds: f32, decay_seconds: f32, sample_rate: f32) -> Self {
        Self {
            delay: DelayLine::new(delay_seconds, sample_rate, 1.0),
            gain: recirculating_decay(delay_seconds, decay_seconds),
        }
    }

    fn pop(&mut self, input: f32) -> f32 {
        let vm = self.delay.peek();
        let vn = input - vm * self.gain;
        self.delay.pop(vn);
        vm + vn * self.gain
    }
}

/// Schroeder reverb: four parallel combs into two series all-passes,
/// blended with the dry signal by `wet`.
#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllPassFilter>,
    wet: f32,
}

impl Reverb {
    pub fn new(decay_seconds: f32, wet: f32, sample_rate: f32) -> Self {
        // BasicSynth's comb and all-pass constants.
        let combs = [0.0297, 0.0371, 0.0411, 0.0437]
            .into_iter()
            .map(|delay| CombFilter::new(delay, decay_seconds, sample_rate))
            .collect();
        let allpasses = [(0.0050, 0.09683), (0.0017, 0.03292)]
            .into_iter()
            .map(|(delay, decay)| AllPassFilter::new(delay, decay, sample_rate))
            .collect();
        Self {
            combs,
            allpasses,
            wet: wet.clamp(0.0, 1.0),
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let comb_sum: f32 = self.combs.iter_mut().map(|c| c.pop(input)).sum::<f32>() / 4.0;
        let tail = self
            .allpasses
            .iter_mut()
            .fold(comb_sum, |signal, allpass| allpass.pop(signal));
        input * (1.0 - self.wet) + tail * self.wet
    }
}

/// A delay that bounces between the left and right channels. Output is
/// fully wet.
#[derive(Debug, Clone)]
pub struct PingPongDelay {
    left: DelayLine,
    right: DelayLine,
    feedback: f32,
}

impl PingPongDelay {
    pub fn new(delay_seconds: f32, feedback: f32, sample_rate: f32) -> Self {
        Self {
            left: DelayLine::new(delay_seconds, sample_rate, 1.0),
            right: DelayLine::new(delay_seconds, sample_rate, 1.0),
            feedback: feedback.clamp(0.0, 0.99),
        }
    }

    pub fn process(&mut self, input: f32) -> (f32, f32) {
        let left_out = self.left.peek();
        let right_out = self.right.peek();
        self.left.pop(input + right_out * self.feedback);
        self.right.pop(left_out);
        (left_out, right_out)
    }
}

/// 12 dB/octave biquad low-pass (RBJ cookbook).
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl LowPassFilter {
    pub fn new(cutoff: f32, q: f32, sample_rate: f32) -> Self {
        let cutoff = cutoff.clamp(10.0, sample_rate * 0.49);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}
