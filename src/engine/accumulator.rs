//! Frame accumulation.
//!
//! Incoming callback blocks have arbitrary length; analysis needs fixed frames
//! of `frame_size` samples every `hop` samples. Each channel of each stream has
//! its own [`RingBuffer`], and frame reconstruction always goes through
//! [`RingBuffer::wrapped_read`].

/// Which input a block of samples belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamId {
    Main,
    Sidechain,
}

/// Fixed-capacity sample ring with an unconsumed-sample count.
///
/// # Invariants
///
/// - `write_pos` is always in `0..capacity`
/// - `unconsumed <= capacity`
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Box<[f32]>,
    write_pos: usize,
    unconsumed: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0f32; capacity.max(1)].into_boxed_slice(),
            write_pos: 0,
            unconsumed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Samples written since the last reset that no frame has consumed yet.
    pub fn unconsumed(&self) -> usize {
        self.unconsumed
    }

    /// Append samples, overwriting the oldest history once full.
    pub fn write(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        let mut remaining = samples;
        while !remaining.is_empty() {
            let run = remaining.len().min(capacity - self.write_pos);
            self.data[self.write_pos..self.write_pos + run].copy_from_slice(&remaining[..run]);
            self.write_pos = (self.write_pos + run) % capacity;
            remaining = &remaining[run..];
        }
        self.unconsumed = (self.unconsumed + samples.len()).min(capacity);
    }

    /// Sample at `logical_offset` counted from the oldest sample held
    /// (`0` is the oldest, `capacity - 1` the most recent write).
    pub fn wrapped_read(&self, logical_offset: usize) -> f32 {
        let capacity = self.capacity();
        self.data[(self.write_pos + logical_offset % capacity) % capacity]
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first.
    pub fn read_latest(&self, out: &mut [f32]) {
        let start = self.capacity() - out.len().min(self.capacity());
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.wrapped_read(start + i);
        }
    }

    /// Release `count` samples after a frame has been processed.
    pub fn consume(&mut self, count: usize) {
        self.unconsumed = self.unconsumed.saturating_sub(count);
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write_pos = 0;
        self.unconsumed = 0;
    }
}

/// Per-channel rings for the main and sidechain streams.
#[derive(Debug)]
pub struct FrameAccumulator {
    main: Vec<RingBuffer>,
    sidechain: Vec<RingBuffer>,
    frame_size: usize,
    hop: usize,
}

impl FrameAccumulator {
    pub fn new(channels: usize, frame_size: usize, hop: usize) -> Self {
        Self {
            main: (0..channels).map(|_| RingBuffer::new(frame_size)).collect(),
            sidechain: (0..channels).map(|_| RingBuffer::new(frame_size)).collect(),
            frame_size,
            hop: hop.clamp(1, frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn channels(&self) -> usize {
        self.main.len()
    }

    fn rings(&self, stream: StreamId) -> &[RingBuffer] {
        match stream {
            StreamId::Main => &self.main,
            StreamId::Sidechain => &self.sidechain,
        }
    }

    pub fn write(&mut self, stream: StreamId, channel: usize, samples: &[f32]) {
        let rings = match stream {
            StreamId::Main => &mut self.main,
            StreamId::Sidechain => &mut self.sidechain,
        };
        if let Some(ring) = rings.get_mut(channel) {
            ring.write(samples);
        }
    }

    /// Samples still needed before `stream` holds a complete frame.
    pub fn samples_until_ready(&self, stream: StreamId) -> usize {
        let filled = self
            .rings(stream)
            .iter()
            .map(RingBuffer::unconsumed)
            .min()
            .unwrap_or(0);
        self.frame_size - filled
    }

    pub fn is_ready(&self, stream: StreamId) -> bool {
        !self.rings(stream).is_empty() && self.samples_until_ready(stream) == 0
    }

    /// A joint cycle may only run once both streams hold a full frame.
    pub fn both_ready(&self) -> bool {
        self.is_ready(StreamId::Main) && self.is_ready(StreamId::Sidechain)
    }

    /// Reconstruct the current frame of `stream`/`channel` in temporal order.
    pub fn read_frame(&self, stream: StreamId, channel: usize, out: &mut [f32]) {
        match self.rings(stream).get(channel) {
            Some(ring) => {
                let len = self.frame_size.min(out.len());
                ring.read_latest(&mut out[..len])
            }
            None => out.fill(0.0),
        }
    }

    /// Advance every ring by one hop after a cycle has consumed the frame.
    pub fn consume_hop(&mut self) {
        for ring in self.main.iter_mut().chain(self.sidechain.iter_mut()) {
            ring.consume(self.hop);
        }
    }

    pub fn clear(&mut self) {
        for ring in self.main.iter_mut().chain(self.sidechain.iter_mut()) {
            ring.clear();
        }
    }
}
