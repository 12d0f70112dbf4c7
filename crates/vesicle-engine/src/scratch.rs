//! Scratch memory for reduction contributions, kept on the CPU backend so
//! repeated invocations reuse one buffer.

/// Grow-only contribution buffer handed out front to back.
#[derive(Debug, Default)]
pub(crate) struct ScratchRegion {
    buf: Vec<f64>,
    offset: usize,
}

impl ScratchRegion {
    /// Make room for `slots` values. Growing discards outstanding handouts.
    pub(crate) fn reserve(&mut self, slots: usize) {
        if slots > self.buf.len() {
            self.buf.resize(slots, 0.0);
            self.offset = 0;
        }
    }

    /// Hand out the next `count` slots, zeroed, or `None` past the end.
    pub(crate) fn alloc(&mut self, count: usize) -> Option<&mut [f64]> {
        let start = self.offset;
        let end = start.checked_add(count).filter(|&end| end <= self.buf.len())?;
        self.offset = end;
        let slots = &mut self.buf[start..end];
        slots.fill(0.0);
        Some(slots)
    }

    pub(crate) fn reset(&mut self) {
        self.offset = 0;
    }
}
