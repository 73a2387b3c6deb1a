//! Byte cursor shared by preencode, encode and decode

use crate::error::CodecError;

/// Cursor over a buffer.
///
/// `preencode` only advances `end` to size the buffer, `alloc` then reserves
/// exactly that many bytes and `encode` writes from `start`. Decoding reads
/// from `start` up to `end`, which frames narrow temporarily.
///
/// Frame lengths measured during `preencode` are recorded in traversal order
/// and replayed by `encode`.
#[derive(Debug, Default, Clone)]
pub struct State {
    pub start: usize,
    pub end: usize,
    pub buffer: Vec<u8>,
    frames: Vec<usize>,
    next_frame: usize,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoding cursor over a copy of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            start: 0,
            end: bytes.len(),
            buffer: bytes.to_vec(),
            ..Self::default()
        }
    }

    /// Allocates the buffer sized by the preencode pass.
    pub fn alloc(&mut self) {
        self.buffer = vec![0; self.end];
        self.start = 0;
        self.next_frame = 0;
    }

    /// Preencode step: reserves a slot for a frame length, filled in once the
    /// payload is measured.
    pub(crate) fn open_frame(&mut self) -> usize {
        self.frames.push(0);
        self.frames.len() - 1
    }

    pub(crate) fn close_frame(&mut self, slot: usize, len: usize) {
        if let Some(recorded) = self.frames.get_mut(slot) {
            *recorded = len;
        }
    }

    /// Encode step: the next frame length recorded by preencode, if any.
    pub(crate) fn take_frame(&mut self) -> Option<usize> {
        let len = self.frames.get(self.next_frame).copied();
        if len.is_some() {
            self.next_frame += 1;
        }
        len
    }

    /// Preencode step: account for `n` more bytes.
    pub fn reserve(&mut self, n: usize) {
        self.end += n;
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_exhausted(&self) -> bool {
        self.start >= self.end
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let next = self
            .start
            .checked_add(bytes.len())
            .filter(|next| *next <= self.buffer.len())
            .ok_or(CodecError::UnexpectedEnd)?;
        self.buffer[self.start..next].copy_from_slice(bytes);
        self.start = next;
        Ok(())
    }

    pub fn write_u8(&mut self, byte: u8) -> Result<(), CodecError> {
        self.write(&[byte])
    }

    pub fn read(&mut self, n: usize) -> Result<&[u8], CodecError> {
        let next = self
            .start
            .checked_add(n)
            .filter(|next| *next <= self.end && *next <= self.buffer.len())
            .ok_or(CodecError::UnexpectedEnd)?;
        let from = self.start;
        self.start = next;
        Ok(&self.buffer[from..next])
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read(1)?[0])
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_past_allocation_fails() {
        let mut state = State::new();
        state.reserve(2);
        state.alloc();
        state.write(&[1, 2]).unwrap();
        assert!(matches!(state.write_u8(3), Err(CodecError::UnexpectedEnd)));
        assert_eq!(state.into_bytes(), vec![1, 2]);
    }

    #[test]
    fn test_read_respects_end() {
        let mut state = State::from_bytes(&[1, 2, 3]);
        state.end = 2;
        assert_eq!(state.read(2).unwrap(), &[1, 2]);
        assert!(state.is_exhausted());
        assert!(state.read_u8().is_err());
    }

    #[test]
    fn test_frames_replay_in_order() {
        let mut state = State::new();
        let outer = state.open_frame();
        let inner = state.open_frame();
        state.close_frame(inner, 2);
        state.close_frame(outer, 4);
        state.alloc();
        assert_eq!(state.take_frame(), Some(4));
        assert_eq!(state.take_frame(), Some(2));
        assert_eq!(state.take_frame(), None);
    }

    #[test]
    fn test_read_length_overflow() {
        let mut state = State::from_bytes(&[1, 2, 3]);
        state.read_u8().unwrap();
        assert!(matches!(state.read(usize::MAX), Err(CodecError::UnexpectedEnd)));
        assert_eq!(state.start, 1);
        assert_eq!(state.read(2).unwrap(), &[2, 3]);
    }
}
