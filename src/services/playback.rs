/// Holds streamed text that has arrived but is not yet shown, and reveals it
/// a little at a time so bursty delivery still reads as smooth typing.
///
/// Positions are counted in `char`s so a reveal never splits a character.
#[derive(Debug, Default)]
pub struct PlaybackBuffer {
    arrived: String,
    arrived_chars: usize,
    revealed_chars: usize,
    revealed_bytes: usize,
    closed: bool,
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.arrived.push_str(text);
        self.arrived_chars += text.chars().count();
    }

    /// No more text will arrive.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn backlog(&self) -> usize {
        self.arrived_chars - self.revealed_chars
    }

    pub fn is_drained(&self) -> bool {
        self.closed && self.backlog() == 0
    }

    pub fn revealed(&self) -> &str {
        &self.arrived[..self.revealed_bytes]
    }

    pub fn full_text(&self) -> &str {
        &self.arrived
    }

    /// One display refresh. Returns the new visible prefix, or `None` when
    /// there was nothing left to reveal.
    pub fn tick(&mut self) -> Option<&str> {
        let backlog = self.backlog();
        if backlog == 0 {
            return None;
        }

        let step = reveal_step(backlog);
        let advance: usize = self.arrived[self.revealed_bytes..]
            .chars()
            .take(step)
            .map(char::len_utf8)
            .sum();
        self.revealed_bytes += advance;
        self.revealed_chars += step;

        Some(self.revealed())
    }
}

/// At least one character, otherwise a tenth of the backlog rounded up.
pub fn reveal_step(backlog: usize) -> usize {
    backlog.div_ceil(10).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_out(buffer: &mut PlaybackBuffer) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(text) = buffer.tick() {
            frames.push(text.to_string());
        }
        frames
    }

    #[test]
    fn test_reveal_step() {
        assert_eq!(reveal_step(1), 1);
        assert_eq!(reveal_step(9), 1);
        assert_eq!(reveal_step(10), 1);
        assert_eq!(reveal_step(11), 2);
        assert_eq!(reveal_step(30), 3);
        assert_eq!(reveal_step(101), 11);
    }

    #[test]
    fn test_reveals_exact_text_in_order() {
        let text = "Quantum computing uses qubits.";
        let mut buffer = PlaybackBuffer::new();
        buffer.push(text);
        buffer.close();

        let frames = play_out(&mut buffer);

        assert_eq!(frames.last().map(String::as_str), Some(text));
        for pair in frames.windows(2) {
            assert!(pair[1].starts_with(pair[0].as_str()));
            assert!(pair[1].len() > pair[0].len());
        }
        assert!(buffer.is_drained());
        assert_eq!(buffer.tick(), None);
    }

    #[test]
    fn test_first_frames_follow_backlog_fraction() {
        let mut buffer = PlaybackBuffer::new();
        buffer.push(&"a".repeat(30));

        let lens: Vec<usize> = (0..4).map(|_| buffer.tick().unwrap().len()).collect();
        // backlog 30 -> 3, 27 -> 3, 24 -> 3, 21 -> 3
        assert_eq!(lens, vec![3, 6, 9, 12]);
    }

    #[test]
    fn test_multibyte_characters_are_never_split() {
        let text = "héllo wörld — 日本語 🚀✨ done";
        let mut buffer = PlaybackBuffer::new();
        for piece in ["héllo ", "wörld — 日本", "語 🚀", "✨ done"] {
            buffer.push(piece);
        }
        buffer.close();

        let frames = play_out(&mut buffer);
        assert_eq!(frames.last().map(String::as_str), Some(text));
        assert_eq!(buffer.revealed(), text);
    }

    #[test]
    fn test_text_arriving_mid_playback() {
        let mut buffer = PlaybackBuffer::new();
        buffer.push("abc");
        assert_eq!(buffer.tick(), Some("a"));

        buffer.push("def");
        assert!(!buffer.is_drained());
        let frames = play_out(&mut buffer);
        assert_eq!(frames.last().map(String::as_str), Some("abcdef"));

        // Not closed yet, so playback would keep waiting for more text.
        assert!(!buffer.is_drained());
        buffer.close();
        assert!(buffer.is_drained());
    }

    #[test]
    fn test_empty_closed_buffer_is_drained() {
        let mut buffer = PlaybackBuffer::new();
        buffer.close();
        assert!(buffer.is_drained());
        assert_eq!(buffer.tick(), None);
        assert_eq!(buffer.revealed(), "");
    }
}
