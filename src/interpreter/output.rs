/// HTML buffer, optionally drained through a flush callback
pub struct HtmlOutput<'o> {
    buffer: String,
    threshold: usize,
    flush: Option<&'o mut dyn FnMut(&str)>,
    flushed: usize,
}

impl<'o> HtmlOutput<'o> {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            threshold: usize::MAX,
            flush: None,
            flushed: 0,
        }
    }

    /// Flush whenever the buffer has grown past `threshold` bytes
    pub fn flushing(threshold: usize, flush: &'o mut dyn FnMut(&str)) -> Self {
        Self {
            buffer: String::new(),
            threshold,
            flush: Some(flush),
            flushed: 0,
        }
    }

    pub fn emit(&mut self, text: &str) {
        if self.buffer.len() > self.threshold {
            if let Some(flush) = self.flush.as_mut() {
                flush(&self.buffer);
                self.flushed += self.buffer.len();
                self.buffer.clear();
            }
        }
        self.buffer.push_str(text);
    }

    /// Bytes written so far, flushed or not
    pub fn len(&self) -> usize {
        self.flushed + self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the remainder. Returns the whole document when no flush
    /// callback was given, otherwise an empty string.
    pub fn finish(mut self) -> String {
        match self.flush.as_mut() {
            Some(flush) => {
                if !self.buffer.is_empty() {
                    flush(&self.buffer);
                }
                String::new()
            }
            None => self.buffer,
        }
    }
}

impl Default for HtmlOutput<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered() {
        let mut out = HtmlOutput::new();
        out.emit("<p>");
        out.emit("</p>");
        assert_eq!(out.len(), 7);
        assert_eq!(out.finish(), "<p></p>");
    }

    #[test]
    fn test_flush_after_threshold() {
        let mut chunks: Vec<String> = Vec::new();
        let mut collect = |s: &str| chunks.push(s.to_string());
        let mut out = HtmlOutput::flushing(4, &mut collect);
        out.emit("<div>");
        out.emit("x");
        out.emit("</div>");
        out.emit("!");
        assert_eq!(out.finish(), "");
        assert_eq!(chunks, vec!["<div>", "x</div>", "!"]);
    }
}
