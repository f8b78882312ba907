use bytes::BufMut;

/// Frame payloads longer than this are cut when written to logs.
pub const LOG_PAYLOAD_LIMIT: usize = 1000;

/// Decimal ascii operation in [`BufMut`].
pub trait BufMutExt {
    /// Write integer as decimal ascii.
    fn put_decimal<I: itoa::Integer>(&mut self, int: I);
}

/// Decimal ascii length of integers.
pub trait DecimalLen {
    /// Number of bytes required to render self as decimal ascii.
    fn decimal_len(self) -> usize;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;

    /// Same as [`lossy`][FmtExt::lossy], but at most [`LOG_PAYLOAD_LIMIT`] bytes.
    fn truncated(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl<B: BufMut> BufMutExt for B {
    fn put_decimal<I: itoa::Integer>(&mut self, int: I) {
        self.put_slice(itoa::Buffer::new().format(int).as_bytes());
    }
}

impl DecimalLen for usize {
    fn decimal_len(self) -> usize {
        itoa::Buffer::new().format(self).len()
    }
}

impl DecimalLen for u32 {
    fn decimal_len(self) -> usize {
        itoa::Buffer::new().format(self).len()
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }

    fn truncated(&self) -> LossyFmt<'_> {
        self[..self.len().min(LOG_PAYLOAD_LIMIT)].lossy()
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lossy_escapes() {
        assert_eq!(b"5:502 0,\n".lossy().to_string(), "5:502 0,\\x0a");
    }

    #[test]
    fn test_truncated() {
        let long = vec![b'a'; LOG_PAYLOAD_LIMIT * 2];
        assert_eq!(long.truncated().to_string().len(), LOG_PAYLOAD_LIMIT);
        assert_eq!(b"short".truncated().to_string(), "short");
        assert_eq!(b"\x00,".truncated().to_string(), "\\x00,");
    }

    #[test]
    fn test_decimal() {
        let mut buf = Vec::new();
        buf.put_decimal(-1i32);
        buf.put_decimal(2006u32);
        assert_eq!(buf, b"-12006");
        assert_eq!(0usize.decimal_len(), 1);
        assert_eq!(2006u32.decimal_len(), 4);
    }
}
