//! Prepared statement.
use bytes::{Bytes, BytesMut};

use crate::{
    Result,
    error::NotImplemented,
    ext::BufMutExt,
    query::StillExecutingPolicy,
};

/// A prepared SQL text and its execution configuration.
///
/// Positional placeholders `?` are rewritten to `:p1`, `:p2`, ... in
/// left to right order. The proxy is not contacted until execution.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    fetch_size: Bytes,
    still_executing: StillExecutingPolicy,
}

impl Statement {
    pub fn new(sql: &str) -> Statement {
        Self {
            sql: normalize(sql),
            fetch_size: Bytes::from_static(b"0"),
            still_executing: StillExecutingPolicy::default(),
        }
    }

    pub(crate) fn with_still_executing(mut self, policy: StillExecutingPolicy) -> Self {
        self.still_executing = policy;
        self
    }

    /// Returns the normalized sql.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the fetch page size payload, `"0"` means all rows at once.
    pub fn fetch_size(&self) -> &Bytes {
        &self.fetch_size
    }

    /// Set how many rows the proxy returns on each fetch round trip.
    pub fn set_fetch_size(&mut self, size: u32) {
        let mut buf = BytesMut::with_capacity(10);
        buf.put_decimal(size);
        self.fetch_size = buf.freeze();
    }

    /// Override the still executing policy inherited from connection config.
    pub fn set_still_executing(&mut self, policy: StillExecutingPolicy) {
        self.still_executing = policy;
    }

    pub(crate) fn still_executing(&self) -> StillExecutingPolicy {
        self.still_executing
    }

    /// Statement close is not supported by the proxy.
    pub fn close(self) -> Result<()> {
        Err(NotImplemented("statement close").into())
    }
}

fn normalize(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut nth = 0usize;
    let mut buf = itoa::Buffer::new();
    for (i, part) in sql.split('?').enumerate() {
        if i != 0 {
            nth += 1;
            out.push_str(":p");
            out.push_str(buf.format(nth));
        }
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("SELECT * FROM t WHERE a=? AND b=?"),
            "SELECT * FROM t WHERE a=:p1 AND b=:p2"
        );
        assert_eq!(normalize("?,?,?"), ":p1,:p2,:p3");
        assert_eq!(normalize("select 1"), "select 1");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_fetch_size() {
        let mut stmt = Statement::new("select 1");
        assert_eq!(stmt.fetch_size(), &b"0"[..]);
        stmt.set_fetch_size(250);
        assert_eq!(stmt.fetch_size(), &b"250"[..]);
    }

    #[test]
    fn test_close() {
        let err = Statement::new("select 1").close().unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::NotImplemented(_)));
    }
}
