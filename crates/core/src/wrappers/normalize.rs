use crate::error::Result;
use crate::service::{QueryHandle, QueryService};
use async_trait::async_trait;

/// Canonicalize whitespace so that queries differing only in layout share a
/// cache key.
///
/// Whitespace runs collapse to a single space and both ends are trimmed.
/// Quoted literals, quoted identifiers and block comments are copied
/// verbatim. A `--` comment keeps its terminating newline so it cannot
/// swallow the rest of the statement.
pub fn normalize_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);

        match c {
            '\'' | '"' => {
                // Doubled quotes close and reopen, so they need no special case.
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        break;
                    }
                    out.push(inner);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                let mut previous = '/';
                if let Some(star) = chars.next() {
                    out.push(star);
                }
                for inner in chars.by_ref() {
                    out.push(inner);
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            _ => {}
        }
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out
}

/// Normalizes SQL before submitting it.
pub struct NormalizingService {
    inner: Box<dyn QueryService>,
}

impl NormalizingService {
    pub fn new(inner: Box<dyn QueryService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl QueryService for NormalizingService {
    fn database(&self) -> Option<&str> {
        self.inner.database()
    }

    async fn submit(&self, sql: &str, ignore_cache: bool) -> Result<Box<dyn QueryHandle>> {
        let normalized = normalize_sql(sql);
        self.inner.submit(&normalized, ignore_cache).await
    }

    async fn get_query(&self, execution_id: &str) -> Result<Box<dyn QueryHandle>> {
        self.inner.get_query(execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_sql("  SELECT\n\t*   FROM  t \n"), "SELECT * FROM t");
        assert_eq!(normalize_sql("SELECT 1"), "SELECT 1");
        assert_eq!(normalize_sql(""), "");
        assert_eq!(normalize_sql(" \n\t "), "");
    }

    #[test]
    fn test_preserves_quoted_text() {
        assert_eq!(
            normalize_sql("SELECT  'a   b',  \"my   col\"  FROM t"),
            "SELECT 'a   b', \"my   col\" FROM t"
        );
        assert_eq!(
            normalize_sql("SELECT 'it''s  here'   x"),
            "SELECT 'it''s  here' x"
        );
    }

    #[test]
    fn test_line_comment_keeps_newline() {
        assert_eq!(
            normalize_sql("SELECT 1 -- first  column\n   FROM t"),
            "SELECT 1 -- first  column\nFROM t"
        );
        assert_eq!(normalize_sql("SELECT 1 -- trailing"), "SELECT 1 -- trailing");
    }

    #[test]
    fn test_block_comment_verbatim() {
        assert_eq!(
            normalize_sql("SELECT /*  keep   this */   1"),
            "SELECT /*  keep   this */ 1"
        );
    }

    #[test]
    fn test_minus_is_not_a_comment() {
        assert_eq!(normalize_sql("SELECT 2 -  1"), "SELECT 2 - 1");
    }

    proptest! {
        #[test]
        fn prop_idempotent(sql in "[a-z0-9 \t\n'\"*/-]{0,64}") {
            let once = normalize_sql(&sql);
            prop_assert_eq!(normalize_sql(&once), once);
        }

        #[test]
        fn prop_whitespace_runs_do_not_matter(
            words in prop::collection::vec("[A-Za-z0-9_*,()=<>]{1,8}", 1..8),
            gaps in prop::collection::vec("[ \t\n]{1,4}", 8),
        ) {
            let single = words.join(" ");
            let mut spaced = String::new();
            for (i, word) in words.iter().enumerate() {
                spaced.push_str(&gaps[i]);
                spaced.push_str(word);
            }
            spaced.push_str(&gaps[7]);
            prop_assert_eq!(normalize_sql(&spaced), normalize_sql(&single));
        }
    }
}
