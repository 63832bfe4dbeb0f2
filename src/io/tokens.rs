//! Line-oriented tokenizing shared by every artifact reader

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::str::{FromStr, SplitWhitespace};

use crate::error::{Error, Result};
use crate::types::RelationPath;

/// Separator between relation ids in a serialized path
pub const PATH_SEPARATOR: char = '>';

/// Sequential reader over the non-blank lines of an artifact file
pub struct LineReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl LineReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    /// Next non-blank line with its 1-based line number
    pub fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line?;
            if !line.trim().is_empty() {
                return Ok(Some((self.line_no, line)));
            }
        }
        Ok(None)
    }

    /// Body line of a two-line record whose header sits at `header_line`
    pub fn body_line(&mut self, header_line: usize) -> Result<(usize, String)> {
        self.next_line()?.ok_or_else(|| {
            Error::parse(
                &self.path,
                header_line,
                "truncated record: header has no body line",
            )
        })
    }
}

/// Whitespace token cursor over one line
pub struct LineTokens<'a> {
    path: &'a Path,
    line: usize,
    tokens: SplitWhitespace<'a>,
}

impl<'a> LineTokens<'a> {
    pub fn new(path: &'a Path, line: usize, text: &'a str) -> Self {
        Self {
            path,
            line,
            tokens: text.split_whitespace(),
        }
    }

    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.path, self.line, message)
    }

    pub fn next_str(&mut self, what: &str) -> Result<&'a str> {
        self.tokens
            .next()
            .ok_or_else(|| self.error(format!("missing {}", what)))
    }

    pub fn next_usize(&mut self, what: &str) -> Result<usize> {
        self.next_parsed(what)
    }

    pub fn next_f32(&mut self, what: &str) -> Result<f32> {
        let value: f32 = self.next_parsed(what)?;
        if !value.is_finite() {
            return Err(self.error(format!("non-finite {}", what)));
        }
        Ok(value)
    }

    /// A `<len> <r1>r2..>` pair, checking the declared length
    pub fn next_path(&mut self) -> Result<RelationPath> {
        let len = self.next_usize("path length")?;
        let token = self.next_str("path")?;
        let path = parse_path(token).map_err(|message| self.error(message))?;
        if path.len() != len {
            return Err(self.error(format!(
                "path '{}' declares length {} but has {} relations",
                token,
                len,
                path.len()
            )));
        }
        Ok(path)
    }

    /// Fail on residual tokens
    pub fn finish(mut self) -> Result<()> {
        match self.tokens.next() {
            Some(extra) => Err(self.error(format!("unexpected token '{}'", extra))),
            None => Ok(()),
        }
    }

    fn next_parsed<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.next_str(what)?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", what, token)))
    }
}

/// Parse `r1>r2>..` into a path
pub fn parse_path(token: &str) -> std::result::Result<RelationPath, String> {
    let relations = token
        .split(PATH_SEPARATOR)
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| format!("invalid relation id '{}' in path '{}'", part, token))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RelationPath::new(relations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_and_residual() {
        let path = Path::new("path2.txt");
        let mut tokens = LineTokens::new(path, 4, "2 1 3>0 0.5000 extra");
        assert_eq!(tokens.next_usize("count").unwrap(), 2);
        assert_eq!(tokens.next_path().unwrap(), RelationPath::new(vec![3, 0]));
        assert_eq!(tokens.next_f32("share").unwrap(), 0.5);

        let err = tokens.finish().unwrap_err();
        assert!(err.to_string().contains("path2.txt:4"));
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_path_length_mismatch() {
        let path = Path::new("confidence.txt");
        let mut tokens = LineTokens::new(path, 1, "1 3>0");
        assert!(matches!(tokens.next_path(), Err(Error::Parse { line: 1, .. })));
    }

    #[test]
    fn test_missing_and_invalid_tokens() {
        let path = Path::new("x.txt");
        let mut tokens = LineTokens::new(path, 7, "abc");
        assert!(tokens.next_usize("count").is_err());
        assert!(tokens.next_str("anything").is_err());
        assert!(parse_path("1>x").is_err());
    }
}
